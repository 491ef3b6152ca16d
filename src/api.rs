use rocket::Route;

mod ballot;
mod reports;

pub fn routes() -> Vec<Route> {
    let mut routes = Vec::new();
    routes.extend(ballot::routes());
    routes.extend(reports::routes());
    routes
}

/// Test helpers shared by the route tests.
#[cfg(test)]
mod testing {
    use std::sync::Arc;

    use chrono::{Duration, TimeZone, Utc};
    use rocket::local::asynchronous::Client;

    use crate::clock::FixedClock;
    use crate::config::Config;
    use crate::model::api::access::VoterSession;
    use crate::voting::examples::ExampleElection;

    /// 10:30 UTC on polling day.
    pub fn now() -> chrono::DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 14, 10, 30, 0).unwrap()
    }

    /// A client for a server running over the example election's store.
    pub async fn client(example: &ExampleElection) -> Client {
        // These tests run the whole server, so enable logging.
        log4rs_test_utils::test_logging::init_logging_once_for(["tally_backend"], None, None);

        let figment = rocket::Config::figment()
            .merge(("fingerprint_secret", "fingerprint secret"))
            .merge(("access_token_secret", "access token secret"));
        let rocket = crate::rocket_with(example.store.clone(), Arc::new(FixedClock::at(now())))
            .configure(figment);
        Client::tracked(rocket).await.unwrap()
    }

    /// An access token for the given example voter, as issued by the
    /// authentication service.
    pub fn access_token(example: &ExampleElection, voter: usize) -> String {
        VoterSession {
            voter_id: ExampleElection::voter_id(voter),
            election_id: example.election_id(),
            // Real time, since token expiry is checked against the system clock.
            expires_at: Utc::now() + Duration::minutes(30),
        }
        .into_access_token(&Config::example())
    }
}
