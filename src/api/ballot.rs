use rocket::{serde::json::Json, Route, State};

use crate::clock::SharedClock;
use crate::config::Config;
use crate::error::Result;
use crate::model::api::{
    access::VoterSession,
    ballot::{LoadBallotRequest, LoadBallotResponse, SubmitBallotRequest, SubmitBallotResponse},
};
use crate::store::SharedStore;
use crate::voting::{BallotAssembler, Selection, TokenHasher, VoteRecorder};

pub fn routes() -> Vec<Route> {
    routes![load_ballot, submit_ballot]
}

#[post("/ballot", data = "<request>", format = "json")]
async fn load_ballot(
    request: Json<LoadBallotRequest>,
    config: &State<Config>,
    hasher: &State<TokenHasher>,
    store: &State<SharedStore>,
) -> Result<Json<LoadBallotResponse>> {
    let voter = VoterSession::from_access_token(&request.access_token, config)?;

    let assembler = BallotAssembler::new(
        store.inner().clone(),
        hasher.inner().clone(),
        config.unset_ballot_order(),
    );
    let ballot = assembler.load_ballot(&voter).await?;

    Ok(Json(LoadBallotResponse {
        success: true,
        ballot,
    }))
}

#[post("/ballot/submit", data = "<request>", format = "json")]
async fn submit_ballot(
    request: Json<SubmitBallotRequest>,
    config: &State<Config>,
    hasher: &State<TokenHasher>,
    store: &State<SharedStore>,
    clock: &State<SharedClock>,
) -> Result<Json<SubmitBallotResponse>> {
    let request = request.into_inner();
    let voter = VoterSession::from_access_token(&request.access_token, config)?;

    let selections = request
        .selections
        .into_iter()
        .map(|spec| Selection {
            portfolio_id: spec.portfolio_id.into(),
            candidate_id: spec.candidate_id.map(Into::into),
        })
        .collect::<Vec<_>>();

    let recorder = VoteRecorder::new(
        store.inner().clone(),
        hasher.inner().clone(),
        clock.inner().clone(),
    );
    let recorded = recorder.submit_ballot(&voter, &selections).await?;

    Ok(Json(SubmitBallotResponse {
        success: true,
        cast_at: recorded.cast_at,
    }))
}

#[cfg(test)]
mod tests {
    use rocket::{
        http::{ContentType, Status},
        serde::json::{json, serde_json},
    };

    use super::*;
    use crate::api::testing::{access_token, client, now};
    use crate::error::{ErrorBody, ErrorCode};
    use crate::model::api::ballot::Ballot;
    use crate::store::VoteStore;
    use crate::voting::examples::ExampleElection;

    fn selections(example: &ExampleElection) -> serde_json::Value {
        json!([
            {
                "portfolioId": example.president.id.to_string(),
                "candidateId": example.candidates[0].id.to_string(),
            },
            {
                "portfolioId": example.referendum.id.to_string(),
                "candidateId": null,
            },
        ])
    }

    #[rocket::async_test]
    async fn load_then_submit() {
        let example = ExampleElection::new().with_voters(3);
        let client = client(&example).await;
        let token = access_token(&example, 1);

        let response = client
            .post(uri!(load_ballot))
            .header(ContentType::JSON)
            .body(json!({ "accessToken": token }).to_string())
            .dispatch()
            .await;
        assert_eq!(Status::Ok, response.status());
        let body = response.into_json::<serde_json::Value>().await.unwrap();
        assert_eq!(body["success"], true);
        let ballot = serde_json::from_value::<Ballot>(body["ballot"].clone()).unwrap();
        assert_eq!(*ballot.election_id, example.election_id());
        assert_eq!(*ballot.portfolios[0].id, example.president.id);
        assert!(ballot.portfolios[1].referendum);

        let response = client
            .post(uri!(submit_ballot))
            .header(ContentType::JSON)
            .body(
                json!({ "accessToken": token, "selections": selections(&example) }).to_string(),
            )
            .dispatch()
            .await;
        assert_eq!(Status::Ok, response.status());
        let body = response
            .into_json::<SubmitBallotResponse>()
            .await
            .unwrap();
        assert!(body.success);
        assert_eq!(body.cast_at, now());

        let votes = example.store.votes(example.election_id()).await.unwrap();
        assert_eq!(votes.len(), 2);
    }

    #[rocket::async_test]
    async fn second_submission_conflicts() {
        let example = ExampleElection::new().with_voters(1);
        let client = client(&example).await;
        let request = json!({
            "accessToken": access_token(&example, 0),
            "selections": selections(&example),
        })
        .to_string();

        let first = client
            .post(uri!(submit_ballot))
            .header(ContentType::JSON)
            .body(request.clone())
            .dispatch()
            .await;
        assert_eq!(Status::Ok, first.status());

        let second = client
            .post(uri!(submit_ballot))
            .header(ContentType::JSON)
            .body(request)
            .dispatch()
            .await;
        assert_eq!(Status::Conflict, second.status());
        let body = second.into_json::<ErrorBody>().await.unwrap();
        assert!(!body.success);
        assert_eq!(body.error_code, ErrorCode::AlreadyVoted);
        assert_eq!(body.voted_at, Some(now()));

        // The ballot can't be loaded again either.
        let reload = client
            .post(uri!(load_ballot))
            .header(ContentType::JSON)
            .body(json!({ "accessToken": access_token(&example, 0) }).to_string())
            .dispatch()
            .await;
        assert_eq!(Status::Conflict, reload.status());
        let body = reload.into_json::<ErrorBody>().await.unwrap();
        assert_eq!(body.voted_at, Some(now()));
    }

    #[rocket::async_test]
    async fn incomplete_ballot_is_rejected() {
        let example = ExampleElection::new().with_voters(1);
        let client = client(&example).await;
        let partial = json!([{
            "portfolioId": example.president.id.to_string(),
            "candidateId": example.candidates[2].id.to_string(),
        }]);

        let response = client
            .post(uri!(submit_ballot))
            .header(ContentType::JSON)
            .body(
                json!({ "accessToken": access_token(&example, 0), "selections": partial })
                    .to_string(),
            )
            .dispatch()
            .await;
        assert_eq!(Status::BadRequest, response.status());
        let body = response.into_json::<ErrorBody>().await.unwrap();
        assert_eq!(body.error_code, ErrorCode::IncompleteBallot);
        assert!(example
            .store
            .votes(example.election_id())
            .await
            .unwrap()
            .is_empty());
    }

    #[rocket::async_test]
    async fn bad_token_is_unauthorized() {
        let example = ExampleElection::new().with_voters(1);
        let client = client(&example).await;

        let response = client
            .post(uri!(load_ballot))
            .header(ContentType::JSON)
            .body(json!({ "accessToken": "forged" }).to_string())
            .dispatch()
            .await;
        assert_eq!(Status::Unauthorized, response.status());
        let body = response.into_json::<ErrorBody>().await.unwrap();
        assert_eq!(body.error_code, ErrorCode::InvalidToken);
    }

    #[rocket::async_test]
    async fn voter_without_token_is_forbidden() {
        let example = ExampleElection::new().with_voters(1);
        let client = client(&example).await;

        let response = client
            .post(uri!(submit_ballot))
            .header(ContentType::JSON)
            .body(
                // Voter 5 was never issued an eligibility token.
                json!({ "accessToken": access_token(&example, 5), "selections": selections(&example) })
                    .to_string(),
            )
            .dispatch()
            .await;
        assert_eq!(Status::Forbidden, response.status());
        let body = response.into_json::<ErrorBody>().await.unwrap();
        assert_eq!(body.error_code, ErrorCode::NotEligible);
    }

    #[rocket::async_test]
    async fn outage_is_retryable() {
        let example = ExampleElection::new().with_voters(1);
        let client = client(&example).await;
        example.store.set_available(false);

        let response = client
            .post(uri!(load_ballot))
            .header(ContentType::JSON)
            .body(json!({ "accessToken": access_token(&example, 0) }).to_string())
            .dispatch()
            .await;
        assert_eq!(Status::ServiceUnavailable, response.status());
        let body = response.into_json::<ErrorBody>().await.unwrap();
        assert_eq!(body.error_code, ErrorCode::StoreUnavailable);
        assert!(body.retryable);
    }
}
