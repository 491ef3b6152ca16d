use rocket::{serde::json::Json, Route, State};

use crate::clock::SharedClock;
use crate::config::Config;
use crate::error::Result;
use crate::model::{
    api::{
        integrity::{AuditEventDesc, IntegritySummary},
        tally::TallyReport,
    },
    mongodb::Id,
};
use crate::store::SharedStore;
use crate::voting::{IntegrityAuditor, TallyAggregator};

pub fn routes() -> Vec<Route> {
    routes![election_report, integrity_summary, security_events]
}

fn auditor(config: &Config, store: &SharedStore, clock: &SharedClock) -> IntegrityAuditor {
    IntegrityAuditor::new(
        store.clone(),
        clock.clone(),
        config.security_event_limit(),
        config.max_security_event_limit(),
        config.audit_checkpoint_action(),
    )
}

#[get("/elections/<election_id>/report")]
async fn election_report(
    election_id: Id,
    config: &State<Config>,
    store: &State<SharedStore>,
    clock: &State<SharedClock>,
) -> Result<Json<TallyReport>> {
    let aggregator = TallyAggregator::new(
        store.inner().clone(),
        clock.inner().clone(),
        config.unset_ballot_order(),
    );
    Ok(Json(aggregator.report(election_id).await?))
}

#[get("/elections/<election_id>/integrity")]
async fn integrity_summary(
    election_id: Id,
    config: &State<Config>,
    store: &State<SharedStore>,
    clock: &State<SharedClock>,
) -> Result<Json<IntegritySummary>> {
    let summary = auditor(config, store, clock)
        .ballot_integrity_summary(election_id)
        .await?;
    Ok(Json(summary))
}

#[get("/elections/<election_id>/security-events?<limit>")]
async fn security_events(
    election_id: Id,
    limit: Option<usize>,
    config: &State<Config>,
    store: &State<SharedStore>,
    clock: &State<SharedClock>,
) -> Result<Json<Vec<AuditEventDesc>>> {
    let events = auditor(config, store, clock)
        .recent_security_events(election_id, limit)
        .await?
        .into_iter()
        .map(AuditEventDesc::from)
        .collect();
    Ok(Json(events))
}
