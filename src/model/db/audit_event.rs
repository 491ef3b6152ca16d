use std::ops::{Deref, DerefMut};

use chrono::{DateTime, Utc};
use mongodb::bson::{serde_helpers::chrono_datetime_as_bson_datetime, Document};
use serde::{Deserialize, Serialize};

use crate::model::{common::audit::AuditAction, mongodb::Id};

/// Core audit log entry, as stored in the database. Append-only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEventCore {
    /// Who performed the action (voter or staff identifier).
    pub actor: String,
    /// The election concerned, if any.
    pub election_id: Option<Id>,
    pub action: AuditAction,
    /// Free-form details.
    #[serde(default)]
    pub metadata: Document,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub timestamp: DateTime<Utc>,
}

impl AuditEventCore {
    pub fn new(
        actor: impl Into<String>,
        election_id: impl Into<Option<Id>>,
        action: AuditAction,
        metadata: Document,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            actor: actor.into(),
            election_id: election_id.into(),
            action,
            metadata,
            timestamp,
        }
    }
}

/// An audit event without an ID.
pub type NewAuditEvent = AuditEventCore;

/// An audit event from the database, with its unique ID.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEvent {
    #[serde(rename = "_id")]
    pub id: Id,
    #[serde(flatten)]
    pub event: AuditEventCore,
}

impl AuditEvent {
    pub fn new(event: AuditEventCore) -> Self {
        Self {
            id: Id::new(),
            event,
        }
    }
}

impl Deref for AuditEvent {
    type Target = AuditEventCore;

    fn deref(&self) -> &Self::Target {
        &self.event
    }
}

impl DerefMut for AuditEvent {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.event
    }
}
