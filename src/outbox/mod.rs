//! Transactional outbox.
//!
//! Every entity write appends an [`OutboxEnvelope`] in the same atomic batch.
//! Envelopes are partitioned into calendar-day buckets (UTC) and drained by the
//! [`RelayEngine`], which publishes each one and deletes it on acknowledgement.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::model::{self, Creatable, EventKind, Tagged};

pub mod relay;

pub use relay::{spawn_relay_task, PassSummary, RelayEngine, RelayTaskHandle};

/// Bucket key format: `YYYY-MM-DD`.
const BUCKET_FORMAT: &str = "%Y-%m-%d";

/// Bucket key for an instant.
pub fn bucket_for(at: DateTime<Utc>) -> String {
    at.format(BUCKET_FORMAT).to_string()
}

/// Bucket key for the current UTC day.
pub fn current_bucket() -> String {
    bucket_for(Utc::now())
}

/// A pending event awaiting publication.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboxEnvelope {
    /// Time-ordered id (UUIDv7). Ascending id is processing order within a bucket.
    pub id: Uuid,
    pub bucket: String,
    /// Event tag as persisted. May be outside the recognised set.
    pub event_type: String,
    /// Tagged entity JSON.
    pub payload: String,
}

impl OutboxEnvelope {
    pub fn new(
        bucket: impl Into<String>,
        event_type: impl Into<String>,
        payload: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::now_v7(),
            bucket: bucket.into(),
            event_type: event_type.into(),
            payload: payload.into(),
        }
    }

    /// Envelope announcing the creation of `entity`, bucketed by `at`.
    pub fn created<T: Creatable + Clone>(entity: &T, at: DateTime<Utc>) -> model::Result<Self> {
        let payload = Tagged::created(entity.clone()).to_json()?;
        Ok(Self::new(bucket_for(at), T::CREATED.as_str(), payload))
    }

    /// Recognised kind of this envelope, if any.
    pub fn kind(&self) -> Option<EventKind> {
        EventKind::parse(&self.event_type)
    }

    /// Broker routing key: `<eventType>:<envelopeId>`.
    pub fn routing_key(&self) -> String {
        format!("{}:{}", self.event_type, self.id)
    }
}
