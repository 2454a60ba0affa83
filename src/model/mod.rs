//! Catalog entities and the event envelopes built from them.
//!
//! Entities serialize with camelCase field names. When an entity travels
//! through the outbox it is wrapped in a [`Tagged`] payload that carries the
//! `eventType` alongside the entity fields.

use std::fmt;

use chrono::{DateTime, SubsecRound, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// Result type for event payload operations.
pub type Result<T> = std::result::Result<T, EventError>;

/// Errors raised while encoding or decoding tagged payloads.
#[derive(Debug, thiserror::Error)]
pub enum EventError {
    #[error("Failed to decode {kind} payload: {source}")]
    Decode {
        kind: EventKind,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to encode {kind} payload: {source}")]
    Encode {
        kind: EventKind,
        #[source]
        source: serde_json::Error,
    },
}

/// A product category.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Category {
    pub id: u64,
    pub name: String,
    pub description: String,
    pub created_at: DateTime<Utc>,
}

/// A product, partitioned by its category.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: u64,
    pub category_id: u64,
    pub name: String,
    pub description: String,
    pub price: f64,
    pub stock: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Current time at the precision the storage engine keeps (milliseconds).
pub fn write_timestamp() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(3)
}

/// Closed set of event kinds the relay knows how to publish.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    CategoryCreated,
    ProductCreated,
}

impl EventKind {
    /// All recognized kinds.
    pub const ALL: [EventKind; 2] = [EventKind::CategoryCreated, EventKind::ProductCreated];

    /// Wire tag for this kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::CategoryCreated => "category.created",
            EventKind::ProductCreated => "product.created",
        }
    }

    /// Parse a persisted tag. Returns `None` for unrecognized tags.
    pub fn parse(tag: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.as_str() == tag)
    }

    /// Decode a persisted payload for this kind and re-encode it with the
    /// canonical tag applied.
    pub fn retag(&self, payload: &str) -> Result<Vec<u8>> {
        match self {
            EventKind::CategoryCreated => retag_as::<Category>(*self, payload),
            EventKind::ProductCreated => retag_as::<Product>(*self, payload),
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Entities that emit an event when created.
pub trait Creatable: Serialize + DeserializeOwned {
    const CREATED: EventKind;
}

impl Creatable for Category {
    const CREATED: EventKind = EventKind::CategoryCreated;
}

impl Creatable for Product {
    const CREATED: EventKind = EventKind::ProductCreated;
}

/// An entity snapshot tagged with the event type it was emitted under.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tagged<T> {
    #[serde(flatten)]
    pub entity: T,
    #[serde(rename = "eventType", default)]
    pub event_type: String,
}

impl<T: Creatable> Tagged<T> {
    /// Tag an entity with its creation event.
    pub fn created(entity: T) -> Self {
        Self {
            entity,
            event_type: T::CREATED.as_str().to_string(),
        }
    }

    /// Serialize to the JSON payload stored in the outbox.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|source| EventError::Encode {
            kind: T::CREATED,
            source,
        })
    }
}

fn retag_as<T: DeserializeOwned + Serialize>(kind: EventKind, payload: &str) -> Result<Vec<u8>> {
    let mut tagged: Tagged<T> =
        serde_json::from_str(payload).map_err(|source| EventError::Decode { kind, source })?;
    tagged.event_type = kind.as_str().to_string();
    serde_json::to_vec(&tagged).map_err(|source| EventError::Encode { kind, source })
}
