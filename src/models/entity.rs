use serde::{Deserialize, Serialize};
use std::fmt;
use crate::models::SegmentKey;

/// Stable identifier of a board entity
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(pub String);

impl EntityId {
    pub fn new(id: impl Into<String>) -> Self {
        EntityId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<i64> for EntityId {
    fn from(id: i64) -> Self {
        EntityId(id.to_string())
    }
}

impl From<&str> for EntityId {
    fn from(id: &str) -> Self {
        EntityId(id.to_string())
    }
}

/// A record on the board.
///
/// Only `id`, `segment` and `sort_key` matter to the board; `payload` carries
/// whatever display fields the source sent and is never inspected.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    pub id: EntityId,
    pub segment: SegmentKey,
    pub sort_key: i64,
    #[serde(default)]
    pub payload: serde_json::Value,
}

impl Entity {
    pub fn new(id: impl Into<EntityId>, segment: SegmentKey, sort_key: i64) -> Self {
        Self {
            id: id.into(),
            segment,
            sort_key,
            payload: serde_json::Value::Null,
        }
    }

    pub fn with_payload(mut self, payload: serde_json::Value) -> Self {
        self.payload = payload;
        self
    }
}
