use serde::{Deserialize, Serialize};
use crate::models::{EntityId, SegmentKey};

/// What a drag-end event asks the board to do
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoveIntent {
    pub entity_id: EntityId,
    pub from_segment: SegmentKey,
    pub to_segment: SegmentKey,
    pub to_index: usize,
}

impl MoveIntent {
    pub fn new(entity_id: impl Into<EntityId>, from_segment: SegmentKey, to_segment: SegmentKey, to_index: usize) -> Self {
        Self {
            entity_id: entity_id.into(),
            from_segment,
            to_segment,
            to_index,
        }
    }
}

/// Structured data captured by a confirmation step (deal closure, discard reason)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SideEffectData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deal_value: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub loss_reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl SideEffectData {
    pub fn won(deal_value: f64) -> Self {
        Self {
            deal_value: Some(deal_value),
            ..Self::default()
        }
    }

    pub fn lost(reason: impl Into<String>) -> Self {
        Self {
            loss_reason: Some(reason.into()),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.deal_value.is_none() && self.loss_reason.is_none() && self.notes.is_none()
    }
}

/// Result of a confirmation step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfirmationOutcome {
    Approved,
    Cancelled,
}

impl ConfirmationOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConfirmationOutcome::Approved => "approved",
            ConfirmationOutcome::Cancelled => "cancelled",
        }
    }
}
