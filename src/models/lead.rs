use serde::{Deserialize, Serialize};
use crate::models::{Entity, SegmentKey};

/// Lead model (reference backend row)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lead {
    pub id: Option<i64>,
    pub name: String,
    pub company: Option<String>,
    pub segment: SegmentKey,
    pub display_order: i64,
    pub value: Option<f64>,
    pub loss_reason: Option<String>,
    pub notes: Option<String>,
    pub won_ts: Option<i64>,
    pub lost_ts: Option<i64>,
    pub created_ts: i64,
    pub modified_ts: i64,
}

impl Lead {
    /// Create a new lead in the given stage
    pub fn new(name: String, segment: SegmentKey) -> Self {
        let now = chrono::Utc::now().timestamp();
        Self {
            id: None,
            name,
            company: None,
            segment,
            display_order: 0,
            value: None,
            loss_reason: None,
            notes: None,
            won_ts: None,
            lost_ts: None,
            created_ts: now,
            modified_ts: now,
        }
    }

    /// Convert into a board entity; display fields travel in the payload
    pub fn to_entity(&self) -> Entity {
        let id = self.id.unwrap_or_default();
        Entity::new(id, self.segment, self.display_order).with_payload(serde_json::json!({
            "name": self.name,
            "company": self.company,
            "value": self.value,
            "loss_reason": self.loss_reason,
        }))
    }
}

/// One stage change recorded for a lead
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeadHistoryEntry {
    pub id: i64,
    pub lead_id: i64,
    pub action: String,
    pub from_segment: Option<SegmentKey>,
    pub to_segment: SegmentKey,
    pub value: Option<f64>,
    pub notes: Option<String>,
    pub created_ts: i64,
}
