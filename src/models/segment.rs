use serde::{Deserialize, Serialize};
use std::fmt;

/// Pipeline stage a lead sits in.
///
/// The set is closed: every board session creates exactly one segment per
/// key, in the order of [`SegmentKey::ALL`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SegmentKey {
    New,
    Contacted,
    Qualifying,
    InProgress,
    Won,
    Lost,
}

impl SegmentKey {
    /// All segments in board (left to right) order
    pub const ALL: [SegmentKey; 6] = [
        SegmentKey::New,
        SegmentKey::Contacted,
        SegmentKey::Qualifying,
        SegmentKey::InProgress,
        SegmentKey::Won,
        SegmentKey::Lost,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SegmentKey::New => "new",
            SegmentKey::Contacted => "contacted",
            SegmentKey::Qualifying => "qualifying",
            SegmentKey::InProgress => "in_progress",
            SegmentKey::Won => "won",
            SegmentKey::Lost => "lost",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "new" => Some(SegmentKey::New),
            "contacted" => Some(SegmentKey::Contacted),
            "qualifying" => Some(SegmentKey::Qualifying),
            "in_progress" | "in-progress" => Some(SegmentKey::InProgress),
            "won" => Some(SegmentKey::Won),
            "lost" => Some(SegmentKey::Lost),
            _ => None,
        }
    }

    /// Column heading shown on the board
    pub fn label(&self) -> &'static str {
        match self {
            SegmentKey::New => "New",
            SegmentKey::Contacted => "Contacted",
            SegmentKey::Qualifying => "Qualifying",
            SegmentKey::InProgress => "In Progress",
            SegmentKey::Won => "Won",
            SegmentKey::Lost => "Lost",
        }
    }
}

impl fmt::Display for SegmentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
