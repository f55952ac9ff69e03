use serde::{Deserialize, Serialize};
use crate::board::RemoteError;
use crate::models::{ConfirmationOutcome, Entity, EntityId, MoveIntent, SegmentKey, SideEffectData};

/// Parameters of one segment page fetch
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageQuery {
    pub segment: SegmentKey,
    /// 1-based page number
    pub page: u32,
    pub page_size: u32,
    pub filter_query: Option<String>,
}

/// One page as returned by the source of truth
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageResponse {
    pub entities: Vec<Entity>,
    /// Server-side count of entities in the segment (after filtering)
    pub total: u64,
}

/// Payload of a cross-segment move commit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MoveCommit {
    pub entity_id: EntityId,
    pub to_segment: SegmentKey,
    pub position: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub side_effect: Option<SideEffectData>,
}

/// The remote source of truth behind the board.
///
/// Implementations own their transport, timeout and retry policy; the board
/// only distinguishes `Ok` from `Err`.
pub trait BoardRemote {
    fn fetch_segment_page(&mut self, query: &PageQuery) -> Result<PageResponse, RemoteError>;

    fn commit_order(&mut self, segment: SegmentKey, ordered_ids: &[EntityId]) -> Result<(), RemoteError>;

    fn commit_move(&mut self, commit: &MoveCommit) -> Result<(), RemoteError>;
}

impl<R: BoardRemote + ?Sized> BoardRemote for &mut R {
    fn fetch_segment_page(&mut self, query: &PageQuery) -> Result<PageResponse, RemoteError> {
        (**self).fetch_segment_page(query)
    }

    fn commit_order(&mut self, segment: SegmentKey, ordered_ids: &[EntityId]) -> Result<(), RemoteError> {
        (**self).commit_order(segment, ordered_ids)
    }

    fn commit_move(&mut self, commit: &MoveCommit) -> Result<(), RemoteError> {
        (**self).commit_move(commit)
    }
}

/// Request handed to the confirmation collaborator for a gated move
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfirmationRequest {
    pub guard_token: uuid::Uuid,
    pub intent: MoveIntent,
}

/// Answer from the confirmation collaborator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Confirmation {
    pub outcome: ConfirmationOutcome,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub side_effect: Option<SideEffectData>,
}

impl Confirmation {
    pub fn approved(side_effect: SideEffectData) -> Self {
        Self {
            outcome: ConfirmationOutcome::Approved,
            side_effect: Some(side_effect),
        }
    }

    pub fn cancelled() -> Self {
        Self {
            outcome: ConfirmationOutcome::Cancelled,
            side_effect: None,
        }
    }
}

/// Collaborator that runs the blocking confirmation step (win form, discard form)
pub trait Confirmer {
    fn request_confirmation(&mut self, request: &ConfirmationRequest) -> anyhow::Result<Confirmation>;
}

impl<F> Confirmer for F
where
    F: FnMut(&ConfirmationRequest) -> anyhow::Result<Confirmation>,
{
    fn request_confirmation(&mut self, request: &ConfirmationRequest) -> anyhow::Result<Confirmation> {
        self(request)
    }
}
