use thiserror::Error;
use uuid::Uuid;
use crate::models::{EntityId, SegmentKey};

/// Failure reported by a remote collaborator (page fetch or commit)
#[derive(Debug, Error)]
pub enum RemoteError {
    #[error("transport failure: {0}")]
    Transport(String),

    #[error("rejected by server: {0}")]
    Rejected(String),

    #[error("entity {0} not found on server")]
    NotFound(EntityId),
}

/// How a [`BoardError`] should be treated by the calling layer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// A caller broke a structural rule. This is a bug in the calling layer.
    InvariantViolation,
    /// A fetch or commit failed; state was left retryable or reconciled.
    TransientFetch,
    /// A page request was dropped because the segment is busy or exhausted.
    PagingRejected,
}

/// Errors raised by the board core
#[derive(Debug, Error)]
pub enum BoardError {
    #[error("entity {0} is not loaded on the board")]
    UnknownEntity(EntityId),

    #[error("segment {segment} has no position {from_index} (len {len})")]
    IndexOutOfRange {
        segment: SegmentKey,
        from_index: usize,
        len: usize,
    },

    #[error("a gated move is already awaiting confirmation (token {0})")]
    GateBusy(Uuid),

    #[error("no pending transition with token {0}")]
    UnknownGuardToken(Uuid),

    #[error("segment {0} is already loading a page")]
    AlreadyLoading(SegmentKey),

    #[error("segment {0} has no more pages")]
    Exhausted(SegmentKey),

    #[error("page completion for segment {0} has no matching request")]
    UnexpectedCompletion(SegmentKey),

    #[error("failed to fetch page {page} of segment {segment}")]
    Fetch {
        segment: SegmentKey,
        page: u32,
        #[source]
        source: RemoteError,
    },

    #[error("failed to commit order of segment {segment}")]
    CommitOrder {
        segment: SegmentKey,
        #[source]
        source: RemoteError,
    },

    #[error("failed to commit move of entity {entity_id} to {to_segment}")]
    CommitMove {
        entity_id: EntityId,
        to_segment: SegmentKey,
        #[source]
        source: RemoteError,
    },
}

impl BoardError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            BoardError::UnknownEntity(_)
            | BoardError::IndexOutOfRange { .. }
            | BoardError::GateBusy(_)
            | BoardError::UnknownGuardToken(_)
            | BoardError::UnexpectedCompletion(_) => ErrorKind::InvariantViolation,
            BoardError::AlreadyLoading(_) | BoardError::Exhausted(_) => ErrorKind::PagingRejected,
            BoardError::Fetch { .. }
            | BoardError::CommitOrder { .. }
            | BoardError::CommitMove { .. } => ErrorKind::TransientFetch,
        }
    }

    pub fn is_invariant_violation(&self) -> bool {
        self.kind() == ErrorKind::InvariantViolation
    }
}

pub type BoardResult<T> = std::result::Result<T, BoardError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn test_error_kinds() {
        assert_eq!(BoardError::UnknownEntity(EntityId::new("x")).kind(), ErrorKind::InvariantViolation);
        assert_eq!(BoardError::GateBusy(Uuid::nil()).kind(), ErrorKind::InvariantViolation);
        assert_eq!(BoardError::AlreadyLoading(SegmentKey::New).kind(), ErrorKind::PagingRejected);
        assert_eq!(BoardError::Exhausted(SegmentKey::New).kind(), ErrorKind::PagingRejected);

        let err = BoardError::Fetch {
            segment: SegmentKey::Won,
            page: 2,
            source: RemoteError::Transport("timeout".to_string()),
        };
        assert_eq!(err.kind(), ErrorKind::TransientFetch);
        assert_eq!(err.to_string(), "failed to fetch page 2 of segment won");
        assert_eq!(err.source().unwrap().to_string(), "transport failure: timeout");
    }
}
