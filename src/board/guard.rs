use std::collections::BTreeSet;
use serde::Serialize;
use uuid::Uuid;
use crate::board::{BoardError, BoardResult, ConfirmationRequest};
use crate::models::{ConfirmationOutcome, MoveIntent, SegmentKey, SideEffectData};

/// A gated move waiting for its confirmation step
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PendingTransition {
    pub guard_token: Uuid,
    pub intent: MoveIntent,
}

/// What the guard decided about a proposed move
#[derive(Debug, Clone, PartialEq)]
pub enum Proposal {
    /// Not gated: apply right away
    Forward(MoveIntent),
    /// Gated: nothing is applied until the confirmation resolves
    Suspended(ConfirmationRequest),
}

/// How a pending transition ended
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    Approved {
        intent: MoveIntent,
        side_effect: Option<SideEffectData>,
    },
    Cancelled {
        intent: MoveIntent,
    },
}

/// Gate for moves into segments that need a confirmation step first.
///
/// At most one gated move may be outstanding; a second one is rejected
/// rather than queued so two confirmation dialogs never compete.
#[derive(Debug, Clone, PartialEq)]
pub struct TransitionGuard {
    gated: BTreeSet<SegmentKey>,
    pending: Option<PendingTransition>,
}

impl TransitionGuard {
    pub fn new(gated: impl IntoIterator<Item = SegmentKey>) -> Self {
        Self {
            gated: gated.into_iter().collect(),
            pending: None,
        }
    }

    pub fn is_gated(&self, segment: SegmentKey) -> bool {
        self.gated.contains(&segment)
    }

    pub fn pending(&self) -> Option<&PendingTransition> {
        self.pending.as_ref()
    }

    /// Route a proposed move: forward it, or suspend it behind a confirmation
    pub fn propose(&mut self, intent: MoveIntent) -> BoardResult<Proposal> {
        if !self.is_gated(intent.to_segment) {
            return Ok(Proposal::Forward(intent));
        }
        if let Some(pending) = &self.pending {
            return Err(BoardError::GateBusy(pending.guard_token));
        }

        let guard_token = Uuid::new_v4();
        log::debug!(
            "move of {} into {} suspended behind confirmation {}",
            intent.entity_id, intent.to_segment, guard_token
        );
        self.pending = Some(PendingTransition {
            guard_token,
            intent: intent.clone(),
        });
        Ok(Proposal::Suspended(ConfirmationRequest { guard_token, intent }))
    }

    /// End the pending transition identified by `guard_token`.
    ///
    /// The transition is destroyed either way; only an approval hands the
    /// intent (with any captured data) back for applying.
    pub fn resolve(
        &mut self,
        guard_token: Uuid,
        outcome: ConfirmationOutcome,
        side_effect: Option<SideEffectData>,
    ) -> BoardResult<Resolution> {
        let pending = match self.pending.take() {
            Some(pending) if pending.guard_token == guard_token => pending,
            other => {
                self.pending = other;
                return Err(BoardError::UnknownGuardToken(guard_token));
            }
        };

        log::debug!("confirmation {} resolved: {}", guard_token, outcome.as_str());
        Ok(match outcome {
            ConfirmationOutcome::Approved => Resolution::Approved {
                intent: pending.intent,
                side_effect: side_effect.filter(|data| !data.is_empty()),
            },
            ConfirmationOutcome::Cancelled => Resolution::Cancelled { intent: pending.intent },
        })
    }
}
