use serde::Serialize;
use crate::board::{BoardError, BoardRemote, BoardResult, MoveCommit, SegmentPager, SegmentStore};
use crate::models::{EntityId, MoveIntent, SegmentKey, SideEffectData};

/// Lifecycle of a single move
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MoveState {
    /// Held by the transition guard (gated moves only)
    Proposed,
    OptimisticallyApplied,
    Committing,
    Committed,
    Failed,
    Reloading,
    Settled,
}

/// Outcome of a cross-segment move
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MoveReport {
    pub entity_id: EntityId,
    pub from_segment: SegmentKey,
    pub to_segment: SegmentKey,
    /// Index the entity was placed at in the destination
    pub index: usize,
    /// Every state the move passed through, in order
    pub states: Vec<MoveState>,
    /// Segments reloaded from page 1 after a failed commit
    pub reloaded: Vec<SegmentKey>,
    /// Segments whose reconciling reload itself failed
    pub reload_failed: Vec<SegmentKey>,
}

impl MoveReport {
    pub fn final_state(&self) -> MoveState {
        self.states.last().copied().unwrap_or(MoveState::Proposed)
    }

    pub fn committed(&self) -> bool {
        self.final_state() == MoveState::Committed
    }
}

/// Outcome of a reorder within one segment
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReorderReport {
    pub segment: SegmentKey,
    pub entity_id: EntityId,
    pub from_index: usize,
    pub to_index: usize,
    pub committed: bool,
}

/// Running counters of what the engine has done this session
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MutationStats {
    pub moves_committed: u64,
    pub moves_reconciled: u64,
    pub reorders_committed: u64,
    pub reorders_failed: u64,
}

/// Applies optimistic mutations to the store and reconciles them with the remote
#[derive(Debug, Clone, Default)]
pub struct MutationEngine {
    stats: MutationStats,
}

impl MutationEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stats(&self) -> MutationStats {
        self.stats
    }

    /// Reorder a segment locally, then commit its new id order.
    ///
    /// A failed commit is logged and left as is: the local order is cosmetic
    /// and the next reload of the segment restores server truth.
    pub fn reorder_within_segment<R: BoardRemote + ?Sized>(
        &mut self,
        store: &mut SegmentStore,
        remote: &mut R,
        segment: SegmentKey,
        from_index: usize,
        to_index: usize,
    ) -> BoardResult<ReorderReport> {
        let entity_id = store.reorder(segment, from_index, to_index)?;
        let to_index = to_index.min(store.len(segment).saturating_sub(1));
        let ordered_ids = store.ordered_ids(segment);

        let committed = match remote.commit_order(segment, &ordered_ids) {
            Ok(()) => {
                self.stats.reorders_committed += 1;
                true
            }
            Err(source) => {
                self.stats.reorders_failed += 1;
                let err = BoardError::CommitOrder { segment, source };
                log::warn!("{}: keeping local order", error_chain(&err));
                false
            }
        };

        Ok(ReorderReport {
            segment,
            entity_id,
            from_index,
            to_index,
            committed,
        })
    }

    /// Move an entity to another segment locally, then commit the move.
    ///
    /// On a failed commit both segments are reloaded from page 1 instead of
    /// inverting the move, since other operations may have landed in
    /// between. `was_gated` only affects the reported state trail.
    pub fn move_across_segments<R: BoardRemote + ?Sized>(
        &mut self,
        store: &mut SegmentStore,
        pager: &mut SegmentPager,
        remote: &mut R,
        intent: &MoveIntent,
        side_effect: Option<SideEffectData>,
        was_gated: bool,
    ) -> BoardResult<MoveReport> {
        let (from_segment, _) = store
            .locate(&intent.entity_id)
            .ok_or_else(|| BoardError::UnknownEntity(intent.entity_id.clone()))?;
        if from_segment != intent.from_segment {
            log::debug!(
                "entity {} is in {} not {}; moving from where it is",
                intent.entity_id, from_segment, intent.from_segment
            );
        }

        let mut states = Vec::with_capacity(6);
        if was_gated {
            states.push(MoveState::Proposed);
        }

        let index = store.move_entity(&intent.entity_id, intent.to_segment, intent.to_index)?;
        pager.note_moved(from_segment, intent.to_segment);
        states.push(MoveState::OptimisticallyApplied);

        let commit = MoveCommit {
            entity_id: intent.entity_id.clone(),
            to_segment: intent.to_segment,
            position: index,
            side_effect,
        };
        states.push(MoveState::Committing);

        let mut report = MoveReport {
            entity_id: intent.entity_id.clone(),
            from_segment,
            to_segment: intent.to_segment,
            index,
            states,
            reloaded: Vec::new(),
            reload_failed: Vec::new(),
        };

        match remote.commit_move(&commit) {
            Ok(()) => {
                self.stats.moves_committed += 1;
                report.states.push(MoveState::Committed);
                log::info!("entity {} moved {} -> {}", intent.entity_id, from_segment, intent.to_segment);
            }
            Err(source) => {
                self.stats.moves_reconciled += 1;
                let err = BoardError::CommitMove {
                    entity_id: intent.entity_id.clone(),
                    to_segment: intent.to_segment,
                    source,
                };
                log::warn!("{}: resyncing {} and {}", error_chain(&err), from_segment, intent.to_segment);
                report.states.push(MoveState::Failed);
                report.states.push(MoveState::Reloading);

                let mut affected = vec![from_segment];
                if intent.to_segment != from_segment {
                    affected.push(intent.to_segment);
                }
                for segment in affected {
                    pager.reset_segment(segment);
                    match pager.request_next_page(store, remote, segment) {
                        Ok(_) => report.reloaded.push(segment),
                        Err(err) => {
                            log::warn!("reload of {} failed: {}", segment, error_chain(&err));
                            report.reload_failed.push(segment);
                        }
                    }
                }
                report.states.push(MoveState::Settled);
            }
        }
        Ok(report)
    }
}

/// Render an error with its sources, outermost first
pub(crate) fn error_chain(err: &dyn std::error::Error) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::{PageQuery, PageResponse, RemoteError, UpsertMode};
    use crate::models::Entity;

    #[derive(Default)]
    struct ScriptedRemote {
        fail_commits: bool,
        fetches: Vec<PageQuery>,
        orders: Vec<(SegmentKey, Vec<EntityId>)>,
        moves: Vec<MoveCommit>,
    }

    impl BoardRemote for ScriptedRemote {
        fn fetch_segment_page(&mut self, query: &PageQuery) -> Result<PageResponse, RemoteError> {
            self.fetches.push(query.clone());
            Ok(PageResponse {
                entities: vec![Entity::new(format!("{}-fresh", query.segment).as_str(), query.segment, 0)],
                total: 1,
            })
        }

        fn commit_order(&mut self, segment: SegmentKey, ordered_ids: &[EntityId]) -> Result<(), RemoteError> {
            self.orders.push((segment, ordered_ids.to_vec()));
            if self.fail_commits {
                return Err(RemoteError::Transport("down".to_string()));
            }
            Ok(())
        }

        fn commit_move(&mut self, commit: &MoveCommit) -> Result<(), RemoteError> {
            self.moves.push(commit.clone());
            if self.fail_commits {
                return Err(RemoteError::Rejected("conflict".to_string()));
            }
            Ok(())
        }
    }

    fn seeded_store() -> SegmentStore {
        let mut store = SegmentStore::new();
        store.upsert_entities(
            SegmentKey::Qualifying,
            vec![Entity::new("a", SegmentKey::Qualifying, 0), Entity::new("x", SegmentKey::Qualifying, 1)],
            UpsertMode::Replace,
        );
        store.upsert_entities(SegmentKey::InProgress, vec![Entity::new("b", SegmentKey::InProgress, 0)], UpsertMode::Replace);
        store
    }

    #[test]
    fn test_reorder_commits_new_order() {
        let mut store = seeded_store();
        let mut remote = ScriptedRemote::default();
        let mut engine = MutationEngine::new();

        let report = engine.reorder_within_segment(&mut store, &mut remote, SegmentKey::Qualifying, 1, 0).unwrap();

        assert!(report.committed);
        assert_eq!(report.entity_id.as_str(), "x");
        assert_eq!(remote.orders, vec![(SegmentKey::Qualifying, vec![EntityId::new("x"), EntityId::new("a")])]);
        assert_eq!(engine.stats().reorders_committed, 1);
    }

    #[test]
    fn test_reorder_failure_keeps_local_order() {
        let mut store = seeded_store();
        let mut remote = ScriptedRemote { fail_commits: true, ..Default::default() };
        let mut engine = MutationEngine::new();

        let report = engine.reorder_within_segment(&mut store, &mut remote, SegmentKey::Qualifying, 1, 0).unwrap();

        assert!(!report.committed);
        assert_eq!(store.ordered_ids(SegmentKey::Qualifying), vec![EntityId::new("x"), EntityId::new("a")]);
        assert!(remote.fetches.is_empty());
    }

    #[test]
    fn test_move_commit_success() {
        let mut store = seeded_store();
        let mut pager = SegmentPager::new(20);
        let mut remote = ScriptedRemote::default();
        let mut engine = MutationEngine::new();
        let intent = MoveIntent::new("x", SegmentKey::Qualifying, SegmentKey::InProgress, 0);

        let report = engine
            .move_across_segments(&mut store, &mut pager, &mut remote, &intent, None, false)
            .unwrap();

        assert!(report.committed());
        assert_eq!(
            report.states,
            vec![MoveState::OptimisticallyApplied, MoveState::Committing, MoveState::Committed]
        );
        assert_eq!(remote.moves.len(), 1);
        assert_eq!(remote.moves[0].position, 0);
        assert_eq!(store.locate(&EntityId::new("x")), Some((SegmentKey::InProgress, 0)));
    }

    #[test]
    fn test_move_failure_reloads_both_segments() {
        let mut store = seeded_store();
        let mut pager = SegmentPager::new(20);
        let mut remote = ScriptedRemote { fail_commits: true, ..Default::default() };
        let mut engine = MutationEngine::new();
        let intent = MoveIntent::new("x", SegmentKey::Qualifying, SegmentKey::InProgress, 0);

        let report = engine
            .move_across_segments(&mut store, &mut pager, &mut remote, &intent, None, true)
            .unwrap();

        assert_eq!(
            report.states,
            vec![
                MoveState::Proposed,
                MoveState::OptimisticallyApplied,
                MoveState::Committing,
                MoveState::Failed,
                MoveState::Reloading,
                MoveState::Settled,
            ]
        );
        assert_eq!(report.reloaded, vec![SegmentKey::Qualifying, SegmentKey::InProgress]);
        let pages: Vec<(SegmentKey, u32)> = remote.fetches.iter().map(|q| (q.segment, q.page)).collect();
        assert_eq!(pages, vec![(SegmentKey::Qualifying, 1), (SegmentKey::InProgress, 1)]);
        // Server truth replaced the optimistic state
        assert_eq!(store.ordered_ids(SegmentKey::InProgress), vec![EntityId::new("in_progress-fresh")]);
        assert!(store.locate(&EntityId::new("x")).is_none());
        assert_eq!(engine.stats().moves_reconciled, 1);
    }

    #[test]
    fn test_move_unknown_entity() {
        let mut store = seeded_store();
        let mut pager = SegmentPager::new(20);
        let mut remote = ScriptedRemote::default();
        let mut engine = MutationEngine::new();
        let intent = MoveIntent::new("ghost", SegmentKey::New, SegmentKey::Won, 0);

        let err = engine
            .move_across_segments(&mut store, &mut pager, &mut remote, &intent, None, false)
            .unwrap_err();
        assert!(matches!(err, BoardError::UnknownEntity(_)));
        assert!(remote.moves.is_empty());
    }
}
