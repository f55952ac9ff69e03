use serde::Serialize;
use uuid::Uuid;
use crate::board::mutation::error_chain;
use crate::board::{
    BoardError, BoardRemote, BoardResult, Confirmation, ConfirmationRequest, Confirmer, MoveReport,
    MutationEngine, MutationStats, PageRequest, PageResponse, PageResult, PendingTransition, Proposal,
    RemoteError, ReorderReport, Resolution, RestoreSchedule, ScrollAnchorController, ScrollHost,
    SearchDebouncer, SegmentPageState, SegmentPager, SegmentStore, TransitionGuard,
};
use crate::models::{ConfirmationOutcome, Entity, EntityId, MoveIntent, SegmentKey, SideEffectData};

/// Tunables of a board session
#[derive(Debug, Clone, PartialEq)]
pub struct BoardConfig {
    pub page_size: u32,
    /// Extra offset added on scroll restore so the first new item peeks in
    pub scroll_bias_px: f64,
    pub search_quiet_ms: u64,
    /// Segments whose incoming moves need a confirmation step
    pub gated: Vec<SegmentKey>,
    pub restore: RestoreSchedule,
}

impl Default for BoardConfig {
    fn default() -> Self {
        Self {
            page_size: 20,
            scroll_bias_px: 80.0,
            search_quiet_ms: 300,
            gated: vec![SegmentKey::Won, SegmentKey::Lost],
            restore: RestoreSchedule::default(),
        }
    }
}

/// What a drag-end (or a resolved confirmation) did
#[derive(Debug, Clone, PartialEq)]
pub enum DragOutcome {
    /// Dropped where it started
    Ignored,
    Reordered(ReorderReport),
    Moved(MoveReport),
    /// Gated: nothing applied yet, the confirmation collaborator must run
    AwaitingConfirmation(ConfirmationRequest),
    /// The confirmation was declined; the board is as before the drag
    Cancelled(MoveIntent),
}

/// Result of loading page 1 of several segments
#[derive(Debug, Default)]
pub struct LoadReport {
    pub loaded: Vec<PageResult>,
    pub failed: Vec<(SegmentKey, BoardError)>,
}

impl LoadReport {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Snapshot of one column for rendering
#[derive(Debug, Clone, Serialize)]
pub struct SegmentSnapshot<'a> {
    pub segment: SegmentKey,
    pub entities: &'a [Entity],
    #[serde(flatten)]
    pub paging: &'a SegmentPageState,
}

/// A lead pipeline board session.
///
/// Owns the loaded collection and routes every operation through the
/// components that guard it: paging through [`SegmentPager`], moves through
/// [`TransitionGuard`] then [`MutationEngine`], scroll growth through
/// [`ScrollAnchorController`], search through [`SearchDebouncer`].
pub struct Board<R: BoardRemote> {
    config: BoardConfig,
    remote: R,
    store: SegmentStore,
    pager: SegmentPager,
    anchor: ScrollAnchorController,
    guard: TransitionGuard,
    engine: MutationEngine,
    debouncer: SearchDebouncer,
}

impl<R: BoardRemote> Board<R> {
    pub fn new(config: BoardConfig, remote: R) -> Self {
        Self {
            store: SegmentStore::new(),
            pager: SegmentPager::new(config.page_size),
            anchor: ScrollAnchorController::new(config.scroll_bias_px, config.restore.clone()),
            guard: TransitionGuard::new(config.gated.iter().copied()),
            engine: MutationEngine::new(),
            debouncer: SearchDebouncer::new(config.search_quiet_ms),
            config,
            remote,
        }
    }

    pub fn config(&self) -> &BoardConfig {
        &self.config
    }

    pub fn remote(&self) -> &R {
        &self.remote
    }

    pub fn remote_mut(&mut self) -> &mut R {
        &mut self.remote
    }

    pub fn store(&self) -> &SegmentStore {
        &self.store
    }

    pub fn pager(&self) -> &SegmentPager {
        &self.pager
    }

    pub fn stats(&self) -> MutationStats {
        self.engine.stats()
    }

    /// (Re)load page 1 of every segment.
    ///
    /// All segments are reset and admitted first so their fetches are in
    /// flight together; failures are collected per segment.
    pub fn load_all(&mut self) -> LoadReport {
        let mut requests = Vec::with_capacity(SegmentKey::ALL.len());
        for segment in SegmentKey::ALL {
            self.pager.reset_segment(segment);
            self.anchor.discard(segment);
            match self.pager.begin(segment) {
                Ok(request) => requests.push(request),
                Err(err) => log::warn!("could not start load of {}: {}", segment, err),
            }
        }

        let mut report = LoadReport::default();
        for request in requests {
            let segment = request.segment();
            let response = self.remote.fetch_segment_page(&request.query);
            match self.pager.complete(&mut self.store, request, response) {
                Ok(Some(result)) => report.loaded.push(result),
                Ok(None) => {}
                Err(err) => {
                    log::warn!("initial load of {} failed: {}", segment, error_chain(&err));
                    report.failed.push((segment, err));
                }
            }
        }
        report
    }

    /// Admit the next page of a segment without fetching it.
    /// The caller fetches `request.query` and hands the response to [`Board::complete_page`].
    pub fn begin_page(&mut self, segment: SegmentKey) -> BoardResult<PageRequest> {
        self.pager.begin(segment)
    }

    pub fn complete_page(
        &mut self,
        request: PageRequest,
        response: Result<PageResponse, RemoteError>,
    ) -> BoardResult<Option<PageResult>> {
        self.pager.complete(&mut self.store, request, response)
    }

    /// Fetch the next page of a segment and append it
    pub fn request_next_page(&mut self, segment: SegmentKey) -> BoardResult<Option<PageResult>> {
        self.pager.request_next_page(&mut self.store, &mut self.remote, segment)
    }

    /// Scroll-triggered growth of a column with its viewport held in place
    pub fn load_more(
        &mut self,
        segment: SegmentKey,
        host: &mut dyn ScrollHost,
        now_ms: u64,
    ) -> BoardResult<Option<PageResult>> {
        let request = self.pager.begin(segment)?;
        self.anchor.capture_offset(host, segment);
        let response = self.remote.fetch_segment_page(&request.query);
        match self.pager.complete(&mut self.store, request, response) {
            Ok(Some(result)) => {
                self.anchor.restore_offset(host, segment, result.appended, now_ms);
                Ok(Some(result))
            }
            other => {
                self.anchor.discard(segment);
                other
            }
        }
    }

    /// Handle the end of a drag.
    ///
    /// Drops inside the origin segment reorder it; drops elsewhere go through
    /// the transition guard and either apply at once or wait for confirmation.
    pub fn drag_end(&mut self, intent: MoveIntent) -> BoardResult<DragOutcome> {
        let (current, from_index) = self
            .store
            .locate(&intent.entity_id)
            .ok_or_else(|| BoardError::UnknownEntity(intent.entity_id.clone()))?;

        if current == intent.to_segment {
            if from_index == intent.to_index {
                return Ok(DragOutcome::Ignored);
            }
            let report = self.engine.reorder_within_segment(
                &mut self.store,
                &mut self.remote,
                current,
                from_index,
                intent.to_index,
            )?;
            return Ok(DragOutcome::Reordered(report));
        }

        match self.guard.propose(intent)? {
            Proposal::Forward(intent) => {
                let report = self.engine.move_across_segments(
                    &mut self.store,
                    &mut self.pager,
                    &mut self.remote,
                    &intent,
                    None,
                    false,
                )?;
                Ok(DragOutcome::Moved(report))
            }
            Proposal::Suspended(request) => Ok(DragOutcome::AwaitingConfirmation(request)),
        }
    }

    /// Handle a drag and, if it is gated, run `confirmer` right away.
    /// A confirmer that errors counts as a declined confirmation.
    pub fn drag_end_with(&mut self, intent: MoveIntent, confirmer: &mut dyn Confirmer) -> BoardResult<DragOutcome> {
        let request = match self.drag_end(intent)? {
            DragOutcome::AwaitingConfirmation(request) => request,
            outcome => return Ok(outcome),
        };

        let confirmation = confirmer.request_confirmation(&request).unwrap_or_else(|err| {
            log::warn!("confirmation for {} failed: {:#}", request.intent.entity_id, err);
            Confirmation::cancelled()
        });
        self.resolve(request.guard_token, confirmation.outcome, confirmation.side_effect)
    }

    /// Resolve the pending gated move
    pub fn resolve(
        &mut self,
        guard_token: Uuid,
        outcome: ConfirmationOutcome,
        side_effect: Option<SideEffectData>,
    ) -> BoardResult<DragOutcome> {
        match self.guard.resolve(guard_token, outcome, side_effect)? {
            Resolution::Approved { intent, side_effect } => {
                let report = self.engine.move_across_segments(
                    &mut self.store,
                    &mut self.pager,
                    &mut self.remote,
                    &intent,
                    side_effect,
                    true,
                )?;
                Ok(DragOutcome::Moved(report))
            }
            Resolution::Cancelled { intent } => Ok(DragOutcome::Cancelled(intent)),
        }
    }

    pub fn reorder_within_segment(&mut self, segment: SegmentKey, from_index: usize, to_index: usize) -> BoardResult<ReorderReport> {
        self.engine
            .reorder_within_segment(&mut self.store, &mut self.remote, segment, from_index, to_index)
    }

    /// Apply an external delete notification
    pub fn remove_entity(&mut self, id: &EntityId) -> Option<Entity> {
        let (segment, _) = self.store.locate(id)?;
        let removed = self.store.remove_entity(id)?;
        self.pager.note_removed(segment);
        Some(removed)
    }

    /// Apply a new filter query at once: every segment restarts at page 1
    pub fn set_filter_query(&mut self, query: &str) -> LoadReport {
        self.debouncer.force(query);
        self.apply_filter(query)
    }

    /// Feed raw search-box input; it is applied by [`Board::tick`] once settled
    pub fn search_input(&mut self, raw: &str, now_ms: u64) {
        self.debouncer.input(raw, now_ms);
    }

    /// Advance timers: delayed scroll restores and the search debouncer.
    /// Returns the reload report when a settled search was applied.
    pub fn tick(&mut self, host: &mut dyn ScrollHost, now_ms: u64) -> Option<LoadReport> {
        self.anchor.on_tick(host, now_ms);
        let query = self.debouncer.poll(now_ms)?;
        Some(self.apply_filter(&query))
    }

    /// Re-apply pending scroll restores after a paint
    pub fn on_frame(&mut self, host: &mut dyn ScrollHost) {
        self.anchor.on_frame(host);
    }

    pub fn segment_view(&self, segment: SegmentKey) -> &[Entity] {
        self.store.segment_view(segment)
    }

    pub fn segment_state(&self, segment: SegmentKey) -> &SegmentPageState {
        self.pager.state(segment)
    }

    pub fn snapshot(&self, segment: SegmentKey) -> SegmentSnapshot<'_> {
        SegmentSnapshot {
            segment,
            entities: self.store.segment_view(segment),
            paging: self.pager.state(segment),
        }
    }

    pub fn pending_transition(&self) -> Option<&PendingTransition> {
        self.guard.pending()
    }

    pub fn is_gated(&self, segment: SegmentKey) -> bool {
        self.guard.is_gated(segment)
    }

    fn apply_filter(&mut self, query: &str) -> LoadReport {
        log::debug!("filter changed to {:?}; reloading every segment", query);
        self.pager.set_filter_query(Some(query.to_string()));
        self.load_all()
    }
}
