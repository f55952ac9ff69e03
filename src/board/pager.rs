use std::collections::BTreeMap;
use serde::Serialize;
use crate::board::{BoardError, BoardRemote, BoardResult, PageQuery, PageResponse, RemoteError, SegmentStore, UpsertMode};
use crate::models::SegmentKey;

/// Paging counters of one segment
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SegmentPageState {
    /// Server-reported count of entities in the segment
    pub known_total: u64,
    pub loaded_page_count: u32,
    pub is_loading_more: bool,
    pub is_exhausted: bool,
    /// Bumped by every reset; completions from an older generation are stale
    #[serde(skip)]
    generation: u64,
    /// Net loaded entities that left the segment since the last page landed.
    /// Server offsets behind the paging frontier shift by this much.
    #[serde(skip)]
    departed: i64,
}

/// A page fetch that has been admitted and is now in flight
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRequest {
    pub query: PageQuery,
    generation: u64,
    departed: i64,
    reseed: bool,
}

impl PageRequest {
    pub fn segment(&self) -> SegmentKey {
        self.query.segment
    }

    pub fn page(&self) -> u32 {
        self.query.page
    }
}

/// What a completed page fetch did to the board
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PageResult {
    pub segment: SegmentKey,
    pub page: u32,
    /// Entities newly added to the segment by this page
    pub appended: usize,
    pub known_total: u64,
    pub is_exhausted: bool,
}

/// Per-segment paging state machine.
///
/// Page requests for one segment are serialized by `is_loading_more`: a
/// second request while one is in flight is rejected, not queued. Requests
/// for different segments are independent and may complete in any order.
#[derive(Debug, Clone, PartialEq)]
pub struct SegmentPager {
    page_size: u32,
    filter_query: Option<String>,
    states: BTreeMap<SegmentKey, SegmentPageState>,
}

impl SegmentPager {
    pub fn new(page_size: u32) -> Self {
        let states = SegmentKey::ALL.iter().map(|key| (*key, SegmentPageState::default())).collect();
        Self {
            page_size: page_size.max(1),
            filter_query: None,
            states,
        }
    }

    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    pub fn filter_query(&self) -> Option<&str> {
        self.filter_query.as_deref()
    }

    /// Set the filter sent with every subsequent page query.
    /// Callers are expected to reset every segment afterwards.
    pub fn set_filter_query(&mut self, query: Option<String>) {
        self.filter_query = query.filter(|q| !q.trim().is_empty());
    }

    pub fn state(&self, segment: SegmentKey) -> &SegmentPageState {
        // Every key is seeded in new(); the fallback only guards against misuse
        static EMPTY: SegmentPageState = SegmentPageState {
            known_total: 0,
            loaded_page_count: 0,
            is_loading_more: false,
            is_exhausted: false,
            generation: 0,
            departed: 0,
        };
        self.states.get(&segment).unwrap_or(&EMPTY)
    }

    /// Admit the next page request for a segment.
    ///
    /// Rejected without side effects when the segment is already loading or
    /// exhausted. On success the segment is marked as loading until
    /// [`SegmentPager::complete`] is called with the returned request.
    pub fn begin(&mut self, segment: SegmentKey) -> BoardResult<PageRequest> {
        let page_size = self.page_size;
        let filter_query = self.filter_query.clone();
        let state = self.state_mut(segment);
        if state.is_loading_more {
            log::debug!("page request for {} dropped: already loading", segment);
            return Err(BoardError::AlreadyLoading(segment));
        }
        if state.is_exhausted {
            log::debug!("page request for {} dropped: exhausted", segment);
            return Err(BoardError::Exhausted(segment));
        }

        state.is_loading_more = true;
        let request = PageRequest {
            query: PageQuery {
                segment,
                page: next_page(state, page_size),
                page_size,
                filter_query,
            },
            generation: state.generation,
            departed: state.departed,
            reseed: state.loaded_page_count == 0,
        };
        log::debug!("page {} of {} requested", request.page(), segment);
        Ok(request)
    }

    /// Land the outcome of an admitted page request.
    ///
    /// The first page after a reset reseeds the segment, later pages append.
    /// A failure clears the
    /// loading flag and leaves the page counters untouched so the next
    /// trigger retries the same page. Returns `Ok(None)` when the segment was
    /// reset after the request was issued; such a response is dropped.
    pub fn complete(
        &mut self,
        store: &mut SegmentStore,
        request: PageRequest,
        response: Result<PageResponse, RemoteError>,
    ) -> BoardResult<Option<PageResult>> {
        let segment = request.segment();
        let page = request.page();
        let state = self.state_mut(segment);

        if request.generation != state.generation {
            log::debug!("discarding stale page {} of {}", page, segment);
            return Ok(None);
        }
        if !state.is_loading_more {
            return Err(BoardError::UnexpectedCompletion(segment));
        }
        state.is_loading_more = false;

        let response = match response {
            Ok(response) => response,
            Err(source) => {
                log::warn!("page {} of {} failed: {}", page, segment, source);
                return Err(BoardError::Fetch { segment, page, source });
            }
        };

        let mode = if request.reseed { UpsertMode::Replace } else { UpsertMode::Append };
        let received = response.entities.len();
        let upserted = store.upsert_entities(segment, response.entities, mode);
        let appended = upserted.added;
        for origin in upserted.rehomed_from {
            self.note_removed(origin);
        }

        let loaded = store.len(segment) as u64;
        let state = self.state_mut(segment);
        state.loaded_page_count = page;
        state.known_total = response.total;
        // The landed page is measured against current server offsets
        state.departed -= request.departed;
        // An empty page means the server has nothing further regardless of its count
        state.is_exhausted = loaded >= state.known_total || received == 0;

        log::debug!(
            "page {} of {} landed: {} new, {}/{} loaded",
            page, segment, appended, loaded, state.known_total
        );
        Ok(Some(PageResult {
            segment,
            page,
            appended,
            known_total: state.known_total,
            is_exhausted: state.is_exhausted,
        }))
    }

    /// Admit, fetch and land the next page of a segment in one call
    pub fn request_next_page<R: BoardRemote + ?Sized>(
        &mut self,
        store: &mut SegmentStore,
        remote: &mut R,
        segment: SegmentKey,
    ) -> BoardResult<Option<PageResult>> {
        let request = self.begin(segment)?;
        let response = remote.fetch_segment_page(&request.query);
        self.complete(store, request, response)
    }

    /// Clear all paging counters so the segment restarts at page 1.
    /// Any request still in flight for the segment becomes stale.
    pub fn reset_segment(&mut self, segment: SegmentKey) {
        let state = self.state_mut(segment);
        let generation = state.generation + 1;
        *state = SegmentPageState {
            generation,
            ..SegmentPageState::default()
        };
        log::debug!("paging reset for {}", segment);
    }

    /// Keep known totals in step with an optimistic cross-segment move
    pub fn note_moved(&mut self, from: SegmentKey, to: SegmentKey) {
        if from == to {
            return;
        }
        self.note_removed(from);
        let dest = self.state_mut(to);
        dest.known_total += 1;
        dest.departed -= 1;
    }

    /// Keep the known total in step with a loaded entity leaving the segment
    pub fn note_removed(&mut self, segment: SegmentKey) {
        let state = self.state_mut(segment);
        state.known_total = state.known_total.saturating_sub(1);
        state.departed += 1;
    }

    fn state_mut(&mut self, segment: SegmentKey) -> &mut SegmentPageState {
        self.states.entry(segment).or_default()
    }
}

/// Page holding the first entity past the loaded frontier.
///
/// Entities that left the segment pull later server offsets back, so the
/// request steps back one page per `page_size` departures. The overlap is
/// absorbed by id dedupe in the store.
fn next_page(state: &SegmentPageState, page_size: u32) -> u32 {
    if state.loaded_page_count == 0 {
        return 1;
    }
    let size = i64::from(page_size);
    let rewind = (state.departed.max(0) + size - 1) / size;
    let page = i64::from(state.loaded_page_count) + 1 - rewind;
    page.clamp(1, i64::from(state.loaded_page_count) + 1) as u32
}
