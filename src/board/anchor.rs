use std::collections::HashMap;
use crate::models::SegmentKey;

/// The rendering layer's scroll containers, one per segment column
pub trait ScrollHost {
    /// Current scroll offset of the segment's container, `None` when it is not mounted
    fn scroll_offset(&self, segment: SegmentKey) -> Option<f64>;

    /// Set the container's scroll offset. Returns false when it is not mounted.
    fn set_scroll_offset(&mut self, segment: SegmentKey, offset: f64) -> bool;
}

/// A host with no mounted containers (headless use, CLI)
#[derive(Debug, Clone, Copy, Default)]
pub struct Detached;

impl ScrollHost for Detached {
    fn scroll_offset(&self, _segment: SegmentKey) -> Option<f64> {
        None
    }

    fn set_scroll_offset(&mut self, _segment: SegmentKey, _offset: f64) -> bool {
        false
    }
}

/// When a restore is re-applied after the immediate attempt
#[derive(Debug, Clone, PartialEq)]
pub struct RestoreSchedule {
    /// Number of upcoming paints to re-apply on
    pub frames: u32,
    /// Delays (ms after the append landed) to re-apply at
    pub delays_ms: Vec<u64>,
}

impl Default for RestoreSchedule {
    fn default() -> Self {
        Self {
            frames: 2,
            delays_ms: vec![0, 16, 50, 100],
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
struct PendingRestore {
    target: f64,
    frames_left: u32,
    deadlines_ms: Vec<u64>,
}

impl PendingRestore {
    fn is_done(&self) -> bool {
        self.frames_left == 0 && self.deadlines_ms.is_empty()
    }
}

/// Keeps a column's viewport steady while a page is appended below it.
///
/// The offset is captured before the fetch and restored (plus a small bias
/// that reveals the first new item) once the page has landed. Layout timing
/// is not deterministic, so the same target is re-applied on the next few
/// paints and after short delays; every application is idempotent.
#[derive(Debug, Clone)]
pub struct ScrollAnchorController {
    bias_px: f64,
    schedule: RestoreSchedule,
    captured: HashMap<SegmentKey, f64>,
    pending: HashMap<SegmentKey, PendingRestore>,
}

impl ScrollAnchorController {
    pub fn new(bias_px: f64, schedule: RestoreSchedule) -> Self {
        Self {
            bias_px,
            schedule,
            captured: HashMap::new(),
            pending: HashMap::new(),
        }
    }

    /// Record the segment's offset right before an append-triggered fetch
    pub fn capture_offset(&mut self, host: &dyn ScrollHost, segment: SegmentKey) -> Option<f64> {
        match host.scroll_offset(segment) {
            Some(offset) => {
                self.captured.insert(segment, offset);
                Some(offset)
            }
            None => {
                self.captured.remove(&segment);
                None
            }
        }
    }

    /// Restore the captured offset after `appended_count` items landed.
    ///
    /// Applies immediately and schedules the follow-up attempts. Nothing is
    /// restored when no items were appended, when the column was at the top,
    /// or when the container is no longer mounted. Returns the target offset
    /// when a restore was started.
    pub fn restore_offset(
        &mut self,
        host: &mut dyn ScrollHost,
        segment: SegmentKey,
        appended_count: usize,
        now_ms: u64,
    ) -> Option<f64> {
        let saved = self.captured.remove(&segment)?;
        if appended_count == 0 || saved <= 0.0 {
            return None;
        }

        let target = saved + self.bias_px;
        if !host.set_scroll_offset(segment, target) {
            log::debug!("scroll restore for {} skipped: container not mounted", segment);
            self.pending.remove(&segment);
            return None;
        }

        let restore = PendingRestore {
            target,
            frames_left: self.schedule.frames,
            deadlines_ms: self.schedule.delays_ms.iter().map(|d| now_ms + d).collect(),
        };
        if restore.is_done() {
            self.pending.remove(&segment);
        } else {
            self.pending.insert(segment, restore);
        }
        Some(target)
    }

    /// Re-apply pending restores after a paint
    pub fn on_frame(&mut self, host: &mut dyn ScrollHost) {
        self.pending.retain(|segment, restore| {
            if restore.frames_left == 0 {
                return !restore.is_done();
            }
            restore.frames_left -= 1;
            if !host.set_scroll_offset(*segment, restore.target) {
                return false;
            }
            !restore.is_done()
        });
    }

    /// Re-apply pending restores whose delay has elapsed
    pub fn on_tick(&mut self, host: &mut dyn ScrollHost, now_ms: u64) {
        self.pending.retain(|segment, restore| {
            let before = restore.deadlines_ms.len();
            restore.deadlines_ms.retain(|deadline| *deadline > now_ms);
            if restore.deadlines_ms.len() != before && !host.set_scroll_offset(*segment, restore.target) {
                return false;
            }
            !restore.is_done()
        });
    }

    /// Forget any captured or pending offset for a segment (e.g. after a reset)
    pub fn discard(&mut self, segment: SegmentKey) {
        self.captured.remove(&segment);
        self.pending.remove(&segment);
    }

    pub fn is_restoring(&self, segment: SegmentKey) -> bool {
        self.pending.contains_key(&segment)
    }
}
