// Cursor - per-view position, slot navigation and accelerating vertical motion

use crate::sheet::column::ColumnId;
use crate::sheet::pattern::Pattern;
use crate::sheet::trigger_row::{SlotTarget, TriggerRow};
use crate::sheet::tstamp::Tstamp;
use crate::sheet::COLUMNS_MAX;
use serde::{Deserialize, Serialize};

/// Motion tuning, in pixels per tick
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CursorMotion {
    pub init_speed: f64,
    pub accel: f64,
    pub max_speed: f64,
    /// Ticks to linger on the first snapped row; shrinks by one per snap
    pub init_trigger_delay: u32,
    pub page_beats: i64,
}

impl Default for CursorMotion {
    fn default() -> Self {
        Self {
            init_speed: 1.0,
            accel: 1.18,
            max_speed: 12.0,
            init_trigger_delay: 6,
            page_beats: 4,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Up,
    Down,
}

impl Direction {
    fn sign(self) -> i64 {
        match self {
            Direction::Up => -1,
            Direction::Down => 1,
        }
    }
}

/// Horizontal motion that left the current column
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgeSignal {
    /// Moved left past the type head of the first trigger
    Underflow,
    /// Moved right past the end slot
    Overflow,
}

/// Cursor state of one sheet view
///
/// The cursor refers to its column by id; the pattern is passed to every
/// operation that needs it, and `revalidate` re-seats the cursor after the
/// pattern has changed structurally.
#[derive(Debug, Clone)]
pub struct Cursor {
    column: ColumnId,
    ts: Tstamp,
    pix_pos: f64,
    slot: usize,
    insert: bool,
    edit: bool,
    row_view_start: f64,

    direction: Option<Direction>,
    cur_speed: f64,
    snap_delay: u32,
    cur_trigger_delay: u32,

    motion: CursorMotion,
    px_per_beat: f64,
}

impl Cursor {
    pub fn new(motion: CursorMotion, px_per_beat: f64) -> Self {
        Self {
            column: ColumnId::Channel(0),
            ts: Tstamp::ZERO,
            pix_pos: 0.0,
            slot: 0,
            insert: false,
            edit: false,
            row_view_start: 0.0,
            direction: None,
            cur_speed: 0.0,
            snap_delay: 0,
            cur_trigger_delay: motion.init_trigger_delay,
            motion,
            px_per_beat: px_per_beat.max(f64::MIN_POSITIVE),
        }
    }

    pub fn column(&self) -> ColumnId {
        self.column
    }

    pub fn ts(&self) -> Tstamp {
        self.ts
    }

    pub fn pix_pos(&self) -> f64 {
        self.pix_pos
    }

    /// Raw slot index; may be `usize::MAX` meaning the rightmost slot
    pub fn slot_index(&self) -> usize {
        self.slot
    }

    pub fn is_insert(&self) -> bool {
        self.insert
    }

    pub fn is_edit(&self) -> bool {
        self.edit
    }

    pub fn row_view_start(&self) -> f64 {
        self.row_view_start
    }

    pub fn px_per_beat(&self) -> f64 {
        self.px_per_beat
    }

    pub fn motion(&self) -> &CursorMotion {
        &self.motion
    }

    pub fn set_motion(&mut self, motion: CursorMotion) {
        self.motion = motion;
        self.stop();
    }

    pub fn set_px_per_beat(&mut self, px_per_beat: f64) {
        self.px_per_beat = px_per_beat.max(f64::MIN_POSITIVE);
        self.sync_pix_pos();
    }

    pub(crate) fn set_edit(&mut self, edit: bool) {
        self.edit = edit;
    }

    pub fn toggle_insert(&mut self) {
        self.insert = !self.insert;
    }

    pub fn clear_insert(&mut self) {
        self.insert = false;
    }

    fn sync_pix_pos(&mut self) {
        self.pix_pos = self.ts.as_f64() * self.px_per_beat;
    }

    fn set_ts(&mut self, pattern: &Pattern, ts: Tstamp) {
        let ts = ts.clamp(Tstamp::ZERO, pattern.length());
        if ts != self.ts {
            self.row_view_start = 0.0;
        }
        self.ts = ts;
        self.sync_pix_pos();
    }

    /// Jump to a position, cancelling any ongoing motion
    pub fn set_position(&mut self, pattern: &Pattern, column: ColumnId, ts: Tstamp) {
        self.stop();
        self.set_column(column);
        self.set_ts(pattern, ts);
    }

    pub fn set_column(&mut self, column: ColumnId) {
        if column != self.column {
            self.column = column;
            self.row_view_start = 0.0;
        }
    }

    pub fn set_slot(&mut self, slot: usize) {
        self.slot = slot;
    }

    /// Whether a vertical movement key is held
    pub fn is_moving(&self) -> bool {
        self.direction.is_some()
    }

    /// Key released: forget direction, speed and pending snap delay
    pub fn stop(&mut self) {
        self.direction = None;
        self.cur_speed = 0.0;
        self.snap_delay = 0;
        self.cur_trigger_delay = self.motion.init_trigger_delay;
    }

    /// The row under the cursor, if visible
    pub fn row<'a>(&self, pattern: &'a Pattern) -> Option<&'a TriggerRow> {
        if !pattern.is_visible(self.ts) {
            return None;
        }
        pattern.column(self.column)?.row(self.ts)
    }

    fn row_slot_count(&self, pattern: &Pattern) -> usize {
        self.row(pattern).map(TriggerRow::slot_count).unwrap_or(0)
    }

    /// Slot index clamped to the current row; the end slot equals the slot count
    pub fn effective_slot(&self, pattern: &Pattern) -> usize {
        self.slot.min(self.row_slot_count(pattern))
    }

    /// What the cursor is pointing at in the current row
    pub fn target(&self, pattern: &Pattern) -> SlotTarget {
        match self.row(pattern) {
            Some(row) => row.slot_target(self.slot),
            None => SlotTarget::End,
        }
    }

    /// Advance one tick in `direction`; returns whether `ts` changed
    pub fn step(&mut self, pattern: &Pattern, direction: Direction) -> bool {
        self.insert = false;

        let first = self.direction != Some(direction);
        if first {
            self.stop();
            self.direction = Some(direction);
        } else if self.snap_delay > 0 {
            self.snap_delay -= 1;
            return false;
        }

        let old = self.ts;
        let sign = direction.sign();
        let unit = if sign < 0 { -Tstamp::UNIT } else { Tstamp::UNIT };

        let mut new_ts = if first {
            old + unit
        } else {
            let target_pix = self.pix_pos + sign as f64 * self.cur_speed;
            let quantized = Tstamp::from_f64(target_pix / self.px_per_beat);
            let stuck = match direction {
                Direction::Down => quantized <= old,
                Direction::Up => quantized >= old,
            };
            if stuck { old + unit } else { quantized }
        };
        new_ts = new_ts.clamp(Tstamp::ZERO, pattern.length());

        // Stop on the first trigger row crossed
        let snapped = pattern.column(self.column).and_then(|column| match direction {
            Direction::Down => column
                .next_row_after(old)
                .map(|(t, _)| t)
                .filter(|t| *t <= new_ts && *t < pattern.length()),
            Direction::Up => column
                .prev_row_before(old)
                .map(|(t, _)| t)
                .filter(|t| *t >= new_ts),
        });

        if first {
            self.cur_speed = self.motion.init_speed;
        } else {
            self.cur_speed = (self.cur_speed * self.motion.accel).min(self.motion.max_speed);
        }

        if let Some(row_ts) = snapped {
            new_ts = row_ts;
            self.snap_delay = self.cur_trigger_delay;
            self.cur_trigger_delay = self.cur_trigger_delay.saturating_sub(1);
        }

        self.set_ts(pattern, new_ts);
        self.ts != old
    }

    /// Page up or down by `page_beats`, ignoring triggers
    pub fn page(&mut self, pattern: &Pattern, direction: Direction) {
        self.stop();
        self.insert = false;
        let delta = Tstamp::from_beats(self.motion.page_beats * direction.sign());
        self.set_ts(pattern, self.ts + delta);
    }

    pub fn home(&mut self, pattern: &Pattern) {
        self.stop();
        self.insert = false;
        self.set_ts(pattern, Tstamp::ZERO);
    }

    pub fn end(&mut self, pattern: &Pattern) {
        self.stop();
        self.insert = false;
        self.set_ts(pattern, pattern.length());
    }

    /// Move one slot left, signalling when the first slot is passed
    pub fn move_left(&mut self, pattern: &Pattern) -> Option<EdgeSignal> {
        self.insert = false;
        let current = self.effective_slot(pattern);
        if current == 0 {
            self.slot = 0;
            return Some(EdgeSignal::Underflow);
        }
        self.slot = current - 1;
        None
    }

    /// Move one slot right, signalling when the end slot is passed
    ///
    /// On overflow the slot saturates at `usize::MAX`, so returning to
    /// this column lands on its rightmost slot.
    pub fn move_right(&mut self, pattern: &Pattern) -> Option<EdgeSignal> {
        self.insert = false;
        let current = self.effective_slot(pattern);
        if current >= self.row_slot_count(pattern) {
            self.slot = usize::MAX;
            return Some(EdgeSignal::Overflow);
        }
        self.slot = current + 1;
        None
    }

    /// Move to the neighbouring column after an edge signal
    ///
    /// Returns `false` at the outermost columns.
    pub fn cross_column(&mut self, signal: EdgeSignal) -> bool {
        let next = match (signal, self.column) {
            (EdgeSignal::Underflow, ColumnId::Global) => None,
            (EdgeSignal::Underflow, ColumnId::Channel(0)) => Some(ColumnId::Global),
            (EdgeSignal::Underflow, ColumnId::Channel(n)) => Some(ColumnId::Channel(n - 1)),
            (EdgeSignal::Overflow, ColumnId::Global) => Some(ColumnId::Channel(0)),
            (EdgeSignal::Overflow, ColumnId::Channel(n)) if n + 1 < COLUMNS_MAX => {
                Some(ColumnId::Channel(n + 1))
            }
            (EdgeSignal::Overflow, ColumnId::Channel(_)) => None,
        };

        match next {
            Some(column) => {
                self.set_column(column);
                self.slot = match signal {
                    EdgeSignal::Underflow => usize::MAX,
                    EdgeSignal::Overflow => 0,
                };
                true
            }
            None => {
                self.slot = match signal {
                    EdgeSignal::Underflow => 0,
                    EdgeSignal::Overflow => usize::MAX,
                };
                false
            }
        }
    }

    /// Scroll the row horizontally so that `[left, right)` fits in `width`
    pub fn scroll_row_to(&mut self, left: f64, right: f64, width: f64) {
        if right - self.row_view_start > width {
            self.row_view_start = right - width;
        }
        if left < self.row_view_start {
            self.row_view_start = left;
        }
        self.row_view_start = self.row_view_start.max(0.0);
    }

    /// Re-seat after a structural change of the pattern
    ///
    /// Keeps the timestamp (clamped to the pattern) and the column index;
    /// the slot goes back to the type head and insert mode is cleared.
    pub fn reseat(&mut self, pattern: &Pattern) {
        self.stop();
        if let ColumnId::Channel(n) = self.column {
            self.column = ColumnId::Channel(n.min(COLUMNS_MAX - 1));
        }
        self.slot = 0;
        self.insert = false;
        self.row_view_start = 0.0;
        self.set_ts(pattern, self.ts);
    }

    /// Check the cursor after an edit of its column
    ///
    /// If the row under the cursor no longer exists the cursor stays at
    /// the same timestamp on the type head.
    pub fn revalidate(&mut self, pattern: &Pattern) {
        self.set_ts(pattern, self.ts);
        if self.row(pattern).is_none() && self.slot != usize::MAX {
            self.slot = 0;
            self.insert = false;
        }
    }
}
