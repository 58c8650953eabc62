// Sheet geometry - mapping between timestamps, columns and view pixels

use crate::sheet::column::ColumnId;
use crate::sheet::tstamp::Tstamp;
use crate::sheet::COLUMNS_MAX;
use egui::{Pos2, Rect, pos2, vec2};

/// Number of columns in display order: the global column, then channels
pub const DISPLAY_COLUMNS: usize = COLUMNS_MAX + 1;

/// Display index of a column (the global column is shown first)
pub fn display_index(column: ColumnId) -> usize {
    match column {
        ColumnId::Global => 0,
        ColumnId::Channel(n) => n + 1,
    }
}

pub fn column_at_display(index: usize) -> Option<ColumnId> {
    match index {
        0 => Some(ColumnId::Global),
        n if n < DISPLAY_COLUMNS => Some(ColumnId::Channel(n - 1)),
        _ => None,
    }
}

/// Viewport state of one sheet view
///
/// Vertical positions inside the body are measured in stack pixels, where
/// pattern `i` of the displayed stack starts at its stack offset. `scroll_y`
/// is the stack pixel shown at the top of the body.
#[derive(Debug, Clone, PartialEq)]
pub struct SheetGeometry {
    viewport: Rect,
    px_per_beat: f64,
    scroll_y: f64,
    first_column: usize,
    ruler_width: f32,
    header_height: f32,
    column_width: f32,
}

impl SheetGeometry {
    pub fn new(viewport: Rect, px_per_beat: f64, ruler_width: f32, header_height: f32, column_width: f32) -> Self {
        Self {
            viewport,
            px_per_beat: px_per_beat.max(f64::MIN_POSITIVE),
            scroll_y: 0.0,
            first_column: 0,
            ruler_width,
            header_height,
            column_width: column_width.max(1.0),
        }
    }

    pub fn viewport(&self) -> Rect {
        self.viewport
    }

    pub fn set_viewport(&mut self, viewport: Rect) {
        self.viewport = viewport;
    }

    pub fn px_per_beat(&self) -> f64 {
        self.px_per_beat
    }

    pub fn set_px_per_beat(&mut self, px_per_beat: f64) {
        self.px_per_beat = px_per_beat.max(f64::MIN_POSITIVE);
    }

    pub fn column_width(&self) -> f32 {
        self.column_width
    }

    pub fn set_column_width(&mut self, width: f32) {
        self.column_width = width.max(1.0);
    }

    pub fn scroll_y(&self) -> f64 {
        self.scroll_y
    }

    pub fn set_scroll_y(&mut self, scroll_y: f64) {
        self.scroll_y = scroll_y.max(0.0);
    }

    pub fn first_column(&self) -> usize {
        self.first_column
    }

    /// Area below the column headers and right of the ruler
    pub fn body(&self) -> Rect {
        Rect::from_min_max(
            pos2(self.viewport.left() + self.ruler_width, self.viewport.top() + self.header_height),
            self.viewport.max,
        )
    }

    pub fn ruler_rect(&self) -> Rect {
        Rect::from_min_size(
            pos2(self.viewport.left(), self.viewport.top() + self.header_height),
            vec2(self.ruler_width, (self.viewport.height() - self.header_height).max(0.0)),
        )
    }

    pub fn body_height(&self) -> f64 {
        self.body().height() as f64
    }

    /// Screen y of the top of a pattern starting at stack pixel `start`
    pub fn pattern_origin(&self, start: f64) -> f32 {
        (self.body().top() as f64 + start - self.scroll_y) as f32
    }

    /// `y(ts) = (ts - view_start) * beat_len + header`, relative to a pattern
    pub fn y_of(&self, origin: f32, ts: Tstamp) -> f32 {
        origin + (ts.as_f64() * self.px_per_beat) as f32
    }

    /// Timestamp under screen `y` in the pattern at `origin`
    pub fn ts_at(&self, origin: f32, y: f32) -> Tstamp {
        Tstamp::from_f64((y - origin) as f64 / self.px_per_beat)
    }

    /// Timestamp range of the pattern at `origin` covered by the body
    pub fn visible_ts(&self, origin: f32) -> (Tstamp, Tstamp) {
        let body = self.body();
        (self.ts_at(origin, body.top()), self.ts_at(origin, body.bottom()))
    }

    /// Number of whole or partial columns that fit in the body
    pub fn visible_column_count(&self) -> usize {
        let count = (self.body().width() / self.column_width).ceil().max(1.0) as usize;
        count.min(DISPLAY_COLUMNS - self.first_column)
    }

    pub fn visible_columns(&self) -> impl Iterator<Item = ColumnId> {
        let first = self.first_column;
        (first..first + self.visible_column_count()).filter_map(column_at_display)
    }

    pub fn column_rect(&self, column: ColumnId) -> Option<Rect> {
        let index = display_index(column);
        if index < self.first_column || index >= self.first_column + self.visible_column_count() {
            return None;
        }
        let body = self.body();
        let left = body.left() + (index - self.first_column) as f32 * self.column_width;
        Some(Rect::from_min_max(
            pos2(left, self.viewport.top()),
            pos2((left + self.column_width).min(body.right()), self.viewport.bottom()),
        ))
    }

    pub fn header_rect(&self, column: ColumnId) -> Option<Rect> {
        self.column_rect(column)
            .map(|r| Rect::from_min_size(r.min, vec2(r.width(), self.header_height)))
    }

    pub fn column_at(&self, pos: Pos2) -> Option<ColumnId> {
        let body = self.body();
        if pos.x < body.left() || pos.x >= body.right() {
            return None;
        }
        let offset = ((pos.x - body.left()) / self.column_width) as usize;
        column_at_display(self.first_column + offset)
    }

    /// Scroll horizontally so that `column` is fully visible
    pub fn show_column(&mut self, column: ColumnId) {
        let index = display_index(column);
        let fully_visible = ((self.body().width() / self.column_width).floor() as usize).max(1);
        if index < self.first_column {
            self.first_column = index;
        } else if index >= self.first_column + fully_visible {
            self.first_column = index + 1 - fully_visible;
        }
    }

    /// Scroll vertically so that stack pixel `y` with height `h` is visible
    pub fn show_y(&mut self, y: f64, h: f64) {
        let height = self.body_height();
        if y < self.scroll_y {
            self.scroll_y = y;
        } else if y + h > self.scroll_y + height {
            self.scroll_y = y + h - height;
        }
        self.scroll_y = self.scroll_y.max(0.0);
    }
}
