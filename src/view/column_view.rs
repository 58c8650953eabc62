// Column view - paints the visible trigger-rows of one column

use crate::sheet::column::Column;
use crate::sheet::tstamp::Tstamp;
use crate::view::painter::{Painter, TextMetrics};
use crate::view::ruler::{blit_tiles, render_column_tile};
use crate::view::style::SheetStyle;
use crate::view::tile_cache::TileCache;
use crate::view::trigger_cache::TriggerCache;
use crate::view::trigger_layout::{RowCursor, RowLayout, paint_row};
use egui::{Rect, pos2};

/// Screen placement of one trigger-row
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RowPlacement {
    pub ts: Tstamp,
    pub top: f32,
    pub height: f32,
}

/// Rows of `column` to paint inside `clip`, in descending timestamp order
///
/// A row is painted if it starts at most one trigger height above the
/// clip and before both the clip bottom and the pattern end. Its height is
/// cut short one pixel above the next row so dense rows never overlap.
pub fn row_placements(
    column: &Column,
    length: Tstamp,
    origin: f32,
    px_per_beat: f64,
    clip: Rect,
    trigger_height: f32,
) -> Vec<RowPlacement> {
    let ts_at = |y: f32| Tstamp::from_f64((y - origin) as f64 / px_per_beat);
    let y_of = |ts: Tstamp| origin + (ts.as_f64() * px_per_beat) as f32;

    let lo = ts_at(clip.top() - trigger_height).max(Tstamp::ZERO);
    let hi = ts_at(clip.bottom()).min(length);
    if hi < lo {
        return Vec::new();
    }

    let mut placements: Vec<RowPlacement> = column
        .iter_range(lo, hi)
        .filter(|(ts, _)| **ts < hi)
        .map(|(ts, _)| {
            let top = y_of(*ts);
            let mut bottom = top + trigger_height;
            if let Some((next, _)) = column.next_row_after(*ts) {
                bottom = bottom.min(y_of(next) - 1.0);
            }
            RowPlacement {
                ts: *ts,
                top,
                height: (bottom - top).max(1.0),
            }
        })
        .collect();
    placements.reverse();
    placements
}

/// Cursor state for the column that has the cursor
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ColumnCursor {
    pub ts: Tstamp,
    pub row: RowCursor,
    /// Whether the sheet has keyboard focus
    pub focused: bool,
}

/// Shared state for painting columns
pub struct ColumnPainter<'a> {
    pub style: &'a SheetStyle,
    pub metrics: &'a dyn TextMetrics,
    pub triggers: &'a mut TriggerCache,
    pub backgrounds: &'a mut TileCache,
    pub px_per_beat: f64,
}

impl ColumnPainter<'_> {
    /// Paint the body of `column` for a pattern starting at `origin`
    pub fn paint(
        &mut self,
        painter: &mut dyn Painter,
        column: &Column,
        length: Tstamp,
        origin: f32,
        rect: Rect,
        cursor: Option<ColumnCursor>,
    ) -> usize {
        let style = self.style;
        let colours = &style.colours;
        let end_y = origin + (length.as_f64() * self.px_per_beat) as f32;
        let top = rect.top().max(origin);
        let bottom = rect.bottom().min(end_y + 1.0);
        if bottom <= top {
            return 0;
        }

        painter.set_clip(Some(rect));
        blit_tiles(
            painter,
            self.backgrounds,
            rect.left(),
            origin,
            top,
            bottom,
            colours.background,
            |key, pixmap| render_column_tile(key, pixmap, colours),
        );
        painter.set_clip(None);

        let placements = row_placements(
            column,
            length,
            origin,
            self.px_per_beat,
            rect,
            style.trigger_height,
        );
        for placement in &placements {
            let Some(row) = column.row(placement.ts) else {
                continue;
            };
            let layout = RowLayout::of_row(row, self.triggers, self.metrics, style);
            let row_rect = Rect::from_min_max(
                pos2(rect.left(), placement.top),
                pos2(rect.right() - 1.0, placement.top + placement.height),
            )
            .intersect(rect);
            if row_rect.height() <= 0.0 {
                continue;
            }
            let row_cursor = cursor
                .filter(|c| c.focused && c.ts == placement.ts)
                .map(|c| c.row);
            paint_row(painter, self.metrics, colours, &layout, row_rect, row_cursor);
        }

        if let Some(cursor) = cursor {
            let y = origin + (cursor.ts.as_f64() * self.px_per_beat) as f32;
            if y >= rect.top() && y < rect.bottom() {
                painter.line(pos2(rect.left(), y), pos2(rect.right() - 1.0, y), colours.cursor_line);
            }
        }

        if end_y >= rect.top() && end_y < rect.bottom() {
            painter.line(pos2(rect.left(), end_y), pos2(rect.right(), end_y), colours.pattern_end);
        }
        painter.line(
            pos2(rect.right() - 1.0, top),
            pos2(rect.right() - 1.0, bottom),
            colours.column_border,
        );

        placements.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sheet::column::ColumnId;
    use crate::view::painter::{DisplayList, MonospaceMetrics};

    fn column_with(rows: &[Tstamp]) -> Column {
        let mut column = Column::new(ColumnId::Channel(0));
        for ts in rows {
            column.insert(*ts, "n-", &[]).unwrap();
        }
        column
    }

    #[test]
    fn test_descending_and_clipped_to_length() {
        let column = column_with(&[
            Tstamp::from_beats(1),
            Tstamp::from_beats(2),
            Tstamp::from_beats(3),
            Tstamp::from_beats(4),
        ]);
        let clip = Rect::from_min_max(pos2(0.0, 0.0), pos2(100.0, 1000.0));
        let placements = row_placements(&column, Tstamp::from_beats(4), 0.0, 64.0, clip, 16.0);
        let ts: Vec<Tstamp> = placements.iter().map(|p| p.ts).collect();
        assert_eq!(ts, vec![Tstamp::from_beats(3), Tstamp::from_beats(2), Tstamp::from_beats(1)]);
        assert_eq!(placements[0].top, 192.0);
        assert_eq!(placements[0].height, 16.0);
    }

    #[test]
    fn test_dense_rows_truncated() {
        let column = column_with(&[Tstamp::ZERO, Tstamp::from_f64(0.125)]);
        let clip = Rect::from_min_max(pos2(0.0, 0.0), pos2(100.0, 1000.0));
        let placements = row_placements(&column, Tstamp::from_beats(4), 0.0, 64.0, clip, 16.0);
        // Next row at 8 px: the first row ends one pixel above it
        assert_eq!(placements[1].ts, Tstamp::ZERO);
        assert_eq!(placements[1].height, 7.0);
        assert_eq!(placements[0].height, 16.0);
    }

    #[test]
    fn test_partially_visible_row_above_clip() {
        let column = column_with(&[Tstamp::from_beats(1), Tstamp::from_beats(10)]);
        // Clip starts 10 px below beat 1
        let clip = Rect::from_min_max(pos2(0.0, 74.0), pos2(100.0, 300.0));
        let placements = row_placements(&column, Tstamp::from_beats(16), 0.0, 64.0, clip, 16.0);
        assert_eq!(placements.len(), 1);
        assert_eq!(placements[0].ts, Tstamp::from_beats(1));
    }

    #[test]
    fn test_paint_marks_cursor_row() {
        let style = SheetStyle::default();
        let metrics = MonospaceMetrics::default();
        let mut triggers = TriggerCache::new(64);
        let mut backgrounds = TileCache::new(usize::MAX);
        backgrounds.set_geometry(128, 64.0);
        let column = column_with(&[Tstamp::from_beats(1), Tstamp::from_beats(2)]);

        let mut painter = ColumnPainter {
            style: &style,
            metrics: &metrics,
            triggers: &mut triggers,
            backgrounds: &mut backgrounds,
            px_per_beat: 64.0,
        };
        let mut list = DisplayList::new();
        let rect = Rect::from_min_max(pos2(48.0, 20.0), pos2(176.0, 420.0));
        let cursor = ColumnCursor {
            ts: Tstamp::from_beats(2),
            row: RowCursor {
                slot: 0,
                insert: false,
                view_start: 0.0,
            },
            focused: true,
        };
        let painted = painter.paint(&mut list, &column, Tstamp::from_beats(16), 20.0, rect, Some(cursor));

        assert_eq!(painted, 2);
        let colours = &style.colours;
        assert_eq!(list.rects(colours.cursor_bg).count(), 1);
        assert_eq!(
            list.text_ops(colours.head(crate::view::style::HeadStyle::ValidCursor))
                .count(),
            1
        );
        assert_eq!(list.text_ops(colours.head(crate::view::style::HeadStyle::Valid)).count(), 1);
        assert_eq!(triggers.len(), 1);
    }
}
