// Sheet view - headers, ruler and columns of the pattern stack around the
// pattern being edited

use crate::config::SheetConfig;
use crate::sheet::column::ColumnId;
use crate::sheet::editor::Sheet;
use crate::sheet::signals::{ListenerId, SheetSignal, Topic};
use crate::sheet::tstamp::Tstamp;
use crate::view::column_view::{ColumnCursor, ColumnPainter};
use crate::view::geometry::SheetGeometry;
use crate::view::painter::{Painter, TextMetrics};
use crate::view::pattern_stack::PatternStack;
use crate::view::ruler::Ruler;
use crate::view::style::SheetStyle;
use crate::view::tile_cache::TileCache;
use crate::view::trigger_cache::TriggerCache;
use crate::view::trigger_layout::{RowCursor, RowLayout};
use egui::{Pos2, Rect, pos2, vec2};

/// Position under a point of the view
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewHit {
    pub system: usize,
    pub pattern: usize,
    pub column: ColumnId,
    pub ts: Tstamp,
}

pub struct SheetView {
    style: SheetStyle,
    geometry: SheetGeometry,
    stack: PatternStack,
    /// Pattern id of each stack entry
    stack_patterns: Vec<usize>,
    /// Stack entry holding the edited pattern
    current: usize,
    ruler: Ruler,
    backgrounds: TileCache,
    triggers: TriggerCache,
    listener: Option<ListenerId>,
    focused: bool,
}

impl SheetView {
    pub fn new(config: &SheetConfig, viewport: Rect) -> Self {
        let style = SheetStyle::from(config);
        let layout = &config.layout;
        let geometry = SheetGeometry::new(
            viewport,
            layout.px_per_beat.round().max(1.0),
            style.ruler_width,
            style.header_height,
            style.column_width,
        );
        let mut view = Self {
            stack: PatternStack::new(Vec::new(), geometry.px_per_beat(), style.trigger_height),
            stack_patterns: Vec::new(),
            current: 0,
            ruler: Ruler::new(config.cache.tile_cache_max_bytes / 2),
            backgrounds: TileCache::new(config.cache.tile_cache_max_bytes / 2),
            triggers: TriggerCache::new(config.cache.trigger_cache_max_entries),
            listener: None,
            focused: true,
            style,
            geometry,
        };
        view.sync_tiles();
        view
    }

    /// Start following the model of `sheet`
    pub fn attach(&mut self, sheet: &mut Sheet) {
        if let Some(id) = self.listener.take() {
            sheet.updater_mut().unregister(id);
        }
        self.listener = Some(sheet.updater_mut().register(&[
            Topic::Columns,
            Topic::Pattern,
            Topic::Cursor,
            Topic::Edit,
            Topic::Layout,
        ]));
        sheet.cursor_mut().set_px_per_beat(self.geometry.px_per_beat());
        self.rebuild_stack(sheet);
    }

    pub fn style(&self) -> &SheetStyle {
        &self.style
    }

    pub fn geometry(&self) -> &SheetGeometry {
        &self.geometry
    }

    pub fn stack(&self) -> &PatternStack {
        &self.stack
    }

    pub fn triggers(&self) -> &TriggerCache {
        &self.triggers
    }

    pub fn set_focused(&mut self, focused: bool) {
        self.focused = focused;
    }

    pub fn set_viewport(&mut self, viewport: Rect) {
        self.geometry.set_viewport(viewport);
    }

    fn sync_tiles(&mut self) {
        let ppb = self.geometry.px_per_beat();
        self.ruler.set_geometry(self.style.ruler_width, ppb);
        self.backgrounds
            .set_geometry(self.geometry.column_width().max(1.0) as usize, ppb);
    }

    /// Change the zoom; rounded to whole pixels per beat
    pub fn set_zoom(&mut self, sheet: &mut Sheet, px_per_beat: f64) {
        let ppb = px_per_beat.round().clamp(4.0, 1024.0);
        if ppb == self.geometry.px_per_beat() {
            return;
        }
        self.geometry.set_px_per_beat(ppb);
        sheet.cursor_mut().set_px_per_beat(ppb);
        self.sync_tiles();
        self.rebuild_stack(sheet);
        sheet.updater_mut().signal(SheetSignal::Layout);
    }

    pub fn set_column_width(&mut self, sheet: &mut Sheet, width: f32) {
        self.style.column_width = width.max(16.0);
        self.geometry.set_column_width(self.style.column_width);
        self.sync_tiles();
        sheet.updater_mut().signal(SheetSignal::Layout);
    }

    pub fn scroll_by(&mut self, dy: f64) {
        let max = (self.stack.total_height() as f64 - self.geometry.body_height()).max(0.0);
        self.geometry
            .set_scroll_y((self.geometry.scroll_y() + dy).clamp(0.0, max));
    }

    /// Lay out the song containing the edited pattern as a stack
    ///
    /// The first song whose order list refers to the pattern is used;
    /// dangling references are left out. Without such a song the stack
    /// holds only the edited pattern.
    pub fn rebuild_stack(&mut self, sheet: &Sheet) {
        let module = sheet.module();
        let current = sheet.pattern_id();

        let mut entries: Vec<(usize, Tstamp)> = module
            .songs()
            .find(|(_, song)| song.order().iter().any(|r| r.pattern == current))
            .map(|(_, song)| {
                song.order()
                    .iter()
                    .filter_map(|r| module.resolve(*r).map(|p| (r.pattern, p.length())))
                    .collect()
            })
            .unwrap_or_default();
        if !entries.iter().any(|(id, _)| *id == current) {
            entries = sheet.pattern().map(|p| vec![(current, p.length())]).unwrap_or_default();
        }

        self.current = entries.iter().position(|(id, _)| *id == current).unwrap_or(0);
        self.stack_patterns = entries.iter().map(|(id, _)| *id).collect();
        self.stack = PatternStack::new(
            entries.into_iter().map(|(_, length)| length).collect(),
            self.geometry.px_per_beat(),
            self.style.trigger_height,
        );
    }

    /// Handle pending model signals; returns `true` if a repaint is needed
    pub fn update(&mut self, sheet: &mut Sheet, metrics: &dyn TextMetrics) -> bool {
        let Some(id) = self.listener else {
            return false;
        };
        let signals = sheet.updater_mut().drain(id);
        if signals.is_empty() {
            return false;
        }

        let mut restack = false;
        let mut follow = false;
        for signal in &signals {
            match signal {
                SheetSignal::ColumnChanged { .. } => {}
                SheetSignal::ColumnsShifted { .. } => follow = true,
                SheetSignal::PatternLength { .. } => restack = true,
                SheetSignal::PatternSelected { .. } => {
                    restack = true;
                    follow = true;
                }
                SheetSignal::CursorMoved | SheetSignal::EditMode { .. } => follow = true,
                SheetSignal::Layout => {
                    self.triggers.flush();
                    restack = true;
                }
            }
        }
        if restack {
            self.rebuild_stack(sheet);
        }
        if follow {
            self.follow_cursor(sheet, metrics);
        }
        true
    }

    /// Scroll so that the cursor and its slot are visible
    pub fn follow_cursor(&mut self, sheet: &mut Sheet, metrics: &dyn TextMetrics) {
        let cursor = sheet.cursor();
        if let Some(y) = self.stack.y_of(self.current, cursor.ts()) {
            self.geometry.show_y(y, self.style.trigger_height as f64);
        }
        self.geometry.show_column(cursor.column());

        let extent = sheet.pattern().and_then(|pattern| {
            let row = cursor.row(pattern)?;
            let layout = RowLayout::of_row(row, &mut self.triggers, metrics, &self.style);
            Some(layout.slot_extent(cursor.effective_slot(pattern)))
        });
        let width = (self.style.column_width - 1.0) as f64;
        if let Some(extent) = extent {
            sheet
                .cursor_mut()
                .scroll_row_to(extent.left as f64, extent.right as f64, width);
        }
    }

    /// What lies under `pos`, if it is inside the column area
    pub fn hit_test(&self, pos: Pos2) -> Option<ViewHit> {
        let body = self.geometry.body();
        if !body.contains(pos) {
            return None;
        }
        let column = self.geometry.column_at(pos)?;
        let y = self.geometry.scroll_y() + (pos.y - body.top()) as f64;
        let (system, ts) = self.stack.locate(y)?;
        Some(ViewHit {
            system,
            pattern: *self.stack_patterns.get(system)?,
            column,
            ts,
        })
    }

    pub fn paint(&mut self, painter: &mut dyn Painter, metrics: &dyn TextMetrics, sheet: &Sheet) {
        let colours = &self.style.colours;
        let viewport = self.geometry.viewport();
        painter.fill_rect(viewport, colours.background);

        self.paint_headers(painter, metrics);

        let body = self.geometry.body();
        let scroll = self.geometry.scroll_y();
        let visible: Vec<usize> = self
            .stack
            .visible(scroll, scroll + body.height() as f64)
            .collect();
        let cursor = sheet.cursor();

        for system in visible {
            let (Some(start), Some(&pattern_id)) = (self.stack.start(system), self.stack_patterns.get(system)) else {
                continue;
            };
            let Some(pattern) = sheet.module().pattern(pattern_id) else {
                continue;
            };
            let origin = self.geometry.pattern_origin(start as f64);

            self.ruler.paint(
                painter,
                metrics,
                &self.style.colours,
                self.geometry.ruler_rect(),
                origin,
                self.geometry.px_per_beat(),
                pattern.length(),
            );

            let mut columns = ColumnPainter {
                style: &self.style,
                metrics,
                triggers: &mut self.triggers,
                backgrounds: &mut self.backgrounds,
                px_per_beat: self.geometry.px_per_beat(),
            };
            for id in self.geometry.visible_columns() {
                let (Some(rect), Some(column)) = (self.geometry.column_rect(id), pattern.column(id)) else {
                    continue;
                };
                let rect = rect.intersect(body);
                let column_cursor = (system == self.current && id == cursor.column()).then(|| ColumnCursor {
                    ts: cursor.ts(),
                    row: RowCursor {
                        slot: cursor.effective_slot(pattern),
                        insert: cursor.is_insert(),
                        view_start: cursor.row_view_start() as f32,
                    },
                    focused: self.focused,
                });
                columns.paint(painter, column, pattern.length(), origin, rect, column_cursor);
            }
        }

        self.paint_field_editor(painter, metrics, sheet);
    }

    fn paint_headers(&self, painter: &mut dyn Painter, metrics: &dyn TextMetrics) {
        let colours = &self.style.colours;
        let viewport = self.geometry.viewport();
        painter.fill_rect(
            Rect::from_min_size(viewport.min, vec2(viewport.width(), self.style.header_height)),
            colours.header_bg,
        );
        for id in self.geometry.visible_columns() {
            let Some(rect) = self.geometry.header_rect(id) else {
                continue;
            };
            let label = id.to_string();
            let x = rect.center().x - metrics.text_width(&label) / 2.0;
            let y = rect.top() + ((rect.height() - metrics.line_height()) / 2.0).max(0.0);
            painter.set_clip(Some(rect));
            painter.text(pos2(x, y), &label, colours.header_fg);
            painter.line(
                pos2(rect.right() - 1.0, rect.top()),
                pos2(rect.right() - 1.0, rect.bottom()),
                colours.column_border,
            );
            painter.set_clip(None);
        }
    }

    /// Editor text box over the slot being edited
    fn paint_field_editor(&mut self, painter: &mut dyn Painter, metrics: &dyn TextMetrics, sheet: &Sheet) {
        let Some(editor) = sheet.field_editor() else {
            return;
        };
        let cursor = sheet.cursor();
        let (Some(pattern), Some(column_rect), Some(start)) = (
            sheet.pattern(),
            self.geometry.column_rect(cursor.column()),
            self.stack.start(self.current),
        ) else {
            return;
        };

        let origin = self.geometry.pattern_origin(start as f64);
        let y = origin + (cursor.ts().as_f64() * self.geometry.px_per_beat()) as f32;
        let left = match cursor.row(pattern) {
            Some(row) if !cursor.is_insert() => {
                let layout = RowLayout::of_row(row, &mut self.triggers, metrics, &self.style);
                layout.slot_extent(cursor.effective_slot(pattern)).left - cursor.row_view_start() as f32
            }
            _ => self.style.trigger_margin,
        };

        let text = editor.text();
        let colours = &self.style.colours;
        let x = column_rect.left() + left.max(0.0);
        let width = (metrics.text_width(&text) + self.style.field_padding * 2.0).max(self.style.column_width / 2.0);
        let rect = Rect::from_min_size(pos2(x, y), vec2(width, self.style.trigger_height));
        let text_y = y + ((self.style.trigger_height - metrics.line_height()) / 2.0).max(0.0);

        painter.fill_rect(rect, colours.cursor_bg);
        let text_x = x + self.style.field_padding;
        painter.text(pos2(text_x, text_y), &text, colours.trigger_bg);
        let prefix: String = text.chars().take(editor.caret()).collect();
        let caret_x = text_x + metrics.text_width(&prefix);
        painter.line(
            pos2(caret_x, rect.top() + 1.0),
            pos2(caret_x, rect.bottom() - 1.0),
            colours.insert_caret,
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sheet::cursor::CursorMotion;
    use crate::sheet::editor::SheetCommand;
    use crate::sheet::field_edit::EditKey;
    use crate::sheet::module::Module;
    use crate::sheet::pattern::Pattern;
    use crate::sheet::song::Song;
    use crate::view::painter::{DisplayList, DrawOp, MonospaceMetrics};

    fn viewport() -> Rect {
        Rect::from_min_size(pos2(0.0, 0.0), vec2(48.0 + 4.0 * 128.0, 20.0 + 400.0))
    }

    fn two_pattern_sheet() -> Sheet {
        let mut module = Module::new();
        let a = module.add_pattern(Pattern::new(Tstamp::from_beats(4))).unwrap();
        let b = module.add_pattern(Pattern::new(Tstamp::from_beats(2))).unwrap();
        let mut song = Song::default();
        song.push(module.new_instance(a).unwrap());
        song.push(module.new_instance(b).unwrap());
        module.add_song(song).unwrap();
        Sheet::new(module, CursorMotion::default(), 64.0)
    }

    fn attached(sheet: &mut Sheet) -> SheetView {
        let mut view = SheetView::new(&SheetConfig::default(), viewport());
        view.attach(sheet);
        view
    }

    #[test]
    fn test_stack_follows_song() {
        let mut sheet = two_pattern_sheet();
        let view = attached(&mut sheet);
        assert_eq!(view.stack().len(), 2);
        assert_eq!(view.stack().start(1), Some(4 * 64));
    }

    #[test]
    fn test_headers_and_ruler() {
        let mut sheet = two_pattern_sheet();
        let mut view = attached(&mut sheet);
        let mut list = DisplayList::new();
        view.paint(&mut list, &MonospaceMetrics::default(), &sheet);

        let headers: Vec<&str> = list.text_ops(view.style().colours.header_fg).map(|(_, t)| t).collect();
        assert_eq!(headers, vec!["-1", "0", "1", "2"]);
        // Beats 0..=4 of the first pattern and 0..=2 of the second are in view
        let beats = list.text_ops(view.style().colours.ruler_fg).count();
        assert_eq!(beats, 5 + 3);
    }

    #[test]
    fn test_hit_test_across_patterns() {
        let mut sheet = two_pattern_sheet();
        let view = attached(&mut sheet);

        let hit = view.hit_test(pos2(48.0 + 128.0 + 5.0, 20.0 + 64.0)).unwrap();
        assert_eq!(hit.column, ColumnId::Channel(0));
        assert_eq!(hit.system, 0);
        assert_eq!(hit.ts, Tstamp::from_beats(1));

        let hit = view.hit_test(pos2(60.0, 20.0 + 256.0 + 32.0)).unwrap();
        assert_eq!(hit.column, ColumnId::Global);
        assert_eq!(hit.system, 1);
        assert_eq!(hit.pattern, 1);
        assert_eq!(hit.ts, Tstamp::from_f64(0.5));

        assert!(view.hit_test(pos2(10.0, 100.0)).is_none());
    }

    #[test]
    fn test_follow_cursor_scrolls() {
        let mut module = Module::new();
        module.add_pattern(Pattern::new(Tstamp::from_beats(64))).unwrap();
        let mut sheet = Sheet::new(module, CursorMotion::default(), 64.0);
        let mut view = attached(&mut sheet);
        let metrics = MonospaceMetrics::default();

        sheet.handle(SheetCommand::End);
        assert!(view.update(&mut sheet, &metrics));
        assert!(view.geometry().scroll_y() > 0.0);
        let cursor_y = view.stack().y_of(0, sheet.cursor().ts()).unwrap();
        assert!(cursor_y >= view.geometry().scroll_y());

        sheet.handle(SheetCommand::Home);
        view.update(&mut sheet, &metrics);
        assert_eq!(view.geometry().scroll_y(), 0.0);
        assert!(!view.update(&mut sheet, &metrics));
    }

    #[test]
    fn test_cursor_row_and_editor_painted() {
        let mut sheet = two_pattern_sheet();
        let mut view = attached(&mut sheet);
        let metrics = MonospaceMetrics::default();
        sheet
            .insert(ColumnId::Channel(0), Tstamp::ZERO, ".i", &[serde_json::json!(1)])
            .unwrap();
        sheet.handle(SheetCommand::Return);
        sheet.handle(SheetCommand::Key(EditKey::Backspace));
        view.update(&mut sheet, &metrics);

        let mut list = DisplayList::new();
        view.paint(&mut list, &metrics, &sheet);
        let colours = &view.style().colours;
        assert!(list.rects(colours.cursor_bg).count() >= 2);
        assert!(list
            .ops
            .iter()
            .any(|op| matches!(op, DrawOp::Text { text, color, .. } if text == "." && color == &colours.trigger_bg)));
    }

    #[test]
    fn test_zoom_rounds_and_restacks() {
        let mut sheet = two_pattern_sheet();
        let mut view = attached(&mut sheet);
        view.set_zoom(&mut sheet, 31.6);
        assert_eq!(view.geometry().px_per_beat(), 32.0);
        assert_eq!(sheet.cursor().px_per_beat(), 32.0);
        assert_eq!(view.stack().start(1), Some(4 * 32));
    }
}
