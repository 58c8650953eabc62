// Ruler - the timestamp axis on the left of the sheet

use crate::sheet::tstamp::Tstamp;
use crate::view::painter::{Painter, TextMetrics};
use crate::view::style::Colours;
use crate::view::tile_cache::{Pixmap, TILE_H, TileCache, TileKey};
use egui::{Color32, Rect, pos2};

/// Beat subdivisions shown at a zoom level
fn subdivisions(px_per_beat: u32) -> usize {
    match px_per_beat {
        0..=15 => 1,
        16..=31 => 2,
        32..=63 => 4,
        _ => 8,
    }
}

fn gcd(a: usize, b: usize) -> usize {
    if b == 0 { a } else { gcd(b, a % b) }
}

/// Pixel rows of the subdivision lines crossing one tile, with the
/// fraction of a beat each line sits on (1 = beat, 2 = half beat, ...)
fn tile_lines(key: TileKey) -> Vec<(i64, usize)> {
    let ppb = key.px_per_beat.max(1) as f64;
    let div = subdivisions(key.px_per_beat);
    let top = key.top() as f64;
    let bottom = top + TILE_H as f64;

    let mut index = (top * div as f64 / ppb).floor().max(0.0) as usize;
    let mut lines = Vec::new();
    loop {
        let y = (index as f64 * ppb / div as f64).round();
        if y >= bottom {
            break;
        }
        if y >= top {
            lines.push(((y - top) as i64, div / gcd(index, div)));
        }
        index += 1;
    }
    lines
}

/// Ruler background: beat ticks of decreasing length for finer divisions
pub fn render_ruler_tile(key: TileKey, pixmap: &mut Pixmap, colours: &Colours) {
    pixmap.fill(colours.ruler_bg);
    let width = pixmap.width() as i64;
    for (y, level) in tile_lines(key) {
        let length = width / level as i64;
        pixmap.hline(y, width - length, width, colours.ruler_fg);
    }
}

/// Column background: one line per beat
pub fn render_column_tile(key: TileKey, pixmap: &mut Pixmap, colours: &Colours) {
    pixmap.fill(colours.background);
    let width = pixmap.width() as i64;
    for (y, level) in tile_lines(key) {
        if level == 1 {
            pixmap.hline(y, 0, width, colours.beat_line);
        }
    }
}

/// Blit cached tiles over `[top, bottom)` of a pattern drawn at `origin`
///
/// Tiles that could not be allocated are painted as `fallback`.
#[allow(clippy::too_many_arguments)]
pub fn blit_tiles<F>(
    painter: &mut dyn Painter,
    cache: &mut TileCache,
    left: f32,
    origin: f32,
    top: f32,
    bottom: f32,
    fallback: Color32,
    render: F,
) where
    F: FnMut(TileKey, &mut Pixmap),
{
    let width = cache.width() as f32;
    let range = cache.range((top - origin) as f64, (bottom - origin) as f64, render);
    for piece in &range.pieces {
        let y = origin + piece.top as f32;
        let dst = Rect::from_min_size(pos2(left, y), piece.src.size());
        painter.blit(piece.pixmap, piece.src, dst);
    }
    for (tile, _) in &range.failed {
        let tile_top = origin + (tile * TILE_H) as f32;
        let y0 = tile_top.max(top);
        let y1 = (tile_top + TILE_H as f32).min(bottom);
        painter.fill_rect(Rect::from_min_max(pos2(left, y0), pos2(left + width, y1)), fallback);
    }
}

/// Ruler of one pattern
///
/// The background comes from the tile cache; beat numbers and the pattern
/// end line are drawn on top.
pub struct Ruler {
    tiles: TileCache,
}

impl Ruler {
    pub fn new(max_bytes: usize) -> Self {
        Self {
            tiles: TileCache::new(max_bytes),
        }
    }

    pub fn tiles(&self) -> &TileCache {
        &self.tiles
    }

    /// Returns `true` if the tile cache was flushed
    pub fn set_geometry(&mut self, width: f32, px_per_beat: f64) -> bool {
        self.tiles.set_geometry(width.max(0.0) as usize, px_per_beat)
    }

    pub fn flush(&mut self) {
        self.tiles.flush();
    }

    /// Paint the ruler of a pattern of `length` at `origin` within `rect`
    #[allow(clippy::too_many_arguments)]
    pub fn paint(
        &mut self,
        painter: &mut dyn Painter,
        metrics: &dyn TextMetrics,
        colours: &Colours,
        rect: Rect,
        origin: f32,
        px_per_beat: f64,
        length: Tstamp,
    ) {
        let end_y = origin + (length.as_f64() * px_per_beat) as f32;
        let top = rect.top().max(origin);
        let bottom = rect.bottom().min(end_y + 1.0);
        if bottom <= top {
            return;
        }

        painter.set_clip(Some(rect));
        blit_tiles(
            painter,
            &mut self.tiles,
            rect.left(),
            origin,
            top,
            bottom,
            colours.ruler_bg,
            |key, pixmap| render_ruler_tile(key, pixmap, colours),
        );

        let first = (((top - origin) as f64 - metrics.line_height() as f64) / px_per_beat)
            .ceil()
            .max(0.0) as i64;
        let last = (((bottom - origin) as f64) / px_per_beat).floor() as i64;
        for beat in first..=last.min(length.beats()) {
            let y = origin + (beat as f64 * px_per_beat) as f32;
            painter.text(pos2(rect.left() + 2.0, y + 1.0), &beat.to_string(), colours.ruler_fg);
        }

        if end_y >= rect.top() && end_y < rect.bottom() {
            painter.line(
                pos2(rect.left(), end_y),
                pos2(rect.right(), end_y),
                colours.pattern_end,
            );
        }
        painter.set_clip(None);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::view::painter::{DisplayList, MonospaceMetrics};
    use crate::view::style::SheetStyle;

    fn key(tile: usize, px_per_beat: u32) -> TileKey {
        TileKey {
            tile,
            width: 40,
            px_per_beat,
        }
    }

    #[test]
    fn test_tile_lines_levels() {
        let lines = tile_lines(key(0, 64));
        assert_eq!(&lines[..4], &[(0, 1), (8, 8), (16, 4), (24, 8)]);
        assert!(lines.contains(&(32, 2)));
        assert!(lines.contains(&(64, 1)));
        assert!(lines.iter().all(|(y, _)| *y < TILE_H as i64));
    }

    #[test]
    fn test_tile_lines_continue_across_tiles() {
        // 100 px per beat: beat 3 is at pattern pixel 300, row 44 of tile 1
        let lines = tile_lines(key(1, 100));
        assert!(lines.contains(&(44, 1)));
    }

    #[test]
    fn test_ruler_tile_pixels() {
        let colours = SheetStyle::default().colours;
        let mut pixmap = Pixmap::new(40, TILE_H).unwrap();
        render_ruler_tile(key(0, 64), &mut pixmap, &colours);
        assert_eq!(pixmap.pixel(0, 0), Some(colours.ruler_fg));
        assert_eq!(pixmap.pixel(0, 8), Some(colours.ruler_bg));
        assert_eq!(pixmap.pixel(39, 8), Some(colours.ruler_fg));
    }

    #[test]
    fn test_ruler_labels_and_end_line() {
        let style = SheetStyle::default();
        let mut ruler = Ruler::new(usize::MAX);
        ruler.set_geometry(48.0, 64.0);
        let mut list = DisplayList::new();
        let rect = Rect::from_min_max(pos2(0.0, 20.0), pos2(48.0, 420.0));

        ruler.paint(
            &mut list,
            &MonospaceMetrics::default(),
            &style.colours,
            rect,
            20.0,
            64.0,
            Tstamp::from_beats(4),
        );

        let labels: Vec<&str> = list.text_ops(style.colours.ruler_fg).map(|(_, t)| t).collect();
        assert_eq!(labels, vec!["0", "1", "2", "3", "4"]);
        assert!(list.blits().count() >= 2);
        assert!(list.ops.iter().any(|op| matches!(
            op,
            crate::view::painter::DrawOp::Line { from, .. } if from.y == 20.0 + 256.0
        )));
    }
}
