// Tile cache - fixed-height pixmap tiles for the ruler and column backgrounds
//
// Tiles are addressed in pattern pixels (0 is the start of a pattern), so
// every pattern of a stack shares the same tiles.

use egui::{Color32, Rect, pos2};
use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};

/// Height of one tile in pixels
pub const TILE_H: usize = 256;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RenderError {
    #[error("Could not allocate {bytes} bytes for a pixmap")]
    ResourceExhausted { bytes: usize },
}

static NEXT_PIXMAP_ID: AtomicU64 = AtomicU64::new(1);

/// RGBA pixel buffer
///
/// Every pixmap has a process-unique id so hosts can keep one texture per
/// pixmap.
#[derive(Debug)]
pub struct Pixmap {
    id: u64,
    width: usize,
    height: usize,
    data: Vec<u8>,
}

impl Pixmap {
    pub fn new(width: usize, height: usize) -> Result<Self, RenderError> {
        let bytes = width
            .checked_mul(height)
            .and_then(|n| n.checked_mul(4))
            .ok_or(RenderError::ResourceExhausted { bytes: usize::MAX })?;
        let mut data = Vec::new();
        data.try_reserve_exact(bytes)
            .map_err(|_| RenderError::ResourceExhausted { bytes })?;
        data.resize(bytes, 0);
        Ok(Self {
            id: NEXT_PIXMAP_ID.fetch_add(1, Ordering::Relaxed),
            width,
            height,
            data,
        })
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn byte_len(&self) -> usize {
        self.data.len()
    }

    /// RGBA bytes, row-major
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn pixel(&self, x: usize, y: usize) -> Option<Color32> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let i = (y * self.width + x) * 4;
        Some(Color32::from_rgba_premultiplied(
            self.data[i],
            self.data[i + 1],
            self.data[i + 2],
            self.data[i + 3],
        ))
    }

    pub fn fill(&mut self, color: Color32) {
        let rgba = color.to_array();
        for px in self.data.chunks_exact_mut(4) {
            px.copy_from_slice(&rgba);
        }
    }

    /// Fill a rectangle given in pixel coordinates, clipped to the pixmap
    pub fn fill_rect(&mut self, x: i64, y: i64, w: i64, h: i64, color: Color32) {
        let x0 = x.clamp(0, self.width as i64) as usize;
        let x1 = (x + w).clamp(0, self.width as i64) as usize;
        let y0 = y.clamp(0, self.height as i64) as usize;
        let y1 = (y + h).clamp(0, self.height as i64) as usize;
        let rgba = color.to_array();
        for row in y0..y1 {
            let start = (row * self.width + x0) * 4;
            let end = (row * self.width + x1) * 4;
            for px in self.data[start..end].chunks_exact_mut(4) {
                px.copy_from_slice(&rgba);
            }
        }
    }

    pub fn hline(&mut self, y: i64, x0: i64, x1: i64, color: Color32) {
        self.fill_rect(x0, y, x1 - x0, 1, color);
    }
}

/// Identity of a cached tile
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TileKey {
    pub tile: usize,
    pub width: usize,
    /// Zoom rounded to whole pixels per beat
    pub px_per_beat: u32,
}

impl TileKey {
    /// Pattern pixel of the first row of this tile
    pub fn top(&self) -> usize {
        self.tile * TILE_H
    }
}

/// Part of one tile covering a requested range
#[derive(Debug)]
pub struct TilePiece<'a> {
    pub tile: usize,
    /// Source rectangle in pixmap pixels
    pub src: Rect,
    /// Pattern pixel where `src` starts
    pub top: f64,
    pub pixmap: &'a Pixmap,
}

/// Result of a range request
#[derive(Debug, Default)]
pub struct TileRange<'a> {
    pub pieces: Vec<TilePiece<'a>>,
    /// Tiles whose pixmap could not be allocated; retried on the next request
    pub failed: Vec<(usize, RenderError)>,
}

struct Entry {
    pixmap: Pixmap,
    last_used: u64,
}

/// Lazily rendered tiles of a fixed width and zoom
///
/// Changing the width or the zoom flushes the whole cache. Memory is
/// accounted in bytes and bounded by evicting the least recently used
/// tiles outside the current request.
pub struct TileCache {
    width: usize,
    px_per_beat: u32,
    tiles: HashMap<usize, Entry>,
    bytes: usize,
    max_bytes: usize,
    clock: u64,
}

impl TileCache {
    pub fn new(max_bytes: usize) -> Self {
        Self {
            width: 0,
            px_per_beat: 0,
            tiles: HashMap::new(),
            bytes: 0,
            max_bytes,
            clock: 0,
        }
    }

    /// Set the tile width and zoom; returns `true` if the cache was flushed
    pub fn set_geometry(&mut self, width: usize, px_per_beat: f64) -> bool {
        let px_per_beat = px_per_beat.round().max(1.0) as u32;
        if width == self.width && px_per_beat == self.px_per_beat {
            return false;
        }
        self.width = width;
        self.px_per_beat = px_per_beat;
        self.flush();
        true
    }

    pub fn flush(&mut self) {
        self.tiles.clear();
        self.bytes = 0;
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn len(&self) -> usize {
        self.tiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tiles.is_empty()
    }

    pub fn bytes(&self) -> usize {
        self.bytes
    }

    pub fn contains(&self, tile: usize) -> bool {
        self.tiles.contains_key(&tile)
    }

    fn key(&self, tile: usize) -> TileKey {
        TileKey {
            tile,
            width: self.width,
            px_per_beat: self.px_per_beat,
        }
    }

    /// Tiles covering pattern pixels `[y0, y1)`, rendering missing ones
    ///
    /// `render` is called once per newly created tile with a pixmap of
    /// `width × TILE_H` pixels.
    pub fn range<F>(&mut self, y0: f64, y1: f64, mut render: F) -> TileRange<'_>
    where
        F: FnMut(TileKey, &mut Pixmap),
    {
        let y0 = y0.max(0.0);
        if y1 <= y0 || self.width == 0 {
            return TileRange::default();
        }
        let first = (y0 / TILE_H as f64).floor() as usize;
        let last = ((y1 / TILE_H as f64).ceil() as usize).max(first + 1);
        let wanted: BTreeSet<usize> = (first..last).collect();

        self.clock += 1;
        let mut failed = Vec::new();
        for &tile in &wanted {
            if let Some(entry) = self.tiles.get_mut(&tile) {
                entry.last_used = self.clock;
                continue;
            }
            match Pixmap::new(self.width, TILE_H) {
                Ok(mut pixmap) => {
                    render(self.key(tile), &mut pixmap);
                    self.bytes += pixmap.byte_len();
                    self.tiles.insert(
                        tile,
                        Entry {
                            pixmap,
                            last_used: self.clock,
                        },
                    );
                }
                Err(e) => {
                    log::warn!("Tile {} not rendered: {}", tile, e);
                    failed.push((tile, e));
                }
            }
        }
        self.evict(&wanted);

        let width = self.width as f32;
        let pieces = wanted
            .iter()
            .filter_map(|tile| {
                let entry = self.tiles.get(tile)?;
                let top = (*tile * TILE_H) as f64;
                let start = y0.max(top);
                let end = y1.min(top + TILE_H as f64);
                Some(TilePiece {
                    tile: *tile,
                    src: Rect::from_min_max(
                        pos2(0.0, (start - top) as f32),
                        pos2(width, (end - top) as f32),
                    ),
                    top: start,
                    pixmap: &entry.pixmap,
                })
            })
            .collect();

        TileRange { pieces, failed }
    }

    fn evict(&mut self, keep: &BTreeSet<usize>) {
        while self.bytes > self.max_bytes {
            let victim = self
                .tiles
                .iter()
                .filter(|(tile, _)| !keep.contains(tile))
                .min_by_key(|(_, entry)| entry.last_used)
                .map(|(tile, _)| *tile);
            let Some(tile) = victim else {
                break;
            };
            if let Some(entry) = self.tiles.remove(&tile) {
                self.bytes -= entry.pixmap.byte_len();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TILE_BYTES: usize = 10 * TILE_H * 4;

    #[test]
    fn test_pixmap_fill_rect_clips() {
        let mut pixmap = Pixmap::new(4, 4).unwrap();
        pixmap.fill_rect(-2, 2, 4, 10, Color32::RED);
        assert_eq!(pixmap.pixel(0, 3), Some(Color32::RED));
        assert_eq!(pixmap.pixel(1, 2), Some(Color32::RED));
        assert_eq!(pixmap.pixel(2, 2), Some(Color32::TRANSPARENT));
        assert_eq!(pixmap.pixel(0, 1), Some(Color32::TRANSPARENT));
        assert_eq!(pixmap.pixel(4, 0), None);
    }

    #[test]
    fn test_allocation_failure() {
        let huge = isize::MAX as usize / 4 + 1;
        assert!(matches!(
            Pixmap::new(huge, 1),
            Err(RenderError::ResourceExhausted { .. })
        ));
        assert!(matches!(
            Pixmap::new(usize::MAX, 2),
            Err(RenderError::ResourceExhausted { bytes: usize::MAX })
        ));
    }

    #[test]
    fn test_lazy_rendering() {
        let mut cache = TileCache::new(usize::MAX);
        cache.set_geometry(10, 64.0);

        let mut rendered = Vec::new();
        let range = cache.range(100.0, 600.0, |key, _| rendered.push(key.tile));
        assert_eq!(range.pieces.len(), 3);
        assert_eq!(range.pieces[0].src.min.y, 100.0);
        assert_eq!(range.pieces[0].top, 100.0);
        assert_eq!(range.pieces[2].src.max.y, (600 - 2 * TILE_H) as f32);
        assert_eq!(rendered, vec![0, 1, 2]);

        rendered.clear();
        cache.range(300.0, 700.0, |key, _| rendered.push(key.tile));
        assert!(rendered.is_empty());
        assert_eq!(cache.bytes(), 3 * TILE_BYTES);
    }

    #[test]
    fn test_geometry_change_flushes() {
        let mut cache = TileCache::new(usize::MAX);
        assert!(cache.set_geometry(10, 64.0));
        cache.range(0.0, 10.0, |_, _| {});
        assert_eq!(cache.len(), 1);

        // Same rounded zoom keeps the tiles
        assert!(!cache.set_geometry(10, 64.3));
        assert_eq!(cache.len(), 1);

        assert!(cache.set_geometry(10, 65.0));
        assert!(cache.is_empty());
        cache.range(0.0, 10.0, |_, _| {});
        assert!(cache.set_geometry(12, 65.0));
        assert_eq!(cache.bytes(), 0);
    }

    #[test]
    fn test_render_receives_key() {
        let mut cache = TileCache::new(usize::MAX);
        cache.set_geometry(10, 32.0);
        let range = cache.range(TILE_H as f64, TILE_H as f64 + 1.0, |key, pixmap| {
            assert_eq!(key.top(), TILE_H);
            assert_eq!(key.px_per_beat, 32);
            pixmap.fill(Color32::BLUE);
        });
        assert_eq!(range.pieces[0].pixmap.pixel(5, 5), Some(Color32::BLUE));
    }

    #[test]
    fn test_lru_eviction() {
        let mut cache = TileCache::new(2 * TILE_BYTES);
        cache.set_geometry(10, 64.0);
        let h = TILE_H as f64;

        cache.range(0.0, 1.0, |_, _| {});
        cache.range(h, h + 1.0, |_, _| {});
        cache.range(0.0, 1.0, |_, _| {});
        cache.range(2.0 * h, 2.0 * h + 1.0, |_, _| {});

        assert_eq!(cache.len(), 2);
        assert!(cache.contains(0));
        assert!(!cache.contains(1));
        assert!(cache.contains(2));
    }

    #[test]
    fn test_request_larger_than_budget_is_kept() {
        let mut cache = TileCache::new(TILE_BYTES);
        cache.set_geometry(10, 64.0);
        let range = cache.range(0.0, 3.0 * TILE_H as f64, |_, _| {});
        assert_eq!(range.pieces.len(), 3);
    }
}
