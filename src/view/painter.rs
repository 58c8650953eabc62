// Painter abstraction - the drawing surface the sheet renders into
//
// The egui host implements `Painter` on top of `egui::Painter`; tests
// render into a `DisplayList` and inspect the recorded operations.

use crate::view::tile_cache::Pixmap;
use egui::{Color32, Pos2, Rect};

/// Text measurement supplied by the host toolkit
pub trait TextMetrics {
    fn text_width(&self, text: &str) -> f32;
    fn line_height(&self) -> f32;
}

/// Fixed-advance metrics, used by tests and as a fallback
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MonospaceMetrics {
    pub char_width: f32,
    pub line_height: f32,
}

impl Default for MonospaceMetrics {
    fn default() -> Self {
        Self {
            char_width: 7.0,
            line_height: 14.0,
        }
    }
}

impl TextMetrics for MonospaceMetrics {
    fn text_width(&self, text: &str) -> f32 {
        text.chars().count() as f32 * self.char_width
    }

    fn line_height(&self) -> f32 {
        self.line_height
    }
}

pub trait Painter {
    fn fill_rect(&mut self, rect: Rect, color: Color32);
    fn line(&mut self, from: Pos2, to: Pos2, color: Color32);
    /// Text with its top-left corner at `pos`
    fn text(&mut self, pos: Pos2, text: &str, color: Color32);
    /// Copy `src` (pixmap pixels) of `pixmap` to `dst` (screen)
    fn blit(&mut self, pixmap: &Pixmap, src: Rect, dst: Rect);
    /// Restrict subsequent drawing; `None` removes the clip
    fn set_clip(&mut self, clip: Option<Rect>);
}

#[derive(Debug, Clone, PartialEq)]
pub enum DrawOp {
    FillRect { rect: Rect, color: Color32 },
    Line { from: Pos2, to: Pos2, color: Color32 },
    Text { pos: Pos2, text: String, color: Color32 },
    Blit { pixmap: u64, src: Rect, dst: Rect },
    Clip(Option<Rect>),
}

/// Painter that records its operations
#[derive(Debug, Default)]
pub struct DisplayList {
    pub ops: Vec<DrawOp>,
}

impl DisplayList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn texts(&self) -> impl Iterator<Item = (Pos2, &str)> {
        self.ops.iter().filter_map(|op| match op {
            DrawOp::Text { pos, text, .. } => Some((*pos, text.as_str())),
            _ => None,
        })
    }

    pub fn text_ops(&self, color: Color32) -> impl Iterator<Item = (Pos2, &str)> {
        self.ops.iter().filter_map(move |op| match op {
            DrawOp::Text { pos, text, color: c } if *c == color => Some((*pos, text.as_str())),
            _ => None,
        })
    }

    pub fn rects(&self, color: Color32) -> impl Iterator<Item = Rect> + '_ {
        self.ops.iter().filter_map(move |op| match op {
            DrawOp::FillRect { rect, color: c } if *c == color => Some(*rect),
            _ => None,
        })
    }

    pub fn blits(&self) -> impl Iterator<Item = (u64, Rect, Rect)> + '_ {
        self.ops.iter().filter_map(|op| match op {
            DrawOp::Blit { pixmap, src, dst } => Some((*pixmap, *src, *dst)),
            _ => None,
        })
    }
}

impl Painter for DisplayList {
    fn fill_rect(&mut self, rect: Rect, color: Color32) {
        self.ops.push(DrawOp::FillRect { rect, color });
    }

    fn line(&mut self, from: Pos2, to: Pos2, color: Color32) {
        self.ops.push(DrawOp::Line { from, to, color });
    }

    fn text(&mut self, pos: Pos2, text: &str, color: Color32) {
        self.ops.push(DrawOp::Text {
            pos,
            text: text.to_string(),
            color,
        });
    }

    fn blit(&mut self, pixmap: &Pixmap, src: Rect, dst: Rect) {
        self.ops.push(DrawOp::Blit {
            pixmap: pixmap.id(),
            src,
            dst,
        });
    }

    fn set_clip(&mut self, clip: Option<Rect>) {
        self.ops.push(DrawOp::Clip(clip));
    }
}
