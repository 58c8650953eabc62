// Sheet style - colours and dimensions resolved from the configuration

use crate::config::{ColourConfig, LayoutConfig, SheetConfig};
use egui::Color32;

fn rgb(c: [u8; 3]) -> Color32 {
    Color32::from_rgb(c[0], c[1], c[2])
}

/// Type head style, one per `(valid, cursor)` combination
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HeadStyle {
    Valid,
    Invalid,
    ValidCursor,
    InvalidCursor,
}

impl HeadStyle {
    pub fn of(valid: bool, cursor: bool) -> Self {
        match (valid, cursor) {
            (true, false) => HeadStyle::Valid,
            (false, false) => HeadStyle::Invalid,
            (true, true) => HeadStyle::ValidCursor,
            (false, true) => HeadStyle::InvalidCursor,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Colours {
    pub background: Color32,
    pub beat_line: Color32,
    pub ruler_bg: Color32,
    pub ruler_fg: Color32,
    pub header_bg: Color32,
    pub header_fg: Color32,
    pub column_border: Color32,
    pub pattern_end: Color32,
    pub cursor_line: Color32,
    pub cursor_bg: Color32,
    pub head: [Color32; 4],
    pub field_fg: Color32,
    pub insert_caret: Color32,
    pub arrow: Color32,
    pub trigger_bg: Color32,
}

impl From<&ColourConfig> for Colours {
    fn from(c: &ColourConfig) -> Self {
        Self {
            background: rgb(c.background),
            beat_line: rgb(c.beat_line),
            ruler_bg: rgb(c.ruler_bg),
            ruler_fg: rgb(c.ruler_fg),
            header_bg: rgb(c.header_bg),
            header_fg: rgb(c.header_fg),
            column_border: rgb(c.column_border),
            pattern_end: rgb(c.pattern_end),
            cursor_line: rgb(c.cursor_line),
            cursor_bg: rgb(c.cursor_bg),
            head: [
                rgb(c.head_valid),
                rgb(c.head_invalid),
                rgb(c.head_valid_cursor),
                rgb(c.head_invalid_cursor),
            ],
            field_fg: rgb(c.field_fg),
            insert_caret: rgb(c.insert_caret),
            arrow: rgb(c.arrow),
            trigger_bg: rgb(c.trigger_bg),
        }
    }
}

impl Colours {
    pub fn head(&self, style: HeadStyle) -> Color32 {
        let index = match style {
            HeadStyle::Valid => 0,
            HeadStyle::Invalid => 1,
            HeadStyle::ValidCursor => 2,
            HeadStyle::InvalidCursor => 3,
        };
        self.head[index]
    }
}

/// Everything the painters need besides the model
#[derive(Debug, Clone, PartialEq)]
pub struct SheetStyle {
    pub colours: Colours,
    pub column_width: f32,
    pub ruler_width: f32,
    pub header_height: f32,
    pub trigger_height: f32,
    pub trigger_margin: f32,
    pub field_padding: f32,
}

impl SheetStyle {
    pub fn new(layout: &LayoutConfig, colours: &ColourConfig) -> Self {
        Self {
            colours: colours.into(),
            column_width: layout.column_width.max(16.0),
            ruler_width: layout.ruler_width.max(0.0),
            header_height: layout.header_height.max(0.0),
            trigger_height: layout.trigger_height.max(1.0),
            trigger_margin: layout.trigger_margin.max(0.0),
            field_padding: layout.field_padding.max(0.0),
        }
    }
}

impl From<&SheetConfig> for SheetStyle {
    fn from(config: &SheetConfig) -> Self {
        Self::new(&config.layout, &config.colours)
    }
}

impl Default for SheetStyle {
    fn default() -> Self {
        Self::from(&SheetConfig::default())
    }
}
