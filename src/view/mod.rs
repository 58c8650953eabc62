// View - layout and painting of the sheet, independent of the GUI toolkit

pub mod column_view;
pub mod geometry;
pub mod painter;
pub mod pattern_stack;
pub mod ruler;
pub mod sheet_view;
pub mod style;
pub mod tile_cache;
pub mod trigger_cache;
pub mod trigger_layout;

pub use geometry::SheetGeometry;
pub use painter::{DisplayList, DrawOp, MonospaceMetrics, Painter, TextMetrics};
pub use pattern_stack::PatternStack;
pub use sheet_view::{SheetView, ViewHit};
pub use style::{Colours, HeadStyle, SheetStyle};
pub use tile_cache::{Pixmap, RenderError, TileCache};
pub use trigger_cache::TriggerCache;
