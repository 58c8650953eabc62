// egui host for the sheet editor

pub mod app;
pub mod sheet_panel;

pub use app::SheetApp;
pub use sheet_panel::SheetPanel;
