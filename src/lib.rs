// Kunquat sheet - pattern editing core, its view and persistence

pub mod command;
pub mod config;
pub mod engine;
pub mod messaging;
pub mod project;
pub mod sheet;
pub mod ui;
pub mod view;

// Re-export commonly used types for convenience
pub use command::{CommandManager, SheetState, UndoableCommand};
pub use config::SheetConfig;
pub use engine::{AudioEngine, CancelFlag, EngineListener, QueuedEngine};
pub use messaging::channels::{create_engine_channel, create_notification_channel};
pub use project::{MemoryStore, ProjectError, Store, load_module, save_module};
pub use sheet::{Column, ColumnId, Cursor, Module, Pattern, Sheet, SheetCommand, SheetError, Song, Trigger, Tstamp};
pub use view::SheetView;
