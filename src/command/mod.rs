// Command Pattern for undo/redo of sheet edits
//
// Architecture:
// - UndoableCommand trait: execute(), undo(), description()
// - CommandManager: bounded undo/redo stacks
// - Concrete commands: insert/remove triggers, field and kind changes,
//   row shifts, pattern length and column removal
//
// Commands run in the UI context against SheetState and announce what they
// changed through its updater so that views can repaint.

pub mod commands;
pub mod manager;
pub mod state;
pub mod trait_def;

pub use manager::CommandManager;
pub use state::SheetState;
pub use trait_def::{CommandError, CommandResult, UndoableCommand};
