// UndoableCommand trait definition

use crate::command::state::SheetState;
use crate::sheet::SheetError;
use thiserror::Error;

/// Result type for command operations
pub type CommandResult<T> = Result<T, CommandError>;

/// Errors that can occur during command execution
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CommandError {
    /// Command execution failed
    #[error("Execution failed: {0}")]
    ExecutionFailed(String),
    /// Undo operation failed
    #[error("Undo failed: {0}")]
    UndoFailed(String),
    /// The sheet rejected the edit
    #[error(transparent)]
    Sheet(#[from] SheetError),
}

/// Trait for sheet edits that support undo/redo
///
/// Every logical edit of the pattern model goes through this trait so that
/// the history can restore the exact prior content. Commands run in the UI
/// context and report changes through the state's updater.
///
/// # Example
/// ```no_run
/// use kunquat_sheet::command::trait_def::{UndoableCommand, CommandResult, CommandError};
/// use kunquat_sheet::command::state::SheetState;
/// use kunquat_sheet::sheet::Tstamp;
///
/// struct SetLengthCommand {
///     pattern: usize,
///     length: Tstamp,
///     old: Option<Tstamp>,
/// }
///
/// impl UndoableCommand for SetLengthCommand {
///     fn execute(&mut self, state: &mut SheetState) -> CommandResult<()> {
///         let pattern = state.pattern_mut(self.pattern)?;
///         self.old = Some(pattern.set_length(self.length)?);
///         Ok(())
///     }
///
///     fn undo(&mut self, state: &mut SheetState) -> CommandResult<()> {
///         let old = self
///             .old
///             .ok_or_else(|| CommandError::UndoFailed("No previous length stored".into()))?;
///         state.pattern_mut(self.pattern)?.set_length(old)?;
///         Ok(())
///     }
///
///     fn description(&self) -> String {
///         format!("Set pattern length to {}", self.length)
///     }
/// }
/// ```
pub trait UndoableCommand: Send {
    /// Execute the command
    ///
    /// Must leave the state unchanged when it returns an error, and store
    /// whatever `undo` needs.
    fn execute(&mut self, state: &mut SheetState) -> CommandResult<()>;

    /// Restore the state to what it was before `execute`
    fn undo(&mut self, state: &mut SheetState) -> CommandResult<()>;

    /// Human-readable description (e.g. "Undo: Insert n+")
    fn description(&self) -> String;
}
