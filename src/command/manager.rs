// CommandManager - Manages undo/redo stacks of sheet edits

use crate::command::state::SheetState;
use crate::command::trait_def::{CommandError, CommandResult, UndoableCommand};
use std::collections::VecDeque;

/// Default maximum number of commands to keep in history
pub const DEFAULT_MAX_HISTORY: usize = 100;

/// Executes sheet edits and keeps them for undo/redo
///
/// Executing a new command clears the redo stack. When the undo stack
/// exceeds `max_history` the oldest command is dropped.
pub struct CommandManager {
    /// Most recent at the back
    undo_stack: VecDeque<Box<dyn UndoableCommand>>,
    /// Most recent at the back
    redo_stack: VecDeque<Box<dyn UndoableCommand>>,
    max_history: usize,
}

impl CommandManager {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_MAX_HISTORY)
    }

    pub fn with_capacity(max_history: usize) -> Self {
        Self {
            undo_stack: VecDeque::with_capacity(max_history),
            redo_stack: VecDeque::with_capacity(max_history),
            max_history,
        }
    }

    /// Execute a command and add it to the undo stack
    ///
    /// # Errors
    /// Returns the command's error; nothing is recorded in that case.
    pub fn execute(
        &mut self,
        mut command: Box<dyn UndoableCommand>,
        state: &mut SheetState,
    ) -> CommandResult<()> {
        command.execute(state)?;

        self.undo_stack.push_back(command);
        self.redo_stack.clear();

        if self.undo_stack.len() > self.max_history {
            self.undo_stack.pop_front();
        }

        Ok(())
    }

    /// Undo the last command, returning its description
    pub fn undo(&mut self, state: &mut SheetState) -> CommandResult<String> {
        let mut command = self
            .undo_stack
            .pop_back()
            .ok_or_else(|| CommandError::UndoFailed("Nothing to undo".into()))?;

        let description = command.description();
        if let Err(e) = command.undo(state) {
            // Keep the history consistent with the model
            self.undo_stack.push_back(command);
            return Err(e);
        }

        self.redo_stack.push_back(command);
        Ok(description)
    }

    /// Redo the last undone command, returning its description
    pub fn redo(&mut self, state: &mut SheetState) -> CommandResult<String> {
        let mut command = self
            .redo_stack
            .pop_back()
            .ok_or_else(|| CommandError::ExecutionFailed("Nothing to redo".into()))?;

        let description = command.description();
        if let Err(e) = command.execute(state) {
            self.redo_stack.push_back(command);
            return Err(e);
        }

        self.undo_stack.push_back(command);
        Ok(description)
    }

    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    pub fn undo_description(&self) -> Option<String> {
        self.undo_stack.back().map(|cmd| cmd.description())
    }

    pub fn redo_description(&self) -> Option<String> {
        self.redo_stack.back().map(|cmd| cmd.description())
    }

    /// Forget all history, e.g. after loading another module
    pub fn clear(&mut self) {
        self.undo_stack.clear();
        self.redo_stack.clear();
    }

    pub fn undo_count(&self) -> usize {
        self.undo_stack.len()
    }

    pub fn redo_count(&self) -> usize {
        self.redo_stack.len()
    }
}

impl Default for CommandManager {
    fn default() -> Self {
        Self::new()
    }
}
