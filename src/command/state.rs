// SheetState - the mutable model that commands operate on
//
// Holds the module being edited and the updater through which commands
// announce what they changed.

use crate::command::trait_def::CommandResult;
use crate::sheet::column::{Column, ColumnId};
use crate::sheet::module::Module;
use crate::sheet::pattern::Pattern;
use crate::sheet::signals::{SheetSignal, Updater};
use crate::sheet::SheetError;

#[derive(Debug, Default)]
pub struct SheetState {
    pub module: Module,
    pub updater: Updater,
}

impl SheetState {
    pub fn new(module: Module) -> Self {
        Self {
            module,
            updater: Updater::new(),
        }
    }

    pub fn pattern_mut(&mut self, pattern: usize) -> CommandResult<&mut Pattern> {
        Ok(self.module.try_pattern_mut(pattern)?)
    }

    pub fn column_mut(&mut self, pattern: usize, column: ColumnId) -> CommandResult<&mut Column> {
        Ok(self
            .module
            .try_pattern_mut(pattern)?
            .column_mut(column)
            .ok_or(SheetError::ColumnOutOfRange(column))?)
    }

    pub fn column_changed(&mut self, pattern: usize, column: ColumnId) {
        self.updater
            .signal(SheetSignal::ColumnChanged { pattern, column });
    }
}
