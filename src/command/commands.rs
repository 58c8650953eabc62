// Concrete sheet edit commands

use crate::command::state::SheetState;
use crate::command::trait_def::{CommandError, CommandResult, UndoableCommand};
use crate::sheet::column::{Column, ColumnId};
use crate::sheet::signals::SheetSignal;
use crate::sheet::trigger::Trigger;
use crate::sheet::tstamp::Tstamp;
use crate::sheet::SheetError;
use serde_json::Value;

/// Position of a trigger inside a pattern
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TriggerPos {
    pub pattern: usize,
    pub column: ColumnId,
    pub ts: Tstamp,
    pub index: usize,
}

fn not_executed() -> CommandError {
    CommandError::UndoFailed("Command was not executed".into())
}

/// Insert a new trigger
///
/// With no position the trigger is appended to the row.
pub struct InsertTriggerCommand {
    pattern: usize,
    column: ColumnId,
    ts: Tstamp,
    position: Option<usize>,
    trigger: Trigger,
    inserted_at: Option<usize>,
}

impl InsertTriggerCommand {
    pub fn new(
        pattern: usize,
        column: ColumnId,
        ts: Tstamp,
        position: Option<usize>,
        kind: &str,
        raw_fields: &[Value],
    ) -> Self {
        Self {
            pattern,
            column,
            ts,
            position,
            trigger: Trigger::new(kind, raw_fields),
            inserted_at: None,
        }
    }

    /// Row index of the inserted trigger, once executed
    pub fn inserted_at(&self) -> Option<usize> {
        self.inserted_at
    }
}

impl UndoableCommand for InsertTriggerCommand {
    fn execute(&mut self, state: &mut SheetState) -> CommandResult<()> {
        let column = state.column_mut(self.pattern, self.column)?;
        let row_len = column.row(self.ts).map(|row| row.len()).unwrap_or(0);
        let index = self.position.unwrap_or(row_len).min(row_len);
        column.insert_trigger(self.ts, index, self.trigger.clone())?;
        self.inserted_at = Some(index);
        state.column_changed(self.pattern, self.column);
        Ok(())
    }

    fn undo(&mut self, state: &mut SheetState) -> CommandResult<()> {
        let index = self.inserted_at.ok_or_else(not_executed)?;
        state
            .column_mut(self.pattern, self.column)?
            .remove_trigger(self.ts, index)?;
        state.column_changed(self.pattern, self.column);
        Ok(())
    }

    fn description(&self) -> String {
        format!("Insert {}", self.trigger.kind())
    }
}

/// Remove one trigger
pub struct RemoveTriggerCommand {
    pos: TriggerPos,
    removed: Option<Trigger>,
}

impl RemoveTriggerCommand {
    pub fn new(pos: TriggerPos) -> Self {
        Self { pos, removed: None }
    }
}

impl UndoableCommand for RemoveTriggerCommand {
    fn execute(&mut self, state: &mut SheetState) -> CommandResult<()> {
        let p = self.pos;
        let removed = state
            .column_mut(p.pattern, p.column)?
            .remove_trigger(p.ts, p.index)?;
        self.removed = Some(removed);
        state.column_changed(p.pattern, p.column);
        Ok(())
    }

    fn undo(&mut self, state: &mut SheetState) -> CommandResult<()> {
        let p = self.pos;
        let trigger = self.removed.take().ok_or_else(not_executed)?;
        state
            .column_mut(p.pattern, p.column)?
            .restore_trigger(p.ts, p.index, trigger);
        state.column_changed(p.pattern, p.column);
        Ok(())
    }

    fn description(&self) -> String {
        match &self.removed {
            Some(trigger) => format!("Remove {}", trigger.kind()),
            None => "Remove trigger".to_string(),
        }
    }
}

/// New content of a single field
#[derive(Debug, Clone, PartialEq)]
pub enum FieldChange {
    Set(Value),
    Reset,
}

/// Change one field of a trigger
pub struct ReplaceFieldCommand {
    pos: TriggerPos,
    field: usize,
    change: FieldChange,
    old: Option<Trigger>,
}

impl ReplaceFieldCommand {
    pub fn new(pos: TriggerPos, field: usize, change: FieldChange) -> Self {
        Self {
            pos,
            field,
            change,
            old: None,
        }
    }
}

impl UndoableCommand for ReplaceFieldCommand {
    fn execute(&mut self, state: &mut SheetState) -> CommandResult<()> {
        let p = self.pos;
        let column = state.column_mut(p.pattern, p.column)?;
        let old = column
            .trigger(p.ts, p.index)
            .cloned()
            .ok_or(SheetError::NoSuchTrigger {
                ts: p.ts,
                index: p.index,
            })?;
        match &self.change {
            FieldChange::Set(raw) => column.replace_field(p.ts, p.index, self.field, raw)?,
            FieldChange::Reset => column.reset_field(p.ts, p.index, self.field)?,
        }
        self.old = Some(old);
        state.column_changed(p.pattern, p.column);
        Ok(())
    }

    fn undo(&mut self, state: &mut SheetState) -> CommandResult<()> {
        let p = self.pos;
        let old = self.old.take().ok_or_else(not_executed)?;
        state
            .column_mut(p.pattern, p.column)?
            .replace_trigger(p.ts, p.index, old)?;
        state.column_changed(p.pattern, p.column);
        Ok(())
    }

    fn description(&self) -> String {
        match &self.change {
            FieldChange::Set(value) => format!("Set field {} to {}", self.field, value),
            FieldChange::Reset => format!("Reset field {}", self.field),
        }
    }
}

/// Change the kind of a trigger, keeping compatible fields
pub struct ReplaceKindCommand {
    pos: TriggerPos,
    kind: String,
    old: Option<Trigger>,
}

impl ReplaceKindCommand {
    pub fn new(pos: TriggerPos, kind: &str) -> Self {
        Self {
            pos,
            kind: kind.to_string(),
            old: None,
        }
    }
}

impl UndoableCommand for ReplaceKindCommand {
    fn execute(&mut self, state: &mut SheetState) -> CommandResult<()> {
        let p = self.pos;
        let old = state
            .column_mut(p.pattern, p.column)?
            .replace_kind(p.ts, p.index, &self.kind)?;
        self.old = Some(old);
        state.column_changed(p.pattern, p.column);
        Ok(())
    }

    fn undo(&mut self, state: &mut SheetState) -> CommandResult<()> {
        let p = self.pos;
        let old = self.old.take().ok_or_else(not_executed)?;
        state
            .column_mut(p.pattern, p.column)?
            .replace_trigger(p.ts, p.index, old)?;
        state.column_changed(p.pattern, p.column);
        Ok(())
    }

    fn description(&self) -> String {
        format!("Change kind to {}", self.kind)
    }
}

/// Shift rows of one column; undo restores the column as it was
///
/// Merged rows cannot be split apart again, so the whole column is kept.
pub struct ShiftRowsCommand {
    pattern: usize,
    column: ColumnId,
    from: Tstamp,
    delta: Tstamp,
    before: Option<Column>,
}

impl ShiftRowsCommand {
    pub fn new(pattern: usize, column: ColumnId, from: Tstamp, delta: Tstamp) -> Self {
        Self {
            pattern,
            column,
            from,
            delta,
            before: None,
        }
    }
}

impl UndoableCommand for ShiftRowsCommand {
    fn execute(&mut self, state: &mut SheetState) -> CommandResult<()> {
        let column = state.column_mut(self.pattern, self.column)?;
        let before = column.clone();
        column.shift_from(self.from, self.delta)?;
        self.before = Some(before);
        state.column_changed(self.pattern, self.column);
        Ok(())
    }

    fn undo(&mut self, state: &mut SheetState) -> CommandResult<()> {
        let before = self.before.take().ok_or_else(not_executed)?;
        state
            .pattern_mut(self.pattern)?
            .replace_column(self.column, before)?;
        state.column_changed(self.pattern, self.column);
        Ok(())
    }

    fn description(&self) -> String {
        format!("Shift rows from {} by {}", self.from, self.delta)
    }
}

pub struct SetPatternLengthCommand {
    pattern: usize,
    length: Tstamp,
    old: Option<Tstamp>,
}

impl SetPatternLengthCommand {
    pub fn new(pattern: usize, length: Tstamp) -> Self {
        Self {
            pattern,
            length,
            old: None,
        }
    }
}

impl UndoableCommand for SetPatternLengthCommand {
    fn execute(&mut self, state: &mut SheetState) -> CommandResult<()> {
        self.old = Some(state.pattern_mut(self.pattern)?.set_length(self.length)?);
        state.updater.signal(SheetSignal::PatternLength {
            pattern: self.pattern,
        });
        Ok(())
    }

    fn undo(&mut self, state: &mut SheetState) -> CommandResult<()> {
        let old = self.old.ok_or_else(not_executed)?;
        state.pattern_mut(self.pattern)?.set_length(old)?;
        state.updater.signal(SheetSignal::PatternLength {
            pattern: self.pattern,
        });
        Ok(())
    }

    fn description(&self) -> String {
        format!("Set pattern length to {}", self.length)
    }
}

/// Remove a channel column, shifting the following ones left
pub struct RemoveColumnCommand {
    pattern: usize,
    index: usize,
    removed: Option<Column>,
}

impl RemoveColumnCommand {
    pub fn new(pattern: usize, index: usize) -> Self {
        Self {
            pattern,
            index,
            removed: None,
        }
    }
}

impl UndoableCommand for RemoveColumnCommand {
    fn execute(&mut self, state: &mut SheetState) -> CommandResult<()> {
        self.removed = Some(state.pattern_mut(self.pattern)?.remove_column(self.index)?);
        state.updater.signal(SheetSignal::ColumnsShifted {
            pattern: self.pattern,
        });
        Ok(())
    }

    fn undo(&mut self, state: &mut SheetState) -> CommandResult<()> {
        let removed = self.removed.take().ok_or_else(not_executed)?;
        state
            .pattern_mut(self.pattern)?
            .insert_column(self.index, removed)?;
        state.updater.signal(SheetSignal::ColumnsShifted {
            pattern: self.pattern,
        });
        Ok(())
    }

    fn description(&self) -> String {
        format!("Remove column {}", self.index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::manager::CommandManager;
    use crate::sheet::pattern::Pattern;
    use crate::sheet::trigger::FieldValue;
    use serde_json::json;

    fn state_with_pattern() -> SheetState {
        let mut state = SheetState::default();
        state
            .module
            .insert_pattern(0, Pattern::new(Tstamp::from_beats(16)))
            .unwrap();
        state
    }

    fn column(state: &SheetState, id: ColumnId) -> &Column {
        state.module.pattern(0).unwrap().column(id).unwrap()
    }

    fn pos(beats: i64, index: usize) -> TriggerPos {
        TriggerPos {
            pattern: 0,
            column: ColumnId::Channel(0),
            ts: Tstamp::from_beats(beats),
            index,
        }
    }

    #[test]
    fn test_insert_undo() {
        let mut state = state_with_pattern();
        let mut manager = CommandManager::new();
        let ch = ColumnId::Channel(0);
        let ts = Tstamp::from_beats(4);

        manager
            .execute(
                Box::new(InsertTriggerCommand::new(0, ch, ts, None, "n+", &[json!(300)])),
                &mut state,
            )
            .unwrap();
        manager
            .execute(
                Box::new(InsertTriggerCommand::new(0, ch, ts, Some(0), "C.i", &[json!(2)])),
                &mut state,
            )
            .unwrap();
        let kinds: Vec<_> = column(&state, ch)
            .row(ts)
            .unwrap()
            .iter()
            .map(|t| t.kind().to_string())
            .collect();
        assert_eq!(kinds, vec!["C.i", "n+"]);

        manager.undo(&mut state).unwrap();
        manager.undo(&mut state).unwrap();
        assert!(column(&state, ch).is_empty());
    }

    #[test]
    fn test_rejected_insert_leaves_state() {
        let mut state = state_with_pattern();
        let mut manager = CommandManager::new();
        let result = manager.execute(
            Box::new(InsertTriggerCommand::new(
                0,
                ColumnId::Global,
                Tstamp::ZERO,
                None,
                "n+",
                &[],
            )),
            &mut state,
        );
        assert!(matches!(
            result,
            Err(CommandError::Sheet(SheetError::KindNotAllowedInColumn { .. }))
        ));
        assert!(column(&state, ColumnId::Global).is_empty());
        assert!(!manager.can_undo());
    }

    #[test]
    fn test_field_and_kind_undo() {
        let mut state = state_with_pattern();
        let mut manager = CommandManager::new();
        state
            .column_mut(0, ColumnId::Channel(0))
            .unwrap()
            .insert(Tstamp::from_beats(1), "C.P", &[json!(0.5)])
            .unwrap();
        let original = column(&state, ColumnId::Channel(0)).clone();

        manager
            .execute(
                Box::new(ReplaceFieldCommand::new(pos(1, 0), 0, FieldChange::Set(json!(-1)))),
                &mut state,
            )
            .unwrap();
        manager
            .execute(Box::new(ReplaceKindCommand::new(pos(1, 0), "C/P")), &mut state)
            .unwrap();
        let trigger = column(&state, ColumnId::Channel(0))
            .trigger(Tstamp::from_beats(1), 0)
            .unwrap();
        assert_eq!(trigger.kind(), "C/P");
        assert_eq!(trigger.fields(), &[FieldValue::Real(-1.0)]);

        manager.undo(&mut state).unwrap();
        manager.undo(&mut state).unwrap();
        assert_eq!(column(&state, ColumnId::Channel(0)), &original);
    }

    #[test]
    fn test_remove_and_shift_undo() {
        let mut state = state_with_pattern();
        let mut manager = CommandManager::new();
        let ch = ColumnId::Channel(0);
        {
            let column = state.column_mut(0, ch).unwrap();
            column.insert(Tstamp::from_beats(1), "n+", &[]).unwrap();
            column.insert(Tstamp::from_beats(2), "n-", &[]).unwrap();
        }
        let original = column(&state, ch).clone();

        manager
            .execute(
                Box::new(ShiftRowsCommand::new(
                    0,
                    ch,
                    Tstamp::from_beats(2),
                    Tstamp::from_beats(-1),
                )),
                &mut state,
            )
            .unwrap();
        assert_eq!(column(&state, ch).len(), 1);

        manager
            .execute(Box::new(RemoveTriggerCommand::new(pos(1, 1))), &mut state)
            .unwrap();
        assert_eq!(column(&state, ch).trigger_count(), 1);

        manager.undo(&mut state).unwrap();
        manager.undo(&mut state).unwrap();
        assert_eq!(column(&state, ch), &original);
    }

    #[test]
    fn test_length_and_column_undo() {
        let mut state = state_with_pattern();
        let mut manager = CommandManager::new();
        state
            .column_mut(0, ColumnId::Channel(3))
            .unwrap()
            .insert(Tstamp::ZERO, "h", &[])
            .unwrap();
        let original = state.module.pattern(0).unwrap().clone();

        manager
            .execute(Box::new(SetPatternLengthCommand::new(0, Tstamp::from_beats(8))), &mut state)
            .unwrap();
        manager
            .execute(Box::new(RemoveColumnCommand::new(0, 3)), &mut state)
            .unwrap();
        assert!(column(&state, ColumnId::Channel(3)).is_empty());

        manager.undo(&mut state).unwrap();
        manager.undo(&mut state).unwrap();
        assert_eq!(state.module.pattern(0).unwrap(), &original);
    }
}
