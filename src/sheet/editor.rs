// Sheet - editing session: model, cursor, field editor and undo history

use crate::command::commands::{
    FieldChange, InsertTriggerCommand, RemoveColumnCommand, RemoveTriggerCommand,
    ReplaceFieldCommand, ReplaceKindCommand, SetPatternLengthCommand, ShiftRowsCommand,
    TriggerPos,
};
use crate::command::{CommandError, CommandManager, CommandResult, SheetState, UndoableCommand};
use crate::engine::interface::AudioEngine;
use crate::messaging::channels::NotificationProducer;
use crate::messaging::notification::{Notification, NotificationCategory};
use crate::sheet::column::ColumnId;
use crate::sheet::cursor::{Cursor, CursorMotion, Direction};
use crate::sheet::field_edit::{
    Committed, EditKey, EditOutcome, EditTarget, EditorKind, FieldEditor,
};
use crate::sheet::module::Module;
use crate::sheet::pattern::Pattern;
use crate::sheet::playback::engine_event;
use crate::sheet::signals::{SheetSignal, Updater};
use crate::sheet::song::Song;
use crate::sheet::trigger_row::SlotTarget;
use crate::sheet::tstamp::Tstamp;
use crate::sheet::SheetError;

/// Abstract editing commands; key bindings live in the UI
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SheetCommand {
    /// One tick of vertical motion while the key is held
    Step(Direction),
    /// Vertical motion key released
    Release,
    Page(Direction),
    Home,
    End,
    Left,
    Right,
    ToggleInsert,
    Escape,
    Delete,
    Return,
    /// Text input for the active field editor
    Key(EditKey),
    Undo,
    Redo,
    SelectColumn(ColumnId),
    SelectPattern(usize),
    RemoveColumn,
    /// Shift the rows of the current column from the cursor on
    ShiftRows(Tstamp),
    SetLength(Tstamp),
}

/// One editing session over a module
///
/// All state here lives in the UI context. Every model edit goes through
/// the command history; rejected edits leave the model unchanged and are
/// reported as notifications.
pub struct Sheet {
    state: SheetState,
    history: CommandManager,
    cursor: Cursor,
    pattern: usize,
    editor: Option<FieldEditor>,
    notifier: Option<NotificationProducer>,
    last_notification: Option<Notification>,
    audition: Option<Box<dyn AudioEngine>>,
}

impl Sheet {
    /// Start editing `module`; an empty module gets one pattern in one song
    pub fn new(mut module: Module, motion: CursorMotion, px_per_beat: f64) -> Self {
        let first = module.patterns().next().map(|(id, _)| id);
        let pattern = match first {
            Some(id) => id,
            None => Self::seed_module(&mut module),
        };
        Self {
            state: SheetState::new(module),
            history: CommandManager::new(),
            cursor: Cursor::new(motion, px_per_beat),
            pattern,
            editor: None,
            notifier: None,
            last_notification: None,
            audition: None,
        }
    }

    fn seed_module(module: &mut Module) -> usize {
        let id = module.add_pattern(Pattern::default()).unwrap_or(0);
        if let Ok(instance) = module.new_instance(id) {
            let mut song = Song::default();
            song.push(instance);
            let _ = module.add_song(song);
        }
        id
    }

    pub fn set_notifier(&mut self, notifier: NotificationProducer) {
        self.notifier = Some(notifier);
    }

    /// Engine that plays triggers as they are entered
    pub fn set_audition(&mut self, engine: Option<Box<dyn AudioEngine>>) {
        self.audition = engine;
    }

    pub fn module(&self) -> &Module {
        &self.state.module
    }

    /// Swap in another module, dropping history and edit state
    pub fn replace_module(&mut self, module: Module) -> Module {
        self.editor = None;
        self.cursor.set_edit(false);
        self.history.clear();
        let mut module = module;
        let first = module.patterns().next().map(|(id, _)| id);
        self.pattern = match first {
            Some(id) => id,
            None => Self::seed_module(&mut module),
        };
        let old = std::mem::replace(&mut self.state.module, module);
        self.reseat_cursor();
        self.state
            .updater
            .signal(SheetSignal::PatternSelected { pattern: self.pattern });
        old
    }

    pub fn updater_mut(&mut self) -> &mut Updater {
        &mut self.state.updater
    }

    pub fn cursor(&self) -> &Cursor {
        &self.cursor
    }

    pub fn cursor_mut(&mut self) -> &mut Cursor {
        &mut self.cursor
    }

    pub fn pattern_id(&self) -> usize {
        self.pattern
    }

    pub fn pattern(&self) -> Option<&Pattern> {
        self.state.module.pattern(self.pattern)
    }

    pub fn field_editor(&self) -> Option<&FieldEditor> {
        self.editor.as_ref()
    }

    pub fn history(&self) -> &CommandManager {
        &self.history
    }

    pub fn last_notification(&self) -> Option<&Notification> {
        self.last_notification.as_ref()
    }

    fn notify(&mut self, notification: Notification) {
        notification.log();
        if let Some(notifier) = self.notifier.as_mut() {
            if ringbuf::traits::Producer::try_push(notifier, notification.clone()).is_err() {
                log::warn!("Notification queue full, dropped: {}", notification.message);
            }
        }
        self.last_notification = Some(notification);
    }

    fn report(&mut self, error: &CommandError) {
        self.notify(Notification::warning(
            NotificationCategory::Sheet,
            error.to_string(),
        ));
    }

    /// Execute an edit through the history
    ///
    /// The cursor is revalidated afterwards; errors are also reported as
    /// notifications.
    pub fn execute(&mut self, command: Box<dyn UndoableCommand>) -> CommandResult<()> {
        let result = self.history.execute(command, &mut self.state);
        match &result {
            Ok(()) => self.revalidate_cursor(),
            Err(e) => self.report(e),
        }
        result
    }

    fn revalidate_cursor(&mut self) {
        if let Some(pattern) = self.state.module.pattern(self.pattern) {
            self.cursor.revalidate(pattern);
        }
    }

    fn reseat_cursor(&mut self) {
        if let Some(pattern) = self.state.module.pattern(self.pattern) {
            self.cursor.reseat(pattern);
        }
        self.state.updater.signal(SheetSignal::CursorMoved);
    }

    /// Insert a trigger in the current pattern without touching the cursor
    pub fn insert(
        &mut self,
        column: ColumnId,
        ts: Tstamp,
        kind: &str,
        raw_fields: &[serde_json::Value],
    ) -> CommandResult<()> {
        self.execute(Box::new(InsertTriggerCommand::new(
            self.pattern,
            column,
            ts,
            None,
            kind,
            raw_fields,
        )))
    }

    /// Dispatch one editing command
    pub fn handle(&mut self, command: SheetCommand) {
        if self.editor.is_some() {
            let key = match command {
                SheetCommand::Return => EditKey::Return,
                SheetCommand::Escape => EditKey::Escape,
                SheetCommand::Left => EditKey::Left,
                SheetCommand::Right => EditKey::Right,
                SheetCommand::Home => EditKey::Home,
                SheetCommand::End => EditKey::End,
                SheetCommand::Delete => EditKey::Delete,
                SheetCommand::Key(key) => key,
                _ => return,
            };
            self.edit_key(key);
            return;
        }

        let Some(pattern) = self.state.module.pattern(self.pattern) else {
            return;
        };

        match command {
            SheetCommand::Step(direction) => {
                if self.cursor.step(pattern, direction) {
                    self.state.updater.signal(SheetSignal::CursorMoved);
                }
            }
            SheetCommand::Release => self.cursor.stop(),
            SheetCommand::Page(direction) => {
                self.cursor.page(pattern, direction);
                self.state.updater.signal(SheetSignal::CursorMoved);
            }
            SheetCommand::Home => {
                self.cursor.home(pattern);
                self.state.updater.signal(SheetSignal::CursorMoved);
            }
            SheetCommand::End => {
                self.cursor.end(pattern);
                self.state.updater.signal(SheetSignal::CursorMoved);
            }
            SheetCommand::Left => {
                if let Some(edge) = self.cursor.move_left(pattern) {
                    self.cursor.cross_column(edge);
                }
                self.state.updater.signal(SheetSignal::CursorMoved);
            }
            SheetCommand::Right => {
                if let Some(edge) = self.cursor.move_right(pattern) {
                    self.cursor.cross_column(edge);
                }
                self.state.updater.signal(SheetSignal::CursorMoved);
            }
            SheetCommand::ToggleInsert => {
                self.cursor.toggle_insert();
                self.state.updater.signal(SheetSignal::CursorMoved);
            }
            SheetCommand::Escape => {}
            SheetCommand::Delete => self.delete(),
            SheetCommand::Return => self.open_editor(),
            SheetCommand::Key(_) => {}
            SheetCommand::Undo => self.undo(),
            SheetCommand::Redo => self.redo(),
            SheetCommand::SelectColumn(column) => {
                if pattern.column(column).is_some() {
                    self.cursor.set_column(column);
                    self.cursor.set_slot(0);
                    self.state.updater.signal(SheetSignal::CursorMoved);
                }
            }
            SheetCommand::SelectPattern(id) => self.select_pattern(id),
            SheetCommand::RemoveColumn => self.remove_column(),
            SheetCommand::ShiftRows(delta) => {
                let command = ShiftRowsCommand::new(
                    self.pattern,
                    self.cursor.column(),
                    self.cursor.ts(),
                    delta,
                );
                let _ = self.execute(Box::new(command));
            }
            SheetCommand::SetLength(length) => {
                let _ = self.execute(Box::new(SetPatternLengthCommand::new(self.pattern, length)));
            }
        }
    }

    pub fn select_pattern(&mut self, id: usize) {
        if self.state.module.pattern(id).is_none() {
            self.report(&CommandError::Sheet(SheetError::NoSuchPattern(id)));
            return;
        }
        self.pattern = id;
        self.reseat_cursor();
        self.state
            .updater
            .signal(SheetSignal::PatternSelected { pattern: id });
    }

    /// Move the cursor to a position, switching patterns if needed
    pub fn jump_to(&mut self, pattern: usize, column: ColumnId, ts: Tstamp) {
        if self.editor.is_some() {
            return;
        }
        if pattern != self.pattern {
            self.select_pattern(pattern);
        }
        if let Some(p) = self.state.module.pattern(self.pattern) {
            self.cursor.set_position(p, column, ts);
            self.cursor.set_slot(0);
            self.cursor.clear_insert();
            self.state.updater.signal(SheetSignal::CursorMoved);
        }
    }

    fn remove_column(&mut self) {
        let ColumnId::Channel(index) = self.cursor.column() else {
            self.notify(Notification::info(
                NotificationCategory::Sheet,
                "The global column cannot be removed".to_string(),
            ));
            return;
        };
        if self
            .execute(Box::new(RemoveColumnCommand::new(self.pattern, index)))
            .is_ok()
        {
            self.reseat_cursor();
        }
    }

    fn undo(&mut self) {
        match self.history.undo(&mut self.state) {
            Ok(description) => {
                self.revalidate_cursor();
                self.notify(Notification::info(
                    NotificationCategory::Sheet,
                    format!("Undo: {}", description),
                ));
            }
            Err(e) => self.report(&e),
        }
    }

    fn redo(&mut self) {
        match self.history.redo(&mut self.state) {
            Ok(description) => {
                self.revalidate_cursor();
                self.notify(Notification::info(
                    NotificationCategory::Sheet,
                    format!("Redo: {}", description),
                ));
            }
            Err(e) => self.report(&e),
        }
    }

    fn trigger_pos(&self, index: usize) -> TriggerPos {
        TriggerPos {
            pattern: self.pattern,
            column: self.cursor.column(),
            ts: self.cursor.ts(),
            index,
        }
    }

    fn delete(&mut self) {
        if self.cursor.is_insert() {
            self.cursor.clear_insert();
            self.state.updater.signal(SheetSignal::CursorMoved);
            return;
        }
        let Some(pattern) = self.state.module.pattern(self.pattern) else {
            return;
        };
        let command: Box<dyn UndoableCommand> = match self.cursor.target(pattern) {
            SlotTarget::Head(index) => Box::new(RemoveTriggerCommand::new(self.trigger_pos(index))),
            SlotTarget::Field { trigger, field } => Box::new(ReplaceFieldCommand::new(
                self.trigger_pos(trigger),
                field,
                FieldChange::Reset,
            )),
            SlotTarget::End => return,
        };
        let _ = self.execute(command);
    }

    fn open_editor(&mut self) {
        let Some(pattern) = self.state.module.pattern(self.pattern) else {
            return;
        };
        let ts = self.cursor.ts();
        let column = self.cursor.column();
        if !pattern.is_visible(ts) {
            self.notify(Notification::info(
                NotificationCategory::Sheet,
                "Cannot add triggers at the end of the pattern".to_string(),
            ));
            return;
        }

        let row = self.cursor.row(pattern);
        let row_len = row.map(|r| r.len()).unwrap_or(0);
        let target = self.cursor.target(pattern);

        let editor = if self.cursor.is_insert() {
            let index = match target {
                SlotTarget::Head(i) => i,
                SlotTarget::Field { trigger, .. } => trigger,
                SlotTarget::End => row_len,
            };
            FieldEditor::new(
                EditorKind::TypeHead,
                EditTarget::NewTrigger { ts, index },
                column,
                "",
            )
        } else {
            match (target, row) {
                (SlotTarget::Head(i), Some(row)) => {
                    let kind = row.get(i).map(|t| t.kind()).unwrap_or_default();
                    FieldEditor::new(
                        EditorKind::TypeHead,
                        EditTarget::Kind { ts, trigger: i },
                        column,
                        kind,
                    )
                }
                (SlotTarget::Field { trigger, field }, Some(row)) => {
                    let Some(tr) = row.get(trigger) else {
                        return;
                    };
                    let Some(value) = tr.field(field) else {
                        return;
                    };
                    FieldEditor::for_field(
                        tr.field_type(field),
                        value,
                        EditTarget::Field { ts, trigger, field },
                        column,
                    )
                }
                _ => FieldEditor::new(
                    EditorKind::TypeHead,
                    EditTarget::NewTrigger { ts, index: row_len },
                    column,
                    "",
                ),
            }
        };

        self.editor = Some(editor);
        self.cursor.set_edit(true);
        self.state
            .updater
            .signal(SheetSignal::EditMode { active: true });
    }

    fn close_editor(&mut self) {
        self.editor = None;
        self.cursor.set_edit(false);
        self.state
            .updater
            .signal(SheetSignal::EditMode { active: false });
    }

    fn edit_key(&mut self, key: EditKey) {
        let Some(editor) = self.editor.as_mut() else {
            return;
        };
        match editor.handle_key(key) {
            EditOutcome::Pending | EditOutcome::Ignored => {}
            EditOutcome::Cancel => self.close_editor(),
            EditOutcome::Commit(committed) => {
                let target = editor.target();
                self.close_editor();
                self.commit(target, committed);
            }
        }
    }

    fn commit(&mut self, target: EditTarget, committed: Committed) {
        let column = self.cursor.column();
        match (target, committed) {
            (EditTarget::NewTrigger { ts, index }, Committed::Kind(kind)) => {
                let command =
                    InsertTriggerCommand::new(self.pattern, column, ts, Some(index), &kind, &[]);
                if self.execute(Box::new(command)).is_ok() {
                    self.cursor.clear_insert();
                    if let Some(row) = self.cursor_row() {
                        let slot = row.head_slot(index.min(row.len().saturating_sub(1)));
                        self.cursor.set_slot(slot);
                    }
                    self.audition(ts, index);
                }
            }
            (EditTarget::Kind { ts, trigger }, Committed::Kind(kind)) => {
                let pos = TriggerPos {
                    pattern: self.pattern,
                    column,
                    ts,
                    index: trigger,
                };
                let _ = self.execute(Box::new(ReplaceKindCommand::new(pos, &kind)));
            }
            (EditTarget::Field { ts, trigger, field }, Committed::Value(value)) => {
                let pos = TriggerPos {
                    pattern: self.pattern,
                    column,
                    ts,
                    index: trigger,
                };
                let command = ReplaceFieldCommand::new(pos, field, FieldChange::Set(value));
                if self.execute(Box::new(command)).is_ok() {
                    self.audition(ts, trigger);
                }
            }
            (target, committed) => {
                log::debug!("ignoring commit {:?} for {:?}", committed, target);
            }
        }
        self.state.updater.signal(SheetSignal::CursorMoved);
    }

    fn cursor_row(&self) -> Option<&crate::sheet::trigger_row::TriggerRow> {
        let pattern = self.state.module.pattern(self.pattern)?;
        self.cursor.row(pattern)
    }

    fn audition(&mut self, ts: Tstamp, index: usize) {
        let column = self.cursor.column();
        let event = self
            .state
            .module
            .pattern(self.pattern)
            .and_then(|p| p.column(column))
            .and_then(|c| c.trigger(ts, index))
            .and_then(engine_event);
        if let (Some(engine), Some(event)) = (self.audition.as_mut(), event) {
            if let Err(e) = engine.fire(column.channel(), event) {
                log::warn!("{}", e);
            }
        }
    }
}
