// Field editor - single-line text editing of a type head or trigger field

use crate::sheet::column::ColumnId;
use crate::sheet::trigger::{FieldType, FieldValue, schema};
use crate::sheet::tstamp::Tstamp;
use serde_json::Value;

/// Which editor a slot opens
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditorKind {
    TypeHead,
    Field(FieldType),
    /// Field of an unregistered kind; any text is stored as a string
    Raw,
}

/// What a committed value is applied to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditTarget {
    /// New trigger inserted before position `index` of the row at `ts`
    NewTrigger { ts: Tstamp, index: usize },
    /// Kind of an existing trigger
    Kind { ts: Tstamp, trigger: usize },
    Field { ts: Tstamp, trigger: usize, field: usize },
}

/// Keys understood by an active editor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditKey {
    Char(char),
    Backspace,
    Delete,
    Left,
    Right,
    Home,
    End,
    Tab,
    Return,
    Escape,
}

#[derive(Debug, Clone, PartialEq)]
pub enum EditOutcome {
    /// Key consumed, editing continues
    Pending,
    /// Key not accepted by this editor
    Ignored,
    Commit(Committed),
    Cancel,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Committed {
    Kind(String),
    Value(Value),
}

#[derive(Debug, Clone)]
pub struct FieldEditor {
    kind: EditorKind,
    target: EditTarget,
    column: ColumnId,
    text: Vec<char>,
    caret: usize,
}

impl FieldEditor {
    pub fn new(kind: EditorKind, target: EditTarget, column: ColumnId, initial: &str) -> Self {
        let text: Vec<char> = initial.chars().collect();
        let caret = text.len();
        Self {
            kind,
            target,
            column,
            text,
            caret,
        }
    }

    /// Editor for an existing field value
    pub fn for_field(
        ty: Option<FieldType>,
        value: &FieldValue,
        target: EditTarget,
        column: ColumnId,
    ) -> Self {
        let kind = ty.map(EditorKind::Field).unwrap_or(EditorKind::Raw);
        let initial = match (value, ty) {
            (FieldValue::Real(v), Some(FieldType::Real)) => format_real(*v),
            (FieldValue::Tstamp(ts), _) => format_real(ts.as_f64()),
            (FieldValue::Raw(Value::String(s)), None) => s.clone(),
            _ => value.display_text(ty),
        };
        Self::new(kind, target, column, &initial)
    }

    pub fn kind(&self) -> EditorKind {
        self.kind
    }

    pub fn target(&self) -> EditTarget {
        self.target
    }

    pub fn text(&self) -> String {
        self.text.iter().collect()
    }

    pub fn caret(&self) -> usize {
        self.caret
    }

    fn accepts(&self, c: char) -> bool {
        match self.kind {
            EditorKind::TypeHead => c.is_ascii_graphic(),
            EditorKind::Raw => !c.is_control(),
            EditorKind::Field(ty) => match ty {
                FieldType::Int => c.is_ascii_digit() || c == '-',
                FieldType::Real => c.is_ascii_digit() || matches!(c, '-' | '+' | '.' | 'e' | 'E'),
                FieldType::Tstamp => c.is_ascii_digit() || matches!(c, '-' | '.'),
                FieldType::Note => {
                    c.is_ascii_digit()
                        || matches!(c, 'A'..='G' | 'a'..='g' | '#' | '+' | '-' | '.')
                }
                FieldType::Identifier => {
                    c.is_ascii_lowercase() || c.is_ascii_digit() || matches!(c, '_' | '.' | '/')
                }
                FieldType::Bool => matches!(c, ' ' | 't' | 'f' | '0' | '1'),
            },
        }
    }

    fn set_text(&mut self, text: &str) {
        self.text = text.chars().collect();
        self.caret = self.text.len();
    }

    pub fn handle_key(&mut self, key: EditKey) -> EditOutcome {
        match key {
            EditKey::Escape => return EditOutcome::Cancel,
            EditKey::Return => return self.commit(),
            EditKey::Char(c) if self.kind == EditorKind::Field(FieldType::Bool) => {
                let value = match c {
                    ' ' => self.text() != "true",
                    't' | '1' => true,
                    'f' | '0' => false,
                    _ => return EditOutcome::Ignored,
                };
                self.set_text(if value { "true" } else { "false" });
            }
            EditKey::Char(c) => {
                if !self.accepts(c) {
                    return EditOutcome::Ignored;
                }
                self.text.insert(self.caret, c);
                self.caret += 1;
            }
            EditKey::Backspace => {
                if self.caret == 0 {
                    return EditOutcome::Ignored;
                }
                self.caret -= 1;
                self.text.remove(self.caret);
            }
            EditKey::Delete => {
                if self.caret >= self.text.len() {
                    return EditOutcome::Ignored;
                }
                self.text.remove(self.caret);
            }
            EditKey::Left => self.caret = self.caret.saturating_sub(1),
            EditKey::Right => self.caret = (self.caret + 1).min(self.text.len()),
            EditKey::Home => self.caret = 0,
            EditKey::End => self.caret = self.text.len(),
            EditKey::Tab => {
                if self.kind != EditorKind::TypeHead {
                    return EditOutcome::Ignored;
                }
                self.complete();
            }
        }
        EditOutcome::Pending
    }

    /// Kinds fitting the column that start with the current text
    pub fn completions(&self) -> Vec<&'static str> {
        schema().complete(&self.text(), self.column)
    }

    /// Extend the text to the longest prefix shared by all completions
    fn complete(&mut self) {
        let candidates = self.completions();
        let Some(first) = candidates.first() else {
            return;
        };
        let common = candidates.iter().fold(first.to_string(), |acc, kind| {
            acc.chars()
                .zip(kind.chars())
                .take_while(|(a, b)| a == b)
                .map(|(a, _)| a)
                .collect()
        });
        if common.len() > self.text.len() {
            self.set_text(&common);
        }
    }

    fn commit(&self) -> EditOutcome {
        let text = self.text();
        match self.kind {
            EditorKind::TypeHead => {
                let kind = text.trim();
                if kind.is_empty() {
                    EditOutcome::Cancel
                } else {
                    EditOutcome::Commit(Committed::Kind(kind.to_string()))
                }
            }
            EditorKind::Field(FieldType::Bool) => {
                EditOutcome::Commit(Committed::Value(Value::Bool(text == "true")))
            }
            _ => EditOutcome::Commit(Committed::Value(Value::String(text))),
        }
    }
}

/// Shortest decimal text for a real, without a trailing `.0` on integers
fn format_real(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        format!("{}", value)
    }
}
