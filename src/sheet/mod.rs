// Sheet - pattern data model, cursor and editing operations

pub mod column;
pub mod cursor;
pub mod editor;
pub mod field_edit;
pub mod module;
pub mod pattern;
pub mod playback;
pub mod signals;
pub mod song;
pub mod trigger;
pub mod trigger_row;
pub mod tstamp;

pub use column::{Column, ColumnId};
pub use cursor::{Cursor, CursorMotion, Direction, EdgeSignal};
pub use editor::{Sheet, SheetCommand};
pub use module::Module;
pub use pattern::Pattern;
pub use song::{PatternInstanceRef, Song, SongHeader};
pub use trigger::{Trigger, schema};
pub use trigger_row::TriggerRow;
pub use tstamp::{BEAT, Tstamp, TstampError};

use thiserror::Error;

/// Channel columns per pattern
pub const COLUMNS_MAX: usize = 64;
pub const INSTRUMENTS_MAX: usize = 256;
pub const EFFECTS_MAX: usize = 256;
pub const GENERATORS_MAX: usize = 8;
pub const DSPS_MAX: usize = 16;
pub const PATTERNS_MAX: usize = 1024;
pub const PATTERN_INSTANCES_MAX: usize = 1024;
pub const SONGS_MAX: usize = 256;
pub const CONTROLS_MAX: usize = 256;
pub const SCALES_MAX: usize = 16;
pub const SCALE_NOTES_MAX: usize = 128;
pub const HITS_MAX: usize = 32;
pub const ARPEGGIO_NOTES_MAX: usize = 32;
pub const TEMPO_MIN: f64 = 1.0;
pub const TEMPO_MAX: f64 = 999.0;

/// Errors from sheet editing operations
///
/// None of these leave the model half-modified: an operation either
/// succeeds or returns one of these with the state unchanged.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SheetError {
    #[error("Event {kind} is not allowed in column {column}")]
    KindNotAllowedInColumn { kind: String, column: ColumnId },

    #[error("No trigger row at {0}")]
    NoSuchRow(Tstamp),

    #[error("No trigger {index} at {ts}")]
    NoSuchTrigger { ts: Tstamp, index: usize },

    #[error("No field {index} in trigger")]
    NoSuchField { index: usize },

    #[error("Pattern {0} does not exist")]
    NoSuchPattern(usize),

    #[error("Song {0} does not exist")]
    NoSuchSong(usize),

    #[error("Column {0} is out of range")]
    ColumnOutOfRange(ColumnId),

    #[error("Negative timestamp {0} in pattern")]
    NegativeTimestamp(Tstamp),

    #[error("Too many {0}")]
    LimitReached(&'static str),

    #[error("Invalid value for variable {0}")]
    InvalidVariable(String),

    #[error("Not a parameter key: {0}")]
    InvalidBlobKey(String),

    #[error(transparent)]
    InvalidArithmetic(#[from] TstampError),
}
