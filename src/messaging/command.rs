// Engine messages - UI → engine commands and engine → UI notices

use crate::sheet::tstamp::Tstamp;
use serde_json::Value;

/// One event as the engine receives it: `[kind, [fields...]]`
#[derive(Debug, Clone, PartialEq)]
pub struct EngineEvent {
    pub kind: String,
    pub args: Vec<Value>,
}

impl EngineEvent {
    pub fn new(kind: &str, args: Vec<Value>) -> Self {
        Self {
            kind: kind.to_string(),
            args,
        }
    }

    pub fn to_json(&self) -> Value {
        Value::Array(vec![
            Value::String(self.kind.clone()),
            Value::Array(self.args.clone()),
        ])
    }
}

/// Command `(opcode, args)` queued for the engine thread
#[derive(Debug, Clone, PartialEq)]
pub enum EngineCommand {
    /// Fire an event on a channel (`-1` for global events)
    Fire { channel: i32, event: EngineEvent },
    SetPlayback { song: usize, system: usize, ts: Tstamp },
    Stop,
    SetMixingRate(u32),
    /// Drain up to here and exit
    Halt,
}

impl EngineCommand {
    pub fn opcode(&self) -> &'static str {
        match self {
            EngineCommand::Fire { .. } => "fire",
            EngineCommand::SetPlayback { .. } => "set_playback",
            EngineCommand::Stop => "stop",
            EngineCommand::SetMixingRate(_) => "set_mixing_rate",
            EngineCommand::Halt => "halt",
        }
    }
}

/// Callback from the engine, delivered in the UI context
#[derive(Debug, Clone, PartialEq)]
pub enum EngineNotice {
    Subsong { channel: i32, event: EngineEvent },
    Section { channel: i32, event: EngineEvent },
    Pattern { channel: i32, event: EngineEvent },
    Row { channel: i32, event: EngineEvent },
    Peaks {
        db_l: f64,
        db_r: f64,
        abs_l: f64,
        abs_r: f64,
        nframes: usize,
    },
    /// An event was rejected; the engine carries on
    Rejected { reason: String },
}
