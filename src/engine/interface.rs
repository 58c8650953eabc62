// Audio engine contract as seen from the sheet

use crate::messaging::command::{EngineEvent, EngineNotice};
use crate::sheet::tstamp::Tstamp;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum EngineError {
    #[error("Engine rejected event: {0}")]
    Rejected(String),
    #[error("Engine command queue is full")]
    QueueFull,
    #[error("Engine notice receiver hung up")]
    Disconnected,
}

/// Calls the sheet makes into the audio engine
pub trait AudioEngine {
    /// Enqueue one event at the current playback position; `channel` is `-1` for global events
    fn fire(&mut self, channel: i32, event: EngineEvent) -> Result<(), EngineError>;

    fn set_playback(&mut self, song: usize, system: usize, ts: Tstamp) -> Result<(), EngineError>;

    fn stop(&mut self) -> Result<(), EngineError>;

    fn set_mixing_rate(&mut self, hz: u32) -> Result<(), EngineError>;
}

/// Engine callbacks, invoked in the UI context
pub trait EngineListener {
    fn on_subsong(&mut self, _channel: i32, _event: &EngineEvent) {}
    fn on_section(&mut self, _channel: i32, _event: &EngineEvent) {}
    fn on_pattern(&mut self, _channel: i32, _event: &EngineEvent) {}
    fn on_row(&mut self, _channel: i32, _event: &EngineEvent) {}
    fn on_peaks(&mut self, _db_l: f64, _db_r: f64, _abs_l: f64, _abs_r: f64, _nframes: usize) {}
}

/// Route one notice to the matching listener callback
pub fn dispatch_notice(listener: &mut dyn EngineListener, notice: &EngineNotice) {
    match notice {
        EngineNotice::Subsong { channel, event } => listener.on_subsong(*channel, event),
        EngineNotice::Section { channel, event } => listener.on_section(*channel, event),
        EngineNotice::Pattern { channel, event } => listener.on_pattern(*channel, event),
        EngineNotice::Row { channel, event } => listener.on_row(*channel, event),
        EngineNotice::Peaks {
            db_l,
            db_r,
            abs_l,
            abs_r,
            nframes,
        } => listener.on_peaks(*db_l, *db_r, *abs_l, *abs_r, *nframes),
        EngineNotice::Rejected { reason } => log::warn!("Engine rejected event: {}", reason),
    }
}

/// In-process engine that records every call
///
/// Used for offline checks and as a test double.
#[derive(Debug, Default)]
pub struct RecordingEngine {
    pub fired: Vec<(i32, EngineEvent)>,
    pub playback: Option<(usize, usize, Tstamp)>,
    pub mixing_rate: Option<u32>,
    /// Kinds this engine refuses
    pub reject_kinds: Vec<String>,
}

impl RecordingEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fired_kinds(&self) -> Vec<(i32, String)> {
        self.fired
            .iter()
            .map(|(ch, ev)| (*ch, ev.kind.clone()))
            .collect()
    }
}

impl AudioEngine for RecordingEngine {
    fn fire(&mut self, channel: i32, event: EngineEvent) -> Result<(), EngineError> {
        if self.reject_kinds.contains(&event.kind) {
            return Err(EngineError::Rejected(event.kind));
        }
        self.fired.push((channel, event));
        Ok(())
    }

    fn set_playback(&mut self, song: usize, system: usize, ts: Tstamp) -> Result<(), EngineError> {
        self.playback = Some((song, system, ts));
        Ok(())
    }

    fn stop(&mut self) -> Result<(), EngineError> {
        self.playback = None;
        Ok(())
    }

    fn set_mixing_rate(&mut self, hz: u32) -> Result<(), EngineError> {
        self.mixing_rate = Some(hz);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Default)]
    struct PositionDisplay {
        rows: Vec<i32>,
        peak: Option<f64>,
    }

    impl EngineListener for PositionDisplay {
        fn on_row(&mut self, channel: i32, _event: &EngineEvent) {
            self.rows.push(channel);
        }

        fn on_peaks(&mut self, db_l: f64, _db_r: f64, _abs_l: f64, _abs_r: f64, _nframes: usize) {
            self.peak = Some(db_l);
        }
    }

    #[test]
    fn test_dispatch_notice() {
        let mut display = PositionDisplay::default();
        let event = EngineEvent::new("Arow", vec![json!([1, 0])]);
        dispatch_notice(&mut display, &EngineNotice::Row { channel: -1, event });
        dispatch_notice(
            &mut display,
            &EngineNotice::Peaks {
                db_l: -6.0,
                db_r: -7.0,
                abs_l: 0.5,
                abs_r: 0.4,
                nframes: 128,
            },
        );
        assert_eq!(display.rows, vec![-1]);
        assert_eq!(display.peak, Some(-6.0));
    }

    #[test]
    fn test_recording_engine_rejects() {
        let mut engine = RecordingEngine::new();
        engine.reject_kinds.push("h".into());
        assert!(engine.fire(0, EngineEvent::new("n+", vec![])).is_ok());
        assert_eq!(
            engine.fire(0, EngineEvent::new("h", vec![])),
            Err(EngineError::Rejected("h".into()))
        );
        assert_eq!(engine.fired_kinds(), vec![(0, "n+".to_string())]);
    }
}
