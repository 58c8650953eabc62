// QueuedEngine - AudioEngine front end that enqueues commands for the engine thread

use crate::engine::interface::{AudioEngine, EngineError};
use crate::messaging::channels::EngineCommandProducer;
use crate::messaging::command::{EngineCommand, EngineEvent};
use crate::sheet::tstamp::Tstamp;
use std::sync::{Arc, Mutex};

/// Cloneable producer side of the engine command queue
///
/// Clones share one ring buffer producer, so several UI components can
/// feed the same engine thread. Pushing never blocks; a full queue is
/// reported as `EngineError::QueueFull`.
#[derive(Clone)]
pub struct QueuedEngine {
    sender: Arc<Mutex<EngineCommandProducer>>,
}

impl QueuedEngine {
    pub fn new(sender: EngineCommandProducer) -> Self {
        Self {
            sender: Arc::new(Mutex::new(sender)),
        }
    }

    /// Push a command; commands from one producer are never reordered
    pub fn send(&self, command: EngineCommand) -> Result<(), EngineError> {
        log::debug!("engine <- {}", command.opcode());
        let mut sender = self
            .sender
            .lock()
            .map_err(|_| EngineError::Rejected("command queue poisoned".into()))?;
        ringbuf::traits::Producer::try_push(&mut *sender, command)
            .map_err(|_| EngineError::QueueFull)
    }

    /// Ask the engine thread to exit after draining earlier commands
    pub fn halt(&self) -> Result<(), EngineError> {
        self.send(EngineCommand::Halt)
    }
}

impl AudioEngine for QueuedEngine {
    fn fire(&mut self, channel: i32, event: EngineEvent) -> Result<(), EngineError> {
        self.send(EngineCommand::Fire { channel, event })
    }

    fn set_playback(&mut self, song: usize, system: usize, ts: Tstamp) -> Result<(), EngineError> {
        self.send(EngineCommand::SetPlayback { song, system, ts })
    }

    fn stop(&mut self) -> Result<(), EngineError> {
        self.send(EngineCommand::Stop)
    }

    fn set_mixing_rate(&mut self, hz: u32) -> Result<(), EngineError> {
        self.send(EngineCommand::SetMixingRate(hz))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messaging::channels::create_engine_channel;
    use ringbuf::traits::Consumer;

    #[test]
    fn test_commands_in_order() {
        let (tx, mut rx) = create_engine_channel(8);
        let mut engine = QueuedEngine::new(tx);
        let mut other = engine.clone();

        engine.set_mixing_rate(48000).unwrap();
        other.fire(-1, EngineEvent::new("W.t", vec![])).unwrap();
        engine.stop().unwrap();

        let opcodes: Vec<_> = std::iter::from_fn(|| rx.try_pop())
            .map(|c| c.opcode())
            .collect();
        assert_eq!(opcodes, vec!["set_mixing_rate", "fire", "stop"]);
    }

    #[test]
    fn test_full_queue() {
        let (tx, _rx) = create_engine_channel(1);
        let mut engine = QueuedEngine::new(tx);
        engine.stop().unwrap();
        assert_eq!(engine.stop(), Err(EngineError::QueueFull));
    }
}
