// Engine worker - drains the command queue on its own thread

use crate::engine::interface::EngineError;
use crate::messaging::channels::EngineCommandConsumer;
use crate::messaging::command::{EngineCommand, EngineEvent, EngineNotice};
use crate::sheet::tstamp::Tstamp;
use ringbuf::traits::Consumer;
use std::sync::mpsc::Sender;
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// The engine side that executes queued commands
pub trait EngineBackend: Send + 'static {
    fn apply(&mut self, command: &EngineCommand, notices: &Sender<EngineNotice>) -> Result<(), EngineError>;

    /// Called once per scheduling tick after the queue is drained
    fn tick(&mut self, _notices: &Sender<EngineNotice>) {}
}

/// Backend without audio output that tracks playback state
///
/// Reports every fired event back as a row notice, which drives the
/// position display when no audio engine is attached.
#[derive(Debug, Default)]
pub struct TraceBackend {
    pub mixing_rate: u32,
    pub position: Option<(usize, usize, Tstamp)>,
    pub fired: usize,
}

impl EngineBackend for TraceBackend {
    fn apply(&mut self, command: &EngineCommand, notices: &Sender<EngineNotice>) -> Result<(), EngineError> {
        match command {
            EngineCommand::Fire { channel, event } => {
                self.fired += 1;
                notices
                    .send(EngineNotice::Row {
                        channel: *channel,
                        event: event.clone(),
                    })
                    .map_err(|_| EngineError::Disconnected)?;
            }
            EngineCommand::SetPlayback { song, system, ts } => {
                self.position = Some((*song, *system, *ts));
                notices
                    .send(EngineNotice::Subsong {
                        channel: -1,
                        event: EngineEvent::new("Asubsong", vec![(*song).into()]),
                    })
                    .map_err(|_| EngineError::Disconnected)?;
            }
            EngineCommand::Stop => self.position = None,
            EngineCommand::SetMixingRate(hz) => {
                if *hz == 0 {
                    return Err(EngineError::Rejected("mixing rate 0".into()));
                }
                self.mixing_rate = *hz;
            }
            EngineCommand::Halt => {}
        }
        Ok(())
    }
}

/// Drain everything currently queued; returns `true` once the worker should stop
///
/// That is on `Halt`, or when nobody listens for notices any more.
/// Commands queued after `Halt` are dropped.
pub fn drain_commands<B: EngineBackend>(
    consumer: &mut EngineCommandConsumer,
    backend: &mut B,
    notices: &Sender<EngineNotice>,
) -> bool {
    while let Some(command) = consumer.try_pop() {
        if command == EngineCommand::Halt {
            consumer.clear();
            return true;
        }
        match backend.apply(&command, notices) {
            Ok(()) => {}
            Err(EngineError::Disconnected) => {
                log::debug!("notice receiver gone, stopping at {}", command.opcode());
                return true;
            }
            Err(e) => {
                log::warn!("{} ({})", e, command.opcode());
                let rejected = EngineNotice::Rejected {
                    reason: e.to_string(),
                };
                if notices.send(rejected).is_err() {
                    log::debug!("notice receiver gone, stopping");
                    return true;
                }
            }
        }
    }
    false
}

/// Run `backend` on a new thread until a `Halt` command arrives
///
/// The thread never blocks on the UI: it drains the queue, ticks the
/// backend and sleeps for `tick`. The backend is returned on join.
pub fn spawn_worker<B: EngineBackend>(
    mut consumer: EngineCommandConsumer,
    mut backend: B,
    notices: Sender<EngineNotice>,
    tick: Duration,
) -> std::io::Result<JoinHandle<B>> {
    thread::Builder::new()
        .name("engine-worker".into())
        .spawn(move || {
            log::debug!("engine worker started");
            loop {
                if drain_commands(&mut consumer, &mut backend, &notices) {
                    break;
                }
                backend.tick(&notices);
                thread::sleep(tick);
            }
            log::debug!("engine worker halted");
            backend
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messaging::channels::create_engine_channel;
    use ringbuf::traits::Producer;
    use std::sync::mpsc::channel;

    #[test]
    fn test_drain_stops_at_halt() {
        let (mut tx, mut rx) = create_engine_channel(8);
        let (notice_tx, notice_rx) = channel();
        let mut backend = TraceBackend::default();

        tx.try_push(EngineCommand::SetMixingRate(44100)).unwrap();
        tx.try_push(EngineCommand::Halt).unwrap();
        tx.try_push(EngineCommand::SetMixingRate(96000)).unwrap();

        assert!(drain_commands(&mut rx, &mut backend, &notice_tx));
        assert_eq!(backend.mixing_rate, 44100);
        assert!(notice_rx.try_recv().is_err());
    }

    #[test]
    fn test_rejection_is_reported() {
        let (mut tx, mut rx) = create_engine_channel(8);
        let (notice_tx, notice_rx) = channel();
        let mut backend = TraceBackend::default();

        tx.try_push(EngineCommand::SetMixingRate(0)).unwrap();
        tx.try_push(EngineCommand::Stop).unwrap();

        assert!(!drain_commands(&mut rx, &mut backend, &notice_tx));
        assert!(matches!(notice_rx.try_recv(), Ok(EngineNotice::Rejected { .. })));
    }

    #[test]
    fn test_hung_up_receiver_stops_worker() {
        let (mut tx, rx) = create_engine_channel(8);
        let (notice_tx, notice_rx) = channel();
        drop(notice_rx);

        tx.try_push(EngineCommand::SetMixingRate(48000)).unwrap();
        tx.try_push(EngineCommand::Fire {
            channel: 0,
            event: EngineEvent::new("n-", vec![]),
        })
        .unwrap();

        let worker = spawn_worker(rx, TraceBackend::default(), notice_tx, Duration::from_millis(1)).unwrap();
        let backend = worker.join().unwrap();
        assert_eq!(backend.mixing_rate, 48000);
        assert_eq!(backend.fired, 1);
    }
}
