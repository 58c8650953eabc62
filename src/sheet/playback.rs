// Playback cursor - walks a song and streams its triggers to the engine

use crate::engine::interface::{AudioEngine, EngineError};
use crate::messaging::command::EngineEvent;
use crate::sheet::column::ColumnId;
use crate::sheet::module::Module;
use crate::sheet::trigger::Trigger;
use crate::sheet::tstamp::Tstamp;

/// Engine form of a trigger; `None` for triggers that must not be played
pub fn engine_event(trigger: &Trigger) -> Option<EngineEvent> {
    trigger
        .is_valid()
        .then(|| EngineEvent::new(trigger.kind(), trigger.raw_fields()))
}

/// Position in a song's order list
///
/// Each call to `advance` dispatches the triggers in `[position, position +
/// delta)`, ordered by system, then timestamp, then column with the global
/// column first. The stream is strictly monotone for one run.
#[derive(Debug, Clone)]
pub struct PlaybackCursor {
    song: usize,
    system: usize,
    ts: Tstamp,
    finished: bool,
}

impl PlaybackCursor {
    pub fn new(song: usize) -> Self {
        Self::at(song, 0, Tstamp::ZERO)
    }

    pub fn at(song: usize, system: usize, ts: Tstamp) -> Self {
        Self {
            song,
            system,
            ts: ts.max(Tstamp::ZERO),
            finished: false,
        }
    }

    pub fn song(&self) -> usize {
        self.song
    }

    pub fn system(&self) -> usize {
        self.system
    }

    pub fn ts(&self) -> Tstamp {
        self.ts
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Tell the engine where playback starts
    pub fn start(&self, engine: &mut dyn AudioEngine) -> Result<(), EngineError> {
        engine.set_playback(self.song, self.system, self.ts)
    }

    /// Advance by `delta`, firing every playable trigger crossed
    ///
    /// Invalid triggers, dangling pattern references and rows at or after
    /// the pattern length are skipped. Rejected events are logged and
    /// playback continues. Returns the number of events accepted.
    pub fn advance(&mut self, module: &Module, delta: Tstamp, engine: &mut dyn AudioEngine) -> usize {
        let Some(song) = module.song(self.song) else {
            self.finished = true;
            return 0;
        };

        let mut remaining = delta.max(Tstamp::ZERO);
        let mut fired = 0;

        while !self.finished {
            let Some(&instance) = song.order().get(self.system) else {
                self.finished = true;
                break;
            };

            let Some(pattern) = module.resolve(instance) else {
                log::debug!(
                    "skipping dangling pattern reference {:?} in song {}",
                    instance,
                    self.song
                );
                self.next_system(song.len());
                continue;
            };

            let end = self.ts + remaining;
            let stop = end.min(pattern.length());

            // Columns are visited global first, then ascending; the stable
            // sort keeps that order within one timestamp
            let mut events: Vec<(Tstamp, ColumnId, &Trigger)> = Vec::new();
            for column in pattern.columns() {
                for (ts, row) in column.iter_range(self.ts, stop) {
                    if *ts >= stop {
                        continue;
                    }
                    events.extend(row.iter().map(|trigger| (*ts, column.id(), trigger)));
                }
            }
            events.sort_by_key(|(ts, _, _)| *ts);

            for (ts, column, trigger) in events {
                let Some(event) = engine_event(trigger) else {
                    continue;
                };
                match engine.fire(column.channel(), event) {
                    Ok(()) => fired += 1,
                    Err(e) => log::warn!("{} at {} in column {}", e, ts, column),
                }
            }

            if end < pattern.length() {
                self.ts = end;
                break;
            }
            remaining = end - pattern.length();
            self.next_system(song.len());
        }

        fired
    }

    fn next_system(&mut self, order_len: usize) {
        self.system += 1;
        self.ts = Tstamp::ZERO;
        if self.system >= order_len {
            self.finished = true;
        }
    }
}
