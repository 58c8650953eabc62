// Sheet playback through the engine thread and back to the UI queue

use kunquat_sheet::engine::{
    ChannelSource, EngineListener, EventPump, QueuedEngine, TraceBackend, dispatch_notice, spawn_worker,
};
use kunquat_sheet::messaging::channels::{create_engine_channel, create_notice_channel};
use kunquat_sheet::messaging::command::EngineEvent;
use kunquat_sheet::sheet::Song;
use kunquat_sheet::sheet::playback::PlaybackCursor;
use kunquat_sheet::{AudioEngine, ColumnId, Module, Pattern, Tstamp};
use ringbuf::traits::Consumer;
use serde_json::json;
use std::sync::mpsc::channel;
use std::thread;
use std::time::{Duration, Instant};

#[derive(Default)]
struct RowLog {
    rows: Vec<(i32, String)>,
    subsongs: usize,
}

impl EngineListener for RowLog {
    fn on_subsong(&mut self, _channel: i32, _event: &EngineEvent) {
        self.subsongs += 1;
    }

    fn on_row(&mut self, channel: i32, event: &EngineEvent) {
        self.rows.push((channel, event.kind.clone()));
    }
}

fn two_beat_song() -> (Module, usize) {
    let mut module = Module::new();
    let mut pattern = Pattern::new(Tstamp::from_beats(2));
    pattern
        .column_mut(ColumnId::Global)
        .unwrap()
        .insert(Tstamp::ZERO, "W.t", &[json!(90)])
        .unwrap();
    let column = pattern.column_mut(ColumnId::Channel(2)).unwrap();
    column.insert(Tstamp::ZERO, "n+", &[json!(0)]).unwrap();
    column.insert(Tstamp::from_beats(1), "n-", &[]).unwrap();
    let id = module.add_pattern(pattern).unwrap();
    let instance = module.new_instance(id).unwrap();
    let mut song = Song::default();
    song.push(instance);
    let song = module.add_song(song).unwrap();
    (module, song)
}

#[test]
fn test_playback_reaches_listener_in_order() {
    let (module, song) = two_beat_song();

    let (command_tx, command_rx) = create_engine_channel(64);
    let (notice_tx, notice_rx) = channel();
    let (notice_prod, mut notice_cons) = create_notice_channel(64);

    let worker = spawn_worker(command_rx, TraceBackend::default(), notice_tx, Duration::from_millis(1)).unwrap();
    let pump = EventPump::spawn(ChannelSource::new(notice_rx), notice_prod).unwrap();

    let mut engine = QueuedEngine::new(command_tx);
    engine.set_mixing_rate(48000).unwrap();
    let mut playback = PlaybackCursor::new(song);
    playback.start(&mut engine).unwrap();
    let fired = playback.advance(&module, Tstamp::from_beats(2), &mut engine);
    assert_eq!(fired, 3);
    assert!(playback.is_finished());

    let mut log = RowLog::default();
    let deadline = Instant::now() + Duration::from_secs(5);
    while log.rows.len() < 3 && Instant::now() < deadline {
        while let Some(notice) = notice_cons.try_pop() {
            dispatch_notice(&mut log, &notice);
        }
        thread::sleep(Duration::from_millis(2));
    }

    assert_eq!(log.subsongs, 1);
    assert_eq!(
        log.rows,
        vec![(-1, "W.t".to_string()), (2, "n+".to_string()), (2, "n-".to_string())]
    );

    engine.halt().unwrap();
    let backend = worker.join().unwrap();
    assert_eq!(backend.fired, 3);
    assert_eq!(backend.mixing_rate, 48000);
    assert_eq!(backend.position, Some((song, 0, Tstamp::ZERO)));
    pump.halt();
}

#[test]
fn test_halt_drops_later_commands() {
    let (command_tx, command_rx) = create_engine_channel(16);
    let (notice_tx, _notice_rx) = channel();

    let mut engine = QueuedEngine::new(command_tx);
    engine.set_mixing_rate(44100).unwrap();
    engine.halt().unwrap();
    engine.set_mixing_rate(96000).unwrap();

    let worker = spawn_worker(command_rx, TraceBackend::default(), notice_tx, Duration::from_millis(1)).unwrap();
    let backend = worker.join().unwrap();
    assert_eq!(backend.mixing_rate, 44100);
}
