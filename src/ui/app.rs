// Main UI App - sheet editor window with playback and archive handling

use crate::config::SheetConfig;
use crate::engine::{
    AudioEngine, CancelFlag, ChannelSource, EngineListener, EventPump, QueuedEngine, TraceBackend,
    dispatch_notice, spawn_worker,
};
use crate::messaging::channels::{
    NoticeConsumer, NotificationConsumer, create_engine_channel, create_notice_channel,
    create_notification_channel,
};
use crate::messaging::command::EngineEvent;
use crate::messaging::notification::{Notification, NotificationCategory, NotificationLevel};
use crate::project::archive::{self, ArchiveFormat, ArchiveKind};
use crate::project::codec::{load_module, save_module};
use crate::project::store::MemoryStore;
use crate::project::ProjectError;
use crate::sheet::editor::Sheet;
use crate::sheet::module::Module;
use crate::sheet::playback::PlaybackCursor;
use crate::sheet::tstamp::Tstamp;
use crate::ui::sheet_panel::SheetPanel;
use eframe::egui;
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

const ENGINE_QUEUE_CAPACITY: usize = 1024;
const NOTICE_QUEUE_CAPACITY: usize = 512;
const NOTIFICATION_QUEUE_CAPACITY: usize = 256;
const ENGINE_TICK: Duration = Duration::from_millis(5);
const MIXING_RATE: u32 = 48000;

/// Playback position and level meter fed by engine notices
#[derive(Debug, Default)]
struct PositionDisplay {
    song: Option<usize>,
    last_row: Option<(i32, String)>,
    peak_db: Option<(f64, f64)>,
}

impl EngineListener for PositionDisplay {
    fn on_subsong(&mut self, _channel: i32, event: &EngineEvent) {
        self.song = event
            .args
            .first()
            .and_then(|v| v.as_u64())
            .map(|s| s as usize);
    }

    fn on_row(&mut self, channel: i32, event: &EngineEvent) {
        self.last_row = Some((channel, event.kind.clone()));
    }

    fn on_peaks(&mut self, db_l: f64, db_r: f64, _abs_l: f64, _abs_r: f64, _nframes: usize) {
        self.peak_db = Some((db_l, db_r));
    }
}

struct Playback {
    cursor: PlaybackCursor,
    last_tick: Instant,
}

pub struct SheetApp {
    sheet: Sheet,
    panel: SheetPanel,
    engine: QueuedEngine,
    worker: Option<JoinHandle<TraceBackend>>,
    pump: Option<EventPump>,
    notice_rx: NoticeConsumer,
    position: PositionDisplay,
    playback: Option<Playback>,
    // Notification system
    notification_rx: NotificationConsumer,
    notification_queue: VecDeque<Notification>,
    max_notifications: usize,
    path: Option<PathBuf>,
}

impl SheetApp {
    pub fn new(config: SheetConfig, path: Option<PathBuf>) -> Self {
        let (engine_tx, engine_rx) = create_engine_channel(ENGINE_QUEUE_CAPACITY);
        let (notice_tx, notice_rx) = create_notice_channel(NOTICE_QUEUE_CAPACITY);
        let (notification_tx, notification_rx) = create_notification_channel(NOTIFICATION_QUEUE_CAPACITY);

        // Worker notices reach the UI queue through the pump thread
        let (worker_tx, worker_rx) = mpsc::channel();
        let worker = spawn_worker(engine_rx, TraceBackend::default(), worker_tx, ENGINE_TICK)
            .map_err(|e| log::error!("Failed to start engine worker: {}", e))
            .ok();
        let pump = EventPump::spawn(ChannelSource::new(worker_rx), notice_tx)
            .map_err(|e| log::error!("Failed to start event pump: {}", e))
            .ok();

        let mut engine = QueuedEngine::new(engine_tx);
        if let Err(e) = engine.set_mixing_rate(MIXING_RATE) {
            log::warn!("{}", e);
        }

        let mut sheet = Sheet::new(Module::new(), config.motion, config.layout.px_per_beat);
        sheet.set_notifier(notification_tx);
        sheet.set_audition(Some(Box::new(engine.clone())));
        let panel = SheetPanel::new(&config, &mut sheet);

        let mut app = Self {
            sheet,
            panel,
            engine,
            worker,
            pump,
            notice_rx,
            position: PositionDisplay::default(),
            playback: None,
            notification_rx,
            notification_queue: VecDeque::new(),
            max_notifications: 10,
            path: None,
        };
        if let Some(path) = path {
            app.open(&path);
        }
        app
    }

    fn push_notification(&mut self, notification: Notification) {
        notification.log();
        self.notification_queue.push_back(notification);
        if self.notification_queue.len() > self.max_notifications {
            self.notification_queue.pop_front();
        }
    }

    /// Read new notifications from the ring buffer into the queue
    fn update_notifications(&mut self) {
        while let Some(notification) = ringbuf::traits::Consumer::try_pop(&mut self.notification_rx) {
            self.notification_queue.push_back(notification);
            if self.notification_queue.len() > self.max_notifications {
                self.notification_queue.pop_front();
            }
        }
    }

    /// Notifications younger than five seconds, newest first
    fn recent_notifications(&self) -> Vec<&Notification> {
        self.notification_queue
            .iter()
            .rev()
            .filter(|n| n.is_recent(5000))
            .take(3)
            .collect()
    }

    fn poll_notices(&mut self) {
        while let Some(notice) = ringbuf::traits::Consumer::try_pop(&mut self.notice_rx) {
            dispatch_notice(&mut self.position, &notice);
        }
    }

    fn open(&mut self, path: &Path) {
        match read_module(path) {
            Ok((module, problems)) => {
                self.stop();
                self.sheet.replace_module(module);
                self.panel.reload(&mut self.sheet);
                self.path = Some(path.to_path_buf());
                let message = if problems == 0 {
                    format!("Opened {}", path.display())
                } else {
                    format!("Opened {} ({} damaged entries skipped)", path.display(), problems)
                };
                self.push_notification(Notification::info(NotificationCategory::Store, message));
            }
            Err(e) => self.push_notification(Notification::error(
                NotificationCategory::Store,
                format!("Cannot open {}: {}", path.display(), e),
            )),
        }
    }

    fn save(&mut self, path: &Path) {
        match write_module(self.sheet.module(), path) {
            Ok(count) => {
                self.path = Some(path.to_path_buf());
                self.push_notification(Notification::info(
                    NotificationCategory::Store,
                    format!("Saved {} entries to {}", count, path.display()),
                ));
            }
            Err(e) => self.push_notification(Notification::error(
                NotificationCategory::Store,
                format!("Cannot save {}: {}", path.display(), e),
            )),
        }
    }

    fn open_dialog(&mut self) {
        let picked = rfd::FileDialog::new()
            .add_filter("Kunquat module", &["kqt", "gz", "bz2"])
            .pick_file();
        if let Some(path) = picked {
            self.open(&path);
        }
    }

    fn save_dialog(&mut self) {
        let picked = rfd::FileDialog::new()
            .add_filter("Kunquat module", &["kqt", "gz", "bz2"])
            .set_file_name("untitled.kqt.gz")
            .save_file();
        if let Some(path) = picked {
            self.save(&path);
        }
    }

    fn play(&mut self) {
        self.stop();
        let cursor = PlaybackCursor::new(0);
        if let Err(e) = cursor.start(&mut self.engine) {
            self.push_notification(Notification::warning(NotificationCategory::Engine, e.to_string()));
            return;
        }
        self.playback = Some(Playback {
            cursor,
            last_tick: Instant::now(),
        });
    }

    fn stop(&mut self) {
        if self.playback.take().is_some() {
            if let Err(e) = self.engine.stop() {
                log::warn!("{}", e);
            }
        }
    }

    /// Advance playback by the wall-clock time since the last frame
    fn tick_playback(&mut self) {
        let Some(playback) = self.playback.as_mut() else {
            return;
        };
        let now = Instant::now();
        let elapsed = now.duration_since(playback.last_tick).as_secs_f64();
        playback.last_tick = now;

        let module = self.sheet.module();
        let tempo = module
            .song(playback.cursor.song())
            .map(|s| s.header.tempo)
            .unwrap_or(120.0);
        let delta = Tstamp::from_f64(elapsed * tempo / 60.0);
        playback.cursor.advance(module, delta, &mut self.engine);
        if playback.cursor.is_finished() {
            self.stop();
        }
    }

    fn draw_toolbar(&mut self, ui: &mut egui::Ui) {
        ui.horizontal(|ui| {
            if ui.button("Open…").clicked() {
                self.open_dialog();
            }
            if ui.button("Save as…").clicked() {
                self.save_dialog();
            }
            if let Some(path) = self.path.clone() {
                if ui.button("Save").clicked() {
                    self.save(&path);
                }
            }
            ui.separator();
            if self.playback.is_some() {
                if ui.button("⏹ Stop").clicked() {
                    self.stop();
                }
            } else if ui.button("▶ Play").clicked() {
                self.play();
            }
            ui.separator();
            let history = self.sheet.history();
            ui.label(format!(
                "Pattern {}  Column {}  Row {}",
                self.sheet.pattern_id(),
                self.sheet.cursor().column(),
                self.sheet.cursor().ts()
            ));
            if history.can_undo() {
                ui.weak("modified");
            }
        });
    }

    /// Status bar at the bottom of the window
    fn draw_status_bar(&self, ui: &mut egui::Ui) {
        ui.horizontal(|ui| {
            let recent = self.recent_notifications();
            if recent.is_empty() {
                ui.label("Ready");
            } else {
                for notification in recent {
                    let (icon, color) = match notification.level {
                        NotificationLevel::Info => ("ℹ", egui::Color32::from_rgb(100, 150, 255)),
                        NotificationLevel::Warning => ("⚠", egui::Color32::from_rgb(255, 165, 0)),
                        NotificationLevel::Error => ("✖", egui::Color32::RED),
                    };
                    ui.colored_label(color, icon);
                    ui.colored_label(color, &notification.message);
                    ui.add_space(10.0);
                }
            }

            ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                if let Some((channel, kind)) = &self.position.last_row {
                    ui.monospace(format!("{} @ {}", kind, channel));
                }
                if let Some((l, r)) = self.position.peak_db {
                    ui.monospace(format!("{:.1} / {:.1} dB", l, r));
                }
                if let Some(song) = self.position.song {
                    ui.monospace(format!("Song {}", song));
                }
            });
        });
    }
}

impl eframe::App for SheetApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.update_notifications();
        self.poll_notices();
        self.tick_playback();
        if self.playback.is_some() {
            ctx.request_repaint();
        } else {
            ctx.request_repaint_after(Duration::from_millis(250));
        }

        egui::TopBottomPanel::top("toolbar").show(ctx, |ui| self.draw_toolbar(ui));
        egui::TopBottomPanel::bottom("status").show(ctx, |ui| self.draw_status_bar(ui));
        egui::CentralPanel::default()
            .frame(egui::Frame::none())
            .show(ctx, |ui| self.panel.show(ui, &mut self.sheet));
    }

    fn on_exit(&mut self, _gl: Option<&eframe::glow::Context>) {
        self.stop();
        if let Err(e) = self.engine.halt() {
            log::warn!("{}", e);
        }
        if let Some(worker) = self.worker.take() {
            if let Ok(backend) = worker.join() {
                log::debug!("engine worker fired {} events", backend.fired);
            }
        }
        if let Some(pump) = self.pump.take() {
            pump.halt();
        }
    }
}

/// Load a module archive; returns the module and the number of skipped entries
pub fn read_module(path: &Path) -> Result<(Module, usize), ProjectError> {
    let format = ArchiveFormat::from_path(path)?;
    if format.kind != ArchiveKind::Module {
        return Err(ProjectError::UnknownArchiveFormat(path.to_path_buf()));
    }
    let mut store = MemoryStore::new();
    archive::import(path, &mut store, "", &CancelFlag::new())?;
    let report = load_module(&store)?;
    Ok((report.module, report.problems.len()))
}

/// Save a module archive; returns the number of members written
pub fn write_module(module: &Module, path: &Path) -> Result<usize, ProjectError> {
    let mut store = MemoryStore::new();
    save_module(module, &mut store)?;
    archive::export(&store, "", path, &CancelFlag::new())
}
