// Sheet panel - hosts the sheet view inside an egui Ui

use crate::config::SheetConfig;
use crate::sheet::cursor::Direction;
use crate::sheet::editor::{Sheet, SheetCommand};
use crate::sheet::field_edit::EditKey;
use crate::view::painter::{Painter, TextMetrics};
use crate::view::sheet_view::SheetView;
use crate::view::tile_cache::Pixmap;
use eframe::egui;
use egui::{Align2, Color32, FontId, Pos2, Rect, Sense, Stroke, TextureHandle, TextureOptions};
use std::collections::{HashMap, HashSet};

/// Text measurement with the font the panel paints with
struct EguiMetrics<'a> {
    ctx: &'a egui::Context,
    font: &'a FontId,
}

impl TextMetrics for EguiMetrics<'_> {
    fn text_width(&self, text: &str) -> f32 {
        self.ctx.fonts(|fonts| {
            fonts
                .layout_no_wrap(text.to_string(), self.font.clone(), Color32::WHITE)
                .size()
                .x
        })
    }

    fn line_height(&self) -> f32 {
        self.ctx.fonts(|fonts| fonts.row_height(self.font))
    }
}

/// Pixmap textures uploaded to the GPU, keyed by pixmap id
#[derive(Default)]
struct Textures {
    handles: HashMap<u64, TextureHandle>,
    used: HashSet<u64>,
}

impl Textures {
    fn get(&mut self, ctx: &egui::Context, pixmap: &Pixmap) -> egui::TextureId {
        self.used.insert(pixmap.id());
        self.handles
            .entry(pixmap.id())
            .or_insert_with(|| {
                let image = egui::ColorImage::from_rgba_unmultiplied(
                    [pixmap.width(), pixmap.height()],
                    pixmap.data(),
                );
                ctx.load_texture(format!("sheet-tile-{}", pixmap.id()), image, TextureOptions::NEAREST)
            })
            .id()
    }

    /// Free textures of pixmaps not drawn this frame
    fn end_frame(&mut self) {
        let used = std::mem::take(&mut self.used);
        self.handles.retain(|id, _| used.contains(id));
    }
}

struct EguiPainter<'a> {
    ctx: &'a egui::Context,
    base: egui::Painter,
    current: egui::Painter,
    font: &'a FontId,
    textures: &'a mut Textures,
}

impl Painter for EguiPainter<'_> {
    fn fill_rect(&mut self, rect: Rect, color: Color32) {
        self.current.rect_filled(rect, 0.0, color);
    }

    fn line(&mut self, from: Pos2, to: Pos2, color: Color32) {
        // Centre one-pixel lines on the pixel row
        let offset = egui::vec2(0.5, 0.5);
        self.current
            .line_segment([from + offset, to + offset], Stroke::new(1.0, color));
    }

    fn text(&mut self, pos: Pos2, text: &str, color: Color32) {
        self.current
            .text(pos, Align2::LEFT_TOP, text, self.font.clone(), color);
    }

    fn blit(&mut self, pixmap: &Pixmap, src: Rect, dst: Rect) {
        let texture = self.textures.get(self.ctx, pixmap);
        let size = egui::vec2(pixmap.width() as f32, pixmap.height() as f32);
        let uv = Rect::from_min_max(
            (src.min.to_vec2() / size).to_pos2(),
            (src.max.to_vec2() / size).to_pos2(),
        );
        self.current.image(texture, dst, uv, Color32::WHITE);
    }

    fn set_clip(&mut self, clip: Option<Rect>) {
        self.current = match clip {
            Some(rect) => self.base.with_clip_rect(rect.intersect(self.base.clip_rect())),
            None => self.base.clone(),
        };
    }
}

/// Map one key event to a sheet command
fn key_command(key: egui::Key, pressed: bool, modifiers: egui::Modifiers, editing: bool) -> Option<SheetCommand> {
    use egui::Key;

    if !pressed {
        return matches!(key, Key::ArrowUp | Key::ArrowDown).then_some(SheetCommand::Release);
    }
    if modifiers.command {
        return match key {
            Key::Z if modifiers.shift => Some(SheetCommand::Redo),
            Key::Z => Some(SheetCommand::Undo),
            Key::Y => Some(SheetCommand::Redo),
            _ => None,
        };
    }
    let command = match key {
        Key::ArrowUp => SheetCommand::Step(Direction::Up),
        Key::ArrowDown => SheetCommand::Step(Direction::Down),
        Key::PageUp => SheetCommand::Page(Direction::Up),
        Key::PageDown => SheetCommand::Page(Direction::Down),
        Key::ArrowLeft => SheetCommand::Left,
        Key::ArrowRight => SheetCommand::Right,
        Key::Home => SheetCommand::Home,
        Key::End => SheetCommand::End,
        Key::Insert => SheetCommand::ToggleInsert,
        Key::Escape => SheetCommand::Escape,
        Key::Delete => SheetCommand::Delete,
        Key::Enter => SheetCommand::Return,
        Key::Backspace if editing => SheetCommand::Key(EditKey::Backspace),
        Key::Tab if editing => SheetCommand::Key(EditKey::Tab),
        _ => return None,
    };
    Some(command)
}

pub struct SheetPanel {
    view: SheetView,
    textures: Textures,
    font: FontId,
    zoom: f64,
}

impl SheetPanel {
    pub fn new(config: &SheetConfig, sheet: &mut Sheet) -> Self {
        let mut view = SheetView::new(config, Rect::from_min_size(Pos2::ZERO, egui::vec2(640.0, 480.0)));
        view.attach(sheet);
        Self {
            view,
            textures: Textures::default(),
            font: FontId::monospace(12.0),
            zoom: config.layout.px_per_beat,
        }
    }

    pub fn view(&self) -> &SheetView {
        &self.view
    }

    /// Re-read the model after it was replaced
    pub fn reload(&mut self, sheet: &mut Sheet) {
        self.view.attach(sheet);
    }

    fn handle_input(&mut self, ui: &egui::Ui, response: &egui::Response, sheet: &mut Sheet) {
        let ctx = ui.ctx();
        if response.has_focus() {
            let events = ctx.input(|i| i.events.clone());
            for event in events {
                match event {
                    egui::Event::Key {
                        key,
                        pressed,
                        modifiers,
                        ..
                    } => {
                        if let Some(command) = key_command(key, pressed, modifiers, sheet.field_editor().is_some()) {
                            sheet.handle(command);
                        }
                    }
                    egui::Event::Text(text) if sheet.field_editor().is_some() => {
                        for c in text.chars() {
                            sheet.handle(SheetCommand::Key(EditKey::Char(c)));
                        }
                    }
                    _ => {}
                }
            }
        }

        if response.hovered() {
            let (scroll, zoom_in) = ctx.input(|i| (i.smooth_scroll_delta.y, i.modifiers.command));
            if scroll != 0.0 {
                if zoom_in {
                    self.zoom = (self.zoom * (1.0 + scroll as f64 / 200.0)).clamp(4.0, 1024.0);
                    self.view.set_zoom(sheet, self.zoom);
                } else {
                    self.view.scroll_by(-scroll as f64);
                }
            }
        }

        if response.clicked() {
            response.request_focus();
            if let Some(hit) = response.interact_pointer_pos().and_then(|pos| self.view.hit_test(pos)) {
                sheet.jump_to(hit.pattern, hit.column, hit.ts);
            }
        }
    }

    pub fn show(&mut self, ui: &mut egui::Ui, sheet: &mut Sheet) {
        let rect = ui.available_rect_before_wrap();
        let response = ui.allocate_rect(rect, Sense::click());
        ui.memory_mut(|m| {
            m.set_focus_lock_filter(
                response.id,
                egui::EventFilter {
                    tab: true,
                    horizontal_arrows: true,
                    vertical_arrows: true,
                    escape: true,
                },
            )
        });

        self.view.set_viewport(rect);
        self.view.set_focused(response.has_focus());
        self.handle_input(ui, &response, sheet);

        let ctx = ui.ctx().clone();
        let metrics = EguiMetrics {
            ctx: &ctx,
            font: &self.font,
        };
        self.view.update(sheet, &metrics);

        let base = ui.painter_at(rect);
        let mut painter = EguiPainter {
            ctx: &ctx,
            current: base.clone(),
            base,
            font: &self.font,
            textures: &mut self.textures,
        };
        self.view.paint(&mut painter, &metrics, sheet);
        self.textures.end_frame();

        // Keep the cursor moving while an arrow key is held
        if sheet.cursor().is_moving() {
            ctx.request_repaint();
        }
    }
}
