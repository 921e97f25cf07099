//! egui front end driving an [`AnnotationCanvas`].

use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::time::Instant;

use eframe::egui;
use tracing::{info, warn};

use sam_canvas::sidecar;
use sam_canvas::{
    AnnotationCanvas, ClientRect, LayerKind, LayerPatch, Mode, Modifiers, Notification, PointerButton,
    PredictRequest, PredictionAction,
};

// ── Status line ─────────────────────────────────────────────────────────────

#[derive(Clone, Debug)]
enum Status {
    Info(String),
    Error(String),
}

struct LayerTexture {
    generation: u64,
    handle: egui::TextureHandle,
}

// ── App ─────────────────────────────────────────────────────────────────────

pub struct SamApp {
    canvas: AnnotationCanvas,
    image_path: Option<PathBuf>,
    textures: HashMap<LayerKind, LayerTexture>,
    inbox: Rc<RefCell<VecDeque<Notification>>>,
    status: Option<Status>,

    /// Button that started the gesture in progress.
    pressed: Option<PointerButton>,
    container: Option<egui::Vec2>,
    multi_box: bool,
}

impl SamApp {
    pub fn new(mut canvas: AnnotationCanvas, image_path: Option<PathBuf>) -> Self {
        let inbox = Rc::new(RefCell::new(VecDeque::new()));
        let sink = Rc::clone(&inbox);
        canvas.subscribe(move |n: &Notification| sink.borrow_mut().push_back(n.clone()));
        let multi_box = canvas.config().multi_box;

        let mut app = Self {
            canvas,
            image_path: None,
            textures: HashMap::new(),
            inbox,
            status: None,
            pressed: None,
            container: None,
            multi_box,
        };
        if let Some(path) = image_path {
            app.open_image(&path);
        }
        app
    }

    fn open_image(&mut self, path: &Path) {
        if self.canvas.load_image_path(path).is_err() {
            return;
        }
        self.image_path = Some(path.to_path_buf());
        self.pressed = None;
        match sidecar::load_layers(path) {
            Ok(records) if !records.is_empty() => {
                if let Err(e) = self.canvas.set_layers(records) {
                    warn!("Could not restore layers: {}", e);
                }
            }
            Ok(_) => {}
            Err(e) => self.status = Some(Status::Error(format!("Could not read layers: {e}"))),
        }
    }

    fn pick_image(&mut self) {
        if let Some(path) = rfd::FileDialog::new()
            .add_filter("Images", &["png", "jpg", "jpeg", "webp", "bmp"])
            .pick_file()
        {
            self.open_image(&path);
        }
    }

    fn pick_prediction(&mut self, automask: bool) {
        let Some(path) = rfd::FileDialog::new().add_filter("JSON", &["json"]).pick_file() else {
            return;
        };
        let result = if automask {
            sidecar::read_automask(&path).and_then(|r| self.canvas.ingest_automask(r))
        } else {
            sidecar::read_prediction(&path).and_then(|r| self.canvas.ingest_prediction(r))
        };
        match result {
            Ok(count) => self.status = Some(Status::Info(format!("{count} candidates loaded"))),
            Err(e) => self.status = Some(Status::Error(e.to_string())),
        }
    }

    fn save(&mut self) {
        let Some(path) = self.image_path.clone() else {
            return;
        };
        if let Err(e) = sidecar::save_layers(&path, &self.canvas.export_layers()) {
            self.status = Some(Status::Error(format!("Save failed: {e}")));
            return;
        }
        self.status = Some(Status::Info("Layers saved".into()));
    }

    fn export_png(&mut self) {
        let Some(path) = self.image_path.clone() else {
            return;
        };
        let Some(image) = self.canvas.composite_full_resolution() else {
            return;
        };
        let out = rfd::FileDialog::new()
            .set_file_name(
                sidecar::export_path(&path)
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default(),
            )
            .add_filter("PNG", &["png"])
            .save_file();
        if let Some(out) = out {
            match image.save(&out) {
                Ok(()) => {
                    info!("Exported to {}", out.display());
                    self.status = Some(Status::Info(format!("Exported {}", out.display())));
                }
                Err(e) => self.status = Some(Status::Error(format!("Export failed: {e}"))),
            }
        }
    }

    fn undo(&mut self) {
        if self.canvas.editing_layer().is_some() {
            let _ = self.canvas.undo_edit();
        }
    }

    fn redo(&mut self) {
        if self.canvas.editing_layer().is_some() {
            let _ = self.canvas.redo_edit();
        }
    }

    fn delete_selected(&mut self) {
        let selected = self.canvas.selected_layers().to_vec();
        for id in selected {
            let _ = self.canvas.delete_layer(&id);
        }
    }

    /// Write the prompts out as a predict request once they settle.
    fn handle_action(&mut self, action: PredictionAction) {
        match action {
            PredictionAction::Predict(snapshot) => {
                let request = PredictRequest::from_snapshot(&snapshot);
                let Some(path) = self.image_path.clone() else {
                    return;
                };
                match sidecar::write_predict_request(&path, &request) {
                    Ok(out) => self.status = Some(Status::Info(format!("Prompts written to {}", out.display()))),
                    Err(e) => self.status = Some(Status::Error(e.to_string())),
                }
            }
            PredictionAction::ClearPrediction => {
                self.status = Some(Status::Info("Prompts cleared".into()));
            }
        }
    }

    fn drain_notifications(&mut self) {
        let drained: Vec<Notification> = self.inbox.borrow_mut().drain(..).collect();
        for n in drained {
            match n {
                Notification::Error { message } => self.status = Some(Status::Error(message)),
                Notification::ImageLoaded { filename, width, height } => {
                    let name = filename.unwrap_or_else(|| "image".into());
                    self.status = Some(Status::Info(format!("{name} ({width}x{height})")));
                }
                Notification::InputsChanged(snapshot) => {
                    self.status = Some(Status::Info(format!(
                        "{} points, {} boxes{}",
                        snapshot.points.len(),
                        snapshot.boxes.len(),
                        if snapshot.mask_input.is_some() { ", lasso mask" } else { "" }
                    )));
                }
                _ => {}
            }
        }
    }

    /// Re-upload the layers whose surfaces changed since the last frame.
    fn sync_textures(&mut self, ctx: &egui::Context) {
        for kind in LayerKind::ALL {
            let compositor = self.canvas.compositor();
            let surface = compositor.visible(kind);
            let generation = compositor.generation(kind);
            if surface.is_empty() {
                self.textures.remove(&kind);
                continue;
            }
            if self.textures.get(&kind).is_some_and(|t| t.generation == generation) {
                continue;
            }
            let (w, h) = surface.dimensions();
            let color_image = egui::ColorImage::from_rgba_unmultiplied([w as usize, h as usize], surface.as_raw());
            match self.textures.get_mut(&kind) {
                Some(texture) => {
                    texture.handle.set(color_image, egui::TextureOptions::LINEAR);
                    texture.generation = generation;
                }
                None => {
                    let handle = ctx.load_texture(format!("layer-{kind}"), color_image, egui::TextureOptions::LINEAR);
                    self.textures.insert(kind, LayerTexture { generation, handle });
                }
            }
        }
    }

    fn track_container(&mut self, size: egui::Vec2, now: Instant) {
        if self.container == Some(size) {
            return;
        }
        if self.container.is_none() {
            self.canvas.resize_container(size.x, size.y);
        } else {
            self.canvas.request_resize(size.x, size.y, now);
        }
        self.container = Some(size);
    }

    /// Feed raw pointer events to the canvas. `base` is the unzoomed canvas
    /// box; presses outside it are ignored.
    fn handle_pointer(&mut self, ctx: &egui::Context, base: egui::Rect, now: Instant) {
        let client = self.canvas.zoom_pan().apply_to_rect(&client_rect(base));
        let events = ctx.input(|i| i.events.clone());
        for event in events {
            match event {
                egui::Event::PointerButton {
                    pos,
                    button,
                    pressed,
                    modifiers,
                } => {
                    let Some(button) = map_button(button) else {
                        continue;
                    };
                    if button == PointerButton::Middle {
                        continue;
                    }
                    if pressed {
                        if self.pressed.is_none() && base.contains(pos) && client.contains(pos.x, pos.y) {
                            self.canvas.pointer_down(pos.x, pos.y, &client, button, map_modifiers(modifiers));
                            self.pressed = Some(button);
                        }
                    } else if self.pressed == Some(button) {
                        self.pressed = None;
                        self.canvas.pointer_up(pos.x, pos.y, &client, now);
                    }
                }
                egui::Event::PointerMoved(pos) if self.pressed.is_some() => {
                    if base.contains(pos) {
                        self.canvas.pointer_move(pos.x, pos.y, &client);
                    } else {
                        self.pressed = None;
                        self.canvas.pointer_leave(now);
                    }
                }
                egui::Event::PointerGone => {
                    if self.pressed.take().is_some() {
                        self.canvas.pointer_leave(now);
                    }
                }
                _ => {}
            }
        }
    }

    fn toolbar(&mut self, ui: &mut egui::Ui) {
        ui.horizontal(|ui| {
            if ui.button("Open…").clicked() {
                self.pick_image();
            }
            if ui.button("Load prediction…").clicked() {
                self.pick_prediction(false);
            }
            if ui.button("Load automask…").clicked() {
                self.pick_prediction(true);
            }
            if ui.button("Export PNG…").clicked() {
                self.export_png();
            }
            ui.separator();

            let mut mode = self.canvas.mode();
            egui::ComboBox::from_id_salt("mode")
                .selected_text(mode_label(mode))
                .show_ui(ui, |ui| {
                    for m in [Mode::Creation, Mode::Edit, Mode::Review] {
                        ui.selectable_value(&mut mode, m, mode_label(m));
                    }
                });
            if mode != self.canvas.mode() {
                let _ = self.canvas.set_mode(mode, None);
            }
            if ui.checkbox(&mut self.multi_box, "Multi-box").changed() {
                self.canvas.set_multi_box(self.multi_box, Instant::now());
            }
            if ui.button("Clear prompts").clicked() {
                self.canvas.clear_inputs();
            }
            ui.separator();

            for kind in LayerKind::ALL {
                let mut value = self.canvas.opacity(kind);
                let slider = egui::Slider::new(&mut value, 0.0..=1.0).text(kind.to_string());
                if ui.add(slider).changed() {
                    self.canvas.set_opacity(kind, value);
                }
            }
            ui.separator();
            ui.label(format!("Zoom: {:.0}%", self.canvas.zoom_pan().scale * 100.0));
            if ui.button("Reset view").clicked() {
                self.canvas.reset_view();
            }
        });
    }

    fn side_panel(&mut self, ui: &mut egui::Ui) {
        ui.heading("Candidates");
        let mut toggles = Vec::new();
        for (i, candidate) in self.canvas.candidates().iter().enumerate() {
            let mut visible = candidate.visible;
            ui.horizontal(|ui| {
                swatch(ui, candidate.color);
                if ui.checkbox(&mut visible, format!("#{} score {:.3}", i + 1, candidate.score)).changed() {
                    toggles.push((i, visible));
                }
            });
        }
        for (i, visible) in toggles {
            let _ = self.canvas.set_candidate_visibility(i, visible);
        }
        if !self.canvas.candidates().is_empty() && ui.button("Commit visible").clicked() {
            let _ = self.canvas.commit_candidates();
        }

        ui.separator();
        ui.heading("Layers");
        ui.horizontal(|ui| {
            if ui.button("New layer").clicked() && self.canvas.has_image() {
                let name = format!("Layer {}", self.canvas.layers().len() + 1);
                self.canvas.create_empty_layer(&name);
            }
            if ui.button("Save").clicked() {
                self.save();
            }
        });

        let selected = self.canvas.selected_layers().to_vec();
        let editing = self.canvas.editing_layer().map(str::to_owned);
        let mut select = None;
        let mut visibility = Vec::new();
        let mut edit = None;
        let mut delete = None;
        for layer in self.canvas.layers() {
            ui.horizontal(|ui| {
                swatch(ui, layer.display_color);
                let mut visible = layer.visible;
                if ui.checkbox(&mut visible, "").changed() {
                    visibility.push((layer.layer_id.clone(), visible));
                }
                let is_selected = selected.contains(&layer.layer_id);
                let label = format!("{} ({} px)", layer.name, layer.area());
                if ui.selectable_label(is_selected, label).clicked() {
                    select = Some(layer.layer_id.clone());
                }
                if editing.is_none() && ui.small_button("Edit").clicked() {
                    edit = Some(layer.layer_id.clone());
                }
                if ui.small_button("🗑").clicked() {
                    delete = Some(layer.layer_id.clone());
                }
            });
        }
        for (id, visible) in visibility {
            let patch = LayerPatch {
                visible: Some(visible),
                ..Default::default()
            };
            let _ = self.canvas.update_layer(&id, patch);
        }
        if let Some(id) = select {
            let _ = self.canvas.select_layers(vec![id]);
        }
        if let Some(id) = edit {
            let _ = self.canvas.start_mask_edit(&id);
        }
        if let Some(id) = delete {
            let _ = self.canvas.delete_layer(&id);
        }

        if let Some(layer) = editing {
            ui.separator();
            ui.heading("Brush");
            ui.label(format!("Editing {layer}"));
            let mut radius = self.canvas.brush_radius();
            if ui.add(egui::Slider::new(&mut radius, 1.0..=100.0).text("radius")).changed() {
                self.canvas.set_brush_radius(radius);
            }
            ui.label("Left paints, right or shift erases.");
            ui.horizontal(|ui| {
                if ui.add_enabled(self.canvas.can_undo_edit(), egui::Button::new("Undo")).clicked() {
                    self.undo();
                }
                if ui.add_enabled(self.canvas.can_redo_edit(), egui::Button::new("Redo")).clicked() {
                    self.redo();
                }
            });
            ui.horizontal(|ui| {
                if ui.button("Apply").clicked() {
                    let _ = self.canvas.commit_mask_edit();
                }
                if ui.button("Done").clicked() {
                    let _ = self.canvas.commit_mask_edit();
                    self.canvas.finish_mask_edit();
                }
                if ui.button("Discard").clicked() {
                    self.canvas.finish_mask_edit();
                }
            });
        }
    }
}

fn mode_label(mode: Mode) -> &'static str {
    match mode {
        Mode::Creation => "Creation",
        Mode::Edit => "Edit",
        Mode::Review => "Review",
    }
}

fn swatch(ui: &mut egui::Ui, color: sam_canvas::Color) {
    let (rect, _) = ui.allocate_exact_size(egui::vec2(12.0, 12.0), egui::Sense::hover());
    ui.painter()
        .rect_filled(rect, 2.0, egui::Color32::from_rgb(color.r, color.g, color.b));
}

fn client_rect(rect: egui::Rect) -> ClientRect {
    ClientRect::new(rect.min.x, rect.min.y, rect.width(), rect.height())
}

fn to_egui_rect(rect: &ClientRect) -> egui::Rect {
    egui::Rect::from_min_size(egui::pos2(rect.left, rect.top), egui::vec2(rect.width, rect.height))
}

fn map_button(button: egui::PointerButton) -> Option<PointerButton> {
    match button {
        egui::PointerButton::Primary => Some(PointerButton::Primary),
        egui::PointerButton::Secondary => Some(PointerButton::Secondary),
        egui::PointerButton::Middle => Some(PointerButton::Middle),
        _ => None,
    }
}

fn map_modifiers(modifiers: egui::Modifiers) -> Modifiers {
    Modifiers {
        shift: modifiers.shift,
        ctrl: modifiers.command,
    }
}

// ── eframe App impl ────────────────────────────────────────────────────────

impl eframe::App for SamApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        let now = Instant::now();
        if let Some(action) = self.canvas.poll(now) {
            self.handle_action(action);
        }

        // Keyboard shortcuts
        let (undo, redo, save, delete, escape) = ctx.input(|i| {
            let z = i.modifiers.command && i.key_pressed(egui::Key::Z);
            (
                z && !i.modifiers.shift,
                z && i.modifiers.shift,
                i.modifiers.command && i.key_pressed(egui::Key::S),
                i.key_pressed(egui::Key::Delete),
                i.key_pressed(egui::Key::Escape),
            )
        });
        if undo {
            self.undo();
        }
        if redo {
            self.redo();
        }
        if save {
            self.save();
        }
        if delete {
            self.delete_selected();
        }
        if escape {
            self.canvas.clear_inputs();
        }

        egui::TopBottomPanel::top("toolbar").show(ctx, |ui| self.toolbar(ui));

        egui::TopBottomPanel::bottom("status").show(ctx, |ui| match &self.status {
            Some(Status::Info(text)) => {
                ui.label(text);
            }
            Some(Status::Error(text)) => {
                ui.colored_label(egui::Color32::from_rgb(220, 60, 60), text);
            }
            None => {
                ui.label("Open an image to start.");
            }
        });

        egui::SidePanel::right("layers")
            .default_width(260.0)
            .show(ctx, |ui| egui::ScrollArea::vertical().show(ui, |ui| self.side_panel(ui)));

        // Canvas
        egui::CentralPanel::default().show(ctx, |ui| {
            let (response, painter) = ui.allocate_painter(ui.available_size(), egui::Sense::click_and_drag());
            let container = response.rect;
            painter.rect_filled(container, 0.0, egui::Color32::from_gray(40));
            self.track_container(container.size(), now);

            let (cw, ch) = self.canvas.compositor().canvas_size();
            let base = egui::Rect::from_center_size(container.center(), egui::vec2(cw as f32, ch as f32));

            // Handle pan (middle mouse button)
            let (middle_down, delta) = ctx.input(|i| (i.pointer.middle_down(), i.pointer.delta()));
            if middle_down && response.hovered() && delta != egui::Vec2::ZERO {
                self.canvas.pan_by(delta.x, delta.y);
            }

            // Handle zoom (scroll wheel)
            let scroll_delta = ctx.input(|i| i.smooth_scroll_delta.y);
            if scroll_delta != 0.0 && response.hovered() {
                if let Some(cursor) = response.hover_pos() {
                    let factor = 1.0 + scroll_delta * 0.002;
                    self.canvas.zoom_at(factor, cursor.x - base.min.x, cursor.y - base.min.y);
                }
            }

            self.handle_pointer(ctx, base, now);
            self.sync_textures(ctx);

            let target = to_egui_rect(&self.canvas.zoom_pan().apply_to_rect(&client_rect(base)));
            let clipped = painter.with_clip_rect(base);
            let uv = egui::Rect::from_min_max(egui::pos2(0.0, 0.0), egui::pos2(1.0, 1.0));
            for kind in LayerKind::ALL {
                if let Some(texture) = self.textures.get(&kind) {
                    clipped.image(texture.handle.id(), target, uv, egui::Color32::WHITE);
                }
            }
        });

        self.drain_notifications();
        if let Some(wait) = self.canvas.next_deadline(Instant::now()) {
            ctx.request_repaint_after(wait);
        }
    }
}
