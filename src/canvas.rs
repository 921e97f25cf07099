//! The annotation canvas: one image session with prompts, predictions,
//! committed layers and mask editing, rendered through the compositor.
//!
//! Everything the canvas depends on is handed in through [`CanvasConfig`];
//! there is no global state. Time is passed in explicitly so debouncing is
//! driven by the caller's event loop.

use std::path::Path;
use std::time::{Duration, Instant};

use image::RgbaImage;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::color::distinct_colors;
use crate::compositor::{ImageFrame, LayerCompositor, MaskOverlay};
use crate::config::CanvasConfig;
use crate::debounce::Debouncer;
use crate::edit::MaskEditor;
use crate::error::{CanvasError, Result};
use crate::geometry::Point;
use crate::input::{CollectorSettings, InputCollector, InputSnapshot, Modifiers, PointerButton};
use crate::layers::{layers_from_records, Layer, LayerPatch, LayerRecord, STATUS_EDITED};
use crate::mask::BinaryMask;
use crate::notify::{LayerKind, ListenerId, Notification, Notifier};
use crate::prediction::{AutomaskResponse, CandidateSource, PredictionCandidate, PredictionResponse};
use crate::transform::{ClientRect, CoordinateTransform, ZoomPan};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Prompts active, committed layers faded.
    #[default]
    Creation,
    /// Layers selectable and brush-editable; unselected layers faded.
    Edit,
    /// Read-only, everything at full emphasis.
    Review,
}

/// What the caller should do once the prompt debounce fires.
#[derive(Debug, Clone, PartialEq)]
pub enum PredictionAction {
    Predict(InputSnapshot),
    /// Prompts are empty: the displayed prediction was cleared.
    ClearPrediction,
}

#[derive(Debug, Clone, Copy)]
struct BrushDrag {
    last: Point,
    add: bool,
}

pub struct AnnotationCanvas {
    config: CanvasConfig,
    compositor: LayerCompositor,
    inputs: InputCollector,
    editor: MaskEditor,
    notifier: Notifier,

    candidates: Vec<PredictionCandidate>,
    candidate_source: Option<CandidateSource>,
    layers: Vec<Layer>,
    selected: Vec<String>,
    mode: Mode,

    input_debounce: Debouncer<InputSnapshot>,
    resize_debounce: Debouncer<(f32, f32)>,
    brush_radius: f32,
    brush: Option<BrushDrag>,
}

impl AnnotationCanvas {
    pub fn new(config: CanvasConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            compositor: LayerCompositor::new(&config),
            inputs: InputCollector::new(CollectorSettings::from(&config)),
            editor: MaskEditor::new(),
            notifier: Notifier::new(),
            candidates: Vec::new(),
            candidate_source: None,
            layers: Vec::new(),
            selected: Vec::new(),
            mode: Mode::Creation,
            input_debounce: Debouncer::new(config.debounce()),
            resize_debounce: Debouncer::new(config.resize_debounce()),
            brush_radius: config.brush_radius,
            brush: None,
            config,
        })
    }

    pub fn config(&self) -> &CanvasConfig {
        &self.config
    }

    pub fn subscribe(&mut self, listener: impl FnMut(&Notification) + 'static) -> ListenerId {
        self.notifier.subscribe(listener)
    }

    pub fn unsubscribe(&mut self, id: ListenerId) -> bool {
        self.notifier.unsubscribe(id)
    }

    fn emit(&mut self, notification: Notification) {
        self.notifier.emit(&notification);
    }

    /// Report a rejected call to listeners and hand the error back.
    fn reject<T>(&mut self, err: CanvasError) -> Result<T> {
        warn!("{}", err);
        self.emit(Notification::Error {
            message: err.to_string(),
        });
        Err(err)
    }

    // --- image -----------------------------------------------------------

    /// Load a new image. Prompts, predictions, layers, edits and the view are
    /// reset. Bad input leaves the current session untouched.
    pub fn load_image(&mut self, pixels: RgbaImage, width: u32, height: u32, filename: Option<&str>) -> Result<()> {
        if width == 0 || height == 0 {
            return self.reject(CanvasError::InvalidImage(format!("dimensions {width}x{height}")));
        }
        if pixels.dimensions() != (width, height) {
            let (pw, ph) = pixels.dimensions();
            return self.reject(CanvasError::InvalidImage(format!(
                "bitmap is {pw}x{ph}, declared {width}x{height}"
            )));
        }

        if let Some(layer) = self.editor.finish() {
            warn!(layer = %layer, "Discarding unfinished mask edit");
        }
        self.brush = None;
        self.input_debounce.cancel();
        self.candidates.clear();
        self.candidate_source = None;
        self.layers.clear();
        self.selected.clear();

        self.compositor.load_frame(ImageFrame {
            pixels,
            filename: filename.map(str::to_owned),
        });
        self.compositor.draw_image();
        let scale = self.compositor.transform().display_scale();
        self.inputs.set_image(width, height, scale);
        self.inputs.set_enabled(self.mode == Mode::Creation);
        self.redraw_user_input();
        self.redraw_predictions();

        info!(width, height, filename = ?filename, "Image loaded");
        self.emit(Notification::ImageLoaded {
            filename: filename.map(str::to_owned),
            width,
            height,
        });
        Ok(())
    }

    /// Decode an image file and load it.
    pub fn load_image_path(&mut self, path: &Path) -> Result<()> {
        let pixels = match image::open(path) {
            Ok(img) => img.to_rgba8(),
            Err(e) => return self.reject(e.into()),
        };
        let (w, h) = pixels.dimensions();
        let name = path.file_name().map(|n| n.to_string_lossy().into_owned());
        self.load_image(pixels, w, h, name.as_deref())
    }

    pub fn has_image(&self) -> bool {
        self.compositor.frame().is_some()
    }

    pub fn filename(&self) -> Option<&str> {
        self.compositor.frame().and_then(|f| f.filename.as_deref())
    }

    /// `(width, height)` of the loaded image.
    pub fn image_size(&self) -> Option<(u32, u32)> {
        self.compositor.frame().map(|f| (f.width(), f.height()))
    }

    /// Refit into a new container size right away.
    pub fn resize_container(&mut self, width: f32, height: f32) {
        if self.compositor.set_container(width, height) && self.has_image() {
            self.redraw_all();
        }
    }

    /// Refit once resizing has settled.
    pub fn request_resize(&mut self, width: f32, height: f32, now: Instant) {
        self.resize_debounce.schedule((width, height), now);
    }

    // --- rendering -------------------------------------------------------

    /// Full redraw in dependency order: image (which sizes everything),
    /// then prompts, then masks.
    pub fn redraw_all(&mut self) {
        self.compositor.draw_image();
        self.inputs
            .set_display_scale(self.compositor.transform().display_scale());
        self.redraw_user_input();
        self.redraw_predictions();
    }

    fn redraw_user_input(&mut self) {
        self.compositor.draw_user_input_layer(&self.inputs);
    }

    fn redraw_predictions(&mut self) {
        let overlays = collect_overlays(
            &self.layers,
            &self.candidates,
            &self.editor,
            &self.selected,
            self.mode,
            &self.config,
        );
        let drawn = self.compositor.draw_prediction_mask_layer(&overlays);
        debug!(drawn, "prediction layer drawn");
    }

    pub fn compositor(&self) -> &LayerCompositor {
        &self.compositor
    }

    pub fn transform(&self) -> &CoordinateTransform {
        self.compositor.transform()
    }

    /// The three visible layers stacked at canvas resolution.
    pub fn flatten(&self) -> RgbaImage {
        self.compositor.flatten()
    }

    /// Image and visible masks at native resolution.
    pub fn composite_full_resolution(&self) -> Option<RgbaImage> {
        let overlays = collect_overlays(
            &self.layers,
            &self.candidates,
            &self.editor,
            &self.selected,
            self.mode,
            &self.config,
        );
        self.compositor.composite_full_resolution(&overlays)
    }

    // --- pointer input ---------------------------------------------------

    /// Map a pointer position to original-image pixels using the canvas's
    /// current on-screen box.
    pub fn to_original(&self, client_x: f32, client_y: f32, rect: &ClientRect) -> Point {
        self.compositor.transform().to_original(client_x, client_y, rect)
    }

    fn brushing(&self) -> bool {
        self.mode == Mode::Edit && self.editor.is_editing()
    }

    pub fn pointer_down(
        &mut self,
        client_x: f32,
        client_y: f32,
        rect: &ClientRect,
        button: PointerButton,
        modifiers: Modifiers,
    ) -> bool {
        let pos = self.to_original(client_x, client_y, rect);
        if self.brushing() {
            if button == PointerButton::Middle || self.brush.is_some() {
                return false;
            }
            // Secondary button or shift erases.
            let add = button == PointerButton::Primary && !modifiers.shift;
            let stamped = self
                .editor
                .begin_stroke()
                .and_then(|_| self.editor.apply_brush(pos.x, pos.y, self.brush_radius, add));
            if let Err(e) = stamped {
                warn!("Brush ignored: {}", e);
                return false;
            }
            self.brush = Some(BrushDrag { last: pos, add });
            self.redraw_predictions();
            return true;
        }
        if self.inputs.pointer_down(pos, button, modifiers) {
            self.redraw_user_input();
            return true;
        }
        false
    }

    pub fn pointer_move(&mut self, client_x: f32, client_y: f32, rect: &ClientRect) {
        let pos = self.to_original(client_x, client_y, rect);
        if let Some(drag) = self.brush {
            match self.editor.apply_stroke(drag.last, pos, self.brush_radius, drag.add) {
                Ok(changed) => {
                    self.brush = Some(BrushDrag { last: pos, ..drag });
                    if changed > 0 {
                        self.redraw_predictions();
                    }
                }
                Err(e) => warn!("Brush ignored: {}", e),
            }
            return;
        }
        if self.inputs.pointer_move(pos) {
            self.redraw_user_input();
        }
    }

    /// Finish the current gesture. Returns true when something changed.
    pub fn pointer_up(&mut self, client_x: f32, client_y: f32, rect: &ClientRect, now: Instant) -> bool {
        let pos = self.to_original(client_x, client_y, rect);
        if let Some(drag) = self.brush.take() {
            let stroke = self
                .editor
                .apply_stroke(drag.last, pos, self.brush_radius, drag.add)
                .and_then(|_| self.editor.end_stroke());
            if let Err(e) = stroke {
                warn!("Brush ignored: {}", e);
            }
            self.redraw_predictions();
            return true;
        }
        let changed = self.inputs.pointer_up(pos);
        self.after_gesture(changed, now);
        changed
    }

    /// The pointer left the canvas mid-gesture.
    pub fn pointer_leave(&mut self, now: Instant) -> bool {
        if self.brush.take().is_some() {
            if let Err(e) = self.editor.end_stroke() {
                warn!("Brush ignored: {}", e);
            }
            return true;
        }
        let changed = self.inputs.pointer_leave();
        self.after_gesture(changed, now);
        changed
    }

    fn after_gesture(&mut self, changed: bool, now: Instant) {
        self.redraw_user_input();
        if changed {
            let snapshot = self.snapshot();
            debug!(
                points = snapshot.points.len(),
                boxes = snapshot.boxes.len(),
                mask = snapshot.mask_input.is_some(),
                "inputs changed"
            );
            self.emit(Notification::InputsChanged(snapshot.clone()));
            self.input_debounce.schedule(snapshot, now);
        }
    }

    pub fn inputs(&self) -> &InputCollector {
        &self.inputs
    }

    pub fn snapshot(&self) -> InputSnapshot {
        self.inputs.snapshot(self.filename())
    }

    /// Toggle multi-box prompting. Turning it off keeps only the newest box
    /// and, when that drops boxes, reschedules prediction like a gesture.
    pub fn set_multi_box(&mut self, multi_box: bool, now: Instant) -> bool {
        self.config.multi_box = multi_box;
        let changed = self.inputs.set_multi_box(multi_box);
        self.after_gesture(changed, now);
        changed
    }

    /// Drive pending debounces. Returns the prediction action that became
    /// due, if any.
    pub fn poll(&mut self, now: Instant) -> Option<PredictionAction> {
        if let Some((w, h)) = self.resize_debounce.poll(now) {
            self.resize_container(w, h);
        }
        let snapshot = self.input_debounce.poll(now)?;
        if snapshot.is_empty() {
            self.clear_prediction();
            self.emit(Notification::InputsCleared);
            return Some(PredictionAction::ClearPrediction);
        }
        Some(PredictionAction::Predict(snapshot))
    }

    /// Time until the next debounce fires.
    pub fn next_deadline(&self, now: Instant) -> Option<Duration> {
        match (self.input_debounce.remaining(now), self.resize_debounce.remaining(now)) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }

    /// Drop every prompt and any displayed prediction.
    pub fn clear_inputs(&mut self) {
        self.inputs.clear();
        self.input_debounce.cancel();
        self.clear_prediction();
        self.redraw_user_input();
        self.emit(Notification::InputsCleared);
    }

    // --- predictions -----------------------------------------------------

    /// Replace the candidates with an interactive prediction. A malformed
    /// response keeps the current candidates.
    pub fn ingest_prediction(&mut self, response: PredictionResponse) -> Result<usize> {
        match response.into_candidates() {
            Ok(candidates) => Ok(self.replace_candidates(candidates, CandidateSource::Interactive)),
            Err(e) => self.reject(e),
        }
    }

    /// Replace the candidates with automatically generated masks.
    pub fn ingest_automask(&mut self, response: AutomaskResponse) -> Result<usize> {
        match response.into_candidates() {
            Ok(candidates) => Ok(self.replace_candidates(candidates, CandidateSource::Automask)),
            Err(e) => self.reject(e),
        }
    }

    fn replace_candidates(&mut self, candidates: Vec<PredictionCandidate>, source: CandidateSource) -> usize {
        if let Some((h, w)) = self.image_size().map(|(w, h)| (h, w)) {
            for (i, c) in candidates.iter().enumerate() {
                if c.segmentation.shape() != (h, w) {
                    warn!(index = i, shape = ?c.segmentation.shape(), "Candidate does not match image size");
                }
            }
        }
        let count = candidates.len();
        self.candidates = candidates;
        self.candidate_source = Some(source);
        info!(count, ?source, "Prediction candidates ingested");
        self.redraw_predictions();
        count
    }

    pub fn candidates(&self) -> &[PredictionCandidate] {
        &self.candidates
    }

    pub fn candidate_source(&self) -> Option<CandidateSource> {
        self.candidate_source
    }

    pub fn set_candidate_visibility(&mut self, index: usize, visible: bool) -> Result<()> {
        match self.candidates.get_mut(index) {
            Some(c) => c.visible = visible,
            None => return self.reject(CanvasError::UnknownCandidate(index)),
        }
        self.redraw_predictions();
        Ok(())
    }

    pub fn clear_prediction(&mut self) {
        self.candidates.clear();
        self.candidate_source = None;
        self.redraw_predictions();
    }

    /// Turn the visible candidates into layers, then clear prompts and
    /// candidates. Candidates whose mask does not match the image are
    /// dropped. Returns the new layer ids.
    pub fn commit_candidates(&mut self) -> Result<Vec<String>> {
        let Some((w, h)) = self.image_size() else {
            return self.reject(CanvasError::InvalidImage("no image loaded".into()));
        };
        let mut visible = Vec::with_capacity(self.candidates.len());
        for (i, c) in self.candidates.drain(..).enumerate() {
            if !c.visible {
                continue;
            }
            if c.segmentation.shape() != (h, w) {
                warn!(index = i, shape = ?c.segmentation.shape(), "Skipping candidate that does not match image size");
                continue;
            }
            visible.push(c);
        }
        let start = self.layers.len();
        let colors = distinct_colors(start + visible.len());
        let mut ids = Vec::with_capacity(visible.len());
        for (i, candidate) in visible.into_iter().enumerate() {
            let mut layer = Layer::empty(format!("Mask {}", start + i + 1), colors[start + i]);
            layer.status = STATUS_EDITED.to_string();
            layer.mask_data = Some(candidate.segmentation);
            ids.push(layer.layer_id.clone());
            self.layers.push(layer);
        }
        info!(count = ids.len(), "Candidates committed");
        self.candidate_source = None;
        self.inputs.clear();
        self.input_debounce.cancel();
        self.redraw_user_input();
        self.redraw_predictions();
        self.emit(Notification::InputsCleared);
        Ok(ids)
    }

    // --- layers ----------------------------------------------------------

    /// Replace the committed layers. Records whose mask cannot be decoded at
    /// the image size keep their metadata but render nothing.
    pub fn set_layers(&mut self, records: Vec<LayerRecord>) -> Result<()> {
        let Some((w, h)) = self.image_size() else {
            return self.reject(CanvasError::InvalidImage("no image loaded".into()));
        };
        self.layers = layers_from_records(records, h, w);
        if let Some(editing) = self.editor.editing_layer().map(str::to_owned) {
            if self.layer_index(&editing).is_none() {
                warn!(layer = %editing, "Edited layer disappeared, discarding edit");
                self.editor.finish();
                self.brush = None;
            }
        }
        let before = self.selected.len();
        let layers = &self.layers;
        self.selected.retain(|id| layers.iter().any(|l| l.layer_id == *id));
        if self.selected.len() != before {
            let layer_ids = self.selected.clone();
            self.emit(Notification::LayerSelectionChanged { layer_ids });
        }
        info!(count = self.layers.len(), "Layers set");
        self.redraw_predictions();
        Ok(())
    }

    pub fn layers(&self) -> &[Layer] {
        &self.layers
    }

    fn layer_index(&self, layer_id: &str) -> Option<usize> {
        self.layers.iter().position(|l| l.layer_id == layer_id)
    }

    pub fn layer(&self, layer_id: &str) -> Option<&Layer> {
        self.layers.iter().find(|l| l.layer_id == layer_id)
    }

    pub fn create_empty_layer(&mut self, name: &str) -> String {
        let color = distinct_colors(self.layers.len() + 1).pop().unwrap_or_default();
        let layer = Layer::empty(name, color);
        let id = layer.layer_id.clone();
        self.layers.push(layer);
        info!(layer = %id, "Empty layer created");
        id
    }

    pub fn delete_layer(&mut self, layer_id: &str) -> Result<Layer> {
        let Some(index) = self.layer_index(layer_id) else {
            return self.reject(CanvasError::UnknownLayer(layer_id.to_string()));
        };
        if self.editor.editing_layer() == Some(layer_id) {
            self.editor.finish();
            self.brush = None;
        }
        let layer = self.layers.remove(index);
        if let Some(pos) = self.selected.iter().position(|id| id == layer_id) {
            self.selected.remove(pos);
            let layer_ids = self.selected.clone();
            self.emit(Notification::LayerSelectionChanged { layer_ids });
        }
        info!(layer = layer_id, "Layer deleted");
        self.redraw_predictions();
        Ok(layer)
    }

    pub fn update_layer(&mut self, layer_id: &str, patch: LayerPatch) -> Result<()> {
        let Some(index) = self.layer_index(layer_id) else {
            return self.reject(CanvasError::UnknownLayer(layer_id.to_string()));
        };
        patch.apply(&mut self.layers[index]);
        self.redraw_predictions();
        Ok(())
    }

    /// Committed layers with row-major RLE masks, ready to send.
    pub fn export_layers(&self) -> Vec<LayerRecord> {
        self.layers.iter().map(Layer::to_record).collect()
    }

    // --- mode & selection -------------------------------------------------

    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// Switch interaction mode. Leaving edit mode discards an unfinished
    /// mask edit.
    pub fn set_mode(&mut self, mode: Mode, selected: Option<Vec<String>>) -> Result<()> {
        if let Some(ids) = &selected {
            if let Some(unknown) = ids.iter().find(|id| self.layer_index(id).is_none()) {
                let err = CanvasError::UnknownLayer(unknown.clone());
                return self.reject(err);
            }
        }
        if mode != Mode::Edit {
            if let Some(layer) = self.editor.finish() {
                warn!(layer = %layer, "Leaving edit mode, discarding unfinished mask edit");
            }
            self.brush = None;
        }
        if self.mode != mode {
            debug!(from = ?self.mode, to = ?mode, "mode changed");
        }
        self.mode = mode;
        self.inputs.set_enabled(mode == Mode::Creation);
        if let Some(ids) = selected {
            self.apply_selection(ids);
        }
        self.redraw_user_input();
        self.redraw_predictions();
        Ok(())
    }

    pub fn selected_layers(&self) -> &[String] {
        &self.selected
    }

    pub fn select_layers(&mut self, layer_ids: Vec<String>) -> Result<()> {
        if let Some(unknown) = layer_ids.iter().find(|id| self.layer_index(id).is_none()) {
            let err = CanvasError::UnknownLayer(unknown.clone());
            return self.reject(err);
        }
        self.apply_selection(layer_ids);
        self.redraw_predictions();
        Ok(())
    }

    fn apply_selection(&mut self, layer_ids: Vec<String>) {
        if self.selected != layer_ids {
            self.selected = layer_ids;
            let layer_ids = self.selected.clone();
            self.emit(Notification::LayerSelectionChanged { layer_ids });
        }
    }

    // --- mask editing ----------------------------------------------------

    /// Start brush-editing a layer. Switches to edit mode and selects it.
    /// Only one layer can be edited at a time.
    pub fn start_mask_edit(&mut self, layer_id: &str) -> Result<()> {
        let Some((w, h)) = self.image_size() else {
            return self.reject(CanvasError::InvalidImage("no image loaded".into()));
        };
        let Some(index) = self.layer_index(layer_id) else {
            return self.reject(CanvasError::UnknownLayer(layer_id.to_string()));
        };
        let layer = &self.layers[index];
        let blank;
        let mask = match &layer.mask_data {
            Some(m) if m.shape() == (h, w) => m,
            Some(m) => {
                warn!(layer = layer_id, shape = ?m.shape(), "Layer mask does not match image, editing a blank mask");
                blank = BinaryMask::zeros(w, h);
                &blank
            }
            None => {
                blank = BinaryMask::zeros(w, h);
                &blank
            }
        };
        if let Err(e) = self.editor.start(layer_id, mask, layer.display_color) {
            return self.reject(e);
        }
        self.mode = Mode::Edit;
        self.inputs.set_enabled(false);
        self.apply_selection(vec![layer_id.to_string()]);
        self.redraw_user_input();
        self.redraw_predictions();
        Ok(())
    }

    pub fn editing_layer(&self) -> Option<&str> {
        self.editor.editing_layer()
    }

    pub fn brush_radius(&self) -> f32 {
        self.brush_radius
    }

    pub fn set_brush_radius(&mut self, radius: f32) {
        self.brush_radius = radius.max(0.0);
    }

    /// Stamp the brush at original-image coordinates.
    pub fn apply_brush(&mut self, x: f32, y: f32, radius: f32, add: bool) -> Result<usize> {
        match self.editor.apply_brush(x, y, radius, add) {
            Ok(changed) => {
                if changed > 0 {
                    self.redraw_predictions();
                }
                Ok(changed)
            }
            Err(e) => self.reject(e),
        }
    }

    pub fn edited_mask(&self) -> Option<BinaryMask> {
        self.editor.edited_mask()
    }

    /// Write the edit buffer back into its layer. Editing continues.
    pub fn commit_mask_edit(&mut self) -> Result<()> {
        let (Some(layer_id), Some(mask)) = (self.editor.editing_layer().map(str::to_owned), self.editor.edited_mask())
        else {
            return self.reject(CanvasError::NoEditSession);
        };
        let Some(index) = self.layer_index(&layer_id) else {
            return self.reject(CanvasError::UnknownLayer(layer_id));
        };
        let layer = &mut self.layers[index];
        layer.mask_data = Some(mask);
        layer.status = STATUS_EDITED.to_string();
        info!(layer = %layer_id, "Mask edit committed");
        Ok(())
    }

    /// Drop the edit buffer without touching the layer.
    pub fn finish_mask_edit(&mut self) -> Option<String> {
        self.brush = None;
        let layer = self.editor.finish()?;
        self.redraw_predictions();
        Some(layer)
    }

    pub fn can_undo_edit(&self) -> bool {
        self.editor.can_undo()
    }

    pub fn can_redo_edit(&self) -> bool {
        self.editor.can_redo()
    }

    pub fn undo_edit(&mut self) -> Result<bool> {
        match self.editor.undo() {
            Ok(done) => {
                if done {
                    self.redraw_predictions();
                }
                Ok(done)
            }
            Err(e) => self.reject(e),
        }
    }

    pub fn redo_edit(&mut self) -> Result<bool> {
        match self.editor.redo() {
            Ok(done) => {
                if done {
                    self.redraw_predictions();
                }
                Ok(done)
            }
            Err(e) => self.reject(e),
        }
    }

    // --- opacity & view --------------------------------------------------

    /// Set one layer's opacity; only that layer is re-presented.
    pub fn set_opacity(&mut self, layer: LayerKind, value: f32) -> f32 {
        let opacity = self.compositor.set_opacity(layer, value);
        self.emit(Notification::OpacityChanged { layer, opacity });
        opacity
    }

    pub fn opacity(&self, layer: LayerKind) -> f32 {
        self.compositor.opacity(layer)
    }

    pub fn zoom_pan(&self) -> ZoomPan {
        self.compositor.zoom_pan()
    }

    /// Zoom around an anchor in unzoomed canvas pixels.
    pub fn zoom_at(&mut self, factor: f32, anchor_x: f32, anchor_y: f32) -> ZoomPan {
        let zp = self.compositor.zoom_at(factor, anchor_x, anchor_y);
        self.emit_zoom_pan(zp);
        zp
    }

    pub fn pan_by(&mut self, dx: f32, dy: f32) -> ZoomPan {
        let zp = self.compositor.pan_by(dx, dy);
        self.emit_zoom_pan(zp);
        zp
    }

    pub fn reset_view(&mut self) -> ZoomPan {
        let zp = self.compositor.reset_view();
        self.emit_zoom_pan(zp);
        zp
    }

    fn emit_zoom_pan(&mut self, zp: ZoomPan) {
        self.emit(Notification::ZoomPanChanged {
            scale: zp.scale,
            pan_x: zp.pan_x,
            pan_y: zp.pan_y,
        });
    }
}

fn layer_alpha(layer: &Layer, editor: &MaskEditor, selected: &[String], mode: Mode, config: &CanvasConfig) -> f32 {
    let full = config.mask_alpha;
    let faded = full * config.faded_alpha;
    match mode {
        Mode::Creation => faded,
        Mode::Edit => {
            let emphasized = selected.iter().any(|id| *id == layer.layer_id)
                || editor.editing_layer() == Some(layer.layer_id.as_str());
            if emphasized {
                full
            } else {
                faded
            }
        }
        Mode::Review => full,
    }
}

/// Masks for the prediction layer: visible committed layers (the live edit
/// buffer standing in for the layer being edited) and, in creation mode,
/// visible candidates on top.
fn collect_overlays<'a>(
    layers: &'a [Layer],
    candidates: &'a [PredictionCandidate],
    editor: &'a MaskEditor,
    selected: &[String],
    mode: Mode,
    config: &CanvasConfig,
) -> Vec<MaskOverlay<'a>> {
    let mut overlays = Vec::new();
    for layer in layers.iter().filter(|l| l.visible) {
        let mask = if editor.editing_layer() == Some(layer.layer_id.as_str()) {
            editor.buffer()
        } else {
            layer.mask_data.as_ref()
        };
        if let Some(mask) = mask {
            overlays.push(MaskOverlay {
                mask,
                color: layer.display_color,
                alpha: layer_alpha(layer, editor, selected, mode, config),
            });
        }
    }
    if mode == Mode::Creation {
        overlays.extend(candidates.iter().filter(|c| c.visible).map(|c| MaskOverlay {
            mask: &c.segmentation,
            color: c.color,
            alpha: config.mask_alpha,
        }));
    }
    overlays
}

impl std::fmt::Debug for AnnotationCanvas {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnnotationCanvas")
            .field("filename", &self.filename())
            .field("mode", &self.mode)
            .field("layers", &self.layers.len())
            .field("candidates", &self.candidates.len())
            .finish()
    }
}
