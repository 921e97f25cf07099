//! Interactive input collector: pointer gestures to prompts.
//!
//! Gestures (positions already in original-image coordinates):
//! - click: toggle a point (primary = positive, secondary = negative)
//! - shift + drag: box; shift + click removes the box under the pointer
//! - ctrl + drag: lasso polygon; ctrl + click removes the polygon under the pointer
//!
//! Only one gesture runs at a time. The collector never notifies anyone on
//! its own; gesture completion reports whether the prompt set changed and the
//! owner decides what to emit.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::color::{distinct_colors, Color};
use crate::config::CanvasConfig;
use crate::geometry::{BBox, Point, Polygon};
use crate::mask::BinaryMask;
use crate::raster::{FillRule, Surface};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerButton {
    Primary,
    Secondary,
    Middle,
}

impl PointerButton {
    /// DOM-style button index: 0 primary, 1 middle, 2 secondary.
    pub fn from_index(index: u8) -> Option<Self> {
        match index {
            0 => Some(PointerButton::Primary),
            1 => Some(PointerButton::Middle),
            2 => Some(PointerButton::Secondary),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Modifiers {
    pub shift: bool,
    /// Ctrl, or Cmd on macOS.
    pub ctrl: bool,
}

impl Modifiers {
    pub const NONE: Modifiers = Modifiers {
        shift: false,
        ctrl: false,
    };
    pub const SHIFT: Modifiers = Modifiers {
        shift: true,
        ctrl: false,
    };
    pub const CTRL: Modifiers = Modifiers {
        shift: false,
        ctrl: true,
    };
}

/// A point prompt; `label` is 1 for include, 0 for exclude.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PointPrompt {
    pub x: f32,
    pub y: f32,
    pub label: u8,
}

impl PointPrompt {
    pub fn position(&self) -> Point {
        Point::new(self.x, self.y)
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Gesture {
    Idle,
    Click { start: Point, label: u8 },
    DrawingBox { start: Point, current: Point },
    DrawingLasso { start: Point, points: Vec<Point> },
}

/// Collector settings taken from the canvas configuration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CollectorSettings {
    pub click_threshold_px: f32,
    pub multi_box: bool,
    pub prompt_mask_size: u32,
}

impl From<&CanvasConfig> for CollectorSettings {
    fn from(config: &CanvasConfig) -> Self {
        Self {
            click_threshold_px: config.click_threshold_px,
            multi_box: config.multi_box,
            prompt_mask_size: config.prompt_mask_size,
        }
    }
}

impl Default for CollectorSettings {
    fn default() -> Self {
        CollectorSettings::from(&CanvasConfig::default())
    }
}

#[derive(Debug, Clone)]
pub struct InputCollector {
    settings: CollectorSettings,
    image_size: Option<(u32, u32)>,
    display_scale: f32,
    enabled: bool,

    points: Vec<PointPrompt>,
    boxes: Vec<BBox>,
    polygons: Vec<Polygon>,
    combined_mask: Option<BinaryMask>,

    gesture: Gesture,
    next_polygon_id: u64,
}

impl InputCollector {
    pub fn new(settings: CollectorSettings) -> Self {
        Self {
            settings,
            image_size: None,
            display_scale: 1.0,
            enabled: true,
            points: Vec::new(),
            boxes: Vec::new(),
            polygons: Vec::new(),
            combined_mask: None,
            gesture: Gesture::Idle,
            next_polygon_id: 1,
        }
    }

    pub fn settings(&self) -> &CollectorSettings {
        &self.settings
    }

    /// Start collecting for a new image; all prompts are dropped.
    pub fn set_image(&mut self, width: u32, height: u32, display_scale: f32) {
        self.image_size = Some((width, height));
        self.display_scale = display_scale;
        self.clear();
    }

    pub fn set_display_scale(&mut self, display_scale: f32) {
        self.display_scale = display_scale;
    }

    /// Returns true when turning multi-box off dropped boxes.
    pub fn set_multi_box(&mut self, multi_box: bool) -> bool {
        self.settings.multi_box = multi_box;
        if multi_box || self.boxes.len() <= 1 {
            return false;
        }
        // Keep the most recent box.
        let last = self.boxes.pop();
        self.boxes.clear();
        self.boxes.extend(last);
        true
    }

    pub fn image_size(&self) -> Option<(u32, u32)> {
        self.image_size
    }

    /// Disabled collectors ignore gestures and drop any in-flight one.
    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
        if !enabled {
            self.gesture = Gesture::Idle;
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Drop every prompt and any gesture in progress.
    pub fn clear(&mut self) {
        self.points.clear();
        self.boxes.clear();
        self.polygons.clear();
        self.combined_mask = None;
        self.gesture = Gesture::Idle;
    }

    /// Click/drag threshold converted to original-image pixels.
    pub fn threshold(&self) -> f32 {
        if self.display_scale > 0.0 {
            self.settings.click_threshold_px / self.display_scale
        } else {
            self.settings.click_threshold_px
        }
    }

    pub fn points(&self) -> &[PointPrompt] {
        &self.points
    }

    pub fn boxes(&self) -> &[BBox] {
        &self.boxes
    }

    pub fn polygons(&self) -> &[Polygon] {
        &self.polygons
    }

    pub fn combined_mask(&self) -> Option<&BinaryMask> {
        self.combined_mask.as_ref()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty() && self.boxes.is_empty() && self.combined_mask.is_none()
    }

    pub fn is_idle(&self) -> bool {
        self.gesture == Gesture::Idle
    }

    /// The box being dragged, if any.
    pub fn pending_box(&self) -> Option<BBox> {
        match &self.gesture {
            Gesture::DrawingBox { start, current } => Some(BBox::from_corners(*start, *current)),
            _ => None,
        }
    }

    /// The lasso path being drawn, if any.
    pub fn pending_lasso(&self) -> Option<&[Point]> {
        match &self.gesture {
            Gesture::DrawingLasso { points, .. } => Some(points),
            _ => None,
        }
    }

    /// Begin a gesture. Returns false when the press is ignored (disabled,
    /// no image, unsupported button, or another gesture still running).
    pub fn pointer_down(&mut self, pos: Point, button: PointerButton, modifiers: Modifiers) -> bool {
        if !self.enabled || self.image_size.is_none() || self.gesture != Gesture::Idle {
            return false;
        }
        self.gesture = match (button, modifiers) {
            (PointerButton::Primary, m) if m.shift => Gesture::DrawingBox {
                start: pos,
                current: pos,
            },
            (PointerButton::Primary, m) if m.ctrl => Gesture::DrawingLasso {
                start: pos,
                points: vec![pos],
            },
            (PointerButton::Primary, _) => Gesture::Click { start: pos, label: 1 },
            (PointerButton::Secondary, _) => Gesture::Click { start: pos, label: 0 },
            (PointerButton::Middle, _) => return false,
        };
        debug!(gesture = ?self.gesture, "gesture started");
        true
    }

    /// Returns true when the pending overlay (box or lasso) changed.
    pub fn pointer_move(&mut self, pos: Point) -> bool {
        match &mut self.gesture {
            Gesture::DrawingBox { current, .. } => {
                *current = pos;
                true
            }
            Gesture::DrawingLasso { points, .. } => {
                points.push(pos);
                true
            }
            Gesture::Idle | Gesture::Click { .. } => false,
        }
    }

    /// Complete the gesture at `pos`. Returns true when the prompt set changed.
    pub fn pointer_up(&mut self, pos: Point) -> bool {
        let gesture = std::mem::replace(&mut self.gesture, Gesture::Idle);
        let threshold = self.threshold();
        match gesture {
            Gesture::Idle => false,
            Gesture::Click { start, label } => {
                if start.distance_to(&pos) >= threshold {
                    debug!("plain drag ignored");
                    return false;
                }
                self.toggle_point(start, label);
                true
            }
            Gesture::DrawingBox { start, .. } => self.finish_box(start, pos, threshold),
            Gesture::DrawingLasso { start, points } => self.finish_lasso(start, points, threshold),
        }
    }

    /// The pointer left the canvas: drags finish as if released at their
    /// last position, pending clicks are abandoned.
    pub fn pointer_leave(&mut self) -> bool {
        let gesture = std::mem::replace(&mut self.gesture, Gesture::Idle);
        let threshold = self.threshold();
        match gesture {
            Gesture::DrawingBox { start, current } => self.finish_box(start, current, threshold),
            Gesture::DrawingLasso { start, points } => self.finish_lasso(start, points, threshold),
            Gesture::Idle | Gesture::Click { .. } => false,
        }
    }

    fn toggle_point(&mut self, at: Point, label: u8) {
        let threshold = self.threshold();
        let nearest = self
            .points
            .iter()
            .enumerate()
            .map(|(i, p)| (i, p.position().distance_to(&at)))
            .filter(|(_, d)| *d < threshold)
            .min_by(|a, b| a.1.total_cmp(&b.1));
        match nearest {
            Some((i, _)) => {
                let removed = self.points.remove(i);
                debug!(x = removed.x, y = removed.y, "point removed");
            }
            None => {
                self.points.push(PointPrompt {
                    x: at.x,
                    y: at.y,
                    label,
                });
                debug!(x = at.x, y = at.y, label, "point added");
            }
        }
    }

    fn finish_box(&mut self, start: Point, end: Point, threshold: f32) -> bool {
        if start.distance_to(&end) < threshold {
            // Shift-click: remove the most recent box under the pointer.
            return match self.boxes.iter().rposition(|b| b.contains(&start)) {
                Some(i) => {
                    self.boxes.remove(i);
                    debug!("box removed");
                    true
                }
                None => false,
            };
        }
        let bbox = BBox::from_corners(start, end);
        if bbox.width() < threshold || bbox.height() < threshold {
            debug!(width = bbox.width(), height = bbox.height(), "degenerate box discarded");
            return false;
        }
        if !self.settings.multi_box {
            self.boxes.clear();
        }
        self.boxes.push(bbox);
        debug!(?bbox, "box added");
        true
    }

    fn finish_lasso(&mut self, start: Point, points: Vec<Point>, threshold: f32) -> bool {
        if points.iter().all(|p| p.distance_to(&start) < threshold) {
            // Ctrl-click: remove the most recent polygon under the pointer.
            return match self.polygons.iter().rposition(|poly| poly.contains(&start)) {
                Some(i) => {
                    let removed = self.polygons.remove(i);
                    debug!(id = removed.id, "polygon removed");
                    self.rederive_mask();
                    true
                }
                None => false,
            };
        }
        if points.len() < Polygon::MIN_POINTS {
            debug!(len = points.len(), "lasso discarded");
            return false;
        }
        let color = lasso_color(self.polygons.len());
        let polygon = Polygon {
            id: self.next_polygon_id,
            points,
            color,
        };
        self.next_polygon_id += 1;
        debug!(id = polygon.id, len = polygon.points.len(), "polygon added");
        self.polygons.push(polygon);
        self.rederive_mask();
        true
    }

    fn rederive_mask(&mut self) {
        self.combined_mask = match self.image_size {
            Some((w, h)) => derive_prompt_mask(&self.polygons, w, h, self.settings.prompt_mask_size),
            None => None,
        };
    }

    /// Current prompts as handed to the prediction collaborator.
    pub fn snapshot(&self, filename: Option<&str>) -> InputSnapshot {
        let (original_width, original_height) = self.image_size.unwrap_or((0, 0));
        InputSnapshot {
            points: self.points.clone(),
            boxes: self.boxes.clone(),
            mask_input: self.combined_mask.clone(),
            image_present: self.image_size.is_some(),
            filename: filename.map(str::to_owned),
            original_width,
            original_height,
        }
    }
}

fn lasso_color(index: usize) -> Color {
    distinct_colors(index + 1).pop().unwrap_or_default()
}

/// Rasterize lasso polygons into a `size x size` prompt mask.
///
/// Coordinates are scaled per axis by `size / width` and `size / height`, and
/// filled with the nonzero winding rule, so a loop traced twice stays solid.
/// A pixel counts when its rendered intensity is above half. Returns `None`
/// when no pixel ends up inside.
pub fn derive_prompt_mask(polygons: &[Polygon], width: u32, height: u32, size: u32) -> Option<BinaryMask> {
    if width == 0 || height == 0 || size == 0 {
        return None;
    }
    let closed: Vec<&Polygon> = polygons.iter().filter(|p| p.is_closed_region()).collect();
    if closed.is_empty() {
        return None;
    }
    let sx = size as f32 / width as f32;
    let sy = size as f32 / height as f32;
    let mut surface = Surface::new(size, size);
    for poly in closed {
        let scaled: Vec<Point> = poly.points.iter().map(|p| Point::new(p.x * sx, p.y * sy)).collect();
        surface.fill_polygon_with(&scaled, Color::WHITE, FillRule::NonZero);
    }
    let data: Vec<u8> = surface.as_raw().chunks_exact(4).map(|px| u8::from(px[0] > 128)).collect();
    let mask = BinaryMask::new(size, size, data).ok()?;
    if mask.area() == 0 {
        debug!("prompt mask encloses no pixels");
        return None;
    }
    Some(mask)
}

/// Prompt state handed to the caller before a prediction request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InputSnapshot {
    pub points: Vec<PointPrompt>,
    pub boxes: Vec<BBox>,
    pub mask_input: Option<BinaryMask>,
    pub image_present: bool,
    pub filename: Option<String>,
    pub original_width: u32,
    pub original_height: u32,
}

impl InputSnapshot {
    /// Nothing to predict from.
    pub fn is_empty(&self) -> bool {
        self.points.is_empty() && self.boxes.is_empty() && self.mask_input.is_none()
    }
}

/// Box prompt field: one box is sent flat, several as a list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum BoxPrompt {
    Single([f32; 4]),
    Many(Vec<[f32; 4]>),
}

/// Body of an interactive predict request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictRequest {
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub points: Option<Vec<[f32; 2]>>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub labels: Option<Vec<u8>>,
    #[serde(rename = "box", skip_serializing_if = "Option::is_none", default)]
    pub boxes: Option<BoxPrompt>,
    #[serde(rename = "maskInput", skip_serializing_if = "Option::is_none", default)]
    pub mask_input: Option<BinaryMask>,
    pub multimask_output: bool,
}

impl PredictRequest {
    /// Several boxes force single-mask output.
    pub fn from_snapshot(snapshot: &InputSnapshot) -> Self {
        let (points, labels) = if snapshot.points.is_empty() {
            (None, None)
        } else {
            (
                Some(snapshot.points.iter().map(|p| [p.x, p.y]).collect()),
                Some(snapshot.points.iter().map(|p| p.label).collect()),
            )
        };
        let boxes = match snapshot.boxes.as_slice() {
            [] => None,
            [single] => Some(BoxPrompt::Single(single.to_array())),
            many => Some(BoxPrompt::Many(many.iter().map(BBox::to_array).collect())),
        };
        Self {
            points,
            labels,
            boxes,
            mask_input: snapshot.mask_input.clone(),
            multimask_output: snapshot.boxes.len() <= 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn collector() -> InputCollector {
        let mut c = InputCollector::new(CollectorSettings::default());
        c.set_image(100, 100, 1.0);
        c
    }

    fn click(c: &mut InputCollector, x: f32, y: f32, button: PointerButton, m: Modifiers) -> bool {
        c.pointer_down(Point::new(x, y), button, m);
        c.pointer_up(Point::new(x, y))
    }

    fn drag(c: &mut InputCollector, path: &[(f32, f32)], m: Modifiers) -> bool {
        let (first, rest) = path.split_first().unwrap();
        c.pointer_down(Point::new(first.0, first.1), PointerButton::Primary, m);
        for &(x, y) in rest {
            c.pointer_move(Point::new(x, y));
        }
        let last = path.last().unwrap();
        c.pointer_up(Point::new(last.0, last.1))
    }

    #[test]
    fn test_click_adds_positive_point() {
        let mut c = collector();
        assert!(click(&mut c, 50.0, 50.0, PointerButton::Primary, Modifiers::NONE));
        assert_eq!(c.points(), &[PointPrompt { x: 50.0, y: 50.0, label: 1 }]);
        assert!(c.boxes().is_empty());
        assert!(c.polygons().is_empty());
    }

    #[test]
    fn test_second_click_removes_point() {
        let mut c = collector();
        click(&mut c, 50.0, 50.0, PointerButton::Primary, Modifiers::NONE);
        click(&mut c, 52.0, 51.0, PointerButton::Primary, Modifiers::NONE);
        assert!(c.points().is_empty());
        assert!(c.is_empty());
    }

    #[test]
    fn test_right_click_adds_negative_point() {
        let mut c = collector();
        click(&mut c, 10.0, 20.0, PointerButton::Secondary, Modifiers::NONE);
        assert_eq!(c.points()[0].label, 0);
    }

    #[test]
    fn test_threshold_follows_display_scale() {
        let mut c = collector();
        c.set_display_scale(0.5);
        assert_eq!(c.threshold(), 10.0);
        click(&mut c, 50.0, 50.0, PointerButton::Primary, Modifiers::NONE);
        click(&mut c, 58.0, 50.0, PointerButton::Primary, Modifiers::NONE);
        assert!(c.points().is_empty());
    }

    #[test]
    fn test_shift_drag_box() {
        let mut c = collector();
        assert!(drag(&mut c, &[(60.0, 40.0), (30.0, 20.0), (10.0, 10.0)], Modifiers::SHIFT));
        assert_eq!(c.boxes()[0].to_array(), [10.0, 10.0, 60.0, 40.0]);
    }

    #[test]
    fn test_box_threshold_boundary() {
        let mut c = collector();
        assert!(!drag(&mut c, &[(10.0, 10.0), (14.0, 40.0)], Modifiers::SHIFT));
        assert!(c.boxes().is_empty());
        assert!(drag(&mut c, &[(10.0, 10.0), (15.0, 15.0)], Modifiers::SHIFT));
        assert_eq!(c.boxes().len(), 1);
    }

    #[test]
    fn test_single_box_mode_replaces() {
        let mut c = collector();
        drag(&mut c, &[(10.0, 10.0), (30.0, 30.0)], Modifiers::SHIFT);
        drag(&mut c, &[(50.0, 50.0), (90.0, 90.0)], Modifiers::SHIFT);
        assert_eq!(c.boxes().len(), 1);
        assert_eq!(c.boxes()[0].x1, 50.0);

        c.set_multi_box(true);
        drag(&mut c, &[(10.0, 10.0), (30.0, 30.0)], Modifiers::SHIFT);
        assert_eq!(c.boxes().len(), 2);
    }

    #[test]
    fn test_shift_click_removes_box() {
        let mut c = collector();
        drag(&mut c, &[(10.0, 10.0), (60.0, 40.0)], Modifiers::SHIFT);
        assert!(click(&mut c, 30.0, 30.0, PointerButton::Primary, Modifiers::SHIFT));
        assert!(c.boxes().is_empty());
        assert!(!click(&mut c, 30.0, 30.0, PointerButton::Primary, Modifiers::SHIFT));
    }

    #[test]
    fn test_lasso_point_count_boundary() {
        let mut c = collector();
        assert!(!drag(&mut c, &[(10.0, 10.0), (50.0, 10.0)], Modifiers::CTRL));
        assert!(c.polygons().is_empty());
        assert!(c.combined_mask().is_none());

        assert!(drag(&mut c, &[(10.0, 10.0), (50.0, 10.0), (30.0, 50.0)], Modifiers::CTRL));
        assert_eq!(c.polygons().len(), 1);
        assert_eq!(c.polygons()[0].points.len(), 3);
        let mask = c.combined_mask().unwrap();
        assert_eq!(mask.shape(), (256, 256));
        assert!(mask.area() > 0);
    }

    #[test]
    fn test_ctrl_click_removes_polygon() {
        let mut c = collector();
        drag(&mut c, &[(10.0, 10.0), (80.0, 10.0), (80.0, 80.0), (10.0, 80.0)], Modifiers::CTRL);
        assert!(click(&mut c, 40.0, 40.0, PointerButton::Primary, Modifiers::CTRL));
        assert!(c.polygons().is_empty());
        assert!(c.combined_mask().is_none());
    }

    #[test]
    fn test_pointer_down_during_gesture_ignored() {
        let mut c = collector();
        assert!(c.pointer_down(Point::new(10.0, 10.0), PointerButton::Primary, Modifiers::SHIFT));
        assert!(!c.pointer_down(Point::new(20.0, 20.0), PointerButton::Primary, Modifiers::NONE));
        c.pointer_move(Point::new(40.0, 40.0));
        assert_eq!(c.pending_box().map(|b| b.to_array()), Some([10.0, 10.0, 40.0, 40.0]));
        assert!(c.pointer_up(Point::new(40.0, 40.0)));
        assert!(c.points().is_empty());
    }

    #[test]
    fn test_pointer_leave_finishes_drag() {
        let mut c = collector();
        c.pointer_down(Point::new(10.0, 10.0), PointerButton::Primary, Modifiers::SHIFT);
        c.pointer_move(Point::new(40.0, 30.0));
        assert!(c.pointer_leave());
        assert_eq!(c.boxes().len(), 1);
        assert!(c.is_idle());

        c.pointer_down(Point::new(10.0, 10.0), PointerButton::Primary, Modifiers::NONE);
        assert!(!c.pointer_leave());
        assert!(c.points().is_empty());
    }

    #[test]
    fn test_disabled_collector_ignores_input() {
        let mut c = collector();
        c.set_enabled(false);
        assert!(!click(&mut c, 50.0, 50.0, PointerButton::Primary, Modifiers::NONE));
        assert!(c.points().is_empty());
    }

    #[test]
    fn test_no_image_ignores_input() {
        let mut c = InputCollector::new(CollectorSettings::default());
        assert!(!c.pointer_down(Point::new(1.0, 1.0), PointerButton::Primary, Modifiers::NONE));
    }

    #[test]
    fn test_derive_prompt_mask_scales_per_axis() {
        // Left half of a 200x100 image maps to the left half of the mask.
        let poly = Polygon {
            id: 1,
            points: vec![
                Point::new(0.0, 0.0),
                Point::new(100.0, 0.0),
                Point::new(100.0, 100.0),
                Point::new(0.0, 100.0),
            ],
            color: Color::default(),
        };
        let mask = derive_prompt_mask(&[poly], 200, 100, 256).unwrap();
        assert!(mask.get(10, 10));
        assert!(mask.get(127, 255));
        assert!(!mask.get(128, 10));
        assert_eq!(mask.area(), 128 * 256);
    }

    #[test]
    fn test_derive_prompt_mask_doubled_loop_stays_solid() {
        let square = [
            Point::new(10.0, 10.0),
            Point::new(90.0, 10.0),
            Point::new(90.0, 90.0),
            Point::new(10.0, 90.0),
        ];
        let once = Polygon {
            id: 1,
            points: square.to_vec(),
            color: Color::default(),
        };
        let twice = Polygon {
            id: 2,
            points: square.iter().chain(square.iter()).copied().collect(),
            color: Color::default(),
        };
        let a = derive_prompt_mask(&[once], 100, 100, 256).unwrap();
        let b = derive_prompt_mask(&[twice], 100, 100, 256).unwrap();
        assert!(a.area() > 0);
        assert_eq!(a, b);
    }

    #[test]
    fn test_derive_prompt_mask_without_area_is_none() {
        // A sliver thinner than one mask pixel covers no pixel center.
        let sliver = Polygon {
            id: 1,
            points: vec![Point::new(0.0, 0.0), Point::new(1.0, 0.0), Point::new(0.0, 1.0)],
            color: Color::default(),
        };
        assert!(derive_prompt_mask(&[sliver], 1000, 1000, 256).is_none());
    }

    #[test]
    fn test_snapshot_and_request() {
        let mut c = collector();
        click(&mut c, 50.0, 50.0, PointerButton::Primary, Modifiers::NONE);
        click(&mut c, 10.0, 10.0, PointerButton::Secondary, Modifiers::NONE);
        drag(&mut c, &[(10.0, 10.0), (60.0, 40.0)], Modifiers::SHIFT);
        let snap = c.snapshot(Some("cat.png"));
        assert!(snap.image_present);
        assert_eq!(snap.original_width, 100);

        let req = PredictRequest::from_snapshot(&snap);
        assert!(req.multimask_output);
        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(json["labels"], serde_json::json!([1, 0]));
        assert_eq!(json["box"], serde_json::json!([10.0, 10.0, 60.0, 40.0]));
        assert!(json.get("maskInput").is_none());
    }

    #[test]
    fn test_multi_box_off_keeps_last_box() {
        let mut c = collector();
        assert!(!c.set_multi_box(true));
        drag(&mut c, &[(10.0, 10.0), (30.0, 30.0)], Modifiers::SHIFT);
        drag(&mut c, &[(50.0, 50.0), (90.0, 90.0)], Modifiers::SHIFT);
        assert!(c.set_multi_box(false));
        assert_eq!(c.boxes().len(), 1);
        assert_eq!(c.boxes()[0].x1, 50.0);
        assert!(!c.set_multi_box(false));
    }

    #[test]
    fn test_request_with_many_boxes() {
        let mut c = collector();
        c.set_multi_box(true);
        drag(&mut c, &[(10.0, 10.0), (30.0, 30.0)], Modifiers::SHIFT);
        drag(&mut c, &[(50.0, 50.0), (90.0, 90.0)], Modifiers::SHIFT);
        let req = PredictRequest::from_snapshot(&c.snapshot(None));
        assert!(!req.multimask_output);
        assert!(matches!(req.boxes, Some(BoxPrompt::Many(ref b)) if b.len() == 2));
        assert!(req.points.is_none());
    }
}
