//! Layer compositor.
//!
//! Three render layers (image, prediction masks, user input), each an
//! off-screen surface plus the visible surface it is presented onto at the
//! layer's own opacity. All six surfaces always share the fitted canvas size.
//! Masks are first rasterized at native image resolution into a scratch
//! surface and brought to canvas size with a single scaled blit.

use image::RgbaImage;
use tracing::{debug, warn};

use crate::color::Color;
use crate::config::{quantize_opacity, CanvasConfig};
use crate::geometry::Point;
use crate::input::InputCollector;
use crate::mask::BinaryMask;
use crate::notify::LayerKind;
use crate::raster::Surface;
use crate::transform::{CoordinateTransform, ZoomPan};

const POINT_POSITIVE: Color = Color::rgb(0, 200, 0);
const POINT_NEGATIVE: Color = Color::rgb(220, 0, 0);
const BOX_STROKE: Color = Color::rgb(0, 255, 255);
const BOX_OUTLINE: Color = Color::rgba(0, 0, 0, 200);
const LASSO_PENDING: Color = Color::rgb(255, 0, 255);
const POLYGON_FILL_ALPHA: f32 = 0.3;

/// A loaded image. Replaced wholesale on the next load.
#[derive(Debug, Clone)]
pub struct ImageFrame {
    pub pixels: RgbaImage,
    pub filename: Option<String>,
}

impl ImageFrame {
    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.pixels.height()
    }
}

/// One mask to draw on the prediction layer.
#[derive(Debug, Clone, Copy)]
pub struct MaskOverlay<'a> {
    pub mask: &'a BinaryMask,
    pub color: Color,
    /// Per-pixel alpha in [0, 1].
    pub alpha: f32,
}

#[derive(Debug)]
struct RenderLayer {
    offscreen: Surface,
    visible: Surface,
    opacity: f32,
    generation: u64,
}

impl RenderLayer {
    fn new(opacity: f32) -> Self {
        Self {
            offscreen: Surface::default(),
            visible: Surface::default(),
            opacity,
            generation: 0,
        }
    }

    fn resize(&mut self, width: u32, height: u32) {
        self.offscreen.resize(width, height);
        self.visible.resize(width, height);
    }

    /// Copy the off-screen buffer to the visible surface at this layer's opacity.
    fn present(&mut self) {
        self.visible.clear();
        self.visible.composite(&self.offscreen, self.opacity);
        self.generation += 1;
    }
}

#[derive(Debug)]
pub struct LayerCompositor {
    frame: Option<ImageFrame>,
    container: Option<(f32, f32)>,
    transform: CoordinateTransform,
    zoom: ZoomPan,

    image: RenderLayer,
    prediction: RenderLayer,
    user_input: RenderLayer,
    scratch: Surface,

    opacity_step: f32,
    point_radius_px: f32,
    min_zoom: f32,
    max_zoom: f32,
}

impl LayerCompositor {
    pub fn new(config: &CanvasConfig) -> Self {
        Self {
            frame: None,
            container: None,
            transform: CoordinateTransform::default(),
            zoom: ZoomPan::default(),
            image: RenderLayer::new(config.image_opacity),
            prediction: RenderLayer::new(config.prediction_opacity),
            user_input: RenderLayer::new(config.user_input_opacity),
            scratch: Surface::default(),
            opacity_step: config.opacity_step,
            point_radius_px: config.point_radius_px,
            min_zoom: config.min_zoom,
            max_zoom: config.max_zoom,
        }
    }

    /// Container size the image is fitted into. Without one the image is
    /// shown at native size.
    pub fn set_container(&mut self, width: f32, height: f32) -> bool {
        let next = Some((width.max(0.0), height.max(0.0)));
        let changed = self.container != next;
        self.container = next;
        changed
    }

    pub fn container(&self) -> Option<(f32, f32)> {
        self.container
    }

    /// Take ownership of a new image and reset the view. Nothing is drawn
    /// until `draw_image`.
    pub fn load_frame(&mut self, frame: ImageFrame) {
        self.frame = Some(frame);
        self.zoom.reset();
    }

    pub fn frame(&self) -> Option<&ImageFrame> {
        self.frame.as_ref()
    }

    pub fn transform(&self) -> &CoordinateTransform {
        &self.transform
    }

    pub fn zoom_pan(&self) -> ZoomPan {
        self.zoom
    }

    pub fn canvas_size(&self) -> (u32, u32) {
        self.transform.canvas_size()
    }

    fn layer(&self, kind: LayerKind) -> &RenderLayer {
        match kind {
            LayerKind::Image => &self.image,
            LayerKind::Prediction => &self.prediction,
            LayerKind::UserInput => &self.user_input,
        }
    }

    fn layer_mut(&mut self, kind: LayerKind) -> &mut RenderLayer {
        match kind {
            LayerKind::Image => &mut self.image,
            LayerKind::Prediction => &mut self.prediction,
            LayerKind::UserInput => &mut self.user_input,
        }
    }

    /// Resize every surface to the fitted canvas size and redraw the image
    /// layer. The other two layers are left cleared for the caller to redraw.
    pub fn draw_image(&mut self) {
        let Some(frame) = &self.frame else {
            self.transform.reset();
            for kind in LayerKind::ALL {
                self.layer_mut(kind).resize(0, 0);
            }
            return;
        };
        let (iw, ih) = (frame.width(), frame.height());
        match self.container {
            Some((cw, ch)) => self.transform.fit(iw, ih, cw, ch),
            None => self.transform = CoordinateTransform::with_scale(iw, ih, 1.0),
        }
        let (w, h) = self.transform.canvas_size();
        self.image.resize(w, h);
        self.prediction.resize(w, h);
        self.user_input.resize(w, h);
        if self.scratch.resize(iw, ih) {
            debug!(width = iw, height = ih, "mask scratch reallocated");
        }
        self.zoom.clamp((w, h));

        self.image.offscreen.clear();
        self.image.offscreen.draw_scaled(&frame.pixels, 1.0);
        self.image.present();
        debug!(
            width = w,
            height = h,
            scale = self.transform.display_scale(),
            "image layer drawn"
        );
    }

    /// Rasterize prompts at canvas resolution and present them.
    pub fn draw_user_input_layer(&mut self, inputs: &InputCollector) {
        let t = self.transform;
        let radius = self.point_radius_px;
        let surface = &mut self.user_input.offscreen;
        surface.clear();
        if !surface.is_empty() {
            let to_display = |p: &Point| t.point_to_display(p);

            for poly in inputs.polygons() {
                let pts: Vec<Point> = poly.points.iter().map(to_display).collect();
                surface.fill_polygon(&pts, poly.color.with_alpha(POLYGON_FILL_ALPHA));
                surface.stroke_polyline(&pts, true, 2.0, Color::WHITE);
            }
            if let Some(path) = inputs.pending_lasso() {
                let pts: Vec<Point> = path.iter().map(to_display).collect();
                surface.stroke_polyline(&pts, false, 2.0, LASSO_PENDING);
            }
            for p in inputs.points() {
                let center = to_display(&p.position());
                let fill = if p.label == 1 { POINT_POSITIVE } else { POINT_NEGATIVE };
                surface.fill_circle(center, radius + 1.5, Color::WHITE);
                surface.fill_circle(center, radius, fill);
            }
            for b in inputs.boxes().iter().copied().chain(inputs.pending_box()) {
                let min = t.to_display(b.x1, b.y1);
                let max = t.to_display(b.x2, b.y2);
                surface.stroke_rect(min, max, 4.0, BOX_OUTLINE);
                surface.stroke_rect(min, max, 2.0, BOX_STROKE);
            }
        }
        self.user_input.present();
    }

    /// Rasterize masks at native resolution, blit them down once, present.
    /// Masks whose shape differs from the image are skipped with a warning.
    /// Returns how many masks were drawn.
    pub fn draw_prediction_mask_layer(&mut self, overlays: &[MaskOverlay<'_>]) -> usize {
        self.prediction.offscreen.clear();
        let drawn = match &self.frame {
            Some(frame) => rasterize_masks(&mut self.scratch, overlays, frame.height(), frame.width()),
            None => 0,
        };
        if drawn > 0 {
            self.prediction.offscreen.draw_scaled(self.scratch.image(), 1.0);
        }
        self.prediction.present();
        drawn
    }

    /// Set a layer's opacity (snapped to the slider step) and re-present
    /// that layer only. Returns the stored value.
    pub fn set_opacity(&mut self, kind: LayerKind, value: f32) -> f32 {
        let opacity = quantize_opacity(value, self.opacity_step);
        let layer = self.layer_mut(kind);
        layer.opacity = opacity;
        layer.present();
        opacity
    }

    pub fn opacity(&self, kind: LayerKind) -> f32 {
        self.layer(kind).opacity
    }

    /// Visible surface of a layer.
    pub fn visible(&self, kind: LayerKind) -> &Surface {
        &self.layer(kind).visible
    }

    /// How many times a layer has been presented.
    pub fn generation(&self, kind: LayerKind) -> u64 {
        self.layer(kind).generation
    }

    /// Zoom around an anchor given in unzoomed canvas pixels.
    pub fn zoom_at(&mut self, factor: f32, anchor_x: f32, anchor_y: f32) -> ZoomPan {
        let size = self.canvas_size();
        self.zoom
            .zoom_at(factor, anchor_x, anchor_y, size, self.min_zoom, self.max_zoom);
        self.zoom
    }

    pub fn pan_by(&mut self, dx: f32, dy: f32) -> ZoomPan {
        let size = self.canvas_size();
        self.zoom.pan_by(dx, dy, size);
        self.zoom
    }

    pub fn reset_view(&mut self) -> ZoomPan {
        self.zoom.reset();
        self.zoom
    }

    /// The three visible surfaces stacked, at canvas resolution.
    pub fn flatten(&self) -> RgbaImage {
        let (w, h) = self.canvas_size();
        let mut out = Surface::new(w, h);
        for kind in LayerKind::ALL {
            out.composite(&self.layer(kind).visible, 1.0);
        }
        out.image().clone()
    }

    /// Image plus masks at native resolution, honoring the image and
    /// prediction layer opacities.
    pub fn composite_full_resolution(&self, overlays: &[MaskOverlay<'_>]) -> Option<RgbaImage> {
        let frame = self.frame.as_ref()?;
        let (w, h) = (frame.width(), frame.height());
        let mut out = Surface::new(w, h);
        out.draw_scaled(&frame.pixels, self.image.opacity);
        let mut masks = Surface::new(w, h);
        if rasterize_masks(&mut masks, overlays, h, w) > 0 {
            out.composite(&masks, self.prediction.opacity);
        }
        Some(out.image().clone())
    }
}

fn rasterize_masks(target: &mut Surface, overlays: &[MaskOverlay<'_>], height: u32, width: u32) -> usize {
    target.clear();
    let mut drawn = 0;
    for overlay in overlays {
        if let Err(e) = overlay.mask.expect_shape(height, width) {
            warn!("Skipping mask overlay: {}", e);
            continue;
        }
        let color = overlay.color.with_alpha(overlay.alpha);
        let w = width as usize;
        for (i, _) in overlay.mask.data().iter().enumerate().filter(|(_, v)| **v != 0) {
            target.put_pixel((i % w) as i64, (i / w) as i64, color);
        }
        drawn += 1;
    }
    drawn
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::{CollectorSettings, Modifiers, PointerButton};
    use image::Rgba;

    fn frame(w: u32, h: u32) -> ImageFrame {
        ImageFrame {
            pixels: RgbaImage::from_pixel(w, h, Rgba([40, 80, 120, 255])),
            filename: Some("test.png".into()),
        }
    }

    fn compositor(w: u32, h: u32) -> LayerCompositor {
        let mut c = LayerCompositor::new(&CanvasConfig::default());
        c.load_frame(frame(w, h));
        c
    }

    #[test]
    fn test_draw_image_fits_and_sizes_all_layers() {
        let mut c = compositor(400, 200);
        c.set_container(200.0, 200.0);
        c.draw_image();
        assert_eq!(c.canvas_size(), (200, 100));
        for kind in LayerKind::ALL {
            assert_eq!(c.visible(kind).dimensions(), (200, 100));
        }
        let px = c.visible(LayerKind::Image).pixel(10, 10).unwrap();
        assert!(px[0].abs_diff(40) <= 1 && px[2].abs_diff(120) <= 1);
        assert_eq!(px[3], 255);
    }

    #[test]
    fn test_without_frame_is_noop() {
        let mut c = LayerCompositor::new(&CanvasConfig::default());
        c.draw_image();
        assert_eq!(c.canvas_size(), (0, 0));
        let mask = BinaryMask::zeros(1, 1);
        let overlay = MaskOverlay {
            mask: &mask,
            color: Color::WHITE,
            alpha: 1.0,
        };
        assert_eq!(c.draw_prediction_mask_layer(&[overlay]), 0);
        assert!(c.composite_full_resolution(&[]).is_none());
    }

    #[test]
    fn test_prediction_layer_skips_mismatched_mask() {
        let mut c = compositor(4, 4);
        c.draw_image();
        let good = BinaryMask::new(4, 4, vec![1; 16]).unwrap();
        let bad = BinaryMask::zeros(3, 3);
        let overlays = [
            MaskOverlay {
                mask: &bad,
                color: Color::WHITE,
                alpha: 1.0,
            },
            MaskOverlay {
                mask: &good,
                color: Color::rgb(255, 0, 0),
                alpha: 1.0,
            },
        ];
        assert_eq!(c.draw_prediction_mask_layer(&overlays), 1);
        // Default prediction opacity 0.6.
        let px = c.visible(LayerKind::Prediction).pixel(0, 0).unwrap();
        assert_eq!(px[0], 255);
        assert_eq!(px[3], 153);
    }

    #[test]
    fn test_opacity_isolation() {
        let mut c = compositor(8, 8);
        c.draw_image();
        let mask = BinaryMask::new(8, 8, vec![1; 64]).unwrap();
        c.draw_prediction_mask_layer(&[MaskOverlay {
            mask: &mask,
            color: Color::rgb(0, 0, 255),
            alpha: 0.6,
        }]);
        let image_before = c.visible(LayerKind::Image).image().clone();
        let input_before = c.visible(LayerKind::UserInput).image().clone();
        let image_gen = c.generation(LayerKind::Image);

        assert!((c.set_opacity(LayerKind::Prediction, 0.33) - 0.35).abs() < 1e-6);
        assert_eq!(c.visible(LayerKind::Image).image(), &image_before);
        assert_eq!(c.visible(LayerKind::UserInput).image(), &input_before);
        assert_eq!(c.generation(LayerKind::Image), image_gen);
    }

    #[test]
    fn test_user_input_layer_draws_points() {
        let mut c = compositor(100, 100);
        c.draw_image();
        let mut inputs = InputCollector::new(CollectorSettings::default());
        inputs.set_image(100, 100, 1.0);
        inputs.pointer_down(Point::new(50.0, 50.0), PointerButton::Primary, Modifiers::NONE);
        inputs.pointer_up(Point::new(50.0, 50.0));
        c.draw_user_input_layer(&inputs);
        let px = c.visible(LayerKind::UserInput).pixel(50, 50).unwrap();
        assert_eq!(px[1], 200);
        assert!(px[3] > 0);
        assert_eq!(c.visible(LayerKind::UserInput).pixel(5, 5), Some([0, 0, 0, 0]));
    }

    #[test]
    fn test_scratch_kept_across_container_resizes() {
        let mut c = compositor(100, 50);
        c.set_container(50.0, 50.0);
        c.draw_image();
        assert_eq!(c.canvas_size(), (50, 25));
        c.set_container(1000.0, 1000.0);
        c.draw_image();
        assert_eq!(c.canvas_size(), (100, 50));
        assert_eq!(c.scratch.dimensions(), (100, 50));
    }

    #[test]
    fn test_zoom_pan_clamped_to_canvas() {
        let mut c = compositor(100, 100);
        c.draw_image();
        let zp = c.zoom_at(2.0, 50.0, 50.0);
        assert_eq!(zp.scale, 2.0);
        assert_eq!((zp.pan_x, zp.pan_y), (-50.0, -50.0));
        let zp = c.pan_by(100.0, -500.0);
        assert_eq!((zp.pan_x, zp.pan_y), (0.0, -100.0));
        assert_eq!(c.reset_view(), ZoomPan::default());
    }

    #[test]
    fn test_composite_full_resolution() {
        let mut c = compositor(4, 2);
        c.set_container(2.0, 1.0);
        c.draw_image();
        let mask = BinaryMask::new(4, 2, vec![1, 0, 0, 0, 0, 0, 0, 0]).unwrap();
        let out = c
            .composite_full_resolution(&[MaskOverlay {
                mask: &mask,
                color: Color::rgb(255, 255, 255),
                alpha: 1.0,
            }])
            .unwrap();
        assert_eq!(out.dimensions(), (4, 2));
        assert!(out.get_pixel(0, 0).0[0] > 40);
        assert_eq!(out.get_pixel(3, 1).0, [40, 80, 120, 255]);
    }
}
