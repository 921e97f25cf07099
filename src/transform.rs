//! Display <-> original-image coordinate mapping, plus zoom/pan.
//!
//! Three spaces are involved:
//! - client space: pointer positions on screen;
//! - canvas space: pixels of the fitted canvas buffer (pre-zoom);
//! - original space: pixels of the loaded image.
//!
//! Zoom/pan is purely visual. It moves and scales the canvas element on
//! screen, so it shows up in the canvas's on-screen bounding box and nowhere
//! else; the canvas buffer keeps its fitted size.

use serde::{Deserialize, Serialize};

use crate::geometry::Point;

/// On-screen bounding box of a canvas element, in client pixels.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ClientRect {
    pub left: f32,
    pub top: f32,
    pub width: f32,
    pub height: f32,
}

impl ClientRect {
    pub fn new(left: f32, top: f32, width: f32, height: f32) -> Self {
        Self { left, top, width, height }
    }

    pub fn contains(&self, x: f32, y: f32) -> bool {
        x >= self.left && y >= self.top && x < self.left + self.width && y < self.top + self.height
    }
}

/// Fit ratio of an image into a container, never upscaling past 1.0.
pub fn fit_scale(image_width: u32, image_height: u32, container_width: f32, container_height: f32) -> f32 {
    if image_width == 0 || image_height == 0 {
        return 1.0;
    }
    (container_width / image_width as f32)
        .min(container_height / image_height as f32)
        .min(1.0)
        .max(0.0)
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CoordinateTransform {
    image_size: Option<(u32, u32)>,
    display_scale: f32,
    canvas_size: (u32, u32),
}

impl Default for CoordinateTransform {
    fn default() -> Self {
        Self {
            image_size: None,
            display_scale: 1.0,
            canvas_size: (0, 0),
        }
    }
}

impl CoordinateTransform {
    /// Transform with a fixed display scale and no container involved.
    pub fn with_scale(image_width: u32, image_height: u32, display_scale: f32) -> Self {
        Self {
            image_size: Some((image_width, image_height)),
            display_scale,
            canvas_size: scaled_size(image_width, image_height, display_scale),
        }
    }

    /// Recompute the fit for an image inside a container.
    pub fn fit(&mut self, image_width: u32, image_height: u32, container_width: f32, container_height: f32) {
        let scale = fit_scale(image_width, image_height, container_width, container_height);
        *self = Self::with_scale(image_width, image_height, scale);
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn display_scale(&self) -> f32 {
        self.display_scale
    }

    /// Pixel size of the canvas buffers.
    pub fn canvas_size(&self) -> (u32, u32) {
        self.canvas_size
    }

    pub fn image_size(&self) -> Option<(u32, u32)> {
        self.image_size
    }

    fn is_degenerate(&self) -> bool {
        self.image_size.is_none()
            || self.display_scale <= 0.0
            || self.canvas_size.0 == 0
            || self.canvas_size.1 == 0
    }

    /// Pointer position to original-image coordinates.
    ///
    /// `rect` is the canvas's current on-screen box; its ratio to the buffer
    /// size absorbs CSS scaling and zoom. Yields `(0, 0)` when no image is
    /// loaded or anything has zero extent.
    pub fn to_original(&self, client_x: f32, client_y: f32, rect: &ClientRect) -> Point {
        if self.is_degenerate() || rect.width <= 0.0 || rect.height <= 0.0 {
            return Point::default();
        }
        let scale_x = self.canvas_size.0 as f32 / rect.width;
        let scale_y = self.canvas_size.1 as f32 / rect.height;
        let canvas_x = (client_x - rect.left) * scale_x;
        let canvas_y = (client_y - rect.top) * scale_y;
        Point::new(canvas_x / self.display_scale, canvas_y / self.display_scale)
    }

    /// Original-image coordinates to canvas pixels (pre-zoom).
    pub fn to_display(&self, x: f32, y: f32) -> Point {
        if self.is_degenerate() {
            return Point::default();
        }
        Point::new(x * self.display_scale, y * self.display_scale)
    }

    pub fn point_to_display(&self, p: &Point) -> Point {
        self.to_display(p.x, p.y)
    }
}

fn scaled_size(width: u32, height: u32, scale: f32) -> (u32, u32) {
    (
        (width as f32 * scale).round() as u32,
        (height as f32 * scale).round() as u32,
    )
}

/// Visual zoom/pan applied identically to every canvas layer:
/// `translate(pan_x, pan_y) scale(scale)` with a top-left origin.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ZoomPan {
    pub scale: f32,
    pub pan_x: f32,
    pub pan_y: f32,
}

impl Default for ZoomPan {
    fn default() -> Self {
        Self {
            scale: 1.0,
            pan_x: 0.0,
            pan_y: 0.0,
        }
    }
}

impl ZoomPan {
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Zoom by `factor` keeping the content under `(anchor_x, anchor_y)`
    /// fixed. The anchor is relative to the canvas's unzoomed top-left.
    pub fn zoom_at(
        &mut self,
        factor: f32,
        anchor_x: f32,
        anchor_y: f32,
        canvas_size: (u32, u32),
        min_scale: f32,
        max_scale: f32,
    ) {
        if !(factor > 0.0) {
            return;
        }
        let new_scale = (self.scale * factor).clamp(min_scale, max_scale);
        let content_x = (anchor_x - self.pan_x) / self.scale;
        let content_y = (anchor_y - self.pan_y) / self.scale;
        self.scale = new_scale;
        self.pan_x = anchor_x - content_x * new_scale;
        self.pan_y = anchor_y - content_y * new_scale;
        self.clamp(canvas_size);
    }

    pub fn pan_by(&mut self, dx: f32, dy: f32, canvas_size: (u32, u32)) {
        self.pan_x += dx;
        self.pan_y += dy;
        self.clamp(canvas_size);
    }

    /// Keep the scaled content covering the viewport:
    /// `pan ∈ [min(0, canvas - scaled), 0]` per axis.
    pub fn clamp(&mut self, canvas_size: (u32, u32)) {
        let (cw, ch) = (canvas_size.0 as f32, canvas_size.1 as f32);
        let min_x = (cw - cw * self.scale).min(0.0);
        let min_y = (ch - ch * self.scale).min(0.0);
        self.pan_x = self.pan_x.clamp(min_x, 0.0);
        self.pan_y = self.pan_y.clamp(min_y, 0.0);
    }

    /// Where an unzoomed canvas box ends up on screen.
    pub fn apply_to_rect(&self, base: &ClientRect) -> ClientRect {
        ClientRect {
            left: base.left + self.pan_x,
            top: base.top + self.pan_y,
            width: base.width * self.scale,
            height: base.height * self.scale,
        }
    }
}
