//! Software framebuffer used by the compositor.
//!
//! A [`Surface`] owns one straight-alpha RGBA buffer. Its only mutation surface
//! is `resize`, `clear`, the scaled blit/composite calls, and the primitive
//! rasterizers below.

use image::imageops::{self, FilterType};
use image::{Rgba, RgbaImage};

use crate::color::Color;
use crate::geometry::Point;

/// Which regions of a self-intersecting polygon count as inside.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FillRule {
    #[default]
    EvenOdd,
    /// Canvas `fill()` semantics: any nonzero winding number is inside.
    NonZero,
}

#[derive(Debug, Clone)]
pub struct Surface {
    image: RgbaImage,
}

impl Default for Surface {
    fn default() -> Self {
        Self::new(0, 0)
    }
}

impl Surface {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            image: RgbaImage::new(width, height),
        }
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.image.dimensions()
    }

    pub fn is_empty(&self) -> bool {
        self.width() == 0 || self.height() == 0
    }

    /// Resize to `width x height`. Returns false (and keeps contents) when the
    /// size is unchanged; a real resize leaves a cleared buffer.
    pub fn resize(&mut self, width: u32, height: u32) -> bool {
        if self.dimensions() == (width, height) {
            return false;
        }
        self.image = RgbaImage::new(width, height);
        true
    }

    pub fn clear(&mut self) {
        for p in self.image.pixels_mut() {
            *p = Rgba([0, 0, 0, 0]);
        }
    }

    pub fn image(&self) -> &RgbaImage {
        &self.image
    }

    pub fn as_raw(&self) -> &[u8] {
        self.image.as_raw()
    }

    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        (x < self.width() && y < self.height()).then(|| self.image.get_pixel(x, y).0)
    }

    /// Overwrite one pixel; out-of-bounds coordinates are ignored.
    pub fn put_pixel(&mut self, x: i64, y: i64, color: Color) {
        if x < 0 || y < 0 || x >= self.width() as i64 || y >= self.height() as i64 {
            return;
        }
        self.image.put_pixel(x as u32, y as u32, Rgba(color.to_array()));
    }

    /// Source-over one pixel; out-of-bounds coordinates are ignored.
    pub fn blend_pixel(&mut self, x: i64, y: i64, color: Color) {
        if x < 0 || y < 0 || x >= self.width() as i64 || y >= self.height() as i64 {
            return;
        }
        let dst = self.image.get_pixel_mut(x as u32, y as u32);
        dst.0 = blend(dst.0, color.to_array(), 1.0);
    }

    /// Source-over `src` onto this surface with a global `opacity`.
    ///
    /// `src` is stretched to this surface's size in a single resample when
    /// the dimensions differ.
    pub fn draw_scaled(&mut self, src: &RgbaImage, opacity: f32) {
        if self.is_empty() || src.width() == 0 || src.height() == 0 || opacity <= 0.0 {
            return;
        }
        if src.dimensions() == self.dimensions() {
            composite_into(&mut self.image, src, opacity);
        } else {
            let scaled = resize_premultiplied(src, self.width(), self.height());
            composite_into(&mut self.image, &scaled, opacity);
        }
    }

    /// Source-over a surface of the same size with a global `opacity`.
    pub fn composite(&mut self, src: &Surface, opacity: f32) {
        self.draw_scaled(&src.image, opacity);
    }

    /// Fill a polygon with the even-odd rule, sampling at pixel centers.
    pub fn fill_polygon(&mut self, vertices: &[Point], color: Color) {
        self.fill_polygon_with(vertices, color, FillRule::EvenOdd);
    }

    pub fn fill_polygon_with(&mut self, vertices: &[Point], color: Color, rule: FillRule) {
        if vertices.len() < 3 || self.is_empty() {
            return;
        }
        let (min_y, max_y) = vertices
            .iter()
            .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), p| (lo.min(p.y), hi.max(p.y)));
        let y_start = (min_y - 0.5).ceil().max(0.0) as i64;
        let y_end = ((max_y - 0.5).floor() as i64).min(self.height() as i64 - 1);

        // (x, +1 for a downward edge, -1 for an upward one)
        let mut crossings: Vec<(f32, i32)> = Vec::with_capacity(vertices.len());
        for y in y_start..=y_end {
            let sy = y as f32 + 0.5;
            crossings.clear();
            let mut j = vertices.len() - 1;
            for i in 0..vertices.len() {
                let (a, b) = (vertices[j], vertices[i]);
                if (a.y <= sy) != (b.y <= sy) {
                    let x = a.x + (sy - a.y) * (b.x - a.x) / (b.y - a.y);
                    crossings.push((x, if b.y > a.y { 1 } else { -1 }));
                }
                j = i;
            }
            crossings.sort_by(|a, b| a.0.total_cmp(&b.0));
            let mut winding = 0;
            for pair in crossings.windows(2) {
                winding += pair[0].1;
                let inside = match rule {
                    FillRule::EvenOdd => winding % 2 != 0,
                    FillRule::NonZero => winding != 0,
                };
                if !inside {
                    continue;
                }
                let x_start = (pair[0].0 - 0.5).ceil().max(0.0) as i64;
                let x_end = ((pair[1].0 - 0.5).ceil() as i64 - 1).min(self.width() as i64 - 1);
                for x in x_start..=x_end {
                    self.blend_pixel(x, y, color);
                }
            }
        }
    }

    /// Solid disc of radius `radius` around `center`.
    pub fn fill_circle(&mut self, center: Point, radius: f32, color: Color) {
        let r2 = radius * radius;
        let (x0, x1) = ((center.x - radius).floor() as i64, (center.x + radius).ceil() as i64);
        let (y0, y1) = ((center.y - radius).floor() as i64, (center.y + radius).ceil() as i64);
        for y in y0..=y1 {
            for x in x0..=x1 {
                let dx = x as f32 + 0.5 - center.x;
                let dy = y as f32 + 0.5 - center.y;
                if dx * dx + dy * dy <= r2 {
                    self.blend_pixel(x, y, color);
                }
            }
        }
    }

    /// Thick line by stamping squares along the segment. Pixels are
    /// overwritten, so overlapping stamps never accumulate alpha.
    pub fn stroke_line(&mut self, a: Point, b: Point, thickness: f32, color: Color) {
        let dx = b.x - a.x;
        let dy = b.y - a.y;
        let len = (dx * dx + dy * dy).sqrt();
        let steps = (len * 2.0).ceil() as i64;
        let half = ((thickness - 1.0) / 2.0).max(0.0);
        let (lo, hi) = (-half.floor() as i64, half.ceil() as i64);
        for i in 0..=steps {
            let t = i as f32 / steps.max(1) as f32;
            let cx = (a.x + dx * t).floor() as i64;
            let cy = (a.y + dy * t).floor() as i64;
            for oy in lo..=hi {
                for ox in lo..=hi {
                    self.put_pixel(cx + ox, cy + oy, color);
                }
            }
        }
    }

    pub fn stroke_polyline(&mut self, points: &[Point], closed: bool, thickness: f32, color: Color) {
        for pair in points.windows(2) {
            self.stroke_line(pair[0], pair[1], thickness, color);
        }
        if closed && points.len() > 2 {
            self.stroke_line(points[points.len() - 1], points[0], thickness, color);
        }
    }

    pub fn stroke_rect(&mut self, min: Point, max: Point, thickness: f32, color: Color) {
        let corners = [min, Point::new(max.x, min.y), max, Point::new(min.x, max.y)];
        self.stroke_polyline(&corners, true, thickness, color);
    }
}

/// Straight-alpha source-over of `src` onto `dst` with a global opacity.
pub fn blend(dst: [u8; 4], src: [u8; 4], opacity: f32) -> [u8; 4] {
    let sa = src[3] as f32 / 255.0 * opacity.clamp(0.0, 1.0);
    if sa <= 0.0 {
        return dst;
    }
    let da = dst[3] as f32 / 255.0;
    let oa = sa + da * (1.0 - sa);
    if oa <= 0.0 {
        return [0, 0, 0, 0];
    }
    let mut out = [0u8; 4];
    for c in 0..3 {
        let v = (src[c] as f32 * sa + dst[c] as f32 * da * (1.0 - sa)) / oa;
        out[c] = v.round().clamp(0.0, 255.0) as u8;
    }
    out[3] = (oa * 255.0).round().clamp(0.0, 255.0) as u8;
    out
}

fn composite_into(dst: &mut RgbaImage, src: &RgbaImage, opacity: f32) {
    for (d, s) in dst.pixels_mut().zip(src.pixels()) {
        d.0 = blend(d.0, s.0, opacity);
    }
}

/// Resample in premultiplied space so transparent pixels do not darken edges.
fn resize_premultiplied(src: &RgbaImage, width: u32, height: u32) -> RgbaImage {
    let mut pre = src.clone();
    for p in pre.pixels_mut() {
        let a = p.0[3] as u16;
        for c in 0..3 {
            p.0[c] = ((p.0[c] as u16 * a + 127) / 255) as u8;
        }
    }
    let mut out = imageops::resize(&pre, width, height, FilterType::Triangle);
    for p in out.pixels_mut() {
        let a = p.0[3] as u16;
        if a == 0 {
            p.0 = [0, 0, 0, 0];
            continue;
        }
        for c in 0..3 {
            p.0[c] = ((p.0[c] as u16 * 255 + a / 2) / a).min(255) as u8;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn count_opaque(s: &Surface) -> usize {
        s.image().pixels().filter(|p| p.0[3] > 0).count()
    }

    #[test]
    fn test_resize_only_when_changed() {
        let mut s = Surface::new(4, 4);
        s.put_pixel(1, 1, Color::WHITE);
        assert!(!s.resize(4, 4));
        assert_eq!(s.pixel(1, 1), Some([255, 255, 255, 255]));
        assert!(s.resize(8, 2));
        assert_eq!(s.dimensions(), (8, 2));
        assert_eq!(count_opaque(&s), 0);
    }

    #[test]
    fn test_blend_over_transparent_keeps_color() {
        let out = blend([0, 0, 0, 0], [200, 100, 50, 255], 0.5);
        assert_eq!(out, [200, 100, 50, 128]);
    }

    #[test]
    fn test_blend_zero_opacity_is_noop() {
        assert_eq!(blend([1, 2, 3, 4], [255, 255, 255, 255], 0.0), [1, 2, 3, 4]);
    }

    #[test]
    fn test_fill_polygon_square() {
        let mut s = Surface::new(10, 10);
        let square = [
            Point::new(2.0, 2.0),
            Point::new(6.0, 2.0),
            Point::new(6.0, 6.0),
            Point::new(2.0, 6.0),
        ];
        s.fill_polygon(&square, Color::WHITE);
        assert_eq!(count_opaque(&s), 16);
        assert_eq!(s.pixel(2, 2).unwrap()[3], 255);
        assert_eq!(s.pixel(6, 6).unwrap()[3], 0);
    }

    #[test]
    fn test_fill_rule_on_doubled_loop() {
        let square = [
            Point::new(2.0, 2.0),
            Point::new(6.0, 2.0),
            Point::new(6.0, 6.0),
            Point::new(2.0, 6.0),
        ];
        let twice: Vec<Point> = square.iter().chain(square.iter()).copied().collect();

        let mut even_odd = Surface::new(10, 10);
        even_odd.fill_polygon(&twice, Color::WHITE);
        assert_eq!(count_opaque(&even_odd), 0);

        let mut nonzero = Surface::new(10, 10);
        nonzero.fill_polygon_with(&twice, Color::WHITE, FillRule::NonZero);
        assert_eq!(count_opaque(&nonzero), 16);
    }

    #[test]
    fn test_fill_polygon_clipped() {
        let mut s = Surface::new(4, 4);
        let big = [
            Point::new(-10.0, -10.0),
            Point::new(20.0, -10.0),
            Point::new(20.0, 20.0),
            Point::new(-10.0, 20.0),
        ];
        s.fill_polygon(&big, Color::WHITE);
        assert_eq!(count_opaque(&s), 16);
    }

    #[test]
    fn test_fill_circle() {
        let mut s = Surface::new(11, 11);
        s.fill_circle(Point::new(5.5, 5.5), 2.0, Color::WHITE);
        assert_eq!(s.pixel(5, 5).unwrap()[3], 255);
        assert_eq!(s.pixel(0, 0).unwrap()[3], 0);
        assert!(count_opaque(&s) >= 9);
    }

    #[test]
    fn test_stroke_rect_leaves_interior() {
        let mut s = Surface::new(10, 10);
        s.stroke_rect(Point::new(1.0, 1.0), Point::new(8.0, 8.0), 1.0, Color::WHITE);
        assert_eq!(s.pixel(1, 1).unwrap()[3], 255);
        assert_eq!(s.pixel(8, 4).unwrap()[3], 255);
        assert_eq!(s.pixel(4, 4).unwrap()[3], 0);
    }

    #[test]
    fn test_draw_scaled_downsamples() {
        let mut src = RgbaImage::new(8, 8);
        for p in src.pixels_mut() {
            *p = Rgba([255, 0, 0, 255]);
        }
        let mut s = Surface::new(4, 4);
        s.draw_scaled(&src, 1.0);
        let p = s.pixel(2, 2).unwrap();
        assert!(p[0] >= 250 && p[1] == 0 && p[3] >= 250);
    }

    #[test]
    fn test_downsample_keeps_color_at_edges() {
        let mut src = RgbaImage::new(4, 4);
        for y in 0..4 {
            for x in 0..2 {
                src.put_pixel(x, y, Rgba([0, 0, 255, 255]));
            }
        }
        let mut s = Surface::new(2, 2);
        s.draw_scaled(&src, 1.0);
        for y in 0..2 {
            for x in 0..2 {
                let p = s.pixel(x, y).unwrap();
                if p[3] > 0 {
                    assert_eq!(&p[..3], &[0, 0, 255]);
                }
            }
        }
    }
}
