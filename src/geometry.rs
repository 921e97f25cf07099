//! Prompt geometry in original-image coordinates.

use serde::{Deserialize, Serialize};

use crate::color::Color;

/// A 2D point. Unless stated otherwise, in original-image pixels.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn distance_to(&self, other: &Point) -> f32 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        (dx * dx + dy * dy).sqrt()
    }
}

/// Axis-aligned box `(x1, y1, x2, y2)` with `x1 <= x2` and `y1 <= y2`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BBox {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
}

impl BBox {
    /// Box spanning two arbitrary corners, normalized.
    pub fn from_corners(a: Point, b: Point) -> Self {
        Self {
            x1: a.x.min(b.x),
            y1: a.y.min(b.y),
            x2: a.x.max(b.x),
            y2: a.y.max(b.y),
        }
    }

    pub fn width(&self) -> f32 {
        self.x2 - self.x1
    }

    pub fn height(&self) -> f32 {
        self.y2 - self.y1
    }

    pub fn contains(&self, p: &Point) -> bool {
        p.x >= self.x1 && p.x <= self.x2 && p.y >= self.y1 && p.y <= self.y2
    }

    pub fn to_array(&self) -> [f32; 4] {
        [self.x1, self.y1, self.x2, self.y2]
    }
}

/// A closed lasso region.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Polygon {
    pub id: u64,
    pub points: Vec<Point>,
    pub color: Color,
}

impl Polygon {
    /// Fewer than three vertices do not enclose anything.
    pub const MIN_POINTS: usize = 3;

    pub fn is_closed_region(&self) -> bool {
        self.points.len() >= Self::MIN_POINTS
    }

    /// Even-odd point-in-polygon test (ray casting).
    pub fn contains(&self, p: &Point) -> bool {
        point_in_polygon(&self.points, p)
    }
}

/// Ray casting with the even-odd rule; polygons are implicitly closed.
pub fn point_in_polygon(vertices: &[Point], p: &Point) -> bool {
    if vertices.len() < Polygon::MIN_POINTS {
        return false;
    }
    let mut inside = false;
    let mut j = vertices.len() - 1;
    for i in 0..vertices.len() {
        let (vi, vj) = (vertices[i], vertices[j]);
        if (vi.y > p.y) != (vj.y > p.y) {
            let x_cross = vi.x + (p.y - vi.y) * (vj.x - vi.x) / (vj.y - vi.y);
            if p.x < x_cross {
                inside = !inside;
            }
        }
        j = i;
    }
    inside
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square() -> Vec<Point> {
        vec![
            Point::new(0.0, 0.0),
            Point::new(10.0, 0.0),
            Point::new(10.0, 10.0),
            Point::new(0.0, 10.0),
        ]
    }

    #[test]
    fn test_bbox_from_corners_normalizes() {
        let b = BBox::from_corners(Point::new(60.0, 40.0), Point::new(10.0, 10.0));
        assert_eq!(b.to_array(), [10.0, 10.0, 60.0, 40.0]);
        assert_eq!(b.width(), 50.0);
        assert_eq!(b.height(), 30.0);
    }

    #[test]
    fn test_bbox_contains_edges() {
        let b = BBox::from_corners(Point::new(0.0, 0.0), Point::new(5.0, 5.0));
        assert!(b.contains(&Point::new(5.0, 0.0)));
        assert!(!b.contains(&Point::new(5.1, 2.0)));
    }

    #[test]
    fn test_point_in_square() {
        let sq = square();
        assert!(point_in_polygon(&sq, &Point::new(5.0, 5.0)));
        assert!(!point_in_polygon(&sq, &Point::new(15.0, 5.0)));
        assert!(!point_in_polygon(&sq, &Point::new(-1.0, -1.0)));
    }

    #[test]
    fn test_even_odd_self_intersecting() {
        // Pentagram: the center is covered twice, so even-odd excludes it.
        let star: Vec<Point> = (0..5)
            .map(|i| {
                let a = std::f32::consts::PI * 2.0 * (i as f32 * 2.0) / 5.0 - std::f32::consts::FRAC_PI_2;
                Point::new(50.0 + 40.0 * a.cos(), 50.0 + 40.0 * a.sin())
            })
            .collect();
        assert!(!point_in_polygon(&star, &Point::new(50.0, 50.0)));
    }

    #[test]
    fn test_degenerate_polygon() {
        let line = vec![Point::new(0.0, 0.0), Point::new(10.0, 10.0)];
        assert!(!point_in_polygon(&line, &Point::new(5.0, 5.0)));
        let poly = Polygon {
            id: 1,
            points: line,
            color: Color::default(),
        };
        assert!(!poly.is_closed_region());
    }

    #[test]
    fn test_distance() {
        assert_eq!(Point::new(0.0, 0.0).distance_to(&Point::new(3.0, 4.0)), 5.0);
    }
}
