//! Pure geometric helpers shared by dragging, snapping and connectors.

use kurbo::{Point, Rect};
use serde::{Deserialize, Serialize};

/// Bounding box with precomputed centers.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    pub left: f64,
    pub top: f64,
    pub right: f64,
    pub bottom: f64,
    pub cx: f64,
    pub cy: f64,
}

impl Bounds {
    /// Build bounds from a rectangle.
    pub fn from_rect(rect: Rect) -> Self {
        let rect = rect.abs();
        Self {
            left: rect.x0,
            top: rect.y0,
            right: rect.x1,
            bottom: rect.y1,
            cx: (rect.x0 + rect.x1) / 2.0,
            cy: (rect.y0 + rect.y1) / 2.0,
        }
    }

    pub fn width(&self) -> f64 {
        self.right - self.left
    }

    pub fn height(&self) -> f64 {
        self.bottom - self.top
    }

    /// Convert back to a kurbo rectangle.
    pub fn to_rect(&self) -> Rect {
        Rect::new(self.left, self.top, self.right, self.bottom)
    }

    /// Shift the bounds by a delta.
    pub fn translate(&self, dx: f64, dy: f64) -> Self {
        Self::from_rect(Rect::new(
            self.left + dx,
            self.top + dy,
            self.right + dx,
            self.bottom + dy,
        ))
    }
}

/// Union of all rectangles, or `None` for an empty set.
pub fn bounds_of<I>(rects: I) -> Option<Bounds>
where
    I: IntoIterator<Item = Rect>,
{
    rects
        .into_iter()
        .map(|r| r.abs())
        .reduce(|acc, r| acc.union(r))
        .map(Bounds::from_rect)
}

/// True if `inner` lies entirely inside `outer` (edges may touch).
pub fn contains_rect(outer: Rect, inner: Rect) -> bool {
    let outer = outer.abs();
    let inner = inner.abs();
    inner.x0 >= outer.x0 && inner.y0 >= outer.y0 && inner.x1 <= outer.x1 && inner.y1 <= outer.y1
}

/// Connection endpoint as a fraction of a shape's box.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Anchor {
    pub x: f64,
    pub y: f64,
}

impl Anchor {
    /// Create an anchor, clamping both fractions into `[0, 1]`.
    pub fn new(x: f64, y: f64) -> Self {
        Self {
            x: clamp_unit(x),
            y: clamp_unit(y),
        }
    }

    pub fn is_valid(&self) -> bool {
        (0.0..=1.0).contains(&self.x) && (0.0..=1.0).contains(&self.y)
    }
}

fn clamp_unit(v: f64) -> f64 {
    if v.is_nan() { 0.0 } else { v.clamp(0.0, 1.0) }
}

fn non_zero(v: f64) -> f64 {
    if v == 0.0 { 1.0 } else { v }
}

/// Express an absolute point relative to a shape's box.
///
/// Zero dimensions are treated as 1 to avoid dividing by zero. The result is
/// not clamped; use [`Anchor::new`] when the point may lie outside the box.
pub fn to_relative_anchor(point: Point, rect: Rect) -> Anchor {
    let rect = rect.abs();
    Anchor {
        x: (point.x - rect.x0) / non_zero(rect.width()),
        y: (point.y - rect.y0) / non_zero(rect.height()),
    }
}

/// Resolve an anchor against a shape's box: `xy + anchor * size`.
pub fn to_absolute_anchor(anchor: Anchor, rect: Rect) -> Point {
    let rect = rect.abs();
    Point::new(
        rect.x0 + anchor.x * rect.width(),
        rect.y0 + anchor.y * rect.height(),
    )
}

/// Closest point to `point` on the segment `a`-`b`.
pub fn nearest_point_on_segment(point: Point, a: Point, b: Point) -> Point {
    let seg = b - a;
    let len_sq = seg.hypot2();
    if len_sq < f64::EPSILON {
        return a;
    }
    let t = ((point - a).dot(seg) / len_sq).clamp(0.0, 1.0);
    a + seg * t
}

/// Midpoints of the four edges, in top/right/bottom/left order.
pub fn edge_midpoints(rect: Rect) -> [Point; 4] {
    let rect = rect.abs();
    let center = rect.center();
    [
        Point::new(center.x, rect.y0),
        Point::new(rect.x1, center.y),
        Point::new(center.x, rect.y1),
        Point::new(rect.x0, center.y),
    ]
}

/// The four edges as segments, in top/right/bottom/left order.
pub fn edges(rect: Rect) -> [(Point, Point); 4] {
    let rect = rect.abs();
    let tl = Point::new(rect.x0, rect.y0);
    let tr = Point::new(rect.x1, rect.y0);
    let br = Point::new(rect.x1, rect.y1);
    let bl = Point::new(rect.x0, rect.y1);
    [(tl, tr), (tr, br), (br, bl), (bl, tl)]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bounds_of_union() {
        let bounds = bounds_of([
            Rect::new(0.0, 0.0, 100.0, 50.0),
            Rect::new(200.0, 200.0, 250.0, 300.0),
        ])
        .unwrap();
        assert_eq!(bounds.left, 0.0);
        assert_eq!(bounds.top, 0.0);
        assert_eq!(bounds.right, 250.0);
        assert_eq!(bounds.bottom, 300.0);
        assert_eq!(bounds.cx, 125.0);
        assert_eq!(bounds.cy, 150.0);
    }

    #[test]
    fn test_bounds_of_empty() {
        assert!(bounds_of(std::iter::empty()).is_none());
    }

    #[test]
    fn test_contains_rect_excludes_partial_overlap() {
        let outer = Rect::new(0.0, 0.0, 100.0, 100.0);
        assert!(contains_rect(outer, Rect::new(10.0, 10.0, 90.0, 90.0)));
        assert!(contains_rect(outer, outer));
        assert!(!contains_rect(outer, Rect::new(50.0, 50.0, 150.0, 90.0)));
    }

    #[test]
    fn test_anchor_roundtrip() {
        let rect = Rect::new(37.5, -12.0, 37.5 + 143.0, -12.0 + 61.0);
        let original = Point::new(120.25, 30.75);
        let anchor = to_relative_anchor(original, rect);
        let back = to_absolute_anchor(anchor, rect);
        assert!((back.x - original.x).abs() < 1e-9);
        assert!((back.y - original.y).abs() < 1e-9);
    }

    #[test]
    fn test_anchor_zero_size_guard() {
        let rect = Rect::new(10.0, 10.0, 10.0, 10.0);
        let anchor = to_relative_anchor(Point::new(10.5, 10.0), rect);
        assert!(anchor.x.is_finite());
        assert_eq!(anchor.x, 0.5);
    }

    #[test]
    fn test_anchor_clamped() {
        let anchor = Anchor::new(1.5, -0.2);
        assert_eq!(anchor, Anchor { x: 1.0, y: 0.0 });
        assert!(anchor.is_valid());
    }

    #[test]
    fn test_nearest_point_on_segment() {
        let p = nearest_point_on_segment(
            Point::new(50.0, 10.0),
            Point::new(0.0, 0.0),
            Point::new(100.0, 0.0),
        );
        assert_eq!(p, Point::new(50.0, 0.0));
        let clamped = nearest_point_on_segment(
            Point::new(-20.0, 5.0),
            Point::new(0.0, 0.0),
            Point::new(100.0, 0.0),
        );
        assert_eq!(clamped, Point::new(0.0, 0.0));
    }

    #[test]
    fn test_edge_midpoints() {
        let mids = edge_midpoints(Rect::new(0.0, 0.0, 100.0, 50.0));
        assert_eq!(mids[0], Point::new(50.0, 0.0));
        assert_eq!(mids[1], Point::new(100.0, 25.0));
        assert_eq!(mids[2], Point::new(50.0, 50.0));
        assert_eq!(mids[3], Point::new(0.0, 25.0));
    }
}
