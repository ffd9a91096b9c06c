//! Resize and connector handles around a selected shape.

use crate::geometry::edge_midpoints;
use kurbo::{Point, Rect, Vec2};
use serde::{Deserialize, Serialize};

/// Distance of connector handles outside the shape edge, in screen pixels.
pub const CONNECTOR_HANDLE_OFFSET: f64 = 16.0;

/// Compass position of a resize handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResizeHandle {
    N,
    S,
    E,
    W,
    NE,
    NW,
    SE,
    SW,
}

impl ResizeHandle {
    /// Every handle, corners first so they win overlapping hit tests on
    /// small shapes.
    pub const ALL: [ResizeHandle; 8] = [
        ResizeHandle::NW,
        ResizeHandle::NE,
        ResizeHandle::SE,
        ResizeHandle::SW,
        ResizeHandle::N,
        ResizeHandle::E,
        ResizeHandle::S,
        ResizeHandle::W,
    ];

    /// Whether this handle moves the east edge.
    pub fn moves_east(self) -> bool {
        matches!(self, ResizeHandle::E | ResizeHandle::NE | ResizeHandle::SE)
    }

    pub fn moves_west(self) -> bool {
        matches!(self, ResizeHandle::W | ResizeHandle::NW | ResizeHandle::SW)
    }

    pub fn moves_north(self) -> bool {
        matches!(self, ResizeHandle::N | ResizeHandle::NE | ResizeHandle::NW)
    }

    pub fn moves_south(self) -> bool {
        matches!(self, ResizeHandle::S | ResizeHandle::SE | ResizeHandle::SW)
    }

    /// Handle position on a rectangle.
    pub fn position(self, rect: Rect) -> Point {
        let c = rect.center();
        let x = if self.moves_west() {
            rect.x0
        } else if self.moves_east() {
            rect.x1
        } else {
            c.x
        };
        let y = if self.moves_north() {
            rect.y0
        } else if self.moves_south() {
            rect.y1
        } else {
            c.y
        };
        Point::new(x, y)
    }

    /// CSS cursor name for the UI shell.
    pub fn cursor(self) -> &'static str {
        match self {
            ResizeHandle::N | ResizeHandle::S => "ns-resize",
            ResizeHandle::E | ResizeHandle::W => "ew-resize",
            ResizeHandle::NE | ResizeHandle::SW => "nesw-resize",
            ResizeHandle::NW | ResizeHandle::SE => "nwse-resize",
        }
    }
}

/// Resize `original` by the total pointer delta since the gesture began.
///
/// Width and height are clamped to `min_size`. The clamp keeps the edge
/// opposite the handle fixed, so a west resize past the minimum pins the
/// east edge rather than pushing the shape right.
pub fn apply_resize(original: Rect, handle: ResizeHandle, delta: Vec2, min_size: f64) -> Rect {
    let mut x = original.x0;
    let mut y = original.y0;
    let mut width = original.width();
    let mut height = original.height();

    if handle.moves_east() {
        width = (width + delta.x).max(min_size);
    }
    if handle.moves_west() {
        width = (width - delta.x).max(min_size);
        x = original.x1 - width;
    }
    if handle.moves_south() {
        height = (height + delta.y).max(min_size);
    }
    if handle.moves_north() {
        height = (height - delta.y).max(min_size);
        y = original.y1 - height;
    }

    Rect::new(x, y, x + width, y + height)
}

/// Find the resize handle under `point`.
pub fn hit_test_resize_handles(
    rect: Rect,
    handles: &[ResizeHandle],
    point: Point,
    tolerance: f64,
) -> Option<ResizeHandle> {
    let tol_sq = tolerance * tolerance;
    handles
        .iter()
        .copied()
        .find(|h| (h.position(rect) - point).hypot2() <= tol_sq)
}

/// Side of a shape a connector handle sits on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectorSide {
    Top,
    Right,
    Bottom,
    Left,
}

impl ConnectorSide {
    pub const ALL: [ConnectorSide; 4] = [
        ConnectorSide::Top,
        ConnectorSide::Right,
        ConnectorSide::Bottom,
        ConnectorSide::Left,
    ];

    /// Exact edge midpoint where a connection drawn from this side starts.
    pub fn anchor_point(self, rect: Rect) -> Point {
        edge_midpoints(rect)[self as usize]
    }

    fn outward(self) -> Vec2 {
        match self {
            ConnectorSide::Top => Vec2::new(0.0, -1.0),
            ConnectorSide::Right => Vec2::new(1.0, 0.0),
            ConnectorSide::Bottom => Vec2::new(0.0, 1.0),
            ConnectorSide::Left => Vec2::new(-1.0, 0.0),
        }
    }

    /// Where the handle is drawn: the midpoint pushed outward by `offset`.
    pub fn handle_position(self, rect: Rect, offset: f64) -> Point {
        self.anchor_point(rect) + self.outward() * offset
    }
}

/// Find the connector handle under `point`. `offset` and `tolerance` are in
/// world units.
pub fn hit_test_connectors(
    rect: Rect,
    point: Point,
    offset: f64,
    tolerance: f64,
) -> Option<ConnectorSide> {
    let tol_sq = tolerance * tolerance;
    ConnectorSide::ALL
        .into_iter()
        .find(|side| (side.handle_position(rect, offset) - point).hypot2() <= tol_sq)
}
