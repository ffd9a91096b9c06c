//! Directed connections between two shapes.

use super::ShapeId;
use crate::geometry::{Anchor, to_absolute_anchor};
use kurbo::{Point, Rect};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Unique identifier for connections.
pub type ConnectionId = String;

/// A directed link from one shape's anchor to another's.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Connection {
    pub id: ConnectionId,
    pub from_shape_id: ShapeId,
    pub from_anchor: Anchor,
    pub to_shape_id: ShapeId,
    pub to_anchor: Anchor,
    /// Stroke and label fields the engine does not interpret.
    #[serde(flatten)]
    pub props: Map<String, Value>,
}

impl Connection {
    /// Create a connection with a fresh id. Anchors are clamped into `[0, 1]`.
    pub fn new(
        from_shape_id: impl Into<ShapeId>,
        from_anchor: Anchor,
        to_shape_id: impl Into<ShapeId>,
        to_anchor: Anchor,
    ) -> Self {
        Self {
            id: super::new_id(),
            from_shape_id: from_shape_id.into(),
            from_anchor: Anchor::new(from_anchor.x, from_anchor.y),
            to_shape_id: to_shape_id.into(),
            to_anchor: Anchor::new(to_anchor.x, to_anchor.y),
            props: Map::new(),
        }
    }

    /// Whether either end references the given shape.
    pub fn references(&self, shape_id: &str) -> bool {
        self.from_shape_id == shape_id || self.to_shape_id == shape_id
    }

    /// Absolute endpoints given the world boxes of both shapes.
    pub fn endpoints(&self, from_rect: Rect, to_rect: Rect) -> (Point, Point) {
        (
            to_absolute_anchor(self.from_anchor, from_rect),
            to_absolute_anchor(self.to_anchor, to_rect),
        )
    }

    /// Re-clamp anchors after ingesting a record from the store.
    pub fn normalize(&mut self) {
        self.from_anchor = Anchor::new(self.from_anchor.x, self.from_anchor.y);
        self.to_anchor = Anchor::new(self.to_anchor.x, self.to_anchor.y);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_clamps_anchors() {
        let conn = Connection::new("a", Anchor { x: 1.2, y: 0.5 }, "b", Anchor { x: -1.0, y: 0.5 });
        assert_eq!(conn.from_anchor.x, 1.0);
        assert_eq!(conn.to_anchor.x, 0.0);
    }

    #[test]
    fn test_endpoints() {
        let conn = Connection::new("a", Anchor::new(1.0, 0.5), "b", Anchor::new(0.0, 0.5));
        let (start, end) = conn.endpoints(
            Rect::new(0.0, 0.0, 100.0, 100.0),
            Rect::new(300.0, 0.0, 400.0, 100.0),
        );
        assert_eq!(start, Point::new(100.0, 50.0));
        assert_eq!(end, Point::new(300.0, 50.0));
    }

    #[test]
    fn test_record_field_names() {
        let conn = Connection::new("a", Anchor::new(0.0, 0.0), "b", Anchor::new(1.0, 1.0));
        let value = serde_json::to_value(&conn).unwrap();
        assert_eq!(value["fromShapeId"], "a");
        assert_eq!(value["toAnchor"]["x"], 1.0);
        assert!(conn.references("b"));
        assert!(!conn.references("c"));
    }
}
