use super::ShapeId;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A comment pin on the canvas, optionally attached to a shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    pub id: String,
    pub x: f64,
    pub y: f64,
    #[serde(default)]
    pub body: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shape_id: Option<ShapeId>,
    #[serde(flatten)]
    pub props: Map<String, Value>,
}

impl Comment {
    pub fn new(x: f64, y: f64, body: impl Into<String>) -> Self {
        Self {
            id: super::new_id(),
            x,
            y,
            body: body.into(),
            author: None,
            shape_id: None,
            props: Map::new(),
        }
    }

    /// Builder: pin to a shape.
    pub fn on_shape(mut self, shape_id: impl Into<ShapeId>) -> Self {
        self.shape_id = Some(shape_id.into());
        self
    }
}
