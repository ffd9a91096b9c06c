//! Shape, connection, group and comment records.

mod comment;
mod connection;
mod group;
mod screen;

pub use comment::Comment;
pub use connection::{Connection, ConnectionId};
pub use group::{Group, GroupId};
pub use screen::GridColumns;

use crate::config::MIN_SHAPE_SIZE;
use crate::handles::ResizeHandle;
use kurbo::{BezPath, Point, Rect, RoundedRect, Shape as KurboShape};
use peniko::Color;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

/// Unique identifier for shapes within a room.
pub type ShapeId = String;

/// Generate a fresh record id.
pub fn new_id() -> String {
    Uuid::new_v4().to_string()
}

/// Serializable color representation (RGBA8).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SerializableColor {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl SerializableColor {
    pub fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    pub fn black() -> Self {
        Self::new(0, 0, 0, 255)
    }

    pub fn white() -> Self {
        Self::new(255, 255, 255, 255)
    }
}

impl From<Color> for SerializableColor {
    fn from(color: Color) -> Self {
        let rgba = color.to_rgba8();
        Self {
            r: rgba.r,
            g: rgba.g,
            b: rgba.b,
            a: rgba.a,
        }
    }
}

impl From<SerializableColor> for Color {
    fn from(color: SerializableColor) -> Self {
        Color::from_rgba8(color.r, color.g, color.b, color.a)
    }
}

/// Visual style shared by every shape kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ShapeStyle {
    pub stroke_color: SerializableColor,
    pub stroke_width: f64,
    /// Fill color (None = no fill).
    pub fill_color: Option<SerializableColor>,
    pub corner_radius: f64,
    pub opacity: f64,
}

impl Default for ShapeStyle {
    fn default() -> Self {
        Self {
            stroke_color: SerializableColor::black(),
            stroke_width: 1.0,
            fill_color: Some(SerializableColor::white()),
            corner_radius: 0.0,
            opacity: 1.0,
        }
    }
}

impl ShapeStyle {
    /// Stroke color as a peniko Color.
    pub fn stroke(&self) -> Color {
        self.stroke_color.into()
    }

    /// Fill color as a peniko Color.
    pub fn fill(&self) -> Option<Color> {
        self.fill_color.map(Into::into)
    }
}

/// Closed set of shape variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShapeKind {
    Rectangle,
    Ellipse,
    Text,
    Image,
    Table,
    Card,
    Screen,
}

impl ShapeKind {
    /// Outline path used by renderers.
    pub fn outline(self, rect: Rect, corner_radius: f64) -> BezPath {
        match self {
            ShapeKind::Ellipse => kurbo::Ellipse::from_rect(rect).to_path(0.1),
            ShapeKind::Card => {
                RoundedRect::from_rect(rect, corner_radius.max(8.0)).to_path(0.1)
            }
            _ if corner_radius > 0.0 => RoundedRect::from_rect(rect, corner_radius).to_path(0.1),
            _ => rect.to_path(0.1),
        }
    }

    /// Check if a world point hits a shape of this kind occupying `rect`.
    pub fn hit_test(self, rect: Rect, point: Point, tolerance: f64) -> bool {
        match self {
            ShapeKind::Ellipse => {
                let center = rect.center();
                let rx = rect.width() / 2.0 + tolerance;
                let ry = rect.height() / 2.0 + tolerance;
                if rx <= 0.0 || ry <= 0.0 {
                    return false;
                }
                let nx = (point.x - center.x) / rx;
                let ny = (point.y - center.y) / ry;
                nx * nx + ny * ny <= 1.0
            }
            _ => rect.inflate(tolerance, tolerance).contains(point),
        }
    }

    /// Resize handles offered for this kind.
    pub fn resize_handles(self) -> &'static [ResizeHandle] {
        match self {
            // Text reflows vertically, so only the horizontal edges resize.
            ShapeKind::Text => &[ResizeHandle::E, ResizeHandle::W],
            ShapeKind::Image => &[
                ResizeHandle::NW,
                ResizeHandle::NE,
                ResizeHandle::SE,
                ResizeHandle::SW,
            ],
            _ => &ResizeHandle::ALL,
        }
    }

    /// Whether this kind owns children and groups.
    pub fn is_container(self) -> bool {
        matches!(self, ShapeKind::Screen)
    }
}

/// A rectangle-bounded entity on the canvas.
///
/// Children of a screen store `x`/`y` relative to the screen origin.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Shape {
    pub id: ShapeId,
    #[serde(rename = "type")]
    pub kind: ShapeKind,
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    #[serde(default)]
    pub style: ShapeStyle,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<ShapeId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_id: Option<GroupId>,
    /// Ordered children of a screen.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub children_ids: Option<Vec<ShapeId>>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub groups: Vec<Group>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grid_columns: Option<GridColumns>,
    /// Type-specific content the engine does not interpret.
    #[serde(flatten)]
    pub props: Map<String, Value>,
}

impl Shape {
    /// Create a shape with a fresh id.
    pub fn new(kind: ShapeKind, x: f64, y: f64, width: f64, height: f64) -> Self {
        Self::with_id(new_id(), kind, x, y, width, height)
    }

    /// Create a shape with a specific id.
    pub fn with_id(
        id: impl Into<ShapeId>,
        kind: ShapeKind,
        x: f64,
        y: f64,
        width: f64,
        height: f64,
    ) -> Self {
        let mut shape = Self {
            id: id.into(),
            kind,
            x,
            y,
            width,
            height,
            style: ShapeStyle::default(),
            parent_id: None,
            group_id: None,
            children_ids: None,
            groups: Vec::new(),
            grid_columns: None,
            props: Map::new(),
        };
        shape.normalize(MIN_SHAPE_SIZE);
        shape
    }

    /// Builder: set the owning screen.
    pub fn in_screen(mut self, screen_id: impl Into<ShapeId>) -> Self {
        self.parent_id = Some(screen_id.into());
        self
    }

    /// Builder: set the group.
    pub fn in_group(mut self, group_id: impl Into<GroupId>) -> Self {
        self.group_id = Some(group_id.into());
        self
    }

    /// Box in the shape's own coordinate space.
    pub fn rect(&self) -> Rect {
        Rect::new(self.x, self.y, self.x + self.width, self.y + self.height)
    }

    /// Replace position and size, enforcing the minimum size.
    pub fn set_rect(&mut self, rect: Rect, min_size: f64) {
        let rect = rect.abs();
        self.x = rect.x0;
        self.y = rect.y0;
        self.width = rect.width();
        self.height = rect.height();
        self.normalize(min_size);
    }

    /// Enforce the size floor and finite coordinates.
    ///
    /// Growing an undersized shape keeps its top-left corner in place.
    pub fn normalize(&mut self, min_size: f64) {
        if !self.x.is_finite() {
            self.x = 0.0;
        }
        if !self.y.is_finite() {
            self.y = 0.0;
        }
        if !(self.width >= min_size) {
            self.width = min_size;
        }
        if !(self.height >= min_size) {
            self.height = min_size;
        }
    }

    pub fn is_screen(&self) -> bool {
        self.kind.is_container()
    }

    /// Outline path in the shape's own coordinate space.
    pub fn outline(&self) -> BezPath {
        self.kind.outline(self.rect(), self.style.corner_radius)
    }

    /// Hit test in the shape's own coordinate space.
    pub fn hit_test(&self, point: Point, tolerance: f64) -> bool {
        self.kind.hit_test(self.rect(), point, tolerance)
    }

    /// Find a group owned by this screen.
    pub fn group(&self, id: &str) -> Option<&Group> {
        self.groups.iter().find(|g| g.id == id)
    }
}
