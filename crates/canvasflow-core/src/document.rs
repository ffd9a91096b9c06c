//! In-memory view of a room: shapes, connections and comments.
//!
//! The document is the editor's working copy. It is rebuilt from the shared
//! store and mutated optimistically during gestures; it never persists
//! anything itself.

use crate::geometry::{Bounds, bounds_of, contains_rect};
use crate::selection::SelectionToken;
use crate::shapes::{Comment, Connection, Shape, ShapeId};
use kurbo::{Point, Rect, Vec2};
use std::collections::{HashMap, HashSet};

/// A canvas document containing all shapes and their links.
#[derive(Debug, Clone, Default)]
pub struct Document {
    shapes: HashMap<ShapeId, Shape>,
    /// Document order of shapes (back to front).
    z_order: Vec<ShapeId>,
    connections: Vec<Connection>,
    comments: Vec<Comment>,
    min_shape_size: f64,
}

impl Document {
    /// Create an empty document enforcing the given minimum shape size.
    pub fn new(min_shape_size: f64) -> Self {
        Self {
            min_shape_size,
            ..Self::default()
        }
    }

    /// Build a document from ordered collections.
    ///
    /// Shapes are normalized on ingest so the size floor holds even for
    /// records written by other clients.
    pub fn from_parts(
        min_shape_size: f64,
        shapes: Vec<Shape>,
        connections: Vec<Connection>,
        comments: Vec<Comment>,
    ) -> Self {
        let mut doc = Self::new(min_shape_size);
        for shape in shapes {
            doc.insert_shape(shape);
        }
        doc.connections = connections
            .into_iter()
            .map(|mut c| {
                c.normalize();
                c
            })
            .collect();
        doc.comments = comments;
        doc
    }

    pub fn min_shape_size(&self) -> f64 {
        self.min_shape_size
    }

    pub fn is_empty(&self) -> bool {
        self.shapes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.shapes.len()
    }

    pub fn shape(&self, id: &str) -> Option<&Shape> {
        self.shapes.get(id)
    }

    pub fn shape_mut(&mut self, id: &str) -> Option<&mut Shape> {
        self.shapes.get_mut(id)
    }

    /// All shapes in document order.
    pub fn shapes(&self) -> impl Iterator<Item = &Shape> {
        self.z_order.iter().filter_map(|id| self.shapes.get(id))
    }

    /// All connections, including dangling ones.
    pub fn connections(&self) -> &[Connection] {
        &self.connections
    }

    pub fn comments(&self) -> &[Comment] {
        &self.comments
    }

    pub fn connection(&self, id: &str) -> Option<&Connection> {
        self.connections.iter().find(|c| c.id == id)
    }

    fn insert_shape(&mut self, mut shape: Shape) {
        shape.normalize(self.min_shape_size);
        if !self.shapes.contains_key(&shape.id) {
            self.z_order.push(shape.id.clone());
        }
        self.shapes.insert(shape.id.clone(), shape);
    }

    /// Add a shape on top of the document.
    ///
    /// A child added to a screen that keeps an explicit `childrenIds` list is
    /// appended to that list.
    pub fn add_shape(&mut self, shape: Shape) {
        if let Some(parent) = shape.parent_id.clone() {
            if let Some(screen) = self.shapes.get_mut(&parent) {
                if let Some(children) = screen.children_ids.as_mut() {
                    if !children.contains(&shape.id) {
                        children.push(shape.id.clone());
                    }
                }
            }
        }
        self.insert_shape(shape);
    }

    /// Replace a shape in place, keeping its position in the z-order.
    pub fn replace_shape(&mut self, shape: Shape) {
        self.insert_shape(shape);
    }

    pub fn add_connection(&mut self, mut connection: Connection) {
        connection.normalize();
        self.connections.retain(|c| c.id != connection.id);
        self.connections.push(connection);
    }

    pub fn add_comment(&mut self, comment: Comment) {
        self.comments.retain(|c| c.id != comment.id);
        self.comments.push(comment);
    }

    pub fn delete_connection(&mut self, id: &str) -> bool {
        let before = self.connections.len();
        self.connections.retain(|c| c.id != id);
        self.connections.len() != before
    }

    pub fn delete_comment(&mut self, id: &str) -> bool {
        let before = self.comments.len();
        self.comments.retain(|c| c.id != id);
        self.comments.len() != before
    }

    /// Delete a shape and everything that depends on it.
    ///
    /// Removes connections touching any deleted shape, the shape's entry in
    /// its screen's children list, the children of a deleted screen and
    /// comments pinned to deleted shapes. Returns the deleted shape ids.
    pub fn delete_shape(&mut self, id: &str) -> Vec<ShapeId> {
        let Some(shape) = self.shapes.get(id) else {
            return Vec::new();
        };
        let mut doomed = vec![shape.id.clone()];
        if shape.is_screen() {
            doomed.extend(self.screen_children(id).into_iter().map(|c| c.id.clone()));
        }
        let doomed_set: HashSet<&str> = doomed.iter().map(String::as_str).collect();

        for removed in &doomed {
            self.shapes.remove(removed);
        }
        self.z_order.retain(|z| !doomed_set.contains(z.as_str()));
        for screen in self.shapes.values_mut() {
            if let Some(children) = screen.children_ids.as_mut() {
                children.retain(|c| !doomed_set.contains(c.as_str()));
            }
        }
        self.connections.retain(|c| {
            !doomed_set.contains(c.from_shape_id.as_str()) && !doomed_set.contains(c.to_shape_id.as_str())
        });
        self.comments.retain(|c| {
            c.shape_id
                .as_deref()
                .is_none_or(|s| !doomed_set.contains(s))
        });
        doomed
    }

    fn is_top_level(&self, shape: &Shape) -> bool {
        match &shape.parent_id {
            None => true,
            // Orphans of a vanished screen render at the top level.
            Some(parent) => !self.shapes.contains_key(parent),
        }
    }

    /// Top-level shapes in render order (back to front).
    pub fn render_list(&self) -> Vec<&Shape> {
        self.shapes().filter(|s| self.is_top_level(s)).collect()
    }

    /// Ordered children of a screen.
    ///
    /// Uses the screen's `childrenIds` when present, otherwise every shape
    /// whose `parentId` is the screen, in document order.
    pub fn screen_children(&self, screen_id: &str) -> Vec<&Shape> {
        let Some(screen) = self.shapes.get(screen_id) else {
            return Vec::new();
        };
        match &screen.children_ids {
            Some(ids) => ids.iter().filter_map(|id| self.shapes.get(id)).collect(),
            None => self
                .shapes()
                .filter(|s| s.parent_id.as_deref() == Some(screen_id))
                .collect(),
        }
    }

    /// Connections whose both endpoints exist.
    pub fn visible_connections(&self) -> Vec<&Connection> {
        self.connections
            .iter()
            .filter(|c| self.shapes.contains_key(&c.from_shape_id) && self.shapes.contains_key(&c.to_shape_id))
            .collect()
    }

    /// Token addressing a shape, composite for screen children.
    pub fn token_for(&self, id: &str) -> Option<SelectionToken> {
        let shape = self.shapes.get(id)?;
        Some(match &shape.parent_id {
            Some(parent) if self.shapes.contains_key(parent) => {
                SelectionToken::child(parent.clone(), id)
            }
            _ => SelectionToken::shape(id),
        })
    }

    /// Whether a token still resolves to a shape.
    pub fn resolves(&self, token: &SelectionToken) -> bool {
        match token {
            SelectionToken::Shape(id) => self.shapes.contains_key(id),
            SelectionToken::Child { screen, child } => {
                self.shapes.contains_key(screen) && self.shapes.contains_key(child)
            }
        }
    }

    /// Offset of a screen's origin, or zero for a missing screen.
    fn origin_of(&self, screen_id: &str) -> Vec2 {
        self.shapes
            .get(screen_id)
            .map(|s| Vec2::new(s.x, s.y))
            .unwrap_or(Vec2::ZERO)
    }

    /// Box of a shape in world coordinates, resolving screen-local children.
    pub fn shape_world_rect(&self, id: &str) -> Option<Rect> {
        let shape = self.shapes.get(id)?;
        let offset = match &shape.parent_id {
            Some(parent) if parent != id => self.origin_of(parent),
            _ => Vec2::ZERO,
        };
        Some(shape.rect() + offset)
    }

    /// Box addressed by a selection token, in world coordinates.
    pub fn world_rect(&self, token: &SelectionToken) -> Option<Rect> {
        match token {
            SelectionToken::Shape(id) => self.shape_world_rect(id),
            SelectionToken::Child { screen, child } => {
                let rect = self.shapes.get(child)?.rect();
                Some(rect + self.origin_of(screen))
            }
        }
    }

    /// Hit test front to back. Children of a screen are tested before the
    /// screen itself.
    pub fn shapes_at_point(&self, point: Point, tolerance: f64) -> Vec<SelectionToken> {
        let mut hits = Vec::new();
        for shape in self.render_list().into_iter().rev() {
            if shape.is_screen() {
                let local = point - Vec2::new(shape.x, shape.y);
                for child in self.screen_children(&shape.id).into_iter().rev() {
                    if child.hit_test(local, tolerance) {
                        hits.push(SelectionToken::child(shape.id.clone(), child.id.clone()));
                    }
                }
            }
            if shape.hit_test(point, tolerance) {
                hits.push(SelectionToken::shape(shape.id.clone()));
            }
        }
        hits
    }

    /// Top-level shapes fully contained in `rect`.
    pub fn top_level_within(&self, rect: Rect) -> Vec<ShapeId> {
        self.render_list()
            .into_iter()
            .filter(|s| contains_rect(rect, s.rect()))
            .map(|s| s.id.clone())
            .collect()
    }

    /// World bounds of every top-level shape.
    pub fn bounds(&self) -> Option<Bounds> {
        bounds_of(self.render_list().into_iter().map(Shape::rect))
    }

    /// Bring a shape to the front (topmost).
    pub fn bring_to_front(&mut self, id: &str) {
        if self.shapes.contains_key(id) {
            self.z_order.retain(|z| z != id);
            self.z_order.push(id.to_string());
        }
    }

    /// Send a shape to the back (bottommost).
    pub fn send_to_back(&mut self, id: &str) {
        if self.shapes.contains_key(id) {
            self.z_order.retain(|z| z != id);
            self.z_order.insert(0, id.to_string());
        }
    }

    /// Move a shape one layer forward. Returns false if already at front.
    pub fn bring_forward(&mut self, id: &str) -> bool {
        match self.z_order.iter().position(|z| z == id) {
            Some(pos) if pos + 1 < self.z_order.len() => {
                self.z_order.swap(pos, pos + 1);
                true
            }
            _ => false,
        }
    }

    /// Move a shape one layer backward. Returns false if already at back.
    pub fn send_backward(&mut self, id: &str) -> bool {
        match self.z_order.iter().position(|z| z == id) {
            Some(pos) if pos > 0 => {
                self.z_order.swap(pos, pos - 1);
                true
            }
            _ => false,
        }
    }

    /// Shape ids in document order.
    pub fn z_order(&self) -> &[ShapeId] {
        &self.z_order
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MIN_SHAPE_SIZE;
    use crate::geometry::Anchor;
    use crate::shapes::ShapeKind;

    fn rect(id: &str, x: f64, y: f64, w: f64, h: f64) -> Shape {
        Shape::with_id(id, ShapeKind::Rectangle, x, y, w, h)
    }

    fn screen_doc() -> Document {
        let mut doc = Document::new(MIN_SHAPE_SIZE);
        let mut screen = Shape::with_id("scr", ShapeKind::Screen, 1000.0, 0.0, 400.0, 800.0);
        screen.children_ids = Some(Vec::new());
        doc.add_shape(screen);
        doc.add_shape(rect("c1", 10.0, 10.0, 50.0, 50.0).in_screen("scr"));
        doc.add_shape(rect("c2", 100.0, 10.0, 50.0, 50.0).in_screen("scr"));
        doc
    }

    #[test]
    fn test_add_appends_to_children_list() {
        let doc = screen_doc();
        assert_eq!(
            doc.shape("scr").unwrap().children_ids.as_deref(),
            Some(&["c1".to_string(), "c2".to_string()][..])
        );
        let ids: Vec<_> = doc.render_list().iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["scr"]);
    }

    #[test]
    fn test_children_fall_back_to_parent_id() {
        let mut doc = Document::new(MIN_SHAPE_SIZE);
        doc.add_shape(Shape::with_id("scr", ShapeKind::Screen, 0.0, 0.0, 400.0, 400.0));
        doc.add_shape(rect("b", 0.0, 0.0, 50.0, 50.0).in_screen("scr"));
        doc.add_shape(rect("x", 0.0, 0.0, 50.0, 50.0));
        doc.add_shape(rect("a", 0.0, 0.0, 50.0, 50.0).in_screen("scr"));
        let ids: Vec<_> = doc.screen_children("scr").iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["b", "a"]);
    }

    #[test]
    fn test_world_rect_offsets_children() {
        let doc = screen_doc();
        let r = doc.world_rect(&SelectionToken::child("scr", "c1")).unwrap();
        assert_eq!(r, Rect::new(1010.0, 10.0, 1060.0, 60.0));
        assert_eq!(doc.shape_world_rect("c1"), Some(r));
    }

    #[test]
    fn test_delete_cascades() {
        let mut doc = screen_doc();
        doc.add_shape(rect("top", 0.0, 0.0, 50.0, 50.0));
        doc.add_connection(Connection::new("top", Anchor::new(1.0, 0.5), "c1", Anchor::new(0.0, 0.5)));
        doc.add_connection(Connection::new("c2", Anchor::new(1.0, 0.5), "top", Anchor::new(0.0, 0.5)));
        doc.add_comment(Comment::new(5.0, 5.0, "hi").on_shape("c1"));
        doc.add_comment(Comment::new(5.0, 5.0, "free"));

        let removed = doc.delete_shape("c1");
        assert_eq!(removed, vec!["c1".to_string()]);
        assert_eq!(doc.connections().len(), 1);
        assert!(doc.connections().iter().all(|c| !c.references("c1")));
        assert_eq!(
            doc.shape("scr").unwrap().children_ids.as_deref(),
            Some(&["c2".to_string()][..])
        );
        assert_eq!(doc.comments().len(), 1);
    }

    #[test]
    fn test_delete_screen_removes_children() {
        let mut doc = screen_doc();
        let removed = doc.delete_shape("scr");
        assert_eq!(removed.len(), 3);
        assert!(doc.is_empty());
    }

    #[test]
    fn test_dangling_connections_filtered() {
        let mut doc = Document::new(MIN_SHAPE_SIZE);
        doc.add_shape(rect("a", 0.0, 0.0, 50.0, 50.0));
        doc.add_connection(Connection::new("a", Anchor::default(), "ghost", Anchor::default()));
        assert_eq!(doc.connections().len(), 1);
        assert!(doc.visible_connections().is_empty());
    }

    #[test]
    fn test_shapes_at_point_prefers_children() {
        let doc = screen_doc();
        let hits = doc.shapes_at_point(Point::new(1020.0, 20.0), 0.0);
        assert_eq!(hits[0], SelectionToken::child("scr", "c1"));
        assert_eq!(hits[1], SelectionToken::shape("scr"));
    }

    #[test]
    fn test_top_level_within_requires_full_containment() {
        let mut doc = Document::new(MIN_SHAPE_SIZE);
        doc.add_shape(rect("in", 10.0, 10.0, 50.0, 50.0));
        doc.add_shape(rect("partial", 80.0, 80.0, 50.0, 50.0));
        let ids = doc.top_level_within(Rect::new(0.0, 0.0, 100.0, 100.0));
        assert_eq!(ids, vec!["in".to_string()]);
    }

    #[test]
    fn test_ingest_normalizes() {
        let mut tiny = rect("t", 0.0, 0.0, 50.0, 50.0);
        tiny.width = 3.0;
        let doc = Document::from_parts(MIN_SHAPE_SIZE, vec![tiny], vec![], vec![]);
        assert_eq!(doc.shape("t").unwrap().width, MIN_SHAPE_SIZE);
    }

    #[test]
    fn test_z_order_ops() {
        let mut doc = Document::new(MIN_SHAPE_SIZE);
        for id in ["a", "b", "c"] {
            doc.add_shape(rect(id, 0.0, 0.0, 50.0, 50.0));
        }
        doc.bring_to_front("a");
        assert_eq!(doc.z_order(), &["b", "c", "a"]);
        assert!(doc.send_backward("a"));
        assert_eq!(doc.z_order(), &["b", "a", "c"]);
        doc.send_to_back("c");
        assert_eq!(doc.z_order(), &["c", "b", "a"]);
        assert!(!doc.bring_forward("a"));
    }
}
