//! Pointer-driven interaction state machine.
//!
//! [`Editor`] owns everything a single client needs to edit a room: the
//! viewport, the selection, the working [`Document`] and the bridge to the
//! shared store. The UI shell forwards raw pointer and keyboard events to the
//! `on_*` handlers and reads back the render list, guides, the marquee and
//! the connector preview.
//!
//! ```text
//! Idle ──canvas──▶ Selecting ──up──▶ Idle
//!  │ ──shape───▶ Dragging  ──up──▶ Idle
//!  │ ──handle──▶ Resizing  ──up──▶ Idle
//!  └ ──connector▶ Connecting ──up / Esc──▶ Idle
//! ```
//!
//! Dragging and resizing hold store history paused for their whole length so
//! each gesture is one undo step.

use crate::config::EngineConfig;
use crate::document::Document;
use crate::error::Result;
use crate::geometry::{Bounds, bounds_of, to_relative_anchor};
use crate::handles::{
    CONNECTOR_HANDLE_OFFSET, ConnectorSide, ResizeHandle, apply_resize, hit_test_connectors,
    hit_test_resize_handles,
};
use crate::input::{Key, Modifiers, PointerInput};
use crate::layers;
use crate::selection::{Selection, SelectionToken};
use crate::shapes::{ConnectionId, Connection, GroupId, Shape, ShapeId};
use crate::snap::{
    EdgeSnap, GRID_SIZE, Guide, SnapMode, find_edge_snap, snap_alignment,
    snap_east_edge_to_columns, snap_to_grid,
};
use crate::store::DocumentStore;
use crate::sync::{RecordSnapshot, SyncBridge};
use crate::viewport::{Viewport, WheelInput};
use kurbo::{CubicBez, Point, Rect, Vec2};
use std::collections::HashSet;

/// Arrow-key nudge distance in world units.
const NUDGE_STEP: f64 = 1.0;
/// Nudge distance with shift held.
const NUDGE_STEP_LARGE: f64 = 10.0;
/// Horizontal control-point offset of the connector preview, as a fraction
/// of the endpoint delta.
const PREVIEW_CURVATURE: f64 = 0.3;

/// A shape moved by the current drag, with its box when the drag began.
#[derive(Debug, Clone, PartialEq)]
pub struct DragItem {
    pub token: SelectionToken,
    /// Box in the shape's own coordinate space.
    pub original: Rect,
}

/// The modal state of the editor. At most one gesture is active.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum InteractionState {
    #[default]
    Idle,
    /// Marquee selection, in world coordinates.
    Selecting {
        origin: Point,
        current: Point,
        additive: bool,
    },
    Dragging {
        start: Point,
        items: Vec<DragItem>,
        /// World bounds of the dragged shapes when the drag began.
        bounds: Option<Bounds>,
        /// Whether the pointer moved since the press.
        moved: bool,
        /// Token a release without movement collapses the selection to.
        pressed: Option<SelectionToken>,
    },
    Resizing {
        token: SelectionToken,
        handle: ResizeHandle,
        start: Point,
        /// Box in the shape's own coordinate space.
        original: Rect,
    },
    Connecting {
        from_shape: ShapeId,
        side: ConnectorSide,
        start: Point,
        current: Point,
        snap: Option<EdgeSnap>,
    },
}

impl InteractionState {
    pub fn is_idle(&self) -> bool {
        matches!(self, InteractionState::Idle)
    }

    /// Whether the state holds store history paused.
    fn holds_history(&self) -> bool {
        matches!(
            self,
            InteractionState::Dragging { .. } | InteractionState::Resizing { .. }
        )
    }
}

/// Live preview of a connection being drawn.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConnectorPreview {
    pub start: Point,
    pub end: Point,
    /// Whether `end` sits on a snap target.
    pub snapped: bool,
}

impl ConnectorPreview {
    /// Cubic curve from start to end with horizontally offset controls.
    pub fn curve(&self) -> CubicBez {
        let dx = (self.end.x - self.start.x) * PREVIEW_CURVATURE;
        CubicBez::new(
            self.start,
            Point::new(self.start.x + dx, self.start.y),
            Point::new(self.end.x - dx, self.end.y),
            self.end,
        )
    }
}

/// Interaction engine for one client.
pub struct Editor<S> {
    config: EngineConfig,
    viewport: Viewport,
    selection: Selection,
    state: InteractionState,
    guides: Vec<Guide>,
    snap_mode: SnapMode,
    document: Document,
    sync: SyncBridge<S>,
    synced_version: u64,
}

impl<S: DocumentStore> Editor<S> {
    /// Create an editor over a store and load its current contents.
    ///
    /// A configuration that fails [`EngineConfig::validate`] is replaced by
    /// the defaults.
    pub fn new(config: EngineConfig, store: S) -> Self {
        let config = match config.validate() {
            Ok(()) => config,
            Err(e) => {
                log::warn!("{e}, using default configuration");
                EngineConfig::default()
            }
        };
        let sync = SyncBridge::new(store, config.min_shape_size);
        let document = sync.load_document();
        let synced_version = sync.version();
        Self {
            viewport: Viewport::from_config(&config),
            config,
            selection: Selection::new(),
            state: InteractionState::Idle,
            guides: Vec::new(),
            snap_mode: SnapMode::default(),
            document,
            sync,
            synced_version,
        }
    }

    /// Create an editor with configuration overrides given as JSON.
    pub fn from_json_config(json: &str, store: S) -> Result<Self> {
        let config = EngineConfig::from_json(json)?;
        Ok(Self::new(config, store))
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn viewport(&self) -> &Viewport {
        &self.viewport
    }

    pub fn viewport_mut(&mut self) -> &mut Viewport {
        &mut self.viewport
    }

    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    pub fn state(&self) -> &InteractionState {
        &self.state
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    pub fn store(&self) -> &S {
        self.sync.store()
    }

    /// Direct store access, e.g. for applying remote updates. Call
    /// [`sync_from_store`](Self::sync_from_store) afterwards.
    pub fn store_mut(&mut self) -> &mut S {
        self.sync.store_mut()
    }

    pub fn snap_mode(&self) -> SnapMode {
        self.snap_mode
    }

    pub fn set_snap_mode(&mut self, mode: SnapMode) {
        self.snap_mode = mode;
    }

    pub fn cycle_snap_mode(&mut self) -> SnapMode {
        self.snap_mode = self.snap_mode.next();
        self.snap_mode
    }

    /// Top-level shapes in render order.
    pub fn render_list(&self) -> Vec<&Shape> {
        self.document.render_list()
    }

    /// Connections with both endpoints resolved to world coordinates.
    pub fn connection_paths(&self) -> Vec<(&Connection, Point, Point)> {
        self.document
            .visible_connections()
            .into_iter()
            .filter_map(|c| {
                let from = self.document.shape_world_rect(&c.from_shape_id)?;
                let to = self.document.shape_world_rect(&c.to_shape_id)?;
                let (a, b) = c.endpoints(from, to);
                Some((c, a, b))
            })
            .collect()
    }

    /// Alignment guides of the current drag.
    pub fn guides(&self) -> &[Guide] {
        &self.guides
    }

    /// Marquee rectangle in world coordinates while selecting.
    pub fn marquee_rect(&self) -> Option<Rect> {
        match &self.state {
            InteractionState::Selecting { origin, current, .. } => {
                Some(Rect::from_points(*origin, *current))
            }
            _ => None,
        }
    }

    pub fn connector_preview(&self) -> Option<ConnectorPreview> {
        match &self.state {
            InteractionState::Connecting {
                start,
                current,
                snap,
                ..
            } => Some(ConnectorPreview {
                start: *start,
                end: snap.as_ref().map_or(*current, |s| s.point),
                snapped: snap.is_some(),
            }),
            _ => None,
        }
    }

    // --- Store synchronization ---

    /// Rebuild the working document if the store changed since the last
    /// sync. Skipped while a gesture is active. Returns true if reloaded.
    pub fn sync_from_store(&mut self) -> bool {
        if !self.state.is_idle() || self.sync.version() == self.synced_version {
            return false;
        }
        self.reload();
        true
    }

    fn reload(&mut self) {
        self.document = self.sync.load_document();
        let document = &self.document;
        self.selection.retain(|t| document.resolves(t));
        self.synced_version = self.sync.version();
    }

    fn mark_synced(&mut self) {
        self.synced_version = self.sync.version();
    }

    /// Apply a structural change to the document and commit it as one batch.
    ///
    /// The working copy is reloaded from the store afterwards, so a rejected
    /// write leaves no local trace.
    pub fn edit<R>(&mut self, f: impl FnOnce(&mut Document) -> R) -> R {
        let before = self.document.clone();
        let result = f(&mut self.document);
        self.sync.commit(&before, &self.document);
        self.reload();
        result
    }

    /// Add a shape on top of the document.
    pub fn add_shape(&mut self, shape: Shape) -> ShapeId {
        let id = shape.id.clone();
        self.edit(|doc| doc.add_shape(shape));
        id
    }

    pub fn export_snapshot(&self) -> RecordSnapshot {
        self.sync.export_snapshot()
    }

    /// Replace the room contents with a snapshot.
    pub fn import_snapshot(&mut self, snapshot: &RecordSnapshot) -> Result<()> {
        self.cancel_gesture();
        let result = self.sync.import_snapshot(snapshot);
        self.reload();
        Ok(result?)
    }

    pub fn undo(&mut self) -> bool {
        if !self.state.is_idle() {
            return false;
        }
        let undone = self.sync.undo();
        self.reload();
        undone
    }

    pub fn redo(&mut self) -> bool {
        if !self.state.is_idle() {
            return false;
        }
        let redone = self.sync.redo();
        self.reload();
        redone
    }

    pub fn can_undo(&self) -> bool {
        self.sync.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.sync.can_redo()
    }

    // --- Pointer handlers ---

    fn to_world(&self, input: PointerInput) -> Point {
        self.viewport.screen_to_world(input.position)
    }

    /// Press anywhere: resize handles win over connector handles, which win
    /// over shapes, which win over the empty canvas.
    pub fn on_pointer_down(&mut self, input: PointerInput) {
        self.sync_from_store();
        let world = self.to_world(input);
        if let Some((token, handle)) = self.hit_resize_handle(world) {
            self.on_resize_start(token, handle, input);
            return;
        }
        if let Some((shape_id, side)) = self.hit_connector(world) {
            self.on_connector_mouse_down(&shape_id, side, input);
            return;
        }
        match self.document.shapes_at_point(world, 0.0).into_iter().next() {
            Some(token) => self.on_shape_mouse_down(token, input),
            None => self.on_canvas_mouse_down(input),
        }
    }

    fn hit_resize_handle(&self, world: Point) -> Option<(SelectionToken, ResizeHandle)> {
        let [token] = self.selection.tokens() else {
            return None;
        };
        let shape = self.document.shape(token.shape_id())?;
        let rect = self.document.world_rect(token)?;
        let tolerance = self.viewport.world_tolerance(self.config.handle_hit_px);
        hit_test_resize_handles(rect, shape.kind.resize_handles(), world, tolerance)
            .map(|handle| (token.clone(), handle))
    }

    fn hit_connector(&self, world: Point) -> Option<(ShapeId, ConnectorSide)> {
        let offset = self.viewport.world_tolerance(CONNECTOR_HANDLE_OFFSET);
        let tolerance = self.viewport.world_tolerance(self.config.handle_hit_px);
        self.selection.iter().find_map(|token| {
            let rect = self.document.world_rect(token)?;
            hit_test_connectors(rect, world, offset, tolerance)
                .map(|side| (token.shape_id().to_string(), side))
        })
    }

    /// Press on a shape: select it (shift toggles) and start dragging the
    /// selection.
    pub fn on_shape_mouse_down(&mut self, token: SelectionToken, input: PointerInput) {
        self.cancel_gesture();
        if !self.document.resolves(&token) {
            return;
        }
        // A plain press inside a multi-selection keeps it so the whole set
        // can be dragged; the release decides whether it was a click.
        let pressed = if input.modifiers.shift {
            if !self.selection.toggle(token) {
                return;
            }
            None
        } else {
            if !self.selection.contains(&token) {
                self.selection.select_only(token.clone());
            }
            Some(token)
        };
        let start = self.to_world(input);
        let items = self.movable_items();
        let bounds = bounds_of(
            items
                .iter()
                .filter_map(|item| self.document.world_rect(&item.token)),
        );
        log::debug!("Drag started with {} shapes", items.len());
        self.sync.begin_gesture();
        self.state = InteractionState::Dragging {
            start,
            items,
            bounds,
            moved: false,
            pressed,
        };
    }

    /// Press on a resize handle of a shape.
    pub fn on_resize_start(&mut self, token: SelectionToken, handle: ResizeHandle, input: PointerInput) {
        self.cancel_gesture();
        let Some(shape) = self.document.shape(token.shape_id()) else {
            return;
        };
        let original = shape.rect();
        if !self.selection.contains(&token) {
            self.selection.select_only(token.clone());
        }
        log::debug!("Resize started on {token} ({})", handle.cursor());
        self.sync.begin_gesture();
        self.state = InteractionState::Resizing {
            token,
            handle,
            start: self.to_world(input),
            original,
        };
    }

    /// Press on a connector handle: start drawing a connection from the
    /// exact midpoint of that side.
    pub fn on_connector_mouse_down(&mut self, shape_id: &str, side: ConnectorSide, _input: PointerInput) {
        self.cancel_gesture();
        let Some(rect) = self.document.shape_world_rect(shape_id) else {
            return;
        };
        let start = side.anchor_point(rect);
        log::debug!("Connecting from {shape_id} ({side:?})");
        self.state = InteractionState::Connecting {
            from_shape: shape_id.to_string(),
            side,
            start,
            current: start,
            snap: None,
        };
    }

    /// Press on empty canvas: start a marquee. Without shift the selection
    /// is cleared first.
    pub fn on_canvas_mouse_down(&mut self, input: PointerInput) {
        self.cancel_gesture();
        let additive = input.modifiers.shift;
        if !additive {
            self.selection.clear();
        }
        let origin = self.to_world(input);
        self.state = InteractionState::Selecting {
            origin,
            current: origin,
            additive,
        };
    }

    pub fn on_pointer_move(&mut self, input: PointerInput) {
        let world = self.to_world(input);
        let state = std::mem::take(&mut self.state);
        self.state = match state {
            InteractionState::Idle => InteractionState::Idle,
            InteractionState::Selecting {
                origin, additive, ..
            } => InteractionState::Selecting {
                origin,
                current: world,
                additive,
            },
            InteractionState::Dragging {
                start,
                items,
                bounds,
                pressed,
                ..
            } => {
                self.drag_to(start, &items, bounds, world, input.modifiers);
                InteractionState::Dragging {
                    start,
                    items,
                    bounds,
                    moved: true,
                    pressed,
                }
            }
            InteractionState::Resizing {
                token,
                handle,
                start,
                original,
            } => {
                self.resize_to(&token, handle, start, original, world);
                InteractionState::Resizing {
                    token,
                    handle,
                    start,
                    original,
                }
            }
            InteractionState::Connecting {
                from_shape,
                side,
                start,
                ..
            } => {
                let snap = self.connect_snap(&from_shape, world);
                InteractionState::Connecting {
                    from_shape,
                    side,
                    start,
                    current: world,
                    snap,
                }
            }
        };
    }

    /// Release: finish whatever gesture is active.
    pub fn on_pointer_up(&mut self, input: PointerInput) {
        let world = self.to_world(input);
        let state = std::mem::take(&mut self.state);
        match state {
            InteractionState::Idle => {}
            InteractionState::Selecting {
                origin, additive, ..
            } => {
                let rect = Rect::from_points(origin, world);
                let hits = self.document.top_level_within(rect);
                log::debug!("Marquee selected {} shapes", hits.len());
                let tokens = hits.into_iter().map(SelectionToken::Shape);
                if additive {
                    for token in tokens {
                        self.selection.add(token);
                    }
                } else {
                    self.selection.set(tokens);
                }
            }
            InteractionState::Dragging {
                start,
                items,
                bounds,
                moved,
                pressed,
            } => {
                if moved {
                    self.drag_to(start, &items, bounds, world, input.modifiers);
                } else if let Some(token) = pressed {
                    self.selection.select_only(token);
                }
                self.finish_gesture();
            }
            InteractionState::Resizing {
                token,
                handle,
                start,
                original,
            } => {
                self.resize_to(&token, handle, start, original, world);
                self.finish_gesture();
            }
            InteractionState::Connecting {
                from_shape, start, ..
            } => match self.connect_snap(&from_shape, world) {
                Some(snap) => {
                    self.finish_connection(&from_shape, start, &snap);
                }
                None => log::debug!("Connection from {from_shape} discarded"),
            },
        }
        self.guides.clear();
    }

    /// The page lost visibility: end any gesture without resolving it.
    pub fn on_visibility_hidden(&mut self) {
        self.cancel_gesture();
    }

    pub fn on_wheel(&mut self, input: WheelInput) {
        self.viewport.on_wheel(input);
    }

    /// Keyboard shortcuts. Returns true if the key was handled.
    pub fn on_key_down(&mut self, key: Key, modifiers: Modifiers) -> bool {
        if key == Key::Escape {
            if self.state.is_idle() {
                self.selection.clear();
            } else {
                self.cancel_gesture();
            }
            return true;
        }
        if !self.state.is_idle() {
            return false;
        }
        self.sync_from_store();

        if let Some((dx, dy)) = key.arrow_direction() {
            let step = if modifiers.shift {
                NUDGE_STEP_LARGE
            } else {
                NUDGE_STEP
            };
            return self.nudge_selection(Vec2::new(dx * step, dy * step));
        }
        match key {
            Key::Delete | Key::Backspace => !self.delete_selected().is_empty(),
            Key::Character('a') if modifiers.command() => {
                self.select_all();
                true
            }
            Key::Character('z') if modifiers.command() => {
                if modifiers.shift {
                    self.redo()
                } else {
                    self.undo()
                }
            }
            Key::Character('y') if modifiers.command() => self.redo(),
            _ => false,
        }
    }

    // --- Gesture internals ---

    /// End the active gesture. Moves already written stay; a marquee or an
    /// unfinished connection is dropped.
    pub fn cancel_gesture(&mut self) {
        let state = std::mem::take(&mut self.state);
        if state.holds_history() {
            self.finish_gesture();
        } else if !state.is_idle() {
            log::debug!("Gesture cancelled");
        }
        self.guides.clear();
    }

    fn finish_gesture(&mut self) {
        self.sync.end_gesture();
        self.reload();
    }

    /// Selected shapes that move as a unit. Children of a selected screen
    /// follow their screen and are left out.
    fn movable_items(&self) -> Vec<DragItem> {
        let selected_screens: HashSet<&str> = self
            .selection
            .iter()
            .filter(|t| t.screen_id().is_none())
            .map(SelectionToken::shape_id)
            .collect();
        self.selection
            .iter()
            .filter(|t| t.screen_id().is_none_or(|s| !selected_screens.contains(s)))
            .filter_map(|token| {
                let shape = self.document.shape(token.shape_id())?;
                Some(DragItem {
                    token: token.clone(),
                    original: shape.rect(),
                })
            })
            .collect()
    }

    /// World boxes of every shape that is not moving, for alignment.
    fn alignment_targets(&self, items: &[DragItem]) -> Vec<Rect> {
        let moving: HashSet<&str> = items.iter().map(|i| i.token.shape_id()).collect();
        let mut rects = Vec::new();
        for shape in self.document.render_list() {
            if moving.contains(shape.id.as_str()) {
                continue;
            }
            rects.push(shape.rect());
            if shape.is_screen() {
                let origin = Vec2::new(shape.x, shape.y);
                rects.extend(
                    self.document
                        .screen_children(&shape.id)
                        .into_iter()
                        .filter(|c| !moving.contains(c.id.as_str()))
                        .map(|c| c.rect() + origin),
                );
            }
        }
        rects
    }

    fn drag_to(
        &mut self,
        start: Point,
        items: &[DragItem],
        bounds: Option<Bounds>,
        world: Point,
        modifiers: Modifiers,
    ) {
        let raw = world - start;
        let mut delta = raw;
        self.guides.clear();

        if let Some(bounds) = bounds {
            if !modifiers.alt {
                let moved = bounds.translate(raw.x, raw.y);
                let mut aligned = false;
                if self.snap_mode.snaps_to_shapes() {
                    let tolerance = self.viewport.world_tolerance(self.config.guide_snap_px);
                    let snap = snap_alignment(moved, &self.alignment_targets(items), tolerance);
                    aligned = !snap.guides.is_empty();
                    delta += snap.delta;
                    self.guides = snap.guides;
                }
                if !aligned && self.snap_mode.snaps_to_grid() {
                    let corner = Point::new(moved.left, moved.top);
                    delta += snap_to_grid(corner, GRID_SIZE).point - corner;
                }
            }
        }
        log::trace!("Drag delta ({:.1}, {:.1})", delta.x, delta.y);

        let min_size = self.config.min_shape_size;
        for item in items {
            let Some(before) = self.document.shape(item.token.shape_id()).cloned() else {
                continue;
            };
            let mut after = before.clone();
            after.set_rect(item.original + delta, min_size);
            if after != before {
                self.sync.patch_shape(&before, &after);
                self.document.replace_shape(after);
            }
        }
        self.mark_synced();
    }

    fn resize_to(
        &mut self,
        token: &SelectionToken,
        handle: ResizeHandle,
        start: Point,
        original: Rect,
        world: Point,
    ) {
        let min_size = self.config.min_shape_size;
        let mut rect = apply_resize(original, handle, world - start, min_size);
        if handle.moves_east() {
            if let Some(width) = self.column_snapped_width(token, rect) {
                rect.x1 = rect.x0 + width;
            }
        }

        let Some(before) = self.document.shape(token.shape_id()).cloned() else {
            return;
        };
        let mut after = before.clone();
        after.set_rect(rect, min_size);
        if after != before {
            self.sync.patch_shape(&before, &after);
            self.document.replace_shape(after);
        }
        self.mark_synced();
    }

    /// Width that puts the east edge of a screen child on a column edge.
    fn column_snapped_width(&self, token: &SelectionToken, rect: Rect) -> Option<f64> {
        let screen = self.document.shape(token.screen_id()?)?;
        let grid = screen.grid_columns.as_ref()?;
        snap_east_edge_to_columns(
            rect.x0,
            rect.width(),
            grid,
            screen.width,
            self.viewport.world_tolerance(self.config.grid_snap_px),
            self.config.min_shape_size,
        )
    }

    fn connect_snap(&self, from_shape: &str, world: Point) -> Option<EdgeSnap> {
        let targets: Vec<(&str, Rect)> = self
            .document
            .shapes()
            .filter_map(|s| Some((s.id.as_str(), self.document.shape_world_rect(&s.id)?)))
            .collect();
        find_edge_snap(
            world,
            targets,
            Some(from_shape),
            self.viewport.world_tolerance(self.config.connect_snap_tolerance),
            self.config.snap_to_edge_spans,
        )
    }

    fn finish_connection(&mut self, from_shape: &str, start: Point, snap: &EdgeSnap) -> Option<ConnectionId> {
        let from_rect = self.document.shape_world_rect(from_shape)?;
        let to_rect = self.document.shape_world_rect(&snap.shape_id)?;
        let connection = Connection::new(
            from_shape,
            to_relative_anchor(start, from_rect),
            snap.shape_id.clone(),
            to_relative_anchor(snap.point, to_rect),
        );
        let id = connection.id.clone();
        log::debug!("Connecting {from_shape} to {}", snap.shape_id);
        self.edit(|doc| doc.add_connection(connection));
        Some(id)
    }

    // --- Commands ---

    pub fn select_all(&mut self) {
        let tokens: Vec<SelectionToken> = self
            .document
            .render_list()
            .into_iter()
            .map(|s| SelectionToken::shape(s.id.clone()))
            .collect();
        self.selection.set(tokens);
    }

    /// Delete every selected shape with its dependents, as one undo step.
    pub fn delete_selected(&mut self) -> Vec<ShapeId> {
        let ids: Vec<ShapeId> = self
            .selection
            .iter()
            .map(|t| t.shape_id().to_string())
            .collect();
        if ids.is_empty() {
            return Vec::new();
        }
        let deleted = self.edit(|doc| {
            ids.iter()
                .flat_map(|id| doc.delete_shape(id))
                .collect::<Vec<_>>()
        });
        log::debug!("Deleted {} shapes", deleted.len());
        self.selection.clear();
        deleted
    }

    /// Move the selection by a fixed offset as one undo step.
    pub fn nudge_selection(&mut self, delta: Vec2) -> bool {
        let items = self.movable_items();
        if items.is_empty() {
            return false;
        }
        let min_size = self.config.min_shape_size;
        self.sync.begin_gesture();
        for item in &items {
            let Some(before) = self.document.shape(item.token.shape_id()).cloned() else {
                continue;
            };
            let mut after = before.clone();
            after.set_rect(item.original + delta, min_size);
            self.sync.patch_shape(&before, &after);
            self.document.replace_shape(after);
        }
        self.finish_gesture();
        true
    }

    /// Group the selected children of one screen. Returns the new group id,
    /// or None if the selection spans several screens or top-level shapes.
    pub fn group_selection(&mut self) -> Option<GroupId> {
        let mut screen: Option<ShapeId> = None;
        let mut children = Vec::new();
        for token in self.selection.iter() {
            let owner = token.screen_id()?;
            match &screen {
                Some(s) if s != owner => return None,
                Some(_) => {}
                None => screen = Some(owner.to_string()),
            }
            children.push(token.shape_id().to_string());
        }
        let screen = screen?;
        self.edit(|doc| layers::create_group_with(doc, &screen, &children, None))
    }

    /// Raise every selected shape to the top, keeping their relative order.
    pub fn bring_selection_to_front(&mut self) {
        let ids = self.selected_in_z_order();
        self.edit(|doc| {
            for id in &ids {
                doc.bring_to_front(id);
            }
        });
    }

    /// Lower every selected shape to the bottom, keeping their relative order.
    pub fn send_selection_to_back(&mut self) {
        let ids = self.selected_in_z_order();
        self.edit(|doc| {
            for id in ids.iter().rev() {
                doc.send_to_back(id);
            }
        });
    }

    fn selected_in_z_order(&self) -> Vec<ShapeId> {
        self.document
            .z_order()
            .iter()
            .filter(|id| self.selection.contains_shape(id))
            .cloned()
            .collect()
    }
}

impl<S: std::fmt::Debug> std::fmt::Debug for Editor<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Editor")
            .field("state", &self.state)
            .field("selection", &self.selection)
            .field("viewport", &self.viewport)
            .field("shapes", &self.document.len())
            .field("sync", &self.sync)
            .finish()
    }
}
