//! Snap functionality: connector edge snap, alignment guides, grid columns
//! and the plain square grid.

use crate::geometry::{Bounds, edge_midpoints, edges, nearest_point_on_segment};
use crate::shapes::GridColumns;
use kurbo::{Point, Rect, Vec2};
use serde::{Deserialize, Serialize};

/// Grid size for snapping (matches the visual grid).
pub const GRID_SIZE: f64 = 20.0;

/// Snap mode used while dragging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SnapMode {
    /// No snapping.
    None,
    /// Snap to grid intersections.
    Grid,
    /// Snap to other shapes with alignment guides.
    #[default]
    Shapes,
    /// Guides first, grid as fallback.
    All,
}

impl SnapMode {
    /// Cycle to the next snap mode.
    pub fn next(self) -> Self {
        match self {
            SnapMode::None => SnapMode::Grid,
            SnapMode::Grid => SnapMode::Shapes,
            SnapMode::Shapes => SnapMode::All,
            SnapMode::All => SnapMode::None,
        }
    }

    pub fn snaps_to_grid(self) -> bool {
        matches!(self, SnapMode::Grid | SnapMode::All)
    }

    pub fn snaps_to_shapes(self) -> bool {
        matches!(self, SnapMode::Shapes | SnapMode::All)
    }

    pub fn is_enabled(self) -> bool {
        self != SnapMode::None
    }
}

/// Result of a point snap.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SnapResult {
    pub point: Point,
    pub snapped_x: bool,
    pub snapped_y: bool,
}

impl SnapResult {
    /// A result with no snapping.
    pub fn none(point: Point) -> Self {
        Self {
            point,
            snapped_x: false,
            snapped_y: false,
        }
    }

    pub fn is_snapped(&self) -> bool {
        self.snapped_x || self.snapped_y
    }
}

/// Snap a point to the nearest grid intersection.
pub fn snap_to_grid(point: Point, grid_size: f64) -> SnapResult {
    if grid_size <= 0.0 {
        return SnapResult::none(point);
    }
    SnapResult {
        point: Point::new(
            (point.x / grid_size).round() * grid_size,
            (point.y / grid_size).round() * grid_size,
        ),
        snapped_x: true,
        snapped_y: true,
    }
}

/// Type of connector snap target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SnapTargetKind {
    /// Midpoint of an edge.
    Midpoint,
    /// Nearest point along an edge.
    Edge,
}

/// A point a connector can attach to.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SnapTarget {
    pub point: Point,
    pub kind: SnapTargetKind,
}

/// Candidate attachment points on a shape's box for a pointer at `near`.
pub fn edge_snap_targets(rect: Rect, near: Point, include_spans: bool) -> Vec<SnapTarget> {
    let mut targets: Vec<SnapTarget> = edge_midpoints(rect)
        .into_iter()
        .map(|point| SnapTarget {
            point,
            kind: SnapTargetKind::Midpoint,
        })
        .collect();
    if include_spans {
        targets.extend(edges(rect).into_iter().map(|(a, b)| SnapTarget {
            point: nearest_point_on_segment(near, a, b),
            kind: SnapTargetKind::Edge,
        }));
    }
    targets
}

/// A resolved connector snap.
#[derive(Debug, Clone, PartialEq)]
pub struct EdgeSnap {
    pub shape_id: String,
    pub point: Point,
    pub kind: SnapTargetKind,
}

/// Find the closest edge target within `tolerance` of `point`.
///
/// `shapes` yields `(id, world rect)` pairs; the shape named by `exclude`
/// (the connector's source) is skipped. Midpoints win exact ties.
pub fn find_edge_snap<'a, I>(
    point: Point,
    shapes: I,
    exclude: Option<&str>,
    tolerance: f64,
    include_spans: bool,
) -> Option<EdgeSnap>
where
    I: IntoIterator<Item = (&'a str, Rect)>,
{
    let mut best: Option<EdgeSnap> = None;
    let mut best_dist_sq = tolerance * tolerance;

    for (id, rect) in shapes {
        if exclude == Some(id) {
            continue;
        }
        for target in edge_snap_targets(rect, point, include_spans) {
            let dist_sq = (target.point - point).hypot2();
            if dist_sq <= best_dist_sq && (best.is_none() || dist_sq < best_dist_sq) {
                best_dist_sq = dist_sq;
                best = Some(EdgeSnap {
                    shape_id: id.to_string(),
                    point: target.point,
                    kind: target.kind,
                });
            }
        }
    }
    best
}

/// Orientation of an alignment guide line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Axis {
    /// A vertical line at a fixed x.
    Vertical,
    /// A horizontal line at a fixed y.
    Horizontal,
}

/// A transient alignment line shown while dragging.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Guide {
    pub axis: Axis,
    /// x for vertical guides, y for horizontal ones.
    pub position: f64,
    /// Extent along the line.
    pub start: f64,
    pub end: f64,
}

/// Outcome of alignment snapping for a dragged selection.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AlignmentSnap {
    /// Correction to add to the raw drag delta.
    pub delta: Vec2,
    pub guides: Vec<Guide>,
}

struct AxisMatch {
    delta: f64,
    position: f64,
    target: Rect,
}

fn best_axis_match(candidates: [f64; 3], lines: impl Fn(&Bounds) -> [f64; 3], others: &[Rect], tolerance: f64) -> Option<AxisMatch> {
    let mut best: Option<AxisMatch> = None;
    for &other in others {
        let b = Bounds::from_rect(other);
        for line in lines(&b) {
            for candidate in candidates {
                let delta = line - candidate;
                if delta.abs() > tolerance {
                    continue;
                }
                if best.as_ref().is_none_or(|m| delta.abs() < m.delta.abs()) {
                    best = Some(AxisMatch {
                        delta,
                        position: line,
                        target: other,
                    });
                }
            }
        }
    }
    best
}

/// Align a moving selection to the edges and centers of other shapes.
///
/// X and Y are resolved independently; each picks the candidate pair with
/// the smallest offset within `tolerance` (already in world units).
pub fn snap_alignment(moving: Bounds, others: &[Rect], tolerance: f64) -> AlignmentSnap {
    let mut snap = AlignmentSnap::default();

    let x = best_axis_match(
        [moving.left, moving.cx, moving.right],
        |b| [b.left, b.cx, b.right],
        others,
        tolerance,
    );
    let y = best_axis_match(
        [moving.top, moving.cy, moving.bottom],
        |b| [b.top, b.cy, b.bottom],
        others,
        tolerance,
    );

    if let Some(m) = &x {
        snap.delta.x = m.delta;
    }
    if let Some(m) = &y {
        snap.delta.y = m.delta;
    }
    let snapped = moving.translate(snap.delta.x, snap.delta.y);

    if let Some(m) = x {
        snap.guides.push(Guide {
            axis: Axis::Vertical,
            position: m.position,
            start: snapped.top.min(m.target.y0),
            end: snapped.bottom.max(m.target.y1),
        });
    }
    if let Some(m) = y {
        snap.guides.push(Guide {
            axis: Axis::Horizontal,
            position: m.position,
            start: snapped.left.min(m.target.x0),
            end: snapped.right.max(m.target.x1),
        });
    }
    snap
}

/// Snap the east edge of a screen child to the nearest column edge.
///
/// Coordinates are screen-local. Returns the new width when a column edge
/// lies within `threshold` of `x + width`, never below `min_size`.
pub fn snap_east_edge_to_columns(
    x: f64,
    width: f64,
    grid: &GridColumns,
    screen_width: f64,
    threshold: f64,
    min_size: f64,
) -> Option<f64> {
    if !grid.snaps() {
        return None;
    }
    let right = x + width;
    let nearest = grid
        .columns(screen_width)
        .into_iter()
        .flat_map(|(l, r)| [l, r])
        .min_by(|a, b| (a - right).abs().total_cmp(&(b - right).abs()))?;
    if (nearest - right).abs() <= threshold {
        Some((nearest - x).max(min_size))
    } else {
        None
    }
}
