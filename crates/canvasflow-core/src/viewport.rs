//! Viewport module for pan/zoom transforms.

use crate::config::EngineConfig;
use kurbo::{Affine, Point, Rect, Size, Vec2};
use serde::{Deserialize, Serialize};

/// A wheel or trackpad event in screen space.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct WheelInput {
    /// Scroll delta in pixels.
    pub delta: Vec2,
    /// Pointer location in screen pixels.
    pub screen_point: Point,
    /// Ctrl (or Cmd) held: wheel zooms instead of panning.
    pub ctrl_key: bool,
    /// Trackpad pinch gesture.
    pub is_pinch: bool,
}

/// Viewport manages the view transform for the canvas.
///
/// `position` is the screen-space translation and `scale` the zoom factor:
/// `screen = world * scale + position`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Viewport {
    pub position: Vec2,
    pub scale: f64,
    pub min_scale: f64,
    pub max_scale: f64,
    #[serde(skip, default = "default_intensities")]
    intensities: (f64, f64),
}

fn default_intensities() -> (f64, f64) {
    (0.01, 0.001)
}

/// Clamp a scale into `[min, max]`. Unlike `f64::clamp` this never panics on
/// an inverted or NaN range; `max` wins when the bounds cross.
fn clamp_scale(scale: f64, min: f64, max: f64) -> f64 {
    scale.max(min).min(max)
}

impl Default for Viewport {
    fn default() -> Self {
        Self::from_config(&EngineConfig::default())
    }
}

impl Viewport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a viewport using the configured scale limits and zoom intensities.
    pub fn from_config(config: &EngineConfig) -> Self {
        Self {
            position: Vec2::ZERO,
            scale: clamp_scale(1.0, config.min_scale, config.max_scale),
            min_scale: config.min_scale,
            max_scale: config.max_scale,
            intensities: (config.pinch_zoom_intensity, config.wheel_zoom_intensity),
        }
    }

    /// World-to-screen transform for rendering.
    pub fn transform(&self) -> Affine {
        Affine::translate(self.position) * Affine::scale(self.scale)
    }

    /// Screen-to-world transform for input handling.
    pub fn inverse_transform(&self) -> Affine {
        Affine::scale(1.0 / self.scale) * Affine::translate(-self.position)
    }

    pub fn screen_to_world(&self, screen_point: Point) -> Point {
        self.inverse_transform() * screen_point
    }

    pub fn world_to_screen(&self, world_point: Point) -> Point {
        self.transform() * world_point
    }

    /// Convert a pointer movement in pixels into world units.
    pub fn screen_delta_to_world(&self, delta: Vec2) -> Vec2 {
        delta / self.scale
    }

    /// Convert a screen-pixel tolerance into world units at the current scale.
    pub fn world_tolerance(&self, px: f64) -> f64 {
        px / self.scale
    }

    /// Pan by a delta in screen pixels.
    pub fn pan(&mut self, delta: Vec2) {
        self.position += delta;
    }

    /// Change the scale, keeping the world point under `screen_point` fixed.
    ///
    /// `next_scale` is clamped to the configured range.
    pub fn zoom_at_screen_point(&mut self, next_scale: f64, screen_point: Point) {
        if !next_scale.is_finite() {
            return;
        }
        let next_scale = clamp_scale(next_scale, self.min_scale, self.max_scale);
        if (next_scale - self.scale).abs() < f64::EPSILON {
            return;
        }

        let world_point = self.screen_to_world(screen_point);
        self.scale = next_scale;
        self.position = screen_point.to_vec2() - world_point.to_vec2() * next_scale;
    }

    /// Apply a wheel event: plain scrolling pans, ctrl or pinch zooms.
    pub fn on_wheel(&mut self, input: WheelInput) {
        if input.ctrl_key || input.is_pinch {
            let (pinch, wheel) = self.intensities;
            let intensity = if input.is_pinch { pinch } else { wheel };
            let next = self.scale * (1.0 - input.delta.y * intensity);
            self.zoom_at_screen_point(next, input.screen_point);
        } else {
            self.pan(-input.delta);
        }
    }

    /// Reset to the origin at the default scale.
    pub fn reset(&mut self) {
        self.position = Vec2::ZERO;
        self.scale = clamp_scale(1.0, self.min_scale, self.max_scale);
    }

    /// Fit the viewport so `bounds` is centered and fully visible.
    pub fn fit_to_bounds(&mut self, bounds: Rect, viewport: Size, padding: f64) {
        if bounds.is_zero_area() {
            self.reset();
            return;
        }

        let available = Size::new(
            (viewport.width - padding * 2.0).max(1.0),
            (viewport.height - padding * 2.0).max(1.0),
        );
        let scale_x = available.width / bounds.width();
        let scale_y = available.height / bounds.height();
        self.scale = clamp_scale(scale_x.min(scale_y), self.min_scale, self.max_scale);

        let center = bounds.center();
        self.position = Vec2::new(
            viewport.width / 2.0 - center.x * self.scale,
            viewport.height / 2.0 - center.y * self.scale,
        );
    }
}
