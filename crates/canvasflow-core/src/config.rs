//! Engine configuration.
//!
//! Every field has a default, so a host only needs to supply the values it
//! wants to override:
//!
//! ```
//! use canvasflow_core::EngineConfig;
//!
//! let config = EngineConfig::from_json(r#"{ "maxScale": 8.0 }"#).unwrap();
//! assert_eq!(config.max_scale, 8.0);
//! assert_eq!(config.min_scale, 0.1);
//! ```

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Minimum width/height of any shape, in world units.
pub const MIN_SHAPE_SIZE: f64 = 20.0;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid configuration JSON: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Tunables for the interaction and synchronization engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EngineConfig {
    /// Lowest allowed viewport scale.
    pub min_scale: f64,
    /// Highest allowed viewport scale.
    pub max_scale: f64,
    /// Zoom intensity for trackpad pinch gestures.
    pub pinch_zoom_intensity: f64,
    /// Zoom intensity for ctrl + mouse wheel.
    pub wheel_zoom_intensity: f64,
    /// Connector edge-snap tolerance (world units at scale 1).
    pub connect_snap_tolerance: f64,
    /// Also snap connectors to the nearest point on an edge, not only midpoints.
    pub snap_to_edge_spans: bool,
    /// Alignment guide tolerance in screen pixels.
    pub guide_snap_px: f64,
    /// Grid-column snap threshold in screen pixels.
    pub grid_snap_px: f64,
    /// Minimum shape width/height in world units.
    pub min_shape_size: f64,
    /// Hit tolerance for resize and connector handles in screen pixels.
    pub handle_hit_px: f64,
    /// Merge interval for store-side undo coalescing (0 = only explicit gestures).
    pub history_merge_interval_ms: i64,
    /// Presence cursors older than this start to fade.
    pub presence_stale_ms: u64,
    /// Fade duration after the stale window.
    pub presence_fade_ms: u64,
    /// Presence entries older than this are dropped.
    pub presence_timeout_ms: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            min_scale: 0.1,
            max_scale: 4.0,
            pinch_zoom_intensity: 0.01,
            wheel_zoom_intensity: 0.001,
            connect_snap_tolerance: 15.0,
            snap_to_edge_spans: true,
            guide_snap_px: 6.0,
            grid_snap_px: 8.0,
            min_shape_size: MIN_SHAPE_SIZE,
            handle_hit_px: 8.0,
            history_merge_interval_ms: 0,
            presence_stale_ms: 3_000,
            presence_fade_ms: 5_000,
            presence_timeout_ms: 30_000,
        }
    }
}

impl EngineConfig {
    /// Parse a configuration from JSON, filling missing fields with defaults.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Check the configuration for values the engine cannot work with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let finite = self.min_scale.is_finite() && self.max_scale.is_finite();
        if !finite || self.min_scale <= 0.0 || self.max_scale < self.min_scale {
            return Err(ConfigError::Invalid(format!(
                "scale range [{}, {}] is empty or non-positive",
                self.min_scale, self.max_scale
            )));
        }
        if self.min_shape_size <= 0.0 {
            return Err(ConfigError::Invalid("minShapeSize must be positive".into()));
        }
        if self.history_merge_interval_ms < 0 {
            return Err(ConfigError::Invalid(
                "historyMergeIntervalMs must not be negative".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.min_scale, 0.1);
        assert_eq!(config.max_scale, 4.0);
        assert_eq!(config.min_shape_size, MIN_SHAPE_SIZE);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_json() {
        let config = EngineConfig::from_json(r#"{"guideSnapPx": 10.0}"#).unwrap();
        assert_eq!(config.guide_snap_px, 10.0);
        assert_eq!(config.grid_snap_px, 8.0);
    }

    #[test]
    fn test_invalid_range() {
        let result = EngineConfig::from_json(r#"{"minScale": 2.0, "maxScale": 1.0}"#);
        assert!(matches!(result, Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_non_finite_scale_rejected() {
        let config = EngineConfig {
            max_scale: f64::INFINITY,
            ..EngineConfig::default()
        };
        assert!(config.validate().is_err());
        let result = EngineConfig::from_json(r#"{"historyMergeIntervalMs": -5}"#);
        assert!(matches!(result, Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_malformed_json() {
        let result = EngineConfig::from_json("{not json");
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }
}
