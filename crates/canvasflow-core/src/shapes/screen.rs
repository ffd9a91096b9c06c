//! Screen layout grid.

use serde::{Deserialize, Serialize};

/// Column grid drawn over a screen and used for resize snapping.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct GridColumns {
    pub enabled: bool,
    pub count: u32,
    pub gutter: f64,
    pub margin: f64,
    pub snap_to_columns: bool,
}

impl Default for GridColumns {
    fn default() -> Self {
        Self {
            enabled: false,
            count: 12,
            gutter: 8.0,
            margin: 0.0,
            snap_to_columns: true,
        }
    }
}

impl GridColumns {
    /// Whether resizes inside the screen should snap to column edges.
    pub fn snaps(&self) -> bool {
        self.enabled && self.snap_to_columns && self.count > 0
    }

    /// Width of a single column for a screen of the given width.
    pub fn column_width(&self, screen_width: f64) -> f64 {
        if self.count == 0 {
            return 0.0;
        }
        let count = f64::from(self.count);
        (screen_width - 2.0 * self.margin - self.gutter * (count - 1.0)) / count
    }

    /// `(left, right)` of every column, in screen-local coordinates.
    pub fn columns(&self, screen_width: f64) -> Vec<(f64, f64)> {
        let col = self.column_width(screen_width);
        (0..self.count)
            .map(|i| {
                let left = self.margin + f64::from(i) * (col + self.gutter);
                (left, left + col)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_twelve_column_layout() {
        let grid = GridColumns {
            enabled: true,
            count: 12,
            gutter: 8.0,
            margin: 0.0,
            snap_to_columns: true,
        };
        let col = (1200.0 - 88.0) / 12.0;
        assert!((grid.column_width(1200.0) - col).abs() < 1e-9);
        let cols = grid.columns(1200.0);
        assert_eq!(cols.len(), 12);
        assert!((cols[1].0 - (col + 8.0)).abs() < 1e-9);
        assert!((cols[11].1 - 1200.0).abs() < 1e-9);
    }

    #[test]
    fn test_zero_count() {
        let grid = GridColumns {
            count: 0,
            ..GridColumns::default()
        };
        assert!(grid.columns(500.0).is_empty());
        assert!(!grid.snaps());
    }
}
