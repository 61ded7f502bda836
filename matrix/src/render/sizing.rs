use derive_builder::Builder;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Viewport dimensions in pixels
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Viewport {
    pub width: f64,
    pub height: f64,
}

impl Viewport {
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }
}

/// Limits applied by the [`CellSizingEngine`]
///
/// # Example
///
/// ```rust
/// use hotspot_matrix::render::sizing::SizingLimits;
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let limits = SizingLimits::new().max_cell(30.0).build()?;
/// assert_eq!(limits.min_cell, 3.0);
/// # Ok(())
/// # }
/// ```
#[derive(Builder, Clone, Debug, PartialEq, Serialize, Deserialize)]
#[builder(setter(into), default, build_fn(validate = "Self::validate"))]
#[serde(try_from = "UncheckedLimits")]
pub struct SizingLimits {
    /// Smallest legible cell edge in pixels
    #[builder(default = "3.0")]
    pub min_cell: f64,

    /// Cell edge used when an axis is empty
    #[builder(default = "15.0")]
    pub ideal_cell: f64,

    /// Largest cell edge in pixels
    #[builder(default = "50.0")]
    pub max_cell: f64,

    /// Fraction of the viewport available to the grid
    #[builder(default = "0.8")]
    pub viewport_fill: f64,

    /// A matrix must have fewer cells than this to be feasible
    #[builder(default = "10_000")]
    pub max_cells: usize,
}

impl Default for SizingLimits {
    fn default() -> Self {
        Self {
            min_cell: 3.0,
            ideal_cell: 15.0,
            max_cell: 50.0,
            viewport_fill: 0.8,
            max_cells: 10_000,
        }
    }
}

impl SizingLimitsBuilder {
    fn validate(&self) -> std::result::Result<(), String> {
        let min = self.min_cell.unwrap_or(3.0);
        let max = self.max_cell.unwrap_or(50.0);
        let ideal = self.ideal_cell.unwrap_or(15.0);
        let fill = self.viewport_fill.unwrap_or(0.8);
        if !(min > 0.0 && min <= max) {
            return Err(format!("expected 0 < min_cell <= max_cell, got {min} and {max}"));
        }
        if !(min..=max).contains(&ideal) {
            return Err(format!("ideal_cell {ideal} must lie within [{min}, {max}]"));
        }
        if !(fill > 0.0 && fill <= 1.0) {
            return Err(format!("viewport_fill must be in (0, 1], got {fill}"));
        }
        Ok(())
    }
}

/// Wire form of [`SizingLimits`]; missing fields take the builder defaults
#[derive(Deserialize)]
struct UncheckedLimits {
    min_cell: Option<f64>,
    ideal_cell: Option<f64>,
    max_cell: Option<f64>,
    viewport_fill: Option<f64>,
    max_cells: Option<usize>,
}

impl TryFrom<UncheckedLimits> for SizingLimits {
    type Error = SizingLimitsBuilderError;

    fn try_from(raw: UncheckedLimits) -> std::result::Result<Self, Self::Error> {
        let mut builder = SizingLimits::new();
        if let Some(v) = raw.min_cell {
            builder.min_cell(v);
        }
        if let Some(v) = raw.ideal_cell {
            builder.ideal_cell(v);
        }
        if let Some(v) = raw.max_cell {
            builder.max_cell(v);
        }
        if let Some(v) = raw.viewport_fill {
            builder.viewport_fill(v);
        }
        if let Some(v) = raw.max_cells {
            builder.max_cells(v);
        }
        builder.build()
    }
}

impl SizingLimits {
    /// Create a new builder for SizingLimits
    pub fn new() -> SizingLimitsBuilder {
        SizingLimitsBuilder::default()
    }
}

/// Per-cell pixel dimensions of the matrix
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[cfg_attr(feature = "typescript", derive(ts_rs::TS))]
#[cfg_attr(feature = "typescript", ts(export))]
pub struct CellSizing {
    pub cell_width: f64,
    pub cell_height: f64,
    /// Whether the matrix fits the viewport at a legible cell size
    pub feasible: bool,
}

/// Sizes matrix cells to a viewport.
///
/// Pure: re-run it whenever the viewport or the axis cardinalities change.
#[derive(Debug, Clone, Default)]
pub struct CellSizingEngine {
    limits: SizingLimits,
}

impl CellSizingEngine {
    pub fn new(limits: SizingLimits) -> Self {
        Self { limits }
    }

    pub fn limits(&self) -> &SizingLimits {
        &self.limits
    }

    /// Compute cell dimensions for a `gene_count` x `cancer_type_count` grid.
    ///
    /// Each edge is `fill * viewport / count`, clamped to `[min_cell, max_cell]`.
    /// The matrix is feasible when both unclamped edges reach `min_cell` and it
    /// has fewer than `max_cells` cells. An empty axis yields `ideal_cell` edges
    /// and a trivially feasible (empty) matrix.
    pub fn size(&self, viewport: Viewport, gene_count: usize, cancer_type_count: usize) -> CellSizing {
        let limits = &self.limits;
        if gene_count == 0 || cancer_type_count == 0 {
            return CellSizing {
                cell_width: limits.ideal_cell,
                cell_height: limits.ideal_cell,
                feasible: true,
            };
        }

        let raw_width = raw_edge(viewport.width * limits.viewport_fill, gene_count);
        let raw_height = raw_edge(viewport.height * limits.viewport_fill, cancer_type_count);

        let feasible = raw_width >= limits.min_cell
            && raw_height >= limits.min_cell
            && gene_count.saturating_mul(cancer_type_count) < limits.max_cells;

        if !feasible {
            warn!(
                "Matrix of {gene_count} x {cancer_type_count} does not fit a {} x {} viewport",
                viewport.width, viewport.height
            );
        }

        // hand-built limits may have min_cell > max_cell, where `f64::clamp` panics
        CellSizing {
            cell_width: raw_width.max(limits.min_cell).min(limits.max_cell),
            cell_height: raw_height.max(limits.min_cell).min(limits.max_cell),
            feasible,
        }
    }
}

fn raw_edge(available: f64, count: usize) -> f64 {
    let edge = available / count as f64;
    if edge.is_finite() && edge > 0.0 { edge } else { 0.0 }
}

/// Convenience wrapper using default [`SizingLimits`]
pub fn size(viewport_width: f64, viewport_height: f64, gene_count: usize, cancer_type_count: usize) -> CellSizing {
    CellSizingEngine::default().size(
        Viewport::new(viewport_width, viewport_height),
        gene_count,
        cancer_type_count,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_typical_grid() {
        // 1000 * 0.8 / 40 = 20, 500 * 0.8 / 20 = 20
        let sizing = size(1000.0, 500.0, 40, 20);
        assert_relative_eq!(sizing.cell_width, 20.0);
        assert_relative_eq!(sizing.cell_height, 20.0);
        assert!(sizing.feasible);
    }

    #[test]
    fn test_clamped_to_max() {
        let sizing = size(1000.0, 1000.0, 2, 3);
        assert_relative_eq!(sizing.cell_width, 50.0);
        assert_relative_eq!(sizing.cell_height, 50.0);
        assert!(sizing.feasible);
    }

    #[test]
    fn test_too_small_is_clamped_and_infeasible() {
        // 800 * 0.8 / 400 = 1.6 px
        let sizing = size(800.0, 800.0, 400, 10);
        assert_relative_eq!(sizing.cell_width, 3.0);
        assert!(!sizing.feasible);
    }

    #[test]
    fn test_cell_count_limit() {
        // 100 x 100 = 10 000 cells, not strictly below the limit
        let sizing = size(100_000.0, 100_000.0, 100, 100);
        assert!(!sizing.feasible);
        let sizing = size(100_000.0, 100_000.0, 99, 100);
        assert!(sizing.feasible);
    }

    #[test]
    fn test_zero_axis_does_not_divide_by_zero() {
        for (genes, cancers) in [(0, 5), (5, 0), (0, 0)] {
            let sizing = size(800.0, 600.0, genes, cancers);
            assert_relative_eq!(sizing.cell_width, 15.0);
            assert_relative_eq!(sizing.cell_height, 15.0);
            assert!(sizing.cell_width.is_finite() && sizing.cell_height.is_finite());
            assert!(sizing.feasible);
        }
    }

    #[test]
    fn test_degenerate_viewport() {
        let sizing = size(0.0, f64::NAN, 10, 10);
        assert_relative_eq!(sizing.cell_width, 3.0);
        assert_relative_eq!(sizing.cell_height, 3.0);
        assert!(!sizing.feasible);
    }

    #[test]
    fn test_limits_builder_validation() {
        assert!(SizingLimits::new().min_cell(10.0).max_cell(5.0).build().is_err());
        assert!(SizingLimits::new().viewport_fill(1.5).build().is_err());
        assert!(SizingLimits::new().ideal_cell(80.0).build().is_err());
        let limits = SizingLimits::new().max_cells(500usize).build().unwrap();
        assert_eq!(limits.max_cells, 500);
    }

    #[test]
    fn test_deserialized_limits_are_validated() {
        assert!(serde_json::from_str::<SizingLimits>(r#"{"min_cell":10.0,"max_cell":5.0}"#).is_err());
        assert!(serde_json::from_str::<SizingLimits>(r#"{"viewport_fill":0.0}"#).is_err());

        let limits: SizingLimits = serde_json::from_str(r#"{"max_cells":400}"#).unwrap();
        assert_eq!(limits.max_cells, 400);
        assert_eq!(limits.min_cell, 3.0);
    }

    #[test]
    fn test_inverted_limits_do_not_panic() {
        let limits = SizingLimits {
            min_cell: 10.0,
            max_cell: 5.0,
            ..SizingLimits::default()
        };
        let sizing = CellSizingEngine::new(limits).size(Viewport::new(800.0, 600.0), 10, 10);
        assert_relative_eq!(sizing.cell_width, 5.0);
        assert_relative_eq!(sizing.cell_height, 5.0);
    }
}
