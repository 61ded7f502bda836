//! # hotspot-matrix
//!
//! Data reduction and adaptive color scaling for gene x cancer-type mutation
//! frequency matrices.
//!
//! A dataset of tens of thousands of mutation records is reduced to one cell
//! per (gene, cancer type) pair that fits a viewport, and the cells are colored
//! on a scale whose breakpoints follow the shape of the whole frequency
//! distribution rather than a fixed ramp.
//!
//! ## Basic Usage
//!
//! ```rust
//! use hotspot_matrix::{
//!     MutationRecord, PipelineInputs, PipelineOptions, ViewTiers, Viewport, run,
//! };
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let records = vec![
//!     MutationRecord::new("KRAS", 12, "Colon", 80, 0.40),
//!     MutationRecord::new("TP53", 175, "Breast", 120, 0.35),
//! ];
//! let tiers = ViewTiers::default();
//! let inputs = PipelineInputs::new(records, tiers.get("standard")?.clone(), Viewport::new(800.0, 600.0));
//! let output = run(&inputs, &PipelineOptions::default())?;
//!
//! assert_eq!(output.cells.len(), 2);
//! for cell in &output.cells {
//!     let color = output.cell_color(cell).map(|c| c.to_hex());
//!     println!("{} / {}: {:?}", cell.gene, cell.cancer_type, color);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! - `record`: ingestion and normalization of API records
//! - `tier`: detail tiers and tier recommendation
//! - `reduce`: ranking filter, stratified sampler and cell aggregation
//! - `stats`: distribution statistics and shape classification
//! - `render`: cell sizing, palettes, the adaptive color scale and a PNG preview
//! - `pipeline`: the end-to-end run, memoization and request supersession

pub mod error;
pub mod pipeline;
pub mod record;
pub mod reduce;
pub mod render;
pub mod stats;
pub mod tier;

// Re-export commonly used types
pub use error::{HeatmapError, Result};
pub use pipeline::{
    Diagnostics, PipelineCache, PipelineInputs, PipelineOptions, PipelineOutput, RequestToken,
    RequestTracker, run, run_cancelable, run_tracked,
};
pub use record::{Ingested, MutationRecord, RawMutationRecord, records_from_json, records_from_reader};
pub use reduce::{AggregatedCell, CellKey, RankingFilter};
pub use render::{
    AdaptiveColorScale, CellSizing, CellSizingEngine, ColorScheme, RenderOptions, Rgb,
    SizingLimits, Viewport, render_matrix,
};
pub use stats::{DistributionAnalyzer, DistributionShape, DistributionStats};
pub use tier::{ViewTier, ViewTiers};

// Type aliases
pub type PlotBytes = Vec<u8>;
