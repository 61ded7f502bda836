//! End-to-end matrix computation.
//!
//! ```text
//! records ─► RankingFilter ─► stratified_sample ─► aggregate ─► cells + axis labels
//!    │                                                               │
//!    └──────────► AdaptiveColorScale (unsampled)     CellSizingEngine ◄┘
//! ```
//!
//! A run is a pure function of [`PipelineInputs`] and [`PipelineOptions`].
//! [`PipelineCache`] reuses the previous output while those stay the same, and
//! [`RequestTracker`] lets a newer request supersede one that is still running.

use crate::error::{HeatmapError, Result};
use crate::record::{MutationRecord, frequencies};
use crate::reduce::aggregate::{AggregatedCell, aggregate, aggregate_par};
use crate::reduce::ranking::{RankingFilter, axis_labels};
use crate::reduce::sampling::{DEFAULT_SEED, SamplingConfig, stratified_sample};
use crate::render::colorscale::AdaptiveColorScale;
use crate::render::palette::{ColorScheme, Rgb};
use crate::render::sizing::{CellSizing, CellSizingEngine, SizingLimits, Viewport};
use crate::tier::ViewTier;
use derive_builder::Builder;
use rustc_hash::FxHashSet;
use serde::Serialize;
use std::borrow::Cow;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, info};

/// Everything a run depends on that comes from the current view
#[derive(Debug, Clone)]
pub struct PipelineInputs {
    /// The full dataset; shared so that cache keys can compare it by identity
    pub records: Arc<[MutationRecord]>,
    pub tier: ViewTier,
    pub hidden_genes: FxHashSet<String>,
    pub hidden_cancer_types: FxHashSet<String>,
    /// Replaces the tier's `min_frequency` when set
    pub frequency_threshold: Option<f64>,
    pub viewport: Viewport,
}

impl PipelineInputs {
    pub fn new(records: impl Into<Arc<[MutationRecord]>>, tier: ViewTier, viewport: Viewport) -> Self {
        Self {
            records: records.into(),
            tier,
            hidden_genes: FxHashSet::default(),
            hidden_cancer_types: FxHashSet::default(),
            frequency_threshold: None,
            viewport,
        }
    }

    pub fn with_hidden_genes<I, S>(mut self, genes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.hidden_genes = genes.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_hidden_cancer_types<I, S>(mut self, cancer_types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.hidden_cancer_types = cancer_types.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_frequency_threshold(mut self, threshold: Option<f64>) -> Self {
        self.frequency_threshold = threshold;
        self
    }

    /// The tier actually used for ranking, with the threshold override applied
    pub fn effective_tier(&self) -> Result<Cow<'_, ViewTier>> {
        match self.frequency_threshold {
            None => Ok(Cow::Borrowed(&self.tier)),
            Some(t) if t.is_finite() && t >= 0.0 => Ok(Cow::Owned(self.tier.with_min_frequency(t))),
            Some(t) => Err(HeatmapError::ConfigError(format!(
                "frequency threshold must be a finite value >= 0, got {t}"
            ))),
        }
    }
}

/// Tunables that are not part of the view
///
/// # Example
///
/// ```rust
/// use hotspot_matrix::pipeline::PipelineOptions;
/// use hotspot_matrix::render::palette::ColorScheme;
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let options = PipelineOptions::new()
///     .max_samples(2000usize)
///     .color_scheme(ColorScheme::Viridis)
///     .build()?;
/// assert_eq!(options.max_samples, 2000);
/// # Ok(())
/// # }
/// ```
#[derive(Builder, Clone, Debug, PartialEq, Serialize)]
#[builder(setter(into), default, build_fn(validate = "Self::validate"))]
#[serde(rename_all = "camelCase")]
pub struct PipelineOptions {
    /// Upper bound on records passed to aggregation
    #[builder(default = "5000")]
    pub max_samples: usize,

    /// Sampler seed; fixed by default so repeated runs agree
    #[builder(default = "DEFAULT_SEED")]
    pub seed: u64,

    #[builder(default)]
    pub color_scheme: ColorScheme,

    #[builder(default)]
    pub sizing: SizingLimits,

    /// Aggregate with rayon instead of a sequential fold
    #[builder(default = "false")]
    pub parallel: bool,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            max_samples: 5000,
            seed: DEFAULT_SEED,
            color_scheme: ColorScheme::default(),
            sizing: SizingLimits::default(),
            parallel: false,
        }
    }
}

impl PipelineOptionsBuilder {
    fn validate(&self) -> std::result::Result<(), String> {
        if self.max_samples == Some(0) {
            return Err("max_samples must be at least 1".to_string());
        }
        Ok(())
    }
}

impl PipelineOptions {
    /// Create a new builder for PipelineOptions
    pub fn new() -> PipelineOptionsBuilder {
        PipelineOptionsBuilder::default()
    }
}

/// Record counts after each reduction stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
#[cfg_attr(feature = "typescript", derive(ts_rs::TS))]
#[cfg_attr(feature = "typescript", ts(export))]
pub struct Diagnostics {
    pub original_count: usize,
    pub filtered_count: usize,
    pub sampled_count: usize,
    pub cell_count: usize,
}

/// What the rendering layer consumes
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineOutput {
    /// One cell per (gene, cancer type), ascending by gene then cancer type
    pub cells: Vec<AggregatedCell>,
    /// Gene labels of the cells, ascending
    pub genes: Vec<String>,
    /// Cancer-type labels of the cells, ascending
    pub cancer_types: Vec<String>,
    pub sizing: CellSizing,
    /// Built from the whole dataset; `None` when the dataset is empty
    pub color_scale: Option<AdaptiveColorScale>,
    pub diagnostics: Diagnostics,
}

impl PipelineOutput {
    /// Fill color of `cell`, from its representative record's frequency
    pub fn cell_color(&self, cell: &AggregatedCell) -> Option<Rgb> {
        self.color_scale
            .as_ref()
            .map(|scale| scale.color(cell.representative_record.effective_frequency))
    }
}

/// Run the whole pipeline.
///
/// An empty dataset is not an error: the output has no cells, trivially
/// feasible sizing and no color scale.
pub fn run(inputs: &PipelineInputs, options: &PipelineOptions) -> Result<PipelineOutput> {
    run_cancelable(inputs, options, || false)?.ok_or(HeatmapError::Cancelled)
}

/// Run the pipeline, polling `should_cancel` between stages.
///
/// Returns `Ok(None)` as soon as the predicate reports true.
pub fn run_cancelable(
    inputs: &PipelineInputs,
    options: &PipelineOptions,
    mut should_cancel: impl FnMut() -> bool,
) -> Result<Option<PipelineOutput>> {
    let tier = inputs.effective_tier()?;
    let records: &[MutationRecord] = &inputs.records;

    if should_cancel() {
        return Ok(None);
    }
    let filtered =
        RankingFilter::new(&tier).filter(records, &inputs.hidden_genes, &inputs.hidden_cancer_types);

    if should_cancel() {
        debug!("Run cancelled after filtering");
        return Ok(None);
    }
    let sampled = stratified_sample(
        &filtered,
        &SamplingConfig {
            max_samples: options.max_samples,
            seed: options.seed,
        },
    );

    if should_cancel() {
        debug!("Run cancelled after sampling");
        return Ok(None);
    }
    let cell_map = if options.parallel {
        aggregate_par(&sampled)
    } else {
        aggregate(&sampled)
    };
    let cells: Vec<AggregatedCell> = cell_map.into_values().collect();
    let (genes, cancer_types) = axis_labels(&sampled);

    if should_cancel() {
        debug!("Run cancelled after aggregation");
        return Ok(None);
    }
    let sizing = CellSizingEngine::new(options.sizing.clone()).size(
        inputs.viewport,
        genes.len(),
        cancer_types.len(),
    );
    let color_scale = if records.is_empty() {
        None
    } else {
        Some(AdaptiveColorScale::build(&frequencies(records), options.color_scheme)?)
    };

    let diagnostics = Diagnostics {
        original_count: records.len(),
        filtered_count: filtered.len(),
        sampled_count: sampled.len(),
        cell_count: cells.len(),
    };
    info!(
        "Tier '{}': {} records -> {} filtered -> {} sampled -> {} cells ({} genes x {} cancer types)",
        tier.name,
        diagnostics.original_count,
        diagnostics.filtered_count,
        diagnostics.sampled_count,
        diagnostics.cell_count,
        genes.len(),
        cancer_types.len()
    );

    Ok(Some(PipelineOutput {
        cells,
        genes,
        cancer_types,
        sizing,
        color_scale,
        diagnostics,
    }))
}

/// Identifies a run's inputs for memoization.
///
/// The dataset is compared by identity (same shared allocation), everything
/// else by value. Floats are compared bitwise.
#[derive(Debug, Clone)]
pub struct PipelineCacheKey {
    records: Arc<[MutationRecord]>,
    tier: ViewTier,
    hidden_genes: Vec<String>,
    hidden_cancer_types: Vec<String>,
    frequency_threshold: Option<u64>,
    viewport: (u64, u64),
    options: PipelineOptions,
}

impl PipelineCacheKey {
    pub fn new(inputs: &PipelineInputs, options: &PipelineOptions) -> Self {
        let sorted = |set: &FxHashSet<String>| {
            let mut values: Vec<String> = set.iter().cloned().collect();
            values.sort_unstable();
            values
        };
        Self {
            records: Arc::clone(&inputs.records),
            tier: inputs.tier.clone(),
            hidden_genes: sorted(&inputs.hidden_genes),
            hidden_cancer_types: sorted(&inputs.hidden_cancer_types),
            frequency_threshold: inputs.frequency_threshold.map(f64::to_bits),
            viewport: (inputs.viewport.width.to_bits(), inputs.viewport.height.to_bits()),
            options: options.clone(),
        }
    }
}

impl PartialEq for PipelineCacheKey {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.records, &other.records)
            && self.tier == other.tier
            && self.hidden_genes == other.hidden_genes
            && self.hidden_cancer_types == other.hidden_cancer_types
            && self.frequency_threshold == other.frequency_threshold
            && self.viewport == other.viewport
            && self.options == other.options
    }
}

/// Keeps the most recent output and returns it while the inputs are unchanged
#[derive(Debug, Default)]
pub struct PipelineCache {
    entry: Option<(PipelineCacheKey, Arc<PipelineOutput>)>,
    hits: u64,
    misses: u64,
}

impl PipelineCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// The cached output for these inputs, if any
    pub fn get(&self, inputs: &PipelineInputs, options: &PipelineOptions) -> Option<Arc<PipelineOutput>> {
        let key = PipelineCacheKey::new(inputs, options);
        self.entry
            .as_ref()
            .filter(|(cached, _)| *cached == key)
            .map(|(_, output)| Arc::clone(output))
    }

    /// Return the cached output or run the pipeline and cache the result
    pub fn get_or_run(
        &mut self,
        inputs: &PipelineInputs,
        options: &PipelineOptions,
    ) -> Result<Arc<PipelineOutput>> {
        let key = PipelineCacheKey::new(inputs, options);
        if let Some((cached, output)) = &self.entry {
            if *cached == key {
                self.hits += 1;
                debug!("Pipeline cache hit");
                return Ok(Arc::clone(output));
            }
        }

        self.misses += 1;
        let output = Arc::new(run(inputs, options)?);
        self.entry = Some((key, Arc::clone(&output)));
        Ok(output)
    }

    pub fn invalidate(&mut self) {
        self.entry = None;
    }

    pub fn hits(&self) -> u64 {
        self.hits
    }

    pub fn misses(&self) -> u64 {
        self.misses
    }
}

/// Issues generation tokens so that only the latest request's result is kept
#[derive(Debug, Clone, Default)]
pub struct RequestTracker {
    latest: Arc<AtomicU64>,
}

impl RequestTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a new request, superseding every earlier one
    pub fn begin(&self) -> RequestToken {
        let generation = self.latest.fetch_add(1, Ordering::AcqRel) + 1;
        RequestToken {
            generation,
            latest: Arc::clone(&self.latest),
        }
    }

    pub fn latest_generation(&self) -> u64 {
        self.latest.load(Ordering::Acquire)
    }
}

/// Handle held by one in-flight request
#[derive(Debug, Clone)]
pub struct RequestToken {
    generation: u64,
    latest: Arc<AtomicU64>,
}

impl RequestToken {
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn is_current(&self) -> bool {
        self.latest.load(Ordering::Acquire) == self.generation
    }

    pub fn is_superseded(&self) -> bool {
        !self.is_current()
    }
}

/// Run on behalf of `token`.
///
/// Returns `Ok(None)` when a newer request was started before this one finished.
pub fn run_tracked(
    inputs: &PipelineInputs,
    options: &PipelineOptions,
    token: &RequestToken,
) -> Result<Option<PipelineOutput>> {
    let output = run_cancelable(inputs, options, || token.is_superseded())?;
    // a newer request may have started after the last checkpoint
    Ok(output.filter(|_| token.is_current()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tier::ViewTiers;

    fn rec(gene: &str, cancer: &str, count: u64, freq: f64) -> MutationRecord {
        MutationRecord::new(gene, 1, cancer, count, freq)
    }

    fn dataset() -> Vec<MutationRecord> {
        vec![
            rec("TP53", "Breast", 120, 0.35),
            rec("TP53", "Lung", 90, 0.42),
            rec("KRAS", "Lung", 60, 0.30),
            rec("KRAS", "Colon", 80, 0.40),
            rec("PIK3CA", "Breast", 70, 0.28),
            rec("BRAF", "Skin", 50, 0.45),
            rec("EGFR", "Lung", 40, 0.02),
            rec("IDH1", "Brain", 5, 0.004),
        ]
    }

    fn complete() -> ViewTier {
        ViewTiers::default().get("complete").unwrap().clone()
    }

    fn inputs() -> PipelineInputs {
        PipelineInputs::new(dataset(), complete(), Viewport::new(800.0, 600.0))
    }

    #[test]
    fn test_run_complete_tier() {
        let output = run(&inputs(), &PipelineOptions::default()).unwrap();
        assert_eq!(output.cells.len(), 8);
        assert_eq!(output.genes, vec!["BRAF", "EGFR", "IDH1", "KRAS", "PIK3CA", "TP53"]);
        assert_eq!(output.cancer_types, vec!["Brain", "Breast", "Colon", "Lung", "Skin"]);
        assert!(output.sizing.feasible);
        assert!(output.color_scale.is_some());
        assert_eq!(
            output.diagnostics,
            Diagnostics {
                original_count: 8,
                filtered_count: 8,
                sampled_count: 8,
                cell_count: 8,
            }
        );
        let keys: Vec<_> = output.cells.iter().map(|c| c.key()).collect();
        let mut sorted = keys.clone();
        sorted.sort();
        assert_eq!(keys, sorted);
    }

    #[test]
    fn test_empty_dataset() {
        let inputs = PipelineInputs::new(Vec::new(), complete(), Viewport::new(800.0, 600.0));
        let output = run(&inputs, &PipelineOptions::default()).unwrap();
        assert!(output.cells.is_empty());
        assert!(output.genes.is_empty() && output.cancer_types.is_empty());
        assert!(output.sizing.feasible);
        assert!(output.color_scale.is_none());
        assert_eq!(output.diagnostics, Diagnostics::default());
    }

    #[test]
    fn test_color_scale_uses_unfiltered_population() {
        let hidden = inputs().with_hidden_genes(["TP53", "KRAS", "PIK3CA", "BRAF"]);
        let output = run(&hidden, &PipelineOptions::default()).unwrap();
        assert_eq!(output.diagnostics.filtered_count, 2);
        let stats = output.color_scale.as_ref().unwrap().stats();
        assert_eq!(stats.count, 8);
        assert_eq!(stats.max, 0.45);
    }

    #[test]
    fn test_threshold_override_replaces_tier_floor() {
        let inputs = inputs().with_frequency_threshold(Some(0.3));
        let output = run(&inputs, &PipelineOptions::default()).unwrap();
        assert!(output.cells.iter().all(|c| c.max_frequency >= 0.3));
        assert_eq!(output.diagnostics.filtered_count, 5);

        let invalid = self::inputs().with_frequency_threshold(Some(f64::NAN));
        assert!(matches!(
            run(&invalid, &PipelineOptions::default()),
            Err(HeatmapError::ConfigError(_))
        ));
    }

    #[test]
    fn test_sampling_bounds_cells() {
        let records: Vec<MutationRecord> = (0..300)
            .map(|i| rec(&format!("G{}", i % 30), &format!("C{}", i % 7), 3, 0.05))
            .collect();
        let inputs = PipelineInputs::new(records, complete(), Viewport::new(2000.0, 2000.0));
        let options = PipelineOptions::new().max_samples(50usize).build().unwrap();
        let output = run(&inputs, &options).unwrap();
        assert_eq!(output.diagnostics.sampled_count, 30);
        assert!(output.diagnostics.cell_count <= 30);
    }

    #[test]
    fn test_parallel_option_matches_sequential() {
        let sequential = run(&inputs(), &PipelineOptions::default()).unwrap();
        let options = PipelineOptions::new().parallel(true).build().unwrap();
        let parallel = run(&inputs(), &options).unwrap();
        assert_eq!(sequential.cells, parallel.cells);
    }

    #[test]
    fn test_options_validation() {
        assert!(PipelineOptions::new().max_samples(0usize).build().is_err());
    }

    #[test]
    fn test_cancel_between_stages() {
        let mut checks = 0;
        let result = run_cancelable(&inputs(), &PipelineOptions::default(), || {
            checks += 1;
            checks >= 3
        })
        .unwrap();
        assert!(result.is_none());
        assert_eq!(checks, 3);
    }

    #[test]
    fn test_cache_reuses_output() {
        let mut cache = PipelineCache::new();
        let inputs = inputs();
        let options = PipelineOptions::default();
        let first = cache.get_or_run(&inputs, &options).unwrap();
        let second = cache.get_or_run(&inputs.clone(), &options).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!((cache.hits(), cache.misses()), (1, 1));

        let resized = PipelineInputs {
            viewport: Viewport::new(1024.0, 768.0),
            ..inputs.clone()
        };
        let third = cache.get_or_run(&resized, &options).unwrap();
        assert!(!Arc::ptr_eq(&first, &third));
        assert_eq!(cache.misses(), 2);
        assert!(cache.get(&inputs, &options).is_none());

        cache.invalidate();
        assert!(cache.get(&resized, &options).is_none());
    }

    #[test]
    fn test_cache_compares_dataset_by_identity() {
        let mut cache = PipelineCache::new();
        let options = PipelineOptions::default();
        cache.get_or_run(&inputs(), &options).unwrap();
        // equal contents, different allocation
        cache.get_or_run(&inputs(), &options).unwrap();
        assert_eq!(cache.misses(), 2);
    }

    #[test]
    fn test_cache_key_ignores_hidden_set_order() {
        let a = inputs().with_hidden_genes(["TP53", "KRAS"]);
        let b = PipelineInputs {
            hidden_genes: ["KRAS", "TP53"].into_iter().map(String::from).collect(),
            ..a.clone()
        };
        let options = PipelineOptions::default();
        assert_eq!(PipelineCacheKey::new(&a, &options), PipelineCacheKey::new(&b, &options));
    }

    #[test]
    fn test_latest_request_wins() {
        let tracker = RequestTracker::new();
        let older = tracker.begin();
        let newer = tracker.begin();
        assert!(older.is_superseded());
        assert!(newer.is_current());
        assert_eq!(tracker.latest_generation(), newer.generation());

        let options = PipelineOptions::default();
        assert!(run_tracked(&inputs(), &options, &older).unwrap().is_none());
        assert!(run_tracked(&inputs(), &options, &newer).unwrap().is_some());
    }

    #[test]
    fn test_superseded_from_another_thread() {
        let tracker = RequestTracker::new();
        let token = tracker.begin();
        let handle = {
            let tracker = tracker.clone();
            std::thread::spawn(move || tracker.begin().generation())
        };
        let newer = handle.join().unwrap();
        assert!(newer > token.generation());
        assert!(token.is_superseded());
    }
}
