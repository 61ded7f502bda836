//! Detail tiers.
//!
//! A tier bundles the axis cardinality limits and the frequency floor used by
//! the ranking filter. Tiers live in an explicit [`ViewTiers`] table that
//! callers pass around; there is no process-wide tier list.

use crate::error::{HeatmapError, Result};
use crate::record::MutationRecord;
use crate::reduce::ranking::{RankingFilter, axis_labels};
use crate::render::sizing::{CellSizingEngine, Viewport};
use derive_builder::Builder;
use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Axis limit meaning "no limit"
pub const UNBOUNDED: usize = usize::MAX;

/// A named detail tier
///
/// # Example
///
/// ```rust
/// use hotspot_matrix::tier::ViewTier;
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let tier = ViewTier::new()
///     .name("focused")
///     .max_genes(10usize)
///     .max_cancer_types(5usize)
///     .min_frequency(0.1)
///     .build()?;
/// assert_eq!(tier.max_genes, 10);
/// # Ok(())
/// # }
/// ```
#[derive(Builder, Clone, Debug, PartialEq, Serialize, Deserialize)]
#[builder(setter(into), build_fn(validate = "Self::validate"))]
#[serde(rename_all = "camelCase", try_from = "UncheckedTier")]
#[cfg_attr(feature = "typescript", derive(ts_rs::TS))]
#[cfg_attr(feature = "typescript", ts(export))]
pub struct ViewTier {
    pub name: String,

    /// Maximum number of genes kept on the x axis
    #[builder(default = "UNBOUNDED")]
    pub max_genes: usize,

    /// Maximum number of cancer types kept on the y axis
    #[builder(default = "UNBOUNDED")]
    pub max_cancer_types: usize,

    /// Records below this effective frequency are dropped
    #[builder(default = "0.0")]
    pub min_frequency: f64,

    #[builder(default)]
    pub description: String,
}

/// Wire form of [`ViewTier`]; deserialized tiers go through the builder checks
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UncheckedTier {
    name: String,
    max_genes: Option<usize>,
    max_cancer_types: Option<usize>,
    min_frequency: Option<f64>,
    #[serde(default)]
    description: String,
}

impl TryFrom<UncheckedTier> for ViewTier {
    type Error = HeatmapError;

    fn try_from(raw: UncheckedTier) -> Result<Self> {
        let mut builder = ViewTier::new();
        builder.name(raw.name).description(raw.description);
        if let Some(max_genes) = raw.max_genes {
            builder.max_genes(max_genes);
        }
        if let Some(max_cancer_types) = raw.max_cancer_types {
            builder.max_cancer_types(max_cancer_types);
        }
        if let Some(min_frequency) = raw.min_frequency {
            builder.min_frequency(min_frequency);
        }
        builder
            .build()
            .map_err(|e| HeatmapError::InvalidTier(e.to_string()))
    }
}

impl ViewTierBuilder {
    fn validate(&self) -> std::result::Result<(), String> {
        if let Some(name) = &self.name {
            if name.trim().is_empty() {
                return Err("tier name must not be empty".to_string());
            }
        }
        if self.max_genes == Some(0) {
            return Err("max_genes must be at least 1".to_string());
        }
        if self.max_cancer_types == Some(0) {
            return Err("max_cancer_types must be at least 1".to_string());
        }
        if let Some(min_frequency) = self.min_frequency {
            if !min_frequency.is_finite() || min_frequency < 0.0 {
                return Err(format!(
                    "min_frequency must be a finite value >= 0, got {min_frequency}"
                ));
            }
        }
        Ok(())
    }
}

impl ViewTier {
    /// Create a new builder for ViewTier
    pub fn new() -> ViewTierBuilder {
        ViewTierBuilder::default()
    }

    /// Build a tier from its parts, validating them
    pub fn try_new(
        name: &str,
        max_genes: usize,
        max_cancer_types: usize,
        min_frequency: f64,
        description: &str,
    ) -> Result<Self> {
        ViewTierBuilder::default()
            .name(name)
            .max_genes(max_genes)
            .max_cancer_types(max_cancer_types)
            .min_frequency(min_frequency)
            .description(description)
            .build()
            .map_err(|e| HeatmapError::InvalidTier(e.to_string()))
    }

    /// The same tier with a different frequency floor
    pub fn with_min_frequency(&self, min_frequency: f64) -> Self {
        Self {
            min_frequency,
            ..self.clone()
        }
    }

    pub fn is_unbounded(&self) -> bool {
        self.max_genes == UNBOUNDED && self.max_cancer_types == UNBOUNDED
    }
}

/// An ordered, immutable table of tiers, from least to most detailed.
/// Never empty.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "UncheckedTiers")]
pub struct ViewTiers {
    tiers: Vec<ViewTier>,
}

#[derive(Deserialize)]
struct UncheckedTiers {
    tiers: Vec<ViewTier>,
}

impl TryFrom<UncheckedTiers> for ViewTiers {
    type Error = HeatmapError;

    fn try_from(raw: UncheckedTiers) -> Result<Self> {
        ViewTiers::new(raw.tiers)
    }
}

impl Default for ViewTiers {
    fn default() -> Self {
        let tier = |name: &str, genes, cancers, floor, description: &str| ViewTier {
            name: name.to_string(),
            max_genes: genes,
            max_cancer_types: cancers,
            min_frequency: floor,
            description: description.to_string(),
        };
        Self {
            tiers: vec![
                tier("overview", 20, 10, 0.05, "Top genes and cancer types only"),
                tier("standard", 50, 20, 0.01, "Common hotspots"),
                tier("detailed", 150, 40, 0.001, "Most recurrent mutations"),
                tier("complete", UNBOUNDED, UNBOUNDED, 0.0, "Every record"),
            ],
        }
    }
}

impl ViewTiers {
    /// Build a table from an explicit list. Names must be unique and the list non-empty.
    pub fn new(tiers: Vec<ViewTier>) -> Result<Self> {
        if tiers.is_empty() {
            return Err(HeatmapError::InvalidTier(
                "tier table must contain at least one tier".to_string(),
            ));
        }
        let mut seen = FxHashSet::default();
        for tier in &tiers {
            if !seen.insert(tier.name.as_str()) {
                return Err(HeatmapError::InvalidTier(format!(
                    "duplicate tier name '{}'",
                    tier.name
                )));
            }
        }
        Ok(Self { tiers })
    }

    pub fn get(&self, name: &str) -> Result<&ViewTier> {
        self.tiers
            .iter()
            .find(|t| t.name == name)
            .ok_or_else(|| HeatmapError::UnknownTier(name.to_string()))
    }

    pub fn iter(&self) -> impl Iterator<Item = &ViewTier> {
        self.tiers.iter()
    }

    pub fn len(&self) -> usize {
        self.tiers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tiers.is_empty()
    }

    pub fn names(&self) -> Vec<&str> {
        self.tiers.iter().map(|t| t.name.as_str()).collect()
    }

    /// The same table with every tier's floor replaced by `threshold`, if set.
    ///
    /// Use this before [`ViewTiers::recommend`] when the run will override
    /// the floor, so tiers are ranked on the matrix that is actually rendered.
    pub fn with_frequency_threshold(&self, threshold: Option<f64>) -> Result<Self> {
        match threshold {
            None => Ok(self.clone()),
            Some(t) if t.is_finite() && t >= 0.0 => Ok(Self {
                tiers: self.tiers.iter().map(|tier| tier.with_min_frequency(t)).collect(),
            }),
            Some(t) => Err(HeatmapError::ConfigError(format!(
                "frequency threshold must be a finite value >= 0, got {t}"
            ))),
        }
    }

    /// Pick the most detailed tier whose filtered matrix still fits the viewport.
    ///
    /// Each tier is run through the ranking filter and the resulting axis
    /// cardinalities are checked with `sizing`. Falls back to the first
    /// (least detailed) tier when none is feasible. Returns `None` only for
    /// an empty table.
    pub fn recommend(
        &self,
        records: &[MutationRecord],
        hidden_genes: &FxHashSet<String>,
        hidden_cancer_types: &FxHashSet<String>,
        viewport: Viewport,
        sizing: &CellSizingEngine,
    ) -> Option<&ViewTier> {
        let mut best = self.tiers.first()?;
        for tier in &self.tiers {
            let filtered =
                RankingFilter::new(tier).filter(records, hidden_genes, hidden_cancer_types);
            let (genes, cancer_types) = axis_labels(&filtered);
            let cell_sizing = sizing.size(viewport, genes.len(), cancer_types.len());
            debug!(
                "Tier '{}': {} genes x {} cancer types, feasible = {}",
                tier.name,
                genes.len(),
                cancer_types.len(),
                cell_sizing.feasible
            );
            if cell_sizing.feasible {
                best = tier;
            }
        }
        Some(best)
    }
}

impl<'a> IntoIterator for &'a ViewTiers {
    type Item = &'a ViewTier;
    type IntoIter = std::slice::Iter<'a, ViewTier>;

    fn into_iter(self) -> Self::IntoIter {
        self.tiers.iter()
    }
}
