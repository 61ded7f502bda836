use crate::error::{HeatmapError, Result};
use crate::stats::{median_sorted, nearest_rank_index, percentile_nearest_rank, sorted_copy};
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumCount, EnumIter, EnumString};

/// Heuristic shape of a frequency distribution.
///
/// Used only to select color-scale breakpoints. The classification is a set of
/// percentile-ratio rules, not a statistical test.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[derive(Display, EnumString, EnumIter, EnumCount)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
#[cfg_attr(feature = "typescript", derive(ts_rs::TS))]
#[cfg_attr(feature = "typescript", ts(export))]
pub enum DistributionShape {
    Normal,
    SkewedRight,
    SkewedLeft,
    Bimodal,
    Uniform,
}

/// Nearest-rank percentiles reported by [`DistributionAnalyzer`]
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "typescript", derive(ts_rs::TS))]
#[cfg_attr(feature = "typescript", ts(export))]
pub struct Percentiles {
    pub p1: f64,
    pub p5: f64,
    pub p10: f64,
    pub p25: f64,
    pub p50: f64,
    pub p75: f64,
    pub p90: f64,
    pub p95: f64,
    pub p99: f64,
}

impl Percentiles {
    pub const FRACTIONS: [f64; 9] = [0.01, 0.05, 0.10, 0.25, 0.50, 0.75, 0.90, 0.95, 0.99];

    fn from_sorted(sorted: &[f64]) -> Result<Self> {
        let mut values = [0.0; 9];
        for (slot, &p) in values.iter_mut().zip(Self::FRACTIONS.iter()) {
            *slot = percentile_nearest_rank(sorted, p)?;
        }
        let [p1, p5, p10, p25, p50, p75, p90, p95, p99] = values;
        Ok(Self {
            p1,
            p5,
            p10,
            p25,
            p50,
            p75,
            p90,
            p95,
            p99,
        })
    }

    /// Percentile values in ascending order of rank
    pub fn as_array(&self) -> [f64; 9] {
        [
            self.p1, self.p5, self.p10, self.p25, self.p50, self.p75, self.p90, self.p95,
            self.p99,
        ]
    }
}

/// Summary statistics of a numeric sample
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "typescript", derive(ts_rs::TS))]
#[cfg_attr(feature = "typescript", ts(export))]
pub struct DistributionStats {
    pub count: usize,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub median: f64,
    /// Population standard deviation
    pub std: f64,
    pub percentiles: Percentiles,
    /// Pearson's second skewness coefficient, `3 * (mean - median) / std`
    pub skewness: f64,
    /// Excess kurtosis
    pub kurtosis: f64,
    pub iqr: f64,
    pub shape: DistributionShape,
}

impl DistributionShape {
    /// Classify a distribution of `count` values from its percentiles and skewness.
    ///
    /// Rules, in priority order:
    /// 1. `Uniform` when the 5–95 span exceeds 80% of the 1–99 span. The rule is
    ///    skipped when `count` is so small that p1 and p5 read the same element
    ///    and p95 and p99 read the same element: the two spans are then one
    ///    span, and any sample with a spread passes. Tied values at the tails of
    ///    a larger sample do not skip the rule.
    /// 2. `Bimodal` when the IQR is more than twice both adjacent inter-decile gaps
    ///    (`p25 - p10` and `p90 - p75`).
    /// 3. `Normal` when `|skewness| < 0.5`.
    /// 4. `SkewedRight` for positive skewness, otherwise `SkewedLeft`.
    pub fn classify(p: &Percentiles, skewness: f64, count: usize) -> Self {
        let rank = |fraction| nearest_rank_index(count, fraction);
        let ranks_coincide = rank(0.01) == rank(0.05) && rank(0.95) == rank(0.99);
        if !ranks_coincide && p.p95 - p.p5 > 0.8 * (p.p99 - p.p1) {
            return DistributionShape::Uniform;
        }

        let iqr = p.p75 - p.p25;
        if iqr > 2.0 * (p.p25 - p.p10) && iqr > 2.0 * (p.p90 - p.p75) {
            return DistributionShape::Bimodal;
        }

        if skewness.abs() < 0.5 {
            DistributionShape::Normal
        } else if skewness > 0.0 {
            DistributionShape::SkewedRight
        } else {
            DistributionShape::SkewedLeft
        }
    }
}

/// Computes [`DistributionStats`] over a sample.
#[derive(Debug, Clone, Copy, Default)]
pub struct DistributionAnalyzer;

impl DistributionAnalyzer {
    pub fn new() -> Self {
        Self
    }

    /// Analyze `values`.
    ///
    /// # Errors
    /// * [`HeatmapError::EmptyInput`] when `values` is empty
    /// * [`HeatmapError::NonFiniteValue`] when any value is NaN or infinite
    ///
    /// A constant sample is valid: skewness and kurtosis are reported as 0.
    pub fn analyze(&self, values: &[f64]) -> Result<DistributionStats> {
        if values.is_empty() {
            return Err(HeatmapError::EmptyInput);
        }
        if let Some((index, &value)) = values.iter().enumerate().find(|(_, v)| !v.is_finite()) {
            return Err(HeatmapError::NonFiniteValue { index, value });
        }

        let sorted = sorted_copy(values);
        let n = sorted.len() as f64;

        let min = sorted[0];
        let max = sorted[sorted.len() - 1];
        let median = median_sorted(&sorted)?;
        // A constant sample must report exactly zero spread; summation error
        // would otherwise leave a tiny std and an arbitrary skewness.
        let (mean, std) = if min == max {
            (min, 0.0)
        } else {
            let mean = sorted.iter().sum::<f64>() / n;
            let variance = sorted.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / n;
            (mean, variance.sqrt())
        };

        let percentiles = Percentiles::from_sorted(&sorted)?;

        let (skewness, kurtosis) = if std > 0.0 {
            let fourth = sorted.iter().map(|x| (x - mean).powi(4)).sum::<f64>() / n;
            (3.0 * (mean - median) / std, fourth / std.powi(4) - 3.0)
        } else {
            (0.0, 0.0)
        };

        let shape = DistributionShape::classify(&percentiles, skewness, sorted.len());

        Ok(DistributionStats {
            count: sorted.len(),
            min,
            max,
            mean,
            median,
            std,
            percentiles,
            skewness,
            kurtosis,
            iqr: percentiles.p75 - percentiles.p25,
            shape,
        })
    }
}

/// Convenience wrapper for [`DistributionAnalyzer::analyze`]
pub fn analyze(values: &[f64]) -> Result<DistributionStats> {
    DistributionAnalyzer.analyze(values)
}
