//! Distribution-adaptive color scale.
//!
//! Breakpoints are derived from the shape of the *full* frequency population,
//! so the densest part of the distribution gets the most color resolution.
//! The scale is split into five bands bounded by
//! `min, very_low, low, medium, high, max`; band `i` interpolates between
//! palette stops `i` and `i + 1` in linear RGB with an easing exponent.

use crate::error::Result;
use crate::render::palette::{ColorScheme, Rgb, STOP_COUNT};
use crate::stats::{DistributionAnalyzer, DistributionShape, DistributionStats};
use serde::{Deserialize, Serialize};
use strum::EnumCount;
use tracing::debug;

/// Easing exponent per band. Below 1 front-loads the change within a band,
/// above 1 holds it back.
pub const BAND_EASING: [f64; 5] = [1.0, 0.8, 0.7, 0.8, 1.2];

/// Inner band edges. The outer edges are the population's `min` and `max`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[cfg_attr(feature = "typescript", derive(ts_rs::TS))]
#[cfg_attr(feature = "typescript", ts(export))]
pub struct Breakpoints {
    pub very_low: f64,
    pub low: f64,
    pub medium: f64,
    pub high: f64,
}

type BreakpointRule = fn(&DistributionStats) -> Breakpoints;

/// Breakpoint derivation per distribution shape, in declaration order so that
/// `shape as usize` indexes the entry for `shape`
const BREAKPOINT_RULES: [(DistributionShape, BreakpointRule); DistributionShape::COUNT] = [
    (DistributionShape::Normal, normal_breakpoints),
    (DistributionShape::SkewedRight, skewed_right_breakpoints),
    (DistributionShape::SkewedLeft, skewed_left_breakpoints),
    (DistributionShape::Bimodal, bimodal_breakpoints),
    (DistributionShape::Uniform, uniform_breakpoints),
];

fn normal_breakpoints(s: &DistributionStats) -> Breakpoints {
    let at = |sigmas: f64| (s.mean + sigmas * s.std).clamp(s.min, s.max);
    Breakpoints {
        very_low: at(-1.5),
        low: at(-0.5),
        medium: at(0.5),
        high: at(1.5),
    }
}

fn skewed_right_breakpoints(s: &DistributionStats) -> Breakpoints {
    let p = &s.percentiles;
    Breakpoints {
        very_low: p.p5,
        low: p.p25,
        medium: p.p75,
        high: p.p90,
    }
}

fn skewed_left_breakpoints(s: &DistributionStats) -> Breakpoints {
    let p = &s.percentiles;
    Breakpoints {
        very_low: p.p10,
        low: p.p25,
        medium: p.p75,
        high: p.p95,
    }
}

fn bimodal_breakpoints(s: &DistributionStats) -> Breakpoints {
    let p = &s.percentiles;
    Breakpoints {
        very_low: p.p10,
        low: p.p25,
        medium: p.p75,
        high: p.p90,
    }
}

fn uniform_breakpoints(s: &DistributionStats) -> Breakpoints {
    let fifth = |k: f64| s.min + (s.max - s.min) * k / 5.0;
    Breakpoints {
        very_low: fifth(1.0),
        low: fifth(2.0),
        medium: fifth(3.0),
        high: fifth(4.0),
    }
}

impl Breakpoints {
    /// Breakpoints for the shape recorded in `stats`
    pub fn for_stats(stats: &DistributionStats) -> Self {
        let (shape, rule) = BREAKPOINT_RULES[stats.shape as usize];
        debug_assert_eq!(shape, stats.shape);
        rule(stats)
    }
}

/// Maps frequencies to colors using breakpoints adapted to the population
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AdaptiveColorScale {
    stats: DistributionStats,
    breakpoints: Breakpoints,
    scheme: ColorScheme,
    stops: [Rgb; STOP_COUNT],
}

impl AdaptiveColorScale {
    /// Build a scale from the full, unsampled frequency population.
    ///
    /// # Errors
    /// Propagates [`crate::HeatmapError::EmptyInput`] when `values` is empty.
    pub fn build(values: &[f64], scheme: ColorScheme) -> Result<Self> {
        let stats = DistributionAnalyzer::new().analyze(values)?;
        let breakpoints = Breakpoints::for_stats(&stats);
        debug!(
            "Color scale over {} values: shape = {}, breakpoints = {:?}",
            stats.count, stats.shape, breakpoints
        );
        Ok(Self {
            stats,
            breakpoints,
            scheme,
            stops: scheme.stops(),
        })
    }

    pub fn stats(&self) -> &DistributionStats {
        &self.stats
    }

    pub fn breakpoints(&self) -> &Breakpoints {
        &self.breakpoints
    }

    pub fn scheme(&self) -> ColorScheme {
        self.scheme
    }

    pub fn shape(&self) -> DistributionShape {
        self.stats.shape
    }

    /// All six band edges, `min` through `max`
    pub fn edges(&self) -> [f64; 6] {
        let b = &self.breakpoints;
        [self.stats.min, b.very_low, b.low, b.medium, b.high, self.stats.max]
    }

    fn clamp_value(&self, value: f64) -> f64 {
        if value.is_nan() {
            self.stats.min
        } else {
            value.clamp(self.stats.min, self.stats.max)
        }
    }

    /// Index (0..5) of the band `value` falls into after clamping.
    /// A value equal to a breakpoint belongs to the lower band.
    pub fn band_of(&self, value: f64) -> usize {
        let value = self.clamp_value(value);
        let edges = self.edges();
        (0..BAND_EASING.len())
            .find(|&i| value <= edges[i + 1])
            .unwrap_or(BAND_EASING.len() - 1)
    }

    /// Color for `value`. Values outside `[min, max]` take the nearest end color.
    pub fn color(&self, value: f64) -> Rgb {
        let value = self.clamp_value(value);
        let band = self.band_of(value);
        let edges = self.edges();
        let (lower, upper) = (edges[band], edges[band + 1]);
        let width = upper - lower;
        let t = if width > 0.0 {
            ((value - lower) / width).clamp(0.0, 1.0)
        } else {
            0.0
        };
        let eased = t.powf(BAND_EASING[band]);
        self.stops[band].lerp(self.stops[band + 1], eased)
    }

    /// `n` evenly spaced `(value, color)` pairs from `min` to `max`, for legends
    pub fn legend(&self, n: usize) -> Vec<(f64, Rgb)> {
        match n {
            0 => Vec::new(),
            1 => vec![(self.stats.min, self.color(self.stats.min))],
            _ => (0..n)
                .map(|i| {
                    let value = self.stats.min
                        + (self.stats.max - self.stats.min) * i as f64 / (n - 1) as f64;
                    (value, self.color(value))
                })
                .collect(),
        }
    }

    /// Consume the scale into a plain mapping function
    pub fn into_fn(self) -> impl Fn(f64) -> Rgb {
        move |value| self.color(value)
    }
}

/// Build a value-to-color function from the full frequency population
pub fn build(values: &[f64], scheme: ColorScheme) -> Result<impl Fn(f64) -> Rgb + use<>> {
    Ok(AdaptiveColorScale::build(values, scheme)?.into_fn())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::HeatmapError;
    use approx::assert_relative_eq;

    fn evenly_spaced() -> Vec<f64> {
        (0..=1000).map(|i| i as f64 / 1000.0).collect()
    }

    #[test]
    fn test_empty_population_errors() {
        assert!(matches!(
            AdaptiveColorScale::build(&[], ColorScheme::Heat),
            Err(HeatmapError::EmptyInput)
        ));
    }

    #[test]
    fn test_uniform_breakpoints_are_fifths() {
        let scale = AdaptiveColorScale::build(&evenly_spaced(), ColorScheme::Heat).unwrap();
        assert_eq!(scale.shape(), DistributionShape::Uniform);
        let b = scale.breakpoints();
        assert_relative_eq!(b.very_low, 0.2, epsilon = 1e-12);
        assert_relative_eq!(b.low, 0.4, epsilon = 1e-12);
        assert_relative_eq!(b.medium, 0.6, epsilon = 1e-12);
        assert_relative_eq!(b.high, 0.8, epsilon = 1e-12);
    }

    #[test]
    fn test_end_colors_and_clamping() {
        let scale = AdaptiveColorScale::build(&evenly_spaced(), ColorScheme::Heat).unwrap();
        let stops = ColorScheme::Heat.stops();
        assert_eq!(scale.color(0.0), stops[0]);
        assert_eq!(scale.color(1.0), stops[5]);
        assert_eq!(scale.color(-3.0), stops[0]);
        assert_eq!(scale.color(42.0), stops[5]);
        assert_eq!(scale.color(f64::NAN), stops[0]);
    }

    #[test]
    fn test_band_boundaries_hit_stops() {
        let scale = AdaptiveColorScale::build(&evenly_spaced(), ColorScheme::Heat).unwrap();
        let stops = ColorScheme::Heat.stops();
        let edges = scale.edges();
        for band in 0..5 {
            assert_eq!(scale.band_of(edges[band + 1]), band);
            assert_eq!(scale.color(edges[band + 1]), stops[band + 1]);
        }
    }

    #[test]
    fn test_band_easing_exponents() {
        assert_eq!(BAND_EASING, [1.0, 0.8, 0.7, 0.8, 1.2]);

        let scale = AdaptiveColorScale::build(&evenly_spaced(), ColorScheme::Heat).unwrap();
        let stops = ColorScheme::Heat.stops();
        let edges = scale.edges();
        for (band, exponent) in [1.0, 0.8, 0.7, 0.8, 1.2].into_iter().enumerate() {
            let (lower, upper) = (edges[band], edges[band + 1]);
            let value = lower + 0.25 * (upper - lower);
            assert_eq!(scale.band_of(value), band);
            let t = (value - lower) / (upper - lower);
            let expected = stops[band].lerp(stops[band + 1], t.powf(exponent));
            assert_eq!(scale.color(value), expected, "band {band}");
        }
    }

    #[test]
    fn test_middle_band_easing() {
        let scale = AdaptiveColorScale::build(&evenly_spaced(), ColorScheme::Heat).unwrap();
        let stops = ColorScheme::Heat.stops();
        let edges = scale.edges();
        let mid = (edges[2] + edges[3]) / 2.0;
        assert_eq!(scale.band_of(mid), 2);
        let expected = stops[2].lerp(stops[3], 0.5f64.powf(0.7));
        assert_eq!(scale.color(mid), expected);
    }

    fn stats_with_shape(values: &[f64], shape: DistributionShape) -> DistributionStats {
        let mut stats = crate::stats::distribution::analyze(values).unwrap();
        stats.shape = shape;
        stats
    }

    #[test]
    fn test_every_shape_has_its_own_rule() {
        use strum::IntoEnumIterator;
        for shape in DistributionShape::iter() {
            assert_eq!(BREAKPOINT_RULES[shape as usize].0, shape);
        }
    }

    #[test]
    fn test_normal_breakpoints_are_sigma_offsets() {
        let s = stats_with_shape(&evenly_spaced(), DistributionShape::Normal);
        let b = Breakpoints::for_stats(&s);
        assert_relative_eq!(b.very_low, s.mean - 1.5 * s.std, epsilon = 1e-12);
        assert_relative_eq!(b.low, s.mean - 0.5 * s.std, epsilon = 1e-12);
        assert_relative_eq!(b.medium, s.mean + 0.5 * s.std, epsilon = 1e-12);
        assert_relative_eq!(b.high, s.mean + 1.5 * s.std, epsilon = 1e-12);
    }

    #[test]
    fn test_skewed_left_breakpoints() {
        let s = stats_with_shape(&evenly_spaced(), DistributionShape::SkewedLeft);
        let p = s.percentiles;
        let b = Breakpoints::for_stats(&s);
        assert_eq!((b.very_low, b.low, b.medium, b.high), (p.p10, p.p25, p.p75, p.p95));
    }

    #[test]
    fn test_bimodal_breakpoints() {
        let s = stats_with_shape(&evenly_spaced(), DistributionShape::Bimodal);
        let p = s.percentiles;
        let b = Breakpoints::for_stats(&s);
        assert_eq!((b.very_low, b.low, b.medium, b.high), (p.p10, p.p25, p.p75, p.p90));
    }

    #[test]
    fn test_skewed_right_uses_percentile_table() {
        let mut values = vec![0.01; 80];
        values.extend((1..=20).map(|i| i as f64 / 20.0));
        let scale = AdaptiveColorScale::build(&values, ColorScheme::Viridis).unwrap();
        assert_eq!(scale.shape(), DistributionShape::SkewedRight);
        let p = scale.stats().percentiles;
        let b = scale.breakpoints();
        assert_eq!(
            (b.very_low, b.low, b.medium, b.high),
            (p.p5, p.p25, p.p75, p.p90)
        );
    }

    #[test]
    fn test_normal_breakpoints_clamped_to_range() {
        let stats = crate::stats::distribution::analyze(&[0.4, 0.5, 0.5, 0.5, 0.6]).unwrap();
        let b = normal_breakpoints(&stats);
        assert!(b.very_low >= stats.min && b.high <= stats.max);
        assert!(b.very_low <= b.low && b.low <= b.medium && b.medium <= b.high);
    }

    #[test]
    fn test_normal_breakpoints_clamp_at_min() {
        // mean 0.2, std 0.4: mean - 1.5 std falls below the minimum
        let s = stats_with_shape(&[0.0, 0.0, 0.0, 0.0, 1.0], DistributionShape::Normal);
        let b = Breakpoints::for_stats(&s);
        assert_eq!(b.very_low, 0.0);
        assert_relative_eq!(b.low, 0.0, epsilon = 1e-12);
        assert_relative_eq!(b.medium, 0.4, epsilon = 1e-12);
        assert_relative_eq!(b.high, 0.8, epsilon = 1e-12);
    }

    #[test]
    fn test_constant_population_is_single_color() {
        let scale = AdaptiveColorScale::build(&[0.3; 10], ColorScheme::Heat).unwrap();
        let c = scale.color(0.3);
        assert_eq!(scale.color(0.0), c);
        assert_eq!(scale.color(1.0), c);
    }

    #[test]
    fn test_legend() {
        let scale = AdaptiveColorScale::build(&evenly_spaced(), ColorScheme::Heat).unwrap();
        let legend = scale.legend(6);
        assert_eq!(legend.len(), 6);
        assert_relative_eq!(legend[0].0, 0.0);
        assert_relative_eq!(legend[5].0, 1.0);
        assert!(scale.legend(0).is_empty());
    }

    #[test]
    fn test_build_returns_function() {
        let color = build(&evenly_spaced(), ColorScheme::Heat).unwrap();
        assert_eq!(color(1.0), ColorScheme::Heat.stops()[5]);
    }

    #[test]
    fn test_built_function_outlives_population() {
        let color = {
            let values = evenly_spaced();
            build(&values, ColorScheme::Viridis).unwrap()
        };
        assert_eq!(color(0.0), ColorScheme::Viridis.stops()[0]);
    }
}
