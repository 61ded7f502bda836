pub mod distribution;

pub use distribution::{DistributionAnalyzer, DistributionShape, DistributionStats, Percentiles};

use crate::error::{HeatmapError, Result};

/// Nearest-rank percentile of an ascending-sorted slice.
///
/// Returns the element at `ceil(p * n) - 1`, clamped to `[0, n - 1]`.
/// No interpolation between neighbours is performed.
///
/// # Arguments
/// * `sorted` - Values sorted ascending, non-empty
/// * `p` - Fraction in `[0, 1]` (e.g. 0.95 for the 95th percentile)
pub fn percentile_nearest_rank(sorted: &[f64], p: f64) -> Result<f64> {
    if sorted.is_empty() {
        return Err(HeatmapError::EmptyInput);
    }
    Ok(sorted[nearest_rank_index(sorted.len(), p)])
}

/// Zero-based index that [`percentile_nearest_rank`] reads for `n` values
pub fn nearest_rank_index(n: usize, p: f64) -> usize {
    let rank = (p * n as f64).ceil() as i64 - 1;
    rank.clamp(0, n.saturating_sub(1) as i64) as usize
}

/// Median of an ascending-sorted slice (mean of the two middle values for even lengths)
pub fn median_sorted(sorted: &[f64]) -> Result<f64> {
    if sorted.is_empty() {
        return Err(HeatmapError::EmptyInput);
    }
    let len = sorted.len();
    let median_value = if len % 2 == 0 {
        (sorted[len / 2 - 1] + sorted[len / 2]) / 2.0
    } else {
        sorted[len / 2]
    };
    Ok(median_value)
}

/// Sort a copy of `data` ascending. NaNs compare equal to everything.
pub fn sorted_copy(data: &[f64]) -> Vec<f64> {
    let mut sorted = data.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    sorted
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_nearest_rank_matches_definition() {
        let sorted: Vec<f64> = (1..=10).map(f64::from).collect();
        // ceil(0.25 * 10) - 1 = 2
        assert_relative_eq!(percentile_nearest_rank(&sorted, 0.25).unwrap(), 3.0);
        // ceil(0.5 * 10) - 1 = 4
        assert_relative_eq!(percentile_nearest_rank(&sorted, 0.5).unwrap(), 5.0);
        // ceil(0.99 * 10) - 1 = 9
        assert_relative_eq!(percentile_nearest_rank(&sorted, 0.99).unwrap(), 10.0);
    }

    #[test]
    fn test_nearest_rank_clamps_low() {
        let sorted = vec![4.0, 8.0];
        assert_relative_eq!(percentile_nearest_rank(&sorted, 0.0).unwrap(), 4.0);
        assert_relative_eq!(percentile_nearest_rank(&sorted, 0.01).unwrap(), 4.0);
    }

    #[test]
    fn test_rank_index_tails() {
        // five values: 1st and 5th percentiles both read the first element
        assert_eq!(nearest_rank_index(5, 0.01), 0);
        assert_eq!(nearest_rank_index(5, 0.05), 0);
        assert_eq!(nearest_rank_index(5, 0.95), 4);
        assert_eq!(nearest_rank_index(5, 0.99), 4);

        assert_eq!(nearest_rank_index(200, 0.05), 9);
        assert_eq!(nearest_rank_index(200, 0.99), 197);
        assert_eq!(nearest_rank_index(0, 0.5), 0);
    }

    #[test]
    fn test_median_even_and_odd() {
        assert_relative_eq!(median_sorted(&[1.0, 2.0, 3.0, 4.0]).unwrap(), 2.5);
        assert_relative_eq!(median_sorted(&[1.0, 2.0, 3.0]).unwrap(), 2.0);
    }

    #[test]
    fn test_empty_inputs_error() {
        assert!(matches!(
            percentile_nearest_rank(&[], 0.5),
            Err(HeatmapError::EmptyInput)
        ));
        assert!(matches!(median_sorted(&[]), Err(HeatmapError::EmptyInput)));
    }
}
