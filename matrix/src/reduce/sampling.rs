use crate::record::MutationRecord;
use rand::SeedableRng;
use rand::rngs::StdRng;
use tracing::debug;

/// Default RNG seed, so two runs over the same input sample identically
pub const DEFAULT_SEED: u64 = 0x5EED_0F_4EA7;

/// Frequency band used by the stratified sampler
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrequencyBand {
    /// `f >= 0.01`
    High,
    /// `0.001 <= f < 0.01`
    Medium,
    /// `f < 0.001`
    Low,
}

impl FrequencyBand {
    pub const HIGH_FLOOR: f64 = 0.01;
    pub const MEDIUM_FLOOR: f64 = 0.001;

    pub fn of(frequency: f64) -> Self {
        if frequency >= Self::HIGH_FLOOR {
            FrequencyBand::High
        } else if frequency >= Self::MEDIUM_FLOOR {
            FrequencyBand::Medium
        } else {
            FrequencyBand::Low
        }
    }
}

/// Configuration for stratified sampling
#[derive(Debug, Clone)]
pub struct SamplingConfig {
    /// Upper bound on the number of records returned
    pub max_samples: usize,
    /// Seed for the sampler's RNG
    pub seed: u64,
}

impl Default for SamplingConfig {
    fn default() -> Self {
        Self {
            max_samples: 5000,
            seed: DEFAULT_SEED,
        }
    }
}

/// Per-band target sizes after clamping to what each band holds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BandAllocation {
    pub high: usize,
    pub medium: usize,
    pub low: usize,
}

impl BandAllocation {
    /// 60% of `max_samples` to the high band, 30% to medium, the remainder to low,
    /// each clamped to the band's actual size.
    ///
    /// A band that holds fewer records than its target leaves the shortfall
    /// unused; it is not handed to the other bands.
    pub fn plan(max_samples: usize, high: usize, medium: usize, low: usize) -> Self {
        let high_target = max_samples * 6 / 10;
        let medium_target = max_samples * 3 / 10;
        let low_target = max_samples - high_target - medium_target;
        Self {
            high: high_target.min(high),
            medium: medium_target.min(medium),
            low: low_target.min(low),
        }
    }

    pub fn total(&self) -> usize {
        self.high + self.medium + self.low
    }
}

/// Bound the number of records by sampling within frequency bands.
///
/// When `records.len() <= max_samples` the input is returned unchanged.
/// Otherwise each band is sampled uniformly without replacement to its
/// [`BandAllocation`]. The output lists the high band, then medium, then low;
/// within a band, records keep their input order.
pub fn stratified_sample(records: &[MutationRecord], config: &SamplingConfig) -> Vec<MutationRecord> {
    if records.len() <= config.max_samples {
        return records.to_vec();
    }

    let mut high = Vec::new();
    let mut medium = Vec::new();
    let mut low = Vec::new();
    for record in records {
        match FrequencyBand::of(record.effective_frequency) {
            FrequencyBand::High => high.push(record),
            FrequencyBand::Medium => medium.push(record),
            FrequencyBand::Low => low.push(record),
        }
    }

    let allocation = BandAllocation::plan(config.max_samples, high.len(), medium.len(), low.len());
    let mut rng = StdRng::seed_from_u64(config.seed);

    let mut sampled = Vec::with_capacity(allocation.total());
    for (band, amount) in [
        (&high, allocation.high),
        (&medium, allocation.medium),
        (&low, allocation.low),
    ] {
        sampled.extend(sample_band(band, amount, &mut rng));
    }

    debug!(
        "Stratified sampling: {} -> {} records (high {}/{}, medium {}/{}, low {}/{})",
        records.len(),
        sampled.len(),
        allocation.high,
        high.len(),
        allocation.medium,
        medium.len(),
        allocation.low,
        low.len()
    );

    sampled
}

/// Convenience wrapper using the default seed
pub fn sample(records: &[MutationRecord], max_samples: usize) -> Vec<MutationRecord> {
    stratified_sample(
        records,
        &SamplingConfig {
            max_samples,
            ..Default::default()
        },
    )
}

fn sample_band(band: &[&MutationRecord], amount: usize, rng: &mut StdRng) -> Vec<MutationRecord> {
    if amount >= band.len() {
        return band.iter().map(|&r| r.clone()).collect();
    }
    let mut indices = rand::seq::index::sample(rng, band.len(), amount).into_vec();
    indices.sort_unstable();
    indices.into_iter().map(|i| band[i].clone()).collect()
}
