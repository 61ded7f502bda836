use crate::record::MutationRecord;
use crate::tier::ViewTier;
use itertools::Itertools;
use rustc_hash::{FxHashMap, FxHashSet};
use tracing::debug;

/// Accumulated ranking score for one axis value
#[derive(Debug, Clone, Copy, Default, PartialEq)]
struct AxisScore {
    total_count: u64,
    max_frequency: f64,
}

impl AxisScore {
    fn add(&mut self, record: &MutationRecord) {
        self.total_count += record.mutation_count;
        self.max_frequency = self.max_frequency.max(record.effective_frequency);
    }

    /// `Σ mutation_count × max(effective_frequency)`
    fn score(&self) -> f64 {
        self.total_count as f64 * self.max_frequency
    }
}

/// Keeps the top-ranked genes and cancer types of a tier.
///
/// # Algorithm
/// 1. Drop records whose gene or cancer type is hidden, or whose effective
///    frequency is below the tier's `min_frequency`
/// 2. Score each gene as `Σ mutation_count × max(effective_frequency)` over its
///    surviving records and keep the top `max_genes` (ties: ascending symbol)
/// 3. Score and keep cancer types the same way, over the same survivors
/// 4. Keep a record only when its gene **and** its cancer type were both kept
///
/// Step 4 is an intersection. A record whose gene ranks first can still be
/// dropped when its cancer type did not make the cut.
#[derive(Debug, Clone)]
pub struct RankingFilter<'t> {
    tier: &'t ViewTier,
}

impl<'t> RankingFilter<'t> {
    pub fn new(tier: &'t ViewTier) -> Self {
        Self { tier }
    }

    /// Filter `records`, preserving their input order
    pub fn filter(
        &self,
        records: &[MutationRecord],
        hidden_genes: &FxHashSet<String>,
        hidden_cancer_types: &FxHashSet<String>,
    ) -> Vec<MutationRecord> {
        if records.is_empty() {
            return Vec::new();
        }

        let survivors: Vec<&MutationRecord> = records
            .iter()
            .filter(|r| {
                !hidden_genes.contains(&r.gene)
                    && !hidden_cancer_types.contains(&r.cancer_type)
                    && r.effective_frequency >= self.tier.min_frequency
            })
            .collect();

        let top_genes = top_ranked(&survivors, |r| r.gene.as_str(), self.tier.max_genes);
        let top_cancer_types = top_ranked(
            &survivors,
            |r| r.cancer_type.as_str(),
            self.tier.max_cancer_types,
        );

        let retained: Vec<MutationRecord> = survivors
            .into_iter()
            .filter(|r| {
                top_genes.contains(r.gene.as_str())
                    && top_cancer_types.contains(r.cancer_type.as_str())
            })
            .cloned()
            .collect();

        debug!(
            "Ranking filter '{}': {} -> {} records ({} genes, {} cancer types retained)",
            self.tier.name,
            records.len(),
            retained.len(),
            top_genes.len(),
            top_cancer_types.len()
        );

        retained
    }
}

/// Convenience wrapper for [`RankingFilter::filter`]
pub fn filter(
    records: &[MutationRecord],
    tier: &ViewTier,
    hidden_genes: &FxHashSet<String>,
    hidden_cancer_types: &FxHashSet<String>,
) -> Vec<MutationRecord> {
    RankingFilter::new(tier).filter(records, hidden_genes, hidden_cancer_types)
}

/// Rank the values of one axis and return the top `limit` of them.
///
/// Ordering is by descending score, then ascending value for determinism.
pub fn rank_axis<'r>(
    records: &[&'r MutationRecord],
    key: impl Fn(&'r MutationRecord) -> &'r str,
) -> Vec<(&'r str, f64)> {
    let mut scores: FxHashMap<&'r str, AxisScore> = FxHashMap::default();
    for &record in records {
        scores.entry(key(record)).or_default().add(record);
    }
    scores
        .into_iter()
        .map(|(value, score)| (value, score.score()))
        .sorted_by(|(a_value, a_score), (b_value, b_score)| {
            b_score.total_cmp(a_score).then_with(|| a_value.cmp(b_value))
        })
        .collect()
}

fn top_ranked<'r>(
    records: &[&'r MutationRecord],
    key: impl Fn(&'r MutationRecord) -> &'r str,
    limit: usize,
) -> FxHashSet<&'r str> {
    rank_axis(records, key)
        .into_iter()
        .take(limit)
        .map(|(value, _)| value)
        .collect()
}

/// Distinct gene and cancer-type labels of `records`, each sorted ascending
pub fn axis_labels(records: &[MutationRecord]) -> (Vec<String>, Vec<String>) {
    let genes = records
        .iter()
        .map(|r| r.gene.as_str())
        .sorted_unstable()
        .dedup()
        .map(str::to_string)
        .collect();
    let cancer_types = records
        .iter()
        .map(|r| r.cancer_type.as_str())
        .sorted_unstable()
        .dedup()
        .map(str::to_string)
        .collect();
    (genes, cancer_types)
}
