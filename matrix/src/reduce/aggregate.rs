//! Folding records into one cell per (gene, cancer type).
//!
//! Every record first becomes a single-record [`AggregatedCell`]; cells with the
//! same key are then combined with [`AggregatedCell::merge`]. The merge is
//! associative, and all summary values except `positions` order and the
//! representative tie-break are independent of input order. Ties on the
//! representative keep the cell that came first, so the sequential fold and the
//! chunked parallel fold agree as long as chunks are combined left to right.

use crate::record::MutationRecord;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

/// Records per chunk for [`aggregate_par`]
const PAR_CHUNK_SIZE: usize = 4096;

/// Key of a matrix cell. Orders by gene, then cancer type.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CellKey {
    pub gene: String,
    pub cancer_type: String,
}

impl CellKey {
    pub fn new(gene: impl Into<String>, cancer_type: impl Into<String>) -> Self {
        Self {
            gene: gene.into(),
            cancer_type: cancer_type.into(),
        }
    }

    pub fn of(record: &MutationRecord) -> Self {
        Self::new(record.gene.as_str(), record.cancer_type.as_str())
    }
}

/// One rendered unit of the matrix
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[cfg_attr(feature = "typescript", derive(ts_rs::TS))]
#[cfg_attr(feature = "typescript", ts(export))]
pub struct AggregatedCell {
    pub gene: String,
    pub cancer_type: String,
    pub total_mutation_count: u64,
    /// Mutation-count-weighted mean of the contributing effective frequencies
    pub average_frequency: f64,
    pub max_frequency: f64,
    /// Positions of the contributing records, duplicates allowed
    pub positions: Vec<i64>,
    /// Contributing record with the highest effective frequency (first seen on ties)
    pub representative_record: MutationRecord,
    pub record_count: usize,

    #[serde(skip)]
    #[cfg_attr(feature = "typescript", ts(skip))]
    weighted_frequency_sum: f64,
    #[serde(skip)]
    #[cfg_attr(feature = "typescript", ts(skip))]
    frequency_sum: f64,
}

impl AggregatedCell {
    /// A cell holding a single record
    pub fn from_record(record: &MutationRecord) -> Self {
        let frequency = record.effective_frequency;
        Self {
            gene: record.gene.clone(),
            cancer_type: record.cancer_type.clone(),
            total_mutation_count: record.mutation_count,
            average_frequency: frequency,
            max_frequency: frequency,
            positions: vec![record.position],
            representative_record: record.clone(),
            record_count: 1,
            weighted_frequency_sum: frequency * record.mutation_count as f64,
            frequency_sum: frequency,
        }
    }

    pub fn key(&self) -> CellKey {
        CellKey::new(self.gene.as_str(), self.cancer_type.as_str())
    }

    /// Combine two cells of the same key; `self` is treated as the earlier one.
    pub fn merge(mut self, other: Self) -> Self {
        debug_assert_eq!(self.key(), other.key());

        self.total_mutation_count += other.total_mutation_count;
        self.weighted_frequency_sum += other.weighted_frequency_sum;
        self.frequency_sum += other.frequency_sum;
        self.record_count += other.record_count;
        self.max_frequency = self.max_frequency.max(other.max_frequency);
        self.positions.extend(other.positions);
        if other.representative_record.effective_frequency
            > self.representative_record.effective_frequency
        {
            self.representative_record = other.representative_record;
        }
        self.average_frequency = self.mean_frequency();
        self
    }

    /// Fold one more record into the cell
    pub fn absorb(self, record: &MutationRecord) -> Self {
        self.merge(Self::from_record(record))
    }

    /// Count-weighted mean; when every contributing count is zero the weights
    /// are all zero too, so fall back to the unweighted mean instead of 0/0.
    fn mean_frequency(&self) -> f64 {
        if self.total_mutation_count > 0 {
            self.weighted_frequency_sum / self.total_mutation_count as f64
        } else {
            self.frequency_sum / self.record_count as f64
        }
    }
}

/// Cells keyed by (gene, cancer type), iterated in key order
pub type CellMap = BTreeMap<CellKey, AggregatedCell>;

fn fold_into(mut cells: CellMap, cell: AggregatedCell) -> CellMap {
    let key = cell.key();
    let merged = match cells.remove(&key) {
        Some(existing) => existing.merge(cell),
        None => cell,
    };
    cells.insert(key, merged);
    cells
}

/// Aggregate records into one cell per (gene, cancer type)
pub fn aggregate(records: &[MutationRecord]) -> CellMap {
    let cells = records
        .iter()
        .map(AggregatedCell::from_record)
        .fold(CellMap::new(), fold_into);
    debug!("Aggregated {} records into {} cells", records.len(), cells.len());
    cells
}

/// Combine two partial aggregations; `left` holds the earlier records.
pub fn merge_maps(left: CellMap, right: CellMap) -> CellMap {
    right.into_values().fold(left, fold_into)
}

/// Parallel version of [`aggregate`] over ordered chunks.
///
/// Produces the same cells as [`aggregate`], up to floating-point summation
/// order in `average_frequency`.
pub fn aggregate_par(records: &[MutationRecord]) -> CellMap {
    records
        .par_chunks(PAR_CHUNK_SIZE)
        .map(aggregate)
        .reduce(CellMap::new, merge_maps)
}
