//! Ingestion boundary for mutation records.
//!
//! The API layer hands over records that carry an optional `frequency` and a
//! legacy `significance` score. Everything downstream works on
//! [`MutationRecord`], where the fallback has already been resolved into a
//! single `effective_frequency`.

use crate::error::{HeatmapError, Result};
use serde::{Deserialize, Serialize};
use std::io::Read;
use tracing::{debug, warn};

/// A mutation record exactly as the API supplies it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawMutationRecord {
    pub gene: String,
    /// Protein position; 0 for non-positional events such as amplifications
    #[serde(default)]
    pub position: i64,
    pub cancer_type: String,
    #[serde(default)]
    pub mutation_count: u64,
    #[serde(default)]
    pub frequency: Option<f64>,
    #[serde(default)]
    pub significance: Option<f64>,
}

/// A normalized mutation record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[cfg_attr(feature = "typescript", derive(ts_rs::TS))]
#[cfg_attr(feature = "typescript", ts(export))]
pub struct MutationRecord {
    pub gene: String,
    pub position: i64,
    pub cancer_type: String,
    pub mutation_count: u64,
    /// `frequency`, or `significance` when the record has no frequency
    pub effective_frequency: f64,
}

impl MutationRecord {
    pub fn new(
        gene: impl Into<String>,
        position: i64,
        cancer_type: impl Into<String>,
        mutation_count: u64,
        effective_frequency: f64,
    ) -> Self {
        Self {
            gene: gene.into(),
            position,
            cancer_type: cancer_type.into(),
            mutation_count,
            effective_frequency,
        }
    }
}

/// Result of normalizing a batch of raw records
#[derive(Debug, Clone, Default)]
pub struct Ingested {
    pub records: Vec<MutationRecord>,
    /// Number of raw records that failed validation and were skipped
    pub rejected: usize,
}

/// Normalize a single raw record.
///
/// `index` is only used for error reporting.
pub fn normalize(index: usize, raw: RawMutationRecord) -> Result<MutationRecord> {
    if raw.gene.trim().is_empty() {
        return Err(HeatmapError::invalid_record(index, "gene symbol is empty"));
    }
    if raw.cancer_type.trim().is_empty() {
        return Err(HeatmapError::invalid_record(index, "cancer type is empty"));
    }

    let frequency = raw.frequency.or(raw.significance).ok_or_else(|| {
        HeatmapError::invalid_record(index, "neither frequency nor significance is present")
    })?;
    if !frequency.is_finite() {
        return Err(HeatmapError::invalid_record(
            index,
            format!("effective frequency {frequency} is not finite"),
        ));
    }

    Ok(MutationRecord {
        gene: raw.gene,
        position: raw.position,
        cancer_type: raw.cancer_type,
        mutation_count: raw.mutation_count,
        effective_frequency: frequency.clamp(0.0, 1.0),
    })
}

/// Normalize a batch, skipping records that fail validation.
pub fn normalize_all(raws: impl IntoIterator<Item = RawMutationRecord>) -> Ingested {
    let mut ingested = Ingested::default();
    for (index, raw) in raws.into_iter().enumerate() {
        match normalize(index, raw) {
            Ok(record) => ingested.records.push(record),
            Err(e) => {
                debug!("Skipping record: {e}");
                ingested.rejected += 1;
            }
        }
    }
    if ingested.rejected > 0 {
        warn!(
            "Rejected {} of {} records during ingestion",
            ingested.rejected,
            ingested.rejected + ingested.records.len()
        );
    }
    ingested
}

/// Parse a JSON array of raw records and normalize it
pub fn records_from_json(json: &str) -> Result<Ingested> {
    let raws: Vec<RawMutationRecord> = serde_json::from_str(json)?;
    Ok(normalize_all(raws))
}

/// Parse a JSON array of raw records from a reader and normalize it
pub fn records_from_reader<R: Read>(reader: R) -> Result<Ingested> {
    let raws: Vec<RawMutationRecord> = serde_json::from_reader(reader)?;
    Ok(normalize_all(raws))
}

/// The unsampled effective-frequency population of a record set.
pub fn frequencies(records: &[MutationRecord]) -> Vec<f64> {
    records.iter().map(|r| r.effective_frequency).collect()
}
