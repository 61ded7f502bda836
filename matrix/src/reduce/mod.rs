pub mod aggregate;
pub mod ranking;
pub mod sampling;

pub use aggregate::{AggregatedCell, CellKey, CellMap, aggregate, aggregate_par};
pub use ranking::{RankingFilter, axis_labels, filter};
pub use sampling::{BandAllocation, FrequencyBand, SamplingConfig, sample, stratified_sample};
