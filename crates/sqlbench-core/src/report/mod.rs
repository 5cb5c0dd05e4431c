use crate::aggregate::Metrics;
use crate::model::Verdict;
use chrono::{DateTime, Utc};
use serde::Serialize;

pub mod console;
pub mod json;

/// Everything a run produces: the verdict stream plus the aggregated
/// metrics, in a stable serializable shape for downstream reporting.
#[derive(Debug, Clone, Serialize)]
pub struct RunArtifacts {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    /// task records rejected by input validation and never evaluated
    pub invalid_records: usize,
    pub metrics: Metrics,
    pub verdicts: Vec<Verdict>,
}
