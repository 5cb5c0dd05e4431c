//! JSONL task and candidate loading. A line that fails to decode aborts
//! the run (malformed input file); a record missing required fields is
//! kept aside as invalid and never evaluated.

use crate::errors::DatasetError;
use crate::model::{string_or_seq, Category, Task};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

/// One dataset line: the task plus the candidate prediction the original
/// combined file carries alongside it.
#[derive(Debug, Clone, Deserialize)]
pub struct TaskRecord {
    #[serde(flatten)]
    pub task: Task,
    #[serde(default, deserialize_with = "string_or_seq")]
    pub pred_sqls: Vec<String>,
    #[serde(default)]
    pub cost: Option<f64>,
}

/// Candidate overlay record: maps an instance to its predicted SQL.
#[derive(Debug, Clone, Deserialize)]
pub struct CandidateRecord {
    pub instance_id: String,
    #[serde(default, deserialize_with = "string_or_seq", alias = "pred_sql")]
    pub pred_sqls: Vec<String>,
    #[serde(default)]
    pub cost: Option<f64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct InvalidRecord {
    pub line: usize,
    pub instance_id: String,
    pub reason: String,
}

#[derive(Debug, Default)]
pub struct LoadedTasks {
    pub records: Vec<TaskRecord>,
    pub invalid: Vec<InvalidRecord>,
}

pub fn load_tasks(path: &Path) -> Result<LoadedTasks, DatasetError> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| DatasetError(format!("failed to read {}: {}", path.display(), e)))?;

    let mut loaded = LoadedTasks::default();
    for (idx, line) in raw.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let record: TaskRecord = serde_json::from_str(line).map_err(|e| {
            DatasetError(format!("{}:{}: invalid JSON: {}", path.display(), idx + 1, e))
        })?;

        if let Some(reason) = validate(&record.task) {
            tracing::warn!(
                instance_id = %record.task.instance_id,
                line = idx + 1,
                %reason,
                "skipping invalid task record"
            );
            loaded.invalid.push(InvalidRecord {
                line: idx + 1,
                instance_id: record.task.instance_id.clone(),
                reason,
            });
            continue;
        }

        if record.task.category == Category::Management && record.task.test_cases.is_empty() {
            tracing::warn!(
                instance_id = %record.task.instance_id,
                "management task has no test cases"
            );
        }

        loaded.records.push(record);
    }
    Ok(loaded)
}

pub fn load_candidates(path: &Path) -> Result<HashMap<String, CandidateRecord>, DatasetError> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| DatasetError(format!("failed to read {}: {}", path.display(), e)))?;

    let mut candidates = HashMap::new();
    for (idx, line) in raw.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let record: CandidateRecord = serde_json::from_str(line).map_err(|e| {
            DatasetError(format!("{}:{}: invalid JSON: {}", path.display(), idx + 1, e))
        })?;
        candidates.insert(record.instance_id.clone(), record);
    }
    Ok(candidates)
}

fn validate(task: &Task) -> Option<String> {
    let mut missing = Vec::new();
    if task.instance_id.trim().is_empty() {
        missing.push("instance_id");
    }
    if task.selected_database.trim().is_empty() {
        missing.push("selected_database");
    }
    if task.sol_sql.is_empty() {
        missing.push("sol_sql");
    }
    if missing.is_empty() {
        None
    } else {
        Some(format!("missing required fields: {}", missing.join(", ")))
    }
}
