use serde::{Deserialize, Deserializer, Serialize};

/// One benchmark item, as shipped in the dataset JSONL.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub instance_id: String,
    #[serde(default)]
    pub selected_database: String,
    #[serde(default)]
    pub category: Category,
    #[serde(default, deserialize_with = "string_or_seq")]
    pub sol_sql: Vec<String>,
    #[serde(default, deserialize_with = "string_or_seq")]
    pub preprocess_sql: Vec<String>,
    #[serde(default, deserialize_with = "string_or_seq")]
    pub clean_up_sql: Vec<String>,
    #[serde(default)]
    pub test_cases: Vec<StateCheck>,
    #[serde(default)]
    pub conditions: Conditions,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub difficulty_tier: Option<Tier>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Category {
    #[default]
    #[serde(alias = "query")]
    Query,
    #[serde(alias = "management")]
    Management,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Tier {
    #[serde(alias = "simple")]
    Simple,
    #[serde(alias = "moderate")]
    Moderate,
    #[serde(alias = "challenging")]
    Challenging,
}

/// Comparison-policy flags for a task. Unknown flags in the input are
/// ignored; absent flags default to off.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conditions {
    #[serde(default)]
    pub order: bool,
    #[serde(default)]
    pub decimal: bool,
    #[serde(default)]
    pub distinct: bool,
}

/// Post-state verification for a Management task: a query whose normalized
/// result must equal the expected literal (scalar, row, or list of rows).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateCheck {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub sql: String,
    pub expected: serde_json::Value,
}

impl StateCheck {
    pub fn label(&self, idx: usize) -> String {
        match &self.name {
            Some(n) => n.clone(),
            None => format!("test_{}", idx + 1),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    GoldExecutionError,
    CandidateExecutionError,
    Timeout,
    Mismatch,
    MissingCandidate,
    ConnectionError,
}

impl ErrorKind {
    /// Harness defects are reported apart from candidate failures.
    pub fn is_harness(&self) -> bool {
        matches!(self, ErrorKind::GoldExecutionError | ErrorKind::ConnectionError)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::GoldExecutionError => "gold_execution_error",
            ErrorKind::CandidateExecutionError => "candidate_execution_error",
            ErrorKind::Timeout => "timeout",
            ErrorKind::Mismatch => "mismatch",
            ErrorKind::MissingCandidate => "missing_candidate",
            ErrorKind::ConnectionError => "connection_error",
        }
    }
}

/// Immutable per-task outcome. Category/tier/cost ride along so the
/// aggregator needs nothing beyond the verdict stream.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Verdict {
    pub instance_id: String,
    pub passed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorKind>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub detail: String,
    pub category: Category,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub difficulty_tier: Option<Tier>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cost: Option<f64>,
}

/// Datasets carry SQL fields either as one string or as a list of
/// statements; both decode to `Vec<String>`.
pub(crate) fn string_or_seq<'de, D>(d: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany {
        One(String),
        Many(Vec<String>),
    }

    Ok(match Option::<OneOrMany>::deserialize(d)? {
        None => Vec::new(),
        Some(OneOrMany::One(s)) => {
            if s.trim().is_empty() {
                Vec::new()
            } else {
                vec![s]
            }
        }
        Some(OneOrMany::Many(v)) => v,
    })
}
