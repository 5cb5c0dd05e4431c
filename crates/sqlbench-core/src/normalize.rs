//! Canonical comparable form for result sets: numeric rounding, date
//! collapsing, row ordering and duplicate policy.

use crate::db::ResultSet;
use crate::model::Conditions;
use regex::Regex;
use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::fmt;
use std::sync::OnceLock;

/// Rounding applied to every numeric value before comparison, absorbing
/// floating-point and aggregation drift. Applied unconditionally; the
/// `decimal` condition flag does not change it.
pub const DECIMAL_PLACES: u32 = 2;

#[derive(Debug, Clone)]
pub enum Scalar {
    Null,
    Num(f64),
    Text(String),
}

impl PartialEq for Scalar {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Scalar {}

impl PartialOrd for Scalar {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Scalar {
    fn cmp(&self, other: &Self) -> Ordering {
        use Scalar::*;
        match (self, other) {
            (Null, Null) => Ordering::Equal,
            (Null, _) => Ordering::Less,
            (_, Null) => Ordering::Greater,
            (Num(a), Num(b)) => a.total_cmp(b),
            (Num(_), Text(_)) => Ordering::Less,
            (Text(_), Num(_)) => Ordering::Greater,
            (Text(a), Text(b)) => a.cmp(b),
        }
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::Null => write!(f, "NULL"),
            Scalar::Num(v) => write!(f, "{}", v),
            Scalar::Text(s) => write!(f, "{}", s),
        }
    }
}

fn numeric_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^[+-]?(\d+(\.\d*)?|\.\d+)([eE][+-]?\d+)?$").expect("static pattern")
    })
}

fn date_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\d{4}-\d{2}-\d{2}([ T].+)?$").expect("static pattern"))
}

pub fn round_value(v: f64) -> f64 {
    let scale = 10f64.powi(DECIMAL_PLACES as i32);
    let r = (v * scale).round() / scale;
    // collapse -0.0
    if r == 0.0 {
        0.0
    } else {
        r
    }
}

/// Canonical scalar for one text-protocol value. Dates and timestamps both
/// collapse to `YYYY-MM-DD`; anything numeric-looking becomes a rounded
/// number; the rest stays text.
pub fn scalar(raw: Option<&str>) -> Scalar {
    let Some(s) = raw else {
        return Scalar::Null;
    };
    if numeric_re().is_match(s) {
        if let Ok(v) = s.parse::<f64>() {
            return Scalar::Num(round_value(v));
        }
    }
    if date_re().is_match(s) {
        return Scalar::Text(s[..10].to_string());
    }
    Scalar::Text(s.to_string())
}

/// Canonical scalar for an expected literal from a task record. Booleans
/// map to the text-protocol form so `true` matches a boolean column.
pub fn scalar_from_json(v: &serde_json::Value) -> Scalar {
    match v {
        serde_json::Value::Null => Scalar::Null,
        serde_json::Value::Bool(b) => Scalar::Text(if *b { "t" } else { "f" }.to_string()),
        serde_json::Value::Number(n) => match n.as_f64() {
            Some(f) => Scalar::Num(round_value(f)),
            None => Scalar::Text(n.to_string()),
        },
        serde_json::Value::String(s) => scalar(Some(s)),
        other => Scalar::Text(other.to_string()),
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Normalized {
    pub rows: Vec<Vec<Scalar>>,
}

impl Normalized {
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

pub fn normalize(raw: &ResultSet, conditions: &Conditions) -> Normalized {
    let rows = raw
        .rows
        .iter()
        .map(|row| row.iter().map(|v| scalar(v.as_deref())).collect())
        .collect();
    normalize_rows(rows, conditions)
}

/// Ordering/duplicate policy over already-canonical rows. With
/// `order=false` rows sort by full tuple so multiset comparison is
/// deterministic; `distinct=true` collapses duplicates (first occurrence
/// wins when order is significant).
pub fn normalize_rows(mut rows: Vec<Vec<Scalar>>, conditions: &Conditions) -> Normalized {
    if !conditions.order {
        rows.sort();
        if conditions.distinct {
            rows.dedup();
        }
    } else if conditions.distinct {
        let mut seen = BTreeSet::new();
        rows.retain(|row| seen.insert(row.clone()));
    }
    Normalized { rows }
}
