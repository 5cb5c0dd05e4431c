//! Pure reduction of verdicts into benchmark metrics. Accumulation is
//! commutative, so concurrent completion order never changes the summary.

use crate::model::{Category, ErrorKind, Tier, Verdict};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Default, PartialEq)]
struct Tally {
    total: usize,
    passed: usize,
    failed: usize,
    errored: usize,
}

impl Tally {
    fn record(&mut self, v: &Verdict) {
        self.total += 1;
        if v.passed {
            self.passed += 1;
        } else if v.error.map(|e| e.is_harness()).unwrap_or(false) {
            self.errored += 1;
        } else {
            self.failed += 1;
        }
    }

    fn stat(&self) -> RateStat {
        RateStat {
            total: self.total,
            passed: self.passed,
            failed: self.failed,
            errored: self.errored,
            success_rate: if self.total == 0 {
                0.0
            } else {
                self.passed as f64 / self.total as f64
            },
        }
    }
}

/// `errored` counts tasks the harness could not evaluate (gold SQL
/// failures); those are reported apart from candidate failures but still
/// count against the success rate denominator.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct RateStat {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub errored: usize,
    pub success_rate: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Metrics {
    pub overall: RateStat,
    pub by_category: BTreeMap<Category, RateStat>,
    pub by_tier: BTreeMap<Tier, RateStat>,
    pub errors: BTreeMap<ErrorKind, usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avg_cost: Option<f64>,
}

#[derive(Debug, Default)]
pub struct Aggregator {
    overall: Tally,
    by_category: BTreeMap<Category, Tally>,
    by_tier: BTreeMap<Tier, Tally>,
    by_error: BTreeMap<ErrorKind, usize>,
    cost_sum: f64,
    cost_count: usize,
}

impl Aggregator {
    pub fn record(&mut self, v: &Verdict) {
        self.overall.record(v);
        self.by_category.entry(v.category).or_default().record(v);
        if let Some(tier) = v.difficulty_tier {
            self.by_tier.entry(tier).or_default().record(v);
        }
        if let Some(kind) = v.error {
            *self.by_error.entry(kind).or_default() += 1;
        }
        if let Some(cost) = v.cost {
            self.cost_sum += cost;
            self.cost_count += 1;
        }
    }

    pub fn summarize(&self) -> Metrics {
        Metrics {
            overall: self.overall.stat(),
            by_category: self.by_category.iter().map(|(k, t)| (*k, t.stat())).collect(),
            by_tier: self.by_tier.iter().map(|(k, t)| (*k, t.stat())).collect(),
            errors: self.by_error.clone(),
            avg_cost: if self.cost_count == 0 {
                None
            } else {
                Some(self.cost_sum / self.cost_count as f64)
            },
        }
    }
}
