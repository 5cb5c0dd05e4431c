//! Result-set and state-check comparison. Shape mismatches are comparison
//! failures with a descriptive detail, never harness errors.

use crate::db::ResultSet;
use crate::model::Conditions;
use crate::normalize::{normalize, normalize_rows, scalar_from_json, Normalized, Scalar};

const DETAIL_ROWS: usize = 5;

#[derive(Debug, Clone)]
pub struct Comparison {
    pub passed: bool,
    pub detail: String,
}

impl Comparison {
    pub fn pass() -> Self {
        Self { passed: true, detail: String::new() }
    }

    pub fn fail(detail: impl Into<String>) -> Self {
        Self { passed: false, detail: detail.into() }
    }
}

/// Sequence equality over normalized rows. Ordering and duplicate policy
/// have already been applied by normalization, so ordered and unordered
/// modes reduce to the same positional walk.
pub fn compare_result_sets(gold: &Normalized, candidate: &Normalized) -> Comparison {
    if gold.rows.len() != candidate.rows.len() {
        return Comparison::fail(format!(
            "row count differs: gold={} candidate={}",
            gold.rows.len(),
            candidate.rows.len()
        ));
    }
    for (i, (g, c)) in gold.rows.iter().zip(candidate.rows.iter()).enumerate() {
        if g.len() != c.len() {
            return Comparison::fail(format!(
                "column count differs at row {}: gold={} candidate={}",
                i,
                g.len(),
                c.len()
            ));
        }
        if g != c {
            return Comparison::fail(format!(
                "row {} differs: gold=({}) candidate=({})",
                i,
                render_row(g),
                render_row(c)
            ));
        }
    }
    Comparison::pass()
}

/// One Management-state check: the verification query's normalized result
/// must equal the normalized expected literal. Expected rows carry no
/// meaningful order, so both sides compare as sorted multisets.
pub fn check_expected(result: &ResultSet, expected: &serde_json::Value) -> Comparison {
    let unordered = Conditions::default();
    let got = normalize(result, &unordered);
    let want = normalize_rows(expected_rows(expected), &unordered);

    if got == want {
        return Comparison::pass();
    }
    Comparison::fail(format!(
        "expected {} but got {}",
        render_rows(&want.rows),
        render_rows(&got.rows)
    ))
}

/// Accepted literal shapes: scalar -> one cell, array of scalars -> one
/// row, array of arrays -> rows.
fn expected_rows(expected: &serde_json::Value) -> Vec<Vec<Scalar>> {
    match expected {
        serde_json::Value::Array(items) => {
            if items.iter().all(|v| v.is_array()) {
                items
                    .iter()
                    .map(|row| {
                        row.as_array()
                            .map(|cells| cells.iter().map(scalar_from_json).collect())
                            .unwrap_or_default()
                    })
                    .collect()
            } else {
                vec![items.iter().map(scalar_from_json).collect()]
            }
        }
        scalar => vec![vec![scalar_from_json(scalar)]],
    }
}

fn render_row(row: &[Scalar]) -> String {
    row.iter().map(|s| s.to_string()).collect::<Vec<_>>().join(", ")
}

fn render_rows(rows: &[Vec<Scalar>]) -> String {
    if rows.is_empty() {
        return "no rows".to_string();
    }
    let shown: Vec<String> = rows.iter().take(DETAIL_ROWS).map(|r| format!("({})", render_row(r))).collect();
    let mut out = format!("[{}]", shown.join(", "));
    if rows.len() > DETAIL_ROWS {
        out.push_str(&format!(" (+{} more)", rows.len() - DETAIL_ROWS));
    }
    out
}
