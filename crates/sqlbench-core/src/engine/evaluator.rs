//! Single-task evaluation: setup, gold/candidate execution, comparison,
//! cleanup. Everything that can go wrong per task becomes a Verdict; only
//! a failure to acquire a connection escapes as an error and halts the
//! run.

use crate::compare::{check_expected, compare_result_sets};
use crate::db::{run_sequence, ExecutionOutcome, SessionProvider, SqlSession, StatementOutcome};
use crate::model::{Category, ErrorKind, Task, Verdict};
use crate::normalize::normalize;
use crate::rewrite::canonicalize;
use anyhow::Context;
use std::time::Instant;

struct Outcome {
    passed: bool,
    error: Option<ErrorKind>,
    detail: String,
}

impl Outcome {
    fn pass() -> Self {
        Self { passed: true, error: None, detail: String::new() }
    }

    fn fail(kind: ErrorKind, detail: impl Into<String>) -> Self {
        Self { passed: false, error: Some(kind), detail: detail.into() }
    }

    fn errored(detail: impl Into<String>) -> Self {
        Self::fail(ErrorKind::GoldExecutionError, detail)
    }
}

pub async fn evaluate(
    provider: &dyn SessionProvider,
    task: &Task,
    pred_sqls: &[String],
    cost: Option<f64>,
) -> anyhow::Result<Verdict> {
    let started = Instant::now();

    if pred_sqls.is_empty() {
        return Ok(finish(
            task,
            cost,
            started,
            Outcome::fail(ErrorKind::MissingCandidate, "no candidate SQL supplied"),
        ));
    }

    let mut session = provider
        .acquire(&task.selected_database)
        .await
        .with_context(|| format!("failed to acquire connection for {}", task.selected_database))?;

    tracing::info!(
        instance_id = %task.instance_id,
        database = %task.selected_database,
        "evaluating"
    );

    let outcome = match session.execute("BEGIN").await {
        StatementOutcome::Failed(f) => {
            Outcome::errored(format!("failed to open transaction: {}", f.message))
        }
        _ => run_phases(session.as_mut(), task, pred_sqls).await,
    };

    // rollback restores shared state on every path
    if let StatementOutcome::Failed(f) = session.execute("ROLLBACK").await {
        tracing::warn!(instance_id = %task.instance_id, error = %f.message, "rollback failed");
    }

    // task-author restore, outside the transaction; failures are logged,
    // never propagated
    for sql in &task.clean_up_sql {
        if let StatementOutcome::Failed(f) = session.execute(sql).await {
            tracing::warn!(
                instance_id = %task.instance_id,
                error = %f.message,
                "cleanup statement failed"
            );
        }
    }

    Ok(finish(task, cost, started, outcome))
}

async fn run_phases(session: &mut dyn SqlSession, task: &Task, pred_sqls: &[String]) -> Outcome {
    if let ExecutionOutcome::Failed { statement, message, .. } =
        run_sequence(session, &task.preprocess_sql).await
    {
        return Outcome::errored(format!(
            "preprocess statement {} failed: {}",
            statement + 1,
            message
        ));
    }

    match task.category {
        Category::Query => query_phase(session, task, pred_sqls).await,
        Category::Management => management_phase(session, task, pred_sqls).await,
    }
}

/// Query tasks compare result sets. Both sides run through the same
/// canonicalization so the conditions flags, not cosmetic SQL, decide the
/// verdict. Gold runs first; its failure is a harness defect, not a
/// candidate failure.
async fn query_phase(session: &mut dyn SqlSession, task: &Task, pred_sqls: &[String]) -> Outcome {
    let gold_sql = canonicalize(&task.sol_sql);
    let cand_sql = canonicalize(pred_sqls);

    let gold = match run_sequence(session, &gold_sql).await {
        ExecutionOutcome::Failed { timeout: true, statement, message } => {
            return Outcome::fail(
                ErrorKind::Timeout,
                format!("gold statement {} timed out: {}", statement + 1, message),
            )
        }
        ExecutionOutcome::Failed { statement, message, .. } => {
            return Outcome::errored(format!("gold statement {} failed: {}", statement + 1, message))
        }
        other => other.into_rows(),
    };

    let cand = match run_sequence(session, &cand_sql).await {
        ExecutionOutcome::Failed { timeout: true, statement, message } => {
            return Outcome::fail(
                ErrorKind::Timeout,
                format!("candidate statement {} timed out: {}", statement + 1, message),
            )
        }
        ExecutionOutcome::Failed { statement, message, .. } => {
            return Outcome::fail(
                ErrorKind::CandidateExecutionError,
                format!("candidate statement {} failed: {}", statement + 1, message),
            )
        }
        other => other.into_rows(),
    };

    let cmp = compare_result_sets(
        &normalize(&gold, &task.conditions),
        &normalize(&cand, &task.conditions),
    );
    if cmp.passed {
        Outcome::pass()
    } else {
        Outcome::fail(ErrorKind::Mismatch, cmp.detail)
    }
}

/// Management tasks run only the candidate; the state checks verify its
/// effect against the post-candidate database state. Executing gold too
/// would double-apply the mutation the checks probe for. A task passes
/// only if every check passes.
async fn management_phase(
    session: &mut dyn SqlSession,
    task: &Task,
    pred_sqls: &[String],
) -> Outcome {
    match run_sequence(session, pred_sqls).await {
        ExecutionOutcome::Failed { timeout: true, statement, message } => {
            return Outcome::fail(
                ErrorKind::Timeout,
                format!("candidate statement {} timed out: {}", statement + 1, message),
            )
        }
        ExecutionOutcome::Failed { statement, message, .. } => {
            return Outcome::fail(
                ErrorKind::CandidateExecutionError,
                format!("candidate statement {} failed: {}", statement + 1, message),
            )
        }
        _ => {}
    }

    let mut failures = Vec::new();
    let mut timed_out = false;
    for (i, check) in task.test_cases.iter().enumerate() {
        let label = check.label(i);
        match session.execute(&check.sql).await {
            StatementOutcome::Failed(f) => {
                timed_out = timed_out || f.timeout;
                failures.push(format!("{}: query failed: {}", label, f.message));
            }
            StatementOutcome::Affected(_) => {
                failures.push(format!("{}: query returned no result set", label));
            }
            StatementOutcome::Rows(rs) => {
                let cmp = check_expected(&rs, &check.expected);
                if !cmp.passed {
                    failures.push(format!("{}: {}", label, cmp.detail));
                }
            }
        }
    }

    if failures.is_empty() {
        Outcome::pass()
    } else if timed_out {
        Outcome::fail(ErrorKind::Timeout, failures.join("; "))
    } else {
        Outcome::fail(ErrorKind::Mismatch, failures.join("; "))
    }
}

fn finish(task: &Task, cost: Option<f64>, started: Instant, outcome: Outcome) -> Verdict {
    Verdict {
        instance_id: task.instance_id.clone(),
        passed: outcome.passed,
        error: outcome.error,
        detail: outcome.detail,
        category: task.category,
        difficulty_tier: task.difficulty_tier,
        duration_ms: Some(started.elapsed().as_millis() as u64),
        cost,
    }
}
