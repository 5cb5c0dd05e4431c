//! Full evaluation-flow tests against a scripted session: terminal-state
//! mapping, cleanup discipline, and the per-category execution paths.

use async_trait::async_trait;
use sqlbench_core::dataset::{LoadedTasks, TaskRecord};
use sqlbench_core::db::{ExecFailure, ResultSet, SessionProvider, SqlSession, StatementOutcome};
use sqlbench_core::engine::evaluator::evaluate;
use sqlbench_core::engine::runner::SuiteRunner;
use sqlbench_core::model::{Category, Conditions, ErrorKind, StateCheck, Task};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

#[derive(Clone, Default)]
struct Script {
    responses: Arc<Mutex<HashMap<String, StatementOutcome>>>,
    log: Arc<Mutex<Vec<String>>>,
    acquires: Arc<Mutex<usize>>,
}

impl Script {
    fn respond(&self, sql: &str, outcome: StatementOutcome) {
        self.responses.lock().unwrap().insert(sql.to_string(), outcome);
    }

    fn log(&self) -> Vec<String> {
        self.log.lock().unwrap().clone()
    }

    fn acquires(&self) -> usize {
        *self.acquires.lock().unwrap()
    }
}

struct MockProvider {
    script: Script,
}

#[async_trait]
impl SessionProvider for MockProvider {
    async fn acquire(&self, _database: &str) -> anyhow::Result<Box<dyn SqlSession>> {
        *self.script.acquires.lock().unwrap() += 1;
        Ok(Box::new(MockSession { script: self.script.clone() }))
    }
}

struct MockSession {
    script: Script,
}

#[async_trait]
impl SqlSession for MockSession {
    async fn execute(&mut self, sql: &str) -> StatementOutcome {
        self.script.log.lock().unwrap().push(sql.to_string());
        self.script
            .responses
            .lock()
            .unwrap()
            .get(sql)
            .cloned()
            .unwrap_or(StatementOutcome::Affected(0))
    }
}

fn rows(data: Vec<Vec<&str>>) -> StatementOutcome {
    StatementOutcome::Rows(ResultSet {
        columns: vec![],
        rows: data
            .into_iter()
            .map(|r| r.into_iter().map(|v| Some(v.to_string())).collect())
            .collect(),
    })
}

fn exec_error(message: &str) -> StatementOutcome {
    StatementOutcome::Failed(ExecFailure { timeout: false, message: message.to_string() })
}

fn exec_timeout() -> StatementOutcome {
    StatementOutcome::Failed(ExecFailure {
        timeout: true,
        message: "statement exceeded 60s budget".to_string(),
    })
}

fn query_task(conditions: Conditions) -> Task {
    Task {
        instance_id: "q_1".to_string(),
        selected_database: "bank".to_string(),
        category: Category::Query,
        sol_sql: vec!["SELECT id, name FROM users".to_string()],
        preprocess_sql: vec![],
        clean_up_sql: vec!["DROP TABLE IF EXISTS scratch".to_string()],
        test_cases: vec![],
        conditions,
        difficulty_tier: None,
    }
}

fn management_task(checks: Vec<StateCheck>) -> Task {
    Task {
        instance_id: "m_1".to_string(),
        selected_database: "bank".to_string(),
        category: Category::Management,
        sol_sql: vec!["UPDATE accounts SET status = 'frozen'".to_string()],
        preprocess_sql: vec!["CREATE TABLE scratch (x int)".to_string()],
        clean_up_sql: vec!["DROP TABLE IF EXISTS scratch".to_string()],
        test_cases: checks,
        conditions: Conditions::default(),
        difficulty_tier: None,
    }
}

fn check(sql: &str, expected: serde_json::Value) -> StateCheck {
    StateCheck { name: None, sql: sql.to_string(), expected }
}

const CAND: &str = "SELECT name, id FROM users";

#[tokio::test]
async fn unordered_permutation_passes() {
    let script = Script::default();
    script.respond(
        "SELECT id, name FROM users",
        rows(vec![vec!["1", "a"], vec!["2", "b"]]),
    );
    script.respond(CAND, rows(vec![vec!["2", "b"], vec!["1", "a"]]));
    let provider = MockProvider { script: script.clone() };

    let v = evaluate(&provider, &query_task(Conditions::default()), &[CAND.to_string()], None)
        .await
        .unwrap();
    assert!(v.passed, "{}", v.detail);
    assert_eq!(v.error, None);
}

#[tokio::test]
async fn ordered_permutation_fails_with_mismatch() {
    let script = Script::default();
    script.respond(
        "SELECT id, name FROM users",
        rows(vec![vec!["1", "a"], vec!["2", "b"]]),
    );
    script.respond(CAND, rows(vec![vec!["2", "b"], vec!["1", "a"]]));
    let provider = MockProvider { script: script.clone() };

    let conditions = Conditions { order: true, ..Default::default() };
    let v = evaluate(&provider, &query_task(conditions), &[CAND.to_string()], None)
        .await
        .unwrap();
    assert!(!v.passed);
    assert_eq!(v.error, Some(ErrorKind::Mismatch));
    assert!(v.detail.contains("row 0 differs"), "{}", v.detail);
}

#[tokio::test]
async fn numeric_drift_within_rounding_passes() {
    let script = Script::default();
    script.respond("SELECT id, name FROM users", rows(vec![vec!["3.14159"]]));
    script.respond(CAND, rows(vec![vec!["3.14"]]));
    let provider = MockProvider { script: script.clone() };

    let v = evaluate(&provider, &query_task(Conditions::default()), &[CAND.to_string()], None)
        .await
        .unwrap();
    assert!(v.passed, "{}", v.detail);
}

#[tokio::test]
async fn candidate_error_fails_and_cleanup_still_runs() {
    let script = Script::default();
    script.respond("SELECT id, name FROM users", rows(vec![vec!["1"]]));
    script.respond(CAND, exec_error("syntax error at or near \"FORM\""));
    let provider = MockProvider { script: script.clone() };

    let v = evaluate(&provider, &query_task(Conditions::default()), &[CAND.to_string()], None)
        .await
        .unwrap();
    assert!(!v.passed);
    assert_eq!(v.error, Some(ErrorKind::CandidateExecutionError));
    assert!(v.detail.contains("syntax error"), "{}", v.detail);

    let log = script.log();
    let rollback = log.iter().position(|s| s == "ROLLBACK").expect("rollback ran");
    let cleanup = log
        .iter()
        .position(|s| s == "DROP TABLE IF EXISTS scratch")
        .expect("cleanup ran");
    assert!(rollback < cleanup);
}

#[tokio::test]
async fn gold_error_is_a_harness_defect() {
    let script = Script::default();
    script.respond("SELECT id, name FROM users", exec_error("relation does not exist"));
    let provider = MockProvider { script: script.clone() };

    let v = evaluate(&provider, &query_task(Conditions::default()), &[CAND.to_string()], None)
        .await
        .unwrap();
    assert!(!v.passed);
    assert_eq!(v.error, Some(ErrorKind::GoldExecutionError));
    assert!(v.error.unwrap().is_harness());
    // candidate never executed after the gold failure
    assert!(!script.log().iter().any(|s| s == CAND));
    // but cleanup did
    assert!(script.log().iter().any(|s| s == "DROP TABLE IF EXISTS scratch"));
}

#[tokio::test]
async fn candidate_timeout_maps_to_timeout_kind() {
    let script = Script::default();
    script.respond("SELECT id, name FROM users", rows(vec![vec!["1"]]));
    script.respond(CAND, exec_timeout());
    let provider = MockProvider { script: script.clone() };

    let v = evaluate(&provider, &query_task(Conditions::default()), &[CAND.to_string()], None)
        .await
        .unwrap();
    assert_eq!(v.error, Some(ErrorKind::Timeout));
    assert!(script.log().iter().any(|s| s == "ROLLBACK"));
}

#[tokio::test]
async fn missing_candidate_never_touches_the_database() {
    let script = Script::default();
    let provider = MockProvider { script: script.clone() };

    let v = evaluate(&provider, &query_task(Conditions::default()), &[], None)
        .await
        .unwrap();
    assert!(!v.passed);
    assert_eq!(v.error, Some(ErrorKind::MissingCandidate));
    assert_eq!(script.acquires(), 0);
    assert!(script.log().is_empty());
}

#[tokio::test]
async fn preprocess_failure_is_a_harness_defect() {
    let script = Script::default();
    let task = Task {
        preprocess_sql: vec!["CREATE TABLE scratch (x int)".to_string()],
        ..query_task(Conditions::default())
    };
    script.respond("CREATE TABLE scratch (x int)", exec_error("permission denied"));
    let provider = MockProvider { script: script.clone() };

    let v = evaluate(&provider, &task, &[CAND.to_string()], None).await.unwrap();
    assert_eq!(v.error, Some(ErrorKind::GoldExecutionError));
    assert!(v.detail.contains("preprocess statement 1"), "{}", v.detail);
    assert!(script.log().iter().any(|s| s == "DROP TABLE IF EXISTS scratch"));
}

#[tokio::test]
async fn management_passes_only_when_every_check_passes() {
    let script = Script::default();
    script.respond("SELECT count(*) FROM accounts", rows(vec![vec!["2"]]));
    script.respond("SELECT max(balance) FROM accounts", rows(vec![vec!["4"]]));
    let task = management_task(vec![
        check("SELECT count(*) FROM accounts", serde_json::json!(2)),
        check("SELECT max(balance) FROM accounts", serde_json::json!(5)),
    ]);
    let provider = MockProvider { script: script.clone() };

    let cand = "UPDATE accounts SET balance = balance + 1".to_string();
    let v = evaluate(&provider, &task, &[cand.clone()], None).await.unwrap();
    assert!(!v.passed);
    assert_eq!(v.error, Some(ErrorKind::Mismatch));
    assert!(v.detail.contains("test_2"), "{}", v.detail);
    assert!(!v.detail.contains("test_1:"), "{}", v.detail);

    let log = script.log();
    // the candidate ran, the gold never did
    assert!(log.iter().any(|s| *s == cand));
    assert!(!log.iter().any(|s| s == "UPDATE accounts SET status = 'frozen'"));
}

#[tokio::test]
async fn management_all_checks_pass() {
    let script = Script::default();
    script.respond("SELECT count(*) FROM accounts", rows(vec![vec!["2"]]));
    let task = management_task(vec![check("SELECT count(*) FROM accounts", serde_json::json!(2))]);
    let provider = MockProvider { script: script.clone() };

    let v = evaluate(
        &provider,
        &task,
        &["UPDATE accounts SET balance = 0".to_string()],
        Some(0.03),
    )
    .await
    .unwrap();
    assert!(v.passed, "{}", v.detail);
    assert_eq!(v.cost, Some(0.03));

    // cleanup runs on the passing path too
    let log = script.log();
    let rollback = log.iter().position(|s| s == "ROLLBACK").unwrap();
    let cleanup = log.iter().position(|s| s == "DROP TABLE IF EXISTS scratch").unwrap();
    assert!(rollback < cleanup);
}

#[tokio::test]
async fn suite_run_aggregates_and_sorts_verdicts() {
    let script = Script::default();
    script.respond("SELECT id, name FROM users", rows(vec![vec!["1"]]));
    script.respond(CAND, rows(vec![vec!["1"]]));
    let provider = Arc::new(MockProvider { script: script.clone() });

    let mut with_candidate = query_task(Conditions::default());
    with_candidate.instance_id = "z_2".to_string();
    let mut without_candidate = query_task(Conditions::default());
    without_candidate.instance_id = "a_1".to_string();

    let loaded = LoadedTasks {
        records: vec![
            TaskRecord {
                task: with_candidate,
                pred_sqls: vec![CAND.to_string()],
                cost: Some(0.02),
            },
            TaskRecord { task: without_candidate, pred_sqls: vec![], cost: None },
        ],
        invalid: vec![],
    };

    let runner = SuiteRunner::new(provider, 4);
    let artifacts = runner.run(loaded, None).await.unwrap();

    // verdicts come back sorted by instance id regardless of completion order
    assert_eq!(artifacts.verdicts[0].instance_id, "a_1");
    assert_eq!(artifacts.verdicts[1].instance_id, "z_2");
    assert!(artifacts.verdicts[1].passed);

    assert_eq!(artifacts.metrics.overall.total, 2);
    assert_eq!(artifacts.metrics.overall.passed, 1);
    assert_eq!(artifacts.metrics.overall.failed, 1);
    assert_eq!(artifacts.metrics.errors.get(&ErrorKind::MissingCandidate), Some(&1));
    assert_eq!(artifacts.metrics.avg_cost, Some(0.02));
    assert_eq!(artifacts.invalid_records, 0);
}

#[tokio::test]
async fn candidate_distinct_and_round_do_not_change_the_verdict() {
    // the candidate wraps values in ROUND and adds DISTINCT; the
    // canonicalized form is what executes
    let script = Script::default();
    script.respond("SELECT id, name FROM users", rows(vec![vec!["1", "a"]]));
    script.respond("SELECT  price FROM items", rows(vec![vec!["1", "a"]]));
    let provider = MockProvider { script: script.clone() };

    let cand = "SELECT DISTINCT ROUND(price, 2) FROM items".to_string();
    let v = evaluate(&provider, &query_task(Conditions::default()), &[cand], None)
        .await
        .unwrap();
    assert!(v.passed, "{}", v.detail);
    assert!(script.log().iter().any(|s| s == "SELECT  price FROM items"));
}
