use super::{ResultSet, SqlSession, StatementOutcome};

/// Outcome of an ordered statement sequence. `Rows`/`Affected` reflect the
/// last statement executed; the first failure stops the sequence.
#[derive(Debug, Clone)]
pub enum ExecutionOutcome {
    Rows(ResultSet),
    Affected(u64),
    Failed {
        timeout: bool,
        statement: usize,
        message: String,
    },
}

impl ExecutionOutcome {
    /// Result rows for comparison; a row-less outcome compares as empty.
    pub fn into_rows(self) -> ResultSet {
        match self {
            ExecutionOutcome::Rows(rs) => rs,
            _ => ResultSet::default(),
        }
    }
}

pub async fn run_sequence(session: &mut dyn SqlSession, statements: &[String]) -> ExecutionOutcome {
    let mut last = ExecutionOutcome::Affected(0);
    for (i, sql) in statements.iter().enumerate() {
        tracing::debug!(statement = i + 1, total = statements.len(), "executing");
        match session.execute(sql).await {
            StatementOutcome::Rows(rs) => last = ExecutionOutcome::Rows(rs),
            StatementOutcome::Affected(n) => last = ExecutionOutcome::Affected(n),
            StatementOutcome::Failed(f) => {
                return ExecutionOutcome::Failed {
                    timeout: f.timeout,
                    statement: i,
                    message: f.message,
                }
            }
        }
    }
    last
}
