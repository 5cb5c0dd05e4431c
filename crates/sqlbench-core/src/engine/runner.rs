//! Suite orchestration: one evaluation task per benchmark item, bounded by
//! a worker-pool semaphore. Completion order is arbitrary; the aggregation
//! is commutative so it does not matter.

use crate::aggregate::Aggregator;
use crate::dataset::{CandidateRecord, LoadedTasks, TaskRecord};
use crate::db::SessionProvider;
use crate::engine::evaluator;
use crate::report::RunArtifacts;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Semaphore;

pub struct SuiteRunner {
    provider: Arc<dyn SessionProvider>,
    parallel: usize,
}

impl SuiteRunner {
    pub fn new(provider: Arc<dyn SessionProvider>, parallel: usize) -> Self {
        Self { provider, parallel: parallel.max(1) }
    }

    pub async fn run(
        &self,
        loaded: LoadedTasks,
        overlay: Option<HashMap<String, CandidateRecord>>,
    ) -> anyhow::Result<RunArtifacts> {
        let started_at = Utc::now();
        let sem = Arc::new(Semaphore::new(self.parallel));
        let mut handles = Vec::new();

        for record in loaded.records {
            let permit = sem.clone().acquire_owned().await?;
            let provider = self.provider.clone();
            let (pred_sqls, cost) = resolve_candidate(&record, overlay.as_ref());
            handles.push(tokio::spawn(async move {
                let _permit = permit;
                evaluator::evaluate(provider.as_ref(), &record.task, &pred_sqls, cost).await
            }));
        }

        let mut verdicts = Vec::new();
        for h in handles {
            match h.await {
                Ok(Ok(v)) => verdicts.push(v),
                // connection-level failure: no task can be meaningfully
                // scored, halt the whole run
                Ok(Err(e)) => return Err(e.context("run aborted")),
                Err(e) => return Err(anyhow::anyhow!("evaluation task panicked: {}", e)),
            }
        }
        verdicts.sort_by(|a, b| a.instance_id.cmp(&b.instance_id));

        let mut agg = Aggregator::default();
        for v in &verdicts {
            agg.record(v);
        }

        Ok(RunArtifacts {
            started_at,
            finished_at: Utc::now(),
            invalid_records: loaded.invalid.len(),
            metrics: agg.summarize(),
            verdicts,
        })
    }
}

/// A supplied candidate file is the authoritative mapping: a task absent
/// from it has no candidate, even if the task record embeds one. Without
/// an overlay the embedded `pred_sqls` are the candidate source.
fn resolve_candidate(
    record: &TaskRecord,
    overlay: Option<&HashMap<String, CandidateRecord>>,
) -> (Vec<String>, Option<f64>) {
    match overlay {
        Some(m) => match m.get(&record.task.instance_id) {
            Some(c) => (c.pred_sqls.clone(), c.cost.or(record.cost)),
            None => (Vec::new(), record.cost),
        },
        None => (record.pred_sqls.clone(), record.cost),
    }
}
