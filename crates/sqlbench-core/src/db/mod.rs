use anyhow::Context;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio_postgres::error::SqlState;
use tokio_postgres::{Client, NoTls, SimpleQueryMessage};

pub mod exec;

pub use exec::{run_sequence, ExecutionOutcome};

/// Connection parameters. The password is resolved from the environment by
/// the caller and never serialized back out.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DbSettings {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_user")]
    pub user: String,
    #[serde(default, skip_serializing)]
    pub password: Option<String>,
}

fn default_host() -> String {
    "localhost".to_string()
}

fn default_port() -> u16 {
    5432
}

fn default_user() -> String {
    // the benchmark databases are provisioned under this role
    "root".to_string()
}

impl Default for DbSettings {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            user: default_user(),
            password: None,
        }
    }
}

/// Raw result of one statement: declared columns plus text-protocol values
/// (`None` = SQL NULL). Lives only until normalization.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResultSet {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Option<String>>>,
}

#[derive(Debug, Clone)]
pub enum StatementOutcome {
    Rows(ResultSet),
    Affected(u64),
    Failed(ExecFailure),
}

#[derive(Debug, Clone)]
pub struct ExecFailure {
    pub timeout: bool,
    pub message: String,
}

/// One checked-out connection scope. Statements run strictly sequentially
/// on a session; dropping it releases the underlying connection.
#[async_trait]
pub trait SqlSession: Send {
    async fn execute(&mut self, sql: &str) -> StatementOutcome;
}

/// Seam between the evaluator and the database so the full evaluation flow
/// is testable against a scripted session.
#[async_trait]
pub trait SessionProvider: Send + Sync {
    async fn acquire(&self, database: &str) -> anyhow::Result<Box<dyn SqlSession>>;
}

/// Hands out at most one live session per database name. Tasks touching
/// different databases proceed concurrently; tasks sharing a database
/// serialize, which is what keeps their preprocess/cleanup sequences from
/// interleaving on shared tables.
pub struct ConnectionProvider {
    settings: DbSettings,
    statement_timeout: Duration,
    max_rows: usize,
    slots: Mutex<HashMap<String, Arc<DbSlot>>>,
}

struct DbSlot {
    gate: Arc<Semaphore>,
    parked: Mutex<Option<Client>>,
}

impl ConnectionProvider {
    pub fn new(settings: DbSettings, statement_timeout: Duration, max_rows: usize) -> Self {
        Self {
            settings,
            statement_timeout,
            max_rows,
            slots: Mutex::new(HashMap::new()),
        }
    }

    /// Cheap connectivity probe, used once before a run so a dead server
    /// aborts the whole run instead of failing every task.
    pub async fn ping(&self, database: &str) -> anyhow::Result<()> {
        let mut session = self.acquire_session(database).await?;
        match session.execute("SELECT 1").await {
            StatementOutcome::Failed(f) => {
                anyhow::bail!("connectivity check on {} failed: {}", database, f.message)
            }
            _ => Ok(()),
        }
    }

    async fn acquire_session(&self, database: &str) -> anyhow::Result<PgSession> {
        let slot = {
            let mut slots = self.slots.lock().unwrap_or_else(|e| e.into_inner());
            slots
                .entry(database.to_string())
                .or_insert_with(|| {
                    Arc::new(DbSlot {
                        gate: Arc::new(Semaphore::new(1)),
                        parked: Mutex::new(None),
                    })
                })
                .clone()
        };

        let permit = slot
            .gate
            .clone()
            .acquire_owned()
            .await
            .context("connection slot closed")?;

        let parked = slot.parked.lock().unwrap_or_else(|e| e.into_inner()).take();
        let client = match parked {
            Some(c) if !c.is_closed() => c,
            _ => self.connect(database).await?,
        };

        Ok(PgSession {
            client: Some(client),
            slot,
            _permit: permit,
            broken: false,
            budget: self.statement_timeout,
            max_rows: self.max_rows,
        })
    }

    async fn connect(&self, database: &str) -> anyhow::Result<Client> {
        let mut cfg = tokio_postgres::Config::new();
        cfg.host(&self.settings.host)
            .port(self.settings.port)
            .user(&self.settings.user)
            .dbname(database)
            .connect_timeout(Duration::from_secs(10));
        if let Some(pw) = &self.settings.password {
            cfg.password(pw);
        }

        let (client, connection) = cfg.connect(NoTls).await.with_context(|| {
            format!(
                "failed to connect to {}:{}/{}",
                self.settings.host, self.settings.port, database
            )
        })?;
        tokio::spawn(async move {
            if let Err(e) = connection.await {
                tracing::debug!(error = %e, "connection task ended");
            }
        });

        // server-side cancel; the client-side budget is the backstop
        client
            .batch_execute(&format!(
                "SET statement_timeout = {}",
                self.statement_timeout.as_millis()
            ))
            .await
            .context("failed to set statement_timeout")?;

        tracing::debug!(database, "opened connection");
        Ok(client)
    }
}

#[async_trait]
impl SessionProvider for ConnectionProvider {
    async fn acquire(&self, database: &str) -> anyhow::Result<Box<dyn SqlSession>> {
        Ok(Box::new(self.acquire_session(database).await?))
    }
}

struct PgSession {
    client: Option<Client>,
    slot: Arc<DbSlot>,
    _permit: OwnedSemaphorePermit,
    broken: bool,
    budget: Duration,
    max_rows: usize,
}

#[async_trait]
impl SqlSession for PgSession {
    async fn execute(&mut self, sql: &str) -> StatementOutcome {
        let client = match self.client.as_ref() {
            Some(c) => c,
            None => {
                return StatementOutcome::Failed(ExecFailure {
                    timeout: false,
                    message: "session closed".to_string(),
                })
            }
        };

        match tokio::time::timeout(self.budget, client.simple_query(sql)).await {
            Err(_) => {
                // statement may still be running server-side; the
                // connection cannot be reused
                self.broken = true;
                StatementOutcome::Failed(ExecFailure {
                    timeout: true,
                    message: format!("statement exceeded {}s budget", self.budget.as_secs()),
                })
            }
            Ok(Err(e)) => {
                let timeout = e.code() == Some(&SqlState::QUERY_CANCELED);
                StatementOutcome::Failed(ExecFailure {
                    timeout,
                    message: e.to_string(),
                })
            }
            Ok(Ok(messages)) => collect_messages(messages, self.max_rows),
        }
    }
}

impl Drop for PgSession {
    fn drop(&mut self) {
        if self.broken {
            return;
        }
        if let Some(client) = self.client.take() {
            *self.slot.parked.lock().unwrap_or_else(|e| e.into_inner()) = Some(client);
        }
    }
}

fn collect_messages(messages: Vec<SimpleQueryMessage>, max_rows: usize) -> StatementOutcome {
    let mut columns: Vec<String> = Vec::new();
    let mut rows: Vec<Vec<Option<String>>> = Vec::new();
    let mut affected = 0u64;
    let mut saw_rows = false;
    let mut capped = false;

    for msg in messages {
        match msg {
            SimpleQueryMessage::RowDescription(cols) => {
                saw_rows = true;
                columns = cols.iter().map(|c| c.name().to_string()).collect();
            }
            SimpleQueryMessage::Row(row) => {
                saw_rows = true;
                if columns.is_empty() {
                    columns = row.columns().iter().map(|c| c.name().to_string()).collect();
                }
                if rows.len() < max_rows {
                    rows.push((0..row.len()).map(|i| row.get(i).map(str::to_string)).collect());
                } else if !capped {
                    capped = true;
                    tracing::debug!(max_rows, "result capture capped");
                }
            }
            SimpleQueryMessage::CommandComplete(n) => affected = n,
            _ => {}
        }
    }

    if saw_rows {
        StatementOutcome::Rows(ResultSet { columns, rows })
    } else {
        StatementOutcome::Affected(affected)
    }
}
