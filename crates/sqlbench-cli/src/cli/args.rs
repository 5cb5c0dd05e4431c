use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "sqlbench",
    version,
    about = "Execution-based scorer for text-to-SQL benchmarks"
)]
pub struct Cli {
    #[command(subcommand)]
    pub cmd: Command,
}

#[derive(Subcommand)]
pub enum Command {
    Run(RunArgs),
    Validate(ValidateArgs),
    Init(InitArgs),
    Version,
}

#[derive(Parser, Clone)]
pub struct RunArgs {
    /// task JSONL, optionally carrying pred_sqls per record
    #[arg(long)]
    pub tasks: PathBuf,

    /// candidate JSONL overriding per-record predictions
    #[arg(long)]
    pub candidates: Option<PathBuf>,

    /// optional YAML run config
    #[arg(long)]
    pub config: Option<PathBuf>,

    #[arg(long, env = "SQLBENCH_DB_HOST")]
    pub db_host: Option<String>,

    #[arg(long, env = "SQLBENCH_DB_PORT")]
    pub db_port: Option<u16>,

    #[arg(long, env = "SQLBENCH_DB_USER")]
    pub db_user: Option<String>,

    /// worker-pool size (one task evaluation per worker)
    #[arg(long)]
    pub parallel: Option<usize>,

    /// per-statement budget in seconds
    #[arg(long)]
    pub timeout_seconds: Option<u64>,

    /// evaluate only the first N tasks
    #[arg(long)]
    pub limit: Option<usize>,

    /// write the full JSON report here
    #[arg(long)]
    pub out: Option<PathBuf>,

    /// write per-task verdicts as JSONL
    #[arg(long)]
    pub verdicts: Option<PathBuf>,
}

#[derive(Parser, Clone)]
pub struct ValidateArgs {
    #[arg(long)]
    pub tasks: PathBuf,

    /// output format: text | json
    #[arg(long, default_value = "text")]
    pub format: String,
}

#[derive(Parser, Clone)]
pub struct InitArgs {
    #[arg(long, default_value = "sqlbench.yaml")]
    pub config: PathBuf,
}
