use super::args::{Cli, Command, InitArgs, RunArgs, ValidateArgs};
use sqlbench_core::config::{
    self, RunConfig, DEFAULT_MAX_ROWS, DEFAULT_PARALLEL, DEFAULT_TIMEOUT_SECONDS,
};
use sqlbench_core::dataset;
use sqlbench_core::db::ConnectionProvider;
use sqlbench_core::engine::runner::SuiteRunner;
use sqlbench_core::report;
use std::sync::Arc;
use std::time::Duration;

pub mod exit_codes {
    pub const OK: i32 = 0;
    pub const HARNESS_ERROR: i32 = 2;
}

pub async fn dispatch(cli: Cli) -> anyhow::Result<i32> {
    match cli.cmd {
        Command::Run(args) => cmd_run(args).await,
        Command::Validate(args) => cmd_validate(args),
        Command::Init(args) => cmd_init(args),
        Command::Version => {
            println!("{}", env!("CARGO_PKG_VERSION"));
            Ok(exit_codes::OK)
        }
    }
}

async fn cmd_run(args: RunArgs) -> anyhow::Result<i32> {
    let cfg = match &args.config {
        Some(path) => config::load_config(path).map_err(|e| anyhow::anyhow!(e))?,
        None => RunConfig::default(),
    };

    let parallel = args.parallel.or(cfg.settings.parallel).unwrap_or(DEFAULT_PARALLEL);
    let timeout = args
        .timeout_seconds
        .or(cfg.settings.timeout_seconds)
        .unwrap_or(DEFAULT_TIMEOUT_SECONDS);
    let max_rows = cfg.settings.max_rows.unwrap_or(DEFAULT_MAX_ROWS);

    let mut db = cfg.database;
    if let Some(host) = args.db_host {
        db.host = host;
    }
    if let Some(port) = args.db_port {
        db.port = port;
    }
    if let Some(user) = args.db_user {
        db.user = user;
    }
    let file_password = db.password.take();
    db.password =
        config::resolve_password(std::env::var("SQLBENCH_PG_PASSWORD").ok().or(file_password));

    let mut loaded = dataset::load_tasks(&args.tasks).map_err(|e| anyhow::anyhow!(e))?;
    if let Some(limit) = args.limit {
        loaded.records.truncate(limit);
    }
    if loaded.records.is_empty() {
        anyhow::bail!("no evaluable tasks in {}", args.tasks.display());
    }

    let overlay = match &args.candidates {
        Some(path) => Some(dataset::load_candidates(path).map_err(|e| anyhow::anyhow!(e))?),
        None => None,
    };

    let provider = Arc::new(ConnectionProvider::new(db, Duration::from_secs(timeout), max_rows));
    // fail fast when the server is unreachable, before spending any task work
    provider.ping(&loaded.records[0].task.selected_database).await?;

    let runner = SuiteRunner::new(provider, parallel);
    let artifacts = runner.run(loaded, overlay).await?;

    report::console::print_summary(&artifacts);
    if let Some(out) = &args.out {
        report::json::write_report(&artifacts, out)?;
        eprintln!("report written to {}", out.display());
    }
    if let Some(path) = &args.verdicts {
        report::json::write_verdicts_jsonl(&artifacts.verdicts, path)?;
        eprintln!("verdicts written to {}", path.display());
    }

    // individual task outcomes never change the exit code
    Ok(exit_codes::OK)
}

fn cmd_validate(args: ValidateArgs) -> anyhow::Result<i32> {
    let loaded = dataset::load_tasks(&args.tasks).map_err(|e| anyhow::anyhow!(e))?;

    if args.format == "json" {
        println!(
            "{}",
            serde_json::json!({
                "tasks": loaded.records.len(),
                "invalid": loaded.invalid,
            })
        );
    } else {
        println!(
            "{} evaluable task(s), {} invalid",
            loaded.records.len(),
            loaded.invalid.len()
        );
        for inv in &loaded.invalid {
            println!("  line {}: {} ({})", inv.line, inv.instance_id, inv.reason);
        }
    }

    if loaded.invalid.is_empty() {
        Ok(exit_codes::OK)
    } else {
        Ok(exit_codes::HARNESS_ERROR)
    }
}

fn cmd_init(args: InitArgs) -> anyhow::Result<i32> {
    if args.config.exists() {
        eprintln!("note: {} already exists", args.config.display());
    } else {
        config::write_sample_config(&args.config).map_err(|e| anyhow::anyhow!(e))?;
        eprintln!("created {}", args.config.display());
    }
    Ok(exit_codes::OK)
}
