use clap::Parser;

mod cli;

use cli::args::Cli;
use cli::commands::{dispatch, exit_codes};

#[tokio::main(flavor = "multi_thread")]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let code = match dispatch(cli).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("fatal: {e:?}");
            exit_codes::HARNESS_ERROR
        }
    };
    std::process::exit(code);
}
