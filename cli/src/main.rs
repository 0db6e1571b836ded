//! Phylo CLI - binary entry point.
//!
//! Runs one analysis job headless against the remote service:
//!
//! ```text
//! main() -> Cli::parse() -> run::run_job()
//!              |               submit -> start -> poll (progress on stderr)
//!              |               -> rendered tree -> downloads -> tree text on stdout
//!              v
//!           run::print_status()   one status snapshot for an existing job
//! ```
//!
//! Logs go to stderr through `tracing`; stdout only carries results.

mod args;
mod run;

use std::io::{self, IsTerminal};

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use args::{Cli, Command};

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_ansi(io::stderr().is_terminal())
                .with_writer(io::stderr),
        )
        .with(env_filter)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let cli = Cli::parse();
    let config = args::load_config(cli.config.as_deref())?;

    match cli.command {
        Command::Run(run_args) => {
            let config = run_args.apply_overrides(config, cli.service_url.as_deref())?;
            run::run_job(&run_args, &config).await
        }
        Command::Status { job_id } => {
            let config = args::with_service_url(config, cli.service_url.as_deref())?;
            run::print_status(&config, &job_id).await
        }
    }
}
