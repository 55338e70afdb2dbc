//! # caplog - Main Entry Point
//!
//! Supports two operational modes:
//! - **Server** (`caplog [--port N]`): collect framed traces from producers until Ctrl-C
//! - **Files** (`caplog trace.log dump.bin ...`): process logs or raw dumps and exit

use anyhow::Result;
use caplog::cli::Args;
use caplog::config::{RunConfig, RunMode};
use caplog::preflight::run_preflight_checks;
use caplog::run::execute;
use clap::Parser;
use log::warn;

// Exit codes
const EXIT_SUCCESS: i32 = 0;
const EXIT_ERROR: i32 = 1;
const EXIT_USAGE: i32 = 2;

fn main() {
    env_logger::init();
    std::process::exit(match run() {
        Ok(()) => EXIT_SUCCESS,
        Err(e) => {
            let code = exit_code_for(&e);
            eprintln!("error: {e:#}");
            code
        }
    });
}

fn exit_code_for(err: &anyhow::Error) -> i32 {
    let msg = err.to_string().to_lowercase();
    if msg.contains("no such input")
        || msg.contains("not a file")
        || msg.contains("no such rules file")
        || msg.contains("output directory is a file")
    {
        EXIT_USAGE
    } else {
        EXIT_ERROR
    }
}

async fn ctrl_c() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Cannot listen for Ctrl-C ({e}); stop the server by killing it");
        std::future::pending::<()>().await;
    }
}

#[tokio::main]
async fn run() -> Result<()> {
    let config = RunConfig::from(Args::parse());
    run_preflight_checks(&config)?;

    let quiet = config.quiet;
    if !quiet {
        println!("caplog v{}", env!("CARGO_PKG_VERSION"));
        match config.mode {
            RunMode::Files => println!("files: {}", config.files.len()),
            RunMode::Server => println!("listen: {} (Ctrl-C to stop)", config.listen),
        }
        println!("recovery: {:?}", config.recovery);
    }

    let outcome = execute(config, ctrl_c()).await?;

    if !quiet {
        let pipeline = &outcome.summary.pipeline;
        eprintln!(
            "\n{:.1}s, {} sources, {} lines, {} events (checks: {} passed / {} failed, errors: {}, warnings: {})",
            outcome.summary.duration_secs,
            outcome.summary.sources.len(),
            pipeline.lines.seen,
            pipeline.events,
            pipeline.validation.checks_passed,
            pipeline.validation.checks_failed,
            pipeline.lines.errors_reported,
            pipeline.lines.warnings_reported,
        );
        println!("output: {}", outcome.workdir.display());
    }

    Ok(())
}
