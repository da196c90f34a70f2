//! gnc-link CLI - watch and drive a CNC controller from the terminal.
//!
//! This is the main binary entry point. See the `gnc_link` library for the
//! core functionality.

use anyhow::{Context, Result};
use clap::Parser;
use gnc_link::cli::{self, Cli};
use mimalloc::MiMalloc;

/// Global allocator configured per M-MIMALLOC-APPS guideline.
#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

fn init_logging() -> Result<()> {
    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));
    builder.format_timestamp_secs();

    // Stream values go to stdout; logs go to stderr or GNC_LOG_FILE.
    if let Ok(path) = std::env::var("GNC_LOG_FILE") {
        let log_file = std::fs::File::create(&path)
            .with_context(|| format!("Failed to create log file at {path}"))?;
        builder.target(env_logger::Target::Pipe(Box::new(log_file)));
    }

    builder.init();
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    init_logging()?;
    let cli = Cli::parse();
    cli::run(cli).await
}
