//! Lap Timer - Main Entry Point

use std::path::PathBuf;

use clap::Parser;
use timer_cli::{init_logging, run, RunOptions, Settings};
use tracing::info;

/// Optical lap timer running against a synthetic track
#[derive(Parser, Debug)]
#[command(name = "lap-timer", about, long_about = None)]
struct Args {
    /// Settings file (TOML); missing files are ignored
    #[arg(short, long, default_value = "lap-timer.toml")]
    config: PathBuf,

    /// Continue a recoverable race instead of discarding it
    #[arg(long)]
    resume: bool,

    /// Skip threshold calibration
    #[arg(long)]
    no_calibrate: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let mut settings = Settings::load(&args.config)?;
    if args.no_calibrate {
        settings.calibrate = false;
    }
    init_logging(settings.log_level())?;

    info!("=== Lap Timer v{} ===", env!("CARGO_PKG_VERSION"));

    run(
        settings,
        RunOptions {
            resume: args.resume,
        },
    )
    .await?;
    Ok(())
}
