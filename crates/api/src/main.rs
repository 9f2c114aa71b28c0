//! Drowsiness Monitor - Main Entry Point

use std::path::PathBuf;

use anyhow::{Context, Result};
use api::config::AppConfig;
use api::{check_source, init_logging, run_server, simulation};
use clap::{Parser, Subcommand};
use dms::{DebouncePolicy, DmsConfig};
use tracing::info;

#[derive(Parser)]
#[command(name = "drowsy-monitor", version, about = "Eye-closure drowsiness monitor")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run acquisition and serve status and video (default)
    Serve,
    /// Open the configured frame source and read one frame
    CheckSource,
    /// Run the wheel simulation and write annotated frames to a directory
    Simulate {
        /// Output directory for frame and wheel images
        #[arg(long, default_value = "simulation")]
        out: PathBuf,
        /// Stop after this many frames
        #[arg(long)]
        max_frames: Option<u32>,
        /// Debounce policy: decay or hard_reset
        #[arg(long, default_value = "decay", value_parser = parse_policy)]
        policy: DebouncePolicy,
    },
}

fn parse_policy(value: &str) -> Result<DebouncePolicy, String> {
    match value {
        "decay" => Ok(DebouncePolicy::Decay),
        "hard_reset" | "hard-reset" => Ok(DebouncePolicy::HardReset),
        other => Err(format!("unknown policy {:?} (expected decay or hard_reset)", other)),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = AppConfig::load().context("Failed to load configuration")?;
    init_logging(&config.logging)?;

    info!("=== Drowsiness Monitor v{} ===", env!("CARGO_PKG_VERSION"));

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => {
            let report = run_server(&config).await?;
            info!(
                "Acquisition stopped after {} frames ({:?})",
                report.frames_processed, report.reason
            );
        }
        Command::CheckSource => {
            let (width, height) = check_source(&config.camera)
                .with_context(|| format!("Frame source {:?} unavailable", config.camera.device))?;
            println!("ok: {}x{}", width, height);
        }
        Command::Simulate {
            out,
            max_frames,
            policy,
        } => {
            let source = camera_capture::open_source(&config.camera)
                .with_context(|| format!("Frame source {:?} unavailable", config.camera.device))?;
            let classifier = api::build_classifier(&config.dms)?;
            let dms = DmsConfig {
                policy,
                ..config.dms.clone()
            };
            let report = tokio::task::spawn_blocking(move || {
                simulation::run_simulation(source, classifier, dms, &out, max_frames)
            })
            .await??;
            println!(
                "{} frames written to {} ({} with the wheel stopped)",
                report.frames,
                report.out_dir.display(),
                report.stopped_frames
            );
        }
    }

    Ok(())
}
