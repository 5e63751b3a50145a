//! facevec - webcam face vector publisher
//!
//! Publishes the direction from the frame centre to each detected face as
//! JSON, for a desktop widget to poll.
//!
//! # Usage
//!
//! ```bash
//! # Keep a snapshot fresh with any capture tool, then publish from it
//! ffmpeg -f v4l2 -i /dev/video0 -update 1 -r 2 /tmp/webcam.jpg &
//! facevec --snapshot /tmp/webcam.jpg
//!
//! # Replay a directory of frames into a scratch target, one cycle
//! facevec --dir ./frames --output /tmp/vector_data/vector.json --once
//!
//! # Show the effective configuration
//! facevec --config facevec.toml check-config
//! ```
//!
//! # Environment Variables
//!
//! - `FACEVEC_CONFIG`: Path to the TOML config (when `--config` is not given)
//! - `RUST_LOG`: Logging level (default: info)

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;
use tracing::info;

use facevec::config::{CameraKind, FacevecConfig};
use facevec::pipeline::{AppContext, PollLoop};

// ============================================================================
// CLI Arguments
// ============================================================================

#[derive(Parser, Debug)]
#[command(name = "facevec")]
#[command(about = "Publish webcam face direction vectors as atomically replaced JSON")]
#[command(version)]
struct CliArgs {
    /// Config file (otherwise $FACEVEC_CONFIG, then ./facevec.toml)
    #[arg(short, long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Read frames from a snapshot file that a capture tool keeps overwriting
    #[arg(long, value_name = "PATH", conflicts_with_all = ["dir", "synthetic"])]
    snapshot: Option<String>,

    /// Replay every image in a directory, looping
    #[arg(long, value_name = "PATH", conflicts_with = "synthetic")]
    dir: Option<String>,

    /// Use blank synthetic frames (pipeline smoke test)
    #[arg(long)]
    synthetic: bool,

    /// Publish to this file instead of the configured targets (repeatable)
    #[arg(short, long, value_name = "PATH")]
    output: Vec<String>,

    /// Run a single cycle and exit
    #[arg(long)]
    once: bool,

    /// Override the poll interval
    #[arg(long, value_name = "MS")]
    interval_ms: Option<u64>,

    /// Emit logs as JSON lines
    #[arg(long)]
    json_logs: bool,

    #[command(subcommand)]
    command: Option<SubCommand>,
}

#[derive(clap::Subcommand, Debug)]
enum SubCommand {
    /// Validate the configuration, print it as TOML and exit
    CheckConfig,
}

impl CliArgs {
    /// Fold command-line overrides into the loaded config.
    fn apply_overrides(&self, config: &mut FacevecConfig) {
        if let Some(path) = &self.snapshot {
            config.camera.source = CameraKind::Snapshot;
            config.camera.path = Some(path.clone());
        } else if let Some(path) = &self.dir {
            config.camera.source = CameraKind::Directory;
            config.camera.path = Some(path.clone());
        } else if self.synthetic {
            config.camera.source = CameraKind::Synthetic;
        }

        if !self.output.is_empty() {
            config.publish.targets = self.output.clone();
        }
        if let Some(ms) = self.interval_ms {
            config.poll.interval_ms = ms;
        }
    }
}

/// Logs go to stderr so `check-config` output stays clean on stdout.
fn init_logging(json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    if json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_target(false)
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .with_writer(std::io::stderr)
            .init();
    }
}

// ============================================================================
// Main Entry Point
// ============================================================================

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let args = CliArgs::parse();
    init_logging(args.json_logs);

    let mut config =
        FacevecConfig::load(args.config.as_deref()).context("Failed to load configuration")?;
    args.apply_overrides(&mut config);
    config
        .validate()
        .context("Invalid configuration after command-line overrides")?;

    if let Some(SubCommand::CheckConfig) = args.command {
        print!("{}", config.to_toml()?);
        return Ok(());
    }

    info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    info!("  facevec - Face Vector Publisher");
    info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    info!("");

    let targets = config.publish.target_paths();

    let context = AppContext::from_config(&config).context("Failed to initialise pipeline")?;
    info!("📥 Input: {} camera", context.camera_name());
    for target in &targets {
        info!("📤 Output: {}", target.display());
    }
    info!(
        "   Units: {:?} | Empty cycles: {}",
        config.vectors.units, config.publish.empty_policy
    );
    info!("");

    // Graceful shutdown via Ctrl+C
    let cancel_token = CancellationToken::new();
    let shutdown_token = cancel_token.clone();
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("🛑 Received Ctrl+C, initiating shutdown...");
        shutdown_token.cancel();
    });

    let mut poll_loop = PollLoop::new(context, &config.poll, cancel_token);
    if args.once {
        poll_loop = poll_loop.once();
    }
    poll_loop.run().await;

    info!("");
    info!("✓ facevec shutdown complete");
    Ok(())
}
