//! Quiver - Arrow marker resolver
//!
//! Reads arrow marker messages from a file, resolves each one against the
//! configured frame tree, and prints what would be drawn.

mod config;
mod report;
mod session;

use anyhow::{Context, Result};
use clap::Parser;
use quiver_core::message::load_markers;
use std::path::PathBuf;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use session::Session;

#[derive(Parser, Debug)]
#[command(name = "quiver")]
#[command(about = "Resolve arrow marker messages into renderable arrows")]
#[command(version)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "quiver.toml")]
    config: PathBuf,

    /// Override the fixed frame from the configuration
    #[arg(short, long)]
    fixed_frame: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Print one JSON object per message
    #[arg(long)]
    json: bool,

    /// Write a default configuration file and exit
    #[arg(long)]
    init: bool,

    /// Marker file (JSON array or JSON lines)
    markers: Option<PathBuf>,
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(true)
        .with_writer(std::io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    if args.init {
        config::save_default_config(&args.config)?;
        println!("Wrote default configuration to {}", args.config.display());
        return Ok(());
    }

    let mut config = config::load_config(&args.config)?;
    if let Some(fixed_frame) = args.fixed_frame {
        config.display.fixed_frame = fixed_frame;
    }
    let frames = config.to_frame_tree()?;

    info!(
        fixed_frame = %config.display.fixed_frame,
        frames = frames.frame_names().len(),
        "Configuration loaded"
    );

    let markers_path = args
        .markers
        .context("No marker file given (pass a path, or --init to write a config)")?;
    let messages = load_markers(&markers_path)
        .with_context(|| format!("Failed to load markers from {}", markers_path.display()))?;

    let mut session = Session::new();
    for message in &messages {
        let Some(report) = session.handle(message, &frames, &config.display.fixed_frame) else {
            continue;
        };
        if args.json {
            println!("{}", serde_json::to_string(&report)?);
        } else {
            println!("{}", report.to_text());
        }
    }

    info!(
        messages = messages.len(),
        markers = session.marker_count(),
        visible = session.visible_count(),
        worst_status = %session.status.worst_level(),
        "Done"
    );

    Ok(())
}
