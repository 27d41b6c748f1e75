// SPDX-License-Identifier: GPL-3.0-only

use clap::{Parser, Subcommand};
use mivonix::Config;
use mivonix::backends::camera::CaptureConfig;
use mivonix::constants::app_info;
use std::path::PathBuf;
use tracing::info;

mod cli;

#[derive(Parser)]
#[command(name = "mivonix")]
#[command(about = "Camera control station with USB keypad and white balance calibration")]
#[command(version = app_info::version())]
#[command(subcommand_required = false)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Configuration file (default: ~/.config/mivonix/config.json)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Camera device node, e.g. /dev/video2
    #[arg(short, long, global = true)]
    device: Option<String>,

    /// Capture resolution as WIDTHxHEIGHT
    #[arg(short, long, global = true)]
    resolution: Option<CaptureConfig>,

    /// Do not open the USB keypad
    #[arg(long, global = true)]
    no_keypad: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Interactive terminal control surface (default)
    Run,

    /// Run with hardware buttons only until Ctrl+C
    Headless,

    /// Capture a single frame as JPEG
    Snapshot {
        /// Output file or directory (default: ~/Pictures/IMG_TIMESTAMP.jpg)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Print the color temperature estimate of an image
    Estimate {
        /// Image file to analyze
        image: PathBuf,
    },

    /// Print keypad button presses until Ctrl+C
    Keypad,
}

/// Where terminal mode writes its log
fn log_file_path() -> PathBuf {
    dirs::state_dir()
        .or_else(dirs::cache_dir)
        .unwrap_or_else(std::env::temp_dir)
        .join("mivonix")
        .join("mivonix.log")
}

fn init_logging(default_level: &str, to_file: bool) -> Result<(), Box<dyn std::error::Error>> {
    // Set RUST_LOG environment variable to control log level
    // Examples: RUST_LOG=debug, RUST_LOG=mivonix=debug, RUST_LOG=info
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));

    if to_file {
        // Keep the terminal surface clean
        let path = log_file_path();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)?;
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::sync::Mutex::new(file))
            .with_ansi(false)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .with_level(true)
            .init();
    }
    Ok(())
}

fn load_config(cli: &Cli) -> Result<Config, Box<dyn std::error::Error>> {
    let mut config = match cli.config.clone().or_else(Config::default_path) {
        Some(path) => Config::load(&path)?,
        None => Config::default(),
    };

    if let Some(device) = &cli.device {
        config.video_device = device.clone();
    }
    if let Some(resolution) = cli.resolution {
        config.capture = resolution;
    }
    if cli.no_keypad {
        config.keypad.enabled = false;
    }
    Ok(config)
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match cli.command {
        None | Some(Commands::Run) => init_logging("warn", true)?,
        Some(Commands::Headless) | Some(Commands::Keypad) => init_logging("info", false)?,
        _ => init_logging("warn", false)?,
    }
    info!(version = app_info::version(), "mivonix starting");

    let config = load_config(&cli)?;

    match cli.command {
        None | Some(Commands::Run) => mivonix::terminal::run(&config),
        Some(Commands::Headless) => cli::headless(&config),
        Some(Commands::Snapshot { output }) => cli::snapshot(&config, output),
        Some(Commands::Estimate { image }) => cli::estimate(&image),
        Some(Commands::Keypad) => cli::keypad(&config),
    }
}
