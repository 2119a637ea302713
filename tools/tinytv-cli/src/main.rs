//! TinyTV CLI: prepare videos for the TinyTV.
//!
//! Usage:
//!   tinytv convert <FILES>... -o <DIR>   Convert each file for the device
//!   tinytv combine <FILES>...            Join files into one device video
//!   tinytv estimate <FILE>               Estimate the converted size
//!   tinytv probe <FILE>                  Show stream info and conformance
//!   tinytv thumbnail <FILE>              Extract a preview frame
//!   tinytv check                         Check encoder/prober availability
//!   tinytv config                        Show or write the configuration

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tinytv_common::config::AppConfig;

mod commands;

#[derive(Parser)]
#[command(
    name = "tinytv",
    about = "Convert and combine videos for the TinyTV",
    version,
    author
)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Config file (defaults to $XDG_CONFIG_HOME/tinytv/config.json)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Convert each file into a device-ready AVI
    Convert {
        /// Input videos, processed in order
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Output directory
        #[arg(short, long)]
        output: PathBuf,

        /// Quality 2 (best, largest) to 31 (worst, smallest)
        #[arg(short, long, value_parser = clap::value_parser!(u8).range(2..=31))]
        quality: Option<u8>,

        /// Scale mode: contain|cover|stretch
        #[arg(long)]
        scale: Option<String>,

        /// Target frame rate: 12 or 24
        #[arg(long)]
        fps: Option<u32>,

        /// Apply loudness normalization
        #[arg(long)]
        normalize_audio: bool,

        /// Channel number prefixed to output names (e.g. 03)
        #[arg(short, long, default_value = "")]
        channel: String,
    },

    /// Join files into a single device-ready AVI
    Combine {
        /// Input videos in playback order
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Output directory (defaults to the current directory)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Output name (defaults to combined_episodes)
        #[arg(short, long)]
        name: Option<String>,

        /// Target frame rate: 12 or 24
        #[arg(long)]
        fps: Option<u32>,

        /// Quality 2 (best, largest) to 31 (worst, smallest)
        #[arg(short, long, value_parser = clap::value_parser!(u8).range(2..=31))]
        quality: Option<u8>,

        /// Channel number prefixed to the output name (e.g. 03)
        #[arg(short, long, default_value = "")]
        channel: String,
    },

    /// Estimate the size of a converted file
    Estimate {
        /// Input video
        file: PathBuf,

        /// Quality 2 (best, largest) to 31 (worst, smallest)
        #[arg(short, long, value_parser = clap::value_parser!(u8).range(2..=31))]
        quality: Option<u8>,

        /// Scale mode: contain|cover|stretch
        #[arg(long)]
        scale: Option<String>,

        /// Target frame rate: 12 or 24
        #[arg(long)]
        fps: Option<u32>,

        /// Measure the source first for a calibrated estimate
        #[arg(long)]
        calibrate: bool,
    },

    /// Show stream info and whether a file matches the device format
    Probe {
        /// File to inspect
        file: PathBuf,

        /// Frame rate the file is expected to have
        #[arg(long)]
        fps: Option<u32>,

        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Extract a preview frame as it would appear on the device
    Thumbnail {
        /// Input video
        file: PathBuf,

        /// Where to write the image (defaults to a temporary file)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Scale mode: contain|cover|stretch
        #[arg(long)]
        scale: Option<String>,

        /// JPEG quality 2 (best) to 31 (worst)
        #[arg(short, long, value_parser = clap::value_parser!(u8).range(2..=31))]
        quality: Option<u8>,

        /// Write a PNG instead of a JPEG
        #[arg(long)]
        png: bool,
    },

    /// Check encoder and prober availability
    Check,

    /// Show the effective configuration
    Config {
        /// Write the effective configuration to the config file
        #[arg(long)]
        write: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => AppConfig::load_from(path),
        None => AppConfig::load(),
    };

    let mut logging = config.logging.clone();
    if cli.verbose {
        logging.level = "debug".to_string();
    }
    tinytv_common::logging::init_logging(&logging);

    match cli.command {
        Commands::Convert {
            files,
            output,
            quality,
            scale,
            fps,
            normalize_audio,
            channel,
        } => {
            commands::convert::run(
                &config,
                files,
                output,
                quality,
                scale,
                fps,
                normalize_audio,
                channel,
            )
            .await
        }
        Commands::Combine {
            files,
            output,
            name,
            fps,
            quality,
            channel,
        } => commands::combine::run(&config, files, output, name, fps, quality, channel).await,
        Commands::Estimate {
            file,
            quality,
            scale,
            fps,
            calibrate,
        } => commands::estimate::run(&config, file, quality, scale, fps, calibrate).await,
        Commands::Probe { file, fps, json } => commands::probe::run(&config, file, fps, json),
        Commands::Thumbnail {
            file,
            output,
            scale,
            quality,
            png,
        } => commands::thumbnail::run(&config, file, output, scale, quality, png),
        Commands::Check => commands::check::run(&config),
        Commands::Config { write } => commands::config::run(&config, cli.config, write),
    }
}
