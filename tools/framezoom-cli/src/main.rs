//! FrameZoom CLI — Command-line interface for keyframed video zoom.
//!
//! Usage:
//!   framezoom render <INPUT> -k <KEYFRAMES> -o <OUTPUT>   Apply zoom keyframes to a video
//!   framezoom validate <KEYFRAMES>                        Validate a keyframe file
//!   framezoom info <INPUT>                                Show stream information
//!   framezoom check                                       Check system capabilities
//!   framezoom serve                                       Run the HTTP edit endpoint

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use framezoom_common::config::AppConfig;

mod commands;

#[derive(Parser)]
#[command(
    name = "framezoom",
    about = "Keyframed zoom effects for recorded video",
    version,
    author
)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Apply zoom keyframes to a video file
    Render {
        /// Input video
        input: PathBuf,

        /// JSON file holding the keyframe list
        #[arg(short, long)]
        keyframes: PathBuf,

        /// Output file path
        #[arg(short, long)]
        output: PathBuf,

        /// Transform strategy: affine|center-crop
        #[arg(long)]
        strategy: Option<String>,

        /// Encode mode: direct|two-step
        #[arg(long)]
        encode: Option<String>,
    },

    /// Validate a keyframe file
    Validate {
        /// JSON file holding the keyframe list
        keyframes: PathBuf,

        /// Frame width to check zoom centers against
        #[arg(long, requires = "height")]
        width: Option<u32>,

        /// Frame height to check zoom centers against
        #[arg(long, requires = "width")]
        height: Option<u32>,
    },

    /// Show video stream information
    Info {
        /// Input video
        input: PathBuf,

        /// Print as JSON
        #[arg(long)]
        json: bool,
    },

    /// Check system capabilities
    Check,

    /// Serve the POST /edit_video endpoint
    Serve {
        /// Socket address to bind (overrides configuration)
        #[arg(long)]
        bind: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let mut config = AppConfig::load();

    // Initialize logging
    if cli.verbose {
        config.logging.level = "debug".to_string();
    }
    if cli.json_logs {
        config.logging.json = true;
    }
    framezoom_common::logging::init_logging(&config.logging);

    match cli.command {
        Commands::Render {
            input,
            keyframes,
            output,
            strategy,
            encode,
        } => commands::render::run(config, input, keyframes, output, strategy, encode).await,
        Commands::Validate {
            keyframes,
            width,
            height,
        } => commands::validate::run(keyframes, width.zip(height)),
        Commands::Info { input, json } => commands::info::run(input, json),
        Commands::Check => commands::check::run(&config),
        Commands::Serve { bind } => commands::serve::run(config, bind).await,
    }
}
