use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "reelforge")]
#[command(author, version, about = "Video post-processing pipeline")]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Process a video through the pipeline described by a JSON request
    Run {
        /// Request file (JSON)
        #[arg(required = true)]
        request: PathBuf,

        /// Job id to use instead of a random one
        #[arg(long)]
        job_id: Option<String>,

        /// Directory receiving the delivered video
        #[arg(short, long)]
        output_dir: Option<PathBuf>,

        /// Cancel the job after this many seconds
        #[arg(long)]
        timeout: Option<u64>,

        /// Show the stages that would run without executing them
        #[arg(long)]
        dry_run: bool,

        /// Print the result as JSON
        #[arg(long)]
        json: bool,
    },

    /// Check that required external tools are available
    CheckTools,

    /// Validate configuration file
    Validate {
        /// Config file to validate (uses default if not specified)
        config: Option<PathBuf>,
    },

    /// Render caption segments (JSON array) as a SubRip document
    Subtitles {
        /// Segments file (JSON)
        #[arg(required = true)]
        segments: PathBuf,
    },

    /// Display version information
    Version,
}
