//! CLI argument definitions using clap derive macros.
//!
//! Every recording option is optional here so that values from the config
//! file can fill the gaps; defaults are applied in [`crate::app_config`].

use std::path::PathBuf;

use clap::Parser;

/// Record a live HTTP radio stream into dated files.
///
/// Dumper polls the stream URL, records every broadcast into its own file
/// named after the current date, and waits for the stream to come back when
/// it goes off air.
#[derive(Parser, Debug)]
#[command(name = "dumper")]
#[command(author, version, about)]
pub struct Args {
    /// Increase output verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long)]
    pub quiet: bool,

    /// Config file (defaults to ./dumper.toml when present)
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Stream URL to record (http or https)
    #[arg(short = 'u', long, env = "SOURCE_URL")]
    pub source_url: Option<String>,

    /// Directory recordings are written to
    #[arg(short = 'o', long, env = "OUTPUT_DIRECTORY", value_name = "DIR")]
    pub output_directory: Option<PathBuf>,

    /// Text placed before the date in each filename
    #[arg(long, env = "FILE_PREFIX")]
    pub file_prefix: Option<String>,

    /// strftime layout of the date in each filename
    #[arg(long, env = "FILE_DATE_FORMAT", value_name = "FORMAT")]
    pub file_date_format: Option<String>,

    /// Extension used when the stream type cannot be detected
    #[arg(long, env = "DEFAULT_EXTENSION", value_name = "EXT")]
    pub default_extension: Option<String>,

    /// Preferred extensions when a content type has several (comma separated)
    #[arg(long = "prefer", env = "PREFERRED_EXTENSIONS", value_delimiter = ',', value_name = "EXT")]
    pub preferred_extensions: Vec<String>,

    /// Pause between capture attempts in milliseconds (max 3600000)
    #[arg(short = 'd', long, env = "DELAY_MS", value_parser = clap::value_parser!(u64).range(0..=3_600_000))]
    pub delay_ms: Option<u64>,

    /// Stop recording after this many seconds (records until Ctrl-C when unset)
    #[arg(long, env = "DURATION_SECS", value_parser = clap::value_parser!(u64).range(1..))]
    pub duration_secs: Option<u64>,

    /// HTTP connect timeout in seconds (1-3600)
    #[arg(long, env = "CONNECT_TIMEOUT_SECS", value_parser = clap::value_parser!(u64).range(1..=3600))]
    pub connect_timeout_secs: Option<u64>,

    /// Keep recording after hard failures instead of exiting
    #[arg(long, env = "RESTART_ON_ERROR", num_args = 0..=1, default_missing_value = "true")]
    pub restart_on_error: Option<bool>,

    /// Log level when neither RUST_LOG nor -v/-q are given
    #[arg(long, env = "LOG_LEVEL", value_name = "LEVEL")]
    pub log_level: Option<String>,
}
