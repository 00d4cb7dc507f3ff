//! CLI entry point for the radio dumper.

use anyhow::{Context, Result};
use clap::Parser;
use dumper_core::{RecordingSession, StreamCopier};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

mod app_config;
mod cli;

use app_config::{Settings, load_file_config};
use cli::Args;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments first (before tracing, so --help works without logs)
    let args = Args::parse();

    let loaded = load_file_config(args.config.as_deref())?;
    let settings = Settings::resolve(&args, &loaded.config)?;

    init_tracing(&args, &settings);

    debug!(?args, "CLI arguments parsed");
    if let Some(path) = &loaded.path {
        debug!(path = %path.display(), "Loaded config file");
    }
    info!(
        url = %settings.source_url,
        dir = %settings.output_directory.display(),
        "Dumper starting"
    );

    let copier = StreamCopier::with_connect_timeout(settings.connect_timeout)
        .context("Failed to initialize HTTP client")?
        .with_preferred_extensions(settings.preferred_extensions.clone());
    let allocator = settings.allocator();
    let session = RecordingSession::new(settings.source_url.clone())
        .with_delay(settings.delay)
        .with_duration(settings.duration)
        .with_restart_on_error(settings.restart_on_error);

    // Ctrl-C stops the session; the current file is flushed and closed.
    let cancel = CancellationToken::new();
    let signal_token = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, finishing current recording");
            signal_token.cancel();
        }
    });

    let summary = session
        .run(&copier, &allocator, &cancel)
        .await
        .with_context(|| format!("Recording {} failed", settings.source_url))?;

    info!(
        end = summary.end.as_str(),
        recordings = summary.stats.recordings,
        bytes = summary.stats.bytes_copied,
        restarts = summary.restarts,
        "Dumper finished"
    );

    Ok(())
}

/// Installs the log subscriber.
///
/// Priority: RUST_LOG env var > quiet flag > verbose flag > configured level.
fn init_tracing(args: &Args, settings: &Settings) {
    let default_level = if args.quiet {
        "error".to_string()
    } else {
        match args.verbose {
            0 => settings.log_level.as_str().to_ascii_lowercase(),
            1 => "debug".to_string(),
            _ => "trace".to_string(),
        }
    };

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(filter)
        .init();
}
