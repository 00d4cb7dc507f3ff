//! Application configuration: config file loading and merging with CLI/env.
//!
//! Precedence, lowest first: built-in defaults, the TOML config file,
//! environment variables, command-line flags. Environment and flags arrive
//! together through [`Args`].

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, bail};
use chrono::Local;
use serde::Deserialize;
use tracing::Level;
use url::Url;

use dumper_core::DatedFileAllocator;
use dumper_core::capture::{
    CONNECT_TIMEOUT_SECS, DEFAULT_DATE_FORMAT, DEFAULT_DELAY, DEFAULT_PREFERRED_EXTENSIONS,
    is_valid_date_format,
};

use crate::cli::Args;

/// Config file looked up in the working directory when `--config` is absent.
pub const DEFAULT_CONFIG_FILE: &str = "dumper.toml";

/// Longest accepted pause between attempts.
const MAX_DELAY_MS: u64 = 3_600_000;

/// TOML-backed file configuration. Every key is optional.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    pub source_url: Option<String>,
    pub output_directory: Option<PathBuf>,
    pub file_prefix: Option<String>,
    pub file_date_format: Option<String>,
    pub default_extension: Option<String>,
    pub preferred_extensions: Option<Vec<String>>,
    pub delay_ms: Option<u64>,
    pub duration_secs: Option<u64>,
    pub connect_timeout_secs: Option<u64>,
    pub restart_on_error: Option<bool>,
    pub log_level: Option<String>,
}

/// Loaded config metadata.
#[derive(Debug, Clone, Default)]
pub struct LoadedConfig {
    /// Path the config was read from, if any.
    pub path: Option<PathBuf>,
    pub config: FileConfig,
}

/// Loads the config file named by `--config`, or `dumper.toml` if present.
///
/// An explicit path must exist; the implicit one is optional.
pub fn load_file_config(explicit: Option<&Path>) -> Result<LoadedConfig> {
    let path = match explicit {
        Some(path) => path.to_path_buf(),
        None => {
            let implicit = PathBuf::from(DEFAULT_CONFIG_FILE);
            if !implicit.is_file() {
                return Ok(LoadedConfig::default());
            }
            implicit
        }
    };

    let raw = fs::read_to_string(&path)
        .with_context(|| format!("Failed to read config file '{}'", path.display()))?;
    let config = parse_config_str(&raw)
        .with_context(|| format!("Failed to parse config file '{}'", path.display()))?;
    Ok(LoadedConfig {
        path: Some(path),
        config,
    })
}

fn parse_config_str(raw: &str) -> Result<FileConfig> {
    Ok(toml::from_str(raw)?)
}

/// Fully resolved settings for one recording run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub source_url: String,
    pub output_directory: PathBuf,
    pub file_prefix: String,
    pub file_date_format: String,
    pub default_extension: Option<String>,
    pub preferred_extensions: Vec<String>,
    pub delay: Duration,
    pub duration: Option<Duration>,
    pub connect_timeout: Duration,
    pub restart_on_error: bool,
    pub log_level: Level,
}

impl Settings {
    /// Merges CLI/env values over file values over defaults, then validates.
    pub fn resolve(args: &Args, file: &FileConfig) -> Result<Self> {
        let Some(source_url) = args.source_url.clone().or_else(|| file.source_url.clone()) else {
            bail!("Missing `source_url`: pass --source-url, set SOURCE_URL, or add it to the config file");
        };

        let preferred_extensions = if args.preferred_extensions.is_empty() {
            file.preferred_extensions.clone().unwrap_or_else(|| {
                DEFAULT_PREFERRED_EXTENSIONS
                    .iter()
                    .map(|ext| (*ext).to_string())
                    .collect()
            })
        } else {
            args.preferred_extensions.clone()
        };

        let delay_ms = args.delay_ms.or(file.delay_ms);
        let duration_secs = args.duration_secs.or(file.duration_secs);
        let connect_timeout_secs = args
            .connect_timeout_secs
            .or(file.connect_timeout_secs)
            .unwrap_or(CONNECT_TIMEOUT_SECS);
        let log_level = args
            .log_level
            .clone()
            .or_else(|| file.log_level.clone())
            .unwrap_or_else(|| "info".to_string());

        validate_delay_ms(delay_ms)?;
        validate_duration_secs(duration_secs)?;
        validate_connect_timeout_secs(connect_timeout_secs)?;

        let settings = Self {
            source_url,
            output_directory: args
                .output_directory
                .clone()
                .or_else(|| file.output_directory.clone())
                .unwrap_or_else(|| PathBuf::from(".")),
            file_prefix: args
                .file_prefix
                .clone()
                .or_else(|| file.file_prefix.clone())
                .unwrap_or_default(),
            file_date_format: args
                .file_date_format
                .clone()
                .or_else(|| file.file_date_format.clone())
                .unwrap_or_else(|| DEFAULT_DATE_FORMAT.to_string()),
            default_extension: args
                .default_extension
                .clone()
                .or_else(|| file.default_extension.clone())
                .filter(|ext| !ext.trim().is_empty()),
            preferred_extensions: preferred_extensions
                .into_iter()
                .map(|ext| ext.trim().trim_start_matches('.').to_ascii_lowercase())
                .filter(|ext| !ext.is_empty())
                .collect(),
            delay: delay_ms.map_or(DEFAULT_DELAY, Duration::from_millis),
            duration: duration_secs.map(Duration::from_secs),
            connect_timeout: Duration::from_secs(connect_timeout_secs),
            restart_on_error: args
                .restart_on_error
                .or(file.restart_on_error)
                .unwrap_or(false),
            log_level: parse_log_level(&log_level)?,
        };
        settings.validate()?;
        Ok(settings)
    }

    fn validate(&self) -> Result<()> {
        let url = Url::parse(&self.source_url)
            .with_context(|| format!("Invalid config value for `source_url`: '{}'", self.source_url))?;
        if !matches!(url.scheme(), "http" | "https") {
            bail!(
                "Invalid config value for `source_url`: '{}'. Expected an http or https URL",
                self.source_url
            );
        }

        if !self.output_directory.is_dir() {
            bail!(
                "Invalid config value for `output_directory`: '{}' is not an existing directory",
                self.output_directory.display()
            );
        }

        if !is_valid_date_format(&self.file_date_format) {
            bail!(
                "Invalid config value for `file_date_format`: '{}'",
                self.file_date_format
            );
        }
        self.allocator().stem_at(&Local::now()).with_context(|| {
            format!(
                "Invalid filename settings: prefix '{}' with date format '{}'",
                self.file_prefix, self.file_date_format
            )
        })?;

        Ok(())
    }

    /// Builds the file allocator these settings describe.
    #[must_use]
    pub fn allocator(&self) -> DatedFileAllocator {
        DatedFileAllocator::new(
            self.output_directory.clone(),
            self.file_prefix.as_str(),
            self.file_date_format.as_str(),
        )
        .with_default_extension(self.default_extension.as_deref())
    }
}

fn validate_delay_ms(value: Option<u64>) -> Result<()> {
    let Some(value) = value else {
        return Ok(());
    };
    if value > MAX_DELAY_MS {
        bail!("Invalid config value for `delay_ms`: {value}. Expected range: 0..={MAX_DELAY_MS}");
    }
    Ok(())
}

fn validate_duration_secs(value: Option<u64>) -> Result<()> {
    if value == Some(0) {
        bail!("Invalid config value for `duration_secs`: 0. Expected a positive number of seconds");
    }
    Ok(())
}

fn validate_connect_timeout_secs(value: u64) -> Result<()> {
    if !(1..=3600).contains(&value) {
        bail!("Invalid config value for `connect_timeout_secs`: {value}. Expected range: 1..=3600");
    }
    Ok(())
}

fn parse_log_level(value: &str) -> Result<Level> {
    value.trim().parse::<Level>().map_err(|_| {
        anyhow::anyhow!(
            "Invalid config value for `log_level`: '{value}'. Expected one of: error, warn, info, debug, trace"
        )
    })
}
