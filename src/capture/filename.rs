//! Dated, collision-free output paths for recordings.
//!
//! Every recording gets `<prefix><date>.<ext>` in the output directory. When
//! that name is taken, numeric suffixes are probed in order
//! (`<prefix><date>.1.<ext>`, `<prefix><date>.2.<ext>`, ...) and the first
//! free one wins, so a restart never overwrites an earlier recording.

use std::fmt::{self, Write as _};
use std::io;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::format::{Item, StrftimeItems};
use chrono::{DateTime, Local, TimeZone};
use tokio::fs::{File, OpenOptions};
use tokio::io::BufWriter;
use tracing::{debug, info};

use super::constants::{DEFAULT_DATE_FORMAT, MAX_SUFFIX};
use super::sink::SinkFactory;

/// Allocates dated output files and serves them as capture sinks.
///
/// One allocator per recording stream: the existence check and the file
/// creation are not atomic across allocators.
#[derive(Debug, Clone)]
pub struct DatedFileAllocator {
    directory: PathBuf,
    prefix: String,
    date_format: String,
    default_extension: Option<String>,
}

impl DatedFileAllocator {
    /// Creates an allocator for `directory`. An empty `date_format` selects
    /// [`DEFAULT_DATE_FORMAT`].
    #[must_use]
    pub fn new(
        directory: impl Into<PathBuf>,
        prefix: impl Into<String>,
        date_format: impl Into<String>,
    ) -> Self {
        let date_format = date_format.into();
        Self {
            directory: directory.into(),
            prefix: prefix.into(),
            date_format: if date_format.is_empty() {
                DEFAULT_DATE_FORMAT.to_string()
            } else {
                date_format
            },
            default_extension: None,
        }
    }

    /// Sets the extension used when detection found none.
    #[must_use]
    pub fn with_default_extension(mut self, extension: Option<&str>) -> Self {
        self.default_extension = extension.and_then(normalize_extension).map(str::to_string);
        self
    }

    /// Output directory.
    #[must_use]
    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// Allocates a free path for the current local time.
    ///
    /// # Errors
    ///
    /// See [`allocate_at`](Self::allocate_at).
    pub fn allocate(&self, extension: Option<&str>) -> io::Result<PathBuf> {
        self.allocate_at(extension, &Local::now())
    }

    /// Allocates a free path using `now` for the date part.
    ///
    /// # Errors
    ///
    /// - `InvalidInput` if the date format is invalid or the stem would
    ///   contain a path separator
    /// - `AlreadyExists` if every suffix up to [`MAX_SUFFIX`] is taken
    /// - any error from checking whether a candidate exists
    pub fn allocate_at<Tz>(&self, extension: Option<&str>, now: &DateTime<Tz>) -> io::Result<PathBuf>
    where
        Tz: TimeZone,
        Tz::Offset: fmt::Display,
    {
        let stem = self.stem_at(now)?;
        let extension = extension
            .and_then(normalize_extension)
            .or(self.default_extension.as_deref());

        for index in 0..=MAX_SUFFIX {
            let candidate = self.directory.join(candidate_name(&stem, index, extension));
            if !candidate.try_exists()? {
                debug!(path = %candidate.display(), index, "allocated output path");
                return Ok(candidate);
            }
        }

        Err(io::Error::new(
            io::ErrorKind::AlreadyExists,
            format!(
                "no free filename for stem {stem} in {} after {MAX_SUFFIX} suffixes",
                self.directory.display()
            ),
        ))
    }

    /// Returns `<prefix><formatted date>` for `now`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidInput` for an invalid date format or a stem that is
    /// empty or contains a path separator.
    pub fn stem_at<Tz>(&self, now: &DateTime<Tz>) -> io::Result<String>
    where
        Tz: TimeZone,
        Tz::Offset: fmt::Display,
    {
        let mut stem = self.prefix.clone();
        write!(stem, "{}", now.format(&self.date_format)).map_err(|_| {
            io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("invalid date format `{}`", self.date_format),
            )
        })?;

        if stem.is_empty() || stem.contains(['/', '\\']) {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("unusable filename stem `{stem}`"),
            ));
        }
        Ok(stem)
    }
}

#[async_trait]
impl SinkFactory for DatedFileAllocator {
    type Sink = BufWriter<File>;

    async fn create_sink(&self, extension: Option<&str>) -> io::Result<Self::Sink> {
        let path = self.allocate(extension)?;
        // create_new: never truncate a recording that appeared after the probe.
        let file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await
            .map_err(|e| io::Error::new(e.kind(), format!("{}: {e}", path.display())))?;
        info!(path = %path.display(), "recording to file");
        Ok(BufWriter::new(file))
    }
}

/// Returns true if `format` is a strftime layout chrono can render.
#[must_use]
pub fn is_valid_date_format(format: &str) -> bool {
    !StrftimeItems::new(format).any(|item| matches!(item, Item::Error))
}

fn normalize_extension(extension: &str) -> Option<&str> {
    let trimmed = extension.trim().trim_start_matches('.');
    (!trimmed.is_empty()).then_some(trimmed)
}

fn candidate_name(stem: &str, index: u32, extension: Option<&str>) -> String {
    let mut name = stem.to_string();
    if index > 0 {
        name.push('.');
        name.push_str(&index.to_string());
    }
    if let Some(extension) = extension {
        name.push('.');
        name.push_str(extension);
    }
    name
}
