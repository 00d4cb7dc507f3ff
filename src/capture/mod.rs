//! Live stream capture.
//!
//! This module records an HTTP audio stream into dated files:
//! - [`StreamCopier`] runs one capture attempt (GET, classify, detect, copy)
//! - [`detect_extension`] picks the file extension from headers or body bytes
//! - [`listen_and_copy`] retries attempts while the stream is off air
//! - [`RecordingSession`] bounds the loop by duration and optional restarts
//! - [`DatedFileAllocator`] hands out collision-free output files
//!
//! # Example
//!
//! ```no_run
//! use std::time::Duration;
//!
//! use dumper_core::capture::{DatedFileAllocator, RecordingSession, StreamCopier};
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let copier = StreamCopier::new()?;
//! let allocator = DatedFileAllocator::new("./recordings", "radio_", "%d_%m_%Y");
//! let summary = RecordingSession::new("https://radio.example/live")
//!     .with_delay(Duration::from_secs(5))
//!     .with_duration(Some(Duration::from_secs(3600)))
//!     .run(&copier, &allocator, &CancellationToken::new())
//!     .await?;
//! println!("{} recordings", summary.stats.recordings);
//! # Ok(())
//! # }
//! ```

mod client;
pub mod constants;
mod detect;
mod error;
mod filename;
mod listener;
mod session;
mod sink;

pub use client::{CopyOutcome, StreamCopier, UNAVAILABLE_STATUS};
pub use constants::{
    CONNECT_TIMEOUT_SECS, DEFAULT_DATE_FORMAT, DEFAULT_DELAY, DEFAULT_PREFERRED_EXTENSIONS,
    MAX_SUFFIX, SNIFF_PREFIX_LEN,
};
pub use detect::{
    Detection, DetectionSource, SniffedBody, detect_extension, extension_from_content_type,
    sniff_extension,
};
pub use error::{CaptureError, FailureKind};
pub use filename::{DatedFileAllocator, is_valid_date_format};
pub use listener::{ListenStats, listen_and_copy};
pub use session::{RecordingSession, SessionEnd, SessionSummary};
pub use sink::SinkFactory;
