//! Radio Dumper Core Library
//!
//! Records live HTTP radio streams into dated files on disk. A stream that is
//! off air (404) is polled until it comes back, each broadcast lands in its own
//! file, and the file type is taken from the response headers or, failing
//! that, from the leading bytes of the stream.
//!
//! # Architecture
//!
//! - [`capture`] - stream copier, type detection, capture loop, file allocation
//!
//! The `dumper` binary adds configuration loading and signal handling on top.

// Clippy lints - strict for library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod capture;
#[cfg(test)]
pub(crate) mod test_support;
mod user_agent;

// Re-export commonly used types
pub use capture::{
    CaptureError, CopyOutcome, DatedFileAllocator, FailureKind, ListenStats, RecordingSession,
    SessionEnd, SessionSummary, SinkFactory, StreamCopier, listen_and_copy,
};
