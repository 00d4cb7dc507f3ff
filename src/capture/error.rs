//! Error types for the capture module.
//!
//! Every failure of a capture attempt maps to exactly one [`CaptureError`]
//! variant. Only [`CaptureError::StreamUnavailable`] is expected during normal
//! operation; everything else is a hard failure that the capture loop hands
//! back to its caller.

use thiserror::Error;

/// Errors that can occur during a capture attempt.
#[derive(Debug, Error)]
pub enum CaptureError {
    /// The server answered with the "nothing to stream" status (404).
    #[error("stream unavailable at {url}")]
    StreamUnavailable {
        /// The source URL.
        url: String,
    },

    /// Network-level error (DNS resolution, connection refused, TLS errors, etc.)
    ///
    /// Also covers a body read that fails while the file type is being
    /// detected, before any sink exists.
    #[error("network error connecting to {url}: {source}")]
    Network {
        /// The source URL.
        url: String,
        /// The underlying network error.
        #[source]
        source: reqwest::Error,
    },

    /// The provided URL is malformed or not http(s).
    #[error("invalid URL: {url}")]
    InvalidUrl {
        /// The invalid URL string.
        url: String,
    },

    /// The server answered with a status other than success or not-found.
    #[error("unexpected HTTP {status} from {url}")]
    UnexpectedStatus {
        /// The source URL.
        url: String,
        /// The HTTP status code.
        status: u16,
    },

    /// The sink factory could not provide an output.
    #[error("failed to create output for extension {}: {source}", .extension.as_deref().unwrap_or("<none>"))]
    SinkCreation {
        /// The extension the sink was requested for.
        extension: Option<String>,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// Reading the response body failed after the sink was created.
    #[error("stream from {url} failed after {bytes_copied} bytes: {source}")]
    BodyRead {
        /// The source URL.
        url: String,
        /// Bytes written to the sink before the failure.
        bytes_copied: u64,
        /// The underlying network error.
        #[source]
        source: reqwest::Error,
    },

    /// Writing to the sink failed mid-transfer.
    #[error("writing output failed after {bytes_copied} bytes: {source}")]
    SinkWrite {
        /// Bytes written to the sink before the failure.
        bytes_copied: u64,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },
}

/// Coarse classification of a [`CaptureError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Server has nothing to stream right now; retried by the capture loop.
    Unavailable,
    /// Connection-level failure or unusable URL.
    Transport,
    /// Response status outside {success, not-found}.
    Status,
    /// No output could be created.
    SinkCreation,
    /// Failure while bytes were flowing.
    Transfer,
}

impl CaptureError {
    /// Creates a stream-unavailable error.
    pub fn stream_unavailable(url: impl Into<String>) -> Self {
        Self::StreamUnavailable { url: url.into() }
    }

    /// Creates a network error from a reqwest error.
    pub fn network(url: impl Into<String>, source: reqwest::Error) -> Self {
        Self::Network {
            url: url.into(),
            source,
        }
    }

    /// Creates an invalid URL error.
    pub fn invalid_url(url: impl Into<String>) -> Self {
        Self::InvalidUrl { url: url.into() }
    }

    /// Creates an unexpected status error.
    pub fn unexpected_status(url: impl Into<String>, status: u16) -> Self {
        Self::UnexpectedStatus {
            url: url.into(),
            status,
        }
    }

    /// Creates a sink creation error.
    pub fn sink_creation(extension: Option<&str>, source: std::io::Error) -> Self {
        Self::SinkCreation {
            extension: extension.map(str::to_string),
            source,
        }
    }

    /// Creates a body read error.
    pub fn body_read(url: impl Into<String>, bytes_copied: u64, source: reqwest::Error) -> Self {
        Self::BodyRead {
            url: url.into(),
            bytes_copied,
            source,
        }
    }

    /// Creates a sink write error.
    pub fn sink_write(bytes_copied: u64, source: std::io::Error) -> Self {
        Self::SinkWrite {
            bytes_copied,
            source,
        }
    }

    /// Returns the failure class of this error.
    #[must_use]
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::StreamUnavailable { .. } => FailureKind::Unavailable,
            Self::Network { .. } | Self::InvalidUrl { .. } => FailureKind::Transport,
            Self::UnexpectedStatus { .. } => FailureKind::Status,
            Self::SinkCreation { .. } => FailureKind::SinkCreation,
            Self::BodyRead { .. } | Self::SinkWrite { .. } => FailureKind::Transfer,
        }
    }

    /// Returns true for the expected "nothing to stream" condition.
    #[must_use]
    pub fn is_stream_unavailable(&self) -> bool {
        self.kind() == FailureKind::Unavailable
    }

    /// Bytes delivered to the sink before a transfer failure, if any.
    #[must_use]
    pub fn bytes_copied(&self) -> Option<u64> {
        match self {
            Self::BodyRead { bytes_copied, .. } | Self::SinkWrite { bytes_copied, .. } => {
                Some(*bytes_copied)
            }
            _ => None,
        }
    }
}

// Note: no `From<reqwest::Error>` or `From<std::io::Error>` impls. Every
// variant needs context (URL, byte count) the source errors don't carry, so
// the helper constructors above are the only way in.
