//! Output sinks for captured bytes.
//!
//! The copier does not know where bytes end up. It asks a [`SinkFactory`] for
//! one sink per attempt, writes into it, and shuts it down when the attempt
//! ends. Anything implementing [`AsyncWrite`] works as a sink.

use std::io;

use async_trait::async_trait;
use tokio::io::AsyncWrite;

/// Creates the output for one capture attempt.
///
/// Called at most once per attempt, and only after the extension of the
/// incoming stream is known.
#[async_trait]
pub trait SinkFactory: Send + Sync {
    /// Writable, closable destination for the captured bytes.
    type Sink: AsyncWrite + Unpin + Send;

    /// Creates a sink for a stream with the given extension (no leading dot).
    async fn create_sink(&self, extension: Option<&str>) -> io::Result<Self::Sink>;
}

