//! HTTP side of a capture attempt.
//!
//! [`StreamCopier`] issues one GET against the stream URL, classifies the
//! response, detects the file type, and copies the body into a sink obtained
//! from a [`SinkFactory`] until the server closes the connection.

use std::pin::Pin;
use std::time::Duration;

use bytes::Bytes;
use futures_util::{Stream, StreamExt};
use reqwest::{Client, ClientBuilder, StatusCode};
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument};
use url::Url;

use super::constants::{CONNECT_TIMEOUT_SECS, DEFAULT_PREFERRED_EXTENSIONS};
use super::detect::{Detection, DetectionSource, SniffedBody, detect_extension};
use super::error::CaptureError;
use super::sink::SinkFactory;
use crate::user_agent;

/// Status the server uses to say "nothing to stream right now".
pub const UNAVAILABLE_STATUS: StatusCode = StatusCode::NOT_FOUND;

type ResponseBody = Pin<Box<dyn Stream<Item = Result<Bytes, reqwest::Error>> + Send>>;

/// Result of one completed capture attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CopyOutcome {
    /// True once a sink was created for this attempt.
    pub started: bool,
    /// Bytes delivered to the sink.
    pub bytes_copied: u64,
    /// Extension the sink was created for.
    pub extension: Option<&'static str>,
    /// How the extension was determined.
    pub detection: DetectionSource,
    /// True when the attempt was stopped by cancellation rather than by the
    /// server closing the stream.
    pub cancelled: bool,
}

impl CopyOutcome {
    fn cancelled_before_start() -> Self {
        Self {
            started: false,
            bytes_copied: 0,
            extension: None,
            detection: DetectionSource::Undetected,
            cancelled: true,
        }
    }
}

/// Copies a live HTTP stream into caller-provided sinks.
///
/// Create once and reuse for every attempt to keep connection pooling.
///
/// # Example
///
/// ```no_run
/// use dumper_core::capture::{DatedFileAllocator, StreamCopier};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let copier = StreamCopier::new()?;
/// let allocator = DatedFileAllocator::new("./recordings", "radio_", "%d_%m_%Y");
/// let outcome = copier.copy_stream("https://radio.example/stream", &allocator).await?;
/// println!("recorded {} bytes", outcome.bytes_copied);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct StreamCopier {
    client: Client,
    preferred_extensions: Vec<String>,
}

impl StreamCopier {
    /// Creates a copier with the default connect timeout and no read timeout.
    ///
    /// # Errors
    ///
    /// Returns the builder error if the HTTP client cannot be initialized.
    pub fn new() -> Result<Self, reqwest::Error> {
        Self::with_connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
    }

    /// Creates a copier with an explicit connect timeout.
    ///
    /// Only connecting is bounded: an open stream may stay silent for as long
    /// as the server likes.
    ///
    /// # Errors
    ///
    /// Returns the builder error if the HTTP client cannot be initialized.
    pub fn with_connect_timeout(connect_timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = base_client_builder(connect_timeout).build()?;
        Ok(Self::with_client(client))
    }

    /// Wraps an existing client.
    #[must_use]
    pub fn with_client(client: Client) -> Self {
        Self {
            client,
            preferred_extensions: DEFAULT_PREFERRED_EXTENSIONS
                .iter()
                .map(|ext| (*ext).to_string())
                .collect(),
        }
    }

    /// Replaces the extensions preferred when a Content-Type has several.
    #[must_use]
    pub fn with_preferred_extensions(mut self, preferred: Vec<String>) -> Self {
        self.preferred_extensions = preferred;
        self
    }

    /// Runs one capture attempt until the server closes the stream.
    ///
    /// # Errors
    ///
    /// - [`CaptureError::StreamUnavailable`] on 404, before any sink exists
    /// - [`CaptureError::InvalidUrl`] / [`CaptureError::Network`] /
    ///   [`CaptureError::UnexpectedStatus`] before any sink exists
    /// - [`CaptureError::SinkCreation`] if the factory fails
    /// - [`CaptureError::BodyRead`] / [`CaptureError::SinkWrite`] mid-transfer;
    ///   the sink is closed regardless
    #[instrument(skip(self, factory), fields(url = %url))]
    pub async fn copy_stream<F>(&self, url: &str, factory: &F) -> Result<CopyOutcome, CaptureError>
    where
        F: SinkFactory,
    {
        self.copy_stream_until(url, factory, &CancellationToken::new())
            .await
    }

    /// Like [`copy_stream`](Self::copy_stream), but stops when `cancel` fires.
    ///
    /// Cancellation before the sink exists returns without creating one;
    /// cancellation mid-transfer closes the sink so the tail is flushed.
    ///
    /// # Errors
    ///
    /// Same as [`copy_stream`](Self::copy_stream).
    #[instrument(skip(self, factory, cancel), fields(url = %url))]
    pub async fn copy_stream_until<F>(
        &self,
        url: &str,
        factory: &F,
        cancel: &CancellationToken,
    ) -> Result<CopyOutcome, CaptureError>
    where
        F: SinkFactory,
    {
        let (detection, body) = tokio::select! {
            biased;
            () = cancel.cancelled() => {
                debug!("cancelled before recording started");
                return Ok(CopyOutcome::cancelled_before_start());
            }
            opened = self.open_stream(url) => opened?,
        };

        let mut sink = factory
            .create_sink(detection.extension)
            .await
            .map_err(|e| CaptureError::sink_creation(detection.extension, e))?;
        info!(
            extension = detection.extension.unwrap_or(""),
            detection = detection.source.as_str(),
            "recording started"
        );

        let transfer = pump(body, &mut sink, url, cancel).await;

        // Close on every path; a close failure is logged, never returned.
        if let Err(e) = sink.shutdown().await {
            error!(error = %e, "error closing output");
        }

        let (bytes_copied, cancelled) = transfer?;
        info!(bytes = bytes_copied, cancelled, "recording finished");

        Ok(CopyOutcome {
            started: true,
            bytes_copied,
            extension: detection.extension,
            detection: detection.source,
            cancelled,
        })
    }

    async fn open_stream(
        &self,
        url: &str,
    ) -> Result<(Detection, SniffedBody<ResponseBody>), CaptureError> {
        let parsed = Url::parse(url).map_err(|_| CaptureError::invalid_url(url))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(CaptureError::invalid_url(url));
        }

        let response = self
            .client
            .get(parsed)
            .send()
            .await
            .map_err(|e| CaptureError::network(url, e))?;

        let status = response.status();
        if status == UNAVAILABLE_STATUS {
            debug!("stream unavailable");
            return Err(CaptureError::stream_unavailable(url));
        }
        debug!(status = status.as_u16(), "got response");
        if !status.is_success() {
            return Err(CaptureError::unexpected_status(url, status.as_u16()));
        }

        let headers = response.headers().clone();
        let body: ResponseBody = Box::pin(response.bytes_stream());
        // No sink exists yet, so a failed read here is a connection failure.
        let (detection, body) = detect_extension(&headers, body, &self.preferred_extensions)
            .await
            .map_err(|e| CaptureError::network(url, e))?;
        debug!(
            extension = ?detection.extension,
            detection = detection.source.as_str(),
            "detected extension"
        );
        Ok((detection, body))
    }
}

/// Copies the body into the sink chunk by chunk.
///
/// Returns the byte count and whether cancellation stopped the copy.
async fn pump<B, W>(
    mut body: B,
    sink: &mut W,
    url: &str,
    cancel: &CancellationToken,
) -> Result<(u64, bool), CaptureError>
where
    B: Stream<Item = Result<Bytes, reqwest::Error>> + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut bytes_copied: u64 = 0;

    loop {
        let next = tokio::select! {
            biased;
            () = cancel.cancelled() => return Ok((bytes_copied, true)),
            next = body.next() => next,
        };
        let Some(chunk_result) = next else {
            return Ok((bytes_copied, false));
        };
        let chunk = chunk_result.map_err(|e| CaptureError::body_read(url, bytes_copied, e))?;

        sink.write_all(&chunk)
            .await
            .map_err(|e| CaptureError::sink_write(bytes_copied, e))?;

        bytes_copied += chunk.len() as u64;
    }
}

fn base_client_builder(connect_timeout: Duration) -> ClientBuilder {
    Client::builder()
        .connect_timeout(connect_timeout)
        .gzip(true)
        .user_agent(user_agent::default_capture_user_agent())
}
