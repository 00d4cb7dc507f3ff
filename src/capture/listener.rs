//! The capture loop: keep reconnecting to a stream forever.
//!
//! A 404 from the server means "off air, try again later" and is retried
//! silently, as is a stream the server closed normally. Any other failure ends
//! the loop and is returned to the caller, who decides whether to restart.

use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, info, info_span, instrument};

use super::client::StreamCopier;
use super::error::CaptureError;
use super::sink::SinkFactory;

/// Counters for one run of [`listen_and_copy`].
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ListenStats {
    /// Capture attempts made.
    pub attempts: u64,
    /// Attempts that created a sink.
    pub recordings: u64,
    /// Attempts answered with "stream unavailable".
    pub unavailable: u64,
    /// Bytes delivered across all recordings.
    pub bytes_copied: u64,
}

/// Repeatedly captures `url` until a hard failure or cancellation.
///
/// Between attempts the loop waits `delay`; the wait ends early when `cancel`
/// fires. An attempt in progress is also stopped by `cancel`, with its sink
/// closed cleanly.
///
/// # Errors
///
/// Returns the first error other than [`CaptureError::StreamUnavailable`].
/// Hard failures are never retried here.
pub async fn listen_and_copy<F>(
    copier: &StreamCopier,
    url: &str,
    factory: &F,
    delay: Duration,
    cancel: &CancellationToken,
) -> Result<ListenStats, CaptureError>
where
    F: SinkFactory,
{
    let mut stats = ListenStats::default();
    listen_and_copy_into(copier, url, factory, delay, cancel, &mut stats).await?;
    Ok(stats)
}

/// Runs the capture loop, adding to `stats` as attempts complete.
///
/// Counters already added stay in `stats` when a hard error is returned.
#[instrument(skip(copier, factory, cancel, stats), fields(url = %url, delay = ?delay))]
pub(crate) async fn listen_and_copy_into<F>(
    copier: &StreamCopier,
    url: &str,
    factory: &F,
    delay: Duration,
    cancel: &CancellationToken,
    stats: &mut ListenStats,
) -> Result<(), CaptureError>
where
    F: SinkFactory,
{
    let mut attempt: u64 = 0;

    while !cancel.is_cancelled() {
        attempt += 1;
        stats.attempts += 1;
        let span = info_span!("attempt", attempt);

        match copier
            .copy_stream_until(url, factory, cancel)
            .instrument(span)
            .await
        {
            Ok(outcome) => {
                if outcome.started {
                    stats.recordings += 1;
                    stats.bytes_copied += outcome.bytes_copied;
                }
                if outcome.cancelled {
                    break;
                }
                debug!("stream closed by server, reconnecting");
            }
            Err(e) if e.is_stream_unavailable() => {
                stats.unavailable += 1;
                debug!("stream unavailable, retrying");
            }
            Err(e) => {
                if let Some(bytes) = e.bytes_copied() {
                    // The sink existed and holds a partial recording.
                    stats.recordings += 1;
                    stats.bytes_copied += bytes;
                }
                info!(
                    attempts = attempt,
                    recordings = stats.recordings,
                    error = %e,
                    "capture loop terminated"
                );
                return Err(e);
            }
        }

        if !wait_or_cancel(delay, cancel).await {
            break;
        }
    }

    info!(
        attempts = attempt,
        recordings = stats.recordings,
        unavailable = stats.unavailable,
        bytes = stats.bytes_copied,
        "capture loop cancelled"
    );
    Ok(())
}

/// Sleeps for `delay`. Returns false if `cancel` fired first.
pub(crate) async fn wait_or_cancel(delay: Duration, cancel: &CancellationToken) -> bool {
    tokio::select! {
        biased;
        () = cancel.cancelled() => false,
        () = tokio::time::sleep(delay) => true,
    }
}
