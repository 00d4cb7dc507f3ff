//! A bounded recording session around the capture loop.
//!
//! A session runs [`listen_and_copy`](super::listen_and_copy) until the caller cancels, an optional
//! duration elapses, or a hard error occurs. With `restart_on_error` set, hard
//! errors are logged and the loop is restarted after the usual delay instead.

use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;
use tracing::{info, instrument, warn};

use super::client::StreamCopier;
use super::constants::DEFAULT_DELAY;
use super::error::CaptureError;
use super::listener::{ListenStats, listen_and_copy_into, wait_or_cancel};
use super::sink::SinkFactory;

/// Why a session stopped without error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEnd {
    /// The caller's token fired.
    Cancelled,
    /// The configured duration elapsed.
    DeadlineReached,
}

impl SessionEnd {
    /// Short label used in log fields.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Cancelled => "cancelled",
            Self::DeadlineReached => "deadline",
        }
    }
}

/// Totals for a finished session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionSummary {
    /// Why the session stopped.
    pub end: SessionEnd,
    /// Times the loop was restarted after a hard error.
    pub restarts: u64,
    /// Wall-clock time from start to finish.
    pub elapsed: Duration,
    /// Counters summed over every capture loop run, including runs that ended
    /// in a hard error before a restart.
    pub stats: ListenStats,
}

/// Settings for one recording session.
#[derive(Debug, Clone)]
pub struct RecordingSession {
    source_url: String,
    delay: Duration,
    duration: Option<Duration>,
    restart_on_error: bool,
}

impl RecordingSession {
    /// Session for `source_url` with the default delay, no duration limit and
    /// no restarts.
    #[must_use]
    pub fn new(source_url: impl Into<String>) -> Self {
        Self {
            source_url: source_url.into(),
            delay: DEFAULT_DELAY,
            duration: None,
            restart_on_error: false,
        }
    }

    /// Pause between capture attempts.
    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Stops the session after `duration`; `None` records until cancelled.
    #[must_use]
    pub fn with_duration(mut self, duration: Option<Duration>) -> Self {
        self.duration = duration;
        self
    }

    /// Restarts the capture loop after hard errors instead of returning them.
    #[must_use]
    pub fn with_restart_on_error(mut self, restart: bool) -> Self {
        self.restart_on_error = restart;
        self
    }

    /// URL the session records.
    #[must_use]
    pub fn source_url(&self) -> &str {
        &self.source_url
    }

    /// Runs the session to completion.
    ///
    /// A recording in progress when the deadline passes is closed cleanly.
    ///
    /// # Errors
    ///
    /// Returns the first hard [`CaptureError`] unless restarts are enabled.
    #[instrument(skip_all, fields(url = %self.source_url))]
    pub async fn run<F>(
        &self,
        copier: &StreamCopier,
        factory: &F,
        cancel: &CancellationToken,
    ) -> Result<SessionSummary, CaptureError>
    where
        F: SinkFactory,
    {
        let started = Instant::now();
        let session_token = cancel.child_token();
        let deadline = self.duration.map(|duration| {
            let token = session_token.clone();
            tokio::spawn(async move {
                tokio::time::sleep(duration).await;
                token.cancel();
            })
        });

        let result = self.run_until(copier, factory, &session_token).await;

        if let Some(timer) = deadline {
            timer.abort();
        }

        let (restarts, stats) = result?;
        let end = if cancel.is_cancelled() {
            SessionEnd::Cancelled
        } else {
            SessionEnd::DeadlineReached
        };
        let summary = SessionSummary {
            end,
            restarts,
            elapsed: started.elapsed(),
            stats,
        };
        info!(
            end = end.as_str(),
            restarts,
            recordings = stats.recordings,
            bytes = stats.bytes_copied,
            elapsed_secs = summary.elapsed.as_secs(),
            "session finished"
        );
        Ok(summary)
    }

    async fn run_until<F>(
        &self,
        copier: &StreamCopier,
        factory: &F,
        token: &CancellationToken,
    ) -> Result<(u64, ListenStats), CaptureError>
    where
        F: SinkFactory,
    {
        let mut restarts = 0;
        let mut total = ListenStats::default();

        loop {
            let run = listen_and_copy_into(
                copier,
                &self.source_url,
                factory,
                self.delay,
                token,
                &mut total,
            )
            .await;
            match run {
                Ok(()) => return Ok((restarts, total)),
                Err(e) if self.restart_on_error => {
                    warn!(error = %e, kind = ?e.kind(), "capture failed, restarting");
                    if !wait_or_cancel(self.delay, token).await {
                        return Ok((restarts, total));
                    }
                    restarts += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    use crate::test_support::memory_sink::MemorySinkFactory;
    use crate::test_support::socket_guard::start_mock_server_or_skip;
    use wiremock::matchers::method;
    use wiremock::{Mock, ResponseTemplate};

    #[test]
    fn test_session_defaults() {
        let session = RecordingSession::new("http://radio.example/live");
        assert_eq!(session.source_url(), "http://radio.example/live");
        assert_eq!(session.delay, DEFAULT_DELAY);
        assert_eq!(session.duration, None);
        assert!(!session.restart_on_error);
    }

    #[tokio::test]
    async fn test_session_stops_at_deadline() {
        let Some(mock_server) = start_mock_server_or_skip().await else {
            return;
        };
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&mock_server)
            .await;

        let session = RecordingSession::new(mock_server.uri())
            .with_delay(Duration::from_millis(10))
            .with_duration(Some(Duration::from_millis(150)));
        let copier = StreamCopier::new().unwrap();
        let sinks = MemorySinkFactory::new();

        let summary = tokio::time::timeout(
            Duration::from_secs(5),
            session.run(&copier, &sinks, &CancellationToken::new()),
        )
        .await
        .expect("session must end at its deadline")
        .unwrap();

        assert_eq!(summary.end, SessionEnd::DeadlineReached);
        assert!(summary.elapsed >= Duration::from_millis(150));
        assert!(summary.stats.unavailable >= 1);
        assert_eq!(sinks.created(), 0);
    }

    #[tokio::test]
    async fn test_session_returns_hard_error_without_restart() {
        let Some(mock_server) = start_mock_server_or_skip().await else {
            return;
        };
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .expect(1)
            .mount(&mock_server)
            .await;

        let session = RecordingSession::new(mock_server.uri()).with_delay(Duration::ZERO);
        let copier = StreamCopier::new().unwrap();
        let sinks = MemorySinkFactory::new();

        let result = session
            .run(&copier, &sinks, &CancellationToken::new())
            .await;

        assert!(
            matches!(result, Err(CaptureError::UnexpectedStatus { status: 500, .. })),
            "Expected UnexpectedStatus, got: {result:?}"
        );
    }

    #[tokio::test]
    async fn test_session_restarts_after_hard_error() {
        let Some(mock_server) = start_mock_server_or_skip().await else {
            return;
        };
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .up_to_n_times(1)
            .with_priority(1)
            .mount(&mock_server)
            .await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"after".to_vec()))
            .with_priority(2)
            .mount(&mock_server)
            .await;

        let session = RecordingSession::new(mock_server.uri())
            .with_delay(Duration::from_millis(10))
            .with_duration(Some(Duration::from_millis(300)))
            .with_restart_on_error(true);
        let copier = StreamCopier::new().unwrap();
        let sinks = MemorySinkFactory::new();

        let summary = session
            .run(&copier, &sinks, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(summary.restarts, 1);
        assert_eq!(summary.end, SessionEnd::DeadlineReached);
        assert!(sinks.created() >= 1);
        assert_eq!(sinks.outputs()[0], b"after");
    }

    #[tokio::test]
    async fn test_session_counts_recordings_from_failed_runs() {
        let Some(mock_server) = start_mock_server_or_skip().await else {
            return;
        };
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"abc".to_vec()))
            .up_to_n_times(1)
            .with_priority(1)
            .mount(&mock_server)
            .await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .up_to_n_times(1)
            .with_priority(2)
            .mount(&mock_server)
            .await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .with_priority(3)
            .mount(&mock_server)
            .await;

        let session = RecordingSession::new(mock_server.uri())
            .with_delay(Duration::from_millis(10))
            .with_duration(Some(Duration::from_millis(300)))
            .with_restart_on_error(true);
        let copier = StreamCopier::new().unwrap();
        let sinks = MemorySinkFactory::new();

        let summary = session
            .run(&copier, &sinks, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(summary.restarts, 1);
        assert_eq!(summary.stats.recordings, 1);
        assert_eq!(summary.stats.bytes_copied, 3);
        assert!(summary.stats.attempts >= 2);
        assert_eq!(sinks.created(), 1);
        assert_eq!(sinks.outputs(), vec![b"abc".to_vec()]);
    }

    #[tokio::test]
    async fn test_session_parent_cancel_reports_cancelled() {
        let Some(mock_server) = start_mock_server_or_skip().await else {
            return;
        };
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&mock_server)
            .await;

        let cancel = CancellationToken::new();
        let handle = {
            let cancel = cancel.clone();
            let url = mock_server.uri();
            tokio::spawn(async move {
                let session = RecordingSession::new(url)
                    .with_delay(Duration::from_secs(3600))
                    .with_duration(Some(Duration::from_secs(3600)));
                let copier = StreamCopier::new().unwrap();
                session
                    .run(&copier, &MemorySinkFactory::new(), &cancel)
                    .await
            })
        };

        tokio::time::sleep(Duration::from_millis(100)).await;
        cancel.cancel();
        let summary = tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("session must stop promptly")
            .unwrap()
            .unwrap();

        assert_eq!(summary.end, SessionEnd::Cancelled);
        assert_eq!(summary.restarts, 0);
    }
}
