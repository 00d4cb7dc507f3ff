use std::io;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::task::{Context, Poll};

use async_trait::async_trait;
use tokio::io::AsyncWrite;

use crate::capture::SinkFactory;

#[derive(Debug, Default)]
struct MemoryState {
    outputs: Vec<Vec<u8>>,
    extensions: Vec<Option<String>>,
    closed: usize,
}

/// Sink factory keeping every sink's bytes in memory.
#[derive(Debug, Clone, Default)]
pub struct MemorySinkFactory {
    state: Arc<Mutex<MemoryState>>,
    fail_creation: bool,
    fail_writes: bool,
    fail_shutdown: bool,
}

impl MemorySinkFactory {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Factory whose `create_sink` always fails.
    #[must_use]
    pub fn failing_creation() -> Self {
        Self {
            fail_creation: true,
            ..Self::default()
        }
    }

    /// Factory whose sinks reject every write.
    #[must_use]
    pub fn failing_writes() -> Self {
        Self {
            fail_writes: true,
            ..Self::default()
        }
    }

    /// Factory whose sinks accept writes but fail to close.
    #[must_use]
    pub fn failing_shutdown() -> Self {
        Self {
            fail_shutdown: true,
            ..Self::default()
        }
    }

    /// Factory whose sinks reject every write and then fail to close.
    #[must_use]
    pub fn failing_writes_and_shutdown() -> Self {
        Self {
            fail_writes: true,
            fail_shutdown: true,
            ..Self::default()
        }
    }

    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Bytes of each created sink, in creation order.
    #[must_use]
    pub fn outputs(&self) -> Vec<Vec<u8>> {
        self.lock().outputs.clone()
    }

    /// All bytes written across sinks.
    #[must_use]
    pub fn concatenated(&self) -> Vec<u8> {
        self.lock().outputs.concat()
    }

    /// Extensions the sinks were requested with.
    #[must_use]
    pub fn extensions(&self) -> Vec<Option<String>> {
        self.lock().extensions.clone()
    }

    #[must_use]
    pub fn created(&self) -> usize {
        self.lock().outputs.len()
    }

    #[must_use]
    pub fn closed(&self) -> usize {
        self.lock().closed
    }
}

#[async_trait]
impl SinkFactory for MemorySinkFactory {
    type Sink = MemorySink;

    async fn create_sink(&self, extension: Option<&str>) -> io::Result<Self::Sink> {
        if self.fail_creation {
            return Err(io::Error::new(
                io::ErrorKind::PermissionDenied,
                "sink creation refused",
            ));
        }
        let mut state = self.lock();
        state.outputs.push(Vec::new());
        state.extensions.push(extension.map(str::to_string));
        Ok(MemorySink {
            index: state.outputs.len() - 1,
            state: Arc::clone(&self.state),
            fail_writes: self.fail_writes,
            fail_shutdown: self.fail_shutdown,
        })
    }
}

/// One in-memory sink handed out by [`MemorySinkFactory`].
#[derive(Debug)]
pub struct MemorySink {
    index: usize,
    state: Arc<Mutex<MemoryState>>,
    fail_writes: bool,
    fail_shutdown: bool,
}

impl AsyncWrite for MemorySink {
    fn poll_write(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        if self.fail_writes {
            return Poll::Ready(Err(io::Error::new(
                io::ErrorKind::BrokenPipe,
                "sink write refused",
            )));
        }
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state.outputs[self.index].extend_from_slice(buf);
        Poll::Ready(Ok(buf.len()))
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state.closed += 1;
        if self.fail_shutdown {
            return Poll::Ready(Err(io::Error::other("sink close refused")));
        }
        Poll::Ready(Ok(()))
    }
}
