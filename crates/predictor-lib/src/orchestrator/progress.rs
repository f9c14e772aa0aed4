//! Progress notification and cooperative cancellation

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;

/// Receives human-readable status messages from a training run
///
/// Delivery is best-effort: a returned error is logged by the orchestrator
/// and the run continues.
pub trait ProgressSink: Send + Sync {
    fn notify(&self, message: &str) -> anyhow::Result<()>;
}

/// Sink for callers that do not observe progress
#[derive(Debug, Clone, Copy, Default)]
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn notify(&self, _message: &str) -> anyhow::Result<()> {
        Ok(())
    }
}

impl<F> ProgressSink for F
where
    F: Fn(&str) -> anyhow::Result<()> + Send + Sync,
{
    fn notify(&self, message: &str) -> anyhow::Result<()> {
        self(message)
    }
}

/// Queues messages onto an unbounded channel for an async observer
#[derive(Debug, Clone)]
pub struct ChannelProgress {
    tx: mpsc::UnboundedSender<String>,
}

impl ChannelProgress {
    pub fn new(tx: mpsc::UnboundedSender<String>) -> Self {
        Self { tx }
    }

    /// Sink plus the receiving end
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<String>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl ProgressSink for ChannelProgress {
    fn notify(&self, message: &str) -> anyhow::Result<()> {
        self.tx
            .send(message.to_string())
            .map_err(|_| anyhow::anyhow!("progress receiver dropped"))
    }
}

/// Shared flag checked by the orchestrator between phases
#[derive(Debug, Clone, Default)]
pub struct CancellationFlag(Arc<AtomicBool>);

impl CancellationFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}
