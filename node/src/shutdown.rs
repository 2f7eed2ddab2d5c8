//! Shutdown coordination for the formulator node.
//!
//! A `ShutdownController` fans one stop signal out to every task through a
//! `tokio::sync::broadcast` channel and remembers why the node stopped.
//! OS signals, an operator request and a detected fork all end up here.

use std::fmt;
use std::sync::OnceLock;

use tokio::signal;
use tokio::sync::broadcast;

/// Why the node is stopping. The first recorded reason wins.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ShutdownReason {
    /// SIGINT or SIGTERM.
    Signal,
    /// Stopped by the embedding program.
    Requested,
    /// A block conflicting with the committed chain was seen at `height`.
    Fork { height: u32 },
}

impl fmt::Display for ShutdownReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Signal => f.write_str("signal"),
            Self::Requested => f.write_str("requested"),
            Self::Fork { height } => write!(f, "fork at height {height}"),
        }
    }
}

/// Tasks [`subscribe`](Self::subscribe) and `select!` on the receiver next
/// to their own work. A task that subscribes after the signal was sent must
/// check [`is_triggered`](Self::is_triggered) first.
pub struct ShutdownController {
    tx: broadcast::Sender<()>,
    reason: OnceLock<ShutdownReason>,
}

impl ShutdownController {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(1);
        Self {
            tx,
            reason: OnceLock::new(),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.tx.subscribe()
    }

    pub fn shutdown(&self) {
        self.shutdown_with(ShutdownReason::Requested);
    }

    /// Record `reason` unless one is already set, and wake every subscriber.
    pub fn shutdown_with(&self, reason: ShutdownReason) {
        if self.reason.set(reason).is_ok() {
            tracing::info!(%reason, "shutdown triggered");
        }
        let _ = self.tx.send(());
    }

    pub fn is_triggered(&self) -> bool {
        self.reason.get().is_some()
    }

    pub fn reason(&self) -> Option<ShutdownReason> {
        self.reason.get().copied()
    }

    /// Resolve on SIGINT or SIGTERM and trigger shutdown.
    pub async fn wait_for_signal(&self) {
        #[cfg(unix)]
        let terminate = async {
            match signal::unix::signal(signal::unix::SignalKind::terminate()) {
                Ok(mut sig) => {
                    sig.recv().await;
                }
                Err(e) => {
                    tracing::warn!(error = %e, "SIGTERM handler unavailable");
                    std::future::pending::<()>().await;
                }
            }
        };
        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        tokio::select! {
            _ = signal::ctrl_c() => tracing::info!("SIGINT received"),
            _ = terminate => tracing::info!("SIGTERM received"),
        }
        self.shutdown_with(ShutdownReason::Signal);
    }
}

impl Default for ShutdownController {
    fn default() -> Self {
        Self::new()
    }
}
