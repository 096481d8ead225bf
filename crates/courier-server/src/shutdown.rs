//! Graceful shutdown coordination via `CancellationToken` and `TaskTracker`.

use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::info;

/// Coordinates shutdown across the acceptor and connection tasks.
///
/// Clones share the same token and tracker.
#[derive(Clone, Debug, Default)]
pub struct ShutdownCoordinator {
    token: CancellationToken,
    tracker: TaskTracker,
}

impl ShutdownCoordinator {
    /// Create a new shutdown coordinator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Get a clone of the cancellation token.
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Tracker every server task is spawned on.
    pub fn tracker(&self) -> &TaskTracker {
        &self.tracker
    }

    /// Initiate shutdown.
    pub fn shutdown(&self) {
        self.token.cancel();
    }

    /// Whether a shutdown has been initiated.
    pub fn is_shutting_down(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Cancel and wait for every tracked task to finish.
    ///
    /// Safe to call from several places at once; all callers return once
    /// the last task exits.
    pub async fn drain(&self) {
        self.shutdown();
        let _ = self.tracker.close();
        info!(task_count = self.tracker.len(), "waiting for tasks to complete");
        self.tracker.wait().await;
    }
}
