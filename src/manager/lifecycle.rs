//! Shutdown coordination.

use std::time::Duration;

use crate::error::Result;
use crate::types::Event;

use super::QueueManager;

impl QueueManager {
    /// Gracefully shut down the manager
    ///
    /// 1. Cancels every poller
    /// 2. Waits for the pollers to finish their current poll (up to 30 seconds)
    /// 3. Emits [`Event::Shutdown`]
    ///
    /// Pending releases, grabs and blocklist entries are written as they change, so there
    /// is no state left to persist. The database pool closes when the last clone of the
    /// manager is dropped.
    pub async fn shutdown(&self) -> Result<()> {
        tracing::info!("Initiating graceful shutdown");

        self.pollers.token.cancel();
        let handles: Vec<_> = self.pollers.handles.lock().await.drain(..).collect();
        tracing::debug!(pollers = handles.len(), "Waiting for pollers to stop");

        let shutdown_timeout = Duration::from_secs(30);
        match tokio::time::timeout(shutdown_timeout, futures::future::join_all(handles)).await {
            Ok(results) => {
                for result in results {
                    if let Err(e) = result {
                        tracing::warn!(error = %e, "Poller task ended abnormally");
                    }
                }
                tracing::info!("All pollers stopped");
            }
            Err(_) => {
                tracing::warn!("Timeout waiting for pollers to stop, proceeding with shutdown");
            }
        }

        self.emit_event(Event::Shutdown);

        tracing::info!("Graceful shutdown complete");
        Ok(())
    }

    /// Whether [`shutdown`](Self::shutdown) has been called
    pub fn is_shut_down(&self) -> bool {
        self.pollers.token.is_cancelled()
    }
}
