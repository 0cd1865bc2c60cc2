//! Queue manager facade split into focused submodules.
//!
//! The `QueueManager` struct and its methods are organized by domain:
//! - [`queue`] - Queue reads, removals, pending releases and grabs
//! - [`polling`] - Backend polling and the per-backend poller tasks
//! - [`lifecycle`] - Shutdown coordination

mod lifecycle;
mod polling;
mod queue;

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
pub(crate) mod test_helpers;
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;

use std::sync::Arc;
use tokio::sync::{Mutex, broadcast};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::actions::ActionCoordinator;
use crate::backend::BackendRegistry;
use crate::blocklist::BlocklistLedger;
use crate::config::Config;
use crate::db::Database;
use crate::error::Result;
use crate::pending::PendingReleaseStore;
use crate::queue::QualityRanking;
use crate::tracked::TrackedDownloadRegistry;
use crate::types::{Event, QueueIdAllocator};

/// Poller task handles and their shared cancellation token
pub(crate) struct Pollers {
    pub(crate) token: CancellationToken,
    pub(crate) handles: Mutex<Vec<JoinHandle<()>>>,
}

/// Main queue manager instance (cloneable - all fields are Arc-wrapped)
#[derive(Clone)]
pub struct QueueManager {
    /// Database instance for persistence
    /// Public for integration tests to inspect the blocklist and grab history
    pub db: Arc<Database>,
    /// Event broadcast channel sender (multiple subscribers supported)
    pub(crate) event_tx: broadcast::Sender<Event>,
    /// Configuration
    pub(crate) config: Arc<Config>,
    /// Configured download backends
    pub(crate) backends: Arc<BackendRegistry>,
    /// Downloads the backends report
    pub(crate) tracked: Arc<TrackedDownloadRegistry>,
    /// Releases waiting to be grabbed
    pub(crate) pending: Arc<PendingReleaseStore>,
    /// Removal and blocklist actions
    pub(crate) actions: Arc<ActionCoordinator>,
    /// Quality order used when sorting by quality
    pub(crate) ranking: Arc<QualityRanking>,
    /// Background pollers
    pub(crate) pollers: Arc<Pollers>,
}

impl QueueManager {
    /// Create a new QueueManager instance
    ///
    /// Validates the configuration, opens (and migrates) the database, builds every
    /// configured backend and loads persisted pending releases. Polling does not start
    /// until [`start_polling`](Self::start_polling) is called.
    pub async fn new(config: Config) -> Result<Self> {
        config.validate()?;
        let backends = BackendRegistry::from_config(&config.backends)?;
        Self::with_backends(config, backends).await
    }

    /// Create a QueueManager over already-built backends
    ///
    /// The `backends` section of `config` is ignored.
    pub async fn with_backends(config: Config, backends: BackendRegistry) -> Result<Self> {
        let db = Arc::new(Database::new(&config.persistence.database_path).await?);

        // Create broadcast channel with buffer size of 1000 events
        let (event_tx, _rx) = broadcast::channel(1000);

        let ids = QueueIdAllocator::new();
        let backends = Arc::new(backends);
        let tracked = Arc::new(TrackedDownloadRegistry::new(
            ids.clone(),
            config.tracking.grace_window,
            event_tx.clone(),
        ));
        let pending = Arc::new(PendingReleaseStore::new(
            Arc::clone(&db),
            ids,
            event_tx.clone(),
        ));
        pending.load().await?;

        let actions = Arc::new(ActionCoordinator::new(
            Arc::clone(&pending),
            Arc::clone(&tracked),
            Arc::clone(&backends),
            Arc::clone(&db) as Arc<dyn BlocklistLedger>,
            event_tx.clone(),
        ));

        tracing::info!(
            backends = backends.all().len(),
            pending = pending.releases().len(),
            "queue manager initialized"
        );

        Ok(Self {
            ranking: Arc::new(QualityRanking::new(&config.quality.ranking)),
            config: Arc::new(config),
            db,
            event_tx,
            backends,
            tracked,
            pending,
            actions,
            pollers: Arc::new(Pollers {
                token: CancellationToken::new(),
                handles: Mutex::new(Vec::new()),
            }),
        })
    }

    /// Subscribe to queue events
    ///
    /// Multiple subscribers are supported. Each subscriber receives all events independently.
    /// A subscriber that falls behind by more than 1000 events receives
    /// `RecvError::Lagged`.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.event_tx.subscribe()
    }

    /// Get the current configuration
    pub fn get_config(&self) -> Arc<Config> {
        Arc::clone(&self.config)
    }

    /// Configured download backends
    pub fn backends(&self) -> &BackendRegistry {
        &self.backends
    }

    /// Emit an event to all subscribers; dropped when nobody listens
    pub(crate) fn emit_event(&self, event: Event) {
        self.event_tx.send(event).ok();
    }

    /// Spawn the REST API server in a background task
    pub fn spawn_api_server(self: &Arc<Self>) -> JoinHandle<Result<()>> {
        let manager = Arc::clone(self);
        let config = Arc::clone(&self.config);

        tokio::spawn(async move { crate::api::start_api_server(manager, config).await })
    }
}
