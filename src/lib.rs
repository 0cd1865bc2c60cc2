//! # grab-queue
//!
//! Download queue reconciliation for media acquisition: one view over releases that are
//! held back and downloads running in external download clients, plus the actions that
//! remove, blocklist, re-categorize or ignore them.
//!
//! ## Overview
//!
//! - **Pending releases** are releases chosen for download but held back (delay profile,
//!   no usable download client, waiting for a fallback protocol). They persist in SQLite.
//! - **Tracked downloads** are the items reported by each configured download backend
//!   (a watch folder or a Transmission instance), correlated with the grab that sent them.
//! - The **queue** merges both, filters, sorts and pages them.
//! - **Actions** remove rows, optionally deleting data, blocklisting the release or moving
//!   the download to an imported category.
//!
//! ## Quick Start
//!
//! ```no_run
//! use grab_queue::{Config, QueueManager};
//! use grab_queue::queue::{PagingSpec, QueueFilter};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let manager = QueueManager::new(Config::default()).await?;
//!
//!     // Subscribe to events
//!     let mut events = manager.subscribe();
//!     tokio::spawn(async move {
//!         while let Ok(event) = events.recv().await {
//!             println!("Event: {:?}", event);
//!         }
//!     });
//!
//!     manager.start_polling().await;
//!
//!     let page = manager.get_queue(&PagingSpec::default(), &QueueFilter::default());
//!     println!("{} rows queued", page.total_records);
//!
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Queue actions: removal, blocklisting, ignoring
pub mod actions;
/// REST API module
pub mod api;
/// Download backends (watch folder, Transmission)
pub mod backend;
/// Blocklist entries and the ledger trait
pub mod blocklist;
/// Configuration types
pub mod config;
/// Database persistence layer
pub mod db;
/// Error types
pub mod error;
/// Queue manager facade (decomposed into focused submodules)
pub mod manager;
/// Pending release store
pub mod pending;
/// Merged queue view: filtering, sorting, paging
pub mod queue;
/// Tracked download registry
pub mod tracked;
/// Core types and events
pub mod types;

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
pub(crate) mod test_helpers;

// Re-export commonly used types
pub use actions::{BulkRemovalReport, RemovalOptions};
pub use backend::{BackendItem, BackendRegistry, DownloadBackend, ValidationFailure};
pub use blocklist::{BlocklistEntry, BlocklistLedger};
pub use config::{BackendConfig, Config, TransmissionConfig, WatchFolderBackendConfig};
pub use db::Database;
pub use error::{ApiError, BackendError, DatabaseError, Error, ErrorDetail, Result, ToHttpStatus};
pub use manager::QueueManager;
pub use pending::PendingRelease;
pub use queue::{PagingSpec, QueueEntry, QueueFilter, QueuePage, SortDirection, SortKey};
pub use tracked::{DownloadKey, GrabRecord, TrackedDownload};
pub use types::{
    AlbumRef, ArtistRef, Event, PendingReason, Protocol, Quality, QueueId, QueueStatus,
    ReleaseInfo, RemoteAlbum,
};

/// Helper function to run the manager with graceful signal handling.
///
/// Waits for a termination signal and then calls the manager's `shutdown()` method.
///
/// - **Unix:** listens for SIGTERM and SIGINT, with fallbacks if signal registration fails.
/// - **Windows/other:** listens for Ctrl+C via `tokio::signal::ctrl_c()`.
///
/// # Example
///
/// ```no_run
/// use grab_queue::{Config, QueueManager, run_with_shutdown};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let manager = QueueManager::new(Config::default()).await?;
///     manager.start_polling().await;
///
///     run_with_shutdown(manager).await?;
///
///     Ok(())
/// }
/// ```
pub async fn run_with_shutdown(manager: QueueManager) -> Result<()> {
    wait_for_signal().await;
    manager.shutdown().await
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    // Registration may fail in restricted environments (containers, tests)
    let sigterm_result = signal(SignalKind::terminate());
    let sigint_result = signal(SignalKind::interrupt());

    match (sigterm_result, sigint_result) {
        (Ok(mut sigterm), Ok(mut sigint)) => {
            tokio::select! {
                _ = sigterm.recv() => {
                    tracing::info!("Received SIGTERM signal");
                }
                _ = sigint.recv() => {
                    tracing::info!("Received SIGINT signal (Ctrl+C)");
                }
            }
        }
        (Err(e), _) => {
            tracing::warn!(error = %e, "Could not register SIGTERM handler, waiting for SIGINT only");
            if let Ok(mut sigint) = signal(SignalKind::interrupt()) {
                sigint.recv().await;
                tracing::info!("Received SIGINT signal (Ctrl+C)");
            } else {
                tracing::error!("Could not register any signal handlers, using ctrl_c fallback");
                tokio::signal::ctrl_c().await.ok();
            }
        }
        (_, Err(e)) => {
            tracing::warn!(error = %e, "Could not register SIGINT handler, waiting for SIGTERM only");
            if let Ok(mut sigterm) = signal(SignalKind::terminate()) {
                sigterm.recv().await;
                tracing::info!("Received SIGTERM signal");
            } else {
                tracing::error!("Could not register any signal handlers, using ctrl_c fallback");
                tokio::signal::ctrl_c().await.ok();
            }
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => {
            tracing::info!("Received Ctrl+C signal");
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C signal");
        }
    }
}
