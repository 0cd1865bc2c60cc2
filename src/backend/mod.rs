//! Download backend abstraction
//!
//! A backend is an external program that actually transfers releases: a drop folder
//! watched by some other client, or a remote torrent client spoken to over RPC. All
//! variants report their items as [`BackendItem`] snapshots and accept the same small
//! set of lifecycle operations through [`DownloadBackend`].
//!
//! Capabilities differ between variants (and between versions of the same remote
//! program). Operations a backend cannot perform fail with [`Error::NotSupported`]
//! instead of being silently skipped.
//!
//! [`Error::NotSupported`]: crate::Error::NotSupported

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use utoipa::ToSchema;

use crate::config::BackendConfig;
use crate::error::Result;
use crate::types::{BackendItemStatus, Protocol};

mod transmission;
mod watch_folder;

pub use transmission::TransmissionBackend;
pub use watch_folder::WatchFolderBackend;

/// Backend implementation variant
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    /// Drop-folder scanner
    WatchFolder,
    /// Transmission RPC client
    Transmission,
}

impl std::fmt::Display for BackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BackendKind::WatchFolder => f.write_str("watch_folder"),
            BackendKind::Transmission => f.write_str("transmission"),
        }
    }
}

/// Identity of the backend instance that reported an item
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
pub struct BackendIdentity {
    /// Configured instance name
    pub name: String,
    /// Implementation variant
    pub kind: BackendKind,
    /// Protocol the backend transfers
    pub protocol: Protocol,
}

/// Normalized snapshot of one item as reported by a backend poll
///
/// Immutable; the next poll supersedes it wholesale.
#[derive(Clone, Debug, PartialEq)]
pub struct BackendItem {
    /// Backend's own identifier for the download
    pub download_id: String,
    /// Title as reported by the backend
    pub title: String,
    /// Total size in bytes
    pub total_size: u64,
    /// Bytes still to transfer
    pub remaining_size: u64,
    /// Time to completion as estimated by the backend
    pub remaining_time: Option<Duration>,
    /// Normalized status
    pub status: BackendItemStatus,
    /// Status message (error text, warnings)
    pub message: Option<String>,
    /// Where the data is written
    pub output_path: Option<PathBuf>,
    /// Reporting backend
    pub backend: BackendIdentity,
    /// Category or label the item was filed under
    pub category: Option<String>,
    /// Whether files may be moved rather than copied on import
    pub can_move_files: bool,
    /// Whether the item may be removed from the backend after import
    pub can_be_removed: bool,
}

/// Reachability and output folders of a backend
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BackendStatus {
    /// Whether the backend runs on this host
    pub is_localhost: bool,
    /// Folders the backend writes completed data into
    #[schema(value_type = Vec<String>)]
    pub output_root_folders: Vec<PathBuf>,
}

/// A configuration problem found by [`DownloadBackend::test`]
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ValidationFailure {
    /// Configuration key at fault, when the problem is tied to one
    pub field: Option<String>,
    /// What is wrong
    pub message: String,
}

impl ValidationFailure {
    /// Failure tied to a configuration key
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: Some(field.into()),
            message: message.into(),
        }
    }

    /// Failure not tied to any single key
    pub fn general(message: impl Into<String>) -> Self {
        Self {
            field: None,
            message: message.into(),
        }
    }
}

/// Capability contract every download backend implements
///
/// Implementations must not block indefinitely and must surface failures as errors.
#[async_trait]
pub trait DownloadBackend: Send + Sync {
    /// Configured instance name
    fn name(&self) -> &str;

    /// Implementation variant
    fn kind(&self) -> BackendKind;

    /// Protocol the backend transfers
    fn protocol(&self) -> Protocol;

    /// Snapshot of every item the backend reports for this application
    async fn list_items(&self) -> Result<Vec<BackendItem>>;

    /// Remove an item from the backend
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::NotSupported`] when the backend cannot honour
    /// `delete_data` as requested.
    async fn remove_item(&self, item: &BackendItem, delete_data: bool) -> Result<()>;

    /// Post-import hook, e.g. relabel the item in the backend
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::NotSupported`] when the backend lacks the capability.
    async fn mark_item_as_imported(&self, item: &BackendItem) -> Result<()>;

    /// Reachability and output folders
    async fn status(&self) -> Result<BackendStatus>;

    /// Check the configuration against the live backend
    ///
    /// An empty list means the backend is usable.
    ///
    /// # Errors
    ///
    /// Returns an error when the backend cannot be reached at all.
    async fn test(&self) -> Result<Vec<ValidationFailure>>;

    /// Identity stamped on items this backend reports
    fn identity(&self) -> BackendIdentity {
        BackendIdentity {
            name: self.name().to_string(),
            kind: self.kind(),
            protocol: self.protocol(),
        }
    }
}

/// Set of configured backend instances, resolvable by name
#[derive(Clone, Default)]
pub struct BackendRegistry {
    backends: Vec<Arc<dyn DownloadBackend>>,
}

impl BackendRegistry {
    /// Create a registry from already-built backends
    pub fn new(backends: Vec<Arc<dyn DownloadBackend>>) -> Self {
        Self { backends }
    }

    /// Build every configured backend
    pub fn from_config(configs: &[BackendConfig]) -> Result<Self> {
        let mut backends: Vec<Arc<dyn DownloadBackend>> = Vec::with_capacity(configs.len());
        for config in configs {
            let backend: Arc<dyn DownloadBackend> = match config {
                BackendConfig::WatchFolder(c) => Arc::new(WatchFolderBackend::new(c.clone())),
                BackendConfig::Transmission(c) => Arc::new(TransmissionBackend::new(c.clone())?),
            };
            tracing::info!(
                backend = %backend.name(),
                kind = %backend.kind(),
                "download backend configured"
            );
            backends.push(backend);
        }
        Ok(Self { backends })
    }

    /// Resolve a backend by instance name (case-insensitive)
    pub fn get(&self, name: &str) -> Option<Arc<dyn DownloadBackend>> {
        self.backends
            .iter()
            .find(|b| b.name().eq_ignore_ascii_case(name))
            .cloned()
    }

    /// Every configured backend
    pub fn all(&self) -> &[Arc<dyn DownloadBackend>] {
        &self.backends
    }
}
