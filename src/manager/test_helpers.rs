//! Shared test helpers for creating QueueManager instances in tests.

use crate::backend::{BackendRegistry, DownloadBackend};
use crate::config::Config;
use crate::manager::QueueManager;
use crate::test_helpers::MockBackend;
use std::sync::Arc;
use std::time::Duration;
use tempfile::tempdir;

/// Helper to create a QueueManager over one mock backend named "mock".
/// Returns the manager, the backend and the tempdir (which must be kept alive).
pub(crate) async fn create_test_manager() -> (QueueManager, Arc<MockBackend>, tempfile::TempDir) {
    let temp_dir = tempdir().unwrap();

    let mut config = Config::default();
    config.persistence.database_path = temp_dir.path().join("test.db");
    config.tracking.poll_interval = Duration::from_millis(50);
    config.quality.ranking = vec![1, 4, 6];

    let backend = MockBackend::new("mock");
    let registry = BackendRegistry::new(vec![Arc::clone(&backend) as Arc<dyn DownloadBackend>]);

    let manager = QueueManager::with_backends(config, registry).await.unwrap();
    (manager, backend, temp_dir)
}
