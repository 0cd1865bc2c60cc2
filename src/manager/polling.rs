//! Backend polling and the per-backend poller tasks.

use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::MissedTickBehavior;

use crate::backend::{DownloadBackend, ValidationFailure};
use crate::error::{Error, Result};
use crate::types::Event;

use super::QueueManager;

impl QueueManager {
    /// Poll one backend and replace its tracked downloads
    ///
    /// On failure the backend's last snapshot stays in place and a
    /// [`Event::BackendUnavailable`] is emitted. Returns the number of downloads tracked
    /// for the backend.
    pub async fn poll_backend(&self, name: &str) -> Result<usize> {
        let backend = self
            .backends
            .get(name)
            .ok_or_else(|| Error::BackendUnavailable {
                name: name.to_string(),
            })?;
        self.poll(backend.as_ref()).await
    }

    /// Validate one backend's configuration against the live backend
    ///
    /// Returns the problems found; an empty list means the backend is usable.
    pub async fn test_backend(&self, name: &str) -> Result<Vec<ValidationFailure>> {
        let backend = self
            .backends
            .get(name)
            .ok_or_else(|| Error::BackendUnavailable {
                name: name.to_string(),
            })?;

        let failures = backend.test().await?;
        if failures.is_empty() {
            tracing::info!(backend = %backend.name(), "backend configuration is valid");
        } else {
            tracing::warn!(
                backend = %backend.name(),
                failures = failures.len(),
                "backend configuration has problems"
            );
        }
        Ok(failures)
    }

    /// Poll every backend once
    ///
    /// Failures are logged and reported through events; returns how many backends were
    /// polled successfully.
    pub async fn poll_all(&self) -> usize {
        let mut polled = 0;
        for backend in self.backends.all() {
            if self.poll(backend.as_ref()).await.is_ok() {
                polled += 1;
            }
        }
        polled
    }

    async fn poll(&self, backend: &dyn DownloadBackend) -> Result<usize> {
        let name = backend.name();
        let items = match backend.list_items().await {
            Ok(items) => items,
            Err(e) => {
                tracing::warn!(backend = %name, error = %e, "backend poll failed");
                self.emit_event(Event::BackendUnavailable {
                    backend: name.to_string(),
                    error: e.to_string(),
                });
                return Err(e);
            }
        };

        let tracked = self
            .tracked
            .reconcile(name, items, &*self.db, Utc::now())
            .await;
        tracing::debug!(backend = %name, tracked, "backend polled");
        Ok(tracked)
    }

    /// Start one background poller per backend
    ///
    /// Each poller polls immediately and then every `tracking.poll_interval` until
    /// [`shutdown`](Self::shutdown). Calling this again while pollers run does nothing.
    pub async fn start_polling(&self) {
        let mut handles = self.pollers.handles.lock().await;
        if !handles.is_empty() || self.pollers.token.is_cancelled() {
            tracing::debug!("pollers already started or shut down");
            return;
        }

        let interval = self.config.tracking.poll_interval;
        for backend in self.backends.all() {
            handles.push(self.spawn_poller(Arc::clone(backend), interval));
        }

        tracing::info!(
            pollers = handles.len(),
            interval_secs = interval.as_secs(),
            "backend polling started"
        );
    }

    fn spawn_poller(
        &self,
        backend: Arc<dyn DownloadBackend>,
        interval: Duration,
    ) -> tokio::task::JoinHandle<()> {
        let manager = self.clone();
        let token = self.pollers.token.clone();

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = ticker.tick() => {
                        // Errors are already logged and emitted
                        let _ = manager.poll(backend.as_ref()).await;
                    }
                }
            }

            tracing::debug!(backend = %backend.name(), "poller stopped");
        })
    }
}
