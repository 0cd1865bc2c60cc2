//! Transmission RPC backend
//!
//! Speaks Transmission's JSON-RPC dialect over HTTP:
//! - every request is a POST to `{url}/transmission/rpc`
//! - the server hands out a session id through a `409 Conflict` carrying
//!   `X-Transmission-Session-Id`; the id is stored and the request sent once more
//! - responses carry `"result": "success"` or an error string
//!
//! Labels only exist from Transmission 4.0 on. The server version is probed once with
//! `session-get` and cached; label-dependent operations check it before touching anything.
//! Servers older than 2.40 fail [`DownloadBackend::test`].
//!
//! Torrents that carry labels belong to us only through a matching label. Unlabelled
//! torrents fall back to the name of their download directory.

use async_trait::async_trait;
use regex::Regex;
use serde::Deserialize;
use serde_json::{Value, json};
use std::path::PathBuf;
use std::sync::{LazyLock, Mutex};
use std::time::Duration;
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

use super::{BackendItem, BackendKind, BackendStatus, DownloadBackend, ValidationFailure};
use crate::config::TransmissionConfig;
use crate::error::{BackendError, Error, Result};
use crate::types::{BackendItemStatus, Protocol};

const SESSION_ID_HEADER: &str = "X-Transmission-Session-Id";

const TORRENT_FIELDS: &[&str] = &[
    "hashString",
    "name",
    "downloadDir",
    "totalSize",
    "leftUntilDone",
    "isFinished",
    "eta",
    "status",
    "errorString",
    "labels",
];

/// Transmission's numeric torrent status
mod torrent_status {
    pub const STOPPED: i64 = 0;
    pub const CHECK_WAIT: i64 = 1;
    pub const CHECK: i64 = 2;
    pub const QUEUED: i64 = 3;
    pub const SEED_WAIT: i64 = 5;
    pub const SEEDING: i64 = 6;
}

static VERSION_PATTERN: LazyLock<Option<Regex>> = LazyLock::new(|| Regex::new(r"(\d+)\.(\d+)").ok());

/// Oldest server version the RPC dialect is known to work with
pub const MIN_SUPPORTED_VERSION: ClientVersion = ClientVersion { major: 2, minor: 40 };

/// Server version as `major.minor`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct ClientVersion {
    /// Major version
    pub major: u32,
    /// Minor version
    pub minor: u32,
}

impl ClientVersion {
    /// Extract the first dotted version number from a version string like `"4.0.5 (a6fe2a64aa)"`
    pub fn parse(version: &str) -> Option<Self> {
        let caps = VERSION_PATTERN.as_ref()?.captures(version)?;
        Some(Self {
            major: caps.get(1)?.as_str().parse().ok()?,
            minor: caps.get(2)?.as_str().parse().ok()?,
        })
    }

    /// Whether torrents carry labels
    pub fn supports_labels(&self) -> bool {
        *self >= ClientVersion { major: 4, minor: 0 }
    }
}

#[derive(Debug, Deserialize)]
struct RpcResponse {
    result: String,
    #[serde(default)]
    arguments: Value,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Torrent {
    hash_string: String,
    name: String,
    #[serde(default)]
    download_dir: String,
    #[serde(default)]
    total_size: u64,
    #[serde(default)]
    left_until_done: u64,
    #[serde(default)]
    is_finished: bool,
    #[serde(default)]
    eta: i64,
    #[serde(default)]
    status: i64,
    #[serde(default)]
    error_string: String,
    #[serde(default)]
    labels: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct TorrentList {
    #[serde(default)]
    torrents: Vec<Torrent>,
}

/// Transmission RPC client
pub struct TransmissionBackend {
    config: TransmissionConfig,
    rpc_url: String,
    client: reqwest::Client,
    session_id: Mutex<Option<String>>,
    version: OnceCell<ClientVersion>,
}

impl TransmissionBackend {
    /// Create a client for the configured server
    ///
    /// No request is made until the first operation.
    pub fn new(config: TransmissionConfig) -> Result<Self> {
        let base = url::Url::parse(&config.url).map_err(|e| Error::Config {
            message: format!("invalid transmission url '{}': {e}", config.url),
            key: Some("url".to_string()),
        })?;
        let rpc_url = format!("{}/transmission/rpc", base.as_str().trim_end_matches('/'));

        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| {
                Error::Backend(BackendError::Network {
                    backend: config.name.clone(),
                    source: e,
                })
            })?;

        Ok(Self {
            config,
            rpc_url,
            client,
            session_id: Mutex::new(None),
            version: OnceCell::new(),
        })
    }

    fn rpc_error(&self, message: impl Into<String>) -> Error {
        Error::Backend(BackendError::Rpc {
            backend: self.config.name.clone(),
            message: message.into(),
        })
    }

    fn network_error(&self, source: reqwest::Error) -> Error {
        Error::Backend(BackendError::Network {
            backend: self.config.name.clone(),
            source,
        })
    }

    fn current_session_id(&self) -> Option<String> {
        match self.session_id.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    fn store_session_id(&self, id: String) {
        match self.session_id.lock() {
            Ok(mut guard) => *guard = Some(id),
            Err(poisoned) => *poisoned.into_inner() = Some(id),
        }
    }

    async fn send(&self, body: &Value) -> Result<reqwest::Response> {
        let mut request = self.client.post(&self.rpc_url).json(body);
        if let Some(username) = &self.config.username {
            request = request.basic_auth(username, self.config.password.as_ref());
        }
        if let Some(session_id) = self.current_session_id() {
            request = request.header(SESSION_ID_HEADER, session_id);
        }
        request.send().await.map_err(|e| self.network_error(e))
    }

    /// Issue an RPC call, performing the session-id handshake when the server asks for it
    async fn call(&self, method: &str, arguments: Value) -> Result<Value> {
        let body = json!({ "method": method, "arguments": arguments });

        let mut response = self.send(&body).await?;
        if response.status() == reqwest::StatusCode::CONFLICT {
            let session_id = response
                .headers()
                .get(SESSION_ID_HEADER)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string)
                .ok_or_else(|| self.rpc_error("409 response without a session id"))?;
            debug!(backend = %self.config.name, "transmission session id renewed");
            self.store_session_id(session_id);
            response = self.send(&body).await?;
        }

        match response.status() {
            reqwest::StatusCode::UNAUTHORIZED | reqwest::StatusCode::FORBIDDEN => {
                return Err(Error::Backend(BackendError::Unauthorized {
                    backend: self.config.name.clone(),
                }));
            }
            status if !status.is_success() => {
                return Err(self.rpc_error(format!("{method} returned HTTP {status}")));
            }
            _ => {}
        }

        let rpc: RpcResponse = response.json().await.map_err(|e| self.network_error(e))?;
        if rpc.result != "success" {
            return Err(self.rpc_error(format!("{method} failed: {}", rpc.result)));
        }
        Ok(rpc.arguments)
    }

    async fn get_torrents(&self, hashes: Option<&[String]>) -> Result<Vec<Torrent>> {
        let mut arguments = json!({ "fields": TORRENT_FIELDS });
        if let Some(hashes) = hashes {
            arguments["ids"] = json!(hashes);
        }
        let arguments = self.call("torrent-get", arguments).await?;
        let list: TorrentList = serde_json::from_value(arguments)
            .map_err(|e| self.rpc_error(format!("malformed torrent-get response: {e}")))?;
        Ok(list.torrents)
    }

    /// Server version, probed once and cached
    pub async fn client_version(&self) -> Result<ClientVersion> {
        self.version
            .get_or_try_init(|| async {
                let session = self.call("session-get", json!({})).await?;
                let raw = session
                    .get("version")
                    .and_then(Value::as_str)
                    .ok_or_else(|| self.rpc_error("session-get response has no version"))?;
                let version = ClientVersion::parse(raw)
                    .ok_or_else(|| self.rpc_error(format!("unparseable version '{raw}'")))?;
                info!(
                    backend = %self.config.name,
                    version = %raw,
                    "transmission version detected"
                );
                Ok::<_, Error>(version)
            })
            .await
            .copied()
    }

    fn belongs_to_category(&self, torrent: &Torrent) -> bool {
        let category = self.config.category.as_str();
        if category.is_empty() {
            return true;
        }
        // Labelled torrents are decided by label alone; the directory only counts for unlabelled ones
        if !torrent.labels.is_empty() {
            return torrent
                .labels
                .iter()
                .any(|label| label.eq_ignore_ascii_case(category));
        }
        PathBuf::from(&torrent.download_dir)
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|dir| dir.eq_ignore_ascii_case(category))
    }

    fn to_item(&self, torrent: Torrent) -> BackendItem {
        let (status, message) = map_status(&torrent);
        let remaining_time = u64::try_from(torrent.eta).ok().map(Duration::from_secs);
        let output_path = if torrent.download_dir.is_empty() {
            None
        } else {
            Some(PathBuf::from(&torrent.download_dir).join(&torrent.name))
        };

        BackendItem {
            download_id: torrent.hash_string.to_uppercase(),
            title: torrent.name,
            total_size: torrent.total_size,
            remaining_size: torrent.left_until_done,
            remaining_time,
            status,
            message,
            output_path,
            backend: self.identity(),
            category: Some(self.config.category.clone()).filter(|c| !c.is_empty()),
            can_move_files: false,
            can_be_removed: self.config.remove_completed_downloads,
        }
    }

    fn is_localhost(&self) -> bool {
        url::Url::parse(&self.config.url)
            .ok()
            .and_then(|u| u.host_str().map(str::to_ascii_lowercase))
            .is_some_and(|host| matches!(host.as_str(), "localhost" | "127.0.0.1" | "[::1]" | "::1"))
    }
}

fn map_status(torrent: &Torrent) -> (BackendItemStatus, Option<String>) {
    use torrent_status::*;

    if !torrent.error_string.trim().is_empty() {
        return (
            BackendItemStatus::Warning,
            Some(torrent.error_string.clone()),
        );
    }

    let status = if torrent.left_until_done == 0
        && matches!(torrent.status, STOPPED | SEED_WAIT | SEEDING)
    {
        BackendItemStatus::Completed
    } else if torrent.is_finished && !matches!(torrent.status, CHECK | CHECK_WAIT) {
        BackendItemStatus::Completed
    } else if torrent.status == STOPPED {
        BackendItemStatus::Paused
    } else if torrent.status == QUEUED {
        BackendItemStatus::Queued
    } else {
        BackendItemStatus::Downloading
    };
    (status, None)
}

#[async_trait]
impl DownloadBackend for TransmissionBackend {
    fn name(&self) -> &str {
        &self.config.name
    }

    fn kind(&self) -> BackendKind {
        BackendKind::Transmission
    }

    fn protocol(&self) -> Protocol {
        Protocol::Torrent
    }

    async fn list_items(&self) -> Result<Vec<BackendItem>> {
        let torrents = self.get_torrents(None).await?;
        let items: Vec<BackendItem> = torrents
            .into_iter()
            .filter(|t| self.belongs_to_category(t))
            .map(|t| self.to_item(t))
            .collect();
        debug!(backend = %self.config.name, count = items.len(), "transmission torrents listed");
        Ok(items)
    }

    async fn remove_item(&self, item: &BackendItem, delete_data: bool) -> Result<()> {
        let hash = item.download_id.to_lowercase();
        self.call(
            "torrent-remove",
            json!({ "ids": [hash], "delete-local-data": delete_data }),
        )
        .await?;
        info!(
            backend = %self.config.name,
            download_id = %item.download_id,
            delete_data,
            "torrent removed"
        );
        Ok(())
    }

    async fn mark_item_as_imported(&self, item: &BackendItem) -> Result<()> {
        let version = self.client_version().await?;
        if !version.supports_labels() {
            return Err(Error::NotSupported(format!(
                "{}: Transmission {}.{} does not support marking items as imported",
                self.config.name, version.major, version.minor
            )));
        }

        let Some(imported) = self
            .config
            .imported_category
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty() && !c.eq_ignore_ascii_case(&self.config.category))
        else {
            return Ok(());
        };

        let hash = item.download_id.to_lowercase();
        let torrents = self.get_torrents(Some(std::slice::from_ref(&hash))).await?;
        let Some(torrent) = torrents.into_iter().next() else {
            warn!(
                backend = %self.config.name,
                download_id = %item.download_id,
                "could not find torrent to relabel"
            );
            return Ok(());
        };

        let mut labels: Vec<String> = Vec::with_capacity(torrent.labels.len() + 1);
        for label in torrent.labels {
            if !labels.iter().any(|l| l.eq_ignore_ascii_case(&label)) {
                labels.push(label);
            }
        }
        if !labels.iter().any(|l| l.eq_ignore_ascii_case(imported)) {
            labels.push(imported.to_string());
        }
        if !self.config.category.trim().is_empty() {
            labels.retain(|l| !l.eq_ignore_ascii_case(&self.config.category));
        }

        if let Err(e) = self
            .call("torrent-set", json!({ "ids": [hash], "labels": labels }))
            .await
        {
            warn!(
                backend = %self.config.name,
                download_id = %item.download_id,
                error = %e,
                "failed to set post-import label \"{}\" for {}",
                imported,
                item.title
            );
        }
        Ok(())
    }

    async fn test(&self) -> Result<Vec<ValidationFailure>> {
        let version = self.client_version().await?;
        debug!(
            backend = %self.config.name,
            version = %format!("{}.{}", version.major, version.minor),
            "transmission version checked"
        );

        if version < MIN_SUPPORTED_VERSION {
            return Ok(vec![ValidationFailure::general(format!(
                "Transmission version not supported, should be {}.{} or higher",
                MIN_SUPPORTED_VERSION.major, MIN_SUPPORTED_VERSION.minor
            ))]);
        }
        Ok(Vec::new())
    }

    async fn status(&self) -> Result<BackendStatus> {
        let session = self.call("session-get", json!({})).await?;
        let output_root_folders = session
            .get("download-dir")
            .and_then(Value::as_str)
            .map(|dir| vec![PathBuf::from(dir)])
            .unwrap_or_default();

        Ok(BackendStatus {
            is_localhost: self.is_localhost(),
            output_root_folders,
        })
    }
}
