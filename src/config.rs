//! Configuration types for grab-queue

use serde::{Deserialize, Serialize};
use std::{collections::HashSet, net::SocketAddr, path::PathBuf, time::Duration};

use crate::error::{Error, Result};
use crate::types::Protocol;

/// Main configuration
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Config {
    /// Download backend instances
    #[serde(default)]
    pub backends: Vec<BackendConfig>,

    /// Polling and tracking behavior
    #[serde(default)]
    pub tracking: TrackingConfig,

    /// Quality ranking used when sorting the queue by quality
    #[serde(default)]
    pub quality: QualityConfig,

    /// Data storage
    #[serde(default)]
    pub persistence: PersistenceConfig,

    /// REST API configuration
    #[serde(default)]
    pub api: ApiConfig,
}

impl Config {
    /// Check the configuration for errors the type system cannot express
    ///
    /// Backend names must be non-empty and unique because actions resolve backends by name.
    pub fn validate(&self) -> Result<()> {
        let mut seen = HashSet::new();
        for (index, backend) in self.backends.iter().enumerate() {
            let name = backend.name().trim();
            if name.is_empty() {
                return Err(Error::Config {
                    message: "backend name must not be empty".to_string(),
                    key: Some(format!("backends[{index}].name")),
                });
            }
            if !seen.insert(name.to_ascii_lowercase()) {
                return Err(Error::Config {
                    message: format!("duplicate backend name '{name}'"),
                    key: Some(format!("backends[{index}].name")),
                });
            }
            if let BackendConfig::Transmission(transmission) = backend
                && let Err(e) = url::Url::parse(&transmission.url)
            {
                return Err(Error::Config {
                    message: format!("invalid transmission url '{}': {e}", transmission.url),
                    key: Some(format!("backends[{index}].url")),
                });
            }
        }

        if self.tracking.poll_interval.is_zero() {
            return Err(Error::Config {
                message: "poll interval must be greater than zero".to_string(),
                key: Some("tracking.poll_interval".to_string()),
            });
        }

        Ok(())
    }
}

/// Download backend instance configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BackendConfig {
    /// Drop-folder scanner ("blackhole")
    WatchFolder(WatchFolderBackendConfig),
    /// Transmission RPC client
    Transmission(TransmissionConfig),
}

impl BackendConfig {
    /// Instance name
    pub fn name(&self) -> &str {
        match self {
            BackendConfig::WatchFolder(c) => &c.name,
            BackendConfig::Transmission(c) => &c.name,
        }
    }
}

/// Watch-folder backend configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct WatchFolderBackendConfig {
    /// Instance name
    pub name: String,

    /// Folder the external client writes finished downloads into
    pub watch_folder: PathBuf,

    /// Time an entry must stay unchanged before it is reported complete (default: 30 seconds)
    #[serde(default = "default_scan_grace_period", with = "duration_serde")]
    pub scan_grace_period: Duration,

    /// Files in the folder must not be moved, only copied (default: false)
    #[serde(default)]
    pub read_only: bool,

    /// Completed items may be deleted after import (default: true)
    #[serde(default = "default_true")]
    pub remove_completed_downloads: bool,

    /// Protocol of the releases dropped into the folder (default: torrent)
    #[serde(default = "default_watch_folder_protocol")]
    pub protocol: Protocol,
}

/// Transmission backend configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TransmissionConfig {
    /// Instance name
    pub name: String,

    /// Base URL, e.g. "http://localhost:9091"
    pub url: String,

    /// Username for basic auth
    #[serde(default)]
    pub username: Option<String>,

    /// Password for basic auth
    #[serde(default)]
    pub password: Option<String>,

    /// Label (or download directory name) identifying this application's torrents
    #[serde(default = "default_category")]
    pub category: String,

    /// Label applied after import (requires Transmission 4.0+)
    #[serde(default)]
    pub imported_category: Option<String>,

    /// RPC request timeout (default: 30 seconds)
    #[serde(default = "default_request_timeout", with = "duration_serde")]
    pub request_timeout: Duration,

    /// Completed items may be deleted after import (default: true)
    #[serde(default = "default_true")]
    pub remove_completed_downloads: bool,
}

/// Polling and tracking configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TrackingConfig {
    /// How often each backend is polled (default: 60 seconds)
    #[serde(default = "default_poll_interval", with = "duration_serde")]
    pub poll_interval: Duration,

    /// How long a download the backend stopped reporting stays in the queue (default: 300 seconds)
    #[serde(default = "default_grace_window", with = "duration_serde")]
    pub grace_window: Duration,
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            poll_interval: default_poll_interval(),
            grace_window: default_grace_window(),
        }
    }
}

/// Quality ranking configuration
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct QualityConfig {
    /// Quality ids from lowest to highest preference; unlisted qualities rank lowest
    #[serde(default)]
    pub ranking: Vec<i32>,
}

/// Data storage configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PersistenceConfig {
    /// Database path (default: "grab-queue.db")
    #[serde(default = "default_database_path")]
    pub database_path: PathBuf,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
        }
    }
}

/// REST API configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Address to bind to (default: 127.0.0.1:8686)
    #[serde(default = "default_bind_address")]
    pub bind_address: SocketAddr,

    /// Enable CORS for browser access (default: true)
    #[serde(default = "default_true")]
    pub cors_enabled: bool,

    /// Allowed CORS origins (default: ["*"])
    #[serde(default = "default_cors_origins")]
    pub cors_origins: Vec<String>,

    /// Enable Swagger UI at /swagger-ui (default: true)
    #[serde(default = "default_true")]
    pub swagger_ui: bool,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            cors_enabled: true,
            cors_origins: default_cors_origins(),
            swagger_ui: true,
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_scan_grace_period() -> Duration {
    Duration::from_secs(30)
}

fn default_watch_folder_protocol() -> Protocol {
    Protocol::Torrent
}

fn default_category() -> String {
    "music".to_string()
}

fn default_request_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_poll_interval() -> Duration {
    Duration::from_secs(60)
}

fn default_grace_window() -> Duration {
    Duration::from_secs(300)
}

fn default_database_path() -> PathBuf {
    PathBuf::from("grab-queue.db")
}

fn default_bind_address() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 8686))
}

fn default_cors_origins() -> Vec<String> {
    vec!["*".to_string()]
}

// Duration serialization helper (whole seconds)
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}
