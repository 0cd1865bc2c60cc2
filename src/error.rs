//! Error types for grab-queue
//!
//! This module provides the error taxonomy for queue reads and lifecycle actions:
//! - Queue lookup failures (single-item removals only, bulk removals are lenient)
//! - Backend resolution and capability failures
//! - Transient backend failures (I/O, network, RPC) which are never retried here
//! - HTTP status code mapping and structured error bodies for the REST surface

use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

use crate::types::QueueId;

/// Result type alias for grab-queue operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for grab-queue
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "backends[0].name")
        key: Option<String>,
    },

    /// Queue id matches neither a pending release nor a tracked download
    #[error("queue item {id} not found")]
    QueueItemNotFound {
        /// The queue id that could not be resolved
        id: QueueId,
    },

    /// A backend instance required for the operation is not configured
    #[error("download backend '{name}' is not available")]
    BackendUnavailable {
        /// Instance name of the backend that could not be resolved
        name: String,
    },

    /// The resolved backend does not support the requested operation
    #[error("not supported: {0}")]
    NotSupported(String),

    /// Transient failure while talking to a backend
    #[error("backend error: {0}")]
    Backend(#[from] BackendError),

    /// Database operation failed
    #[error("database error: {0}")]
    Database(#[from] DatabaseError),

    /// SQLx database error
    #[error("database error: {0}")]
    Sqlx(#[from] sqlx::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// API server error
    #[error("API server error: {0}")]
    ApiServerError(String),

    /// Other error
    #[error("{0}")]
    Other(String),
}

/// Transient backend failures
///
/// These are surfaced to the caller as-is. The action layer never retries them and
/// never rolls back an earlier step of a compound action because of them.
#[derive(Debug, Error)]
pub enum BackendError {
    /// Filesystem error while scanning or deleting watch-folder data
    #[error("{backend}: filesystem error: {source}")]
    Io {
        /// Backend instance name
        backend: String,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// HTTP transport failure (connect, timeout, TLS, body decode)
    #[error("{backend}: request failed: {source}")]
    Network {
        /// Backend instance name
        backend: String,
        /// Underlying reqwest error
        #[source]
        source: reqwest::Error,
    },

    /// Remote responded, but rejected or could not perform the request
    #[error("{backend}: {message}")]
    Rpc {
        /// Backend instance name
        backend: String,
        /// Message reported by the remote end
        message: String,
    },

    /// Remote rejected the configured credentials
    #[error("{backend}: authentication failed")]
    Unauthorized {
        /// Backend instance name
        backend: String,
    },
}

impl BackendError {
    /// Name of the backend instance this error originated from
    pub fn backend(&self) -> &str {
        match self {
            BackendError::Io { backend, .. }
            | BackendError::Network { backend, .. }
            | BackendError::Rpc { backend, .. }
            | BackendError::Unauthorized { backend } => backend,
        }
    }
}

/// Database-related errors
#[derive(Debug, Error)]
pub enum DatabaseError {
    /// Failed to connect to database
    #[error("failed to connect to database: {0}")]
    ConnectionFailed(String),

    /// Failed to run migrations
    #[error("failed to run migrations: {0}")]
    MigrationFailed(String),

    /// Query failed
    #[error("query failed: {0}")]
    QueryFailed(String),

    /// Stored row could not be decoded
    #[error("corrupt row in {table}: {reason}")]
    CorruptRow {
        /// Table the row was read from
        table: &'static str,
        /// Why decoding failed
        reason: String,
    },
}

/// API error response format
///
/// # Example JSON Response
///
/// ```json
/// {
///   "error": {
///     "code": "not_found",
///     "message": "queue item 12 not found",
///     "details": { "queue_id": 12 }
///   }
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ApiError {
    /// The error details
    pub error: ErrorDetail,
}

/// Detailed error information for API responses
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ErrorDetail {
    /// Machine-readable error code (e.g., "not_found", "backend_unavailable")
    pub code: String,

    /// Human-readable error message
    pub message: String,

    /// Optional additional context about the error
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ApiError {
    /// Create a new API error with code and message
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: ErrorDetail {
                code: code.into(),
                message: message.into(),
                details: None,
            },
        }
    }

    /// Create a "validation error" error
    pub fn validation(message: impl Into<String>) -> Self {
        Self::new("validation_error", message)
    }

    /// Create an "internal server error"
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new("internal_error", message)
    }
}

/// Convert errors to HTTP status codes for API responses
pub trait ToHttpStatus {
    /// Get the HTTP status code for this error
    fn status_code(&self) -> u16;

    /// Get the machine-readable error code
    fn error_code(&self) -> &str;
}

impl ToHttpStatus for Error {
    fn status_code(&self) -> u16 {
        match self {
            // 400 Bad Request - client-correctable
            Error::Config { .. } => 400,
            Error::BackendUnavailable { .. } => 400,

            // 404 Not Found
            Error::QueueItemNotFound { .. } => 404,

            // 501 Not Implemented - capability missing on the backend
            Error::NotSupported(_) => 501,

            // 502 Bad Gateway - the backend failed
            Error::Backend(_) => 502,

            // 500 Internal Server Error
            Error::Database(_) => 500,
            Error::Sqlx(_) => 500,
            Error::Io(_) => 500,
            Error::Serialization(_) => 500,
            Error::ApiServerError(_) => 500,
            Error::Other(_) => 500,
        }
    }

    fn error_code(&self) -> &str {
        match self {
            Error::Config { .. } => "config_error",
            Error::QueueItemNotFound { .. } => "not_found",
            Error::BackendUnavailable { .. } => "backend_unavailable",
            Error::NotSupported(_) => "not_supported",
            Error::Backend(e) => match e {
                BackendError::Io { .. } => "backend_io_error",
                BackendError::Network { .. } => "backend_network_error",
                BackendError::Rpc { .. } => "backend_rpc_error",
                BackendError::Unauthorized { .. } => "backend_unauthorized",
            },
            Error::Database(_) => "database_error",
            Error::Sqlx(_) => "database_error",
            Error::Io(_) => "io_error",
            Error::Serialization(_) => "serialization_error",
            Error::ApiServerError(_) => "api_server_error",
            Error::Other(_) => "internal_error",
        }
    }
}

impl From<Error> for ApiError {
    fn from(error: Error) -> Self {
        let code = error.error_code().to_string();
        let message = error.to_string();

        let details = match &error {
            Error::QueueItemNotFound { id } => Some(serde_json::json!({
                "queue_id": id,
            })),
            Error::BackendUnavailable { name } => Some(serde_json::json!({
                "backend": name,
            })),
            Error::Backend(e) => Some(serde_json::json!({
                "backend": e.backend(),
            })),
            Error::Config { key: Some(key), .. } => Some(serde_json::json!({
                "key": key,
            })),
            _ => None,
        };

        ApiError {
            error: ErrorDetail {
                code,
                message,
                details,
            },
        }
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    fn all_error_variants() -> Vec<(Error, u16, &'static str)> {
        vec![
            (
                Error::Config {
                    message: "duplicate backend name".into(),
                    key: Some("backends[1].name".into()),
                },
                400,
                "config_error",
            ),
            (
                Error::QueueItemNotFound { id: QueueId(12) },
                404,
                "not_found",
            ),
            (
                Error::BackendUnavailable {
                    name: "transmission".into(),
                },
                400,
                "backend_unavailable",
            ),
            (
                Error::NotSupported("blackhole cannot relabel".into()),
                501,
                "not_supported",
            ),
            (
                Error::Backend(BackendError::Io {
                    backend: "blackhole".into(),
                    source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
                }),
                502,
                "backend_io_error",
            ),
            (
                Error::Backend(BackendError::Rpc {
                    backend: "transmission".into(),
                    message: "invalid argument".into(),
                }),
                502,
                "backend_rpc_error",
            ),
            (
                Error::Backend(BackendError::Unauthorized {
                    backend: "transmission".into(),
                }),
                502,
                "backend_unauthorized",
            ),
            (
                Error::Database(DatabaseError::QueryFailed("locked".into())),
                500,
                "database_error",
            ),
            (
                Error::Io(std::io::Error::new(std::io::ErrorKind::NotFound, "gone")),
                500,
                "io_error",
            ),
            (
                Error::ApiServerError("bind failed".into()),
                500,
                "api_server_error",
            ),
            (Error::Other("unknown".into()), 500, "internal_error"),
        ]
    }

    #[test]
    fn every_variant_maps_to_expected_status_and_code() {
        for (error, status, code) in all_error_variants() {
            assert_eq!(error.status_code(), status, "status for {error:?}");
            assert_eq!(error.error_code(), code, "code for {error:?}");
        }
    }

    #[test]
    fn backend_unavailable_is_client_error_not_server_error() {
        let error = Error::BackendUnavailable {
            name: "missing".into(),
        };
        assert!((400..500).contains(&error.status_code()));
    }

    #[test]
    fn api_error_from_not_found_has_queue_id() {
        let api_error: ApiError = Error::QueueItemNotFound { id: QueueId(42) }.into();
        assert_eq!(api_error.error.code, "not_found");
        assert_eq!(
            api_error.error.details,
            Some(serde_json::json!({ "queue_id": 42 }))
        );
    }

    #[test]
    fn api_error_from_backend_error_names_backend() {
        let api_error: ApiError = Error::Backend(BackendError::Rpc {
            backend: "transmission".into(),
            message: "duplicate torrent".into(),
        })
        .into();
        assert_eq!(
            api_error.error.details,
            Some(serde_json::json!({ "backend": "transmission" }))
        );
        assert!(api_error.error.message.contains("duplicate torrent"));
    }

    #[test]
    fn api_error_from_other_has_no_details() {
        let api_error: ApiError = Error::Other("boom".into()).into();
        assert!(api_error.error.details.is_none());
    }

    #[test]
    fn api_error_serializes_without_null_details() {
        let json = serde_json::to_value(ApiError::validation("bad page")).unwrap();
        assert_eq!(json["error"]["code"], "validation_error");
        assert!(json["error"].get("details").is_none());
    }
}
