//! OpenAPI documentation and schema generation
//!
//! The grab-queue REST API described with utoipa at compile time.

use utoipa::OpenApi;

/// OpenAPI documentation for the grab-queue REST API
///
/// The spec can be accessed via:
/// - `/api/v1/openapi.json` - JSON format OpenAPI specification
/// - `/swagger-ui` - Interactive Swagger UI documentation
#[derive(OpenApi)]
#[openapi(
    info(
        title = "grab-queue REST API",
        version = "0.1.0",
        description = "Merged view of pending releases and tracked downloads, with removal, blocklisting and ignore actions",
        license(
            name = "MIT OR Apache-2.0"
        )
    ),
    servers(
        (url = "http://localhost:8686/api/v1", description = "Local development server")
    ),
    paths(
        // Queue
        crate::api::routes::get_queue,
        crate::api::routes::remove_queue_item,
        crate::api::routes::remove_queue_items,

        // Blocklist
        crate::api::routes::list_blocklist,

        // System
        crate::api::routes::health_check,
        crate::api::routes::test_backend,
        crate::api::routes::openapi_spec,
        crate::api::routes::event_stream,
    ),
    components(schemas(
        // Core types from types.rs
        crate::types::QueueId,
        crate::types::Protocol,
        crate::types::Quality,
        crate::types::ArtistRef,
        crate::types::AlbumRef,
        crate::types::QueueStatus,
        crate::types::BlocklistSource,
        crate::types::Event,

        // Queue view
        crate::queue::SortKey,
        crate::queue::SortDirection,
        crate::queue::PageInfo,

        // Actions
        crate::actions::RemovalOptions,
        crate::actions::BulkRemovalReport,
        crate::actions::BulkFailure,

        // Blocklist
        crate::blocklist::BlocklistEntry,

        // API request/response types from routes
        crate::api::routes::QueueResource,
        crate::api::routes::QueueResponse,
        crate::api::routes::BulkRemoveRequest,
        crate::api::routes::BlocklistResponse,
        crate::api::routes::BackendTestResponse,
        crate::backend::ValidationFailure,

        // Error types from error.rs
        crate::error::ApiError,
        crate::error::ErrorDetail,
    )),
    tags(
        (name = "queue", description = "Queue - Read the merged queue and remove, blocklist or ignore rows"),
        (name = "blocklist", description = "Blocklist - Releases that will not be grabbed again"),
        (name = "system", description = "System endpoints - Health checks, backend checks, OpenAPI spec, events"),
    )
)]
pub struct ApiDoc;
