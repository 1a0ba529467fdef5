//! Router configuration for the media server.
//!
//! This module defines the HTTP routes and applies middleware for CORS,
//! body limits and tracing.
//!
//! # Route Structure
//!
//! ```text
//! /health                              - Health check
//! /, /browse                           - List records (GET), upload (POST /)
//! /upload                              - Upload (POST multipart, PUT raw body)
//! /open/{id}[/{variant}]               - Stream a variant
//! /{id}[/{variant}]                    - Same as /open
//! /download/{id}[/{filename}]          - Attachment download
//! /info/{id}                           - Record metadata
//! /caption/{id}                        - Read (GET) or set (POST) the caption
//! /delete[/{id}]                       - Delete (POST or DELETE)
//! /thumbnail/{id}[/{spec}][/cropped]   - Derived thumbnail
//! ```
//!
//! Access control is not a layer here: each handler asks the
//! [`AccessControl`](crate::media::AccessControl) policy held in the state.
//!
//! # Example
//!
//! ```ignore
//! use media_streamer::server::{create_router, AppState, RouterConfig};
//! use media_streamer::{LocalMediaStore, MediaSettings};
//!
//! let store = Arc::new(LocalMediaStore::open("./media").await?);
//! let state = AppState::new(store, MediaSettings::default());
//!
//! let config = RouterConfig::new()
//!     .with_cors_origins(vec!["https://example.com".to_string()]);
//!
//! let router = create_router(state, config);
//!
//! let listener = tokio::net::TcpListener::bind("0.0.0.0:3000").await?;
//! axum::serve(listener, router).await?;
//! ```

use std::time::Duration;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use http::header::{AUTHORIZATION, CONTENT_TYPE, IF_MODIFIED_SINCE, IF_NONE_MATCH, RANGE};
use http::Method;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use super::handlers::{
    browse_handler, caption_handler, delete_handler, delete_one_handler, download_handler,
    download_named_handler, health_handler, info_handler, open_handler, open_variant_handler,
    set_caption_handler, thumbnail_handler, thumbnail_spec_handler, upload_form_handler,
    upload_put_handler, AppState,
};
use crate::config::DEFAULT_MAX_UPLOAD_SIZE;
use crate::media::MediaStore;

/// Room left in the request body limit for multipart boundaries and form fields.
pub const MULTIPART_OVERHEAD: usize = 64 * 1024;

// =============================================================================
// Router Configuration
// =============================================================================

/// Configuration for the HTTP router.
#[derive(Clone)]
pub struct RouterConfig {
    /// Allowed CORS origins (None = allow any origin)
    pub cors_origins: Option<Vec<String>>,

    /// Whether to enable request tracing
    pub enable_tracing: bool,

    /// Limit applied to buffered request bodies
    pub max_body_size: usize,
}

impl RouterConfig {
    /// Create a router configuration.
    ///
    /// By default:
    /// - CORS allows any origin
    /// - Tracing is enabled
    /// - Bodies may hold a default-sized upload
    pub fn new() -> Self {
        Self {
            cors_origins: None,
            enable_tracing: true,
            max_body_size: DEFAULT_MAX_UPLOAD_SIZE + MULTIPART_OVERHEAD,
        }
    }

    /// Set specific allowed CORS origins.
    ///
    /// Pass an empty vec to disallow all cross-origin requests.
    /// Pass None (or don't call this method) to allow any origin.
    pub fn with_cors_origins(mut self, origins: Vec<String>) -> Self {
        self.cors_origins = Some(origins);
        self
    }

    /// Allow any CORS origin.
    pub fn with_cors_any_origin(mut self) -> Self {
        self.cors_origins = None;
        self
    }

    /// Size the body limit for uploads of up to `max_upload_size` bytes.
    pub fn with_max_upload_size(mut self, max_upload_size: usize) -> Self {
        self.max_body_size = max_upload_size.saturating_add(MULTIPART_OVERHEAD);
        self
    }

    /// Enable or disable request tracing.
    pub fn with_tracing(mut self, enabled: bool) -> Self {
        self.enable_tracing = enabled;
        self
    }
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// Router Builder
// =============================================================================

/// Create the main application router.
///
/// # Arguments
///
/// * `state` - Shared components and settings
/// * `config` - Router configuration
pub fn create_router<S>(state: AppState<S>, config: RouterConfig) -> Router
where
    S: MediaStore + 'static,
{
    let cors = build_cors_layer(&config);

    let router = Router::new()
        .route("/health", get(health_handler))
        .route(
            "/",
            get(browse_handler::<S>).post(upload_form_handler::<S>),
        )
        .route("/browse", get(browse_handler::<S>))
        .route(
            "/upload",
            post(upload_form_handler::<S>).put(upload_put_handler::<S>),
        )
        .route("/open/{id}", get(open_handler::<S>))
        .route("/open/{id}/{variant}", get(open_variant_handler::<S>))
        .route("/download/{id}", get(download_handler::<S>))
        .route("/download/{id}/{filename}", get(download_named_handler::<S>))
        .route("/info/{id}", get(info_handler::<S>))
        .route(
            "/caption/{id}",
            get(caption_handler::<S>).post(set_caption_handler::<S>),
        )
        .route(
            "/delete",
            post(delete_handler::<S>).delete(delete_handler::<S>),
        )
        .route(
            "/delete/{id}",
            post(delete_one_handler::<S>).delete(delete_one_handler::<S>),
        )
        .route("/thumbnail/{id}", get(thumbnail_handler::<S>))
        .route("/thumbnail/{id}/{*spec}", get(thumbnail_spec_handler::<S>))
        .route("/{id}", get(open_handler::<S>))
        .route("/{id}/{variant}", get(open_variant_handler::<S>))
        .with_state(state)
        .layer(DefaultBodyLimit::max(config.max_body_size))
        .layer(cors);

    // Add tracing if enabled
    if config.enable_tracing {
        router.layer(TraceLayer::new_for_http())
    } else {
        router
    }
}

/// Build the CORS layer based on configuration.
fn build_cors_layer(config: &RouterConfig) -> CorsLayer {
    let cors = CorsLayer::new()
        .allow_methods([
            Method::GET,
            Method::HEAD,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([AUTHORIZATION, CONTENT_TYPE, RANGE, IF_NONE_MATCH, IF_MODIFIED_SINCE])
        .max_age(Duration::from_secs(86400)); // 24 hours

    match &config.cors_origins {
        None => cors.allow_origin(Any),
        Some(origins) if origins.is_empty() => {
            // No origins allowed - this effectively disables CORS
            cors
        }
        Some(origins) => {
            let parsed_origins: Vec<_> = origins.iter().filter_map(|o| o.parse().ok()).collect();
            cors.allow_origin(parsed_origins)
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
