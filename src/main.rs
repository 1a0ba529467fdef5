//! Media Streamer - serves stored media with range, thumbnail and upload support.
//!
//! This binary starts the HTTP server and configures all components.

use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use media_streamer::{
    create_router, AccessControl, AppState, Config, LocalMediaStore, OpenAccess, RouterConfig,
    StaffTokenAccess,
};

#[tokio::main]
async fn main() -> ExitCode {
    let config = Config::parse();

    init_logging(config.verbose);

    if let Err(e) = config.validate() {
        error!("Configuration error: {}", e);
        return ExitCode::FAILURE;
    }

    let settings = config.media_settings();

    info!("Media Streamer v{}", env!("CARGO_PKG_VERSION"));
    info!("Configuration:");
    info!("  Media root: {}", config.media_root.display());

    // Auth status with warning if disabled
    if config.auth_enabled {
        info!("  Auth: enabled (staff token)");
    } else {
        warn!("  Auth: DISABLED - anyone may upload, caption and delete");
        warn!("        Enable for production: --staff-token=<token>");
    }

    info!(
        "  Uploads: field '{}', up to {}MB",
        settings.upload_field,
        settings.max_upload_size / (1024 * 1024)
    );
    info!(
        "  Thumbnails: default {}x{}, {}MB cache, JPEG quality {}",
        settings.default_thumbnail.0,
        settings.default_thumbnail.1,
        settings.thumbnail_cache_size / (1024 * 1024),
        settings.jpeg_quality
    );
    if settings.context_classes.is_empty() {
        info!("  Context classes: none (uploads cannot be attached)");
    } else {
        info!("  Context classes: {}", settings.context_classes.join(", "));
    }

    let store = match LocalMediaStore::open(&config.media_root).await {
        Ok(store) => store,
        Err(e) => {
            error!(
                "Failed to open media root {}: {}",
                config.media_root.display(),
                e
            );
            return ExitCode::FAILURE;
        }
    };
    info!("  Loaded {} media record(s)", store.len().await);

    let access: Arc<dyn AccessControl> = match (&config.staff_token, config.auth_enabled) {
        (Some(token), true) => Arc::new(StaffTokenAccess::new(token)),
        _ => Arc::new(OpenAccess),
    };

    let router_config = build_router_config(&config);
    let state = AppState::new(Arc::new(store), settings).with_access(access);
    let router = create_router(state, router_config);

    let addr = config.bind_address();

    info!("");
    info!("────────────────────────────────────────────────────────────────");
    info!("  Server listening on: http://{}", addr);
    info!("");
    info!("  Try these endpoints:");
    info!("    curl http://{}/health", addr);
    info!("    curl http://{}/browse", addr);
    info!("    curl -F mediaFile=@photo.jpg http://{}/upload", addr);
    info!("────────────────────────────────────────────────────────────────");
    info!("");

    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(e) => {
            error!("Failed to bind to {}: {}", addr, e);
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = axum::serve(listener, router).await {
        error!("Server error: {}", e);
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}

/// Initialize the tracing/logging subsystem.
fn init_logging(verbose: bool) {
    let env_filter = if verbose {
        "media_streamer=debug,tower_http=debug"
    } else {
        "media_streamer=info,tower_http=info"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| env_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Build RouterConfig from the application Config.
fn build_router_config(config: &Config) -> RouterConfig {
    let mut router_config = RouterConfig::new()
        .with_max_upload_size(config.max_upload_size)
        .with_tracing(!config.no_tracing);

    if let Some(ref origins) = config.cors_origins {
        router_config = router_config.with_cors_origins(origins.clone());
    }

    router_config
}
