//! Configuration management for the media server.
//!
//! This module provides a configuration system that supports:
//! - Command-line arguments via clap
//! - Environment variables with `MEDIA_` prefix
//! - Sensible defaults for all optional settings
//!
//! # Environment Variables
//!
//! - `MEDIA_HOST` - Server bind address (default: 0.0.0.0)
//! - `MEDIA_PORT` - Server port (default: 3000)
//! - `MEDIA_ROOT` - Directory holding media records (default: ./media)
//! - `MEDIA_AUTH_ENABLED` - Require a staff token for writes (default: true)
//! - `MEDIA_STAFF_TOKEN` - Bearer token identifying staff
//! - `MEDIA_UPLOAD_FIELD` - Multipart field carrying the file (default: mediaFile)
//! - `MEDIA_MAX_UPLOAD_SIZE` - Upload size limit in bytes (default: 32MB)
//! - `MEDIA_THUMBNAIL_WIDTH` / `MEDIA_THUMBNAIL_HEIGHT` - Default thumbnail box (default: 100x100)
//! - `MEDIA_THUMBNAIL_CACHE` - In-memory thumbnail cache in bytes (default: 64MB)
//! - `MEDIA_JPEG_QUALITY` - JPEG thumbnail quality (default: 80)
//! - `MEDIA_CACHE_MAX_AGE` - HTTP cache max-age seconds (default: one year)
//! - `MEDIA_CONTEXT_CLASSES` - Classes media may be attached to (comma-separated)
//! - `MEDIA_BROWSE_LIMIT` - Maximum records per browse response (default: 100)
//! - `MEDIA_CORS_ORIGINS` - Allowed CORS origins (comma-separated)

use std::path::PathBuf;

use clap::Parser;

use crate::response::DEFAULT_CACHE_MAX_AGE;
use crate::thumbnail::{DEFAULT_JPEG_QUALITY, DEFAULT_THUMBNAIL_CACHE_CAPACITY, DEFAULT_THUMBNAIL_SIZE};
use crate::upload::DEFAULT_UPLOAD_FIELD;

// =============================================================================
// Default Values
// =============================================================================

/// Default server host.
pub const DEFAULT_HOST: &str = "0.0.0.0";

/// Default server port.
pub const DEFAULT_PORT: u16 = 3000;

/// Default media root directory.
pub const DEFAULT_MEDIA_ROOT: &str = "./media";

/// Default upload size limit: 32MB
pub const DEFAULT_MAX_UPLOAD_SIZE: usize = 32 * 1024 * 1024;

/// Default number of records per browse response.
pub const DEFAULT_BROWSE_LIMIT: usize = 100;

// =============================================================================
// CLI Arguments
// =============================================================================

/// Media Streamer - stores images and serves them with range and thumbnail support.
#[derive(Parser, Debug, Clone)]
#[command(name = "media-streamer")]
#[command(author, version, about, long_about = None)]
pub struct Config {
    // =========================================================================
    // Server Configuration
    // =========================================================================
    /// Host address to bind the server to.
    #[arg(long, default_value = DEFAULT_HOST, env = "MEDIA_HOST")]
    pub host: String,

    /// Port to listen on.
    #[arg(short, long, default_value_t = DEFAULT_PORT, env = "MEDIA_PORT")]
    pub port: u16,

    // =========================================================================
    // Storage Configuration
    // =========================================================================
    /// Directory holding one subdirectory per media record.
    #[arg(long, default_value = DEFAULT_MEDIA_ROOT, env = "MEDIA_ROOT")]
    pub media_root: PathBuf,

    // =========================================================================
    // Authentication Configuration
    // =========================================================================
    /// Require a staff token for uploads, captions and deletes.
    ///
    /// WARNING: Only disable authentication in development/testing.
    #[arg(long, default_value_t = true, env = "MEDIA_AUTH_ENABLED", action = clap::ArgAction::Set)]
    pub auth_enabled: bool,

    /// Bearer token that identifies staff callers.
    #[arg(long, env = "MEDIA_STAFF_TOKEN")]
    pub staff_token: Option<String>,

    // =========================================================================
    // Upload Configuration
    // =========================================================================
    /// Multipart field name carrying the uploaded file.
    #[arg(long, default_value = DEFAULT_UPLOAD_FIELD, env = "MEDIA_UPLOAD_FIELD")]
    pub upload_field: String,

    /// Maximum upload size in bytes.
    #[arg(long, default_value_t = DEFAULT_MAX_UPLOAD_SIZE, env = "MEDIA_MAX_UPLOAD_SIZE")]
    pub max_upload_size: usize,

    /// Classes media may be attached to (comma-separated).
    #[arg(long, env = "MEDIA_CONTEXT_CLASSES", value_delimiter = ',')]
    pub context_classes: Vec<String>,

    // =========================================================================
    // Thumbnail Configuration
    // =========================================================================
    /// Thumbnail width used when the URL names no size.
    #[arg(long, default_value_t = DEFAULT_THUMBNAIL_SIZE.0, env = "MEDIA_THUMBNAIL_WIDTH")]
    pub thumbnail_width: u32,

    /// Thumbnail height used when the URL names no size.
    #[arg(long, default_value_t = DEFAULT_THUMBNAIL_SIZE.1, env = "MEDIA_THUMBNAIL_HEIGHT")]
    pub thumbnail_height: u32,

    /// Size of the in-memory thumbnail cache in bytes.
    #[arg(long, default_value_t = DEFAULT_THUMBNAIL_CACHE_CAPACITY, env = "MEDIA_THUMBNAIL_CACHE")]
    pub thumbnail_cache: usize,

    /// JPEG quality for thumbnails of JPEG sources (1-100).
    #[arg(long, default_value_t = DEFAULT_JPEG_QUALITY, env = "MEDIA_JPEG_QUALITY")]
    pub jpeg_quality: u8,

    // =========================================================================
    // HTTP Configuration
    // =========================================================================
    /// HTTP Cache-Control max-age in seconds.
    #[arg(long, default_value_t = DEFAULT_CACHE_MAX_AGE, env = "MEDIA_CACHE_MAX_AGE")]
    pub cache_max_age: u32,

    /// Maximum records per browse response.
    #[arg(long, default_value_t = DEFAULT_BROWSE_LIMIT, env = "MEDIA_BROWSE_LIMIT")]
    pub browse_limit: usize,

    /// Allowed CORS origins (comma-separated).
    ///
    /// If not specified, allows any origin.
    #[arg(long, env = "MEDIA_CORS_ORIGINS", value_delimiter = ',')]
    pub cors_origins: Option<Vec<String>>,

    // =========================================================================
    // Logging Configuration
    // =========================================================================
    /// Enable verbose logging (debug level).
    #[arg(short, long, default_value_t = false)]
    pub verbose: bool,

    /// Disable request tracing.
    #[arg(long, default_value_t = false)]
    pub no_tracing: bool,
}

impl Config {
    /// Validate the configuration and return an error message if invalid.
    pub fn validate(&self) -> Result<(), String> {
        if self.auth_enabled && self.staff_token.as_deref().unwrap_or("").is_empty() {
            return Err(
                "Authentication is enabled but no staff token provided. \
                 Set --staff-token or MEDIA_STAFF_TOKEN, or disable auth with --auth-enabled=false"
                    .to_string(),
            );
        }

        if self.upload_field.is_empty() {
            return Err("upload_field must not be empty".to_string());
        }

        if self.max_upload_size == 0 {
            return Err("max_upload_size must be greater than 0".to_string());
        }

        if self.thumbnail_width == 0 || self.thumbnail_height == 0 {
            return Err("thumbnail dimensions must be greater than 0".to_string());
        }

        if self.jpeg_quality == 0 || self.jpeg_quality > 100 {
            return Err("jpeg_quality must be between 1 and 100".to_string());
        }

        if self.browse_limit == 0 {
            return Err("browse_limit must be greater than 0".to_string());
        }

        Ok(())
    }

    /// Get the server bind address as "host:port".
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Runtime settings for the request components.
    pub fn media_settings(&self) -> MediaSettings {
        MediaSettings {
            upload_field: self.upload_field.clone(),
            max_upload_size: self.max_upload_size,
            default_thumbnail: (self.thumbnail_width, self.thumbnail_height),
            thumbnail_cache_size: self.thumbnail_cache,
            jpeg_quality: self.jpeg_quality,
            cache_max_age: self.cache_max_age,
            context_classes: self
                .context_classes
                .iter()
                .map(|c| c.trim().to_string())
                .filter(|c| !c.is_empty())
                .collect(),
            browse_limit: self.browse_limit,
        }
    }
}

// =============================================================================
// Runtime Settings
// =============================================================================

/// Values the request components need at runtime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaSettings {
    pub upload_field: String,
    pub max_upload_size: usize,

    /// `(width, height)` used when a thumbnail URL names no size
    pub default_thumbnail: (u32, u32),

    pub thumbnail_cache_size: usize,
    pub jpeg_quality: u8,
    pub cache_max_age: u32,
    pub context_classes: Vec<String>,
    pub browse_limit: usize,
}

impl Default for MediaSettings {
    fn default() -> Self {
        Self {
            upload_field: DEFAULT_UPLOAD_FIELD.to_string(),
            max_upload_size: DEFAULT_MAX_UPLOAD_SIZE,
            default_thumbnail: DEFAULT_THUMBNAIL_SIZE,
            thumbnail_cache_size: DEFAULT_THUMBNAIL_CACHE_CAPACITY,
            jpeg_quality: DEFAULT_JPEG_QUALITY,
            cache_max_age: DEFAULT_CACHE_MAX_AGE,
            context_classes: Vec::new(),
            browse_limit: DEFAULT_BROWSE_LIMIT,
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
