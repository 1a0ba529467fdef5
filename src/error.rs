use thiserror::Error;

/// Fixed user-facing messages for upload failures.
pub mod messages {
    pub const NO_FILE: &str = "You did not select a file to upload";
    pub const SIZE_EXCEEDED: &str =
        "Your file exceeds the maximum upload size. Please try again with a smaller file.";
    pub const PARTIAL: &str = "Your file was only partially uploaded, please try again.";
    pub const UNKNOWN_UPLOAD: &str =
        "There was an unknown problem while processing your upload, please try again.";
    pub const UNSUPPORTED_FORMAT: &str = "The file you uploaded is not of a supported media format";
    pub const CONTEXT_INVALID: &str = "Context is invalid";
    pub const CONTEXT_NOT_FOUND: &str = "Context class not found";
}

/// Errors reported by a media store implementation.
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    /// Record or file does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Content is not a format the store accepts
    #[error("Unsupported media: {0}")]
    Unsupported(String),

    /// Filesystem failure
    #[error("I/O error: {0}")]
    Io(String),

    /// Stored metadata could not be decoded
    #[error("Corrupt record {id}: {message}")]
    Corrupt { id: u64, message: String },
}

impl From<std::io::Error> for StoreError {
    fn from(err: std::io::Error) -> Self {
        if err.kind() == std::io::ErrorKind::NotFound {
            StoreError::NotFound(err.to_string())
        } else {
            StoreError::Io(err.to_string())
        }
    }
}

/// The user-facing error taxonomy.
///
/// Every failure inside the request path is folded into one of these before it
/// reaches the client. The payload sent for each variant is fixed; the carried
/// detail strings are only ever logged.
#[derive(Debug, Clone, Error)]
pub enum MediaError {
    /// Client input was rejected with a fixed message
    #[error("Validation failed: {0}")]
    Validation(String),

    /// Context attachment was rejected with a fixed message
    #[error("Invalid context: {0}")]
    ContextInvalid(String),

    /// Caller is not allowed to perform the action
    #[error("Unauthorized")]
    Unauthorized,

    /// Record, variant or artifact is unavailable
    #[error("Not found: {0}")]
    NotFound(String),

    /// Range header was malformed or outside the resource
    #[error("Range not satisfiable for resource of {size} bytes")]
    RangeNotSatisfiable { size: u64 },

    /// Thumbnail derivation failed
    #[error("Thumbnail generation failed: {0}")]
    Generation(String),
}

impl MediaError {
    pub fn not_found(detail: impl Into<String>) -> Self {
        MediaError::NotFound(detail.into())
    }

    pub fn validation(message: &str) -> Self {
        MediaError::Validation(message.to_string())
    }
}

impl From<StoreError> for MediaError {
    fn from(err: StoreError) -> Self {
        // Storage detail is never surfaced; lookups that fail are reported as missing.
        MediaError::NotFound(err.to_string())
    }
}
