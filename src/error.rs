use thiserror::Error;

/// Errors reported by a temporary resource store.
#[derive(Debug, Clone, Error)]
pub enum StorageError {
    /// The resource does not exist
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// The reference cannot be mapped to a storage location
    #[error("Invalid resource location: {0}")]
    InvalidLocation(String),

    /// Local filesystem failure
    #[error("I/O error: {0}")]
    Io(String),

    /// Error from S3 or S3-compatible storage
    #[error("S3 error: {0}")]
    S3(String),

    /// Network or connection error
    #[error("Connection error: {0}")]
    Connection(String),
}

/// Errors raised by the image cache.
///
/// A missing or half-written entry is not an error: lookups report it as absent.
#[derive(Debug, Clone, Error)]
pub enum CacheError {
    /// A stored type marker does not name a known image type
    #[error("Corrupted image type marker for id [{id}]: {marker:?}")]
    Corrupted { id: String, marker: String },

    /// One or both artifacts of an entry could not be persisted
    #[error("Failed to write formula image data for id [{id}]: {source}")]
    Write {
        id: String,
        #[source]
        source: StorageError,
    },
}

/// Errors raised while resolving or running a renderer.
#[derive(Debug, Clone, Error)]
pub enum RenderError {
    /// No renderer is registered under the hint
    #[error("No formula renderer registered for hint [{hint}]")]
    RendererNotFound { hint: String },

    /// The renderer rejected the formula as malformed
    #[error("Invalid formula for the [{renderer}] renderer: {message}")]
    InvalidInput { renderer: String, message: String },

    /// The renderer failed for a reason unrelated to the formula syntax
    #[error("The [{renderer}] renderer failed: {message}")]
    Execution { renderer: String, message: String },

    /// The cache returned a corrupted entry
    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),
}

impl RenderError {
    /// Whether the failure is about the formula itself rather than the backend.
    pub fn is_invalid_input(&self) -> bool {
        matches!(self, RenderError::InvalidInput { .. })
    }

    pub(crate) fn execution(renderer: &str, message: impl Into<String>) -> Self {
        RenderError::Execution {
            renderer: renderer.to_string(),
            message: message.into(),
        }
    }

    pub(crate) fn invalid_input(renderer: &str, message: impl Into<String>) -> Self {
        RenderError::InvalidInput {
            renderer: renderer.to_string(),
            message: message.into(),
        }
    }
}

/// Caller-facing failures of the formula service.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FormulaError {
    /// The formula text is empty or whitespace only
    #[error("The mandatory formula text is missing.")]
    ContentMissing,

    /// Neither the configured renderer nor the safe renderer produced an image
    #[error("The formula text is not valid, please correct it.")]
    InvalidFormula,
}
