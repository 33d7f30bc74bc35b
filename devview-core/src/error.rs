//! Error types for devview

use thiserror::Error;

/// Main error type for devview operations
#[derive(Error, Debug)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed vertex, face, edge, color or flag arrays
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Shader module or pipeline could not be built
    #[error("Graphics resource error: {0}")]
    GraphicsResource(String),

    #[error("GPU error: {0}")]
    Gpu(String),

    #[error("Window error: {0}")]
    Window(String),
}

impl Error {
    pub(crate) fn invalid(message: impl Into<String>) -> Self {
        Error::InvalidInput(message.into())
    }
}

/// Result type alias for devview operations
pub type Result<T> = std::result::Result<T, Error>;
