// src/error.rs
//! Error types shared by the broker and the client

use thiserror::Error;

/// Errors raised while reading catalogs, moving artifacts or talking to the broker
#[derive(Error, Debug)]
pub enum Error {
    /// A registry answered a catalog or repository request with an error
    #[error("registry error: {0}")]
    RegistryError(String),

    /// Login or refresh against the broker failed
    #[error("authentication failed: {0}")]
    AuthError(String),

    /// The broker rejected a job submission or a poll
    #[error("submit error: {0}")]
    SubmitError(String),

    /// A job did not complete within the polling budget
    #[error("timed out: {0}")]
    TimeoutError(String),

    /// A bundled component had no uploadable assets left after filtering
    #[error("{0}")]
    EmptyComponentError(String),

    /// The destination rejected an upload
    #[error("{0}")]
    UploadError(String),

    /// A component, repository or job does not exist
    #[error("not found: {0}")]
    NotFoundError(String),

    /// Fetching an artifact or metadata document from an origin failed
    #[error("download failed: {0}")]
    DownloadError(String),

    /// A response body could not be decoded
    #[error("parse error: {0}")]
    ParseError(String),

    /// An HTTP client or other resource could not be initialised
    #[error("initialization error: {0}")]
    InitError(String),

    /// Invalid or incomplete configuration
    #[error("configuration error: {0}")]
    ConfigError(String),

    /// The operation was abandoned because a sibling task failed
    #[error("cancelled: {0}")]
    Cancelled(String),

    /// I/O error
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Result alias used throughout the crate
pub type Result<T> = std::result::Result<T, Error>;
