//! Server shell error types.
//!
//! Only startup can fail hard; once the event loop runs, every bad input
//! is logged and dropped per the error-handling contract.

use thiserror::Error;

use crate::config::ConfigError;

/// Fatal server-startup errors.
#[derive(Error, Debug)]
pub enum ServerError {
    /// The viewer listener could not bind.
    #[error("failed to bind {addr}: {source}")]
    Bind {
        /// Requested bind address.
        addr: String,
        /// Underlying I/O error.
        source: std::io::Error,
    },
    /// Configuration loading failed.
    #[error(transparent)]
    Config(#[from] ConfigError),
}
