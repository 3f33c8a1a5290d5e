//! Crate-level error type
//!
//! Per-frame and per-connection failures are reported through the module
//! error types ([`IngestError`](crate::ingest::IngestError),
//! [`RegistryError`]) and never escape the component that hit them. This
//! type covers configuration, binding the listener, and refused sessions.

use crate::registry::RegistryError;

/// Result alias used across the crate
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for relay operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// I/O failure (listener bind, accept)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration could not be loaded or extracted
    #[error("configuration error: {0}")]
    Config(#[from] figment::Error),

    /// Configuration loaded but a value is unusable
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Subscriber registration rejected
    #[error(transparent)]
    Registry(#[from] RegistryError),
}
