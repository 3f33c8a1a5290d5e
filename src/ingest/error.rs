//! Ingestion error types

/// Why an ingestion message was dropped
#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    /// Payload is not the expected JSON shape
    #[error("malformed message: {0}")]
    Malformed(#[from] serde_json::Error),

    /// Shared secret did not match
    #[error("invalid API key")]
    Unauthorized,

    /// Message carried no device id
    #[error("empty device id")]
    EmptyDeviceId,
}
