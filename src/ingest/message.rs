//! Ingestion message format

use std::fmt;

use serde::{Deserialize, Serialize};

use super::error::IngestError;

/// Frame published by a scanner device
///
/// `{"X-API-KEY": .., "X-MAC-ADDRESS": .., "image": <base64>}`. Missing
/// fields deserialize as empty strings and are rejected by validation.
#[derive(Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct IngestPayload {
    #[serde(rename = "X-API-KEY", default)]
    pub api_key: String,

    #[serde(rename = "X-MAC-ADDRESS", default)]
    pub device_id: String,

    #[serde(default)]
    pub image: String,
}

impl IngestPayload {
    /// Parse a raw bus payload
    pub fn parse(raw: &[u8]) -> Result<Self, IngestError> {
        Ok(serde_json::from_slice(raw)?)
    }
}

// The API key is a credential and the image can be megabytes; keep both out
// of logs.
impl fmt::Debug for IngestPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IngestPayload")
            .field("api_key", &"<redacted>")
            .field("device_id", &self.device_id)
            .field("image_len", &self.image.len())
            .finish()
    }
}
