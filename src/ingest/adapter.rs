//! Bus message handler

use std::sync::Arc;

use super::error::IngestError;
use super::message::IngestPayload;
use crate::relay::{IngestReport, Relay};

/// Validates bus messages and feeds them into the relay
///
/// Holds no per-message state, so the same message delivered twice (for
/// instance after a bus reconnect) is processed twice without harm.
#[derive(Clone)]
pub struct IngestAdapter {
    relay: Arc<Relay>,
    api_key: Option<String>,
}

impl IngestAdapter {
    /// Create an adapter; `api_key` of `None` (or empty) disables the check
    pub fn new(relay: Arc<Relay>, api_key: Option<String>) -> Self {
        Self {
            relay,
            api_key: api_key.filter(|k| !k.is_empty()),
        }
    }

    /// Relay this adapter feeds
    pub fn relay(&self) -> &Arc<Relay> {
        &self.relay
    }

    /// Handle one raw bus message
    ///
    /// Rejected messages are logged, counted, and returned as an error; the
    /// caller only needs to keep receiving.
    pub async fn on_message(&self, raw: &[u8]) -> Result<IngestReport, IngestError> {
        let result = self.accept(raw).await;

        if let Err(ref e) = result {
            self.relay.stats().record_rejected();
            tracing::warn!(error = %e, bytes = raw.len(), "Ingestion message dropped");
        }

        result
    }

    async fn accept(&self, raw: &[u8]) -> Result<IngestReport, IngestError> {
        let payload = IngestPayload::parse(raw)?;
        self.validate(&payload)?;

        tracing::debug!(
            device = %payload.device_id,
            image_len = payload.image.len(),
            "Ingestion message accepted"
        );

        Ok(self.relay.ingest(&payload.device_id, &payload.image).await)
    }

    fn validate(&self, payload: &IngestPayload) -> Result<(), IngestError> {
        if let Some(ref expected) = self.api_key {
            if payload.api_key != *expected {
                return Err(IngestError::Unauthorized);
            }
        }

        if payload.device_id.is_empty() {
            return Err(IngestError::EmptyDeviceId);
        }

        Ok(())
    }
}
