//! Image record type and payload normalization

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::fingerprint::{Fingerprint, FingerprintPolicy};

/// Media prefix added to payloads that arrive as bare base64
pub const DEFAULT_MEDIA_PREFIX: &str = "data:image/jpeg;base64,";

/// Latest frame received from one device
///
/// Serializes to the wire shape shared by the WebSocket stream and the REST
/// lookup: `{"esp_hmac": .., "image_data": .., "timestamp": ..}`.
/// Cloning is cheap; the payload is reference counted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageRecord {
    /// Device identifier (the scanner's MAC-derived id)
    #[serde(rename = "esp_hmac")]
    pub device_id: String,

    /// Data-URI encoded image
    #[serde(rename = "image_data")]
    pub payload: Arc<str>,

    /// Capture time in Unix milliseconds
    #[serde(rename = "timestamp")]
    pub captured_at_millis: i64,

    #[serde(skip)]
    pub(crate) fingerprint: Option<Fingerprint>,
}

impl ImageRecord {
    /// Create a record, fingerprinting the payload with `policy`
    pub fn new(
        device_id: impl Into<String>,
        payload: Arc<str>,
        captured_at_millis: i64,
        policy: FingerprintPolicy,
    ) -> Self {
        let fingerprint = Some(policy.fingerprint(&payload));
        Self {
            device_id: device_id.into(),
            payload,
            captured_at_millis,
            fingerprint,
        }
    }

    /// Same frame, re-stamped with `captured_at_millis`
    ///
    /// Used for periodic refreshes; the stored record is left untouched.
    pub fn restamped(&self, captured_at_millis: i64) -> Self {
        Self {
            captured_at_millis,
            ..self.clone()
        }
    }

    /// Payload length in bytes
    pub fn payload_len(&self) -> usize {
        self.payload.len()
    }
}

impl PartialEq for ImageRecord {
    fn eq(&self, other: &Self) -> bool {
        self.device_id == other.device_id
            && self.payload == other.payload
            && self.captured_at_millis == other.captured_at_millis
    }
}

impl Eq for ImageRecord {}

/// Check whether the payload already carries a data-URI media prefix
fn has_media_prefix(data: &str) -> bool {
    data.len() > 11 && (data.starts_with("data:image/") || data.starts_with("data:video/"))
}

/// Prepend [`DEFAULT_MEDIA_PREFIX`] unless the payload already has one
///
/// Empty payloads are returned unchanged.
pub fn normalize_payload(raw: &str) -> String {
    if raw.is_empty() || has_media_prefix(raw) {
        raw.to_string()
    } else {
        format!("{DEFAULT_MEDIA_PREFIX}{raw}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_adds_prefix() {
        assert_eq!(normalize_payload("IMG1"), "data:image/jpeg;base64,IMG1");
    }

    #[test]
    fn test_normalize_keeps_existing_prefix() {
        let png = "data:image/png;base64,AAAA";
        let video = "data:video/mp4;base64,AAAA";

        assert_eq!(normalize_payload(png), png);
        assert_eq!(normalize_payload(video), video);
    }

    #[test]
    fn test_normalize_bare_prefix_is_not_a_prefix() {
        // Exactly "data:image/" with nothing after it is treated as raw data
        assert_eq!(
            normalize_payload("data:image/"),
            "data:image/jpeg;base64,data:image/"
        );
    }

    #[test]
    fn test_normalize_empty() {
        assert_eq!(normalize_payload(""), "");
    }

    #[test]
    fn test_wire_shape() {
        let record = ImageRecord::new("AA:BB", Arc::from("IMG1"), 100, FingerprintPolicy::Sha256);
        let json = serde_json::to_value(&record).unwrap();

        assert_eq!(
            json,
            serde_json::json!({"esp_hmac": "AA:BB", "image_data": "IMG1", "timestamp": 100})
        );
    }

    #[test]
    fn test_restamped_keeps_payload() {
        let record = ImageRecord::new("AA:BB", Arc::from("IMG1"), 100, FingerprintPolicy::Sha256);
        let refreshed = record.restamped(500);

        assert_eq!(refreshed.captured_at_millis, 500);
        assert!(Arc::ptr_eq(&refreshed.payload, &record.payload));
        assert_eq!(record.captured_at_millis, 100);
    }
}
