//! Outbound WebSocket message encoding
//!
//! All messages are JSON text. Image updates use the [`ImageRecord`] shape
//! directly; control messages carry a `type` tag.

use bytes::Bytes;
use serde::Serialize;

use crate::image::ImageRecord;
use crate::registry::Scope;

const MODE_ALL_DEVICES: &str = "all_devices";

/// Encode a specific-device update: `{"esp_hmac", "image_data", "timestamp"}`
pub fn encode_image(record: &ImageRecord) -> serde_json::Result<Bytes> {
    serde_json::to_vec(record).map(Bytes::from)
}

/// Encode an all-devices update or snapshot: an array of image objects
pub fn encode_images(records: &[ImageRecord]) -> serde_json::Result<Bytes> {
    serde_json::to_vec(records).map(Bytes::from)
}

/// Encode the snapshot shape for a scope
///
/// A device scope yields one object (or nothing when the device has no
/// frame yet); the all-devices scope yields one array, or nothing when the
/// store is empty.
pub fn encode_snapshot(scope: &Scope, records: &[ImageRecord]) -> serde_json::Result<Option<Bytes>> {
    match scope {
        Scope::Device(_) => records.first().map(encode_image).transpose(),
        Scope::AllDevices if records.is_empty() => Ok(None),
        Scope::AllDevices => encode_images(records).map(Some),
    }
}

/// Periodic keep-alive
///
/// `{"type":"keep_alive","timestamp":..,"esp_hmac"?:..,"mode"?:"all_devices"}`
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct KeepAlive<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    pub timestamp: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub esp_hmac: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mode: Option<&'static str>,
}

impl<'a> KeepAlive<'a> {
    /// Keep-alive for a subscriber watching `scope`
    pub fn for_scope(scope: &'a Scope, timestamp: i64) -> Self {
        let (esp_hmac, mode) = scope_fields(scope);
        Self {
            kind: "keep_alive",
            timestamp,
            esp_hmac,
            mode,
        }
    }

    /// Encode as JSON
    pub fn encode(&self) -> serde_json::Result<Bytes> {
        serde_json::to_vec(self).map(Bytes::from)
    }
}

/// Greeting written once a connection is registered
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ConnectionStatus<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    pub connected: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub esp_hmac: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mode: Option<&'static str>,
    pub timestamp: i64,
    pub message: &'static str,
}

impl<'a> ConnectionStatus<'a> {
    /// Greeting for a subscriber watching `scope`
    pub fn connected(scope: &'a Scope, timestamp: i64) -> Self {
        let (esp_hmac, mode) = scope_fields(scope);
        let message = if scope.is_all() {
            "WebSocket connection established for all devices"
        } else {
            "WebSocket connection established"
        };

        Self {
            kind: "connection_status",
            connected: true,
            esp_hmac,
            mode,
            timestamp,
            message,
        }
    }

    /// Encode as JSON
    pub fn encode(&self) -> serde_json::Result<Bytes> {
        serde_json::to_vec(self).map(Bytes::from)
    }
}

fn scope_fields(scope: &Scope) -> (Option<&str>, Option<&'static str>) {
    match scope {
        Scope::Device(id) => (Some(id.as_str()), None),
        Scope::AllDevices => (None, Some(MODE_ALL_DEVICES)),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde_json::{json, Value};

    use super::*;
    use crate::image::FingerprintPolicy;

    fn record(device: &str, payload: &str, ts: i64) -> ImageRecord {
        ImageRecord::new(device, Arc::from(payload), ts, FingerprintPolicy::Sha256)
    }

    fn parse(bytes: &Bytes) -> Value {
        serde_json::from_slice(bytes).unwrap()
    }

    #[test]
    fn test_encode_image_and_array() {
        let r = record("AA:BB", "IMG1", 100);

        assert_eq!(
            parse(&encode_image(&r).unwrap()),
            json!({"esp_hmac": "AA:BB", "image_data": "IMG1", "timestamp": 100})
        );
        assert_eq!(
            parse(&encode_images(std::slice::from_ref(&r)).unwrap()),
            json!([{"esp_hmac": "AA:BB", "image_data": "IMG1", "timestamp": 100}])
        );
    }

    #[test]
    fn test_encode_snapshot() {
        let a = record("AA:BB", "IMG1", 100);
        let b = record("CC:DD", "IMG2", 200);
        let device = Scope::device("AA:BB");

        assert!(encode_snapshot(&device, &[]).unwrap().is_none());
        assert!(encode_snapshot(&Scope::AllDevices, &[]).unwrap().is_none());

        let single = encode_snapshot(&device, std::slice::from_ref(&a)).unwrap().unwrap();
        assert!(parse(&single).is_object());

        let many = encode_snapshot(&Scope::AllDevices, &[a, b]).unwrap().unwrap();
        assert_eq!(parse(&many).as_array().map(Vec::len), Some(2));
    }

    #[test]
    fn test_keep_alive_shapes() {
        let device = Scope::device("AA:BB");

        assert_eq!(
            parse(&KeepAlive::for_scope(&device, 5).encode().unwrap()),
            json!({"type": "keep_alive", "timestamp": 5, "esp_hmac": "AA:BB"})
        );
        assert_eq!(
            parse(&KeepAlive::for_scope(&Scope::AllDevices, 5).encode().unwrap()),
            json!({"type": "keep_alive", "timestamp": 5, "mode": "all_devices"})
        );
    }

    #[test]
    fn test_connection_status_shape() {
        let device = Scope::device("AA:BB");
        let value = parse(&ConnectionStatus::connected(&device, 7).encode().unwrap());

        assert_eq!(value["type"], "connection_status");
        assert_eq!(value["connected"], true);
        assert_eq!(value["esp_hmac"], "AA:BB");
        assert_eq!(value["timestamp"], 7);
        assert!(value.get("mode").is_none());

        let value = parse(&ConnectionStatus::connected(&Scope::AllDevices, 7).encode().unwrap());
        assert_eq!(value["mode"], "all_devices");
        assert!(value.get("esp_hmac").is_none());
    }
}
