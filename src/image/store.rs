//! Image store implementation
//!
//! Maps device id to its latest [`ImageRecord`].

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;

use super::fingerprint::FingerprintPolicy;
use super::record::{normalize_payload, ImageRecord};

/// Result of [`ImageStore::put`]
#[derive(Debug, Clone)]
pub struct PutOutcome {
    /// The record now stored for the device
    pub record: ImageRecord,
    /// Whether the payload matched the previous frame (timestamp-only update)
    pub is_duplicate: bool,
}

/// Latest frame per device
///
/// Thread-safe via a single `RwLock`: snapshot reads run concurrently,
/// `put` is exclusive.
pub struct ImageStore {
    images: RwLock<HashMap<String, ImageRecord>>,
    policy: FingerprintPolicy,
}

impl ImageStore {
    /// Create an empty store using the default fingerprint policy
    pub fn new() -> Self {
        Self::with_policy(FingerprintPolicy::default())
    }

    /// Create an empty store with a custom fingerprint policy
    pub fn with_policy(policy: FingerprintPolicy) -> Self {
        Self {
            images: RwLock::new(HashMap::new()),
            policy,
        }
    }

    /// Fingerprint policy in use
    pub fn policy(&self) -> FingerprintPolicy {
        self.policy
    }

    /// Store a frame for `device_id`
    ///
    /// The payload is normalized first. If its fingerprint matches the stored
    /// record only the timestamp is updated and `is_duplicate` is set.
    /// Timestamps never move backwards for a device: the stored value is at
    /// least one millisecond past the previous one.
    pub async fn put(&self, device_id: &str, payload: &str, at_millis: i64) -> PutOutcome {
        let normalized = normalize_payload(payload);
        let fingerprint = self.policy.fingerprint(&normalized);

        let mut images = self.images.write().await;

        if let Some(existing) = images.get_mut(device_id) {
            let captured_at = at_millis.max(existing.captured_at_millis.saturating_add(1));

            if existing.fingerprint.as_ref() == Some(&fingerprint) {
                existing.captured_at_millis = captured_at;

                tracing::debug!(
                    device = %device_id,
                    timestamp = captured_at,
                    "Duplicate frame, timestamp refreshed"
                );

                return PutOutcome {
                    record: existing.clone(),
                    is_duplicate: true,
                };
            }

            let record = ImageRecord {
                device_id: device_id.to_string(),
                payload: Arc::from(normalized),
                captured_at_millis: captured_at,
                fingerprint: Some(fingerprint),
            };
            *existing = record.clone();

            tracing::debug!(
                device = %device_id,
                timestamp = captured_at,
                bytes = record.payload_len(),
                "Frame replaced"
            );

            return PutOutcome {
                record,
                is_duplicate: false,
            };
        }

        let record = ImageRecord {
            device_id: device_id.to_string(),
            payload: Arc::from(normalized),
            captured_at_millis: at_millis,
            fingerprint: Some(fingerprint),
        };
        images.insert(device_id.to_string(), record.clone());

        tracing::info!(
            device = %device_id,
            timestamp = at_millis,
            devices = images.len(),
            "First frame stored for device"
        );

        PutOutcome {
            record,
            is_duplicate: false,
        }
    }

    /// Latest record for a device
    pub async fn get(&self, device_id: &str) -> Option<ImageRecord> {
        self.images.read().await.get(device_id).cloned()
    }

    /// Latest record of every device, in no particular order
    pub async fn get_all(&self) -> Vec<ImageRecord> {
        self.images.read().await.values().cloned().collect()
    }

    /// Ids of every device with a stored frame, sorted
    pub async fn device_ids(&self) -> Vec<String> {
        let mut ids: Vec<_> = self.images.read().await.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Number of devices with a stored frame
    pub async fn len(&self) -> usize {
        self.images.read().await.len()
    }

    /// Whether no frame has been stored yet
    pub async fn is_empty(&self) -> bool {
        self.images.read().await.is_empty()
    }
}

impl Default for ImageStore {
    fn default() -> Self {
        Self::new()
    }
}
