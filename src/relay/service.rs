//! Relay implementation

use std::sync::Arc;

use bytes::Bytes;
use tokio::sync::mpsc;

use super::config::RelayConfig;
use crate::broadcast::wire::encode_snapshot;
use crate::broadcast::{BroadcastEngine, DeliveryReport};
use crate::image::{ImageRecord, ImageStore};
use crate::registry::{RegistryError, Scope, Subscriber, SubscriberId, SubscriberRegistry};
use crate::stats::{RelayStats, RelayStatus};

/// Current wall-clock time in Unix milliseconds
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Result of ingesting one frame
#[derive(Debug, Clone)]
pub struct IngestReport {
    /// Record stored for the device after this frame
    pub record: ImageRecord,
    /// Whether only the timestamp changed
    pub is_duplicate: bool,
    /// Fan-out outcome
    pub delivery: DeliveryReport,
}

/// Identifies a live subscription for [`Relay::unsubscribe`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriptionHandle {
    id: SubscriberId,
    scope: Scope,
}

impl SubscriptionHandle {
    /// Subscriber id
    pub fn id(&self) -> SubscriberId {
        self.id
    }

    /// Subscription scope
    pub fn scope(&self) -> &Scope {
        &self.scope
    }
}

/// Receiving side of a subscription
///
/// Dropping it closes the channel; later broadcasts to it are counted as
/// closed drops until the subscriber is unregistered.
#[derive(Debug)]
pub struct Subscription {
    handle: SubscriptionHandle,
    receiver: mpsc::Receiver<Bytes>,
}

impl Subscription {
    /// Handle for unsubscribing
    pub fn handle(&self) -> &SubscriptionHandle {
        &self.handle
    }

    /// Wait for the next message
    pub async fn recv(&mut self) -> Option<Bytes> {
        self.receiver.recv().await
    }

    /// Take a queued message without waiting
    pub fn try_recv(&mut self) -> Option<Bytes> {
        self.receiver.try_recv().ok()
    }

    /// Split into handle and raw receiver
    pub fn into_parts(self) -> (SubscriptionHandle, mpsc::Receiver<Bytes>) {
        (self.handle, self.receiver)
    }
}

/// Live device-image relay
pub struct Relay {
    config: RelayConfig,
    store: ImageStore,
    registry: Arc<SubscriberRegistry>,
    engine: BroadcastEngine,
    stats: RelayStats,
}

impl Relay {
    /// Create a relay with the given configuration
    pub fn new(config: RelayConfig) -> Self {
        let registry = Arc::new(SubscriberRegistry::new());

        Self {
            store: ImageStore::with_policy(config.fingerprint),
            engine: BroadcastEngine::new(Arc::clone(&registry)),
            registry,
            stats: RelayStats::new(),
            config,
        }
    }

    /// Relay configuration
    pub fn config(&self) -> &RelayConfig {
        &self.config
    }

    /// Image store
    pub fn store(&self) -> &ImageStore {
        &self.store
    }

    /// Subscriber registry
    pub fn registry(&self) -> &Arc<SubscriberRegistry> {
        &self.registry
    }

    /// Relay counters
    pub fn stats(&self) -> &RelayStats {
        &self.stats
    }

    /// Ingest a frame stamped with the current time
    pub async fn ingest(&self, device_id: &str, payload: &str) -> IngestReport {
        self.ingest_at(device_id, payload, now_millis()).await
    }

    /// Ingest a frame captured at `at_millis`
    ///
    /// Duplicates are broadcast too, so subscribers see the refreshed
    /// timestamp. The device's ordering lock is held until delivery
    /// completes.
    pub async fn ingest_at(&self, device_id: &str, payload: &str, at_millis: i64) -> IngestReport {
        let _order = self.engine.ordering_lock(device_id).await;

        let outcome = self.store.put(device_id, payload, at_millis).await;
        let delivery = self.engine.deliver(&outcome.record).await;
        self.stats.record_ingest(outcome.is_duplicate, &delivery);

        IngestReport {
            record: outcome.record,
            is_duplicate: outcome.is_duplicate,
            delivery,
        }
    }

    /// Register a new subscriber and queue its initial snapshot
    ///
    /// Registration happens before the snapshot is read, so no frame stored
    /// after this call returns can be missed. The snapshot is read and queued
    /// under the ordering lock of every device it covers: a frame racing the
    /// subscription may arrive twice, but never before an older snapshot.
    pub async fn subscribe(&self, scope: Scope) -> Result<Subscription, RegistryError> {
        let (tx, receiver) = mpsc::channel(self.config.channel_capacity);
        let id = self.registry.next_id();

        self.registry
            .register(Subscriber::new(id, scope.clone(), tx.clone()))
            .await?;

        // Any device stored after this list is read reaches the channel live
        let device_ids = match &scope {
            Scope::Device(device_id) => vec![device_id.clone()],
            Scope::AllDevices => self.store.device_ids().await,
        };
        let _order = self.engine.ordering_locks(&device_ids).await;

        let mut records = Vec::with_capacity(device_ids.len());
        for device_id in &device_ids {
            if let Some(record) = self.store.get(device_id).await {
                records.push(record);
            }
        }

        match encode_snapshot(&scope, &records) {
            Ok(Some(message)) => {
                if tx.try_send(message).is_err() {
                    tracing::warn!(subscriber = %id, scope = %scope, "Initial snapshot dropped (channel full)");
                } else {
                    tracing::debug!(
                        subscriber = %id,
                        scope = %scope,
                        records = records.len(),
                        "Initial snapshot queued"
                    );
                }
            }
            Ok(None) => {
                tracing::debug!(subscriber = %id, scope = %scope, "No snapshot available yet");
            }
            Err(e) => {
                tracing::error!(subscriber = %id, error = %e, "Failed to encode snapshot");
            }
        }

        Ok(Subscription {
            handle: SubscriptionHandle { id, scope },
            receiver,
        })
    }

    /// Remove a subscription; idempotent
    pub async fn unsubscribe(&self, handle: &SubscriptionHandle) -> bool {
        self.registry.unregister(&handle.scope, handle.id).await
    }

    /// Current records for a scope
    pub async fn snapshot(&self, scope: &Scope) -> Vec<ImageRecord> {
        match scope {
            Scope::Device(device_id) => self.store.get(device_id).await.into_iter().collect(),
            Scope::AllDevices => self.store.get_all().await,
        }
    }

    /// Latest record for a device
    pub async fn latest(&self, device_id: &str) -> Option<ImageRecord> {
        self.store.get(device_id).await
    }

    /// Latest record of every device
    pub async fn all(&self) -> Vec<ImageRecord> {
        self.store.get_all().await
    }

    /// Devices, subscribers and counters
    pub async fn status(&self) -> RelayStatus {
        let devices = self.store.len().await;
        let counts = self.registry.counts().await;
        RelayStatus::new(devices, counts, self.stats.snapshot())
    }
}

impl Default for Relay {
    fn default() -> Self {
        Self::new(RelayConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::Value;

    use super::*;

    fn parse(bytes: Bytes) -> Value {
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_subscribe_without_snapshot() {
        let relay = Relay::default();
        let mut sub = relay.subscribe(Scope::device("AA:BB")).await.unwrap();

        assert!(sub.try_recv().is_none());
        assert_eq!(relay.registry().counts().await.specific, 1);
    }

    #[tokio::test]
    async fn test_subscribe_receives_snapshot_then_live() {
        let relay = Relay::default();
        relay.ingest_at("AA:BB", "IMG1", 100).await;

        let mut sub = relay.subscribe(Scope::device("AA:BB")).await.unwrap();
        relay.ingest_at("AA:BB", "IMG2", 200).await;

        let snapshot = parse(sub.recv().await.unwrap());
        assert_eq!(snapshot["image_data"], "data:image/jpeg;base64,IMG1");

        let live = parse(sub.recv().await.unwrap());
        assert_eq!(live["image_data"], "data:image/jpeg;base64,IMG2");
        assert_eq!(live["timestamp"], 200);
    }

    #[tokio::test]
    async fn test_all_devices_snapshot_is_array() {
        let relay = Relay::default();
        relay.ingest_at("AA:BB", "IMG1", 100).await;
        relay.ingest_at("CC:DD", "IMG2", 100).await;

        let mut sub = relay.subscribe(Scope::AllDevices).await.unwrap();
        let snapshot = parse(sub.recv().await.unwrap());

        assert_eq!(snapshot.as_array().map(Vec::len), Some(2));
    }

    #[tokio::test]
    async fn test_subscribe_empty_device_rejected() {
        let relay = Relay::default();
        let result = relay.subscribe(Scope::device("")).await;

        assert!(matches!(result, Err(RegistryError::EmptyDeviceId)));
        assert_eq!(relay.registry().counts().await.total(), 0);
    }

    #[tokio::test]
    async fn test_unsubscribe_twice() {
        let relay = Relay::default();
        let sub = relay.subscribe(Scope::AllDevices).await.unwrap();
        let handle = sub.handle().clone();

        assert!(relay.unsubscribe(&handle).await);
        assert!(!relay.unsubscribe(&handle).await);
    }

    #[tokio::test]
    async fn test_ingest_updates_stats_and_status() {
        let relay = Relay::default();
        let _sub = relay.subscribe(Scope::device("AA:BB")).await.unwrap();

        let first = relay.ingest_at("AA:BB", "IMG1", 100).await;
        let second = relay.ingest_at("AA:BB", "IMG1", 200).await;

        assert!(!first.is_duplicate);
        assert!(second.is_duplicate);
        assert_eq!(second.delivery.delivered, 1);

        let status = relay.status().await;
        assert_eq!(status.devices, 1);
        assert_eq!(status.specific_subscribers, 1);
        assert_eq!(status.stats.frames_ingested, 2);
        assert_eq!(status.stats.duplicate_frames, 1);
        assert_eq!(status.stats.messages_delivered, 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_ingest_same_device_keeps_order() {
        let relay = Arc::new(Relay::new(RelayConfig::default().channel_capacity(256)));
        let mut sub = relay.subscribe(Scope::device("dev")).await.unwrap();

        let mut tasks = Vec::new();
        for i in 0..100 {
            let relay = relay.clone();
            tasks.push(tokio::spawn(async move {
                relay.ingest_at("dev", &format!("F{i}"), i).await;
            }));
        }
        for task in tasks {
            task.await.unwrap();
        }

        // Whatever order the store applied, delivery timestamps never go back
        let mut last = i64::MIN;
        let mut seen = 0;
        while let Some(msg) = sub.try_recv() {
            let ts = parse(msg)["timestamp"].as_i64().unwrap();
            assert!(ts > last);
            last = ts;
            seen += 1;
        }
        assert_eq!(seen, 100);

        let stored = relay.latest("dev").await.unwrap();
        assert_eq!(stored.captured_at_millis, last);
    }
}
