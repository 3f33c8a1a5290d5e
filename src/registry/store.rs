//! Subscriber registry implementation
//!
//! The central registry that tracks live subscribers and hands consistent
//! snapshots of them to the broadcast engine.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::RwLock;

use super::error::RegistryError;
use super::subscriber::{Scope, Subscriber, SubscriberId};

#[derive(Default)]
struct Subscribers {
    /// Per-device subscriber lists; never holds an empty list
    specific: HashMap<String, Vec<Subscriber>>,
    /// Subscribers watching every device
    all: Vec<Subscriber>,
}

/// Subscriber counts at a point in time
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RegistryCounts {
    /// Devices with at least one specific subscriber
    pub devices: usize,
    /// Total specific-device subscribers
    pub specific: usize,
    /// All-devices subscribers
    pub all: usize,
}

impl RegistryCounts {
    /// Total number of subscribers
    pub fn total(&self) -> usize {
        self.specific + self.all
    }
}

/// Registry of live subscribers
///
/// Thread-safe via `RwLock`. Broadcast snapshots take the read lock and may
/// run concurrently; register/unregister take the write lock, so a snapshot
/// never observes a half-applied mutation.
pub struct SubscriberRegistry {
    subscribers: RwLock<Subscribers>,
    next_id: AtomicU64,
}

impl SubscriberRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self {
            subscribers: RwLock::new(Subscribers::default()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Allocate a fresh subscriber id
    pub fn next_id(&self) -> SubscriberId {
        SubscriberId(self.next_id.fetch_add(1, Ordering::Relaxed))
    }

    /// Register a subscriber into the list matching its scope
    pub async fn register(&self, subscriber: Subscriber) -> Result<(), RegistryError> {
        match subscriber.scope().clone() {
            Scope::Device(device_id) => self.register_specific(&device_id, subscriber).await,
            Scope::AllDevices => self.register_all(subscriber).await,
        }
    }

    /// Register a subscriber for a single device
    ///
    /// Does not deliver a snapshot; the caller reads the image store after
    /// this returns.
    pub async fn register_specific(
        &self,
        device_id: &str,
        subscriber: Subscriber,
    ) -> Result<(), RegistryError> {
        if device_id.is_empty() {
            return Err(RegistryError::EmptyDeviceId);
        }
        if subscriber.scope().device_id() != Some(device_id) {
            return Err(RegistryError::ScopeMismatch(subscriber.id()));
        }

        let id = subscriber.id();
        let mut subscribers = self.subscribers.write().await;
        let list = subscribers.specific.entry(device_id.to_string()).or_default();
        list.push(subscriber);

        tracing::info!(
            device = %device_id,
            subscriber = %id,
            device_subscribers = list.len(),
            "Subscriber registered for device"
        );

        Ok(())
    }

    /// Register a subscriber for every device
    pub async fn register_all(&self, subscriber: Subscriber) -> Result<(), RegistryError> {
        if !subscriber.scope().is_all() {
            return Err(RegistryError::ScopeMismatch(subscriber.id()));
        }

        let id = subscriber.id();
        let mut subscribers = self.subscribers.write().await;
        subscribers.all.push(subscriber);

        tracing::info!(
            subscriber = %id,
            all_subscribers = subscribers.all.len(),
            "Subscriber registered for all devices"
        );

        Ok(())
    }

    /// Remove a subscriber
    ///
    /// Returns whether anything was removed. Unknown or already-removed
    /// subscribers are a no-op.
    pub async fn unregister(&self, scope: &Scope, id: SubscriberId) -> bool {
        let mut subscribers = self.subscribers.write().await;

        match scope {
            Scope::AllDevices => {
                let before = subscribers.all.len();
                subscribers.all.retain(|s| s.id() != id);
                let removed = subscribers.all.len() != before;

                if removed {
                    tracing::info!(
                        subscriber = %id,
                        all_subscribers = subscribers.all.len(),
                        "Subscriber unregistered from all devices"
                    );
                }
                removed
            }
            Scope::Device(device_id) => {
                let Some(list) = subscribers.specific.get_mut(device_id) else {
                    return false;
                };

                let before = list.len();
                list.retain(|s| s.id() != id);
                let removed = list.len() != before;
                let remaining = list.len();

                if remaining == 0 {
                    subscribers.specific.remove(device_id);
                }

                if removed {
                    tracing::info!(
                        device = %device_id,
                        subscriber = %id,
                        device_subscribers = remaining,
                        "Subscriber unregistered for device"
                    );
                }
                removed
            }
        }
    }

    /// Subscribers watching `device_id`
    pub async fn snapshot_specific(&self, device_id: &str) -> Vec<Subscriber> {
        self.subscribers
            .read()
            .await
            .specific
            .get(device_id)
            .cloned()
            .unwrap_or_default()
    }

    /// Subscribers watching every device
    pub async fn snapshot_all(&self) -> Vec<Subscriber> {
        self.subscribers.read().await.all.clone()
    }

    /// Current subscriber counts
    pub async fn counts(&self) -> RegistryCounts {
        let subscribers = self.subscribers.read().await;

        RegistryCounts {
            devices: subscribers.specific.len(),
            specific: subscribers.specific.values().map(Vec::len).sum(),
            all: subscribers.all.len(),
        }
    }

    /// Per-device subscriber counts, for status reporting
    pub async fn device_counts(&self) -> Vec<(String, usize)> {
        let subscribers = self.subscribers.read().await;
        let mut counts: Vec<_> = subscribers
            .specific
            .iter()
            .map(|(device, list)| (device.clone(), list.len()))
            .collect();
        counts.sort();
        counts
    }
}

impl Default for SubscriberRegistry {
    fn default() -> Self {
        Self::new()
    }
}
