//! Broadcast engine implementation

use std::collections::HashMap;
use std::sync::Arc;

use bytes::Bytes;
use tokio::sync::{Mutex, OwnedMutexGuard};

use super::wire::{encode_image, encode_images};
use crate::image::ImageRecord;
use crate::registry::{DeliveryFailure, Subscriber, SubscriberRegistry};

/// Outcome of a single [`BroadcastEngine::deliver`] call
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeliveryReport {
    /// Messages queued on a subscriber channel
    pub delivered: usize,
    /// Subscribers skipped because their channel was full
    pub dropped_full: usize,
    /// Subscribers skipped because their session had already closed
    pub dropped_closed: usize,
}

impl DeliveryReport {
    /// Total subscribers skipped
    pub fn dropped(&self) -> usize {
        self.dropped_full + self.dropped_closed
    }

    fn record(&mut self, result: Result<(), DeliveryFailure>) {
        match result {
            Ok(()) => self.delivered += 1,
            Err(DeliveryFailure::Full) => self.dropped_full += 1,
            Err(DeliveryFailure::Closed) => self.dropped_closed += 1,
        }
    }
}

/// Fans image records out to registered subscribers
pub struct BroadcastEngine {
    registry: Arc<SubscriberRegistry>,
    /// One ordering lock per device seen so far; never pruned, so it is
    /// bounded by the number of devices ever ingested or watched
    ordering: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl BroadcastEngine {
    /// Create an engine delivering to `registry`
    pub fn new(registry: Arc<SubscriberRegistry>) -> Self {
        Self {
            registry,
            ordering: Mutex::new(HashMap::new()),
        }
    }

    /// Registry this engine delivers to
    pub fn registry(&self) -> &Arc<SubscriberRegistry> {
        &self.registry
    }

    /// Acquire the ordering lock for `device_id`
    ///
    /// Held across store update and delivery so that two frames for the same
    /// device, ingested concurrently, reach subscribers in store order.
    pub async fn ordering_lock(&self, device_id: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut ordering = self.ordering.lock().await;
            ordering
                .entry(device_id.to_string())
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .clone()
        };
        lock.lock_owned().await
    }

    /// Acquire the ordering locks of several devices
    ///
    /// Locks are taken in sorted id order. Callers that hold more than one
    /// lock must go through here so two of them cannot deadlock.
    pub async fn ordering_locks(&self, device_ids: &[String]) -> Vec<OwnedMutexGuard<()>> {
        let mut ids: Vec<&str> = device_ids.iter().map(String::as_str).collect();
        ids.sort_unstable();
        ids.dedup();

        let mut guards = Vec::with_capacity(ids.len());
        for id in ids {
            guards.push(self.ordering_lock(id).await);
        }
        guards
    }

    /// Deliver `record` to its device subscribers and to all-devices subscribers
    ///
    /// Never blocks on a subscriber and never fails; undeliverable
    /// subscribers are counted in the report.
    pub async fn deliver(&self, record: &ImageRecord) -> DeliveryReport {
        let mut report = DeliveryReport::default();

        let specific = self.registry.snapshot_specific(&record.device_id).await;
        if !specific.is_empty() {
            match encode_image(record) {
                Ok(message) => fan_out(&specific, message, &mut report),
                Err(e) => {
                    tracing::error!(device = %record.device_id, error = %e, "Failed to encode image update");
                }
            }
        }

        let all = self.registry.snapshot_all().await;
        if !all.is_empty() {
            match encode_images(std::slice::from_ref(record)) {
                Ok(message) => fan_out(&all, message, &mut report),
                Err(e) => {
                    tracing::error!(device = %record.device_id, error = %e, "Failed to encode all-devices update");
                }
            }
        }

        if report.dropped() > 0 {
            tracing::warn!(
                device = %record.device_id,
                delivered = report.delivered,
                dropped_full = report.dropped_full,
                dropped_closed = report.dropped_closed,
                "Some subscribers skipped"
            );
        } else {
            tracing::debug!(
                device = %record.device_id,
                timestamp = record.captured_at_millis,
                delivered = report.delivered,
                "Broadcast complete"
            );
        }

        report
    }
}

fn fan_out(subscribers: &[Subscriber], message: Bytes, report: &mut DeliveryReport) {
    for subscriber in subscribers {
        // Bytes clones share the same allocation
        report.record(subscriber.try_deliver(message.clone()));
    }
}
