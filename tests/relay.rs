//! Relay behaviour through the public API

use std::sync::Arc;

use bytes::Bytes;
use serde_json::Value;
use tokio_test::{assert_err, assert_ok};

use scanner_relay::registry::RegistryError;
use scanner_relay::{FingerprintPolicy, Relay, RelayConfig, Scope, SubscriberId};

fn json(message: Bytes) -> Value {
    serde_json::from_slice(&message).unwrap()
}

#[tokio::test]
async fn latest_frame_always_wins() {
    let relay = Relay::default();

    for (i, payload) in ["A", "B", "A", "C", "C", "B"].iter().enumerate() {
        relay.ingest_at("dev", payload, i as i64 * 10).await;

        let stored = relay.latest("dev").await.unwrap();
        assert_eq!(&*stored.payload, format!("data:image/jpeg;base64,{payload}"));
        assert_eq!(stored.captured_at_millis, i as i64 * 10);
    }
}

#[tokio::test]
async fn duplicate_frame_only_moves_timestamp() {
    let relay = Relay::default();

    relay.ingest_at("AA:BB", "IMG1", 100).await;
    let before = relay.latest("AA:BB").await.unwrap();

    let report = relay.ingest_at("AA:BB", "IMG1", 200).await;
    let after = relay.latest("AA:BB").await.unwrap();

    assert!(report.is_duplicate);
    assert_eq!(before.payload, after.payload);
    assert!(after.captured_at_millis > before.captured_at_millis);
    assert_eq!(after.captured_at_millis, 200);
}

#[tokio::test]
async fn duplicate_with_stale_clock_still_advances() {
    let relay = Relay::default();

    relay.ingest_at("AA:BB", "IMG1", 500).await;
    relay.ingest_at("AA:BB", "IMG1", 500).await;
    relay.ingest_at("AA:BB", "IMG1", 400).await;

    assert_eq!(relay.latest("AA:BB").await.unwrap().captured_at_millis, 502);
}

#[tokio::test]
async fn identical_frames_reach_early_subscriber_twice() {
    let relay = Relay::default();
    let mut sub = assert_ok!(relay.subscribe(Scope::device("AA:BB")).await);

    relay.ingest_at("AA:BB", "IMG1", 100).await;
    let first = relay.latest("AA:BB").await.unwrap();
    assert_eq!(&*first.payload, "data:image/jpeg;base64,IMG1");
    assert_eq!(first.captured_at_millis, 100);

    relay.ingest_at("AA:BB", "IMG1", 200).await;
    let second = relay.latest("AA:BB").await.unwrap();
    assert_eq!(second.payload, first.payload);
    assert_eq!(second.captured_at_millis, 200);

    let one = json(sub.try_recv().unwrap());
    let two = json(sub.try_recv().unwrap());
    assert!(sub.try_recv().is_none());

    assert_eq!(one["timestamp"], 100);
    assert_eq!(two["timestamp"], 200);
}

#[tokio::test]
async fn specific_gets_object_all_gets_array() {
    let relay = Relay::default();
    let mut a = assert_ok!(relay.subscribe(Scope::device("AA:BB")).await);
    let mut b = assert_ok!(relay.subscribe(Scope::AllDevices).await);

    relay.ingest_at("AA:BB", "IMG9", 100).await;

    let to_a = json(a.try_recv().unwrap());
    assert!(to_a.is_object());
    assert_eq!(to_a["esp_hmac"], "AA:BB");
    assert!(a.try_recv().is_none());

    let to_b = json(b.try_recv().unwrap());
    let items = to_b.as_array().unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0]["esp_hmac"], "AA:BB");
    assert!(b.try_recv().is_none());
}

#[tokio::test]
async fn full_channel_drops_without_error() {
    let relay = Relay::new(RelayConfig::default().channel_capacity(1));
    let mut sub = assert_ok!(relay.subscribe(Scope::device("AA:BB")).await);

    let first = relay.ingest_at("AA:BB", "F1", 1).await;
    let second = relay.ingest_at("AA:BB", "F2", 2).await;

    assert_eq!(first.delivery.delivered, 1);
    assert_eq!(second.delivery.dropped_full, 1);

    // One message's worth is queued; the rejected send left it untouched
    let held = json(sub.try_recv().unwrap());
    assert_eq!(held["image_data"], "data:image/jpeg;base64,F1");
    assert!(sub.try_recv().is_none());

    // The store still has the newest frame
    let stored = relay.latest("AA:BB").await.unwrap();
    assert_eq!(&*stored.payload, "data:image/jpeg;base64,F2");
}

#[tokio::test]
async fn registration_then_snapshot_then_live() {
    let relay = Relay::default();
    relay.ingest_at("AA:BB", "OLD", 1).await;

    let mut sub = assert_ok!(relay.subscribe(Scope::device("AA:BB")).await);
    relay.ingest_at("AA:BB", "NEW", 2).await;

    assert_eq!(json(sub.recv().await.unwrap())["image_data"], "data:image/jpeg;base64,OLD");
    assert_eq!(json(sub.recv().await.unwrap())["image_data"], "data:image/jpeg;base64,NEW");
}

#[tokio::test]
async fn drops_never_reorder_survivors() {
    let relay = Relay::new(RelayConfig::default().channel_capacity(4));
    let mut sub = assert_ok!(relay.subscribe(Scope::device("dev")).await);

    let mut received = Vec::new();
    for i in 0..12 {
        relay.ingest_at("dev", &format!("F{i}"), i).await;
        // Drain every third frame so some sends land on a full channel
        if i % 3 == 2 {
            while let Some(message) = sub.try_recv() {
                received.push(json(message)["timestamp"].as_i64().unwrap());
            }
        }
    }

    assert!(!received.is_empty());
    assert!(received.windows(2).all(|w| w[0] < w[1]));
}

#[tokio::test]
async fn unsubscribe_is_idempotent() {
    let relay = Relay::default();
    let sub = assert_ok!(relay.subscribe(Scope::device("AA:BB")).await);
    let handle = sub.handle().clone();

    assert!(relay.unsubscribe(&handle).await);
    assert!(!relay.unsubscribe(&handle).await);

    // Never registered
    assert!(!relay.registry().unregister(&Scope::AllDevices, SubscriberId(4242)).await);
    assert!(!relay.registry().unregister(&Scope::device("nobody"), SubscriberId(4242)).await);

    let counts = relay.registry().counts().await;
    assert_eq!(counts.total(), 0);
    assert_eq!(counts.devices, 0);
}

#[tokio::test]
async fn empty_device_scope_is_refused() {
    let relay = Relay::default();
    let err = assert_err!(relay.subscribe(Scope::device("")).await);

    assert_eq!(err, RegistryError::EmptyDeviceId);
}

#[tokio::test]
async fn legacy_prefix_policy_merges_shared_prefix() {
    let relay = Relay::new(RelayConfig::default().fingerprint(FingerprintPolicy::legacy()));
    let header = "X".repeat(200);

    relay.ingest_at("dev", &format!("{header}first"), 1).await;
    let report = relay.ingest_at("dev", &format!("{header}second"), 2).await;

    // Only the first 100 bytes are compared, so the new frame is not stored
    assert!(report.is_duplicate);
    assert!(relay.latest("dev").await.unwrap().payload.ends_with("first"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_devices_do_not_interfere() {
    let relay = Arc::new(Relay::new(RelayConfig::default().channel_capacity(64)));
    let mut all = assert_ok!(relay.subscribe(Scope::AllDevices).await);

    let mut tasks = Vec::new();
    for device in ["A", "B", "C", "D"] {
        let relay = Arc::clone(&relay);
        tasks.push(tokio::spawn(async move {
            for i in 0..10 {
                relay.ingest_at(device, &format!("{device}{i}"), i).await;
            }
        }));
    }
    for task in tasks {
        task.await.unwrap();
    }

    assert_eq!(relay.all().await.len(), 4);

    let mut per_device: std::collections::HashMap<String, Vec<i64>> = Default::default();
    while let Some(message) = all.try_recv() {
        let item = &json(message)[0];
        per_device
            .entry(item["esp_hmac"].as_str().unwrap().to_string())
            .or_default()
            .push(item["timestamp"].as_i64().unwrap());
    }

    assert_eq!(per_device.len(), 4);
    for timestamps in per_device.values() {
        assert_eq!(timestamps.len(), 10);
        assert!(timestamps.windows(2).all(|w| w[0] < w[1]));
    }
}

/// Drain a subscription and return the last timestamp it saw for `device`
fn last_timestamp_for(sub: &mut scanner_relay::Subscription, device: &str) -> Option<i64> {
    let mut last = None;
    while let Some(message) = sub.try_recv() {
        let value = json(message);
        let items = match value {
            Value::Array(items) => items,
            object => vec![object],
        };
        for item in items {
            if item["esp_hmac"] == device {
                last = item["timestamp"].as_i64();
            }
        }
    }
    last
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn snapshot_never_lands_after_newer_frame() {
    let big_first = "A".repeat(2 * 1024 * 1024);
    let big_second = "B".repeat(2 * 1024 * 1024);

    for scope in [Scope::device("dev"), Scope::AllDevices] {
        for _ in 0..100 {
            let relay = Arc::new(Relay::default());
            relay.ingest_at("dev", &big_first, 1).await;

            let racer = {
                let relay = Arc::clone(&relay);
                let payload = big_second.clone();
                tokio::spawn(async move {
                    relay.ingest_at("dev", &payload, 2).await;
                })
            };
            let mut sub = assert_ok!(relay.subscribe(scope.clone()).await);
            racer.await.unwrap();

            let latest = relay.latest("dev").await.unwrap().captured_at_millis;
            assert_eq!(last_timestamp_for(&mut sub, "dev"), Some(latest), "scope {scope}");
        }
    }
}
