//! Statistics and metrics for the relay

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, Instant};

use serde::Serialize;

use crate::broadcast::DeliveryReport;
use crate::registry::RegistryCounts;

/// Process-wide relay counters
///
/// All counters are monotonic and updated with relaxed atomics; they are
/// for reporting, not synchronization.
#[derive(Debug)]
pub struct RelayStats {
    started_at: Instant,
    frames_ingested: AtomicU64,
    duplicate_frames: AtomicU64,
    rejected_messages: AtomicU64,
    messages_delivered: AtomicU64,
    dropped_full: AtomicU64,
    dropped_closed: AtomicU64,
    sessions_opened: AtomicU64,
    sessions_closed: AtomicU64,
    bus_connected: AtomicBool,
}

impl RelayStats {
    /// Create new stats tracker
    pub fn new() -> Self {
        Self {
            started_at: Instant::now(),
            frames_ingested: AtomicU64::new(0),
            duplicate_frames: AtomicU64::new(0),
            rejected_messages: AtomicU64::new(0),
            messages_delivered: AtomicU64::new(0),
            dropped_full: AtomicU64::new(0),
            dropped_closed: AtomicU64::new(0),
            sessions_opened: AtomicU64::new(0),
            sessions_closed: AtomicU64::new(0),
            bus_connected: AtomicBool::new(false),
        }
    }

    /// Record an accepted frame and its delivery outcome
    pub fn record_ingest(&self, is_duplicate: bool, report: &DeliveryReport) {
        self.frames_ingested.fetch_add(1, Ordering::Relaxed);
        if is_duplicate {
            self.duplicate_frames.fetch_add(1, Ordering::Relaxed);
        }
        self.messages_delivered
            .fetch_add(report.delivered as u64, Ordering::Relaxed);
        self.dropped_full
            .fetch_add(report.dropped_full as u64, Ordering::Relaxed);
        self.dropped_closed
            .fetch_add(report.dropped_closed as u64, Ordering::Relaxed);
    }

    /// Record a rejected ingestion message
    pub fn record_rejected(&self) {
        self.rejected_messages.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a session entering `Registered`
    pub fn session_opened(&self) {
        self.sessions_opened.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a session reaching `Closed`
    pub fn session_closed(&self) {
        self.sessions_closed.fetch_add(1, Ordering::Relaxed);
    }

    /// Update the message bus connection flag
    pub fn set_bus_connected(&self, connected: bool) {
        self.bus_connected.store(connected, Ordering::Relaxed);
    }

    /// Whether the message bus is currently connected
    pub fn bus_connected(&self) -> bool {
        self.bus_connected.load(Ordering::Relaxed)
    }

    /// Time since the relay was created
    pub fn uptime(&self) -> Duration {
        self.started_at.elapsed()
    }

    /// Point-in-time copy of all counters
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            uptime_secs: self.uptime().as_secs(),
            frames_ingested: self.frames_ingested.load(Ordering::Relaxed),
            duplicate_frames: self.duplicate_frames.load(Ordering::Relaxed),
            rejected_messages: self.rejected_messages.load(Ordering::Relaxed),
            messages_delivered: self.messages_delivered.load(Ordering::Relaxed),
            dropped_full: self.dropped_full.load(Ordering::Relaxed),
            dropped_closed: self.dropped_closed.load(Ordering::Relaxed),
            sessions_opened: self.sessions_opened.load(Ordering::Relaxed),
            sessions_closed: self.sessions_closed.load(Ordering::Relaxed),
            bus_connected: self.bus_connected(),
        }
    }
}

impl Default for RelayStats {
    fn default() -> Self {
        Self::new()
    }
}

/// Copy of [`RelayStats`] counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    pub uptime_secs: u64,
    pub frames_ingested: u64,
    pub duplicate_frames: u64,
    pub rejected_messages: u64,
    pub messages_delivered: u64,
    pub dropped_full: u64,
    pub dropped_closed: u64,
    pub sessions_opened: u64,
    pub sessions_closed: u64,
    pub bus_connected: bool,
}

impl StatsSnapshot {
    /// Sessions currently open
    pub fn active_sessions(&self) -> u64 {
        self.sessions_opened.saturating_sub(self.sessions_closed)
    }
}

/// Relay-wide status: stored devices, subscribers, counters
#[derive(Debug, Clone, Serialize)]
pub struct RelayStatus {
    /// Devices with a stored frame
    pub devices: usize,
    /// Specific-device subscribers
    pub specific_subscribers: usize,
    /// All-devices subscribers
    pub all_subscribers: usize,
    /// Devices that currently have at least one specific subscriber
    pub watched_devices: usize,
    pub stats: StatsSnapshot,
}

impl RelayStatus {
    /// Assemble a status report
    pub fn new(devices: usize, counts: RegistryCounts, stats: StatsSnapshot) -> Self {
        Self {
            devices,
            specific_subscribers: counts.specific,
            all_subscribers: counts.all,
            watched_devices: counts.devices,
            stats,
        }
    }
}
