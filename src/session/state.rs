//! Session state machine
//!
//! Tracks a connection from acceptance to teardown.

use std::fmt;
use std::time::{Duration, Instant};

use crate::registry::SubscriberId;

/// Session lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    /// Transport accepted, not yet registered
    Connecting,
    /// Subscriber registered, snapshot queued
    Registered,
    /// Forwarding live updates
    Streaming,
    /// Torn down
    Closed,
}

/// Why a session ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CloseReason {
    /// Peer sent close or ended the stream
    ClientClosed,
    /// Reading from the transport failed
    ReadError(String),
    /// Writing to the transport failed
    WriteError(String),
    /// Outbound channel closed underneath the session
    ChannelClosed,
    /// Registration was refused
    Rejected(String),
    /// Server is shutting down
    Shutdown,
}

impl fmt::Display for CloseReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CloseReason::ClientClosed => write!(f, "client closed"),
            CloseReason::ReadError(e) => write!(f, "read error: {}", e),
            CloseReason::WriteError(e) => write!(f, "write error: {}", e),
            CloseReason::ChannelClosed => write!(f, "outbound channel closed"),
            CloseReason::Rejected(e) => write!(f, "rejected: {}", e),
            CloseReason::Shutdown => write!(f, "shutdown"),
        }
    }
}

/// Complete session state
#[derive(Debug, Clone)]
pub struct SessionState {
    /// Current phase
    pub phase: SessionPhase,

    /// Registry id once registered
    pub subscriber_id: Option<SubscriberId>,

    /// Connection start time
    pub connected_at: Instant,

    /// Time when registration completed
    pub registered_at: Option<Instant>,

    /// Why the session closed
    pub close_reason: Option<CloseReason>,

    /// Channel messages (snapshots and broadcasts) written
    pub messages_sent: u64,

    /// Keep-alive messages written
    pub keep_alives_sent: u64,

    /// Refresh snapshots written
    pub refreshes_sent: u64,

    /// Pong replies written
    pub pongs_sent: u64,
}

impl SessionState {
    /// Create a new session state
    pub fn new() -> Self {
        Self {
            phase: SessionPhase::Connecting,
            subscriber_id: None,
            connected_at: Instant::now(),
            registered_at: None,
            close_reason: None,
            messages_sent: 0,
            keep_alives_sent: 0,
            refreshes_sent: 0,
            pongs_sent: 0,
        }
    }

    /// Registration completed
    pub fn register(&mut self, id: SubscriberId) {
        if self.phase == SessionPhase::Connecting {
            self.phase = SessionPhase::Registered;
            self.subscriber_id = Some(id);
            self.registered_at = Some(Instant::now());
        }
    }

    /// Begin forwarding live updates
    pub fn start_streaming(&mut self) {
        if self.phase == SessionPhase::Registered {
            self.phase = SessionPhase::Streaming;
        }
    }

    /// Move to `Closed`
    ///
    /// Returns `true` only for the first call; later calls leave the original
    /// reason in place.
    pub fn close(&mut self, reason: CloseReason) -> bool {
        if self.phase == SessionPhase::Closed {
            return false;
        }
        self.phase = SessionPhase::Closed;
        self.close_reason = Some(reason);
        true
    }

    /// Whether the session is streaming
    pub fn is_streaming(&self) -> bool {
        self.phase == SessionPhase::Streaming
    }

    /// Whether the session has closed
    pub fn is_closed(&self) -> bool {
        self.phase == SessionPhase::Closed
    }

    /// Get session duration
    pub fn duration(&self) -> Duration {
        self.connected_at.elapsed()
    }
}

impl Default for SessionState {
    fn default() -> Self {
        Self::new()
    }
}
