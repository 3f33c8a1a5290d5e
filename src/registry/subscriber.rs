//! Subscriber identity, scope and outbound channel

use std::fmt;

use bytes::Bytes;
use tokio::sync::mpsc::{self, error::TrySendError};

/// What a subscriber is watching
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Scope {
    /// A single device
    Device(String),
    /// Every device
    AllDevices,
}

impl Scope {
    /// Scope for one device
    pub fn device(device_id: impl Into<String>) -> Self {
        Scope::Device(device_id.into())
    }

    /// Device id for a device scope, `None` for all devices
    pub fn device_id(&self) -> Option<&str> {
        match self {
            Scope::Device(id) => Some(id),
            Scope::AllDevices => None,
        }
    }

    /// Whether this is the all-devices scope
    pub fn is_all(&self) -> bool {
        matches!(self, Scope::AllDevices)
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scope::Device(id) => write!(f, "device:{}", id),
            Scope::AllDevices => write!(f, "all"),
        }
    }
}

/// Opaque subscriber handle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriberId(pub u64);

impl fmt::Display for SubscriberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Why a non-blocking delivery was skipped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryFailure {
    /// Subscriber is not draining fast enough
    Full,
    /// Subscriber's session has gone away
    Closed,
}

/// A registered consumer of image updates
///
/// The registry holds one clone of the sending half; the session owns the
/// receiver. Scope is fixed at construction.
#[derive(Debug, Clone)]
pub struct Subscriber {
    id: SubscriberId,
    scope: Scope,
    outbound: mpsc::Sender<Bytes>,
}

impl Subscriber {
    /// Create a subscriber around an existing channel
    pub fn new(id: SubscriberId, scope: Scope, outbound: mpsc::Sender<Bytes>) -> Self {
        Self {
            id,
            scope,
            outbound,
        }
    }

    /// Subscriber id
    pub fn id(&self) -> SubscriberId {
        self.id
    }

    /// Subscriber scope
    pub fn scope(&self) -> &Scope {
        &self.scope
    }

    /// Attempt a non-blocking send
    pub fn try_deliver(&self, message: Bytes) -> Result<(), DeliveryFailure> {
        self.outbound.try_send(message).map_err(|e| match e {
            TrySendError::Full(_) => DeliveryFailure::Full,
            TrySendError::Closed(_) => DeliveryFailure::Closed,
        })
    }

    /// Whether the receiving half has been dropped
    pub fn is_closed(&self) -> bool {
        self.outbound.is_closed()
    }
}
