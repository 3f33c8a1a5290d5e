//! Session context
//!
//! Read-only information about a connection, fixed when it is accepted.

use std::net::SocketAddr;

use crate::registry::Scope;

/// Identity and scope of one connection
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionContext {
    /// Unique session ID
    pub session_id: u64,

    /// Remote peer address, when the transport exposes it
    pub peer_addr: Option<SocketAddr>,

    /// What this connection watches; immutable for its lifetime
    pub scope: Scope,
}

impl SessionContext {
    /// Create a new context
    pub fn new(session_id: u64, scope: Scope) -> Self {
        Self {
            session_id,
            peer_addr: None,
            scope,
        }
    }

    /// Attach the peer address
    pub fn with_peer(mut self, peer_addr: SocketAddr) -> Self {
        self.peer_addr = Some(peer_addr);
        self
    }
}
