//! Per-connection session management
//!
//! A session is one WebSocket connection watching one [`Scope`]. It moves
//! through `Connecting -> Registered -> Streaming -> Closed`:
//!
//! ```text
//!   Connecting ──subscribe──► Registered ──greeting──► Streaming ──error/close──► Closed
//!                                                         │
//!                        ┌────────────────────────────────┴───────────┐
//!                        ▼                                            ▼
//!                 outbound duty                                 inbound duty
//!        channel drain / keep-alive / refresh / pong      read until close, queue pongs
//!                        └──────────── shared CancellationToken ──────┘
//! ```
//!
//! Either duty ending cancels the other. Teardown unregisters the subscriber,
//! closes the outbound channel and the transport, and runs at most once.
//!
//! [`Scope`]: crate::registry::Scope

pub mod config;
pub mod connection;
pub mod context;
pub mod state;

pub use config::SessionConfig;
pub use connection::Session;
pub use context::SessionContext;
pub use state::{CloseReason, SessionPhase, SessionState};
