//! HTTP and WebSocket surface
//!
//! ```text
//!   GET /ws/device?esp_hmac=<id>   one device (object frames)
//!   GET /ws/devices/all            every device (array frames)
//!   GET /devices                   stored records
//!   GET /devices/{esp_hmac}        one stored record
//!   GET /health                    relay status
//! ```
//!
//! Each upgraded socket is driven by a [`Session`](crate::session::Session).

pub mod config;
pub mod error;
pub mod listener;
pub mod routes;

pub use config::ServerConfig;
pub use error::ApiError;
pub use listener::RelayServer;
