//! Registry error types

use super::subscriber::SubscriberId;

/// Error type for registry operations
///
/// Unregistering never fails; only malformed registrations are rejected.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    /// Device-scoped subscription without a device id
    #[error("device id must not be empty")]
    EmptyDeviceId,

    /// Subscriber scope does not match the list it was registered into
    #[error("subscriber {0} registered under the wrong scope")]
    ScopeMismatch(SubscriberId),
}
