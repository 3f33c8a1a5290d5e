//! Latest-frame store for scanner devices
//!
//! Each device (identified by its MAC-derived id) has at most one
//! [`ImageRecord`]. A new frame replaces the record; a frame whose
//! fingerprint matches the stored one only advances the timestamp, so
//! subscribers still see the device as alive without receiving a new image.
//!
//! ```text
//!   put(device, payload)
//!        │
//!        ▼
//!   normalize_payload ──► Fingerprint ──► same as stored? ──yes──► touch timestamp
//!                                              │
//!                                              no
//!                                              ▼
//!                                       replace record
//! ```

pub mod fingerprint;
pub mod record;
pub mod store;

pub use fingerprint::{Fingerprint, FingerprintPolicy, LEGACY_PREFIX_LEN};
pub use record::{normalize_payload, ImageRecord, DEFAULT_MEDIA_PREFIX};
pub use store::{ImageStore, PutOutcome};
