//! Duplicate-frame fingerprints
//!
//! Equality is defined over the encoded payload, never over image content.
//! Two policies are available:
//!
//! - [`FingerprintPolicy::Sha256`] (default) hashes the whole payload. A
//!   collision would suppress one broadcast and is not a practical concern.
//! - [`FingerprintPolicy::Prefix`] compares only the first `n` bytes. This is
//!   what older scanner deployments relied on; it is cheaper but two
//!   different frames that share a long common prefix (identical JPEG
//!   headers) are reported as duplicates.

use sha2::{Digest, Sha256};

/// Prefix length used by the legacy fingerprint
pub const LEGACY_PREFIX_LEN: usize = 100;

/// How payloads are compared for duplicate suppression
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FingerprintPolicy {
    /// Compare the first `n` bytes of the encoded payload
    Prefix(usize),
    /// Compare a SHA-256 digest of the full encoded payload
    #[default]
    Sha256,
}

impl FingerprintPolicy {
    /// Legacy prefix policy (first 100 bytes)
    pub fn legacy() -> Self {
        FingerprintPolicy::Prefix(LEGACY_PREFIX_LEN)
    }

    /// Fingerprint an encoded payload
    pub fn fingerprint(&self, payload: &str) -> Fingerprint {
        match *self {
            FingerprintPolicy::Prefix(n) => {
                let bytes = payload.as_bytes();
                let end = n.min(bytes.len());
                Fingerprint::Prefix(bytes[..end].into())
            }
            FingerprintPolicy::Sha256 => {
                let digest = Sha256::digest(payload.as_bytes());
                Fingerprint::Sha256 {
                    digest: digest.into(),
                    len: payload.len(),
                }
            }
        }
    }
}

/// Content fingerprint of an encoded payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fingerprint {
    /// Leading bytes of the payload
    Prefix(Box<[u8]>),
    /// Full-content digest
    Sha256 { digest: [u8; 32], len: usize },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sha256_distinguishes_common_prefix() {
        let policy = FingerprintPolicy::Sha256;
        let header = "x".repeat(200);

        let a = policy.fingerprint(&format!("{header}A"));
        let b = policy.fingerprint(&format!("{header}B"));

        assert_ne!(a, b);
        assert_eq!(a, policy.fingerprint(&format!("{header}A")));
    }

    #[test]
    fn test_prefix_treats_common_prefix_as_duplicate() {
        let policy = FingerprintPolicy::legacy();
        let header = "x".repeat(LEGACY_PREFIX_LEN);

        let a = policy.fingerprint(&format!("{header}A"));
        let b = policy.fingerprint(&format!("{header}B"));

        assert_eq!(a, b);
    }

    #[test]
    fn test_prefix_short_payload_uses_whole_payload() {
        let policy = FingerprintPolicy::Prefix(16);

        assert_eq!(
            policy.fingerprint("abc"),
            Fingerprint::Prefix(b"abc".to_vec().into_boxed_slice())
        );
        assert_ne!(policy.fingerprint("abc"), policy.fingerprint("abd"));
    }

    #[test]
    fn test_default_is_sha256() {
        assert_eq!(FingerprintPolicy::default(), FingerprintPolicy::Sha256);
    }
}
