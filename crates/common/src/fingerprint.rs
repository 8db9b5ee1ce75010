//! Identity channel fingerprints.
//!
//! Device tokens and network addresses are never persisted raw. They are
//! reduced to a one-way keyed hash: `sha256(pepper ‖ raw_value)`, hex-encoded.
//! The hash is deterministic for a given pepper, so the vote ledger's
//! uniqueness constraints apply across requests, and unforgeable without the
//! server-side pepper.

use sha2::{Digest, Sha256};

/// Hash a raw channel value (device token or network address) with the
/// server pepper. Returns lowercase hex, or `None` for an empty value.
#[must_use]
pub fn hash_fingerprint(pepper: &str, raw: &str) -> Option<String> {
    if raw.is_empty() {
        return None;
    }
    let mut hasher = Sha256::new();
    hasher.update(pepper.as_bytes());
    hasher.update(raw.as_bytes());
    Some(hex::encode(hasher.finalize()))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_deterministic() {
        let a = hash_fingerprint("pepper", "10.0.0.1").unwrap();
        let b = hash_fingerprint("pepper", "10.0.0.1").unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
    }

    #[test]
    fn test_pepper_changes_output() {
        let a = hash_fingerprint("pepper-a", "device-token").unwrap();
        let b = hash_fingerprint("pepper-b", "device-token").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_distinct_values_distinct_hashes() {
        let a = hash_fingerprint("pepper", "10.0.0.1").unwrap();
        let b = hash_fingerprint("pepper", "10.0.0.2").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_empty_value_is_none() {
        assert!(hash_fingerprint("pepper", "").is_none());
    }

    #[test]
    fn test_output_is_lowercase_hex() {
        let h = hash_fingerprint("p", "v").unwrap();
        assert!(h.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }
}
