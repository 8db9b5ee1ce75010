//! ID generation utilities.

use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use rand::RngCore;
use ulid::Ulid;

/// Number of random bytes in a minted device token.
const DEVICE_TOKEN_BYTES: usize = 16;

/// ID generator for entities.
#[derive(Debug, Clone, Default)]
pub struct IdGenerator {
    _private: (),
}

impl IdGenerator {
    /// Create a new ID generator.
    #[must_use]
    pub const fn new() -> Self {
        Self { _private: () }
    }

    /// Generate a new ULID-based ID.
    ///
    /// ULIDs are:
    /// - Lexicographically sortable
    /// - Monotonically increasing within the same millisecond
    /// - Shorter than UUIDs when represented as strings
    #[must_use]
    pub fn generate(&self) -> String {
        Ulid::new().to_string().to_lowercase()
    }

    /// Mint a device token for a client that presented none.
    ///
    /// Cryptographically random, URL-safe, 16 bytes of entropy. The caller is
    /// expected to persist it client-side (cookie or header); it only affects
    /// future requests.
    #[must_use]
    pub fn generate_device_token(&self) -> String {
        let mut bytes = [0u8; DEVICE_TOKEN_BYTES];
        rand::thread_rng().fill_bytes(&mut bytes);
        URL_SAFE_NO_PAD.encode(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_ulid() {
        let id_gen = IdGenerator::new();
        let id1 = id_gen.generate();
        let id2 = id_gen.generate();

        assert_eq!(id1.len(), 26);
        assert_eq!(id2.len(), 26);
        assert_ne!(id1, id2);
    }

    #[test]
    fn test_device_token_is_url_safe() {
        let id_gen = IdGenerator::new();
        let token = id_gen.generate_device_token();

        // 16 bytes in unpadded base64
        assert_eq!(token.len(), 22);
        assert!(
            token
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        );
    }

    #[test]
    fn test_device_tokens_are_unique() {
        let id_gen = IdGenerator::new();
        assert_ne!(
            id_gen.generate_device_token(),
            id_gen.generate_device_token()
        );
    }
}
