//! Identity resolution service.
//!
//! Every vote request resolves to up to three identity channels: an
//! authenticated account, a device token, and a network address. Device and
//! network values are reduced to peppered fingerprints before they leave this
//! module; raw tokens and addresses are never stored.

use pollwave_common::{IdGenerator, hash_fingerprint};

/// What the transport layer extracted from the request, untouched.
#[derive(Debug, Clone, Default)]
pub struct RawIdentity {
    /// Authenticated account, if a valid bearer token was presented.
    pub account_id: Option<String>,
    /// Device token from the `X-Device-Id` header or `did` cookie.
    pub device_token: Option<String>,
    /// Client network address (first `X-Forwarded-For` hop, `X-Real-IP`,
    /// or the peer address).
    pub network_addr: Option<String>,
}

/// Resolved identity channels for a request.
#[derive(Debug, Clone)]
pub struct ResolvedIdentity {
    /// Account ID, carried raw.
    pub account_id: Option<String>,
    /// Peppered fingerprint of the device token.
    pub device_hash: Option<String>,
    /// Peppered fingerprint of the network address.
    pub network_hash: Option<String>,
    /// Token minted for a client that presented none. The transport layer
    /// must hand it back (cookie + header) so the device channel is stable
    /// on future requests.
    pub minted_device_token: Option<String>,
}

impl ResolvedIdentity {
    /// At least one channel resolved.
    #[must_use]
    pub const fn has_channel(&self) -> bool {
        self.account_id.is_some() || self.device_hash.is_some() || self.network_hash.is_some()
    }
}

/// Identity resolution service.
#[derive(Clone)]
pub struct IdentityService {
    pepper: String,
    id_gen: IdGenerator,
}

impl IdentityService {
    /// Create a new identity service with the server pepper.
    #[must_use]
    pub const fn new(pepper: String) -> Self {
        Self {
            pepper,
            id_gen: IdGenerator::new(),
        }
    }

    /// Resolve raw request identity into fingerprinted channels.
    ///
    /// A missing device token is minted here, so every request ends up with
    /// a device channel; the caller is responsible for returning the minted
    /// token to the client.
    #[must_use]
    pub fn resolve(&self, raw: RawIdentity) -> ResolvedIdentity {
        let (device_token, minted_device_token) = match raw.device_token {
            Some(token) if !token.is_empty() => (token, None),
            _ => {
                let minted = self.id_gen.generate_device_token();
                (minted.clone(), Some(minted))
            }
        };

        let device_hash = hash_fingerprint(&self.pepper, &device_token);
        let network_hash = raw
            .network_addr
            .as_deref()
            .and_then(|addr| hash_fingerprint(&self.pepper, addr));

        ResolvedIdentity {
            account_id: raw.account_id,
            device_hash,
            network_hash,
            minted_device_token,
        }
    }

    /// Resolve only what the client actually presented, without minting a
    /// device token. Read paths use this so a GET never sets a cookie.
    #[must_use]
    pub fn resolve_presented(&self, raw: RawIdentity) -> ResolvedIdentity {
        let device_hash = raw
            .device_token
            .as_deref()
            .and_then(|token| hash_fingerprint(&self.pepper, token));
        let network_hash = raw
            .network_addr
            .as_deref()
            .and_then(|addr| hash_fingerprint(&self.pepper, addr));

        ResolvedIdentity {
            account_id: raw.account_id,
            device_hash,
            network_hash,
            minted_device_token: None,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn service() -> IdentityService {
        IdentityService::new("test-pepper".to_string())
    }

    #[test]
    fn test_resolve_with_all_channels() {
        let resolved = service().resolve(RawIdentity {
            account_id: Some("acct1".to_string()),
            device_token: Some("dev-token".to_string()),
            network_addr: Some("203.0.113.9".to_string()),
        });

        assert_eq!(resolved.account_id.as_deref(), Some("acct1"));
        assert_eq!(resolved.device_hash.as_ref().unwrap().len(), 64);
        assert_eq!(resolved.network_hash.as_ref().unwrap().len(), 64);
        assert!(resolved.minted_device_token.is_none());
        assert!(resolved.has_channel());
    }

    #[test]
    fn test_missing_device_token_is_minted() {
        let resolved = service().resolve(RawIdentity {
            account_id: None,
            device_token: None,
            network_addr: Some("203.0.113.9".to_string()),
        });

        let minted = resolved.minted_device_token.unwrap();
        assert_eq!(
            resolved.device_hash,
            hash_fingerprint("test-pepper", &minted)
        );
    }

    #[test]
    fn test_empty_device_token_is_minted() {
        let resolved = service().resolve(RawIdentity {
            device_token: Some(String::new()),
            ..RawIdentity::default()
        });
        assert!(resolved.minted_device_token.is_some());
    }

    #[test]
    fn test_same_device_token_same_hash() {
        let svc = service();
        let a = svc.resolve(RawIdentity {
            device_token: Some("tok".to_string()),
            ..RawIdentity::default()
        });
        let b = svc.resolve(RawIdentity {
            device_token: Some("tok".to_string()),
            ..RawIdentity::default()
        });
        assert_eq!(a.device_hash, b.device_hash);
    }

    #[test]
    fn test_resolve_presented_never_mints() {
        let resolved = service().resolve_presented(RawIdentity {
            account_id: Some("acct1".to_string()),
            device_token: None,
            network_addr: Some("203.0.113.9".to_string()),
        });
        assert!(resolved.minted_device_token.is_none());
        assert!(resolved.device_hash.is_none());
        assert!(resolved.network_hash.is_some());
    }

    #[test]
    fn test_raw_values_do_not_leak() {
        let resolved = service().resolve(RawIdentity {
            account_id: None,
            device_token: Some("secret-device".to_string()),
            network_addr: Some("198.51.100.7".to_string()),
        });

        assert_ne!(resolved.device_hash.as_deref(), Some("secret-device"));
        assert_ne!(resolved.network_hash.as_deref(), Some("198.51.100.7"));
    }
}
