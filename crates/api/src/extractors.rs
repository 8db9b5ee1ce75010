//! Request extractors.

#![allow(missing_docs)]

use std::convert::Infallible;
use std::net::SocketAddr;

use axum::{
    extract::{ConnectInfo, FromRequestParts},
    http::{HeaderMap, request::Parts},
};
use axum_extra::extract::CookieJar;
use pollwave_core::RawIdentity;
use pollwave_db::entities::user;

/// Name of the device-token header.
pub const DEVICE_HEADER: &str = "x-device-id";

/// Name of the device-token cookie.
pub const DEVICE_COOKIE: &str = "did";

/// Name of the idempotency-key header.
pub const IDEMPOTENCY_HEADER: &str = "idempotency-key";

/// Raw identity material extracted from the request: optional account,
/// device token (header beats cookie), and best-effort client address.
#[derive(Debug, Clone)]
pub struct ClientIdentity(pub RawIdentity);

impl<S> FromRequestParts<S> for ClientIdentity
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let account_id = parts
            .extensions
            .get::<user::Model>()
            .map(|u| u.id.clone());

        let device_token = match header_value(&parts.headers, DEVICE_HEADER) {
            Some(token) => Some(token),
            None => {
                let jar = match CookieJar::from_request_parts(parts, state).await {
                    Ok(jar) => jar,
                    Err(never) => match never {},
                };
                jar.get(DEVICE_COOKIE).map(|c| c.value().to_string())
            }
        };

        let network_addr = client_addr(parts);

        Ok(Self(RawIdentity {
            account_id,
            device_token,
            network_addr,
        }))
    }
}

/// Idempotency key, when the client sent one.
#[derive(Debug, Clone)]
pub struct IdempotencyKey(pub Option<String>);

impl<S> FromRequestParts<S> for IdempotencyKey
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self(header_value(&parts.headers, IDEMPOTENCY_HEADER)))
    }
}

fn header_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(String::from)
}

/// Client network address: first `X-Forwarded-For` hop, then `X-Real-IP`,
/// then the socket peer.
fn client_addr(parts: &Parts) -> Option<String> {
    if let Some(forwarded) = header_value(&parts.headers, "x-forwarded-for") {
        if let Some(first) = forwarded.split(',').next() {
            let first = first.trim();
            if !first.is_empty() {
                return Some(first.to_string());
            }
        }
    }
    if let Some(real_ip) = header_value(&parts.headers, "x-real-ip") {
        return Some(real_ip);
    }
    parts
        .extensions
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ci| ci.0.ip().to_string())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use axum::http::Request;

    fn parts_with_headers(headers: &[(&str, &str)]) -> Parts {
        let mut builder = Request::builder().uri("/");
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        builder.body(()).unwrap().into_parts().0
    }

    #[test]
    fn test_forwarded_for_first_hop() {
        let parts = parts_with_headers(&[("x-forwarded-for", "203.0.113.9, 10.0.0.1")]);
        assert_eq!(client_addr(&parts).as_deref(), Some("203.0.113.9"));
    }

    #[test]
    fn test_real_ip_fallback() {
        let parts = parts_with_headers(&[("x-real-ip", "198.51.100.4")]);
        assert_eq!(client_addr(&parts).as_deref(), Some("198.51.100.4"));
    }

    #[test]
    fn test_peer_fallback() {
        let mut parts = parts_with_headers(&[]);
        parts
            .extensions
            .insert(ConnectInfo::<SocketAddr>("192.0.2.1:4455".parse().unwrap()));
        assert_eq!(client_addr(&parts).as_deref(), Some("192.0.2.1"));
    }

    #[test]
    fn test_no_addr_at_all() {
        let parts = parts_with_headers(&[]);
        assert!(client_addr(&parts).is_none());
    }

    #[test]
    fn test_header_value_trims_and_filters_empty() {
        let parts = parts_with_headers(&[("idempotency-key", "  key-1  "), ("x-device-id", " ")]);
        assert_eq!(
            header_value(&parts.headers, IDEMPOTENCY_HEADER).as_deref(),
            Some("key-1")
        );
        assert!(header_value(&parts.headers, DEVICE_HEADER).is_none());
    }
}
