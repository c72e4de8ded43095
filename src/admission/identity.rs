//! Admission key extraction.
//!
//! # Security Note
//!
//! `X-Forwarded-For` and `X-Real-IP` are trusted as-is, with no allowlist of
//! known proxies. Deploy this service behind a trusted reverse proxy that
//! overwrites these headers; directly internet-facing, a client can spoof
//! its admission key. The extracted value is treated as an opaque key and is
//! never parsed or validated here, so adversarial header contents only ever
//! become a bucket key, never a crash (fail-open by design).

use axum::body::Body;
use axum::extract::ConnectInfo;
use axum::http::Request;
use std::net::SocketAddr;

/// Header carrying the caller-supplied identity on per-identity routes.
pub const IDENTITY_HEADER: &str = "x-instance-id";

/// Derive the client IP admission key for a request.
///
/// Precedence: first `X-Forwarded-For` element, then `X-Real-IP`, then the
/// transport peer address (port stripped). Falls back to `"unknown"` when
/// the router was built without connect info.
pub fn client_ip(req: &Request<Body>) -> String {
    if let Some(forwarded) = header_str(req, "x-forwarded-for") {
        if let Some(first) = forwarded.split(',').next() {
            let first = first.trim();
            if !first.is_empty() {
                return first.to_string();
            }
        }
    }

    if let Some(real_ip) = header_str(req, "x-real-ip") {
        let real_ip = real_ip.trim();
        if !real_ip.is_empty() {
            return real_ip.to_string();
        }
    }

    req.extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ci| ci.0.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

/// The explicit caller identity, if the request carries one.
///
/// Absence means the per-identity route class has nothing to key on and
/// admits unconditionally.
pub fn caller_identity(req: &Request<Body>) -> Option<String> {
    let identity = header_str(req, IDENTITY_HEADER)?.trim();
    if identity.is_empty() {
        None
    } else {
        Some(identity.to_string())
    }
}

fn header_str<'a>(req: &'a Request<Body>, name: &str) -> Option<&'a str> {
    req.headers().get(name).and_then(|v| v.to_str().ok())
}
