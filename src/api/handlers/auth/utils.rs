//! Small helpers for token generation and request metadata extraction.

use anyhow::{Context, Result};
use axum::http::{header::AUTHORIZATION, HeaderMap};
use base64::Engine;
use rand::{rngs::OsRng, RngCore};
use std::net::SocketAddr;

/// Create a new opaque session token.
///
/// 32 bytes of OS randomness (256 bits), base64url without padding. The raw
/// value is only returned to the client; the store keys sessions by it and it
/// is never written to logs or the database.
pub(crate) fn generate_session_token() -> Result<String> {
    let mut bytes = [0u8; 32];
    OsRng
        .try_fill_bytes(&mut bytes)
        .context("failed to generate session token")?;
    Ok(base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes))
}

/// Extract the bearer token from the `Authorization` header.
///
/// The scheme is matched case-insensitively, per RFC 7235. A malformed or
/// missing header is treated as "no token".
pub(crate) fn extract_bearer_token(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.trim().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    if token.is_empty() {
        None
    } else {
        Some(token.to_string())
    }
}

/// Resolve the client address used for rate limiting and audit: proxy
/// headers when present, otherwise the socket peer address. The port is
/// dropped so one client maps to one rate bucket.
pub(crate) fn extract_client_ip(headers: &HeaderMap, peer: SocketAddr) -> String {
    let forwarded = headers
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string);
    if let Some(address) = forwarded {
        return address;
    }
    headers
        .get("x-real-ip")
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| peer.ip().to_string())
}
