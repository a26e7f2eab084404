/// Shared request helpers: bearer credentials and sender identity
use crate::error::{AppError, AppResult};
use axum::http::HeaderMap;
use sha2::{Digest, Sha256};
use std::net::SocketAddr;

/// Require a bearer credential matching `expected`
pub fn require_bearer(headers: &HeaderMap, expected: &str, surface: &str) -> AppResult<()> {
    let token = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .ok_or_else(|| {
            AppError::Authentication(format!("Missing bearer token for {}", surface))
        })?;

    if token != expected {
        return Err(AppError::Authentication(format!(
            "Invalid bearer token for {}",
            surface
        )));
    }

    Ok(())
}

/// Opaque sender identity: SHA-256 over the client address
///
/// Honors X-Forwarded-For when present (first hop), otherwise the peer
/// address. The raw address is never stored.
pub fn sender_hash(headers: &HeaderMap, peer: &SocketAddr) -> String {
    let client = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(|v| v.trim().to_string())
        .unwrap_or_else(|| peer.ip().to_string());

    let hash = Sha256::digest(client.as_bytes());
    hex::encode(hash)
}
