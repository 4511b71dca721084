//! Request authentication extractors (spec §6): `X-API-Key` resolves to the
//! calling user; routes marked ★ additionally require `X-OpenRouter-API-Key`,
//! the upstream provider key threaded through to C2.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use sha2::{Digest, Sha256};
use uuid::Uuid;

use gateway_shared::GatewayError;

use crate::state::AppState;

pub fn hash_api_key(raw: &str) -> String {
    let digest = Sha256::digest(raw.as_bytes());
    format!("{digest:x}")
}

/// The authenticated gateway user, resolved from `X-API-Key`. Carries the
/// key's own row ID so handlers can reject self-revocation (spec §6).
#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    pub user_id: Uuid,
    pub api_key_id: Uuid,
}

impl FromRequestParts<AppState> for AuthenticatedUser {
    type Rejection = GatewayError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let raw = parts
            .headers
            .get("x-api-key")
            .and_then(|v| v.to_str().ok())
            .ok_or(GatewayError::Unauthenticated)?;
        let hash = hash_api_key(raw);
        let (api_key_id, user_id) = state.api_keys.resolve(&hash).await?.ok_or(GatewayError::Unauthenticated)?;
        Ok(Self { user_id, api_key_id })
    }
}

/// The caller's upstream OpenRouter key, required on ★ routes (spec §6).
#[derive(Debug, Clone)]
pub struct OpenRouterKey(pub String);

impl FromRequestParts<AppState> for OpenRouterKey {
    type Rejection = GatewayError;

    async fn from_request_parts(parts: &mut Parts, _state: &AppState) -> Result<Self, Self::Rejection> {
        parts
            .headers
            .get("x-openrouter-api-key")
            .and_then(|v| v.to_str().ok())
            .map(|s| Self(s.to_string()))
            .ok_or(GatewayError::Unauthenticated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_is_deterministic_and_hex_encoded() {
        let a = hash_api_key("gw_live_abc123");
        let b = hash_api_key("gw_live_abc123");
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn distinct_keys_hash_differently() {
        assert_ne!(hash_api_key("gw_live_abc123"), hash_api_key("gw_live_xyz789"));
    }
}
