//! `POST/GET /api-keys`, `DELETE /api-keys/{id}` (spec §6, §10.4).

use axum::extract::{Path, State};
use axum::routing::{delete, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use gateway_shared::{GatewayError, GatewayResult};

use crate::auth::{hash_api_key, AuthenticatedUser};
use crate::state::AppState;

#[derive(Deserialize)]
struct CreateApiKeyRequest {
    label: Option<String>,
}

#[derive(Serialize)]
struct CreatedApiKey {
    id: Uuid,
    key: String,
    label: Option<String>,
}

#[derive(Serialize)]
struct ApiKeySummary {
    id: Uuid,
    label: Option<String>,
    created_at: chrono::DateTime<chrono::Utc>,
    revoked: bool,
}

/// 32 bytes of randomness, hex-encoded - plaintext shown to the caller
/// exactly once, matching spec §10.4.
fn generate_plaintext_key() -> String {
    let bytes: [u8; 32] = std::array::from_fn(|_| fastrand::u8(..));
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

async fn create_key(
    State(state): State<AppState>,
    auth: AuthenticatedUser,
    Json(body): Json<CreateApiKeyRequest>,
) -> GatewayResult<Json<CreatedApiKey>> {
    let plaintext = generate_plaintext_key();
    let hash = hash_api_key(&plaintext);
    let created = state.api_keys.create_key(auth.user_id, &hash, body.label.as_deref()).await?;
    Ok(Json(CreatedApiKey { id: created.id, key: plaintext, label: created.label }))
}

async fn list_keys(
    State(state): State<AppState>,
    auth: AuthenticatedUser,
) -> GatewayResult<Json<Vec<ApiKeySummary>>> {
    let keys = state.api_keys.list_keys(auth.user_id).await?;
    Ok(Json(
        keys.into_iter()
            .map(|k| ApiKeySummary { id: k.id, label: k.label, created_at: k.created_at, revoked: !k.is_active() })
            .collect(),
    ))
}

async fn revoke_key(
    State(state): State<AppState>,
    auth: AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> GatewayResult<()> {
    if auth.api_key_id == id {
        return Err(GatewayError::BusinessRule(
            "cannot revoke the API key used to authenticate this request".to_string(),
        ));
    }
    let revoked = state.api_keys.revoke_key(id, auth.user_id).await?;
    if !revoked {
        return Err(GatewayError::NotFound(format!("api key {id}")));
    }
    Ok(())
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api-keys", post(create_key).get(list_keys))
        .route("/api-keys/{id}", delete(revoke_key))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plaintext_key_is_64_hex_chars() {
        let key = generate_plaintext_key();
        assert_eq!(key.len(), 64);
        assert!(key.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn successive_keys_differ() {
        assert_ne!(generate_plaintext_key(), generate_plaintext_key());
    }
}
