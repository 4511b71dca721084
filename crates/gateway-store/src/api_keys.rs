//! API key persistence (spec §10.4): created as a random token, stored only
//! as a SHA-256 hash, returned in plaintext exactly once.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use gateway_shared::model::ApiKey;
use gateway_shared::{GatewayError, GatewayResult};

#[derive(Debug, sqlx::FromRow)]
struct ApiKeyRow {
    id: Uuid,
    user_id: Uuid,
    label: Option<String>,
    created_at: DateTime<Utc>,
    revoked_at: Option<DateTime<Utc>>,
}

impl From<ApiKeyRow> for ApiKey {
    fn from(row: ApiKeyRow) -> Self {
        ApiKey { id: row.id, user_id: row.user_id, label: row.label, created_at: row.created_at, revoked_at: row.revoked_at }
    }
}

#[derive(Debug, Clone)]
pub struct ApiKeyStore {
    pool: PgPool,
}

impl ApiKeyStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Inserts `user_id` if it doesn't already exist, then the key row
    /// keyed by `key_hash`. Called once per `POST /api-keys`.
    pub async fn create_key(&self, user_id: Uuid, key_hash: &str, label: Option<&str>) -> GatewayResult<ApiKey> {
        let mut tx = self.pool.begin().await.map_err(db_err)?;
        sqlx::query("INSERT INTO users (id) VALUES ($1) ON CONFLICT (id) DO NOTHING")
            .bind(user_id)
            .execute(&mut *tx)
            .await
            .map_err(db_err)?;

        let id = Uuid::now_v7();
        let created_at = Utc::now();
        sqlx::query(
            "INSERT INTO api_keys (id, user_id, key_hash, label, created_at) VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(id)
        .bind(user_id)
        .bind(key_hash)
        .bind(label)
        .bind(created_at)
        .execute(&mut *tx)
        .await
        .map_err(db_err)?;

        tx.commit().await.map_err(db_err)?;
        Ok(ApiKey { id, user_id, label: label.map(str::to_string), created_at, revoked_at: None })
    }

    /// Resolves an inbound `X-API-Key` header to its owning user and its own
    /// row ID, rejecting soft-deleted keys. This is the only authentication
    /// lookup in the system (spec §1 treats request authentication itself as
    /// external, but the hash-to-user mapping is this store's job). The key
    /// ID lets callers reject self-revocation (spec §6).
    pub async fn resolve(&self, key_hash: &str) -> GatewayResult<Option<(Uuid, Uuid)>> {
        let row: Option<(Uuid, Uuid)> =
            sqlx::query_as("SELECT id, user_id FROM api_keys WHERE key_hash = $1 AND revoked_at IS NULL")
                .bind(key_hash)
                .fetch_optional(&self.pool)
                .await
                .map_err(db_err)?;
        Ok(row)
    }

    pub async fn list_keys(&self, user_id: Uuid) -> GatewayResult<Vec<ApiKey>> {
        let rows: Vec<ApiKeyRow> = sqlx::query_as(
            "SELECT id, user_id, label, created_at, revoked_at FROM api_keys \
             WHERE user_id = $1 ORDER BY created_at DESC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(rows.into_iter().map(ApiKey::from).collect())
    }

    pub async fn get_key(&self, id: Uuid, user_id: Uuid) -> GatewayResult<Option<ApiKey>> {
        let row: Option<ApiKeyRow> = sqlx::query_as(
            "SELECT id, user_id, label, created_at, revoked_at FROM api_keys WHERE id = $1 AND user_id = $2",
        )
        .bind(id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(row.map(ApiKey::from))
    }

    /// Soft-deletes a key. Rejecting the deletion of the authenticating key
    /// itself (422 per spec §6) is the caller's responsibility - this store
    /// only knows about rows, not which key authenticated the request.
    pub async fn revoke_key(&self, id: Uuid, user_id: Uuid) -> GatewayResult<bool> {
        let result = sqlx::query(
            "UPDATE api_keys SET revoked_at = $1 WHERE id = $2 AND user_id = $3 AND revoked_at IS NULL",
        )
        .bind(Utc::now())
        .bind(id)
        .bind(user_id)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(result.rows_affected() > 0)
    }
}

fn db_err(e: sqlx::Error) -> GatewayError {
    GatewayError::Internal(format!("database error: {e}"))
}
