//! File metadata persistence. Blob bytes live with an external storage
//! collaborator (spec §1 non-goal); this only tracks what C5/C8 need to
//! filter models and estimate cost.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use gateway_shared::model::{AudioCodec, FileMetadata, FileModality};
use gateway_shared::{GatewayError, GatewayResult};

use crate::store::to_db_str_pub;

#[derive(Debug, sqlx::FromRow)]
struct FileRow {
    id: Uuid,
    owner_id: Uuid,
    modality: String,
    byte_size: i64,
    page_count: Option<i32>,
    audio_codec: Option<String>,
    remote_url: Option<String>,
    created_at: DateTime<Utc>,
}

impl FileRow {
    fn into_metadata(self) -> GatewayResult<FileMetadata> {
        let codec = self
            .audio_codec
            .as_deref()
            .map(|c| crate::store::from_db_str_pub::<AudioCodec>("files.audio_codec", c))
            .transpose()?;
        Ok(FileMetadata {
            id: self.id,
            owner_id: self.owner_id,
            modality: crate::store::from_db_str_pub("files.modality", &self.modality)?,
            byte_size: self.byte_size as u64,
            page_count: self.page_count.map(|p| p as u32),
            codec,
            remote_url: self.remote_url,
            created_at: self.created_at,
        })
    }
}

#[derive(Debug, Clone)]
pub struct FileStore {
    pool: PgPool,
}

impl FileStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn register_file(
        &self,
        owner_id: Uuid,
        modality: FileModality,
        byte_size: u64,
        page_count: Option<u32>,
        codec: Option<AudioCodec>,
        remote_url: Option<String>,
    ) -> GatewayResult<FileMetadata> {
        let id = Uuid::now_v7();
        let created_at = Utc::now();
        let modality_str = to_db_str_pub(&modality)?;
        let codec_str = codec.map(|c| to_db_str_pub(&c)).transpose()?;

        sqlx::query(
            "INSERT INTO files (id, owner_id, modality, byte_size, page_count, audio_codec, remote_url, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
        )
        .bind(id)
        .bind(owner_id)
        .bind(&modality_str)
        .bind(byte_size as i64)
        .bind(page_count.map(|p| p as i32))
        .bind(&codec_str)
        .bind(&remote_url)
        .bind(created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| GatewayError::Internal(format!("database error: {e}")))?;

        Ok(FileMetadata { id, owner_id, modality, byte_size, page_count, codec, remote_url, created_at })
    }

    pub async fn list_files(&self, owner_id: Uuid) -> GatewayResult<Vec<FileMetadata>> {
        let rows: Vec<FileRow> = sqlx::query_as(
            "SELECT id, owner_id, modality, byte_size, page_count, audio_codec, remote_url, created_at \
             FROM files WHERE owner_id = $1 ORDER BY created_at DESC",
        )
        .bind(owner_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| GatewayError::Internal(format!("database error: {e}")))?;

        rows.into_iter().map(FileRow::into_metadata).collect()
    }

    pub async fn get_file(&self, id: Uuid, owner_id: Uuid) -> GatewayResult<Option<FileMetadata>> {
        let row: Option<FileRow> = sqlx::query_as(
            "SELECT id, owner_id, modality, byte_size, page_count, audio_codec, remote_url, created_at \
             FROM files WHERE id = $1 AND owner_id = $2",
        )
        .bind(id)
        .bind(owner_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| GatewayError::Internal(format!("database error: {e}")))?;

        row.map(FileRow::into_metadata).transpose()
    }

    /// Resolves a batch of file IDs for a step, in order, failing loudly if
    /// any is missing - a dangling `required_file_ids` entry indicates a
    /// data integrity bug upstream, not a recoverable per-file condition.
    pub async fn get_files(&self, ids: &[Uuid], owner_id: Uuid) -> GatewayResult<Vec<FileMetadata>> {
        let mut files = Vec::with_capacity(ids.len());
        for id in ids {
            let file = self
                .get_file(*id, owner_id)
                .await?
                .ok_or_else(|| GatewayError::NotFound(format!("file {id}")))?;
            files.push(file);
        }
        Ok(files)
    }
}
