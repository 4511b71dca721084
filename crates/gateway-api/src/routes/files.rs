//! `POST /files`, `POST /files/url`, `GET /files` (spec §6, §10.4).

use axum::extract::{Multipart, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;

use gateway_shared::model::{AudioCodec, FileMetadata, FileModality};
use gateway_shared::{GatewayError, GatewayResult};

use crate::auth::AuthenticatedUser;
use crate::state::AppState;

async fn upload_file(
    State(state): State<AppState>,
    auth: AuthenticatedUser,
    mut multipart: Multipart,
) -> GatewayResult<Json<FileMetadata>> {
    let mut modality: Option<FileModality> = None;
    let mut page_count: Option<u32> = None;
    let mut codec: Option<AudioCodec> = None;
    let mut bytes: Option<Vec<u8>> = None;

    while let Some(field) = multipart.next_field().await.map_err(|e| GatewayError::InvalidArgument(e.to_string()))? {
        match field.name() {
            Some("modality") => {
                let text = field.text().await.map_err(|e| GatewayError::InvalidArgument(e.to_string()))?;
                modality = Some(parse_modality(&text)?);
            }
            Some("page_count") => {
                let text = field.text().await.map_err(|e| GatewayError::InvalidArgument(e.to_string()))?;
                page_count = text.parse().ok();
            }
            Some("codec") => {
                let text = field.text().await.map_err(|e| GatewayError::InvalidArgument(e.to_string()))?;
                codec = Some(parse_codec(&text)?);
            }
            Some("file") => {
                let data = field.bytes().await.map_err(|e| GatewayError::InvalidArgument(e.to_string()))?;
                bytes = Some(data.to_vec());
            }
            _ => {}
        }
    }

    let modality = modality.ok_or_else(|| GatewayError::InvalidArgument("missing modality field".to_string()))?;
    let bytes = bytes.ok_or_else(|| GatewayError::InvalidArgument("missing file field".to_string()))?;
    if modality == FileModality::Audio && codec.is_none() {
        return Err(GatewayError::InvalidArgument("audio uploads require a codec field".to_string()));
    }

    let metadata = state
        .orchestration
        .files
        .register_file(auth.user_id, modality, bytes.len() as u64, page_count, codec, None)
        .await?;
    state.blobs.put(metadata.id, &bytes).await?;
    Ok(Json(metadata))
}

#[derive(Deserialize)]
struct RegisterUrlRequest {
    url: String,
    modality: String,
    byte_size: u64,
    page_count: Option<u32>,
    codec: Option<String>,
}

async fn register_url(
    State(state): State<AppState>,
    auth: AuthenticatedUser,
    Json(body): Json<RegisterUrlRequest>,
) -> GatewayResult<Json<FileMetadata>> {
    let modality = parse_modality(&body.modality)?;
    let codec = body.codec.as_deref().map(parse_codec).transpose()?;
    if modality == FileModality::Audio && codec.is_none() {
        return Err(GatewayError::InvalidArgument("audio uploads require a codec field".to_string()));
    }
    let metadata = state
        .orchestration
        .files
        .register_file(auth.user_id, modality, body.byte_size, body.page_count, codec, Some(body.url))
        .await?;
    Ok(Json(metadata))
}

async fn list_files(
    State(state): State<AppState>,
    auth: AuthenticatedUser,
) -> GatewayResult<Json<Vec<FileMetadata>>> {
    Ok(Json(state.orchestration.files.list_files(auth.user_id).await?))
}

fn parse_modality(s: &str) -> GatewayResult<FileModality> {
    match s {
        "pdf" => Ok(FileModality::Pdf),
        "image" => Ok(FileModality::Image),
        "audio" => Ok(FileModality::Audio),
        "video" => Ok(FileModality::Video),
        "text" => Ok(FileModality::Text),
        other => Err(GatewayError::InvalidArgument(format!("unknown file modality '{other}'"))),
    }
}

fn parse_codec(s: &str) -> GatewayResult<AudioCodec> {
    match s {
        "wav" => Ok(AudioCodec::Wav),
        "mp3" => Ok(AudioCodec::Mp3),
        other => Err(GatewayError::InvalidArgument(format!("unknown audio codec '{other}'"))),
    }
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/files", post(upload_file).get(list_files))
        .route("/files/url", post(register_url))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recognizes_every_supported_modality() {
        assert_eq!(parse_modality("pdf").unwrap(), FileModality::Pdf);
        assert_eq!(parse_modality("image").unwrap(), FileModality::Image);
        assert_eq!(parse_modality("audio").unwrap(), FileModality::Audio);
        assert_eq!(parse_modality("video").unwrap(), FileModality::Video);
        assert_eq!(parse_modality("text").unwrap(), FileModality::Text);
    }

    #[test]
    fn rejects_unknown_modality() {
        assert!(parse_modality("spreadsheet").is_err());
    }

    #[test]
    fn recognizes_every_supported_codec() {
        assert_eq!(parse_codec("wav").unwrap(), AudioCodec::Wav);
        assert_eq!(parse_codec("mp3").unwrap(), AudioCodec::Mp3);
    }

    #[test]
    fn rejects_unknown_codec() {
        assert!(parse_codec("flac").is_err());
    }
}
