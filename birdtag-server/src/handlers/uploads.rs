//! Direct upload handlers
//!
//! `POST /uploads` adds media to the catalog; `POST /search` submits a
//! content-search probe. Both store the file and hand its key to the
//! ingestion pipeline, which runs in the background.

use axum::{
    extract::{Multipart, State},
    http::StatusCode,
    Json,
};
use birdtag_core::ObjectKey;
use serde::Serialize;
use utoipa::ToSchema;

use crate::error::ApiError;
use crate::multipart::UploadForm;
use crate::state::AppState;

/// Response for an accepted catalog upload
#[derive(Serialize, ToSchema)]
pub struct UploadResponse {
    /// Catalog item id
    #[schema(example = "3f2b8c1e9a7d4e0f8b6a5c4d3e2f1a0b")]
    pub file_id: String,
    /// Object key of the stored file
    #[schema(example = "users/u1/raw/3f2b8c1e9a7d4e0f8b6a5c4d3e2f1a0b.jpg")]
    pub key: String,
}

/// Response for an accepted search probe
#[derive(Serialize, ToSchema)]
pub struct SearchResponse {
    /// Job id to poll with `POST /search/results`
    #[schema(example = "7c1d2e3f4a5b6c7d8e9f0a1b2c3d4e5f")]
    pub job_id: String,
}

fn new_id() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}

/// Upload media to the catalog
///
/// Accepts multipart/form-data with:
/// - **file** (required): image (.jpg, .jpeg, .png), video (.mp4, .mov) or audio (.wav, .mp3)
/// - **user_id** (required): owner of the item
///
/// Species detection runs in the background; the item appears in queries
/// once tagged.
#[utoipa::path(
    post,
    path = "/uploads",
    tag = "Media",
    request_body(content_type = "multipart/form-data", description = "Media file and owner id"),
    responses(
        (status = 202, description = "Upload accepted", body = UploadResponse),
        (status = 400, description = "Missing file or user_id, bad Content-Type, or file too large"),
        (status = 415, description = "Unsupported media type")
    )
)]
pub async fn upload_handler(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<UploadResponse>), ApiError> {
    let mut form = UploadForm::parse(&mut multipart, state.config.max_upload_bytes()).await?;
    let user_id = form.require_text("user_id")?.to_string();
    let file = form.take_file()?;

    let file_id = new_id();
    let key = ObjectKey::upload(&user_id, &file_id, &file.extension)?.key();
    state.objects.put(&key, file.data).await?;
    state.ingest.spawn(key.clone());

    tracing::info!(user_id = %user_id, file_id = %file_id, file_type = %file.file_type, "Upload stored");
    Ok((StatusCode::ACCEPTED, Json(UploadResponse { file_id, key })))
}

/// Submit a content-search probe
///
/// Accepts the same form as `POST /uploads`. The probe's detected species
/// become a threshold query over the user's own catalog items.
#[utoipa::path(
    post,
    path = "/search",
    tag = "Search",
    request_body(content_type = "multipart/form-data", description = "Probe file and querier id"),
    responses(
        (status = 202, description = "Search job accepted", body = SearchResponse),
        (status = 400, description = "Missing file or user_id, bad Content-Type, or file too large"),
        (status = 415, description = "Unsupported media type")
    )
)]
pub async fn search_handler(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<SearchResponse>), ApiError> {
    let mut form = UploadForm::parse(&mut multipart, state.config.max_upload_bytes()).await?;
    let user_id = form.require_text("user_id")?.to_string();
    let file = form.take_file()?;

    let job_id = new_id();
    let key = ObjectKey::probe(&user_id, &job_id, &file.extension)?.key();
    state.objects.put(&key, file.data).await?;
    state.ingest.spawn(key);

    tracing::info!(user_id = %user_id, job_id = %job_id, "Search probe stored");
    Ok((StatusCode::ACCEPTED, Json(SearchResponse { job_id })))
}
