//! Presigned object retrieval

use axum::{
    extract::{Path, Query, State},
    http::header,
    response::IntoResponse,
    Json,
};
use birdtag_core::{key_from_url, media::extension_of};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::error::ApiError;
use crate::state::AppState;
use crate::validation::require_field;

/// Signature parameters of a presigned URL
#[derive(Debug, Deserialize, IntoParams)]
pub struct SignatureParams {
    /// Expiry as unix seconds
    pub expires: Option<i64>,
    /// Hex signature
    pub signature: Option<String>,
}

/// Presign request
#[derive(Deserialize, ToSchema)]
pub struct PresignRequest {
    /// Object key or stored object URL
    #[schema(example = "users/u1/raw/3f2b8c1e.jpg")]
    pub s3_key: Option<String>,
}

/// Presigned retrieval URL
#[derive(Debug, Serialize, ToSchema)]
pub struct PresignResponse {
    pub url: String,
    /// Seconds until the URL expires
    #[schema(example = 3600)]
    pub expires_in: u64,
}

fn content_type_for(key: &str) -> &'static str {
    match extension_of(key).map(str::to_lowercase).as_deref() {
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("png") => "image/png",
        Some("mp4") => "video/mp4",
        Some("mov") => "video/quicktime",
        Some("wav") => "audio/wav",
        Some("mp3") => "audio/mpeg",
        _ => "application/octet-stream",
    }
}

/// Fetch an object through a presigned URL
#[utoipa::path(
    get,
    path = "/objects/{key}",
    tag = "Objects",
    params(
        ("key" = String, Path, description = "Object key"),
        SignatureParams
    ),
    responses(
        (status = 200, description = "Object content"),
        (status = 403, description = "Missing, invalid or expired signature"),
        (status = 404, description = "Object not found")
    )
)]
pub async fn get_object_handler(
    State(state): State<AppState>,
    Path(key): Path<String>,
    Query(params): Query<SignatureParams>,
) -> Result<impl IntoResponse, ApiError> {
    let (Some(expires), Some(signature)) = (params.expires, params.signature.as_deref()) else {
        return Err(ApiError::forbidden("missing signature"));
    };
    state
        .presigner
        .verify(&key, expires, signature, Utc::now().timestamp())?;

    let data = state.objects.get(&key).await?;
    Ok(([(header::CONTENT_TYPE, content_type_for(&key))], data))
}

/// Issue a presigned retrieval URL
///
/// Accepts a bare key or a stored object URL.
#[utoipa::path(
    post,
    path = "/presign",
    tag = "Objects",
    request_body = PresignRequest,
    responses(
        (status = 200, description = "Presigned URL", body = PresignResponse),
        (status = 400, description = "Missing s3_key")
    )
)]
pub async fn presign_handler(
    State(state): State<AppState>,
    Json(request): Json<PresignRequest>,
) -> Result<Json<PresignResponse>, ApiError> {
    let reference = require_field("s3_key", request.s3_key.as_deref())?;
    let key = key_from_url(reference);
    if key.is_empty() {
        return Err(ApiError::bad_request("s3_key does not name an object"));
    }

    let expiry = state.presigner.default_expiry();
    Ok(Json(PresignResponse {
        url: state.presigner.presign_get(&key, expiry),
        expires_in: expiry.as_secs(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_type_for_key() {
        assert_eq!(content_type_for("users/u1/raw/a.JPG"), "image/jpeg");
        assert_eq!(content_type_for("users/u1/raw/a.mov"), "video/quicktime");
        assert_eq!(content_type_for("users/u1/raw/a.mp3"), "audio/mpeg");
        assert_eq!(content_type_for("users/u1/raw/a"), "application/octet-stream");
    }
}
