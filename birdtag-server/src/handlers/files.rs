//! Manual tag edits and bulk deletion
//!
//! Both endpoints address the caller's items by id, original URL or
//! thumbnail URL. Every target is processed on its own: a failing item is
//! reported in `failed` and the rest of the batch carries on.

use axum::{extract::State, Json};
use birdtag_core::{key_from_url, parse_tags, BirdtagError, CatalogEvent, MediaItem, TagEdit};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::ToSchema;

use crate::error::ApiError;
use crate::state::AppState;
use crate::validation::require_field;

/// Edit operation as sent by clients: `0`/`"remove"` or `1`/`"add"`.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum OperationValue {
    Code(i64),
    Name(String),
}

impl OperationValue {
    pub fn to_edit(&self) -> Result<TagEdit, BirdtagError> {
        match self {
            Self::Code(0) => Ok(TagEdit::Remove),
            Self::Code(1) => Ok(TagEdit::Add),
            Self::Name(name) => match name.trim().to_lowercase().as_str() {
                "0" | "remove" => Ok(TagEdit::Remove),
                "1" | "add" => Ok(TagEdit::Add),
                other => Err(BirdtagError::validation(format!(
                    "operation must be 0 (remove) or 1 (add), got '{other}'"
                ))),
            },
            Self::Code(other) => Err(BirdtagError::validation(format!(
                "operation must be 0 (remove) or 1 (add), got {other}"
            ))),
        }
    }
}

/// Manual tag edit request
#[derive(Deserialize, ToSchema)]
pub struct TagEditRequest {
    #[schema(example = "u1")]
    pub user_id: Option<String>,
    /// Original or thumbnail URLs of the items to edit
    #[serde(default)]
    pub urls: Vec<String>,
    /// Ids of the items to edit
    #[serde(default)]
    pub ids: Vec<String>,
    /// `0`/`"remove"` or `1`/`"add"`
    #[schema(value_type = Object, example = 1)]
    pub operation: Option<OperationValue>,
    /// Tags in any accepted shape
    #[schema(value_type = Object, example = json!(["crow,1", "pigeon,2"]))]
    pub tags: Option<Value>,
}

/// Bulk delete request
#[derive(Deserialize, ToSchema)]
pub struct DeleteRequest {
    #[schema(example = "u1")]
    pub user_id: Option<String>,
    #[serde(default)]
    pub urls: Vec<String>,
    #[serde(default)]
    pub ids: Vec<String>,
}

/// A target that could not be processed
#[derive(Debug, Serialize, ToSchema)]
pub struct FailedTarget {
    /// Item id, or the reference that matched nothing
    pub id: String,
    pub error: String,
}

/// Result of a tag edit batch
#[derive(Serialize, ToSchema)]
pub struct TagEditResponse {
    pub updated: Vec<String>,
    pub failed: Vec<FailedTarget>,
}

/// Result of a delete batch
#[derive(Serialize, ToSchema)]
pub struct DeleteResponse {
    pub deleted: Vec<String>,
    pub failed: Vec<FailedTarget>,
}

/// Resolve the request's references to the caller's items.
///
/// References that match nothing are returned as failures. No reference at
/// all, or none matching, is a validation error.
async fn resolve_targets(
    state: &AppState,
    user_id: &str,
    urls: Vec<String>,
    ids: Vec<String>,
) -> Result<(Vec<MediaItem>, Vec<FailedTarget>), ApiError> {
    let references: Vec<String> = urls
        .into_iter()
        .chain(ids)
        .map(|r| r.trim().to_string())
        .filter(|r| !r.is_empty())
        .collect();
    if references.is_empty() {
        return Err(BirdtagError::validation("urls or ids must list at least one file").into());
    }

    let (items, unmatched) = state.queries.referenced(user_id, &references).await?;
    if items.is_empty() {
        return Err(BirdtagError::validation("no matching files found for this user").into());
    }
    let failed = unmatched
        .into_iter()
        .map(|reference| FailedTarget {
            id: reference,
            error: "not found".to_string(),
        })
        .collect();
    Ok((items, failed))
}

/// Add or remove tags on the caller's items
///
/// `add` increases each listed species by the given count; `remove` deletes
/// the listed species whatever their count.
#[utoipa::path(
    post,
    path = "/tags",
    tag = "Media",
    request_body = TagEditRequest,
    responses(
        (status = 200, description = "Per-item outcome", body = TagEditResponse),
        (status = 400, description = "Missing fields, bad operation or no matching files")
    )
)]
pub async fn edit_tags_handler(
    State(state): State<AppState>,
    Json(request): Json<TagEditRequest>,
) -> Result<Json<TagEditResponse>, ApiError> {
    let user_id = require_field("user_id", request.user_id.as_deref())?;
    let edit = request
        .operation
        .as_ref()
        .ok_or_else(|| BirdtagError::validation("operation is required"))?
        .to_edit()?;
    let edits = parse_tags(request.tags.unwrap_or(Value::Null))?;
    if edits.is_empty() {
        return Err(BirdtagError::validation("tags must not be empty").into());
    }

    let (items, mut failed) = resolve_targets(&state, user_id, request.urls, request.ids).await?;
    let mut updated = Vec::with_capacity(items.len());

    for item in items {
        let tags = edit.apply(&item.tags, &edits);
        match state.stores.catalog.update_tags(&item.id, &tags).await {
            Ok(stored) => {
                state.events.emit(CatalogEvent::updated(&stored));
                updated.push(stored.id);
            }
            Err(e) => {
                tracing::warn!(item_id = %item.id, error = %e, "Tag update failed");
                failed.push(FailedTarget {
                    id: item.id,
                    error: ApiError::from(e).client_message(),
                });
            }
        }
    }

    tracing::info!(user_id = %user_id, ?edit, updated = updated.len(), failed = failed.len(), "Tag edit batch");
    Ok(Json(TagEditResponse { updated, failed }))
}

/// Delete an item's objects, then its catalog row.
async fn delete_item(state: &AppState, item: &MediaItem) -> Result<Option<MediaItem>, ApiError> {
    state.objects.delete(&key_from_url(&item.original_url)).await?;
    if let Some(thumbnail) = &item.thumbnail_url {
        state.objects.delete(&key_from_url(thumbnail)).await?;
    }
    Ok(state.stores.catalog.delete(&item.id).await?)
}

/// Delete the caller's items
///
/// For each item the original object is removed first, then the thumbnail.
/// The catalog row goes only when both succeed.
#[utoipa::path(
    post,
    path = "/files/delete",
    tag = "Media",
    request_body = DeleteRequest,
    responses(
        (status = 200, description = "Per-item outcome", body = DeleteResponse),
        (status = 400, description = "Missing user_id or no matching files")
    )
)]
pub async fn delete_files_handler(
    State(state): State<AppState>,
    Json(request): Json<DeleteRequest>,
) -> Result<Json<DeleteResponse>, ApiError> {
    let user_id = require_field("user_id", request.user_id.as_deref())?;
    let (items, mut failed) = resolve_targets(&state, user_id, request.urls, request.ids).await?;
    let mut deleted = Vec::with_capacity(items.len());

    for item in items {
        match delete_item(&state, &item).await {
            Ok(removed) => {
                // The pre-removal tags decide who hears about it.
                let removed = removed.unwrap_or(item);
                state.events.emit(CatalogEvent::deleted(&removed));
                deleted.push(removed.id);
            }
            Err(e) => {
                tracing::warn!(item_id = %item.id, error = %e, "Delete failed");
                failed.push(FailedTarget {
                    id: item.id,
                    error: e.client_message(),
                });
            }
        }
    }

    tracing::info!(user_id = %user_id, deleted = deleted.len(), failed = failed.len(), "Delete batch");
    Ok(Json(DeleteResponse { deleted, failed }))
}
