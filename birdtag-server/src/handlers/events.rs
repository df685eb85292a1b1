//! Event ingress
//!
//! Object-created notifications from the object store and catalog mutation
//! events produced outside this process.

use axum::{extract::State, http::StatusCode, Json};
use birdtag_core::{CatalogEvent, MutationKind, TagMap};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::error::ApiError;
use crate::state::AppState;

/// S3-style object-created notification
#[derive(Debug, Deserialize, ToSchema)]
pub struct ObjectCreatedNotification {
    #[serde(rename = "Records", default)]
    pub records: Vec<ObjectRecord>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ObjectRecord {
    pub s3: S3Entity,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct S3Entity {
    pub bucket: BucketRef,
    pub object: ObjectRef,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct BucketRef {
    #[schema(example = "birdtag-media")]
    pub name: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ObjectRef {
    /// Object key, used as is
    #[schema(example = "users/u1/raw/3f2b8c1e.jpg")]
    pub key: String,
}

/// Catalog mutation event
#[derive(Debug, Deserialize, ToSchema)]
pub struct CatalogEventRequest {
    #[schema(value_type = String, example = "UPDATE")]
    pub kind: MutationKind,
    #[schema(example = "3f2b8c1e")]
    pub item_id: String,
    /// Owner of the item
    #[schema(example = "u1")]
    pub user_id: String,
    #[schema(example = "http://localhost:3000/objects/users/u1/raw/3f2b8c1e.jpg")]
    pub original_url: String,
    /// Tags after the change; for DELETE, the tags before removal
    #[serde(default)]
    #[schema(value_type = Object, example = json!({"crow": 2}))]
    pub tags: TagMap,
}

impl From<CatalogEventRequest> for CatalogEvent {
    fn from(request: CatalogEventRequest) -> Self {
        Self {
            kind: request.kind,
            item_id: request.item_id,
            owner_id: request.user_id,
            original_url: request.original_url,
            tags: request.tags,
        }
    }
}

/// Number of events taken for processing
#[derive(Debug, Serialize, ToSchema)]
pub struct AcceptedResponse {
    pub accepted: usize,
}

/// Receive object-created notifications
///
/// Each record is processed on its own task; the response does not wait for
/// tagging or searching to finish.
#[utoipa::path(
    post,
    path = "/events/object-created",
    tag = "Events",
    request_body = ObjectCreatedNotification,
    responses(
        (status = 202, description = "Records accepted", body = AcceptedResponse),
        (status = 400, description = "Malformed notification")
    )
)]
pub async fn object_created_handler(
    State(state): State<AppState>,
    Json(notification): Json<ObjectCreatedNotification>,
) -> Result<(StatusCode, Json<AcceptedResponse>), ApiError> {
    let accepted = notification.records.len();
    for record in notification.records {
        tracing::debug!(bucket = %record.s3.bucket.name, key = %record.s3.object.key, "Object created");
        state.ingest.spawn(record.s3.object.key);
    }
    Ok((StatusCode::ACCEPTED, Json(AcceptedResponse { accepted })))
}

/// Receive a catalog mutation event
///
/// The event is handed to the subscription notifier.
#[utoipa::path(
    post,
    path = "/events/catalog",
    tag = "Events",
    request_body = CatalogEventRequest,
    responses(
        (status = 202, description = "Event accepted", body = AcceptedResponse),
        (status = 400, description = "Malformed event")
    )
)]
pub async fn catalog_event_handler(
    State(state): State<AppState>,
    Json(request): Json<CatalogEventRequest>,
) -> Result<(StatusCode, Json<AcceptedResponse>), ApiError> {
    let event = CatalogEvent::from(request);
    tracing::debug!(item_id = %event.item_id, kind = ?event.kind, "External catalog event");
    state.events.emit(event);
    Ok((StatusCode::ACCEPTED, Json(AcceptedResponse { accepted: 1 })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_s3_notification() {
        let body = serde_json::json!({
            "Records": [
                {"eventName": "ObjectCreated:Put",
                 "s3": {"bucket": {"name": "media"}, "object": {"key": "users/u1/raw/a.jpg", "size": 10}}},
                {"s3": {"bucket": {"name": "media"}, "object": {"key": "tmp/u1/j1.wav"}}}
            ]
        });
        let notification: ObjectCreatedNotification = serde_json::from_value(body).unwrap();
        let keys: Vec<&str> = notification
            .records
            .iter()
            .map(|r| r.s3.object.key.as_str())
            .collect();
        assert_eq!(keys, vec!["users/u1/raw/a.jpg", "tmp/u1/j1.wav"]);
    }

    #[test]
    fn test_catalog_event_request_matches_event_shape() {
        let body = serde_json::json!({
            "kind": "DELETE",
            "item_id": "a",
            "user_id": "u1",
            "original_url": "users/u1/raw/a.jpg",
            "tags": {"Heron": 1}
        });
        let request: CatalogEventRequest = serde_json::from_value(body.clone()).unwrap();
        let event = CatalogEvent::from(request);
        assert!(event.is_broadcast());
        assert_eq!(event.tags.get("heron"), 1);
        assert_eq!(event, serde_json::from_value::<CatalogEvent>(body).unwrap());
    }
}
