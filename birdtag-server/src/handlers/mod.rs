//! HTTP request handlers
//!
//! This module contains all the request handlers for the API endpoints.

pub mod events;
pub mod files;
pub mod health;
pub mod jobs;
pub mod objects;
pub mod query;
pub mod subscriptions;
pub mod uploads;

pub use crate::state::AppState;
pub use events::{
    catalog_event_handler, object_created_handler, AcceptedResponse, CatalogEventRequest,
    ObjectCreatedNotification,
};
pub use files::{
    delete_files_handler, edit_tags_handler, DeleteRequest, DeleteResponse, FailedTarget,
    TagEditRequest, TagEditResponse,
};
pub use health::{health, ready, HealthResponse, ReadyResponse};
pub use jobs::{poll_handler, PollRequest, PollResponse};
pub use objects::{get_object_handler, presign_handler, PresignRequest, PresignResponse};
pub use query::{query_get_handler, query_handler, QueryRequest, QueryResponse};
pub use subscriptions::{
    list_subscriptions_handler, subscribe_handler, SubscribeRequest, SubscriptionResponse,
};
pub use uploads::{search_handler, upload_handler, SearchResponse, UploadResponse};
