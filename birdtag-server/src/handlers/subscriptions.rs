//! Tag subscription handlers

use std::collections::HashMap;

use axum::{
    extract::{Query, State},
    Json,
};
use birdtag_core::Subscription;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::error::ApiError;
use crate::state::AppState;
use crate::validation::require_field;

/// Subscription request
#[derive(Deserialize, ToSchema)]
pub struct SubscribeRequest {
    #[schema(example = "u1")]
    pub user_id: Option<String>,
    /// Notification endpoint
    #[schema(example = "birder@example.com")]
    pub email: Option<String>,
    /// Species to follow; lowercased and de-duplicated
    #[serde(default)]
    #[schema(example = json!(["pelican", "crow"]))]
    pub tags: Vec<String>,
}

/// Stored subscription
#[derive(Debug, Serialize, ToSchema)]
pub struct SubscriptionResponse {
    pub user_id: String,
    pub subscribed_tags: Vec<String>,
    /// Reference returned by the notification transport
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transport_ref: Option<String>,
}

impl From<Subscription> for SubscriptionResponse {
    fn from(subscription: Subscription) -> Self {
        Self {
            user_id: subscription.user_id,
            subscribed_tags: subscription.tags.into_iter().collect(),
            transport_ref: subscription.transport_ref,
        }
    }
}

/// Subscribe to notifications for a set of species
///
/// Registers the email with the notification transport, filtered on the
/// caller's id, and replaces any earlier subscription of the caller.
#[utoipa::path(
    post,
    path = "/subscriptions",
    tag = "Subscriptions",
    request_body = SubscribeRequest,
    responses(
        (status = 200, description = "Subscription stored", body = SubscriptionResponse),
        (status = 400, description = "Missing user_id or email, or empty tag list"),
        (status = 503, description = "Notification transport unavailable")
    )
)]
pub async fn subscribe_handler(
    State(state): State<AppState>,
    Json(request): Json<SubscribeRequest>,
) -> Result<Json<SubscriptionResponse>, ApiError> {
    let user_id = require_field("user_id", request.user_id.as_deref())?;
    let email = require_field("email", request.email.as_deref())?;
    let mut subscription = Subscription::new(user_id, email, &request.tags)?;

    let transport_ref = state
        .transport
        .subscribe(email, user_id)
        .await
        .map_err(|e| {
            tracing::error!(user_id = %user_id, transport = state.transport.name(), error = %e, "Endpoint registration failed");
            ApiError::service_unavailable("notification transport unavailable")
        })?;
    subscription.transport_ref = Some(transport_ref);
    state.stores.subscriptions.put(&subscription).await?;

    tracing::info!(user_id = %user_id, tags = subscription.tags.len(), "Subscription stored");
    Ok(Json(subscription.into()))
}

/// List the caller's subscribed species
///
/// A caller without a subscription gets an empty list.
#[utoipa::path(
    get,
    path = "/subscriptions",
    tag = "Subscriptions",
    params(("user_id" = String, Query, description = "Subscriber id")),
    responses(
        (status = 200, description = "Subscribed tags", body = SubscriptionResponse),
        (status = 400, description = "Missing user_id")
    )
)]
pub async fn list_subscriptions_handler(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Json<SubscriptionResponse>, ApiError> {
    let user_id = require_field("user_id", params.get("user_id").map(String::as_str))?;
    let response = match state.stores.subscriptions.get(user_id).await? {
        Some(subscription) => subscription.into(),
        None => SubscriptionResponse {
            user_id: user_id.to_string(),
            subscribed_tags: Vec::new(),
            transport_ref: None,
        },
    };
    Ok(Json(response))
}
