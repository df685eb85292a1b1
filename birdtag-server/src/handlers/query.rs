//! Direct tag query handlers

use std::collections::HashMap;

use axum::{
    extract::{Query, State},
    Json,
};
use birdtag_core::{parse_query, MatchView, TagQuery};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::ToSchema;

use crate::error::ApiError;
use crate::state::AppState;
use crate::validation::require_field;

/// Highest `tagN`/`countN` index read from the query string.
pub const MAX_QUERY_TERMS: usize = 19;

/// Tag query request
#[derive(Deserialize, ToSchema)]
pub struct QueryRequest {
    #[schema(example = "u1")]
    pub user_id: Option<String>,
    /// Tags in any accepted shape: `["crow,2"]`, `{"crow": 2}` or
    /// `[{"label": "crow", "quantity": 2}]`
    #[schema(value_type = Object, example = json!({"crow": 2, "pigeon": 1}))]
    pub tags: Option<Value>,
}

/// Matching catalog items
#[derive(Serialize, ToSchema)]
pub struct QueryResponse {
    #[schema(value_type = Vec<Object>)]
    pub results: Vec<MatchView>,
}

/// Read `tag1..tag19` / `count1..count19` pairs.
///
/// A missing or unparsable count means 1. Blank tags are ignored.
pub fn query_from_params(params: &HashMap<String, String>) -> TagQuery {
    let mut query = TagQuery::new();
    for n in 1..=MAX_QUERY_TERMS {
        let Some(label) = params.get(&format!("tag{n}")) else {
            continue;
        };
        if label.trim().is_empty() {
            continue;
        }
        let count = params
            .get(&format!("count{n}"))
            .and_then(|c| c.trim().parse::<i64>().ok())
            .unwrap_or(1)
            .clamp(1, u32::MAX as i64) as u32;
        query.require(label, count);
    }
    query
}

/// Find the user's items carrying at least the given species counts
#[utoipa::path(
    post,
    path = "/query",
    tag = "Query",
    request_body = QueryRequest,
    responses(
        (status = 200, description = "Matching items", body = QueryResponse),
        (status = 400, description = "Missing user_id or malformed tags")
    )
)]
pub async fn query_handler(
    State(state): State<AppState>,
    Json(request): Json<QueryRequest>,
) -> Result<Json<QueryResponse>, ApiError> {
    let user_id = require_field("user_id", request.user_id.as_deref())?;
    // Minimums of zero or below ask for "at least one", as in `GET /query`.
    let query = parse_query(request.tags.unwrap_or(Value::Null))?;

    let results = state.queries.execute(user_id, &query).await?;
    tracing::debug!(user_id = %user_id, terms = query.len(), matched = results.len(), "Tag query");
    Ok(Json(QueryResponse { results }))
}

/// Query-string form of `POST /query`
///
/// Parameters: `user_id`, then `tag1`..`tag19` with optional `count1`..`count19`.
#[utoipa::path(
    get,
    path = "/query",
    tag = "Query",
    params(
        ("user_id" = String, Query, description = "Owner of the items"),
        ("tag1" = Option<String>, Query, description = "First species"),
        ("count1" = Option<u32>, Query, description = "Minimum count for tag1 (default 1)")
    ),
    responses(
        (status = 200, description = "Matching items", body = QueryResponse),
        (status = 400, description = "Missing user_id")
    )
)]
pub async fn query_get_handler(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Json<QueryResponse>, ApiError> {
    let user_id = require_field("user_id", params.get("user_id").map(String::as_str))?;
    let query = query_from_params(&params);

    let results = state.queries.execute(user_id, &query).await?;
    Ok(Json(QueryResponse { results }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_params_counts_default_and_clamp() {
        let query = query_from_params(&params(&[
            ("user_id", "u1"),
            ("tag1", "Crow"),
            ("count1", "3"),
            ("tag2", "pigeon"),
            ("tag3", "owl"),
            ("count3", "-2"),
            ("tag4", "heron"),
            ("count4", "lots"),
        ]));
        let terms: Vec<(&str, u32)> = query.iter().collect();
        assert_eq!(
            terms,
            vec![("crow", 3), ("heron", 1), ("owl", 1), ("pigeon", 1)]
        );
    }

    #[test]
    fn test_params_beyond_last_index_ignored() {
        let query = query_from_params(&params(&[("tag20", "crow"), ("tag19", "owl")]));
        let terms: Vec<(&str, u32)> = query.iter().collect();
        assert_eq!(terms, vec![("owl", 1)]);
    }

    #[test]
    fn test_body_and_params_clamp_alike() {
        let body = parse_query(serde_json::json!({"crow": -2, "owl": 0, "heron": 3})).unwrap();
        let from_params = query_from_params(&params(&[
            ("tag1", "crow"),
            ("count1", "-2"),
            ("tag2", "owl"),
            ("count2", "0"),
            ("tag3", "heron"),
            ("count3", "3"),
        ]));
        assert_eq!(body, from_params);
    }
}
