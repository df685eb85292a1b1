//! Search job polling handler

use axum::{extract::State, Json};
use birdtag_core::{JobStatus, MatchView, SearchJob, TagMap};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::error::ApiError;
use crate::state::AppState;
use crate::validation::require_field;

/// Poll request
#[derive(Deserialize, ToSchema)]
pub struct PollRequest {
    #[schema(example = "u1")]
    pub user_id: Option<String>,
    #[schema(example = "7c1d2e3f4a5b6c7d8e9f0a1b2c3d4e5f")]
    pub job_id: Option<String>,
}

/// Current state of a search job
#[derive(Debug, Serialize, ToSchema)]
pub struct PollResponse {
    #[schema(value_type = String, example = "COMPLETED")]
    pub status: JobStatus,
    pub job_id: String,
    /// Present while the job is not finished
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Species found in the probe (COMPLETED only)
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<Object>)]
    pub discovered_tags: Option<TagMap>,
    /// Matching catalog items in scan order (COMPLETED only)
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<Vec<Object>>)]
    pub results: Option<Vec<MatchView>>,
    /// Failure message (FAILED only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl PollResponse {
    fn pending(job_id: &str) -> Self {
        Self {
            status: JobStatus::Processing,
            job_id: job_id.to_string(),
            message: Some("Search is still processing or the job was not found yet".to_string()),
            discovered_tags: None,
            results: None,
            error: None,
        }
    }

    fn from_job(job: SearchJob) -> Self {
        match job.status {
            JobStatus::Completed => Self {
                status: job.status,
                job_id: job.job_id,
                message: None,
                discovered_tags: Some(job.discovered_tags),
                results: Some(job.results),
                error: None,
            },
            JobStatus::Failed => Self {
                status: job.status,
                job_id: job.job_id,
                message: None,
                discovered_tags: None,
                results: None,
                error: job.error,
            },
            JobStatus::Pending | JobStatus::Processing => Self::pending(&job.job_id),
        }
    }
}

/// Poll a content-search job
///
/// An unknown job, or a job submitted by another user, is reported as still
/// processing rather than as an error.
#[utoipa::path(
    post,
    path = "/search/results",
    tag = "Search",
    request_body = PollRequest,
    responses(
        (status = 200, description = "Job state", body = PollResponse),
        (status = 400, description = "Missing user_id or job_id")
    )
)]
pub async fn poll_handler(
    State(state): State<AppState>,
    Json(request): Json<PollRequest>,
) -> Result<Json<PollResponse>, ApiError> {
    let user_id = require_field("user_id", request.user_id.as_deref())?;
    let job_id = require_field("job_id", request.job_id.as_deref())?;

    let response = match state.stores.jobs.get(job_id).await? {
        Some(job) if job.is_owned_by(user_id) => PollResponse::from_job(job),
        Some(_) => {
            tracing::debug!(job_id = %job_id, "Job polled by another user");
            PollResponse::pending(job_id)
        }
        None => PollResponse::pending(job_id),
    };
    Ok(Json(response))
}
