//! Content-search job state machine.
//!
//! ```text
//! PENDING (implicit) -> PROCESSING -> COMPLETED
//!                                  -> FAILED
//! ```
//!
//! Terminal states are immutable. Re-entering PROCESSING from PROCESSING is
//! allowed so a redelivered ingestion event can overwrite its own record.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::media::FileType;
use crate::tags::TagMap;

/// Search job status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    pub fn can_transition_to(&self, next: JobStatus) -> bool {
        match (self, next) {
            (Self::Pending, Self::Processing) => true,
            (Self::Processing, Self::Processing) => true,
            (Self::Processing, Self::Completed | Self::Failed) => true,
            _ => false,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Processing => "PROCESSING",
            Self::Completed => "COMPLETED",
            Self::Failed => "FAILED",
        }
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for JobStatus {
    type Err = crate::error::BirdtagError;

    fn from_str(s: &str) -> crate::error::Result<Self> {
        match s {
            "PENDING" => Ok(Self::Pending),
            "PROCESSING" => Ok(Self::Processing),
            "COMPLETED" => Ok(Self::Completed),
            "FAILED" => Ok(Self::Failed),
            other => Err(crate::error::BirdtagError::Serialization(format!(
                "unknown job status: {other}"
            ))),
        }
    }
}

/// One matched catalog item as returned to clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchView {
    pub id: String,
    pub file_type: FileType,
    pub file_name: String,
    pub tags: TagMap,
    /// Short-lived retrieval URL; `None` when resolution failed.
    pub display_url: Option<String>,
    pub original_key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbnail_key: Option<String>,
}

/// Terminal outcome of a search job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobOutcome {
    Completed {
        discovered_tags: TagMap,
        results: Vec<MatchView>,
    },
    Failed {
        error: String,
    },
}

impl JobOutcome {
    pub fn status(&self) -> JobStatus {
        match self {
            Self::Completed { .. } => JobStatus::Completed,
            Self::Failed { .. } => JobStatus::Failed,
        }
    }
}

/// An asynchronous content-search job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchJob {
    pub job_id: String,
    #[serde(rename = "job_status")]
    pub status: JobStatus,
    #[serde(rename = "user_id_of_querier")]
    pub owner_id: String,
    #[serde(rename = "temp_source_key")]
    pub source_key: String,
    pub received_at: DateTime<Utc>,
    #[serde(default)]
    pub discovered_tags: TagMap,
    #[serde(default, rename = "search_results_payload")]
    pub results: Vec<MatchView>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl SearchJob {
    /// Record written when the ingestion event is received.
    pub fn processing(job_id: &str, owner_id: &str, source_key: &str, received_at: DateTime<Utc>) -> Self {
        Self {
            job_id: job_id.to_string(),
            status: JobStatus::Processing,
            owner_id: owner_id.to_string(),
            source_key: source_key.to_string(),
            received_at,
            discovered_tags: TagMap::new(),
            results: Vec::new(),
            error: None,
            completed_at: None,
        }
    }

    /// Apply a terminal outcome in one step.
    ///
    /// Returns `false` and leaves the job untouched if it is already terminal.
    pub fn finish(&mut self, outcome: JobOutcome, at: DateTime<Utc>) -> bool {
        if !self.status.can_transition_to(outcome.status()) {
            return false;
        }
        self.status = outcome.status();
        match outcome {
            JobOutcome::Completed {
                discovered_tags,
                results,
            } => {
                self.discovered_tags = discovered_tags;
                self.results = results;
                self.error = None;
            }
            JobOutcome::Failed { error } => {
                self.discovered_tags = TagMap::new();
                self.results = Vec::new();
                self.error = Some(error);
            }
        }
        self.completed_at = Some(at);
        true
    }

    pub fn is_owned_by(&self, owner_id: &str) -> bool {
        self.owner_id == owner_id
    }
}
