//! Content-search job tracker.
//!
//! A probe upload at `tmp/<owner>/<job_id><ext>` drives one job:
//!
//! 1. the PROCESSING record is written before anything else, so pollers see
//!    the job while detection runs;
//! 2. the probe is classified and run through the detector;
//! 3. the discovered tags become a threshold query over the querier's own
//!    catalog items;
//! 4. the terminal record (status, tags, results) is written in one update;
//! 5. the probe object is deleted.
//!
//! A redelivered event re-derives the same job id. If the job is already
//! terminal the event is skipped; otherwise the run repeats and, being
//! deterministic, produces the same record.

use std::sync::Arc;

use birdtag_core::{
    completed_outcome, BirdtagError, JobOutcome, JobStatus, MediaItem, ObjectKey, SearchJob,
    TagMap, TagQuery, UrlResolver,
};
use chrono::Utc;
use tracing::{info, instrument, warn};

use crate::detection::DetectionService;
use crate::error::ApiError;
use crate::objects::ObjectStore;
use crate::store::{collect_pages, Catalog, JobStore, StoreError};

/// Message stored on a FAILED job. Pollers see it, so internals stay out.
fn failure_message(e: BirdtagError) -> String {
    match e {
        BirdtagError::Validation(_) | BirdtagError::UnsupportedMediaType(_) => e.to_string(),
        other => ApiError::from(other).client_message(),
    }
}

pub struct JobTracker {
    jobs: Arc<dyn JobStore>,
    catalog: Arc<dyn Catalog>,
    objects: Arc<dyn ObjectStore>,
    detection: Arc<DetectionService>,
    resolver: Arc<dyn UrlResolver>,
    page_size: usize,
}

impl JobTracker {
    pub fn new(
        jobs: Arc<dyn JobStore>,
        catalog: Arc<dyn Catalog>,
        objects: Arc<dyn ObjectStore>,
        detection: Arc<DetectionService>,
        resolver: Arc<dyn UrlResolver>,
        page_size: usize,
    ) -> Self {
        Self {
            jobs,
            catalog,
            objects,
            detection,
            resolver,
            page_size: page_size.max(1),
        }
    }

    /// Run the job for one probe object and return its final status.
    ///
    /// Only failures to write the job record propagate; everything else ends
    /// the job as FAILED.
    #[instrument(level = "info", skip_all, fields(job_id = %probe.id, owner_id = %probe.owner_id))]
    pub async fn run(&self, probe: &ObjectKey) -> Result<JobStatus, StoreError> {
        let source_key = probe.key();
        let job = SearchJob::processing(&probe.id, &probe.owner_id, &source_key, Utc::now());
        let stored = self.jobs.begin(&job).await?;
        if stored.status.is_terminal() {
            info!(status = %stored.status, "Job already finished, skipping redelivered event");
            return Ok(stored.status);
        }

        let outcome = match self.search(probe).await {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!(error = %e, "Content search failed");
                JobOutcome::Failed {
                    error: failure_message(e),
                }
            }
        };
        let status = outcome.status();

        if self.jobs.finish(&probe.id, outcome, Utc::now()).await? {
            info!(status = %status, "Job finished");
        } else {
            info!("Job finished concurrently by another delivery");
        }

        if let Err(e) = self.objects.delete(&source_key).await {
            warn!(key = %source_key, error = %e, "Failed to delete search probe");
        }

        Ok(self
            .jobs
            .get(&probe.id)
            .await?
            .map(|job| job.status)
            .unwrap_or(status))
    }

    async fn search(&self, probe: &ObjectKey) -> birdtag_core::Result<JobOutcome> {
        let file_type = probe.file_type()?;
        let discovered = self.detection.detect_object(&probe.key(), file_type).await?;
        if discovered.is_empty() {
            return Ok(JobOutcome::Completed {
                discovered_tags: TagMap::new(),
                results: Vec::new(),
            });
        }

        let query = TagQuery::from(&discovered);
        let owned = self
            .owned_items(&probe.owner_id)
            .await
            .map_err(|e| BirdtagError::storage(e.to_string()))?;
        let matched: Vec<&MediaItem> = owned
            .iter()
            .filter(|item| query.matches(&item.tags))
            .collect();

        info!(
            discovered = discovered.len(),
            candidates = owned.len(),
            matched = matched.len(),
            "Probe matched against catalog"
        );
        Ok(completed_outcome(matched, discovered, self.resolver.as_ref()))
    }

    async fn owned_items(&self, owner_id: &str) -> Result<Vec<MediaItem>, StoreError> {
        let catalog = &self.catalog;
        let page_size = self.page_size;
        collect_pages(move |token| async move {
            catalog.owner_page(owner_id, token.as_ref(), page_size).await
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::objects::{MemoryObjectStore, Presigner};
    use crate::store::{MemoryCatalog, MemoryJobStore};
    use birdtag_core::{
        Detection, DetectorHandle, FileType, MockDetector, RawDetections,
    };
    use std::time::Duration;

    struct Fixture {
        tracker: JobTracker,
        jobs: Arc<MemoryJobStore>,
        catalog: Arc<MemoryCatalog>,
        objects: Arc<MemoryObjectStore>,
        detector: Arc<MockDetector>,
    }

    fn fixture(detector: MockDetector) -> Fixture {
        let jobs = Arc::new(MemoryJobStore::new());
        let catalog = Arc::new(MemoryCatalog::new());
        let objects = Arc::new(MemoryObjectStore::new());
        let detector = Arc::new(detector);
        let handle = Arc::new(DetectorHandle::from_detector(detector.clone()));
        let detection = Arc::new(DetectionService::new(objects.clone(), handle, 0.3));
        let resolver = Arc::new(
            Presigner::new("http://localhost:3000", "secret", Duration::from_secs(60)).unwrap(),
        );
        let tracker = JobTracker::new(
            jobs.clone(),
            catalog.clone(),
            objects.clone(),
            detection,
            resolver,
            2,
        );
        Fixture {
            tracker,
            jobs,
            catalog,
            objects,
            detector,
        }
    }

    fn pelicans(n: usize) -> RawDetections {
        RawDetections::Image {
            detections: (0..n)
                .map(|_| Detection {
                    label: "pelican".into(),
                    confidence: 0.9,
                    tracker_id: None,
                })
                .collect(),
        }
    }

    async fn put_item(catalog: &MemoryCatalog, id: &str, owner: &str, tags: &[(&str, u32)]) {
        let item = MediaItem::new(id, owner, FileType::Image, &format!("users/{owner}/raw/{id}.jpg"))
            .with_tags(tags.iter().copied().collect());
        catalog.put(&item).await.unwrap();
    }

    #[tokio::test]
    async fn test_probe_matches_owner_items() {
        let f = fixture(MockDetector::scripted(pelicans(2)));
        put_item(&f.catalog, "a", "u1", &[("pelican", 3), ("duck", 1)]).await;
        put_item(&f.catalog, "b", "u1", &[("pelican", 1)]).await;
        put_item(&f.catalog, "c", "u2", &[("pelican", 5)]).await;

        let probe = ObjectKey::probe("u1", "job1", ".jpg").unwrap();
        f.objects.put(&probe.key(), b"probe".to_vec()).await.unwrap();

        let status = f.tracker.run(&probe).await.unwrap();
        assert_eq!(status, JobStatus::Completed);

        let job = f.jobs.get("job1").await.unwrap().unwrap();
        assert_eq!(job.discovered_tags.get("pelican"), 2);
        let ids: Vec<&str> = job.results.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["a"]);
        assert!(job.results[0].display_url.is_some());
        assert!(!f.objects.contains(&probe.key()));
    }

    #[tokio::test]
    async fn test_unsupported_probe_fails_job() {
        let f = fixture(MockDetector::scripted(pelicans(1)));
        let probe = ObjectKey::probe("u1", "job2", ".gif").unwrap();
        f.objects.put(&probe.key(), b"gif".to_vec()).await.unwrap();

        assert_eq!(f.tracker.run(&probe).await.unwrap(), JobStatus::Failed);
        assert_eq!(f.detector.calls(), 0);
        let job = f.jobs.get("job2").await.unwrap().unwrap();
        assert_eq!(job.error.as_deref(), Some("Unsupported media type: job2.gif"));
    }

    #[tokio::test]
    async fn test_detection_failure_fails_job() {
        let f = fixture(MockDetector::failing("model crashed"));
        let probe = ObjectKey::probe("u1", "job3", ".wav").unwrap();
        f.objects.put(&probe.key(), b"wav".to_vec()).await.unwrap();

        assert_eq!(f.tracker.run(&probe).await.unwrap(), JobStatus::Failed);
        let job = f.jobs.get("job3").await.unwrap().unwrap();
        let error = job.error.unwrap();
        assert_eq!(error, "Detection service unavailable");
        assert!(!error.contains("model crashed"));
    }

    #[test]
    fn test_failure_message_hides_internals() {
        assert_eq!(
            failure_message(BirdtagError::storage("connection refused to 10.0.0.5")),
            "Internal server error"
        );
        assert_eq!(
            failure_message(BirdtagError::validation("probe is empty")),
            "Validation error: probe is empty"
        );
    }

    #[tokio::test]
    async fn test_empty_detection_completes_empty() {
        let f = fixture(MockDetector::scripted(pelicans(0)));
        put_item(&f.catalog, "a", "u1", &[("pelican", 3)]).await;
        let probe = ObjectKey::probe("u1", "job4", ".png").unwrap();
        f.objects.put(&probe.key(), b"png".to_vec()).await.unwrap();

        assert_eq!(f.tracker.run(&probe).await.unwrap(), JobStatus::Completed);
        let job = f.jobs.get("job4").await.unwrap().unwrap();
        assert!(job.results.is_empty());
        assert!(job.discovered_tags.is_empty());
    }

    #[tokio::test]
    async fn test_redelivery_after_completion_is_skipped() {
        let f = fixture(MockDetector::scripted(pelicans(1)));
        put_item(&f.catalog, "a", "u1", &[("pelican", 1)]).await;
        let probe = ObjectKey::probe("u1", "job5", ".jpg").unwrap();
        f.objects.put(&probe.key(), b"probe".to_vec()).await.unwrap();

        f.tracker.run(&probe).await.unwrap();
        let first = f.jobs.get("job5").await.unwrap().unwrap();

        assert_eq!(f.tracker.run(&probe).await.unwrap(), JobStatus::Completed);
        assert_eq!(f.detector.calls(), 1);
        assert_eq!(f.jobs.get("job5").await.unwrap().unwrap(), first);
    }
}
