//! Object-created event routing and the catalog tagging pipeline.
//!
//! Each created object is handled as an independent activation:
//!
//! - `users/<owner>/raw/<id><ext>`: detect species and upsert the catalog item
//! - `users/<owner>/thumbnail/<id><ext>`: attach the thumbnail to its item
//! - `tmp/<owner>/<job_id><ext>`: run the content-search job
//!
//! Malformed keys and unsupported media types are skipped with a log line.

use std::sync::Arc;

use birdtag_core::{
    CatalogEvent, JobStatus, KeyKind, MediaItem, MutationKind, ObjectKey, TagMap,
};
use tokio::task::JoinHandle;
use tracing::{info, instrument, warn};

use crate::detection::DetectionService;
use crate::jobs::JobTracker;
use crate::notify::EventSender;
use crate::objects::Presigner;
use crate::store::{Catalog, StoreError};

/// What an object-created event led to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Routed {
    Tagged { item_id: String, kind: MutationKind },
    Thumbnail { item_id: String },
    Searched { job_id: String, status: JobStatus },
    Skipped { reason: String },
}

pub struct Ingestor {
    catalog: Arc<dyn Catalog>,
    detection: Arc<DetectionService>,
    jobs: Arc<JobTracker>,
    presigner: Arc<Presigner>,
    events: EventSender,
}

impl Ingestor {
    pub fn new(
        catalog: Arc<dyn Catalog>,
        detection: Arc<DetectionService>,
        jobs: Arc<JobTracker>,
        presigner: Arc<Presigner>,
        events: EventSender,
    ) -> Self {
        Self {
            catalog,
            detection,
            jobs,
            presigner,
            events,
        }
    }

    /// Handle one created object.
    #[instrument(level = "info", skip(self))]
    pub async fn handle(&self, key: &str) -> Result<Routed, StoreError> {
        let object = match ObjectKey::parse(key) {
            Ok(object) => object,
            Err(e) => {
                info!(error = %e, "Skipping object with unrecognized key");
                return Ok(Routed::Skipped {
                    reason: e.to_string(),
                });
            }
        };

        match object.kind {
            KeyKind::Upload => self.tag_upload(&object).await,
            KeyKind::Thumbnail => self.attach_thumbnail(&object).await,
            KeyKind::Probe => {
                let status = self.jobs.run(&object).await?;
                Ok(Routed::Searched {
                    job_id: object.id,
                    status,
                })
            }
        }
    }

    /// Handle a created object on its own task.
    pub fn spawn(self: &Arc<Self>, key: String) -> JoinHandle<()> {
        let ingestor = Arc::clone(self);
        tokio::spawn(async move {
            if let Err(e) = ingestor.handle(&key).await {
                warn!(key = %key, error = %e, "Object-created event failed");
            }
        })
    }

    async fn tag_upload(&self, object: &ObjectKey) -> Result<Routed, StoreError> {
        let file_type = match object.file_type() {
            Ok(file_type) => file_type,
            Err(e) => {
                info!(error = %e, "Skipping upload with unsupported media type");
                return Ok(Routed::Skipped {
                    reason: e.to_string(),
                });
            }
        };

        let key = object.key();
        let tags = match self.detection.detect_object(&key, file_type).await {
            Ok(tags) => tags,
            Err(e) => {
                warn!(item_id = %object.id, error = %e, "Detection failed, storing item without tags");
                TagMap::new()
            }
        };

        let item = MediaItem::new(
            &object.id,
            &object.owner_id,
            file_type,
            &self.presigner.object_url(&key),
        )
        .with_tags(tags);

        // The store keeps a thumbnail attached before or during detection.
        let previous = self.catalog.put(&item).await?;
        let event = if previous.is_some() {
            CatalogEvent::updated(&item)
        } else {
            CatalogEvent::created(&item)
        };
        let kind = event.kind;
        self.events.emit(event);

        info!(item_id = %item.id, species = item.tags.len(), kind = ?kind, "Catalog item tagged");
        Ok(Routed::Tagged {
            item_id: item.id,
            kind,
        })
    }

    async fn attach_thumbnail(&self, object: &ObjectKey) -> Result<Routed, StoreError> {
        let url = self.presigner.object_url(&object.key());
        match self.catalog.set_thumbnail(&object.id, &url).await {
            Ok(_) => Ok(Routed::Thumbnail {
                item_id: object.id.clone(),
            }),
            Err(StoreError::NotFound(_)) => {
                info!(item_id = %object.id, "Thumbnail for unknown item, skipping");
                Ok(Routed::Skipped {
                    reason: format!("no catalog item {}", object.id),
                })
            }
            Err(e) => Err(e),
        }
    }
}
