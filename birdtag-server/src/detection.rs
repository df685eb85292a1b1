//! Running the detector over stored objects.

use std::sync::Arc;

use birdtag_core::{detect_species, BirdtagError, DetectorHandle, FileType, TagMap};
use tracing::{debug, instrument};

use crate::objects::ObjectStore;

/// Fetches an object to a local temporary file and runs detection on it.
pub struct DetectionService {
    objects: Arc<dyn ObjectStore>,
    detector: Arc<DetectorHandle>,
    threshold: f32,
}

impl DetectionService {
    pub fn new(objects: Arc<dyn ObjectStore>, detector: Arc<DetectorHandle>, threshold: f32) -> Self {
        Self {
            objects,
            detector,
            threshold,
        }
    }

    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    /// Species counts for the object at `key`.
    #[instrument(level = "debug", skip(self))]
    pub async fn detect_object(&self, key: &str, file_type: FileType) -> birdtag_core::Result<TagMap> {
        let data = self
            .objects
            .get(key)
            .await
            .map_err(|e| BirdtagError::storage(e.to_string()))?;

        let suffix = birdtag_core::media::extension_of(key)
            .map(|ext| format!(".{ext}"))
            .unwrap_or_default();
        let local = tempfile::Builder::new()
            .prefix("birdtag-")
            .suffix(&suffix)
            .tempfile()
            .map_err(|e| BirdtagError::storage(format!("failed to create temp file: {e}")))?;

        tokio::fs::write(local.path(), &data)
            .await
            .map_err(|e| BirdtagError::storage(e.to_string()))?;

        let detector = self.detector.acquire().await?;
        let tags = detect_species(detector.as_ref(), local.path(), file_type, self.threshold).await?;
        debug!(species = tags.len(), "Detection finished");
        Ok(tags)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::objects::MemoryObjectStore;
    use birdtag_core::{Detection, MockDetector, RawDetections};

    #[tokio::test]
    async fn test_detects_stored_object() {
        let objects = Arc::new(MemoryObjectStore::new());
        objects
            .put("users/u1/raw/a.jpg", b"jpeg".to_vec())
            .await
            .unwrap();

        let detector = MockDetector::scripted(RawDetections::Image {
            detections: vec![
                Detection {
                    label: "Pelican".into(),
                    confidence: 0.9,
                    tracker_id: None,
                },
                Detection {
                    label: "pelican".into(),
                    confidence: 0.1,
                    tracker_id: None,
                },
            ],
        });
        let handle = Arc::new(DetectorHandle::from_detector(Arc::new(detector)));
        let service = DetectionService::new(objects, handle, 0.3);

        let tags = service
            .detect_object("users/u1/raw/a.jpg", FileType::Image)
            .await
            .unwrap();
        assert_eq!(tags.get("pelican"), 1);
    }

    #[tokio::test]
    async fn test_missing_object_is_storage_failure() {
        let objects = Arc::new(MemoryObjectStore::new());
        let handle = Arc::new(DetectorHandle::from_detector(Arc::new(MockDetector::new())));
        let service = DetectionService::new(objects, handle, 0.3);

        let err = service
            .detect_object("users/u1/raw/missing.jpg", FileType::Image)
            .await
            .unwrap_err();
        assert!(matches!(err, BirdtagError::Storage(_)));
    }
}
