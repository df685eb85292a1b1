//! Mock detector for testing and local development.

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use tracing::debug;

use super::{Detector, RawDetections};
use crate::error::{BirdtagError, Result};
use crate::media::FileType;

#[derive(Debug, Clone)]
enum Behavior {
    /// Media files carry their own raw detections as JSON.
    FromFile,
    Scripted(RawDetections),
    Failing(String),
}

/// Mock detector.
///
/// The default mock reads the media file and, when its content is a JSON
/// [`RawDetections`] document, returns it. Any other content yields no
/// detections.
/// WARNING: Do not use in production.
#[derive(Debug)]
pub struct MockDetector {
    behavior: Behavior,
    calls: AtomicUsize,
}

impl MockDetector {
    pub fn new() -> Self {
        Self::with_behavior(Behavior::FromFile)
    }

    /// Always return the given output.
    pub fn scripted(raw: RawDetections) -> Self {
        Self::with_behavior(Behavior::Scripted(raw))
    }

    /// Always fail with the given message.
    pub fn failing(message: impl Into<String>) -> Self {
        Self::with_behavior(Behavior::Failing(message.into()))
    }

    fn with_behavior(behavior: Behavior) -> Self {
        Self {
            behavior,
            calls: AtomicUsize::new(0),
        }
    }

    /// Number of `detect` invocations so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Default for MockDetector {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Detector for MockDetector {
    async fn detect(&self, path: &Path, file_type: FileType) -> Result<RawDetections> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.behavior {
            Behavior::Scripted(raw) => Ok(raw.clone()),
            Behavior::Failing(message) => Err(BirdtagError::detection(message.clone())),
            Behavior::FromFile => {
                let bytes = tokio::fs::read(path).await.map_err(|e| {
                    BirdtagError::detection(format!("unreadable media {}: {e}", path.display()))
                })?;
                match serde_json::from_slice::<RawDetections>(&bytes) {
                    Ok(raw) => Ok(raw),
                    Err(_) => {
                        debug!(path = %path.display(), "No embedded detections, returning empty output");
                        Ok(RawDetections::empty(file_type))
                    }
                }
            }
        }
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::Detection;
    use std::io::Write;

    #[tokio::test]
    async fn test_reads_embedded_detections() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        let raw = RawDetections::Image {
            detections: vec![Detection {
                label: "pelican".into(),
                confidence: 0.8,
                tracker_id: None,
            }],
        };
        file.write_all(&serde_json::to_vec(&raw).unwrap()).unwrap();

        let detector = MockDetector::new();
        let out = detector.detect(file.path(), FileType::Image).await.unwrap();
        assert_eq!(out, raw);
        assert_eq!(detector.calls(), 1);
    }

    #[tokio::test]
    async fn test_opaque_media_yields_empty() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(&[0xFF, 0xD8, 0xFF]).unwrap();

        let out = MockDetector::new()
            .detect(file.path(), FileType::Audio)
            .await
            .unwrap();
        assert_eq!(out, RawDetections::empty(FileType::Audio));
    }

    #[tokio::test]
    async fn test_missing_file_is_detection_failure() {
        let err = MockDetector::new()
            .detect(Path::new("/nonexistent/bird.jpg"), FileType::Image)
            .await
            .unwrap_err();
        assert!(matches!(err, BirdtagError::DetectionFailure(_)));
    }

    #[tokio::test]
    async fn test_failing() {
        let detector = MockDetector::failing("model crashed");
        let err = detector
            .detect(Path::new("x"), FileType::Video)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("model crashed"));
    }
}
