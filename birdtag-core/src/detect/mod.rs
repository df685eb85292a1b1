//! Species detection.
//!
//! The inference engine is an external collaborator behind the [`Detector`]
//! trait. It returns raw per-media output which [`normalize`] turns into the
//! canonical species count map.
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::path::Path;
//! use birdtag_core::detect::{detect_species, DetectorConfig, DetectorHandle};
//! use birdtag_core::FileType;
//!
//! # async fn example() -> birdtag_core::Result<()> {
//! let handle = DetectorHandle::new(DetectorConfig::Auto);
//! let detector = handle.acquire().await?;
//! let tags = detect_species(detector.as_ref(), Path::new("/tmp/bird.jpg"), FileType::Image, 0.3).await?;
//! println!("{tags:?}");
//! # Ok(())
//! # }
//! ```

#[cfg(feature = "network")]
mod http_client;
#[cfg(feature = "network")]
mod mock;
pub mod normalize;

#[cfg(feature = "network")]
pub use http_client::{HttpDetector, HttpDetectorConfig};
#[cfg(feature = "network")]
pub use mock::MockDetector;
pub use normalize::{normalize, DEFAULT_CONFIDENCE};

use serde::{Deserialize, Serialize};

use crate::media::FileType;

/// One detected individual.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    pub label: String,
    pub confidence: f32,
    /// Tracker identity, present for tracked video detections.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tracker_id: Option<u64>,
}

/// Detections for one video frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameDetections {
    #[serde(default)]
    pub index: u64,
    #[serde(default)]
    pub detections: Vec<Detection>,
}

/// Raw detector output for one media asset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "media", rename_all = "lowercase")]
pub enum RawDetections {
    Image {
        #[serde(default)]
        detections: Vec<Detection>,
    },
    Video {
        #[serde(default)]
        frames: Vec<FrameDetections>,
    },
    Audio {
        #[serde(default)]
        detections: Vec<Detection>,
    },
}

impl RawDetections {
    pub fn file_type(&self) -> FileType {
        match self {
            Self::Image { .. } => FileType::Image,
            Self::Video { .. } => FileType::Video,
            Self::Audio { .. } => FileType::Audio,
        }
    }

    /// Output with no detections for the given media kind.
    pub fn empty(file_type: FileType) -> Self {
        match file_type {
            FileType::Image => Self::Image { detections: vec![] },
            FileType::Video => Self::Video { frames: vec![] },
            FileType::Audio => Self::Audio { detections: vec![] },
        }
    }
}

#[cfg(feature = "network")]
pub use network::*;

#[cfg(feature = "network")]
mod network {
    use std::path::Path;
    use std::sync::Arc;

    use async_trait::async_trait;
    use tokio::sync::OnceCell;
    use tracing::{info, instrument, warn};

    use super::{normalize, HttpDetector, HttpDetectorConfig, MockDetector, RawDetections};
    use crate::error::{BirdtagError, Result};
    use crate::media::FileType;
    use crate::tags::TagMap;

    /// Inference engine seam.
    ///
    /// Implementations must be thread-safe (`Send + Sync`). One call runs one
    /// inference; there is no internal retry.
    #[async_trait]
    pub trait Detector: Send + Sync {
        /// Run detection over a local media file.
        async fn detect(&self, path: &Path, file_type: FileType) -> Result<RawDetections>;

        /// Identifier used in logs.
        fn name(&self) -> &'static str;
    }

    /// Run the detector and normalize its output.
    ///
    /// Output for a different media kind than requested is a detection failure.
    #[instrument(level = "debug", skip(detector), fields(detector_name = detector.name()))]
    pub async fn detect_species(
        detector: &dyn Detector,
        path: &Path,
        file_type: FileType,
        threshold: f32,
    ) -> Result<TagMap> {
        let raw = detector.detect(path, file_type).await?;
        if raw.file_type() != file_type {
            return Err(BirdtagError::detection(format!(
                "detector returned {} output for {} media",
                raw.file_type(),
                file_type
            )));
        }
        Ok(normalize(&raw, threshold))
    }

    /// Configuration for creating detectors.
    #[derive(Debug, Clone, Default)]
    pub enum DetectorConfig {
        /// Remote inference service
        Http(HttpDetectorConfig),
        /// Mock detector (testing and local development)
        Mock,
        /// HTTP detector if `DETECTOR_URL` is set, mock otherwise
        #[default]
        Auto,
    }

    /// Factory for creating detectors.
    pub struct DetectorFactory;

    impl DetectorFactory {
        pub fn create(config: DetectorConfig) -> Result<Arc<dyn Detector>> {
            match config {
                DetectorConfig::Http(http_config) => {
                    let detector = HttpDetector::with_config(http_config)?;
                    Ok(Arc::new(detector))
                }
                DetectorConfig::Mock => Ok(Arc::new(MockDetector::new())),
                DetectorConfig::Auto => Self::create_auto(),
            }
        }

        fn create_auto() -> Result<Arc<dyn Detector>> {
            if let Some(http_config) = HttpDetectorConfig::from_env() {
                info!(endpoint = %http_config.endpoint, "Auto-selected HTTP detector");
                return Self::create(DetectorConfig::Http(http_config));
            }

            warn!("DETECTOR_URL not set, using mock detector");
            Self::create(DetectorConfig::Mock)
        }
    }

    /// Shared, lazily built detector.
    ///
    /// The detector is constructed on the first [`acquire`](Self::acquire) and
    /// reused by every later caller.
    pub struct DetectorHandle {
        config: DetectorConfig,
        cell: OnceCell<Arc<dyn Detector>>,
    }

    impl DetectorHandle {
        pub fn new(config: DetectorConfig) -> Self {
            Self {
                config,
                cell: OnceCell::new(),
            }
        }

        /// Handle wrapping an already built detector.
        pub fn from_detector(detector: Arc<dyn Detector>) -> Self {
            Self {
                config: DetectorConfig::Mock,
                cell: OnceCell::from(detector),
            }
        }

        pub async fn acquire(&self) -> Result<Arc<dyn Detector>> {
            self.cell
                .get_or_try_init(|| async { DetectorFactory::create(self.config.clone()) })
                .await
                .cloned()
        }

        pub fn is_initialized(&self) -> bool {
            self.cell.initialized()
        }
    }

    impl std::fmt::Debug for DetectorHandle {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            f.debug_struct("DetectorHandle")
                .field("config", &self.config)
                .field("initialized", &self.is_initialized())
                .finish()
        }
    }
}

#[cfg(all(test, feature = "network"))]
mod tests {
    use std::path::Path;
    use std::sync::Arc;

    use super::*;
    use crate::error::BirdtagError;

    #[test]
    fn test_raw_detections_json_shape() {
        let raw: RawDetections = serde_json::from_str(
            r#"{"media":"video","frames":[{"index":0,"detections":[{"label":"crow","confidence":0.9,"tracker_id":3}]}]}"#,
        )
        .unwrap();
        assert_eq!(raw.file_type(), FileType::Video);
    }

    #[tokio::test]
    async fn test_detect_species_rejects_mismatched_media() {
        let detector = MockDetector::scripted(RawDetections::empty(FileType::Audio));
        let err = detect_species(&detector, Path::new("x.jpg"), FileType::Image, 0.3)
            .await
            .unwrap_err();
        assert!(matches!(err, BirdtagError::DetectionFailure(_)));
    }

    #[tokio::test]
    async fn test_handle_builds_once() {
        let handle = DetectorHandle::new(DetectorConfig::Mock);
        assert!(!handle.is_initialized());
        let a = handle.acquire().await.unwrap();
        let b = handle.acquire().await.unwrap();
        assert!(handle.is_initialized());
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[tokio::test]
    async fn test_handle_from_detector() {
        let detector: Arc<dyn Detector> = Arc::new(MockDetector::failing("boom"));
        let handle = DetectorHandle::from_detector(detector.clone());
        let acquired = handle.acquire().await.unwrap();
        assert!(Arc::ptr_eq(&acquired, &detector));
    }
}
