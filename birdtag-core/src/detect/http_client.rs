//! HTTP client for a remote inference service.
//!
//! The media file is posted as the request body to
//! `<endpoint>?media=<image|video|audio>`; the service answers with a JSON
//! [`RawDetections`] document.

use std::path::Path;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest::Client;
use tracing::{debug, info, instrument, warn};

use super::{Detector, RawDetections};
use crate::error::{BirdtagError, Result};
use crate::media::FileType;

/// Default timeout for one inference request.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

/// Configuration for the HTTP detector.
#[derive(Debug, Clone)]
pub struct HttpDetectorConfig {
    /// Inference endpoint URL.
    pub endpoint: String,
    /// Request timeout.
    pub timeout: Duration,
}

impl HttpDetectorConfig {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Read `DETECTOR_URL` and `DETECTOR_TIMEOUT_SECS`.
    ///
    /// Returns `None` when no endpoint is configured.
    pub fn from_env() -> Option<Self> {
        let endpoint = std::env::var("DETECTOR_URL")
            .ok()
            .filter(|s| !s.trim().is_empty())?;
        let timeout = std::env::var("DETECTOR_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_TIMEOUT);
        Some(Self { endpoint, timeout })
    }
}

/// Detector backed by a remote inference service.
pub struct HttpDetector {
    client: Client,
    config: HttpDetectorConfig,
}

impl HttpDetector {
    #[instrument(level = "debug", skip_all, fields(
        endpoint = %config.endpoint,
        timeout_ms = config.timeout.as_millis() as u64
    ))]
    pub fn with_config(config: HttpDetectorConfig) -> Result<Self> {
        debug!("Creating HTTP detector client");

        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| {
                warn!(error = %e, "Failed to create HTTP client");
                BirdtagError::detection(format!("Failed to create HTTP client: {e}"))
            })?;

        info!("HTTP detector client created");
        Ok(Self { client, config })
    }
}

#[async_trait]
impl Detector for HttpDetector {
    #[instrument(level = "info", skip(self), fields(detector = "http", media = %file_type))]
    async fn detect(&self, path: &Path, file_type: FileType) -> Result<RawDetections> {
        let start = Instant::now();

        let body = tokio::fs::read(path).await.map_err(|e| {
            BirdtagError::detection(format!("unreadable media {}: {e}", path.display()))
        })?;

        let response = self
            .client
            .post(&self.config.endpoint)
            .query(&[("media", file_type.as_str())])
            .header(CONTENT_TYPE, "application/octet-stream")
            .body(body)
            .send()
            .await
            .map_err(|e| {
                warn!(
                    error = %e,
                    latency_ms = start.elapsed().as_millis() as u64,
                    "Inference request failed"
                );
                BirdtagError::detection(format!("inference request failed: {e}"))
            })?;

        let status = response.status();
        if !status.is_success() {
            warn!(status = %status, "Inference service returned error status");
            return Err(BirdtagError::detection(format!(
                "inference service returned status: {status}"
            )));
        }

        let raw: RawDetections = response.json().await.map_err(|e| {
            warn!(error = %e, "Failed to parse inference response");
            BirdtagError::detection(format!("invalid inference response: {e}"))
        })?;

        debug!(
            latency_ms = start.elapsed().as_millis() as u64,
            "Inference completed"
        );
        Ok(raw)
    }

    fn name(&self) -> &'static str {
        "http"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_new_uses_default_timeout() {
        let config = HttpDetectorConfig::new("http://localhost:9000/detect");
        assert_eq!(config.timeout, DEFAULT_TIMEOUT);
    }

    #[test]
    fn test_client_creation() {
        let detector = HttpDetector::with_config(HttpDetectorConfig::new("http://localhost:9000"));
        assert!(detector.is_ok());
    }

    #[tokio::test]
    async fn test_unreachable_service_is_detection_failure() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        std::io::Write::write_all(&mut file, b"fake").unwrap();

        let detector = HttpDetector::with_config(HttpDetectorConfig {
            endpoint: "http://127.0.0.1:1/detect".into(),
            timeout: Duration::from_secs(2),
        })
        .unwrap();
        let err = detector
            .detect(file.path(), FileType::Image)
            .await
            .unwrap_err();
        assert!(matches!(err, BirdtagError::DetectionFailure(_)));
    }
}
