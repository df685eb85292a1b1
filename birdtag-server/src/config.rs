//! Server configuration module
//!
//! Handles loading configuration from environment variables with sensible defaults.

use std::net::SocketAddr;
use std::time::Duration;

use birdtag_core::DEFAULT_CONFIDENCE;

/// Server configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    /// Server port (default: 3000)
    pub port: u16,
    /// Server host (default: 127.0.0.1)
    pub host: [u8; 4],
    /// Allowed CORS origins, comma-separated (default: allow all in dev)
    pub allowed_origins: Option<Vec<String>>,
    /// Request body limit in MB, also the per-upload limit (default: 50)
    pub body_limit_mb: usize,
    /// Request timeout in seconds (default: 30)
    pub timeout_secs: u64,
    /// Enable rate limiting (default: false for tests, true when loaded from env)
    pub rate_limit_enabled: bool,
    /// Rate limit: requests per second (default: 10)
    pub rate_limit_per_sec: u64,
    /// Rate limit: burst size (default: 20)
    pub rate_limit_burst: u32,
    /// PostgreSQL URL; in-memory storage when unset
    pub database_url: Option<String>,
    /// Database connection pool maximum connections (default: 20)
    pub database_max_connections: u32,
    /// Object store directory; in-memory objects when unset
    pub object_store_dir: Option<String>,
    /// Public base URL used in object and presigned URLs
    pub public_base_url: String,
    /// Secret used to sign retrieval URLs
    pub presign_secret: String,
    /// Lifetime of presigned URLs in seconds (default: 3600)
    pub presign_expiry_secs: u64,
    /// Inference service URL; mock detector when unset
    pub detector_url: Option<String>,
    /// Inference request timeout in seconds (default: 120)
    pub detector_timeout_secs: u64,
    /// Minimum detection confidence (default: 0.3)
    pub confidence_threshold: f32,
    /// Webhook receiving notifications; in-memory transport when unset
    pub notify_webhook_url: Option<String>,
    /// Notification topic name
    pub notify_topic: String,
    /// Records per page for catalog and subscription scans (default: 100)
    pub scan_page_size: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 3000,
            host: [127, 0, 0, 1],
            allowed_origins: None, // None = allow all (dev mode)
            body_limit_mb: 50,
            timeout_secs: 30,
            rate_limit_enabled: false, // Disabled by default (for tests)
            rate_limit_per_sec: 10,
            rate_limit_burst: 20,
            database_url: None,
            database_max_connections: 20,
            object_store_dir: None,
            public_base_url: "http://localhost:3000".to_string(),
            presign_secret: "birdtag-dev-secret".to_string(),
            presign_expiry_secs: 3600,
            detector_url: None,
            detector_timeout_secs: 120,
            confidence_threshold: DEFAULT_CONFIDENCE,
            notify_webhook_url: None,
            notify_topic: crate::notify::DEFAULT_TOPIC.to_string(),
            scan_page_size: 100,
        }
    }
}

fn env_parse<T: std::str::FromStr>(name: &str, default: T) -> T {
    std::env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_non_empty(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let host = std::env::var("HOST")
            .ok()
            .map(|h| {
                if h == "0.0.0.0" {
                    [0, 0, 0, 0]
                } else {
                    [127, 0, 0, 1]
                }
            })
            .unwrap_or([127, 0, 0, 1]);
        let port = env_parse("PORT", defaults.port);

        let allowed_origins = std::env::var("ALLOWED_ORIGINS").ok().map(|origins| {
            origins
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect()
        });

        // Rate limiting enabled by default in production, can be disabled with RATE_LIMIT_ENABLED=false
        let rate_limit_enabled = std::env::var("RATE_LIMIT_ENABLED")
            .map(|v| v.to_lowercase() != "false")
            .unwrap_or(true);

        let public_base_url =
            env_non_empty("PUBLIC_BASE_URL").unwrap_or_else(|| format!("http://localhost:{port}"));

        let presign_secret = env_non_empty("PRESIGN_SECRET").unwrap_or_else(|| {
            tracing::warn!("PRESIGN_SECRET not set, using a random secret - presigned URLs will not survive a restart");
            uuid::Uuid::new_v4().simple().to_string()
        });

        let confidence_threshold = env_parse("CONFIDENCE_THRESHOLD", defaults.confidence_threshold)
            .clamp(0.0, 1.0);

        Self {
            port,
            host,
            allowed_origins,
            body_limit_mb: env_parse("BODY_LIMIT_MB", defaults.body_limit_mb),
            timeout_secs: env_parse("REQUEST_TIMEOUT_SECS", defaults.timeout_secs),
            rate_limit_enabled,
            rate_limit_per_sec: env_parse("RATE_LIMIT_PER_SEC", defaults.rate_limit_per_sec),
            rate_limit_burst: env_parse("RATE_LIMIT_BURST", defaults.rate_limit_burst),
            database_url: env_non_empty("DATABASE_URL"),
            database_max_connections: env_parse(
                "DATABASE_MAX_CONNECTIONS",
                defaults.database_max_connections,
            ),
            object_store_dir: env_non_empty("OBJECT_STORE_DIR"),
            public_base_url,
            presign_secret,
            presign_expiry_secs: env_parse("PRESIGN_EXPIRY_SECS", defaults.presign_expiry_secs),
            detector_url: env_non_empty("DETECTOR_URL"),
            detector_timeout_secs: env_parse("DETECTOR_TIMEOUT_SECS", defaults.detector_timeout_secs),
            confidence_threshold,
            notify_webhook_url: env_non_empty("NOTIFY_WEBHOOK_URL"),
            notify_topic: env_non_empty("NOTIFY_TOPIC").unwrap_or(defaults.notify_topic),
            scan_page_size: env_parse("SCAN_PAGE_SIZE", defaults.scan_page_size).max(1),
        }
    }

    /// Get socket address from config
    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::from((self.host, self.port))
    }

    /// Maximum accepted upload size in bytes
    pub fn max_upload_bytes(&self) -> usize {
        self.body_limit_mb * 1024 * 1024
    }

    pub fn presign_expiry(&self) -> Duration {
        Duration::from_secs(self.presign_expiry_secs)
    }

    pub fn detector_timeout(&self) -> Duration {
        Duration::from_secs(self.detector_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.port, 3000);
        assert!(config.database_url.is_none());
        assert!(!config.rate_limit_enabled);
        assert_eq!(config.presign_expiry(), Duration::from_secs(3600));
        assert!((config.confidence_threshold - 0.3).abs() < f32::EPSILON);
    }

    #[test]
    fn test_socket_addr() {
        let config = Config {
            port: 8080,
            ..Config::default()
        };
        assert_eq!(config.socket_addr().to_string(), "127.0.0.1:8080");
    }

    #[test]
    fn test_max_upload_bytes() {
        let config = Config {
            body_limit_mb: 2,
            ..Config::default()
        };
        assert_eq!(config.max_upload_bytes(), 2 * 1024 * 1024);
    }
}
