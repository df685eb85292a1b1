//! Application state module
//!
//! Defines shared state accessible across all request handlers, and wires the
//! stores, object storage, detector and notifier together.

use std::sync::Arc;

use birdtag_core::{DetectorConfig, DetectorHandle, HttpDetectorConfig};

use crate::config::Config;
use crate::detection::DetectionService;
use crate::ingest::Ingestor;
use crate::jobs::JobTracker;
use crate::notify::{
    self, EventSender, MemoryTransport, NotificationTransport, Notifier, WebhookConfig,
    WebhookTransport,
};
use crate::objects::{self, MemoryObjectStore, ObjectStore, Presigner};
use crate::query::QueryExecutor;
use crate::store::Stores;

/// Errors raised while building the application state.
#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error(transparent)]
    Store(#[from] crate::store::StoreError),

    #[error(transparent)]
    Objects(#[from] crate::objects::ObjectError),

    #[error(transparent)]
    Presign(#[from] crate::objects::PresignError),

    #[error(transparent)]
    Notify(#[from] crate::notify::NotifyError),
}

/// Application state containing shared resources.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub stores: Stores,
    pub objects: Arc<dyn ObjectStore>,
    pub presigner: Arc<Presigner>,
    pub detector: Arc<DetectorHandle>,
    pub transport: Arc<dyn NotificationTransport>,
    /// Mutation events to the notifier task
    pub events: EventSender,
    pub jobs: Arc<JobTracker>,
    pub ingest: Arc<Ingestor>,
    pub queries: Arc<QueryExecutor>,
}

impl AppState {
    /// Build every backend from configuration.
    pub async fn from_config(config: &Config) -> Result<Self, StartupError> {
        let stores =
            Stores::connect(config.database_url.as_deref(), config.database_max_connections).await?;
        let objects = objects::open(config.object_store_dir.as_deref()).await?;

        let detector_config = match &config.detector_url {
            Some(url) => {
                let mut http = HttpDetectorConfig::new(url.clone());
                http.timeout = config.detector_timeout();
                DetectorConfig::Http(http)
            }
            None => DetectorConfig::Auto,
        };

        let transport: Arc<dyn NotificationTransport> = match &config.notify_webhook_url {
            Some(url) => {
                tracing::info!("Using webhook notification transport");
                Arc::new(WebhookTransport::new(WebhookConfig::new(url.clone()))?)
            }
            None => {
                tracing::warn!("NOTIFY_WEBHOOK_URL not set, notifications are kept in memory");
                Arc::new(MemoryTransport::new())
            }
        };

        Self::assemble(
            config.clone(),
            stores,
            objects,
            DetectorHandle::new(detector_config),
            transport,
        )
    }

    /// In-memory state around the given detector and transport (tests, development).
    pub fn in_memory(
        config: Config,
        detector: DetectorHandle,
        transport: Arc<dyn NotificationTransport>,
    ) -> Result<Self, StartupError> {
        Self::assemble(
            config,
            Stores::in_memory(),
            Arc::new(MemoryObjectStore::new()),
            detector,
            transport,
        )
    }

    /// Wire the components together. Starts the notifier task, so it must run
    /// inside a Tokio runtime.
    pub fn assemble(
        config: Config,
        stores: Stores,
        objects: Arc<dyn ObjectStore>,
        detector: DetectorHandle,
        transport: Arc<dyn NotificationTransport>,
    ) -> Result<Self, StartupError> {
        let presigner = Arc::new(Presigner::new(
            &config.public_base_url,
            config.presign_secret.as_bytes(),
            config.presign_expiry(),
        )?);
        let detector = Arc::new(detector);
        let detection = Arc::new(DetectionService::new(
            objects.clone(),
            detector.clone(),
            config.confidence_threshold,
        ));

        let notifier = Notifier::new(
            stores.subscriptions.clone(),
            transport.clone(),
            config.notify_topic.clone(),
            config.scan_page_size,
        );
        let events = notify::spawn(Arc::new(notifier));

        let jobs = Arc::new(JobTracker::new(
            stores.jobs.clone(),
            stores.catalog.clone(),
            objects.clone(),
            detection.clone(),
            presigner.clone(),
            config.scan_page_size,
        ));
        let ingest = Arc::new(Ingestor::new(
            stores.catalog.clone(),
            detection,
            jobs.clone(),
            presigner.clone(),
            events.clone(),
        ));
        let queries = Arc::new(QueryExecutor::new(
            stores.catalog.clone(),
            presigner.clone(),
            config.scan_page_size,
        ));

        tracing::info!(
            storage = stores.kind.as_str(),
            objects = objects.name(),
            transport = transport.name(),
            "Application state ready"
        );

        Ok(Self {
            config: Arc::new(config),
            stores,
            objects,
            presigner,
            detector,
            transport,
            events,
            jobs,
            ingest,
            queries,
        })
    }
}
