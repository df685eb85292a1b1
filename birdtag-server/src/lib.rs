//! BirdTag Server Library - REST API components for species tagging and tag search
//!
//! This library exposes the server components for use in integration tests.
//! The main binary uses these same components.

pub mod config;
pub mod detection;
pub mod error;
pub mod handlers;
pub mod ingest;
pub mod jobs;
pub mod multipart;
pub mod notify;
pub mod objects;
pub mod openapi;
pub mod query;
pub mod routes;
pub mod state;
pub mod store;
pub mod validation;

pub use config::Config;
pub use error::ApiError;
pub use ingest::{Ingestor, Routed};
pub use jobs::JobTracker;
pub use notify::{
    EventSender, MemoryTransport, Notification, NotificationTransport, Notifier, NotifyError,
    WebhookConfig, WebhookTransport,
};
pub use objects::{FsObjectStore, MemoryObjectStore, ObjectError, ObjectStore, Presigner};
pub use openapi::ApiDoc;
pub use query::QueryExecutor;
pub use routes::{create_router, create_router_with_config};
pub use state::{AppState, StartupError};
pub use store::{Catalog, JobStore, Page, PageToken, StoreError, Stores, SubscriptionStore};
