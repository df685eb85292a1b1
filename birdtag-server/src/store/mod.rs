//! Catalog, job and subscription storage.
//!
//! Every store has a PostgreSQL implementation and an in-memory one. The
//! in-memory stores back tests and local development; they lose their data on
//! restart.
//!
//! If `DATABASE_URL` is not set, [`Stores::connect`] falls back to memory.

mod memory;
mod postgres;

pub use memory::{MemoryCatalog, MemoryJobStore, MemorySubscriptionStore};
pub use postgres::{PgCatalog, PgJobStore, PgSubscriptionStore};

use std::sync::Arc;

use async_trait::async_trait;
use base64::engine::general_purpose::URL_SAFE_NO_PAD as BASE64;
use base64::Engine;
use birdtag_core::{JobOutcome, MediaItem, SearchJob, Subscription, TagMap};
use chrono::{DateTime, Utc};
use sqlx::postgres::PgPoolOptions;

/// Storage errors
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Database connection error: {0}")]
    Connection(String),

    #[error("Database migration error: {0}")]
    Migration(String),

    #[error("Query error: {0}")]
    Query(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Record not found: {0}")]
    NotFound(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        Self::Query(e.to_string())
    }
}

impl From<sqlx::migrate::MigrateError> for StoreError {
    fn from(e: sqlx::migrate::MigrateError) -> Self {
        Self::Migration(e.to_string())
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(e: serde_json::Error) -> Self {
        Self::Serialization(e.to_string())
    }
}

/// Opaque continuation token for paginated reads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageToken(String);

impl PageToken {
    /// Token resuming after the record with this key.
    pub fn after(key: &str) -> Self {
        Self(BASE64.encode(key.as_bytes()))
    }

    /// Key of the last record of the previous page.
    pub fn last_key(&self) -> Result<String, StoreError> {
        let bytes = BASE64
            .decode(&self.0)
            .map_err(|e| StoreError::Serialization(format!("invalid page token: {e}")))?;
        String::from_utf8(bytes)
            .map_err(|e| StoreError::Serialization(format!("invalid page token: {e}")))
    }
}

/// One page of a paginated read.
#[derive(Debug, Clone)]
pub struct Page<T> {
    pub items: Vec<T>,
    /// `None` when the read is exhausted.
    pub next: Option<PageToken>,
}

impl<T> Page<T> {
    /// Build a page from up to `limit` records sorted by key.
    ///
    /// A full page carries a token after its last record, even when nothing
    /// follows; the next read then comes back empty.
    pub fn from_sorted(items: Vec<T>, limit: usize, key: impl Fn(&T) -> &str) -> Self {
        let next = if limit > 0 && items.len() >= limit {
            items.last().map(|last| PageToken::after(key(last)))
        } else {
            None
        };
        Self { items, next }
    }
}

/// Catalog of media items. Primary key `id`, secondary index on owner.
#[async_trait]
pub trait Catalog: Send + Sync {
    /// Insert or replace an item, returning the previous record.
    ///
    /// A stored thumbnail URL is kept when `item` carries none; the check and
    /// the write happen in one step.
    async fn put(&self, item: &MediaItem) -> Result<Option<MediaItem>, StoreError>;

    async fn get(&self, id: &str) -> Result<Option<MediaItem>, StoreError>;

    /// Replace an item's tags. Fails with `NotFound` when the item is missing.
    async fn update_tags(&self, id: &str, tags: &TagMap) -> Result<MediaItem, StoreError>;

    /// Set an item's thumbnail URL. Fails with `NotFound` when the item is missing.
    async fn set_thumbnail(&self, id: &str, thumbnail_url: &str)
        -> Result<MediaItem, StoreError>;

    /// Delete an item, returning the removed record.
    async fn delete(&self, id: &str) -> Result<Option<MediaItem>, StoreError>;

    /// One page of a full scan in key order.
    async fn scan_page(
        &self,
        start: Option<&PageToken>,
        limit: usize,
    ) -> Result<Page<MediaItem>, StoreError>;

    /// One page of an owner's items in key order.
    async fn owner_page(
        &self,
        owner_id: &str,
        start: Option<&PageToken>,
        limit: usize,
    ) -> Result<Page<MediaItem>, StoreError>;
}

/// Search job records. Primary key `job_id`.
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Write the PROCESSING record unless the job is already terminal.
    ///
    /// Returns the record as stored afterwards.
    async fn begin(&self, job: &SearchJob) -> Result<SearchJob, StoreError>;

    /// Apply a terminal outcome atomically.
    ///
    /// Returns `false` when the job was already terminal and nothing changed.
    async fn finish(
        &self,
        job_id: &str,
        outcome: JobOutcome,
        at: DateTime<Utc>,
    ) -> Result<bool, StoreError>;

    async fn get(&self, job_id: &str) -> Result<Option<SearchJob>, StoreError>;
}

/// Subscriptions, one per user.
#[async_trait]
pub trait SubscriptionStore: Send + Sync {
    /// Insert or replace the user's subscription.
    async fn put(&self, subscription: &Subscription) -> Result<(), StoreError>;

    async fn get(&self, user_id: &str) -> Result<Option<Subscription>, StoreError>;

    /// One page of a full scan in key order.
    async fn scan_page(
        &self,
        start: Option<&PageToken>,
        limit: usize,
    ) -> Result<Page<Subscription>, StoreError>;
}

/// Which backend the stores use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageKind {
    Postgres,
    Memory,
}

impl StorageKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Postgres => "postgres",
            Self::Memory => "memory",
        }
    }
}

/// All stores, sharing one backend.
#[derive(Clone)]
pub struct Stores {
    pub catalog: Arc<dyn Catalog>,
    pub jobs: Arc<dyn JobStore>,
    pub subscriptions: Arc<dyn SubscriptionStore>,
    pub kind: StorageKind,
    pool: Option<sqlx::PgPool>,
}

impl Stores {
    /// In-memory stores (tests and development only)
    pub fn in_memory() -> Self {
        Self {
            catalog: Arc::new(MemoryCatalog::new()),
            jobs: Arc::new(MemoryJobStore::new()),
            subscriptions: Arc::new(MemorySubscriptionStore::new()),
            kind: StorageKind::Memory,
            pool: None,
        }
    }

    /// PostgreSQL stores. Runs migrations on connect.
    pub async fn with_postgres(database_url: &str, max_connections: u32) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await
            .map_err(|e| StoreError::Connection(e.to_string()))?;

        sqlx::migrate!("./migrations").run(&pool).await?;
        tracing::info!("Database connected and migrations applied");

        Ok(Self {
            catalog: Arc::new(PgCatalog::new(pool.clone())),
            jobs: Arc::new(PgJobStore::new(pool.clone())),
            subscriptions: Arc::new(PgSubscriptionStore::new(pool.clone())),
            kind: StorageKind::Postgres,
            pool: Some(pool),
        })
    }

    /// Uses PostgreSQL if `database_url` is set, otherwise falls back to memory.
    pub async fn connect(
        database_url: Option<&str>,
        max_connections: u32,
    ) -> Result<Self, StoreError> {
        match database_url {
            Some(url) if !url.is_empty() => {
                tracing::info!("Using PostgreSQL storage");
                Self::with_postgres(url, max_connections).await
            }
            _ => {
                tracing::warn!("DATABASE_URL not set, using in-memory storage - data will be lost on restart!");
                Ok(Self::in_memory())
            }
        }
    }

    /// Check database health (always Ok for memory backend)
    pub async fn check_health(&self) -> Result<(), StoreError> {
        match &self.pool {
            Some(pool) => {
                sqlx::query("SELECT 1").execute(pool).await?;
                Ok(())
            }
            None => Ok(()),
        }
    }
}

/// Read every page of a paginated source, concatenating the records.
pub async fn collect_pages<T, F, Fut>(mut fetch: F) -> Result<Vec<T>, StoreError>
where
    F: FnMut(Option<PageToken>) -> Fut,
    Fut: std::future::Future<Output = Result<Page<T>, StoreError>>,
{
    let mut all = Vec::new();
    let mut token: Option<PageToken> = None;
    loop {
        let page = fetch(token.take()).await?;
        all.extend(page.items);
        match page.next {
            Some(next) => token = Some(next),
            None => return Ok(all),
        }
    }
}
