//! PostgreSQL stores.
//!
//! Tags and result payloads are stored as JSONB. Pagination is keyset-based:
//! the continuation token carries the last key of the previous page.

use std::collections::BTreeSet;

use async_trait::async_trait;
use birdtag_core::{FileType, JobOutcome, MatchView, MediaItem, SearchJob, Subscription, TagMap};
use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::{FromRow, PgPool};

use super::{Catalog, JobStore, Page, PageToken, StoreError, SubscriptionStore};

const MEDIA_COLUMNS: &str = "id, user_id, file_type, original_url, thumbnail_url, tags";

const JOB_COLUMNS: &str = "job_id, job_status, user_id_of_querier, temp_source_key, received_at, \
     discovered_tags, search_results_payload, error, completed_at";

fn start_key(start: Option<&PageToken>) -> Result<Option<String>, StoreError> {
    start.map(PageToken::last_key).transpose()
}

fn page_limit(limit: usize) -> i64 {
    i64::try_from(limit.max(1)).unwrap_or(i64::MAX)
}

// =============================================================================
// Catalog
// =============================================================================

#[derive(FromRow)]
struct MediaRow {
    id: String,
    user_id: String,
    file_type: String,
    original_url: String,
    thumbnail_url: Option<String>,
    tags: Json<TagMap>,
}

impl TryFrom<MediaRow> for MediaItem {
    type Error = StoreError;

    fn try_from(row: MediaRow) -> Result<Self, Self::Error> {
        let file_type: FileType = row
            .file_type
            .parse()
            .map_err(|e: birdtag_core::BirdtagError| StoreError::Serialization(e.to_string()))?;
        Ok(Self {
            id: row.id,
            owner_id: row.user_id,
            file_type,
            original_url: row.original_url,
            thumbnail_url: row.thumbnail_url,
            tags: row.tags.0,
        })
    }
}

fn media_page(rows: Vec<MediaRow>, limit: usize) -> Result<Page<MediaItem>, StoreError> {
    let items = rows
        .into_iter()
        .map(MediaItem::try_from)
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Page::from_sorted(items, limit.max(1), |item| item.id.as_str()))
}

/// PostgreSQL-backed catalog
#[derive(Clone)]
pub struct PgCatalog {
    pool: PgPool,
}

impl PgCatalog {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl Catalog for PgCatalog {
    async fn put(&self, item: &MediaItem) -> Result<Option<MediaItem>, StoreError> {
        let mut tx = self.pool.begin().await?;

        let previous: Option<MediaRow> = sqlx::query_as(&format!(
            "SELECT {MEDIA_COLUMNS} FROM media_items WHERE id = $1 FOR UPDATE"
        ))
        .bind(&item.id)
        .fetch_optional(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            INSERT INTO media_items (id, user_id, file_type, original_url, thumbnail_url, tags)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (id) DO UPDATE SET
                user_id = EXCLUDED.user_id,
                file_type = EXCLUDED.file_type,
                original_url = EXCLUDED.original_url,
                thumbnail_url = COALESCE(EXCLUDED.thumbnail_url, media_items.thumbnail_url),
                tags = EXCLUDED.tags,
                updated_at = NOW()
            "#,
        )
        .bind(&item.id)
        .bind(&item.owner_id)
        .bind(item.file_type.as_str())
        .bind(&item.original_url)
        .bind(&item.thumbnail_url)
        .bind(Json(&item.tags))
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        tracing::debug!(item_id = %item.id, "Stored media item");
        previous.map(MediaItem::try_from).transpose()
    }

    async fn get(&self, id: &str) -> Result<Option<MediaItem>, StoreError> {
        let row: Option<MediaRow> = sqlx::query_as(&format!(
            "SELECT {MEDIA_COLUMNS} FROM media_items WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(MediaItem::try_from).transpose()
    }

    async fn update_tags(&self, id: &str, tags: &TagMap) -> Result<MediaItem, StoreError> {
        let row: Option<MediaRow> = sqlx::query_as(&format!(
            "UPDATE media_items SET tags = $2, updated_at = NOW() WHERE id = $1 RETURNING {MEDIA_COLUMNS}"
        ))
        .bind(id)
        .bind(Json(tags))
        .fetch_optional(&self.pool)
        .await?;

        row.ok_or_else(|| StoreError::NotFound(id.to_string()))?
            .try_into()
    }

    async fn set_thumbnail(
        &self,
        id: &str,
        thumbnail_url: &str,
    ) -> Result<MediaItem, StoreError> {
        let row: Option<MediaRow> = sqlx::query_as(&format!(
            "UPDATE media_items SET thumbnail_url = $2, updated_at = NOW() WHERE id = $1 RETURNING {MEDIA_COLUMNS}"
        ))
        .bind(id)
        .bind(thumbnail_url)
        .fetch_optional(&self.pool)
        .await?;

        row.ok_or_else(|| StoreError::NotFound(id.to_string()))?
            .try_into()
    }

    async fn delete(&self, id: &str) -> Result<Option<MediaItem>, StoreError> {
        let row: Option<MediaRow> = sqlx::query_as(&format!(
            "DELETE FROM media_items WHERE id = $1 RETURNING {MEDIA_COLUMNS}"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(MediaItem::try_from).transpose()
    }

    async fn scan_page(
        &self,
        start: Option<&PageToken>,
        limit: usize,
    ) -> Result<Page<MediaItem>, StoreError> {
        let rows: Vec<MediaRow> = sqlx::query_as(&format!(
            "SELECT {MEDIA_COLUMNS} FROM media_items \
             WHERE ($1::TEXT IS NULL OR id > $1) ORDER BY id LIMIT $2"
        ))
        .bind(start_key(start)?)
        .bind(page_limit(limit))
        .fetch_all(&self.pool)
        .await?;

        media_page(rows, limit)
    }

    async fn owner_page(
        &self,
        owner_id: &str,
        start: Option<&PageToken>,
        limit: usize,
    ) -> Result<Page<MediaItem>, StoreError> {
        let rows: Vec<MediaRow> = sqlx::query_as(&format!(
            "SELECT {MEDIA_COLUMNS} FROM media_items \
             WHERE user_id = $1 AND ($2::TEXT IS NULL OR id > $2) ORDER BY id LIMIT $3"
        ))
        .bind(owner_id)
        .bind(start_key(start)?)
        .bind(page_limit(limit))
        .fetch_all(&self.pool)
        .await?;

        media_page(rows, limit)
    }
}

// =============================================================================
// Search jobs
// =============================================================================

#[derive(FromRow)]
struct JobRow {
    job_id: String,
    job_status: String,
    user_id_of_querier: String,
    temp_source_key: String,
    received_at: DateTime<Utc>,
    discovered_tags: Json<TagMap>,
    search_results_payload: Json<Vec<MatchView>>,
    error: Option<String>,
    completed_at: Option<DateTime<Utc>>,
}

impl TryFrom<JobRow> for SearchJob {
    type Error = StoreError;

    fn try_from(row: JobRow) -> Result<Self, Self::Error> {
        let status = row
            .job_status
            .parse()
            .map_err(|e: birdtag_core::BirdtagError| StoreError::Serialization(e.to_string()))?;
        Ok(Self {
            job_id: row.job_id,
            status,
            owner_id: row.user_id_of_querier,
            source_key: row.temp_source_key,
            received_at: row.received_at,
            discovered_tags: row.discovered_tags.0,
            results: row.search_results_payload.0,
            error: row.error,
            completed_at: row.completed_at,
        })
    }
}

/// PostgreSQL-backed search job store
#[derive(Clone)]
pub struct PgJobStore {
    pool: PgPool,
}

impl PgJobStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl JobStore for PgJobStore {
    async fn begin(&self, job: &SearchJob) -> Result<SearchJob, StoreError> {
        sqlx::query(
            r#"
            INSERT INTO search_jobs (job_id, job_status, user_id_of_querier, temp_source_key, received_at)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (job_id) DO UPDATE SET
                job_status = EXCLUDED.job_status,
                user_id_of_querier = EXCLUDED.user_id_of_querier,
                temp_source_key = EXCLUDED.temp_source_key,
                received_at = EXCLUDED.received_at
            WHERE search_jobs.job_status NOT IN ('COMPLETED', 'FAILED')
            "#,
        )
        .bind(&job.job_id)
        .bind(job.status.as_str())
        .bind(&job.owner_id)
        .bind(&job.source_key)
        .bind(job.received_at)
        .execute(&self.pool)
        .await?;

        self.get(&job.job_id)
            .await?
            .ok_or_else(|| StoreError::NotFound(job.job_id.clone()))
    }

    async fn finish(
        &self,
        job_id: &str,
        outcome: JobOutcome,
        at: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        let status = outcome.status();
        let (discovered_tags, results, error) = match outcome {
            JobOutcome::Completed {
                discovered_tags,
                results,
            } => (discovered_tags, results, None),
            JobOutcome::Failed { error } => (TagMap::new(), Vec::new(), Some(error)),
        };

        let result = sqlx::query(
            r#"
            UPDATE search_jobs SET
                job_status = $2,
                discovered_tags = $3,
                search_results_payload = $4,
                error = $5,
                completed_at = $6
            WHERE job_id = $1 AND job_status NOT IN ('COMPLETED', 'FAILED')
            "#,
        )
        .bind(job_id)
        .bind(status.as_str())
        .bind(Json(&discovered_tags))
        .bind(Json(&results))
        .bind(error)
        .bind(at)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() > 0 {
            return Ok(true);
        }
        match self.get(job_id).await? {
            Some(_) => Ok(false),
            None => Err(StoreError::NotFound(job_id.to_string())),
        }
    }

    async fn get(&self, job_id: &str) -> Result<Option<SearchJob>, StoreError> {
        let row: Option<JobRow> = sqlx::query_as(&format!(
            "SELECT {JOB_COLUMNS} FROM search_jobs WHERE job_id = $1"
        ))
        .bind(job_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(SearchJob::try_from).transpose()
    }
}

// =============================================================================
// Subscriptions
// =============================================================================

#[derive(FromRow)]
struct SubscriptionRow {
    user_id: String,
    email: String,
    tags: Json<BTreeSet<String>>,
    transport_ref: Option<String>,
}

impl From<SubscriptionRow> for Subscription {
    fn from(row: SubscriptionRow) -> Self {
        Self {
            user_id: row.user_id,
            email: row.email,
            tags: row.tags.0,
            transport_ref: row.transport_ref,
        }
    }
}

/// PostgreSQL-backed subscription store
#[derive(Clone)]
pub struct PgSubscriptionStore {
    pool: PgPool,
}

impl PgSubscriptionStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SubscriptionStore for PgSubscriptionStore {
    async fn put(&self, subscription: &Subscription) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO subscriptions (user_id, email, tags, transport_ref)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (user_id) DO UPDATE SET
                email = EXCLUDED.email,
                tags = EXCLUDED.tags,
                transport_ref = EXCLUDED.transport_ref,
                updated_at = NOW()
            "#,
        )
        .bind(&subscription.user_id)
        .bind(&subscription.email)
        .bind(Json(&subscription.tags))
        .bind(&subscription.transport_ref)
        .execute(&self.pool)
        .await?;

        tracing::debug!(user_id = %subscription.user_id, "Stored subscription");
        Ok(())
    }

    async fn get(&self, user_id: &str) -> Result<Option<Subscription>, StoreError> {
        let row: Option<SubscriptionRow> = sqlx::query_as(
            "SELECT user_id, email, tags, transport_ref FROM subscriptions WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Into::into))
    }

    async fn scan_page(
        &self,
        start: Option<&PageToken>,
        limit: usize,
    ) -> Result<Page<Subscription>, StoreError> {
        let rows: Vec<SubscriptionRow> = sqlx::query_as(
            "SELECT user_id, email, tags, transport_ref FROM subscriptions \
             WHERE ($1::TEXT IS NULL OR user_id > $1) ORDER BY user_id LIMIT $2",
        )
        .bind(start_key(start)?)
        .bind(page_limit(limit))
        .fetch_all(&self.pool)
        .await?;

        let items: Vec<Subscription> = rows.into_iter().map(Into::into).collect();
        Ok(Page::from_sorted(items, limit.max(1), |s| s.user_id.as_str()))
    }
}
