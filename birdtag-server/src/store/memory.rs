//! In-memory stores backed by `DashMap`.
//!
//! Scans sort by key on every page so pagination behaves like the database
//! backend: stable order, resumable from a token.

use async_trait::async_trait;
use birdtag_core::{JobOutcome, MediaItem, SearchJob, Subscription, TagMap};
use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use super::{Catalog, JobStore, Page, PageToken, StoreError, SubscriptionStore};

fn sorted_page<T: Clone>(
    map: &DashMap<String, T>,
    start: Option<&PageToken>,
    limit: usize,
    filter: impl Fn(&T) -> bool,
) -> Result<Page<T>, StoreError> {
    let limit = limit.max(1);
    let after = start.map(PageToken::last_key).transpose()?;

    let mut rows: Vec<(String, T)> = map
        .iter()
        .filter(|entry| after.as_deref().map_or(true, |a| entry.key().as_str() > a))
        .filter(|entry| filter(entry.value()))
        .map(|entry| (entry.key().clone(), entry.value().clone()))
        .collect();
    rows.sort_by(|a, b| a.0.cmp(&b.0));
    rows.truncate(limit);

    let next = if rows.len() == limit {
        rows.last().map(|(key, _)| PageToken::after(key))
    } else {
        None
    };
    Ok(Page {
        items: rows.into_iter().map(|(_, v)| v).collect(),
        next,
    })
}

/// In-memory catalog
#[derive(Default)]
pub struct MemoryCatalog {
    items: DashMap<String, MediaItem>,
}

impl MemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Catalog for MemoryCatalog {
    async fn put(&self, item: &MediaItem) -> Result<Option<MediaItem>, StoreError> {
        match self.items.entry(item.id.clone()) {
            Entry::Occupied(mut entry) => {
                let mut next = item.clone();
                if next.thumbnail_url.is_none() {
                    next.thumbnail_url = entry.get().thumbnail_url.clone();
                }
                Ok(Some(entry.insert(next)))
            }
            Entry::Vacant(entry) => {
                entry.insert(item.clone());
                Ok(None)
            }
        }
    }

    async fn get(&self, id: &str) -> Result<Option<MediaItem>, StoreError> {
        Ok(self.items.get(id).map(|item| item.clone()))
    }

    async fn update_tags(&self, id: &str, tags: &TagMap) -> Result<MediaItem, StoreError> {
        let mut item = self
            .items
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        item.tags = tags.clone();
        Ok(item.clone())
    }

    async fn set_thumbnail(
        &self,
        id: &str,
        thumbnail_url: &str,
    ) -> Result<MediaItem, StoreError> {
        let mut item = self
            .items
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        item.thumbnail_url = Some(thumbnail_url.to_string());
        Ok(item.clone())
    }

    async fn delete(&self, id: &str) -> Result<Option<MediaItem>, StoreError> {
        Ok(self.items.remove(id).map(|(_, item)| item))
    }

    async fn scan_page(
        &self,
        start: Option<&PageToken>,
        limit: usize,
    ) -> Result<Page<MediaItem>, StoreError> {
        sorted_page(&self.items, start, limit, |_| true)
    }

    async fn owner_page(
        &self,
        owner_id: &str,
        start: Option<&PageToken>,
        limit: usize,
    ) -> Result<Page<MediaItem>, StoreError> {
        sorted_page(&self.items, start, limit, |item| item.owner_id == owner_id)
    }
}

/// In-memory search job store
#[derive(Default)]
pub struct MemoryJobStore {
    jobs: DashMap<String, SearchJob>,
}

impl MemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl JobStore for MemoryJobStore {
    async fn begin(&self, job: &SearchJob) -> Result<SearchJob, StoreError> {
        let mut stored = self
            .jobs
            .entry(job.job_id.clone())
            .or_insert_with(|| job.clone());
        if !stored.status.is_terminal() {
            *stored = job.clone();
        }
        Ok(stored.clone())
    }

    async fn finish(
        &self,
        job_id: &str,
        outcome: JobOutcome,
        at: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        let mut job = self
            .jobs
            .get_mut(job_id)
            .ok_or_else(|| StoreError::NotFound(job_id.to_string()))?;
        Ok(job.finish(outcome, at))
    }

    async fn get(&self, job_id: &str) -> Result<Option<SearchJob>, StoreError> {
        Ok(self.jobs.get(job_id).map(|job| job.clone()))
    }
}

/// In-memory subscription store
#[derive(Default)]
pub struct MemorySubscriptionStore {
    subscriptions: DashMap<String, Subscription>,
}

impl MemorySubscriptionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SubscriptionStore for MemorySubscriptionStore {
    async fn put(&self, subscription: &Subscription) -> Result<(), StoreError> {
        self.subscriptions
            .insert(subscription.user_id.clone(), subscription.clone());
        Ok(())
    }

    async fn get(&self, user_id: &str) -> Result<Option<Subscription>, StoreError> {
        Ok(self.subscriptions.get(user_id).map(|s| s.clone()))
    }

    async fn scan_page(
        &self,
        start: Option<&PageToken>,
        limit: usize,
    ) -> Result<Page<Subscription>, StoreError> {
        sorted_page(&self.subscriptions, start, limit, |_| true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::collect_pages;
    use birdtag_core::{FileType, JobStatus};

    fn item(id: &str, owner: &str) -> MediaItem {
        MediaItem::new(id, owner, FileType::Image, &format!("users/{owner}/raw/{id}.jpg"))
    }

    #[tokio::test]
    async fn test_put_returns_previous() {
        let catalog = MemoryCatalog::new();
        assert!(catalog.put(&item("a", "u1")).await.unwrap().is_none());
        assert!(catalog.put(&item("a", "u1")).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_put_keeps_stored_thumbnail() {
        let catalog = MemoryCatalog::new();
        catalog.put(&item("a", "u1")).await.unwrap();
        catalog.set_thumbnail("a", "users/u1/thumbnail/a.jpg").await.unwrap();

        let retagged = item("a", "u1").with_tags([("crow", 2)].into_iter().collect());
        let previous = catalog.put(&retagged).await.unwrap().unwrap();
        assert!(previous.tags.is_empty());

        let stored = catalog.get("a").await.unwrap().unwrap();
        assert_eq!(stored.tags.get("crow"), 2);
        assert_eq!(stored.thumbnail_url.as_deref(), Some("users/u1/thumbnail/a.jpg"));

        let replaced = item("a", "u1").with_thumbnail("users/u1/thumbnail/b.jpg");
        catalog.put(&replaced).await.unwrap();
        let stored = catalog.get("a").await.unwrap().unwrap();
        assert_eq!(stored.thumbnail_url.as_deref(), Some("users/u1/thumbnail/b.jpg"));
    }

    #[tokio::test]
    async fn test_update_missing_item_is_not_found() {
        let catalog = MemoryCatalog::new();
        let err = catalog.update_tags("nope", &TagMap::new()).await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_scan_is_complete_for_any_page_size() {
        let catalog = MemoryCatalog::new();
        for i in 0..23 {
            catalog.put(&item(&format!("id{i:02}"), "u1")).await.unwrap();
        }

        let single = catalog.scan_page(None, 1000).await.unwrap().items;
        let catalog = &catalog;
        for limit in [1, 2, 5, 7, 23, 24] {
            let paged = collect_pages(move |token| async move {
                catalog.scan_page(token.as_ref(), limit).await
            })
            .await
            .unwrap();
            assert_eq!(paged, single, "page size {limit}");
        }
    }

    #[tokio::test]
    async fn test_owner_page_filters() {
        let catalog = MemoryCatalog::new();
        catalog.put(&item("a", "u1")).await.unwrap();
        catalog.put(&item("b", "u2")).await.unwrap();
        catalog.put(&item("c", "u1")).await.unwrap();
        let page = catalog.owner_page("u1", None, 10).await.unwrap();
        let ids: Vec<&str> = page.items.iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "c"]);
    }

    #[tokio::test]
    async fn test_begin_does_not_regress_terminal_job() {
        let jobs = MemoryJobStore::new();
        let job = SearchJob::processing("j1", "u1", "tmp/u1/j1.jpg", Utc::now());
        jobs.begin(&job).await.unwrap();
        assert!(jobs
            .finish("j1", JobOutcome::Failed { error: "x".into() }, Utc::now())
            .await
            .unwrap());

        let stored = jobs.begin(&job).await.unwrap();
        assert_eq!(stored.status, JobStatus::Failed);
    }

    #[tokio::test]
    async fn test_finish_unknown_job() {
        let jobs = MemoryJobStore::new();
        let err = jobs
            .finish("missing", JobOutcome::Failed { error: "x".into() }, Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
    }
}
