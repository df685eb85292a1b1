//! Direct tag queries over the catalog.
//!
//! A query is an owner filter plus one `>=` threshold per requested species,
//! evaluated over a full catalog scan. Every continuation token is followed;
//! the caller gets one complete result set or an error.

use std::sync::Arc;

use birdtag_core::{assemble, MatchView, MediaItem, TagQuery, UrlResolver};
use tracing::{debug, instrument};

use crate::store::{collect_pages, Catalog, Page, StoreError};

pub struct QueryExecutor {
    catalog: Arc<dyn Catalog>,
    resolver: Arc<dyn UrlResolver>,
    page_size: usize,
}

impl QueryExecutor {
    pub fn new(catalog: Arc<dyn Catalog>, resolver: Arc<dyn UrlResolver>, page_size: usize) -> Self {
        Self {
            catalog,
            resolver,
            page_size: page_size.max(1),
        }
    }

    /// The owner's items satisfying every threshold, in scan order.
    #[instrument(level = "debug", skip(self, query), fields(terms = query.len()))]
    pub async fn find(&self, owner_id: &str, query: &TagQuery) -> Result<Vec<MediaItem>, StoreError> {
        // Filter each page as it arrives; only matches are kept across pages.
        let matched = collect_pages(|token| async move {
            let Page { items, next } = self.catalog.scan_page(token.as_ref(), self.page_size).await?;
            let items: Vec<MediaItem> = items
                .into_iter()
                .filter(|item| item.owner_id == owner_id && query.matches(&item.tags))
                .collect();
            Ok::<_, StoreError>(Page { items, next })
        })
        .await?;
        debug!(matched = matched.len(), "Catalog scan finished");
        Ok(matched)
    }

    /// Matching items as client views with display URLs.
    pub async fn execute(&self, owner_id: &str, query: &TagQuery) -> Result<Vec<MatchView>, StoreError> {
        let items = self.find(owner_id, query).await?;
        Ok(assemble(&items, self.resolver.as_ref()))
    }

    /// The owner's items named by any of `references` (id, original URL or
    /// thumbnail URL), plus the references that matched nothing.
    pub async fn referenced(
        &self,
        owner_id: &str,
        references: &[String],
    ) -> Result<(Vec<MediaItem>, Vec<String>), StoreError> {
        let owned = collect_pages(|token| async move {
            self.catalog
                .owner_page(owner_id, token.as_ref(), self.page_size)
                .await
        })
        .await?;

        let items: Vec<MediaItem> = owned
            .into_iter()
            .filter(|item| references.iter().any(|r| item.is_referenced_by(r)))
            .collect();
        let unmatched = references
            .iter()
            .filter(|r| !items.iter().any(|item| item.is_referenced_by(r)))
            .cloned()
            .collect();
        Ok((items, unmatched))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryCatalog;
    use birdtag_core::{FileType, TagMap};

    struct KeyResolver;

    impl UrlResolver for KeyResolver {
        fn resolve(&self, key: &str) -> birdtag_core::Result<String> {
            Ok(format!("signed://{key}"))
        }
    }

    async fn catalog_with(items: &[(&str, &str, &[(&str, u32)])]) -> Arc<MemoryCatalog> {
        let catalog = Arc::new(MemoryCatalog::new());
        for (id, owner, tags) in items {
            let tags: TagMap = tags.iter().copied().collect();
            let item = MediaItem::new(id, owner, FileType::Image, &format!("users/{owner}/raw/{id}.jpg"))
                .with_tags(tags);
            catalog.put(&item).await.unwrap();
        }
        catalog
    }

    #[tokio::test]
    async fn test_threshold_and_owner_filter() {
        let catalog = catalog_with(&[
            ("a", "u1", &[("pelican", 3), ("duck", 1)]),
            ("b", "u1", &[("pelican", 1)]),
            ("c", "u2", &[("pelican", 9)]),
        ])
        .await;
        let executor = QueryExecutor::new(catalog, Arc::new(KeyResolver), 1);

        let query: TagQuery = [("pelican", 2)].into_iter().collect();
        let views = executor.execute("u1", &query).await.unwrap();
        assert_eq!(views.len(), 1);
        assert_eq!(views[0].id, "a");
        assert_eq!(views[0].display_url.as_deref(), Some("signed://users/u1/raw/a.jpg"));
    }

    #[tokio::test]
    async fn test_result_independent_of_page_size() {
        let entries: Vec<(String, u32)> = (0..17).map(|i| (format!("item{i:02}"), i % 4)).collect();
        let catalog = Arc::new(MemoryCatalog::new());
        for (id, crows) in &entries {
            let item = MediaItem::new(id, "u1", FileType::Audio, &format!("users/u1/raw/{id}.wav"))
                .with_tags([("crow", *crows)].into_iter().collect());
            catalog.put(&item).await.unwrap();
        }

        let query: TagQuery = [("crow", 2)].into_iter().collect();
        let single = QueryExecutor::new(catalog.clone(), Arc::new(KeyResolver), 1000)
            .find("u1", &query)
            .await
            .unwrap();
        assert_eq!(single.len(), 8);
        for page_size in [1, 3, 4, 16, 17] {
            let paged = QueryExecutor::new(catalog.clone(), Arc::new(KeyResolver), page_size)
                .find("u1", &query)
                .await
                .unwrap();
            assert_eq!(paged, single, "page size {page_size}");
        }
    }

    #[tokio::test]
    async fn test_referenced_by_id_or_url() {
        let catalog = catalog_with(&[("a", "u1", &[]), ("b", "u1", &[]), ("c", "u2", &[])]).await;
        let executor = QueryExecutor::new(catalog, Arc::new(KeyResolver), 1);
        let refs = vec![
            "a".to_string(),
            "users/u1/raw/b.jpg".to_string(),
            "c".to_string(),
        ];
        let (items, unmatched) = executor.referenced("u1", &refs).await.unwrap();
        let ids: Vec<&str> = items.iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);
        assert_eq!(unmatched, vec!["c".to_string()]);
    }

    #[tokio::test]
    async fn test_empty_query_returns_all_owner_items() {
        let catalog = catalog_with(&[("a", "u1", &[]), ("b", "u2", &[])]).await;
        let executor = QueryExecutor::new(catalog, Arc::new(KeyResolver), 5);
        let items = executor.find("u1", &TagQuery::new()).await.unwrap();
        assert_eq!(items.len(), 1);
    }
}
