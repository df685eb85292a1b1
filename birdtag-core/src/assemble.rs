//! Result assembly: matched items joined with resolved display URLs.

use tracing::warn;

use crate::error::Result;
use crate::job::{JobOutcome, MatchView};
use crate::keys::key_from_url;
use crate::media::{FileType, MediaItem};
use crate::tags::TagMap;

/// Turns an object key into a short-lived retrieval URL.
pub trait UrlResolver: Send + Sync {
    fn resolve(&self, key: &str) -> Result<String>;
}

/// Key of the object to display: the thumbnail for images when one exists,
/// the original otherwise.
pub fn display_key(item: &MediaItem) -> String {
    let url = match (item.file_type, &item.thumbnail_url) {
        (FileType::Image, Some(thumbnail)) => thumbnail,
        _ => &item.original_url,
    };
    key_from_url(url)
}

/// Build the view for one item. A resolution failure leaves `display_url` empty.
pub fn view(item: &MediaItem, resolver: &dyn UrlResolver) -> MatchView {
    let display_url = match resolver.resolve(&display_key(item)) {
        Ok(url) => Some(url),
        Err(e) => {
            warn!(item_id = %item.id, error = %e, "Failed to resolve display URL");
            None
        }
    };
    MatchView {
        id: item.id.clone(),
        file_type: item.file_type,
        file_name: item.file_name(),
        tags: item.tags.clone(),
        display_url,
        original_key: key_from_url(&item.original_url),
        thumbnail_key: item.thumbnail_url.as_deref().map(key_from_url),
    }
}

/// Views for all items, in the given order.
pub fn assemble<'a, I>(items: I, resolver: &dyn UrlResolver) -> Vec<MatchView>
where
    I: IntoIterator<Item = &'a MediaItem>,
{
    items.into_iter().map(|item| view(item, resolver)).collect()
}

/// Completed job outcome bundling the matches with the discovered tags.
pub fn completed_outcome<'a, I>(
    items: I,
    discovered_tags: TagMap,
    resolver: &dyn UrlResolver,
) -> JobOutcome
where
    I: IntoIterator<Item = &'a MediaItem>,
{
    JobOutcome::Completed {
        discovered_tags,
        results: assemble(items, resolver),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BirdtagError;

    struct PrefixResolver;

    impl UrlResolver for PrefixResolver {
        fn resolve(&self, key: &str) -> Result<String> {
            if key.contains("broken") {
                Err(BirdtagError::storage("signing failed"))
            } else {
                Ok(format!("https://signed/{key}"))
            }
        }
    }

    #[test]
    fn test_image_prefers_thumbnail() {
        let item = MediaItem::new("a", "u", FileType::Image, "users/u/raw/a.jpg")
            .with_thumbnail("users/u/thumbnail/a.jpg");
        let v = view(&item, &PrefixResolver);
        assert_eq!(v.display_url.as_deref(), Some("https://signed/users/u/thumbnail/a.jpg"));
        assert_eq!(v.original_key, "users/u/raw/a.jpg");
        assert_eq!(v.thumbnail_key.as_deref(), Some("users/u/thumbnail/a.jpg"));
    }

    #[test]
    fn test_image_without_thumbnail_uses_original() {
        let item = MediaItem::new("a", "u", FileType::Image, "users/u/raw/a.jpg");
        assert_eq!(display_key(&item), "users/u/raw/a.jpg");
    }

    #[test]
    fn test_video_always_uses_original() {
        let item = MediaItem::new("v", "u", FileType::Video, "users/u/raw/v.mp4")
            .with_thumbnail("users/u/thumbnail/v.jpg");
        assert_eq!(display_key(&item), "users/u/raw/v.mp4");
    }

    #[test]
    fn test_resolution_failure_is_isolated_and_order_preserved() {
        let items = vec![
            MediaItem::new("1", "u", FileType::Audio, "users/u/raw/1.wav"),
            MediaItem::new("2", "u", FileType::Audio, "users/u/raw/broken.wav"),
            MediaItem::new("3", "u", FileType::Audio, "users/u/raw/3.wav"),
        ];
        let views = assemble(&items, &PrefixResolver);
        let ids: Vec<&str> = views.iter().map(|v| v.id.as_str()).collect();
        assert_eq!(ids, vec!["1", "2", "3"]);
        assert!(views[0].display_url.is_some());
        assert!(views[1].display_url.is_none());
        assert!(views[2].display_url.is_some());
    }
}
