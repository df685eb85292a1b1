//! Catalog mutation events and notification text.

use serde::{Deserialize, Serialize};

use crate::media::MediaItem;
use crate::tags::TagMap;

/// Subject line of subscription notifications.
pub const NOTIFICATION_SUBJECT: &str = "BirdTag: Subscribed Tag Update Notification";

/// Routing attribute carrying the subscriber's user id.
pub const USER_ID_ATTRIBUTE: &str = "UserId";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MutationKind {
    Create,
    Update,
    Delete,
}

impl MutationKind {
    fn past_tense(&self) -> &'static str {
        match self {
            Self::Create => "uploaded",
            Self::Update => "updated",
            Self::Delete => "deleted",
        }
    }
}

/// A change to one catalog item.
///
/// `tags` holds the item's tags after the change for CREATE and UPDATE, and
/// the tags it had before removal for DELETE.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogEvent {
    pub kind: MutationKind,
    pub item_id: String,
    #[serde(rename = "user_id")]
    pub owner_id: String,
    pub original_url: String,
    #[serde(default)]
    pub tags: TagMap,
}

impl CatalogEvent {
    pub fn new(kind: MutationKind, item: &MediaItem) -> Self {
        Self {
            kind,
            item_id: item.id.clone(),
            owner_id: item.owner_id.clone(),
            original_url: item.original_url.clone(),
            tags: item.tags.clone(),
        }
    }

    pub fn created(item: &MediaItem) -> Self {
        Self::new(MutationKind::Create, item)
    }

    pub fn updated(item: &MediaItem) -> Self {
        Self::new(MutationKind::Update, item)
    }

    pub fn deleted(item: &MediaItem) -> Self {
        Self::new(MutationKind::Delete, item)
    }

    /// Whether every subscription must be scanned rather than only the owner's.
    pub fn is_broadcast(&self) -> bool {
        self.kind == MutationKind::Delete
    }

    pub fn file_name(&self) -> String {
        crate::keys::file_name_of(&self.original_url)
    }

    /// Notification text for a subscriber whose matching tags are `matched`.
    pub fn message(&self, matched: &[String]) -> String {
        let quoted: Vec<String> = matched.iter().map(|t| format!("'{t}'")).collect();
        format!(
            "The file [{}] has been {}. Your related subscribed tags: [{}]",
            self.file_name(),
            self.kind.past_tense(),
            quoted.join(", ")
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::FileType;

    #[test]
    fn test_message_format() {
        let item = MediaItem::new("i1", "u1", FileType::Image, "users/u1/raw/i1.jpg")
            .with_tags([("heron", 1)].into_iter().collect());
        let event = CatalogEvent::deleted(&item);
        assert!(event.is_broadcast());
        assert_eq!(
            event.message(&["heron".to_string()]),
            "The file [i1.jpg] has been deleted. Your related subscribed tags: ['heron']"
        );
        assert!(!CatalogEvent::created(&item).is_broadcast());
    }

    #[test]
    fn test_event_json() {
        let event: CatalogEvent = serde_json::from_str(
            r#"{"kind":"UPDATE","item_id":"i","user_id":"u","original_url":"users/u/raw/i.wav","tags":{"Owl":1}}"#,
        )
        .unwrap();
        assert_eq!(event.kind, MutationKind::Update);
        assert_eq!(event.tags.get("owl"), 1);
    }
}
