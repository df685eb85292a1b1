//! Tag subscriptions.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::error::{BirdtagError, Result};
use crate::payload::subscription_labels;
use crate::tags::TagMap;

/// A user's interest in a set of species.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subscription {
    pub user_id: String,
    /// Contact endpoint registered with the notification transport.
    pub email: String,
    pub tags: BTreeSet<String>,
    /// Reference returned by the transport when the endpoint was registered.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transport_ref: Option<String>,
}

impl Subscription {
    /// Build a subscription, normalizing the tags.
    ///
    /// Fails when no usable tag remains.
    pub fn new<I, S>(user_id: &str, email: &str, tags: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        if user_id.trim().is_empty() {
            return Err(BirdtagError::validation("user_id is required"));
        }
        let tags = subscription_labels(tags);
        if tags.is_empty() {
            return Err(BirdtagError::validation("tags must be a non-empty list"));
        }
        Ok(Self {
            user_id: user_id.to_string(),
            email: email.to_string(),
            tags,
            transport_ref: None,
        })
    }

    /// Subscribed tags present in `tags`.
    pub fn interested_in(&self, tags: &TagMap) -> Vec<String> {
        tags.intersecting(&self.tags)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_normalizes_and_rejects_empty() {
        let sub = Subscription::new("u1", "a@example.com", ["Heron", "HERON", "owl"]).unwrap();
        assert_eq!(sub.tags.len(), 2);
        assert!(sub.tags.contains("heron"));

        let empty: [&str; 0] = [];
        assert!(Subscription::new("u1", "a@example.com", empty).is_err());
        assert!(Subscription::new("u1", "a@example.com", ["  "]).is_err());
        assert!(Subscription::new("", "a@example.com", ["owl"]).is_err());
    }

    #[test]
    fn test_interested_in() {
        let sub = Subscription::new("u1", "a@example.com", ["heron", "owl"]).unwrap();
        let tags: TagMap = [("heron", 1), ("crow", 4)].into_iter().collect();
        assert_eq!(sub.interested_in(&tags), vec!["heron".to_string()]);
        assert!(sub.interested_in(&TagMap::new()).is_empty());
    }
}
