//! Subscription notifier.
//!
//! Catalog mutation events are matched against tag subscriptions and fanned
//! out through a [`NotificationTransport`]:
//!
//! - DELETE scans every subscription and notifies each one whose tags
//!   intersect the item's tags before removal.
//! - CREATE and UPDATE look up only the item owner's subscription.
//!
//! Sends are sequential; a failed send is logged and does not stop the rest.

mod memory;
mod webhook;

pub use memory::MemoryTransport;
pub use webhook::{WebhookConfig, WebhookTransport};

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use birdtag_core::{CatalogEvent, NOTIFICATION_SUBJECT, USER_ID_ATTRIBUTE};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{debug, info, instrument, warn};

use crate::store::{collect_pages, StoreError, SubscriptionStore};

/// Default topic name when `NOTIFY_TOPIC` is unset.
pub const DEFAULT_TOPIC: &str = "birdtag-subscriptions";

/// Notification transport errors
#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("Notification delivery failed: {0}")]
    Delivery(String),

    #[error("Subscription registration failed: {0}")]
    Registration(String),
}

/// One published message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub topic: String,
    pub subject: String,
    pub message: String,
    /// Routing attributes; carries the subscriber id under `UserId`.
    pub attributes: BTreeMap<String, String>,
}

/// Pub/sub transport used to reach subscribers.
#[async_trait]
pub trait NotificationTransport: Send + Sync {
    async fn publish(&self, notification: &Notification) -> Result<(), NotifyError>;

    /// Register `endpoint` for messages routed to `owner_id`.
    ///
    /// Returns the transport's reference for the registration.
    async fn subscribe(&self, endpoint: &str, owner_id: &str) -> Result<String, NotifyError>;

    fn name(&self) -> &'static str;
}

/// Outcome of fanning out one event.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Delivery {
    pub notified: Vec<String>,
    pub failed: Vec<String>,
}

/// Matches mutation events against subscriptions and publishes notifications.
pub struct Notifier {
    subscriptions: Arc<dyn SubscriptionStore>,
    transport: Arc<dyn NotificationTransport>,
    topic: String,
    page_size: usize,
}

impl Notifier {
    pub fn new(
        subscriptions: Arc<dyn SubscriptionStore>,
        transport: Arc<dyn NotificationTransport>,
        topic: impl Into<String>,
        page_size: usize,
    ) -> Self {
        Self {
            subscriptions,
            transport,
            topic: topic.into(),
            page_size: page_size.max(1),
        }
    }

    /// Fan out one event. Only reading subscriptions can fail the call.
    #[instrument(level = "debug", skip_all, fields(item_id = %event.item_id, kind = ?event.kind))]
    pub async fn dispatch(&self, event: &CatalogEvent) -> Result<Delivery, StoreError> {
        let candidates = if event.is_broadcast() {
            let store = &self.subscriptions;
            let page_size = self.page_size;
            collect_pages(move |token| async move {
                store.scan_page(token.as_ref(), page_size).await
            })
            .await?
        } else {
            self.subscriptions
                .get(&event.owner_id)
                .await?
                .into_iter()
                .collect()
        };

        let mut delivery = Delivery::default();
        for subscription in candidates {
            let matched = subscription.interested_in(&event.tags);
            if matched.is_empty() {
                continue;
            }

            let notification = Notification {
                topic: self.topic.clone(),
                subject: NOTIFICATION_SUBJECT.to_string(),
                message: event.message(&matched),
                attributes: BTreeMap::from([(
                    USER_ID_ATTRIBUTE.to_string(),
                    subscription.user_id.clone(),
                )]),
            };

            match self.transport.publish(&notification).await {
                Ok(()) => {
                    debug!(user_id = %subscription.user_id, "Notification sent");
                    delivery.notified.push(subscription.user_id);
                }
                Err(e) => {
                    warn!(user_id = %subscription.user_id, error = %e, "Failed to notify subscriber");
                    delivery.failed.push(subscription.user_id);
                }
            }
        }

        info!(
            notified = delivery.notified.len(),
            failed = delivery.failed.len(),
            "Mutation event dispatched"
        );
        Ok(delivery)
    }
}

/// Handle for emitting mutation events to the notifier task.
#[derive(Clone)]
pub struct EventSender {
    tx: mpsc::UnboundedSender<CatalogEvent>,
}

impl EventSender {
    pub fn emit(&self, event: CatalogEvent) {
        if let Err(e) = self.tx.send(event) {
            warn!(item_id = %e.0.item_id, "Notifier task stopped, dropping mutation event");
        }
    }
}

/// Start the notifier task. Events are dispatched in arrival order.
pub fn spawn(notifier: Arc<Notifier>) -> EventSender {
    let (tx, mut rx) = mpsc::unbounded_channel::<CatalogEvent>();
    tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            if let Err(e) = notifier.dispatch(&event).await {
                warn!(item_id = %event.item_id, error = %e, "Failed to read subscriptions for event");
            }
        }
        debug!("Notifier task finished");
    });
    EventSender { tx }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemorySubscriptionStore;
    use birdtag_core::{FileType, MediaItem, Subscription};

    async fn fixture() -> (Notifier, Arc<MemoryTransport>) {
        let store = Arc::new(MemorySubscriptionStore::new());
        for (user, tags) in [("alice", vec!["heron"]), ("bob", vec!["heron", "owl"]), ("carol", vec!["crow"])] {
            let sub = Subscription::new(user, &format!("{user}@example.com"), tags).unwrap();
            store.put(&sub).await.unwrap();
        }
        let transport = Arc::new(MemoryTransport::new());
        let notifier = Notifier::new(store, transport.clone(), DEFAULT_TOPIC, 1);
        (notifier, transport)
    }

    fn heron_item(owner: &str) -> MediaItem {
        MediaItem::new("i1", owner, FileType::Image, "users/x/raw/i1.jpg")
            .with_tags([("heron", 1)].into_iter().collect())
    }

    #[tokio::test]
    async fn test_delete_broadcasts_to_all_interested() {
        let (notifier, transport) = fixture().await;
        let delivery = notifier
            .dispatch(&CatalogEvent::deleted(&heron_item("carol")))
            .await
            .unwrap();
        assert_eq!(delivery.notified, vec!["alice", "bob"]);

        let sent = transport.published().await;
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[0].subject, NOTIFICATION_SUBJECT);
        assert_eq!(sent[0].attributes[USER_ID_ATTRIBUTE], "alice");
        assert!(sent[0].message.contains("has been deleted"));
    }

    #[tokio::test]
    async fn test_create_notifies_owner_only() {
        let (notifier, transport) = fixture().await;
        let delivery = notifier
            .dispatch(&CatalogEvent::created(&heron_item("alice")))
            .await
            .unwrap();
        assert_eq!(delivery.notified, vec!["alice"]);
        assert_eq!(transport.published().await.len(), 1);

        // Owner not subscribed to any of the item's tags
        let delivery = notifier
            .dispatch(&CatalogEvent::updated(&heron_item("carol")))
            .await
            .unwrap();
        assert!(delivery.notified.is_empty());
    }

    #[tokio::test]
    async fn test_failed_send_does_not_stop_others() {
        let (notifier, transport) = fixture().await;
        transport.fail_for("alice");
        let delivery = notifier
            .dispatch(&CatalogEvent::deleted(&heron_item("carol")))
            .await
            .unwrap();
        assert_eq!(delivery.failed, vec!["alice"]);
        assert_eq!(delivery.notified, vec!["bob"]);
    }

    #[tokio::test]
    async fn test_spawned_task_dispatches_events() {
        let (notifier, transport) = fixture().await;
        let sender = spawn(Arc::new(notifier));
        sender.emit(CatalogEvent::created(&heron_item("bob")));

        for _ in 0..100 {
            if !transport.published().await.is_empty() {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
        let sent = transport.published().await;
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].attributes[USER_ID_ATTRIBUTE], "bob");
    }
}
