//! In-memory notification transport.

use async_trait::async_trait;
use dashmap::{DashMap, DashSet};
use tokio::sync::Mutex;

use super::{Notification, NotificationTransport, NotifyError};
use birdtag_core::USER_ID_ATTRIBUTE;

/// Records published messages instead of delivering them.
#[derive(Default)]
pub struct MemoryTransport {
    published: Mutex<Vec<Notification>>,
    endpoints: DashMap<String, (String, String)>,
    failing: DashSet<String>,
}

impl MemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Messages published so far, in order.
    pub async fn published(&self) -> Vec<Notification> {
        self.published.lock().await.clone()
    }

    /// Make every publish routed to `user_id` fail.
    pub fn fail_for(&self, user_id: &str) {
        self.failing.insert(user_id.to_string());
    }

    /// Registered `(endpoint, owner)` for a transport reference.
    pub fn endpoint(&self, transport_ref: &str) -> Option<(String, String)> {
        self.endpoints.get(transport_ref).map(|e| e.clone())
    }
}

#[async_trait]
impl NotificationTransport for MemoryTransport {
    async fn publish(&self, notification: &Notification) -> Result<(), NotifyError> {
        if let Some(user_id) = notification.attributes.get(USER_ID_ATTRIBUTE) {
            if self.failing.contains(user_id) {
                return Err(NotifyError::Delivery(format!("endpoint for {user_id} rejected")));
            }
        }
        self.published.lock().await.push(notification.clone());
        Ok(())
    }

    async fn subscribe(&self, endpoint: &str, owner_id: &str) -> Result<String, NotifyError> {
        let transport_ref = format!("memory:{}", uuid::Uuid::new_v4());
        self.endpoints.insert(
            transport_ref.clone(),
            (endpoint.to_string(), owner_id.to_string()),
        );
        Ok(transport_ref)
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}
