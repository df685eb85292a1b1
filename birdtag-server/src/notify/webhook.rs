//! HTTP webhook notification transport.
//!
//! Messages are POSTed as JSON to a configured URL. Transient failures
//! (connection errors, timeouts, 429/502/503/504) are retried with exponential
//! backoff; anything else fails the send immediately.

use std::time::Duration;

use async_trait::async_trait;
use backoff::{future::retry_notify, ExponentialBackoff};
use reqwest::{Client, StatusCode};
use serde::Serialize;
use tracing::{debug, instrument, warn};

use super::{Notification, NotificationTransport, NotifyError};
use birdtag_core::USER_ID_ATTRIBUTE;

/// Webhook transport configuration
#[derive(Debug, Clone)]
pub struct WebhookConfig {
    pub url: String,
    /// Per-request timeout
    pub timeout: Duration,
    /// Upper bound on the time spent retrying one message
    pub max_elapsed: Duration,
}

impl WebhookConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            timeout: Duration::from_secs(10),
            max_elapsed: Duration::from_secs(30),
        }
    }
}

#[derive(Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum WebhookBody<'a> {
    Notification(&'a Notification),
    Subscribe {
        endpoint: &'a str,
        subscription_ref: &'a str,
        filter_policy: serde_json::Value,
    },
}

pub struct WebhookTransport {
    client: Client,
    config: WebhookConfig,
}

impl WebhookTransport {
    pub fn new(config: WebhookConfig) -> Result<Self, NotifyError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| NotifyError::Delivery(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { client, config })
    }

    async fn post_once(&self, body: &WebhookBody<'_>) -> Result<(), backoff::Error<NotifyError>> {
        let response = self
            .client
            .post(&self.config.url)
            .json(body)
            .send()
            .await
            .map_err(|e| {
                let err = NotifyError::Delivery(e.to_string());
                if is_transient_error(&e) {
                    backoff::Error::transient(err)
                } else {
                    backoff::Error::permanent(err)
                }
            })?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        let err = NotifyError::Delivery(format!("webhook returned status {status}"));
        if is_transient_status(status) {
            Err(backoff::Error::transient(err))
        } else {
            Err(backoff::Error::permanent(err))
        }
    }

    async fn post(&self, body: WebhookBody<'_>) -> Result<(), NotifyError> {
        let policy = ExponentialBackoff {
            initial_interval: Duration::from_millis(100),
            max_interval: Duration::from_secs(2),
            max_elapsed_time: Some(self.config.max_elapsed),
            ..Default::default()
        };

        retry_notify(
            policy,
            || async { self.post_once(&body).await },
            |err: NotifyError, duration: Duration| {
                warn!(
                    error = %err,
                    retry_after_ms = duration.as_millis() as u64,
                    "Webhook retry scheduled"
                );
            },
        )
        .await
    }
}

#[async_trait]
impl NotificationTransport for WebhookTransport {
    #[instrument(level = "debug", skip_all, fields(topic = %notification.topic))]
    async fn publish(&self, notification: &Notification) -> Result<(), NotifyError> {
        self.post(WebhookBody::Notification(notification)).await?;
        debug!("Webhook notification delivered");
        Ok(())
    }

    async fn subscribe(&self, endpoint: &str, owner_id: &str) -> Result<String, NotifyError> {
        let subscription_ref = format!("webhook:{}", uuid::Uuid::new_v4());
        self.post(WebhookBody::Subscribe {
            endpoint,
            subscription_ref: &subscription_ref,
            filter_policy: serde_json::json!({ USER_ID_ATTRIBUTE: [owner_id] }),
        })
        .await
        .map_err(|e| NotifyError::Registration(e.to_string()))?;
        Ok(subscription_ref)
    }

    fn name(&self) -> &'static str {
        "webhook"
    }
}

fn is_transient_error(error: &reqwest::Error) -> bool {
    error.is_timeout() || error.is_connect() || error.is_request()
}

fn is_transient_status(status: StatusCode) -> bool {
    matches!(
        status,
        StatusCode::TOO_MANY_REQUESTS
            | StatusCode::SERVICE_UNAVAILABLE
            | StatusCode::GATEWAY_TIMEOUT
            | StatusCode::BAD_GATEWAY
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[test]
    fn test_transient_statuses() {
        assert!(is_transient_status(StatusCode::SERVICE_UNAVAILABLE));
        assert!(is_transient_status(StatusCode::TOO_MANY_REQUESTS));
        assert!(!is_transient_status(StatusCode::BAD_REQUEST));
        assert!(!is_transient_status(StatusCode::NOT_FOUND));
    }

    #[test]
    fn test_notification_body_shape() {
        let notification = Notification {
            topic: "t".into(),
            subject: "s".into(),
            message: "m".into(),
            attributes: BTreeMap::from([("UserId".to_string(), "u1".to_string())]),
        };
        let body = serde_json::to_value(WebhookBody::Notification(&notification)).unwrap();
        assert_eq!(body["type"], "notification");
        assert_eq!(body["attributes"]["UserId"], "u1");
    }

    #[tokio::test]
    async fn test_unreachable_webhook_fails() {
        let mut config = WebhookConfig::new("http://127.0.0.1:1/hook");
        config.timeout = Duration::from_millis(200);
        config.max_elapsed = Duration::from_millis(300);
        let transport = WebhookTransport::new(config).unwrap();

        let notification = Notification {
            topic: "t".into(),
            subject: "s".into(),
            message: "m".into(),
            attributes: BTreeMap::new(),
        };
        assert!(transport.publish(&notification).await.is_err());
    }
}
