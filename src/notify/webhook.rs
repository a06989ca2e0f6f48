//! Webhook notification sink

use super::{Notification, Notifier};
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;

/// POSTs each notification as JSON to a fixed URL
pub struct WebhookNotifier {
    url: String,
    client: Client,
}

impl WebhookNotifier {
    pub fn new(url: String) -> anyhow::Result<Self> {
        let client = Client::builder().timeout(Duration::from_secs(5)).build()?;
        Ok(Self { url, client })
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn notify(&self, notification: &Notification) -> anyhow::Result<()> {
        tracing::debug!(url = %self.url, "Posting notification");
        self.client
            .post(&self.url)
            .json(&serde_json::json!({
                "text": notification.summary(),
                "event": notification,
            }))
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }
}
