//! Webhook delivery — the production notifier channel.
//!
//! The console's UI workers subscribe to scheduler events through an
//! internal webhook endpoint; each event goes out as one JSON POST. The
//! send has a hard timeout so a stuck endpoint can never stall a
//! scheduler operation beyond it.

use async_trait::async_trait;

use crate::notify::{Notifier, SchedulerEvent};

/// Notifier that POSTs every event to a single webhook URL.
#[derive(Debug, Clone)]
pub struct WebhookNotifier {
    url: String,
    client: reqwest::Client,
    timeout: std::time::Duration,
}

impl WebhookNotifier {
    /// Target a webhook URL with the default 10s send timeout.
    pub fn new(url: &str) -> Self {
        Self {
            url: url.to_string(),
            client: reqwest::Client::new(),
            timeout: std::time::Duration::from_secs(10),
        }
    }

    /// Override the send timeout.
    pub fn with_timeout(mut self, timeout: std::time::Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn emit(&self, event: &SchedulerEvent) -> Result<(), String> {
        let resp = self
            .client
            .post(&self.url)
            .json(event)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| format!("webhook send failed: {e}"))?;

        if resp.status().is_success() {
            tracing::debug!(
                "✅ event for agent {} delivered to {}",
                event.agent_id(),
                self.url
            );
            Ok(())
        } else {
            Err(format!("webhook error {}", resp.status()))
        }
    }
}
