use std::time::Duration;

use futures::future::BoxFuture;
use tracing::debug;

use stayflow_core::config::TransportConfig;
use stayflow_core::error::{FlowError, Result};
use stayflow_core::traits::Transport;

/// Delivers side-channel notifications as `POST {webhook_url}` with a
/// `{"recipient": ..., "content": ...}` body.
pub struct WebhookTransport {
    http: reqwest::Client,
    url: String,
    token: Option<String>,
    timeout: Duration,
}

impl WebhookTransport {
    pub fn new(config: &TransportConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            url: config.webhook_url.clone(),
            token: config.token.clone(),
            timeout: Duration::from_secs(config.timeout_secs),
        }
    }
}

impl Transport for WebhookTransport {
    fn send(&self, recipient: &str, content: &str) -> BoxFuture<'_, Result<()>> {
        let recipient = recipient.to_string();
        let content = content.to_string();
        Box::pin(async move {
            debug!(recipient = %recipient, "Posting notification webhook");

            let mut request = self
                .http
                .post(&self.url)
                .timeout(self.timeout)
                .json(&serde_json::json!({
                    "recipient": recipient,
                    "content": content,
                }));
            if let Some(token) = &self.token {
                request = request.bearer_auth(token);
            }

            let response = request.send().await.map_err(|e| FlowError::SendFailed {
                recipient: recipient.clone(),
                message: e.to_string(),
            })?;
            if !response.status().is_success() {
                return Err(FlowError::SendFailed {
                    recipient,
                    message: format!("webhook returned {}", response.status()),
                });
            }
            Ok(())
        })
    }
}
