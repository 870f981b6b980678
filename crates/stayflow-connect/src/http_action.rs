use std::collections::HashMap;
use std::time::Duration;

use futures::future::BoxFuture;
use tracing::debug;

use stayflow_core::config::ActionsConfig;
use stayflow_core::definition::ActionDescriptor;
use stayflow_core::error::{FlowError, Result};
use stayflow_core::traits::{ActionInvoker, ActionOutcome};

/// Invokes actions as `POST {base_url}/actions/{kind}`, expecting
/// `{"message": ..., "outputs": {...}}` back from the domain service.
pub struct HttpActionInvoker {
    http: reqwest::Client,
    base_url: String,
    token: Option<String>,
    timeout: Duration,
}

impl HttpActionInvoker {
    pub fn new(config: &ActionsConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            token: config.token.clone(),
            timeout: Duration::from_secs(config.timeout_secs),
        }
    }
}

impl ActionInvoker for HttpActionInvoker {
    fn invoke(
        &self,
        descriptor: &ActionDescriptor,
        params: HashMap<String, String>,
    ) -> BoxFuture<'_, Result<ActionOutcome>> {
        let kind = descriptor.kind.clone();
        let url = format!("{}/actions/{}", self.base_url, kind);
        Box::pin(async move {
            debug!(kind = %kind, url = %url, "Invoking action");

            let mut request = self
                .http
                .post(&url)
                .timeout(self.timeout)
                .json(&serde_json::json!({
                    "kind": kind,
                    "params": params,
                }));
            if let Some(token) = &self.token {
                request = request.bearer_auth(token);
            }

            let response = request.send().await.map_err(|e| FlowError::ActionFailed {
                kind: kind.clone(),
                message: e.to_string(),
            })?;
            if !response.status().is_success() {
                return Err(FlowError::ActionFailed {
                    kind,
                    message: format!("service returned {}", response.status()),
                });
            }

            let body: serde_json::Value =
                response.json().await.map_err(|e| FlowError::ActionFailed {
                    kind: kind.clone(),
                    message: format!("invalid response: {e}"),
                })?;

            let message = body["message"].as_str().map(str::to_string);
            let mut outputs = HashMap::new();
            if let Some(map) = body["outputs"].as_object() {
                for (key, value) in map {
                    outputs.insert(key.clone(), value.clone());
                }
            }

            Ok(ActionOutcome { message, outputs })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url_trailing_slash_trimmed() {
        let invoker = HttpActionInvoker::new(&ActionsConfig {
            base_url: "https://pms.example.com/api/".into(),
            token: None,
            timeout_secs: 10,
        });
        assert_eq!(invoker.base_url, "https://pms.example.com/api");
    }
}
