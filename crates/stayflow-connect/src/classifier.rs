use std::time::Duration;

use futures::future::BoxFuture;
use tracing::debug;

use stayflow_core::config::ClassifierConfig;
use stayflow_core::error::{FlowError, Result};
use stayflow_core::traits::Classifier;

/// Classifies guest input via an external NLU service:
/// `POST {endpoint}` with `{"prompt", "context", "input"}`, expecting
/// `{"label": "..."}` back.
pub struct HttpClassifier {
    http: reqwest::Client,
    endpoint: String,
    timeout: Duration,
}

impl HttpClassifier {
    pub fn new(config: &ClassifierConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            endpoint: config.endpoint.clone(),
            timeout: Duration::from_secs(config.timeout_secs),
        }
    }
}

impl Classifier for HttpClassifier {
    fn classify(
        &self,
        prompt: &str,
        context: &str,
        latest_input: &str,
    ) -> BoxFuture<'_, Result<String>> {
        let payload = serde_json::json!({
            "prompt": prompt,
            "context": context,
            "input": latest_input,
        });
        Box::pin(async move {
            let response = self
                .http
                .post(&self.endpoint)
                .timeout(self.timeout)
                .json(&payload)
                .send()
                .await
                .map_err(|e| FlowError::ClassificationFailed(e.to_string()))?;
            if !response.status().is_success() {
                return Err(FlowError::ClassificationFailed(format!(
                    "classifier returned {}",
                    response.status()
                )));
            }

            let body: serde_json::Value = response
                .json()
                .await
                .map_err(|e| FlowError::ClassificationFailed(format!("invalid response: {e}")))?;

            let label = body["label"]
                .as_str()
                .map(str::to_string)
                .ok_or_else(|| FlowError::ClassificationFailed("no label in response".into()))?;
            debug!(label = %label, "Classification result");
            Ok(label)
        })
    }
}

/// Classifier that always fails, which forces evaluation steps onto their
/// default branch. Stands in when no NLU service is configured.
pub struct NoopClassifier;

impl Classifier for NoopClassifier {
    fn classify(&self, _: &str, _: &str, _: &str) -> BoxFuture<'_, Result<String>> {
        Box::pin(async { Err(FlowError::ClassificationFailed("no classifier configured".into())) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_noop_classifier_always_fails() {
        let err = NoopClassifier
            .classify("prompt", "context", "input")
            .await
            .unwrap_err();
        assert!(matches!(err, FlowError::ClassificationFailed(_)));
    }
}
