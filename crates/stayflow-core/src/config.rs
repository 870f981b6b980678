use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{FlowError, Result};

/// Top-level stayflow configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub actions: Option<ActionsConfig>,
    #[serde(default)]
    pub transport: Option<TransportConfig>,
    #[serde(default)]
    pub classifier: Option<ClassifierConfig>,
}

/// Execution bounds and defaults for the workflow engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Maximum node visits per invocation (graph model).
    #[serde(default = "default_max_node_visits")]
    pub max_node_visits: usize,
    /// Maximum silent evaluation jumps per invocation (flat model).
    #[serde(default = "default_max_eval_jumps")]
    pub max_eval_jumps: usize,
    /// Language used when the caller supplies none.
    #[serde(default = "default_language")]
    pub default_language: String,
    /// Override for the fixed reply sent when a definition is unusable.
    #[serde(default)]
    pub fallback_message: Option<String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_node_visits: default_max_node_visits(),
            max_eval_jumps: default_max_eval_jumps(),
            default_language: default_language(),
            fallback_message: None,
        }
    }
}

fn default_max_node_visits() -> usize {
    25
}

fn default_max_eval_jumps() -> usize {
    8
}

fn default_language() -> String {
    "en".to_string()
}

/// Domain action service reached by the HTTP action invoker.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionsConfig {
    pub base_url: String,
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

/// Webhook endpoint for side-channel notifications.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransportConfig {
    pub webhook_url: String,
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

/// External NLU service used by flat evaluation steps.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassifierConfig {
    pub endpoint: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_timeout_secs() -> u64 {
    10
}

impl AppConfig {
    /// Load config from a TOML file, with env var expansion.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|_| FlowError::ConfigNotFound(path.display().to_string()))?;

        // Expand ${ENV_VAR} references
        let expanded = expand_env_vars(&content);

        toml::from_str(&expanded).map_err(|e| FlowError::Config(e.to_string()))
    }
}

/// Expand `${ENV_VAR}` patterns in a string.
fn expand_env_vars(input: &str) -> String {
    let mut result = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(c) = chars.next() {
        if c == '$' && chars.peek() == Some(&'{') {
            chars.next(); // consume '{'
            let mut var_name = String::new();
            for c in chars.by_ref() {
                if c == '}' {
                    break;
                }
                var_name.push(c);
            }
            match std::env::var(&var_name) {
                Ok(val) => result.push_str(&val),
                Err(_) => {
                    // Keep original if env var not set
                    result.push_str(&format!("${{{}}}", var_name));
                }
            }
        } else {
            result.push(c);
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.engine.max_node_visits, 25);
        assert_eq!(config.engine.max_eval_jumps, 8);
        assert_eq!(config.engine.default_language, "en");
        assert!(config.actions.is_none());
    }

    #[test]
    fn test_parse_sections() {
        let toml_content = r#"
[engine]
max_node_visits = 40
default_language = "es"

[actions]
base_url = "https://pms.example.com/api"
token = "secret"

[classifier]
endpoint = "https://nlu.example.com/classify"
timeout_secs = 5
"#;
        let config: AppConfig = toml::from_str(toml_content).unwrap();
        assert_eq!(config.engine.max_node_visits, 40);
        assert_eq!(config.engine.max_eval_jumps, 8);
        assert_eq!(config.engine.default_language, "es");

        let actions = config.actions.unwrap();
        assert_eq!(actions.base_url, "https://pms.example.com/api");
        assert_eq!(actions.token.as_deref(), Some("secret"));
        assert_eq!(actions.timeout_secs, 10);

        assert_eq!(config.classifier.unwrap().timeout_secs, 5);
    }

    #[test]
    fn test_expand_env_vars() {
        std::env::set_var("TEST_STAYFLOW_VAR", "expanded");
        let result = expand_env_vars("key = \"${TEST_STAYFLOW_VAR}\"");
        assert_eq!(result, "key = \"expanded\"");
    }

    #[test]
    fn test_expand_env_vars_missing() {
        let result = expand_env_vars("key = \"${NONEXISTENT_STAYFLOW_VAR}\"");
        assert_eq!(result, "key = \"${NONEXISTENT_STAYFLOW_VAR}\"");
    }
}
