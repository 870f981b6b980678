use std::io::Write;
use std::path::Path;

use stayflow_core::config::AppConfig;
use stayflow_core::error::FlowError;

#[test]
fn test_load_full_config_from_file() {
    let toml_content = r#"
[engine]
max_node_visits = 40
max_eval_jumps = 4
default_language = "es"
fallback_message = "Lo sentimos, inténtelo más tarde."

[actions]
base_url = "https://pms.example.com/api"
token = "secret-token"
timeout_secs = 15

[transport]
webhook_url = "https://hooks.example.com/notify"

[classifier]
endpoint = "https://nlu.example.com/classify"
"#;

    let mut tmp = tempfile::NamedTempFile::new().expect("create temp file");
    tmp.write_all(toml_content.as_bytes()).expect("write toml");

    let config = AppConfig::load(tmp.path()).expect("load config");

    assert_eq!(config.engine.max_node_visits, 40);
    assert_eq!(config.engine.max_eval_jumps, 4);
    assert_eq!(config.engine.default_language, "es");
    assert!(config.engine.fallback_message.is_some());

    let actions = config.actions.expect("actions present");
    assert_eq!(actions.base_url, "https://pms.example.com/api");
    assert_eq!(actions.token.as_deref(), Some("secret-token"));
    assert_eq!(actions.timeout_secs, 15);

    let transport = config.transport.expect("transport present");
    assert_eq!(transport.webhook_url, "https://hooks.example.com/notify");
    assert_eq!(transport.timeout_secs, 10);

    assert!(config.classifier.is_some());
}

#[test]
fn test_env_var_expansion_in_config() {
    std::env::set_var("STAYFLOW_TEST_TOKEN", "expanded-token");

    let toml_content = r#"
[actions]
base_url = "https://pms.example.com/api"
token = "${STAYFLOW_TEST_TOKEN}"
"#;

    let mut tmp = tempfile::NamedTempFile::new().expect("create temp file");
    tmp.write_all(toml_content.as_bytes()).expect("write toml");

    let config = AppConfig::load(tmp.path()).expect("load config");
    assert_eq!(
        config.actions.expect("actions").token.as_deref(),
        Some("expanded-token")
    );
}

#[test]
fn test_missing_config_file_reported() {
    let err = AppConfig::load(Path::new("/nonexistent/stayflow.toml")).unwrap_err();
    assert!(matches!(err, FlowError::ConfigNotFound(_)));
}
