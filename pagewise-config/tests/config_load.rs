use pagewise_common::observability::LogFormat;
use pagewise_config::{ConfigLoadError, PagewiseConfigLoader};
use serial_test::serial;
use std::{fs, path::PathBuf};
use tempfile::TempDir;

/// Helper to write a YAML file in a temp dir and return its path.
fn write_yaml(tmp: &TempDir, name: &str, yaml: &str) -> PathBuf {
    let p = tmp.path().join(name);
    fs::write(&p, yaml).expect("write yaml");
    p
}

const FILE_YAML: &str = r#"
llm:
  provider: openai
  model: "gpt-4o-mini"
  auth_token: "${PW_TEST_OPENAI_KEY}"
  temperature: 0.2
  max_tokens: 512
fetch:
  timeout_secs: 30
  retries: 1
logging:
  format: json
  filter: "pagewise=debug"
"#;

#[test]
#[serial]
fn test_config_load() {
    let tmp = TempDir::new().unwrap();
    let p = write_yaml(&tmp, "pagewise.yaml", FILE_YAML);

    temp_env::with_var("PW_TEST_OPENAI_KEY", Some("sk-from-file-env"), || {
        let config = PagewiseConfigLoader::new()
            .with_file(&p)
            .load()
            .expect("load config");

        assert_eq!(config.llm.model, "gpt-4o-mini");
        assert_eq!(config.llm.temperature, Some(0.2));
        assert_eq!(config.llm.max_tokens, Some(512));
        assert_eq!(config.llm.resolve_api_key().unwrap(), "sk-from-file-env");
        assert_eq!(config.fetch.timeout_secs, 30);
        assert_eq!(config.fetch.retries, 1);
        assert!(config.fetch.user_agent.starts_with("pagewise/"));
        assert_eq!(config.logging.format, LogFormat::Json);
        assert_eq!(config.logging.filter, "pagewise=debug");
    });
}

#[test]
#[serial]
fn env_overrides_file_values() {
    let tmp = TempDir::new().unwrap();
    let p = write_yaml(&tmp, "pagewise.yaml", FILE_YAML);

    temp_env::with_vars(
        [
            ("PAGEWISE__LLM__MODEL", Some("gpt-4o")),
            ("PAGEWISE__FETCH__RETRIES", Some("4")),
            ("PW_TEST_OPENAI_KEY", Some("sk-x")),
        ],
        || {
            let config = PagewiseConfigLoader::new()
                .with_file(&p)
                .load()
                .expect("load config");
            assert_eq!(config.llm.model, "gpt-4o");
            assert_eq!(config.fetch.retries, 4);
            assert_eq!(config.fetch.timeout_secs, 30);
        },
    );
}

#[test]
#[serial]
fn later_files_win_and_missing_optional_files_are_skipped() {
    let tmp = TempDir::new().unwrap();
    let base = write_yaml(&tmp, "base.yaml", FILE_YAML);
    let local = write_yaml(&tmp, "local.yaml", "fetch:\n  timeout_secs: 5\n");

    let config = PagewiseConfigLoader::new()
        .with_file(&base)
        .with_optional_file(tmp.path().join("absent.yaml"))
        .with_file(&local)
        .load()
        .expect("load config");

    assert_eq!(config.fetch.timeout_secs, 5);
    assert_eq!(config.fetch.retries, 1);
}

#[test]
#[serial]
fn empty_sources_yield_defaults() {
    let config = PagewiseConfigLoader::new().load().expect("defaults");
    assert_eq!(config.llm.model, "gpt-4o-mini");
    assert_eq!(config.llm.endpoint, "https://api.openai.com/v1");
    assert_eq!(config.fetch.timeout_secs, 15);
    assert_eq!(config.fetch.retries, 2);
    assert_eq!(config.logging.format, LogFormat::Text);
    assert!(!config.logging.stderr);
}

#[test]
#[serial]
fn required_file_must_exist() {
    let tmp = TempDir::new().unwrap();
    let err = PagewiseConfigLoader::new()
        .with_file(tmp.path().join("nope.yaml"))
        .load()
        .unwrap_err();
    assert!(matches!(err, ConfigLoadError::Source(_)));
}

#[test]
#[serial]
fn unknown_provider_is_rejected() {
    let err = PagewiseConfigLoader::new()
        .with_yaml_str("llm:\n  provider: gemini\n")
        .load()
        .unwrap_err();
    assert!(matches!(err, ConfigLoadError::Invalid(_)), "got {err:?}");
}

#[test]
#[serial]
fn missing_key_is_reported_before_any_request() {
    temp_env::with_vars_unset(["OPENAI_API_KEY", "PW_TEST_OPENAI_KEY"], || {
        let config = PagewiseConfigLoader::new()
            .with_yaml_str(FILE_YAML)
            .load()
            .expect("load config");
        let err = config.llm.resolve_api_key().unwrap_err();
        assert!(matches!(err, ConfigLoadError::MissingApiKey { .. }));
    });
}
