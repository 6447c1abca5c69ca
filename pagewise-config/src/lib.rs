//! Loader for Pagewise configuration with YAML + environment overlays.
//!
//! Sources, lowest precedence first:
//! 1. serde defaults baked into the structs below
//! 2. optional `pagewise.yaml` files ([`PagewiseConfigLoader::with_default_locations`])
//! 3. explicit files and inline YAML, in the order they were added
//! 4. `PAGEWISE__`-prefixed environment variables, `__` between path segments
//!    (e.g. `PAGEWISE__LLM__MODEL=gpt-4o`)
//!
//! String values may reference `${VAR}`; references are expanded after merging.
//! The API key is never required to live in a file: [`LlmConfig::resolve_api_key`]
//! falls back to `OPENAI_API_KEY`.
use config::{Config, Environment, File, FileFormat};
use pagewise_common::observability::{LogConfig, LogFormat};
use serde::Deserialize;
use serde_json::Value;
use std::path::{Path, PathBuf};
use thiserror::Error;

const MAXIMUM_ENV_EXPANSION_DEPTH: usize = 8;
const ENV_PREFIX: &str = "PAGEWISE";
const CONFIG_FILE_NAME: &str = "pagewise.yaml";

/// Environment variable holding the provider credential.
pub const API_KEY_ENV: &str = "OPENAI_API_KEY";

#[derive(Debug, Error)]
pub enum ConfigLoadError {
    #[error(transparent)]
    Source(#[from] config::ConfigError),
    #[error("invalid configuration: {0}")]
    Invalid(String),
    #[error("no API key configured: set {var} or llm.auth_token")]
    MissingApiKey { var: &'static str },
}

#[derive(Debug, Deserialize, Default)]
pub struct PagewiseConfig {
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub fetch: FetchConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Default, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LlmProvider {
    #[default]
    Openai,
}

#[derive(Deserialize)]
pub struct LlmConfig {
    #[serde(default)]
    pub provider: LlmProvider,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default)]
    pub auth_token: Option<String>,
    #[serde(default = "default_openai_endpoint")]
    pub endpoint: String,
    #[serde(default)]
    pub temperature: Option<f32>,
    #[serde(default)]
    pub max_tokens: Option<u32>,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: LlmProvider::default(),
            model: default_model(),
            auth_token: None,
            endpoint: default_openai_endpoint(),
            temperature: None,
            max_tokens: None,
        }
    }
}

impl std::fmt::Debug for LlmConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LlmConfig")
            .field("provider", &self.provider)
            .field("model", &self.model)
            .field("auth_token", &self.auth_token.as_ref().map(|_| "<redacted>"))
            .field("endpoint", &self.endpoint)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .finish()
    }
}

impl LlmConfig {
    /// The configured token if it is set and fully expanded, otherwise
    /// `OPENAI_API_KEY`. Fails before any network call is attempted.
    pub fn resolve_api_key(&self) -> Result<String, ConfigLoadError> {
        let configured = self
            .auth_token
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty() && !t.contains('$'));
        if let Some(token) = configured {
            return Ok(token.to_string());
        }

        match std::env::var(API_KEY_ENV) {
            Ok(v) if !v.trim().is_empty() => Ok(v.trim().to_string()),
            _ => Err(ConfigLoadError::MissingApiKey { var: API_KEY_ENV }),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct FetchConfig {
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_retries")]
    pub retries: usize,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            retries: default_retries(),
            user_agent: default_user_agent(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    #[serde(default)]
    pub dir: Option<PathBuf>,
    #[serde(default)]
    pub format: LogFormat,
    #[serde(default = "default_filter")]
    pub filter: String,
    #[serde(default)]
    pub stderr: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            dir: None,
            format: LogFormat::default(),
            filter: default_filter(),
            stderr: false,
        }
    }
}

impl LoggingConfig {
    pub fn to_log_config(&self) -> LogConfig {
        LogConfig {
            log_dir: self.dir.clone(),
            emit_stderr: self.stderr,
            format: self.format,
            default_filter: self.filter.clone(),
            ..LogConfig::default()
        }
    }
}

fn default_model() -> String {
    "gpt-4o-mini".into()
}
fn default_openai_endpoint() -> String {
    "https://api.openai.com/v1".into()
}
fn default_timeout_secs() -> u64 {
    15
}
fn default_retries() -> usize {
    2
}
fn default_user_agent() -> String {
    concat!("pagewise/", env!("CARGO_PKG_VERSION")).into()
}
fn default_filter() -> String {
    "info".into()
}

impl PagewiseConfig {
    /// Reject values that would only fail later, mid-session.
    pub fn validate(&self) -> Result<(), ConfigLoadError> {
        if self.llm.model.trim().is_empty() {
            return Err(ConfigLoadError::Invalid("llm.model must not be empty".into()));
        }
        let endpoint = self.llm.endpoint.trim();
        if !(endpoint.starts_with("https://") || endpoint.starts_with("http://")) {
            return Err(ConfigLoadError::Invalid(format!(
                "llm.endpoint must be an http(s) URL, got {endpoint:?}"
            )));
        }
        if let Some(t) = self.llm.temperature {
            if !(0.0..=2.0).contains(&t) {
                return Err(ConfigLoadError::Invalid(format!(
                    "llm.temperature must be within 0.0..=2.0, got {t}"
                )));
            }
        }
        if self.fetch.timeout_secs == 0 {
            return Err(ConfigLoadError::Invalid(
                "fetch.timeout_secs must be greater than zero".into(),
            ));
        }
        Ok(())
    }
}

fn expand_env_in_value(v: &mut Value) {
    match v {
        Value::String(s) => {
            if s.contains('$') {
                let mut cur = std::mem::take(s);
                for _ in 0..MAXIMUM_ENV_EXPANSION_DEPTH {
                    let expanded = match shellexpand::env(&cur) {
                        Ok(cow) => cow.into_owned(),
                        Err(_) => cur.clone(),
                    };
                    if expanded == cur {
                        break;
                    }
                    cur = expanded;
                }
                *s = cur;
            }
        }
        Value::Array(arr) => arr.iter_mut().for_each(expand_env_in_value),
        Value::Object(obj) => obj.values_mut().for_each(expand_env_in_value),
        _ => {}
    }
}

/// Load `.env` from the working directory (or a parent) into the process
/// environment. Existing variables are not overwritten.
pub fn load_dotenv() -> Option<PathBuf> {
    match dotenv::dotenv() {
        Ok(path) => {
            tracing::debug!(path = %path.display(), "config.dotenv.loaded");
            Some(path)
        }
        Err(_) => None,
    }
}

/// Builder hides the `config` crate wiring (YAML + env overrides).
pub struct PagewiseConfigLoader {
    builder: config::ConfigBuilder<config::builder::DefaultState>,
}

impl Default for PagewiseConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl PagewiseConfigLoader {
    /// Start from struct defaults; environment overrides are applied in [`load`](Self::load).
    ///
    /// ```
    /// use pagewise_config::PagewiseConfigLoader;
    ///
    /// let config = PagewiseConfigLoader::new()
    ///     .with_yaml_str("fetch:\n  retries: 0")
    ///     .load()
    ///     .expect("valid config");
    ///
    /// assert_eq!(config.fetch.retries, 0);
    /// assert_eq!(config.llm.model, "gpt-4o-mini");
    /// ```
    pub fn new() -> Self {
        Self {
            builder: Config::builder(),
        }
    }

    /// Add `pagewise.yaml` from the user config directory and the working
    /// directory, both optional; the working directory wins.
    pub fn with_default_locations(self) -> Self {
        let mut loader = self;
        if let Some(dir) = dirs::config_dir() {
            loader = loader.with_optional_file(dir.join("pagewise").join(CONFIG_FILE_NAME));
        }
        loader.with_optional_file(CONFIG_FILE_NAME)
    }

    /// Attach a YAML/TOML/JSON file that must exist; format is inferred by suffix.
    pub fn with_file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.builder = self
            .builder
            .add_source(File::from(path.as_ref()).required(true));
        self
    }

    /// Attach a file that is silently skipped when absent.
    pub fn with_optional_file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.builder = self
            .builder
            .add_source(File::from(path.as_ref()).required(false));
        self
    }

    /// Allow tests/CLI to merge inline YAML snippets.
    ///
    /// ```
    /// use pagewise_config::{LlmProvider, PagewiseConfigLoader};
    ///
    /// let cfg = PagewiseConfigLoader::new()
    ///     .with_yaml_str(
    ///         r#"
    /// llm:
    ///   provider: openai
    ///   model: gpt-4o
    ///   temperature: 0.2
    /// "#,
    ///     )
    ///     .load()
    ///     .unwrap();
    ///
    /// assert_eq!(cfg.llm.provider, LlmProvider::Openai);
    /// assert_eq!(cfg.llm.model, "gpt-4o");
    /// assert_eq!(cfg.llm.temperature, Some(0.2));
    /// ```
    pub fn with_yaml_str(mut self, yaml: &str) -> Self {
        self.builder = self.builder.add_source(File::from_str(yaml, FileFormat::Yaml));
        self
    }

    /// Consume the builder and deserialize the merged sources into strongly typed config.
    ///
    /// `PAGEWISE__`-prefixed environment variables are layered on top of every
    /// file, then `${VAR}` placeholders are expanded and the result validated.
    ///
    /// ```
    /// use pagewise_config::PagewiseConfigLoader;
    ///
    /// unsafe { std::env::set_var("PAGEWISE_DOC_TOKEN", "injected-from-env"); }
    ///
    /// let config = PagewiseConfigLoader::new()
    ///     .with_yaml_str(r#"
    /// llm:
    ///   auth_token: "${PAGEWISE_DOC_TOKEN}"
    /// "#)
    ///     .load()
    ///     .expect("valid configuration");
    ///
    /// assert_eq!(config.llm.resolve_api_key().unwrap(), "injected-from-env");
    /// assert_eq!(config.llm.endpoint, "https://api.openai.com/v1");
    ///
    /// unsafe { std::env::remove_var("PAGEWISE_DOC_TOKEN"); }
    /// ```
    pub fn load(self) -> Result<PagewiseConfig, ConfigLoadError> {
        let cfg = self
            .builder
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let mut v: Value = cfg.try_deserialize()?;
        expand_env_in_value(&mut v);

        let typed: PagewiseConfig =
            serde_json::from_value(v).map_err(|e| ConfigLoadError::Invalid(e.to_string()))?;
        typed.validate()?;

        tracing::debug!(config = ?typed, "config.loaded");
        Ok(typed)
    }
}
