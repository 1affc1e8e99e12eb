use std::fs;
use std::io::ErrorKind;
use std::path::Path;

use serde::Deserialize;

// -----------------------------------------------------------------------------
// Config (root)
// -----------------------------------------------------------------------------

#[derive(Debug, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub live: LiveConfig,
}

impl Config {
    pub fn load(path: &str) -> Result<Self, ConfigError> {
        let path = Path::new(path);
        let contents = match fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Self::default()),
            Err(e) => return Err(ConfigError::Io(e)),
        };
        serde_saphyr::from_str(&contents).map_err(ConfigError::Yaml)
    }
}

// -----------------------------------------------------------------------------
// LiveConfig
// -----------------------------------------------------------------------------

/// Settings for the streaming session connection.
#[derive(Debug, Clone, Deserialize)]
pub struct LiveConfig {
    #[serde(default = "default_host")]
    pub host: String,
    /// API key; falls back to the `GEMINI_API_KEY` environment variable.
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_response_modalities")]
    pub response_modalities: Vec<String>,
    #[serde(default = "default_max_queue_size")]
    pub max_queue_size: usize,
}

impl Default for LiveConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            api_key: None,
            model: default_model(),
            temperature: default_temperature(),
            response_modalities: default_response_modalities(),
            max_queue_size: default_max_queue_size(),
        }
    }
}

impl LiveConfig {
    /// The configured key, or `GEMINI_API_KEY` from the environment.
    ///
    /// A configured value of the form `${VAR}` is resolved from the
    /// environment, so config files never need to embed the secret itself.
    pub fn resolve_api_key(&self) -> Option<String> {
        match self.api_key.as_deref() {
            Some(value) => expand_env_ref(value),
            None => std::env::var("GEMINI_API_KEY").ok(),
        }
    }

    /// WebSocket URL of the bidirectional generation endpoint.
    pub fn endpoint_url(&self) -> String {
        let key = self.resolve_api_key().unwrap_or_default();
        format!(
            "wss://{}/ws/google.ai.generativelanguage.v1beta.GenerativeService.BidiGenerateContent?key={}",
            self.host, key
        )
    }
}

/// Resolve `${VAR}` references against the environment; plain values pass
/// through unchanged. An unset referenced variable yields `None`.
fn expand_env_ref(value: &str) -> Option<String> {
    match value.strip_prefix("${").and_then(|v| v.strip_suffix('}')) {
        Some(var) => std::env::var(var).ok(),
        None => Some(value.to_string()),
    }
}

fn default_host() -> String {
    "generativelanguage.googleapis.com".to_string()
}

fn default_model() -> String {
    "models/gemini-2.0-flash-live-preview-04-09".to_string()
}

fn default_temperature() -> f32 {
    1.0
}

fn default_response_modalities() -> Vec<String> {
    vec!["TEXT".to_string()]
}

fn default_max_queue_size() -> usize {
    5
}

// -----------------------------------------------------------------------------
// ConfigError
// -----------------------------------------------------------------------------

#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Yaml(serde_saphyr::Error),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "failed to read config file: {e}"),
            ConfigError::Yaml(e) => write!(f, "failed to parse config file: {e}"),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::Io(e) => Some(e),
            ConfigError::Yaml(e) => Some(e),
        }
    }
}

// -----------------------------------------------------------------------------
// Tests
// -----------------------------------------------------------------------------
