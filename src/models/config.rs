//! Configuration models for council.
//!
//! All I^R (resolvable ignorance) is parameterized here.
//! The user resolves these unknowns at runtime via config file.

use super::Tier;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use std::time::Duration;

/// Top-level configuration for council.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// OpenAI-compatible gateway (OpenRouter by default)
    #[serde(default)]
    pub openrouter: OpenRouterConfig,

    /// Fan-out and judge settings
    #[serde(default)]
    pub council: CouncilConfig,

    /// Per-tier roster overrides
    #[serde(default)]
    pub tiers: TiersConfig,
}

/// Gateway configuration.
///
/// K_i: Any endpoint speaking the OpenAI chat-completions schema works.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenRouterConfig {
    /// API key (can also be set via OPENROUTER_API_KEY env var)
    #[serde(default)]
    pub api_key: Option<String>,

    /// Environment variable name for API key
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    /// Base URL for the API
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Request timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    /// Maximum attempts per request (1 disables retries)
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

fn default_api_key_env() -> String {
    "OPENROUTER_API_KEY".to_string()
}

fn default_base_url() -> String {
    "https://openrouter.ai/api/v1".to_string()
}

fn default_timeout() -> u64 {
    180
}

fn default_max_retries() -> u32 {
    3
}

impl Default for OpenRouterConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            api_key_env: default_api_key_env(),
            base_url: default_base_url(),
            timeout_secs: default_timeout(),
            max_retries: default_max_retries(),
        }
    }
}

/// Fan-out and synthesis tunables.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CouncilConfig {
    /// Model that synthesizes the final answer
    #[serde(default = "default_judge_model")]
    pub judge_model: String,

    /// Output cap for each roster probe
    #[serde(default = "default_probe_max_tokens")]
    pub probe_max_tokens: u32,

    /// Output cap for the judge (None lets the endpoint decide)
    #[serde(default)]
    pub judge_max_tokens: Option<u32>,

    /// Upper bound on probes in flight at once
    #[serde(default = "default_max_concurrent_probes")]
    pub max_concurrent_probes: usize,

    /// Overall deadline for one query, probes and judge included
    #[serde(default)]
    pub deadline_secs: Option<u64>,

    /// Replaces the built-in judge instruction
    #[serde(default)]
    pub judge_system_prompt: Option<String>,
}

fn default_judge_model() -> String {
    "openai/gpt-4o".to_string()
}

fn default_probe_max_tokens() -> u32 {
    500
}

fn default_max_concurrent_probes() -> usize {
    5
}

impl Default for CouncilConfig {
    fn default() -> Self {
        Self {
            judge_model: default_judge_model(),
            probe_max_tokens: default_probe_max_tokens(),
            judge_max_tokens: None,
            max_concurrent_probes: default_max_concurrent_probes(),
            deadline_secs: None,
            judge_system_prompt: None,
        }
    }
}

impl CouncilConfig {
    pub fn deadline(&self) -> Option<Duration> {
        self.deadline_secs.map(Duration::from_secs)
    }
}

/// Roster overrides. A tier left unset keeps its built-in roster.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TiersConfig {
    #[serde(default)]
    pub lite: Option<Vec<String>>,
    #[serde(default)]
    pub pro: Option<Vec<String>>,
    #[serde(default)]
    pub meta: Option<Vec<String>>,
}

impl TiersConfig {
    pub fn get(&self, tier: Tier) -> Option<&[String]> {
        match tier {
            Tier::Lite => self.lite.as_deref(),
            Tier::Pro => self.pro.as_deref(),
            Tier::Meta => self.meta.as_deref(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file.
    ///
    /// B_i(file exists) → Result
    /// B_i(file is valid TOML) → Result
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::FileRead {
            path: path.to_owned(),
            source: e,
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.to_owned(),
            source: e,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Load from `path` if it exists, otherwise fall back to defaults.
    pub fn load_or_default(path: &Path) -> Result<Self, ConfigError> {
        if path.exists() {
            Self::from_file(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Check tunables that serde cannot express.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.council.judge_model.trim().is_empty() {
            return Err(ConfigError::Invalid("council.judge_model is empty".to_string()));
        }
        if self.council.probe_max_tokens == 0 {
            return Err(ConfigError::Invalid(
                "council.probe_max_tokens must be greater than 0".to_string(),
            ));
        }
        if self.council.max_concurrent_probes == 0 {
            return Err(ConfigError::Invalid(
                "council.max_concurrent_probes must be greater than 0".to_string(),
            ));
        }
        if self.council.deadline_secs == Some(0) {
            return Err(ConfigError::Invalid(
                "council.deadline_secs must be greater than 0 when set".to_string(),
            ));
        }
        if self.openrouter.timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "openrouter.timeout_secs must be greater than 0".to_string(),
            ));
        }
        if self.openrouter.max_retries == 0 {
            return Err(ConfigError::Invalid(
                "openrouter.max_retries must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Resolve API key from config or environment.
    ///
    /// B_i(api key available) → Result
    pub fn resolve_api_key(&self) -> Result<String, ConfigError> {
        if let Some(key) = &self.openrouter.api_key {
            let key = expand_env_vars(key);
            if !key.trim().is_empty() {
                return Ok(key);
            }
        }

        std::env::var(&self.openrouter.api_key_env)
            .ok()
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| ConfigError::MissingApiKey {
                env_var: self.openrouter.api_key_env.clone(),
            })
    }
}

static ENV_VAR_PATTERN: LazyLock<regex::Regex> =
    LazyLock::new(|| regex::Regex::new(r"\$\{([^}]+)\}").expect("valid env var pattern"));

/// Expand environment variables in a string.
///
/// Supports ${VAR_NAME} syntax.
/// If the variable is not set, the placeholder is left unchanged.
pub fn expand_env_vars(s: &str) -> String {
    let mut result = s.to_string();

    for cap in ENV_VAR_PATTERN.captures_iter(s) {
        let var_name = &cap[1];
        if let Ok(value) = std::env::var(var_name) {
            result = result.replace(&cap[0], &value);
        }
    }

    result
}

/// Configuration errors.
///
/// Epistemic origin:
/// - B_i falsified: File not found, parse error, unknown tier
/// - I^B materialized: Missing required values
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    FileRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("Missing API key: set {env_var} env var or openrouter.api_key in config")]
    MissingApiKey { env_var: String },

    #[error("Unknown tier '{0}' (expected one of: lite, pro, meta)")]
    UnknownTier(String),

    #[error("Roster for tier '{0}' is empty")]
    EmptyRoster(Tier),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}
