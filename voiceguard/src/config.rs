//! Service configuration.
//!
//! Configuration is read from a YAML or JSON file (chosen by extension).
//! Secret fields may reference environment variables as `$VAR` or `${VAR}`;
//! they are expanded by [`ServiceConfig::resolve`].

use std::path::Path;
use std::time::Duration;

use anyhow::Result;
use serde::{Deserialize, Serialize};

/// Shared secret used when no configuration overrides it.
pub const DEFAULT_API_KEY: &str = "sk_test_123456789";

/// Public endpoint URL, used for display and logging only.
pub const DEFAULT_ENDPOINT: &str = "https://your-domain.com/api/voice-detection";

/// Default Gemini model for forensic analysis.
pub const DEFAULT_GEMINI_MODEL: &str = "gemini-3-pro-preview";

/// Default Gemini REST base URL.
pub const DEFAULT_GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Top-level configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Shared secret expected in the `x-api-key` header.
    #[serde(default = "default_api_key")]
    pub api_key: String,

    /// Endpoint URL shown in logs and reports.
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    #[serde(default)]
    pub gemini: GeminiSettings,

    #[serde(default)]
    pub runner: RunnerSettings,
}

/// Gemini classifier settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeminiSettings {
    /// API key, usually `$GEMINI_API_KEY`.
    #[serde(default = "default_gemini_api_key")]
    pub api_key: String,

    #[serde(default = "default_gemini_model")]
    pub model: String,

    #[serde(default = "default_gemini_base_url")]
    pub base_url: String,

    /// Per-request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Reasoning budget before the final answer.
    #[serde(default = "default_thinking_budget")]
    pub thinking_budget: u32,

    /// Must exceed `thinking_budget`.
    #[serde(default = "default_max_output_tokens")]
    pub max_output_tokens: u32,
}

/// Scenario runner settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunnerSettings {
    /// Delay before each scenario, for interactive progress display.
    /// Unset means each command's own default.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pacing_ms: Option<u64>,

    /// Upper bound for a single scenario.
    #[serde(default = "default_timeout_secs")]
    pub scenario_timeout_secs: u64,
}

fn default_api_key() -> String {
    DEFAULT_API_KEY.to_string()
}

fn default_endpoint() -> String {
    DEFAULT_ENDPOINT.to_string()
}

fn default_gemini_api_key() -> String {
    "$GEMINI_API_KEY".to_string()
}

fn default_gemini_model() -> String {
    DEFAULT_GEMINI_MODEL.to_string()
}

fn default_gemini_base_url() -> String {
    DEFAULT_GEMINI_BASE_URL.to_string()
}

fn default_timeout_secs() -> u64 {
    60
}

fn default_thinking_budget() -> u32 {
    2048
}

fn default_max_output_tokens() -> u32 {
    4096
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            api_key: default_api_key(),
            endpoint: default_endpoint(),
            gemini: GeminiSettings::default(),
            runner: RunnerSettings::default(),
        }
    }
}

impl Default for GeminiSettings {
    fn default() -> Self {
        Self {
            api_key: default_gemini_api_key(),
            model: default_gemini_model(),
            base_url: default_gemini_base_url(),
            timeout_secs: default_timeout_secs(),
            thinking_budget: default_thinking_budget(),
            max_output_tokens: default_max_output_tokens(),
        }
    }
}

impl Default for RunnerSettings {
    fn default() -> Self {
        Self {
            pacing_ms: None,
            scenario_timeout_secs: default_timeout_secs(),
        }
    }
}

impl GeminiSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl RunnerSettings {
    /// Configured pacing, or zero when unset.
    pub fn pacing(&self) -> Duration {
        self.pacing_or(Duration::ZERO)
    }

    /// Configured pacing, or `default` when unset.
    pub fn pacing_or(&self, default: Duration) -> Duration {
        self.pacing_ms.map(Duration::from_millis).unwrap_or(default)
    }

    pub fn scenario_timeout(&self) -> Duration {
        Duration::from_secs(self.scenario_timeout_secs)
    }
}

impl ServiceConfig {
    /// Load configuration from a `.yaml`, `.yml` or `.json` file.
    ///
    /// Environment references are expanded before returning.
    pub fn load(path: &Path) -> Result<Self> {
        let ext = path.extension().and_then(|s| s.to_str()).unwrap_or("");
        let data = std::fs::read(path)?;
        let cfg: ServiceConfig = match ext {
            "json" => serde_json::from_slice(&data)?,
            "yaml" | "yml" => serde_yaml::from_slice(&data)?,
            _ => anyhow::bail!("unsupported config extension: {}", path.display()),
        };
        cfg.resolve()
    }

    /// Load from `path` if given, otherwise use defaults.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(p) => Self::load(p),
            None => Self::default().resolve(),
        }
    }

    /// Expand environment references in secret fields.
    pub fn resolve(self) -> Result<Self> {
        self.resolve_with(|name| std::env::var(name).ok())
    }

    /// Like [`resolve`](Self::resolve) with a custom variable lookup.
    pub fn resolve_with<F>(mut self, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let raw_key = self.api_key.clone();
        self.api_key = expand_env_with(&self.api_key, &lookup);
        if self.api_key.is_empty() {
            anyhow::bail!("api_key '{}' resolved to empty (env var not set?)", raw_key);
        }
        self.gemini.api_key = expand_env_with(&self.gemini.api_key, &lookup);
        Ok(self)
    }
}

/// Expand a `$VAR` or `${VAR}` reference; other strings are returned as is.
pub fn expand_env_with<F>(s: &str, lookup: F) -> String
where
    F: Fn(&str) -> Option<String>,
{
    if !s.starts_with('$') {
        return s.to_string();
    }
    let var_name = if s.starts_with("${") && s.ends_with('}') {
        &s[2..s.len() - 1]
    } else {
        &s[1..]
    };
    lookup(var_name).unwrap_or_default()
}
