use crate::error::{GatewayError, Result};
use crate::translate::response::CompletionMeta;
use reqwest::Url;
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_BACKEND_BASE_URL: &str =
    "https://aiplatform.googleapis.com/v1/publishers/google/models";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Bound on establishing the backend connection; 0 disables it.
    /// Responses, including streams, are never cut off once connected.
    #[serde(default)]
    pub connect_timeout_secs: u64,
    #[serde(default)]
    pub backend: BackendConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub response: ResponseConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_backend_key_env")]
    pub api_key_env: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    #[serde(default = "default_gateway_key_env")]
    pub api_key_env: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResponseConfig {
    #[serde(default)]
    pub ids: ResponseIds,
}

/// How `id` and `created` are filled in on responses and chunks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseIds {
    /// `chatcmpl-xxxx` and `0` on every response.
    #[default]
    Placeholder,
    /// A fresh UUID and the current Unix time per response.
    Unique,
}

impl ResponseIds {
    pub fn meta_for(self, model: &str) -> CompletionMeta {
        match self {
            Self::Placeholder => CompletionMeta::placeholder(model),
            Self::Unique => CompletionMeta::unique(model),
        }
    }
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            connect_timeout_secs: 0,
            backend: BackendConfig::default(),
            auth: AuthConfig::default(),
            response: ResponseConfig::default(),
        }
    }
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            api_key_env: default_backend_key_env(),
        }
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            api_key_env: default_gateway_key_env(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8001
}

fn default_base_url() -> String {
    DEFAULT_BACKEND_BASE_URL.to_string()
}

fn default_backend_key_env() -> String {
    "VERTEX_AI_API_KEY".to_string()
}

fn default_gateway_key_env() -> String {
    "PROXY_API_KEY".to_string()
}

/// Secrets resolved once at startup.
#[derive(Clone)]
pub struct Secrets {
    pub backend_api_key: SecretString,
    pub gateway_api_key: SecretString,
}

impl std::fmt::Debug for Secrets {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Secrets")
            .field("backend_api_key", &"[REDACTED]")
            .field("gateway_api_key", &"[REDACTED]")
            .finish()
    }
}

impl GatewayConfig {
    /// Load config from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            GatewayError::config(format!(
                "Failed to read config file {}: {}",
                path.display(),
                e
            ))
        })?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    /// Search standard locations for a config file.
    /// Priority: CLI arg > CWD > XDG config > home dir > built-in defaults
    pub fn find_and_load(explicit_path: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit_path {
            return Self::load(path);
        }

        for candidate in config_search_paths() {
            if candidate.exists() {
                tracing::info!(path = %candidate.display(), "Loading config");
                return Self::load(&candidate);
            }
        }

        tracing::info!("No config file found, using defaults");
        Ok(Self::default())
    }

    /// Resolve both secrets from their environment variables.
    pub fn resolve_secrets(&self) -> Result<Secrets> {
        Ok(Secrets {
            backend_api_key: read_secret(&self.backend.api_key_env, "Vertex AI API key")?,
            gateway_api_key: read_secret(&self.auth.api_key_env, "gateway access key")?,
        })
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn connect_timeout(&self) -> Option<Duration> {
        (self.connect_timeout_secs > 0).then(|| Duration::from_secs(self.connect_timeout_secs))
    }

    /// The configured backend base URL, checked to be usable as a base.
    pub fn backend_base(&self) -> Result<Url> {
        let url = Url::parse(&self.backend.base_url).map_err(|e| {
            GatewayError::config(format!(
                "Invalid backend base_url '{}': {}",
                self.backend.base_url, e
            ))
        })?;
        if url.cannot_be_a_base() {
            return Err(GatewayError::config(format!(
                "Backend base_url '{}' cannot carry a path",
                self.backend.base_url
            )));
        }
        Ok(url)
    }

    /// `<base>/<model>:<method>`, with the model percent-encoded as one path segment.
    pub fn backend_url(&self, model: &str, method: &str) -> Result<Url> {
        let mut url = self.backend_base()?;
        url.path_segments_mut()
            .map_err(|()| GatewayError::config("Backend base_url cannot carry a path"))?
            .pop_if_empty()
            .push(&format!("{model}:{method}"));
        Ok(url)
    }
}

fn read_secret(var: &str, what: &str) -> Result<SecretString> {
    match std::env::var(var) {
        Ok(value) if !value.is_empty() => Ok(SecretString::from(value)),
        _ => Err(GatewayError::config(format!(
            "Environment variable '{var}' is not set. Set it (or add it to .env) with your {what}."
        ))),
    }
}

pub fn config_search_paths() -> Vec<PathBuf> {
    let mut paths = Vec::new();

    // CWD
    paths.push(PathBuf::from("vertex-gateway.toml"));

    if let Ok(xdg) = std::env::var("XDG_CONFIG_HOME") {
        paths.push(PathBuf::from(xdg).join("vertex-gateway").join("config.toml"));
    }
    if let Some(home) = home_dir() {
        paths.push(home.join(".config").join("vertex-gateway").join("config.toml"));
        paths.push(home.join(".vertex-gateway.toml"));
    }

    paths
}

fn home_dir() -> Option<PathBuf> {
    std::env::var("HOME").ok().map(PathBuf::from)
}
