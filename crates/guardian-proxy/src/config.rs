//! Configuration types and loading logic.

use std::time::Duration;

use anyhow::Context;
use figment::providers::{Env, Format, Toml};
use figment::Figment;
use guardian_tracing::TracingConfig;
use serde::Deserialize;
use thiserror::Error;

/// Top-level proxy configuration. Built once at startup, read-only after.
#[derive(Debug, Clone, Deserialize)]
pub struct GuardianConfig {
    #[serde(default)]
    pub server: ServerConfig,
    pub backend: BackendConfig,
    #[serde(default)]
    pub limits: LimitsConfig,
    pub security: SecurityConfig,
    #[serde(default)]
    pub tracing: TracingConfig,
}

/// Server listen configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_listen_address")]
    pub listen_address: String,
}

/// The single backend every admitted request is forwarded to.
#[derive(Debug, Clone, Deserialize)]
pub struct BackendConfig {
    /// Base origin, e.g. `http://orders.internal:9000`. A trailing slash is
    /// ignored.
    pub url: String,

    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,

    /// Whole-exchange timeout: connect, send and read the full response.
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LimitsConfig {
    /// Largest accepted request body in bytes. Bodies of exactly this size
    /// are accepted.
    #[serde(default = "default_max_body_size")]
    pub max_body_size: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SecurityConfig {
    /// Path prefixes admitted by the guard, e.g. `/api/v1`, `/health`.
    /// Everything else is denied.
    #[serde(default)]
    pub allowed_paths: Vec<String>,
}

/// Rejected configuration values.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("security.allowed_paths must include at least one allowed path")]
    NoAllowedPaths,

    #[error("security.allowed_paths[{index}] is blank")]
    BlankAllowedPath { index: usize },

    #[error("security.allowed_paths[{index}] ({path:?}) has no segments and would admit nothing")]
    RootAllowedPath { index: usize, path: String },

    #[error("backend.url {url:?} must be an absolute http(s) URL: {reason}")]
    InvalidBackendUrl { url: String, reason: String },

    #[error("{field} must be greater than zero")]
    ZeroTimeout { field: &'static str },
}

fn default_listen_address() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_connect_timeout() -> u64 {
    5
}

fn default_timeout() -> u64 {
    10
}

fn default_max_body_size() -> usize {
    16 * 1024
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_address: default_listen_address(),
        }
    }
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_body_size: default_max_body_size(),
        }
    }
}

impl BackendConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl GuardianConfig {
    /// Load configuration from a TOML file and environment variables, then
    /// validate it.
    ///
    /// Priority (highest to lowest):
    /// 1. Environment variables (GUARDIAN_ prefix, __ for nesting)
    /// 2. TOML config file
    /// 3. Defaults
    pub fn load(config_path: &str) -> anyhow::Result<Self> {
        Self::from_figment(
            Figment::new()
                .merge(Toml::file(config_path))
                .merge(Env::prefixed("GUARDIAN_").split("__")),
        )
        .with_context(|| format!("loading configuration from {config_path}"))
    }

    pub fn from_figment(figment: Figment) -> anyhow::Result<Self> {
        let config: GuardianConfig = figment.extract()?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let paths = &self.security.allowed_paths;
        if paths.is_empty() {
            return Err(ConfigError::NoAllowedPaths);
        }
        for (index, path) in paths.iter().enumerate() {
            if path.trim().is_empty() {
                return Err(ConfigError::BlankAllowedPath { index });
            }
            if path.split('/').all(|segment| segment.is_empty()) {
                return Err(ConfigError::RootAllowedPath {
                    index,
                    path: path.clone(),
                });
            }
        }

        validate_backend_url(&self.backend.url)?;

        if self.backend.connect_timeout_secs == 0 {
            return Err(ConfigError::ZeroTimeout {
                field: "backend.connect_timeout_secs",
            });
        }
        if self.backend.timeout_secs == 0 {
            return Err(ConfigError::ZeroTimeout {
                field: "backend.timeout_secs",
            });
        }

        Ok(())
    }
}

fn validate_backend_url(url: &str) -> Result<(), ConfigError> {
    let invalid = |reason: &str| ConfigError::InvalidBackendUrl {
        url: url.to_string(),
        reason: reason.to_string(),
    };

    let uri: http::Uri = url.parse().map_err(|e: http::uri::InvalidUri| invalid(&e.to_string()))?;
    match uri.scheme_str() {
        Some("http") | Some("https") => {}
        Some(_) => return Err(invalid("scheme must be http or https")),
        None => return Err(invalid("missing scheme")),
    }
    if uri.authority().is_none() {
        return Err(invalid("missing host"));
    }
    if uri.query().is_some() {
        return Err(invalid("query strings are not allowed in the base URL"));
    }
    Ok(())
}
