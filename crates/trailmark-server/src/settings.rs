//! Server settings read from the environment

use serde::Deserialize;
use std::path::PathBuf;
use trailmark_audit::AuditConfig;
use trailmark_extras::{Config, ConfigError, LogFormat};

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_ttl() -> u64 {
    trailmark_extras::jwt::DEFAULT_TTL_SECS
}

fn default_api_prefix() -> String {
    "/api".to_string()
}

/// Process settings.
///
/// | Variable | Default |
/// |----------|---------|
/// | `HOST` | `127.0.0.1` |
/// | `PORT` | `3000` |
/// | `JWT_SECRET` | required |
/// | `JWT_TTL_SECS` | `86400` |
/// | `API_PREFIX` | `/api` |
/// | `AUDIT_LOG_PATH` | unset (in-memory store) |
/// | `AUDIT_MEMORY_MAX` | unset (in-memory store keeps everything) |
/// | `LOG_FORMAT` | `compact` |
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    pub jwt_secret: String,
    #[serde(default = "default_ttl")]
    pub jwt_ttl_secs: u64,
    #[serde(default = "default_api_prefix")]
    pub api_prefix: String,
    #[serde(default)]
    pub audit_log_path: Option<PathBuf>,
    #[serde(default)]
    pub audit_memory_max: Option<usize>,
    #[serde(default)]
    pub log_format: LogFormat,
}

impl ServerConfig {
    /// Load from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Config::<Self>::from_env()?.into_inner().validated()
    }

    /// Load from explicit key/value pairs.
    pub fn from_pairs<I, K, V>(pairs: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Config::<Self>::from_pairs(pairs)?.into_inner().validated()
    }

    fn validated(self) -> Result<Self, ConfigError> {
        if self.jwt_secret.trim().is_empty() {
            return Err(ConfigError::Invalid {
                name: "JWT_SECRET".to_string(),
                reason: "must not be empty".to_string(),
            });
        }
        if !self.api_prefix.starts_with('/') {
            return Err(ConfigError::Invalid {
                name: "API_PREFIX".to_string(),
                reason: "must start with '/'".to_string(),
            });
        }
        Ok(self)
    }

    /// Socket address to bind.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Audit routing conventions derived from the API prefix.
    ///
    /// The record id follows the entity segment, so its position shifts with
    /// the number of segments in the prefix.
    pub fn audit_config(&self) -> AuditConfig {
        let prefix = self.api_prefix.trim_end_matches('/');
        let depth = prefix.split('/').filter(|s| !s.is_empty()).count();
        AuditConfig {
            api_prefix: prefix.to_string(),
            id_segment: depth + 1,
            excluded_prefixes: vec![format!("{}/users", prefix)],
            ..AuditConfig::default()
        }
    }
}
