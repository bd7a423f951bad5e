//! Configuration management with environment variable support.
//!
//! `.env` files are loaded with `dotenvy`; typed configuration is
//! deserialized from the environment with `envy`, where each struct field
//! maps to its SCREAMING_SNAKE_CASE variable.
//!
//! ```ignore
//! use trailmark_extras::config::{load_dotenv, Config};
//!
//! load_dotenv();
//!
//! #[derive(Deserialize)]
//! struct ServerConfig {
//!     port: u16,          // PORT
//!     jwt_secret: String, // JWT_SECRET
//! }
//!
//! let config = Config::<ServerConfig>::from_env()?;
//! ```

use serde::de::DeserializeOwned;
use std::fmt;
use thiserror::Error;

/// Variable holding the environment profile name
pub const ENV_PROFILE_VAR: &str = "TRAILMARK_ENV";

/// Error type for configuration loading failures.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Environment variable deserialization failed.
    #[error("Configuration error: {0}")]
    Env(#[from] envy::Error),

    /// A required environment variable is missing.
    #[error("Missing required environment variable: {0}")]
    MissingVar(String),

    /// A value was present but unusable.
    #[error("Invalid value for {name}: {reason}")]
    Invalid {
        /// Variable name
        name: String,
        /// What is wrong with it
        reason: String,
    },
}

/// Environment profile for the application.
///
/// Detected from the `TRAILMARK_ENV` environment variable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Environment {
    /// Development environment with debug logging.
    Development,
    /// Production environment.
    Production,
    /// Custom environment name for specialized deployments.
    Custom(String),
}

impl Environment {
    /// Detect the current environment from `TRAILMARK_ENV`.
    ///
    /// `production`/`prod` and `development`/`dev` are recognized; unset means
    /// development and anything else is kept as a custom profile.
    pub fn current() -> Self {
        Self::from_name(std::env::var(ENV_PROFILE_VAR).ok().as_deref())
    }

    fn from_name(name: Option<&str>) -> Self {
        match name {
            Some("production") | Some("prod") => Self::Production,
            Some("development") | Some("dev") | None => Self::Development,
            Some(other) => Self::Custom(other.to_string()),
        }
    }

    /// Check if running in production mode.
    pub fn is_production(&self) -> bool {
        matches!(self, Self::Production)
    }

    /// Check if running in development mode.
    pub fn is_development(&self) -> bool {
        matches!(self, Self::Development)
    }

    /// Get the environment name as a string.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Development => "development",
            Self::Production => "production",
            Self::Custom(name) => name,
        }
    }

    /// Default log level for this environment.
    ///
    /// - Development: "debug"
    /// - Production and custom profiles: "info"
    pub fn default_log_level(&self) -> &'static str {
        match self {
            Self::Development => "debug",
            Self::Production | Self::Custom(_) => "info",
        }
    }
}

impl Default for Environment {
    fn default() -> Self {
        Self::current()
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Typed configuration deserialized from environment variables.
#[derive(Debug, Clone)]
pub struct Config<T>(pub T);

impl<T: DeserializeOwned> Config<T> {
    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if required environment variables are missing
    /// or if deserialization fails.
    pub fn from_env() -> Result<Self, ConfigError> {
        envy::from_env::<T>().map(Config).map_err(ConfigError::from)
    }

    /// Load configuration from variables starting with `<prefix>_`.
    pub fn from_env_prefixed(prefix: &str) -> Result<Self, ConfigError> {
        envy::prefixed(format!("{}_", prefix))
            .from_env::<T>()
            .map(Config)
            .map_err(ConfigError::from)
    }

    /// Load configuration from an explicit set of key/value pairs.
    ///
    /// Keys use the same SCREAMING_SNAKE_CASE names as the environment.
    pub fn from_pairs<I, K, V>(pairs: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        envy::from_iter::<_, T>(pairs.into_iter().map(|(k, v)| (k.into(), v.into())))
            .map(Config)
            .map_err(ConfigError::from)
    }

    /// Get the inner configuration value.
    pub fn into_inner(self) -> T {
        self.0
    }
}

impl<T> std::ops::Deref for Config<T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

/// Load environment variables from a `.env` file in the current directory.
///
/// A missing file is not an error, and variables already set in the
/// environment take precedence over `.env` values.
pub fn load_dotenv() {
    let _ = dotenvy::dotenv();
}

/// Load environment variables from a specific file path.
pub fn load_dotenv_from<P: AsRef<std::path::Path>>(path: P) {
    let _ = dotenvy::from_path(path);
}

/// Read a required environment variable.
pub fn require_env(name: &str) -> Result<String, ConfigError> {
    std::env::var(name).map_err(|_| ConfigError::MissingVar(name.to_string()))
}
