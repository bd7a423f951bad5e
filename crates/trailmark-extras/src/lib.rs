//! # trailmark-extras
//!
//! Ambient services shared by the trailmark crates, each behind a Cargo
//! feature (all enabled by default):
//!
//! - `jwt` - bearer credential verification, [`jwt::JwtLayer`] and the
//!   [`jwt::AuthUser`] extractor
//! - `config` - `.env` loading and typed configuration from environment
//!   variables
//! - `logging` - `tracing-subscriber` bootstrap

#![warn(missing_docs)]

// JWT authentication module
#[cfg(feature = "jwt")]
pub mod jwt;

// Configuration management module
#[cfg(feature = "config")]
pub mod config;

// Tracing subscriber bootstrap
#[cfg(feature = "logging")]
pub mod logging;

#[cfg(feature = "jwt")]
pub use jwt::{ActorDirectory, AuthUser, CredentialError, Identity, JwtLayer, TokenVerifier};

#[cfg(feature = "config")]
pub use config::{load_dotenv, Config, ConfigError, Environment};

#[cfg(feature = "logging")]
pub use logging::{init_tracing, LogFormat};
