//! # trailmark-server
//!
//! A small service wiring the trailmark audit trail end to end: widget and
//! user tables behind bearer authentication, the audit interception layer on
//! every mutating route, and a read API over the recorded changes.

pub mod app;
pub mod routes;
pub mod settings;
pub mod tables;

pub use app::{build_app, AppContext, BootstrapError};
pub use settings::ServerConfig;
pub use tables::{Table, Tables};
