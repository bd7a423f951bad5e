//! # trailmark-core
//!
//! The HTTP engine used by the trailmark services: request and response
//! types, extractors, a radix-tree router, the middleware layer stack and the
//! response observers that let a middleware learn how (and whether) a
//! response was delivered.
//!
//! Applications normally depend on this crate through `trailmark-server`.

mod app;
mod error;
mod extract;
mod handler;
pub mod middleware;
pub mod observer;
mod request;
mod response;
mod router;
mod server;
#[cfg(any(test, feature = "test-utils"))]
mod test_client;

// Public API
pub use app::App;
pub use error::{ApiError, Result};
pub use extract::{FromRequest, FromRequestParts, Json, Path, PathParams, Query, State};
pub use handler::Handler;
pub use middleware::{BoxedNext, LayerStack, MiddlewareLayer, TracingLayer, DEFAULT_BODY_LIMIT};
pub use observer::{CompletionBody, CompletionHandle, ResponseObserver};
pub use request::Request;
pub use response::{Created, IntoResponse, NoContent, Response};
pub use router::{delete, get, patch, post, put, MethodRouter, Router};
pub use server::ServerError;
#[cfg(any(test, feature = "test-utils"))]
pub use test_client::{TestClient, TestRequest, TestResponse};
