//! Middleware infrastructure for trailmark
//!
//! Middleware is added with [`App::layer`](crate::App::layer). Layers run in
//! the order they are added: the first layer sees the request first and the
//! response last.
//!
//! ```rust,ignore
//! App::new()
//!     .layer(TracingLayer::new())
//!     .layer(JwtLayer::new(verifier))
//!     .route("/", get(handler))
//! ```

mod layer;
mod tracing_layer;

pub use layer::{BoxedNext, LayerStack, MiddlewareLayer};
pub use tracing_layer::TracingLayer;

/// Default maximum accepted request body size (10 MiB)
pub const DEFAULT_BODY_LIMIT: usize = 10 * 1024 * 1024;
