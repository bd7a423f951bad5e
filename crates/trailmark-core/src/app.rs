//! Application builder

use crate::middleware::{LayerStack, MiddlewareLayer, DEFAULT_BODY_LIMIT};
use crate::router::{MethodRouter, Router};
use crate::server::{Engine, Server, ServerError};
use std::future::Future;

/// Application builder: routes, shared state, middleware and the server loop
///
/// ```rust,ignore
/// App::new()
///     .state(store.clone())
///     .layer(TracingLayer::new())
///     .layer(JwtLayer::new(verifier))
///     .route("/api/widgets/{id}", get(show).put(update))
///     .run("127.0.0.1:8080")
///     .await?;
/// ```
pub struct App {
    router: Router,
    layers: LayerStack,
    body_limit: usize,
}

impl App {
    /// Create a new application with the default 10 MiB body limit
    pub fn new() -> Self {
        Self {
            router: Router::new(),
            layers: LayerStack::new(),
            body_limit: DEFAULT_BODY_LIMIT,
        }
    }

    /// Set the maximum accepted request body size in bytes
    pub fn body_limit(mut self, limit: usize) -> Self {
        self.body_limit = limit;
        self
    }

    /// Add a route
    pub fn route(mut self, path: &str, method_router: MethodRouter) -> Self {
        self.router = self.router.route(path, method_router);
        self
    }

    /// Add shared state, extracted in handlers with [`State`](crate::State)
    pub fn state<S: Clone + Send + Sync + 'static>(mut self, state: S) -> Self {
        self.router = self.router.state(state);
        self
    }

    /// Add a middleware layer
    ///
    /// Layers run in the order they are added (first added is outermost).
    pub fn layer<L: MiddlewareLayer>(mut self, layer: L) -> Self {
        self.layers.push(Box::new(layer));
        self
    }

    /// Get the middleware stack
    pub fn layers(&self) -> &LayerStack {
        &self.layers
    }

    pub(crate) fn into_engine(self) -> Engine {
        Engine {
            router: self.router,
            layers: self.layers,
            body_limit: self.body_limit,
        }
    }

    /// Serve on `addr` forever
    pub async fn run(self, addr: &str) -> Result<(), ServerError> {
        self.run_until(addr, std::future::pending()).await
    }

    /// Serve on `addr` until `shutdown` resolves
    ///
    /// Connections that are already open are left to finish on their own.
    pub async fn run_until<F>(self, addr: &str, shutdown: F) -> Result<(), ServerError>
    where
        F: Future<Output = ()> + Send,
    {
        Server::new(self.into_engine())
            .run_until(addr, shutdown)
            .await
    }
}

impl Default for App {
    fn default() -> Self {
        Self::new()
    }
}
