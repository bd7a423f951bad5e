//! Router implementation using radix tree (matchit)
//!
//! Routes support dynamic path parameters using `{param}` syntax:
//!
//! ```rust,ignore
//! use trailmark_core::{Router, get, put, delete};
//!
//! let router = Router::new()
//!     .route("/api/widgets/{id}", get(show).put(update).delete(destroy))
//!     .route("/api/logs/entity/{entity}/{entity_id}", get(by_entity));
//! ```
//!
//! Conflicting routes are rejected at registration time with a panic, since
//! they are always a programming error.

use crate::handler::{into_boxed_handler, BoxedHandler, Handler};
use http::{Extensions, Method};
use matchit::Router as MatchitRouter;
use std::collections::HashMap;
use std::sync::Arc;

/// HTTP method router for a single path
#[derive(Clone, Default)]
pub struct MethodRouter {
    handlers: HashMap<Method, BoxedHandler>,
}

impl MethodRouter {
    /// Create a new empty method router
    pub fn new() -> Self {
        Self::default()
    }

    fn on<H, T>(mut self, method: Method, handler: H) -> Self
    where
        H: Handler<T>,
        T: 'static,
    {
        if self.handlers.contains_key(&method) {
            panic!(
                "Duplicate handler for method {} on the same path",
                method.as_str()
            );
        }
        self.handlers.insert(method, into_boxed_handler(handler));
        self
    }

    /// Add a GET handler
    pub fn get<H: Handler<T>, T: 'static>(self, handler: H) -> Self {
        self.on(Method::GET, handler)
    }

    /// Add a POST handler
    pub fn post<H: Handler<T>, T: 'static>(self, handler: H) -> Self {
        self.on(Method::POST, handler)
    }

    /// Add a PUT handler
    pub fn put<H: Handler<T>, T: 'static>(self, handler: H) -> Self {
        self.on(Method::PUT, handler)
    }

    /// Add a PATCH handler
    pub fn patch<H: Handler<T>, T: 'static>(self, handler: H) -> Self {
        self.on(Method::PATCH, handler)
    }

    /// Add a DELETE handler
    pub fn delete<H: Handler<T>, T: 'static>(self, handler: H) -> Self {
        self.on(Method::DELETE, handler)
    }

    pub(crate) fn get_handler(&self, method: &Method) -> Option<&BoxedHandler> {
        self.handlers.get(method)
    }

    /// Get allowed methods for 405 response
    pub(crate) fn allowed_methods(&self) -> Vec<Method> {
        let mut methods: Vec<Method> = self.handlers.keys().cloned().collect();
        methods.sort_by(|a, b| a.as_str().cmp(b.as_str()));
        methods
    }
}

/// Create a GET route handler
pub fn get<H: Handler<T>, T: 'static>(handler: H) -> MethodRouter {
    MethodRouter::new().get(handler)
}

/// Create a POST route handler
pub fn post<H: Handler<T>, T: 'static>(handler: H) -> MethodRouter {
    MethodRouter::new().post(handler)
}

/// Create a PUT route handler
pub fn put<H: Handler<T>, T: 'static>(handler: H) -> MethodRouter {
    MethodRouter::new().put(handler)
}

/// Create a PATCH route handler
pub fn patch<H: Handler<T>, T: 'static>(handler: H) -> MethodRouter {
    MethodRouter::new().patch(handler)
}

/// Create a DELETE route handler
pub fn delete<H: Handler<T>, T: 'static>(handler: H) -> MethodRouter {
    MethodRouter::new().delete(handler)
}

/// Main router
pub struct Router {
    inner: MatchitRouter<MethodRouter>,
    state: Arc<Extensions>,
    /// Original patterns keyed by matchit path, for conflict messages
    registered: HashMap<String, String>,
}

impl Router {
    /// Create a new router
    pub fn new() -> Self {
        Self {
            inner: MatchitRouter::new(),
            state: Arc::new(Extensions::new()),
            registered: HashMap::new(),
        }
    }

    /// Add a route
    ///
    /// # Panics
    ///
    /// Panics when the pattern conflicts with an already registered route.
    pub fn route(mut self, path: &str, method_router: MethodRouter) -> Self {
        let matchit_path = convert_path_params(path);

        if let Err(e) = self.inner.insert(matchit_path.clone(), method_router) {
            let existing = self
                .registered
                .get(&matchit_path)
                .map(String::as_str)
                .unwrap_or("<unknown>");
            panic!(
                "Route conflict: '{}' conflicts with '{}' ({})",
                path, existing, e
            );
        }
        self.registered.insert(matchit_path, path.to_string());
        self
    }

    /// Add application state, available to handlers through [`State`](crate::State)
    pub fn state<S: Clone + Send + Sync + 'static>(mut self, state: S) -> Self {
        Arc::make_mut(&mut self.state).insert(state);
        self
    }

    /// Match a request and return the handler + params
    pub(crate) fn match_route(&self, path: &str, method: &Method) -> RouteMatch<'_> {
        match self.inner.at(path) {
            Ok(matched) => {
                let method_router = matched.value;

                if let Some(handler) = method_router.get_handler(method) {
                    let params: HashMap<String, String> = matched
                        .params
                        .iter()
                        .map(|(k, v)| (k.to_string(), v.to_string()))
                        .collect();

                    RouteMatch::Found { handler, params }
                } else {
                    RouteMatch::MethodNotAllowed {
                        allowed: method_router.allowed_methods(),
                    }
                }
            }
            Err(_) => RouteMatch::NotFound,
        }
    }

    /// Get shared state
    pub(crate) fn state_ref(&self) -> Arc<Extensions> {
        self.state.clone()
    }

    /// Registered route patterns, in `{param}` syntax
    pub fn routes(&self) -> impl Iterator<Item = &str> {
        self.registered.values().map(String::as_str)
    }
}

impl Default for Router {
    fn default() -> Self {
        Self::new()
    }
}

/// Result of route matching
pub(crate) enum RouteMatch<'a> {
    Found {
        handler: &'a BoxedHandler,
        params: HashMap<String, String>,
    },
    NotFound,
    MethodNotAllowed {
        allowed: Vec<Method>,
    },
}

/// Convert {param} style to :param for matchit
fn convert_path_params(path: &str) -> String {
    let mut result = String::with_capacity(path.len());

    for ch in path.chars() {
        match ch {
            '{' => result.push(':'),
            '}' => {}
            _ => result.push(ch),
        }
    }

    result
}
