//! Request types for trailmark

use bytes::Bytes;
use http::{request::Parts, Extensions, HeaderMap, Method, Uri, Version};
use std::collections::HashMap;
use std::sync::Arc;

/// HTTP Request wrapper
///
/// Provides access to all parts of an incoming HTTP request. The body is
/// buffered before the middleware stack runs, so layers may inspect it with
/// [`Request::body`] without taking it away from the handler.
pub struct Request {
    pub(crate) parts: Parts,
    pub(crate) body: Option<Bytes>,
    pub(crate) state: Arc<Extensions>,
    pub(crate) path_params: HashMap<String, String>,
}

impl Request {
    /// Create a new request from parts
    pub(crate) fn new(
        parts: Parts,
        body: Bytes,
        state: Arc<Extensions>,
        path_params: HashMap<String, String>,
    ) -> Self {
        Self {
            parts,
            body: Some(body),
            state,
            path_params,
        }
    }

    /// Build a request from a plain `http::Request` and a buffered body.
    ///
    /// Intended for driving a [`LayerStack`](crate::LayerStack) directly in
    /// tests; routed requests are built by the engine.
    pub fn from_http_request(req: http::Request<()>, body: impl Into<Bytes>) -> Self {
        let (parts, _) = req.into_parts();
        Self::new(
            parts,
            body.into(),
            Arc::new(Extensions::new()),
            HashMap::new(),
        )
    }

    /// Get the HTTP method
    pub fn method(&self) -> &Method {
        &self.parts.method
    }

    /// Get the URI
    pub fn uri(&self) -> &Uri {
        &self.parts.uri
    }

    /// Get the HTTP version
    pub fn version(&self) -> Version {
        self.parts.version
    }

    /// Get the headers
    pub fn headers(&self) -> &HeaderMap {
        &self.parts.headers
    }

    /// Get request extensions
    pub fn extensions(&self) -> &Extensions {
        &self.parts.extensions
    }

    /// Get mutable extensions
    pub fn extensions_mut(&mut self) -> &mut Extensions {
        &mut self.parts.extensions
    }

    /// Get the request path
    pub fn path(&self) -> &str {
        self.parts.uri.path()
    }

    /// Get the path together with the query string, as sent by the client
    pub fn path_and_query(&self) -> &str {
        self.parts
            .uri
            .path_and_query()
            .map(|pq| pq.as_str())
            .unwrap_or_else(|| self.parts.uri.path())
    }

    /// Get the query string
    pub fn query_string(&self) -> Option<&str> {
        self.parts.uri.query()
    }

    /// Peek at the buffered body without consuming it
    pub fn body(&self) -> Option<&Bytes> {
        self.body.as_ref()
    }

    /// Take the body bytes (can only be called once)
    pub fn take_body(&mut self) -> Option<Bytes> {
        self.body.take()
    }

    /// Get path parameters
    pub fn path_params(&self) -> &HashMap<String, String> {
        &self.path_params
    }

    /// Get a specific path parameter
    pub fn path_param(&self, name: &str) -> Option<&String> {
        self.path_params.get(name)
    }

    /// Get shared state
    pub fn state(&self) -> &Arc<Extensions> {
        &self.state
    }
}

impl std::fmt::Debug for Request {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Request")
            .field("method", &self.parts.method)
            .field("uri", &self.parts.uri)
            .field("version", &self.parts.version)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_body_peek_does_not_consume() {
        let req = http::Request::builder()
            .method(Method::PUT)
            .uri("/api/widgets/42?dry_run=1")
            .body(())
            .unwrap();
        let mut req = Request::from_http_request(req, "{\"id\":42}");

        assert_eq!(req.body().map(|b| b.len()), Some(9));
        assert_eq!(req.take_body(), Some(Bytes::from("{\"id\":42}")));
        assert!(req.take_body().is_none());
    }

    #[test]
    fn test_path_and_query() {
        let req = http::Request::builder()
            .uri("/api/widgets/42?dry_run=1")
            .body(())
            .unwrap();
        let req = Request::from_http_request(req, Bytes::new());

        assert_eq!(req.path(), "/api/widgets/42");
        assert_eq!(req.path_and_query(), "/api/widgets/42?dry_run=1");
        assert_eq!(req.query_string(), Some("dry_run=1"));
    }
}
