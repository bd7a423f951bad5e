//! HTTP server implementation

use crate::error::ApiError;
use crate::middleware::{BoxedNext, LayerStack};
use crate::observer::{CompletionBody, CompletionHandle};
use crate::request::Request;
use crate::response::IntoResponse;
use crate::router::{RouteMatch, Router};
use bytes::Bytes;
use http::{header, HeaderValue, Method, StatusCode};
use http_body::Body;
use http_body_util::{BodyExt, Full, LengthLimitError, Limited};
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use std::convert::Infallible;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tokio::net::TcpListener;
use tracing::{debug, error, info};

/// Errors that stop the server loop
#[derive(Debug, Error)]
pub enum ServerError {
    /// The listen address could not be parsed
    #[error("invalid listen address '{addr}': {source}")]
    InvalidAddress {
        addr: String,
        #[source]
        source: std::net::AddrParseError,
    },

    /// Binding the listener failed
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    /// Accepting a connection failed
    #[error("failed to accept connection: {0}")]
    Accept(#[source] std::io::Error),
}

/// Outgoing response type, with delivery tracking attached
pub(crate) type ServerResponse = http::Response<CompletionBody<Full<Bytes>>>;

/// Everything needed to serve a request, shared by connections
pub(crate) struct Engine {
    pub(crate) router: Router,
    pub(crate) layers: LayerStack,
    pub(crate) body_limit: usize,
}

/// Internal server struct
pub(crate) struct Server {
    engine: Arc<Engine>,
}

impl Server {
    pub(crate) fn new(engine: Engine) -> Self {
        Self {
            engine: Arc::new(engine),
        }
    }

    /// Accept connections until `shutdown` resolves
    pub(crate) async fn run_until<F>(self, addr: &str, shutdown: F) -> Result<(), ServerError>
    where
        F: Future<Output = ()> + Send,
    {
        let addr: SocketAddr = addr.parse().map_err(|source| ServerError::InvalidAddress {
            addr: addr.to_string(),
            source,
        })?;
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| ServerError::Bind { addr, source })?;

        info!(%addr, "trailmark server listening");

        tokio::pin!(shutdown);
        loop {
            let (stream, remote_addr) = tokio::select! {
                accepted = listener.accept() => accepted.map_err(ServerError::Accept)?,
                _ = &mut shutdown => {
                    info!("Shutdown signal received, no longer accepting connections");
                    return Ok(());
                }
            };

            let io = TokioIo::new(stream);
            let engine = self.engine.clone();

            tokio::spawn(async move {
                let service = service_fn(move |req: hyper::Request<Incoming>| {
                    let engine = engine.clone();
                    async move { Ok::<_, Infallible>(dispatch(&engine, req).await) }
                });

                if let Err(err) = http1::Builder::new().serve_connection(io, service).await {
                    debug!(%remote_addr, "Connection error: {}", err);
                }
            });
        }
    }
}

/// Route a single request through the layer stack to its handler.
///
/// The body is buffered (up to the engine's body limit) before any layer
/// runs. A fresh [`CompletionHandle`] is placed in the request extensions and
/// tied to the returned body, so observers resolve once the body has been
/// fully produced.
pub(crate) async fn dispatch<B>(engine: &Engine, req: http::Request<B>) -> ServerResponse
where
    B: Body<Data = Bytes>,
    B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    let start = Instant::now();

    let completion = CompletionHandle::new();
    let (mut parts, body) = req.into_parts();
    parts.extensions.insert(completion.clone());

    let response = match Limited::new(body, engine.body_limit).collect().await {
        Ok(collected) => route(engine, parts, collected.to_bytes(), &method, &path).await,
        Err(err) if err.downcast_ref::<LengthLimitError>().is_some() => {
            ApiError::payload_too_large(format!(
                "Request body exceeds {} bytes",
                engine.body_limit
            ))
            .into_response()
        }
        Err(err) => ApiError::bad_request("Failed to read request body")
            .with_internal(err.to_string())
            .into_response(),
    };

    log_request(&method, &path, response.status(), start);

    let status = response.status();
    response.map(|body| CompletionBody::new(body, status, completion))
}

async fn route(
    engine: &Engine,
    parts: http::request::Parts,
    body: Bytes,
    method: &Method,
    path: &str,
) -> crate::Response {
    let (handler, params) = match engine.router.match_route(path, method) {
        RouteMatch::Found { handler, params } => (handler.clone(), params),
        RouteMatch::NotFound => {
            return ApiError::not_found(format!("No route found for {} {}", method, path))
                .into_response();
        }
        RouteMatch::MethodNotAllowed { allowed } => {
            let allowed: Vec<&str> = allowed.iter().map(|m| m.as_str()).collect();
            let mut response = ApiError::new(
                StatusCode::METHOD_NOT_ALLOWED,
                "method_not_allowed",
                format!("Method {} not allowed for {}", method, path),
            )
            .into_response();
            if let Ok(value) = HeaderValue::from_str(&allowed.join(", ")) {
                response.headers_mut().insert(header::ALLOW, value);
            }
            return response;
        }
    };

    let request = Request::new(parts, body, engine.router.state_ref(), params);
    let final_handler: BoxedNext = handler;

    engine.layers.execute(request, final_handler).await
}

/// Log request completion
fn log_request(method: &Method, path: &str, status: StatusCode, start: Instant) {
    let elapsed = start.elapsed();
    if status.is_success() {
        info!(
            method = %method,
            path = %path,
            status = %status.as_u16(),
            duration_ms = %elapsed.as_millis(),
            "Request completed"
        );
    } else {
        error!(
            method = %method,
            path = %path,
            status = %status.as_u16(),
            duration_ms = %elapsed.as_millis(),
            "Request failed"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::middleware::DEFAULT_BODY_LIMIT;
    use crate::router::{get, put};
    use crate::Json;

    fn engine(body_limit: usize) -> Engine {
        async fn echo(Json(value): Json<serde_json::Value>) -> Json<serde_json::Value> {
            Json(value)
        }
        async fn health() -> &'static str {
            "ok"
        }

        Engine {
            router: Router::new()
                .route("/echo", put(echo))
                .route("/health", get(health)),
            layers: LayerStack::new(),
            body_limit,
        }
    }

    fn request(method: Method, uri: &str, body: &'static str) -> http::Request<Full<Bytes>> {
        http::Request::builder()
            .method(method)
            .uri(uri)
            .body(Full::new(Bytes::from(body)))
            .unwrap()
    }

    #[tokio::test]
    async fn test_dispatch_routes_to_handler() {
        let engine = engine(DEFAULT_BODY_LIMIT);
        let response = dispatch(&engine, request(Method::PUT, "/echo", r#"{"a":1}"#)).await;
        assert_eq!(response.status(), StatusCode::OK);

        let body = response.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(body, Bytes::from(r#"{"a":1}"#));
    }

    #[tokio::test]
    async fn test_dispatch_not_found_and_method_not_allowed() {
        let engine = engine(DEFAULT_BODY_LIMIT);

        let response = dispatch(&engine, request(Method::GET, "/missing", "")).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let response = dispatch(&engine, request(Method::DELETE, "/health", "")).await;
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(response.headers().get(header::ALLOW).unwrap(), "GET");
    }

    #[tokio::test]
    async fn test_dispatch_rejects_oversized_body() {
        let engine = engine(8);
        let response = dispatch(
            &engine,
            request(Method::PUT, "/echo", r#"{"long":"payload"}"#),
        )
        .await;
        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    }
}
