//! Request tracing middleware
//!
//! Opens an `http_request` span per request and logs method, path, status
//! code and duration once the response is produced.

use super::layer::{BoxedNext, MiddlewareLayer};
use crate::request::Request;
use crate::response::Response;
use std::future::Future;
use std::pin::Pin;
use std::time::Instant;
use tracing::{info_span, Instrument, Level};

/// Middleware layer that creates tracing spans for requests
///
/// ```rust,ignore
/// App::new()
///     .layer(TracingLayer::new().with_field("service", "trailmark"))
/// ```
#[derive(Clone)]
pub struct TracingLayer {
    level: Level,
    custom_fields: Vec<(String, String)>,
}

impl TracingLayer {
    /// Create a new TracingLayer with default INFO level
    pub fn new() -> Self {
        Self {
            level: Level::INFO,
            custom_fields: Vec::new(),
        }
    }

    /// Create a TracingLayer with a specific level for successful requests
    pub fn with_level(level: Level) -> Self {
        Self {
            level,
            custom_fields: Vec::new(),
        }
    }

    /// Add a custom field, logged with every completed request
    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.custom_fields.push((key.into(), value.into()));
        self
    }

    fn fields_string(&self) -> String {
        self.custom_fields
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

impl Default for TracingLayer {
    fn default() -> Self {
        Self::new()
    }
}

impl MiddlewareLayer for TracingLayer {
    fn call(
        &self,
        req: Request,
        next: BoxedNext,
    ) -> Pin<Box<dyn Future<Output = Response> + Send + 'static>> {
        let level = self.level;
        let method = req.method().to_string();
        let path = req.uri().path().to_string();
        let fields = self.fields_string();

        Box::pin(async move {
            let start = Instant::now();

            let span = info_span!(
                "http_request",
                method = %method,
                path = %path,
                status = tracing::field::Empty,
                duration_ms = tracing::field::Empty,
            );

            let response = async { next(req).await }.instrument(span.clone()).await;

            let duration_ms = start.elapsed().as_millis() as u64;
            let status = response.status().as_u16();
            span.record("status", status);
            span.record("duration_ms", duration_ms);

            let _enter = span.enter();
            if response.status().is_server_error() {
                tracing::error!(%method, %path, status, duration_ms, %fields, "Request failed");
            } else if response.status().is_client_error() {
                tracing::warn!(%method, %path, status, duration_ms, %fields, "Request rejected");
            } else {
                match level {
                    Level::TRACE => {
                        tracing::trace!(%method, %path, status, duration_ms, %fields, "Request completed")
                    }
                    Level::DEBUG => {
                        tracing::debug!(%method, %path, status, duration_ms, %fields, "Request completed")
                    }
                    _ => {
                        tracing::info!(%method, %path, status, duration_ms, %fields, "Request completed")
                    }
                }
            }

            response
        })
    }

    fn clone_box(&self) -> Box<dyn MiddlewareLayer> {
        Box::new(self.clone())
    }
}
