//! HTTP handlers

pub mod health;
pub mod logs;
pub mod users;
pub mod widgets;

use serde::Serialize;
use serde_json::Value;
use trailmark_audit::Snapshot;
use trailmark_core::ApiError;

/// Success envelope: `{"success": true, "data": ..., "message": ...}`.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl<T> ApiResponse<T> {
    /// Wrap a payload.
    pub fn data(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: None,
        }
    }

    /// Attach a human-readable message.
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}

impl ApiResponse<()> {
    /// A message without payload.
    pub fn message(message: impl Into<String>) -> Self {
        Self {
            success: true,
            data: None,
            message: Some(message.into()),
        }
    }
}

/// Require a JSON object body.
pub(crate) fn object_body(body: Value) -> Result<Snapshot, ApiError> {
    crate::tables::snapshot(body)
        .ok_or_else(|| ApiError::bad_request("Request body must be a JSON object"))
}
