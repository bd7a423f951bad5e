//! Liveness probe

use serde_json::{json, Value};
use trailmark_audit::now_millis;
use trailmark_core::Json;

/// `GET /health`
pub async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "timestamp": now_millis(),
    }))
}
