//! Widget CRUD

use super::{object_body, ApiResponse};
use crate::tables::Tables;
use serde_json::Value;
use trailmark_audit::Snapshot;
use trailmark_core::{ApiError, Created, Json, NoContent, Path, Result, State};

fn not_found(id: i64) -> ApiError {
    ApiError::not_found(format!("Widget {} not found", id))
}

/// `GET /widgets`
pub async fn list_widgets(State(tables): State<Tables>) -> Json<ApiResponse<Vec<Snapshot>>> {
    Json(ApiResponse::data(tables.widgets.list().await))
}

/// `POST /widgets`
pub async fn create_widget(
    State(tables): State<Tables>,
    Json(body): Json<Value>,
) -> Result<Created<ApiResponse<Snapshot>>> {
    let widget = tables.widgets.insert(object_body(body)?).await;
    Ok(Created(ApiResponse::data(widget).with_message("Widget created")))
}

/// `GET /widgets/{id}`
pub async fn get_widget(
    State(tables): State<Tables>,
    Path(id): Path<i64>,
) -> Result<Json<ApiResponse<Snapshot>>> {
    tables
        .widgets
        .get(id)
        .await
        .map(|widget| Json(ApiResponse::data(widget)))
        .ok_or_else(|| not_found(id))
}

/// `PUT /widgets/{id}` and `PATCH /widgets/{id}`
pub async fn update_widget(
    State(tables): State<Tables>,
    Path(id): Path<i64>,
    Json(body): Json<Value>,
) -> Result<Json<ApiResponse<Snapshot>>> {
    let fields = object_body(body)?;
    tables
        .widgets
        .update(id, fields)
        .await
        .map(|widget| Json(ApiResponse::data(widget).with_message("Widget updated")))
        .ok_or_else(|| not_found(id))
}

/// `DELETE /widgets/{id}`
pub async fn delete_widget(State(tables): State<Tables>, Path(id): Path<i64>) -> Result<NoContent> {
    if tables.widgets.remove(id).await {
        Ok(NoContent)
    } else {
        Err(not_found(id))
    }
}
