//! User records
//!
//! Identity management routes are never audited.

use super::{object_body, ApiResponse};
use crate::tables::Tables;
use serde_json::Value;
use trailmark_audit::Snapshot;
use trailmark_core::{ApiError, Json, Path, Result, State};

fn public(mut user: Snapshot) -> Snapshot {
    user.remove("password");
    user
}

fn not_found(id: i64) -> ApiError {
    ApiError::not_found(format!("User {} not found", id))
}

/// `GET /users`
pub async fn list_users(State(tables): State<Tables>) -> Json<ApiResponse<Vec<Snapshot>>> {
    let users = tables.users.list().await.into_iter().map(public).collect();
    Json(ApiResponse::data(users))
}

/// `GET /users/{id}`
pub async fn get_user(
    State(tables): State<Tables>,
    Path(id): Path<i64>,
) -> Result<Json<ApiResponse<Snapshot>>> {
    tables
        .users
        .get(id)
        .await
        .map(|user| Json(ApiResponse::data(public(user))))
        .ok_or_else(|| not_found(id))
}

/// `PUT /users/{id}`
pub async fn update_user(
    State(tables): State<Tables>,
    Path(id): Path<i64>,
    Json(body): Json<Value>,
) -> Result<Json<ApiResponse<Snapshot>>> {
    if id <= 0 {
        return Err(ApiError::bad_request("User id is required"));
    }
    let fields = object_body(body)?;
    tables
        .users
        .update(id, fields)
        .await
        .map(|user| Json(ApiResponse::data(public(user)).with_message("User updated")))
        .ok_or_else(|| not_found(id))
}

/// `DELETE /users/{id}`
pub async fn delete_user(
    State(tables): State<Tables>,
    Path(id): Path<i64>,
) -> Result<Json<ApiResponse<()>>> {
    if tables.users.remove(id).await {
        Ok(Json(ApiResponse::message("User deleted")))
    } else {
        Err(not_found(id))
    }
}
