//! Audit log queries

use super::ApiResponse;
use trailmark_audit::{AuditAction, AuditError, AuditQueryService, AuditRecord, Page};
use trailmark_core::{ApiError, Json, Path, PathParams, Query, Result, State};

type Records = Json<ApiResponse<Vec<AuditRecord>>>;

fn store_error(err: AuditError) -> ApiError {
    ApiError::internal("Failed to read audit records").with_internal(err.to_string())
}

/// `GET /logs?limit=&offset=`
pub async fn list_logs(
    State(logs): State<AuditQueryService>,
    Query(page): Query<Page>,
) -> Result<Records> {
    let records = logs.list_all(page).map_err(store_error)?;
    Ok(Json(ApiResponse::data(records)))
}

/// `GET /logs/{id}`
pub async fn get_log(
    State(logs): State<AuditQueryService>,
    Path(id): Path<u64>,
) -> Result<Json<ApiResponse<AuditRecord>>> {
    logs.get_by_id(id)
        .map_err(store_error)?
        .map(|record| Json(ApiResponse::data(record)))
        .ok_or_else(|| ApiError::not_found(format!("Audit record {} not found", id)))
}

/// `GET /logs/user/{user_id}`
pub async fn logs_by_user(
    State(logs): State<AuditQueryService>,
    Path(user_id): Path<i64>,
    Query(page): Query<Page>,
) -> Result<Records> {
    let records = logs.list_by_actor(user_id, page).map_err(store_error)?;
    Ok(Json(ApiResponse::data(records)))
}

/// `GET /logs/entity/{entity}/{entity_id}`
pub async fn logs_by_entity(
    State(logs): State<AuditQueryService>,
    params: PathParams,
    Query(page): Query<Page>,
) -> Result<Records> {
    let entity = params
        .raw("entity")
        .ok_or_else(|| ApiError::bad_request("Missing entity name"))?
        .to_lowercase();
    let entity_id = params
        .raw("entity_id")
        .and_then(|raw| raw.parse::<i64>().ok())
        .ok_or_else(|| ApiError::bad_request("Entity id must be a valid number"))?;

    let records = logs
        .list_by_entity(&entity, entity_id, page)
        .map_err(store_error)?;
    Ok(Json(ApiResponse::data(records)))
}

/// `GET /logs/action/{action}`
pub async fn logs_by_action(
    State(logs): State<AuditQueryService>,
    Path(action): Path<String>,
    Query(page): Query<Page>,
) -> Result<Records> {
    let action: AuditAction = action
        .parse()
        .map_err(|e: trailmark_audit::UnknownAction| ApiError::bad_request(e.to_string()))?;
    let records = logs.list_by_action(action, page).map_err(store_error)?;
    Ok(Json(ApiResponse::data(records)))
}
