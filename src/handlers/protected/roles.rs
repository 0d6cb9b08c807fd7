use axum::extract::State;
use serde::Deserialize;

use crate::database::models::{Role, RoleFilter};
use crate::middleware::{ApiResponse, ApiResult, IdParam, JsonBody, QueryParams};
use crate::services::{RoleInput, RolePatch};
use crate::state::AppState;
use crate::types::{Page, PageRequest};

#[derive(Debug, Deserialize)]
pub struct PermissionAssignment {
    pub permission_ids: Vec<i64>,
}

/// GET /api/v1/roles?name=&code=&status=&page=&size=
pub async fn list(
    State(state): State<AppState>,
    QueryParams(filter): QueryParams<RoleFilter>,
    QueryParams(page): QueryParams<PageRequest>,
) -> ApiResult<Page<Role>> {
    let roles = state.roles().page(&filter, page).await?;
    Ok(ApiResponse::success(roles))
}

/// GET /api/v1/roles/all - every role, for assignment pickers
pub async fn list_all(State(state): State<AppState>) -> ApiResult<Vec<Role>> {
    let roles = state.roles().list_all().await?;
    Ok(ApiResponse::success(roles))
}

pub async fn get(State(state): State<AppState>, IdParam(id): IdParam) -> ApiResult<Role> {
    let role = state.roles().get(id).await?;
    Ok(ApiResponse::success(role))
}

pub async fn create(State(state): State<AppState>, JsonBody(input): JsonBody<RoleInput>) -> ApiResult<Role> {
    let role = state.roles().create(input).await?;
    Ok(ApiResponse::created(role))
}

pub async fn update(
    State(state): State<AppState>,
    IdParam(id): IdParam,
    JsonBody(patch): JsonBody<RolePatch>,
) -> ApiResult<Role> {
    let role = state.roles().update(id, patch).await?;
    Ok(ApiResponse::success(role))
}

pub async fn delete(State(state): State<AppState>, IdParam(id): IdParam) -> ApiResult<()> {
    state.roles().delete(id).await?;
    Ok(ApiResponse::success(()))
}

/// PUT /api/v1/roles/:id/permissions - replaces the whole grant set
pub async fn set_permissions(
    State(state): State<AppState>,
    IdParam(id): IdParam,
    JsonBody(body): JsonBody<PermissionAssignment>,
) -> ApiResult<Role> {
    let role = state.roles().set_permissions(id, &body.permission_ids).await?;
    Ok(ApiResponse::success(role))
}
