use axum::extract::State;
use serde::Deserialize;

use crate::database::models::{User, UserFilter};
use crate::middleware::{ApiResponse, ApiResult, IdParam, JsonBody, QueryParams};
use crate::services::{PasswordChange, UserInput, UserPatch};
use crate::state::AppState;
use crate::types::{Page, PageRequest};

#[derive(Debug, Deserialize)]
pub struct RoleAssignment {
    pub role_ids: Vec<i64>,
}

/// GET /api/v1/users?username=&name=&status=&organization_id=&page=&size=
pub async fn list(
    State(state): State<AppState>,
    QueryParams(filter): QueryParams<UserFilter>,
    QueryParams(page): QueryParams<PageRequest>,
) -> ApiResult<Page<User>> {
    let users = state.users().page(&filter, page).await?;
    Ok(ApiResponse::success(users))
}

pub async fn get(State(state): State<AppState>, IdParam(id): IdParam) -> ApiResult<User> {
    let user = state.users().get(id).await?;
    Ok(ApiResponse::success(user))
}

pub async fn create(State(state): State<AppState>, JsonBody(input): JsonBody<UserInput>) -> ApiResult<User> {
    let user = state.users().create(input).await?;
    Ok(ApiResponse::created(user))
}

pub async fn update(
    State(state): State<AppState>,
    IdParam(id): IdParam,
    JsonBody(patch): JsonBody<UserPatch>,
) -> ApiResult<User> {
    let user = state.users().update(id, patch).await?;
    Ok(ApiResponse::success(user))
}

pub async fn delete(State(state): State<AppState>, IdParam(id): IdParam) -> ApiResult<()> {
    state.users().delete(id).await?;
    Ok(ApiResponse::success(()))
}

/// PUT /api/v1/users/:id/password - administrative reset; the old
/// password is only checked when supplied
pub async fn reset_password(
    State(state): State<AppState>,
    IdParam(id): IdParam,
    JsonBody(change): JsonBody<PasswordChange>,
) -> ApiResult<()> {
    state.users().change_password(id, change).await?;
    Ok(ApiResponse::success(()))
}

/// PUT /api/v1/users/:id/roles
pub async fn set_roles(
    State(state): State<AppState>,
    IdParam(id): IdParam,
    JsonBody(body): JsonBody<RoleAssignment>,
) -> ApiResult<User> {
    let user = state.users().set_roles(id, &body.role_ids).await?;
    Ok(ApiResponse::success(user))
}
