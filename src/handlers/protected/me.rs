use axum::{extract::State, Extension};

use crate::access::{Identity, Tree};
use crate::database::models::{Node, NodeKind};
use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult, JsonBody};
use crate::services::{PasswordChange, Profile};
use crate::state::AppState;

/// GET /api/v1/me - the caller's account, roles and effective permissions
pub async fn profile(State(state): State<AppState>, Extension(identity): Extension<Identity>) -> ApiResult<Profile> {
    let profile = state.auth().profile(&identity).await?;
    Ok(ApiResponse::success(profile))
}

/// PUT /api/v1/me/password - the old password is mandatory here
pub async fn change_password(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    JsonBody(change): JsonBody<PasswordChange>,
) -> ApiResult<()> {
    if change.old_password.as_deref().map_or(true, str::is_empty) {
        return Err(ApiError::bad_request("old_password is required"));
    }
    state.users().change_password(identity.user_id, change).await?;
    Ok(ApiResponse::success(()))
}

/// GET /api/v1/menus/user - the menu tree filtered by the caller's
/// effective permissions, with ancestors of every visible menu kept
pub async fn menus(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
) -> ApiResult<Vec<Tree<Node>>> {
    let granted = state.roles().effective_codes(&identity).await?;
    let tree = state.nodes(NodeKind::Menu).visible_tree(&granted).await?;
    Ok(ApiResponse::success(tree))
}
