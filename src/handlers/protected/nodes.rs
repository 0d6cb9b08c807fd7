//! Organizations, menus and permissions share one set of handlers; the
//! router tags each sub-tree with its `NodeKind` through an extension.

use axum::{extract::State, Extension};

use crate::access::Tree;
use crate::database::models::{Node, NodeKind};
use crate::middleware::{ApiResponse, ApiResult, IdParam, JsonBody};
use crate::services::{NodeInput, NodePatch};
use crate::state::AppState;

/// GET /api/v1/{kind} - flat list ordered by level, sort order, id
pub async fn list(State(state): State<AppState>, Extension(kind): Extension<NodeKind>) -> ApiResult<Vec<Node>> {
    let nodes = state.nodes(kind).list().await?;
    Ok(ApiResponse::success(nodes))
}

/// GET /api/v1/{kind}/tree
pub async fn tree(
    State(state): State<AppState>,
    Extension(kind): Extension<NodeKind>,
) -> ApiResult<Vec<Tree<Node>>> {
    let tree = state.nodes(kind).tree().await?;
    Ok(ApiResponse::success(tree))
}

pub async fn get(
    State(state): State<AppState>,
    Extension(kind): Extension<NodeKind>,
    IdParam(id): IdParam,
) -> ApiResult<Node> {
    let node = state.nodes(kind).get(id).await?;
    Ok(ApiResponse::success(node))
}

pub async fn create(
    State(state): State<AppState>,
    Extension(kind): Extension<NodeKind>,
    JsonBody(input): JsonBody<NodeInput>,
) -> ApiResult<Node> {
    let node = state.nodes(kind).create(input).await?;
    Ok(ApiResponse::created(node))
}

pub async fn update(
    State(state): State<AppState>,
    Extension(kind): Extension<NodeKind>,
    IdParam(id): IdParam,
    JsonBody(patch): JsonBody<NodePatch>,
) -> ApiResult<Node> {
    let node = state.nodes(kind).update(id, patch).await?;
    Ok(ApiResponse::success(node))
}

pub async fn delete(
    State(state): State<AppState>,
    Extension(kind): Extension<NodeKind>,
    IdParam(id): IdParam,
) -> ApiResult<()> {
    state.nodes(kind).delete(id).await?;
    Ok(ApiResponse::success(()))
}
