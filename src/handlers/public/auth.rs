use axum::{
    extract::{ConnectInfo, State},
    http::HeaderMap,
};
use std::net::SocketAddr;

use crate::middleware::{client_info, ApiResponse, ApiResult, JsonBody};
use crate::services::{LoginRequest, LoginResponse, RefreshRequest};
use crate::state::AppState;

/// POST /api/v1/auth/login
///
/// Exchanges credentials for an access/refresh token pair. Every attempt,
/// successful or not, lands in the login log.
pub async fn login(
    State(state): State<AppState>,
    peer: Option<ConnectInfo<SocketAddr>>,
    headers: HeaderMap,
    JsonBody(request): JsonBody<LoginRequest>,
) -> ApiResult<LoginResponse> {
    let client = client_info(&headers, peer.map(|c| c.0));
    let response = state.auth().login(request, &client).await?;
    Ok(ApiResponse::success(response))
}

/// POST /api/v1/auth/refresh
pub async fn refresh(
    State(state): State<AppState>,
    JsonBody(request): JsonBody<RefreshRequest>,
) -> ApiResult<LoginResponse> {
    let response = state.auth().refresh(request).await?;
    Ok(ApiResponse::success(response))
}
