use axum::{
    extract::{ConnectInfo, State},
    http::HeaderMap,
    Extension,
};
use serde_json::{json, Value};
use std::net::SocketAddr;

use crate::access::Identity;
use crate::middleware::{client_info, ApiResponse, ApiResult};
use crate::state::AppState;

/// POST /api/v1/auth/logout
///
/// Tokens are stateless, so the client simply drops them; the server only
/// records the event.
pub async fn logout(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    peer: Option<ConnectInfo<SocketAddr>>,
    headers: HeaderMap,
) -> ApiResult<Value> {
    let client = client_info(&headers, peer.map(|c| c.0));
    state.auth().logout(&identity, &client).await;
    Ok(ApiResponse::success(json!({ "logged_out": true })))
}
