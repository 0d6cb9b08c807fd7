use axum::{
    extract::{Request, State},
    http::{header, HeaderMap},
    middleware::Next,
    response::Response,
};
use std::net::SocketAddr;

use crate::error::ApiError;
use crate::services::ClientInfo;
use crate::state::AppState;

/// Bearer-token middleware: verifies the access token and injects the
/// caller's `Identity` into request extensions
pub async fn require_identity(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = extract_bearer(request.headers()).map_err(ApiError::unauthorized)?;
    let identity = state.auth().authenticate(token).await?;

    tracing::debug!(user_id = identity.user_id, username = %identity.username, "authenticated");
    request.extensions_mut().insert(identity);
    Ok(next.run(request).await)
}

/// Extract the token from `Authorization: Bearer <token>`
pub fn extract_bearer(headers: &HeaderMap) -> Result<&str, String> {
    let value = headers
        .get(header::AUTHORIZATION)
        .ok_or_else(|| "Missing Authorization header".to_string())?
        .to_str()
        .map_err(|_| "Invalid Authorization header format".to_string())?;

    match value.strip_prefix("Bearer ") {
        Some(token) if !token.trim().is_empty() => Ok(token.trim()),
        Some(_) => Err("Empty bearer token".to_string()),
        None => Err("Authorization header must use Bearer token format".to_string()),
    }
}

/// Client address and agent, preferring proxy headers over the socket peer
pub fn client_info(headers: &HeaderMap, peer: Option<SocketAddr>) -> ClientInfo {
    let forwarded = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty());
    let real_ip = headers
        .get("x-real-ip")
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty());

    let ip = forwarded
        .or(real_ip)
        .map(str::to_string)
        .or_else(|| peer.map(|p| p.ip().to_string()))
        .unwrap_or_default();

    let user_agent = headers
        .get(header::USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();

    ClientInfo { ip, user_agent }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(pairs: &[(&'static str, &'static str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (k, v) in pairs {
            map.insert(*k, HeaderValue::from_static(v));
        }
        map
    }

    #[test]
    fn bearer_is_required() {
        assert!(extract_bearer(&HeaderMap::new()).is_err());
        assert!(extract_bearer(&headers(&[("authorization", "Basic abc")])).is_err());
        assert!(extract_bearer(&headers(&[("authorization", "Bearer   ")])).is_err());
        assert_eq!(extract_bearer(&headers(&[("authorization", "Bearer abc.def")])).unwrap(), "abc.def");
    }

    #[test]
    fn forwarded_address_wins_over_peer() {
        let peer: SocketAddr = "127.0.0.1:9000".parse().unwrap();
        let info = client_info(
            &headers(&[("x-forwarded-for", "10.1.1.1, 10.0.0.2"), ("user-agent", "curl/8")]),
            Some(peer),
        );
        assert_eq!(info.ip, "10.1.1.1");
        assert_eq!(info.user_agent, "curl/8");

        assert_eq!(client_info(&HeaderMap::new(), Some(peer)).ip, "127.0.0.1");
    }
}
