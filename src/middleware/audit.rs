use axum::{
    extract::{ConnectInfo, OriginalUri, Request, State},
    http::Method,
    middleware::Next,
    response::Response,
};
use std::net::SocketAddr;
use std::time::Instant;

use super::auth::client_info;
use crate::access::Identity;
use crate::database::models::NewOperationLog;
use crate::state::AppState;

/// Operation-log middleware. Runs inside the token middleware so the
/// caller is known; only mutating methods are recorded.
pub async fn record_operation(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let method = request.method().clone();
    if !is_mutating(&method) {
        return next.run(request).await;
    }

    let identity = request.extensions().get::<Identity>().cloned();
    let path = request
        .extensions()
        .get::<OriginalUri>()
        .map(|uri| uri.0.path().to_string())
        .unwrap_or_else(|| request.uri().path().to_string());
    let peer = request.extensions().get::<ConnectInfo<SocketAddr>>().map(|c| c.0);
    let client = client_info(request.headers(), peer);

    let started = Instant::now();
    let response = next.run(request).await;

    if let Some(identity) = identity {
        let log = NewOperationLog {
            user_id: Some(identity.user_id),
            username: identity.username,
            module: module_of(&path),
            action: action_of(&method).to_string(),
            method: method.to_string(),
            path,
            status_code: i32::from(response.status().as_u16()),
            duration_ms: started.elapsed().as_millis() as i64,
            client_ip: client.ip,
            user_agent: client.user_agent,
        };
        state.audit().record_operation(log).await;
    }

    response
}

fn is_mutating(method: &Method) -> bool {
    matches!(*method, Method::POST | Method::PUT | Method::PATCH | Method::DELETE)
}

fn action_of(method: &Method) -> &'static str {
    match *method {
        Method::POST => "create",
        Method::PUT | Method::PATCH => "update",
        Method::DELETE => "delete",
        _ => "read",
    }
}

/// First path segment after the API prefix: `/api/v1/roles/3` → `roles`
fn module_of(path: &str) -> String {
    let rest = path.strip_prefix("/api/v1").unwrap_or(path);
    rest.trim_start_matches('/')
        .split('/')
        .next()
        .unwrap_or_default()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn module_is_the_first_segment_after_the_prefix() {
        assert_eq!(module_of("/api/v1/roles/3/permissions"), "roles");
        assert_eq!(module_of("/api/v1/auth/logout"), "auth");
        assert_eq!(module_of("/menus"), "menus");
    }

    #[test]
    fn only_writes_are_recorded() {
        assert!(is_mutating(&Method::DELETE));
        assert!(!is_mutating(&Method::GET));
        assert_eq!(action_of(&Method::PATCH), "update");
    }
}
