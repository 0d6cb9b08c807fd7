use axum::{
    extract::{Request, State},
    middleware::{self, Next},
    response::Response,
    Router,
};
use std::sync::Arc;

use crate::access::{authorize, Decision, Identity, Requirement};
use crate::error::ApiError;
use crate::state::AppState;

/// State of one guard layer: the app plus the requirement it enforces
#[derive(Clone)]
pub struct GuardState {
    pub app: AppState,
    pub requirement: Arc<Requirement>,
}

/// Check the request's identity against the layer's requirement.
/// Grants are only loaded for permission requirements.
pub async fn enforce(State(guard): State<GuardState>, request: Request, next: Next) -> Result<Response, ApiError> {
    let identity = request.extensions().get::<Identity>().cloned();
    let identity = identity.as_ref();

    let grants = match (identity, guard.requirement.as_ref()) {
        (Some(identity), Requirement::Permission(_)) => guard.app.roles().grants_for(identity).await?,
        _ => Vec::new(),
    };

    match authorize(identity, &guard.requirement, &grants) {
        Decision::Allow => Ok(next.run(request).await),
        Decision::Deny(reason) => {
            tracing::info!(
                user = identity.map(|i| i.username.as_str()).unwrap_or("-"),
                requirement = %guard.requirement,
                path = %request.uri().path(),
                "access denied"
            );
            Err(reason.into())
        }
    }
}

/// Put every route of `routes` behind `requirement`
pub fn gated(state: &AppState, requirement: Requirement, routes: Router<AppState>) -> Router<AppState> {
    let guard = GuardState {
        app: state.clone(),
        requirement: Arc::new(requirement),
    };
    routes.route_layer(middleware::from_fn_with_state(guard, enforce))
}

pub fn permission(code: &str) -> Requirement {
    Requirement::permission(code)
}

pub fn any_role(codes: &[&str]) -> Requirement {
    Requirement::any_role(codes.iter().copied())
}
