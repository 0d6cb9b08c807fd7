use axum::{
    http::HeaderValue,
    middleware::from_fn_with_state,
    routing::{get, post, put, MethodRouter},
    Extension, Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::access::Requirement;
use crate::config::SecurityConfig;
use crate::database::models::NodeKind;
use crate::handlers::{protected, public};
use crate::middleware::{any_role, gated, permission, record_operation, require_identity};
use crate::state::AppState;

const ADMIN_ROLES: &[&str] = &["admin"];

/// The complete application router
pub fn app(state: AppState) -> Router {
    let api = Router::new()
        .merge(public_routes())
        .merge(protected_routes(&state));

    Router::new()
        .route("/", get(public::system::root))
        .route("/health", get(public::system::health))
        .nest("/api/v1", api)
        .layer(cors_layer(&state.config.security))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn public_routes() -> Router<AppState> {
    use public::auth;

    Router::new()
        .route("/auth/login", post(auth::login))
        .route("/auth/refresh", post(auth::refresh))
}

/// Everything behind a bearer token. The token layer is added last so it
/// runs first; the operation log sees the identity it injects.
fn protected_routes(state: &AppState) -> Router<AppState> {
    Router::new()
        .merge(account_routes())
        .merge(organization_routes(state))
        .merge(menu_routes(state))
        .merge(permission_routes(state))
        .merge(role_routes(state))
        .merge(user_routes(state))
        .merge(asset_routes(state))
        .merge(log_routes(state))
        .route_layer(from_fn_with_state(state.clone(), record_operation))
        .route_layer(from_fn_with_state(state.clone(), require_identity))
}

/// Routes only requiring a valid token
fn account_routes() -> Router<AppState> {
    use protected::{auth, me};

    Router::new()
        .route("/auth/logout", post(auth::logout))
        .route("/me", get(me::profile))
        .route("/me/password", put(me::change_password))
        .route("/menus/user", get(me::menus))
}

/// One resource prefix whose permission codes share a module name
struct Scope<'a> {
    state: &'a AppState,
    base: &'a str,
    module: &'a str,
}

impl<'a> Scope<'a> {
    fn new(state: &'a AppState, base: &'a str, module: &'a str) -> Self {
        Self { state, base, module }
    }

    /// `{module}:{action}` permission requirement
    fn can(&self, action: &str) -> Requirement {
        permission(&format!("{}:{}", self.module, action))
    }

    fn at(&self, suffix: &str, requirement: Requirement, methods: MethodRouter<AppState>) -> Router<AppState> {
        let path = format!("{}{}", self.base, suffix);
        gated(self.state, requirement, Router::new().route(&path, methods))
    }
}

fn organization_routes(state: &AppState) -> Router<AppState> {
    use protected::nodes;
    let s = Scope::new(state, "/organizations", "org");

    Router::new()
        .merge(s.at("", s.can("list"), get(nodes::list)))
        .merge(s.at("", s.can("create"), post(nodes::create)))
        .merge(s.at("/tree", s.can("list"), get(nodes::tree)))
        .merge(s.at("/:id", s.can("list"), get(nodes::get)))
        .merge(s.at("/:id", s.can("update"), put(nodes::update)))
        .merge(s.at("/:id", s.can("delete"), axum::routing::delete(nodes::delete)))
        .route_layer(Extension(NodeKind::Organization))
}

/// Menu reads follow `menu:list`; structural edits are reserved to admins
fn menu_routes(state: &AppState) -> Router<AppState> {
    use protected::nodes;
    let s = Scope::new(state, "/menus", "menu");

    Router::new()
        .merge(s.at("", s.can("list"), get(nodes::list)))
        .merge(s.at("", any_role(ADMIN_ROLES), post(nodes::create)))
        .merge(s.at("/tree", s.can("list"), get(nodes::tree)))
        .merge(s.at("/:id", s.can("list"), get(nodes::get)))
        .merge(s.at("/:id", any_role(ADMIN_ROLES), put(nodes::update)))
        .merge(s.at("/:id", any_role(ADMIN_ROLES), axum::routing::delete(nodes::delete)))
        .route_layer(Extension(NodeKind::Menu))
}

/// Permission reads are part of role management
fn permission_routes(state: &AppState) -> Router<AppState> {
    use protected::nodes;
    let s = Scope::new(state, "/permissions", "role");

    Router::new()
        .merge(s.at("", s.can("list"), get(nodes::list)))
        .merge(s.at("", any_role(ADMIN_ROLES), post(nodes::create)))
        .merge(s.at("/tree", s.can("list"), get(nodes::tree)))
        .merge(s.at("/:id", s.can("list"), get(nodes::get)))
        .merge(s.at("/:id", any_role(ADMIN_ROLES), put(nodes::update)))
        .merge(s.at("/:id", any_role(ADMIN_ROLES), axum::routing::delete(nodes::delete)))
        .route_layer(Extension(NodeKind::Permission))
}

fn role_routes(state: &AppState) -> Router<AppState> {
    use protected::roles;
    let s = Scope::new(state, "/roles", "role");

    Router::new()
        .merge(s.at("", s.can("list"), get(roles::list)))
        .merge(s.at("", s.can("create"), post(roles::create)))
        .merge(s.at("/all", s.can("list"), get(roles::list_all)))
        .merge(s.at("/:id", s.can("list"), get(roles::get)))
        .merge(s.at("/:id", s.can("update"), put(roles::update)))
        .merge(s.at("/:id", s.can("delete"), axum::routing::delete(roles::delete)))
        .merge(s.at("/:id/permissions", s.can("update"), put(roles::set_permissions)))
}

fn user_routes(state: &AppState) -> Router<AppState> {
    use protected::users;
    let s = Scope::new(state, "/users", "user");

    Router::new()
        .merge(s.at("", s.can("list"), get(users::list)))
        .merge(s.at("", s.can("create"), post(users::create)))
        .merge(s.at("/:id", s.can("list"), get(users::get)))
        .merge(s.at("/:id", s.can("update"), put(users::update)))
        .merge(s.at("/:id", s.can("delete"), axum::routing::delete(users::delete)))
        .merge(s.at("/:id/password", s.can("update"), put(users::reset_password)))
        .merge(s.at("/:id/roles", s.can("update"), put(users::set_roles)))
}

fn asset_routes(state: &AppState) -> Router<AppState> {
    use axum::routing::delete;
    use protected::{assets as h, statistics};

    let a = Scope::new(state, "/assets", "asset");
    let b = Scope::new(state, "/buildings", "building");
    let f = Scope::new(state, "/floors", "floor");
    let r = Scope::new(state, "/rooms", "room");

    Router::new()
        .merge(a.at("", a.can("list"), get(h::list_assets)))
        .merge(a.at("", a.can("create"), post(h::create_asset)))
        .merge(a.at("/:id", a.can("view"), get(h::get_asset)))
        .merge(a.at("/:id", a.can("update"), put(h::update_asset)))
        .merge(a.at("/:id", a.can("delete"), delete(h::delete_asset)))
        .merge(b.at("", b.can("list"), get(h::list_buildings)))
        .merge(b.at("", b.can("create"), post(h::create_building)))
        .merge(b.at("/:id", b.can("view"), get(h::get_building)))
        .merge(b.at("/:id", b.can("update"), put(h::update_building)))
        .merge(b.at("/:id", b.can("delete"), delete(h::delete_building)))
        .merge(f.at("", f.can("list"), get(h::list_floors)))
        .merge(f.at("", f.can("create"), post(h::create_floor)))
        .merge(f.at("/:id", f.can("view"), get(h::get_floor)))
        .merge(f.at("/:id", f.can("update"), put(h::update_floor)))
        .merge(f.at("/:id", f.can("delete"), delete(h::delete_floor)))
        .merge(r.at("", r.can("list"), get(h::list_rooms)))
        .merge(r.at("", r.can("create"), post(h::create_room)))
        .merge(r.at("/:id", r.can("view"), get(h::get_room)))
        .merge(r.at("/:id", r.can("update"), put(h::update_room)))
        .merge(r.at("/:id", r.can("delete"), delete(h::delete_room)))
        .merge(gated(
            state,
            a.can("list"),
            Router::new().route("/statistics/assets", get(statistics::assets)),
        ))
}

fn log_routes(state: &AppState) -> Router<AppState> {
    use protected::logs;
    let s = Scope::new(state, "/logs", "log");

    Router::new()
        .merge(s.at("/operations", s.can("list"), get(logs::operations)))
        .merge(s.at("/logins", s.can("list"), get(logs::logins)))
}

/// Permissive when no origins are configured, otherwise an allow-list
fn cors_layer(security: &SecurityConfig) -> CorsLayer {
    if !security.enable_cors {
        return CorsLayer::new();
    }

    let origins: Vec<HeaderValue> = security
        .cors_origins
        .iter()
        .filter(|o| o.as_str() != "*")
        .filter_map(|o| HeaderValue::from_str(o).ok())
        .collect();

    if origins.is_empty() {
        CorsLayer::permissive()
    } else {
        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(tower_http::cors::Any)
            .allow_headers(tower_http::cors::Any)
    }
}
