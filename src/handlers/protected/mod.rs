// Endpoints behind the bearer-token middleware. Each route additionally
// carries a guard layer; see routes.rs for the requirement of each.
pub mod assets;
pub mod auth;
pub mod logs;
pub mod me;
pub mod nodes;
pub mod roles;
pub mod statistics;
pub mod users;
