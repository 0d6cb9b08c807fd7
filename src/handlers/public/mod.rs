// Endpoints reachable without a bearer token: token acquisition and
// service probes
pub mod auth;
pub mod system;
