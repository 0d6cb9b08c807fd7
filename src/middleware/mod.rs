pub mod audit;
pub mod auth;
pub mod guard;
pub mod response;

pub use audit::record_operation;
pub use auth::{client_info, extract_bearer, require_identity};
pub use guard::{any_role, gated, permission, GuardState};
pub use response::{ApiResponse, ApiResult, IdParam, JsonBody, QueryParams};
