pub mod asset_service;
pub mod audit_service;
pub mod auth_service;
pub mod bootstrap;
pub mod error;
pub mod node_service;
pub mod role_service;
pub mod user_service;

pub use asset_service::{AssetPatch, AssetService, BuildingPatch, FloorPatch, RoomPatch};
pub use audit_service::AuditService;
pub use auth_service::{AuthService, ClientInfo, LoginRequest, LoginResponse, Profile, RefreshRequest};
pub use bootstrap::{Bootstrap, SeedReport};
pub use error::{ServiceError, ServiceResult};
pub use node_service::{NodeInput, NodePatch, NodeService, TreeReport};
pub use role_service::{RoleInput, RolePatch, RoleService};
pub use user_service::{PasswordChange, UserInput, UserPatch, UserService};
