pub mod asset;
pub mod audit;
pub mod node;
pub mod role;
pub mod user;

pub use asset::{
    Asset, AssetDraft, AssetFilter, AssetStatistics, AssetStatus, Building, BuildingDraft, BuildingFilter,
    Floor, FloorDraft, FloorFilter, Room, RoomDraft, RoomFilter, RoomStatus,
};
pub use audit::{LogFilter, LoginLog, LoginOutcome, NewLoginLog, NewOperationLog, OperationLog};
pub use node::{NewNode, Node, NodeKind};
pub use role::{NewRole, Role, RoleFilter};
pub use user::{NewUser, User, UserFilter};
