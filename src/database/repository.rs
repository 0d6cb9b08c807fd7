//! Storage seams. Services depend on these traits only; `PgStore` and
//! `MemoryStore` are the two implementations.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::access::RoleGrant;
use crate::database::models::*;
use crate::database::DatabaseError;
use crate::types::PageRequest;

pub type DbResult<T> = Result<T, DatabaseError>;

/// A page of rows plus the unpaged total
pub type Paged<T> = (Vec<T>, i64);

#[async_trait]
pub trait NodeRepository: Send + Sync {
    async fn list_nodes(&self, kind: NodeKind) -> DbResult<Vec<Node>>;

    async fn find_node(&self, kind: NodeKind, id: i64) -> DbResult<Option<Node>>;

    async fn insert_node(&self, node: NewNode) -> DbResult<Node>;

    /// Persist every mutable column of `node`
    async fn update_node(&self, node: &Node) -> DbResult<Node>;

    async fn update_levels(&self, kind: NodeKind, levels: &[(i64, i32)]) -> DbResult<()>;

    /// Deleting a permission node also drops its role associations
    async fn delete_node(&self, kind: NodeKind, id: i64) -> DbResult<()>;
}

#[async_trait]
pub trait RoleRepository: Send + Sync {
    async fn page_roles(&self, filter: &RoleFilter, page: PageRequest) -> DbResult<Paged<Role>>;

    async fn list_roles(&self) -> DbResult<Vec<Role>>;

    async fn find_role(&self, id: i64) -> DbResult<Option<Role>>;

    async fn find_role_by_code(&self, code: &str) -> DbResult<Option<Role>>;

    async fn roles_by_ids(&self, ids: &[i64]) -> DbResult<Vec<Role>>;

    /// Roles with the given codes and the codes of their permission nodes
    async fn grants_for_roles(&self, codes: &[String]) -> DbResult<Vec<RoleGrant>>;

    async fn insert_role(&self, role: NewRole) -> DbResult<Role>;

    async fn update_role(&self, role: &Role) -> DbResult<Role>;

    async fn delete_role(&self, id: i64) -> DbResult<()>;

    async fn replace_role_permissions(&self, role_id: i64, permission_ids: &[i64]) -> DbResult<()>;

    async fn count_role_users(&self, role_id: i64) -> DbResult<i64>;
}

#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn page_users(&self, filter: &UserFilter, page: PageRequest) -> DbResult<Paged<User>>;

    async fn find_user(&self, id: i64) -> DbResult<Option<User>>;

    async fn find_user_by_username(&self, username: &str) -> DbResult<Option<User>>;

    async fn insert_user(&self, user: NewUser) -> DbResult<User>;

    async fn update_user(&self, user: &User) -> DbResult<User>;

    async fn delete_user(&self, id: i64) -> DbResult<()>;

    async fn replace_user_roles(&self, user_id: i64, role_ids: &[i64]) -> DbResult<()>;

    async fn record_login(&self, user_id: i64, at: DateTime<Utc>, ip: &str) -> DbResult<()>;

    async fn count_users_in_organization(&self, organization_id: i64) -> DbResult<i64>;

    async fn count_users(&self) -> DbResult<i64>;
}

#[async_trait]
pub trait AssetRepository: Send + Sync {
    async fn page_assets(&self, filter: &AssetFilter, page: PageRequest) -> DbResult<Paged<Asset>>;
    async fn find_asset(&self, id: i64) -> DbResult<Option<Asset>>;
    async fn find_asset_by_code(&self, code: &str) -> DbResult<Option<Asset>>;
    async fn find_asset_by_name(&self, name: &str) -> DbResult<Option<Asset>>;
    async fn insert_asset(&self, draft: AssetDraft) -> DbResult<Asset>;
    async fn update_asset(&self, asset: &Asset) -> DbResult<Asset>;
    async fn delete_asset(&self, id: i64) -> DbResult<()>;
    async fn count_assets_in_organization(&self, organization_id: i64) -> DbResult<i64>;

    async fn page_buildings(&self, filter: &BuildingFilter, page: PageRequest) -> DbResult<Paged<Building>>;
    async fn find_building(&self, id: i64) -> DbResult<Option<Building>>;
    async fn find_building_by_code(&self, code: &str) -> DbResult<Option<Building>>;
    async fn insert_building(&self, draft: BuildingDraft) -> DbResult<Building>;
    async fn update_building(&self, building: &Building) -> DbResult<Building>;
    async fn delete_building(&self, id: i64) -> DbResult<()>;
    async fn count_buildings(&self, asset_id: i64) -> DbResult<i64>;

    async fn page_floors(&self, filter: &FloorFilter, page: PageRequest) -> DbResult<Paged<Floor>>;
    async fn find_floor(&self, id: i64) -> DbResult<Option<Floor>>;
    async fn find_floor_by_number(&self, building_id: i64, floor_number: i32) -> DbResult<Option<Floor>>;
    async fn insert_floor(&self, draft: FloorDraft) -> DbResult<Floor>;
    async fn update_floor(&self, floor: &Floor) -> DbResult<Floor>;
    async fn delete_floor(&self, id: i64) -> DbResult<()>;
    async fn count_floors(&self, building_id: i64) -> DbResult<i64>;

    async fn page_rooms(&self, filter: &RoomFilter, page: PageRequest) -> DbResult<Paged<Room>>;
    async fn find_room(&self, id: i64) -> DbResult<Option<Room>>;
    async fn find_room_by_number(&self, floor_id: i64, room_number: &str) -> DbResult<Option<Room>>;
    async fn insert_room(&self, draft: RoomDraft) -> DbResult<Room>;
    async fn update_room(&self, room: &Room) -> DbResult<Room>;
    async fn delete_room(&self, id: i64) -> DbResult<()>;
    async fn count_rooms(&self, floor_id: i64) -> DbResult<i64>;

    async fn asset_statistics(&self) -> DbResult<AssetStatistics>;
}

#[async_trait]
pub trait AuditRepository: Send + Sync {
    async fn insert_operation_log(&self, log: NewOperationLog) -> DbResult<()>;

    async fn insert_login_log(&self, log: NewLoginLog) -> DbResult<()>;

    async fn page_operation_logs(&self, filter: &LogFilter, page: PageRequest) -> DbResult<Paged<OperationLog>>;

    async fn page_login_logs(&self, filter: &LogFilter, page: PageRequest) -> DbResult<Paged<LoginLog>>;

    /// Remove log entries of both kinds older than `cutoff`; returns rows removed
    async fn purge_logs_before(&self, cutoff: DateTime<Utc>) -> DbResult<u64>;
}

#[async_trait]
pub trait StoreHealth: Send + Sync {
    /// Cheap round trip to the backing storage
    async fn ping(&self) -> DbResult<()>;
}

/// Everything the services need from storage
pub trait Store:
    NodeRepository + RoleRepository + UserRepository + AssetRepository + AuditRepository + StoreHealth
{
}

impl<T> Store for T where
    T: NodeRepository + RoleRepository + UserRepository + AssetRepository + AuditRepository + StoreHealth
{
}
