use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use tokio::sync::RwLock;

use crate::access::RoleGrant;
use crate::database::models::*;
use crate::database::repository::*;
use crate::database::DatabaseError;
use crate::types::PageRequest;

#[derive(Default)]
struct Tables {
    sequence: i64,
    nodes: BTreeMap<i64, Node>,
    roles: BTreeMap<i64, Role>,
    users: BTreeMap<i64, User>,
    assets: BTreeMap<i64, Asset>,
    buildings: BTreeMap<i64, Building>,
    floors: BTreeMap<i64, Floor>,
    rooms: BTreeMap<i64, Room>,
    operation_logs: Vec<OperationLog>,
    login_logs: Vec<LoginLog>,
}

impl Tables {
    fn next_id(&mut self) -> i64 {
        self.sequence += 1;
        self.sequence
    }
}

/// Process-local store behind a single `RwLock`.
///
/// Mirrors the unique constraints and cascades of the SQL schema so the
/// services behave the same on either backend.
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn paged<T>(items: impl Iterator<Item = T>, page: PageRequest) -> Paged<T> {
    let all: Vec<T> = items.collect();
    let total = all.len() as i64;
    let rows = all
        .into_iter()
        .skip(page.offset() as usize)
        .take(page.limit() as usize)
        .collect();
    (rows, total)
}

fn conflict(what: &str, value: impl std::fmt::Display) -> DatabaseError {
    DatabaseError::Conflict(format!("{} '{}' already exists", what, value))
}

fn missing(what: &str, id: i64) -> DatabaseError {
    DatabaseError::NotFound(format!("{} {} not found", what, id))
}

#[async_trait]
impl StoreHealth for MemoryStore {
    async fn ping(&self) -> DbResult<()> {
        Ok(())
    }
}

#[async_trait]
impl NodeRepository for MemoryStore {
    async fn list_nodes(&self, kind: NodeKind) -> DbResult<Vec<Node>> {
        let t = self.tables.read().await;
        Ok(t.nodes.values().filter(|n| n.kind == kind).cloned().collect())
    }

    async fn find_node(&self, kind: NodeKind, id: i64) -> DbResult<Option<Node>> {
        let t = self.tables.read().await;
        Ok(t.nodes.get(&id).filter(|n| n.kind == kind).cloned())
    }

    async fn insert_node(&self, node: NewNode) -> DbResult<Node> {
        let mut t = self.tables.write().await;
        if node.kind != NodeKind::Organization
            && !node.code.is_empty()
            && t.nodes.values().any(|n| n.kind == node.kind && n.code == node.code)
        {
            return Err(conflict("code", &node.code));
        }

        let now = Utc::now();
        let id = t.next_id();
        let stored = Node {
            id,
            kind: node.kind,
            parent_id: node.parent_id,
            name: node.name,
            code: node.code,
            sort_order: node.sort_order,
            status: node.status,
            level: node.level,
            details: node.details,
            created_at: now,
            updated_at: now,
        };
        t.nodes.insert(id, stored.clone());
        Ok(stored)
    }

    async fn update_node(&self, node: &Node) -> DbResult<Node> {
        let mut t = self.tables.write().await;
        if node.kind != NodeKind::Organization
            && !node.code.is_empty()
            && t
                .nodes
                .values()
                .any(|n| n.kind == node.kind && n.id != node.id && n.code == node.code)
        {
            return Err(conflict("code", &node.code));
        }

        let stored = t
            .nodes
            .get_mut(&node.id)
            .filter(|n| n.kind == node.kind)
            .ok_or_else(|| missing(node.kind.label(), node.id))?;
        let created_at = stored.created_at;
        *stored = node.clone();
        stored.created_at = created_at;
        stored.updated_at = Utc::now();
        Ok(stored.clone())
    }

    async fn update_levels(&self, kind: NodeKind, levels: &[(i64, i32)]) -> DbResult<()> {
        let mut t = self.tables.write().await;
        for (id, level) in levels {
            if let Some(node) = t.nodes.get_mut(id).filter(|n| n.kind == kind) {
                node.level = *level;
            }
        }
        Ok(())
    }

    async fn delete_node(&self, kind: NodeKind, id: i64) -> DbResult<()> {
        let mut t = self.tables.write().await;
        if t.nodes.get(&id).map(|n| n.kind) != Some(kind) {
            return Err(missing(kind.label(), id));
        }
        t.nodes.remove(&id);
        if kind == NodeKind::Permission {
            for role in t.roles.values_mut() {
                role.permission_ids.retain(|p| *p != id);
            }
        }
        Ok(())
    }
}

#[async_trait]
impl RoleRepository for MemoryStore {
    async fn page_roles(&self, filter: &RoleFilter, page: PageRequest) -> DbResult<Paged<Role>> {
        let t = self.tables.read().await;
        let mut roles: Vec<Role> = t.roles.values().filter(|r| filter.matches(r)).cloned().collect();
        roles.sort_by_key(|r| (r.sort_order, r.id));
        Ok(paged(roles.into_iter(), page))
    }

    async fn list_roles(&self) -> DbResult<Vec<Role>> {
        let t = self.tables.read().await;
        let mut roles: Vec<Role> = t.roles.values().cloned().collect();
        roles.sort_by_key(|r| (r.sort_order, r.id));
        Ok(roles)
    }

    async fn find_role(&self, id: i64) -> DbResult<Option<Role>> {
        Ok(self.tables.read().await.roles.get(&id).cloned())
    }

    async fn find_role_by_code(&self, code: &str) -> DbResult<Option<Role>> {
        let t = self.tables.read().await;
        Ok(t.roles.values().find(|r| r.code == code).cloned())
    }

    async fn roles_by_ids(&self, ids: &[i64]) -> DbResult<Vec<Role>> {
        let t = self.tables.read().await;
        Ok(t.roles.values().filter(|r| ids.contains(&r.id)).cloned().collect())
    }

    async fn grants_for_roles(&self, codes: &[String]) -> DbResult<Vec<RoleGrant>> {
        let t = self.tables.read().await;
        let grants = t
            .roles
            .values()
            .filter(|r| codes.contains(&r.code))
            .map(|r| RoleGrant {
                code: r.code.clone(),
                active: r.status.is_active(),
                permissions: r
                    .permission_ids
                    .iter()
                    .filter_map(|id| t.nodes.get(id))
                    .filter(|n| n.kind == NodeKind::Permission && !n.code.is_empty())
                    .map(|n| n.code.clone())
                    .collect(),
            })
            .collect();
        Ok(grants)
    }

    async fn insert_role(&self, role: NewRole) -> DbResult<Role> {
        let mut t = self.tables.write().await;
        if t.roles.values().any(|r| r.code == role.code) {
            return Err(conflict("role code", &role.code));
        }
        let now = Utc::now();
        let id = t.next_id();
        let stored = Role {
            id,
            code: role.code,
            name: role.name,
            description: role.description,
            status: role.status,
            sort_order: role.sort_order,
            permission_ids: Vec::new(),
            created_at: now,
            updated_at: now,
        };
        t.roles.insert(id, stored.clone());
        Ok(stored)
    }

    async fn update_role(&self, role: &Role) -> DbResult<Role> {
        let mut t = self.tables.write().await;
        if t.roles.values().any(|r| r.id != role.id && r.code == role.code) {
            return Err(conflict("role code", &role.code));
        }
        let stored = t.roles.get_mut(&role.id).ok_or_else(|| missing("Role", role.id))?;
        stored.code = role.code.clone();
        stored.name = role.name.clone();
        stored.description = role.description.clone();
        stored.status = role.status;
        stored.sort_order = role.sort_order;
        stored.updated_at = Utc::now();
        Ok(stored.clone())
    }

    async fn delete_role(&self, id: i64) -> DbResult<()> {
        let mut t = self.tables.write().await;
        t.roles.remove(&id).ok_or_else(|| missing("Role", id))?;
        for user in t.users.values_mut() {
            user.role_ids.retain(|r| *r != id);
        }
        Ok(())
    }

    async fn replace_role_permissions(&self, role_id: i64, permission_ids: &[i64]) -> DbResult<()> {
        let mut t = self.tables.write().await;
        let role = t.roles.get_mut(&role_id).ok_or_else(|| missing("Role", role_id))?;
        let mut ids = permission_ids.to_vec();
        ids.sort_unstable();
        ids.dedup();
        role.permission_ids = ids;
        role.updated_at = Utc::now();
        Ok(())
    }

    async fn count_role_users(&self, role_id: i64) -> DbResult<i64> {
        let t = self.tables.read().await;
        Ok(t.users.values().filter(|u| u.role_ids.contains(&role_id)).count() as i64)
    }
}

#[async_trait]
impl UserRepository for MemoryStore {
    async fn page_users(&self, filter: &UserFilter, page: PageRequest) -> DbResult<Paged<User>> {
        let t = self.tables.read().await;
        Ok(paged(t.users.values().filter(|u| filter.matches(u)).cloned(), page))
    }

    async fn find_user(&self, id: i64) -> DbResult<Option<User>> {
        Ok(self.tables.read().await.users.get(&id).cloned())
    }

    async fn find_user_by_username(&self, username: &str) -> DbResult<Option<User>> {
        let t = self.tables.read().await;
        Ok(t.users.values().find(|u| u.username == username).cloned())
    }

    async fn insert_user(&self, user: NewUser) -> DbResult<User> {
        let mut t = self.tables.write().await;
        if t.users.values().any(|u| u.username == user.username) {
            return Err(conflict("username", &user.username));
        }
        let now = Utc::now();
        let id = t.next_id();
        let stored = User {
            id,
            username: user.username,
            password_hash: user.password_hash,
            display_name: user.display_name,
            phone: user.phone,
            email: user.email,
            organization_id: user.organization_id,
            status: user.status,
            builtin: user.builtin,
            role_ids: Vec::new(),
            last_login_at: None,
            last_login_ip: None,
            created_at: now,
            updated_at: now,
        };
        t.users.insert(id, stored.clone());
        Ok(stored)
    }

    async fn update_user(&self, user: &User) -> DbResult<User> {
        let mut t = self.tables.write().await;
        if t.users.values().any(|u| u.id != user.id && u.username == user.username) {
            return Err(conflict("username", &user.username));
        }
        let stored = t.users.get_mut(&user.id).ok_or_else(|| missing("User", user.id))?;
        stored.username = user.username.clone();
        stored.password_hash = user.password_hash.clone();
        stored.display_name = user.display_name.clone();
        stored.phone = user.phone.clone();
        stored.email = user.email.clone();
        stored.organization_id = user.organization_id;
        stored.status = user.status;
        stored.updated_at = Utc::now();
        Ok(stored.clone())
    }

    async fn delete_user(&self, id: i64) -> DbResult<()> {
        let mut t = self.tables.write().await;
        t.users.remove(&id).ok_or_else(|| missing("User", id))?;
        Ok(())
    }

    async fn replace_user_roles(&self, user_id: i64, role_ids: &[i64]) -> DbResult<()> {
        let mut t = self.tables.write().await;
        let user = t.users.get_mut(&user_id).ok_or_else(|| missing("User", user_id))?;
        let mut ids = role_ids.to_vec();
        ids.sort_unstable();
        ids.dedup();
        user.role_ids = ids;
        user.updated_at = Utc::now();
        Ok(())
    }

    async fn record_login(&self, user_id: i64, at: DateTime<Utc>, ip: &str) -> DbResult<()> {
        let mut t = self.tables.write().await;
        let user = t.users.get_mut(&user_id).ok_or_else(|| missing("User", user_id))?;
        user.last_login_at = Some(at);
        user.last_login_ip = Some(ip.to_string());
        Ok(())
    }

    async fn count_users_in_organization(&self, organization_id: i64) -> DbResult<i64> {
        let t = self.tables.read().await;
        Ok(t
            .users
            .values()
            .filter(|u| u.organization_id == Some(organization_id))
            .count() as i64)
    }

    async fn count_users(&self) -> DbResult<i64> {
        Ok(self.tables.read().await.users.len() as i64)
    }
}

#[async_trait]
impl AssetRepository for MemoryStore {
    async fn page_assets(&self, filter: &AssetFilter, page: PageRequest) -> DbResult<Paged<Asset>> {
        let t = self.tables.read().await;
        Ok(paged(t.assets.values().filter(|a| filter.matches(a)).cloned(), page))
    }

    async fn find_asset(&self, id: i64) -> DbResult<Option<Asset>> {
        Ok(self.tables.read().await.assets.get(&id).cloned())
    }

    async fn find_asset_by_code(&self, code: &str) -> DbResult<Option<Asset>> {
        let t = self.tables.read().await;
        Ok(t.assets.values().find(|a| a.code == code).cloned())
    }

    async fn find_asset_by_name(&self, name: &str) -> DbResult<Option<Asset>> {
        let t = self.tables.read().await;
        Ok(t.assets.values().find(|a| a.name == name).cloned())
    }

    async fn insert_asset(&self, draft: AssetDraft) -> DbResult<Asset> {
        let mut t = self.tables.write().await;
        if t.assets.values().any(|a| a.code == draft.code) {
            return Err(conflict("asset code", &draft.code));
        }
        let now = Utc::now();
        let id = t.next_id();
        let asset = Asset {
            id,
            code: draft.code,
            name: draft.name,
            organization_id: draft.organization_id,
            address: draft.address,
            longitude: draft.longitude,
            latitude: draft.latitude,
            land_nature: draft.land_nature,
            total_area: draft.total_area,
            rentable_area: draft.rentable_area,
            tags: draft.tags,
            description: draft.description,
            status: draft.status,
            created_at: now,
            updated_at: now,
        };
        t.assets.insert(id, asset.clone());
        Ok(asset)
    }

    async fn update_asset(&self, asset: &Asset) -> DbResult<Asset> {
        let mut t = self.tables.write().await;
        if t.assets.values().any(|a| a.id != asset.id && a.code == asset.code) {
            return Err(conflict("asset code", &asset.code));
        }
        let stored = t.assets.get_mut(&asset.id).ok_or_else(|| missing("Asset", asset.id))?;
        let created_at = stored.created_at;
        *stored = asset.clone();
        stored.created_at = created_at;
        stored.updated_at = Utc::now();
        Ok(stored.clone())
    }

    async fn delete_asset(&self, id: i64) -> DbResult<()> {
        let mut t = self.tables.write().await;
        t.assets.remove(&id).ok_or_else(|| missing("Asset", id))?;
        Ok(())
    }

    async fn count_assets_in_organization(&self, organization_id: i64) -> DbResult<i64> {
        let t = self.tables.read().await;
        Ok(t
            .assets
            .values()
            .filter(|a| a.organization_id == Some(organization_id))
            .count() as i64)
    }

    async fn page_buildings(&self, filter: &BuildingFilter, page: PageRequest) -> DbResult<Paged<Building>> {
        let t = self.tables.read().await;
        Ok(paged(t.buildings.values().filter(|b| filter.matches(b)).cloned(), page))
    }

    async fn find_building(&self, id: i64) -> DbResult<Option<Building>> {
        Ok(self.tables.read().await.buildings.get(&id).cloned())
    }

    async fn find_building_by_code(&self, code: &str) -> DbResult<Option<Building>> {
        let t = self.tables.read().await;
        Ok(t.buildings.values().find(|b| b.code == code).cloned())
    }

    async fn insert_building(&self, draft: BuildingDraft) -> DbResult<Building> {
        let mut t = self.tables.write().await;
        if t.buildings.values().any(|b| b.code == draft.code) {
            return Err(conflict("building code", &draft.code));
        }
        let now = Utc::now();
        let id = t.next_id();
        let building = Building {
            id,
            asset_id: draft.asset_id,
            code: draft.code,
            name: draft.name,
            floor_count: draft.floor_count,
            total_area: draft.total_area,
            address: draft.address,
            status: draft.status,
            description: draft.description,
            created_at: now,
            updated_at: now,
        };
        t.buildings.insert(id, building.clone());
        Ok(building)
    }

    async fn update_building(&self, building: &Building) -> DbResult<Building> {
        let mut t = self.tables.write().await;
        if t.buildings.values().any(|b| b.id != building.id && b.code == building.code) {
            return Err(conflict("building code", &building.code));
        }
        let stored = t
            .buildings
            .get_mut(&building.id)
            .ok_or_else(|| missing("Building", building.id))?;
        let created_at = stored.created_at;
        *stored = building.clone();
        stored.created_at = created_at;
        stored.updated_at = Utc::now();
        Ok(stored.clone())
    }

    async fn delete_building(&self, id: i64) -> DbResult<()> {
        let mut t = self.tables.write().await;
        t.buildings.remove(&id).ok_or_else(|| missing("Building", id))?;
        Ok(())
    }

    async fn count_buildings(&self, asset_id: i64) -> DbResult<i64> {
        let t = self.tables.read().await;
        Ok(t.buildings.values().filter(|b| b.asset_id == asset_id).count() as i64)
    }

    async fn page_floors(&self, filter: &FloorFilter, page: PageRequest) -> DbResult<Paged<Floor>> {
        let t = self.tables.read().await;
        let mut floors: Vec<Floor> = t.floors.values().filter(|f| filter.matches(f)).cloned().collect();
        floors.sort_by_key(|f| (f.building_id, f.floor_number, f.id));
        Ok(paged(floors.into_iter(), page))
    }

    async fn find_floor(&self, id: i64) -> DbResult<Option<Floor>> {
        Ok(self.tables.read().await.floors.get(&id).cloned())
    }

    async fn find_floor_by_number(&self, building_id: i64, floor_number: i32) -> DbResult<Option<Floor>> {
        let t = self.tables.read().await;
        Ok(t
            .floors
            .values()
            .find(|f| f.building_id == building_id && f.floor_number == floor_number)
            .cloned())
    }

    async fn insert_floor(&self, draft: FloorDraft) -> DbResult<Floor> {
        let mut t = self.tables.write().await;
        if t
            .floors
            .values()
            .any(|f| f.building_id == draft.building_id && f.floor_number == draft.floor_number)
        {
            return Err(conflict("floor number", draft.floor_number));
        }
        let now = Utc::now();
        let id = t.next_id();
        let floor = Floor {
            id,
            building_id: draft.building_id,
            floor_number: draft.floor_number,
            name: draft.name,
            area: draft.area,
            status: draft.status,
            created_at: now,
            updated_at: now,
        };
        t.floors.insert(id, floor.clone());
        Ok(floor)
    }

    async fn update_floor(&self, floor: &Floor) -> DbResult<Floor> {
        let mut t = self.tables.write().await;
        if t.floors.values().any(|f| {
            f.id != floor.id && f.building_id == floor.building_id && f.floor_number == floor.floor_number
        }) {
            return Err(conflict("floor number", floor.floor_number));
        }
        let stored = t.floors.get_mut(&floor.id).ok_or_else(|| missing("Floor", floor.id))?;
        let created_at = stored.created_at;
        *stored = floor.clone();
        stored.created_at = created_at;
        stored.updated_at = Utc::now();
        Ok(stored.clone())
    }

    async fn delete_floor(&self, id: i64) -> DbResult<()> {
        let mut t = self.tables.write().await;
        t.floors.remove(&id).ok_or_else(|| missing("Floor", id))?;
        Ok(())
    }

    async fn count_floors(&self, building_id: i64) -> DbResult<i64> {
        let t = self.tables.read().await;
        Ok(t.floors.values().filter(|f| f.building_id == building_id).count() as i64)
    }

    async fn page_rooms(&self, filter: &RoomFilter, page: PageRequest) -> DbResult<Paged<Room>> {
        let t = self.tables.read().await;
        Ok(paged(t.rooms.values().filter(|r| filter.matches(r)).cloned(), page))
    }

    async fn find_room(&self, id: i64) -> DbResult<Option<Room>> {
        Ok(self.tables.read().await.rooms.get(&id).cloned())
    }

    async fn find_room_by_number(&self, floor_id: i64, room_number: &str) -> DbResult<Option<Room>> {
        let t = self.tables.read().await;
        Ok(t
            .rooms
            .values()
            .find(|r| r.floor_id == floor_id && r.room_number == room_number)
            .cloned())
    }

    async fn insert_room(&self, draft: RoomDraft) -> DbResult<Room> {
        let mut t = self.tables.write().await;
        if t
            .rooms
            .values()
            .any(|r| r.floor_id == draft.floor_id && r.room_number == draft.room_number)
        {
            return Err(conflict("room number", &draft.room_number));
        }
        let now = Utc::now();
        let id = t.next_id();
        let room = Room {
            id,
            floor_id: draft.floor_id,
            room_number: draft.room_number,
            area: draft.area,
            usage: draft.usage,
            status: draft.status,
            created_at: now,
            updated_at: now,
        };
        t.rooms.insert(id, room.clone());
        Ok(room)
    }

    async fn update_room(&self, room: &Room) -> DbResult<Room> {
        let mut t = self.tables.write().await;
        if t
            .rooms
            .values()
            .any(|r| r.id != room.id && r.floor_id == room.floor_id && r.room_number == room.room_number)
        {
            return Err(conflict("room number", &room.room_number));
        }
        let stored = t.rooms.get_mut(&room.id).ok_or_else(|| missing("Room", room.id))?;
        let created_at = stored.created_at;
        *stored = room.clone();
        stored.created_at = created_at;
        stored.updated_at = Utc::now();
        Ok(stored.clone())
    }

    async fn delete_room(&self, id: i64) -> DbResult<()> {
        let mut t = self.tables.write().await;
        t.rooms.remove(&id).ok_or_else(|| missing("Room", id))?;
        Ok(())
    }

    async fn count_rooms(&self, floor_id: i64) -> DbResult<i64> {
        let t = self.tables.read().await;
        Ok(t.rooms.values().filter(|r| r.floor_id == floor_id).count() as i64)
    }

    async fn asset_statistics(&self) -> DbResult<AssetStatistics> {
        let t = self.tables.read().await;
        let mut rooms_by_status: BTreeMap<String, i64> =
            RoomStatus::ALL.iter().map(|s| (s.as_str().to_string(), 0)).collect();
        for room in t.rooms.values() {
            *rooms_by_status.entry(room.status.as_str().to_string()).or_default() += 1;
        }

        Ok(AssetStatistics {
            asset_count: t.assets.len() as i64,
            building_count: t.buildings.len() as i64,
            floor_count: t.floors.len() as i64,
            room_count: t.rooms.len() as i64,
            total_area: t.assets.values().map(|a| a.total_area).sum(),
            rentable_area: t.assets.values().map(|a| a.rentable_area).sum(),
            rooms_by_status,
        })
    }
}

#[async_trait]
impl AuditRepository for MemoryStore {
    async fn insert_operation_log(&self, log: NewOperationLog) -> DbResult<()> {
        let mut t = self.tables.write().await;
        let id = t.next_id();
        t.operation_logs.push(OperationLog {
            id,
            user_id: log.user_id,
            username: log.username,
            module: log.module,
            action: log.action,
            method: log.method,
            path: log.path,
            status_code: log.status_code,
            duration_ms: log.duration_ms,
            client_ip: log.client_ip,
            user_agent: log.user_agent,
            created_at: Utc::now(),
        });
        Ok(())
    }

    async fn insert_login_log(&self, log: NewLoginLog) -> DbResult<()> {
        let mut t = self.tables.write().await;
        let id = t.next_id();
        t.login_logs.push(LoginLog {
            id,
            username: log.username,
            user_id: log.user_id,
            outcome: log.outcome,
            message: log.message,
            client_ip: log.client_ip,
            user_agent: log.user_agent,
            created_at: Utc::now(),
        });
        Ok(())
    }

    async fn page_operation_logs(&self, filter: &LogFilter, page: PageRequest) -> DbResult<Paged<OperationLog>> {
        let t = self.tables.read().await;
        Ok(paged(
            t.operation_logs
                .iter()
                .rev()
                .filter(|l| filter.matches_operation(l))
                .cloned(),
            page,
        ))
    }

    async fn page_login_logs(&self, filter: &LogFilter, page: PageRequest) -> DbResult<Paged<LoginLog>> {
        let t = self.tables.read().await;
        Ok(paged(
            t.login_logs.iter().rev().filter(|l| filter.matches_login(l)).cloned(),
            page,
        ))
    }

    async fn purge_logs_before(&self, cutoff: DateTime<Utc>) -> DbResult<u64> {
        let mut t = self.tables.write().await;
        let before = t.operation_logs.len() + t.login_logs.len();
        t.operation_logs.retain(|l| l.created_at >= cutoff);
        t.login_logs.retain(|l| l.created_at >= cutoff);
        let after = t.operation_logs.len() + t.login_logs.len();
        Ok((before - after) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Status;
    use serde_json::Map;

    fn permission(code: &str, parent_id: Option<i64>) -> NewNode {
        NewNode {
            kind: NodeKind::Permission,
            parent_id,
            name: code.to_string(),
            code: code.to_string(),
            sort_order: 0,
            status: Status::Active,
            level: 1,
            details: Map::new(),
        }
    }

    fn role(code: &str, status: Status) -> NewRole {
        NewRole {
            code: code.to_string(),
            name: code.to_string(),
            description: String::new(),
            status,
            sort_order: 0,
        }
    }

    #[tokio::test]
    async fn node_codes_are_unique_per_kind() {
        let store = MemoryStore::new();
        store.insert_node(permission("asset:list", None)).await.unwrap();
        let err = store.insert_node(permission("asset:list", None)).await.unwrap_err();
        assert!(matches!(err, DatabaseError::Conflict(_)));

        let mut menu = permission("asset:list", None);
        menu.kind = NodeKind::Menu;
        assert!(store.insert_node(menu).await.is_ok());
    }

    #[tokio::test]
    async fn grants_resolve_permission_codes() {
        let store = MemoryStore::new();
        let list = store.insert_node(permission("asset:list", None)).await.unwrap();
        let view = store.insert_node(permission("asset:view", None)).await.unwrap();
        let viewer = store.insert_role(role("viewer", Status::Active)).await.unwrap();
        let retired = store.insert_role(role("retired", Status::Disabled)).await.unwrap();
        store.replace_role_permissions(viewer.id, &[list.id, view.id, list.id]).await.unwrap();
        store.replace_role_permissions(retired.id, &[view.id]).await.unwrap();

        let grants = store
            .grants_for_roles(&["viewer".to_string(), "retired".to_string()])
            .await
            .unwrap();
        assert_eq!(grants.len(), 2);
        let viewer_grant = grants.iter().find(|g| g.code == "viewer").unwrap();
        assert!(viewer_grant.active);
        assert_eq!(viewer_grant.permissions.len(), 2);
        assert!(!grants.iter().find(|g| g.code == "retired").unwrap().active);
    }

    #[tokio::test]
    async fn deleting_a_permission_drops_role_associations() {
        let store = MemoryStore::new();
        let list = store.insert_node(permission("asset:list", None)).await.unwrap();
        let viewer = store.insert_role(role("viewer", Status::Active)).await.unwrap();
        store.replace_role_permissions(viewer.id, &[list.id]).await.unwrap();

        store.delete_node(NodeKind::Permission, list.id).await.unwrap();
        let viewer = store.find_role(viewer.id).await.unwrap().unwrap();
        assert!(viewer.permission_ids.is_empty());
    }

    #[tokio::test]
    async fn find_node_respects_kind() {
        let store = MemoryStore::new();
        let node = store.insert_node(permission("x", None)).await.unwrap();
        assert!(store.find_node(NodeKind::Menu, node.id).await.unwrap().is_none());
        assert!(store.delete_node(NodeKind::Menu, node.id).await.is_err());
    }

    #[tokio::test]
    async fn logs_page_newest_first_and_purge() {
        let store = MemoryStore::new();
        for i in 0..3 {
            store
                .insert_login_log(NewLoginLog {
                    username: format!("user{}", i),
                    user_id: None,
                    outcome: LoginOutcome::Failure,
                    message: "bad password".into(),
                    client_ip: "127.0.0.1".into(),
                    user_agent: String::new(),
                })
                .await
                .unwrap();
        }

        let (rows, total) = store
            .page_login_logs(&LogFilter::default(), PageRequest::new(1, 2))
            .await
            .unwrap();
        assert_eq!(total, 3);
        assert_eq!(rows[0].username, "user2");

        let removed = store
            .purge_logs_before(Utc::now() + chrono::Duration::seconds(1))
            .await
            .unwrap();
        assert_eq!(removed, 3);
    }
}
