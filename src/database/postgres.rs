use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{postgres::PgRow, FromRow, PgPool, Postgres, QueryBuilder};
use std::collections::BTreeMap;

use crate::access::RoleGrant;
use crate::database::models::asset::{AssetRow, BuildingRow, FloorRow, RoomRow};
use crate::database::models::audit::{LoginLogRow, OperationLogRow};
use crate::database::models::node::NodeRow;
use crate::database::models::role::RoleRow;
use crate::database::models::user::UserRow;
use crate::database::models::*;
use crate::database::repository::*;
use crate::database::{DatabaseError, DatabaseManager};
use crate::types::PageRequest;

const NODE_COLUMNS: &str =
    "id, kind, parent_id, name, code, sort_order, status, level, details, created_at, updated_at";

const ROLE_SELECT: &str = "r.id, r.code, r.name, r.description, r.status, r.sort_order, \
     ARRAY(SELECT rp.permission_id FROM role_permissions rp WHERE rp.role_id = r.id ORDER BY rp.permission_id) AS permission_ids, \
     r.created_at, r.updated_at";

const USER_SELECT: &str = "u.id, u.username, u.password_hash, u.display_name, u.phone, u.email, \
     u.organization_id, u.status, u.builtin, \
     ARRAY(SELECT ur.role_id FROM user_roles ur WHERE ur.user_id = u.id ORDER BY ur.role_id) AS role_ids, \
     u.last_login_at, u.last_login_ip, u.created_at, u.updated_at";

const ASSET_COLUMNS: &str = "id, code, name, organization_id, address, longitude, latitude, land_nature, \
     total_area, rentable_area, tags, description, status, created_at, updated_at";

const BUILDING_COLUMNS: &str =
    "id, asset_id, code, name, floor_count, total_area, address, status, description, created_at, updated_at";

const FLOOR_COLUMNS: &str = "id, building_id, floor_number, name, area, status, created_at, updated_at";

const ROOM_COLUMNS: &str = "id, floor_id, room_number, area, usage, status, created_at, updated_at";

const OPERATION_LOG_COLUMNS: &str = "id, user_id, username, module, action, method, path, status_code, \
     duration_ms, client_ip, user_agent, created_at";

const LOGIN_LOG_COLUMNS: &str = "id, username, user_id, outcome, message, client_ip, user_agent, created_at";

/// Map constraint violations to `Conflict`, everything else stays a sqlx error
fn map_sqlx(err: sqlx::Error) -> DatabaseError {
    if let sqlx::Error::Database(db) = &err {
        match db.code().as_deref() {
            Some("23505") | Some("23503") => return DatabaseError::Conflict(db.message().to_string()),
            _ => {}
        }
    }
    DatabaseError::Sqlx(err)
}

fn convert<R, T>(rows: Vec<R>) -> DbResult<Vec<T>>
where
    T: TryFrom<R, Error = DatabaseError>,
{
    rows.into_iter().map(T::try_from).collect()
}

/// One `AND` condition of a list filter
enum Cond {
    Ilike(&'static str, String),
    Eq(&'static str, String),
    EqId(&'static str, i64),
    Since(&'static str, DateTime<Utc>),
    Until(&'static str, DateTime<Utc>),
}

/// Filter conditions shared by the count and the page query
#[derive(Default)]
struct Where {
    conds: Vec<Cond>,
}

impl Where {
    fn ilike(mut self, column: &'static str, value: Option<&str>) -> Self {
        if let Some(v) = value.map(str::trim).filter(|v| !v.is_empty()) {
            self.conds.push(Cond::Ilike(column, v.to_string()));
        }
        self
    }

    fn eq(mut self, column: &'static str, value: Option<&str>) -> Self {
        if let Some(v) = value.filter(|v| !v.is_empty()) {
            self.conds.push(Cond::Eq(column, v.to_string()));
        }
        self
    }

    fn eq_id(mut self, column: &'static str, value: Option<i64>) -> Self {
        if let Some(v) = value {
            self.conds.push(Cond::EqId(column, v));
        }
        self
    }

    fn range(mut self, column: &'static str, from: Option<DateTime<Utc>>, to: Option<DateTime<Utc>>) -> Self {
        if let Some(from) = from {
            self.conds.push(Cond::Since(column, from));
        }
        if let Some(to) = to {
            self.conds.push(Cond::Until(column, to));
        }
        self
    }

    fn apply(&self, qb: &mut QueryBuilder<'_, Postgres>) {
        for cond in &self.conds {
            qb.push(" AND ");
            match cond {
                Cond::Ilike(col, v) => {
                    qb.push(*col).push(" ILIKE ").push_bind(format!("%{}%", v));
                }
                Cond::Eq(col, v) => {
                    qb.push(*col).push(" = ").push_bind(v.clone());
                }
                Cond::EqId(col, v) => {
                    qb.push(*col).push(" = ").push_bind(*v);
                }
                Cond::Since(col, v) => {
                    qb.push(*col).push(" >= ").push_bind(*v);
                }
                Cond::Until(col, v) => {
                    qb.push(*col).push(" <= ").push_bind(*v);
                }
            }
        }
    }
}

/// PostgreSQL-backed store over a shared pool
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn fetch_page<R>(
        &self,
        select: &str,
        from: &str,
        filter: &Where,
        order: &str,
        page: PageRequest,
    ) -> DbResult<(Vec<R>, i64)>
    where
        R: for<'r> FromRow<'r, PgRow> + Send + Unpin,
    {
        let mut count = QueryBuilder::<Postgres>::new(format!("SELECT COUNT(*) FROM {} WHERE TRUE", from));
        filter.apply(&mut count);
        let total: i64 = count.build_query_scalar().fetch_one(&self.pool).await?;

        let mut query = QueryBuilder::<Postgres>::new(format!("SELECT {} FROM {} WHERE TRUE", select, from));
        filter.apply(&mut query);
        query
            .push(format!(" ORDER BY {} LIMIT ", order))
            .push_bind(page.limit())
            .push(" OFFSET ")
            .push_bind(page.offset());
        let rows: Vec<R> = query.build_query_as().fetch_all(&self.pool).await?;

        Ok((rows, total))
    }

    async fn count(&self, sql: &str, id: i64) -> DbResult<i64> {
        Ok(sqlx::query_scalar(sql).bind(id).fetch_one(&self.pool).await?)
    }

    async fn delete_by_id(&self, table: &str, what: &str, id: i64) -> DbResult<()> {
        let result = sqlx::query(&format!("DELETE FROM {} WHERE id = $1", table))
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(map_sqlx)?;
        if result.rows_affected() == 0 {
            return Err(DatabaseError::NotFound(format!("{} {} not found", what, id)));
        }
        Ok(())
    }
}

#[async_trait]
impl StoreHealth for PgStore {
    async fn ping(&self) -> DbResult<()> {
        DatabaseManager::health_check(&self.pool).await
    }
}

#[async_trait]
impl NodeRepository for PgStore {
    async fn list_nodes(&self, kind: NodeKind) -> DbResult<Vec<Node>> {
        let rows: Vec<NodeRow> = sqlx::query_as(&format!(
            "SELECT {} FROM nodes WHERE kind = $1 ORDER BY sort_order, id",
            NODE_COLUMNS
        ))
        .bind(kind.as_str())
        .fetch_all(&self.pool)
        .await?;
        convert(rows)
    }

    async fn find_node(&self, kind: NodeKind, id: i64) -> DbResult<Option<Node>> {
        let row: Option<NodeRow> = sqlx::query_as(&format!(
            "SELECT {} FROM nodes WHERE kind = $1 AND id = $2",
            NODE_COLUMNS
        ))
        .bind(kind.as_str())
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(Node::try_from).transpose()
    }

    async fn insert_node(&self, node: NewNode) -> DbResult<Node> {
        let row: NodeRow = sqlx::query_as(&format!(
            "INSERT INTO nodes (kind, parent_id, name, code, sort_order, status, level, details) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8) RETURNING {}",
            NODE_COLUMNS
        ))
        .bind(node.kind.as_str())
        .bind(node.parent_id)
        .bind(&node.name)
        .bind(&node.code)
        .bind(node.sort_order)
        .bind(node.status.as_str())
        .bind(node.level)
        .bind(sqlx::types::Json(&node.details))
        .fetch_one(&self.pool)
        .await
        .map_err(map_sqlx)?;
        Node::try_from(row)
    }

    async fn update_node(&self, node: &Node) -> DbResult<Node> {
        let row: Option<NodeRow> = sqlx::query_as(&format!(
            "UPDATE nodes SET parent_id = $3, name = $4, code = $5, sort_order = $6, status = $7, \
             level = $8, details = $9, updated_at = now() \
             WHERE kind = $1 AND id = $2 RETURNING {}",
            NODE_COLUMNS
        ))
        .bind(node.kind.as_str())
        .bind(node.id)
        .bind(node.parent_id)
        .bind(&node.name)
        .bind(&node.code)
        .bind(node.sort_order)
        .bind(node.status.as_str())
        .bind(node.level)
        .bind(sqlx::types::Json(&node.details))
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx)?;

        match row {
            Some(row) => Node::try_from(row),
            None => Err(DatabaseError::NotFound(format!("{} {} not found", node.kind.label(), node.id))),
        }
    }

    async fn update_levels(&self, kind: NodeKind, levels: &[(i64, i32)]) -> DbResult<()> {
        if levels.is_empty() {
            return Ok(());
        }
        let (ids, values): (Vec<i64>, Vec<i32>) = levels.iter().copied().unzip();
        sqlx::query(
            "UPDATE nodes AS n SET level = v.level, updated_at = now() \
             FROM UNNEST($2::BIGINT[], $3::INTEGER[]) AS v(id, level) \
             WHERE n.id = v.id AND n.kind = $1",
        )
        .bind(kind.as_str())
        .bind(&ids)
        .bind(&values)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn delete_node(&self, kind: NodeKind, id: i64) -> DbResult<()> {
        // role_permissions rows go with the node via ON DELETE CASCADE
        let result = sqlx::query("DELETE FROM nodes WHERE kind = $1 AND id = $2")
            .bind(kind.as_str())
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(map_sqlx)?;
        if result.rows_affected() == 0 {
            return Err(DatabaseError::NotFound(format!("{} {} not found", kind.label(), id)));
        }
        Ok(())
    }
}

#[async_trait]
impl RoleRepository for PgStore {
    async fn page_roles(&self, filter: &RoleFilter, page: PageRequest) -> DbResult<Paged<Role>> {
        let conds = Where::default()
            .ilike("r.name", filter.name.as_deref())
            .ilike("r.code", filter.code.as_deref())
            .eq("r.status", filter.status.map(|s| s.as_str()));
        let (rows, total) = self
            .fetch_page::<RoleRow>(ROLE_SELECT, "roles r", &conds, "r.sort_order, r.id", page)
            .await?;
        Ok((convert(rows)?, total))
    }

    async fn list_roles(&self) -> DbResult<Vec<Role>> {
        let rows: Vec<RoleRow> =
            sqlx::query_as(&format!("SELECT {} FROM roles r ORDER BY r.sort_order, r.id", ROLE_SELECT))
                .fetch_all(&self.pool)
                .await?;
        convert(rows)
    }

    async fn find_role(&self, id: i64) -> DbResult<Option<Role>> {
        let row: Option<RoleRow> = sqlx::query_as(&format!("SELECT {} FROM roles r WHERE r.id = $1", ROLE_SELECT))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(Role::try_from).transpose()
    }

    async fn find_role_by_code(&self, code: &str) -> DbResult<Option<Role>> {
        let row: Option<RoleRow> = sqlx::query_as(&format!("SELECT {} FROM roles r WHERE r.code = $1", ROLE_SELECT))
            .bind(code)
            .fetch_optional(&self.pool)
            .await?;
        row.map(Role::try_from).transpose()
    }

    async fn roles_by_ids(&self, ids: &[i64]) -> DbResult<Vec<Role>> {
        let rows: Vec<RoleRow> = sqlx::query_as(&format!(
            "SELECT {} FROM roles r WHERE r.id = ANY($1) ORDER BY r.sort_order, r.id",
            ROLE_SELECT
        ))
        .bind(ids)
        .fetch_all(&self.pool)
        .await?;
        convert(rows)
    }

    async fn grants_for_roles(&self, codes: &[String]) -> DbResult<Vec<RoleGrant>> {
        let rows: Vec<(String, String, Vec<String>)> = sqlx::query_as(
            "SELECT r.code, r.status, \
                    COALESCE(ARRAY_AGG(n.code) FILTER (WHERE n.code IS NOT NULL AND n.code <> ''), '{}') \
             FROM roles r \
             LEFT JOIN role_permissions rp ON rp.role_id = r.id \
             LEFT JOIN nodes n ON n.id = rp.permission_id AND n.kind = 'permission' \
             WHERE r.code = ANY($1) \
             GROUP BY r.id, r.code, r.status",
        )
        .bind(codes)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(code, status, permissions)| RoleGrant {
                code,
                active: status == "active",
                permissions,
            })
            .collect())
    }

    async fn insert_role(&self, role: NewRole) -> DbResult<Role> {
        let id: i64 = sqlx::query_scalar(
            "INSERT INTO roles (code, name, description, status, sort_order) \
             VALUES ($1, $2, $3, $4, $5) RETURNING id",
        )
        .bind(&role.code)
        .bind(&role.name)
        .bind(&role.description)
        .bind(role.status.as_str())
        .bind(role.sort_order)
        .fetch_one(&self.pool)
        .await
        .map_err(map_sqlx)?;

        self.find_role(id)
            .await?
            .ok_or_else(|| DatabaseError::NotFound(format!("Role {} not found", id)))
    }

    async fn update_role(&self, role: &Role) -> DbResult<Role> {
        let result = sqlx::query(
            "UPDATE roles SET code = $2, name = $3, description = $4, status = $5, sort_order = $6, \
             updated_at = now() WHERE id = $1",
        )
        .bind(role.id)
        .bind(&role.code)
        .bind(&role.name)
        .bind(&role.description)
        .bind(role.status.as_str())
        .bind(role.sort_order)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx)?;
        if result.rows_affected() == 0 {
            return Err(DatabaseError::NotFound(format!("Role {} not found", role.id)));
        }

        self.find_role(role.id)
            .await?
            .ok_or_else(|| DatabaseError::NotFound(format!("Role {} not found", role.id)))
    }

    async fn delete_role(&self, id: i64) -> DbResult<()> {
        self.delete_by_id("roles", "Role", id).await
    }

    async fn replace_role_permissions(&self, role_id: i64, permission_ids: &[i64]) -> DbResult<()> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM role_permissions WHERE role_id = $1")
            .bind(role_id)
            .execute(&mut *tx)
            .await?;
        sqlx::query(
            "INSERT INTO role_permissions (role_id, permission_id) \
             SELECT $1, p FROM UNNEST($2::BIGINT[]) AS p ON CONFLICT DO NOTHING",
        )
        .bind(role_id)
        .bind(permission_ids)
        .execute(&mut *tx)
        .await
        .map_err(map_sqlx)?;
        sqlx::query("UPDATE roles SET updated_at = now() WHERE id = $1")
            .bind(role_id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(())
    }

    async fn count_role_users(&self, role_id: i64) -> DbResult<i64> {
        self.count("SELECT COUNT(*) FROM user_roles WHERE role_id = $1", role_id)
            .await
    }
}

#[async_trait]
impl UserRepository for PgStore {
    async fn page_users(&self, filter: &UserFilter, page: PageRequest) -> DbResult<Paged<User>> {
        let conds = Where::default()
            .ilike("u.username", filter.username.as_deref())
            .ilike("u.display_name", filter.name.as_deref())
            .eq("u.status", filter.status.map(|s| s.as_str()))
            .eq_id("u.organization_id", filter.organization_id);
        let (rows, total) = self
            .fetch_page::<UserRow>(USER_SELECT, "users u", &conds, "u.id", page)
            .await?;
        Ok((convert(rows)?, total))
    }

    async fn find_user(&self, id: i64) -> DbResult<Option<User>> {
        let row: Option<UserRow> = sqlx::query_as(&format!("SELECT {} FROM users u WHERE u.id = $1", USER_SELECT))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(User::try_from).transpose()
    }

    async fn find_user_by_username(&self, username: &str) -> DbResult<Option<User>> {
        let row: Option<UserRow> =
            sqlx::query_as(&format!("SELECT {} FROM users u WHERE u.username = $1", USER_SELECT))
                .bind(username)
                .fetch_optional(&self.pool)
                .await?;
        row.map(User::try_from).transpose()
    }

    async fn insert_user(&self, user: NewUser) -> DbResult<User> {
        let id: i64 = sqlx::query_scalar(
            "INSERT INTO users (username, password_hash, display_name, phone, email, organization_id, status, builtin) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8) RETURNING id",
        )
        .bind(&user.username)
        .bind(&user.password_hash)
        .bind(&user.display_name)
        .bind(&user.phone)
        .bind(&user.email)
        .bind(user.organization_id)
        .bind(user.status.as_str())
        .bind(user.builtin)
        .fetch_one(&self.pool)
        .await
        .map_err(map_sqlx)?;

        self.find_user(id)
            .await?
            .ok_or_else(|| DatabaseError::NotFound(format!("User {} not found", id)))
    }

    async fn update_user(&self, user: &User) -> DbResult<User> {
        let result = sqlx::query(
            "UPDATE users SET username = $2, password_hash = $3, display_name = $4, phone = $5, \
             email = $6, organization_id = $7, status = $8, updated_at = now() WHERE id = $1",
        )
        .bind(user.id)
        .bind(&user.username)
        .bind(&user.password_hash)
        .bind(&user.display_name)
        .bind(&user.phone)
        .bind(&user.email)
        .bind(user.organization_id)
        .bind(user.status.as_str())
        .execute(&self.pool)
        .await
        .map_err(map_sqlx)?;
        if result.rows_affected() == 0 {
            return Err(DatabaseError::NotFound(format!("User {} not found", user.id)));
        }

        self.find_user(user.id)
            .await?
            .ok_or_else(|| DatabaseError::NotFound(format!("User {} not found", user.id)))
    }

    async fn delete_user(&self, id: i64) -> DbResult<()> {
        self.delete_by_id("users", "User", id).await
    }

    async fn replace_user_roles(&self, user_id: i64, role_ids: &[i64]) -> DbResult<()> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM user_roles WHERE user_id = $1")
            .bind(user_id)
            .execute(&mut *tx)
            .await?;
        sqlx::query(
            "INSERT INTO user_roles (user_id, role_id) \
             SELECT $1, r FROM UNNEST($2::BIGINT[]) AS r ON CONFLICT DO NOTHING",
        )
        .bind(user_id)
        .bind(role_ids)
        .execute(&mut *tx)
        .await
        .map_err(map_sqlx)?;
        sqlx::query("UPDATE users SET updated_at = now() WHERE id = $1")
            .bind(user_id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(())
    }

    async fn record_login(&self, user_id: i64, at: DateTime<Utc>, ip: &str) -> DbResult<()> {
        sqlx::query("UPDATE users SET last_login_at = $2, last_login_ip = $3 WHERE id = $1")
            .bind(user_id)
            .bind(at)
            .bind(ip)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn count_users_in_organization(&self, organization_id: i64) -> DbResult<i64> {
        self.count("SELECT COUNT(*) FROM users WHERE organization_id = $1", organization_id)
            .await
    }

    async fn count_users(&self) -> DbResult<i64> {
        Ok(sqlx::query_scalar("SELECT COUNT(*) FROM users")
            .fetch_one(&self.pool)
            .await?)
    }
}

#[async_trait]
impl AssetRepository for PgStore {
    async fn page_assets(&self, filter: &AssetFilter, page: PageRequest) -> DbResult<Paged<Asset>> {
        let conds = Where::default()
            .ilike("name", filter.name.as_deref())
            .eq_id("organization_id", filter.organization_id)
            .eq("status", filter.status.map(|s| s.as_str()));
        let (rows, total) = self
            .fetch_page::<AssetRow>(ASSET_COLUMNS, "assets", &conds, "id", page)
            .await?;
        Ok((convert(rows)?, total))
    }

    async fn find_asset(&self, id: i64) -> DbResult<Option<Asset>> {
        let row: Option<AssetRow> = sqlx::query_as(&format!("SELECT {} FROM assets WHERE id = $1", ASSET_COLUMNS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(Asset::try_from).transpose()
    }

    async fn find_asset_by_code(&self, code: &str) -> DbResult<Option<Asset>> {
        let row: Option<AssetRow> = sqlx::query_as(&format!("SELECT {} FROM assets WHERE code = $1", ASSET_COLUMNS))
            .bind(code)
            .fetch_optional(&self.pool)
            .await?;
        row.map(Asset::try_from).transpose()
    }

    async fn find_asset_by_name(&self, name: &str) -> DbResult<Option<Asset>> {
        let row: Option<AssetRow> = sqlx::query_as(&format!("SELECT {} FROM assets WHERE name = $1", ASSET_COLUMNS))
            .bind(name)
            .fetch_optional(&self.pool)
            .await?;
        row.map(Asset::try_from).transpose()
    }

    async fn insert_asset(&self, draft: AssetDraft) -> DbResult<Asset> {
        let row: AssetRow = sqlx::query_as(&format!(
            "INSERT INTO assets (code, name, organization_id, address, longitude, latitude, land_nature, \
             total_area, rentable_area, tags, description, status) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12) RETURNING {}",
            ASSET_COLUMNS
        ))
        .bind(&draft.code)
        .bind(&draft.name)
        .bind(draft.organization_id)
        .bind(&draft.address)
        .bind(draft.longitude)
        .bind(draft.latitude)
        .bind(&draft.land_nature)
        .bind(draft.total_area)
        .bind(draft.rentable_area)
        .bind(&draft.tags)
        .bind(&draft.description)
        .bind(draft.status.as_str())
        .fetch_one(&self.pool)
        .await
        .map_err(map_sqlx)?;
        Asset::try_from(row)
    }

    async fn update_asset(&self, asset: &Asset) -> DbResult<Asset> {
        let row: Option<AssetRow> = sqlx::query_as(&format!(
            "UPDATE assets SET code = $2, name = $3, organization_id = $4, address = $5, longitude = $6, \
             latitude = $7, land_nature = $8, total_area = $9, rentable_area = $10, tags = $11, \
             description = $12, status = $13, updated_at = now() WHERE id = $1 RETURNING {}",
            ASSET_COLUMNS
        ))
        .bind(asset.id)
        .bind(&asset.code)
        .bind(&asset.name)
        .bind(asset.organization_id)
        .bind(&asset.address)
        .bind(asset.longitude)
        .bind(asset.latitude)
        .bind(&asset.land_nature)
        .bind(asset.total_area)
        .bind(asset.rentable_area)
        .bind(&asset.tags)
        .bind(&asset.description)
        .bind(asset.status.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx)?;

        row.map(Asset::try_from)
            .transpose()?
            .ok_or_else(|| DatabaseError::NotFound(format!("Asset {} not found", asset.id)))
    }

    async fn delete_asset(&self, id: i64) -> DbResult<()> {
        self.delete_by_id("assets", "Asset", id).await
    }

    async fn count_assets_in_organization(&self, organization_id: i64) -> DbResult<i64> {
        self.count("SELECT COUNT(*) FROM assets WHERE organization_id = $1", organization_id)
            .await
    }

    async fn page_buildings(&self, filter: &BuildingFilter, page: PageRequest) -> DbResult<Paged<Building>> {
        let conds = Where::default()
            .eq_id("asset_id", filter.asset_id)
            .ilike("name", filter.name.as_deref());
        let (rows, total) = self
            .fetch_page::<BuildingRow>(BUILDING_COLUMNS, "buildings", &conds, "id", page)
            .await?;
        Ok((convert(rows)?, total))
    }

    async fn find_building(&self, id: i64) -> DbResult<Option<Building>> {
        let row: Option<BuildingRow> =
            sqlx::query_as(&format!("SELECT {} FROM buildings WHERE id = $1", BUILDING_COLUMNS))
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
        row.map(Building::try_from).transpose()
    }

    async fn find_building_by_code(&self, code: &str) -> DbResult<Option<Building>> {
        let row: Option<BuildingRow> =
            sqlx::query_as(&format!("SELECT {} FROM buildings WHERE code = $1", BUILDING_COLUMNS))
                .bind(code)
                .fetch_optional(&self.pool)
                .await?;
        row.map(Building::try_from).transpose()
    }

    async fn insert_building(&self, draft: BuildingDraft) -> DbResult<Building> {
        let row: BuildingRow = sqlx::query_as(&format!(
            "INSERT INTO buildings (asset_id, code, name, floor_count, total_area, address, status, description) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8) RETURNING {}",
            BUILDING_COLUMNS
        ))
        .bind(draft.asset_id)
        .bind(&draft.code)
        .bind(&draft.name)
        .bind(draft.floor_count)
        .bind(draft.total_area)
        .bind(&draft.address)
        .bind(draft.status.as_str())
        .bind(&draft.description)
        .fetch_one(&self.pool)
        .await
        .map_err(map_sqlx)?;
        Building::try_from(row)
    }

    async fn update_building(&self, building: &Building) -> DbResult<Building> {
        let row: Option<BuildingRow> = sqlx::query_as(&format!(
            "UPDATE buildings SET asset_id = $2, code = $3, name = $4, floor_count = $5, total_area = $6, \
             address = $7, status = $8, description = $9, updated_at = now() WHERE id = $1 RETURNING {}",
            BUILDING_COLUMNS
        ))
        .bind(building.id)
        .bind(building.asset_id)
        .bind(&building.code)
        .bind(&building.name)
        .bind(building.floor_count)
        .bind(building.total_area)
        .bind(&building.address)
        .bind(building.status.as_str())
        .bind(&building.description)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx)?;

        row.map(Building::try_from)
            .transpose()?
            .ok_or_else(|| DatabaseError::NotFound(format!("Building {} not found", building.id)))
    }

    async fn delete_building(&self, id: i64) -> DbResult<()> {
        self.delete_by_id("buildings", "Building", id).await
    }

    async fn count_buildings(&self, asset_id: i64) -> DbResult<i64> {
        self.count("SELECT COUNT(*) FROM buildings WHERE asset_id = $1", asset_id)
            .await
    }

    async fn page_floors(&self, filter: &FloorFilter, page: PageRequest) -> DbResult<Paged<Floor>> {
        let conds = Where::default()
            .eq_id("building_id", filter.building_id)
            .ilike("name", filter.name.as_deref());
        let (rows, total) = self
            .fetch_page::<FloorRow>(FLOOR_COLUMNS, "floors", &conds, "building_id, floor_number, id", page)
            .await?;
        Ok((convert(rows)?, total))
    }

    async fn find_floor(&self, id: i64) -> DbResult<Option<Floor>> {
        let row: Option<FloorRow> = sqlx::query_as(&format!("SELECT {} FROM floors WHERE id = $1", FLOOR_COLUMNS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(Floor::try_from).transpose()
    }

    async fn find_floor_by_number(&self, building_id: i64, floor_number: i32) -> DbResult<Option<Floor>> {
        let row: Option<FloorRow> = sqlx::query_as(&format!(
            "SELECT {} FROM floors WHERE building_id = $1 AND floor_number = $2",
            FLOOR_COLUMNS
        ))
        .bind(building_id)
        .bind(floor_number)
        .fetch_optional(&self.pool)
        .await?;
        row.map(Floor::try_from).transpose()
    }

    async fn insert_floor(&self, draft: FloorDraft) -> DbResult<Floor> {
        let row: FloorRow = sqlx::query_as(&format!(
            "INSERT INTO floors (building_id, floor_number, name, area, status) \
             VALUES ($1, $2, $3, $4, $5) RETURNING {}",
            FLOOR_COLUMNS
        ))
        .bind(draft.building_id)
        .bind(draft.floor_number)
        .bind(&draft.name)
        .bind(draft.area)
        .bind(draft.status.as_str())
        .fetch_one(&self.pool)
        .await
        .map_err(map_sqlx)?;
        Floor::try_from(row)
    }

    async fn update_floor(&self, floor: &Floor) -> DbResult<Floor> {
        let row: Option<FloorRow> = sqlx::query_as(&format!(
            "UPDATE floors SET building_id = $2, floor_number = $3, name = $4, area = $5, status = $6, \
             updated_at = now() WHERE id = $1 RETURNING {}",
            FLOOR_COLUMNS
        ))
        .bind(floor.id)
        .bind(floor.building_id)
        .bind(floor.floor_number)
        .bind(&floor.name)
        .bind(floor.area)
        .bind(floor.status.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx)?;

        row.map(Floor::try_from)
            .transpose()?
            .ok_or_else(|| DatabaseError::NotFound(format!("Floor {} not found", floor.id)))
    }

    async fn delete_floor(&self, id: i64) -> DbResult<()> {
        self.delete_by_id("floors", "Floor", id).await
    }

    async fn count_floors(&self, building_id: i64) -> DbResult<i64> {
        self.count("SELECT COUNT(*) FROM floors WHERE building_id = $1", building_id)
            .await
    }

    async fn page_rooms(&self, filter: &RoomFilter, page: PageRequest) -> DbResult<Paged<Room>> {
        let conds = Where::default()
            .eq_id("floor_id", filter.floor_id)
            .eq("status", filter.status.map(|s| s.as_str()))
            .ilike("room_number", filter.room_number.as_deref());
        let (rows, total) = self
            .fetch_page::<RoomRow>(ROOM_COLUMNS, "rooms", &conds, "id", page)
            .await?;
        Ok((convert(rows)?, total))
    }

    async fn find_room(&self, id: i64) -> DbResult<Option<Room>> {
        let row: Option<RoomRow> = sqlx::query_as(&format!("SELECT {} FROM rooms WHERE id = $1", ROOM_COLUMNS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(Room::try_from).transpose()
    }

    async fn find_room_by_number(&self, floor_id: i64, room_number: &str) -> DbResult<Option<Room>> {
        let row: Option<RoomRow> = sqlx::query_as(&format!(
            "SELECT {} FROM rooms WHERE floor_id = $1 AND room_number = $2",
            ROOM_COLUMNS
        ))
        .bind(floor_id)
        .bind(room_number)
        .fetch_optional(&self.pool)
        .await?;
        row.map(Room::try_from).transpose()
    }

    async fn insert_room(&self, draft: RoomDraft) -> DbResult<Room> {
        let row: RoomRow = sqlx::query_as(&format!(
            "INSERT INTO rooms (floor_id, room_number, area, usage, status) \
             VALUES ($1, $2, $3, $4, $5) RETURNING {}",
            ROOM_COLUMNS
        ))
        .bind(draft.floor_id)
        .bind(&draft.room_number)
        .bind(draft.area)
        .bind(&draft.usage)
        .bind(draft.status.as_str())
        .fetch_one(&self.pool)
        .await
        .map_err(map_sqlx)?;
        Room::try_from(row)
    }

    async fn update_room(&self, room: &Room) -> DbResult<Room> {
        let row: Option<RoomRow> = sqlx::query_as(&format!(
            "UPDATE rooms SET floor_id = $2, room_number = $3, area = $4, usage = $5, status = $6, \
             updated_at = now() WHERE id = $1 RETURNING {}",
            ROOM_COLUMNS
        ))
        .bind(room.id)
        .bind(room.floor_id)
        .bind(&room.room_number)
        .bind(room.area)
        .bind(&room.usage)
        .bind(room.status.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx)?;

        row.map(Room::try_from)
            .transpose()?
            .ok_or_else(|| DatabaseError::NotFound(format!("Room {} not found", room.id)))
    }

    async fn delete_room(&self, id: i64) -> DbResult<()> {
        self.delete_by_id("rooms", "Room", id).await
    }

    async fn count_rooms(&self, floor_id: i64) -> DbResult<i64> {
        self.count("SELECT COUNT(*) FROM rooms WHERE floor_id = $1", floor_id)
            .await
    }

    async fn asset_statistics(&self) -> DbResult<AssetStatistics> {
        let (asset_count, total_area, rentable_area): (i64, f64, f64) = sqlx::query_as(
            "SELECT COUNT(*), COALESCE(SUM(total_area), 0)::DOUBLE PRECISION, \
                    COALESCE(SUM(rentable_area), 0)::DOUBLE PRECISION FROM assets",
        )
        .fetch_one(&self.pool)
        .await?;
        let building_count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM buildings")
            .fetch_one(&self.pool)
            .await?;
        let floor_count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM floors")
            .fetch_one(&self.pool)
            .await?;
        let by_status: Vec<(String, i64)> = sqlx::query_as("SELECT status, COUNT(*) FROM rooms GROUP BY status")
            .fetch_all(&self.pool)
            .await?;

        let mut rooms_by_status: BTreeMap<String, i64> =
            RoomStatus::ALL.iter().map(|s| (s.as_str().to_string(), 0)).collect();
        rooms_by_status.extend(by_status);
        let room_count = rooms_by_status.values().sum();

        Ok(AssetStatistics {
            asset_count,
            building_count,
            floor_count,
            room_count,
            total_area,
            rentable_area,
            rooms_by_status,
        })
    }
}

#[async_trait]
impl AuditRepository for PgStore {
    async fn insert_operation_log(&self, log: NewOperationLog) -> DbResult<()> {
        sqlx::query(
            "INSERT INTO operation_logs (user_id, username, module, action, method, path, status_code, \
             duration_ms, client_ip, user_agent) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)",
        )
        .bind(log.user_id)
        .bind(&log.username)
        .bind(&log.module)
        .bind(&log.action)
        .bind(&log.method)
        .bind(&log.path)
        .bind(log.status_code)
        .bind(log.duration_ms)
        .bind(&log.client_ip)
        .bind(&log.user_agent)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn insert_login_log(&self, log: NewLoginLog) -> DbResult<()> {
        sqlx::query(
            "INSERT INTO login_logs (username, user_id, outcome, message, client_ip, user_agent) \
             VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(&log.username)
        .bind(log.user_id)
        .bind(log.outcome.as_str())
        .bind(&log.message)
        .bind(&log.client_ip)
        .bind(&log.user_agent)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn page_operation_logs(&self, filter: &LogFilter, page: PageRequest) -> DbResult<Paged<OperationLog>> {
        let conds = Where::default()
            .ilike("username", filter.username.as_deref())
            .eq("module", filter.module.as_deref())
            .range("created_at", filter.from, filter.to);
        let (rows, total) = self
            .fetch_page::<OperationLogRow>(
                OPERATION_LOG_COLUMNS,
                "operation_logs",
                &conds,
                "created_at DESC, id DESC",
                page,
            )
            .await?;
        Ok((rows.into_iter().map(OperationLog::from).collect(), total))
    }

    async fn page_login_logs(&self, filter: &LogFilter, page: PageRequest) -> DbResult<Paged<LoginLog>> {
        let conds = Where::default()
            .ilike("username", filter.username.as_deref())
            .range("created_at", filter.from, filter.to);
        let (rows, total) = self
            .fetch_page::<LoginLogRow>(LOGIN_LOG_COLUMNS, "login_logs", &conds, "created_at DESC, id DESC", page)
            .await?;
        Ok((convert(rows)?, total))
    }

    async fn purge_logs_before(&self, cutoff: DateTime<Utc>) -> DbResult<u64> {
        let mut tx = self.pool.begin().await?;
        let operations = sqlx::query("DELETE FROM operation_logs WHERE created_at < $1")
            .bind(cutoff)
            .execute(&mut *tx)
            .await?
            .rows_affected();
        let logins = sqlx::query("DELETE FROM login_logs WHERE created_at < $1")
            .bind(cutoff)
            .execute(&mut *tx)
            .await?
            .rows_affected();
        tx.commit().await?;
        Ok(operations + logins)
    }
}
