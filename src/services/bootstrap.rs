//! Idempotent default data: permission tree, menu tree, the `admin` and
//! `user` roles and the administrator account. Each set is only written
//! when it is empty, so running the seed twice changes nothing.

use serde::Serialize;
use serde_json::{json, Map, Value};
use std::collections::HashMap;
use std::sync::Arc;

use super::node_service::{NodeInput, NodeService};
use super::role_service::{RoleInput, RoleService};
use super::user_service::{UserInput, UserService};
use super::ServiceResult;
use crate::auth::CredentialVerifier;
use crate::config::BootstrapConfig;
use crate::database::models::NodeKind;
use crate::database::Store;

pub const ADMIN_ROLE: &str = "admin";
pub const USER_ROLE: &str = "user";

const ACTIONS: [&str; 5] = ["list", "view", "create", "update", "delete"];

/// Asset hierarchy modules: (code, name, sort order)
const ASSET_MODULES: [(&str, &str, i32); 4] = [
    ("asset", "Assets", 2),
    ("building", "Buildings", 3),
    ("floor", "Floors", 4),
    ("room", "Rooms", 5),
];

const SYSTEM_MODULES: [(&str, &str); 5] = [
    ("user", "Users"),
    ("role", "Roles"),
    ("org", "Organizations"),
    ("menu", "Menus"),
    ("log", "Logs"),
];

/// Stand-alone pages gated by their own permission: (code, name, path, icon, sort order)
const PAGES: [(&str, &str, &str, &str, i32); 3] = [
    ("dashboard", "Dashboard", "/dashboard", "DashboardOutlined", 1),
    ("map", "Map", "/map", "EnvironmentOutlined", 6),
    ("statistics", "Statistics", "/statistics", "BarChartOutlined", 7),
];

/// Read-only grants of the `user` role
const USER_ROLE_CODES: [&str; 15] = [
    "dashboard",
    "map",
    "statistics",
    "asset",
    "asset:list",
    "asset:view",
    "building",
    "building:list",
    "building:view",
    "floor",
    "floor:list",
    "floor:view",
    "room",
    "room:list",
    "room:view",
];

#[derive(Debug, Clone, Default, Serialize)]
pub struct SeedReport {
    pub permissions_created: usize,
    pub menus_created: usize,
    pub roles_created: usize,
    pub admin_created: bool,
}

impl SeedReport {
    pub fn is_noop(&self) -> bool {
        self.permissions_created == 0 && self.menus_created == 0 && self.roles_created == 0 && !self.admin_created
    }
}

pub struct Bootstrap {
    permissions: NodeService,
    menus: NodeService,
    roles: RoleService,
    users: UserService,
    admin_username: String,
    admin_password: String,
}

impl Bootstrap {
    pub fn new(store: Arc<dyn Store>, verifier: Arc<dyn CredentialVerifier>, config: &BootstrapConfig) -> Self {
        Self {
            permissions: NodeService::new(store.clone(), NodeKind::Permission),
            menus: NodeService::new(store.clone(), NodeKind::Menu),
            roles: RoleService::new(store.clone()),
            users: UserService::new(store, verifier),
            admin_username: config.admin_username.clone(),
            admin_password: config.admin_password.clone(),
        }
    }

    pub async fn seed(&self) -> ServiceResult<SeedReport> {
        let mut report = SeedReport::default();

        if self.permissions.list().await?.is_empty() {
            report.permissions_created = self.seed_permissions().await?;
        }
        if self.menus.list().await?.is_empty() {
            report.menus_created = self.seed_menus().await?;
        }
        if self.roles.list_all().await?.is_empty() {
            report.roles_created = self.seed_roles().await?;
        }
        if self.users.find_by_username(&self.admin_username).await?.is_none() {
            self.seed_admin().await?;
            report.admin_created = true;
        }

        tracing::info!(
            permissions = report.permissions_created,
            menus = report.menus_created,
            roles = report.roles_created,
            admin = report.admin_created,
            "seed finished"
        );
        Ok(report)
    }

    async fn seed_permissions(&self) -> ServiceResult<usize> {
        let mut created = 0;

        for (code, name, path, icon, sort_order) in PAGES {
            let attrs = details(&[
                ("permission_type", json!("menu")),
                ("path", json!(path)),
                ("icon", json!(icon)),
            ]);
            self.permissions.create(node(None, name, code, sort_order, attrs)).await?;
            created += 1;
        }

        for (code, name, sort_order) in ASSET_MODULES {
            created += self.permission_module(None, code, name, sort_order, "module").await?;
        }

        let system = self
            .permissions
            .create(node(None, "System", "system", 9, details(&[("permission_type", json!("module"))])))
            .await?;
        created += 1;
        for (i, (code, name)) in SYSTEM_MODULES.into_iter().enumerate() {
            created += self
                .permission_module(Some(system.id), code, name, i as i32 + 1, "menu")
                .await?;
        }

        Ok(created)
    }

    /// A module node with one button per CRUD action underneath
    async fn permission_module(
        &self,
        parent_id: Option<i64>,
        code: &str,
        name: &str,
        sort_order: i32,
        permission_type: &str,
    ) -> ServiceResult<usize> {
        let module = self
            .permissions
            .create(node(parent_id, name, code, sort_order, details(&[("permission_type", json!(permission_type))])))
            .await?;

        for (i, action) in ACTIONS.into_iter().enumerate() {
            self.permissions
                .create(node(
                    Some(module.id),
                    &format!("{}: {}", name, action),
                    &format!("{}:{}", code, action),
                    i as i32 + 1,
                    details(&[("permission_type", json!("button"))]),
                ))
                .await?;
        }

        Ok(ACTIONS.len() + 1)
    }

    async fn seed_menus(&self) -> ServiceResult<usize> {
        let mut created = 0;

        for (code, name, path, icon, sort_order) in PAGES {
            self.menus
                .create(node(None, name, code, sort_order, menu(path, name, icon)))
                .await?;
            created += 1;
        }

        let assets = self
            .menus
            .create(node(None, "Asset management", "asset", 2, menu("/asset", "Layout", "BankOutlined")))
            .await?;
        created += 1;
        for (i, (code, name, _)) in ASSET_MODULES.into_iter().enumerate() {
            let path = format!("/asset/{}s", code);
            let component = format!("asset/{}List", name.trim_end_matches('s'));
            self.menus
                .create(node(Some(assets.id), name, &format!("{}:list", code), i as i32 + 1, menu(&path, &component, "")))
                .await?;
            created += 1;
        }

        let system = self
            .menus
            .create(node(None, "System management", "system", 9, menu("/system", "Layout", "SettingOutlined")))
            .await?;
        created += 1;
        for (i, (code, name)) in SYSTEM_MODULES.into_iter().enumerate() {
            let path = format!("/system/{}", name.to_lowercase());
            let component = format!("system/{}List", name.trim_end_matches('s'));
            self.menus
                .create(node(Some(system.id), name, &format!("{}:list", code), i as i32 + 1, menu(&path, &component, "")))
                .await?;
            created += 1;
        }

        Ok(created)
    }

    async fn seed_roles(&self) -> ServiceResult<usize> {
        let permissions = self.permissions.list().await?;
        let by_code: HashMap<&str, i64> = permissions.iter().map(|p| (p.code.as_str(), p.id)).collect();

        self.roles
            .create(RoleInput {
                code: ADMIN_ROLE.to_string(),
                name: "Administrator".to_string(),
                description: "Full access".to_string(),
                sort_order: 1,
                permission_ids: permissions.iter().map(|p| p.id).collect(),
                ..Default::default()
            })
            .await?;

        self.roles
            .create(RoleInput {
                code: USER_ROLE.to_string(),
                name: "User".to_string(),
                description: "Read-only access to assets".to_string(),
                sort_order: 2,
                permission_ids: USER_ROLE_CODES.iter().filter_map(|c| by_code.get(c).copied()).collect(),
                ..Default::default()
            })
            .await?;

        Ok(2)
    }

    async fn seed_admin(&self) -> ServiceResult<()> {
        let role_ids = self
            .roles
            .list_all()
            .await?
            .into_iter()
            .filter(|r| r.code == ADMIN_ROLE)
            .map(|r| r.id)
            .collect();

        self.users
            .create_builtin(UserInput {
                username: self.admin_username.clone(),
                password: self.admin_password.clone(),
                display_name: "Administrator".to_string(),
                role_ids,
                ..Default::default()
            })
            .await?;
        Ok(())
    }
}

fn node(parent_id: Option<i64>, name: &str, code: &str, sort_order: i32, details: Map<String, Value>) -> NodeInput {
    NodeInput {
        parent_id,
        name: name.to_string(),
        code: code.to_string(),
        sort_order,
        details,
        ..Default::default()
    }
}

fn details(pairs: &[(&str, Value)]) -> Map<String, Value> {
    pairs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()
}

fn menu(path: &str, component: &str, icon: &str) -> Map<String, Value> {
    let mut map = details(&[("path", json!(path)), ("component", json!(component))]);
    if !icon.is_empty() {
        map.insert("icon".to_string(), json!(icon));
    }
    map
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::access::Identity;
    use crate::auth::Argon2Verifier;
    use crate::config::AppConfig;
    use crate::database::MemoryStore;
    use std::collections::BTreeSet;

    fn bootstrap(store: Arc<dyn Store>) -> Bootstrap {
        Bootstrap::new(store, Arc::new(Argon2Verifier), &AppConfig::development().bootstrap)
    }

    fn identity(role: &str) -> Identity {
        Identity {
            user_id: 1,
            username: "x".into(),
            display_name: "X".into(),
            role_codes: BTreeSet::from([role.to_string()]),
        }
    }

    #[tokio::test]
    async fn seed_is_idempotent() {
        let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
        let first = bootstrap(store.clone()).seed().await.unwrap();
        assert!(first.permissions_created > 0);
        assert!(first.menus_created > 0);
        assert_eq!(first.roles_created, 2);
        assert!(first.admin_created);

        let second = bootstrap(store).seed().await.unwrap();
        assert!(second.is_noop());
    }

    #[tokio::test]
    async fn seeded_trees_are_consistent() {
        let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
        bootstrap(store.clone()).seed().await.unwrap();

        for kind in [NodeKind::Permission, NodeKind::Menu] {
            let report = NodeService::new(store.clone(), kind).check().await.unwrap();
            assert!(report.stale_levels.is_empty(), "{:?}", report);
        }
    }

    #[tokio::test]
    async fn user_role_sees_asset_menus_but_not_system() {
        let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
        bootstrap(store.clone()).seed().await.unwrap();

        let roles = RoleService::new(store.clone());
        let granted = roles.effective_codes(&identity(USER_ROLE)).await.unwrap();
        assert!(granted.contains("asset:list"));
        assert!(!granted.contains("asset:delete"));

        let menus = NodeService::new(store, NodeKind::Menu);
        let forest = menus.visible_tree(&granted).await.unwrap();
        let names: Vec<&str> = forest.iter().map(|t| t.node.name.as_str()).collect();
        assert_eq!(names, vec!["Dashboard", "Asset management", "Map", "Statistics"]);
    }

    #[tokio::test]
    async fn admin_role_holds_every_permission() {
        let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
        bootstrap(store.clone()).seed().await.unwrap();

        let granted = RoleService::new(store.clone())
            .effective_codes(&identity(ADMIN_ROLE))
            .await
            .unwrap();
        let all = NodeService::new(store, NodeKind::Permission).list().await.unwrap();
        assert_eq!(granted.len(), all.len());
        assert!(granted.contains("user:delete"));
    }
}
