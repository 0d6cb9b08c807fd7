use serde::Deserialize;
use std::collections::BTreeSet;
use std::sync::Arc;

use super::node_service::required;
use super::{ServiceError, ServiceResult};
use crate::access::{effective_permission_codes, Identity, RoleGrant};
use crate::database::models::{NewRole, NodeKind, Role, RoleFilter};
use crate::database::Store;
use crate::types::{nullable, Page, PageRequest, Status};

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RoleInput {
    pub code: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub status: Status,
    #[serde(default)]
    pub sort_order: i32,
    #[serde(default)]
    pub permission_ids: Vec<i64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RolePatch {
    pub code: Option<String>,
    pub name: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub description: Option<Option<String>>,
    pub status: Option<Status>,
    pub sort_order: Option<i32>,
}

#[derive(Clone)]
pub struct RoleService {
    store: Arc<dyn Store>,
}

impl RoleService {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    pub async fn page(&self, filter: &RoleFilter, page: PageRequest) -> ServiceResult<Page<Role>> {
        let (items, total) = self.store.page_roles(filter, page).await?;
        Ok(Page::new(items, total, page))
    }

    pub async fn list_all(&self) -> ServiceResult<Vec<Role>> {
        Ok(self.store.list_roles().await?)
    }

    pub async fn get(&self, id: i64) -> ServiceResult<Role> {
        self.store
            .find_role(id)
            .await?
            .ok_or_else(|| ServiceError::not_found("Role", id))
    }

    pub async fn create(&self, input: RoleInput) -> ServiceResult<Role> {
        let code = required(&input.code, "code")?;
        let name = required(&input.name, "name")?;
        if self.store.find_role_by_code(&code).await?.is_some() {
            return Err(ServiceError::validation(format!("Role code '{}' already exists", code)));
        }
        self.check_permission_ids(&input.permission_ids).await?;

        let role = self
            .store
            .insert_role(NewRole {
                code,
                name,
                description: input.description.trim().to_string(),
                status: input.status,
                sort_order: input.sort_order,
            })
            .await?;

        if !input.permission_ids.is_empty() {
            self.store.replace_role_permissions(role.id, &input.permission_ids).await?;
        }

        tracing::info!(role_id = role.id, code = %role.code, "role created");
        self.get(role.id).await
    }

    pub async fn update(&self, id: i64, patch: RolePatch) -> ServiceResult<Role> {
        let mut role = self.get(id).await?;

        if let Some(code) = patch.code {
            let code = required(&code, "code")?;
            if code != role.code {
                if let Some(existing) = self.store.find_role_by_code(&code).await? {
                    if existing.id != id {
                        return Err(ServiceError::validation(format!("Role code '{}' already exists", code)));
                    }
                }
            }
            role.code = code;
        }
        if let Some(name) = patch.name {
            role.name = required(&name, "name")?;
        }
        if let Some(description) = patch.description {
            role.description = description.unwrap_or_default();
        }
        if let Some(status) = patch.status {
            role.status = status;
        }
        if let Some(sort_order) = patch.sort_order {
            role.sort_order = sort_order;
        }

        Ok(self.store.update_role(&role).await?)
    }

    pub async fn delete(&self, id: i64) -> ServiceResult<()> {
        let role = self.get(id).await?;
        let users = self.store.count_role_users(id).await?;
        if users > 0 {
            return Err(ServiceError::in_use(format!(
                "Role '{}' is assigned to {} user(s)",
                role.code, users
            )));
        }

        self.store.delete_role(id).await?;
        tracing::info!(role_id = id, code = %role.code, "role deleted");
        Ok(())
    }

    /// Replace the role's permission set wholesale
    pub async fn set_permissions(&self, id: i64, permission_ids: &[i64]) -> ServiceResult<Role> {
        self.get(id).await?;
        self.check_permission_ids(permission_ids).await?;
        self.store.replace_role_permissions(id, permission_ids).await?;
        self.get(id).await
    }

    /// Grants of the identity's roles, as the guard consumes them
    pub async fn grants_for(&self, identity: &Identity) -> ServiceResult<Vec<RoleGrant>> {
        let codes: Vec<String> = identity.role_codes.iter().cloned().collect();
        if codes.is_empty() {
            return Ok(Vec::new());
        }
        Ok(self.store.grants_for_roles(&codes).await?)
    }

    pub async fn effective_codes(&self, identity: &Identity) -> ServiceResult<BTreeSet<String>> {
        let grants = self.grants_for(identity).await?;
        Ok(effective_permission_codes(&grants))
    }

    async fn check_permission_ids(&self, ids: &[i64]) -> ServiceResult<()> {
        if ids.is_empty() {
            return Ok(());
        }
        let known: BTreeSet<i64> = self
            .store
            .list_nodes(NodeKind::Permission)
            .await?
            .into_iter()
            .map(|n| n.id)
            .collect();

        let unknown: Vec<String> = ids
            .iter()
            .filter(|id| !known.contains(id))
            .map(|id| id.to_string())
            .collect();
        if !unknown.is_empty() {
            return Err(ServiceError::validation(format!(
                "Unknown permission id(s): {}",
                unknown.join(", ")
            )));
        }
        Ok(())
    }
}
