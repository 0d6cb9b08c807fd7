use chrono::Utc;
use serde::Deserialize;
use std::collections::BTreeSet;
use std::sync::Arc;

use super::node_service::required;
use super::{ServiceError, ServiceResult};
use crate::access::Identity;
use crate::auth::CredentialVerifier;
use crate::database::models::{NewUser, NodeKind, User, UserFilter};
use crate::database::Store;
use crate::types::{nullable, Page, PageRequest, Status};

pub const MIN_PASSWORD_LEN: usize = 6;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UserInput {
    pub username: String,
    pub password: String,
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub organization_id: Option<i64>,
    #[serde(default)]
    pub status: Status,
    #[serde(default)]
    pub role_ids: Vec<i64>,
}

/// Partial update; the username never changes after creation
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UserPatch {
    pub display_name: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub phone: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable")]
    pub email: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable")]
    pub organization_id: Option<Option<i64>>,
    pub status: Option<Status>,
    pub role_ids: Option<Vec<i64>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PasswordChange {
    /// Checked when present
    #[serde(default)]
    pub old_password: Option<String>,
    pub new_password: String,
}

#[derive(Clone)]
pub struct UserService {
    store: Arc<dyn Store>,
    verifier: Arc<dyn CredentialVerifier>,
}

impl UserService {
    pub fn new(store: Arc<dyn Store>, verifier: Arc<dyn CredentialVerifier>) -> Self {
        Self { store, verifier }
    }

    pub async fn page(&self, filter: &UserFilter, page: PageRequest) -> ServiceResult<Page<User>> {
        let (items, total) = self.store.page_users(filter, page).await?;
        Ok(Page::new(items, total, page))
    }

    pub async fn get(&self, id: i64) -> ServiceResult<User> {
        self.store
            .find_user(id)
            .await?
            .ok_or_else(|| ServiceError::not_found("User", id))
    }

    pub async fn find_by_username(&self, username: &str) -> ServiceResult<Option<User>> {
        Ok(self.store.find_user_by_username(username).await?)
    }

    pub async fn create(&self, input: UserInput) -> ServiceResult<User> {
        self.insert(input, false).await
    }

    /// The seeded administrator, protected from disabling and deletion
    pub async fn create_builtin(&self, input: UserInput) -> ServiceResult<User> {
        self.insert(input, true).await
    }

    async fn insert(&self, input: UserInput, builtin: bool) -> ServiceResult<User> {
        let username = required(&input.username, "username")?;
        check_password(&input.password)?;
        if self.store.find_user_by_username(&username).await?.is_some() {
            return Err(ServiceError::validation(format!("Username '{}' already exists", username)));
        }
        self.check_organization(input.organization_id).await?;
        self.check_roles(&input.role_ids).await?;

        let display_name = match input.display_name.trim() {
            "" => username.clone(),
            name => name.to_string(),
        };

        let user = self
            .store
            .insert_user(NewUser {
                username,
                password_hash: self.verifier.hash(&input.password)?,
                display_name,
                phone: input.phone.trim().to_string(),
                email: input.email.trim().to_string(),
                organization_id: input.organization_id.filter(|o| *o > 0),
                status: input.status,
                builtin,
            })
            .await?;

        if !input.role_ids.is_empty() {
            self.store.replace_user_roles(user.id, &input.role_ids).await?;
        }

        tracing::info!(user_id = user.id, username = %user.username, builtin, "user created");
        self.get(user.id).await
    }

    pub async fn update(&self, id: i64, patch: UserPatch) -> ServiceResult<User> {
        let mut user = self.get(id).await?;

        if let Some(name) = patch.display_name {
            user.display_name = required(&name, "display_name")?;
        }
        if let Some(phone) = patch.phone {
            user.phone = phone.unwrap_or_default();
        }
        if let Some(email) = patch.email {
            user.email = email.unwrap_or_default();
        }
        if let Some(organization_id) = patch.organization_id {
            let organization_id = organization_id.filter(|o| *o > 0);
            self.check_organization(organization_id).await?;
            user.organization_id = organization_id;
        }
        if let Some(status) = patch.status {
            if status != Status::Active && user.builtin {
                return Err(ServiceError::validation("The built-in administrator cannot be disabled"));
            }
            user.status = status;
        }
        if let Some(role_ids) = &patch.role_ids {
            self.check_roles(role_ids).await?;
        }

        let updated = self.store.update_user(&user).await?;
        match patch.role_ids {
            Some(role_ids) => {
                self.store.replace_user_roles(id, &role_ids).await?;
                self.get(id).await
            }
            None => Ok(updated),
        }
    }

    pub async fn delete(&self, id: i64) -> ServiceResult<()> {
        let user = self.get(id).await?;
        if user.builtin {
            return Err(ServiceError::in_use("The built-in administrator cannot be deleted"));
        }
        self.store.delete_user(id).await?;
        tracing::info!(user_id = id, username = %user.username, "user deleted");
        Ok(())
    }

    pub async fn change_password(&self, id: i64, change: PasswordChange) -> ServiceResult<()> {
        let mut user = self.get(id).await?;
        if let Some(old) = change.old_password.as_deref() {
            if !self.verifier.verify(old, &user.password_hash) {
                return Err(ServiceError::validation("Old password is incorrect"));
            }
        }
        check_password(&change.new_password)?;

        user.password_hash = self.verifier.hash(&change.new_password)?;
        self.store.update_user(&user).await?;
        tracing::info!(user_id = id, "password changed");
        Ok(())
    }

    pub async fn set_roles(&self, id: i64, role_ids: &[i64]) -> ServiceResult<User> {
        self.get(id).await?;
        self.check_roles(role_ids).await?;
        self.store.replace_user_roles(id, role_ids).await?;
        self.get(id).await
    }

    pub async fn mark_login(&self, id: i64, ip: &str) -> ServiceResult<()> {
        Ok(self.store.record_login(id, Utc::now(), ip).await?)
    }

    pub fn verify_password(&self, user: &User, password: &str) -> bool {
        self.verifier.verify(password, &user.password_hash)
    }

    /// Identity of a token holder as of now. A deleted or disabled account
    /// is rejected and role codes reflect the current assignment.
    pub async fn current_identity(&self, user_id: i64) -> ServiceResult<Identity> {
        match self.store.find_user(user_id).await? {
            Some(user) if user.status.is_active() => self.identity(&user).await,
            Some(_) => Err(ServiceError::Unauthenticated("Account is disabled".to_string())),
            None => Err(ServiceError::Unauthenticated("Account no longer exists".to_string())),
        }
    }

    /// Identity carried in tokens: only active roles count
    pub async fn identity(&self, user: &User) -> ServiceResult<Identity> {
        let role_codes: BTreeSet<String> = self
            .store
            .roles_by_ids(&user.role_ids)
            .await?
            .into_iter()
            .filter(|r| r.status.is_active())
            .map(|r| r.code)
            .collect();

        Ok(Identity {
            user_id: user.id,
            username: user.username.clone(),
            display_name: user.display_name.clone(),
            role_codes,
        })
    }

    async fn check_organization(&self, organization_id: Option<i64>) -> ServiceResult<()> {
        let Some(org) = organization_id.filter(|o| *o > 0) else {
            return Ok(());
        };
        if self.store.find_node(NodeKind::Organization, org).await?.is_none() {
            return Err(ServiceError::validation(format!("Organization {} does not exist", org)));
        }
        Ok(())
    }

    async fn check_roles(&self, role_ids: &[i64]) -> ServiceResult<()> {
        if role_ids.is_empty() {
            return Ok(());
        }
        let found: BTreeSet<i64> = self
            .store
            .roles_by_ids(role_ids)
            .await?
            .into_iter()
            .map(|r| r.id)
            .collect();
        let missing: Vec<String> = role_ids
            .iter()
            .filter(|id| !found.contains(id))
            .map(|id| id.to_string())
            .collect();
        if !missing.is_empty() {
            return Err(ServiceError::validation(format!("Unknown role id(s): {}", missing.join(", "))));
        }
        Ok(())
    }
}

fn check_password(password: &str) -> ServiceResult<()> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(ServiceError::validation(format!(
            "Password must be at least {} characters",
            MIN_PASSWORD_LEN
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::Argon2Verifier;
    use crate::database::models::NewRole;
    use crate::database::{MemoryStore, RoleRepository};
    use serde_json::json;

    fn service(store: Arc<MemoryStore>) -> UserService {
        UserService::new(store, Arc::new(Argon2Verifier))
    }

    fn input(username: &str) -> UserInput {
        UserInput {
            username: username.into(),
            password: "secret123".into(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn create_hashes_the_password() {
        let users = service(Arc::new(MemoryStore::new()));
        let user = users.create(input("alice")).await.unwrap();
        assert_ne!(user.password_hash, "secret123");
        assert!(users.verify_password(&user, "secret123"));
        assert_eq!(user.display_name, "alice");
    }

    #[tokio::test]
    async fn create_validates_username_password_and_references() {
        let users = service(Arc::new(MemoryStore::new()));
        users.create(input("alice")).await.unwrap();

        let dup = users.create(input("alice")).await.unwrap_err();
        assert!(matches!(dup, ServiceError::Validation(_)));

        let mut short = input("bob");
        short.password = "123".into();
        assert!(matches!(users.create(short).await, Err(ServiceError::Validation(_))));

        let mut orphan = input("carol");
        orphan.organization_id = Some(77);
        assert!(matches!(users.create(orphan).await, Err(ServiceError::Validation(_))));

        let mut roleless = input("dave");
        roleless.role_ids = vec![88];
        assert!(matches!(users.create(roleless).await, Err(ServiceError::Validation(_))));
    }

    #[tokio::test]
    async fn organization_can_be_cleared_with_null() {
        use crate::database::models::NewNode;
        use crate::database::NodeRepository;

        let store = Arc::new(MemoryStore::new());
        let org = store
            .insert_node(NewNode {
                kind: NodeKind::Organization,
                parent_id: None,
                name: "HQ".into(),
                code: String::new(),
                sort_order: 0,
                status: Status::Active,
                level: 1,
                details: Default::default(),
            })
            .await
            .unwrap();
        let users = service(store);

        let mut with_org = input("alice");
        with_org.organization_id = Some(org.id);
        let user = users.create(with_org).await.unwrap();

        let absent: UserPatch = serde_json::from_value(json!({ "display_name": "Alice" })).unwrap();
        assert_eq!(users.update(user.id, absent).await.unwrap().organization_id, Some(org.id));

        let cleared: UserPatch = serde_json::from_value(json!({ "organization_id": null })).unwrap();
        assert_eq!(users.update(user.id, cleared).await.unwrap().organization_id, None);
    }

    #[tokio::test]
    async fn builtin_admin_cannot_be_deleted() {
        let users = service(Arc::new(MemoryStore::new()));
        let admin = users.create_builtin(input("root")).await.unwrap();
        assert!(admin.builtin);
        let err = users.delete(admin.id).await.unwrap_err();
        assert!(matches!(err, ServiceError::ReferentialIntegrity(_)));

        let other = users.create(input("temp")).await.unwrap();
        users.delete(other.id).await.unwrap();
        assert!(matches!(users.get(other.id).await, Err(ServiceError::NotFound(_))));
    }

    #[tokio::test]
    async fn protection_follows_the_flag_not_the_username() {
        let users = service(Arc::new(MemoryStore::new()));
        let seeded = users.create_builtin(input("root")).await.unwrap();

        let disable: UserPatch = serde_json::from_value(json!({ "status": "disabled" })).unwrap();
        let err = users.update(seeded.id, disable.clone()).await.unwrap_err();
        assert!(matches!(err, ServiceError::Validation(_)));

        // An ordinary account named "admin" has no special standing
        let namesake = users.create(input("admin")).await.unwrap();
        assert!(!namesake.builtin);
        assert_eq!(users.update(namesake.id, disable).await.unwrap().status, Status::Disabled);
        users.delete(namesake.id).await.unwrap();
    }

    #[tokio::test]
    async fn current_identity_tracks_the_stored_account() {
        let store = Arc::new(MemoryStore::new());
        let staff = store
            .insert_role(NewRole {
                code: "staff".into(),
                name: "Staff".into(),
                description: String::new(),
                status: Status::Active,
                sort_order: 0,
            })
            .await
            .unwrap();
        let users = service(store);

        let mut with_role = input("alice");
        with_role.role_ids = vec![staff.id];
        let user = users.create(with_role).await.unwrap();
        assert!(users.current_identity(user.id).await.unwrap().has_role("staff"));

        users.set_roles(user.id, &[]).await.unwrap();
        assert!(users.current_identity(user.id).await.unwrap().role_codes.is_empty());

        let disable: UserPatch = serde_json::from_value(json!({ "status": "disabled" })).unwrap();
        users.update(user.id, disable).await.unwrap();
        assert!(matches!(
            users.current_identity(user.id).await,
            Err(ServiceError::Unauthenticated(_))
        ));

        users.delete(user.id).await.unwrap();
        assert!(matches!(
            users.current_identity(user.id).await,
            Err(ServiceError::Unauthenticated(_))
        ));
    }

    #[tokio::test]
    async fn change_password_checks_the_old_one() {
        let users = service(Arc::new(MemoryStore::new()));
        let user = users.create(input("alice")).await.unwrap();

        let wrong = PasswordChange {
            old_password: Some("nope".into()),
            new_password: "another1".into(),
        };
        assert!(matches!(users.change_password(user.id, wrong).await, Err(ServiceError::Validation(_))));

        let right = PasswordChange {
            old_password: Some("secret123".into()),
            new_password: "another1".into(),
        };
        users.change_password(user.id, right).await.unwrap();
        let user = users.get(user.id).await.unwrap();
        assert!(users.verify_password(&user, "another1"));
    }

    #[tokio::test]
    async fn identity_only_carries_active_roles() {
        let store = Arc::new(MemoryStore::new());
        let active = store
            .insert_role(NewRole {
                code: "staff".into(),
                name: "Staff".into(),
                description: String::new(),
                status: Status::Active,
                sort_order: 0,
            })
            .await
            .unwrap();
        let disabled = store
            .insert_role(NewRole {
                code: "legacy".into(),
                name: "Legacy".into(),
                description: String::new(),
                status: Status::Disabled,
                sort_order: 0,
            })
            .await
            .unwrap();
        let users = service(store);

        let mut with_roles = input("alice");
        with_roles.role_ids = vec![active.id, disabled.id];
        let user = users.create(with_roles).await.unwrap();

        let identity = users.identity(&user).await.unwrap();
        assert_eq!(identity.role_codes, BTreeSet::from(["staff".to_string()]));
    }
}
