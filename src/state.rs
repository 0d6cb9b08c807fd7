use anyhow::Context;
use std::sync::Arc;

use crate::auth::{Argon2Verifier, CredentialVerifier, TokenService};
use crate::config::{AppConfig, StorageBackend};
use crate::database::models::NodeKind;
use crate::database::{DatabaseManager, MemoryStore, PgStore, Store};
use crate::services::{
    AssetService, AuditService, AuthService, Bootstrap, NodeService, RoleService, UserService,
};

/// Everything a request handler needs, passed explicitly through axum state
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub store: Arc<dyn Store>,
    pub tokens: TokenService,
    pub verifier: Arc<dyn CredentialVerifier>,
}

impl AppState {
    pub fn new(config: AppConfig, store: Arc<dyn Store>) -> Self {
        Self {
            tokens: TokenService::new(&config.auth),
            config: Arc::new(config),
            store,
            verifier: Arc::new(Argon2Verifier),
        }
    }

    /// Open the configured backend. Postgres connections are migrated
    /// before the state is handed out.
    pub async fn connect(config: AppConfig) -> anyhow::Result<Self> {
        let store: Arc<dyn Store> = match config.database.backend {
            StorageBackend::Memory => {
                tracing::warn!("using the in-memory store; data is lost on exit");
                Arc::new(MemoryStore::new())
            }
            StorageBackend::Postgres => {
                let pool = DatabaseManager::connect(&config.database)
                    .await
                    .context("connecting to the database")?;
                DatabaseManager::migrate(&pool).await.context("running migrations")?;
                Arc::new(PgStore::new(pool))
            }
        };
        Ok(Self::new(config, store))
    }

    pub fn nodes(&self, kind: NodeKind) -> NodeService {
        NodeService::new(self.store.clone(), kind)
    }

    pub fn roles(&self) -> RoleService {
        RoleService::new(self.store.clone())
    }

    pub fn users(&self) -> UserService {
        UserService::new(self.store.clone(), self.verifier.clone())
    }

    pub fn assets(&self) -> AssetService {
        AssetService::new(self.store.clone())
    }

    pub fn audit(&self) -> AuditService {
        AuditService::new(self.store.clone(), self.config.audit.enabled)
    }

    pub fn auth(&self) -> AuthService {
        AuthService::new(self.users(), self.roles(), self.audit(), self.tokens.clone())
    }

    pub fn bootstrap(&self) -> Bootstrap {
        Bootstrap::new(self.store.clone(), self.verifier.clone(), &self.config.bootstrap)
    }
}
