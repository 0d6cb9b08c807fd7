use serde::{Deserialize, Serialize};
use std::env;
use thiserror::Error;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub environment: Environment,
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub auth: AuthConfig,
    pub security: SecurityConfig,
    pub audit: AuditConfig,
    pub bootstrap: BootstrapConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Environment {
    Development,
    Staging,
    Production,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    Postgres,
    Memory,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub backend: StorageBackend,
    #[serde(skip_serializing)]
    pub url: Option<String>,
    pub max_connections: u32,
    pub connection_timeout: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    #[serde(skip_serializing)]
    pub jwt_secret: String,
    pub issuer: String,
    pub access_ttl_secs: i64,
    pub refresh_ttl_secs: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityConfig {
    pub enable_cors: bool,
    pub cors_origins: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditConfig {
    pub enabled: bool,
    pub retention_days: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BootstrapConfig {
    pub seed_on_start: bool,
    pub admin_username: String,
    #[serde(skip_serializing)]
    pub admin_password: String,
}

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("JWT_SECRET must be set in {0:?}")]
    MissingJwtSecret(Environment),

    #[error("DATABASE_URL must be set when STORAGE_BACKEND=postgres")]
    MissingDatabaseUrl,

    #[error("BOOTSTRAP_ADMIN_PASSWORD must be set when seeding in {0:?}")]
    MissingAdminPassword(Environment),

    #[error("token lifetimes must be positive")]
    InvalidTokenTtl,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let environment = match env::var("APP_ENV").as_deref() {
            Ok("production") | Ok("prod") => Environment::Production,
            Ok("staging") | Ok("stage") => Environment::Staging,
            _ => Environment::Development,
        };

        // Preset for the environment, then individual variables on top
        Self::preset(environment).with_overrides(|key| env::var(key).ok())
    }

    pub fn preset(environment: Environment) -> Self {
        match environment {
            Environment::Production => Self::production(),
            Environment::Staging => Self::staging(),
            Environment::Development => Self::development(),
        }
    }

    /// Apply overrides from any key lookup; `from_env` passes the process environment
    pub fn with_overrides<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        fn parsed<T: std::str::FromStr>(raw: Option<String>, current: T) -> T {
            raw.and_then(|v| v.trim().parse().ok()).unwrap_or(current)
        }

        // Server
        if let Some(v) = lookup("SERVER_HOST") {
            self.server.host = v;
        }
        let port = lookup("SERVER_PORT").or_else(|| lookup("PORT"));
        self.server.port = parsed(port, self.server.port);

        // Database
        if let Some(v) = lookup("DATABASE_URL") {
            self.database.url = Some(v).filter(|s| !s.is_empty());
        }
        self.database.max_connections =
            parsed(lookup("DATABASE_MAX_CONNECTIONS"), self.database.max_connections);
        self.database.connection_timeout =
            parsed(lookup("DATABASE_CONNECTION_TIMEOUT"), self.database.connection_timeout);
        match lookup("STORAGE_BACKEND").as_deref().map(str::trim) {
            Some("memory") => self.database.backend = StorageBackend::Memory,
            Some("postgres") | Some("postgresql") => self.database.backend = StorageBackend::Postgres,
            _ => {}
        }

        // Auth
        if let Some(v) = lookup("JWT_SECRET") {
            self.auth.jwt_secret = v;
        }
        if let Some(v) = lookup("JWT_ISSUER") {
            self.auth.issuer = v;
        }
        self.auth.access_ttl_secs = parsed(lookup("JWT_ACCESS_TTL_SECS"), self.auth.access_ttl_secs);
        self.auth.refresh_ttl_secs = parsed(lookup("JWT_REFRESH_TTL_SECS"), self.auth.refresh_ttl_secs);

        // Security
        self.security.enable_cors = parsed(lookup("SECURITY_ENABLE_CORS"), self.security.enable_cors);
        if let Some(v) = lookup("SECURITY_CORS_ORIGINS") {
            self.security.cors_origins = v
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
        }

        // Audit
        self.audit.enabled = parsed(lookup("AUDIT_ENABLED"), self.audit.enabled);
        self.audit.retention_days = parsed(lookup("AUDIT_RETENTION_DAYS"), self.audit.retention_days);

        // Bootstrap
        self.bootstrap.seed_on_start =
            parsed(lookup("BOOTSTRAP_SEED_ON_START"), self.bootstrap.seed_on_start);
        if let Some(v) = lookup("BOOTSTRAP_ADMIN_USERNAME") {
            self.bootstrap.admin_username = v;
        }
        if let Some(v) = lookup("BOOTSTRAP_ADMIN_PASSWORD") {
            self.bootstrap.admin_password = v;
        }

        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.auth.jwt_secret.trim().is_empty() {
            return Err(ConfigError::MissingJwtSecret(self.environment));
        }
        if self.auth.access_ttl_secs <= 0 || self.auth.refresh_ttl_secs <= 0 {
            return Err(ConfigError::InvalidTokenTtl);
        }
        if self.database.backend == StorageBackend::Postgres && self.database.url.is_none() {
            return Err(ConfigError::MissingDatabaseUrl);
        }
        if self.bootstrap.seed_on_start && self.bootstrap.admin_password.is_empty() {
            return Err(ConfigError::MissingAdminPassword(self.environment));
        }
        Ok(())
    }

    pub fn is_production(&self) -> bool {
        self.environment == Environment::Production
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }

    pub fn development() -> Self {
        Self {
            environment: Environment::Development,
            server: ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 8080,
            },
            database: DatabaseConfig {
                backend: StorageBackend::Postgres,
                url: None,
                max_connections: 10,
                connection_timeout: 30,
            },
            auth: AuthConfig {
                jwt_secret: "development-secret-change-me".to_string(),
                issuer: "building-asset-api".to_string(),
                access_ttl_secs: 24 * 3600,
                refresh_ttl_secs: 7 * 24 * 3600,
            },
            security: SecurityConfig {
                enable_cors: true,
                cors_origins: vec!["http://localhost:3000".to_string(), "http://localhost:5173".to_string()],
            },
            audit: AuditConfig {
                enabled: true,
                retention_days: 30,
            },
            bootstrap: BootstrapConfig {
                seed_on_start: true,
                admin_username: "admin".to_string(),
                admin_password: "admin123".to_string(),
            },
        }
    }

    pub fn staging() -> Self {
        Self {
            environment: Environment::Staging,
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 8080,
            },
            database: DatabaseConfig {
                backend: StorageBackend::Postgres,
                url: None,
                max_connections: 20,
                connection_timeout: 10,
            },
            auth: AuthConfig {
                jwt_secret: String::new(),
                issuer: "building-asset-api".to_string(),
                access_ttl_secs: 8 * 3600,
                refresh_ttl_secs: 3 * 24 * 3600,
            },
            security: SecurityConfig {
                enable_cors: true,
                cors_origins: vec!["https://staging.example.com".to_string()],
            },
            audit: AuditConfig {
                enabled: true,
                retention_days: 30,
            },
            bootstrap: BootstrapConfig {
                seed_on_start: false,
                admin_username: "admin".to_string(),
                admin_password: String::new(),
            },
        }
    }

    pub fn production() -> Self {
        Self {
            environment: Environment::Production,
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 8080,
            },
            database: DatabaseConfig {
                backend: StorageBackend::Postgres,
                url: None,
                max_connections: 50,
                connection_timeout: 5,
            },
            auth: AuthConfig {
                jwt_secret: String::new(),
                issuer: "building-asset-api".to_string(),
                access_ttl_secs: 2 * 3600,
                refresh_ttl_secs: 24 * 3600,
            },
            security: SecurityConfig {
                enable_cors: true,
                cors_origins: vec!["https://app.example.com".to_string()],
            },
            audit: AuditConfig {
                enabled: true,
                retention_days: 90,
            },
            bootstrap: BootstrapConfig {
                seed_on_start: false,
                admin_username: "admin".to_string(),
                admin_password: String::new(),
            },
        }
    }

    /// In-memory configuration used by tests and throwaway local runs
    pub fn in_memory() -> Self {
        let mut config = Self::development();
        config.database.backend = StorageBackend::Memory;
        config.server.port = 0;
        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_default_development_config() {
        let config = AppConfig::development();
        assert_eq!(config.server.port, 8080);
        assert!(!config.auth.jwt_secret.is_empty());
        assert!(config.bootstrap.seed_on_start);
    }

    #[test]
    fn test_default_production_config() {
        let config = AppConfig::production();
        assert!(config.auth.jwt_secret.is_empty());
        assert!(!config.bootstrap.seed_on_start);
        assert_eq!(config.database.max_connections, 50);
    }

    #[test]
    fn test_overrides_apply_on_top_of_preset() {
        let config = AppConfig::production().with_overrides(lookup(&[
            ("PORT", "9000"),
            ("DATABASE_URL", "postgres://u:p@localhost/assets"),
            ("JWT_SECRET", "s3cret"),
            ("JWT_ACCESS_TTL_SECS", "60"),
            ("SECURITY_CORS_ORIGINS", "https://a.example, https://b.example,"),
            ("AUDIT_RETENTION_DAYS", "not-a-number"),
        ]));

        assert_eq!(config.server.port, 9000);
        assert_eq!(config.auth.jwt_secret, "s3cret");
        assert_eq!(config.auth.access_ttl_secs, 60);
        assert_eq!(config.security.cors_origins, vec!["https://a.example", "https://b.example"]);
        assert_eq!(config.audit.retention_days, 90);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_server_port_wins_over_port() {
        let config = AppConfig::development().with_overrides(lookup(&[("SERVER_PORT", "7000"), ("PORT", "9000")]));
        assert_eq!(config.server.port, 7000);
    }

    #[test]
    fn test_production_requires_secret() {
        let config = AppConfig::production().with_overrides(lookup(&[("DATABASE_URL", "postgres://localhost/x")]));
        assert_eq!(
            config.validate(),
            Err(ConfigError::MissingJwtSecret(Environment::Production))
        );
    }

    #[test]
    fn test_postgres_backend_requires_url() {
        let config = AppConfig::development();
        assert_eq!(config.validate(), Err(ConfigError::MissingDatabaseUrl));

        let memory = AppConfig::development().with_overrides(lookup(&[("STORAGE_BACKEND", "memory")]));
        assert_eq!(memory.database.backend, StorageBackend::Memory);
        assert!(memory.validate().is_ok());
    }

    #[test]
    fn test_secrets_are_not_serialized() {
        let json = serde_json::to_value(AppConfig::development()).unwrap();
        assert!(json["auth"].get("jwt_secret").is_none());
        assert!(json["bootstrap"].get("admin_password").is_none());
    }
}
