use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use super::{AuditService, RoleService, ServiceError, ServiceResult, UserService};
use crate::access::Identity;
use crate::auth::{TokenKind, TokenPair, TokenService};
use crate::database::models::{LoginOutcome, NewLoginLog, User};

const BAD_CREDENTIALS: &str = "Invalid username or password";

#[derive(Debug, Clone, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

/// Where a request came from, for the login trail
#[derive(Debug, Clone, Default)]
pub struct ClientInfo {
    pub ip: String,
    pub user_agent: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct LoginResponse {
    #[serde(flatten)]
    pub tokens: TokenPair,
    pub user: User,
}

/// The caller's own account view
#[derive(Debug, Clone, Serialize)]
pub struct Profile {
    pub user: User,
    pub roles: BTreeSet<String>,
    pub permissions: BTreeSet<String>,
}

#[derive(Clone)]
pub struct AuthService {
    users: UserService,
    roles: RoleService,
    audit: AuditService,
    tokens: TokenService,
}

impl AuthService {
    pub fn new(users: UserService, roles: RoleService, audit: AuditService, tokens: TokenService) -> Self {
        Self {
            users,
            roles,
            audit,
            tokens,
        }
    }

    pub async fn login(&self, request: LoginRequest, client: &ClientInfo) -> ServiceResult<LoginResponse> {
        let username = request.username.trim();
        let user = match self.users.find_by_username(username).await? {
            Some(user) if self.users.verify_password(&user, &request.password) => user,
            found => {
                let user_id = found.map(|u| u.id);
                self.trail(username, user_id, LoginOutcome::Failure, "bad credentials", client).await;
                tracing::info!(username, "login rejected");
                return Err(ServiceError::Unauthenticated(BAD_CREDENTIALS.to_string()));
            }
        };

        if !user.status.is_active() {
            self.trail(username, Some(user.id), LoginOutcome::Failure, "account disabled", client).await;
            return Err(ServiceError::Forbidden("Account is disabled".to_string()));
        }

        self.users.mark_login(user.id, &client.ip).await?;
        self.trail(username, Some(user.id), LoginOutcome::Success, "login", client).await;

        let identity = self.users.identity(&user).await?;
        let tokens = self.tokens.issue_pair(&identity)?;
        let user = self.users.get(user.id).await?;
        tracing::info!(user_id = user.id, username = %user.username, "login succeeded");

        Ok(LoginResponse { tokens, user })
    }

    /// New token pair from a refresh token. The user is reloaded so status
    /// and role changes since the last login take effect.
    pub async fn refresh(&self, request: RefreshRequest) -> ServiceResult<LoginResponse> {
        let claims = self.tokens.verify(&request.refresh_token, TokenKind::Refresh)?;
        let user_id = claims.identity()?.user_id;

        let user = match self.users.get(user_id).await {
            Ok(user) if user.status.is_active() => user,
            Ok(_) => return Err(ServiceError::Unauthenticated("Account is disabled".to_string())),
            Err(ServiceError::NotFound(_)) => {
                return Err(ServiceError::Unauthenticated("Account no longer exists".to_string()))
            }
            Err(e) => return Err(e),
        };

        let identity = self.users.identity(&user).await?;
        let tokens = self.tokens.issue_pair(&identity)?;
        Ok(LoginResponse { tokens, user })
    }

    /// Tokens are stateless; logout only leaves a trail entry
    pub async fn logout(&self, identity: &Identity, client: &ClientInfo) {
        self.trail(&identity.username, Some(identity.user_id), LoginOutcome::Success, "logout", client)
            .await;
    }

    /// Verify an access token and resolve its holder against the store.
    /// Only the user id is taken from the claims; status and roles are
    /// read fresh so revocations apply to tokens already issued.
    pub async fn authenticate(&self, token: &str) -> ServiceResult<Identity> {
        let claims = self.tokens.verify(token, TokenKind::Access)?;
        let user_id = claims.identity()?.user_id;
        self.users.current_identity(user_id).await
    }

    pub async fn profile(&self, identity: &Identity) -> ServiceResult<Profile> {
        let user = self.users.get(identity.user_id).await?;
        let permissions = self.roles.effective_codes(identity).await?;
        Ok(Profile {
            user,
            roles: identity.role_codes.clone(),
            permissions,
        })
    }

    async fn trail(&self, username: &str, user_id: Option<i64>, outcome: LoginOutcome, message: &str, client: &ClientInfo) {
        self.audit
            .record_login(NewLoginLog {
                username: username.to_string(),
                user_id,
                outcome,
                message: message.to_string(),
                client_ip: client.ip.clone(),
                user_agent: client.user_agent.clone(),
            })
            .await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{Argon2Verifier, CredentialVerifier};
    use crate::config::AppConfig;
    use crate::database::models::LogFilter;
    use crate::database::{MemoryStore, Store};
    use crate::services::user_service::{UserInput, UserPatch};
    use crate::types::{PageRequest, Status};
    use std::sync::Arc;

    struct Fixture {
        auth: AuthService,
        users: UserService,
        audit: AuditService,
    }

    fn fixture() -> Fixture {
        let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
        let verifier: Arc<dyn CredentialVerifier> = Arc::new(Argon2Verifier);
        let users = UserService::new(store.clone(), verifier);
        let roles = RoleService::new(store.clone());
        let audit = AuditService::new(store, true);
        let tokens = TokenService::new(&AppConfig::development().auth);
        Fixture {
            auth: AuthService::new(users.clone(), roles, audit.clone(), tokens),
            users,
            audit,
        }
    }

    fn login(username: &str, password: &str) -> LoginRequest {
        LoginRequest {
            username: username.into(),
            password: password.into(),
        }
    }

    async fn alice(f: &Fixture) -> User {
        f.users
            .create(UserInput {
                username: "alice".into(),
                password: "wonderland".into(),
                ..Default::default()
            })
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn login_issues_tokens_and_records_the_attempt() {
        let f = fixture();
        alice(&f).await;
        let client = ClientInfo {
            ip: "10.0.0.1".into(),
            user_agent: "test".into(),
        };

        let response = f.auth.login(login("alice", "wonderland"), &client).await.unwrap();
        assert_eq!(response.tokens.token_type, "Bearer");
        assert_eq!(response.user.last_login_ip.as_deref(), Some("10.0.0.1"));

        let identity = f.auth.authenticate(&response.tokens.access_token).await.unwrap();
        assert_eq!(identity.username, "alice");

        let logins = f.audit.page_logins(&LogFilter::default(), PageRequest::default()).await.unwrap();
        assert_eq!(logins.total, 1);
        assert_eq!(logins.items[0].outcome, LoginOutcome::Success);
    }

    #[tokio::test]
    async fn wrong_password_and_unknown_user_look_the_same() {
        let f = fixture();
        alice(&f).await;
        let client = ClientInfo::default();

        let wrong = f.auth.login(login("alice", "nope"), &client).await.unwrap_err();
        let unknown = f.auth.login(login("mallory", "nope"), &client).await.unwrap_err();
        assert_eq!(wrong.to_string(), BAD_CREDENTIALS);
        assert_eq!(unknown.to_string(), BAD_CREDENTIALS);

        let logins = f.audit.page_logins(&LogFilter::default(), PageRequest::default()).await.unwrap();
        assert!(logins.items.iter().all(|l| l.outcome == LoginOutcome::Failure));
    }

    #[tokio::test]
    async fn disabled_user_cannot_log_in_or_refresh() {
        let f = fixture();
        let user = alice(&f).await;
        let tokens = f.auth.login(login("alice", "wonderland"), &ClientInfo::default()).await.unwrap().tokens;

        f.users
            .update(
                user.id,
                UserPatch {
                    status: Some(Status::Disabled),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let err = f.auth.login(login("alice", "wonderland"), &ClientInfo::default()).await.unwrap_err();
        assert!(matches!(err, ServiceError::Forbidden(_)));

        let err = f
            .auth
            .refresh(RefreshRequest {
                refresh_token: tokens.refresh_token,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Unauthenticated(_)));
    }

    #[tokio::test]
    async fn access_token_cannot_be_used_to_refresh() {
        let f = fixture();
        alice(&f).await;
        let tokens = f.auth.login(login("alice", "wonderland"), &ClientInfo::default()).await.unwrap().tokens;

        let err = f
            .auth
            .refresh(RefreshRequest {
                refresh_token: tokens.access_token,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Unauthenticated(_)));

        assert!(matches!(
            f.auth.authenticate(&tokens.refresh_token).await,
            Err(ServiceError::Unauthenticated(_))
        ));
    }
}
