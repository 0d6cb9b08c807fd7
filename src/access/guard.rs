use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use super::resolver::{effective_permission_codes, RoleGrant};

/// The authenticated caller, as established by the token middleware
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub user_id: i64,
    pub username: String,
    pub display_name: String,
    pub role_codes: BTreeSet<String>,
}

impl Identity {
    pub fn has_role(&self, code: &str) -> bool {
        self.role_codes.contains(code)
    }
}

/// What a route demands of its caller
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Requirement {
    /// Caller holds at least one of these role codes
    AnyRole(BTreeSet<String>),
    /// Caller's effective permission set contains this code
    Permission(String),
}

impl Requirement {
    pub fn any_role<I, S>(codes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Requirement::AnyRole(codes.into_iter().map(Into::into).collect())
    }

    pub fn permission(code: impl Into<String>) -> Self {
        Requirement::Permission(code.into())
    }
}

impl fmt::Display for Requirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Requirement::AnyRole(codes) => {
                let list: Vec<&str> = codes.iter().map(String::as_str).collect();
                write!(f, "one of roles [{}]", list.join(", "))
            }
            Requirement::Permission(code) => write!(f, "permission '{}'", code),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DenyReason {
    /// No identity was presented (401)
    Unauthenticated,
    /// Identity present but lacking the requirement (403)
    InsufficientPrivilege { requirement: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Deny(DenyReason),
}

impl Decision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Decision::Allow)
    }
}

/// Decide whether `identity` satisfies `requirement`.
///
/// `grants` may cover more roles than the identity holds; only the
/// identity's own roles are considered.
pub fn authorize(
    identity: Option<&Identity>,
    requirement: &Requirement,
    grants: &[RoleGrant],
) -> Decision {
    let Some(identity) = identity else {
        return Decision::Deny(DenyReason::Unauthenticated);
    };

    let denied = || {
        Decision::Deny(DenyReason::InsufficientPrivilege {
            requirement: requirement.to_string(),
        })
    };

    if identity.role_codes.is_empty() {
        return denied();
    }

    let allowed = match requirement {
        Requirement::AnyRole(codes) => !identity.role_codes.is_disjoint(codes),
        Requirement::Permission(code) => {
            let own = grants.iter().filter(|g| identity.has_role(&g.code));
            effective_permission_codes(own).contains(code)
        }
    };

    if allowed {
        Decision::Allow
    } else {
        denied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity(roles: &[&str]) -> Identity {
        Identity {
            user_id: 7,
            username: "alice".into(),
            display_name: "Alice".into(),
            role_codes: roles.iter().map(|r| r.to_string()).collect(),
        }
    }

    fn grants() -> Vec<RoleGrant> {
        vec![
            RoleGrant::new("viewer", true, ["asset:list"]),
            RoleGrant::new("editor", true, ["asset:update"]),
            RoleGrant::new("retired", false, ["user:delete"]),
        ]
    }

    #[test]
    fn missing_identity_is_unauthenticated() {
        let decision = authorize(None, &Requirement::permission("asset:list"), &grants());
        assert_eq!(decision, Decision::Deny(DenyReason::Unauthenticated));
    }

    #[test]
    fn identity_without_permission_is_forbidden() {
        let me = identity(&["viewer"]);
        let decision = authorize(Some(&me), &Requirement::permission("asset:update"), &grants());
        assert!(matches!(
            decision,
            Decision::Deny(DenyReason::InsufficientPrivilege { .. })
        ));
    }

    #[test]
    fn permission_through_any_held_role() {
        let me = identity(&["viewer", "editor"]);
        assert!(authorize(Some(&me), &Requirement::permission("asset:update"), &grants()).is_allowed());
        assert!(authorize(Some(&me), &Requirement::permission("asset:list"), &grants()).is_allowed());
    }

    #[test]
    fn grants_of_roles_not_held_are_ignored() {
        let me = identity(&["viewer"]);
        assert!(!authorize(Some(&me), &Requirement::permission("asset:update"), &grants()).is_allowed());
    }

    #[test]
    fn disabled_role_does_not_authorize() {
        let me = identity(&["retired"]);
        assert!(!authorize(Some(&me), &Requirement::permission("user:delete"), &grants()).is_allowed());
    }

    #[test]
    fn any_role_intersection() {
        let admin = Requirement::any_role(["admin"]);
        assert!(authorize(Some(&identity(&["admin", "user"])), &admin, &[]).is_allowed());
        assert!(!authorize(Some(&identity(&["user"])), &admin, &[]).is_allowed());
    }

    #[test]
    fn empty_role_set_always_denies() {
        let me = identity(&[]);
        assert!(!authorize(Some(&me), &Requirement::AnyRole(BTreeSet::new()), &[]).is_allowed());
        assert!(!authorize(Some(&me), &Requirement::permission("asset:list"), &grants()).is_allowed());
    }

    #[test]
    fn requirement_renders_for_messages() {
        assert_eq!(Requirement::permission("org:list").to_string(), "permission 'org:list'");
        assert_eq!(
            Requirement::any_role(["admin", "auditor"]).to_string(),
            "one of roles [admin, auditor]"
        );
    }
}
