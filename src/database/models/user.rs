use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use super::role::contains_ci;
use crate::database::DatabaseError;
use crate::types::Status;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub username: String,
    #[serde(skip_serializing, default)]
    pub password_hash: String,
    pub display_name: String,
    pub phone: String,
    pub email: String,
    pub organization_id: Option<i64>,
    pub status: Status,
    /// Seeded administrator; cannot be disabled or deleted
    #[serde(default)]
    pub builtin: bool,
    pub role_ids: Vec<i64>,
    pub last_login_at: Option<DateTime<Utc>>,
    pub last_login_ip: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewUser {
    pub username: String,
    pub password_hash: String,
    pub display_name: String,
    pub phone: String,
    pub email: String,
    pub organization_id: Option<i64>,
    pub status: Status,
    pub builtin: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UserFilter {
    pub username: Option<String>,
    pub name: Option<String>,
    pub status: Option<Status>,
    pub organization_id: Option<i64>,
}

impl UserFilter {
    pub fn matches(&self, user: &User) -> bool {
        contains_ci(&user.username, self.username.as_deref())
            && contains_ci(&user.display_name, self.name.as_deref())
            && self.status.map_or(true, |s| user.status == s)
            && self
                .organization_id
                .map_or(true, |org| user.organization_id == Some(org))
    }
}

#[derive(Debug, FromRow)]
pub struct UserRow {
    pub id: i64,
    pub username: String,
    pub password_hash: String,
    pub display_name: String,
    pub phone: String,
    pub email: String,
    pub organization_id: Option<i64>,
    pub status: String,
    pub builtin: bool,
    pub role_ids: Vec<i64>,
    pub last_login_at: Option<DateTime<Utc>>,
    pub last_login_ip: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<UserRow> for User {
    type Error = DatabaseError;

    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        Ok(User {
            id: row.id,
            username: row.username,
            password_hash: row.password_hash,
            display_name: row.display_name,
            phone: row.phone,
            email: row.email,
            organization_id: row.organization_id,
            status: row.status.parse().map_err(DatabaseError::QueryError)?,
            builtin: row.builtin,
            role_ids: row.role_ids,
            last_login_at: row.last_login_at,
            last_login_ip: row.last_login_ip,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn password_hash_is_never_serialized() {
        let now = Utc::now();
        let user = User {
            id: 1,
            username: "admin".into(),
            password_hash: "$argon2id$secret".into(),
            display_name: "Administrator".into(),
            phone: String::new(),
            email: String::new(),
            organization_id: None,
            status: Status::Active,
            builtin: true,
            role_ids: vec![1],
            last_login_at: None,
            last_login_ip: None,
            created_at: now,
            updated_at: now,
        };
        let json = serde_json::to_string(&user).unwrap();
        assert!(!json.contains("argon2"));
        assert!(!json.contains("password_hash"));
    }
}
