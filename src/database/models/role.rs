use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::database::DatabaseError;
use crate::types::Status;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Role {
    pub id: i64,
    pub code: String,
    pub name: String,
    pub description: String,
    pub status: Status,
    pub sort_order: i32,
    pub permission_ids: Vec<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewRole {
    pub code: String,
    pub name: String,
    pub description: String,
    pub status: Status,
    pub sort_order: i32,
}

/// Optional list filters, matched as case-insensitive substrings
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RoleFilter {
    pub name: Option<String>,
    pub code: Option<String>,
    pub status: Option<Status>,
}

impl RoleFilter {
    pub fn matches(&self, role: &Role) -> bool {
        contains_ci(&role.name, self.name.as_deref())
            && contains_ci(&role.code, self.code.as_deref())
            && self.status.map_or(true, |s| role.status == s)
    }
}

pub(crate) fn contains_ci(haystack: &str, needle: Option<&str>) -> bool {
    match needle.map(str::trim).filter(|n| !n.is_empty()) {
        Some(n) => haystack.to_lowercase().contains(&n.to_lowercase()),
        None => true,
    }
}

#[derive(Debug, FromRow)]
pub struct RoleRow {
    pub id: i64,
    pub code: String,
    pub name: String,
    pub description: String,
    pub status: String,
    pub sort_order: i32,
    pub permission_ids: Vec<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<RoleRow> for Role {
    type Error = DatabaseError;

    fn try_from(row: RoleRow) -> Result<Self, Self::Error> {
        Ok(Role {
            id: row.id,
            code: row.code,
            name: row.name,
            description: row.description,
            status: row.status.parse().map_err(DatabaseError::QueryError)?,
            sort_order: row.sort_order,
            permission_ids: row.permission_ids,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}
