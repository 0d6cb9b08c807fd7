use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::str::FromStr;

use super::role::contains_ci;
use crate::database::DatabaseError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationLog {
    pub id: i64,
    pub user_id: Option<i64>,
    pub username: String,
    pub module: String,
    pub action: String,
    pub method: String,
    pub path: String,
    pub status_code: i32,
    pub duration_ms: i64,
    pub client_ip: String,
    pub user_agent: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewOperationLog {
    pub user_id: Option<i64>,
    pub username: String,
    pub module: String,
    pub action: String,
    pub method: String,
    pub path: String,
    pub status_code: i32,
    pub duration_ms: i64,
    pub client_ip: String,
    pub user_agent: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoginOutcome {
    Success,
    Failure,
}

impl LoginOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            LoginOutcome::Success => "success",
            LoginOutcome::Failure => "failure",
        }
    }
}

impl FromStr for LoginOutcome {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "success" => Ok(LoginOutcome::Success),
            "failure" => Ok(LoginOutcome::Failure),
            other => Err(format!("unknown login outcome '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoginLog {
    pub id: i64,
    pub username: String,
    pub user_id: Option<i64>,
    pub outcome: LoginOutcome,
    pub message: String,
    pub client_ip: String,
    pub user_agent: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewLoginLog {
    pub username: String,
    pub user_id: Option<i64>,
    pub outcome: LoginOutcome,
    pub message: String,
    pub client_ip: String,
    pub user_agent: String,
}

/// Shared filter for both log kinds; `module` only applies to operation logs
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LogFilter {
    pub username: Option<String>,
    pub module: Option<String>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

impl LogFilter {
    fn in_range(&self, at: DateTime<Utc>) -> bool {
        self.from.map_or(true, |from| at >= from) && self.to.map_or(true, |to| at <= to)
    }

    pub fn matches_operation(&self, log: &OperationLog) -> bool {
        contains_ci(&log.username, self.username.as_deref())
            && self
                .module
                .as_deref()
                .filter(|m| !m.is_empty())
                .map_or(true, |m| log.module == m)
            && self.in_range(log.created_at)
    }

    pub fn matches_login(&self, log: &LoginLog) -> bool {
        contains_ci(&log.username, self.username.as_deref()) && self.in_range(log.created_at)
    }
}

#[derive(Debug, FromRow)]
pub struct OperationLogRow {
    pub id: i64,
    pub user_id: Option<i64>,
    pub username: String,
    pub module: String,
    pub action: String,
    pub method: String,
    pub path: String,
    pub status_code: i32,
    pub duration_ms: i64,
    pub client_ip: String,
    pub user_agent: String,
    pub created_at: DateTime<Utc>,
}

impl From<OperationLogRow> for OperationLog {
    fn from(row: OperationLogRow) -> Self {
        OperationLog {
            id: row.id,
            user_id: row.user_id,
            username: row.username,
            module: row.module,
            action: row.action,
            method: row.method,
            path: row.path,
            status_code: row.status_code,
            duration_ms: row.duration_ms,
            client_ip: row.client_ip,
            user_agent: row.user_agent,
            created_at: row.created_at,
        }
    }
}

#[derive(Debug, FromRow)]
pub struct LoginLogRow {
    pub id: i64,
    pub username: String,
    pub user_id: Option<i64>,
    pub outcome: String,
    pub message: String,
    pub client_ip: String,
    pub user_agent: String,
    pub created_at: DateTime<Utc>,
}

impl TryFrom<LoginLogRow> for LoginLog {
    type Error = DatabaseError;

    fn try_from(row: LoginLogRow) -> Result<Self, Self::Error> {
        Ok(LoginLog {
            id: row.id,
            username: row.username,
            user_id: row.user_id,
            outcome: row.outcome.parse().map_err(DatabaseError::QueryError)?,
            message: row.message,
            client_ip: row.client_ip,
            user_agent: row.user_agent,
            created_at: row.created_at,
        })
    }
}
