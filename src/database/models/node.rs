use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sqlx::FromRow;
use std::fmt;
use std::str::FromStr;

use crate::access::{GatedNode, HierarchyNode, NodeId};
use crate::database::DatabaseError;
use crate::types::Status;

/// Discriminates the three hierarchies that share the `nodes` table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    Organization,
    Menu,
    Permission,
}

impl NodeKind {
    pub const ALL: [NodeKind; 3] = [NodeKind::Organization, NodeKind::Menu, NodeKind::Permission];

    pub fn as_str(&self) -> &'static str {
        match self {
            NodeKind::Organization => "organization",
            NodeKind::Menu => "menu",
            NodeKind::Permission => "permission",
        }
    }

    /// Human label used in error messages
    pub fn label(&self) -> &'static str {
        match self {
            NodeKind::Organization => "Organization",
            NodeKind::Menu => "Menu",
            NodeKind::Permission => "Permission",
        }
    }

    /// Keys accepted inside `details` for this kind
    pub fn detail_keys(&self) -> &'static [&'static str] {
        match self {
            NodeKind::Organization => &["org_type", "leader", "phone", "address", "description"],
            NodeKind::Menu => &["path", "component", "icon", "hidden"],
            NodeKind::Permission => &["permission_type", "path", "icon", "component", "description"],
        }
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NodeKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "organization" | "org" => Ok(NodeKind::Organization),
            "menu" => Ok(NodeKind::Menu),
            "permission" => Ok(NodeKind::Permission),
            other => Err(format!("unknown node kind '{}'", other)),
        }
    }
}

/// Organization, menu or permission node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub id: NodeId,
    pub kind: NodeKind,
    pub parent_id: Option<NodeId>,
    pub name: String,
    pub code: String,
    pub sort_order: i32,
    pub status: Status,
    pub level: i32,
    #[serde(flatten)]
    pub details: Map<String, Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Node {
    pub fn detail_str(&self, key: &str) -> Option<&str> {
        self.details.get(key).and_then(Value::as_str)
    }
}

impl HierarchyNode for Node {
    fn id(&self) -> NodeId {
        self.id
    }

    fn parent_id(&self) -> Option<NodeId> {
        self.parent_id
    }

    fn sort_order(&self) -> i32 {
        self.sort_order
    }
}

impl GatedNode for Node {
    fn code(&self) -> &str {
        &self.code
    }

    fn is_active(&self) -> bool {
        self.status.is_active()
    }
}

/// Node about to be inserted; the store assigns id and timestamps
#[derive(Debug, Clone, PartialEq)]
pub struct NewNode {
    pub kind: NodeKind,
    pub parent_id: Option<NodeId>,
    pub name: String,
    pub code: String,
    pub sort_order: i32,
    pub status: Status,
    pub level: i32,
    pub details: Map<String, Value>,
}

#[derive(Debug, FromRow)]
pub struct NodeRow {
    pub id: i64,
    pub kind: String,
    pub parent_id: Option<i64>,
    pub name: String,
    pub code: String,
    pub sort_order: i32,
    pub status: String,
    pub level: i32,
    pub details: sqlx::types::Json<Map<String, Value>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<NodeRow> for Node {
    type Error = DatabaseError;

    fn try_from(row: NodeRow) -> Result<Self, Self::Error> {
        Ok(Node {
            id: row.id,
            kind: row.kind.parse().map_err(DatabaseError::QueryError)?,
            parent_id: row.parent_id,
            name: row.name,
            code: row.code,
            sort_order: row.sort_order,
            status: row.status.parse().map_err(DatabaseError::QueryError)?,
            level: row.level,
            details: row.details.0,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}
