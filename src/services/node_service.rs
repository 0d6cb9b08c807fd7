use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeSet;
use std::sync::Arc;

use super::{ServiceError, ServiceResult};
use crate::access::{self, build_tree, Hierarchy, HierarchyNode, Tree};
use crate::database::models::{NewNode, Node, NodeKind};
use crate::database::Store;
use crate::types::{nullable, Status};

/// Body of a create request for any node kind.
///
/// Kind-specific attributes (`path`, `icon`, `leader`, ...) arrive as
/// top-level keys and are collected into `details`; keys the kind does
/// not know are dropped.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NodeInput {
    #[serde(default)]
    pub parent_id: Option<i64>,
    pub name: String,
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub sort_order: i32,
    #[serde(default)]
    pub status: Status,
    #[serde(flatten)]
    pub details: Map<String, Value>,
}

/// Partial update. Absent fields are left alone; `parent_id: null` (or 0)
/// moves the node to the root level; a detail key set to `null` removes it.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NodePatch {
    #[serde(default, deserialize_with = "nullable")]
    pub parent_id: Option<Option<i64>>,
    pub name: Option<String>,
    pub code: Option<String>,
    pub sort_order: Option<i32>,
    pub status: Option<Status>,
    #[serde(flatten)]
    pub details: Map<String, Value>,
}

/// Integrity summary of one hierarchy, produced by `check`
#[derive(Debug, Clone, Serialize)]
pub struct TreeReport {
    pub kind: NodeKind,
    pub nodes: usize,
    pub roots: usize,
    /// Nodes whose stored level disagrees with the derived one
    pub stale_levels: Vec<i64>,
}

/// CRUD and tree views over one node kind
#[derive(Clone)]
pub struct NodeService {
    store: Arc<dyn Store>,
    kind: NodeKind,
}

impl NodeService {
    pub fn new(store: Arc<dyn Store>, kind: NodeKind) -> Self {
        Self { store, kind }
    }

    pub fn kind(&self) -> NodeKind {
        self.kind
    }

    /// Flat listing ordered by level, then sibling order
    pub async fn list(&self) -> ServiceResult<Vec<Node>> {
        let mut nodes = self.store.list_nodes(self.kind).await?;
        nodes.sort_by_key(|n| (n.level, n.sort_order, n.id));
        Ok(nodes)
    }

    pub async fn tree(&self) -> ServiceResult<Vec<Tree<Node>>> {
        let nodes = self.store.list_nodes(self.kind).await?;
        Ok(build_tree(nodes)?)
    }

    /// The forest restricted to what `granted` unlocks, ancestors included
    pub async fn visible_tree(&self, granted: &BTreeSet<String>) -> ServiceResult<Vec<Tree<Node>>> {
        let nodes = self.store.list_nodes(self.kind).await?;
        Ok(access::visible_tree(nodes, granted)?)
    }

    pub async fn get(&self, id: i64) -> ServiceResult<Node> {
        self.store
            .find_node(self.kind, id)
            .await?
            .ok_or_else(|| ServiceError::not_found(self.kind.label(), id))
    }

    pub async fn create(&self, input: NodeInput) -> ServiceResult<Node> {
        let name = required(&input.name, "name")?;
        let code = input.code.trim().to_string();
        let parent_id = input.parent_id.filter(|p| *p > 0);
        let details = self.clean_details(input.details, &Map::new())?;

        let nodes = self.store.list_nodes(self.kind).await?;
        let hierarchy = Hierarchy::new(&nodes)?;
        hierarchy.validate_parent(None, parent_id)?;
        self.check_unique(&nodes, None, parent_id, &name, &code)?;

        let node = self
            .store
            .insert_node(NewNode {
                kind: self.kind,
                parent_id,
                name,
                code,
                sort_order: input.sort_order,
                status: input.status,
                level: hierarchy.level_under(parent_id)?,
                details,
            })
            .await?;

        tracing::info!(kind = %self.kind, id = node.id, code = %node.code, "node created");
        Ok(node)
    }

    pub async fn update(&self, id: i64, patch: NodePatch) -> ServiceResult<Node> {
        let mut nodes = self.store.list_nodes(self.kind).await?;
        let position = nodes
            .iter()
            .position(|n| n.id == id)
            .ok_or_else(|| ServiceError::not_found(self.kind.label(), id))?;

        let mut node = nodes[position].clone();
        if let Some(name) = patch.name {
            node.name = required(&name, "name")?;
        }
        if let Some(code) = patch.code {
            node.code = code.trim().to_string();
        }
        if let Some(sort_order) = patch.sort_order {
            node.sort_order = sort_order;
        }
        if let Some(status) = patch.status {
            node.status = status;
        }
        node.details = self.clean_details(patch.details, &node.details)?;

        let moved = match patch.parent_id {
            Some(parent) => {
                let parent = parent.filter(|p| *p > 0);
                let changed = parent != node.parent();
                node.parent_id = parent;
                changed
            }
            None => false,
        };

        {
            let hierarchy = Hierarchy::new(&nodes)?;
            if moved {
                hierarchy.validate_parent(Some(id), node.parent_id)?;
            }
        }
        self.check_unique(&nodes, Some(id), node.parent(), &node.name, &node.code)?;

        if !moved {
            return Ok(self.store.update_node(&node).await?);
        }

        // Re-derive levels over the snapshot with the node in its new place
        nodes[position] = node.clone();
        let hierarchy = Hierarchy::new(&nodes)?;
        let levels = hierarchy.levels()?;
        node.level = levels.get(&id).copied().unwrap_or(1);
        let updated = self.store.update_node(&node).await?;

        let shifted: Vec<(i64, i32)> = hierarchy
            .descendants(id)?
            .into_iter()
            .filter_map(|d| {
                let level = *levels.get(&d)?;
                (hierarchy.get(d)?.level != level).then_some((d, level))
            })
            .collect();
        if !shifted.is_empty() {
            self.store.update_levels(self.kind, &shifted).await?;
        }

        tracing::info!(kind = %self.kind, id, parent_id = ?updated.parent_id, relevelled = shifted.len(), "node moved");
        Ok(updated)
    }

    pub async fn delete(&self, id: i64) -> ServiceResult<()> {
        let nodes = self.store.list_nodes(self.kind).await?;
        let hierarchy = Hierarchy::new(&nodes)?;
        let node = hierarchy
            .get(id)
            .ok_or_else(|| ServiceError::not_found(self.kind.label(), id))?;

        if hierarchy.has_children(id) {
            return Err(ServiceError::in_use(format!(
                "{} '{}' has child nodes and cannot be deleted",
                self.kind.label(),
                node.name
            )));
        }

        if self.kind == NodeKind::Organization {
            let (users, assets) = futures::try_join!(
                self.store.count_users_in_organization(id),
                self.store.count_assets_in_organization(id)
            )?;
            if users > 0 {
                return Err(ServiceError::in_use(format!(
                    "Organization '{}' is referenced by {} user(s)",
                    node.name, users
                )));
            }
            if assets > 0 {
                return Err(ServiceError::in_use(format!(
                    "Organization '{}' is referenced by {} asset(s)",
                    node.name, assets
                )));
            }
        }

        self.store.delete_node(self.kind, id).await?;
        tracing::info!(kind = %self.kind, id, "node deleted");
        Ok(())
    }

    /// Build the hierarchy and compare stored levels with derived ones
    pub async fn check(&self) -> ServiceResult<TreeReport> {
        let nodes = self.store.list_nodes(self.kind).await?;
        let hierarchy = Hierarchy::new(&nodes)?;
        let levels = hierarchy.levels()?;

        let mut stale_levels: Vec<i64> = nodes
            .iter()
            .filter(|n| levels.get(&n.id) != Some(&n.level))
            .map(|n| n.id)
            .collect();
        stale_levels.sort_unstable();

        Ok(TreeReport {
            kind: self.kind,
            nodes: hierarchy.len(),
            roots: hierarchy.roots().count(),
            stale_levels,
        })
    }

    /// Merge `incoming` over `current`, keeping only keys this kind knows
    fn clean_details(&self, incoming: Map<String, Value>, current: &Map<String, Value>) -> ServiceResult<Map<String, Value>> {
        let allowed = self.kind.detail_keys();
        let mut details = current.clone();

        for (key, value) in incoming {
            if !allowed.contains(&key.as_str()) {
                continue;
            }
            if value.is_null() {
                details.remove(&key);
            } else {
                details.insert(key, value);
            }
        }

        if let Some(kind) = details.get("permission_type") {
            if !matches!(kind.as_str(), Some("module" | "menu" | "button")) {
                return Err(ServiceError::validation(
                    "permission_type must be one of module, menu, button",
                ));
            }
        }

        Ok(details)
    }

    fn check_unique(
        &self,
        nodes: &[Node],
        id: Option<i64>,
        parent_id: Option<i64>,
        name: &str,
        code: &str,
    ) -> ServiceResult<()> {
        let others = || nodes.iter().filter(move |n| Some(n.id) != id);

        match self.kind {
            NodeKind::Permission if code.is_empty() => {
                return Err(ServiceError::validation("Permission code is required"));
            }
            NodeKind::Organization => {
                if others().any(|n| n.parent() == parent_id && n.name == name) {
                    return Err(ServiceError::validation(format!(
                        "Organization '{}' already exists under this parent",
                        name
                    )));
                }
            }
            _ => {}
        }

        if !code.is_empty() && others().any(|n| n.code == code) {
            return Err(ServiceError::validation(format!(
                "{} code '{}' already exists",
                self.kind.label(),
                code
            )));
        }

        Ok(())
    }
}

pub(crate) fn required(value: &str, field: &str) -> ServiceResult<String> {
    let value = value.trim();
    if value.is_empty() {
        return Err(ServiceError::validation(format!("{} is required", field)));
    }
    Ok(value.to_string())
}
