use std::collections::{BTreeSet, HashSet};

use serde::{Deserialize, Serialize};

use super::tree::{build_tree, Hierarchy, Tree};
use super::{GatedNode, HierarchyError, NodeId};

/// A role together with the permission codes associated with it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleGrant {
    pub code: String,
    pub active: bool,
    pub permissions: Vec<String>,
}

impl RoleGrant {
    pub fn new<I, S>(code: &str, active: bool, permissions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            code: code.to_string(),
            active,
            permissions: permissions.into_iter().map(Into::into).collect(),
        }
    }
}

/// Union of permission codes over the active grants.
///
/// Disabled roles contribute nothing, even if their associations remain.
pub fn effective_permission_codes<'a, I>(grants: I) -> BTreeSet<String>
where
    I: IntoIterator<Item = &'a RoleGrant>,
{
    grants
        .into_iter()
        .filter(|g| g.active)
        .flat_map(|g| g.permissions.iter())
        .filter(|code| !code.is_empty())
        .cloned()
        .collect()
}

/// Ids of the nodes that should be visible for `granted`.
///
/// A node matches when it is active and carries a granted, non-empty code.
/// Every ancestor of a match is forced in. A match below a disabled
/// ancestor stays hidden.
pub fn visible_ids<N: GatedNode>(
    hierarchy: &Hierarchy<'_, N>,
    granted: &BTreeSet<String>,
) -> Result<HashSet<NodeId>, HierarchyError> {
    let mut visible = HashSet::new();
    if granted.is_empty() {
        return Ok(visible);
    }

    for node in hierarchy.iter() {
        if !node.is_active() || node.code().is_empty() || !granted.contains(node.code()) {
            continue;
        }

        let ancestors = hierarchy.ancestors(node.id())?;
        let chain_active = ancestors
            .iter()
            .filter_map(|id| hierarchy.get(*id))
            .all(GatedNode::is_active);
        if !chain_active {
            continue;
        }

        visible.insert(node.id());
        visible.extend(ancestors);
    }

    Ok(visible)
}

/// Filter a full node set down to what `granted` can see and shape it as a forest
pub fn visible_tree<N: GatedNode>(
    nodes: Vec<N>,
    granted: &BTreeSet<String>,
) -> Result<Vec<Tree<N>>, HierarchyError> {
    let keep = {
        let hierarchy = Hierarchy::new(&nodes)?;
        visible_ids(&hierarchy, granted)?
    };

    if keep.is_empty() {
        return Ok(Vec::new());
    }

    build_tree(nodes.into_iter().filter(|n| keep.contains(&n.id())).collect())
}
