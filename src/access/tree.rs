use std::collections::{HashMap, HashSet, VecDeque};

use serde::Serialize;

use super::{HierarchyError, HierarchyNode, NodeId};

/// A node with its nested, ordered children
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Tree<N> {
    #[serde(flatten)]
    pub node: N,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<Tree<N>>,
}

impl<N> Tree<N> {
    pub fn leaf(node: N) -> Self {
        Self {
            node,
            children: Vec::new(),
        }
    }

    /// Number of nodes in this subtree, including the root
    pub fn size(&self) -> usize {
        let mut count = 0;
        let mut stack = vec![self];
        while let Some(t) = stack.pop() {
            count += 1;
            stack.extend(t.children.iter());
        }
        count
    }
}

/// Read-only arena over a flat node snapshot, indexed by id.
///
/// Children lists and the root list are pre-sorted by `(sort_order, id)`.
/// A node whose parent is not in the snapshot counts as a root.
pub struct Hierarchy<'a, N> {
    nodes: &'a [N],
    index: HashMap<NodeId, usize>,
    children: HashMap<NodeId, Vec<usize>>,
    roots: Vec<usize>,
}

impl<'a, N: HierarchyNode> Hierarchy<'a, N> {
    pub fn new(nodes: &'a [N]) -> Result<Self, HierarchyError> {
        let mut index = HashMap::with_capacity(nodes.len());
        for (i, node) in nodes.iter().enumerate() {
            if index.insert(node.id(), i).is_some() {
                return Err(HierarchyError::DuplicateId { id: node.id() });
            }
        }

        let mut children: HashMap<NodeId, Vec<usize>> = HashMap::new();
        let mut roots = Vec::new();
        for (i, node) in nodes.iter().enumerate() {
            match node.parent() {
                Some(p) if index.contains_key(&p) => children.entry(p).or_default().push(i),
                _ => roots.push(i),
            }
        }

        let order_key = |i: &usize| (nodes[*i].sort_order(), nodes[*i].id());
        roots.sort_by_key(order_key);
        for list in children.values_mut() {
            list.sort_by_key(order_key);
        }

        Ok(Self {
            nodes,
            index,
            children,
            roots,
        })
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn get(&self, id: NodeId) -> Option<&'a N> {
        self.index.get(&id).map(|&i| &self.nodes[i])
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.index.contains_key(&id)
    }

    /// All nodes in snapshot order
    pub fn iter(&self) -> impl Iterator<Item = &'a N> {
        self.nodes.iter()
    }

    pub fn roots(&self) -> impl Iterator<Item = &'a N> + '_ {
        self.roots.iter().map(move |&i| &self.nodes[i])
    }

    pub fn children(&self, id: NodeId) -> impl Iterator<Item = &'a N> + '_ {
        self.child_indices(id).iter().map(move |&i| &self.nodes[i])
    }

    pub fn has_children(&self, id: NodeId) -> bool {
        !self.child_indices(id).is_empty()
    }

    fn child_indices(&self, id: NodeId) -> &[usize] {
        self.children.get(&id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Ancestor ids, nearest first. The walk stops at a parent that is not
    /// in the snapshot; revisiting a node reports a cycle.
    pub fn ancestors(&self, id: NodeId) -> Result<Vec<NodeId>, HierarchyError> {
        let mut out = Vec::new();
        let mut seen = HashSet::from([id]);
        let mut current = self.get(id).and_then(HierarchyNode::parent);

        while let Some(parent_id) = current {
            let Some(parent) = self.get(parent_id) else {
                break;
            };
            if !seen.insert(parent_id) {
                return Err(HierarchyError::Cycle { id: parent_id });
            }
            out.push(parent_id);
            current = parent.parent();
        }

        Ok(out)
    }

    /// Descendant ids in breadth-first order, excluding `id` itself
    pub fn descendants(&self, id: NodeId) -> Result<Vec<NodeId>, HierarchyError> {
        let mut out = Vec::new();
        let mut seen = HashSet::from([id]);
        let mut queue: VecDeque<NodeId> = VecDeque::from([id]);

        while let Some(current) = queue.pop_front() {
            for child in self.children(current) {
                if !seen.insert(child.id()) {
                    return Err(HierarchyError::Cycle { id: child.id() });
                }
                out.push(child.id());
                queue.push_back(child.id());
            }
        }

        Ok(out)
    }

    /// Check that `id` (None for a node not created yet) may hang under `parent`
    pub fn validate_parent(
        &self,
        id: Option<NodeId>,
        parent: Option<NodeId>,
    ) -> Result<(), HierarchyError> {
        let Some(parent_id) = parent.filter(|p| *p > 0) else {
            return Ok(());
        };

        if id == Some(parent_id) {
            return Err(HierarchyError::SelfParent { id: parent_id });
        }
        if !self.contains(parent_id) {
            return Err(HierarchyError::UnknownParent { parent_id });
        }
        if let Some(id) = id {
            if self.ancestors(parent_id)?.contains(&id) {
                return Err(HierarchyError::WouldCycle { id, parent_id });
            }
        }

        Ok(())
    }

    /// Level a node would have directly under `parent` (root = 1)
    pub fn level_under(&self, parent: Option<NodeId>) -> Result<i32, HierarchyError> {
        match parent.filter(|p| *p > 0) {
            None => Ok(1),
            Some(p) if !self.contains(p) => Ok(1),
            Some(p) => Ok(self.ancestors(p)?.len() as i32 + 2),
        }
    }

    /// Derived level of every node
    pub fn levels(&self) -> Result<HashMap<NodeId, i32>, HierarchyError> {
        Ok(self
            .preorder()?
            .into_iter()
            .map(|(i, depth)| (self.nodes[i].id(), depth))
            .collect())
    }

    /// Depth-first order over the whole forest with depths. Any node that
    /// is unreachable from a root sits on (or under) a cycle.
    fn preorder(&self) -> Result<Vec<(usize, i32)>, HierarchyError> {
        let mut visited = vec![false; self.nodes.len()];
        let mut order = Vec::with_capacity(self.nodes.len());
        let mut stack: Vec<(usize, i32)> = self.roots.iter().rev().map(|&i| (i, 1)).collect();

        while let Some((i, depth)) = stack.pop() {
            if visited[i] {
                return Err(HierarchyError::Cycle {
                    id: self.nodes[i].id(),
                });
            }
            visited[i] = true;
            order.push((i, depth));
            for &child in self.child_indices(self.nodes[i].id()).iter().rev() {
                stack.push((child, depth + 1));
            }
        }

        if let Some(stranded) = visited.iter().position(|v| !v) {
            return Err(HierarchyError::Cycle {
                id: self.cycle_member(stranded),
            });
        }

        Ok(order)
    }

    /// Follow parents from a stranded node until a node repeats
    fn cycle_member(&self, start: usize) -> NodeId {
        let mut seen = HashSet::new();
        let mut current = self.nodes[start].id();
        while seen.insert(current) {
            match self.get(current).and_then(HierarchyNode::parent) {
                Some(p) if self.contains(p) => current = p,
                _ => break,
            }
        }
        current
    }
}

/// Build an ordered forest from a flat node set.
///
/// Roots and every children list are ordered by `(sort_order, id)`. Nodes
/// whose parent is missing from the set are promoted to the root level.
/// Cycles and duplicate ids are reported instead of being walked.
pub fn build_tree<N: HierarchyNode>(nodes: Vec<N>) -> Result<Vec<Tree<N>>, HierarchyError> {
    let (order, children, roots) = {
        let hierarchy = Hierarchy::new(&nodes)?;
        let order = hierarchy.preorder()?;
        let children: Vec<Vec<usize>> = nodes
            .iter()
            .map(|n| hierarchy.child_indices(n.id()).to_vec())
            .collect();
        (order, children, hierarchy.roots.clone())
    };

    let mut slots: Vec<Option<N>> = nodes.into_iter().map(Some).collect();
    let mut built: Vec<Option<Tree<N>>> = std::iter::repeat_with(|| None)
        .take(slots.len())
        .collect();

    // Reverse preorder visits every child before its parent
    for &(i, _) in order.iter().rev() {
        let kids = children[i].iter().filter_map(|&c| built[c].take()).collect();
        if let Some(node) = slots[i].take() {
            built[i] = Some(Tree {
                node,
                children: kids,
            });
        }
    }

    Ok(roots.iter().filter_map(|&r| built[r].take()).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq, Serialize)]
    struct N {
        id: NodeId,
        parent_id: Option<NodeId>,
        sort_order: i32,
    }

    impl HierarchyNode for N {
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

    fn n(id: NodeId, parent_id: Option<NodeId>, sort_order: i32) -> N {
        N {
            id,
            parent_id,
            sort_order,
        }
    }

    fn ids(forest: &[Tree<N>]) -> Vec<NodeId> {
        forest.iter().map(|t| t.node.id).collect()
    }

    fn collect_all(forest: &[Tree<N>]) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack: Vec<&Tree<N>> = forest.iter().collect();
        while let Some(t) = stack.pop() {
            out.push(t.node.id);
            stack.extend(t.children.iter());
        }
        out.sort();
        out
    }

    #[test]
    fn empty_input_builds_empty_forest() {
        assert!(build_tree(Vec::<N>::new()).unwrap().is_empty());
    }

    #[test]
    fn single_root_has_no_children() {
        let forest = build_tree(vec![n(1, None, 0)]).unwrap();
        assert_eq!(forest.len(), 1);
        assert!(forest[0].children.is_empty());
    }

    #[test]
    fn orders_by_sort_order_then_id() {
        let forest = build_tree(vec![
            n(5, None, 2),
            n(3, None, 1),
            n(4, None, 1),
            n(10, Some(3), 0),
            n(8, Some(3), 0),
            n(7, Some(3), -1),
        ])
        .unwrap();

        assert_eq!(ids(&forest), vec![3, 4, 5]);
        assert_eq!(ids(&forest[0].children), vec![7, 8, 10]);
    }

    #[test]
    fn zero_parent_means_root() {
        let forest = build_tree(vec![n(1, Some(0), 0), n(2, Some(1), 0)]).unwrap();
        assert_eq!(ids(&forest), vec![1]);
        assert_eq!(ids(&forest[0].children), vec![2]);
    }

    #[test]
    fn orphan_is_promoted_to_root() {
        let forest = build_tree(vec![n(1, None, 5), n(2, Some(99), 0), n(3, Some(2), 0)]).unwrap();
        assert_eq!(ids(&forest), vec![2, 1]);
        assert_eq!(ids(&forest[0].children), vec![3]);
    }

    #[test]
    fn every_node_appears_exactly_once() {
        let nodes = vec![
            n(1, None, 0),
            n(2, Some(1), 0),
            n(3, Some(1), 1),
            n(4, Some(2), 0),
            n(5, Some(4), 0),
            n(6, None, 1),
            n(7, Some(6), 0),
        ];
        let forest = build_tree(nodes.clone()).unwrap();
        assert_eq!(collect_all(&forest), vec![1, 2, 3, 4, 5, 6, 7]);
        assert_eq!(forest.iter().map(Tree::size).sum::<usize>(), nodes.len());
    }

    #[test]
    fn build_is_deterministic_regardless_of_input_order() {
        let a = vec![n(1, None, 0), n(2, Some(1), 1), n(3, Some(1), 1), n(4, None, 0)];
        let mut b = a.clone();
        b.reverse();
        assert_eq!(build_tree(a.clone()).unwrap(), build_tree(a).unwrap());
        assert_eq!(
            serde_json::to_value(build_tree(b).unwrap()).unwrap(),
            serde_json::to_value(build_tree(vec![n(1, None, 0), n(2, Some(1), 1), n(3, Some(1), 1), n(4, None, 0)]).unwrap()).unwrap()
        );
    }

    #[test]
    fn cycle_is_reported_not_looped() {
        let err = build_tree(vec![n(1, None, 0), n(2, Some(3), 0), n(3, Some(2), 0), n(4, Some(3), 0)])
            .unwrap_err();
        match err {
            HierarchyError::Cycle { id } => assert!(id == 2 || id == 3),
            other => panic!("unexpected error {other:?}"),
        }
        assert!(err.is_data_integrity());
    }

    #[test]
    fn self_loop_in_stored_data_is_a_cycle() {
        let err = build_tree(vec![n(1, Some(1), 0)]).unwrap_err();
        assert_eq!(err, HierarchyError::Cycle { id: 1 });
    }

    #[test]
    fn duplicate_ids_are_rejected() {
        let err = build_tree(vec![n(1, None, 0), n(1, None, 1)]).unwrap_err();
        assert_eq!(err, HierarchyError::DuplicateId { id: 1 });
    }

    #[test]
    fn validate_parent_rules() {
        let nodes = vec![n(1, None, 0), n(2, Some(1), 0), n(3, Some(2), 0)];
        let h = Hierarchy::new(&nodes).unwrap();

        assert!(h.validate_parent(None, None).is_ok());
        assert!(h.validate_parent(None, Some(0)).is_ok());
        assert!(h.validate_parent(None, Some(3)).is_ok());
        assert_eq!(
            h.validate_parent(Some(2), Some(2)),
            Err(HierarchyError::SelfParent { id: 2 })
        );
        assert_eq!(
            h.validate_parent(Some(2), Some(42)),
            Err(HierarchyError::UnknownParent { parent_id: 42 })
        );
        assert_eq!(
            h.validate_parent(Some(1), Some(3)),
            Err(HierarchyError::WouldCycle { id: 1, parent_id: 3 })
        );
        assert!(h.validate_parent(Some(3), Some(1)).is_ok());
    }

    #[test]
    fn ancestors_descendants_and_levels() {
        let nodes = vec![n(1, None, 0), n(2, Some(1), 0), n(3, Some(2), 0), n(4, Some(1), 1)];
        let h = Hierarchy::new(&nodes).unwrap();

        assert_eq!(h.ancestors(3).unwrap(), vec![2, 1]);
        assert!(h.ancestors(1).unwrap().is_empty());
        assert_eq!(h.descendants(1).unwrap(), vec![2, 4, 3]);
        assert!(h.has_children(2));
        assert!(!h.has_children(4));

        let levels = h.levels().unwrap();
        assert_eq!(levels[&1], 1);
        assert_eq!(levels[&2], 2);
        assert_eq!(levels[&3], 3);
        assert_eq!(levels[&4], 2);
        assert_eq!(h.level_under(Some(3)).unwrap(), 4);
        assert_eq!(h.level_under(None).unwrap(), 1);
    }

    #[test]
    fn ancestors_of_corrupt_chain_terminates() {
        let nodes = vec![n(1, Some(2), 0), n(2, Some(1), 0)];
        let h = Hierarchy::new(&nodes).unwrap();
        assert!(matches!(h.ancestors(1), Err(HierarchyError::Cycle { .. })));
    }

    #[test]
    fn serializes_children_only_when_present() {
        let forest = build_tree(vec![n(1, None, 0), n(2, Some(1), 0)]).unwrap();
        let json = serde_json::to_value(&forest).unwrap();
        assert_eq!(json[0]["id"], 1);
        assert_eq!(json[0]["children"][0]["id"], 2);
        assert!(json[0]["children"][0].get("children").is_none());
    }
}
