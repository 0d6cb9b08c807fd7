use thiserror::Error;

use super::NodeId;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HierarchyError {
    #[error("node {id} cannot be its own parent")]
    SelfParent { id: NodeId },

    #[error("parent node {parent_id} does not exist")]
    UnknownParent { parent_id: NodeId },

    #[error("node {id} cannot be moved under its own descendant {parent_id}")]
    WouldCycle { id: NodeId, parent_id: NodeId },

    #[error("cycle detected in parent chain at node {id}")]
    Cycle { id: NodeId },

    #[error("duplicate node id {id}")]
    DuplicateId { id: NodeId },
}

impl HierarchyError {
    /// Stored data is corrupt, as opposed to a bad request
    pub fn is_data_integrity(&self) -> bool {
        matches!(self, HierarchyError::Cycle { .. } | HierarchyError::DuplicateId { .. })
    }
}
