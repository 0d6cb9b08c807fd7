//! Hierarchical access-control model.
//!
//! Everything in here is a pure function over an immutable snapshot: the
//! services gather nodes, roles and grants first and hand them over by
//! value or reference. Nothing in this module performs I/O.

pub mod error;
pub mod guard;
pub mod resolver;
pub mod tree;

pub use error::HierarchyError;
pub use guard::{authorize, Decision, DenyReason, Identity, Requirement};
pub use resolver::{effective_permission_codes, visible_ids, visible_tree, RoleGrant};
pub use tree::{build_tree, Hierarchy, Tree};

pub type NodeId = i64;

/// A record that participates in a parent-pointer hierarchy
pub trait HierarchyNode {
    fn id(&self) -> NodeId;

    /// Raw parent reference; `None` and `Some(0)` both mean "root"
    fn parent_id(&self) -> Option<NodeId>;

    fn sort_order(&self) -> i32;

    /// Normalized parent reference with the `0` sentinel folded into `None`
    fn parent(&self) -> Option<NodeId> {
        self.parent_id().filter(|p| *p > 0)
    }
}

/// A hierarchy node gated by a permission code
pub trait GatedNode: HierarchyNode {
    /// Empty for structural (group) nodes
    fn code(&self) -> &str;

    fn is_active(&self) -> bool;
}
