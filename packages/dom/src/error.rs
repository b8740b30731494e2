use thiserror::Error;

use crate::node::NodeId;

pub type DomResult<T> = Result<T, DomError>;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DomError {
    #[error("Node {0:?} does not exist")]
    NodeNotFound(NodeId),

    #[error("Node {0:?} is not an element")]
    NotAnElement(NodeId),

    #[error("Node {0:?} has no parent")]
    Detached(NodeId),

    #[error("Node {0:?} is not a form control")]
    NotAFormControl(NodeId),

    #[error("Node {child:?} is not a child of {parent:?}")]
    NotAChild { parent: NodeId, child: NodeId },

    #[error("Cannot insert {child:?} into {parent:?}: {reason}")]
    HierarchyRequest {
        parent: NodeId,
        child: NodeId,
        reason: &'static str,
    },
}

impl DomError {
    pub fn hierarchy(parent: NodeId, child: NodeId, reason: &'static str) -> Self {
        Self::HierarchyRequest {
            parent,
            child,
            reason,
        }
    }
}
