//! Error types for layer stack operations

use thiserror::Error;
use uuid::Uuid;

/// Reasons a layer stack edit is rejected. A rejected edit leaves the
/// stack unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LayerError {
    #[error("Unknown layer node: {0}")]
    UnknownNode(Uuid),
    #[error("Layer '{0}' is pinned and cannot be moved, grouped or removed")]
    Pinned(String),
    #[error("Node {0} is not a group")]
    NotAGroup(Uuid),
    #[error("Cannot move a group inside its own subtree")]
    Cycle,
    #[error("Nothing selected to group")]
    EmptySelection,
    #[error("Layer stack invariant violated: {0}")]
    Invariant(String),
}
