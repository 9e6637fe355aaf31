//! Error types for document loading and structural edits.
//!
//! Structural no-ops (removing a non-child, deselecting an unselected node)
//! are not errors; they return `false`/`None`. Only failures a caller must
//! react to, like an unparseable document, surface here.

use crate::id::NodeId;
use petgraph::graph::NodeIndex;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SceneError {
    #[error("malformed document: {0}")]
    Json(#[from] serde_json::Error),

    #[error("duplicate node id {0}")]
    DuplicateId(NodeId),

    #[error("node {0:?} does not exist in this scene")]
    MissingNode(NodeIndex),

    #[error("cannot attach {child} under its own descendant {parent}")]
    Cycle { parent: NodeId, child: NodeId },
}
