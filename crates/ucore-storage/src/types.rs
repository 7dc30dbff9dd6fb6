//! Storage-layer types for graph identity and metadata.
//!
//! [`GraphId`] lives here rather than in ucore-core because graphs only gain
//! an identity when they are stored.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Unique identifier for a stored graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GraphId(pub i64);

impl fmt::Display for GraphId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "GraphId({})", self.0)
    }
}

/// Summary of a stored graph (for listing).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphSummary {
    pub id: GraphId,
    pub name: String,
    pub vertex_count: usize,
    pub edge_count: usize,
    /// Whether a threshold index is stored alongside the graph.
    pub indexed: bool,
}
