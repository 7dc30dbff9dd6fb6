//! (k, η)-core lookup against a built threshold index.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::graph::UncertainGraph;
use crate::id::VertexId;
use crate::peel::ThresholdIndex;

/// Vertices of the (k, η)-core and the edges among them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoreQueryResult {
    pub k: usize,
    pub eta: f64,
    pub vertices: Vec<VertexId>,
    pub edges: Vec<(VertexId, VertexId, f64)>,
}

impl CoreQueryResult {
    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }
}

/// Vertices whose order-`k` threshold is at least `eta`.
pub fn k_eta_core(
    graph: &UncertainGraph,
    index: &ThresholdIndex,
    k: usize,
    eta: f64,
) -> Result<CoreQueryResult, CoreError> {
    if k == 0 {
        return Err(CoreError::validation("k must be >= 1"));
    }
    if !(eta > 0.0 && eta <= 1.0) {
        return Err(CoreError::validation(format!("eta {eta} is outside (0, 1]")));
    }
    if index.vertex_count() != graph.vertex_count() {
        return Err(CoreError::validation(format!(
            "index covers {} vertices but graph has {}",
            index.vertex_count(),
            graph.vertex_count()
        )));
    }
    let vertices = index.members(k, eta);
    let edges = graph.induced_edges(&vertices);
    Ok(CoreQueryResult {
        k,
        eta,
        vertices,
        edges,
    })
}
