//! k-probability: the chance that a vertex keeps at least `k` edges when
//! every incident edge exists independently.
//!
//! `P(deg(v) >= k) = 1 - sum_{i < k} P(deg(v) == i)`, where the exact-degree
//! terms come from a DP over the vertex's edges in ascending neighbor order:
//!
//! ```text
//! X(0, 0) = 1
//! X(h, j) = p_h * X(h-1, j-1) + (1 - p_h) * X(h-1, j)
//! ```
//!
//! with `X(h, j) = 0` for `j < 0` or `j > h`. The table is allocated per
//! call and indexed `[h][j]`; nothing is cached across calls because the
//! working graph changes between them.

use crate::error::CoreError;
use crate::graph::UncertainGraph;
use crate::id::VertexId;

/// Probability that `v` has at least `k` present edges in `graph`.
///
/// `k == 0` is certain. A vertex with fewer than `k` incident edges
/// (including an isolated vertex) has probability 0. Returns
/// `VertexNotFound` if `v` is out of range.
pub fn k_probability(graph: &UncertainGraph, v: VertexId, k: usize) -> Result<f64, CoreError> {
    graph.check_vertex(v)?;
    Ok(k_probability_unchecked(graph, v, k))
}

/// [`k_probability`] for a vertex already known to be in range.
pub(crate) fn k_probability_unchecked(graph: &UncertainGraph, v: VertexId, k: usize) -> f64 {
    if k == 0 {
        return 1.0;
    }
    let edges: Vec<f64> = graph.neighbors(v).map(|(_, p)| p).collect();
    if edges.len() < k {
        return 0.0;
    }
    let below_k: f64 = exact_degree_table(&edges, k - 1)[edges.len()].iter().sum();
    (1.0 - below_k).clamp(0.0, 1.0)
}

/// Fills `X[h][j]` for `h` in `0..=edges.len()` and `j` in `0..=max_j`.
fn exact_degree_table(edges: &[f64], max_j: usize) -> Vec<Vec<f64>> {
    let mut table = vec![vec![0.0; max_j + 1]; edges.len() + 1];
    table[0][0] = 1.0;
    for (h, &p) in edges.iter().enumerate().map(|(i, p)| (i + 1, p)) {
        for j in 0..=max_j.min(h) {
            let absent = (1.0 - p) * table[h - 1][j];
            let present = if j > 0 { p * table[h - 1][j - 1] } else { 0.0 };
            table[h][j] = absent + present;
        }
    }
    table
}
