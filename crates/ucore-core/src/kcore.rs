//! Deterministic k-core decomposition of the support graph.
//!
//! An edge counts when its probability is positive. A vertex's core number
//! is the largest `k` such that it belongs to a subgraph where every vertex
//! has at least `k` neighbors.

use crate::graph::UncertainGraph;

/// Core number of every vertex, by bucketed min-degree peeling.
/// Isolated vertices get 0.
pub fn core_numbers(graph: &UncertainGraph) -> Vec<usize> {
    let n = graph.vertex_count();
    if n == 0 {
        return Vec::new();
    }
    let neighbors: Vec<Vec<usize>> = graph
        .vertices()
        .map(|v| graph.neighbors(v).map(|(u, _)| u.index()).collect())
        .collect();
    let mut degree: Vec<usize> = neighbors.iter().map(Vec::len).collect();
    let max_degree = degree.iter().copied().max().unwrap_or(0);

    let mut buckets: Vec<Vec<usize>> = vec![Vec::new(); max_degree + 1];
    for (v, &d) in degree.iter().enumerate() {
        buckets[d].push(v);
    }

    let mut core = vec![0; n];
    let mut done = vec![false; n];
    let mut level = 0;
    let mut processed = 0;
    while processed < n {
        while level <= max_degree && buckets[level].is_empty() {
            level += 1;
        }
        let Some(v) = buckets.get_mut(level).and_then(Vec::pop) else {
            break;
        };
        // Stale entries are left behind when a degree drops.
        if done[v] || degree[v] != level {
            continue;
        }
        done[v] = true;
        processed += 1;
        core[v] = level;
        for &u in &neighbors[v] {
            if !done[u] && degree[u] > level {
                degree[u] -= 1;
                buckets[degree[u]].push(u);
            }
        }
    }
    core
}
