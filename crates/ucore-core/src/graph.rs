//! UncertainGraph: a dense, symmetric matrix of edge-existence probabilities.
//!
//! Entry `p[u][v]` is the probability that edge `{u, v}` exists in a random
//! realization of the graph. Zero means "no edge"; the diagonal is always
//! zero. Every mutating method writes both directions, so the matrix stays
//! symmetric before and after any operation.
//!
//! Algorithms never mutate a caller's graph. They clone it into a working
//! copy (or `clone_from` into a reused buffer) that the current pass owns
//! exclusively.

use petgraph::graph::{NodeIndex, UnGraph};
use serde::{Deserialize, Serialize};

use crate::config::CoreConfig;
use crate::error::CoreError;
use crate::id::VertexId;

/// Symmetric probability matrix over dense vertex ids `0..n`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UncertainGraph {
    n: usize,
    /// Row-major `n * n` probabilities.
    probs: Vec<f64>,
}

fn check_probability(p: f64) -> Result<(), CoreError> {
    if !p.is_finite() || !(0.0..=1.0).contains(&p) {
        return Err(CoreError::validation(format!(
            "probability {p} is outside [0, 1]"
        )));
    }
    Ok(())
}

impl UncertainGraph {
    /// Creates a graph with `vertex_count` vertices and no edges.
    pub fn new(vertex_count: usize) -> Self {
        UncertainGraph {
            n: vertex_count,
            probs: vec![0.0; vertex_count * vertex_count],
        }
    }

    /// Builds a graph from a square matrix, rejecting anything that is not
    /// square, has a non-zero diagonal, holds values outside [0, 1], or is
    /// asymmetric beyond the default `symmetry_tolerance`.
    pub fn from_matrix(rows: Vec<Vec<f64>>) -> Result<Self, CoreError> {
        Self::from_matrix_with_config(rows, &CoreConfig::default())
    }

    /// Like [`from_matrix`](Self::from_matrix) with the symmetry tolerance
    /// taken from `config`. Accepted near-symmetric pairs are stored as the
    /// upper triangle's value in both directions.
    pub fn from_matrix_with_config(
        rows: Vec<Vec<f64>>,
        config: &CoreConfig,
    ) -> Result<Self, CoreError> {
        config.validate()?;
        let tolerance = config.symmetry_tolerance;
        let n = rows.len();
        let mut graph = UncertainGraph::new(n);
        for (u, row) in rows.iter().enumerate() {
            if row.len() != n {
                return Err(CoreError::validation(format!(
                    "matrix is not square: row {u} has {} entries, expected {n}",
                    row.len()
                )));
            }
            for &p in row {
                check_probability(p)?;
            }
            if row[u] != 0.0 {
                return Err(CoreError::validation(format!(
                    "diagonal entry ({u}, {u}) must be zero"
                )));
            }
        }
        for u in 0..n {
            for v in (u + 1)..n {
                let (upper, lower) = (rows[u][v], rows[v][u]);
                if (upper - lower).abs() > tolerance {
                    return Err(CoreError::validation(format!(
                        "matrix is asymmetric at ({u}, {v}): {upper} vs {lower}"
                    )));
                }
                graph.write(u, v, upper);
            }
        }
        Ok(graph)
    }

    /// Builds a graph from an undirected edge list. Later duplicates of the
    /// same pair overwrite earlier ones.
    pub fn from_edges(
        vertex_count: usize,
        edges: &[(VertexId, VertexId, f64)],
    ) -> Result<Self, CoreError> {
        let mut graph = UncertainGraph::new(vertex_count);
        for &(u, v, p) in edges {
            graph.set_probability(u, v, p)?;
        }
        Ok(graph)
    }

    /// Imports an undirected petgraph whose edge weights are probabilities.
    pub fn from_petgraph(graph: &UnGraph<(), f64>) -> Result<Self, CoreError> {
        let edges: Vec<(VertexId, VertexId, f64)> = graph
            .raw_edges()
            .iter()
            .map(|e| (e.source().into(), e.target().into(), e.weight))
            .collect();
        Self::from_edges(graph.node_count(), &edges)
    }

    /// Exports the positive edges as an undirected petgraph.
    pub fn to_petgraph(&self) -> UnGraph<(), f64> {
        let mut graph = UnGraph::<(), f64>::with_capacity(self.n, self.edge_count());
        for _ in 0..self.n {
            graph.add_node(());
        }
        for (u, v, p) in self.edges() {
            graph.add_edge(NodeIndex::from(u), NodeIndex::from(v), p);
        }
        graph
    }

    /// Returns the matrix as nested rows.
    pub fn to_matrix(&self) -> Vec<Vec<f64>> {
        self.probs.chunks(self.n.max(1)).take(self.n).map(|r| r.to_vec()).collect()
    }

    // -----------------------------------------------------------------------
    // Read-only accessors
    // -----------------------------------------------------------------------

    pub fn vertex_count(&self) -> usize {
        self.n
    }

    pub fn vertices(&self) -> impl Iterator<Item = VertexId> {
        (0..self.n).map(VertexId::from)
    }

    pub fn contains_vertex(&self, v: VertexId) -> bool {
        v.index() < self.n
    }

    /// Returns [`CoreError::VertexNotFound`] if `v` is out of range.
    pub fn check_vertex(&self, v: VertexId) -> Result<(), CoreError> {
        if self.contains_vertex(v) {
            Ok(())
        } else {
            Err(CoreError::VertexNotFound { id: v })
        }
    }

    /// Probability of edge `{u, v}`.
    ///
    /// # Panics
    /// If either vertex is out of range; use [`check_vertex`](Self::check_vertex)
    /// on untrusted ids first.
    pub fn probability(&self, u: VertexId, v: VertexId) -> f64 {
        self.probs[u.index() * self.n + v.index()]
    }

    /// Positive-probability neighbors of `v`, in ascending vertex order.
    ///
    /// The order is stable across calls, which fixes the edge order used by
    /// the probability DP.
    ///
    /// # Panics
    /// If `v` is out of range, like [`probability`](Self::probability).
    pub fn neighbors(&self, v: VertexId) -> impl Iterator<Item = (VertexId, f64)> + '_ {
        let row = v.index() * self.n;
        self.probs[row..row + self.n]
            .iter()
            .enumerate()
            .filter(move |&(u, &p)| u != v.index() && p > 0.0)
            .map(|(u, &p)| (VertexId::from(u), p))
    }

    /// Number of positive-probability incident edges.
    pub fn degree(&self, v: VertexId) -> usize {
        self.neighbors(v).count()
    }

    /// Returns `true` if any edge has positive probability.
    pub fn has_edges(&self) -> bool {
        self.probs.iter().any(|&p| p > 0.0)
    }

    pub fn edge_count(&self) -> usize {
        self.probs.iter().filter(|&&p| p > 0.0).count() / 2
    }

    /// All positive edges as `(u, v, p)` with `u < v`.
    pub fn edges(&self) -> Vec<(VertexId, VertexId, f64)> {
        let mut edges = Vec::new();
        for u in 0..self.n {
            for v in (u + 1)..self.n {
                let p = self.probs[u * self.n + v];
                if p > 0.0 {
                    edges.push((VertexId::from(u), VertexId::from(v), p));
                }
            }
        }
        edges
    }

    /// Positive edges with both endpoints in `vertices`, as `(u, v, p)` with
    /// `u < v`.
    pub fn induced_edges(&self, vertices: &[VertexId]) -> Vec<(VertexId, VertexId, f64)> {
        let mut inside = vec![false; self.n];
        for v in vertices.iter().filter(|v| self.contains_vertex(**v)) {
            inside[v.index()] = true;
        }
        self.edges()
            .into_iter()
            .filter(|(u, v, _)| inside[u.index()] && inside[v.index()])
            .collect()
    }

    // -----------------------------------------------------------------------
    // Mutation (always symmetric)
    // -----------------------------------------------------------------------

    fn write(&mut self, u: usize, v: usize, p: f64) {
        self.probs[u * self.n + v] = p;
        self.probs[v * self.n + u] = p;
    }

    /// Sets the probability of edge `{u, v}` in both directions and returns
    /// the previous value.
    pub fn set_probability(&mut self, u: VertexId, v: VertexId, p: f64) -> Result<f64, CoreError> {
        self.check_vertex(u)?;
        self.check_vertex(v)?;
        if u == v {
            return Err(CoreError::validation(format!("self-loop on vertex {u}")));
        }
        check_probability(p)?;
        let old = self.probability(u, v);
        self.write(u.index(), v.index(), p);
        Ok(old)
    }

    /// Zeroes every edge incident to `v` (row and column).
    pub fn remove_vertex_edges(&mut self, v: VertexId) {
        let v = v.index();
        for u in 0..self.n {
            self.write(v, u, 0.0);
        }
    }

    /// Deletes every edge with at least one endpoint outside `keep`.
    pub fn retain_vertices(&mut self, keep: &[bool]) {
        for u in 0..self.n {
            for v in 0..self.n {
                if !keep.get(u).copied().unwrap_or(false) || !keep.get(v).copied().unwrap_or(false) {
                    self.probs[u * self.n + v] = 0.0;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn triangle() -> UncertainGraph {
        UncertainGraph::from_edges(
            3,
            &[
                (VertexId(0), VertexId(1), 0.5),
                (VertexId(1), VertexId(2), 0.8),
                (VertexId(0), VertexId(2), 0.2),
            ],
        )
        .unwrap()
    }

    #[test]
    fn from_edges_is_symmetric() {
        let g = triangle();
        assert_eq!(g.probability(VertexId(0), VertexId(1)), 0.5);
        assert_eq!(g.probability(VertexId(1), VertexId(0)), 0.5);
        assert_eq!(g.edge_count(), 3);
        assert_eq!(g.degree(VertexId(1)), 2);
    }

    #[test]
    fn rejects_non_square_matrix() {
        let err = UncertainGraph::from_matrix(vec![vec![0.0, 0.5], vec![0.5]]).unwrap_err();
        assert!(matches!(err, CoreError::Validation { .. }));
    }

    #[test]
    fn rejects_asymmetric_matrix() {
        let err =
            UncertainGraph::from_matrix(vec![vec![0.0, 0.5], vec![0.4, 0.0]]).unwrap_err();
        assert!(err.to_string().contains("asymmetric"));
    }

    #[test]
    fn symmetry_tolerance_comes_from_config() {
        let rows = vec![vec![0.0, 0.5], vec![0.5 + 1e-6, 0.0]];
        assert!(UncertainGraph::from_matrix(rows.clone()).is_err());

        let config = CoreConfig {
            symmetry_tolerance: 1e-5,
            ..CoreConfig::default()
        };
        let g = UncertainGraph::from_matrix_with_config(rows, &config).unwrap();
        assert_eq!(g.probability(VertexId(1), VertexId(0)), 0.5);
    }

    #[test]
    fn rejects_out_of_range_probability_and_diagonal() {
        assert!(UncertainGraph::from_matrix(vec![vec![0.0, 1.5], vec![1.5, 0.0]]).is_err());
        assert!(UncertainGraph::from_matrix(vec![vec![0.3, 0.0], vec![0.0, 0.0]]).is_err());
        assert!(UncertainGraph::from_matrix(vec![vec![0.0, -0.1], vec![-0.1, 0.0]]).is_err());
    }

    #[test]
    fn set_probability_validates_input() {
        let mut g = triangle();
        assert!(matches!(
            g.set_probability(VertexId(0), VertexId(9), 0.1),
            Err(CoreError::VertexNotFound { id }) if id == VertexId(9)
        ));
        assert!(g.set_probability(VertexId(1), VertexId(1), 0.1).is_err());
        assert!(g.set_probability(VertexId(0), VertexId(1), f64::NAN).is_err());
        let old = g.set_probability(VertexId(2), VertexId(1), 0.3).unwrap();
        assert_eq!(old, 0.8);
        assert_eq!(g.probability(VertexId(1), VertexId(2)), 0.3);
    }

    #[test]
    fn remove_vertex_edges_clears_row_and_column() {
        let mut g = triangle();
        g.remove_vertex_edges(VertexId(1));
        assert_eq!(g.degree(VertexId(1)), 0);
        assert_eq!(g.probability(VertexId(0), VertexId(1)), 0.0);
        assert_eq!(g.probability(VertexId(2), VertexId(1)), 0.0);
        assert_eq!(g.edge_count(), 1);
    }

    #[test]
    fn retain_vertices_drops_leaving_edges() {
        let mut g = triangle();
        g.retain_vertices(&[true, true, false]);
        assert_eq!(g.edges(), vec![(VertexId(0), VertexId(1), 0.5)]);
    }

    #[test]
    fn neighbors_are_ascending_and_positive() {
        let g = triangle();
        let ns: Vec<VertexId> = g.neighbors(VertexId(0)).map(|(v, _)| v).collect();
        assert_eq!(ns, vec![VertexId(1), VertexId(2)]);
    }

    #[test]
    fn induced_edges_keep_only_inner_pairs() {
        let g = triangle();
        let inner = g.induced_edges(&[VertexId(1), VertexId(2)]);
        assert_eq!(inner, vec![(VertexId(1), VertexId(2), 0.8)]);
    }

    #[test]
    fn petgraph_roundtrip() {
        let g = triangle();
        let pg = g.to_petgraph();
        assert_eq!(pg.node_count(), 3);
        assert_eq!(pg.edge_count(), 3);
        let back = UncertainGraph::from_petgraph(&pg).unwrap();
        assert_eq!(back, g);
    }

    #[test]
    fn matrix_roundtrip() {
        let g = triangle();
        let back = UncertainGraph::from_matrix(g.to_matrix()).unwrap();
        assert_eq!(back, g);
        assert!(UncertainGraph::new(0).to_matrix().is_empty());
    }
}
