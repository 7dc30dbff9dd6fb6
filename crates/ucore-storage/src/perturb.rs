//! Seeded random edge changes for maintenance experiments.
//!
//! Reproducibility: the same seed and the same sequence of graphs yield
//! the same sequence of changes.

use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use ucore_core::{EdgeChange, UncertainGraph, VertexId};

use crate::error::StorageError;

/// Smallest step an increase makes.
pub const MIN_INCREASE: f64 = 0.001;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Increase,
    Decrease,
}

/// Draws random edge changes from a ChaCha8 stream.
#[derive(Debug, Clone)]
pub struct Perturber {
    rng: ChaCha8Rng,
}

impl Perturber {
    pub fn new(seed: u64) -> Self {
        Perturber {
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }

    /// Picks a vertex pair and a new probability for it.
    ///
    /// An increase picks any pair below 1 and moves it to
    /// `p + (1 - p) * r`, at least [`MIN_INCREASE`] higher and at most 1.
    /// A decrease picks an existing edge and moves it to `p * r`.
    pub fn next_change(
        &mut self,
        graph: &UncertainGraph,
        direction: Direction,
    ) -> Result<EdgeChange, StorageError> {
        let n = graph.vertex_count();
        let candidates: Vec<(VertexId, VertexId)> = (0..n)
            .flat_map(|u| ((u + 1)..n).map(move |v| (VertexId::from(u), VertexId::from(v))))
            .filter(|&(u, v)| {
                let p = graph.probability(u, v);
                match direction {
                    Direction::Increase => p < 1.0,
                    Direction::Decrease => p > 0.0,
                }
            })
            .collect();
        let &(u, v) = candidates
            .choose(&mut self.rng)
            .ok_or_else(|| StorageError::NoCandidate {
                reason: format!("no vertex pair can {direction:?} in a graph of {n} vertices"),
            })?;

        let old = graph.probability(u, v);
        let r: f64 = self.rng.gen();
        let probability = match direction {
            Direction::Increase => (old + (1.0 - old) * r).max(old + MIN_INCREASE).min(1.0),
            Direction::Decrease => (old * r).max(0.0),
        };
        Ok(EdgeChange::new(u, v, probability))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ucore_core::ChangeKind;

    fn sample_graph() -> UncertainGraph {
        let mut g = UncertainGraph::new(5);
        g.set_probability(VertexId(0), VertexId(1), 0.5).unwrap();
        g.set_probability(VertexId(1), VertexId(2), 1.0).unwrap();
        g.set_probability(VertexId(3), VertexId(4), 0.9995).unwrap();
        g
    }

    #[test]
    fn same_seed_same_changes() {
        let g = sample_graph();
        let mut a = Perturber::new(42);
        let mut b = Perturber::new(42);
        for direction in [Direction::Increase, Direction::Decrease, Direction::Increase] {
            assert_eq!(
                a.next_change(&g, direction).unwrap(),
                b.next_change(&g, direction).unwrap()
            );
        }
    }

    #[test]
    fn increases_raise_and_stay_in_range() {
        let g = sample_graph();
        let mut perturber = Perturber::new(7);
        for _ in 0..200 {
            let change = perturber.next_change(&g, Direction::Increase).unwrap();
            let old = g.probability(change.u, change.v);
            assert!(change.probability <= 1.0);
            assert!(change.probability > old);
            assert_eq!(change.classify(&g).unwrap(), ChangeKind::Increase);
        }
    }

    #[test]
    fn decreases_hit_existing_edges() {
        let g = sample_graph();
        let mut perturber = Perturber::new(7);
        for _ in 0..200 {
            let change = perturber.next_change(&g, Direction::Decrease).unwrap();
            let old = g.probability(change.u, change.v);
            assert!(old > 0.0);
            assert!(change.probability >= 0.0 && change.probability < old);
        }
    }

    #[test]
    fn empty_graph_has_nothing_to_decrease() {
        let g = UncertainGraph::new(3);
        let mut perturber = Perturber::new(1);
        assert!(matches!(
            perturber.next_change(&g, Direction::Decrease),
            Err(StorageError::NoCandidate { .. })
        ));
        assert!(perturber
            .next_change(&UncertainGraph::new(1), Direction::Increase)
            .is_err());
    }
}
