//! Core index builder: probabilistic peeling, one round per order.
//!
//! A round at order `k` starts from a private copy of the graph, scores
//! every vertex that has an edge by its k-probability, and repeatedly pops
//! the weakest one. The running maximum of popped probabilities is the
//! threshold recorded for the popped vertex. Removing a vertex zeroes its
//! edges in both directions and rescores the survivors with a full queue
//! rebuild, because an edge removal shifts probabilities of every
//! neighbor at once.
//!
//! Rounds continue for `k = 1, 2, ...` until a round records nothing above
//! [`CoreConfig::peel_epsilon`].

use std::cmp::Ordering;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::CoreConfig;
use crate::error::CoreError;
use crate::graph::UncertainGraph;
use crate::heap::{weakest_first, PriorityQueue, Scored};
use crate::id::VertexId;
use crate::probability::k_probability_unchecked;

/// One pop of a peeling round.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PeelStep {
    pub vertex: VertexId,
    /// The vertex's k-probability when it was popped.
    pub probability: f64,
    /// Running maximum of popped probabilities, including this one.
    pub threshold: f64,
}

/// Elimination trace of one round: steps in pop order (first-eliminated
/// first).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeelTrace {
    pub order: usize,
    pub steps: Vec<PeelStep>,
}

impl PeelTrace {
    pub fn elimination_order(&self) -> Vec<VertexId> {
        self.steps.iter().map(|s| s.vertex).collect()
    }

    /// Per-vertex threshold over `vertex_count` vertices; vertices the round
    /// never popped get 0.
    pub fn thresholds(&self, vertex_count: usize) -> Vec<f64> {
        let mut out = vec![0.0; vertex_count];
        for step in &self.steps {
            if let Some(slot) = out.get_mut(step.vertex.index()) {
                *slot = step.threshold;
            }
        }
        out
    }

    pub fn max_threshold(&self) -> f64 {
        self.steps.last().map(|s| s.threshold).unwrap_or(0.0)
    }
}

/// Per-vertex ThresholdSequences. Entry `k - 1` of a vertex's sequence is
/// its order-`k` threshold; a vertex that drops out at order `k` has a
/// sequence of length `k - 1`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThresholdIndex {
    sequences: Vec<Vec<f64>>,
}

impl ThresholdIndex {
    pub fn from_sequences(sequences: Vec<Vec<f64>>) -> Self {
        ThresholdIndex { sequences }
    }

    /// Reassembles sequences from dense per-order columns (`columns[k - 1][v]`).
    /// A vertex's sequence ends at its first entry at or below `epsilon`.
    pub fn from_columns(vertex_count: usize, columns: &[Vec<f64>], epsilon: f64) -> Self {
        let sequences = (0..vertex_count)
            .map(|v| {
                columns
                    .iter()
                    .map(|column| column.get(v).copied().unwrap_or(0.0))
                    .take_while(|&t| t > epsilon)
                    .collect()
            })
            .collect();
        ThresholdIndex { sequences }
    }

    pub fn vertex_count(&self) -> usize {
        self.sequences.len()
    }

    pub fn sequences(&self) -> &[Vec<f64>] {
        &self.sequences
    }

    /// Sequence of `v`; empty for unknown vertices.
    pub fn sequence(&self, v: VertexId) -> &[f64] {
        self.sequences.get(v.index()).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Order-`order` threshold of `v`, if the vertex reaches that order.
    pub fn threshold(&self, v: VertexId, order: usize) -> Option<f64> {
        order
            .checked_sub(1)
            .and_then(|i| self.sequence(v).get(i).copied())
    }

    /// Largest order any vertex reaches (0 for an empty index).
    pub fn max_order(&self) -> usize {
        self.sequences.iter().map(Vec::len).max().unwrap_or(0)
    }

    /// Dense order-`order` column: the threshold of every vertex, 0 where
    /// the vertex does not reach the order.
    pub fn column(&self, order: usize) -> Vec<f64> {
        (0..self.sequences.len())
            .map(|v| self.threshold(VertexId::from(v), order).unwrap_or(0.0))
            .collect()
    }

    /// Vertices whose order-`order` threshold is at least `eta`.
    pub fn members(&self, order: usize, eta: f64) -> Vec<VertexId> {
        (0..self.sequences.len())
            .map(VertexId::from)
            .filter(|&v| self.threshold(v, order).is_some_and(|t| t >= eta))
            .collect()
    }
}

/// A peeling pass over a working graph it borrows exclusively.
///
/// Shared by the index builder (all vertices with edges, threshold from 0)
/// and by maintenance (an impact set, threshold from a stored value).
pub(crate) struct PeelState<'w> {
    work: &'w mut UncertainGraph,
    alive: Vec<bool>,
    remaining: usize,
    queue: PriorityQueue<Scored, fn(&Scored, &Scored) -> Ordering>,
    order: usize,
    threshold: f64,
}

impl<'w> PeelState<'w> {
    pub(crate) fn new(
        work: &'w mut UncertainGraph,
        members: impl IntoIterator<Item = VertexId>,
        order: usize,
        initial_threshold: f64,
    ) -> Self {
        let mut alive = vec![false; work.vertex_count()];
        let mut remaining = 0;
        for v in members {
            if let Some(slot) = alive.get_mut(v.index()) {
                if !*slot {
                    *slot = true;
                    remaining += 1;
                }
            }
        }
        let queue = Self::score(&*work, &alive, order);
        PeelState {
            work,
            alive,
            remaining,
            queue,
            order,
            threshold: initial_threshold,
        }
    }

    fn score(
        work: &UncertainGraph,
        alive: &[bool],
        order: usize,
    ) -> PriorityQueue<Scored, fn(&Scored, &Scored) -> Ordering> {
        let items: Vec<Scored> = alive
            .iter()
            .enumerate()
            .filter(|(_, &a)| a)
            .map(|(v, _)| {
                let v = VertexId::from(v);
                (k_probability_unchecked(work, v, order), v)
            })
            .collect();
        PriorityQueue::build(items, weakest_first as fn(&Scored, &Scored) -> Ordering)
    }

    pub(crate) fn is_exhausted(&self) -> bool {
        self.remaining == 0
    }

    /// Pops the weakest live vertex, records the running threshold, removes
    /// its edges, and rescores the survivors.
    pub(crate) fn step(&mut self) -> Result<PeelStep, CoreError> {
        let (probability, vertex) = self.queue.pop()?;
        self.threshold = self.threshold.max(probability);
        self.alive[vertex.index()] = false;
        self.remaining -= 1;
        if self.work.degree(vertex) > 0 {
            self.work.remove_vertex_edges(vertex);
            self.queue = Self::score(&*self.work, &self.alive, self.order);
        }
        Ok(PeelStep {
            vertex,
            probability,
            threshold: self.threshold,
        })
    }
}

/// Runs peeling rounds against one base graph, reusing a single working
/// buffer across rounds.
pub struct Peeler<'g> {
    base: &'g UncertainGraph,
    buffer: UncertainGraph,
}

impl<'g> Peeler<'g> {
    pub fn new(base: &'g UncertainGraph) -> Self {
        Peeler {
            base,
            buffer: base.clone(),
        }
    }

    /// One full round at `order`. Every vertex with at least one edge in the
    /// base graph is popped; vertices stranded without edges near the end of
    /// the round score 0 and take the running threshold.
    pub fn peel_order(&mut self, order: usize) -> Result<PeelTrace, CoreError> {
        if order == 0 {
            return Err(CoreError::validation("order must be >= 1"));
        }
        self.buffer.clone_from(self.base);
        let members: Vec<VertexId> = self
            .base
            .vertices()
            .filter(|&v| self.base.degree(v) > 0)
            .collect();
        let mut steps = Vec::with_capacity(members.len());
        let mut state = PeelState::new(&mut self.buffer, members, order, 0.0);
        while !state.is_exhausted() {
            steps.push(state.step()?);
        }
        Ok(PeelTrace { order, steps })
    }
}

/// One peeling round of `graph` at `order`.
pub fn peel_order(graph: &UncertainGraph, order: usize) -> Result<PeelTrace, CoreError> {
    Peeler::new(graph).peel_order(order)
}

/// Builds the full threshold index of `graph`.
#[tracing::instrument(skip_all, fields(vertices = graph.vertex_count()))]
pub fn build_index(graph: &UncertainGraph, config: &CoreConfig) -> Result<ThresholdIndex, CoreError> {
    config.validate()?;
    let start = Instant::now();
    let mut sequences: Vec<Vec<f64>> = vec![Vec::new(); graph.vertex_count()];
    let mut peeler = Peeler::new(graph);
    let mut order = 0;
    loop {
        order += 1;
        let trace = peeler.peel_order(order)?;
        let mut recorded = 0usize;
        for step in trace.steps.iter().filter(|s| s.threshold > config.peel_epsilon) {
            let sequence = &mut sequences[step.vertex.index()];
            if sequence.len() + 1 == order {
                sequence.push(step.threshold);
                recorded += 1;
            } else {
                warn!(vertex = %step.vertex, order, "threshold above epsilon after vertex dropped out");
            }
        }
        debug!(order, recorded, "peeled order");
        if recorded == 0 {
            break;
        }
    }
    info!(
        max_order = order - 1,
        elapsed_ms = start.elapsed().as_millis() as u64,
        "built threshold index"
    );
    Ok(ThresholdIndex { sequences })
}
