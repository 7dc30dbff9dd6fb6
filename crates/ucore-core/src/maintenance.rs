//! Incremental maintenance of the threshold index after one edge change.
//!
//! For each order `k` the change is absorbed locally:
//!
//! 1. `u` is the endpoint with the lower stored order-`k` threshold.
//! 2. The impact set is found by BFS from `u` over the pre-change graph
//!    (plus the changed pair itself). For an increase, only vertices whose
//!    stored threshold is at least `u`'s are admitted: anything lower is
//!    peeled before `u` in every realization and cannot move.
//! 3. The post-change graph is cut down to edges inside the impact set and
//!    peeled with the same engine as the full build, starting from `u`'s
//!    stored threshold.
//! 4. An increase stops as soon as every impact vertex that has not been
//!    popped yet already stores a threshold at or above `upper_bound`. The
//!    bound starts at `u`'s threshold plus [`CoreConfig::bound_increment`]
//!    and only moves up when a confirmed threshold clears it by more than
//!    [`CoreConfig::maintenance_epsilon`].
//!
//! A decrease can also demote vertices below `u`, so its impact set is
//! `u`'s whole connected component, peeled from 0 without early exit.

use std::collections::VecDeque;
use std::time::Instant;

use indexmap::IndexSet;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::CoreConfig;
use crate::error::CoreError;
use crate::graph::UncertainGraph;
use crate::id::VertexId;
use crate::peel::{PeelState, ThresholdIndex};

/// New probability for the edge `{u, v}`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EdgeChange {
    pub u: VertexId,
    pub v: VertexId,
    pub probability: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    Increase,
    Decrease,
    Unchanged,
}

impl EdgeChange {
    pub fn new(u: VertexId, v: VertexId, probability: f64) -> Self {
        EdgeChange { u, v, probability }
    }

    /// Checks the change against `graph` and classifies it.
    ///
    /// A pair with probability 0 is an insertion when the new probability is
    /// positive; changing an absent edge to 0 is [`CoreError::EdgeNotFound`].
    pub fn classify(&self, graph: &UncertainGraph) -> Result<ChangeKind, CoreError> {
        graph.check_vertex(self.u)?;
        graph.check_vertex(self.v)?;
        if self.u == self.v {
            return Err(CoreError::validation(format!("self-loop on vertex {}", self.u)));
        }
        if !self.probability.is_finite() || !(0.0..=1.0).contains(&self.probability) {
            return Err(CoreError::validation(format!(
                "probability {} is outside [0, 1]",
                self.probability
            )));
        }
        let old = graph.probability(self.u, self.v);
        if old == 0.0 && self.probability == 0.0 {
            return Err(CoreError::EdgeNotFound {
                u: self.u,
                v: self.v,
            });
        }
        Ok(if self.probability > old {
            ChangeKind::Increase
        } else if self.probability < old {
            ChangeKind::Decrease
        } else {
            ChangeKind::Unchanged
        })
    }

    /// The endpoint of the changed pair opposite `x`, if `x` is one.
    fn partner(&self, x: VertexId) -> Option<VertexId> {
        if x == self.u {
            Some(self.v)
        } else if x == self.v {
            Some(self.u)
        } else {
            None
        }
    }
}

/// Result of maintaining one order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderUpdate {
    pub order: usize,
    pub kind: ChangeKind,
    /// Dense order-`order` thresholds after the change.
    pub thresholds: Vec<f64>,
    /// Impact set in BFS discovery order.
    pub impact: Vec<VertexId>,
    /// Vertices popped by the bounded peel, in pop order.
    pub updated: Vec<VertexId>,
    /// The order was skipped because `u` already fell out at the previous
    /// order.
    pub short_circuited: bool,
}

/// Post-change graph and index plus per-order reports.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaintenanceOutcome {
    pub graph: UncertainGraph,
    pub index: ThresholdIndex,
    pub orders: Vec<OrderUpdate>,
}

/// BFS from `u`; with a `floor`, only vertices storing a threshold at least
/// `floor` are admitted.
fn impact_set(
    graph: &UncertainGraph,
    column: &[f64],
    u: VertexId,
    change: &EdgeChange,
    floor: Option<f64>,
) -> IndexSet<VertexId> {
    let mut impact = IndexSet::new();
    impact.insert(u);
    let mut queue = VecDeque::from([u]);
    while let Some(x) = queue.pop_front() {
        let neighbors = graph
            .neighbors(x)
            .map(|(y, _)| y)
            .chain(change.partner(x));
        for y in neighbors {
            let admitted = floor.map_or(true, |f| column[y.index()] >= f);
            if admitted && impact.insert(y) {
                queue.push_back(y);
            }
        }
    }
    impact
}

/// Every impact vertex not yet popped already stores a threshold at or
/// above `upper_bound`.
fn bound_reached(column: &[f64], impact: &IndexSet<VertexId>, popped: &[bool], upper_bound: f64) -> bool {
    impact
        .iter()
        .filter(|v| !popped[v.index()])
        .all(|v| column[v.index()] >= upper_bound)
}

/// Raises the bound to `confirmed` only when it clears the bound by more
/// than `epsilon`.
fn revise_upper_bound(upper_bound: f64, confirmed: f64, epsilon: f64) -> f64 {
    if confirmed - upper_bound > epsilon {
        confirmed
    } else {
        upper_bound
    }
}

/// Maintains the order-`order` column of `index` for `change` applied to
/// `graph` (the pre-change graph).
pub fn update_order(
    graph: &UncertainGraph,
    index: &ThresholdIndex,
    order: usize,
    change: &EdgeChange,
    config: &CoreConfig,
) -> Result<OrderUpdate, CoreError> {
    if order == 0 {
        return Err(CoreError::validation("order must be >= 1"));
    }
    if index.vertex_count() != graph.vertex_count() {
        return Err(CoreError::validation(format!(
            "index covers {} vertices but graph has {}",
            index.vertex_count(),
            graph.vertex_count()
        )));
    }
    let kind = change.classify(graph)?;
    let column = index.column(order);
    let u = if column[change.u.index()] <= column[change.v.index()] {
        change.u
    } else {
        change.v
    };

    let untouched = |short_circuited: bool| OrderUpdate {
        order,
        kind,
        thresholds: column.clone(),
        impact: Vec::new(),
        updated: Vec::new(),
        short_circuited,
    };
    if kind == ChangeKind::Unchanged {
        return Ok(untouched(false));
    }
    if order >= 3 && index.threshold(u, order - 1).unwrap_or(0.0) < config.peel_epsilon {
        debug!(order, u = %u, "lower endpoint left at previous order; skipping");
        return Ok(untouched(true));
    }

    let floor = match kind {
        ChangeKind::Increase => Some(column[u.index()]),
        _ => None,
    };
    let impact = impact_set(graph, &column, u, change, floor);

    let mut work = graph.clone();
    work.set_probability(change.u, change.v, change.probability)?;
    let mut keep = vec![false; graph.vertex_count()];
    for v in &impact {
        keep[v.index()] = true;
    }
    work.retain_vertices(&keep);

    let mut thresholds = column.clone();
    let mut popped = vec![false; graph.vertex_count()];
    let mut updated = Vec::with_capacity(impact.len());
    let mut upper_bound = column[u.index()] + config.bound_increment;
    let mut state = PeelState::new(&mut work, impact.iter().copied(), order, floor.unwrap_or(0.0));
    while !state.is_exhausted() {
        if kind == ChangeKind::Increase && bound_reached(&column, &impact, &popped, upper_bound) {
            break;
        }
        let step = state.step()?;
        popped[step.vertex.index()] = true;
        updated.push(step.vertex);
        if step.threshold > config.maintenance_epsilon {
            upper_bound = revise_upper_bound(upper_bound, step.threshold, config.maintenance_epsilon);
            thresholds[step.vertex.index()] = step.threshold;
        } else if kind == ChangeKind::Decrease {
            thresholds[step.vertex.index()] = 0.0;
        }
    }
    // A full build never records values at or below peel_epsilon.
    for t in thresholds.iter_mut().filter(|t| **t <= config.peel_epsilon) {
        *t = 0.0;
    }
    debug!(
        order,
        impact = impact.len(),
        updated = updated.len(),
        "maintained order"
    );

    Ok(OrderUpdate {
        order,
        kind,
        thresholds,
        impact: impact.into_iter().collect(),
        updated,
        short_circuited: false,
    })
}

/// Applies `change` to `graph` and maintains every order of `index` up to
/// its current maximum, plus any order an increase newly opens.
#[tracing::instrument(skip_all, fields(u = %change.u, v = %change.v, p = change.probability))]
pub fn update_index(
    graph: &UncertainGraph,
    index: &ThresholdIndex,
    change: &EdgeChange,
    config: &CoreConfig,
) -> Result<MaintenanceOutcome, CoreError> {
    config.validate()?;
    let start = Instant::now();
    let kind = change.classify(graph)?;
    let mut next_graph = graph.clone();
    next_graph.set_probability(change.u, change.v, change.probability)?;

    let max_order = index.max_order();
    let mut orders = Vec::with_capacity(max_order + 1);
    for order in 1..=max_order {
        orders.push(update_order(graph, index, order, change, config)?);
    }
    // An increase can lift the endpoints into an order the index never
    // reached; keep going until an order records nothing.
    if kind == ChangeKind::Increase {
        for order in (max_order + 1).. {
            let update = update_order(graph, index, order, change, config)?;
            if !update.thresholds.iter().any(|&t| t > config.peel_epsilon) {
                break;
            }
            orders.push(update);
        }
    }
    let columns: Vec<Vec<f64>> = orders.iter().map(|o| o.thresholds.clone()).collect();
    let next_index = ThresholdIndex::from_columns(graph.vertex_count(), &columns, config.peel_epsilon);

    info!(
        orders = orders.len(),
        elapsed_ms = start.elapsed().as_millis() as u64,
        "maintained threshold index"
    );
    Ok(MaintenanceOutcome {
        graph: next_graph,
        index: next_index,
        orders,
    })
}
