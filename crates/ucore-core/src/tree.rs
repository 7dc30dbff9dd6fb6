//! Core forest built from one order's peeling trace.
//!
//! The trace is consumed from its end, so the most tightly held vertices
//! are grouped first. Each run of equal thresholds is split into connected
//! components (over vertices already placed plus the run itself), and each
//! component becomes a node. The node then claims the groups around it:
//! a neighboring root with a higher threshold is hung below it, and one at
//! the same or a lower threshold is merged into it. Every node's parent
//! therefore carries a threshold no higher than its own.
//!
//! Nodes live in an arena indexed by [`TreeNodeId`]. A merged node leaves
//! an `Absorbed` tombstone behind so ids stay stable. Top-level nodes hang
//! off a [`PendingNode`] sentinel rather than a parent link.

use std::collections::{BTreeMap, BTreeSet};
use std::time::Instant;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::CoreError;
use crate::graph::UncertainGraph;
use crate::id::{TreeNodeId, VertexId};
use crate::kcore::core_numbers;
use crate::peel::{peel_order, PeelTrace};
use crate::union_find::UnionFind;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoreTreeNode {
    pub id: TreeNodeId,
    pub order: usize,
    pub threshold: f64,
    pub members: BTreeSet<VertexId>,
    pub parent: Option<TreeNodeId>,
    pub children: BTreeSet<TreeNodeId>,
}

/// The sentinel every top-level node is attached to. It has no members and
/// no threshold, and it is the only node allowed several links upward.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PendingNode {
    attached: Vec<TreeNodeId>,
}

impl PendingNode {
    pub fn attached(&self) -> &[TreeNodeId] {
        &self.attached
    }

    fn attach(&mut self, id: TreeNodeId) {
        self.attached.push(id);
    }

    fn detach(&mut self, id: TreeNodeId) {
        self.attached.retain(|&r| r != id);
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Slot {
    Live(CoreTreeNode),
    Absorbed { into: TreeNodeId },
}

/// Nested, serializable rendering of one tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TreeView {
    pub id: TreeNodeId,
    pub threshold: f64,
    pub members: Vec<VertexId>,
    pub children: Vec<TreeView>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForestView {
    pub order: usize,
    pub roots: Vec<TreeView>,
}

#[derive(Debug, Clone)]
pub struct CoreForest {
    order: usize,
    sentinel: PendingNode,
    slots: Vec<Slot>,
}

impl CoreForest {
    pub fn new(order: usize) -> Self {
        CoreForest {
            order,
            sentinel: PendingNode::default(),
            slots: Vec::new(),
        }
    }

    /// Builds the forest for `trace`, reading adjacency from `graph`.
    pub fn build(graph: &UncertainGraph, trace: &PeelTrace) -> Result<Self, CoreError> {
        let n = graph.vertex_count();
        let mut eta = vec![0.0; n];
        for step in &trace.steps {
            graph.check_vertex(step.vertex)?;
            eta[step.vertex.index()] = step.threshold;
        }

        let mut forest = CoreForest::new(trace.order);
        let mut visited = vec![false; n];
        let mut end = trace.steps.len();
        while end > 0 {
            let threshold = trace.steps[end - 1].threshold;
            let mut start = end - 1;
            while start > 0 && trace.steps[start - 1].threshold == threshold {
                start -= 1;
            }
            let group: Vec<VertexId> = trace.steps[start..end]
                .iter()
                .rev()
                .map(|s| s.vertex)
                .collect();
            end = start;

            for component in components(graph, &group, &visited) {
                for v in &component {
                    visited[v.index()] = true;
                }
                let node = forest.attach(component, threshold);
                forest.claim_neighbors(graph, node, &eta, &visited)?;
            }
        }
        Ok(forest)
    }

    pub fn order(&self) -> usize {
        self.order
    }

    pub fn sentinel(&self) -> &PendingNode {
        &self.sentinel
    }

    /// Top-level nodes, in the order they were attached.
    pub fn roots(&self) -> &[TreeNodeId] {
        self.sentinel.attached()
    }

    pub fn node(&self, id: TreeNodeId) -> Result<&CoreTreeNode, CoreError> {
        match self.slots.get(id.index()) {
            Some(Slot::Live(node)) => Ok(node),
            _ => Err(CoreError::TreeNodeNotFound { id }),
        }
    }

    fn node_mut(&mut self, id: TreeNodeId) -> Result<&mut CoreTreeNode, CoreError> {
        match self.slots.get_mut(id.index()) {
            Some(Slot::Live(node)) => Ok(node),
            _ => Err(CoreError::TreeNodeNotFound { id }),
        }
    }

    /// Node a merged id was folded into, following chains of merges.
    pub fn resolve(&self, mut id: TreeNodeId) -> Result<TreeNodeId, CoreError> {
        for _ in 0..=self.slots.len() {
            match self.slots.get(id.index()) {
                Some(Slot::Live(_)) => return Ok(id),
                Some(Slot::Absorbed { into }) => id = *into,
                None => return Err(CoreError::TreeNodeNotFound { id }),
            }
        }
        Err(CoreError::InvariantViolation {
            reason: format!("merge chain from {id} does not end"),
        })
    }

    /// Live nodes in id order.
    pub fn nodes(&self) -> impl Iterator<Item = &CoreTreeNode> {
        self.slots.iter().filter_map(|slot| match slot {
            Slot::Live(node) => Some(node),
            Slot::Absorbed { .. } => None,
        })
    }

    pub fn node_count(&self) -> usize {
        self.nodes().count()
    }

    /// Node holding `v`, searched depth-first down from the sentinel.
    pub fn find_node(&self, v: VertexId) -> Option<TreeNodeId> {
        let mut stack: Vec<TreeNodeId> = self.roots().iter().rev().copied().collect();
        while let Some(id) = stack.pop() {
            let Ok(node) = self.node(id) else {
                continue;
            };
            if node.members.contains(&v) {
                return Some(id);
            }
            stack.extend(node.children.iter().rev().copied());
        }
        None
    }

    /// Ascends parent links from `id` to its tree's root.
    pub fn get_root(&self, id: TreeNodeId) -> Result<TreeNodeId, CoreError> {
        let mut current = id;
        for _ in 0..=self.slots.len() {
            match self.node(current)?.parent {
                Some(parent) => current = parent,
                None => return Ok(current),
            }
        }
        Err(CoreError::InvariantViolation {
            reason: format!("parent chain from {id} has a cycle"),
        })
    }

    fn attach(&mut self, members: Vec<VertexId>, threshold: f64) -> TreeNodeId {
        let id = TreeNodeId(self.slots.len() as u32);
        self.slots.push(Slot::Live(CoreTreeNode {
            id,
            order: self.order,
            threshold,
            members: members.into_iter().collect(),
            parent: None,
            children: BTreeSet::new(),
        }));
        self.sentinel.attach(id);
        id
    }

    /// Hangs root `child` below `parent`.
    fn link(&mut self, parent: TreeNodeId, child: TreeNodeId) -> Result<(), CoreError> {
        self.node_mut(child)?.parent = Some(parent);
        self.node_mut(parent)?.children.insert(child);
        self.sentinel.detach(child);
        Ok(())
    }

    /// Folds root `absorbed` into `into`: members and children move over,
    /// and the threshold becomes the larger of the two.
    fn absorb(&mut self, into: TreeNodeId, absorbed: TreeNodeId) -> Result<(), CoreError> {
        self.node(into)?;
        let slot = self
            .slots
            .get_mut(absorbed.index())
            .ok_or(CoreError::TreeNodeNotFound { id: absorbed })?;
        let taken = match std::mem::replace(slot, Slot::Absorbed { into }) {
            Slot::Live(node) => node,
            tombstone @ Slot::Absorbed { .. } => {
                *slot = tombstone;
                return Err(CoreError::TreeNodeNotFound { id: absorbed });
            }
        };
        for &child in &taken.children {
            self.node_mut(child)?.parent = Some(into);
        }
        let target = self.node_mut(into)?;
        target.members.extend(taken.members);
        target.children.extend(taken.children);
        target.threshold = target.threshold.max(taken.threshold);
        self.sentinel.detach(absorbed);
        Ok(())
    }

    /// Links or merges every tree adjacent to `node` whose vertices hold at
    /// least `node`'s threshold.
    fn claim_neighbors(
        &mut self,
        graph: &UncertainGraph,
        node: TreeNodeId,
        eta: &[f64],
        visited: &[bool],
    ) -> Result<(), CoreError> {
        let threshold = self.node(node)?.threshold;
        let neighbors: BTreeSet<VertexId> = self
            .node(node)?
            .members
            .iter()
            .flat_map(|&m| graph.neighbors(m).map(|(u, _)| u))
            .collect();
        for u in neighbors {
            if eta[u.index()] < threshold || !visited[u.index()] {
                continue;
            }
            if self.node(node)?.members.contains(&u) {
                continue;
            }
            let holder = self.find_node(u).ok_or_else(|| CoreError::InvariantViolation {
                reason: format!("placed vertex {u} is in no tree node"),
            })?;
            let root = self.get_root(holder)?;
            if root == node {
                continue;
            }
            if self.node(root)?.threshold > self.node(node)?.threshold {
                self.link(node, root)?;
            } else {
                self.absorb(node, root)?;
            }
        }
        Ok(())
    }

    /// Checks the forest shape: consistent parent and child links, roots
    /// exactly the parentless nodes, thresholds never higher at a parent,
    /// and no vertex in two nodes.
    pub fn validate(&self) -> Result<(), CoreError> {
        let broken = |reason: String| CoreError::InvariantViolation { reason };
        let mut seen = BTreeSet::new();
        for node in self.nodes() {
            match node.parent {
                Some(parent) => {
                    let p = self.node(parent)?;
                    if !p.children.contains(&node.id) {
                        return Err(broken(format!("{} is missing child {}", parent, node.id)));
                    }
                    if p.threshold > node.threshold {
                        return Err(broken(format!(
                            "parent {} threshold {} exceeds child {} threshold {}",
                            parent, p.threshold, node.id, node.threshold
                        )));
                    }
                    if self.roots().contains(&node.id) {
                        return Err(broken(format!("{} has a parent but is a root", node.id)));
                    }
                }
                None => {
                    if !self.roots().contains(&node.id) {
                        return Err(broken(format!("{} is detached", node.id)));
                    }
                }
            }
            for &child in &node.children {
                if self.node(child)?.parent != Some(node.id) {
                    return Err(broken(format!("{child} does not point back to {}", node.id)));
                }
            }
            for &v in &node.members {
                if !seen.insert(v) {
                    return Err(broken(format!("vertex {v} appears in two nodes")));
                }
            }
            self.get_root(node.id)?;
        }
        Ok(())
    }

    /// Every vertex placed in the forest.
    pub fn vertices(&self) -> BTreeSet<VertexId> {
        self.nodes()
            .flat_map(|node| node.members.iter().copied())
            .collect()
    }

    pub fn view(&self) -> Result<ForestView, CoreError> {
        let roots = self
            .roots()
            .iter()
            .map(|&root| self.view_tree(root))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(ForestView {
            order: self.order,
            roots,
        })
    }

    fn view_tree(&self, id: TreeNodeId) -> Result<TreeView, CoreError> {
        let node = self.node(id)?;
        let children = node
            .children
            .iter()
            .map(|&child| self.view_tree(child))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(TreeView {
            id,
            threshold: node.threshold,
            members: node.members.iter().copied().collect(),
            children,
        })
    }
}

/// Connected components of `group` over edges among placed vertices and
/// the group itself, ordered by first appearance in `group`.
fn components(graph: &UncertainGraph, group: &[VertexId], visited: &[bool]) -> Vec<Vec<VertexId>> {
    let mut candidate = visited.to_vec();
    for v in group {
        candidate[v.index()] = true;
    }
    let mut sets = UnionFind::new(graph.vertex_count());
    for x in graph.vertices().filter(|x| candidate[x.index()]) {
        for (y, _) in graph.neighbors(x) {
            if y > x && candidate[y.index()] {
                sets.union(x.index(), y.index());
            }
        }
    }

    let mut representatives: Vec<usize> = Vec::new();
    let mut components: Vec<Vec<VertexId>> = Vec::new();
    for &v in group {
        let root = sets.find(v.index());
        match representatives.iter().position(|&r| r == root) {
            Some(i) => components[i].push(v),
            None => {
                representatives.push(root);
                components.push(vec![v]);
            }
        }
    }
    components
}

/// One forest per order, from the deterministic degeneracy down to 1.
///
/// Order `k` peels only the vertices whose deterministic core number is at
/// least `k`; adjacency for grouping still comes from the full graph.
#[tracing::instrument(skip_all, fields(vertices = graph.vertex_count()))]
pub fn build_core_forests(graph: &UncertainGraph) -> Result<BTreeMap<usize, CoreForest>, CoreError> {
    let start = Instant::now();
    let core = core_numbers(graph);
    let max_core = core.iter().copied().max().unwrap_or(0);
    let mut forests = BTreeMap::new();
    for order in (1..=max_core).rev() {
        let keep: Vec<bool> = core.iter().map(|&c| c >= order).collect();
        let mut restricted = graph.clone();
        restricted.retain_vertices(&keep);
        let trace = peel_order(&restricted, order)?;
        let forest = CoreForest::build(graph, &trace)?;
        debug!(order, nodes = forest.node_count(), roots = forest.roots().len(), "built core forest");
        forests.insert(order, forest);
    }
    info!(
        orders = forests.len(),
        elapsed_ms = start.elapsed().as_millis() as u64,
        "built core forests"
    );
    Ok(forests)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::peel::PeelStep;

    fn graph(n: usize, edges: &[(u32, u32, f64)]) -> UncertainGraph {
        let edges: Vec<(VertexId, VertexId, f64)> = edges
            .iter()
            .map(|&(u, v, p)| (VertexId(u), VertexId(v), p))
            .collect();
        UncertainGraph::from_edges(n, &edges).unwrap()
    }

    fn trace(order: usize, steps: &[(u32, f64)]) -> PeelTrace {
        PeelTrace {
            order,
            steps: steps
                .iter()
                .map(|&(v, t)| PeelStep {
                    vertex: VertexId(v),
                    probability: t,
                    threshold: t,
                })
                .collect(),
        }
    }

    fn members(forest: &CoreForest, id: TreeNodeId) -> Vec<u32> {
        forest.node(id).unwrap().members.iter().map(|v| v.0).collect()
    }

    #[test]
    fn empty_trace_gives_empty_forest() {
        let g = graph(3, &[]);
        let forest = CoreForest::build(&g, &trace(1, &[])).unwrap();
        assert!(forest.roots().is_empty());
        assert_eq!(forest.node_count(), 0);
        forest.validate().unwrap();
    }

    #[test]
    fn higher_threshold_group_hangs_below() {
        // 0 - 1 - 2 with 1 and 2 held tighter than 0.
        let g = graph(3, &[(0, 1, 0.5), (1, 2, 0.9)]);
        let forest = CoreForest::build(&g, &trace(1, &[(0, 0.5), (1, 0.9), (2, 0.9)])).unwrap();
        forest.validate().unwrap();

        assert_eq!(forest.roots().len(), 1);
        let root = forest.roots()[0];
        assert_eq!(members(&forest, root), vec![0]);
        let top = forest.node(root).unwrap();
        assert_eq!(top.children.len(), 1);
        let child = *top.children.iter().next().unwrap();
        assert_eq!(members(&forest, child), vec![1, 2]);
        assert_eq!(forest.find_node(VertexId(2)), Some(child));
        assert_eq!(forest.get_root(child).unwrap(), root);
    }

    #[test]
    fn disconnected_groups_stay_separate_roots() {
        let g = graph(4, &[(0, 1, 0.7), (2, 3, 0.7)]);
        let forest = CoreForest::build(&g, &trace(1, &[(0, 0.7), (1, 0.7), (2, 0.7), (3, 0.7)])).unwrap();
        forest.validate().unwrap();
        assert_eq!(forest.roots().len(), 2);
        assert_eq!(members(&forest, forest.roots()[0]), vec![2, 3]);
        assert_eq!(members(&forest, forest.roots()[1]), vec![0, 1]);
    }

    #[test]
    fn equal_threshold_root_is_merged() {
        // Path 1 - 0 - 2. Vertex 2 is placed first at 0.5, vertex 1 at 0.9,
        // then 0 at 0.5 links 1's node below it and absorbs 2's node.
        let g = graph(3, &[(0, 1, 0.6), (0, 2, 0.6)]);
        let forest = CoreForest::build(&g, &trace(1, &[(0, 0.5), (1, 0.9), (2, 0.5)])).unwrap();
        forest.validate().unwrap();

        assert_eq!(forest.roots().len(), 1);
        let root = forest.roots()[0];
        assert_eq!(members(&forest, root), vec![0, 2]);
        assert_eq!(forest.node_count(), 2);
        assert_eq!(forest.find_node(VertexId(2)), Some(root));

        let absorbed = TreeNodeId(0);
        assert!(matches!(
            forest.node(absorbed),
            Err(CoreError::TreeNodeNotFound { .. })
        ));
        assert_eq!(forest.resolve(absorbed).unwrap(), root);
    }

    #[test]
    fn absorb_moves_children_and_keeps_max_threshold() {
        let mut forest = CoreForest::new(1);
        let a = forest.attach(vec![VertexId(1), VertexId(2)], 0.6);
        let c = forest.attach(vec![VertexId(3)], 0.8);
        forest.link(a, c).unwrap();
        let b = forest.attach(vec![VertexId(0)], 0.4);
        forest.absorb(b, a).unwrap();

        assert_eq!(forest.roots(), &[b]);
        let merged = forest.node(b).unwrap();
        assert_eq!(merged.threshold, 0.6);
        assert_eq!(members(&forest, b), vec![0, 1, 2]);
        assert!(merged.children.contains(&c));
        assert_eq!(forest.node(c).unwrap().parent, Some(b));
        assert!(forest.absorb(b, a).is_err());
        forest.validate().unwrap();
    }

    #[test]
    fn validate_catches_inverted_thresholds() {
        let mut forest = CoreForest::new(1);
        let low = forest.attach(vec![VertexId(0)], 0.3);
        let high = forest.attach(vec![VertexId(1)], 0.7);
        forest.link(high, low).unwrap();
        assert!(forest.validate().is_err());
    }

    #[test]
    fn view_nests_children() {
        let g = graph(3, &[(0, 1, 0.5), (1, 2, 0.9)]);
        let forest = CoreForest::build(&g, &trace(1, &[(0, 0.5), (1, 0.9), (2, 0.9)])).unwrap();
        let view = forest.view().unwrap();
        assert_eq!(view.order, 1);
        assert_eq!(view.roots.len(), 1);
        assert_eq!(view.roots[0].children[0].members, vec![VertexId(1), VertexId(2)]);
        let json = serde_json::to_value(&view).unwrap();
        assert_eq!(json["roots"][0]["threshold"], 0.5);
    }

    #[test]
    fn forests_cover_each_core_level() {
        let g = graph(
            5,
            &[
                (0, 1, 0.9),
                (0, 2, 0.9),
                (1, 2, 0.9),
                (2, 3, 0.4),
                (3, 4, 0.8),
            ],
        );
        let forests = build_core_forests(&g).unwrap();
        assert_eq!(forests.keys().copied().collect::<Vec<_>>(), vec![1, 2]);
        let top = &forests[&2];
        top.validate().unwrap();
        assert_eq!(
            top.vertices(),
            [0, 1, 2].into_iter().map(VertexId).collect::<BTreeSet<_>>()
        );
        let bottom = &forests[&1];
        bottom.validate().unwrap();
        assert_eq!(bottom.vertices().len(), 5);
    }
}
