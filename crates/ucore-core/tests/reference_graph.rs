//! Decomposition, maintenance, and forests on the ten-vertex reference
//! graph: a dense cluster {1, 2, 3, 4} joined through 4 - 5 - 6 to a
//! star-like cluster {6, 7, 8, 9}, with 0 hanging off 1 and 2.

use ucore_core::{
    build_core_forests, build_index, core_numbers, k_eta_core, peel_order, update_index, CoreConfig,
    EdgeChange, TreeView, UncertainGraph, VertexId,
};

const TOLERANCE: f64 = 1e-9;

fn reference_graph() -> UncertainGraph {
    UncertainGraph::from_matrix(vec![
        vec![0.0, 0.5, 0.2, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0],
        vec![0.5, 0.0, 0.8, 0.2, 0.6, 0.0, 0.0, 0.0, 0.0, 0.0],
        vec![0.2, 0.8, 0.0, 0.5, 0.8, 0.0, 0.0, 0.0, 0.0, 0.0],
        vec![0.0, 0.2, 0.5, 0.0, 0.4, 0.0, 0.0, 0.0, 0.0, 0.0],
        vec![0.0, 0.6, 0.8, 0.4, 0.0, 0.2, 0.0, 0.0, 0.0, 0.0],
        vec![0.0, 0.0, 0.0, 0.0, 0.2, 0.0, 0.5, 0.0, 0.0, 0.0],
        vec![0.0, 0.0, 0.0, 0.0, 0.0, 0.5, 0.0, 0.8, 0.5, 0.8],
        vec![0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.8, 0.0, 0.0, 0.0],
        vec![0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.5, 0.0, 0.0, 0.8],
        vec![0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.8, 0.0, 0.8, 0.0],
    ])
    .expect("reference matrix is valid")
}

fn assert_close(actual: &[f64], expected: &[f64], context: &str) {
    assert_eq!(actual.len(), expected.len(), "{context}: length");
    for (i, (a, e)) in actual.iter().zip(expected).enumerate() {
        assert!((a - e).abs() < TOLERANCE, "{context}[{i}]: {a} vs {e}");
    }
}

fn ids(raw: &[u32]) -> Vec<VertexId> {
    raw.iter().copied().map(VertexId).collect()
}

#[test]
fn threshold_sequences() {
    let index = build_index(&reference_graph(), &CoreConfig::default()).unwrap();
    let expected: [&[f64]; 10] = [
        &[0.6, 0.1],
        &[0.92, 0.48, 0.04],
        &[0.92, 0.48, 0.04],
        &[0.76, 0.3, 0.04],
        &[0.92, 0.48, 0.04],
        &[0.6, 0.1],
        &[0.9, 0.4],
        &[0.8],
        &[0.9, 0.4],
        &[0.9, 0.4],
    ];
    for (v, want) in expected.iter().enumerate() {
        assert_close(index.sequence(VertexId::from(v)), want, &format!("v{v}"));
    }
    assert_eq!(index.max_order(), 3);
}

#[test]
fn tight_star_outranks_loose_chain_at_order_one() {
    let index = build_index(&reference_graph(), &CoreConfig::default()).unwrap();
    for star in [6u32, 7, 8, 9] {
        for chain in [0u32, 3] {
            assert!(
                index.threshold(VertexId(star), 1) > index.threshold(VertexId(chain), 1),
                "v{star} should be held tighter than v{chain}"
            );
        }
    }
}

#[test]
fn peel_traces() {
    let g = reference_graph();
    let first = peel_order(&g, 1).unwrap();
    assert_eq!(first.elimination_order(), ids(&[0, 5, 3, 7, 6, 8, 9, 1, 2, 4]));
    assert_close(
        &first.steps.iter().map(|s| s.threshold).collect::<Vec<_>>(),
        &[0.6, 0.6, 0.76, 0.8, 0.9, 0.9, 0.9, 0.92, 0.92, 0.92],
        "order 1",
    );

    let second = peel_order(&g, 2).unwrap();
    assert_eq!(second.elimination_order(), ids(&[7, 0, 5, 3, 6, 8, 9, 1, 2, 4]));
    assert_close(
        &second.steps.iter().map(|s| s.threshold).collect::<Vec<_>>(),
        &[0.0, 0.1, 0.1, 0.3, 0.4, 0.4, 0.4, 0.48, 0.48, 0.48],
        "order 2",
    );
}

#[test]
fn raising_edge_two_three_updates_only_the_dense_cluster() {
    let g = reference_graph();
    let config = CoreConfig::default();
    let index = build_index(&g, &config).unwrap();
    let change = EdgeChange::new(VertexId(2), VertexId(3), 0.8);
    let outcome = update_index(&g, &index, &change, &config).unwrap();

    assert_eq!(outcome.orders.len(), 3);
    assert_eq!(outcome.orders[0].impact, ids(&[3, 1, 2, 4]));
    assert_eq!(outcome.orders[1].impact, ids(&[3, 1, 2, 4]));
    assert_eq!(outcome.orders[2].impact, ids(&[2, 1, 3, 4]));

    assert_close(
        &outcome.orders[0].thresholds,
        &[0.6, 0.92, 0.92, 0.904, 0.92, 0.6, 0.9, 0.8, 0.9, 0.9],
        "order 1",
    );
    assert_close(
        &outcome.orders[1].thresholds,
        &[0.1, 0.48, 0.48, 0.432, 0.48, 0.1, 0.4, 0.0, 0.4, 0.4],
        "order 2",
    );
    assert_close(
        &outcome.orders[2].thresholds,
        &[0.0, 0.064, 0.064, 0.064, 0.064, 0.0, 0.0, 0.0, 0.0, 0.0],
        "order 3",
    );

    for order in &outcome.orders {
        let before = index.column(order.order);
        for v in 0..10 {
            if !order.impact.contains(&VertexId::from(v)) {
                assert_eq!(order.thresholds[v], before[v], "order {} v{v}", order.order);
            }
        }
    }

    let rebuilt = build_index(&outcome.graph, &config).unwrap();
    for v in 0..10 {
        let v = VertexId::from(v);
        assert_close(outcome.index.sequence(v), rebuilt.sequence(v), &format!("{v}"));
    }
    assert_eq!(outcome.graph.probability(VertexId(3), VertexId(2)), 0.8);
}

#[test]
fn deterministic_core_numbers() {
    assert_eq!(core_numbers(&reference_graph()), vec![2, 3, 3, 3, 3, 2, 2, 1, 2, 2]);
}

/// `(members, threshold, children)` with children sorted by smallest member.
#[derive(Debug, PartialEq)]
struct Shape(Vec<u32>, f64, Vec<Shape>);

fn shape(view: &TreeView) -> Shape {
    let mut children: Vec<Shape> = view.children.iter().map(shape).collect();
    children.sort_by_key(|c| c.0[0]);
    let threshold = (view.threshold * 1e6).round() / 1e6;
    Shape(view.members.iter().map(|v| v.0).collect(), threshold, children)
}

#[test]
fn core_forests() {
    let forests = build_core_forests(&reference_graph()).unwrap();
    assert_eq!(forests.keys().copied().collect::<Vec<_>>(), vec![1, 2, 3]);
    for forest in forests.values() {
        forest.validate().unwrap();
    }

    let third = forests[&3].view().unwrap();
    assert_eq!(third.roots.len(), 1);
    assert_eq!(shape(&third.roots[0]), Shape(vec![1, 2, 3, 4], 0.04, vec![]));

    let second = forests[&2].view().unwrap();
    assert_eq!(second.roots.len(), 1);
    assert_eq!(
        shape(&second.roots[0]),
        Shape(
            vec![0, 5],
            0.1,
            vec![
                Shape(vec![3], 0.3, vec![Shape(vec![1, 2, 4], 0.48, vec![])]),
                Shape(vec![6, 8, 9], 0.4, vec![]),
            ]
        )
    );

    let first = forests[&1].view().unwrap();
    assert_eq!(first.roots.len(), 1);
    assert_eq!(
        shape(&first.roots[0]),
        Shape(
            vec![0, 5],
            0.6,
            vec![
                Shape(vec![3], 0.76, vec![Shape(vec![1, 2, 4], 0.92, vec![])]),
                Shape(vec![7], 0.8, vec![Shape(vec![6, 8, 9], 0.9, vec![])]),
            ]
        )
    );
}

#[test]
fn forest_lookups() {
    let forests = build_core_forests(&reference_graph()).unwrap();
    let forest = &forests[&1];
    let holder = forest.find_node(VertexId(8)).unwrap();
    let node = forest.node(holder).unwrap();
    assert!(node.members.contains(&VertexId(8)));
    assert_eq!(node.order, 1);
    let root = forest.get_root(holder).unwrap();
    assert_eq!(forest.roots(), &[root]);
    assert!(forest.node(root).unwrap().members.contains(&VertexId(0)));
    assert_eq!(forest.find_node(VertexId(42)), None);
}

#[test]
fn query_at_order_two() {
    let g = reference_graph();
    let index = build_index(&g, &CoreConfig::default()).unwrap();
    let result = k_eta_core(&g, &index, 2, 0.45).unwrap();
    assert_eq!(result.vertices, ids(&[1, 2, 4]));
    assert_eq!(result.edges.len(), 3);
}
