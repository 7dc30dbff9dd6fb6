//! Random perturbations always move an edge in the requested direction and
//! stay inside [0, 1].

use proptest::prelude::*;
use ucore_core::{ChangeKind, UncertainGraph, VertexId};
use ucore_storage::{Direction, Perturber};

fn arb_graph() -> impl Strategy<Value = UncertainGraph> {
    (2usize..=6).prop_flat_map(|n| {
        let pairs = n * (n - 1) / 2;
        prop::collection::vec(prop::option::weighted(0.7, 0.05f64..=1.0), pairs).prop_map(
            move |probs| {
                let mut g = UncertainGraph::new(n);
                let mut it = probs.into_iter();
                for u in 0..n {
                    for v in (u + 1)..n {
                        if let Some(Some(p)) = it.next() {
                            g.set_probability(VertexId::from(u), VertexId::from(v), p)
                                .unwrap();
                        }
                    }
                }
                g
            },
        )
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(128))]

    #[test]
    fn increases_raise_one_pair(g in arb_graph(), seed in any::<u64>()) {
        let mut perturber = Perturber::new(seed);
        prop_assume!(g.edges().iter().filter(|e| e.2 >= 1.0).count() < g.vertex_count() * (g.vertex_count() - 1) / 2);
        let change = perturber.next_change(&g, Direction::Increase).unwrap();
        prop_assert!(change.probability <= 1.0);
        prop_assert!(change.probability > g.probability(change.u, change.v));
        prop_assert_eq!(change.classify(&g).unwrap(), ChangeKind::Increase);
    }

    #[test]
    fn decreases_lower_an_existing_edge(g in arb_graph(), seed in any::<u64>()) {
        prop_assume!(g.has_edges());
        let mut perturber = Perturber::new(seed);
        let change = perturber.next_change(&g, Direction::Decrease).unwrap();
        let old = g.probability(change.u, change.v);
        prop_assert!(old > 0.0);
        prop_assert!(change.probability >= 0.0 && change.probability < old);
        prop_assert_eq!(change.classify(&g).unwrap(), ChangeKind::Decrease);
    }
}
