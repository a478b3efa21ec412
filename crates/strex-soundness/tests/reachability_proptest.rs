use proptest::prelude::*;
use std::collections::BTreeSet;
use strex_mc::{Reachability, RelationGraph, RootedGraph, TransitionRelation};
use strex_soundness::{both_modes, reference_reachable, trace_is_valid, TableRelation};

fn table_relation() -> impl Strategy<Value = TableRelation> {
    (1usize..24).prop_flat_map(|n| {
        (
            prop::collection::vec(0..n, 1..3),
            prop::collection::vec(
                prop::collection::vec(prop::collection::vec(0..n, 0..3), 0..3),
                n,
            ),
        )
            .prop_map(move |(roots, actions)| TableRelation::new(n, roots, actions))
    })
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 256,
        .. ProptestConfig::default()
    })]

    #[test]
    fn reachable_set_matches_reference(relation in table_relation()) {
        let graph = RelationGraph::new(&relation);
        let expected = reference_reachable(&graph);
        for config in both_modes(true) {
            let reach = Reachability::run(&graph, config).expect("finite tables terminate");
            let actual: BTreeSet<usize> = reach.configurations().into_iter().collect();
            prop_assert_eq!(&actual, &expected);
        }
    }

    #[test]
    fn every_trace_is_a_path_from_a_root(relation in table_relation()) {
        let graph = RelationGraph::new(&relation);
        for config in both_modes(true) {
            let reach = Reachability::run(&graph, config).unwrap();
            for target in reach.configurations() {
                let trace = reach.traceback(&target).unwrap();
                prop_assert!(trace_is_valid(&graph, &trace, &target));
                prop_assert_eq!(reach.store().depth(&target), Some(trace.len() - 1));
            }
        }
    }

    #[test]
    fn parent_labels_name_enabled_actions(relation in table_relation()) {
        let graph = RelationGraph::new(&relation);
        let reach = Reachability::run(&graph, both_modes(true)[0].clone()).unwrap();
        for child in reach.configurations() {
            if let Some((parent, action)) = reach.store().parent(&child) {
                prop_assert!(relation.enabled(&parent).contains(&action));
                prop_assert!(relation.execute(&action, &parent).contains(&child));
            }
        }
    }

    #[test]
    fn exploration_is_idempotent(relation in table_relation()) {
        let graph = RelationGraph::new(&relation);
        let config = both_modes(true)[1].clone();
        let first = Reachability::run(&graph, config.clone()).unwrap();
        let second = Reachability::run(&graph, config).unwrap();
        let a: BTreeSet<usize> = first.configurations().into_iter().collect();
        let b: BTreeSet<usize> = second.configurations().into_iter().collect();
        prop_assert_eq!(a, b);
    }

    #[test]
    fn adapter_neighbours_are_union_of_executions(relation in table_relation()) {
        let graph = RelationGraph::new(&relation);
        for c in 0..relation.len() {
            let expected: BTreeSet<usize> = relation
                .enabled(&c)
                .iter()
                .flat_map(|a| relation.execute(a, &c))
                .collect();
            let neighbours = graph.neighbours(&c);
            let actual: BTreeSet<usize> = neighbours.iter().copied().collect();
            prop_assert_eq!(actual.len(), neighbours.len(), "neighbours are distinct");
            prop_assert_eq!(actual, expected);
        }
    }
}
