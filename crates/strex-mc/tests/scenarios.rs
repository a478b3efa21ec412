use std::collections::HashSet;
use strex_mc::{
    CheckConfig, CheckError, CheckOutcome, Invariant, Piecewise, PiecewiseRelation, Reachability,
    RelationGraph, RootedGraph, Rule, TransitionRelation, Verifier,
};

fn sequential() -> CheckConfig {
    CheckConfig {
        parallel: false,
        ..Default::default()
    }
}

/// Roots {0}, enabled(0) = {a}, execute(a, 0) = {1}, enabled(1) = {}.
struct TwoStep;

impl TransitionRelation for TwoStep {
    type Config = u8;
    type Action = &'static str;

    fn roots(&self) -> Vec<u8> {
        vec![0]
    }

    fn enabled(&self, c: &u8) -> Vec<&'static str> {
        if *c == 0 {
            vec!["a"]
        } else {
            vec![]
        }
    }

    fn execute(&self, _: &&'static str, _: &u8) -> Vec<u8> {
        vec![1]
    }
}

#[test]
fn two_step_deadlock_witness() {
    let outcome = Verifier::new(sequential())
        .check_deadlock_free(&TwoStep)
        .unwrap();
    match outcome {
        CheckOutcome::Deadlock { trace } => {
            assert_eq!(trace, vec![(0, None), (1, Some("a"))]);
        }
        other => panic!("expected Deadlock, got {:?}", other),
    }
}

/// The signed relation: x' = -x or x' = x - 1 if x > 0, x' = x + 1 if x < 0.
fn signed(start: i64) -> PiecewiseRelation<i64> {
    PiecewiseRelation::new(
        vec![start],
        Piecewise::new()
            .leaf(
                |x: &i64| *x > 0,
                Rule::new("negate_or_decrement", |x: &i64| vec![-x, x - 1]),
            )
            .leaf(|x: &i64| *x < 0, Rule::update("increment", |x: &i64| x + 1)),
    )
}

#[test]
fn signed_relation_reaches_symmetric_range() {
    let relation = signed(4);
    let graph = RelationGraph::new(&relation);
    let reach = Reachability::run(&graph, sequential()).unwrap();
    let set: HashSet<i64> = reach.configurations().into_iter().collect();
    assert_eq!(set, (-4..=4).collect());
}

#[test]
fn signed_relation_deadlocks_at_zero() {
    let outcome = Verifier::new(sequential())
        .check_deadlock_free(&signed(3))
        .unwrap();
    assert_eq!(outcome.witness(), Some(&0));
}

#[test]
fn reachability_is_idempotent() {
    let relation = signed(6);
    let graph = RelationGraph::new(&relation);
    let first = Reachability::run(&graph, CheckConfig::default()).unwrap();
    let second = Reachability::run(&graph, CheckConfig::default()).unwrap();
    assert_eq!(first.len(), second.len());
    let a: HashSet<i64> = first.configurations().into_iter().collect();
    let b: HashSet<i64> = second.configurations().into_iter().collect();
    assert_eq!(a, b);
}

#[test]
fn every_reachable_configuration_has_a_valid_trace() {
    let relation = signed(5);
    let graph = RelationGraph::new(&relation);
    let reach = Reachability::run(&graph, CheckConfig::default()).unwrap();
    let roots = graph.roots();
    for target in reach.configurations() {
        let trace = reach.traceback(&target).unwrap();
        assert!(roots.contains(&trace[0].0));
        assert_eq!(trace.last().map(|(c, _)| *c), Some(target));
        for window in trace.windows(2) {
            assert!(graph.neighbours(&window[0].0).contains(&window[1].0));
        }
    }
}

#[test]
fn traceback_of_unreached_configuration_fails() {
    let relation = signed(2);
    let graph = RelationGraph::new(&relation);
    let reach = Reachability::run(&graph, sequential()).unwrap();
    assert!(matches!(
        reach.traceback(&100),
        Err(CheckError::NotReachable { .. })
    ));
}

/// Three jugs of 8, 5 and 3 litres; the 8 litre jug starts full.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
struct Jugs([u8; 3]);

const CAPACITY: [u8; 3] = [8, 5, 3];

fn jugs() -> PiecewiseRelation<Jugs> {
    let mut pieces = Piecewise::new();
    for from in 0..3 {
        for to in 0..3 {
            if from == to {
                continue;
            }
            pieces = pieces.leaf(
                move |j: &Jugs| j.0[from] > 0 && j.0[to] < CAPACITY[to],
                Rule::update(format!("pour_{}_{}", from, to), move |j: &Jugs| {
                    let amount = j.0[from].min(CAPACITY[to] - j.0[to]);
                    let mut next = *j;
                    next.0[from] -= amount;
                    next.0[to] += amount;
                    next
                }),
            );
        }
    }
    PiecewiseRelation::new(vec![Jugs([8, 0, 0])], pieces)
}

#[test]
fn jug_puzzle_solution_is_found() {
    // "Never exactly 4 litres in the big jug" is false; the trace is a solution.
    let relation = jugs();
    let invariants = [Invariant::new("NoFour", |j: &Jugs| j.0[0] != 4)];
    let outcome = Verifier::new(sequential())
        .check_model(&relation, &invariants)
        .unwrap();
    let trace = outcome.trace().expect("a solution exists");
    assert_eq!(trace.last().map(|(j, _)| j.0[0]), Some(4));
    for window in trace.windows(2) {
        let (prev, _) = &window[0];
        let (next, rule) = &window[1];
        let rule = rule.as_ref().unwrap();
        assert!(relation.enabled(prev).contains(rule));
        assert_eq!(rule.apply(prev), vec![*next]);
        let total: u8 = next.0.iter().sum();
        assert_eq!(total, 8);
    }
}

#[test]
fn jug_puzzle_never_overflows() {
    let relation = jugs();
    let invariants = [
        Invariant::new("Conserved", |j: &Jugs| j.0.iter().sum::<u8>() == 8),
        Invariant::new("WithinCapacity", |j: &Jugs| {
            j.0.iter().zip(CAPACITY).all(|(v, c)| *v <= c)
        }),
    ];
    let config = CheckConfig {
        check_deadlock: false,
        ..Default::default()
    };
    let outcome = Verifier::new(config)
        .check_model(&relation, &invariants)
        .unwrap();
    assert!(outcome.is_ok(), "unexpected outcome: {}", outcome);
}
