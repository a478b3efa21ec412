//! Reference implementations and table-driven relations used to cross-check the
//! explorer.

use std::collections::BTreeSet;
use strex_mc::{CheckConfig, RootedGraph, TransitionRelation};

/// A finite relation given as a table: `actions[c][a]` lists the successors of
/// configuration `c` under its `a`-th enabled action.
#[derive(Debug, Clone)]
pub struct TableRelation {
    pub roots: Vec<usize>,
    pub actions: Vec<Vec<Vec<usize>>>,
}

impl TableRelation {
    /// Build a table over `n` configurations, clamping every index into range.
    pub fn new(n: usize, roots: Vec<usize>, actions: Vec<Vec<Vec<usize>>>) -> Self {
        let n = n.max(1);
        let mut actions: Vec<Vec<Vec<usize>>> = actions
            .into_iter()
            .take(n)
            .map(|per_config| {
                per_config
                    .into_iter()
                    .map(|succ| succ.into_iter().map(|s| s % n).collect())
                    .collect()
            })
            .collect();
        actions.resize(n, Vec::new());
        let roots = roots.into_iter().map(|r| r % n).collect();
        Self { roots, actions }
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }
}

impl TransitionRelation for TableRelation {
    type Config = usize;
    type Action = usize;

    fn roots(&self) -> Vec<usize> {
        self.roots.clone()
    }

    fn enabled(&self, c: &usize) -> Vec<usize> {
        (0..self.actions[*c].len()).collect()
    }

    fn execute(&self, a: &usize, c: &usize) -> Vec<usize> {
        self.actions[*c][*a].clone()
    }
}

/// Reachable set by naive worklist closure over `neighbours`.
pub fn reference_reachable<G: RootedGraph>(graph: &G) -> BTreeSet<G::Config>
where
    G::Config: Ord,
{
    let mut seen = BTreeSet::new();
    let mut work = graph.roots();
    while let Some(c) = work.pop() {
        if seen.insert(c.clone()) {
            work.extend(graph.neighbours(&c));
        }
    }
    seen
}

/// Sequential and parallel configurations with the given deadlock setting.
pub fn both_modes(check_deadlock: bool) -> [CheckConfig; 2] {
    [
        CheckConfig {
            parallel: false,
            check_deadlock,
            ..CheckConfig::default()
        },
        CheckConfig {
            parallel: true,
            num_threads: 4,
            check_deadlock,
            ..CheckConfig::default()
        },
    ]
}

/// Whether `trace` starts at a root, ends at `target` and only follows edges of
/// `graph`.
pub fn trace_is_valid<G: RootedGraph>(
    graph: &G,
    trace: &[(G::Config, Option<G::Label>)],
    target: &G::Config,
) -> bool {
    let Some((first, first_label)) = trace.first() else {
        return false;
    };
    if first_label.is_some() || !graph.roots().contains(first) {
        return false;
    }
    if trace.last().map(|(c, _)| c) != Some(target) {
        return false;
    }
    trace.windows(2).all(|w| {
        w[1].1.is_some() && graph.neighbours(&w[0].0).contains(&w[1].0)
    })
}
