//! Rooted graphs and the adapter from transition relations.

use crate::relation::{Action, Configuration, TransitionRelation};
use ahash::AHashSet;

/// A graph given by its roots and a successor function.
///
/// Edges carry a label so the explorer can report which step produced each
/// configuration of a trace. Graphs without meaningful labels use `()`.
pub trait RootedGraph {
    type Config: Configuration;
    type Label: Action;

    fn roots(&self) -> Vec<Self::Config>;

    /// Labelled outgoing edges of `config`, in a stable order.
    fn successors(&self, config: &Self::Config) -> Vec<(Self::Label, Self::Config)>;

    /// Distinct successor configurations of `config`, first occurrence first.
    fn neighbours(&self, config: &Self::Config) -> Vec<Self::Config> {
        let mut seen = AHashSet::new();
        self.successors(config)
            .into_iter()
            .filter_map(|(_, next)| {
                if seen.contains(&next) {
                    None
                } else {
                    seen.insert(next.clone());
                    Some(next)
                }
            })
            .collect()
    }
}

impl<G: RootedGraph + ?Sized> RootedGraph for &G {
    type Config = G::Config;
    type Label = G::Label;

    fn roots(&self) -> Vec<Self::Config> {
        (**self).roots()
    }

    fn successors(&self, config: &Self::Config) -> Vec<(Self::Label, Self::Config)> {
        (**self).successors(config)
    }
}

/// Views a [`TransitionRelation`] as a [`RootedGraph`].
///
/// The successors of `c` are `execute(a, c)` for every `a` in `enabled(c)`, each
/// labelled with the action that produced it. `execute` is only ever called with
/// actions the relation itself enabled for that configuration.
pub struct RelationGraph<'a, R> {
    relation: &'a R,
}

impl<'a, R: TransitionRelation> RelationGraph<'a, R> {
    pub fn new(relation: &'a R) -> Self {
        Self { relation }
    }

    pub fn relation(&self) -> &'a R {
        self.relation
    }
}

impl<R> Clone for RelationGraph<'_, R> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<R> Copy for RelationGraph<'_, R> {}

impl<R: TransitionRelation> RootedGraph for RelationGraph<'_, R> {
    type Config = R::Config;
    type Label = R::Action;

    fn roots(&self) -> Vec<Self::Config> {
        self.relation.roots()
    }

    fn successors(&self, config: &Self::Config) -> Vec<(Self::Label, Self::Config)> {
        let mut edges = Vec::new();
        for action in self.relation.enabled(config) {
            for next in self.relation.execute(&action, config) {
                edges.push((action.clone(), next));
            }
        }
        edges
    }
}

/// A graph from explicit roots and an unlabelled neighbour function.
pub struct FnGraph<C, F> {
    roots: Vec<C>,
    neighbours: F,
}

impl<C, F> FnGraph<C, F>
where
    C: Configuration,
    F: Fn(&C) -> Vec<C>,
{
    pub fn new(roots: Vec<C>, neighbours: F) -> Self {
        Self { roots, neighbours }
    }
}

impl<C, F> RootedGraph for FnGraph<C, F>
where
    C: Configuration,
    F: Fn(&C) -> Vec<C>,
{
    type Config = C;
    type Label = ();

    fn roots(&self) -> Vec<C> {
        self.roots.clone()
    }

    fn successors(&self, config: &C) -> Vec<((), C)> {
        (self.neighbours)(config)
            .into_iter()
            .map(|next| ((), next))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::piecewise::{Piecewise, PiecewiseRelation, Rule};

    fn signed() -> PiecewiseRelation<i64> {
        PiecewiseRelation::new(
            vec![2],
            Piecewise::new()
                .leaf(
                    |x: &i64| *x > 0,
                    Rule::new("negate_or_dec", |x: &i64| vec![-x, x - 1]),
                )
                .leaf(|x: &i64| *x > 0, Rule::update("dec", |x: &i64| x - 1))
                .leaf(|x: &i64| *x < 0, Rule::update("inc", |x: &i64| x + 1)),
        )
    }

    #[test]
    fn test_adapter_roots_delegate() {
        let relation = signed();
        let graph = RelationGraph::new(&relation);
        assert_eq!(graph.roots(), vec![2]);
    }

    #[test]
    fn test_adapter_labels_successors() {
        let relation = signed();
        let graph = RelationGraph::new(&relation);
        let edges: Vec<(String, i64)> = graph
            .successors(&2)
            .into_iter()
            .map(|(a, c)| (a.name().to_string(), c))
            .collect();
        assert_eq!(
            edges,
            vec![
                ("negate_or_dec".to_string(), -2),
                ("negate_or_dec".to_string(), 1),
                ("dec".to_string(), 1),
            ]
        );
    }

    #[test]
    fn test_neighbours_is_union_of_executions() {
        let relation = signed();
        let graph = RelationGraph::new(&relation);
        for c in -3..=3 {
            let mut expected: Vec<i64> = relation
                .enabled(&c)
                .iter()
                .flat_map(|a| relation.execute(a, &c))
                .collect();
            expected.sort();
            expected.dedup();
            let mut actual = graph.neighbours(&c);
            actual.sort();
            assert_eq!(actual, expected, "neighbours of {}", c);
        }
    }

    #[test]
    fn test_deadlocked_configuration_has_no_neighbours() {
        let relation = signed();
        let graph = RelationGraph::new(&relation);
        assert!(graph.neighbours(&0).is_empty());
    }

    #[test]
    fn test_fn_graph() {
        let graph = FnGraph::new(vec![0u8], |x: &u8| vec![x.wrapping_add(1), *x]);
        assert_eq!(graph.neighbours(&3), vec![4, 3]);
        assert_eq!(graph.successors(&3).len(), 2);
    }
}
