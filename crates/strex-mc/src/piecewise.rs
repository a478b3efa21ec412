//! Nested piecewise definitions of transition relations.
//!
//! A relation such as
//!
//! ```text
//! x' = -x      if x > 0
//! x' = x - 1   if x > 0
//! x' = x + 1   if x < 0
//!     y' = 0   if x < 0 and y > 0
//! ```
//!
//! is a list of guarded pieces whose bodies are either a leaf action or another
//! piecewise list. [`Piecewise::resolve`] evaluates guards outer-to-inner and
//! left-to-right and returns the leaf actions that hold, so callers of
//! [`TransitionRelation::enabled`] never see the guard tree. Guards may overlap.

use crate::relation::{Configuration, TransitionRelation};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// Guard predicate over configurations.
pub type Guard<C> = Arc<dyn Fn(&C) -> bool + Send + Sync>;

/// One guarded piece of a relation.
pub enum Piece<C, A> {
    Leaf { guard: Guard<C>, action: A },
    Nested { guard: Guard<C>, pieces: Piecewise<C, A> },
}

impl<C, A: Clone> Clone for Piece<C, A> {
    fn clone(&self) -> Self {
        match self {
            Piece::Leaf { guard, action } => Piece::Leaf {
                guard: Arc::clone(guard),
                action: action.clone(),
            },
            Piece::Nested { guard, pieces } => Piece::Nested {
                guard: Arc::clone(guard),
                pieces: pieces.clone(),
            },
        }
    }
}

impl<C, A: fmt::Debug> fmt::Debug for Piece<C, A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Piece::Leaf { action, .. } => f.debug_tuple("Leaf").field(action).finish(),
            Piece::Nested { pieces, .. } => f.debug_tuple("Nested").field(pieces).finish(),
        }
    }
}

/// An ordered list of guarded pieces.
pub struct Piecewise<C, A> {
    pieces: Vec<Piece<C, A>>,
}

impl<C, A> Piecewise<C, A> {
    pub fn new() -> Self {
        Self { pieces: Vec::new() }
    }

    /// Add a leaf piece: `action` is enabled whenever `guard` holds.
    pub fn leaf<G>(mut self, guard: G, action: A) -> Self
    where
        G: Fn(&C) -> bool + Send + Sync + 'static,
    {
        self.pieces.push(Piece::Leaf {
            guard: Arc::new(guard),
            action,
        });
        self
    }

    /// Add an unguarded leaf piece.
    pub fn always(self, action: A) -> Self
    where
        C: 'static,
    {
        self.leaf(|_| true, action)
    }

    /// Add a nested piece: `pieces` are only considered when `guard` holds.
    pub fn nested<G>(mut self, guard: G, pieces: Piecewise<C, A>) -> Self
    where
        G: Fn(&C) -> bool + Send + Sync + 'static,
    {
        self.pieces.push(Piece::Nested {
            guard: Arc::new(guard),
            pieces,
        });
        self
    }

    /// Number of top-level pieces.
    pub fn len(&self) -> usize {
        self.pieces.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pieces.is_empty()
    }

    /// Number of leaf actions in the whole tree, regardless of guards.
    pub fn leaf_count(&self) -> usize {
        self.pieces
            .iter()
            .map(|piece| match piece {
                Piece::Leaf { .. } => 1,
                Piece::Nested { pieces, .. } => pieces.leaf_count(),
            })
            .sum()
    }

    pub fn pieces(&self) -> &[Piece<C, A>] {
        &self.pieces
    }
}

impl<C, A: Clone> Piecewise<C, A> {
    /// The leaf actions whose whole guard chain holds for `config`.
    pub fn resolve(&self, config: &C) -> Vec<A> {
        let mut actions = Vec::new();
        self.resolve_into(config, &mut actions);
        actions
    }

    fn resolve_into(&self, config: &C, out: &mut Vec<A>) {
        for piece in &self.pieces {
            match piece {
                Piece::Leaf { guard, action } => {
                    if guard(config) {
                        out.push(action.clone());
                    }
                }
                Piece::Nested { guard, pieces } => {
                    if guard(config) {
                        pieces.resolve_into(config, out);
                    }
                }
            }
        }
    }
}

impl<C, A> Default for Piecewise<C, A> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C, A: Clone> Clone for Piecewise<C, A> {
    fn clone(&self) -> Self {
        Self {
            pieces: self.pieces.clone(),
        }
    }
}

impl<C, A: fmt::Debug> fmt::Debug for Piecewise<C, A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(&self.pieces).finish()
    }
}

/// A named action that maps a configuration to its successors.
///
/// Rules compare and hash by name only; the name is what traces display.
#[derive(Clone)]
pub struct Rule<C> {
    name: Arc<str>,
    apply: Arc<dyn Fn(&C) -> Vec<C> + Send + Sync>,
}

impl<C> Rule<C> {
    /// A rule with any number of successors.
    pub fn new<F>(name: impl Into<Arc<str>>, apply: F) -> Self
    where
        F: Fn(&C) -> Vec<C> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            apply: Arc::new(apply),
        }
    }

    /// A rule with exactly one successor, typically built by copy-then-modify.
    pub fn update<F>(name: impl Into<Arc<str>>, update: F) -> Self
    where
        C: 'static,
        F: Fn(&C) -> C + Send + Sync + 'static,
    {
        Self::new(name, move |c| vec![update(c)])
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn apply(&self, config: &C) -> Vec<C> {
        (self.apply)(config)
    }
}

impl<C> fmt::Debug for Rule<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

impl<C> fmt::Display for Rule<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

impl<C> PartialEq for Rule<C> {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl<C> Eq for Rule<C> {}

impl<C> Hash for Rule<C> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.name.hash(state);
    }
}

/// A transition relation given by roots and a piecewise list of [`Rule`]s.
pub struct PiecewiseRelation<C> {
    roots: Vec<C>,
    pieces: Piecewise<C, Rule<C>>,
}

impl<C: Configuration> PiecewiseRelation<C> {
    pub fn new(roots: Vec<C>, pieces: Piecewise<C, Rule<C>>) -> Self {
        Self { roots, pieces }
    }

    pub fn pieces(&self) -> &Piecewise<C, Rule<C>> {
        &self.pieces
    }
}

impl<C: Configuration> TransitionRelation for PiecewiseRelation<C> {
    type Config = C;
    type Action = Rule<C>;

    fn roots(&self) -> Vec<C> {
        self.roots.clone()
    }

    fn enabled(&self, config: &C) -> Vec<Rule<C>> {
        self.pieces.resolve(config)
    }

    fn execute(&self, action: &Rule<C>, config: &C) -> Vec<C> {
        action.apply(config)
    }
}
