//! Semantic transition relations: transition systems described by enabled actions
//! and an execution function instead of an explicit edge list.

use std::fmt::Debug;
use std::hash::Hash;

/// A complete snapshot of modeled-system state.
///
/// Two configurations denote the same explored state exactly when they compare
/// equal, so `Eq` and `Hash` must agree. Configurations are never mutated once
/// produced; successors are fresh values. Wrap large states in `Arc` to keep the
/// clones taken by the explorer cheap.
pub trait Configuration: Clone + Eq + Hash + Debug + Send + Sync + 'static {}

impl<T> Configuration for T where T: Clone + Eq + Hash + Debug + Send + Sync + 'static {}

/// One enabled piece of a piecewise relation.
///
/// Actions are only required to be executable against the configuration that
/// enabled them. They show up in counterexample traces, hence `Debug`.
pub trait Action: Clone + Debug + Send + Sync + 'static {}

impl<T> Action for T where T: Clone + Debug + Send + Sync + 'static {}

/// An intensional transition system.
///
/// `enabled` returns every leaf-level piece whose guard holds. Guards may overlap
/// and the returned actions are independent of each other. `execute` must be a pure
/// function of `(action, config)`: the explorer may re-derive edges at any time.
pub trait TransitionRelation {
    type Config: Configuration;
    type Action: Action;

    /// The initial configurations. Must be finite.
    fn roots(&self) -> Vec<Self::Config>;

    /// All actions enabled in `config`.
    fn enabled(&self, config: &Self::Config) -> Vec<Self::Action>;

    /// Successors of `config` under `action`.
    ///
    /// `action` must come from `self.enabled(config)` for the same `config`; any other
    /// pairing is a contract violation with unspecified results.
    fn execute(&self, action: &Self::Action, config: &Self::Config) -> Vec<Self::Config>;

    /// Whether `config` has no enabled action.
    fn is_deadlocked(&self, config: &Self::Config) -> bool {
        self.enabled(config).is_empty()
    }
}

impl<R: TransitionRelation + ?Sized> TransitionRelation for &R {
    type Config = R::Config;
    type Action = R::Action;

    fn roots(&self) -> Vec<Self::Config> {
        (**self).roots()
    }

    fn enabled(&self, config: &Self::Config) -> Vec<Self::Action> {
        (**self).enabled(config)
    }

    fn execute(&self, action: &Self::Action, config: &Self::Config) -> Vec<Self::Config> {
        (**self).execute(action, config)
    }
}
