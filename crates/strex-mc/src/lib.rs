//! Explicit-state model checker for semantic transition relations.
//!
//! A [`TransitionRelation`] describes a system by its roots, the actions enabled in
//! each configuration and the successors each action produces. [`RelationGraph`]
//! turns it into a [`RootedGraph`], which the [`Explorer`] searches while recording
//! a parent for every discovered configuration. The [`Verifier`] uses that parent
//! map to report counterexample traces for invariant violations and deadlocks.

pub mod explorer;
pub mod graph;
pub mod piecewise;
pub mod relation;
pub mod store;
pub mod verify;

pub use explorer::{
    CheckConfig, CheckError, CheckResult, Explorer, Limit, ProgressCounters, Reachability,
};
pub use graph::{FnGraph, RelationGraph, RootedGraph};
pub use piecewise::{Piece, Piecewise, PiecewiseRelation, Rule};
pub use relation::{Action, Configuration, TransitionRelation};
pub use store::{StateInfo, StateStore, Trace};
pub use verify::{CheckOutcome, Invariant, SimulateOutcome, Verifier, PREDICATE};
