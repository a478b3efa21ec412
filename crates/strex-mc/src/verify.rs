//! Safety checking on top of reachability: invariants, deadlock freedom and
//! random simulation.

use crate::explorer::{CheckConfig, CheckResult, Explorer, Limit, Termination};
use crate::graph::{RelationGraph, RootedGraph};
use crate::relation::TransitionRelation;
use crate::store::Trace;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use std::fmt;
use std::ops::ControlFlow;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use tracing::{debug, info};

/// Name reported for anonymous predicates passed to [`Verifier::check`].
pub const PREDICATE: &str = "predicate";

/// A named safety predicate that must hold in every reachable configuration.
pub struct Invariant<C> {
    name: String,
    predicate: Arc<dyn Fn(&C) -> bool + Send + Sync>,
}

impl<C> Invariant<C> {
    pub fn new<F>(name: impl Into<String>, predicate: F) -> Self
    where
        F: Fn(&C) -> bool + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            predicate: Arc::new(predicate),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn holds(&self, config: &C) -> bool {
        (self.predicate)(config)
    }
}

impl<C> Clone for Invariant<C> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            predicate: Arc::clone(&self.predicate),
        }
    }
}

impl<C> fmt::Debug for Invariant<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Invariant").field("name", &self.name).finish()
    }
}

/// Index of the first violated invariant, if any.
fn first_violated<C>(invariants: &[Invariant<C>], config: &C) -> Option<usize> {
    invariants.iter().position(|inv| !inv.holds(config))
}

/// Result of model checking.
#[derive(Debug, Clone)]
pub enum CheckOutcome<C, L> {
    /// All reachable configurations explored, no violation found.
    Ok {
        states_explored: usize,
        max_depth: usize,
    },
    /// A reachable configuration violates an invariant. The last trace element is
    /// the violating configuration.
    InvariantViolation {
        invariant: String,
        trace: Trace<C, L>,
    },
    /// A reachable configuration has no enabled action.
    Deadlock { trace: Trace<C, L> },
    /// Exploration stopped due to state limit.
    StateLimitReached {
        states_explored: usize,
        max_depth: usize,
    },
    /// Some configurations were not expanded because of the depth limit.
    DepthLimitReached {
        states_explored: usize,
        max_depth: usize,
    },
    /// Exploration stopped due to time limit.
    TimeLimitReached {
        states_explored: usize,
        max_depth: usize,
    },
    /// Exploration stopped due to memory limit.
    MemoryLimitReached {
        states_explored: usize,
        max_depth: usize,
        memory_mb: usize,
    },
    /// Exploration stopped by the external stop flag.
    Stopped {
        states_explored: usize,
        max_depth: usize,
    },
}

impl<C, L> CheckOutcome<C, L> {
    /// True when the whole reachable space was explored without finding anything.
    pub fn is_ok(&self) -> bool {
        matches!(self, CheckOutcome::Ok { .. })
    }

    /// True for invariant violations and deadlocks.
    pub fn is_violation(&self) -> bool {
        matches!(
            self,
            CheckOutcome::InvariantViolation { .. } | CheckOutcome::Deadlock { .. }
        )
    }

    pub fn trace(&self) -> Option<&Trace<C, L>> {
        match self {
            CheckOutcome::InvariantViolation { trace, .. } | CheckOutcome::Deadlock { trace } => {
                Some(trace)
            }
            _ => None,
        }
    }

    /// The violating or deadlocked configuration.
    pub fn witness(&self) -> Option<&C> {
        self.trace().and_then(|t| t.last()).map(|(c, _)| c)
    }

    /// Number of configurations explored, for outcomes that are not violations.
    pub fn states_explored(&self) -> Option<usize> {
        match self {
            CheckOutcome::Ok {
                states_explored, ..
            }
            | CheckOutcome::StateLimitReached {
                states_explored, ..
            }
            | CheckOutcome::DepthLimitReached {
                states_explored, ..
            }
            | CheckOutcome::TimeLimitReached {
                states_explored, ..
            }
            | CheckOutcome::MemoryLimitReached {
                states_explored, ..
            }
            | CheckOutcome::Stopped {
                states_explored, ..
            } => Some(*states_explored),
            CheckOutcome::InvariantViolation { .. } | CheckOutcome::Deadlock { .. } => None,
        }
    }

    fn from_limit(limit: Limit, states_explored: usize, max_depth: usize) -> Self {
        match limit {
            Limit::States(_) => CheckOutcome::StateLimitReached {
                states_explored,
                max_depth,
            },
            Limit::Depth(_) => CheckOutcome::DepthLimitReached {
                states_explored,
                max_depth,
            },
            Limit::Time(_) => CheckOutcome::TimeLimitReached {
                states_explored,
                max_depth,
            },
            Limit::Memory(memory_mb) => CheckOutcome::MemoryLimitReached {
                states_explored,
                max_depth,
                memory_mb,
            },
            Limit::Stopped => CheckOutcome::Stopped {
                states_explored,
                max_depth,
            },
        }
    }
}

impl<C, L> fmt::Display for CheckOutcome<C, L> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CheckOutcome::Ok {
                states_explored, ..
            } => write!(
                f,
                "holds for all {} reachable configurations",
                states_explored
            ),
            CheckOutcome::InvariantViolation { invariant, trace } => write!(
                f,
                "invariant '{}' violated after {} steps",
                invariant,
                trace.len().saturating_sub(1)
            ),
            CheckOutcome::Deadlock { trace } => {
                write!(f, "deadlock after {} steps", trace.len().saturating_sub(1))
            }
            CheckOutcome::StateLimitReached {
                states_explored, ..
            } => write!(
                f,
                "state limit reached after {} configurations",
                states_explored
            ),
            CheckOutcome::DepthLimitReached {
                states_explored,
                max_depth,
            } => write!(
                f,
                "depth limit {} reached after {} configurations",
                max_depth, states_explored
            ),
            CheckOutcome::TimeLimitReached {
                states_explored, ..
            } => write!(
                f,
                "time limit reached after {} configurations",
                states_explored
            ),
            CheckOutcome::MemoryLimitReached {
                states_explored,
                memory_mb,
                ..
            } => write!(
                f,
                "memory limit reached at {} MB after {} configurations",
                memory_mb, states_explored
            ),
            CheckOutcome::Stopped {
                states_explored, ..
            } => write!(f, "stopped after {} configurations", states_explored),
        }
    }
}

/// What made a checking run stop early.
enum Finding {
    Invariant(usize),
    Deadlock,
}

impl<'g, G> Explorer<'g, G>
where
    G: RootedGraph + Sync,
{
    /// Check that every reachable configuration satisfies all `invariants`.
    ///
    /// Invariants are evaluated on each configuration as it is discovered; the first
    /// violation ends exploration and is reported with a trace from a root.
    pub fn check_invariants(
        &mut self,
        invariants: &[Invariant<G::Config>],
    ) -> CheckResult<CheckOutcome<G::Config, G::Label>> {
        info!(invariants = invariants.len(), "checking invariants");
        let termination = self.explore(&|c: &G::Config| match first_violated(invariants, c) {
            Some(idx) => ControlFlow::Break(Finding::Invariant(idx)),
            None => ControlFlow::Continue(()),
        })?;
        self.outcome(termination, invariants)
    }

    fn outcome(
        &self,
        termination: Termination<G::Config, Finding>,
        invariants: &[Invariant<G::Config>],
    ) -> CheckResult<CheckOutcome<G::Config, G::Label>> {
        let states_explored = self.store().len();
        let max_depth = self.max_depth();
        match termination {
            Termination::Exhausted => Ok(CheckOutcome::Ok {
                states_explored,
                max_depth,
            }),
            Termination::Limit(limit) => {
                Ok(CheckOutcome::from_limit(limit, states_explored, max_depth))
            }
            Termination::Stopped { config, reason } => {
                let trace = self.traceback(&config)?;
                match reason {
                    Finding::Invariant(idx) => {
                        let invariant = invariants[idx].name().to_string();
                        info!(%invariant, steps = trace.len() - 1, "invariant violated");
                        Ok(CheckOutcome::InvariantViolation { invariant, trace })
                    }
                    Finding::Deadlock => {
                        info!(steps = trace.len() - 1, "deadlock found");
                        Ok(CheckOutcome::Deadlock { trace })
                    }
                }
            }
        }
    }
}

impl<'g, 'r, R> Explorer<'g, RelationGraph<'r, R>>
where
    R: TransitionRelation + Sync,
{
    /// Check `invariants` and, when `check_deadlock` is set, that no reachable
    /// configuration lacks an enabled action.
    pub fn check_model(
        &mut self,
        invariants: &[Invariant<R::Config>],
        check_deadlock: bool,
    ) -> CheckResult<CheckOutcome<R::Config, R::Action>> {
        let relation = self.graph().relation();
        info!(
            invariants = invariants.len(),
            check_deadlock, "checking model"
        );
        let termination = self.explore(&|c: &R::Config| {
            if let Some(idx) = first_violated(invariants, c) {
                return ControlFlow::Break(Finding::Invariant(idx));
            }
            if check_deadlock && relation.is_deadlocked(c) {
                return ControlFlow::Break(Finding::Deadlock);
            }
            ControlFlow::Continue(())
        })?;
        self.outcome(termination, invariants)
    }
}

/// Result of simulation.
#[derive(Debug, Clone)]
pub enum SimulateOutcome<C, L> {
    /// Simulation completed without violations.
    Ok { steps: usize, trace: Trace<C, L> },
    /// Invariant violation found during simulation.
    InvariantViolation {
        invariant: String,
        trace: Trace<C, L>,
    },
    /// Deadlock (no enabled actions).
    Deadlock { trace: Trace<C, L> },
}

impl<C, L> SimulateOutcome<C, L> {
    pub fn trace(&self) -> &Trace<C, L> {
        match self {
            SimulateOutcome::Ok { trace, .. }
            | SimulateOutcome::InvariantViolation { trace, .. }
            | SimulateOutcome::Deadlock { trace } => trace,
        }
    }
}

/// Entry points for checking graphs and transition relations.
///
/// Every call runs a fresh [`Explorer`], so results of separate calls share no
/// state.
#[derive(Debug, Clone, Default)]
pub struct Verifier {
    config: CheckConfig,
    stop_flag: Option<Arc<AtomicBool>>,
}

impl Verifier {
    pub fn new(config: CheckConfig) -> Self {
        Self {
            config,
            stop_flag: None,
        }
    }

    pub fn config(&self) -> &CheckConfig {
        &self.config
    }

    /// Set an external stop flag for every run started by this verifier.
    pub fn set_stop_flag(&mut self, flag: Arc<AtomicBool>) {
        self.stop_flag = Some(flag);
    }

    fn explorer<'g, G>(&self, graph: &'g G) -> Explorer<'g, G>
    where
        G: RootedGraph + Sync,
    {
        let mut explorer = Explorer::new(graph, self.config.clone());
        if let Some(ref flag) = self.stop_flag {
            explorer.set_stop_flag(Arc::clone(flag));
        }
        explorer
    }

    /// Check that `predicate` holds in every configuration reachable in `graph`.
    pub fn check<G, P>(
        &self,
        graph: &G,
        predicate: P,
    ) -> CheckResult<CheckOutcome<G::Config, G::Label>>
    where
        G: RootedGraph + Sync,
        P: Fn(&G::Config) -> bool + Send + Sync + 'static,
    {
        self.check_invariants(graph, &[Invariant::new(PREDICATE, predicate)])
    }

    /// Check several named invariants in one exploration.
    pub fn check_invariants<G>(
        &self,
        graph: &G,
        invariants: &[Invariant<G::Config>],
    ) -> CheckResult<CheckOutcome<G::Config, G::Label>>
    where
        G: RootedGraph + Sync,
    {
        self.explorer(graph).check_invariants(invariants)
    }

    /// Check that no reachable configuration of `relation` is deadlocked.
    pub fn check_deadlock_free<R>(
        &self,
        relation: &R,
    ) -> CheckResult<CheckOutcome<R::Config, R::Action>>
    where
        R: TransitionRelation + Sync,
    {
        let graph = RelationGraph::new(relation);
        let mut explorer = self.explorer(&graph);
        explorer.check_model(&[], true)
    }

    /// Check `invariants` and, if `config.check_deadlock` is set, deadlock freedom.
    pub fn check_model<R>(
        &self,
        relation: &R,
        invariants: &[Invariant<R::Config>],
    ) -> CheckResult<CheckOutcome<R::Config, R::Action>>
    where
        R: TransitionRelation + Sync,
    {
        let graph = RelationGraph::new(relation);
        let mut explorer = self.explorer(&graph);
        explorer.check_model(invariants, self.config.check_deadlock)
    }

    /// Follow one random path through `relation` for at most `max_steps` steps,
    /// checking `invariants` at every configuration. The same seed always yields the
    /// same path.
    pub fn simulate<R>(
        &self,
        relation: &R,
        invariants: &[Invariant<R::Config>],
        max_steps: usize,
        seed: u64,
    ) -> CheckResult<SimulateOutcome<R::Config, R::Action>>
    where
        R: TransitionRelation,
    {
        let mut rng = StdRng::seed_from_u64(seed);
        let graph = RelationGraph::new(relation);

        let roots = graph.roots();
        let Some(root) = roots.choose(&mut rng) else {
            return Err(crate::CheckError::NoInitialStates);
        };
        let mut current = root.clone();
        let mut trace: Trace<R::Config, R::Action> = vec![(current.clone(), None)];

        if let Some(idx) = first_violated(invariants, &current) {
            return Ok(SimulateOutcome::InvariantViolation {
                invariant: invariants[idx].name().to_string(),
                trace,
            });
        }

        for _step in 0..max_steps {
            let successors = graph.successors(&current);
            let Some((action, next)) = successors.choose(&mut rng).cloned() else {
                if relation.is_deadlocked(&current) {
                    return Ok(SimulateOutcome::Deadlock { trace });
                }
                debug!("enabled actions produced no successors, ending simulation");
                break;
            };

            trace.push((next.clone(), Some(action)));

            if let Some(idx) = first_violated(invariants, &next) {
                return Ok(SimulateOutcome::InvariantViolation {
                    invariant: invariants[idx].name().to_string(),
                    trace,
                });
            }
            current = next;
        }

        Ok(SimulateOutcome::Ok {
            steps: trace.len() - 1,
            trace,
        })
    }
}
