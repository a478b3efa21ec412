//! Breadth-first reachability over rooted graphs.

use crate::graph::RootedGraph;
use crate::store::{StateStore, Trace};
use memory_stats::memory_stats;
use rayon::prelude::*;
use smallvec::SmallVec;
use std::collections::VecDeque;
use std::fmt;
use std::ops::ControlFlow;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, info, trace};

/// Returns current process memory usage in MB, or None if unavailable.
fn current_memory_mb() -> Option<usize> {
    memory_stats().map(|stats| stats.physical_mem / (1024 * 1024))
}

/// A resource budget that stopped an exploration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Limit {
    /// Configured maximum number of configurations.
    States(usize),
    /// Configured maximum depth.
    Depth(usize),
    /// Configured time limit in seconds.
    Time(u64),
    /// Memory usage in MB at the moment the limit was hit.
    Memory(usize),
    /// External stop request.
    Stopped,
}

impl fmt::Display for Limit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Limit::States(n) => write!(f, "state limit of {} configurations", n),
            Limit::Depth(d) => write!(f, "depth limit of {}", d),
            Limit::Time(s) => write!(f, "time limit of {}s", s),
            Limit::Memory(mb) => write!(f, "memory limit ({} MB in use)", mb),
            Limit::Stopped => write!(f, "external stop request"),
        }
    }
}

/// Exploration error.
#[derive(Debug, Error)]
pub enum CheckError {
    #[error("graph has no root configurations")]
    NoInitialStates,

    #[error("target not reachable: {target} was never recorded")]
    NotReachable { target: String },

    #[error("exploration budget exceeded: {limit} reached after {states_explored} configurations")]
    BudgetExceeded { limit: Limit, states_explored: usize },
}

pub type CheckResult<T> = Result<T, CheckError>;

/// Lock-free progress counters shared between the explorer and an observer.
#[derive(Debug)]
pub struct ProgressCounters {
    pub states: AtomicUsize,
    pub depth: AtomicUsize,
    pub queue_len: AtomicUsize,
    /// Configurations popped from the frontier and expanded.
    pub checked: AtomicUsize,
}

impl Default for ProgressCounters {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressCounters {
    pub fn new() -> Self {
        Self {
            states: AtomicUsize::new(0),
            depth: AtomicUsize::new(0),
            queue_len: AtomicUsize::new(0),
            checked: AtomicUsize::new(0),
        }
    }
}

/// Configuration for exploration and checking.
#[derive(Clone)]
pub struct CheckConfig {
    /// Whether `check_model` also looks for deadlocks.
    pub check_deadlock: bool,
    /// Maximum number of configurations to store (0 = unlimited).
    pub max_states: usize,
    /// Maximum depth to expand (0 = unlimited).
    pub max_depth: usize,
    /// Maximum memory usage in MB (0 = unlimited).
    pub memory_limit_mb: usize,
    /// Maximum time in seconds (0 = unlimited).
    pub max_time_secs: u64,
    /// Whether to process the frontier in parallel batches.
    pub parallel: bool,
    /// Number of threads for parallel exploration (0 = use all available).
    pub num_threads: usize,
    /// Shared progress counters, written atomically while exploring.
    pub progress: Option<Arc<ProgressCounters>>,
}

impl Default for CheckConfig {
    fn default() -> Self {
        Self {
            check_deadlock: true,
            max_states: 0,
            max_depth: 0,
            memory_limit_mb: 0,
            max_time_secs: 0,
            parallel: true,
            num_threads: 0,
            progress: None,
        }
    }
}

impl fmt::Debug for CheckConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CheckConfig")
            .field("check_deadlock", &self.check_deadlock)
            .field("max_states", &self.max_states)
            .field("max_depth", &self.max_depth)
            .field("memory_limit_mb", &self.memory_limit_mb)
            .field("max_time_secs", &self.max_time_secs)
            .field("parallel", &self.parallel)
            .field("num_threads", &self.num_threads)
            .field("progress", &self.progress.as_ref().map(|_| "..."))
            .finish()
    }
}

/// How an exploration ended.
#[derive(Debug)]
pub(crate) enum Termination<C, B> {
    /// The frontier ran empty.
    Exhausted,
    /// The visitor asked to stop at this configuration.
    Stopped { config: C, reason: B },
    /// A budget was hit before the frontier ran empty.
    Limit(Limit),
}

/// Frontier entry: configuration and its depth.
type QueueEntry<C> = (C, usize);

/// Result from expanding one frontier entry in parallel.
enum ParallelResult<C, B> {
    NewStates(SmallVec<[QueueEntry<C>; 8]>),
    DepthLimited,
    StateLimit,
    Stopped { config: C, reason: B },
}

type Canonicalizer<'g, C> = Box<dyn Fn(&C) -> C + Send + Sync + 'g>;

/// Explores the configurations reachable from the roots of a graph.
///
/// Each run owns a fresh [`StateStore`]: the reachable set and parent map are
/// never shared across runs.
pub struct Explorer<'g, G: RootedGraph> {
    graph: &'g G,
    config: CheckConfig,
    store: StateStore<G::Config, G::Label>,
    canonicalizer: Option<Canonicalizer<'g, G::Config>>,
    stop_flag: Option<Arc<AtomicBool>>,
    deadline: Option<Instant>,
    max_depth: usize,
}

impl<'g, G> Explorer<'g, G>
where
    G: RootedGraph + Sync,
{
    pub fn new(graph: &'g G, config: CheckConfig) -> Self {
        let store = if config.max_states > 0 {
            StateStore::with_capacity(config.max_states.min(1 << 16))
        } else {
            StateStore::new()
        };
        Self {
            graph,
            config,
            store,
            canonicalizer: None,
            stop_flag: None,
            deadline: None,
            max_depth: 0,
        }
    }

    /// Map every discovered configuration to a canonical representative before it
    /// is stored, e.g. to merge configurations equivalent under symmetry.
    pub fn with_canonicalizer<F>(mut self, f: F) -> Self
    where
        F: Fn(&G::Config) -> G::Config + Send + Sync + 'g,
    {
        self.canonicalizer = Some(Box::new(f));
        self
    }

    /// Set an external stop flag, checked between frontier elements.
    pub fn set_stop_flag(&mut self, flag: Arc<AtomicBool>) {
        self.stop_flag = Some(flag);
    }

    pub fn graph(&self) -> &'g G {
        self.graph
    }

    pub fn config(&self) -> &CheckConfig {
        &self.config
    }

    /// The reachable set and parent map of the last run.
    pub fn store(&self) -> &StateStore<G::Config, G::Label> {
        &self.store
    }

    pub fn into_store(self) -> StateStore<G::Config, G::Label> {
        self.store
    }

    /// Deepest configuration recorded in the last run.
    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    /// Explore until the frontier is empty.
    ///
    /// Returns the number of reachable configurations. Hitting any budget is an
    /// error here because the reachable set would be incomplete.
    pub fn run(&mut self) -> CheckResult<usize> {
        match self.explore(&|_: &G::Config| ControlFlow::<()>::Continue(()))? {
            Termination::Exhausted => Ok(self.store.len()),
            Termination::Limit(limit) => Err(CheckError::BudgetExceeded {
                limit,
                states_explored: self.store.len(),
            }),
            Termination::Stopped { .. } => Err(CheckError::BudgetExceeded {
                limit: Limit::Stopped,
                states_explored: self.store.len(),
            }),
        }
    }

    /// Root-to-`target` path through the parent map of the last run.
    pub fn traceback(&self, target: &G::Config) -> CheckResult<Trace<G::Config, G::Label>> {
        self.store.traceback(target)
    }

    #[inline]
    fn canonical(&self, config: G::Config) -> G::Config {
        match &self.canonicalizer {
            Some(f) => f(&config),
            None => config,
        }
    }

    /// Run the search, calling `visit` on every newly discovered configuration.
    ///
    /// `visit` returning `Break` ends the run at once with that configuration.
    pub(crate) fn explore<V, B>(
        &mut self,
        visit: &V,
    ) -> CheckResult<Termination<G::Config, B>>
    where
        V: Fn(&G::Config) -> ControlFlow<B> + Sync,
        B: Send,
    {
        if self.config.parallel && self.config.num_threads > 0 {
            if let Err(e) = rayon::ThreadPoolBuilder::new()
                .num_threads(self.config.num_threads)
                .build_global()
            {
                debug!(error = %e, "thread pool already initialized, using existing pool");
            }
        }

        self.store.clear();
        self.max_depth = 0;
        self.deadline = (self.config.max_time_secs > 0)
            .then(|| Instant::now() + Duration::from_secs(self.config.max_time_secs));

        info!(
            parallel = self.config.parallel,
            threads = if self.config.num_threads > 0 {
                self.config.num_threads
            } else {
                rayon::current_num_threads()
            },
            "starting exploration"
        );

        let roots = self.graph.roots();
        if roots.is_empty() {
            return Err(CheckError::NoInitialStates);
        }
        debug!(count = roots.len(), "inserting root configurations");

        let mut queue: VecDeque<QueueEntry<G::Config>> = VecDeque::new();
        for root in roots {
            let root = self.canonical(root);
            if self.store.contains(&root) {
                continue;
            }
            if self.config.max_states > 0 && self.store.len() >= self.config.max_states {
                return Ok(self.hit(Limit::States(self.config.max_states)));
            }
            self.store.insert_root(root.clone());
            if let ControlFlow::Break(reason) = visit(&root) {
                return Ok(Termination::Stopped {
                    config: root,
                    reason,
                });
            }
            queue.push_back((root, 0));
        }

        let result = if self.config.parallel {
            self.explore_parallel(queue, visit)
        } else {
            self.explore_sequential(queue, visit)
        }?;

        if let Some(ref p) = self.config.progress {
            p.states.store(self.store.len(), Ordering::Relaxed);
            p.depth.store(self.max_depth, Ordering::Relaxed);
        }
        info!(
            states = self.store.len(),
            max_depth = self.max_depth,
            "exploration complete"
        );
        Ok(result)
    }

    fn hit<B>(&self, limit: Limit) -> Termination<G::Config, B> {
        info!(states = self.store.len(), %limit, "stopping exploration");
        Termination::Limit(limit)
    }

    /// Stop flag, time and memory budgets. Time and memory are only read when
    /// `sample` is set.
    fn budget_exhausted(&self, sample: bool) -> Option<Limit> {
        if let Some(ref flag) = self.stop_flag {
            if flag.load(Ordering::Relaxed) {
                return Some(Limit::Stopped);
            }
        }
        if !sample {
            return None;
        }
        if self.deadline.is_some_and(|d| Instant::now() >= d) {
            return Some(Limit::Time(self.config.max_time_secs));
        }
        if self.config.memory_limit_mb > 0 {
            if let Some(mem_mb) = current_memory_mb() {
                if mem_mb >= self.config.memory_limit_mb {
                    return Some(Limit::Memory(mem_mb));
                }
            }
        }
        None
    }

    fn explore_sequential<V, B>(
        &mut self,
        mut queue: VecDeque<QueueEntry<G::Config>>,
        visit: &V,
    ) -> CheckResult<Termination<G::Config, B>>
    where
        V: Fn(&G::Config) -> ControlFlow<B> + Sync,
    {
        let mut expanded = 0usize;
        let mut depth_limited = false;

        while let Some((state, depth)) = queue.pop_front() {
            // Time and memory every 1000 states.
            if let Some(limit) = self.budget_exhausted(expanded % 1000 == 0) {
                return Ok(self.hit(limit));
            }
            expanded += 1;
            if let Some(ref p) = self.config.progress {
                p.checked.fetch_add(1, Ordering::Relaxed);
            }
            trace!(depth, state = ?state, "exploring configuration");

            let successors = self.graph.successors(&state);

            if self.config.max_depth > 0 && depth >= self.config.max_depth {
                if !depth_limited
                    && successors
                        .into_iter()
                        .any(|(_, next)| !self.store.contains(&self.canonical(next)))
                {
                    depth_limited = true;
                }
                continue;
            }

            for (label, next) in successors {
                let next = self.canonical(next);
                if self.store.contains(&next) {
                    continue;
                }
                if self.config.max_states > 0 && self.store.len() >= self.config.max_states {
                    return Ok(self.hit(Limit::States(self.config.max_states)));
                }
                if self.store.record(next.clone(), state.clone(), label, depth + 1) {
                    self.max_depth = self.max_depth.max(depth + 1);
                    if let ControlFlow::Break(reason) = visit(&next) {
                        return Ok(Termination::Stopped {
                            config: next,
                            reason,
                        });
                    }
                    queue.push_back((next, depth + 1));
                }
            }

            if let Some(ref p) = self.config.progress {
                p.states.store(self.store.len(), Ordering::Relaxed);
                p.depth.store(self.max_depth, Ordering::Relaxed);
                p.queue_len.store(queue.len(), Ordering::Relaxed);
            }
        }

        if depth_limited {
            return Ok(self.hit(Limit::Depth(self.config.max_depth)));
        }
        Ok(Termination::Exhausted)
    }

    /// Batched parallel BFS. Workers insert into the shared store directly; when
    /// several workers discover the same configuration, the first insert wins.
    fn explore_parallel<V, B>(
        &mut self,
        queue: VecDeque<QueueEntry<G::Config>>,
        visit: &V,
    ) -> CheckResult<Termination<G::Config, B>>
    where
        V: Fn(&G::Config) -> ControlFlow<B> + Sync,
        B: Send,
    {
        let mut queue: Vec<QueueEntry<G::Config>> = queue.into();
        let batch_size = if self.config.num_threads > 0 {
            self.config.num_threads * 256
        } else {
            rayon::current_num_threads() * 256
        };
        let found = AtomicBool::new(false);
        let claimed = AtomicUsize::new(self.store.len());
        let mut depth_limited = false;

        while !queue.is_empty() {
            if let Some(limit) = self.budget_exhausted(true) {
                return Ok(self.hit(limit));
            }

            let take = queue.len().min(batch_size);
            let batch: Vec<QueueEntry<G::Config>> = queue.drain(..take).collect();

            let results: Vec<ParallelResult<G::Config, B>> = {
                let this = &*self;
                batch
                    .par_iter()
                    .filter_map(|(state, depth)| {
                        if found.load(Ordering::Relaxed) {
                            return None;
                        }
                        Some(this.expand_one(state, *depth, visit, &found, &claimed))
                    })
                    .collect()
            };

            let mut hit_state_limit = false;
            for result in results {
                match result {
                    ParallelResult::Stopped { config, reason } => {
                        return Ok(Termination::Stopped { config, reason });
                    }
                    ParallelResult::StateLimit => hit_state_limit = true,
                    ParallelResult::DepthLimited => depth_limited = true,
                    ParallelResult::NewStates(entries) => {
                        for (next, depth) in entries {
                            self.max_depth = self.max_depth.max(depth);
                            queue.push((next, depth));
                        }
                    }
                }
            }
            if hit_state_limit {
                return Ok(self.hit(Limit::States(self.config.max_states)));
            }

            if let Some(ref p) = self.config.progress {
                p.states.store(self.store.len(), Ordering::Relaxed);
                p.depth.store(self.max_depth, Ordering::Relaxed);
                p.queue_len.store(queue.len(), Ordering::Relaxed);
            }
        }

        if depth_limited {
            return Ok(self.hit(Limit::Depth(self.config.max_depth)));
        }
        Ok(Termination::Exhausted)
    }

    /// Reserve room for one more stored configuration under `max_states`.
    fn claim_slot(&self, claimed: &AtomicUsize) -> bool {
        let max = self.config.max_states;
        max == 0
            || claimed
                .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| {
                    (n < max).then_some(n + 1)
                })
                .is_ok()
    }

    fn expand_one<V, B>(
        &self,
        state: &G::Config,
        depth: usize,
        visit: &V,
        found: &AtomicBool,
        claimed: &AtomicUsize,
    ) -> ParallelResult<G::Config, B>
    where
        V: Fn(&G::Config) -> ControlFlow<B> + Sync,
    {
        if let Some(ref p) = self.config.progress {
            p.checked.fetch_add(1, Ordering::Relaxed);
        }
        let successors = self.graph.successors(state);

        if self.config.max_depth > 0 && depth >= self.config.max_depth {
            let truncated = successors
                .into_iter()
                .any(|(_, next)| !self.store.contains(&self.canonical(next)));
            return if truncated {
                ParallelResult::DepthLimited
            } else {
                ParallelResult::NewStates(SmallVec::new())
            };
        }

        let mut new_entries = SmallVec::new();
        for (label, next) in successors {
            let next = self.canonical(next);
            if self.store.contains(&next) {
                continue;
            }
            if self.store.record(next.clone(), state.clone(), label, depth + 1) {
                // Only winning inserts claim a slot, so a refused claim means the
                // space really holds more than `max_states` configurations.
                if !self.claim_slot(claimed) {
                    self.store.remove(&next);
                    found.store(true, Ordering::Relaxed);
                    return ParallelResult::StateLimit;
                }
                if let Some(ref p) = self.config.progress {
                    p.states.store(self.store.len(), Ordering::Relaxed);
                    p.depth.fetch_max(depth + 1, Ordering::Relaxed);
                }
                if let ControlFlow::Break(reason) = visit(&next) {
                    found.store(true, Ordering::Relaxed);
                    return ParallelResult::Stopped {
                        config: next,
                        reason,
                    };
                }
                new_entries.push((next, depth + 1));
            }
        }
        ParallelResult::NewStates(new_entries)
    }
}

/// The outcome of a complete reachability run: the reachable set and the parent
/// map that reconstructs a path to every member.
pub struct Reachability<C, L> {
    store: StateStore<C, L>,
    max_depth: usize,
}

impl<C, L> Reachability<C, L>
where
    C: crate::Configuration,
    L: crate::Action,
{
    /// Explore `graph` to completion.
    pub fn run<G>(graph: &G, config: CheckConfig) -> CheckResult<Self>
    where
        G: RootedGraph<Config = C, Label = L> + Sync,
    {
        let mut explorer = Explorer::new(graph, config);
        explorer.run()?;
        let max_depth = explorer.max_depth();
        Ok(Self {
            store: explorer.into_store(),
            max_depth,
        })
    }

    pub fn len(&self) -> usize {
        self.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

    pub fn contains(&self, config: &C) -> bool {
        self.store.contains(config)
    }

    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    /// Every reachable configuration, in no particular order.
    pub fn configurations(&self) -> Vec<C> {
        self.store.configurations()
    }

    pub fn traceback(&self, target: &C) -> CheckResult<Trace<C, L>> {
        self.store.traceback(target)
    }

    pub fn store(&self) -> &StateStore<C, L> {
        &self.store
    }

    pub fn into_store(self) -> StateStore<C, L> {
        self.store
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{FnGraph, RelationGraph};
    use crate::piecewise::{Piecewise, PiecewiseRelation, Rule};
    use std::collections::HashSet;

    fn sequential() -> CheckConfig {
        CheckConfig {
            parallel: false,
            ..Default::default()
        }
    }

    /// x -> x+1 mod n and x -> 2x mod n.
    fn ring(n: u32) -> FnGraph<u32, impl Fn(&u32) -> Vec<u32>> {
        FnGraph::new(vec![1], move |x: &u32| vec![(x + 1) % n, (2 * x) % n])
    }

    #[test]
    fn test_reachable_set_is_exact() {
        let graph = ring(10);
        let reach = Reachability::run(&graph, sequential()).unwrap();
        assert_eq!(reach.len(), 10);
        let set: HashSet<u32> = reach.configurations().into_iter().collect();
        assert_eq!(set, (0..10).collect());
    }

    #[test]
    fn test_sequential_traces_are_shortest() {
        let graph = ring(100);
        let reach = Reachability::run(&graph, sequential()).unwrap();
        // 1 -> 2 -> 4 -> 8 -> 16 -> 32 -> 64
        let trace = reach.traceback(&64).unwrap();
        assert_eq!(trace.len(), 7);
        assert_eq!(trace[0], (1, None));
        assert_eq!(reach.store().depth(&64), Some(6));
    }

    #[test]
    fn test_no_enabled_actions_reaches_only_roots() {
        let relation: PiecewiseRelation<i32> = PiecewiseRelation::new(vec![1, 2, 3], Piecewise::new());
        let graph = RelationGraph::new(&relation);
        let reach = Reachability::run(&graph, sequential()).unwrap();
        let mut configs = reach.configurations();
        configs.sort();
        assert_eq!(configs, vec![1, 2, 3]);
        assert_eq!(reach.max_depth(), 0);
    }

    #[test]
    fn test_duplicate_roots_collapse() {
        let graph = FnGraph::new(vec![0u8, 0, 0], |_: &u8| Vec::new());
        let reach = Reachability::run(&graph, sequential()).unwrap();
        assert_eq!(reach.len(), 1);
    }

    #[test]
    fn test_no_roots_is_an_error() {
        let graph = FnGraph::new(Vec::<u8>::new(), |_: &u8| Vec::new());
        assert!(matches!(
            Reachability::run(&graph, sequential()),
            Err(CheckError::NoInitialStates)
        ));
    }

    #[test]
    fn test_state_limit_on_infinite_graph() {
        let graph = FnGraph::new(vec![0u64], |x: &u64| vec![x + 1]);
        let config = CheckConfig {
            max_states: 50,
            ..sequential()
        };
        match Reachability::run(&graph, config) {
            Err(CheckError::BudgetExceeded {
                limit: Limit::States(50),
                states_explored,
            }) => assert_eq!(states_explored, 50),
            other => panic!("expected state limit, got {:?}", other.map(|r| r.len())),
        }
    }

    #[test]
    fn test_parallel_state_limit_is_exact() {
        // Every node has 16 fresh children, so workers race for the last slots.
        let graph = FnGraph::new(vec![1u64], |x: &u64| {
            (0..16).map(|i| x * 16 + i).collect::<Vec<u64>>()
        });
        for _ in 0..20 {
            let config = CheckConfig {
                max_states: 1000,
                parallel: true,
                num_threads: 8,
                ..CheckConfig::default()
            };
            let mut explorer = Explorer::new(&graph, config);
            match explorer.run() {
                Err(CheckError::BudgetExceeded {
                    limit: Limit::States(1000),
                    states_explored,
                }) => assert_eq!(states_explored, 1000),
                other => panic!("expected state limit, got {:?}", other),
            }
            assert_eq!(explorer.store().len(), 1000);
        }
    }

    #[test]
    fn test_parallel_state_limit_equal_to_space_completes() {
        let graph = ring(10);
        let config = CheckConfig {
            max_states: 10,
            parallel: true,
            num_threads: 4,
            ..CheckConfig::default()
        };
        assert_eq!(Reachability::run(&graph, config).unwrap().len(), 10);
    }

    #[test]
    fn test_state_limit_equal_to_space_completes() {
        let graph = ring(10);
        let config = CheckConfig {
            max_states: 10,
            ..sequential()
        };
        assert_eq!(Reachability::run(&graph, config).unwrap().len(), 10);
    }

    #[test]
    fn test_depth_limit() {
        let graph = FnGraph::new(vec![0u64], |x: &u64| vec![x + 1]);
        let config = CheckConfig {
            max_depth: 5,
            ..sequential()
        };
        let mut explorer = Explorer::new(&graph, config);
        match explorer.run() {
            Err(CheckError::BudgetExceeded {
                limit: Limit::Depth(5),
                ..
            }) => {}
            other => panic!("expected depth limit, got {:?}", other),
        }
        // Depth 0 through 5 were stored.
        assert_eq!(explorer.store().len(), 6);
    }

    #[test]
    fn test_depth_limit_not_reported_when_nothing_is_cut() {
        let graph = ring(4);
        let config = CheckConfig {
            max_depth: 10,
            ..sequential()
        };
        assert_eq!(Reachability::run(&graph, config).unwrap().len(), 4);
    }

    #[test]
    fn test_stop_flag() {
        let graph = FnGraph::new(vec![0u64], |x: &u64| vec![x + 1]);
        let mut explorer = Explorer::new(&graph, sequential());
        explorer.set_stop_flag(Arc::new(AtomicBool::new(true)));
        assert!(matches!(
            explorer.run(),
            Err(CheckError::BudgetExceeded {
                limit: Limit::Stopped,
                ..
            })
        ));
    }

    #[test]
    fn test_canonicalizer_merges_configurations() {
        // Pairs (a, b) with symmetric moves; canonical form sorts the pair.
        let graph = FnGraph::new(vec![(0u8, 0u8)], |&(a, b): &(u8, u8)| {
            let mut next = Vec::new();
            if a < 2 {
                next.push((a + 1, b));
            }
            if b < 2 {
                next.push((a, b + 1));
            }
            next
        });
        let plain = Reachability::run(&graph, sequential()).unwrap();
        assert_eq!(plain.len(), 9);

        let mut explorer = Explorer::new(&graph, sequential())
            .with_canonicalizer(|&(a, b): &(u8, u8)| (a.min(b), a.max(b)));
        assert_eq!(explorer.run().unwrap(), 6);
    }

    #[test]
    fn test_parallel_matches_sequential() {
        let graph = ring(1000);
        let seq = Reachability::run(&graph, sequential()).unwrap();
        let par = Reachability::run(
            &graph,
            CheckConfig {
                parallel: true,
                ..Default::default()
            },
        )
        .unwrap();
        let a: HashSet<u32> = seq.configurations().into_iter().collect();
        let b: HashSet<u32> = par.configurations().into_iter().collect();
        assert_eq!(a, b);
    }

    #[test]
    fn test_progress_counters() {
        let progress = Arc::new(ProgressCounters::new());
        let graph = ring(20);
        let config = CheckConfig {
            progress: Some(Arc::clone(&progress)),
            ..sequential()
        };
        Reachability::run(&graph, config).unwrap();
        assert_eq!(progress.states.load(Ordering::Relaxed), 20);
        assert_eq!(progress.checked.load(Ordering::Relaxed), 20);
    }

    #[test]
    fn test_relation_labels_in_trace() {
        let relation = PiecewiseRelation::new(
            vec![0i32],
            Piecewise::new().leaf(|x: &i32| *x < 3, Rule::update("inc", |x: &i32| x + 1)),
        );
        let graph = RelationGraph::new(&relation);
        let reach = Reachability::run(&graph, sequential()).unwrap();
        let trace = reach.traceback(&3).unwrap();
        let labels: Vec<Option<&str>> = trace
            .iter()
            .map(|(_, l)| l.as_ref().map(|r| r.name()))
            .collect();
        assert_eq!(labels, vec![None, Some("inc"), Some("inc"), Some("inc")]);
    }
}
