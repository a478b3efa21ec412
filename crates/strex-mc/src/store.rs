//! Reachable-set storage and parent tracing.

use crate::explorer::{CheckError, CheckResult};
use crate::relation::{Action, Configuration};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tracing::trace;

/// How a configuration was first reached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateInfo<C, L> {
    /// Configuration that first discovered this one (None for roots).
    pub predecessor: Option<C>,
    /// Label of the discovering edge (None for roots).
    pub label: Option<L>,
    /// Distance from a root along the recorded parent chain.
    pub depth: usize,
}

/// Root-first sequence of configurations. Each step after the first carries the
/// label of the edge that produced it.
pub type Trace<C, L> = Vec<(C, Option<L>)>;

/// Thread-safe reachable set plus parent map, keyed by configuration.
///
/// Insertion is atomic per configuration and the first insertion wins: later
/// rediscoveries through other predecessors are ignored. Under parallel
/// exploration the recorded parent is whichever insert won the race, so traces may
/// differ between runs while the reachable set does not.
pub struct StateStore<C, L> {
    states: DashMap<C, StateInfo<C, L>, ahash::RandomState>,
}

impl<C: Configuration, L: Action> StateStore<C, L> {
    pub fn new() -> Self {
        Self {
            states: DashMap::with_hasher(ahash::RandomState::new()),
        }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            states: DashMap::with_capacity_and_hasher(capacity, ahash::RandomState::new()),
        }
    }

    #[inline]
    pub fn contains(&self, config: &C) -> bool {
        self.states.contains_key(config)
    }

    /// Insert a root. Returns true if the configuration was new.
    pub fn insert_root(&self, config: C) -> bool {
        self.insert(config, None, None, 0)
    }

    /// Record the first discovery of `child` from `parent` via `label`.
    /// Returns false, leaving the existing record untouched, if `child` is known.
    pub fn record(&self, child: C, parent: C, label: L, depth: usize) -> bool {
        self.insert(child, Some(parent), Some(label), depth)
    }

    fn insert(&self, config: C, predecessor: Option<C>, label: Option<L>, depth: usize) -> bool {
        match self.states.entry(config) {
            Entry::Occupied(_) => false,
            Entry::Vacant(entry) => {
                entry.insert(StateInfo {
                    predecessor,
                    label,
                    depth,
                });
                true
            }
        }
    }

    /// Undo a record that overshot the state budget.
    pub(crate) fn remove(&self, config: &C) {
        self.states.remove(config);
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.states.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    pub fn get(&self, config: &C) -> Option<StateInfo<C, L>> {
        self.states.get(config).map(|r| r.value().clone())
    }

    /// The recorded predecessor and edge label of `config`.
    pub fn parent(&self, config: &C) -> Option<(C, L)> {
        let info = self.states.get(config)?;
        match (&info.predecessor, &info.label) {
            (Some(p), Some(l)) => Some((p.clone(), l.clone())),
            _ => None,
        }
    }

    pub fn depth(&self, config: &C) -> Option<usize> {
        self.states.get(config).map(|r| r.depth)
    }

    /// All stored configurations, in no particular order.
    pub fn configurations(&self) -> Vec<C> {
        self.states.iter().map(|r| r.key().clone()).collect()
    }

    /// Reconstruct the path from a root to `target` by following parent links.
    pub fn traceback(&self, target: &C) -> CheckResult<Trace<C, L>> {
        let Some(info) = self.get(target) else {
            return Err(CheckError::NotReachable {
                target: format!("{:?}", target),
            });
        };

        let mut trace = Vec::with_capacity(info.depth + 1);
        let mut current = target.clone();
        let mut info = info;
        loop {
            let StateInfo {
                predecessor, label, ..
            } = info;
            trace.push((current, label));
            let Some(prev) = predecessor else {
                break;
            };
            info = self.get(&prev).ok_or_else(|| CheckError::NotReachable {
                target: format!("{:?}", prev),
            })?;
            current = prev;
        }

        trace.reverse();
        trace!(len = trace.len(), "reconstructed trace");
        Ok(trace)
    }

    /// Drop every record, keeping the allocation.
    pub fn clear(&mut self) {
        self.states.clear();
    }
}

impl<C: Configuration, L: Action> Default for StateStore<C, L> {
    fn default() -> Self {
        Self::new()
    }
}
