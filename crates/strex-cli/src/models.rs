//! Built-in demo models.

use std::fmt;
use strex_mc::{Invariant, Piecewise, PiecewiseRelation, Rule};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Phase {
    Idle,
    Waiting,
    Critical,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let c = match self {
            Phase::Idle => "I",
            Phase::Waiting => "W",
            Phase::Critical => "C",
        };
        f.write_str(c)
    }
}

/// Phases of Alice (`a`) and Bob (`b`).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct AliceBob {
    pub a: Phase,
    pub b: Phase,
}

impl fmt::Display for AliceBob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "a={}, b={}", self.a, self.b)
    }
}

/// Mutual exclusion between Alice and Bob.
///
/// Without `waiting`, each process moves `I -> C -> I` regardless of the other.
/// With it, a process moves `I -> W`, enters `C` from `W` only while the other
/// process is outside `C`, and returns to `I`.
pub fn alice_bob(waiting: bool) -> (PiecewiseRelation<AliceBob>, Vec<Invariant<AliceBob>>) {
    use Phase::*;

    let pieces = if waiting {
        Piecewise::new()
            .leaf(
                |s: &AliceBob| s.a == Idle,
                Rule::update("alice_wait", |s: &AliceBob| AliceBob { a: Waiting, ..*s }),
            )
            .leaf(
                |s: &AliceBob| s.a == Waiting && s.b != Critical,
                Rule::update("alice_enter", |s: &AliceBob| AliceBob { a: Critical, ..*s }),
            )
            .leaf(
                |s: &AliceBob| s.a == Critical,
                Rule::update("alice_leave", |s: &AliceBob| AliceBob { a: Idle, ..*s }),
            )
            .leaf(
                |s: &AliceBob| s.b == Idle,
                Rule::update("bob_wait", |s: &AliceBob| AliceBob { b: Waiting, ..*s }),
            )
            .leaf(
                |s: &AliceBob| s.b == Waiting && s.a != Critical,
                Rule::update("bob_enter", |s: &AliceBob| AliceBob { b: Critical, ..*s }),
            )
            .leaf(
                |s: &AliceBob| s.b == Critical,
                Rule::update("bob_leave", |s: &AliceBob| AliceBob { b: Idle, ..*s }),
            )
    } else {
        Piecewise::new()
            .leaf(
                |s: &AliceBob| s.a == Idle,
                Rule::update("alice_enter", |s: &AliceBob| AliceBob { a: Critical, ..*s }),
            )
            .leaf(
                |s: &AliceBob| s.a == Critical,
                Rule::update("alice_leave", |s: &AliceBob| AliceBob { a: Idle, ..*s }),
            )
            .leaf(
                |s: &AliceBob| s.b == Idle,
                Rule::update("bob_enter", |s: &AliceBob| AliceBob { b: Critical, ..*s }),
            )
            .leaf(
                |s: &AliceBob| s.b == Critical,
                Rule::update("bob_leave", |s: &AliceBob| AliceBob { b: Idle, ..*s }),
            )
    };

    let relation = PiecewiseRelation::new(vec![AliceBob { a: Idle, b: Idle }], pieces);
    let invariants = vec![Invariant::new("MutualExclusion", |s: &AliceBob| {
        !(s.a == Critical && s.b == Critical)
    })];
    (relation, invariants)
}

/// An integer that, while positive, may be negated or decremented, and while
/// negative is incremented. Zero has no enabled action.
pub fn signed(start: i64) -> (PiecewiseRelation<i64>, Vec<Invariant<i64>>) {
    let pieces = Piecewise::new()
        .nested(
            |x: &i64| *x > 0,
            Piecewise::new()
                .always(Rule::update("negate", |x: &i64| -x))
                .always(Rule::update("decrement", |x: &i64| x - 1)),
        )
        .leaf(|x: &i64| *x < 0, Rule::update("increment", |x: &i64| x + 1));
    let bound = start.unsigned_abs();
    let invariants = vec![Invariant::new("Bounded", move |x: &i64| {
        x.unsigned_abs() <= bound
    })];
    (PiecewiseRelation::new(vec![start], pieces), invariants)
}

/// Jug contents in litres.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Jugs(pub [u8; 3]);

impl fmt::Display for Jugs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.0[0], self.0[1], self.0[2])
    }
}

const CAPACITY: [u8; 3] = [8, 5, 3];

/// Share 8 litres between jugs of 8, 5 and 3 litres. The invariant claims the big
/// jug never holds exactly `target` litres, so a violation trace is a solution.
pub fn jugs(target: u8) -> (PiecewiseRelation<Jugs>, Vec<Invariant<Jugs>>) {
    let mut pieces = Piecewise::new();
    for from in 0..3 {
        for to in (0..3).filter(|&to| to != from) {
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
    let invariants = vec![Invariant::new(
        format!("Never{}", target),
        move |j: &Jugs| j.0[0] != target,
    )];
    (PiecewiseRelation::new(vec![Jugs([8, 0, 0])], pieces), invariants)
}
