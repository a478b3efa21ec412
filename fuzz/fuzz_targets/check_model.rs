#![no_main]
use libfuzzer_sys::fuzz_target;
use strex_mc::{CheckConfig, FnGraph, Invariant, Verifier};

// Each little-endian byte pair is the successor bitmask of one of 16
// configurations; the last byte picks the configuration to reach.
fuzz_target!(|data: &[u8]| {
    if data.is_empty() {
        return;
    }
    let edges: Vec<u16> = data
        .chunks(2)
        .map(|c| u16::from_le_bytes([c[0], *c.get(1).unwrap_or(&0)]))
        .collect();
    let root = (data[0] % 16) as usize;
    let graph = FnGraph::new(vec![root], move |c: &usize| {
        let mask = edges[*c % edges.len()];
        (0..16).filter(|b| mask & (1 << b) != 0).collect::<Vec<usize>>()
    });
    let bad = (data[data.len() - 1] % 16) as usize;

    let config = CheckConfig {
        parallel: false,
        check_deadlock: false,
        max_states: 1_000,
        max_depth: 50,
        max_time_secs: 2,
        ..CheckConfig::default()
    };
    let invariants = [Invariant::new("NotBad", move |c: &usize| *c != bad)];
    if let Ok(outcome) = Verifier::new(config).check_invariants(&graph, &invariants) {
        if let Some(trace) = outcome.trace() {
            assert_eq!(trace.last().map(|(c, _)| *c), Some(bad));
        }
    }
});
