//! Snapshot-plus-diff replay for ListObservable
//!
//! A subscriber that takes a snapshot and applies every later change must end
//! up identical to the source, whatever sequence of mutations happened.

#![allow(missing_docs)]

use gamedex_core::reactive::{apply_change, ChannelStream, ListObservable};
use proptest::prelude::*;

#[derive(Debug, Clone)]
enum Op {
    Add(u8),
    AddAll(Vec<u8>),
    RemoveAt(usize),
    RemoveAll(Vec<u8>),
    Set(usize, u8),
    SetAll(Vec<u8>),
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        any::<u8>().prop_map(Op::Add),
        prop::collection::vec(any::<u8>(), 0..4).prop_map(Op::AddAll),
        any::<usize>().prop_map(Op::RemoveAt),
        prop::collection::vec(0u8..8, 0..3).prop_map(Op::RemoveAll),
        (any::<usize>(), any::<u8>()).prop_map(|(i, v)| Op::Set(i, v)),
        prop::collection::vec(any::<u8>(), 0..5).prop_map(Op::SetAll),
    ]
}

/// Apply `op` to `list`, mapping indices into range. Returns whether a change
/// should have been emitted.
fn run(list: &ListObservable<u8>, op: Op) -> bool {
    let len = list.len();
    match op {
        Op::Add(v) => {
            list.add(v % 8);
            true
        }
        Op::AddAll(vs) => {
            let emitted = !vs.is_empty();
            list.add_all(vs.into_iter().map(|v| v % 8).collect());
            emitted
        }
        Op::RemoveAt(i) if len > 0 => {
            list.remove_at(i % len);
            true
        }
        Op::RemoveAll(vs) => list.remove_all(&vs),
        Op::Set(i, v) if len > 0 => {
            list.set(i % len, v % 8);
            true
        }
        Op::SetAll(vs) => {
            list.set_all(vs.into_iter().map(|v| v % 8).collect());
            true
        }
        Op::RemoveAt(_) | Op::Set(..) => false,
    }
}

proptest! {
    #[test]
    fn replayed_diffs_reconstruct_source(
        seed in prop::collection::vec(0u8..8, 0..6),
        before in prop::collection::vec(op(), 0..5),
        after in prop::collection::vec(op(), 0..25),
    ) {
        let list = ListObservable::from_vec(seed);
        for op in before {
            run(&list, op);
        }

        let (mut mirror, mut changes) = list.subscribe_with_snapshot();
        let mut expected_events = 0;
        for op in after {
            if run(&list, op) {
                expected_events += 1;
            }
        }

        let mut received = 0;
        while let Some(change) = changes.try_recv() {
            apply_change(&mut mirror, change);
            received += 1;
        }

        prop_assert_eq!(mirror, list.to_vec());
        prop_assert_eq!(received, expected_events);
    }
}

fn drain<T>(stream: &mut ChannelStream<T>) -> Vec<T> {
    std::iter::from_fn(|| stream.try_recv()).collect()
}

#[test]
fn independent_subscribers_see_identical_sequences() {
    let list = ListObservable::new();
    let mut a = list.subscribe();
    let mut b = list.subscribe();

    list.add("x");
    list.set(0, "y");
    list.remove_at(0);

    let seen_a = drain(&mut a);
    let seen_b = drain(&mut b);
    assert_eq!(seen_a.len(), 3);
    assert_eq!(seen_a, seen_b);
}
