//! Invalidation walk, request coalescing and suppression

mod common;

use common::builders::TestNetwork;
use common::recorders::{NetworkRecorder, ProcessorRecorder};
use std::rc::Rc;
use visflow::network::InvalidationLevel;

fn attach(t: &TestNetwork) -> Rc<NetworkRecorder> {
    let recorder = Rc::new(NetworkRecorder::default());
    t.network.add_observer(recorder.clone());
    recorder
}

#[test]
fn test_chain_edit_requests_once_and_runs_each_once() {
    let (mut t, [p1, p2, p3]) = TestNetwork::chain();
    let recorder = attach(&t);

    assert!(t.network.set_property(p1, "value", 5.0).unwrap());
    assert_eq!(recorder.requests(), 1);
    assert_eq!(
        t.network.invalidation_level(p2),
        Some(InvalidationLevel::InvalidOutput)
    );
    assert!(!t.network.is_valid(p3));

    let report = t.evaluate();
    assert_eq!(report.executed, vec![p1, p2, p3]);
    assert_eq!(t.take_log(), vec!["P1", "P2", "P3"]);
    assert_eq!(t.value(p2), Some(5.0));
}

#[test]
fn test_setting_current_value_is_noop() {
    let (mut t, [_, p2, p3]) = TestNetwork::chain();
    let recorder = attach(&t);

    assert!(!t.network.set_property(p2, "value", 0.0).unwrap());
    assert_eq!(recorder.requests(), 0);
    assert!(t.network.is_valid(p2));
    assert!(t.network.is_valid(p3));
    assert!(t.evaluator.evaluate_if_requested(&mut t.network).is_none());
}

#[test]
fn test_repeated_invalidation_propagates_once() {
    let (mut t, [_, p2, p3]) = TestNetwork::chain();
    let sink_events = Rc::new(ProcessorRecorder::default());
    t.network
        .processor(p3)
        .unwrap()
        .observers()
        .add_observer(sink_events.clone());

    t.network
        .invalidate(p2, InvalidationLevel::InvalidResources)
        .unwrap();
    t.network
        .invalidate(p2, InvalidationLevel::InvalidOutput)
        .unwrap();
    t.network
        .invalidate(p2, InvalidationLevel::InvalidResources)
        .unwrap();

    assert_eq!(
        t.network.invalidation_level(p2),
        Some(InvalidationLevel::InvalidResources)
    );
    assert_eq!(*sink_events.begins.borrow(), vec![InvalidationLevel::InvalidOutput]);
    assert_eq!(sink_events.ends.get(), 1);
    assert_eq!(sink_events.evaluate_requests.get(), 1);
}

#[test]
fn test_composite_child_elevates_level() {
    let (mut t, [_, p2, p3]) = TestNetwork::chain();

    t.network.set_property(p2, "resources.size", 4i64).unwrap();

    assert_eq!(
        t.network.invalidation_level(p2),
        Some(InvalidationLevel::InvalidResources)
    );
    assert_eq!(
        t.network.invalidation_level(p3),
        Some(InvalidationLevel::InvalidOutput)
    );
}

#[test]
fn test_unknown_property_path_is_an_error() {
    let (mut t, [_, p2, _]) = TestNetwork::chain();
    assert!(t.network.set_property(p2, "resources.missing", 1i64).is_err());
    assert!(t.network.set_property(p2, "value", "text").is_err());
    assert!(t.network.is_valid(p2));
}

#[test]
fn test_suppressed_edits_replay_as_one_invalidation() {
    let (mut batched, [_, b2, b3]) = TestNetwork::chain();
    let (mut direct, [_, d2, d3]) = TestNetwork::chain();
    let recorder = attach(&batched);

    batched.network.disable_invalidation(b2).unwrap();
    batched.network.set_property(b2, "value", 1.0).unwrap();
    batched.network.set_property(b2, "resources.size", 2i64).unwrap();
    assert!(batched.network.is_valid(b2));
    assert!(batched.network.is_valid(b3));
    assert_eq!(recorder.requests(), 0);
    batched.network.enable_invalidation(b2).unwrap();
    assert_eq!(recorder.requests(), 1);

    direct.network.set_property(d2, "value", 1.0).unwrap();
    direct.network.set_property(d2, "resources.size", 2i64).unwrap();

    assert_eq!(
        batched.network.invalidation_level(b2),
        direct.network.invalidation_level(d2)
    );
    assert_eq!(
        batched.network.invalidation_level(b3),
        direct.network.invalidation_level(d3)
    );
}

#[test]
fn test_nested_suppression_replays_on_outermost_enable() {
    let (mut t, [_, p2, _]) = TestNetwork::chain();

    t.network.disable_invalidation(p2).unwrap();
    let inner = t
        .network
        .with_invalidation_disabled(p2, |n| n.set_property(p2, "value", 3.0))
        .unwrap();
    assert!(inner.unwrap());
    assert!(t.network.is_valid(p2));
    assert!(t.network.processor(p2).unwrap().is_invalidation_suppressed());

    t.network.enable_invalidation(p2).unwrap();
    assert_eq!(
        t.network.invalidation_level(p2),
        Some(InvalidationLevel::InvalidOutput)
    );
}

#[test]
fn test_enable_without_pending_invalidation_keeps_valid() {
    let (mut t, [_, p2, _]) = TestNetwork::chain();
    t.network.disable_invalidation(p2).unwrap();
    t.network.enable_invalidation(p2).unwrap();
    assert!(t.network.is_valid(p2));
}

#[test]
fn test_lock_collapses_requests() {
    let (mut t, [p1, p2, _]) = TestNetwork::chain();
    let recorder = attach(&t);

    {
        let mut network = t.network.lock_guard();
        network.set_property(p1, "value", 1.0).unwrap();
        network.set_property(p2, "value", 2.0).unwrap();
        network
            .invalidate(p2, InvalidationLevel::InvalidResources)
            .unwrap();
        assert!(network.is_locked());
        assert_eq!(recorder.requests(), 0);
    }

    assert!(!t.network.is_locked());
    assert_eq!(recorder.requests(), 1);
    let report = t.evaluate();
    assert_eq!(report.executed.len(), 3);
}

#[test]
fn test_nested_locks_request_on_final_unlock() {
    let (mut t, [p1, _, _]) = TestNetwork::chain();
    let recorder = attach(&t);

    t.network.lock();
    t.network.lock();
    t.network.set_property(p1, "value", 1.0).unwrap();
    t.network.unlock();
    assert_eq!(recorder.requests(), 0);
    t.network.unlock();
    assert_eq!(recorder.requests(), 1);

    // Unbalanced unlock is ignored.
    t.network.unlock();
    assert!(!t.network.is_locked());
    assert_eq!(recorder.requests(), 1);
}

#[test]
fn test_property_change_is_reported_once() {
    let (mut t, [p1, _, _]) = TestNetwork::chain();
    let recorder = attach(&t);

    t.network.set_property(p1, "value", 9.0).unwrap();
    assert_eq!(
        *recorder.events.borrow(),
        vec![format!("property {} value", p1)]
    );
    assert_eq!(recorder.requests(), 1);
}
