//! Saving and restoring networks

mod common;

use std::rc::Rc;
use common::recorders::NetworkRecorder;
use visflow::network::nodes::{CollectorProcessor, ConstantSourceProcessor, ScaleProcessor};
use visflow::network::snapshot::SNAPSHOT_VERSION;
use visflow::network::{
    Network, NetworkEvaluator, NetworkSnapshot, ProcessorRegistry, PropertyRef, PropertyValue,
};

fn build() -> Network {
    let mut network = Network::new();
    let source = network.add_processor(ConstantSourceProcessor::new(2.0)).unwrap();
    let other = network
        .add_processor_as(ConstantSourceProcessor::new(0.0), "Mirror")
        .unwrap();
    let scale = network.add_processor(ScaleProcessor::new()).unwrap();
    let sink = network.add_processor(CollectorProcessor::new()).unwrap();
    network.connect(source, "out", scale, "in").unwrap();
    network.connect(scale, "out", sink, "in").unwrap();
    network.set_property(scale, "transform.offset", 0.5).unwrap();
    network
        .add_link(PropertyRef::new(source, "value"), PropertyRef::new(other, "value"))
        .unwrap();
    network
}

#[test]
fn test_file_roundtrip_restores_structure() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("network.json");
    build().snapshot().save_to_file(&path).unwrap();

    let snapshot = NetworkSnapshot::load_from_file(&path).unwrap();
    assert_eq!(snapshot.version, SNAPSHOT_VERSION);

    let mut network = Network::new();
    let recorder = Rc::new(NetworkRecorder::default());
    network.add_observer(recorder.clone());
    let report = network.restore(&snapshot, &ProcessorRegistry::with_builtins());

    assert!(report.warnings.is_empty(), "{:?}", report.warnings);
    assert_eq!(report.processors.len(), 4);
    assert_eq!(report.connections, 2);
    assert_eq!(report.links, 1);
    assert_eq!(recorder.requests(), 1);

    let scale = network.processor_by_identifier("Scale").unwrap();
    assert_eq!(
        network.property_value(scale, "transform.offset"),
        Some(&PropertyValue::Float(0.5))
    );
    assert_eq!(network.snapshot().connections, snapshot.connections);
    assert_eq!(network.snapshot().links, snapshot.links);
}

#[test]
fn test_restored_network_evaluates() {
    let snapshot = build().snapshot();
    let mut network = Network::new();
    let mut evaluator = NetworkEvaluator::new(&network);
    network.restore(&snapshot, &ProcessorRegistry::with_builtins());

    let report = evaluator.evaluate(&mut network);
    assert_eq!(report.executed.len(), 3);

    let scale = network.processor_by_identifier("Scale").unwrap();
    let out = network.outport(scale, "out").unwrap();
    assert_eq!(network.outport_value::<f64>(out).as_deref(), Some(&2.5));
}

#[test]
fn test_restore_into_populated_network_renames() {
    let snapshot = build().snapshot();
    let mut network = build();
    let report = network.restore(&snapshot, &ProcessorRegistry::with_builtins());

    assert!(report.warnings.is_empty(), "{:?}", report.warnings);
    assert_eq!(network.processor_count(), 8);
    assert!(network.processor_by_identifier("Scale 2").is_some());
    assert!(network.processor_by_identifier("Mirror 2").is_some());
    assert_eq!(network.connections().len(), 4);
}

#[test]
fn test_load_rejects_newer_version() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("future.json");
    let mut snapshot = build().snapshot();
    snapshot.version = SNAPSHOT_VERSION + 1;
    snapshot.save_to_file(&path).unwrap();

    assert!(NetworkSnapshot::load_from_file(&path).is_err());
    assert!(NetworkSnapshot::load_from_file(dir.path().join("missing.json")).is_err());
}
