//! Benchmarks for invalidation and evaluation
//!
//! Run with: cargo bench

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use visflow::network::nodes::{CollectorProcessor, ConstantSourceProcessor, ScaleProcessor, SumProcessor};
use visflow::network::{InvalidationLevel, Network, NetworkEvaluator, ProcessorId};
use visflow::observer::{AsObserver, Observable, Observer};

/// source -> scale x length -> collector
fn chain(length: usize) -> (Network, ProcessorId, ProcessorId) {
    let mut network = Network::new();
    let source = network
        .add_processor(ConstantSourceProcessor::new(1.0))
        .expect("source");
    let mut previous = source;
    let mut first = source;
    for i in 0..length {
        let scale = network.add_processor(ScaleProcessor::new()).expect("scale");
        network
            .connect(previous, "out", scale, "in")
            .expect("connect");
        if i == 0 {
            first = scale;
        }
        previous = scale;
    }
    let sink = network
        .add_processor(CollectorProcessor::new())
        .expect("sink");
    network.connect(previous, "out", sink, "in").expect("connect");
    (network, source, first)
}

/// One source fanned out to `width` scales joined by a sum
fn diamond(width: usize) -> (Network, ProcessorId) {
    let mut network = Network::new();
    let source = network
        .add_processor(ConstantSourceProcessor::new(1.0))
        .expect("source");
    let sum = network.add_processor(SumProcessor::new()).expect("sum");
    for _ in 0..width {
        let scale = network.add_processor(ScaleProcessor::new()).expect("scale");
        network.connect(source, "out", scale, "in").expect("connect");
        network.connect(scale, "out", sum, "in").expect("connect");
    }
    let sink = network
        .add_processor(CollectorProcessor::new())
        .expect("sink");
    network.connect(sum, "out", sink, "in").expect("connect");
    (network, source)
}

fn bench_chain_invalidation(c: &mut Criterion) {
    let mut group = c.benchmark_group("chain_invalidation");

    for length in [10, 100, 500].iter() {
        group.throughput(Throughput::Elements(*length as u64));
        group.bench_with_input(BenchmarkId::new("invalidate", length), length, |b, &length| {
            let (mut network, _, first) = chain(length);
            let mut evaluator = NetworkEvaluator::new(&network);
            evaluator.evaluate(&mut network);
            b.iter(|| {
                network
                    .invalidate(black_box(first), InvalidationLevel::InvalidOutput)
                    .expect("invalidate");
                evaluator.evaluate(&mut network)
            });
        });
    }

    group.finish();
}

fn bench_property_edit(c: &mut Criterion) {
    let mut group = c.benchmark_group("property_edit");

    for length in [10, 100].iter() {
        group.bench_with_input(BenchmarkId::new("set_and_evaluate", length), length, |b, &length| {
            let (mut network, source, _) = chain(length);
            let mut evaluator = NetworkEvaluator::new(&network);
            let mut value = 0.0;
            b.iter(|| {
                value += 1.0;
                network
                    .set_property(source, "value", black_box(value))
                    .expect("set");
                evaluator.evaluate(&mut network)
            });
        });
    }

    group.finish();
}

fn bench_diamond_evaluation(c: &mut Criterion) {
    let mut group = c.benchmark_group("diamond_evaluation");

    for width in [4, 32, 128].iter() {
        group.bench_with_input(BenchmarkId::new("fan_out", width), width, |b, &width| {
            let (mut network, source) = diamond(width);
            let mut evaluator = NetworkEvaluator::new(&network);
            evaluator.evaluate(&mut network);
            b.iter(|| {
                network
                    .invalidate(source, InvalidationLevel::InvalidOutput)
                    .expect("invalidate");
                evaluator.evaluate(&mut network)
            });
        });
    }

    group.finish();
}

struct Noop {
    observer: Observer,
}

impl AsObserver for Noop {
    fn as_observer(&self) -> &Observer {
        &self.observer
    }
}

fn bench_observer_notify(c: &mut Criterion) {
    let mut group = c.benchmark_group("observer_notify");

    for count in [1, 16, 256].iter() {
        let observable = Observable::<Noop>::new();
        let observers: Vec<_> = (0..*count)
            .map(|_| std::rc::Rc::new(Noop { observer: Observer::new() }))
            .collect();
        for observer in &observers {
            observable.add_observer(observer.clone());
        }
        group.throughput(Throughput::Elements(*count as u64));
        group.bench_with_input(BenchmarkId::new("for_each", count), count, |b, _| {
            b.iter(|| {
                let mut n = 0usize;
                observable.for_each_observer(|o| n += black_box(o).observer.id().raw() as usize & 1);
                n
            });
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_chain_invalidation,
    bench_property_edit,
    bench_diamond_evaluation,
    bench_observer_notify,
);

criterion_main!(benches);
