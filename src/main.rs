//! visflow demo - Main Entry Point
//!
//! Builds a small processor network, evaluates it, edits a few properties and
//! logs what each evaluation re-ran.
//!
//! Usage: `visflow [config.toml] [snapshot.json]`

use anyhow::Context;
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use visflow::network::nodes::{
    BackgroundSquareProcessor, CollectorProcessor, ConstantSourceProcessor, ScaleProcessor,
    SumProcessor,
};
use visflow::network::{EvaluationReport, Network, NetworkEvaluator, PropertyRef};
use visflow::EngineConfig;

const JOB_TIMEOUT: Duration = Duration::from_secs(5);

fn main() -> anyhow::Result<()> {
    let mut args = std::env::args().skip(1);
    let config_path = match args.next() {
        Some(path) => PathBuf::from(path),
        None => EngineConfig::default_path()?,
    };
    let snapshot_path = args.next().map(PathBuf::from);
    let config = EngineConfig::load_or_default(&config_path);

    // Initialize logging
    let (file_layer, _guard) = match &config.logging.directory {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "visflow.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = tracing_subscriber::fmt::layer()
                .with_writer(writer)
                .with_ansi(false);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.logging.filter)),
        )
        .with(tracing_subscriber::fmt::layer())
        .with(file_layer)
        .init();

    tracing::info!("Starting visflow demo (config {:?})", config_path);

    let mut network = Network::with_config(&config);
    let mut evaluator = NetworkEvaluator::with_config(&network, &config.evaluation);

    let (source, scale, history) = {
        let mut network = network.lock_guard();
        let source = network.add_processor(ConstantSourceProcessor::new(2.0))?;
        let offset = network.add_processor_as(ConstantSourceProcessor::new(10.0), "Offset")?;
        let scale = network.add_processor(ScaleProcessor::new())?;
        let sum = network.add_processor(SumProcessor::new())?;
        let square = network.add_processor(BackgroundSquareProcessor::new())?;
        let collector = CollectorProcessor::new();
        let history = collector.history();
        let sink = network.add_processor(collector)?;

        network.connect(source, "out", scale, "in")?;
        network.connect(scale, "out", sum, "in")?;
        network.connect(offset, "out", sum, "in")?;
        network.connect(sum, "out", square, "in")?;
        network.connect(square, "out", sink, "in")?;
        (source, scale, history)
    };

    log_reports("initial", &evaluator.run_until_idle(&mut network, JOB_TIMEOUT));

    network
        .set_property(scale, "transform.factor", 3.0)
        .context("Failed to set scale factor")?;
    log_reports("factor = 3", &evaluator.run_until_idle(&mut network, JOB_TIMEOUT));

    // Unchanged value: no request, nothing re-runs.
    network.set_property(scale, "transform.factor", 3.0)?;
    if evaluator.evaluate_if_requested(&mut network).is_none() {
        tracing::info!("Setting an unchanged value requested no evaluation");
    }

    let offset = network
        .processor_by_identifier("Offset")
        .context("Offset processor missing")?;
    network.add_link(
        PropertyRef::new(source, "value"),
        PropertyRef::new(offset, "value"),
    )?;
    network.set_property(source, "value", 4.0)?;
    log_reports("linked value = 4", &evaluator.run_until_idle(&mut network, JOB_TIMEOUT));

    tracing::info!("Collected values: {:?}", history.borrow());

    if let Some(path) = snapshot_path {
        network
            .snapshot()
            .save_to_file(&path)
            .with_context(|| format!("Failed to save snapshot to {:?}", path))?;
        tracing::info!("Saved snapshot to {:?}", path);
    }

    tracing::info!("Shutting down...");
    Ok(())
}

fn log_reports(label: &str, reports: &[EvaluationReport]) {
    for (pass, report) in reports.iter().enumerate() {
        tracing::info!(
            "[{}] pass {}: executed {:?}, pending {:?}, failed {:?} in {:?}",
            label,
            pass + 1,
            report.executed,
            report.pending,
            report.failed,
            report.duration
        );
    }
}
