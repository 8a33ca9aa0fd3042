//! Network evaluator — runs invalid processors when the network asks for it.
//!
//! Each evaluation:
//! 1. Apply finished background jobs.
//! 2. Walk backward from every invalid sink (`traversal::evaluation_order`).
//! 3. Run each processor in that order if it is ready and its predecessors are valid.
//! 4. Record what happened in an `EvaluationReport`.
//!
//! A failing processor stays invalid and keeps its diagnostic; everything
//! downstream of it is reported as blocked. The rest of the pass continues.

use crate::config::EvaluationConfig;
use crate::network::graph::{Network, NetworkObserver, StepOutcome};
use crate::network::id::ProcessorId;
use crate::network::traversal;
use crate::observer::{AsObserver, Observer};
use std::cell::Cell;
use std::rc::Rc;
use std::time::{Duration, Instant};

/// Outcome of one evaluation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EvaluationReport {
    /// Processors that ran successfully, in execution order.
    pub executed: Vec<ProcessorId>,
    pub incomplete: Vec<ProcessorId>,
    pub failed: Vec<(ProcessorId, String)>,
    pub not_ready: Vec<ProcessorId>,
    pub blocked: Vec<ProcessorId>,
    /// Processors waiting on a background job.
    pub pending: Vec<ProcessorId>,
    pub duration: Duration,
}

impl EvaluationReport {
    /// Nothing ran and nothing is waiting.
    pub fn is_empty(&self) -> bool {
        self.executed.is_empty()
            && self.incomplete.is_empty()
            && self.failed.is_empty()
            && self.not_ready.is_empty()
            && self.blocked.is_empty()
            && self.pending.is_empty()
    }

    pub fn ran(&self, processor: ProcessorId) -> bool {
        self.executed.contains(&processor) || self.incomplete.contains(&processor)
    }
}

/// Listens for evaluation requests.
struct RequestFlag {
    observer: Observer,
    requested: Cell<bool>,
    requests: Cell<u64>,
}

impl AsObserver for RequestFlag {
    fn as_observer(&self) -> &Observer {
        &self.observer
    }
}

impl NetworkObserver for RequestFlag {
    fn on_evaluate_request(&self) {
        self.requested.set(true);
        self.requests.set(self.requests.get() + 1);
    }
}

pub struct NetworkEvaluator {
    flag: Rc<RequestFlag>,
    passes: u64,
    max_passes: usize,
    log_reports: bool,
}

impl NetworkEvaluator {
    /// Attach an evaluator to `network` with default settings.
    pub fn new(network: &Network) -> Self {
        Self::with_config(network, &EvaluationConfig::default())
    }

    pub fn with_config(network: &Network, config: &EvaluationConfig) -> Self {
        let flag = Rc::new(RequestFlag {
            observer: Observer::new(),
            requested: Cell::new(false),
            requests: Cell::new(0),
        });
        network.add_observer(flag.clone());
        Self {
            flag,
            passes: 0,
            max_passes: config.max_passes.max(1),
            log_reports: config.log_reports,
        }
    }

    /// An evaluation request arrived since the last evaluation.
    pub fn is_evaluation_requested(&self) -> bool {
        self.flag.requested.get()
    }

    /// Total evaluation requests received.
    pub fn request_count(&self) -> u64 {
        self.flag.requests.get()
    }

    /// Evaluations run so far.
    pub fn pass_count(&self) -> u64 {
        self.passes
    }

    /// Run every invalid processor that feeds an invalid sink.
    ///
    /// Does nothing while the network is locked.
    pub fn evaluate(&mut self, network: &mut Network) -> EvaluationReport {
        let mut report = EvaluationReport::default();
        if network.is_locked() {
            tracing::debug!("Network is locked, evaluation deferred");
            return report;
        }

        let start = Instant::now();
        network.poll_jobs();
        self.flag.requested.set(false);
        self.passes += 1;

        for processor in traversal::evaluation_order(network) {
            match network.evaluate_processor(processor) {
                StepOutcome::Executed => report.executed.push(processor),
                StepOutcome::Incomplete => report.incomplete.push(processor),
                StepOutcome::Failed(message) => report.failed.push((processor, message)),
                StepOutcome::NotReady => report.not_ready.push(processor),
                StepOutcome::Blocked => report.blocked.push(processor),
                StepOutcome::Pending => report.pending.push(processor),
                StepOutcome::Skipped => {}
            }
        }
        report.duration = start.elapsed();

        if self.log_reports {
            tracing::info!(
                "Evaluation {}: {} executed, {} incomplete, {} failed, {} not ready, {} blocked, {} pending in {:?}",
                self.passes,
                report.executed.len(),
                report.incomplete.len(),
                report.failed.len(),
                report.not_ready.len(),
                report.blocked.len(),
                report.pending.len(),
                report.duration
            );
        }
        report
    }

    /// Evaluate only if a request arrived since the last evaluation.
    pub fn evaluate_if_requested(&mut self, network: &mut Network) -> Option<EvaluationReport> {
        if !self.is_evaluation_requested() {
            return None;
        }
        Some(self.evaluate(network))
    }

    /// Evaluate, wait for background jobs, and repeat until nothing is left to
    /// do or the pass limit is reached.
    pub fn run_until_idle(&mut self, network: &mut Network, job_timeout: Duration) -> Vec<EvaluationReport> {
        let mut reports = Vec::new();
        for _ in 0..self.max_passes {
            reports.push(self.evaluate(network));

            if network.has_pending_jobs() {
                network.wait_for_jobs(job_timeout);
                if network.has_pending_jobs() && !self.is_evaluation_requested() {
                    tracing::warn!("Background jobs still running after {:?}", job_timeout);
                    return reports;
                }
            }
            if !self.is_evaluation_requested() {
                return reports;
            }
        }
        tracing::warn!("Network not idle after {} evaluation passes", self.max_passes);
        reports
    }
}

impl std::fmt::Debug for NetworkEvaluator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NetworkEvaluator")
            .field("passes", &self.passes)
            .field("requested", &self.flag.requested.get())
            .field("max_passes", &self.max_passes)
            .finish()
    }
}
