//! Background job pool for long-running processor work.
//!
//! Processors hand work to the pool from inside `process()`. Results come back
//! through a crossbeam channel and are applied by `Network::poll_jobs` on the
//! thread that owns the network, so the invalidation core itself stays
//! single-threaded.
//!
//! With zero worker threads the pool runs every job inline at submission time.
//! Results still go through the completion channel, so the observable behaviour
//! is the same, only deterministic.

use crate::network::id::ProcessorId;
use crate::network::port::DataHandle;
use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError, Sender};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::thread::JoinHandle;
use std::time::Duration;

pub(crate) type JobWork = Box<dyn FnOnce() -> Result<DataHandle, String> + Send + 'static>;

/// Work requested by a processor, targeting one of its outports.
pub(crate) struct JobRequest {
    pub outport: u16,
    pub work: JobWork,
}

struct Job {
    processor: ProcessorId,
    ticket: u64,
    outport: u16,
    work: JobWork,
}

impl Job {
    fn run(self) -> JobCompletion {
        let result = catch_unwind(AssertUnwindSafe(self.work))
            .unwrap_or_else(|_| Err("background job panicked".to_string()));
        JobCompletion {
            processor: self.processor,
            ticket: self.ticket,
            outport: self.outport,
            result,
        }
    }
}

/// Result of a finished job.
#[derive(Debug)]
pub struct JobCompletion {
    pub processor: ProcessorId,
    /// Matches the processor's pending ticket unless the job was superseded.
    pub ticket: u64,
    pub outport: u16,
    pub result: Result<DataHandle, String>,
}

pub struct JobPool {
    job_tx: Option<Sender<Job>>,
    done_tx: Sender<JobCompletion>,
    done_rx: Receiver<JobCompletion>,
    workers: Vec<JoinHandle<()>>,
    in_flight: usize,
}

impl JobPool {
    pub fn new(worker_threads: usize) -> Self {
        let (done_tx, done_rx) = unbounded();
        let mut pool = Self {
            job_tx: None,
            done_tx,
            done_rx,
            workers: Vec::new(),
            in_flight: 0,
        };
        if worker_threads == 0 {
            return pool;
        }

        let (job_tx, job_rx) = unbounded::<Job>();
        for index in 0..worker_threads {
            let job_rx = job_rx.clone();
            let done_tx = pool.done_tx.clone();
            let spawned = std::thread::Builder::new()
                .name(format!("visflow-job-{}", index))
                .spawn(move || {
                    for job in job_rx.iter() {
                        if done_tx.send(job.run()).is_err() {
                            break;
                        }
                    }
                });
            match spawned {
                Ok(handle) => pool.workers.push(handle),
                Err(e) => tracing::error!("Failed to spawn job worker {}: {}", index, e),
            }
        }

        if pool.workers.is_empty() {
            tracing::warn!("No job workers available, running jobs inline");
        } else {
            pool.job_tx = Some(job_tx);
            tracing::info!("Job pool started with {} worker(s)", pool.workers.len());
        }
        pool
    }

    /// A pool that runs jobs on the submitting thread.
    pub fn inline() -> Self {
        Self::new(0)
    }

    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }

    /// Jobs submitted whose completion has not been collected yet.
    pub fn in_flight(&self) -> usize {
        self.in_flight
    }

    pub(crate) fn submit(&mut self, processor: ProcessorId, ticket: u64, request: JobRequest) {
        self.in_flight += 1;
        let job = Job {
            processor,
            ticket,
            outport: request.outport,
            work: request.work,
        };
        let job = match &self.job_tx {
            Some(tx) => match tx.send(job) {
                Ok(()) => return,
                Err(err) => err.0,
            },
            None => job,
        };
        // The completion receiver lives in `self`, so this send cannot fail.
        let _ = self.done_tx.send(job.run());
    }

    pub(crate) fn try_completions(&mut self) -> Vec<JobCompletion> {
        let completions: Vec<JobCompletion> = self.done_rx.try_iter().collect();
        self.in_flight = self.in_flight.saturating_sub(completions.len());
        completions
    }

    pub(crate) fn wait_completion(&mut self, timeout: Duration) -> Option<JobCompletion> {
        match self.done_rx.recv_timeout(timeout) {
            Ok(completion) => {
                self.in_flight = self.in_flight.saturating_sub(1);
                Some(completion)
            }
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => None,
        }
    }
}

impl Default for JobPool {
    fn default() -> Self {
        Self::inline()
    }
}

impl Drop for JobPool {
    fn drop(&mut self) {
        self.job_tx.take();
        for worker in self.workers.drain(..) {
            let _ = worker.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn request(value: f64) -> JobRequest {
        JobRequest {
            outport: 0,
            work: Box::new(move || Ok(Arc::new(value) as DataHandle)),
        }
    }

    #[test]
    fn test_inline_pool_completes_on_submit() {
        let mut pool = JobPool::inline();
        assert_eq!(pool.worker_count(), 0);
        pool.submit(ProcessorId(3), 7, request(2.0));
        assert_eq!(pool.in_flight(), 1);

        let completions = pool.try_completions();
        assert_eq!(completions.len(), 1);
        assert_eq!(completions[0].processor, ProcessorId(3));
        assert_eq!(completions[0].ticket, 7);
        let value = completions[0].result.as_ref().unwrap().clone();
        assert_eq!(*value.downcast::<f64>().unwrap(), 2.0);
        assert_eq!(pool.in_flight(), 0);
    }

    #[test]
    fn test_threaded_pool_delivers_results() {
        let mut pool = JobPool::new(2);
        for ticket in 0..4 {
            pool.submit(ProcessorId(0), ticket, request(ticket as f64));
        }

        let mut tickets = Vec::new();
        while let Some(completion) = pool.wait_completion(Duration::from_secs(5)) {
            tickets.push(completion.ticket);
            if tickets.len() == 4 {
                break;
            }
        }
        tickets.sort();
        assert_eq!(tickets, vec![0, 1, 2, 3]);
        assert_eq!(pool.in_flight(), 0);
    }

    #[test]
    fn test_panicking_job_reports_error() {
        let mut pool = JobPool::inline();
        pool.submit(
            ProcessorId(0),
            1,
            JobRequest {
                outport: 0,
                work: Box::new(|| panic!("boom")),
            },
        );
        let completions = pool.try_completions();
        assert_eq!(
            completions[0].result.as_ref().unwrap_err(),
            "background job panicked"
        );
    }
}
