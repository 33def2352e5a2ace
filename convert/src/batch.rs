//! Concurrent batch conversion.
//!
//! A feeder thread pushes jobs into a bounded queue, a fixed set of workers
//! drains it, and every finished job travels over a completion channel to the
//! aggregator. Each job runs on its own helper thread so a worker can give up
//! on it after `job_timeout_secs`; the abandoned helper finishes in the
//! background and its result is discarded. Abandoned helpers are counted in
//! the report and [`BatchRunner::lingering`] tells how many are still alive.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use serde::Serialize;
use template_bridge_core::{
    Strategy, SynthesizedTemplate, Template, TemplateFilter, TemplateFormat, TemplateRepository,
    ValidationResult,
};
use tracing::{debug, info, warn};

use crate::config::{BatchConfig, ConversionConfig};
use crate::error::ConversionError;
use crate::pipeline::{Conversion, convert_template};
use crate::report::{ConversionReport, JobReport};

/// A source template queued for conversion.
#[derive(Debug, Clone)]
pub struct ConversionJob {
    pub template: Template,
    /// Forces a strategy instead of classifying.
    pub strategy: Option<Strategy>,
}

impl ConversionJob {
    pub fn new(template: Template) -> Self {
        Self {
            template,
            strategy: None,
        }
    }
}

/// A target template produced by a batch, accepted or not.
#[derive(Debug, Clone, Serialize)]
pub struct ConvertedTemplate {
    pub synthesized: SynthesizedTemplate,
    pub validation: ValidationResult,
    pub accepted: bool,
}

/// Everything a batch run produced.
#[derive(Debug, Clone)]
pub struct BatchResult {
    pub report: ConversionReport,
    /// Templates that were synthesized, sorted by key.
    pub templates: Vec<ConvertedTemplate>,
}

impl BatchResult {
    /// Templates that cleared validation.
    pub fn accepted(&self) -> impl Iterator<Item = &ConvertedTemplate> {
        self.templates.iter().filter(|t| t.accepted)
    }
}

struct Completed {
    report: JobReport,
    template: Option<ConvertedTemplate>,
}

/// Work done for one job on its helper thread.
type JobFn = dyn Fn(&Template, Option<Strategy>, &ConversionConfig) -> Result<Conversion, ConversionError>
    + Send
    + Sync;

/// Decrements the live helper count when a helper thread exits, panics included.
struct HelperGuard(Arc<AtomicUsize>);

impl Drop for HelperGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::Relaxed);
    }
}

/// Runs conversion jobs on a bounded worker pool.
pub struct BatchRunner {
    conversion: Arc<ConversionConfig>,
    batch: BatchConfig,
    job_timeout: Duration,
    job_fn: Arc<JobFn>,
    completed: Arc<AtomicUsize>,
    helpers: Arc<AtomicUsize>,
}

impl std::fmt::Debug for BatchRunner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BatchRunner")
            .field("conversion", &self.conversion)
            .field("batch", &self.batch)
            .field("job_timeout", &self.job_timeout)
            .field("completed", &self.completed())
            .field("lingering", &self.lingering())
            .finish_non_exhaustive()
    }
}

impl BatchRunner {
    pub fn new(conversion: ConversionConfig, batch: BatchConfig) -> Self {
        let job_timeout = Duration::from_secs(batch.job_timeout_secs.max(1));
        Self {
            conversion: Arc::new(conversion),
            batch,
            job_timeout,
            job_fn: Arc::new(convert_template),
            completed: Arc::new(AtomicUsize::new(0)),
            helpers: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Replaces the per-job work and its time ceiling.
    #[cfg(test)]
    pub(crate) fn with_job_fn<F>(mut self, job_timeout: Duration, job_fn: F) -> Self
    where
        F: Fn(&Template, Option<Strategy>, &ConversionConfig) -> Result<Conversion, ConversionError>
            + Send
            + Sync
            + 'static,
    {
        self.job_timeout = job_timeout;
        self.job_fn = Arc::new(job_fn);
        self
    }

    /// Helper threads still running, including ones abandoned after a timeout.
    pub fn lingering(&self) -> usize {
        self.helpers.load(Ordering::Relaxed)
    }

    /// Jobs finished so far, across every run of this runner.
    pub fn completed(&self) -> usize {
        self.completed.load(Ordering::Relaxed)
    }

    /// Shared handle to the progress counter, for polling from another thread.
    pub fn progress(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.completed)
    }

    /// Converts every source template the filter selects from `store`.
    ///
    /// # Errors
    ///
    /// Store failures abort the run before any job starts; job failures never
    /// do and are captured in the report instead.
    pub fn run_from_store<R: TemplateRepository>(
        &self,
        store: &R,
        filter: &TemplateFilter,
        strategy: Option<Strategy>,
    ) -> Result<BatchResult, R::Error> {
        let mut filter = filter.clone();
        filter.format = Some(TemplateFormat::Source);
        let templates = store.fetch(&filter)?;
        info!(templates = templates.len(), "fetched source templates");
        let jobs = templates
            .into_iter()
            .map(|template| ConversionJob { template, strategy })
            .collect();
        Ok(self.run(jobs))
    }

    /// Runs every job and aggregates the results.
    pub fn run(&self, jobs: Vec<ConversionJob>) -> BatchResult {
        let started = Instant::now();
        let total = jobs.len();
        let workers = self.batch.effective_workers(total);
        let timeout = self.job_timeout;
        info!(jobs = total, workers, "starting batch");

        let (job_tx, job_rx) = mpsc::sync_channel::<ConversionJob>(self.batch.queue_capacity.max(1));
        let job_rx = Mutex::new(job_rx);
        let (done_tx, done_rx) = mpsc::channel::<Completed>();

        let mut reports = Vec::with_capacity(total);
        let mut templates = Vec::new();

        thread::scope(|scope| {
            scope.spawn(move || {
                for job in jobs {
                    if job_tx.send(job).is_err() {
                        break;
                    }
                }
            });

            for _ in 0..workers {
                let done_tx = done_tx.clone();
                let job_rx = &job_rx;
                scope.spawn(move || {
                    loop {
                        let next = match job_rx.lock() {
                            Ok(rx) => rx.recv(),
                            Err(_) => break,
                        };
                        let Ok(job) = next else {
                            break;
                        };
                        let completed = self.run_job(job, timeout);
                        self.completed.fetch_add(1, Ordering::Relaxed);
                        if done_tx.send(completed).is_err() {
                            break;
                        }
                    }
                });
            }
            drop(done_tx);

            for completed in done_rx {
                debug!(key = %completed.report.key, outcome = %completed.report.outcome, "job finished");
                reports.push(completed.report);
                templates.extend(completed.template);
            }
        });

        templates.sort_by(|a: &ConvertedTemplate, b| {
            a.synthesized.template.key.cmp(&b.synthesized.template.key)
        });
        let report = ConversionReport::new(reports, started.elapsed());
        info!(
            total = report.total,
            succeeded = report.count(crate::report::JobOutcome::Success),
            abandoned = report.abandoned,
            lingering = self.lingering(),
            elapsed_secs = report.elapsed_secs,
            "batch finished"
        );
        BatchResult { report, templates }
    }

    fn run_job(&self, job: ConversionJob, timeout: Duration) -> Completed {
        let started = Instant::now();
        let ConversionJob { template, strategy } = job;
        let (tx, rx) = mpsc::channel();
        let config = Arc::clone(&self.conversion);
        let job_fn = Arc::clone(&self.job_fn);
        let worker_template = template.clone();
        self.helpers.fetch_add(1, Ordering::Relaxed);
        let guard = HelperGuard(Arc::clone(&self.helpers));
        let spawned = thread::Builder::new()
            .name(format!("convert-{}", template.key))
            .spawn(move || {
                let guard = guard;
                let result = job_fn(&worker_template, strategy, &config);
                drop(guard);
                let _ = tx.send(result);
            });

        let outcome = match spawned {
            Ok(_) => match rx.recv_timeout(timeout) {
                Ok(result) => result,
                Err(RecvTimeoutError::Timeout) => {
                    warn!(key = %template.key, ?timeout, "job timed out");
                    Err(ConversionError::Timeout(timeout))
                }
                Err(RecvTimeoutError::Disconnected) => Err(ConversionError::Aborted(
                    "job thread exited without a result".to_string(),
                )),
            },
            Err(err) => {
                warn!(key = %template.key, error = %err, "running job on the worker thread");
                (self.job_fn)(&template, strategy, &self.conversion)
            }
        };

        let elapsed = started.elapsed();
        match outcome {
            Ok(conversion) => Completed {
                report: JobReport::from_conversion(&template, &conversion, elapsed),
                template: Some(ConvertedTemplate {
                    synthesized: conversion.synthesized,
                    validation: conversion.validation,
                    accepted: conversion.accepted,
                }),
            },
            Err(err) => Completed {
                report: JobReport::from_error(&template, &err, elapsed),
                template: None,
            },
        }
    }
}
