use futures::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::db::{Connector, Session};
use crate::error::{BenchError, LoadPhase, Result};
use crate::models::{BenchmarkRecord, LoadJob};
use crate::readers::RowSource;
use crate::strategies::{LoadOutcome, LoadStrategy, LoadUnit};
use crate::utils::progress::ProgressReporter;
use crate::writers::BenchmarkRecorder;

/// What happened to one job.
#[derive(Debug)]
pub struct JobReport {
    pub job: LoadJob,
    pub outcome: Result<LoadOutcome>,
    pub worker: usize,
    pub started: Instant,
    pub finished: Instant,
}

impl JobReport {
    pub fn elapsed(&self) -> Duration {
        self.finished.saturating_duration_since(self.started)
    }

    pub fn is_success(&self) -> bool {
        self.outcome.is_ok()
    }

    pub fn to_record(&self, workers: usize) -> BenchmarkRecord {
        match &self.outcome {
            Ok(outcome) => BenchmarkRecord::success(&self.job, workers, outcome.rows, outcome.timing),
            Err(e) => BenchmarkRecord::failure(&self.job, workers, self.elapsed(), e),
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic payload".to_string())
}

struct PoolShared<C: Connector> {
    connector: Arc<C>,
    strategy: Arc<dyn LoadStrategy<C::Session>>,
    source: Arc<dyn RowSource>,
    cancel: CancellationToken,
    progress: Option<Arc<ProgressReporter>>,
    recorder: Option<Arc<BenchmarkRecorder<BenchmarkRecord>>>,
    workers: usize,
}

impl<C: Connector> Clone for PoolShared<C> {
    fn clone(&self) -> Self {
        Self {
            connector: Arc::clone(&self.connector),
            strategy: Arc::clone(&self.strategy),
            source: Arc::clone(&self.source),
            cancel: self.cancel.clone(),
            progress: self.progress.clone(),
            recorder: self.recorder.clone(),
            workers: self.workers,
        }
    }
}

impl<C: Connector> PoolShared<C> {
    /// Materialize the batch, make sure the worker has a usable session,
    /// then hand both to the strategy.
    async fn execute(&self, job: &LoadJob, slot: &mut Option<C::Session>) -> Result<LoadOutcome> {
        let (batch, materialize) = if self.strategy.needs_batch() {
            let source = Arc::clone(&self.source);
            let index = job.index;
            let started = Instant::now();
            let batch = tokio::task::spawn_blocking(move || source.batch(index)).await??;
            (Some(batch), started.elapsed())
        } else {
            (None, Duration::ZERO)
        };

        if !self.strategy.needs_session() {
            let outcome = self
                .strategy
                .load_detached(LoadUnit::new(job.index, batch.as_ref()))
                .await?;
            return Ok(LoadOutcome {
                rows: outcome.rows,
                timing: outcome.timing.with_overhead(materialize),
            });
        }

        let session = match slot.take() {
            Some(session) if session.is_usable() => slot.insert(session),
            stale => {
                if stale.is_some() {
                    debug!("Replacing broken session before hour {}", job.index);
                }
                drop(stale);
                slot.insert(self.connector.connect().await?)
            }
        };

        let outcome = self
            .strategy
            .load(LoadUnit::new(job.index, batch.as_ref()), session)
            .await?;

        Ok(LoadOutcome {
            rows: outcome.rows,
            timing: outcome.timing.with_overhead(materialize),
        })
    }

    /// Run one job, racing it against cancellation. A panic inside the job
    /// becomes a failed report for that job alone.
    async fn run_job(&self, job: LoadJob, worker: usize, slot: &mut Option<C::Session>) -> JobReport {
        let started = Instant::now();
        let mut panicked = false;
        let outcome = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(BenchError::Cancelled),
            caught = AssertUnwindSafe(self.execute(&job, slot)).catch_unwind() => match caught {
                Ok(outcome) => outcome,
                Err(payload) => {
                    panicked = true;
                    Err(BenchError::load(
                        job.method,
                        LoadPhase::Execute,
                        format!("panicked: {}", panic_message(payload.as_ref())),
                    ))
                }
            },
        };
        let finished = Instant::now();

        match &outcome {
            Ok(o) => debug!("Worker {} loaded hour {} ({} rows)", worker, job.index, o.rows),
            Err(BenchError::Cancelled) => debug!("Worker {} cancelled hour {}", worker, job.index),
            Err(e) => warn!("Worker {} failed hour {}: {}", worker, job.index, e),
        }
        // A cancelled or panicked job may leave the session mid-statement.
        if panicked || matches!(outcome, Err(BenchError::Cancelled)) {
            slot.take();
        }

        let report = JobReport {
            job,
            outcome,
            worker,
            started,
            finished,
        };
        if let Some(ref recorder) = self.recorder {
            if let Err(e) = recorder.append(report.to_record(self.workers)) {
                error!("Failed to record hour {}: {}", report.job.index, e);
            }
        }
        if let Some(ref p) = self.progress {
            p.increment(1);
        }
        report
    }
}

/// Bounded pool of workers, each owning at most one database session.
pub struct WorkerPool<C: Connector> {
    shared: PoolShared<C>,
}

impl<C: Connector> WorkerPool<C> {
    pub fn new(
        connector: C,
        strategy: Arc<dyn LoadStrategy<C::Session>>,
        source: Arc<dyn RowSource>,
        workers: usize,
    ) -> Self {
        Self {
            shared: PoolShared {
                connector: Arc::new(connector),
                strategy,
                source,
                cancel: CancellationToken::new(),
                progress: None,
                recorder: None,
                workers: workers.max(1),
            },
        }
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.shared.cancel = cancel;
        self
    }

    pub fn with_progress(mut self, progress: ProgressReporter) -> Self {
        self.shared.progress = Some(Arc::new(progress));
        self
    }

    /// Append each job's record as soon as the job completes.
    pub fn with_recorder(mut self, recorder: Arc<BenchmarkRecorder<BenchmarkRecord>>) -> Self {
        self.shared.recorder = Some(recorder);
        self
    }

    pub fn progress(&self) -> Option<&ProgressReporter> {
        self.shared.progress.as_deref()
    }

    /// Run every job once. Reports come back in completion order.
    pub async fn run(&self, jobs: Vec<LoadJob>) -> Result<Vec<JobReport>> {
        if jobs.is_empty() {
            return Ok(Vec::new());
        }

        if self.shared.workers == 1 {
            Ok(self.run_sequential(jobs).await)
        } else {
            self.run_parallel(jobs).await
        }
    }

    /// One session, one job at a time, in index order.
    async fn run_sequential(&self, jobs: Vec<LoadJob>) -> Vec<JobReport> {
        let total = jobs.len();
        let mut session = None;
        let mut reports = Vec::with_capacity(total);

        for job in jobs {
            if self.shared.cancel.is_cancelled() {
                info!("Cancelled; {} of {} jobs not started", total - reports.len(), total);
                break;
            }
            reports.push(self.shared.run_job(job, 0, &mut session).await);
        }

        reports
    }

    async fn run_parallel(&self, jobs: Vec<LoadJob>) -> Result<Vec<JobReport>> {
        let total = jobs.len();
        let worker_count = self.shared.workers.min(total);

        let (job_tx, job_rx) = crossbeam::channel::unbounded();
        for job in jobs {
            let _ = job_tx.send(job);
        }
        drop(job_tx);

        let (report_tx, mut report_rx) = mpsc::unbounded_channel();
        let mut tasks = JoinSet::new();

        for worker in 0..worker_count {
            let shared = self.shared.clone();
            let queue = job_rx.clone();
            let results = report_tx.clone();

            tasks.spawn(async move {
                let mut session: Option<C::Session> = None;
                loop {
                    if shared.cancel.is_cancelled() {
                        break;
                    }
                    let Ok(job) = queue.try_recv() else {
                        break;
                    };
                    let report = shared.run_job(job, worker, &mut session).await;
                    if results.send(report).is_err() {
                        break;
                    }
                }
                debug!("Worker {} finished", worker);
            });
        }
        drop(report_tx);

        let mut reports = Vec::with_capacity(total);
        while let Some(report) = report_rx.recv().await {
            reports.push(report);
        }

        while let Some(joined) = tasks.join_next().await {
            joined?;
        }

        if reports.len() < total {
            info!("{} of {} jobs were not started", total - reports.len(), total);
        }
        Ok(reports)
    }
}
