use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::HarnessConfig;
use crate::db::{Connector, TableSetup};
use crate::error::{BenchError, Result};
use crate::models::{BenchmarkRecord, LoadJob, RunRecord, TimingSplit};
use crate::processors::scheduler::{JobReport, WorkerPool};
use crate::readers::RowSource;
use crate::strategies::LoadStrategy;
use crate::utils::progress::ProgressReporter;
use crate::writers::BenchmarkRecorder;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HarnessState {
    Idle,
    Preparing,
    Running,
    Draining,
    Reporting,
    Done,
}

/// Result of one harness run.
#[derive(Debug)]
pub struct RunSummary {
    /// Per-job records, sorted by hour.
    pub records: Vec<BenchmarkRecord>,
    pub run: RunRecord,
    pub reports: Vec<JobReport>,
    pub cancelled: bool,
}

impl RunSummary {
    pub fn failed_jobs(&self) -> usize {
        self.run.failed_jobs
    }
}

/// Drives one benchmark run from table preparation to the aggregate record.
pub struct Harness<C: Connector> {
    config: HarnessConfig,
    connector: Option<C>,
    strategy: Arc<dyn LoadStrategy<C::Session>>,
    source: Arc<dyn RowSource>,
    table_setup: Option<Box<dyn TableSetup<C::Session>>>,
    cancel: CancellationToken,
    state: HarnessState,
}

impl<C: Connector> Harness<C> {
    pub fn new(
        config: HarnessConfig,
        connector: C,
        strategy: Arc<dyn LoadStrategy<C::Session>>,
        source: Arc<dyn RowSource>,
    ) -> Self {
        Self {
            config,
            connector: Some(connector),
            strategy,
            source,
            table_setup: None,
            cancel: CancellationToken::new(),
            state: HarnessState::Idle,
        }
    }

    pub fn with_table_setup(mut self, setup: Box<dyn TableSetup<C::Session>>) -> Self {
        self.table_setup = Some(setup);
        self
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn state(&self) -> HarnessState {
        self.state
    }

    fn transition(&mut self, next: HarnessState) {
        debug!("Harness {:?} -> {:?}", self.state, next);
        self.state = next;
    }

    pub async fn run(&mut self) -> Result<RunSummary> {
        if self.state != HarnessState::Idle {
            return Err(BenchError::Config("harness has already run".to_string()));
        }
        self.config.check()?;
        let connector = self
            .connector
            .take()
            .ok_or_else(|| BenchError::Config("harness has already run".to_string()))?;

        let workers = self.config.workers;
        let method = self.config.method;
        let table_type = self.config.table_type;

        self.transition(HarnessState::Preparing);
        let run_started = Instant::now();

        let recorder = Arc::new(BenchmarkRecorder::<BenchmarkRecord>::open(
            &self.config.benchmarks_file,
        )?);
        let run_recorder = match self.config.parallel_benchmarks_file {
            Some(ref path) => Some(BenchmarkRecorder::<RunRecord>::open(path)?),
            None => None,
        };
        self.prepare(&connector).await?;

        let jobs = LoadJob::plan(self.config.hours, &self.config.table, method, table_type);
        info!(
            "Loading {} hours with {} using {} workers from {}",
            jobs.len(),
            method,
            workers,
            self.source.describe()
        );

        self.transition(HarnessState::Running);
        let pure_started = Instant::now();

        if jobs.is_empty() {
            let timing = TimingSplit::new(run_started.elapsed(), pure_started.elapsed());
            self.transition(HarnessState::Done);
            close_recorder(recorder)?;
            if let Some(r) = run_recorder {
                r.close()?;
            }
            return Ok(RunSummary {
                records: Vec::new(),
                run: RunRecord::summarize(method, table_type, workers, 0, &[], timing),
                reports: Vec::new(),
                cancelled: false,
            });
        }

        let progress = ProgressReporter::new(
            jobs.len() as u64,
            &format!("{} into {} table", method, table_type),
            !self.config.show_progress,
        );
        let pool = WorkerPool::new(
            connector,
            Arc::clone(&self.strategy),
            Arc::clone(&self.source),
            workers,
        )
        .with_cancellation(self.cancel.clone())
        .with_progress(progress)
        .with_recorder(Arc::clone(&recorder));

        let mut reports = pool.run(jobs).await?;
        let timing = TimingSplit::new(run_started.elapsed(), pure_started.elapsed());
        if let Some(p) = pool.progress() {
            p.finish_with_message(&format!("{} hours done", reports.len()));
        }
        drop(pool);

        // Records were appended as jobs completed; this only flushes them.
        self.transition(HarnessState::Draining);
        close_recorder(recorder)?;
        reports.sort_by_key(|r| r.job.index);
        let records: Vec<BenchmarkRecord> =
            reports.iter().map(|r| r.to_record(workers)).collect();

        self.transition(HarnessState::Reporting);
        let cancelled = self.cancel.is_cancelled();
        let run = RunRecord::summarize(
            method,
            table_type,
            workers,
            self.config.hours,
            &records,
            timing,
        );
        if let Some(r) = run_recorder {
            // A cancelled run did not cover every hour, so it gets no aggregate line.
            if cancelled {
                info!("Run cancelled; no aggregate record written to {}", r.path().display());
            } else {
                r.append(run.clone())?;
            }
            r.close()?;
        }

        info!(
            "{} rows in {:.2}s ({:.2}s loading), {} failed jobs{}",
            run.num_rows,
            run.seconds_full,
            run.seconds_pure,
            run.failed_jobs,
            if cancelled { ", cancelled" } else { "" }
        );

        self.transition(HarnessState::Done);
        Ok(RunSummary {
            records,
            run,
            reports,
            cancelled,
        })
    }

    /// Table setup and the strategy's own preparation, over one short-lived
    /// session. An unreachable database is left for the jobs to report.
    async fn prepare(&self, connector: &C) -> Result<()> {
        let mut session = match connector.connect().await {
            Ok(session) => session,
            Err(e) if self.table_setup.is_none() => {
                warn!("Skipping preparation: {}", e);
                return Ok(());
            }
            Err(e) => return Err(e),
        };

        if let Some(ref setup) = self.table_setup {
            setup.apply(&mut session).await?;
        }
        self.strategy.prepare(&mut session).await?;
        Ok(())
    }
}

/// Flush the per-job log once every worker has released its handle.
fn close_recorder(recorder: Arc<BenchmarkRecorder<BenchmarkRecord>>) -> Result<()> {
    match Arc::try_unwrap(recorder) {
        Ok(recorder) => {
            let lines = recorder.close()?;
            debug!("Wrote {} benchmark records", lines);
        }
        Err(shared) => warn!("{} is still shared; flushing on drop", shared.path().display()),
    }
    Ok(())
}
