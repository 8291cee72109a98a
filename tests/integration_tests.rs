use async_trait::async_trait;
use pretty_assertions::assert_eq;
use std::collections::HashSet;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

use weather_load_bench::config::{HarnessConfig, SourceConfig};
use weather_load_bench::db::{Connector, Session};
use weather_load_bench::error::{BenchError, LoadPhase, Result};
use weather_load_bench::models::{
    BenchmarkRecord, LoadJob, LogRecord, Method, RunRecord, Stopwatch, TableType,
};
use weather_load_bench::processors::{Harness, HarnessState, WorkerPool};
use weather_load_bench::readers::{RowLimit, RowSource, SyntheticReader};
use weather_load_bench::strategies::{LoadOutcome, LoadStrategy, LoadUnit};

const GRID_ROWS: usize = 4 * 8;

#[derive(Default)]
struct Counters {
    live: AtomicUsize,
    peak: AtomicUsize,
    opened: AtomicUsize,
}

struct FakeSession {
    counters: Arc<Counters>,
    broken: bool,
}

impl Session for FakeSession {
    fn is_usable(&self) -> bool {
        !self.broken
    }
}

impl Drop for FakeSession {
    fn drop(&mut self) {
        self.counters.live.fetch_sub(1, Ordering::SeqCst);
    }
}

struct FakeConnector {
    counters: Arc<Counters>,
    reachable: bool,
}

impl FakeConnector {
    fn new(reachable: bool) -> (Self, Arc<Counters>) {
        let counters = Arc::new(Counters::default());
        (
            Self {
                counters: Arc::clone(&counters),
                reachable,
            },
            counters,
        )
    }
}

#[async_trait]
impl Connector for FakeConnector {
    type Session = FakeSession;

    async fn connect(&self) -> Result<FakeSession> {
        if !self.reachable {
            return Err(BenchError::connection(self.target(), "connection refused"));
        }
        self.counters.opened.fetch_add(1, Ordering::SeqCst);
        let now = self.counters.live.fetch_add(1, Ordering::SeqCst) + 1;
        self.counters.peak.fetch_max(now, Ordering::SeqCst);
        Ok(FakeSession {
            counters: Arc::clone(&self.counters),
            broken: false,
        })
    }

    fn target(&self) -> String {
        "fake:5432/weather".to_string()
    }
}

/// Sleeps for `delay` as its "database" phase and fails the listed hours.
struct FakeStrategy {
    method: Method,
    delay: Duration,
    fail_on: HashSet<usize>,
    panic_on: HashSet<usize>,
    stall_on: HashSet<usize>,
    detached: bool,
}

impl FakeStrategy {
    fn new(method: Method, delay: Duration) -> Self {
        Self {
            method,
            delay,
            fail_on: HashSet::new(),
            panic_on: HashSet::new(),
            stall_on: HashSet::new(),
            detached: false,
        }
    }

    fn failing(mut self, hours: &[usize]) -> Self {
        self.fail_on = hours.iter().copied().collect();
        self
    }

    fn panicking(mut self, hours: &[usize]) -> Self {
        self.panic_on = hours.iter().copied().collect();
        self
    }

    fn stalling(mut self, hours: &[usize]) -> Self {
        self.stall_on = hours.iter().copied().collect();
        self
    }

    /// Behaves like an external tool that never touches the harness session.
    fn detached(mut self) -> Self {
        self.detached = true;
        self
    }

    async fn simulate(&self, unit: LoadUnit<'_>) -> Result<LoadOutcome> {
        let batch = unit.require_batch(self.method)?;
        let mut watch = Stopwatch::start();
        let delay = if self.stall_on.contains(&unit.index) {
            Duration::from_secs(30)
        } else {
            self.delay
        };
        watch.pure(tokio::time::sleep(delay)).await;

        if self.panic_on.contains(&unit.index) {
            panic!("simulated panic in hour {}", unit.index);
        }
        if self.fail_on.contains(&unit.index) {
            return Err(BenchError::load(self.method, LoadPhase::Insert, "simulated failure"));
        }
        Ok(LoadOutcome {
            rows: batch.row_count(),
            timing: watch.finish(),
        })
    }
}

#[async_trait]
impl LoadStrategy<FakeSession> for FakeStrategy {
    fn method(&self) -> Method {
        self.method
    }

    fn needs_session(&self) -> bool {
        !self.detached
    }

    async fn load(&self, unit: LoadUnit<'_>, session: &mut FakeSession) -> Result<LoadOutcome> {
        let outcome = self.simulate(unit).await;
        if outcome.is_err() {
            session.broken = true;
        }
        outcome
    }

    async fn load_detached(&self, unit: LoadUnit<'_>) -> Result<LoadOutcome> {
        self.simulate(unit).await
    }
}

fn shared(strategy: FakeStrategy) -> Arc<dyn LoadStrategy<FakeSession>> {
    Arc::new(strategy)
}

fn source() -> Arc<dyn RowSource> {
    Arc::new(SyntheticReader::with_grid(4, 8))
}

fn harness_config(dir: &Path, method: Method, workers: usize, hours: usize) -> HarnessConfig {
    let mut config = HarnessConfig::new(method, TableType::Hyper, workers, hours);
    config.database.db_name = "weather".to_string();
    config.database.user = "postgres".to_string();
    config.load.csv_dir = Some(dir.join("csv"));
    config.benchmarks_file = dir.join("benchmarks.csv");
    config.parallel_benchmarks_file = Some(dir.join("parallel_benchmarks.csv"));
    config
}

fn read_records<T: serde::de::DeserializeOwned>(path: &Path) -> Vec<T> {
    csv::Reader::from_path(path)
        .unwrap()
        .deserialize()
        .collect::<std::result::Result<Vec<T>, _>>()
        .unwrap()
}

fn jobs(hours: usize) -> Vec<LoadJob> {
    LoadJob::plan(hours, "weather", Method::CopyBinary, TableType::Regular)
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_pool_never_exceeds_worker_count() -> Result<()> {
    let (connector, counters) = FakeConnector::new(true);
    let strategy = shared(FakeStrategy::new(Method::CopyBinary, Duration::from_millis(20)));
    let pool = WorkerPool::new(connector, strategy, source(), 3);

    let reports = pool.run(jobs(10)).await?;

    assert_eq!(reports.len(), 10);
    assert!(reports.iter().all(|r| r.is_success()));
    assert!(counters.peak.load(Ordering::SeqCst) <= 3);
    assert!(counters.opened.load(Ordering::SeqCst) <= 3);

    let indices: HashSet<usize> = reports.iter().map(|r| r.job.index).collect();
    assert_eq!(indices.len(), 10);
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_single_worker_runs_jobs_in_order_without_overlap() -> Result<()> {
    let (connector, counters) = FakeConnector::new(true);
    let strategy = shared(FakeStrategy::new(Method::RowInsert, Duration::from_millis(5)));
    let pool = WorkerPool::new(connector, strategy, source(), 1);

    let reports = pool.run(jobs(5)).await?;

    let order: Vec<usize> = reports.iter().map(|r| r.job.index).collect();
    assert_eq!(order, vec![0, 1, 2, 3, 4]);
    for pair in reports.windows(2) {
        assert!(pair[1].started >= pair[0].finished);
    }
    assert_eq!(counters.opened.load(Ordering::SeqCst), 1);
    assert_eq!(counters.peak.load(Ordering::SeqCst), 1);
    Ok(())
}

#[tokio::test]
async fn test_broken_session_is_replaced() -> Result<()> {
    let (connector, counters) = FakeConnector::new(true);
    let strategy =
        shared(FakeStrategy::new(Method::CopyBinary, Duration::from_millis(1)).failing(&[0]));
    let pool = WorkerPool::new(connector, strategy, source(), 1);

    let reports = pool.run(jobs(3)).await?;

    assert!(!reports[0].is_success());
    assert!(reports[1].is_success());
    assert_eq!(counters.opened.load(Ordering::SeqCst), 2);
    assert_eq!(counters.live.load(Ordering::SeqCst), 0);
    Ok(())
}

#[tokio::test]
async fn test_cancelled_pool_starts_nothing() -> Result<()> {
    let (connector, counters) = FakeConnector::new(true);
    let strategy = shared(FakeStrategy::new(Method::CopyBinary, Duration::from_millis(1)));
    let cancel = CancellationToken::new();
    cancel.cancel();

    let pool = WorkerPool::new(connector, strategy, source(), 4).with_cancellation(cancel);
    let reports = pool.run(jobs(6)).await?;

    assert!(reports.is_empty());
    assert_eq!(counters.opened.load(Ordering::SeqCst), 0);
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_cancel_aborts_in_flight_jobs() -> Result<()> {
    let (connector, counters) = FakeConnector::new(true);
    let strategy = shared(FakeStrategy::new(Method::CopyBinary, Duration::from_secs(30)));
    let cancel = CancellationToken::new();
    let pool =
        WorkerPool::new(connector, strategy, source(), 2).with_cancellation(cancel.clone());

    let trigger = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        cancel.cancel();
    });
    let reports = tokio::time::timeout(Duration::from_secs(10), pool.run(jobs(6)))
        .await
        .expect("cancellation should end the run")?;
    trigger.await?;

    assert_eq!(reports.len(), 2);
    assert!(reports
        .iter()
        .all(|r| matches!(r.outcome, Err(BenchError::Cancelled))));
    assert_eq!(counters.live.load(Ordering::SeqCst), 0);
    Ok(())
}

#[tokio::test]
async fn test_panicking_job_drops_its_session_and_sequence_continues() -> Result<()> {
    let (connector, counters) = FakeConnector::new(true);
    let strategy =
        shared(FakeStrategy::new(Method::RowInsert, Duration::from_millis(1)).panicking(&[0]));
    let pool = WorkerPool::new(connector, strategy, source(), 1);

    let reports = pool.run(jobs(3)).await?;

    assert_eq!(reports.len(), 3);
    match &reports[0].outcome {
        Err(e) => {
            assert_eq!(e.kind().as_str(), "LoadError");
            assert!(e.to_string().contains("simulated panic in hour 0"));
        }
        Ok(_) => panic!("hour 0 should have failed"),
    }
    assert!(reports[1].is_success() && reports[2].is_success());
    assert_eq!(counters.opened.load(Ordering::SeqCst), 2);
    assert_eq!(counters.live.load(Ordering::SeqCst), 0);
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_detached_jobs_never_open_sessions() -> Result<()> {
    let dir = TempDir::new()?;
    let (connector, counters) = FakeConnector::new(false);
    let strategy = shared(
        FakeStrategy::new(Method::TimescaledbParallelCopy, Duration::from_millis(1)).detached(),
    );
    let config = harness_config(dir.path(), Method::TimescaledbParallelCopy, 2, 3);

    let summary = Harness::new(config, connector, strategy, source()).run().await?;

    assert_eq!(summary.failed_jobs(), 0);
    assert_eq!(summary.run.num_rows, 3 * GRID_ROWS);
    assert_eq!(counters.opened.load(Ordering::SeqCst), 0);
    Ok(())
}

#[tokio::test]
async fn test_scenario_a_sequential_row_insert() -> Result<()> {
    let dir = TempDir::new()?;
    let (connector, _) = FakeConnector::new(true);
    let strategy = shared(FakeStrategy::new(Method::RowInsert, Duration::from_millis(2)));
    let config = harness_config(dir.path(), Method::RowInsert, 1, 2);

    let mut harness = Harness::new(config, connector, strategy, source());
    let summary = harness.run().await?;
    assert_eq!(harness.state(), HarnessState::Done);

    let records: Vec<BenchmarkRecord> = read_records(&dir.path().join("benchmarks.csv"));
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].hour, 0);
    assert_eq!(records[1].hour, 1);
    for record in &records {
        assert_eq!(record.method, Method::RowInsert);
        assert_eq!(record.workers, 1);
        assert_eq!(record.num_rows, GRID_ROWS);
        assert!(record.seconds_pure.unwrap() <= record.seconds_full);
    }
    assert_eq!(summary.records, records);
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_scenario_b_parallel_copy_csv() -> Result<()> {
    let dir = TempDir::new()?;
    let (connector, counters) = FakeConnector::new(true);
    let strategy = shared(FakeStrategy::new(Method::CopyCsv, Duration::from_millis(20)));
    let config = harness_config(dir.path(), Method::CopyCsv, 4, 4);

    let summary = Harness::new(config, connector, strategy, source()).run().await?;

    let records: Vec<BenchmarkRecord> = read_records(&dir.path().join("benchmarks.csv"));
    assert_eq!(records.len(), 4);
    assert!(records.iter().all(|r| r.is_success()));

    let runs: Vec<RunRecord> = read_records(&dir.path().join("parallel_benchmarks.csv"));
    assert_eq!(runs.len(), 1);
    assert_eq!(runs[0].num_rows, 4 * GRID_ROWS);
    assert_eq!(runs[0].hours, 4);
    assert_eq!(runs[0].failed_jobs, 0);
    assert!(runs[0].seconds_pure <= runs[0].seconds_full);
    assert_eq!(summary.run.num_rows, 4 * GRID_ROWS);

    assert!(counters.peak.load(Ordering::SeqCst) <= 4);
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_scenario_c_unreachable_database() -> Result<()> {
    let dir = TempDir::new()?;
    let (connector, _) = FakeConnector::new(false);
    let strategy = shared(FakeStrategy::new(Method::CopyBinary, Duration::from_millis(1)));
    let config = harness_config(dir.path(), Method::CopyBinary, 2, 3);

    let summary = Harness::new(config, connector, strategy, source()).run().await?;

    let records: Vec<BenchmarkRecord> = read_records(&dir.path().join("benchmarks.csv"));
    assert_eq!(records.len(), 3);
    assert!(records.iter().all(|r| r.status == "ConnectionError"));
    assert!(records.iter().all(|r| r.rate_full.is_none()));
    assert_eq!(summary.failed_jobs(), 3);
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_failed_job_does_not_stop_others() -> Result<()> {
    let dir = TempDir::new()?;
    let (connector, _) = FakeConnector::new(true);
    let strategy =
        shared(FakeStrategy::new(Method::MultiRowInsert, Duration::from_millis(5)).failing(&[1]));
    let config = harness_config(dir.path(), Method::MultiRowInsert, 2, 4);

    let summary = Harness::new(config, connector, strategy, source()).run().await?;

    let statuses: Vec<&str> = summary.records.iter().map(|r| r.status.as_str()).collect();
    assert_eq!(statuses, vec!["ok", "LoadError", "ok", "ok"]);
    assert_eq!(summary.run.num_rows, 3 * GRID_ROWS);
    assert_eq!(summary.run.failed_jobs, 1);
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_panicking_job_keeps_sibling_records() -> Result<()> {
    let dir = TempDir::new()?;
    let (connector, counters) = FakeConnector::new(true);
    let strategy = shared(
        FakeStrategy::new(Method::CopyBinary, Duration::from_millis(5)).panicking(&[1]),
    );
    let config = harness_config(dir.path(), Method::CopyBinary, 2, 4);

    let summary = Harness::new(config, connector, strategy, source()).run().await?;

    let mut records: Vec<BenchmarkRecord> = read_records(&dir.path().join("benchmarks.csv"));
    records.sort_by_key(|r| r.hour);
    let statuses: Vec<&str> = records.iter().map(|r| r.status.as_str()).collect();
    assert_eq!(statuses, vec!["ok", "LoadError", "ok", "ok"]);
    assert_eq!(summary.run.failed_jobs, 1);
    assert_eq!(counters.live.load(Ordering::SeqCst), 0);
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_records_are_written_as_jobs_complete() -> Result<()> {
    let dir = TempDir::new()?;
    let path = dir.path().join("benchmarks.csv");
    let (connector, _) = FakeConnector::new(true);
    let strategy =
        shared(FakeStrategy::new(Method::CopyBinary, Duration::from_millis(1)).stalling(&[1]));
    let config = harness_config(dir.path(), Method::CopyBinary, 1, 2);
    let cancel = CancellationToken::new();
    let mut harness =
        Harness::new(config, connector, strategy, source()).with_cancellation(cancel.clone());

    // Hour 1 stalls, so hour 0's line can only appear while the run is live.
    let watch_log = async {
        let seen = tokio::time::timeout(Duration::from_secs(10), async {
            loop {
                let content = std::fs::read_to_string(&path).unwrap_or_default();
                if content.lines().count() == 2 {
                    return content;
                }
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await;
        cancel.cancel();
        seen
    };
    let (summary, seen) = tokio::join!(harness.run(), watch_log);

    let seen = seen.expect("hour 0 should be logged before the run ends");
    let fields: Vec<&str> = seen.lines().nth(1).unwrap().split(',').collect();
    assert_eq!(fields[3], "0");
    assert_eq!(fields[10], "ok");
    assert!(summary?.cancelled);
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_cancelled_run_writes_no_aggregate_record() -> Result<()> {
    let dir = TempDir::new()?;
    let (connector, _) = FakeConnector::new(true);
    let strategy = shared(FakeStrategy::new(Method::CopyBinary, Duration::from_secs(30)));
    let config = harness_config(dir.path(), Method::CopyBinary, 2, 6);
    let cancel = CancellationToken::new();

    let trigger = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            cancel.cancel();
        })
    };
    let summary = Harness::new(config, connector, strategy, source())
        .with_cancellation(cancel)
        .run()
        .await?;
    trigger.await?;

    assert!(summary.cancelled);
    let records: Vec<BenchmarkRecord> = read_records(&dir.path().join("benchmarks.csv"));
    assert_eq!(records.len(), 2);
    assert!(records.iter().all(|r| r.status == "Cancelled"));

    let runs = std::fs::read_to_string(dir.path().join("parallel_benchmarks.csv"))?;
    assert_eq!(runs.lines().collect::<Vec<_>>(), vec![RunRecord::header_line()]);
    Ok(())
}

#[tokio::test]
async fn test_scenario_d_zero_row_batches_leave_rates_empty() -> Result<()> {
    let dir = TempDir::new()?;
    let (connector, _) = FakeConnector::new(true);
    let strategy = shared(FakeStrategy::new(Method::CopyBinary, Duration::ZERO));
    let config = harness_config(dir.path(), Method::CopyBinary, 1, 2);
    let empty: Arc<dyn RowSource> = Arc::new(RowLimit::new(source(), 0));

    Harness::new(config, connector, strategy, empty).run().await?;

    let content = std::fs::read_to_string(dir.path().join("benchmarks.csv"))?;
    let lines: Vec<&str> = content.lines().collect();
    assert_eq!(lines[0], BenchmarkRecord::header_line());
    for line in &lines[1..] {
        let fields: Vec<&str> = line.split(',').collect();
        assert_eq!(fields[4], "0");
        assert_eq!(fields[6], "", "rate_full must be empty");
        assert_eq!(fields[8], "", "rate_pure must be empty");
        assert!(!line.contains("NaN") && !line.contains("inf"));
    }
    Ok(())
}

#[tokio::test]
async fn test_zero_hours_goes_straight_to_done() -> Result<()> {
    let dir = TempDir::new()?;
    let (connector, _) = FakeConnector::new(true);
    let strategy = shared(FakeStrategy::new(Method::CopyBinary, Duration::ZERO));
    let config = harness_config(dir.path(), Method::CopyBinary, 2, 0);

    let mut harness = Harness::new(config, connector, strategy, source());
    let summary = harness.run().await?;

    assert_eq!(harness.state(), HarnessState::Done);
    assert!(summary.records.is_empty());
    let content = std::fs::read_to_string(dir.path().join("benchmarks.csv"))?;
    assert_eq!(content.lines().count(), 1);
    Ok(())
}

#[tokio::test]
async fn test_header_mismatch_fails_before_connecting() -> Result<()> {
    let dir = TempDir::new()?;
    std::fs::write(
        dir.path().join("benchmarks.csv"),
        "method,table_type,workers,hour,num_rows,seconds,rate,units\n",
    )?;
    let (connector, counters) = FakeConnector::new(true);
    let strategy = shared(FakeStrategy::new(Method::CopyBinary, Duration::ZERO));
    let config = harness_config(dir.path(), Method::CopyBinary, 2, 2);

    let result = Harness::new(config, connector, strategy, source()).run().await;

    assert!(matches!(result, Err(BenchError::Config(_))));
    assert_eq!(counters.opened.load(Ordering::SeqCst), 0);
    Ok(())
}

#[tokio::test]
async fn test_repeated_runs_append_without_new_header() -> Result<()> {
    let dir = TempDir::new()?;
    for _ in 0..2 {
        let (connector, _) = FakeConnector::new(true);
        let strategy = shared(FakeStrategy::new(Method::CopyBinary, Duration::ZERO));
        let config = harness_config(dir.path(), Method::CopyBinary, 1, 2);
        Harness::new(config, connector, strategy, source()).run().await?;
    }

    let content = std::fs::read_to_string(dir.path().join("benchmarks.csv"))?;
    let headers = content
        .lines()
        .filter(|l| *l == BenchmarkRecord::header_line())
        .count();
    assert_eq!(headers, 1);
    assert_eq!(content.lines().count(), 5);
    Ok(())
}

#[tokio::test]
async fn test_invalid_config_rejected_at_startup() {
    let dir = TempDir::new().unwrap();
    let (connector, counters) = FakeConnector::new(true);
    let strategy = shared(FakeStrategy::new(Method::CopyBinary, Duration::ZERO));
    let mut config = harness_config(dir.path(), Method::CopyBinary, 0, 2);
    config.source = SourceConfig::default();

    let result = Harness::new(config, connector, strategy, source()).run().await;

    assert!(matches!(result, Err(BenchError::Validation(_))));
    assert_eq!(counters.opened.load(Ordering::SeqCst), 0);
    assert!(!dir.path().join("benchmarks.csv").exists());
}

/// Round trips against a real server. Run with POSTGRES_* set and `--ignored`.
mod postgres {
    use super::*;
    use pretty_assertions::assert_eq;
    use chrono::{DateTime, Utc};
    use weather_load_bench::config::{CopyFileSource, LoadOptions, Settings};
    use weather_load_bench::db::{PgConnector, PgSession, TableDdl};
    use weather_load_bench::models::{Batch, WeatherRow};
    use weather_load_bench::strategies::{build_strategy, StrategyContext};

    async fn connect() -> Result<(PgConnector, PgSession, Settings)> {
        let settings = Settings::load(None)?;
        let connector = PgConnector::new(settings.database());
        let session = connector.connect().await?;
        Ok((connector, session, settings))
    }

    async fn read_back(session: &PgSession, table: &str) -> Result<Vec<WeatherRow>> {
        let rows = session
            .client()
            .query(
                &format!(
                    "SELECT time, location_id, latitude, longitude, temperature_2m, \
                     zonal_wind_10m, meridional_wind_10m, total_cloud_cover, \
                     total_precipitation, snowfall FROM {} ORDER BY location_id",
                    table
                ),
                &[],
            )
            .await?;
        Ok(rows
            .iter()
            .map(|r| {
                WeatherRow::new(
                    r.get::<_, DateTime<Utc>>(0),
                    r.get(1),
                    r.get(2),
                    r.get(3),
                    r.get(4),
                    r.get(5),
                    r.get(6),
                    r.get(7),
                    r.get(8),
                    r.get(9),
                )
            })
            .collect())
    }

    #[tokio::test]
    #[ignore]
    async fn test_strategies_round_trip() -> Result<()> {
        let (_, mut session, settings) = connect().await?;
        let table = format!("weather_roundtrip_{}", std::process::id());
        let ddl = TableDdl::new(&table)?;

        let mut batch: Batch = SyntheticReader::with_grid(6, 10).batch(5)?;
        batch.rows.sort_by_key(|r| r.location_id);

        for method in [
            Method::RowInsert,
            Method::MultiRowInsert,
            Method::CopyBinary,
            Method::CopyCsv,
        ] {
            ddl.drop(session.client()).await?;
            ddl.create(session.client(), false, false).await?;

            let options = LoadOptions {
                copy_file_source: CopyFileSource::Client,
                insert_chunk_rows: 7,
                ..LoadOptions::default()
            };
            let context = StrategyContext {
                table: table.clone(),
                options,
                database: settings.database(),
            };
            let strategy = build_strategy(method, &context)?;
            let outcome = strategy
                .load(LoadUnit::new(5, Some(&batch)), &mut session)
                .await?;
            assert_eq!(outcome.rows, batch.row_count());

            let loaded = read_back(&session, &table).await?;
            assert_eq!(loaded.len(), batch.row_count(), "{}", method);
            for (expected, actual) in batch.rows.iter().zip(&loaded) {
                assert!(expected.approx_eq(actual, 1e-5), "{} mismatch", method);
            }
        }

        ddl.drop(session.client()).await?;
        Ok(())
    }

    #[tokio::test]
    #[ignore]
    async fn test_create_table_is_idempotent() -> Result<()> {
        let (_, mut session, settings) = connect().await?;
        let table = format!("weather_idempotent_{}", std::process::id());
        let ddl = TableDdl::new(&table)?;

        ddl.create(session.client(), true, false).await?;
        let batch = SyntheticReader::with_grid(3, 5).batch(0)?;
        let context = StrategyContext {
            table: table.clone(),
            options: LoadOptions::default(),
            database: settings.database(),
        };
        build_strategy(Method::CopyBinary, &context)?
            .load(LoadUnit::new(0, Some(&batch)), &mut session)
            .await?;
        assert_eq!(ddl.count_rows(session.client()).await?, 15);

        ddl.create(session.client(), true, false).await?;
        assert_eq!(ddl.count_rows(session.client()).await?, 15);

        ddl.drop(session.client()).await?;
        ddl.drop(session.client()).await?;
        Ok(())
    }
}

#[test]
fn test_record_headers_are_stable() {
    assert_eq!(
        BenchmarkRecord::header_line(),
        "method,table_type,workers,hour,num_rows,seconds_full,rate_full,seconds_pure,rate_pure,units,status"
    );
    assert_eq!(
        RunRecord::header_line(),
        "method,table_type,workers,hours,num_rows,seconds_full,rate_full,seconds_pure,rate_pure,units,failed_jobs"
    );
}
