use std::path::PathBuf;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use validator::Validate;

use crate::cli::args::{Cli, Commands};
use crate::config::{CopyFileSource, HarnessConfig, Settings, SourceConfig, TablePreparation};
use crate::db::{Connector, PgConnector, TableDdl, TablePlan};
use crate::error::{BenchError, Result};
use crate::processors::{BatchExporter, ExportFormat, Harness};
use crate::readers::open_source;
use crate::strategies::{build_strategy, StrategyContext};
use crate::utils::filename::generate_default_benchmarks_filename;
use crate::utils::logging;
use crate::utils::progress::ProgressReporter;

pub async fn run(cli: Cli) -> Result<()> {
    logging::init(cli.verbose, cli.log_file.as_deref())?;
    let settings = Settings::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Load {
            method,
            table_type,
            workers,
            hours,
            row_limit,
            benchmarks_file,
            parallel_benchmarks_file,
            source,
            data_dir,
            csv_dir,
            create_table,
            drop_table,
            unlogged,
            tool_workers,
            keep_files,
            no_header,
            client_copy,
            quiet,
        } => {
            let mut config = HarnessConfig::new(method, table_type, workers, hours);
            config.database = settings.database();
            config.load = settings.load_options();
            if let Some(dir) = csv_dir {
                config.load.csv_dir = Some(dir);
            }
            if let Some(n) = tool_workers {
                config.load.tool_workers = n;
            }
            config.load.keep_files |= keep_files;
            if no_header {
                config.load.csv_header = false;
            }
            if client_copy {
                config.load.copy_file_source = CopyFileSource::Client;
            }
            config.benchmarks_file =
                benchmarks_file.unwrap_or_else(generate_default_benchmarks_filename);
            config.parallel_benchmarks_file = parallel_benchmarks_file;
            config.preparation = TablePreparation {
                create: create_table || drop_table,
                drop_first: drop_table,
                unlogged,
            };
            config.source = SourceConfig {
                kind: source.into(),
                data_dir,
                row_limit,
            };
            config.show_progress = !quiet;

            run_load(config).await
        }

        Commands::CreateTable {
            drop_table,
            hypertable,
            unlogged,
        } => {
            let database = settings.database();
            database.validate()?;
            let connector = PgConnector::new(database);
            let session = connector.connect().await?;
            let ddl = TableDdl::new(crate::utils::constants::WEATHER_TABLE)?;

            if drop_table {
                ddl.drop(session.client()).await?;
            }
            ddl.create(session.client(), unlogged, hypertable).await?;
            Ok(())
        }

        Commands::DropTable => {
            let database = settings.database();
            database.validate()?;
            let session = PgConnector::new(database).connect().await?;
            TableDdl::new(crate::utils::constants::WEATHER_TABLE)?
                .drop(session.client())
                .await
        }

        Commands::Export {
            hours,
            out_dir,
            format,
            no_header,
            row_limit,
            compression,
            workers,
        } => {
            let out_dir: PathBuf = out_dir.or(settings.csv_path.clone()).ok_or_else(|| {
                BenchError::Config("export needs --out-dir or CSV_PATH".to_string())
            })?;
            let format: ExportFormat = format.into();
            let source = open_source(&SourceConfig {
                row_limit,
                ..SourceConfig::default()
            })?;

            println!("Exporting {} hours from {}", hours, source.describe());
            println!("Output directory: {}", out_dir.display());

            let progress = ProgressReporter::new(hours as u64, "Exporting hours...", false);
            let exporter = BatchExporter::new(workers)
                .with_format(format)
                .with_header(!no_header)
                .with_compression(&compression);

            let summary = tokio::task::spawn_blocking(move || {
                exporter.export(source.as_ref(), hours, &out_dir, Some(&progress))
            })
            .await??;

            println!(
                "Wrote {} files ({} rows)",
                summary.files.len(),
                summary.rows
            );
            Ok(())
        }
    }
}

async fn run_load(config: HarnessConfig) -> Result<()> {
    config.check()?;

    let context = StrategyContext {
        table: config.table.clone(),
        options: config.load.clone(),
        database: config.database.clone(),
    };
    let strategy = build_strategy(config.method, &context)?;
    let source = open_source(&config.source)?;
    let connector = PgConnector::new(config.database.clone());

    println!(
        "Loading {} hours into {} ({} table) with {} x {}",
        config.hours,
        connector.target(),
        config.table_type,
        config.workers,
        config.method
    );
    println!("Benchmarks file: {}", config.benchmarks_file.display());

    let preparation = config.preparation;
    let hypertable = config.table_type.is_hypertable();
    let table = config.table.clone();

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted; finishing in-flight jobs");
            on_signal.cancel();
        }
    });

    let mut harness = Harness::new(config, connector, strategy, source).with_cancellation(cancel);
    if preparation.create || preparation.drop_first {
        harness = harness.with_table_setup(Box::new(TablePlan {
            ddl: TableDdl::new(&table)?,
            preparation,
            hypertable,
        }));
    }

    let summary = harness.run().await?;

    println!(
        "Loaded {} rows in {:.2}s ({:.2}s pure), {} failed jobs",
        summary.run.num_rows,
        summary.run.seconds_full,
        summary.run.seconds_pure,
        summary.failed_jobs()
    );
    if let Some(rate) = summary.run.rate_pure {
        println!("Throughput: {:.0} rows/s", rate);
    }

    if summary.cancelled {
        return Err(BenchError::Cancelled);
    }
    info!("Benchmark complete");
    Ok(())
}
