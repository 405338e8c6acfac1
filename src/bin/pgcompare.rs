//! pgcompare CLI entry point (A4, A8).
//!
//! Parses arguments, loads configuration, wires up logging, and dispatches to the library's
//! discovery/reconcile/report/DDL modules. Exit codes follow section 6: 0 success, 1
//! configuration/connection failure, 2 reconciliation reported out-of-sync rows (only with
//! `--fail-on-diff`).

use std::process::ExitCode;

use clap::Parser;
use log::{error, info, LevelFilter};
use tokio_util::sync::CancellationToken;

use pgcompare::cli::{Cli, Commands, TableSelector};
use pgcompare::config::{LogDestination, Settings};
use pgcompare::prelude::*;
use pgcompare::report::{self, JobSummary, TableReport};
use pgcompare::repo::{self, catalog, ddl};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let settings = match Settings::load_from(cli.config.as_deref()) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("configuration error: {e}");
            return ExitCode::from(1);
        }
    };

    init_logging(&settings);

    match run(cli.command, settings).await {
        Ok(code) => ExitCode::from(code as u8),
        Err(err) => {
            error!("{err}");
            ExitCode::from(err.exit_code() as u8)
        }
    }
}

/// Initialize `env_logger` from `[log]`, honoring `destination = "file"` by routing output at
/// a `Target::Pipe` onto an opened file handle rather than stderr.
fn init_logging(settings: &Settings) {
    let level: LevelFilter = settings.log.level.parse().unwrap_or(LevelFilter::Info);
    let mut builder = env_logger::Builder::new();
    builder.filter_level(level);

    match &settings.log.destination {
        LogDestination::Stderr => {
            builder.target(env_logger::Target::Stderr);
        }
        LogDestination::File(path) => match std::fs::OpenOptions::new().create(true).append(true).open(path) {
            Ok(file) => {
                builder.target(env_logger::Target::Pipe(Box::new(file)));
            }
            Err(e) => {
                eprintln!("could not open log file '{path}': {e}, falling back to stderr");
                builder.target(env_logger::Target::Stderr);
            }
        },
    }

    let _ = builder.try_init();
}

async fn run(command: Commands, settings: Settings) -> Result<i32, PgCompareError> {
    match command {
        Commands::Init => run_init(&settings).await,
        Commands::Discover {
            project,
            alias,
            parallel_degree,
            source_schema,
            source_table,
            target_schema,
            target_table,
            mod_column,
            table_filter,
            preserve_case_schema,
            preserve_case_table,
        } => {
            run_discover(
                &settings,
                pgcompare::discover::DiscoverRequest {
                    project,
                    alias,
                    parallel_degree,
                    source_schema,
                    source_table,
                    target_schema,
                    target_table,
                    mod_column,
                    table_filter,
                    preserve_case_schema,
                    preserve_case_table,
                    alias_overrides: Default::default(),
                },
            )
            .await
        }
        Commands::Compare(selector) => run_reconcile(&settings, selector, RunMode::Compare).await,
        Commands::Check(selector) => run_reconcile(&settings, selector, RunMode::Check).await,
        Commands::CopyTable {
            project,
            from_alias,
            to_alias,
        } => run_copy_table(&settings, project, &from_alias, &to_alias).await,
    }
}

async fn run_init(settings: &Settings) -> Result<i32, PgCompareError> {
    let repo_conn = settings.repo_connection()?;
    let pool = repo::build_pool(&repo_conn)?;
    ddl::init(&pool).await?;
    info!("repository tables initialized");
    Ok(0)
}

async fn run_discover(
    settings: &Settings,
    request: pgcompare::discover::DiscoverRequest,
) -> Result<i32, PgCompareError> {
    let repo_conn = settings.repo_connection()?;
    let source_conn = settings.source_connection()?;
    let target_conn = settings.target_connection()?;
    let pool = repo::build_pool(&repo_conn)?;

    let tid = pgcompare::discover::run(&pool, &source_conn, &target_conn, settings, &request).await?;
    info!("discovered table '{}' as tid={tid}", request.alias);
    Ok(0)
}

async fn run_copy_table(
    settings: &Settings,
    project: i64,
    from_alias: &str,
    to_alias: &str,
) -> Result<i32, PgCompareError> {
    let repo_conn = settings.repo_connection()?;
    let pool = repo::build_pool(&repo_conn)?;
    let new_tid = catalog::copy_table(&pool, project, from_alias, to_alias).await?;
    info!("copied '{from_alias}' to '{to_alias}' as tid={new_tid}");
    Ok(0)
}

async fn run_reconcile(
    settings: &Settings,
    selector: TableSelector,
    mode: RunMode,
) -> Result<i32, PgCompareError> {
    let repo_conn = settings.repo_connection()?;
    let source_conn = settings.source_connection()?;
    let target_conn = settings.target_connection()?;
    let pool = repo::build_pool(&repo_conn)?;

    let tables = resolve_tables(&pool, &selector).await?;
    if tables.is_empty() {
        return Err(PgCompareError::Config(format!(
            "no table matched --table/--batch selector for project={}",
            selector.project
        )));
    }

    let reconciler = Reconciler::new(pool, source_conn, target_conn, settings.clone());
    let cancel = CancellationToken::new();
    spawn_shutdown_handler(cancel.clone());

    let mut table_reports = Vec::with_capacity(tables.len());
    let mut any_out_of_sync = false;

    for table in &tables {
        let outcome = match reconciler.run(table, mode, cancel.clone()).await {
            Ok(outcome) => outcome,
            Err(err) if err.is_fatal() => return Err(err),
            Err(err) => {
                error!("{}: table failed: {err}", table.alias);
                table_reports.push(TableReport::failed(&table.alias, &err.to_string()));
                any_out_of_sync = true;
                continue;
            }
        };
        any_out_of_sync = any_out_of_sync || outcome.history.out_of_sync() > 0;

        let mut report_row = TableReport::new(&table.alias, &outcome.history);
        if let Some(recheck) = &outcome.recheck {
            report_row = report_row.with_recheck(recheck);
        }
        info!(
            "{}: equal={} not_equal={} missing_source={} missing_target={}",
            table.alias,
            outcome.history.equal,
            outcome.history.not_equal,
            outcome.history.missing_source,
            outcome.history.missing_target
        );
        table_reports.push(report_row);
    }

    if let Some(path) = &selector.report {
        let summary = JobSummary {
            tables: table_reports,
            check_mode: matches!(mode, RunMode::Check),
        };
        report::write_to_file(&summary, path)?;
        info!("wrote report to {}", path.display());
    }

    if selector.fail_on_diff && any_out_of_sync {
        Ok(2)
    } else {
        Ok(0)
    }
}

async fn resolve_tables(
    pool: &deadpool_postgres::Pool,
    selector: &TableSelector,
) -> Result<Vec<TableEntry>, PgCompareError> {
    match (&selector.table, selector.batch) {
        (Some(alias), _) => {
            let table = catalog::find_table(pool, selector.project, alias).await?.ok_or_else(|| {
                PgCompareError::Config(format!(
                    "no table registered under project={} with alias '{alias}'",
                    selector.project
                ))
            })?;
            Ok(vec![table])
        }
        (None, Some(batch)) => catalog::tables_for_batch(pool, selector.project, batch).await,
        (None, None) => Err(PgCompareError::Config(
            "either --table or --batch must be given".to_string(),
        )),
    }
}

/// Cancel the in-flight table on SIGINT/SIGTERM so the Reconciler can drain its workers and
/// record the `Cancel` outcome instead of being killed mid-batch.
fn spawn_shutdown_handler(cancel: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("shutdown signal received, draining in-flight table");
            cancel.cancel();
        }
    });
}
