//! CLI surface (A8): `clap`-derive subcommands mirroring section 6's external interface.
//!
//! `src/bin/pgcompare.rs` parses this, resolves configuration, and dispatches to the
//! Reconciler/Rechecker/discovery/report/DDL modules; this file only describes the shape of
//! the command line.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "pgcompare")]
#[command(about = "Cross-dialect row-level database reconciliation")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Path to the TOML config file (default: `pgcompare.toml`, or `$PGCOMPARE_CONFIG`).
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create the dc_* repository tables if they do not already exist.
    Init,

    /// Scan source/target catalogs and register a table's column map.
    Discover {
        #[arg(long)]
        project: i64,
        #[arg(long)]
        alias: String,
        #[arg(long, default_value_t = 1)]
        parallel_degree: u32,
        #[arg(long)]
        source_schema: String,
        #[arg(long)]
        source_table: String,
        #[arg(long)]
        target_schema: String,
        #[arg(long)]
        target_table: String,
        /// Column used to shard extraction across `parallel_degree` workers per side.
        #[arg(long)]
        mod_column: Option<String>,
        /// SQL predicate appended to both sides' extraction queries.
        #[arg(long)]
        table_filter: Option<String>,
        #[arg(long, default_value_t = false)]
        preserve_case_schema: bool,
        #[arg(long, default_value_t = false)]
        preserve_case_table: bool,
    },

    /// Run a fresh reconciliation for the selected table(s).
    Compare(TableSelector),

    /// Re-examine a prior reconciliation's findings against the live rows.
    Check(TableSelector),

    /// Duplicate a table's registration under a new alias.
    CopyTable {
        #[arg(long)]
        project: i64,
        #[arg(long)]
        from_alias: String,
        #[arg(long)]
        to_alias: String,
    },
}

/// Shared `compare`/`check` selector: either one `--table` alias or an entire `--batch`.
#[derive(Args, Debug, Clone)]
pub struct TableSelector {
    #[arg(long)]
    pub project: i64,

    /// Reconcile every enabled table registered under this batch number.
    #[arg(long)]
    pub batch: Option<i64>,

    /// Reconcile a single table by its alias.
    #[arg(long = "table")]
    pub table: Option<String>,

    /// Render an HTML Job Summary to this path after the run.
    #[arg(long)]
    pub report: Option<PathBuf>,

    /// Exit with code 2 when any table reported out-of-sync rows (for CI use).
    #[arg(long, default_value_t = false)]
    pub fail_on_diff: bool,
}
