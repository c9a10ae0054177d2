//! # Report Digest CLI (`rdigest`)
//!
//! ## Usage
//!
//! ```bash
//! rdigest --config ./config/rdigest.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `rdigest init` | Create the SQLite database and run schema migrations |
//! | `rdigest digest <dir>` | Digest an unpacked report directory |
//! | `rdigest submit <zip>` | Unpack a zipped report, digest it, clean up |
//! | `rdigest stats` | Per-project issue counts |

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};

use report_digest::config::{self, Config};
use report_digest::store::sqlite::SqliteIssueStore;
use report_digest::{archive, cleanup, db, migrate, stats};
use report_digest::{digest, DigestSummary, ReportContext};

/// Report Digest CLI: streams batch analysis reports into an issue store.
#[derive(Parser)]
#[command(
    name = "rdigest",
    about = "Report Digest: streams batch analysis reports into an issue store",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/rdigest.toml")]
    config: PathBuf,

    /// Enable debug logging (overridden by RUST_LOG).
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema.
    ///
    /// Idempotent, running it multiple times is safe.
    Init,

    /// Digest an unpacked report directory.
    Digest {
        /// Directory holding the components manifest and the issues file.
        report_dir: PathBuf,

        /// Key of the project the report belongs to.
        #[arg(long)]
        project: String,

        /// Snapshot (analysis) id assigned when the report was submitted.
        #[arg(long)]
        snapshot: Option<i64>,

        /// Analysis timestamp (RFC 3339). Defaults to now.
        #[arg(long)]
        analysis_date: Option<String>,
    },

    /// Unpack a zipped report into the work directory and digest it.
    Submit {
        /// Zip archive containing the report files.
        archive: PathBuf,

        /// Key of the project the report belongs to.
        #[arg(long)]
        project: String,

        /// Snapshot (analysis) id.
        #[arg(long)]
        snapshot: i64,

        /// Analysis timestamp (RFC 3339). Defaults to now.
        #[arg(long)]
        analysis_date: Option<String>,

        /// Keep the unpacked report directory after digesting.
        #[arg(long)]
        keep: bool,
    },

    /// Show per-project issue statistics.
    Stats,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            migrate::run_migrations(&cfg).await?;
            println!("init");
            println!("  database: {}", cfg.db.path.display());
            println!("ok");
        }
        Commands::Digest {
            report_dir,
            project,
            snapshot,
            analysis_date,
        } => {
            let analysis_date = parse_analysis_date(analysis_date.as_deref())?;
            let summary = run_digest(&cfg, &report_dir, &project, snapshot, analysis_date).await?;
            print_summary(&project, &summary);
        }
        Commands::Submit {
            archive: archive_path,
            project,
            snapshot,
            analysis_date,
            keep,
        } => {
            let analysis_date = parse_analysis_date(analysis_date.as_deref())?;
            let dest = cfg
                .digest
                .work_dir
                .join(archive::report_dir_name(&project, snapshot));
            let report_dir = archive::unpack_report(&archive_path, &dest)?;

            let result =
                run_digest(&cfg, &report_dir, &project, Some(snapshot), analysis_date).await;

            if cfg.digest.delete_after_digest && !keep {
                cleanup::delete_report_dir(Some(&report_dir));
            }

            let summary = result?;
            print_summary(&project, &summary);
        }
        Commands::Stats => {
            stats::run_stats(&cfg).await?;
        }
    }

    Ok(())
}

async fn run_digest(
    cfg: &Config,
    report_dir: &Path,
    project: &str,
    snapshot: Option<i64>,
    analysis_date: DateTime<Utc>,
) -> Result<DigestSummary> {
    let pool = db::connect(cfg).await?;
    migrate::apply_schema(&pool).await?;
    let store = SqliteIssueStore::new(pool);

    let mut ctx = ReportContext::new(report_dir, project, analysis_date);
    ctx.snapshot_id = snapshot;

    let result = digest(&mut ctx, &store, &cfg.digest.options())
        .await
        .with_context(|| format!("Failed to digest report {}", report_dir.display()));

    store.pool().close().await;
    result
}

fn parse_analysis_date(raw: Option<&str>) -> Result<DateTime<Utc>> {
    match raw {
        Some(s) => Ok(DateTime::parse_from_rfc3339(s)
            .with_context(|| format!("Invalid --analysis-date '{}', expected RFC 3339", s))?
            .with_timezone(&Utc)),
        None => Ok(Utc::now()),
    }
}

fn print_summary(project: &str, summary: &DigestSummary) {
    println!("digest {}", project);
    println!("  components: {}", summary.components);
    println!("  issues read: {}", summary.issues_read);
    println!("  issues persisted: {}", summary.issues_persisted);
    println!("  without component: {}", summary.unlinked_issues);
    println!("  chunks written: {}", summary.flushes);
    println!("ok");
}
