//! Issue store statistics.
//!
//! Summarises what has been digested: issue counts, issues without a
//! resolved component, total remediation debt and the time of the last
//! digest, per project. Used by `rdigest stats`.

use anyhow::Result;
use sqlx::{Row, SqlitePool};

use crate::config::Config;
use crate::db;
use crate::models::Duration;

/// Per-project breakdown.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectStats {
    pub project_key: String,
    pub issue_count: i64,
    pub unlinked_count: i64,
    pub debt: Duration,
    pub last_persisted_ms: Option<i64>,
}

/// Run the stats command: query the database and print a summary.
pub async fn run_stats(config: &Config) -> Result<()> {
    let pool = db::connect(config).await?;
    let projects = project_stats(&pool).await?;

    let changes: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM issue_changes")
        .fetch_one(&pool)
        .await?;

    let total: i64 = projects.iter().map(|p| p.issue_count).sum();

    println!("Report Digest: Issue Store Stats");
    println!("=================================");
    println!();
    println!("  Database:    {}", config.db.path.display());
    println!();
    println!("  Projects:    {}", projects.len());
    println!("  Issues:      {}", total);
    println!("  Changes:     {}", changes);

    if !projects.is_empty() {
        println!();
        println!("  By project:");
        println!(
            "  {:<32} {:>8} {:>9} {:>12}   {}",
            "PROJECT", "ISSUES", "UNLINKED", "DEBT", "LAST DIGEST"
        );
        println!("  {}", "-".repeat(84));

        for p in &projects {
            let last = p
                .last_persisted_ms
                .map(format_digest_time)
                .unwrap_or_else(|| "never".to_string());
            println!(
                "  {:<32} {:>8} {:>9} {:>12}   {}",
                p.project_key,
                p.issue_count,
                p.unlinked_count,
                p.debt.to_string(),
                last
            );
        }
    }

    println!();

    pool.close().await;
    Ok(())
}

/// Per-project counts, largest projects first.
pub async fn project_stats(pool: &SqlitePool) -> Result<Vec<ProjectStats>> {
    let rows = sqlx::query(
        r#"
        SELECT
            project_key,
            COUNT(*) AS issue_count,
            SUM(CASE WHEN component_id IS NULL THEN 1 ELSE 0 END) AS unlinked_count,
            COALESCE(SUM(debt_minutes), 0) AS debt_minutes,
            MAX(persisted_at) AS last_persisted
        FROM issues
        GROUP BY project_key
        ORDER BY issue_count DESC, project_key
        "#,
    )
    .fetch_all(pool)
    .await?;

    Ok(rows
        .iter()
        .map(|row| ProjectStats {
            project_key: row.get("project_key"),
            issue_count: row.get("issue_count"),
            unlinked_count: row.get("unlinked_count"),
            debt: Duration::of_minutes(row.get("debt_minutes")),
            last_persisted_ms: row.get("last_persisted"),
        })
        .collect())
}

/// Render a persisted-at epoch-millis value for the stats table.
fn format_digest_time(ms: i64) -> String {
    chrono::DateTime::from_timestamp_millis(ms)
        .map(|dt| dt.format("%Y-%m-%d %H:%M:%S UTC").to_string())
        .unwrap_or_else(|| ms.to_string())
}
