use anyhow::Result;
use sqlx::SqlitePool;

use crate::config::Config;
use crate::db;

pub async fn run_migrations(config: &Config) -> Result<()> {
    let pool = db::connect(config).await?;
    apply_schema(&pool).await?;
    pool.close().await;
    Ok(())
}

/// Create all tables and indexes. Idempotent.
pub async fn apply_schema(pool: &SqlitePool) -> Result<()> {
    // Issues, keyed by their batch-assigned key
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS issues (
            kee TEXT PRIMARY KEY,
            project_key TEXT NOT NULL,
            component_id INTEGER,
            rule_repo TEXT NOT NULL,
            rule_key TEXT NOT NULL,
            severity TEXT,
            manual_severity INTEGER NOT NULL DEFAULT 0,
            message TEXT,
            line INTEGER,
            effort_to_fix REAL,
            debt_minutes INTEGER,
            status TEXT,
            resolution TEXT,
            reporter TEXT,
            assignee TEXT,
            author_login TEXT,
            action_plan_key TEXT,
            checksum TEXT,
            attributes TEXT,
            created_at INTEGER,
            updated_at INTEGER,
            closed_at INTEGER,
            selected_at INTEGER,
            persisted_at INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Change sets recorded by each analysis
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS issue_changes (
            id TEXT PRIMARY KEY,
            issue_key TEXT NOT NULL,
            user_login TEXT,
            change_data TEXT NOT NULL,
            created_at INTEGER NOT NULL,
            FOREIGN KEY (issue_key) REFERENCES issues(kee)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_issues_project_key ON issues(project_key)")
        .execute(pool)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_issues_component_id ON issues(component_id)")
        .execute(pool)
        .await?;
    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_issue_changes_issue_key ON issue_changes(issue_key)",
    )
    .execute(pool)
    .await?;

    Ok(())
}
