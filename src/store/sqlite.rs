//! SQLite-backed [`IssueStore`].
//!
//! Each `save` runs in a single transaction: issues are upserted on their
//! key and the current change set, when present, is appended to
//! `issue_changes`.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::key_value;
use crate::models::Issue;

use super::IssueStore;

/// SQLite implementation of [`IssueStore`].
pub struct SqliteIssueStore {
    pool: SqlitePool,
}

impl SqliteIssueStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Number of stored issues for a project.
    pub async fn count_issues(&self, project: &str) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM issues WHERE project_key = ?")
            .bind(project)
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}

fn millis(ts: Option<DateTime<Utc>>) -> Option<i64> {
    ts.map(|t| t.timestamp_millis())
}

#[async_trait]
impl IssueStore for SqliteIssueStore {
    async fn save(&self, project: &str, issues: &[Issue]) -> Result<()> {
        let now = Utc::now().timestamp_millis();
        let mut tx = self.pool.begin().await?;

        for issue in issues {
            sqlx::query(
                r#"
                INSERT INTO issues (kee, project_key, component_id, rule_repo, rule_key,
                                    severity, manual_severity, message, line, effort_to_fix,
                                    debt_minutes, status, resolution, reporter, assignee,
                                    author_login, action_plan_key, checksum, attributes,
                                    created_at, updated_at, closed_at, selected_at, persisted_at)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                ON CONFLICT(kee) DO UPDATE SET
                    project_key = excluded.project_key,
                    component_id = excluded.component_id,
                    rule_repo = excluded.rule_repo,
                    rule_key = excluded.rule_key,
                    severity = excluded.severity,
                    manual_severity = excluded.manual_severity,
                    message = excluded.message,
                    line = excluded.line,
                    effort_to_fix = excluded.effort_to_fix,
                    debt_minutes = excluded.debt_minutes,
                    status = excluded.status,
                    resolution = excluded.resolution,
                    reporter = excluded.reporter,
                    assignee = excluded.assignee,
                    author_login = excluded.author_login,
                    action_plan_key = excluded.action_plan_key,
                    checksum = excluded.checksum,
                    attributes = excluded.attributes,
                    updated_at = excluded.updated_at,
                    closed_at = excluded.closed_at,
                    selected_at = excluded.selected_at,
                    persisted_at = excluded.persisted_at
                "#,
            )
            .bind(&issue.key)
            .bind(project)
            .bind(issue.component_id)
            .bind(&issue.rule_key.repository)
            .bind(&issue.rule_key.rule)
            .bind(&issue.severity)
            .bind(issue.manual_severity)
            .bind(&issue.message)
            .bind(issue.line)
            .bind(issue.effort_to_fix)
            .bind(issue.debt.map(|d| d.minutes()))
            .bind(&issue.status)
            .bind(&issue.resolution)
            .bind(&issue.reporter)
            .bind(&issue.assignee)
            .bind(&issue.author_login)
            .bind(&issue.action_plan_key)
            .bind(&issue.checksum)
            .bind(key_value::format(&issue.attributes))
            .bind(millis(issue.creation_date))
            .bind(millis(issue.update_date))
            .bind(millis(issue.close_date))
            .bind(issue.selected_at)
            .bind(now)
            .execute(&mut *tx)
            .await?;

            let change = &issue.current_change;
            if !change.is_empty() {
                sqlx::query(
                    "INSERT INTO issue_changes (id, issue_key, user_login, change_data, created_at) VALUES (?, ?, ?, ?, ?)",
                )
                .bind(Uuid::new_v4().to_string())
                .bind(&issue.key)
                .bind(change.user_login())
                .bind(change.to_string())
                .bind(millis(change.creation_date()).unwrap_or(now))
                .execute(&mut *tx)
                .await?;
            }
        }

        tx.commit().await?;
        Ok(())
    }
}
