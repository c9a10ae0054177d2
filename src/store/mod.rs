//! Storage abstraction for digested issues.
//!
//! The [`IssueStore`] trait is the storage sink of the pipeline. The
//! digest hands it one non-empty, ordered batch per flush; an
//! implementation must apply a batch entirely or not at all.
//!
//! | Implementation | Purpose |
//! |----------------|---------|
//! | [`memory::InMemoryIssueStore`] | Tests and diagnostics, records every call |
//! | [`sqlite::SqliteIssueStore`] | Durable storage, one transaction per batch |

pub mod memory;
pub mod sqlite;

use anyhow::Result;
use async_trait::async_trait;

use crate::models::Issue;

/// Storage sink for enriched issues, keyed by project.
#[async_trait]
pub trait IssueStore: Send + Sync {
    /// Persist `issues` for `project` atomically.
    async fn save(&self, project: &str, issues: &[Issue]) -> Result<()>;
}
