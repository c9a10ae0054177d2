//! In-memory [`IssueStore`] for tests and diagnostics.
//!
//! Every `save` call is recorded as one [`SavedBatch`], so callers can
//! inspect both the persisted issues and how they were chunked. A store can
//! be told to start failing after a number of successful calls, or to reject
//! its first calls and then recover.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::RwLock;

use anyhow::{anyhow, Result};
use async_trait::async_trait;

use crate::models::Issue;

use super::IssueStore;

/// One recorded `save` call.
#[derive(Debug, Clone)]
pub struct SavedBatch {
    pub project: String,
    pub issues: Vec<Issue>,
}

/// In-memory issue store.
#[derive(Default)]
pub struct InMemoryIssueStore {
    batches: RwLock<Vec<SavedBatch>>,
    fail_after: Option<usize>,
    reject_first: AtomicUsize,
}

impl InMemoryIssueStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store that accepts `successful` calls and rejects every later one.
    pub fn failing_after(successful: usize) -> Self {
        Self {
            batches: RwLock::new(Vec::new()),
            fail_after: Some(successful),
            reject_first: AtomicUsize::new(0),
        }
    }

    /// A store that rejects its first `rejected` calls and accepts the rest.
    pub fn rejecting_first(rejected: usize) -> Self {
        Self {
            batches: RwLock::new(Vec::new()),
            fail_after: None,
            reject_first: AtomicUsize::new(rejected),
        }
    }

    pub fn batches(&self) -> Vec<SavedBatch> {
        self.batches
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Size of each recorded batch, in call order.
    pub fn batch_sizes(&self) -> Vec<usize> {
        self.batches
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .map(|b| b.issues.len())
            .collect()
    }

    /// All persisted issues, in the order they were saved.
    pub fn issues(&self) -> Vec<Issue> {
        self.batches
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .flat_map(|b| b.issues.iter().cloned())
            .collect()
    }
}

#[async_trait]
impl IssueStore for InMemoryIssueStore {
    async fn save(&self, project: &str, issues: &[Issue]) -> Result<()> {
        let mut batches = self
            .batches
            .write()
            .map_err(|_| anyhow!("in-memory store lock poisoned"))?;

        if self
            .reject_first
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            return Err(anyhow!("in-memory store temporarily rejected batch for '{}'", project));
        }

        if let Some(limit) = self.fail_after {
            if batches.len() >= limit {
                return Err(anyhow!(
                    "in-memory store rejected batch #{} for '{}'",
                    batches.len() + 1,
                    project
                ));
            }
        }

        batches.push(SavedBatch {
            project: project.to_string(),
            issues: issues.to_vec(),
        });
        Ok(())
    }
}
