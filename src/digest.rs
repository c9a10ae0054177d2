//! Report digestion: the entry point of the pipeline.
//!
//! ```text
//! components.json ──▶ ComponentIndex ─┐
//!                                     ▼
//! issues.json ──▶ IssueRecordDecoder ──▶ enrich ──▶ BatchPersister ──▶ IssueStore
//! ```
//!
//! One call digests one report, sequentially. Chunks flushed before a
//! failure stay committed; nothing is rolled back.

use std::path::{Path, PathBuf};
use std::time::Instant;

use chrono::{DateTime, Utc};
use tracing::{debug, info};

use crate::components::{ComponentIndex, COMPONENTS_FILE};
use crate::decoder::{IssueRecordDecoder, ISSUES_FILE};
use crate::enrich::enrich;
use crate::error::DigestError;
use crate::persist::{BatchPersister, DEFAULT_CHUNK_SIZE};
use crate::store::IssueStore;

/// Everything known about the report being digested.
#[derive(Debug, Clone)]
pub struct ReportContext {
    pub report_dir: PathBuf,
    pub project_key: String,
    pub snapshot_id: Option<i64>,
    pub analysis_date: DateTime<Utc>,
    components: Option<ComponentIndex>,
}

impl ReportContext {
    pub fn new(
        report_dir: impl Into<PathBuf>,
        project_key: impl Into<String>,
        analysis_date: DateTime<Utc>,
    ) -> Self {
        Self {
            report_dir: report_dir.into(),
            project_key: project_key.into(),
            snapshot_id: None,
            analysis_date,
            components: None,
        }
    }

    pub fn with_snapshot(mut self, snapshot_id: i64) -> Self {
        self.snapshot_id = Some(snapshot_id);
        self
    }

    /// Component index, once [`digest`] has loaded it.
    pub fn components(&self) -> Option<&ComponentIndex> {
        self.components.as_ref()
    }
}

/// Tunables of a digest run.
#[derive(Debug, Clone)]
pub struct DigestOptions {
    pub chunk_size: usize,
    pub components_file: String,
    pub issues_file: String,
}

impl Default for DigestOptions {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            components_file: COMPONENTS_FILE.to_string(),
            issues_file: ISSUES_FILE.to_string(),
        }
    }
}

impl DigestOptions {
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size;
        self
    }
}

/// Outcome of a successful digest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DigestSummary {
    pub components: usize,
    pub issues_read: usize,
    pub issues_persisted: usize,
    /// Issues whose component could not be resolved.
    pub unlinked_issues: usize,
    pub flushes: usize,
    pub peak_buffered: usize,
}

/// Digest one report into `store`.
///
/// Loads the component index into `ctx`, then streams the issues file
/// through enrichment into chunked saves. The first error aborts the
/// digest; chunks already saved are kept.
pub async fn digest(
    ctx: &mut ReportContext,
    store: &dyn IssueStore,
    options: &DigestOptions,
) -> Result<DigestSummary, DigestError> {
    let started = Instant::now();
    info!(
        project = %ctx.project_key,
        dir = %ctx.report_dir.display(),
        "digesting report"
    );

    let components = ComponentIndex::load_file(&ctx.report_dir.join(&options.components_file))?;
    debug!(components = components.len(), "loaded component index");
    let components = &*ctx.components.insert(components);

    let issues_path = ctx.report_dir.join(&options.issues_file);
    let mut records = IssueRecordDecoder::open(&issues_path)?.peekable();
    let mut persister = BatchPersister::new(store, &ctx.project_key, options.chunk_size);
    let mut issues_read = 0usize;
    let mut unlinked_issues = 0usize;

    while let Some(record) = records.next() {
        let record = record?;
        let issue = enrich(&record, components, ctx.analysis_date);
        issues_read += 1;
        if issue.component_id.is_none() {
            unlinked_issues += 1;
        }
        persister.append(issue)?;

        let exhausted = records.peek().is_none();
        if persister.should_flush(exhausted) {
            persister.flush().await?;
        }
    }

    if !persister.is_empty() {
        persister.flush().await?;
    }

    let summary = DigestSummary {
        components: components.len(),
        issues_read,
        issues_persisted: persister.persisted(),
        unlinked_issues,
        flushes: persister.flushes(),
        peak_buffered: persister.peak(),
    };

    info!(
        project = %ctx.project_key,
        issues = summary.issues_persisted,
        chunks = summary.flushes,
        elapsed_ms = started.elapsed().as_millis() as u64,
        "report digested"
    );
    Ok(summary)
}

/// Digest a report directory with default options.
pub async fn digest_dir(
    report_dir: &Path,
    project_key: &str,
    analysis_date: DateTime<Utc>,
    store: &dyn IssueStore,
) -> Result<DigestSummary, DigestError> {
    let mut ctx = ReportContext::new(report_dir, project_key, analysis_date);
    digest(&mut ctx, store, &DigestOptions::default()).await
}
