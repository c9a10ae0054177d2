//! End-to-end tests of the digest pipeline against the in-memory store.
//!
//! Each test writes a report directory (components manifest + issues file)
//! into a temp dir and checks what reaches the store.

use chrono::{DateTime, TimeZone, Utc};
use report_digest::components::COMPONENTS_FILE;
use report_digest::decoder::ISSUES_FILE;
use report_digest::store::memory::InMemoryIssueStore;
use report_digest::{digest, DigestError, DigestOptions, ReportContext};
use std::fs;
use std::path::Path;
use tempfile::TempDir;

fn analysis_date() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2014, 10, 1, 12, 0, 0).unwrap()
}

fn issue_json(n: usize, batch_id: i64) -> String {
    format!(
        r#"{{"key":"issue-{n}","ruleRepo":"squid","ruleKey":"S{n}","componentBatchId":{batch_id},"severity":"MAJOR","line":{n},"debt":10,"issueAttributes":"n={n}","isNew":true}}"#
    )
}

fn write_report(dir: &Path, components: &str, issues: &[String]) {
    fs::write(dir.join(COMPONENTS_FILE), components).unwrap();
    fs::write(dir.join(ISSUES_FILE), format!("[\n{}\n]", issues.join(",\n"))).unwrap();
}

async fn run(
    dir: &Path,
    store: &InMemoryIssueStore,
    chunk_size: usize,
) -> Result<report_digest::DigestSummary, DigestError> {
    let mut ctx = ReportContext::new(dir, "org.example:app", analysis_date());
    let options = DigestOptions::default().with_chunk_size(chunk_size);
    digest(&mut ctx, store, &options).await
}

#[tokio::test]
async fn digest_2500_issues_in_three_chunks() {
    let tmp = TempDir::new().unwrap();
    let issues: Vec<String> = (0..2500).map(|n| issue_json(n, 1)).collect();
    write_report(tmp.path(), r#"[{"batchId":1,"persistedId":100}]"#, &issues);

    let store = InMemoryIssueStore::new();
    let summary = run(tmp.path(), &store, 1000).await.unwrap();

    assert_eq!(store.batch_sizes(), vec![1000, 1000, 500]);
    assert_eq!(summary.issues_read, 2500);
    assert_eq!(summary.issues_persisted, 2500);
    assert_eq!(summary.flushes, 3);
    assert_eq!(summary.peak_buffered, 1000);

    let persisted = store.issues();
    assert!(persisted.iter().all(|i| i.component_id == Some(100)));
    assert!(store.batches().iter().all(|b| b.project == "org.example:app"));
}

#[tokio::test]
async fn flush_count_is_ceil_of_n_over_c_and_order_is_kept() {
    for (n, c) in [(0usize, 3usize), (1, 3), (3, 3), (7, 3), (10, 1), (5, 100)] {
        let tmp = TempDir::new().unwrap();
        let issues: Vec<String> = (0..n).map(|i| issue_json(i, 1)).collect();
        write_report(tmp.path(), r#"[{"batchId":1,"id":100}]"#, &issues);

        let store = InMemoryIssueStore::new();
        let summary = run(tmp.path(), &store, c).await.unwrap();

        let expected_flushes = n.div_ceil(c);
        assert_eq!(store.batch_sizes().len(), expected_flushes, "n={} c={}", n, c);
        assert_eq!(summary.flushes, expected_flushes);
        assert!(store.batch_sizes().iter().all(|s| *s <= c && *s > 0));
        assert!(summary.peak_buffered <= c);

        let keys: Vec<String> = store.issues().into_iter().map(|i| i.key).collect();
        let expected: Vec<String> = (0..n).map(|i| format!("issue-{}", i)).collect();
        assert_eq!(keys, expected, "n={} c={}", n, c);
    }
}

#[tokio::test]
async fn unknown_component_leaves_issue_unlinked() {
    let tmp = TempDir::new().unwrap();
    write_report(
        tmp.path(),
        r#"[{"batchId":1,"id":10},{"batchId":2,"id":20},{"batchId":3,"id":30}]"#,
        &[issue_json(0, 42), issue_json(1, 2)],
    );

    let store = InMemoryIssueStore::new();
    let summary = run(tmp.path(), &store, 1000).await.unwrap();

    let issues = store.issues();
    assert_eq!(issues.len(), 2);
    assert_eq!(issues[0].component_id, None);
    assert_eq!(issues[1].component_id, Some(20));
    assert_eq!(summary.unlinked_issues, 1);
}

#[tokio::test]
async fn truncated_issues_file_fails_with_format_error() {
    let tmp = TempDir::new().unwrap();
    fs::write(tmp.path().join(COMPONENTS_FILE), r#"[{"batchId":1,"id":100}]"#).unwrap();
    let issues: Vec<String> = (0..5).map(|n| issue_json(n, 1)).collect();
    fs::write(tmp.path().join(ISSUES_FILE), format!("[{}", issues.join(","))).unwrap();

    let store = InMemoryIssueStore::new();
    let err = run(tmp.path(), &store, 2).await.unwrap_err();

    assert!(matches!(err, DigestError::Format { .. }));
    // Two full chunks were flushed before the truncation was reached.
    assert_eq!(store.batch_sizes(), vec![2, 2]);
}

#[tokio::test]
async fn record_missing_rule_key_fails_without_flushing() {
    let tmp = TempDir::new().unwrap();
    let issues = vec![
        issue_json(0, 1),
        r#"{"key":"broken","ruleRepo":"squid","componentBatchId":1}"#.to_string(),
        issue_json(2, 1),
    ];
    write_report(tmp.path(), r#"[{"batchId":1,"id":100}]"#, &issues);

    let store = InMemoryIssueStore::new();
    let err = run(tmp.path(), &store, 1000).await.unwrap_err();

    assert!(matches!(err, DigestError::Format { .. }));
    assert!(store.batch_sizes().is_empty());
}

#[tokio::test]
async fn malformed_record_after_exact_chunk_boundary() {
    // The first chunk fills exactly at the record before the bad one.
    let tmp = TempDir::new().unwrap();
    let mut issues: Vec<String> = (0..2).map(|n| issue_json(n, 1)).collect();
    issues.push(r#"{"key":"broken"}"#.to_string());
    write_report(tmp.path(), r#"[{"batchId":1,"id":100}]"#, &issues);

    let store = InMemoryIssueStore::new();
    let err = run(tmp.path(), &store, 2).await.unwrap_err();

    assert!(matches!(err, DigestError::Format { .. }));
    assert_eq!(store.batch_sizes(), vec![2]);
}

#[tokio::test]
async fn storage_failure_aborts_and_keeps_flushed_prefix() {
    let tmp = TempDir::new().unwrap();
    let issues: Vec<String> = (0..7).map(|n| issue_json(n, 1)).collect();
    write_report(tmp.path(), r#"[{"batchId":1,"id":100}]"#, &issues);

    let store = InMemoryIssueStore::failing_after(2);
    let err = run(tmp.path(), &store, 3).await.unwrap_err();

    match err {
        DigestError::StorageWrite { pending, .. } => assert_eq!(pending, 1),
        other => panic!("expected storage error, got {:?}", other),
    }
    assert_eq!(store.batch_sizes(), vec![3, 3]);
}

#[tokio::test]
async fn change_set_date_is_the_analysis_date() {
    let tmp = TempDir::new().unwrap();
    let embedded = Utc.with_ymd_and_hms(2010, 5, 5, 5, 5, 5).unwrap();
    let issue = format!(
        r#"{{"key":"k","ruleRepo":"squid","ruleKey":"S1","diffFields":"@at={},@by=simon,severity=MINOR|MAJOR"}}"#,
        embedded.timestamp_millis()
    );
    write_report(tmp.path(), "[]", &[issue]);

    let store = InMemoryIssueStore::new();
    run(tmp.path(), &store, 10).await.unwrap();

    let issues = store.issues();
    let change = &issues[0].current_change;
    assert_eq!(change.creation_date(), Some(analysis_date()));
    assert_eq!(change.user_login(), Some("simon"));
}

#[tokio::test]
async fn lenient_optional_fields_do_not_fail_the_digest() {
    let tmp = TempDir::new().unwrap();
    let issue = r#"{"key":"k","ruleRepo":"squid","ruleKey":"S1","componentBatchId":"x",
        "debt":"lots","line":null,"issueAttributes":null,"diffFields":42,"closeDate":"soon"}"#;
    write_report(tmp.path(), r#"[{"batchId":1,"id":100}]"#, &[issue.to_string()]);

    let store = InMemoryIssueStore::new();
    run(tmp.path(), &store, 10).await.unwrap();

    let issue = &store.issues()[0];
    assert_eq!(issue.component_id, None);
    assert_eq!(issue.debt, None);
    assert_eq!(issue.line, None);
    assert!(issue.attributes.is_empty());
    assert!(issue.current_change.is_empty());
    assert!(issue.current_change.creation_date().is_some());
    assert_eq!(issue.close_date, None);
}

#[tokio::test]
async fn malformed_manifest_fails_before_any_flush() {
    let tmp = TempDir::new().unwrap();
    write_report(tmp.path(), r#"{"components":"nope"}"#, &[issue_json(0, 1)]);

    let store = InMemoryIssueStore::new();
    let err = run(tmp.path(), &store, 10).await.unwrap_err();
    assert!(matches!(err, DigestError::Format { .. }));
    assert!(store.batch_sizes().is_empty());
}
