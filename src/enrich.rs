//! Enrichment of raw issue records into domain [`Issue`]s.
//!
//! [`enrich`] never fails. Optional fields that are absent or unusable are
//! left unset; the mandatory fields were already checked by the decoder.

use chrono::{DateTime, Utc};

use crate::components::ComponentIndex;
use crate::field_diffs::FieldDiffs;
use crate::key_value;
use crate::models::{Duration, Issue, RawIssueRecord, RuleKey};

/// Build an [`Issue`] from one decoded record.
///
/// `analysis_date` becomes the creation time of the issue's current change
/// set, whatever time the encoded diff carries.
pub fn enrich(
    raw: &RawIssueRecord,
    components: &ComponentIndex,
    analysis_date: DateTime<Utc>,
) -> Issue {
    Issue {
        key: raw.key.clone(),
        component_id: resolve_component(raw.component_batch_id, components),
        rule_key: RuleKey::of(&raw.rule_repo, &raw.rule_key),
        severity: raw.severity.clone(),
        manual_severity: raw.manual_severity,
        message: raw.message.clone(),
        line: raw.line,
        effort_to_fix: raw.effort_to_fix,
        debt: to_debt(raw.debt),
        current_change: to_current_change(raw.diff_fields.as_deref(), analysis_date),
        status: raw.status.clone(),
        resolution: raw.resolution.clone(),
        reporter: raw.reporter.clone(),
        assignee: raw.assignee.clone(),
        author_login: raw.author_login.clone(),
        action_plan_key: raw.action_plan_key.clone(),
        checksum: raw.checksum.clone(),
        attributes: key_value::parse(raw.issue_attributes.as_deref()),
        creation_date: raw.creation_date,
        update_date: raw.update_date,
        close_date: raw.close_date,
        selected_at: raw.selected_at,
        changed: raw.is_changed,
        new: raw.is_new,
    }
}

fn resolve_component(batch_id: Option<i64>, components: &ComponentIndex) -> Option<i64> {
    batch_id
        .and_then(|id| components.lookup(id))
        .map(|c| c.persisted_id)
}

// Negative minutes cannot be a remediation cost.
fn to_debt(minutes: Option<i64>) -> Option<Duration> {
    minutes.filter(|m| *m >= 0).map(Duration::of_minutes)
}

// Every issue gets a change set, even an empty one.
fn to_current_change(encoded: Option<&str>, analysis_date: DateTime<Utc>) -> FieldDiffs {
    let mut diffs = encoded.map(FieldDiffs::parse).unwrap_or_default();
    diffs.set_creation_date(analysis_date);
    diffs
}
