//! Core data models used throughout the digest pipeline.
//!
//! [`RawIssueRecord`] is the flat shape decoded from one element of the
//! issues file; [`Issue`] is the enriched entity handed to storage.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer};
use serde_json::Value;

use crate::field_diffs::FieldDiffs;

/// Working hours in one day of technical debt.
pub const HOURS_IN_DAY: i64 = 8;

/// Fully qualified rule reference (`repository:rule`).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RuleKey {
    pub repository: String,
    pub rule: String,
}

impl RuleKey {
    pub fn of(repository: impl Into<String>, rule: impl Into<String>) -> Self {
        Self {
            repository: repository.into(),
            rule: rule.into(),
        }
    }
}

impl fmt::Display for RuleKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.repository, self.rule)
    }
}

/// Remediation effort, stored in minutes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub struct Duration {
    minutes: i64,
}

impl Duration {
    pub fn of_minutes(minutes: i64) -> Self {
        Self { minutes }
    }

    pub fn minutes(&self) -> i64 {
        self.minutes
    }
}

impl std::ops::Add for Duration {
    type Output = Duration;

    fn add(self, rhs: Duration) -> Duration {
        Duration::of_minutes(self.minutes.saturating_add(rhs.minutes))
    }
}

/// Renders as work days, hours and minutes, e.g. `1d 2h 5min`.
impl fmt::Display for Duration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let minutes_in_day = HOURS_IN_DAY * 60;
        let days = self.minutes / minutes_in_day;
        let hours = (self.minutes % minutes_in_day) / 60;
        let mins = self.minutes % 60;

        let mut parts = Vec::new();
        if days > 0 {
            parts.push(format!("{}d", days));
        }
        if hours > 0 {
            parts.push(format!("{}h", hours));
        }
        if mins > 0 || parts.is_empty() {
            parts.push(format!("{}min", mins));
        }
        write!(f, "{}", parts.join(" "))
    }
}

/// One issue exactly as the batch tool wrote it.
///
/// Only `key`, `ruleRepo` and `ruleKey` are mandatory. Every other scalar
/// is decoded leniently: a value of the wrong type becomes `None` instead of
/// failing the whole report.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RawIssueRecord {
    pub key: String,
    pub rule_repo: String,
    pub rule_key: String,
    #[serde(default, deserialize_with = "lenient_i64")]
    pub component_batch_id: Option<i64>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub severity: Option<String>,
    #[serde(default, deserialize_with = "lenient_bool")]
    pub manual_severity: bool,
    #[serde(default, deserialize_with = "lenient_string")]
    pub message: Option<String>,
    #[serde(default, deserialize_with = "lenient_i64")]
    pub line: Option<i64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub effort_to_fix: Option<f64>,
    #[serde(default, deserialize_with = "lenient_i64")]
    pub debt: Option<i64>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub diff_fields: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub status: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub resolution: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub reporter: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub assignee: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub author_login: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub action_plan_key: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub checksum: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub issue_attributes: Option<String>,
    #[serde(default, deserialize_with = "lenient_datetime")]
    pub creation_date: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "lenient_datetime")]
    pub update_date: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "lenient_datetime")]
    pub close_date: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "lenient_i64")]
    pub selected_at: Option<i64>,
    #[serde(default, deserialize_with = "lenient_bool")]
    pub is_changed: bool,
    #[serde(default, deserialize_with = "lenient_bool")]
    pub is_new: bool,
}

/// An issue enriched with resolved component, rule and parsed fields.
#[derive(Debug, Clone, PartialEq)]
pub struct Issue {
    pub key: String,
    /// Persisted id of the component, when the batch id could be resolved.
    pub component_id: Option<i64>,
    pub rule_key: RuleKey,
    pub severity: Option<String>,
    pub manual_severity: bool,
    pub message: Option<String>,
    pub line: Option<i64>,
    pub effort_to_fix: Option<f64>,
    pub debt: Option<Duration>,
    pub current_change: FieldDiffs,
    pub status: Option<String>,
    pub resolution: Option<String>,
    pub reporter: Option<String>,
    pub assignee: Option<String>,
    pub author_login: Option<String>,
    pub action_plan_key: Option<String>,
    pub checksum: Option<String>,
    pub attributes: BTreeMap<String, String>,
    pub creation_date: Option<DateTime<Utc>>,
    pub update_date: Option<DateTime<Utc>>,
    pub close_date: Option<DateTime<Utc>>,
    pub selected_at: Option<i64>,
    pub changed: bool,
    pub new: bool,
}

fn lenient_i64<'de, D: Deserializer<'de>>(d: D) -> Result<Option<i64>, D::Error> {
    Ok(Option::<Value>::deserialize(d)?.and_then(|v| match v {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }))
}

fn lenient_f64<'de, D: Deserializer<'de>>(d: D) -> Result<Option<f64>, D::Error> {
    Ok(Option::<Value>::deserialize(d)?.and_then(|v| match v {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }))
}

fn lenient_string<'de, D: Deserializer<'de>>(d: D) -> Result<Option<String>, D::Error> {
    Ok(Option::<Value>::deserialize(d)?.and_then(|v| match v {
        Value::String(s) => Some(s),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }))
}

fn lenient_bool<'de, D: Deserializer<'de>>(d: D) -> Result<bool, D::Error> {
    Ok(match Option::<Value>::deserialize(d)? {
        Some(Value::Bool(b)) => b,
        Some(Value::String(s)) => s.eq_ignore_ascii_case("true"),
        _ => false,
    })
}

fn lenient_datetime<'de, D: Deserializer<'de>>(d: D) -> Result<Option<DateTime<Utc>>, D::Error> {
    Ok(Option::<Value>::deserialize(d)?.and_then(|v| match v {
        Value::String(s) => parse_timestamp(&s),
        Value::Number(n) => n.as_i64().and_then(DateTime::from_timestamp_millis),
        _ => None,
    }))
}

/// Parse an RFC 3339 timestamp or a count of epoch milliseconds.
pub(crate) fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    raw.parse::<i64>()
        .ok()
        .and_then(DateTime::from_timestamp_millis)
}
