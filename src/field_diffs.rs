//! Diff-history (change-set) codec.
//!
//! The batch tool encodes the changes made to an issue during the analysis
//! as comma-separated `field=old|new` entries. Either side may be empty; an
//! entry without `|` only carries a new value. Two reserved entries carry
//! metadata: `@at=` (creation time, RFC 3339 or epoch millis) and `@by=`
//! (author login).

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};

use crate::models::parse_timestamp;

const ENTRY_SEPARATOR: char = ',';
const FIELD_SEPARATOR: char = '=';
const VALUE_SEPARATOR: char = '|';
const CREATED_AT: &str = "@at";
const CHANGED_BY: &str = "@by";

/// Old and new value of one changed field.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Diff {
    pub old_value: Option<String>,
    pub new_value: Option<String>,
}

/// Set of field-level changes recorded together.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FieldDiffs {
    diffs: BTreeMap<String, Diff>,
    user_login: Option<String>,
    creation_date: Option<DateTime<Utc>>,
}

impl FieldDiffs {
    /// Parse the encoded form. Malformed entries are skipped.
    pub fn parse(encoded: &str) -> Self {
        let mut result = FieldDiffs::default();

        for entry in encoded.split(ENTRY_SEPARATOR) {
            let entry = entry.trim();
            let Some((field, values)) = entry.split_once(FIELD_SEPARATOR) else {
                continue;
            };
            match field {
                "" => continue,
                CREATED_AT => result.creation_date = parse_timestamp(values),
                CHANGED_BY => result.user_login = non_empty(values),
                _ => {
                    let diff = match values.split_once(VALUE_SEPARATOR) {
                        Some((old, new)) => Diff {
                            old_value: non_empty(old),
                            new_value: non_empty(new),
                        },
                        None => Diff {
                            old_value: None,
                            new_value: non_empty(values),
                        },
                    };
                    result.diffs.insert(field.to_string(), diff);
                }
            }
        }

        result
    }

    pub fn set_diff(&mut self, field: &str, old_value: Option<&str>, new_value: Option<&str>) {
        self.diffs.insert(
            field.to_string(),
            Diff {
                old_value: old_value.map(str::to_string),
                new_value: new_value.map(str::to_string),
            },
        );
    }

    pub fn get(&self, field: &str) -> Option<&Diff> {
        self.diffs.get(field)
    }

    pub fn diffs(&self) -> &BTreeMap<String, Diff> {
        &self.diffs
    }

    pub fn is_empty(&self) -> bool {
        self.diffs.is_empty()
    }

    pub fn user_login(&self) -> Option<&str> {
        self.user_login.as_deref()
    }

    pub fn creation_date(&self) -> Option<DateTime<Utc>> {
        self.creation_date
    }

    pub fn set_creation_date(&mut self, date: DateTime<Utc>) {
        self.creation_date = Some(date);
    }
}

/// Encodes the field diffs only; metadata is stored alongside.
impl fmt::Display for FieldDiffs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (field, diff) in &self.diffs {
            if !first {
                write!(f, "{}", ENTRY_SEPARATOR)?;
            }
            first = false;
            write!(
                f,
                "{}{}{}{}{}",
                field,
                FIELD_SEPARATOR,
                diff.old_value.as_deref().unwrap_or(""),
                VALUE_SEPARATOR,
                diff.new_value.as_deref().unwrap_or("")
            )?;
        }
        Ok(())
    }
}

fn non_empty(value: &str) -> Option<String> {
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}
