//! In-memory index of the components referenced by a report.
//!
//! The batch tool numbers components with ids that are only meaningful
//! inside one report. The manifest maps each of them to the id of the
//! component already persisted on the server side, which is what issues are
//! linked to when stored.

use std::collections::HashMap;
use std::path::Path;

use serde::Deserialize;
use serde_json::Value;

use crate::error::DigestError;

/// Default manifest file name inside a report directory.
pub const COMPONENTS_FILE: &str = "components.json";

/// One component entry of the manifest.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComponentRecord {
    /// Report-scoped id.
    pub batch_id: i64,
    /// Server-side id, assigned outside this crate.
    #[serde(rename = "id", alias = "persistedId")]
    pub persisted_id: i64,
    #[serde(default)]
    pub key: Option<String>,
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default)]
    pub qualifier: Option<String>,
}

/// Lookup from batch-local id to [`ComponentRecord`]. Read-only once built.
#[derive(Debug, Clone, Default)]
pub struct ComponentIndex {
    by_batch_id: HashMap<i64, ComponentRecord>,
}

impl ComponentIndex {
    /// Load `components.json` from a report directory.
    pub fn load(directory: &Path) -> Result<Self, DigestError> {
        Self::load_file(&directory.join(COMPONENTS_FILE))
    }

    /// Load a manifest from an explicit path.
    ///
    /// The manifest is either a bare array of components or an object with a
    /// `components` array.
    pub fn load_file(path: &Path) -> Result<Self, DigestError> {
        let content = std::fs::read_to_string(path).map_err(|e| DigestError::read(path, e))?;

        let value: Value = serde_json::from_str(&content)
            .map_err(|e| DigestError::format(path, format!("invalid JSON: {}", e)))?;

        let list = match value {
            Value::Array(_) => value,
            Value::Object(mut obj) => obj
                .remove("components")
                .ok_or_else(|| DigestError::format(path, "missing 'components' array"))?,
            _ => {
                return Err(DigestError::format(
                    path,
                    "expected an array or an object with a 'components' array",
                ))
            }
        };

        let records: Vec<ComponentRecord> = serde_json::from_value(list)
            .map_err(|e| DigestError::format(path, format!("invalid component: {}", e)))?;

        Self::from_records(records).map_err(|dup| {
            DigestError::format(path, format!("duplicate component batchId {}", dup))
        })
    }

    /// Build an index, rejecting duplicate batch ids (the duplicate is
    /// returned as the error).
    pub fn from_records(records: Vec<ComponentRecord>) -> Result<Self, i64> {
        let mut by_batch_id = HashMap::with_capacity(records.len());
        for record in records {
            let batch_id = record.batch_id;
            if by_batch_id.insert(batch_id, record).is_some() {
                return Err(batch_id);
            }
        }
        Ok(Self { by_batch_id })
    }

    /// Resolve a batch-local id. Absence is a normal outcome.
    pub fn lookup(&self, batch_id: i64) -> Option<&ComponentRecord> {
        self.by_batch_id.get(&batch_id)
    }

    pub fn len(&self) -> usize {
        self.by_batch_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_batch_id.is_empty()
    }
}
