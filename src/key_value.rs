//! Flat `key=value;key=value` attribute encoding.
//!
//! Pairs are separated by `;` and split at the first `=`. A pair without
//! `=` maps its key to an empty value. Empty pairs are skipped. Parsing never
//! fails.

use std::collections::BTreeMap;

const PAIR_SEPARATOR: char = ';';
const FIELD_SEPARATOR: char = '=';

/// Parse an attribute blob. `None` and `""` yield an empty map.
pub fn parse(data: Option<&str>) -> BTreeMap<String, String> {
    let mut map = BTreeMap::new();
    let Some(data) = data else {
        return map;
    };

    for pair in data.split(PAIR_SEPARATOR) {
        if pair.trim().is_empty() {
            continue;
        }
        let (key, value) = match pair.split_once(FIELD_SEPARATOR) {
            Some((k, v)) => (k, v),
            None => (pair, ""),
        };
        if key.is_empty() {
            continue;
        }
        map.insert(key.to_string(), value.to_string());
    }

    map
}

/// Encode a map back into the flat form. Returns `None` for an empty map.
pub fn format(map: &BTreeMap<String, String>) -> Option<String> {
    if map.is_empty() {
        return None;
    }
    Some(
        map.iter()
            .map(|(k, v)| format!("{}{}{}", k, FIELD_SEPARATOR, v))
            .collect::<Vec<_>>()
            .join(&PAIR_SEPARATOR.to_string()),
    )
}
