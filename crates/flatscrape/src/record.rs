//! Mapping extracted records onto record-store field ids.
//!
//! The record store names its columns by opaque ids. A domain's
//! `store_field_map` renames internal field names to those ids; two
//! pseudo-fields carry data that does not come from the page.

use crate::extract::ExtractedRecord;
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Pseudo-field receiving the canonical URL.
pub const URL_FIELD: &str = "url_address";
/// Pseudo-field receiving the identity of the submitting user.
pub const FOUND_BY_FIELD: &str = "found_by";

/// Build the payload for the record store.
///
/// Extracted fields without a mapping are dropped; mapped fields that were
/// not configured for extraction are left out rather than written as null.
pub fn map_to_store_fields(
    record: &ExtractedRecord,
    canonical_url: &str,
    field_map: &BTreeMap<String, String>,
    found_by: Option<&str>,
) -> Map<String, Value> {
    let mut out = Map::new();

    for (internal, store_field) in field_map {
        if let Some(value) = record.get(internal) {
            let json = serde_json::to_value(value).unwrap_or(Value::Null);
            out.insert(store_field.clone(), json);
        }
    }

    if let Some(url_field) = field_map.get(URL_FIELD) {
        out.insert(url_field.clone(), Value::String(canonical_url.to_string()));
    }

    if let (Some(field), Some(user)) = (field_map.get(FOUND_BY_FIELD), found_by) {
        out.insert(field.clone(), Value::String(user.to_string()));
    }

    out
}
