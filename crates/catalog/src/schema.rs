use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// The closed set of spec fields every catalog row carries.
///
/// Column names in the on-disk CSV must match these exactly; anything else is
/// ignored at load time. Missing values are stored as the empty string.
pub const SPEC_FIELDS: &[&str] = &[
    "cpu",
    "gpu",
    "memory",
    "storage",
    "lcd",
    "touchscreen",
    "battery",
    "wireless",
    "lan",
    "bluetooth",
    "iointerface",
    "keyboard",
    "webcamera",
    "fingerprint",
    "audio",
    "thermal",
    "tdp",
    "weight",
    "dimensions",
    "structconfig",
    "powerbutton",
    "certifications",
    "softwareconfig",
    "accessory",
    "price",
    "devtime",
];

/// Fields shown when two or more models are compared side by side.
///
/// A subset of [`SPEC_FIELDS`] — the columns a buyer actually weighs against
/// each other, in display order.
pub const COMPARISON_FIELDS: &[&str] = &[
    "cpu", "gpu", "memory", "storage", "lcd", "battery", "weight", "price",
];

pub fn is_spec_field(name: &str) -> bool {
    SPEC_FIELDS.contains(&name)
}

/// One laptop configuration in the catalog.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SkuRow {
    /// Unique model name, e.g. `AG958` or `APX819: FP7R2`.
    pub model_name: String,
    /// Family token shared by sibling models (e.g. `958`), when derivable.
    pub series_key: Option<String>,
    /// Spec field → free-text value. Missing fields are the empty string.
    fields: HashMap<String, String>,
}

impl SkuRow {
    pub fn new(model_name: impl Into<String>, fields: HashMap<String, String>) -> Self {
        let model_name = model_name.into();
        let series_key = derive_series_key(&model_name);
        Self { model_name, series_key, fields }
    }

    /// Value of a spec field, or `""` when absent.
    pub fn field(&self, name: &str) -> &str {
        self.fields.get(name).map(String::as_str).unwrap_or("")
    }

    pub fn has_value(&self, name: &str) -> bool {
        !self.field(name).is_empty()
    }
}

/// Derive the series key from a model name: the first run of three or more
/// consecutive ASCII digits. `AG958` → `958`, `APX819: FP7R2` → `819`.
/// Names with no such run have no series key.
pub fn derive_series_key(model_name: &str) -> Option<String> {
    let bytes = model_name.as_bytes();
    let mut start: Option<usize> = None;
    for (i, b) in bytes.iter().enumerate() {
        if b.is_ascii_digit() {
            start.get_or_insert(i);
        } else {
            if let Some(s) = start {
                if i - s >= 3 {
                    return Some(model_name[s..i].to_string());
                }
            }
            start = None;
        }
    }
    if let Some(s) = start {
        if bytes.len() - s >= 3 {
            return Some(model_name[s..].to_string());
        }
    }
    None
}
