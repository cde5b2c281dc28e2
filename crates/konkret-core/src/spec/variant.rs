use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// The value of a build variant: a boolean toggle or a named choice.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum VariantValue {
    Bool(bool),
    Value(String),
}

impl VariantValue {
    /// `true`/`false` become toggles, anything else a named value.
    pub fn parse(s: &str) -> Self {
        match s.to_ascii_lowercase().as_str() {
            "true" => VariantValue::Bool(true),
            "false" => VariantValue::Bool(false),
            _ => VariantValue::Value(s.to_string()),
        }
    }
}

impl fmt::Display for VariantValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VariantValue::Bool(b) => write!(f, "{b}"),
            VariantValue::Value(s) => f.write_str(s),
        }
    }
}

/// Variant assignments keyed by variant name.
pub type VariantMap = BTreeMap<String, VariantValue>;

/// Render toggles as `+name`/`~name`, concatenated.
pub fn format_toggles(variants: &VariantMap) -> String {
    variants
        .iter()
        .filter_map(|(name, value)| match value {
            VariantValue::Bool(true) => Some(format!("+{name}")),
            VariantValue::Bool(false) => Some(format!("~{name}")),
            VariantValue::Value(_) => None,
        })
        .collect()
}

/// Render named values as `name=value` words.
pub fn format_values(variants: &VariantMap) -> Vec<String> {
    variants
        .iter()
        .filter_map(|(name, value)| match value {
            VariantValue::Value(v) => Some(format!("{name}={v}")),
            VariantValue::Bool(_) => None,
        })
        .collect()
}
