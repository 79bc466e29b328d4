use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeSet;

use crate::text::TextPolicy;
use crate::text::sanitize_value;

/// Which fields keep their paragraph structure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SanitizerConfig {
    #[serde(default = "default_multiline_fields")]
    pub multiline_fields: Vec<String>,
}

fn default_multiline_fields() -> Vec<String> {
    [
        "description",
        "detailed_description",
        "requirements",
        "specifications",
        "notes",
        "reason",
        "comment",
        "comments",
        "additional_info",
    ]
    .into_iter()
    .map(str::to_string)
    .collect()
}

impl Default for SanitizerConfig {
    fn default() -> Self {
        Self {
            multiline_fields: default_multiline_fields(),
        }
    }
}

/// Walks an arbitrary JSON record and cleans every string leaf according to
/// the key it sits under. Array elements inherit the key of their array.
#[derive(Debug, Clone)]
pub struct RecordSanitizer {
    multiline_fields: BTreeSet<String>,
}

impl Default for RecordSanitizer {
    fn default() -> Self {
        Self::new(&SanitizerConfig::default())
    }
}

impl RecordSanitizer {
    pub fn new(config: &SanitizerConfig) -> Self {
        Self {
            multiline_fields: config.multiline_fields.iter().cloned().collect(),
        }
    }

    pub fn policy_for(&self, key: Option<&str>) -> TextPolicy {
        match key {
            Some(key) if self.multiline_fields.contains(key) => TextPolicy::MultiLine,
            _ => TextPolicy::SingleLine,
        }
    }

    pub fn sanitize(&self, record: Value) -> Value {
        self.sanitize_under(None, record)
    }

    fn sanitize_under(&self, key: Option<&str>, value: Value) -> Value {
        match value {
            Value::Array(items) => Value::Array(
                items
                    .into_iter()
                    .map(|item| self.sanitize_under(key, item))
                    .collect(),
            ),
            Value::Object(fields) => Value::Object(
                fields
                    .into_iter()
                    .map(|(field, value)| {
                        let cleaned = self.sanitize_under(Some(field.as_str()), value);
                        (field, cleaned)
                    })
                    .collect(),
            ),
            leaf => sanitize_value(leaf, self.policy_for(key), key),
        }
    }
}
