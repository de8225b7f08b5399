//! Custom attributes and their mapping onto remote custom fields.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A custom attribute attached to a local record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalAttribute {
    /// Source attribute identifier.
    pub attribute_id: i64,
    /// Free-text value or comment (may be empty for flag-style attributes).
    pub value: String,
}

/// Data type of a remote custom field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RemoteFieldKind {
    /// Free text.
    #[default]
    Text,
    /// Calendar date (`YYYY-MM-DD`).
    Date,
    /// Checkbox.
    Boolean,
    /// Single choice from a list of options.
    Select,
}

impl RemoteFieldKind {
    /// Parses a kind name; unknown names fall back to [`Self::Text`].
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "date" => Self::Date,
            "boolean" | "checkbox" | "bool" => Self::Boolean,
            "select" | "dropdown" => Self::Select,
            _ => Self::Text,
        }
    }
}

/// Where a local attribute lands in the remote directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldMapping {
    /// Source attribute identifier.
    pub local_attribute_id: i64,
    /// Remote field definition identifier.
    pub remote_field_id: String,
    /// Remote field data type.
    pub remote_field_kind: RemoteFieldKind,
}

/// Lookup table from local attribute id to remote field.
#[derive(Debug, Clone, Default)]
pub struct FieldMappings {
    by_attribute: HashMap<i64, FieldMapping>,
}

impl FieldMappings {
    /// Creates an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces a mapping.
    pub fn insert(&mut self, mapping: FieldMapping) {
        self.by_attribute.insert(mapping.local_attribute_id, mapping);
    }

    /// Returns the mapping for a local attribute, if configured.
    #[must_use]
    pub fn get(&self, local_attribute_id: i64) -> Option<&FieldMapping> {
        self.by_attribute.get(&local_attribute_id)
    }

    /// Number of configured mappings.
    #[must_use]
    pub fn len(&self) -> usize {
        self.by_attribute.len()
    }

    /// Returns true if nothing is mapped.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_attribute.is_empty()
    }
}

impl FromIterator<FieldMapping> for FieldMappings {
    fn from_iter<I: IntoIterator<Item = FieldMapping>>(iter: I) -> Self {
        let mut mappings = Self::new();
        for mapping in iter {
            mappings.insert(mapping);
        }
        mappings
    }
}
