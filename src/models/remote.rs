//! Records held by the remote directory.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

use super::person::{EmailAddress, Gender, PhoneNumber, PostalAddress};

/// Identifier assigned by the remote directory.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RemoteId(String);

impl RemoteId {
    /// Wraps a remote identifier.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RemoteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RemoteId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// Membership status of a remote person.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PersonStatus {
    /// Active profile.
    Active,
    /// Inactive profile. New people are created inactive pending review.
    #[default]
    Inactive,
}

impl PersonStatus {
    /// Parses the status string of the remote directory.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        if s.eq_ignore_ascii_case("active") {
            Self::Active
        } else {
            Self::Inactive
        }
    }

    /// Returns the status string of the remote directory.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Inactive => "inactive",
        }
    }
}

/// A sub-resource already attached to a remote person.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteItem<T> {
    /// Sub-resource identifier.
    pub id: RemoteId,
    /// The value.
    pub value: T,
}

impl<T> RemoteItem<T> {
    /// Pairs a value with its identifier.
    pub fn new(id: impl Into<String>, value: T) -> Self {
        Self {
            id: RemoteId::new(id),
            value,
        }
    }
}

/// A custom field value stored on a remote person.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteFieldDatum {
    /// Field datum identifier.
    pub id: RemoteId,
    /// Field definition the value belongs to.
    pub field_definition_id: String,
    /// Stored value.
    pub value: String,
}

/// A person returned by a remote search.
///
/// Lives only while one local record is being matched and reconciled.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteCandidate {
    /// Remote identifier.
    pub id: RemoteId,
    /// First name as published.
    pub first_name: String,
    /// Legal first name, when published separately.
    pub given_name: Option<String>,
    /// Middle name.
    pub middle_name: Option<String>,
    /// Last name.
    pub last_name: String,
    /// Gender.
    pub gender: Option<Gender>,
    /// Birthdate.
    pub birthdate: Option<NaiveDate>,
    /// Active or inactive.
    pub status: PersonStatus,
    /// Phone numbers.
    pub phones: Vec<RemoteItem<PhoneNumber>>,
    /// Email addresses.
    pub emails: Vec<RemoteItem<EmailAddress>>,
    /// Postal addresses.
    pub addresses: Vec<RemoteItem<PostalAddress>>,
    /// Custom field values.
    pub field_data: Vec<RemoteFieldDatum>,
}

impl RemoteCandidate {
    /// Creates a candidate with only the identity fields set.
    pub fn new(id: impl Into<String>, first_name: &str, last_name: &str) -> Self {
        Self {
            id: RemoteId::new(id),
            first_name: first_name.to_string(),
            given_name: None,
            middle_name: None,
            last_name: last_name.to_string(),
            gender: None,
            birthdate: None,
            status: PersonStatus::Active,
            phones: Vec::new(),
            emails: Vec::new(),
            addresses: Vec::new(),
            field_data: Vec::new(),
        }
    }

    /// Returns the stored value for a custom field definition.
    #[must_use]
    pub fn field_datum(&self, field_definition_id: &str) -> Option<&RemoteFieldDatum> {
        self.field_data
            .iter()
            .find(|datum| datum.field_definition_id == field_definition_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_parse() {
        assert_eq!(PersonStatus::parse("Active"), PersonStatus::Active);
        assert_eq!(PersonStatus::parse("inactive"), PersonStatus::Inactive);
        assert_eq!(PersonStatus::parse(""), PersonStatus::Inactive);
        assert_eq!(PersonStatus::Inactive.as_str(), "inactive");
    }

    #[test]
    fn test_field_datum_lookup() {
        let mut candidate = RemoteCandidate::new("9", "John", "Smith");
        candidate.field_data.push(RemoteFieldDatum {
            id: RemoteId::new("77"),
            field_definition_id: "1001".to_string(),
            value: "true".to_string(),
        });

        assert_eq!(
            candidate.field_datum("1001").map(|d| d.id.as_str()),
            Some("77")
        );
        assert!(candidate.field_datum("1002").is_none());
    }
}
