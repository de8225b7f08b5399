//! Loading local records from the system being migrated away from.
//!
//! Sources produce [`RawPerson`] rows exactly as stored; the
//! [`crate::services::RecordNormalizer`] turns them into
//! [`crate::models::PersonRecord`] values.

mod sqlite;

pub use sqlite::{SCHEMA, SourceWindow, SqliteSource};

use crate::models::{LocalId, PersonRecord};
use serde::{Deserialize, Serialize};

/// A person row as stored in the source system.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawPerson {
    /// Source primary key.
    pub id: i64,
    /// Source household.
    pub household_id: Option<i64>,
    /// First name.
    pub first_name: Option<String>,
    /// Last name.
    pub last_name: Option<String>,
    /// Middle name.
    pub middle_name: Option<String>,
    /// "Goes by" name.
    pub goes_by_name: Option<String>,
    /// Gender.
    pub gender: Option<String>,
    /// Date of birth in whatever format the source emits.
    pub date_of_birth: Option<String>,
    /// Marital status.
    pub marital_status: Option<String>,
    /// Last-updated timestamp.
    pub last_updated: Option<String>,
    /// Phones and emails.
    pub communications: Vec<RawCommunication>,
    /// Postal addresses.
    pub addresses: Vec<RawAddress>,
    /// Custom attributes.
    pub attributes: Vec<RawAttribute>,
}

/// One phone or email row.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawCommunication {
    /// Specific type, e.g. `"Mobile Phone"` or `"Home Email"`.
    pub communication_type: String,
    /// General type: `"Telephone"` or `"Email"`.
    pub general_type: String,
    /// The number or address.
    pub value: String,
}

impl RawCommunication {
    /// Returns true for telephone rows.
    #[must_use]
    pub fn is_phone(&self) -> bool {
        self.general_type.eq_ignore_ascii_case("telephone")
    }

    /// Returns true for email rows.
    #[must_use]
    pub fn is_email(&self) -> bool {
        self.general_type.eq_ignore_ascii_case("email")
    }
}

/// One address row.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawAddress {
    /// Street line 1.
    pub address1: Option<String>,
    /// Street line 2.
    pub address2: Option<String>,
    /// City.
    pub city: Option<String>,
    /// State or province.
    pub st_province: Option<String>,
    /// Postal code.
    pub postal_code: Option<String>,
}

/// One custom attribute row.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawAttribute {
    /// Attribute identifier.
    pub attribute_id: i64,
    /// Value or comment.
    pub value: Option<String>,
}

/// A row that could not be decoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadFailure {
    /// Primary key of the row.
    pub id: LocalId,
    /// Why decoding failed.
    pub cause: String,
}

/// The ordered local batch for one migration pass.
///
/// `records` keeps source order (sorted by last name) because duplicate
/// detection relies on duplicates clustering together.
#[derive(Debug, Clone, Default)]
pub struct SourceBatch {
    /// Decoded records in source order.
    pub records: Vec<PersonRecord>,
    /// Rows that failed to decode.
    pub failures: Vec<LoadFailure>,
}

impl SourceBatch {
    /// Number of rows seen, decoded or not.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len() + self.failures.len()
    }

    /// Returns true if no rows were loaded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty() && self.failures.is_empty()
    }
}
