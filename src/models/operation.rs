//! Write operations produced by reconciliation.
//!
//! Operations are plain values: the decision engine emits them and an
//! [`crate::services::OperationSink`] consumes them. Nothing here performs I/O.

use chrono::NaiveDate;
use serde::Serialize;

use super::person::{EmailAddress, Gender, PhoneNumber, PostalAddress};
use super::remote::{PersonStatus, RemoteId};

/// The person a sub-resource write belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PersonRef {
    /// A person that already exists remotely.
    Existing(RemoteId),
    /// The person created by the `CreatePerson` earlier in the same sequence.
    Created,
}

/// Identity fields written to a remote person.
///
/// `None` means "leave the remote value alone", not "clear it".
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PersonFields {
    /// Published first name (preferred name when known).
    pub first_name: String,
    /// Legal first name, set only when `first_name` is a preferred name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub given_name: Option<String>,
    /// Middle name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub middle_name: Option<String>,
    /// Last name.
    pub last_name: String,
    /// Gender.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gender: Option<Gender>,
    /// Birthdate; never the `1900-01-01` sentinel.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub birthdate: Option<NaiveDate>,
    /// Status; only set on creation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<PersonStatus>,
}

/// How a custom field value is written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AttributeWrite {
    /// Create a new field datum.
    Create,
    /// Patch the existing field datum.
    Patch(RemoteId),
}

/// One write against the remote directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum WriteOperation {
    /// Create a new person.
    CreatePerson {
        /// Fields to set.
        fields: PersonFields,
    },
    /// Patch an existing person.
    UpdatePerson {
        /// Person to patch.
        person: RemoteId,
        /// Fields to set.
        fields: PersonFields,
    },
    /// Attach a phone number.
    AddPhone {
        /// Owner.
        person: PersonRef,
        /// Number to add.
        phone: PhoneNumber,
    },
    /// Attach an email address.
    AddEmail {
        /// Owner.
        person: PersonRef,
        /// Address to add.
        email: EmailAddress,
    },
    /// Attach a postal address.
    AddAddress {
        /// Owner.
        person: PersonRef,
        /// Address to add.
        address: PostalAddress,
    },
    /// Set a custom field value.
    SetAttribute {
        /// Owner.
        person: PersonRef,
        /// Remote field definition.
        field_definition_id: String,
        /// Rendered value.
        value: String,
        /// Create or patch.
        write: AttributeWrite,
    },
}

impl WriteOperation {
    /// Short name used in logs and plans.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::CreatePerson { .. } => "create_person",
            Self::UpdatePerson { .. } => "update_person",
            Self::AddPhone { .. } => "add_phone",
            Self::AddEmail { .. } => "add_email",
            Self::AddAddress { .. } => "add_address",
            Self::SetAttribute { .. } => "set_attribute",
        }
    }
}
