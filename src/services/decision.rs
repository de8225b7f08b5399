//! Create-or-update decisioning.
//!
//! Given a local record and, optionally, the remote person it matched,
//! [`SyncDecisionEngine::reconcile`] computes the smallest sequence of
//! writes that brings the remote directory level with the local record.
//! Running it again against the resulting remote state yields nothing.

use crate::models::{
    AttributeWrite, EmailAddress, FieldMappings, LocalAttribute, PersonFields, PersonRecord,
    PersonRef, PersonStatus, PhoneNumber, PostalAddress, RemoteCandidate, RemoteFieldKind,
    WriteOperation,
};
use crate::remote::Geocoder;
use crate::services::address::AddressEquivalence;
use crate::services::normalize::parse_date;
use chrono::NaiveDate;
use std::collections::HashSet;
use tracing::instrument;

/// Renders a local attribute for a remote field of `kind`.
///
/// Returns `None` when there is nothing meaningful to write: an empty text
/// value or a date that does not parse.
#[must_use]
pub fn render_attribute(kind: RemoteFieldKind, value: &str) -> Option<String> {
    let value = value.trim();
    match kind {
        // Holding the attribute at all means the box is ticked.
        RemoteFieldKind::Boolean => Some("true".to_string()),
        RemoteFieldKind::Date => {
            parse_date(value, NaiveDate::MAX).map(|date| date.format("%Y-%m-%d").to_string())
        },
        RemoteFieldKind::Text | RemoteFieldKind::Select => {
            Some(value.to_string()).filter(|v| !v.is_empty())
        },
    }
}

fn non_empty(value: &str) -> Option<String> {
    Some(value.to_string()).filter(|v| !v.is_empty())
}

/// Identity fields to publish for `local`.
///
/// The preferred name is published as the first name, with the legal first
/// name kept as the given name.
#[must_use]
pub fn person_fields(local: &PersonRecord) -> PersonFields {
    let first_name = local.display_first_name().to_string();
    let given_name = (first_name != local.first_name).then(|| local.first_name.clone());

    PersonFields {
        first_name,
        given_name,
        middle_name: non_empty(&local.middle_name),
        last_name: local.last_name.clone(),
        gender: local.gender,
        birthdate: local.date_of_birth,
        status: None,
    }
}

/// Returns true if applying `fields` would change `remote`.
fn differs(fields: &PersonFields, remote: &RemoteCandidate) -> bool {
    fn set_and_differs<T: PartialEq>(wanted: Option<&T>, current: Option<&T>) -> bool {
        wanted.is_some_and(|w| Some(w) != current)
    }

    fields.first_name != remote.first_name
        || fields.last_name != remote.last_name
        || set_and_differs(fields.given_name.as_ref(), remote.given_name.as_ref())
        || set_and_differs(fields.middle_name.as_ref(), remote.middle_name.as_ref())
        || set_and_differs(fields.gender.as_ref(), remote.gender.as_ref())
        || set_and_differs(fields.birthdate.as_ref(), remote.birthdate.as_ref())
}

fn add_phones(
    local: &PersonRecord,
    remote: Option<&RemoteCandidate>,
    owner: &PersonRef,
    ops: &mut Vec<WriteOperation>,
) {
    let mut pending: Vec<&PhoneNumber> = Vec::new();
    for phone in &local.phones {
        let known = remote.is_some_and(|r| r.phones.iter().any(|p| p.value.same_number(phone)));
        if known || pending.iter().any(|p| p.same_number(phone)) {
            continue;
        }
        pending.push(phone);
        ops.push(WriteOperation::AddPhone {
            person: owner.clone(),
            phone: phone.clone(),
        });
    }
}

fn add_emails(
    local: &PersonRecord,
    remote: Option<&RemoteCandidate>,
    owner: &PersonRef,
    ops: &mut Vec<WriteOperation>,
) {
    let mut pending: Vec<&EmailAddress> = Vec::new();
    for email in &local.emails {
        let known =
            remote.is_some_and(|r| r.emails.iter().any(|e| e.value.same_address(email)));
        if known || pending.iter().any(|e| e.same_address(email)) {
            continue;
        }
        pending.push(email);
        ops.push(WriteOperation::AddEmail {
            person: owner.clone(),
            email: email.clone(),
        });
    }
}

/// Computes the writes that reconcile a local record with the remote
/// directory.
pub struct SyncDecisionEngine<G: Geocoder> {
    addresses: AddressEquivalence<G>,
    mappings: FieldMappings,
}

impl<G: Geocoder> SyncDecisionEngine<G> {
    /// Creates an engine.
    #[must_use]
    pub const fn new(addresses: AddressEquivalence<G>, mappings: FieldMappings) -> Self {
        Self {
            addresses,
            mappings,
        }
    }

    /// Returns the configured field mappings.
    #[must_use]
    pub const fn mappings(&self) -> &FieldMappings {
        &self.mappings
    }

    /// Returns the write sequence for `local`.
    ///
    /// With no remote match the sequence starts with a `CreatePerson` and
    /// every sub-resource write refers to [`PersonRef::Created`]. With a
    /// match, only differences are written and the remote status is left
    /// untouched.
    #[instrument(skip_all, fields(record = %local.id, remote = ?remote.map(|r| r.id.as_str())))]
    pub fn reconcile(
        &self,
        local: &PersonRecord,
        remote: Option<&RemoteCandidate>,
    ) -> Vec<WriteOperation> {
        let mut ops = Vec::new();
        let fields = person_fields(local);

        let owner = match remote {
            None => {
                ops.push(WriteOperation::CreatePerson {
                    fields: PersonFields {
                        status: Some(PersonStatus::Inactive),
                        ..fields
                    },
                });
                PersonRef::Created
            },
            Some(remote) => {
                if differs(&fields, remote) {
                    ops.push(WriteOperation::UpdatePerson {
                        person: remote.id.clone(),
                        fields,
                    });
                }
                PersonRef::Existing(remote.id.clone())
            },
        };

        add_phones(local, remote, &owner, &mut ops);
        add_emails(local, remote, &owner, &mut ops);
        self.add_addresses(local, remote, &owner, &mut ops);
        self.set_attributes(&local.attributes, remote, &owner, &mut ops);

        tracing::debug!(operations = ops.len(), "Reconciled record");
        ops
    }

    fn add_addresses(
        &self,
        local: &PersonRecord,
        remote: Option<&RemoteCandidate>,
        owner: &PersonRef,
        ops: &mut Vec<WriteOperation>,
    ) {
        let mut pending: Vec<&PostalAddress> = Vec::new();
        for address in &local.addresses {
            let known = remote.is_some_and(|r| {
                r.addresses
                    .iter()
                    .any(|a| self.addresses.addresses_equivalent(&a.value, address))
            });
            if known
                || pending
                    .iter()
                    .any(|a| self.addresses.addresses_equivalent(a, address))
            {
                continue;
            }
            pending.push(address);
            ops.push(WriteOperation::AddAddress {
                person: owner.clone(),
                address: address.clone(),
            });
        }
    }

    fn set_attributes(
        &self,
        attributes: &[LocalAttribute],
        remote: Option<&RemoteCandidate>,
        owner: &PersonRef,
        ops: &mut Vec<WriteOperation>,
    ) {
        let mut written: HashSet<&str> = HashSet::new();
        for attribute in attributes {
            let Some(mapping) = self.mappings.get(attribute.attribute_id) else {
                tracing::trace!(attribute = attribute.attribute_id, "Attribute has no mapping");
                continue;
            };
            let Some(value) = render_attribute(mapping.remote_field_kind, &attribute.value) else {
                continue;
            };
            if !written.insert(mapping.remote_field_id.as_str()) {
                continue;
            }

            let existing = remote.and_then(|r| r.field_datum(&mapping.remote_field_id));
            let write = match existing {
                Some(datum) if datum.value == value => continue,
                Some(datum) => AttributeWrite::Patch(datum.id.clone()),
                None => AttributeWrite::Create,
            };
            ops.push(WriteOperation::SetAttribute {
                person: owner.clone(),
                field_definition_id: mapping.remote_field_id.clone(),
                value,
                write,
            });
        }
    }
}
