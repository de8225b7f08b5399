//! Applying write operations.
//!
//! Operations for one record are applied strictly in order. The first
//! failing write stops that record; writes already made stay made.

use crate::models::{
    AttributeWrite, PersonFields, PersonRecord, PersonRef, RemoteId, WriteOperation,
};
use crate::remote::{RemoteWriter, ResourceKind};
use crate::{Error, Result};
use serde_json::{Map, Value, json};
use std::sync::Arc;
use std::time::Instant;
use tracing::instrument;

/// Consumes the write operations computed for each record.
pub trait OperationSink {
    /// Handles the operations for `record`.
    ///
    /// # Errors
    ///
    /// Returns an error if any operation could not be applied.
    fn submit(&mut self, record: &PersonRecord, ops: &[WriteOperation]) -> Result<()>;
}

fn person_attributes(fields: &PersonFields) -> Value {
    let mut attributes = Map::new();
    attributes.insert("first_name".to_string(), json!(fields.first_name));
    attributes.insert("last_name".to_string(), json!(fields.last_name));
    if let Some(given_name) = &fields.given_name {
        attributes.insert("given_name".to_string(), json!(given_name));
    }
    if let Some(middle_name) = &fields.middle_name {
        attributes.insert("middle_name".to_string(), json!(middle_name));
    }
    if let Some(gender) = fields.gender {
        attributes.insert("gender".to_string(), json!(gender.as_str()));
    }
    if let Some(birthdate) = fields.birthdate {
        attributes.insert(
            "birthdate".to_string(),
            json!(birthdate.format("%Y-%m-%d").to_string()),
        );
    }
    if let Some(status) = fields.status {
        attributes.insert("status".to_string(), json!(status.as_str()));
    }
    Value::Object(attributes)
}

/// Returns the resource kind and attribute payload for `op`.
#[must_use]
pub fn payload(op: &WriteOperation) -> (ResourceKind, Value) {
    match op {
        WriteOperation::CreatePerson { fields } | WriteOperation::UpdatePerson { fields, .. } => {
            (ResourceKind::Person, person_attributes(fields))
        },
        WriteOperation::AddPhone { phone, .. } => (
            ResourceKind::PhoneNumber,
            json!({ "number": phone.display, "location": phone.kind.as_str() }),
        ),
        WriteOperation::AddEmail { email, .. } => (
            ResourceKind::Email,
            json!({ "address": email.address, "location": email.kind.as_str() }),
        ),
        WriteOperation::AddAddress { address, .. } => (
            ResourceKind::Address,
            json!({
                "street_line_1": address.street1,
                "street_line_2": address.street2,
                "city": address.city,
                "state": address.state,
                "zip": address.postal_code,
                "location": "Home",
            }),
        ),
        WriteOperation::SetAttribute {
            field_definition_id,
            value,
            ..
        } => (
            ResourceKind::FieldDatum,
            json!({ "field_definition_id": field_definition_id, "value": value }),
        ),
    }
}

/// Applies operations through a [`RemoteWriter`].
pub struct OperationExecutor<W: RemoteWriter> {
    writer: Arc<W>,
}

impl<W: RemoteWriter> OperationExecutor<W> {
    /// Creates an executor.
    #[must_use]
    pub const fn new(writer: Arc<W>) -> Self {
        Self { writer }
    }

    fn owner(person: &PersonRef, created: Option<&RemoteId>) -> Result<RemoteId> {
        match person {
            PersonRef::Existing(id) => Ok(id.clone()),
            PersonRef::Created => created.cloned().ok_or_else(|| {
                Error::InvalidInput("sub-resource write precedes person creation".to_string())
            }),
        }
    }

    fn apply(&self, op: &WriteOperation, created: &mut Option<RemoteId>) -> Result<()> {
        let (kind, attributes) = payload(op);
        match op {
            WriteOperation::CreatePerson { .. } => {
                let id = self.writer.create(kind, None, &attributes)?;
                tracing::info!(person = %id, "Created person");
                *created = Some(id);
            },
            WriteOperation::UpdatePerson { person, .. } => {
                self.writer.update(kind, person, &attributes)?;
                tracing::info!(person = %person, "Updated person");
            },
            WriteOperation::SetAttribute {
                person,
                write: AttributeWrite::Patch(datum),
                value,
                ..
            } => {
                let owner = Self::owner(person, created.as_ref())?;
                self.writer.update(kind, datum, &json!({ "value": value }))?;
                tracing::debug!(person = %owner, datum = %datum, "Patched field datum");
            },
            WriteOperation::AddPhone { person, .. }
            | WriteOperation::AddEmail { person, .. }
            | WriteOperation::AddAddress { person, .. }
            | WriteOperation::SetAttribute { person, .. } => {
                let owner = Self::owner(person, created.as_ref())?;
                let id = self.writer.create(kind, Some(&owner), &attributes)?;
                tracing::debug!(person = %owner, resource = kind.type_name(), id = %id, "Created sub-resource");
            },
        }
        Ok(())
    }
}

impl<W: RemoteWriter> OperationSink for OperationExecutor<W> {
    #[instrument(skip_all, fields(record = %record.id, operations = ops.len()))]
    fn submit(&mut self, record: &PersonRecord, ops: &[WriteOperation]) -> Result<()> {
        let start = Instant::now();
        let mut created: Option<RemoteId> = None;

        for (applied, op) in ops.iter().enumerate() {
            if let Err(e) = self.apply(op, &mut created) {
                tracing::warn!(
                    operation = op.name(),
                    applied,
                    error = %e,
                    "Write failed, remaining writes for this record skipped"
                );
                metrics::counter!("peoplesync_write_failures_total", "operation" => op.name())
                    .increment(1);
                return Err(e);
            }
            metrics::counter!("peoplesync_writes_total", "operation" => op.name()).increment(1);
        }

        metrics::histogram!("peoplesync_write_duration_ms")
            .record(start.elapsed().as_secs_f64() * 1000.0);
        Ok(())
    }
}
