//! Data models for peoplesync.
//!
//! This module contains the value types shared by the matching and
//! reconciliation services.

mod attribute;
mod geo;
mod household;
mod operation;
mod person;
mod remote;
mod summary;

pub use attribute::{FieldMapping, FieldMappings, LocalAttribute, RemoteFieldKind};
pub use geo::Coordinates;
pub use household::{Household, HouseholdMember};
pub use operation::{AttributeWrite, PersonFields, PersonRef, WriteOperation};
pub use person::{
    DOB_SENTINEL, EmailAddress, EmailKind, Gender, LocalId, PersonRecord, PhoneKind, PhoneNumber,
    PostalAddress,
};
pub(crate) use person::eq_caseless;
pub use remote::{PersonStatus, RemoteCandidate, RemoteFieldDatum, RemoteId, RemoteItem};
pub use summary::{RecordClass, SyncSummary};
