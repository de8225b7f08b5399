//! Remote collaborators.
//!
//! The matching and reconciliation services never talk HTTP directly; they
//! are generic over the traits in this module so tests can substitute
//! in-memory fakes.
//!
//! # Available Implementations
//!
//! | Trait | Implementation | Backing service |
//! |-------|----------------|-----------------|
//! | [`PeopleDirectory`] | [`PcoClient`] | Planning Center People API |
//! | [`RemoteWriter`] | [`PcoClient`] | Planning Center People API |
//! | [`HouseholdDirectory`] | [`PcoClient`] | Planning Center People API |
//! | [`Geocoder`] | [`NominatimGeocoder`] | `OpenStreetMap` Nominatim |
//! | [`Geocoder`] | [`CachedGeocoder`] | LRU cache over any geocoder |
//!
//! # Error Modes
//!
//! Every transport or API failure surfaces as
//! [`crate::Error::RemoteUnavailable`]. Nothing is retried.

mod geocoder;
mod jsonapi;
mod pco;

pub use geocoder::{CachedGeocoder, NominatimGeocoder};
pub use pco::PcoClient;

use crate::Result;
use crate::models::{Coordinates, Household, PostalAddress, RemoteCandidate, RemoteId};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

/// Builds a blocking HTTP client with the given timeouts (0 disables).
///
/// Falls back to a default client if the builder fails.
#[must_use]
pub fn build_http_client(timeout_ms: u64, connect_timeout_ms: u64) -> reqwest::blocking::Client {
    let mut builder = reqwest::blocking::Client::builder();
    if timeout_ms > 0 {
        builder = builder.timeout(Duration::from_millis(timeout_ms));
    }
    if connect_timeout_ms > 0 {
        builder = builder.connect_timeout(Duration::from_millis(connect_timeout_ms));
    }

    builder.build().unwrap_or_else(|err| {
        tracing::warn!("Failed to build HTTP client: {err}");
        reqwest::blocking::Client::new()
    })
}

/// Search filters, keyed by remote attribute name.
pub type SearchFilters = BTreeMap<String, String>;

/// Searches the remote person directory.
pub trait PeopleDirectory: Send + Sync {
    /// Returns every person matching all `filters`, with contacts,
    /// addresses and custom field data attached.
    ///
    /// Pagination is followed transparently.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::RemoteUnavailable`] if the search fails.
    /// A failed search is never reported as an empty result.
    fn search(&self, filters: &SearchFilters) -> Result<Vec<RemoteCandidate>>;
}

/// Remote resource types written by the executor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    /// A person.
    Person,
    /// A phone number owned by a person.
    PhoneNumber,
    /// An email address owned by a person.
    Email,
    /// A postal address owned by a person.
    Address,
    /// A custom field value owned by a person.
    FieldDatum,
}

impl ResourceKind {
    /// JSON:API resource type name.
    #[must_use]
    pub const fn type_name(self) -> &'static str {
        match self {
            Self::Person => "Person",
            Self::PhoneNumber => "PhoneNumber",
            Self::Email => "Email",
            Self::Address => "Address",
            Self::FieldDatum => "FieldDatum",
        }
    }

    /// Collection path segment.
    #[must_use]
    pub const fn collection(self) -> &'static str {
        match self {
            Self::Person => "people",
            Self::PhoneNumber => "phone_numbers",
            Self::Email => "emails",
            Self::Address => "addresses",
            Self::FieldDatum => "field_data",
        }
    }
}

/// Writes to the remote person directory.
pub trait RemoteWriter: Send + Sync {
    /// Creates a resource and returns its id.
    ///
    /// `owner` is the person a sub-resource belongs to; it is `None` only
    /// for [`ResourceKind::Person`].
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::RemoteUnavailable`] if the write fails.
    fn create(
        &self,
        kind: ResourceKind,
        owner: Option<&RemoteId>,
        attributes: &Value,
    ) -> Result<RemoteId>;

    /// Patches an existing resource.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::RemoteUnavailable`] if the write fails.
    fn update(&self, kind: ResourceKind, id: &RemoteId, attributes: &Value) -> Result<()>;
}

/// Lists remote households.
pub trait HouseholdDirectory: Send + Sync {
    /// Returns every household with its members.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::RemoteUnavailable`] if the listing fails.
    fn households(&self) -> Result<Vec<Household>>;
}

/// Turns a postal address into candidate coordinates.
pub trait Geocoder: Send + Sync {
    /// Returns zero or more coordinates for `address`.
    ///
    /// An address the service cannot place yields an empty list, not an
    /// error.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::RemoteUnavailable`] if the service fails.
    fn geocode(&self, address: &PostalAddress) -> Result<Vec<Coordinates>>;
}

impl<T: PeopleDirectory + ?Sized> PeopleDirectory for Arc<T> {
    fn search(&self, filters: &SearchFilters) -> Result<Vec<RemoteCandidate>> {
        (**self).search(filters)
    }
}

impl<T: RemoteWriter + ?Sized> RemoteWriter for Arc<T> {
    fn create(
        &self,
        kind: ResourceKind,
        owner: Option<&RemoteId>,
        attributes: &Value,
    ) -> Result<RemoteId> {
        (**self).create(kind, owner, attributes)
    }

    fn update(&self, kind: ResourceKind, id: &RemoteId, attributes: &Value) -> Result<()> {
        (**self).update(kind, id, attributes)
    }
}

impl<T: Geocoder + ?Sized> Geocoder for Arc<T> {
    fn geocode(&self, address: &PostalAddress) -> Result<Vec<Coordinates>> {
        (**self).geocode(address)
    }
}
