//! Remote households, as counted by the household census.

use chrono::NaiveDate;
use serde::Serialize;

use super::remote::{PersonStatus, RemoteId};

/// One member of a remote household.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HouseholdMember {
    /// Remote person id.
    pub person: RemoteId,
    /// Birthdate, if the remote record has one.
    pub birthdate: Option<NaiveDate>,
    /// Membership status.
    pub status: PersonStatus,
}

/// A remote household and its members.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Household {
    /// Remote household id.
    pub id: RemoteId,
    /// Display name.
    pub name: String,
    /// Members in remote order.
    pub members: Vec<HouseholdMember>,
}
