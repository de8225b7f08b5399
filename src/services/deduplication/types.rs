//! Duplicate detection result types.

use crate::models::LocalId;
use serde::Serialize;

/// The signal that tied two local records together.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DuplicateReason {
    /// Same date of birth.
    DateOfBirth,
    /// Same street address.
    Address,
    /// Same phone number.
    Phone,
    /// Same email address.
    Email,
}

impl std::fmt::Display for DuplicateReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::DateOfBirth => write!(f, "date_of_birth"),
            Self::Address => write!(f, "address"),
            Self::Phone => write!(f, "phone"),
            Self::Email => write!(f, "email"),
        }
    }
}

/// A neighbouring record that duplicates the one being checked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DuplicateMatch {
    /// Primary key of the neighbour.
    pub other: LocalId,
    /// Why the two are considered the same person.
    pub reason: DuplicateReason,
}
