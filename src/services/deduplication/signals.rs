//! Pairwise duplicate signals.

use super::types::DuplicateReason;
use crate::models::{PersonRecord, PostalAddress, eq_caseless};

/// Returns true if two addresses agree on their street lines.
///
/// Only lines present on both sides are compared, case-insensitively, and
/// at least one must be. City, state and postal code are ignored because
/// the source fills them in inconsistently.
#[must_use]
pub fn same_street(a: &PostalAddress, b: &PostalAddress) -> bool {
    let mut compared = false;
    for (left, right) in [(&a.street1, &b.street1), (&a.street2, &b.street2)] {
        if left.is_empty() || right.is_empty() {
            continue;
        }
        if !eq_caseless(left, right) {
            return false;
        }
        compared = true;
    }
    compared
}

fn same_birthdate(a: &PersonRecord, b: &PersonRecord) -> bool {
    matches!((a.date_of_birth, b.date_of_birth), (Some(x), Some(y)) if x == y)
}

fn shares_address(a: &PersonRecord, b: &PersonRecord) -> bool {
    a.addresses
        .iter()
        .any(|x| b.addresses.iter().any(|y| same_street(x, y)))
}

fn shares_phone(a: &PersonRecord, b: &PersonRecord) -> bool {
    a.phones
        .iter()
        .any(|x| b.phones.iter().any(|y| x.same_number(y)))
}

fn shares_email(a: &PersonRecord, b: &PersonRecord) -> bool {
    a.emails
        .iter()
        .any(|x| b.emails.iter().any(|y| x.same_address(y)))
}

/// Returns why `b` duplicates `a`, or `None` if it does not.
///
/// Names must match exactly (both are already normalized); the first
/// agreeing signal wins.
#[must_use]
pub fn duplicate_reason(a: &PersonRecord, b: &PersonRecord) -> Option<DuplicateReason> {
    if a.first_name != b.first_name || a.last_name != b.last_name {
        return None;
    }

    if same_birthdate(a, b) {
        Some(DuplicateReason::DateOfBirth)
    } else if shares_address(a, b) {
        Some(DuplicateReason::Address)
    } else if shares_phone(a, b) {
        Some(DuplicateReason::Phone)
    } else if shares_email(a, b) {
        Some(DuplicateReason::Email)
    } else {
        None
    }
}
