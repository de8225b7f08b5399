//! Local person records.

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::attribute::LocalAttribute;

/// Birthdate rendered when a record has none.
///
/// Only ever used for display and export; it is never written to the remote
/// directory and never issued as a match discriminator.
pub const DOB_SENTINEL: &str = "1900-01-01";

/// Primary key of a record in the source system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LocalId(pub i64);

impl fmt::Display for LocalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Gender as understood by the remote directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Gender {
    /// Male.
    Male,
    /// Female.
    Female,
}

impl Gender {
    /// Parses the loose spellings used by both systems (`M`, `male`, `Female`, ...).
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "m" | "male" => Some(Self::Male),
            "f" | "female" => Some(Self::Female),
            _ => None,
        }
    }

    /// Returns the single-letter code the remote directory expects.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Male => "M",
            Self::Female => "F",
        }
    }
}

/// Kind of a phone number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PhoneKind {
    /// Home phone.
    #[default]
    Home,
    /// Mobile phone.
    Mobile,
    /// Work phone.
    Work,
    /// Anything else.
    Other,
}

impl PhoneKind {
    /// Infers the kind from a source communication type such as `"Mobile Phone"`.
    #[must_use]
    pub fn from_label(label: &str) -> Self {
        let label = label.to_lowercase();
        if label.contains("mobile") || label.contains("cell") {
            Self::Mobile
        } else if label.contains("work") || label.contains("business") {
            Self::Work
        } else if label.contains("home") {
            Self::Home
        } else {
            Self::Other
        }
    }

    /// Returns the location label the remote directory uses.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Home => "Home",
            Self::Mobile => "Mobile",
            Self::Work => "Work",
            Self::Other => "Other",
        }
    }
}

/// Kind of an email address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmailKind {
    /// Personal email.
    #[default]
    Home,
    /// Work email.
    Work,
    /// Anything else.
    Other,
}

impl EmailKind {
    /// Infers the kind from a source communication type such as `"Work Email"`.
    #[must_use]
    pub fn from_label(label: &str) -> Self {
        let label = label.to_lowercase();
        if label.contains("work") || label.contains("business") {
            Self::Work
        } else if label.contains("home") || label.contains("personal") || label == "email" {
            Self::Home
        } else {
            Self::Other
        }
    }

    /// Returns the location label the remote directory uses.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Home => "Home",
            Self::Work => "Work",
            Self::Other => "Other",
        }
    }
}

/// A parsed phone number.
///
/// Equality between numbers is decided on `national` only; `display` is the
/// form sent to the remote directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhoneNumber {
    /// Bare national significant number (`"5551234567"`).
    pub national: String,
    /// Formatted number (`"(555) 123-4567"`).
    pub display: String,
    /// Location of the number.
    pub kind: PhoneKind,
}

impl PhoneNumber {
    /// Returns true if both numbers dial the same line.
    #[must_use]
    pub fn same_number(&self, other: &Self) -> bool {
        !self.national.is_empty() && self.national == other.national
    }
}

/// Unicode-aware case-insensitive equality.
pub(crate) fn eq_caseless(a: &str, b: &str) -> bool {
    a == b || a.to_lowercase() == b.to_lowercase()
}

/// A normalized email address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmailAddress {
    /// Trimmed address, original case preserved.
    pub address: String,
    /// Location of the address.
    pub kind: EmailKind,
}

impl EmailAddress {
    /// Case-insensitive address comparison, folding non-ASCII letters too.
    #[must_use]
    pub fn same_address(&self, other: &Self) -> bool {
        !self.address.is_empty() && eq_caseless(&self.address, &other.address)
    }
}

/// A postal address. Missing components are empty strings, never absent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostalAddress {
    /// First street line.
    pub street1: String,
    /// Second street line (apartment, unit).
    pub street2: String,
    /// City.
    pub city: String,
    /// State or province.
    pub state: String,
    /// Postal code.
    pub postal_code: String,
}

impl PostalAddress {
    /// Returns true if every component is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.street1.is_empty()
            && self.street2.is_empty()
            && self.city.is_empty()
            && self.state.is_empty()
            && self.postal_code.is_empty()
    }

    /// Returns true if every component matches, ignoring case.
    #[must_use]
    pub fn same_fields(&self, other: &Self) -> bool {
        eq_caseless(&self.street1, &other.street1)
            && eq_caseless(&self.street2, &other.street2)
            && eq_caseless(&self.city, &other.city)
            && eq_caseless(&self.state, &other.state)
            && eq_caseless(&self.postal_code, &other.postal_code)
    }

    /// Renders the address on one line, skipping empty components.
    #[must_use]
    pub fn single_line(&self) -> String {
        [
            self.street1.as_str(),
            self.street2.as_str(),
            self.city.as_str(),
            self.state.as_str(),
            self.postal_code.as_str(),
        ]
        .iter()
        .filter(|part| !part.is_empty())
        .copied()
        .collect::<Vec<_>>()
        .join(", ")
    }
}

/// A person from the source system.
///
/// Built once per source row by [`crate::services::RecordNormalizer`] and
/// only borrowed afterwards. `first_name` and `last_name` are always
/// present (possibly empty) and already trimmed and capitalized.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersonRecord {
    /// Source primary key.
    pub id: LocalId,
    /// Source household, if any.
    pub household_id: Option<i64>,
    /// Legal first name.
    pub first_name: String,
    /// Last name.
    pub last_name: String,
    /// Middle name (empty when unknown).
    pub middle_name: String,
    /// Name the person goes by, when different from the legal first name.
    pub preferred_name: Option<String>,
    /// Gender.
    pub gender: Option<Gender>,
    /// Date of birth.
    pub date_of_birth: Option<NaiveDate>,
    /// Marital status as recorded by the source.
    pub marital_status: Option<String>,
    /// When the source last touched the record.
    pub last_updated: NaiveDateTime,
    /// Phone numbers in source order, without repeats.
    pub phones: Vec<PhoneNumber>,
    /// Email addresses in source order, without repeats.
    pub emails: Vec<EmailAddress>,
    /// Postal addresses in source order, without repeats.
    pub addresses: Vec<PostalAddress>,
    /// Custom attributes.
    pub attributes: Vec<LocalAttribute>,
}

impl PersonRecord {
    /// Returns `"First Last"`.
    #[must_use]
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }

    /// Returns the birthdate as `YYYY-MM-DD`, or [`DOB_SENTINEL`] when absent.
    #[must_use]
    pub fn dob_string(&self) -> String {
        self.date_of_birth.map_or_else(
            || DOB_SENTINEL.to_string(),
            |dob| dob.format("%Y-%m-%d").to_string(),
        )
    }

    /// Returns true if the record has at least one phone, email or address.
    #[must_use]
    pub fn has_contact_information(&self) -> bool {
        !(self.phones.is_empty() && self.emails.is_empty() && self.addresses.is_empty())
    }

    /// Returns the first name to publish: the preferred name when present.
    #[must_use]
    pub fn display_first_name(&self) -> &str {
        self.preferred_name
            .as_deref()
            .filter(|name| !name.is_empty())
            .unwrap_or(&self.first_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn address(street1: &str, city: &str) -> PostalAddress {
        PostalAddress {
            street1: street1.to_string(),
            city: city.to_string(),
            ..PostalAddress::default()
        }
    }

    #[test]
    fn test_gender_parse() {
        assert_eq!(Gender::parse("Male"), Some(Gender::Male));
        assert_eq!(Gender::parse(" f "), Some(Gender::Female));
        assert_eq!(Gender::parse("unknown"), None);
        assert_eq!(Gender::Female.as_str(), "F");
    }

    #[test]
    fn test_phone_kind_from_label() {
        assert_eq!(PhoneKind::from_label("Mobile Phone"), PhoneKind::Mobile);
        assert_eq!(PhoneKind::from_label("Cell"), PhoneKind::Mobile);
        assert_eq!(PhoneKind::from_label("Business Phone"), PhoneKind::Work);
        assert_eq!(PhoneKind::from_label("Home Phone"), PhoneKind::Home);
        assert_eq!(PhoneKind::from_label("Fax"), PhoneKind::Other);
    }

    #[test]
    fn test_email_comparison_ignores_case() {
        let a = EmailAddress {
            address: "J@X.com".to_string(),
            kind: EmailKind::Home,
        };
        let b = EmailAddress {
            address: "j@x.COM".to_string(),
            kind: EmailKind::Work,
        };
        assert!(a.same_address(&b));
    }

    #[test]
    fn test_email_comparison_folds_non_ascii() {
        let a = EmailAddress {
            address: "ÉLODIE@exemple.fr".to_string(),
            kind: EmailKind::Home,
        };
        let b = EmailAddress {
            address: "élodie@EXEMPLE.fr".to_string(),
            kind: EmailKind::Home,
        };
        assert!(a.same_address(&b));
        assert!(b.same_address(&a));
    }

    #[test]
    fn test_address_fields_fold_non_ascii() {
        let a = PostalAddress {
            street1: "1 RUE DE L'ÉGLISE".to_string(),
            city: "Besançon".to_string(),
            ..PostalAddress::default()
        };
        let b = PostalAddress {
            street1: "1 rue de l'église".to_string(),
            city: "BESANÇON".to_string(),
            ..PostalAddress::default()
        };
        assert!(a.same_fields(&b));
    }

    #[test]
    fn test_empty_values_never_compare_equal() {
        let blank = PhoneNumber {
            national: String::new(),
            display: String::new(),
            kind: PhoneKind::Home,
        };
        assert!(!blank.same_number(&blank.clone()));
    }

    #[test]
    fn test_address_single_line_skips_empty_parts() {
        let addr = address("1 Main St", "Springfield");
        assert_eq!(addr.single_line(), "1 Main St, Springfield");
        assert!(!addr.is_empty());
        assert!(PostalAddress::default().is_empty());
    }

    #[test]
    fn test_address_same_fields() {
        assert!(address("1 Main St", "Springfield").same_fields(&address("1 MAIN ST", "springfield")));
        assert!(!address("1 Main St", "Springfield").same_fields(&address("2 Main St", "Springfield")));
    }
}
