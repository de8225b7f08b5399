//! Record normalization.
//!
//! Every comparison downstream (duplicate detection, remote matching,
//! reconciliation) runs on the canonical forms produced here, so the rules
//! are deliberately total: malformed dates and phone numbers degrade to
//! absent values instead of failing the record.

use crate::models::{
    DOB_SENTINEL, EmailAddress, EmailKind, LocalAttribute, LocalId, PersonRecord, PhoneKind,
    PhoneNumber, PostalAddress,
};
use crate::source::{RawAddress, RawPerson};
use chrono::{DateTime, Local, NaiveDate, NaiveDateTime};

/// Timestamp assumed when the source omits one.
const DEFAULT_LAST_UPDATED: (i32, u32, u32) = (2000, 1, 1);

/// Regions dialed through the North American Numbering Plan.
const NANP_REGIONS: [&str; 8] = ["US", "CA", "PR", "VI", "GU", "AS", "MP", "UM"];

/// Numbering plan used to parse local phone numbers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NumberingPlan {
    /// Ten-digit NANP numbers, optional leading `1`.
    Nanp,
    /// Any other region: digits only, 6 to 15 of them.
    Open,
}

impl NumberingPlan {
    /// Picks the plan for an ISO 3166 region code.
    #[must_use]
    pub fn for_region(region: &str) -> Self {
        let region = region.trim().to_uppercase();
        if NANP_REGIONS.contains(&region.as_str()) {
            Self::Nanp
        } else {
            Self::Open
        }
    }
}

/// Parses phone numbers against a local numbering plan.
#[derive(Debug, Clone, Copy)]
pub struct PhoneParser {
    plan: NumberingPlan,
}

impl PhoneParser {
    /// Creates a parser for the given region code.
    #[must_use]
    pub fn new(region: &str) -> Self {
        Self {
            plan: NumberingPlan::for_region(region),
        }
    }

    /// Parses a raw number, returning `None` when it is not dialable.
    ///
    /// Formatting characters are ignored and anything after an extension
    /// marker (`x`, `#`, `;`, `,`) is dropped.
    #[must_use]
    pub fn parse(&self, raw: &str, kind: PhoneKind) -> Option<PhoneNumber> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return None;
        }

        let international = trimmed.starts_with('+');
        let mut digits = String::with_capacity(trimmed.len());
        for ch in trimmed.chars() {
            if ch.is_ascii_digit() {
                digits.push(ch);
            } else if matches!(ch, 'x' | 'X' | '#' | ';' | ',') {
                if digits.is_empty() {
                    return None;
                }
                break;
            }
        }

        let (national, display) = match self.plan {
            NumberingPlan::Nanp if !international || digits.starts_with('1') => {
                Self::parse_nanp(&digits)?
            },
            _ => Self::parse_open(&digits, international)?,
        };

        Some(PhoneNumber {
            national,
            display,
            kind,
        })
    }

    fn parse_nanp(digits: &str) -> Option<(String, String)> {
        let national = if digits.len() == 11 && digits.starts_with('1') {
            &digits[1..]
        } else {
            digits
        };

        let bytes = national.as_bytes();
        if bytes.len() != 10 || !(b'2'..=b'9').contains(&bytes[0]) || !(b'2'..=b'9').contains(&bytes[3])
        {
            return None;
        }

        let display = format!(
            "({}) {}-{}",
            &national[0..3],
            &national[3..6],
            &national[6..]
        );
        Some((national.to_string(), display))
    }

    fn parse_open(digits: &str, international: bool) -> Option<(String, String)> {
        if !(6..=15).contains(&digits.len()) {
            return None;
        }
        let display = if international {
            format!("+{digits}")
        } else {
            digits.to_string()
        };
        Some((digits.to_string(), display))
    }
}

/// Trims a name and capitalizes the first letter of each word.
///
/// The remainder of each word is preserved (`"mcDonald"` becomes `"McDonald"`).
#[must_use]
pub fn normalize_name(raw: &str) -> String {
    raw.split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            chars.next().map_or_else(String::new, |first| {
                first.to_uppercase().chain(chars).collect::<String>()
            })
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Parses a source date.
///
/// Accepts `MM/DD/YY`, `MM/DD/YYYY`, `YYYY-MM-DD` and full timestamps
/// (`YYYY-MM-DDTHH:MM:SS`, optionally with fractional seconds or an
/// offset). Two-digit years use the POSIX pivot (`69`–`99` map to the
/// 1900s); a result later than `today` is moved back one century.
#[must_use]
pub fn parse_date(raw: &str, today: NaiveDate) -> Option<NaiveDate> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    if raw.contains('/') {
        return parse_slashed_date(raw, today);
    }

    if let Ok(timestamp) = DateTime::parse_from_rfc3339(raw) {
        return Some(timestamp.date_naive());
    }

    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(timestamp) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(timestamp.date());
        }
    }

    NaiveDate::parse_from_str(raw, "%Y-%m-%d").ok()
}

fn parse_slashed_date(raw: &str, today: NaiveDate) -> Option<NaiveDate> {
    // Anything after the date (a time component) is ignored.
    let date_part = raw.split_whitespace().next()?;
    let mut parts = date_part.split('/');
    let month: u32 = parts.next()?.parse().ok()?;
    let day: u32 = parts.next()?.parse().ok()?;
    let year_text = parts.next()?;
    if parts.next().is_some() {
        return None;
    }
    let year: i32 = year_text.parse().ok()?;

    if year_text.len() > 2 {
        return NaiveDate::from_ymd_opt(year, month, day);
    }

    let full_year = if year >= 69 { 1900 + year } else { 2000 + year };
    let date = NaiveDate::from_ymd_opt(full_year, month, day)?;
    if date > today {
        NaiveDate::from_ymd_opt(full_year - 100, month, day)
    } else {
        Some(date)
    }
}

/// Normalizes a birthdate to `YYYY-MM-DD`, or the `1900-01-01` sentinel.
///
/// # Example
///
/// ```rust
/// use peoplesync::services::normalize_dob;
///
/// assert_eq!(normalize_dob("01/02/03"), "2003-01-02");
/// assert_eq!(normalize_dob(""), "1900-01-01");
/// ```
#[must_use]
pub fn normalize_dob(raw: &str) -> String {
    parse_date(raw, Local::now().date_naive()).map_or_else(
        || DOB_SENTINEL.to_string(),
        |date| date.format("%Y-%m-%d").to_string(),
    )
}

/// Parses a last-updated timestamp, defaulting to `2000-01-01T00:00:00`.
#[must_use]
pub fn parse_last_updated(raw: Option<&str>) -> NaiveDateTime {
    let default = || {
        let (y, m, d) = DEFAULT_LAST_UPDATED;
        NaiveDate::from_ymd_opt(y, m, d)
            .and_then(|date| date.and_hms_opt(0, 0, 0))
            .unwrap_or_default()
    };

    let Some(raw) = raw.map(str::trim).filter(|s| !s.is_empty()) else {
        return default();
    };

    if let Ok(timestamp) = DateTime::parse_from_rfc3339(raw) {
        return timestamp.naive_utc();
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(timestamp) = NaiveDateTime::parse_from_str(raw, format) {
            return timestamp;
        }
    }
    parse_date(raw, NaiveDate::MAX)
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .unwrap_or_else(default)
}

/// Trims an email address, rejecting values that cannot be one.
#[must_use]
pub fn normalize_email(raw: &str, kind: EmailKind) -> Option<EmailAddress> {
    let address = raw.trim();
    let (local, domain) = address.split_once('@')?;
    if local.is_empty() || domain.is_empty() || address.contains(char::is_whitespace) {
        return None;
    }
    Some(EmailAddress {
        address: address.to_string(),
        kind,
    })
}

/// Trims every address component; missing components become empty strings.
#[must_use]
pub fn normalize_address(raw: &RawAddress) -> PostalAddress {
    let field = |value: &Option<String>| value.as_deref().unwrap_or("").trim().to_string();
    PostalAddress {
        street1: field(&raw.address1),
        street2: field(&raw.address2),
        city: field(&raw.city),
        state: field(&raw.st_province),
        postal_code: field(&raw.postal_code),
    }
}

/// Builds canonical [`PersonRecord`] values from raw source rows.
///
/// # Example
///
/// ```rust
/// use peoplesync::services::RecordNormalizer;
/// use peoplesync::source::RawPerson;
///
/// let normalizer = RecordNormalizer::new("US");
/// let record = normalizer.normalize(&RawPerson {
///     id: 7,
///     first_name: Some("  john ".to_string()),
///     last_name: Some("smith".to_string()),
///     date_of_birth: Some("01/02/03".to_string()),
///     ..RawPerson::default()
/// });
///
/// assert_eq!(record.first_name, "John");
/// assert_eq!(record.dob_string(), "2003-01-02");
/// ```
#[derive(Debug, Clone)]
pub struct RecordNormalizer {
    phones: PhoneParser,
    today: NaiveDate,
}

impl RecordNormalizer {
    /// Creates a normalizer for the given phone region.
    #[must_use]
    pub fn new(region: &str) -> Self {
        Self {
            phones: PhoneParser::new(region),
            today: Local::now().date_naive(),
        }
    }

    /// Pins the reference date used by the two-digit-year rule.
    #[must_use]
    pub const fn with_today(mut self, today: NaiveDate) -> Self {
        self.today = today;
        self
    }

    /// Returns the phone parser.
    #[must_use]
    pub const fn phone_parser(&self) -> &PhoneParser {
        &self.phones
    }

    /// Normalizes one raw row.
    #[must_use]
    pub fn normalize(&self, raw: &RawPerson) -> PersonRecord {
        let text = |value: &Option<String>| value.as_deref().unwrap_or("").trim().to_string();
        let first_name = normalize_name(raw.first_name.as_deref().unwrap_or(""));
        let preferred_name = raw
            .goes_by_name
            .as_deref()
            .map(normalize_name)
            .filter(|name| !name.is_empty() && *name != first_name);

        let date_of_birth = raw.date_of_birth.as_deref().and_then(|dob| {
            let parsed = parse_date(dob, self.today);
            if parsed.is_none() && !dob.trim().is_empty() {
                tracing::debug!(record = raw.id, value = dob, "Unparseable date of birth dropped");
            }
            parsed
        });

        let mut phones: Vec<PhoneNumber> = Vec::new();
        let mut emails: Vec<EmailAddress> = Vec::new();
        for communication in &raw.communications {
            if communication.is_phone() {
                let kind = PhoneKind::from_label(&communication.communication_type);
                match self.phones.parse(&communication.value, kind) {
                    Some(phone) if !phones.iter().any(|p| p.same_number(&phone)) => {
                        phones.push(phone);
                    },
                    Some(_) => {},
                    None => tracing::debug!(
                        record = raw.id,
                        value = %communication.value,
                        "Unparseable phone number dropped"
                    ),
                }
            } else if communication.is_email() {
                let kind = EmailKind::from_label(&communication.communication_type);
                if let Some(email) = normalize_email(&communication.value, kind) {
                    if !emails.iter().any(|e| e.same_address(&email)) {
                        emails.push(email);
                    }
                }
            }
        }

        let mut addresses: Vec<PostalAddress> = Vec::new();
        for address in raw.addresses.iter().map(normalize_address) {
            if !address.is_empty() && !addresses.iter().any(|a| a.same_fields(&address)) {
                addresses.push(address);
            }
        }

        let attributes = raw
            .attributes
            .iter()
            .map(|attribute| LocalAttribute {
                attribute_id: attribute.attribute_id,
                value: text(&attribute.value),
            })
            .collect();

        PersonRecord {
            id: LocalId(raw.id),
            household_id: raw.household_id,
            first_name,
            last_name: normalize_name(raw.last_name.as_deref().unwrap_or("")),
            middle_name: normalize_name(raw.middle_name.as_deref().unwrap_or("")),
            preferred_name,
            gender: raw.gender.as_deref().and_then(crate::models::Gender::parse),
            date_of_birth,
            marital_status: Some(text(&raw.marital_status)).filter(|s| !s.is_empty()),
            last_updated: parse_last_updated(raw.last_updated.as_deref()),
            phones,
            emails,
            addresses,
            attributes,
        }
    }

    /// Returns true if the record was last touched before `cutoff`.
    #[must_use]
    pub fn is_stale(record: &PersonRecord, cutoff: NaiveDate) -> bool {
        record.last_updated.date() < cutoff
    }

    /// Returns the age in whole years on the reference date.
    #[must_use]
    pub fn age_on(birthdate: NaiveDate, today: NaiveDate) -> u32 {
        today.years_since(birthdate).unwrap_or(0)
    }

    /// Returns the reference date.
    #[must_use]
    pub const fn today(&self) -> NaiveDate {
        self.today
    }
}
