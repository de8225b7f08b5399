//! Per-record classification and the end-of-run summary.

use serde::Serialize;
use std::fmt;

/// What happened to one local record. Every record gets exactly one class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordClass {
    /// Reconciled against the remote directory.
    Valid,
    /// Near-duplicate of a neighbouring local record.
    Duplicate,
    /// First or last name failed validation.
    BadName,
    /// No phone, email or address.
    NoContactInfo,
    /// Not updated since the configured cutoff.
    Stale,
    /// Load failure, ambiguous match or remote failure.
    Error,
}

impl RecordClass {
    /// All classes in report order.
    pub const ALL: [Self; 6] = [
        Self::Valid,
        Self::Duplicate,
        Self::BadName,
        Self::NoContactInfo,
        Self::Stale,
        Self::Error,
    ];

    /// Returns the class name used for metrics labels.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Valid => "valid",
            Self::Duplicate => "duplicate",
            Self::BadName => "bad_name",
            Self::NoContactInfo => "no_contact_info",
            Self::Stale => "stale",
            Self::Error => "error",
        }
    }

    const fn index(self) -> usize {
        match self {
            Self::Valid => 0,
            Self::Duplicate => 1,
            Self::BadName => 2,
            Self::NoContactInfo => 3,
            Self::Stale => 4,
            Self::Error => 5,
        }
    }

    const fn label(self) -> &'static str {
        match self {
            Self::Valid => "Valid Profiles",
            Self::Duplicate => "Duplicates",
            Self::BadName => "Bad Names",
            Self::NoContactInfo => "Empty Profiles",
            Self::Stale => "Old Profiles",
            Self::Error => "Errors",
        }
    }
}

impl fmt::Display for RecordClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Audit counts for one run.
///
/// The six class counts are mutually exclusive and sum to the number of
/// records seen. `created`, `updated` and `unchanged` break down `valid`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SyncSummary {
    counts: [usize; 6],
    /// Valid records that produced a new remote person.
    pub created: usize,
    /// Valid records that changed an existing remote person.
    pub updated: usize,
    /// Valid records that needed no writes.
    pub unchanged: usize,
}

impl SyncSummary {
    /// Creates an empty summary.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Counts one record in `class`.
    pub const fn record(&mut self, class: RecordClass) {
        self.counts[class.index()] += 1;
    }

    /// Returns the count for `class`.
    #[must_use]
    pub const fn count(&self, class: RecordClass) -> usize {
        self.counts[class.index()]
    }

    /// Total records classified.
    #[must_use]
    pub fn total(&self) -> usize {
        self.counts.iter().sum()
    }
}

impl fmt::Display for SyncSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Processed {} profiles", self.total())?;
        for class in RecordClass::ALL {
            writeln!(f, "  {:<16} {:>8}", class.label(), self.count(class))?;
            if class == RecordClass::Valid {
                writeln!(f, "    {:<14} {:>8}", "Created", self.created)?;
                writeln!(f, "    {:<14} {:>8}", "Updated", self.updated)?;
                writeln!(f, "    {:<14} {:>8}", "Unchanged", self.unchanged)?;
            }
        }
        Ok(())
    }
}
