//! Windowed duplicate detector.

use super::signals::duplicate_reason;
use super::types::DuplicateMatch;
use crate::models::PersonRecord;
use std::ops::Range;

/// Flags records that duplicate an earlier nearby record in the same batch.
///
/// The scan covers `batch[i - window .. i + window]` (clamped to the batch)
/// but ends when it reaches the record itself, so only the `window` entries
/// before `i` can flag it. The first copy of a duplicated person survives;
/// later copies are flagged. Identical records further apart than the
/// window are not detected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocalDuplicateDetector {
    window: usize,
}

impl Default for LocalDuplicateDetector {
    fn default() -> Self {
        Self::new(Self::DEFAULT_WINDOW)
    }
}

impl LocalDuplicateDetector {
    /// Earlier records inspected by default.
    pub const DEFAULT_WINDOW: usize = 20;

    /// Creates a detector inspecting up to `window` earlier records.
    #[must_use]
    pub const fn new(window: usize) -> Self {
        Self { window }
    }

    /// Returns the window size.
    #[must_use]
    pub const fn window(&self) -> usize {
        self.window
    }

    /// Returns the slice of a batch of `len` records inspected for `index`.
    #[must_use]
    pub fn neighbourhood(&self, len: usize, index: usize) -> Range<usize> {
        let end = index.min(len);
        let start = index.saturating_sub(self.window).min(end);
        start..end
    }

    /// Returns the first earlier neighbour that duplicates `record`.
    ///
    /// The scan stops at the first entry sharing `record`'s primary key, so
    /// a record is never reported as its own duplicate.
    #[must_use]
    pub fn find_duplicate(
        &self,
        record: &PersonRecord,
        batch: &[PersonRecord],
        index: usize,
    ) -> Option<DuplicateMatch> {
        batch[self.neighbourhood(batch.len(), index)]
            .iter()
            .take_while(|other| other.id != record.id)
            .find_map(|other| {
                duplicate_reason(record, other).map(|reason| DuplicateMatch {
                    other: other.id,
                    reason,
                })
            })
    }

    /// Returns true if any neighbour duplicates `record`.
    #[must_use]
    pub fn is_duplicate(&self, record: &PersonRecord, batch: &[PersonRecord], index: usize) -> bool {
        self.find_duplicate(record, batch, index).is_some()
    }
}
