//! Local duplicate detection.
//!
//! Legacy databases accumulate the same person under several primary keys.
//! Because the batch is sorted by name, such copies sit close together, so
//! each record is only compared against a bounded window of the records
//! before it. The first copy in batch order is kept and later copies are
//! flagged.
//!
//! # Signals
//!
//! Two records with identical first and last names are duplicates when any
//! one of these agrees:
//!
//! ```text
//! ┌──────────────┬─────────────────────────────────────────────────┐
//! │ Birthdate    │ both present and equal                          │
//! │ Address      │ every street line present on both sides matches │
//! │ Phone        │ same national number                            │
//! │ Email        │ same address, case-insensitive                  │
//! └──────────────┴─────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use peoplesync::services::LocalDuplicateDetector;
//!
//! let detector = LocalDuplicateDetector::new(20);
//! for (index, record) in batch.iter().enumerate() {
//!     if let Some(found) = detector.find_duplicate(record, &batch, index) {
//!         println!("{} duplicates {} ({})", record.id, found.other, found.reason);
//!     }
//! }
//! ```

mod detector;
mod signals;
mod types;

pub use detector::LocalDuplicateDetector;
pub use signals::{duplicate_reason, same_street};
pub use types::{DuplicateMatch, DuplicateReason};
