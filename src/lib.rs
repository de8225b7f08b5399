//! # peoplesync
//!
//! One-way person reconciliation from a legacy membership database into
//! Planning Center People.
//!
//! Every local record runs through the same pipeline:
//!
//! 1. **Normalize**: names, birthdates, phones, emails and addresses are
//!    canonicalized ([`services::RecordNormalizer`])
//! 2. **Validate**: placeholder or corrupted names, records without contact
//!    information and stale records are skipped ([`services::NameValidator`])
//! 3. **Deduplicate**: a bounded window of the sorted batch is scanned for
//!    local duplicates ([`services::LocalDuplicateDetector`])
//! 4. **Match**: the remote directory is searched with one query per
//!    discriminator and the union must resolve to exactly one person
//!    ([`services::RemoteMatcher`])
//! 5. **Decide**: the minimal set of writes is computed
//!    ([`services::SyncDecisionEngine`]) and handed to an
//!    [`services::OperationSink`]
//!
//! ## Example
//!
//! ```rust,ignore
//! use peoplesync::services::{SyncPipeline, OperationExecutor};
//!
//! let pipeline = SyncPipeline::new(&config, directory, geocoder, mappings);
//! let mut executor = OperationExecutor::new(writer);
//! let summary = pipeline.run(&batch, &mut executor);
//! println!("{summary}");
//! ```

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![warn(missing_docs)]
#![forbid(unsafe_code)]
#![allow(clippy::multiple_crate_versions)]

use thiserror::Error as ThisError;

pub mod config;
pub mod io;
pub mod models;
pub mod observability;
pub mod remote;
pub mod services;
pub mod source;

pub use config::SyncConfig;
pub use models::{
    PersonRecord, RecordClass, RemoteCandidate, RemoteId, SyncSummary, WriteOperation,
};
pub use remote::{Geocoder, PeopleDirectory, RemoteWriter};
pub use services::{
    AddressEquivalence, LocalDuplicateDetector, NameValidator, RecordNormalizer, RemoteMatcher,
    SyncDecisionEngine, SyncPipeline,
};

/// Error type for peoplesync operations.
///
/// # Error Variant Triggers
///
/// | Variant | Raised When |
/// |---------|-------------|
/// | `InvalidInput` | Bad CLI arguments, unknown enum strings |
/// | `OperationFailed` | Local I/O, `SQLite` or CSV failures |
/// | `MalformedRecord` | A source row cannot be decoded |
/// | `AmbiguousMatch` | A remote search resolved to more than one person |
/// | `RemoteUnavailable` | Network or API failure talking to a remote service |
/// | `Config` | The configuration file is unreadable or inconsistent |
#[derive(Debug, ThisError)]
pub enum Error {
    /// Invalid input was provided.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// A local operation failed.
    ///
    /// Raised when:
    /// - The source database cannot be opened or queried
    /// - An export file cannot be created or written
    /// - The log file cannot be opened
    #[error("operation '{operation}' failed: {cause}")]
    OperationFailed {
        /// The operation that failed.
        operation: String,
        /// The underlying cause.
        cause: String,
    },

    /// A source record could not be decoded.
    ///
    /// Unparseable dates and phone numbers do not raise this; they degrade
    /// to absent values during normalization.
    #[error("malformed record {record}: {cause}")]
    MalformedRecord {
        /// Identifier of the offending record.
        record: String,
        /// Why decoding failed.
        cause: String,
    },

    /// The remote directory returned more than one distinct candidate.
    ///
    /// Ambiguous matches are never resolved automatically.
    #[error("ambiguous remote match: {candidates} candidates")]
    AmbiguousMatch {
        /// Number of distinct candidates found.
        candidates: usize,
    },

    /// A remote service could not be reached or rejected the request.
    ///
    /// Distinct from "no match": a failed search must never be read as
    /// confident non-existence.
    #[error("remote unavailable during '{operation}': {cause}")]
    RemoteUnavailable {
        /// The remote operation that failed.
        operation: String,
        /// The underlying cause.
        cause: String,
    },

    /// Configuration could not be loaded.
    #[error("configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Builds a [`Error::RemoteUnavailable`] for the given operation.
    pub fn remote(operation: &str, cause: impl std::fmt::Display) -> Self {
        Self::RemoteUnavailable {
            operation: operation.to_string(),
            cause: cause.to_string(),
        }
    }

    /// Builds an [`Error::OperationFailed`] for the given operation.
    pub fn failed(operation: &str, cause: impl std::fmt::Display) -> Self {
        Self::OperationFailed {
            operation: operation.to_string(),
            cause: cause.to_string(),
        }
    }
}

/// Result type alias for peoplesync operations.
pub type Result<T> = std::result::Result<T, Error>;
