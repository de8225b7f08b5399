//! Business logic services.
//!
//! Services are generic over the collaborators in [`crate::remote`] and
//! hold them behind `Arc`, so the same pipeline runs against the live API
//! or against in-memory fakes.

mod address;
mod decision;
pub mod deduplication;
mod executor;
mod households;
mod matcher;
mod normalize;
mod pipeline;
mod validation;

pub use address::{AddressEquivalence, any_within, haversine_km};
pub use decision::{SyncDecisionEngine, person_fields, render_attribute};
pub use deduplication::{DuplicateMatch, DuplicateReason, LocalDuplicateDetector};
pub use executor::{OperationExecutor, OperationSink, payload};
pub use households::{HouseholdCensus, HouseholdReport};
pub use matcher::{Discriminator, MatchOutcome, MatchQuery, RemoteMatcher, build_queries};
pub use normalize::{
    NumberingPlan, PhoneParser, RecordNormalizer, normalize_address, normalize_dob,
    normalize_email, normalize_name, parse_date, parse_last_updated,
};
pub use pipeline::{RecordOutcome, SyncPipeline, ValidOutcome};
pub use validation::{NameRule, NameValidator, is_bad_name};
