//! The per-record migration pipeline.
//!
//! Records are processed one at a time in batch order. Each lands in
//! exactly one [`RecordClass`]; the first rule that applies wins:
//!
//! 1. load failure → `error`
//! 2. bad first or last name → `bad_name`
//! 3. no phone, email or address → `no_contact_info`
//! 4. last updated before the stale cutoff → `stale`
//! 5. duplicate of a nearby local record → `duplicate`
//! 6. ambiguous match, failed search or failed write → `error`
//! 7. otherwise → `valid`

use crate::config::MatchingConfig;
use crate::models::{FieldMappings, PersonRecord, RecordClass, SyncSummary};
use crate::remote::{Geocoder, PeopleDirectory};
use crate::services::address::AddressEquivalence;
use crate::services::decision::SyncDecisionEngine;
use crate::services::deduplication::LocalDuplicateDetector;
use crate::services::executor::OperationSink;
use crate::services::matcher::{MatchOutcome, RemoteMatcher};
use crate::services::normalize::RecordNormalizer;
use crate::services::validation::NameValidator;
use crate::source::SourceBatch;
use chrono::NaiveDate;
use std::sync::Arc;
use std::time::Instant;
use tracing::instrument;

/// What a valid record turned into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidOutcome {
    /// A new remote person was created.
    Created,
    /// An existing remote person was changed.
    Updated,
    /// The remote person already matched.
    Unchanged,
}

/// Result of processing one record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordOutcome {
    /// Classification.
    pub class: RecordClass,
    /// Set for `valid` records.
    pub valid: Option<ValidOutcome>,
}

impl RecordOutcome {
    const fn skipped(class: RecordClass) -> Self {
        Self { class, valid: None }
    }
}

/// Runs validation, deduplication, matching and reconciliation.
pub struct SyncPipeline<D: PeopleDirectory, G: Geocoder> {
    validator: NameValidator,
    detector: LocalDuplicateDetector,
    matcher: RemoteMatcher<D>,
    engine: SyncDecisionEngine<G>,
    stale_cutoff: Option<NaiveDate>,
}

impl<D: PeopleDirectory, G: Geocoder> SyncPipeline<D, G> {
    /// Creates a pipeline from matching settings and its collaborators.
    #[must_use]
    pub fn new(
        config: &MatchingConfig,
        directory: Arc<D>,
        geocoder: Arc<G>,
        mappings: FieldMappings,
    ) -> Self {
        let addresses =
            AddressEquivalence::new(geocoder).with_threshold_km(config.distance_threshold_km);
        Self {
            validator: NameValidator::new(),
            detector: LocalDuplicateDetector::new(config.duplicate_window),
            matcher: RemoteMatcher::new(directory),
            engine: SyncDecisionEngine::new(addresses, mappings),
            stale_cutoff: config.stale_cutoff,
        }
    }

    /// Classifies a record without touching the remote directory.
    ///
    /// Returns `None` if the record should go on to remote matching.
    #[must_use]
    pub fn screen(&self, batch: &[PersonRecord], index: usize) -> Option<RecordClass> {
        let record = batch.get(index)?;

        if let Some((field, rule)) = self.validator.record_violation(record) {
            tracing::info!(record = %record.id, field, rule = %rule, "Skipping bad name");
            return Some(RecordClass::BadName);
        }
        if !record.has_contact_information() {
            tracing::info!(record = %record.id, "Skipping profile without contact information");
            return Some(RecordClass::NoContactInfo);
        }
        if let Some(cutoff) = self.stale_cutoff {
            if RecordNormalizer::is_stale(record, cutoff) {
                tracing::info!(
                    record = %record.id,
                    last_updated = %record.last_updated,
                    "Skipping stale profile"
                );
                return Some(RecordClass::Stale);
            }
        }
        if let Some(found) = self.detector.find_duplicate(record, batch, index) {
            tracing::info!(
                record = %record.id,
                other = %found.other,
                reason = %found.reason,
                "Skipping local duplicate"
            );
            return Some(RecordClass::Duplicate);
        }
        None
    }

    /// Processes the record at `index`.
    pub fn process<S: OperationSink + ?Sized>(
        &self,
        batch: &[PersonRecord],
        index: usize,
        sink: &mut S,
    ) -> RecordOutcome {
        if let Some(class) = self.screen(batch, index) {
            return RecordOutcome::skipped(class);
        }
        let Some(record) = batch.get(index) else {
            return RecordOutcome::skipped(RecordClass::Error);
        };

        let remote = match self.matcher.resolve(record) {
            Ok(MatchOutcome::Matched(remote)) => Some(remote),
            Ok(MatchOutcome::NoMatch) => None,
            Ok(MatchOutcome::Ambiguous(ids)) => {
                tracing::warn!(
                    record = %record.id,
                    candidates = ids.len(),
                    "Ambiguous remote match, skipping"
                );
                return RecordOutcome::skipped(RecordClass::Error);
            },
            Err(e) => {
                tracing::error!(record = %record.id, error = %e, "Remote search failed");
                return RecordOutcome::skipped(RecordClass::Error);
            },
        };

        let ops = self.engine.reconcile(record, remote.as_deref());
        if let Err(e) = sink.submit(record, &ops) {
            tracing::error!(record = %record.id, error = %e, "Applying writes failed");
            return RecordOutcome::skipped(RecordClass::Error);
        }

        let valid = match (&remote, ops.is_empty()) {
            (None, _) => ValidOutcome::Created,
            (Some(_), true) => ValidOutcome::Unchanged,
            (Some(_), false) => ValidOutcome::Updated,
        };
        tracing::info!(
            record = %record.id,
            name = %record.full_name(),
            outcome = ?valid,
            operations = ops.len(),
            "Reconciled profile"
        );
        RecordOutcome {
            class: RecordClass::Valid,
            valid: Some(valid),
        }
    }

    /// Processes every record in `batch` and returns the run summary.
    #[instrument(skip_all, fields(records = batch.len()))]
    pub fn run<S: OperationSink + ?Sized>(&self, batch: &SourceBatch, sink: &mut S) -> SyncSummary {
        let start = Instant::now();
        let mut summary = SyncSummary::new();

        for failure in &batch.failures {
            tracing::error!(record = %failure.id, cause = %failure.cause, "Unreadable source row");
            Self::count(&mut summary, RecordOutcome::skipped(RecordClass::Error));
        }

        for index in 0..batch.records.len() {
            let outcome = self.process(&batch.records, index, sink);
            Self::count(&mut summary, outcome);
        }

        metrics::histogram!("peoplesync_run_duration_ms")
            .record(start.elapsed().as_secs_f64() * 1000.0);
        tracing::info!(
            total = summary.total(),
            valid = summary.count(RecordClass::Valid),
            errors = summary.count(RecordClass::Error),
            "Migration pass complete"
        );
        summary
    }

    fn count(summary: &mut SyncSummary, outcome: RecordOutcome) {
        summary.record(outcome.class);
        metrics::counter!("peoplesync_records_total", "class" => outcome.class.as_str())
            .increment(1);
        match outcome.valid {
            Some(ValidOutcome::Created) => summary.created += 1,
            Some(ValidOutcome::Updated) => summary.updated += 1,
            Some(ValidOutcome::Unchanged) => summary.unchanged += 1,
            None => {},
        }
    }
}
