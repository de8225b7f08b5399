//! End-to-end migration scenarios against in-memory remote fakes.
//!
//! Covers:
//! - creating, updating and leaving people unchanged
//! - idempotence of a second pass over the resulting remote state
//! - ambiguous matches and remote failures
//! - classification order and the duplicate window

// Integration tests use expect/unwrap for simplicity - panics are acceptable in tests
#![allow(clippy::expect_used, clippy::unwrap_used)]

mod common;

use common::{FakeRemote, TableGeocoder, date, email, person, phone, street};
use peoplesync::config::MatchingConfig;
use peoplesync::models::{
    FieldMapping, FieldMappings, LocalAttribute, PersonRecord, PersonRef, PersonStatus,
    RecordClass, RemoteCandidate, RemoteFieldKind, RemoteItem, SyncSummary, WriteOperation,
};
use peoplesync::remote::ResourceKind;
use peoplesync::services::{OperationExecutor, OperationSink, SyncPipeline, ValidOutcome};
use peoplesync::source::{LoadFailure, SourceBatch};
use std::sync::Arc;
use std::sync::atomic::Ordering;

// ============================================================================
// Test Helpers
// ============================================================================

/// Collects operations instead of applying them.
#[derive(Default)]
struct RecordingSink {
    ops: Vec<(i64, WriteOperation)>,
}

impl OperationSink for RecordingSink {
    fn submit(&mut self, record: &PersonRecord, ops: &[WriteOperation]) -> peoplesync::Result<()> {
        self.ops
            .extend(ops.iter().cloned().map(|op| (record.id.0, op)));
        Ok(())
    }
}

fn pipeline_with(
    config: &MatchingConfig,
    remote: &Arc<FakeRemote>,
    geocoder: TableGeocoder,
    mappings: FieldMappings,
) -> SyncPipeline<FakeRemote, TableGeocoder> {
    SyncPipeline::new(config, Arc::clone(remote), Arc::new(geocoder), mappings)
}

fn pipeline(remote: &Arc<FakeRemote>) -> SyncPipeline<FakeRemote, TableGeocoder> {
    pipeline_with(
        &MatchingConfig::default(),
        remote,
        TableGeocoder::new(),
        FieldMappings::new(),
    )
}

fn batch(records: Vec<PersonRecord>) -> SourceBatch {
    SourceBatch {
        records,
        failures: Vec::new(),
    }
}

fn apply(remote: &Arc<FakeRemote>, batch: &SourceBatch) -> SyncSummary {
    let mut executor = OperationExecutor::new(Arc::clone(remote));
    pipeline(remote).run(batch, &mut executor)
}

fn john() -> PersonRecord {
    let mut john = person(1, "John", "Smith");
    john.date_of_birth = Some(date(1980, 1, 1));
    john.emails.push(email("j@x.com"));
    john
}

fn remote_john(id: &str) -> RemoteCandidate {
    let mut remote = RemoteCandidate::new(id, "John", "Smith");
    remote.birthdate = Some(date(1980, 1, 1));
    remote
}

// ============================================================================
// Create / update / unchanged
// ============================================================================

#[test]
fn test_new_person_is_created_inactive_with_contacts() {
    let remote = Arc::new(FakeRemote::new());
    let summary = apply(&remote, &batch(vec![john()]));

    assert_eq!(summary.count(RecordClass::Valid), 1);
    assert_eq!(summary.created, 1);

    let people = remote.people();
    assert_eq!(people.len(), 1);
    assert_eq!(people[0].status, PersonStatus::Inactive);
    assert_eq!(people[0].birthdate, Some(date(1980, 1, 1)));
    assert_eq!(people[0].emails.len(), 1);
    assert_eq!(people[0].emails[0].value.address, "j@x.com");
}

#[test]
fn test_matched_person_only_gets_missing_email() {
    let remote = Arc::new(FakeRemote::with_people(vec![remote_john("100")]));
    let mut sink = RecordingSink::default();
    let summary = pipeline(&remote).run(&batch(vec![john()]), &mut sink);

    assert_eq!(summary.updated, 1);
    assert_eq!(sink.ops.len(), 1);
    match &sink.ops[0].1 {
        WriteOperation::AddEmail { person, email } => {
            assert_eq!(person, &PersonRef::Existing("100".into()));
            assert_eq!(email.address, "j@x.com");
        },
        other => panic!("expected add_email, got {other:?}"),
    }
}

#[test]
fn test_update_leaves_remote_status_alone() {
    let mut existing = remote_john("100");
    existing.status = PersonStatus::Active;
    let remote = Arc::new(FakeRemote::with_people(vec![existing]));

    let mut local = john();
    local.middle_name = "Quincy".to_string();
    apply(&remote, &batch(vec![local]));

    let people = remote.people();
    assert_eq!(people[0].middle_name.as_deref(), Some("Quincy"));
    assert_eq!(people[0].status, PersonStatus::Active);
}

#[test]
fn test_second_pass_is_idempotent() {
    let mappings: FieldMappings = [FieldMapping {
        local_attribute_id: 77,
        remote_field_id: "900".to_string(),
        remote_field_kind: RemoteFieldKind::Boolean,
    }]
    .into_iter()
    .collect();

    let mut local = john();
    local.preferred_name = Some("Johnny".to_string());
    local.phones.push(phone("555-234-5678"));
    local.addresses.push(street("1 Main St", "Springfield"));
    local.attributes.push(LocalAttribute {
        attribute_id: 77,
        value: String::new(),
    });
    let records = batch(vec![local]);

    let remote = Arc::new(FakeRemote::new());
    let run = |remote: &Arc<FakeRemote>| {
        let mut executor = OperationExecutor::new(Arc::clone(remote));
        pipeline_with(
            &MatchingConfig::default(),
            remote,
            TableGeocoder::new(),
            mappings.clone(),
        )
        .run(&records, &mut executor)
    };

    let first = run(&remote);
    assert_eq!(first.created, 1);
    let writes = remote.writes();
    assert_eq!(writes, 5, "person, phone, email, address and field datum");

    let created = &remote.people()[0];
    assert_eq!(created.first_name, "Johnny");
    assert_eq!(created.given_name.as_deref(), Some("John"));
    assert_eq!(
        created.field_datum("900").map(|d| d.value.as_str()),
        Some("true")
    );

    let second = run(&remote);
    assert_eq!(second.unchanged, 1);
    assert_eq!(remote.writes(), writes);
    assert_eq!(remote.people().len(), 1);
}

#[test]
fn test_remote_person_under_legal_name_is_updated_not_recreated() {
    let mut existing = RemoteCandidate::new("100", "Jonathan", "Smith");
    existing.birthdate = Some(date(1980, 1, 1));
    let remote = Arc::new(FakeRemote::with_people(vec![existing]));

    let mut local = john();
    local.first_name = "Jonathan".to_string();
    local.preferred_name = Some("Johnny".to_string());

    let summary = apply(&remote, &batch(vec![local]));
    assert_eq!(summary.updated, 1);
    assert_eq!(summary.created, 0);

    let people = remote.people();
    assert_eq!(people.len(), 1);
    assert_eq!(people[0].first_name, "Johnny");
    assert_eq!(people[0].given_name.as_deref(), Some("Jonathan"));
}

#[test]
fn test_nearby_remote_address_is_not_added_again() {
    let mut existing = remote_john("100");
    existing.emails.push(RemoteItem::new("e1", email("j@x.com")));
    existing
        .addresses
        .push(RemoteItem::new("a1", street("1 Main Street", "Springfield")));
    let remote = Arc::new(FakeRemote::with_people(vec![existing]));

    let geocoder = TableGeocoder::new()
        .with_place("1 Main Street", 39.7817, -89.6501)
        .with_place("1 Main St", 39.7820, -89.6502);

    let mut local = john();
    local.addresses.push(street("1 Main St", "Springfield"));

    let mut sink = RecordingSink::default();
    let outcome = pipeline_with(
        &MatchingConfig::default(),
        &remote,
        geocoder,
        FieldMappings::new(),
    )
    .run(&batch(vec![local]), &mut sink);

    assert!(sink.ops.is_empty(), "unexpected ops: {:?}", sink.ops);
    assert_eq!(outcome.unchanged, 1);
}

#[test]
fn test_geocoder_failure_adds_address() {
    let mut existing = remote_john("100");
    existing.emails.push(RemoteItem::new("e1", email("j@x.com")));
    existing
        .addresses
        .push(RemoteItem::new("a1", street("1 Main Street", "Springfield")));
    let remote = Arc::new(FakeRemote::with_people(vec![existing]));

    let geocoder = TableGeocoder::new();
    geocoder.failing.store(true, Ordering::SeqCst);

    let mut local = john();
    local.addresses.push(street("1 Main St", "Springfield"));

    let mut sink = RecordingSink::default();
    pipeline_with(
        &MatchingConfig::default(),
        &remote,
        geocoder,
        FieldMappings::new(),
    )
    .run(&batch(vec![local]), &mut sink);

    assert_eq!(sink.ops.len(), 1);
    assert!(matches!(sink.ops[0].1, WriteOperation::AddAddress { .. }));
}

// ============================================================================
// Errors
// ============================================================================

#[test]
fn test_ambiguous_match_is_an_error_without_writes() {
    let remote = Arc::new(FakeRemote::with_people(vec![
        remote_john("100"),
        remote_john("101"),
    ]));
    let summary = apply(&remote, &batch(vec![john()]));

    assert_eq!(summary.count(RecordClass::Error), 1);
    assert_eq!(summary.count(RecordClass::Valid), 0);
    assert_eq!(remote.writes(), 0);
}

#[test]
fn test_search_failure_is_an_error_not_a_create() {
    let remote = Arc::new(FakeRemote::new());
    remote.fail_searches.store(true, Ordering::SeqCst);
    let summary = apply(&remote, &batch(vec![john()]));

    assert_eq!(summary.count(RecordClass::Error), 1);
    assert_eq!(remote.writes(), 0);
}

#[test]
fn test_write_failure_stops_record_without_rollback() {
    let remote = Arc::new(FakeRemote::new());
    *remote.fail_kind.lock().unwrap() = Some(ResourceKind::Email);

    let mut local = john();
    local.addresses.push(street("1 Main St", "Springfield"));
    let summary = apply(&remote, &batch(vec![local]));

    assert_eq!(summary.count(RecordClass::Error), 1);
    let people = remote.people();
    assert_eq!(people.len(), 1, "person creation is not rolled back");
    assert!(people[0].addresses.is_empty(), "later writes are skipped");
}

#[test]
fn test_load_failures_count_as_errors() {
    let remote = Arc::new(FakeRemote::new());
    let mut records = batch(vec![john()]);
    records.failures.push(LoadFailure {
        id: peoplesync::models::LocalId(9),
        cause: "invalid utf-8 in first_name".to_string(),
    });

    let summary = apply(&remote, &records);
    assert_eq!(summary.total(), 2);
    assert_eq!(summary.count(RecordClass::Error), 1);
    assert_eq!(summary.count(RecordClass::Valid), 1);
}

// ============================================================================
// Screening
// ============================================================================

#[test]
fn test_classification_order() {
    let remote = Arc::new(FakeRemote::new());
    let config = MatchingConfig {
        stale_cutoff: Some(date(2015, 1, 1)),
        ..MatchingConfig::default()
    };
    let pipeline = pipeline_with(&config, &remote, TableGeocoder::new(), FieldMappings::new());

    // Bad name wins over missing contact information.
    let bad_and_empty = person(1, "J.", "Adams");
    // Missing contact information wins over staleness.
    let mut empty_and_stale = person(2, "Ann", "Brown");
    empty_and_stale.last_updated = date(2001, 1, 1).and_hms_opt(0, 0, 0).unwrap();
    // Staleness wins over duplication.
    let mut stale = person(3, "Carl", "Cole");
    stale.emails.push(email("c@x.com"));
    stale.last_updated = date(2001, 1, 1).and_hms_opt(0, 0, 0).unwrap();
    let mut twin = person(4, "Carl", "Cole");
    twin.emails.push(email("c@x.com"));

    let records = vec![bad_and_empty, empty_and_stale, stale, twin];
    assert_eq!(pipeline.screen(&records, 0), Some(RecordClass::BadName));
    assert_eq!(pipeline.screen(&records, 1), Some(RecordClass::NoContactInfo));
    assert_eq!(pipeline.screen(&records, 2), Some(RecordClass::Stale));
    assert_eq!(pipeline.screen(&records, 3), Some(RecordClass::Duplicate));
    assert_eq!(remote.searches(), 0, "screening never searches");
}

#[test]
fn test_first_copy_of_a_duplicate_pair_is_kept() {
    let remote = Arc::new(FakeRemote::new());
    let mut twin = john();
    twin.id = peoplesync::models::LocalId(2);
    twin.emails.clear();
    twin.phones.push(phone("(555) 234-5678"));

    let mut jane = person(3, "Jane", "Smith");
    jane.emails.push(email("jane@x.com"));

    let records = vec![john(), twin, jane];
    let screening = pipeline(&remote);
    assert_eq!(screening.screen(&records, 0), None);
    assert_eq!(screening.screen(&records, 1), Some(RecordClass::Duplicate));

    let summary = apply(&remote, &batch(records));
    assert_eq!(summary.count(RecordClass::Duplicate), 1);
    assert_eq!(summary.count(RecordClass::Valid), 2);
    assert_eq!(summary.created, 2);

    let people = remote.people();
    assert_eq!(people.len(), 2);
    assert!(people.iter().any(|p| p.first_name == "John"));
    assert!(
        people.iter().all(|p| p.phones.is_empty()),
        "the later copy's phone is never sent"
    );
}

#[test]
fn test_duplicate_window_is_configuration() {
    let mut far_twin = john();
    far_twin.id = peoplesync::models::LocalId(4);
    let filler = |id: i64, first: &str| {
        let mut p = person(id, first, "Smith");
        p.emails.push(email(&format!("{first}@x.com")));
        p
    };
    let records = vec![john(), filler(2, "Kate"), filler(3, "Liam"), far_twin];

    let remote = Arc::new(FakeRemote::new());
    let narrow = MatchingConfig {
        duplicate_window: 1,
        ..MatchingConfig::default()
    };
    let narrow = pipeline_with(&narrow, &remote, TableGeocoder::new(), FieldMappings::new());
    assert_eq!(narrow.screen(&records, 0), None);
    assert_eq!(narrow.screen(&records, 3), None);

    let wide = MatchingConfig {
        duplicate_window: 3,
        ..MatchingConfig::default()
    };
    let wide = pipeline_with(&wide, &remote, TableGeocoder::new(), FieldMappings::new());
    // Only earlier records count: index 0 sees nothing, index 3 sees 0..3.
    assert_eq!(wide.screen(&records, 0), None);
    assert_eq!(wide.screen(&records, 3), Some(RecordClass::Duplicate));
}

#[test]
fn test_process_reports_valid_outcome() {
    let remote = Arc::new(FakeRemote::with_people(vec![{
        let mut existing = remote_john("100");
        existing.emails.push(RemoteItem::new("e1", email("J@X.COM")));
        existing
    }]));
    let mut sink = RecordingSink::default();
    let outcome = pipeline(&remote).process(&[john()], 0, &mut sink);

    assert_eq!(outcome.class, RecordClass::Valid);
    assert_eq!(outcome.valid, Some(ValidOutcome::Unchanged));
}
