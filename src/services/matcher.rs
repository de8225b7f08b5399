//! Remote candidate search and single-match resolution.
//!
//! A local record is looked up with one query per discriminator, each
//! combining the name filter with exactly one of birthdate, email or phone.
//! Queries run under the legal first name, and again under the preferred
//! name when the record has a different one, since people created by this
//! tool are published under their preferred name.
//! The union of the results must contain exactly one person for the
//! record to count as matched; anything else is left alone.

use crate::models::{PersonRecord, RemoteCandidate, RemoteId};
use crate::remote::{PeopleDirectory, SearchFilters};
use crate::{Error, Result};
use chrono::NaiveDate;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;
use tracing::instrument;

/// Remote filter used for email and phone discriminators.
const CONTACT_FILTER: &str = "search_name_or_email_or_phone_number";

/// The single field paired with the name filter in one query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Discriminator {
    /// Exact birthdate.
    BirthDate(NaiveDate),
    /// Email address.
    Email(String),
    /// Phone number in display form.
    Phone(String),
}

impl Discriminator {
    /// Returns the remote filter name and value.
    #[must_use]
    pub fn filter(&self) -> (&'static str, String) {
        match self {
            Self::BirthDate(date) => ("birthdate", date.format("%Y-%m-%d").to_string()),
            Self::Email(address) => (CONTACT_FILTER, address.clone()),
            Self::Phone(number) => (CONTACT_FILTER, number.clone()),
        }
    }
}

/// One remote search: the name filter plus one discriminator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchQuery {
    /// First name filter: the legal first name or the preferred name.
    pub first_name: String,
    /// Last name.
    pub last_name: String,
    /// The discriminating field.
    pub discriminator: Discriminator,
}

impl MatchQuery {
    /// Builds the remote search filters for this query.
    #[must_use]
    pub fn filters(&self) -> SearchFilters {
        let (key, value) = self.discriminator.filter();
        let mut filters = SearchFilters::new();
        filters.insert("first_name".to_string(), self.first_name.clone());
        filters.insert("last_name".to_string(), self.last_name.clone());
        filters.insert(key.to_string(), value);
        filters
    }
}

/// Builds one query per distinct discriminator and first name on `record`.
///
/// Every discriminator is issued under the legal first name first, then
/// under the preferred name if it differs. Absent birthdates and empty
/// contact values never produce a query.
#[must_use]
pub fn build_queries(record: &PersonRecord) -> Vec<MatchQuery> {
    let mut discriminators = Vec::new();

    if let Some(date) = record.date_of_birth {
        discriminators.push(Discriminator::BirthDate(date));
    }

    let mut seen_emails = HashSet::new();
    for email in &record.emails {
        let key = email.address.to_lowercase();
        if !key.is_empty() && seen_emails.insert(key) {
            discriminators.push(Discriminator::Email(email.address.clone()));
        }
    }

    let mut seen_phones = HashSet::new();
    for phone in &record.phones {
        if !phone.national.is_empty() && seen_phones.insert(phone.national.as_str()) {
            discriminators.push(Discriminator::Phone(phone.display.clone()));
        }
    }

    let mut first_names = vec![record.first_name.as_str()];
    let published = record.display_first_name();
    if published != record.first_name {
        first_names.push(published);
    }

    first_names
        .into_iter()
        .flat_map(|first_name| {
            discriminators.iter().map(move |discriminator| MatchQuery {
                first_name: first_name.to_string(),
                last_name: record.last_name.clone(),
                discriminator: discriminator.clone(),
            })
        })
        .collect()
}

/// Result of resolving a local record against the remote directory.
#[derive(Debug, Clone, PartialEq)]
pub enum MatchOutcome {
    /// Exactly one remote person matched.
    Matched(Box<RemoteCandidate>),
    /// No remote person matched.
    NoMatch,
    /// More than one distinct remote person matched.
    Ambiguous(Vec<RemoteId>),
}

impl MatchOutcome {
    /// Returns the match, treating ambiguity as no match.
    #[must_use]
    pub fn into_match(self) -> Option<RemoteCandidate> {
        match self {
            Self::Matched(candidate) => Some(*candidate),
            Self::NoMatch | Self::Ambiguous(_) => None,
        }
    }
}

/// Resolves local records to at most one remote person.
///
/// # Example
///
/// ```rust,ignore
/// use peoplesync::services::{MatchOutcome, RemoteMatcher};
///
/// let matcher = RemoteMatcher::new(Arc::new(client));
/// match matcher.resolve(&record)? {
///     MatchOutcome::Matched(remote) => println!("update {}", remote.id),
///     MatchOutcome::NoMatch => println!("create"),
///     MatchOutcome::Ambiguous(ids) => println!("skip, {} candidates", ids.len()),
/// }
/// ```
pub struct RemoteMatcher<D: PeopleDirectory> {
    directory: Arc<D>,
}

impl<D: PeopleDirectory> RemoteMatcher<D> {
    /// Creates a matcher over the given directory.
    #[must_use]
    pub const fn new(directory: Arc<D>) -> Self {
        Self { directory }
    }

    /// Runs every query for `record` and reduces the union of candidates.
    ///
    /// # Errors
    ///
    /// Returns [`Error::RemoteUnavailable`] if any query fails. The other
    /// queries' results are discarded rather than resolved on partial data.
    #[instrument(skip(self, record), fields(record = %record.id))]
    pub fn resolve(&self, record: &PersonRecord) -> Result<MatchOutcome> {
        let start = Instant::now();
        let queries = build_queries(record);

        let mut seen: HashSet<RemoteId> = HashSet::new();
        let mut candidates: Vec<RemoteCandidate> = Vec::new();
        for query in &queries {
            let found = self.directory.search(&query.filters()).map_err(|e| match e {
                unavailable @ Error::RemoteUnavailable { .. } => unavailable,
                other => Error::remote("search_people", other),
            })?;
            for candidate in found {
                if seen.insert(candidate.id.clone()) {
                    candidates.push(candidate);
                }
            }
        }

        metrics::histogram!("peoplesync_match_duration_ms")
            .record(start.elapsed().as_secs_f64() * 1000.0);
        tracing::debug!(
            queries = queries.len(),
            candidates = candidates.len(),
            "Remote search complete"
        );

        Ok(match candidates.len() {
            0 => MatchOutcome::NoMatch,
            1 => candidates
                .pop()
                .map_or(MatchOutcome::NoMatch, |c| MatchOutcome::Matched(Box::new(c))),
            _ => MatchOutcome::Ambiguous(candidates.into_iter().map(|c| c.id).collect()),
        })
    }

    /// Returns the single matching remote person, if exactly one exists.
    ///
    /// # Errors
    ///
    /// Returns [`Error::RemoteUnavailable`] if any query fails.
    pub fn find_match(&self, record: &PersonRecord) -> Result<Option<RemoteCandidate>> {
        self.resolve(record).map(MatchOutcome::into_match)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{EmailAddress, EmailKind, LocalId, PhoneKind, PhoneNumber};
    use std::sync::Mutex;

    struct ScriptedDirectory {
        results: Vec<(String, Vec<RemoteCandidate>)>,
        fail_on: Option<String>,
        calls: Mutex<Vec<SearchFilters>>,
    }

    impl ScriptedDirectory {
        fn new(results: Vec<(&str, Vec<RemoteCandidate>)>) -> Self {
            Self {
                results: results
                    .into_iter()
                    .map(|(value, people)| (value.to_string(), people))
                    .collect(),
                fail_on: None,
                calls: Mutex::new(Vec::new()),
            }
        }
    }

    impl PeopleDirectory for ScriptedDirectory {
        fn search(&self, filters: &SearchFilters) -> Result<Vec<RemoteCandidate>> {
            if let Ok(mut calls) = self.calls.lock() {
                calls.push(filters.clone());
            }
            let discriminator = filters
                .iter()
                .find(|(k, _)| k.as_str() != "first_name" && k.as_str() != "last_name")
                .map(|(_, v)| v.clone())
                .unwrap_or_default();
            if self.fail_on.as_deref() == Some(discriminator.as_str()) {
                return Err(Error::remote("search_people", "timeout"));
            }
            Ok(self
                .results
                .iter()
                .filter(|(value, _)| *value == discriminator)
                .flat_map(|(_, people)| people.clone())
                .collect())
        }
    }

    fn record() -> PersonRecord {
        PersonRecord {
            id: LocalId(1),
            household_id: None,
            first_name: "John".to_string(),
            last_name: "Smith".to_string(),
            middle_name: String::new(),
            preferred_name: None,
            gender: None,
            date_of_birth: NaiveDate::from_ymd_opt(1980, 1, 1),
            marital_status: None,
            last_updated: NaiveDate::from_ymd_opt(2020, 1, 1)
                .and_then(|d| d.and_hms_opt(0, 0, 0))
                .unwrap_or_default(),
            phones: vec![PhoneNumber {
                national: "5552345678".to_string(),
                display: "(555) 234-5678".to_string(),
                kind: PhoneKind::Mobile,
            }],
            emails: vec![
                EmailAddress {
                    address: "j@x.com".to_string(),
                    kind: EmailKind::Home,
                },
                EmailAddress {
                    address: "J@X.COM".to_string(),
                    kind: EmailKind::Work,
                },
            ],
            addresses: Vec::new(),
            attributes: Vec::new(),
        }
    }

    #[test]
    fn test_build_queries_one_per_distinct_discriminator() {
        let queries = build_queries(&record());
        assert_eq!(queries.len(), 3);
        assert_eq!(
            queries[0].filters().get("birthdate").map(String::as_str),
            Some("1980-01-01")
        );
        assert_eq!(
            queries[2].filters().get(CONTACT_FILTER).map(String::as_str),
            Some("(555) 234-5678")
        );
        for query in &queries {
            let filters = query.filters();
            assert_eq!(filters.len(), 3);
            assert_eq!(filters.get("first_name").map(String::as_str), Some("John"));
        }
    }

    #[test]
    fn test_legal_and_preferred_first_names_are_both_searched() {
        let mut record = record();
        record.first_name = "Jonathan".to_string();
        record.preferred_name = Some("Johnny".to_string());

        let queries = build_queries(&record);
        assert_eq!(queries.len(), 6);
        let names: Vec<&str> = queries.iter().map(|q| q.first_name.as_str()).collect();
        assert_eq!(names[..3], ["Jonathan"; 3]);
        assert_eq!(names[3..], ["Johnny"; 3]);
        assert_eq!(queries[0].discriminator, queries[3].discriminator);
    }

    #[test]
    fn test_candidate_filed_under_legal_name_is_found() {
        let mut record = record();
        record.first_name = "Jonathan".to_string();
        record.preferred_name = Some("Johnny".to_string());

        let legal = RemoteCandidate::new("200", "Jonathan", "Smith");
        let directory = Arc::new(ScriptedDirectory::new(vec![("j@x.com", vec![legal])]));
        let matcher = RemoteMatcher::new(Arc::clone(&directory));
        let found = matcher.find_match(&record).unwrap_or_default();
        assert_eq!(found.map(|c| c.id), Some(RemoteId::new("200")));

        let searched: HashSet<String> = directory
            .calls
            .lock()
            .map(|calls| calls.iter().filter_map(|f| f.get("first_name").cloned()).collect())
            .unwrap_or_default();
        assert!(searched.contains("Jonathan"));
        assert!(searched.contains("Johnny"));
    }

    #[test]
    fn test_absent_birthdate_is_never_queried() {
        let mut record = record();
        record.date_of_birth = None;
        record.emails.clear();
        record.phones.clear();
        assert!(build_queries(&record).is_empty());

        let directory = Arc::new(ScriptedDirectory::new(Vec::new()));
        let matcher = RemoteMatcher::new(Arc::clone(&directory));
        assert!(matches!(matcher.resolve(&record), Ok(MatchOutcome::NoMatch)));
        assert!(directory.calls.lock().map(|c| c.is_empty()).unwrap_or(false));
    }

    #[test]
    fn test_same_candidate_across_queries_is_a_match() {
        let john = RemoteCandidate::new("100", "John", "Smith");
        let directory = ScriptedDirectory::new(vec![
            ("1980-01-01", vec![john.clone()]),
            ("j@x.com", vec![john.clone()]),
            ("(555) 234-5678", vec![john]),
        ]);
        let matcher = RemoteMatcher::new(Arc::new(directory));
        let found = matcher.find_match(&record()).unwrap_or_default();
        assert_eq!(found.map(|c| c.id), Some(RemoteId::new("100")));
    }

    #[test]
    fn test_two_candidates_are_ambiguous() {
        let directory = ScriptedDirectory::new(vec![
            ("1980-01-01", vec![RemoteCandidate::new("100", "John", "Smith")]),
            ("j@x.com", vec![RemoteCandidate::new("200", "John", "Smith")]),
        ]);
        let matcher = RemoteMatcher::new(Arc::new(directory));

        match matcher.resolve(&record()) {
            Ok(MatchOutcome::Ambiguous(ids)) => assert_eq!(ids.len(), 2),
            other => panic!("expected ambiguous, got {other:?}"),
        }
        assert!(matches!(matcher.find_match(&record()), Ok(None)));
    }

    #[test]
    fn test_failed_query_is_not_no_match() {
        let mut directory = ScriptedDirectory::new(Vec::new());
        directory.fail_on = Some("j@x.com".to_string());
        let matcher = RemoteMatcher::new(Arc::new(directory));
        assert!(matches!(
            matcher.resolve(&record()),
            Err(Error::RemoteUnavailable { .. })
        ));
    }
}
