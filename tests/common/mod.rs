//! In-memory fakes of the remote collaborators shared by integration tests.

#![allow(dead_code, clippy::expect_used, clippy::unwrap_used)]

use chrono::NaiveDate;
use peoplesync::models::{
    Coordinates, EmailAddress, EmailKind, Gender, LocalId, PersonRecord, PersonStatus, PhoneKind,
    PhoneNumber, PostalAddress, RemoteCandidate, RemoteFieldDatum, RemoteId, RemoteItem,
};
use peoplesync::remote::{PeopleDirectory, RemoteWriter, ResourceKind, SearchFilters};
use peoplesync::services::PhoneParser;
use peoplesync::{Error, Geocoder, Result};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

/// A remote directory that keeps people in memory and applies writes the
/// way the People API would.
#[derive(Default)]
pub struct FakeRemote {
    people: Mutex<Vec<RemoteCandidate>>,
    next_id: AtomicUsize,
    writes: AtomicUsize,
    searches: AtomicUsize,
    pub fail_searches: AtomicBool,
    pub fail_kind: Mutex<Option<ResourceKind>>,
}

impl FakeRemote {
    pub fn new() -> Self {
        Self {
            next_id: AtomicUsize::new(100),
            ..Self::default()
        }
    }

    pub fn with_people(people: Vec<RemoteCandidate>) -> Self {
        let remote = Self::new();
        *remote.people.lock().unwrap() = people;
        remote
    }

    pub fn people(&self) -> Vec<RemoteCandidate> {
        self.people.lock().unwrap().clone()
    }

    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    pub fn searches(&self) -> usize {
        self.searches.load(Ordering::SeqCst)
    }

    fn fresh_id(&self) -> String {
        self.next_id.fetch_add(1, Ordering::SeqCst).to_string()
    }

    fn check_failure(&self, kind: ResourceKind) -> Result<()> {
        if *self.fail_kind.lock().unwrap() == Some(kind) {
            return Err(Error::remote("write", "HTTP 422"));
        }
        Ok(())
    }
}

fn text(attributes: &Value, key: &str) -> String {
    attributes
        .get(key)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

fn optional(attributes: &Value, key: &str) -> Option<String> {
    attributes
        .get(key)
        .and_then(Value::as_str)
        .map(str::to_string)
}

fn digits(s: &str) -> String {
    s.chars().filter(char::is_ascii_digit).collect()
}

fn matches_contact(candidate: &RemoteCandidate, needle: &str) -> bool {
    let wanted = digits(needle);
    candidate
        .emails
        .iter()
        .any(|e| e.value.address.eq_ignore_ascii_case(needle))
        || (!wanted.is_empty()
            && candidate
                .phones
                .iter()
                .any(|p| p.value.national == wanted || format!("1{}", p.value.national) == wanted))
}

fn matches(candidate: &RemoteCandidate, filters: &SearchFilters) -> bool {
    filters.iter().all(|(key, value)| match key.as_str() {
        "first_name" => candidate.first_name.eq_ignore_ascii_case(value),
        "last_name" => candidate.last_name.eq_ignore_ascii_case(value),
        "birthdate" => candidate
            .birthdate
            .is_some_and(|d| d.format("%Y-%m-%d").to_string() == *value),
        "search_name_or_email_or_phone_number" => matches_contact(candidate, value),
        _ => false,
    })
}

fn apply_person(person: &mut RemoteCandidate, attributes: &Value) {
    if let Some(v) = optional(attributes, "first_name") {
        person.first_name = v;
    }
    if let Some(v) = optional(attributes, "last_name") {
        person.last_name = v;
    }
    if let Some(v) = optional(attributes, "given_name") {
        person.given_name = Some(v);
    }
    if let Some(v) = optional(attributes, "middle_name") {
        person.middle_name = Some(v);
    }
    if let Some(v) = optional(attributes, "gender") {
        person.gender = Gender::parse(&v);
    }
    if let Some(v) = optional(attributes, "birthdate") {
        person.birthdate = NaiveDate::parse_from_str(&v, "%Y-%m-%d").ok();
    }
    if let Some(v) = optional(attributes, "status") {
        person.status = PersonStatus::parse(&v);
    }
}

impl PeopleDirectory for FakeRemote {
    fn search(&self, filters: &SearchFilters) -> Result<Vec<RemoteCandidate>> {
        self.searches.fetch_add(1, Ordering::SeqCst);
        if self.fail_searches.load(Ordering::SeqCst) {
            return Err(Error::remote("search_people", "HTTP 503"));
        }
        Ok(self
            .people
            .lock()
            .unwrap()
            .iter()
            .filter(|c| matches(c, filters))
            .cloned()
            .collect())
    }
}

impl RemoteWriter for FakeRemote {
    fn create(
        &self,
        kind: ResourceKind,
        owner: Option<&RemoteId>,
        attributes: &Value,
    ) -> Result<RemoteId> {
        self.check_failure(kind)?;
        self.writes.fetch_add(1, Ordering::SeqCst);
        let id = self.fresh_id();
        let mut people = self.people.lock().unwrap();

        if kind == ResourceKind::Person {
            let mut person = RemoteCandidate::new(id.clone(), "", "");
            apply_person(&mut person, attributes);
            people.push(person);
            return Ok(RemoteId::new(id));
        }

        let owner = owner.ok_or_else(|| Error::InvalidInput("missing owner".to_string()))?;
        let person = people
            .iter_mut()
            .find(|p| &p.id == owner)
            .ok_or_else(|| Error::remote("create", "HTTP 404"))?;

        match kind {
            ResourceKind::PhoneNumber => {
                let location = PhoneKind::from_label(&text(attributes, "location"));
                let phone = PhoneParser::new("US")
                    .parse(&text(attributes, "number"), location)
                    .unwrap_or(PhoneNumber {
                        national: digits(&text(attributes, "number")),
                        display: text(attributes, "number"),
                        kind: location,
                    });
                person.phones.push(RemoteItem::new(id.clone(), phone));
            },
            ResourceKind::Email => person.emails.push(RemoteItem::new(
                id.clone(),
                EmailAddress {
                    address: text(attributes, "address"),
                    kind: EmailKind::from_label(&text(attributes, "location")),
                },
            )),
            ResourceKind::Address => person.addresses.push(RemoteItem::new(
                id.clone(),
                PostalAddress {
                    street1: text(attributes, "street_line_1"),
                    street2: text(attributes, "street_line_2"),
                    city: text(attributes, "city"),
                    state: text(attributes, "state"),
                    postal_code: text(attributes, "zip"),
                },
            )),
            ResourceKind::FieldDatum => person.field_data.push(RemoteFieldDatum {
                id: RemoteId::new(id.clone()),
                field_definition_id: text(attributes, "field_definition_id"),
                value: text(attributes, "value"),
            }),
            ResourceKind::Person => {},
        }
        Ok(RemoteId::new(id))
    }

    fn update(&self, kind: ResourceKind, id: &RemoteId, attributes: &Value) -> Result<()> {
        self.check_failure(kind)?;
        self.writes.fetch_add(1, Ordering::SeqCst);
        let mut people = self.people.lock().unwrap();

        match kind {
            ResourceKind::Person => {
                let person = people
                    .iter_mut()
                    .find(|p| &p.id == id)
                    .ok_or_else(|| Error::remote("update", "HTTP 404"))?;
                apply_person(person, attributes);
            },
            ResourceKind::FieldDatum => {
                let datum = people
                    .iter_mut()
                    .flat_map(|p| p.field_data.iter_mut())
                    .find(|d| &d.id == id)
                    .ok_or_else(|| Error::remote("update", "HTTP 404"))?;
                datum.value = text(attributes, "value");
            },
            _ => return Err(Error::remote("update", "unsupported")),
        }
        Ok(())
    }
}

/// A geocoder answering from a fixed table keyed by lowercase street.
#[derive(Default)]
pub struct TableGeocoder {
    places: HashMap<String, Vec<Coordinates>>,
    pub failing: AtomicBool,
    calls: AtomicUsize,
}

impl TableGeocoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_place(mut self, street: &str, latitude: f64, longitude: f64) -> Self {
        self.places
            .entry(street.to_lowercase())
            .or_default()
            .push(Coordinates::new(latitude, longitude));
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Geocoder for TableGeocoder {
    fn geocode(&self, address: &PostalAddress) -> Result<Vec<Coordinates>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failing.load(Ordering::SeqCst) {
            return Err(Error::remote("geocode", "HTTP 503"));
        }
        Ok(self
            .places
            .get(&address.street1.to_lowercase())
            .cloned()
            .unwrap_or_default())
    }
}

/// A normalized local record with no contacts.
pub fn person(id: i64, first: &str, last: &str) -> PersonRecord {
    PersonRecord {
        id: LocalId(id),
        household_id: None,
        first_name: first.to_string(),
        last_name: last.to_string(),
        middle_name: String::new(),
        preferred_name: None,
        gender: None,
        date_of_birth: None,
        marital_status: None,
        last_updated: NaiveDate::from_ymd_opt(2020, 1, 1)
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .unwrap(),
        phones: Vec::new(),
        emails: Vec::new(),
        addresses: Vec::new(),
        attributes: Vec::new(),
    }
}

pub fn email(address: &str) -> EmailAddress {
    EmailAddress {
        address: address.to_string(),
        kind: EmailKind::Home,
    }
}

pub fn phone(raw: &str) -> PhoneNumber {
    PhoneParser::new("US").parse(raw, PhoneKind::Mobile).unwrap()
}

pub fn street(street1: &str, city: &str) -> PostalAddress {
    PostalAddress {
        street1: street1.to_string(),
        city: city.to_string(),
        ..PostalAddress::default()
    }
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}
