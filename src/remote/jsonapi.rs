//! JSON:API documents returned by the People API.

use crate::models::{
    EmailAddress, EmailKind, Gender, Household, HouseholdMember, PersonStatus, PhoneKind,
    PhoneNumber, PostalAddress, RemoteCandidate, RemoteFieldDatum, RemoteId, RemoteItem,
};
use crate::services::PhoneParser;
use crate::{Error, Result};
use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap};

/// A top-level response document.
#[derive(Debug, Deserialize)]
pub struct Document {
    pub data: PrimaryData,
    #[serde(default)]
    pub included: Vec<Resource>,
    #[serde(default)]
    pub links: Option<Links>,
}

/// `data` is a single resource for writes and an array for listings.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum PrimaryData {
    Many(Vec<Resource>),
    One(Box<Resource>),
}

/// Pagination links.
#[derive(Debug, Default, Deserialize)]
pub struct Links {
    pub next: Option<String>,
}

/// A resource object.
#[derive(Debug, Deserialize)]
pub struct Resource {
    #[serde(rename = "type")]
    pub kind: String,
    pub id: String,
    #[serde(default)]
    pub attributes: Map<String, Value>,
    #[serde(default)]
    pub relationships: BTreeMap<String, Relationship>,
}

/// A relationship object; only linkage is read.
#[derive(Debug, Default, Deserialize)]
pub struct Relationship {
    #[serde(default)]
    pub data: Option<Linkage>,
}

/// Resource linkage.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum Linkage {
    Many(Vec<Identifier>),
    One(Identifier),
}

/// A resource identifier object.
#[derive(Debug, Deserialize)]
pub struct Identifier {
    #[serde(rename = "type")]
    pub kind: String,
    pub id: String,
}

impl Resource {
    /// Returns a non-blank string attribute.
    fn text(&self, key: &str) -> Option<&str> {
        self.attributes
            .get(key)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }

    fn text_or_empty(&self, key: &str) -> String {
        self.text(key).unwrap_or_default().to_string()
    }

    fn date(&self, key: &str) -> Option<NaiveDate> {
        self.text(key)
            .and_then(|s| NaiveDate::parse_from_str(s, "%Y-%m-%d").ok())
    }

    fn status(&self) -> PersonStatus {
        self.text("status").map_or(PersonStatus::Active, PersonStatus::parse)
    }

    /// Returns the identifiers linked under `name`.
    fn linked(&self, name: &str) -> Vec<&Identifier> {
        match self.relationships.get(name).and_then(|r| r.data.as_ref()) {
            Some(Linkage::Many(ids)) => ids.iter().collect(),
            Some(Linkage::One(id)) => vec![id],
            None => Vec::new(),
        }
    }
}

impl Document {
    /// Parses a response body.
    pub fn parse(operation: &str, body: &str) -> Result<Self> {
        serde_json::from_str(body).map_err(|e| Error::remote(operation, e))
    }

    /// Returns the primary resources.
    pub fn resources(&self) -> &[Resource] {
        match &self.data {
            PrimaryData::Many(resources) => resources,
            PrimaryData::One(resource) => std::slice::from_ref(resource),
        }
    }

    /// Returns the next page URL, if any.
    pub fn next_link(&self) -> Option<&str> {
        self.links
            .as_ref()
            .and_then(|l| l.next.as_deref())
            .filter(|s| !s.is_empty())
    }

    /// Returns the id of the single created resource.
    pub fn created_id(&self, operation: &str) -> Result<RemoteId> {
        match &self.data {
            PrimaryData::One(resource) if !resource.id.is_empty() => {
                Ok(RemoteId::new(resource.id.clone()))
            },
            _ => Err(Error::remote(operation, "response carries no resource id")),
        }
    }

    fn included_index(&self) -> HashMap<(&str, &str), &Resource> {
        self.included
            .iter()
            .map(|r| ((r.kind.as_str(), r.id.as_str()), r))
            .collect()
    }

    /// Decodes `Person` resources with their included contacts, addresses
    /// and field data.
    pub fn candidates(&self, phones: &PhoneParser) -> Vec<RemoteCandidate> {
        let included = self.included_index();
        let related = |person: &Resource, name: &str| -> Vec<&Resource> {
            person
                .linked(name)
                .into_iter()
                .filter_map(|id| included.get(&(id.kind.as_str(), id.id.as_str())).copied())
                .collect()
        };

        self.resources()
            .iter()
            .filter(|r| r.kind == "Person")
            .map(|person| {
                let mut candidate = RemoteCandidate::new(
                    person.id.clone(),
                    &person.text_or_empty("first_name"),
                    &person.text_or_empty("last_name"),
                );
                candidate.given_name = person.text("given_name").map(str::to_string);
                candidate.middle_name = person.text("middle_name").map(str::to_string);
                candidate.gender = person.text("gender").and_then(Gender::parse);
                candidate.birthdate = person.date("birthdate");
                candidate.status = person.status();
                candidate.phones = related(person, "phone_numbers")
                    .into_iter()
                    .filter_map(|r| decode_phone(r, phones))
                    .collect();
                candidate.emails = related(person, "emails")
                    .into_iter()
                    .filter_map(decode_email)
                    .collect();
                candidate.addresses = related(person, "addresses")
                    .into_iter()
                    .map(decode_address)
                    .collect();
                candidate.field_data = related(person, "field_data")
                    .into_iter()
                    .filter_map(decode_field_datum)
                    .collect();
                candidate
            })
            .collect()
    }

    /// Decodes `Household` resources with their included members.
    pub fn households(&self) -> Vec<Household> {
        let included = self.included_index();

        self.resources()
            .iter()
            .filter(|r| r.kind == "Household")
            .map(|household| Household {
                id: RemoteId::new(household.id.clone()),
                name: household.text_or_empty("name"),
                members: household
                    .linked("people")
                    .into_iter()
                    .map(|id| {
                        let person = included.get(&(id.kind.as_str(), id.id.as_str()));
                        HouseholdMember {
                            person: RemoteId::new(id.id.clone()),
                            birthdate: person.and_then(|p| p.date("birthdate")),
                            status: person.map_or(PersonStatus::Active, |p| p.status()),
                        }
                    })
                    .collect(),
            })
            .collect()
    }
}

fn decode_phone(resource: &Resource, parser: &PhoneParser) -> Option<RemoteItem<PhoneNumber>> {
    let raw = resource.text("number").or_else(|| resource.text("national"))?;
    let kind = PhoneKind::from_label(resource.text("location").unwrap_or_default());
    let phone = parser.parse(raw, kind).unwrap_or_else(|| PhoneNumber {
        national: raw.chars().filter(char::is_ascii_digit).collect(),
        display: raw.to_string(),
        kind,
    });
    Some(RemoteItem::new(resource.id.clone(), phone))
}

fn decode_email(resource: &Resource) -> Option<RemoteItem<EmailAddress>> {
    let address = resource.text("address")?;
    Some(RemoteItem::new(
        resource.id.clone(),
        EmailAddress {
            address: address.to_string(),
            kind: EmailKind::from_label(resource.text("location").unwrap_or_default()),
        },
    ))
}

fn decode_address(resource: &Resource) -> RemoteItem<PostalAddress> {
    let street1 = resource
        .text("street_line_1")
        .or_else(|| resource.text("street"))
        .unwrap_or_default()
        .to_string();
    RemoteItem::new(
        resource.id.clone(),
        PostalAddress {
            street1,
            street2: resource.text_or_empty("street_line_2"),
            city: resource.text_or_empty("city"),
            state: resource.text_or_empty("state"),
            postal_code: resource.text_or_empty("zip"),
        },
    )
}

fn decode_field_datum(resource: &Resource) -> Option<RemoteFieldDatum> {
    let definition = resource.linked("field_definition").into_iter().next()?;
    Some(RemoteFieldDatum {
        id: RemoteId::new(resource.id.clone()),
        field_definition_id: definition.id.clone(),
        value: resource
            .attributes
            .get("value")
            .map(|v| match v {
                Value::String(s) => s.clone(),
                Value::Null => String::new(),
                other => other.to_string(),
            })
            .unwrap_or_default(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const SEARCH: &str = r#"{
        "data": [{
            "type": "Person",
            "id": "100",
            "attributes": {
                "first_name": "John",
                "last_name": "Smith",
                "given_name": null,
                "gender": "M",
                "birthdate": "1980-01-01",
                "status": "inactive"
            },
            "relationships": {
                "emails": {"data": [{"type": "Email", "id": "e1"}]},
                "phone_numbers": {"data": [{"type": "PhoneNumber", "id": "p1"}]},
                "addresses": {"data": [{"type": "Address", "id": "a1"}]},
                "field_data": {"data": [{"type": "FieldDatum", "id": "fd1"}]}
            }
        }],
        "included": [
            {"type": "Email", "id": "e1", "attributes": {"address": "J@X.com", "location": "Home"}},
            {"type": "PhoneNumber", "id": "p1", "attributes": {"number": "+1 555-234-5678", "location": "Mobile"}},
            {"type": "Address", "id": "a1", "attributes": {"street_line_1": "1 Main St", "city": "Springfield", "state": "IL", "zip": "62701"}},
            {"type": "FieldDatum", "id": "fd1", "attributes": {"value": "true"},
             "relationships": {"field_definition": {"data": {"type": "FieldDefinition", "id": "900"}}}}
        ],
        "links": {"next": "https://api.example.com/people/v2/people?offset=25"}
    }"#;

    #[test]
    fn test_candidates_resolve_included_resources() {
        let doc = Document::parse("search", SEARCH).unwrap_or_else(|e| panic!("{e}"));
        let people = doc.candidates(&PhoneParser::new("US"));
        assert_eq!(people.len(), 1);

        let john = &people[0];
        assert_eq!(john.id.as_str(), "100");
        assert_eq!(john.given_name, None);
        assert_eq!(john.gender, Some(Gender::Male));
        assert_eq!(john.birthdate, NaiveDate::from_ymd_opt(1980, 1, 1));
        assert_eq!(john.status, PersonStatus::Inactive);
        assert_eq!(john.emails[0].value.address, "J@X.com");
        assert_eq!(john.phones[0].value.national, "5552345678");
        assert_eq!(john.phones[0].value.kind, PhoneKind::Mobile);
        assert_eq!(john.addresses[0].value.postal_code, "62701");
        assert_eq!(
            john.field_datum("900").map(|d| d.value.as_str()),
            Some("true")
        );
        assert_eq!(
            doc.next_link(),
            Some("https://api.example.com/people/v2/people?offset=25")
        );
    }

    #[test]
    fn test_created_id() {
        let doc = Document::parse(
            "create",
            r#"{"data": {"type": "Person", "id": "555", "attributes": {}}}"#,
        )
        .unwrap_or_else(|e| panic!("{e}"));
        assert_eq!(doc.created_id("create").ok(), Some(RemoteId::new("555")));
        assert!(doc.next_link().is_none());
    }

    #[test]
    fn test_listing_has_no_created_id() {
        let doc = Document::parse("create", r#"{"data": []}"#).unwrap_or_else(|e| panic!("{e}"));
        assert!(matches!(
            doc.created_id("create"),
            Err(Error::RemoteUnavailable { .. })
        ));
    }

    #[test]
    fn test_malformed_body_is_remote_error() {
        assert!(matches!(
            Document::parse("search", "<html>"),
            Err(Error::RemoteUnavailable { .. })
        ));
    }

    #[test]
    fn test_households_with_members() {
        let body = r#"{
            "data": [{
                "type": "Household", "id": "h1",
                "attributes": {"name": "Smith Household"},
                "relationships": {"people": {"data": [
                    {"type": "Person", "id": "1"},
                    {"type": "Person", "id": "2"}
                ]}}
            }],
            "included": [
                {"type": "Person", "id": "1", "attributes": {"birthdate": "2015-03-04", "status": "active"}},
                {"type": "Person", "id": "2", "attributes": {"birthdate": null, "status": "inactive"}}
            ]
        }"#;
        let doc = Document::parse("households", body).unwrap_or_else(|e| panic!("{e}"));
        let households = doc.households();
        assert_eq!(households.len(), 1);
        assert_eq!(households[0].name, "Smith Household");
        assert_eq!(
            households[0].members[0].birthdate,
            NaiveDate::from_ymd_opt(2015, 3, 4)
        );
        assert_eq!(households[0].members[1].status, PersonStatus::Inactive);
    }
}
