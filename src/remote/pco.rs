//! Planning Center People API client.
//!
//! Blocking, authenticated with an application id and secret over HTTP
//! basic auth. Listing requests follow `links.next` until exhausted.

use super::jsonapi::Document;
use super::{
    HouseholdDirectory, PeopleDirectory, RemoteWriter, ResourceKind, SearchFilters,
    build_http_client,
};
use crate::config::RemoteConfig;
use crate::models::{Household, RemoteCandidate, RemoteId};
use crate::services::PhoneParser;
use crate::{Error, Result};
use reqwest::blocking::{Client, RequestBuilder};
use secrecy::{ExposeSecret, SecretString};
use serde_json::{Value, json};
use std::time::Instant;
use tracing::instrument;

const PEOPLE_PATH: &str = "/people/v2";
const SEARCH_INCLUDES: &str = "emails,phone_numbers,addresses,field_data";

/// Client for the People API.
pub struct PcoClient {
    client: Client,
    base_url: String,
    app_id: SecretString,
    secret: SecretString,
    per_page: usize,
    phones: PhoneParser,
}

impl PcoClient {
    /// Creates a client from remote settings.
    ///
    /// `region` selects the numbering plan used to parse remote phone
    /// numbers so they compare equal to local ones.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if credentials are missing.
    pub fn new(config: &RemoteConfig, region: &str) -> Result<Self> {
        let (app_id, secret) = config.credentials()?;
        Ok(Self {
            client: build_http_client(config.timeout_ms, config.connect_timeout_ms),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            app_id: app_id.clone(),
            secret: secret.clone(),
            per_page: config.per_page,
            phones: PhoneParser::new(region),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{PEOPLE_PATH}{path}", self.base_url)
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        request
            .basic_auth(
                self.app_id.expose_secret(),
                Some(self.secret.expose_secret()),
            )
            .header("Accept", "application/json")
    }

    /// Sends a request and returns the body of a successful response.
    fn send(&self, operation: &str, request: RequestBuilder) -> Result<String> {
        let start = Instant::now();
        let response = self
            .authorized(request)
            .send()
            .map_err(|e| Error::remote(operation, e))?;

        let status = response.status();
        metrics::histogram!("peoplesync_remote_request_duration_ms", "operation" => operation.to_string())
            .record(start.elapsed().as_secs_f64() * 1000.0);

        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            metrics::counter!("peoplesync_remote_errors_total", "status" => status.as_u16().to_string())
                .increment(1);
            return Err(Error::remote(operation, format!("HTTP {status}: {body}")));
        }

        response.text().map_err(|e| Error::remote(operation, e))
    }

    /// Fetches every page of a listing.
    fn list(&self, operation: &str, first: RequestBuilder) -> Result<Vec<Document>> {
        let mut pages = Vec::new();
        let mut request = Some(first);

        while let Some(current) = request.take() {
            let body = self.send(operation, current)?;
            let page = Document::parse(operation, &body)?;
            if let Some(next) = page.next_link() {
                request = Some(self.client.get(next));
            }
            pages.push(page);
        }

        tracing::debug!(operation, pages = pages.len(), "Fetched listing");
        Ok(pages)
    }

    fn search_query(&self, filters: &SearchFilters) -> Vec<(String, String)> {
        let mut query: Vec<(String, String)> = filters
            .iter()
            .map(|(key, value)| (format!("where[{key}]"), value.clone()))
            .collect();
        query.push(("include".to_string(), SEARCH_INCLUDES.to_string()));
        query.push(("per_page".to_string(), self.per_page.to_string()));
        query
    }

    fn create_path(kind: ResourceKind, owner: Option<&RemoteId>) -> Result<String> {
        match (kind, owner) {
            (ResourceKind::Person, _) => Ok("/people".to_string()),
            (_, Some(owner)) => Ok(format!("/people/{owner}/{}", kind.collection())),
            (_, None) => Err(Error::InvalidInput(format!(
                "{} requires an owning person",
                kind.type_name()
            ))),
        }
    }
}

/// Wraps attributes in a JSON:API request document.
///
/// A field datum's `field_definition_id` attribute becomes a relationship.
fn request_body(kind: ResourceKind, attributes: &Value) -> Value {
    let mut attributes = attributes.clone();
    let definition = match (kind, attributes.as_object_mut()) {
        (ResourceKind::FieldDatum, Some(map)) => map.remove("field_definition_id"),
        _ => None,
    };

    let mut data = json!({ "type": kind.type_name(), "attributes": attributes });
    if let Some(definition) = definition {
        data["relationships"] = json!({
            "field_definition": { "data": { "type": "FieldDefinition", "id": definition } }
        });
    }
    json!({ "data": data })
}

impl PeopleDirectory for PcoClient {
    #[instrument(skip(self), fields(filters = filters.len()))]
    fn search(&self, filters: &SearchFilters) -> Result<Vec<RemoteCandidate>> {
        let request = self
            .client
            .get(self.url("/people"))
            .query(&self.search_query(filters));

        let candidates: Vec<RemoteCandidate> = self
            .list("search_people", request)?
            .iter()
            .flat_map(|page| page.candidates(&self.phones))
            .collect();
        tracing::debug!(found = candidates.len(), "Remote search");
        Ok(candidates)
    }
}

impl RemoteWriter for PcoClient {
    #[instrument(skip(self, attributes), fields(kind = kind.type_name()))]
    fn create(
        &self,
        kind: ResourceKind,
        owner: Option<&RemoteId>,
        attributes: &Value,
    ) -> Result<RemoteId> {
        let path = Self::create_path(kind, owner)?;
        let operation = format!("create_{}", kind.collection());
        let request = self
            .client
            .post(self.url(&path))
            .json(&request_body(kind, attributes));
        let body = self.send(&operation, request)?;
        Document::parse(&operation, &body)?.created_id(&operation)
    }

    #[instrument(skip(self, attributes), fields(kind = kind.type_name(), id = %id))]
    fn update(&self, kind: ResourceKind, id: &RemoteId, attributes: &Value) -> Result<()> {
        let operation = format!("update_{}", kind.collection());
        let mut body = request_body(kind, attributes);
        body["data"]["id"] = json!(id.as_str());
        let request = self
            .client
            .patch(self.url(&format!("/{}/{id}", kind.collection())))
            .json(&body);
        self.send(&operation, request)?;
        Ok(())
    }
}

impl HouseholdDirectory for PcoClient {
    #[instrument(skip(self))]
    fn households(&self) -> Result<Vec<Household>> {
        let request = self.client.get(self.url("/households")).query(&[
            ("include", "people".to_string()),
            ("per_page", self.per_page.to_string()),
        ]);
        Ok(self
            .list("list_households", request)?
            .iter()
            .flat_map(Document::households)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> RemoteConfig {
        RemoteConfig {
            base_url: "https://api.example.com/".to_string(),
            app_id: Some(SecretString::from("app")),
            secret: Some(SecretString::from("secret")),
            ..RemoteConfig::default()
        }
    }

    #[test]
    fn test_new_requires_credentials() {
        assert!(matches!(
            PcoClient::new(&RemoteConfig::default(), "US"),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn test_url_strips_trailing_slash() {
        let client = PcoClient::new(&config(), "US").unwrap_or_else(|e| panic!("{e}"));
        assert_eq!(
            client.url("/people"),
            "https://api.example.com/people/v2/people"
        );
    }

    #[test]
    fn test_search_query_wraps_filters() {
        let client = PcoClient::new(&config(), "US").unwrap_or_else(|e| panic!("{e}"));
        let mut filters = SearchFilters::new();
        filters.insert("first_name".to_string(), "John".to_string());
        filters.insert("birthdate".to_string(), "1980-01-01".to_string());

        let query = client.search_query(&filters);
        assert!(query.contains(&("where[first_name]".to_string(), "John".to_string())));
        assert!(query.contains(&("where[birthdate]".to_string(), "1980-01-01".to_string())));
        assert!(query.contains(&("include".to_string(), SEARCH_INCLUDES.to_string())));
    }

    #[test]
    fn test_create_path() {
        let owner = RemoteId::new("42");
        assert_eq!(
            PcoClient::create_path(ResourceKind::Person, None).ok(),
            Some("/people".to_string())
        );
        assert_eq!(
            PcoClient::create_path(ResourceKind::Email, Some(&owner)).ok(),
            Some("/people/42/emails".to_string())
        );
        assert!(PcoClient::create_path(ResourceKind::Address, None).is_err());
    }

    #[test]
    fn test_field_datum_body_moves_definition_to_relationship() {
        let body = request_body(
            ResourceKind::FieldDatum,
            &json!({ "field_definition_id": "900", "value": "true" }),
        );
        assert_eq!(body["data"]["type"], "FieldDatum");
        assert_eq!(body["data"]["attributes"], json!({ "value": "true" }));
        assert_eq!(
            body["data"]["relationships"]["field_definition"]["data"]["id"],
            "900"
        );
    }
}
