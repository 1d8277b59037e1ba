//! Request shaping for the server under test.
//!
//! [`ServerClient`] is the transport seam: it executes one fully described
//! [`HttpRequest`] and hands back the raw [`HttpResponse`]. [`FhirClient`]
//! sits on top and knows about FHIR base URLs, bearer tokens and the
//! `application/fhir+json` media type.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

use crate::error::{ConformanceError, Result};

#[cfg(feature = "http-client")]
mod transport;

#[cfg(feature = "http-client")]
pub use transport::ReqwestServerClient;

pub const FHIR_JSON: &str = "application/fhir+json";
pub const FORM_URLENCODED: &str = "application/x-www-form-urlencoded";

/// Ordered query parameters; repeated names are allowed
pub type SearchParams = Vec<(String, String)>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Method {
    Get,
    Post,
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Method::Get => f.write_str("GET"),
            Method::Post => f.write_str("POST"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    pub method: Method,
    /// Absolute URL; may already carry a query string
    pub url: String,
    pub query: SearchParams,
    pub headers: Vec<(String, String)>,
    pub body: Option<String>,
}

impl HttpRequest {
    pub fn get(url: impl Into<String>) -> Self {
        Self::new(Method::Get, url)
    }

    pub fn post(url: impl Into<String>) -> Self {
        Self::new(Method::Post, url)
    }

    fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            query: Vec::new(),
            headers: Vec::new(),
            body: None,
        }
    }

    pub fn with_query(mut self, params: &[(String, String)]) -> Self {
        self.query.extend(params.iter().cloned());
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Sets an `application/x-www-form-urlencoded` body
    pub fn with_form(mut self, fields: &[(&str, &str)]) -> Self {
        let body = url::form_urlencoded::Serializer::new(String::new())
            .extend_pairs(fields.iter())
            .finish();
        self.body = Some(body);
        self.with_header("Content-Type", FORM_URLENCODED)
    }

    /// Case-insensitive header lookup
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// Decoded form fields of the body, in order
    pub fn form_params(&self) -> Vec<(String, String)> {
        self.body
            .as_deref()
            .map(|body| {
                url::form_urlencoded::parse(body.as_bytes())
                    .into_owned()
                    .collect()
            })
            .unwrap_or_default()
    }

    /// The URL with `query` appended
    pub fn full_url(&self) -> Result<url::Url> {
        let mut url = url::Url::parse(&self.url)?;
        if !self.query.is_empty() {
            url.query_pairs_mut().extend_pairs(self.query.iter());
        }
        Ok(url)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct HttpResponse {
    pub status: u16,
    /// Header names are stored lowercased
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl HttpResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: body.into(),
        }
    }

    pub fn json(status: u16, body: &Value) -> Self {
        Self::new(status, body.to_string()).with_header("content-type", FHIR_JSON)
    }

    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.push((name.to_ascii_lowercase(), value.into()));
        self
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// Parses the body as JSON; an empty body is `None`
    pub fn resource(&self) -> Result<Option<Value>> {
        if self.body.trim().is_empty() {
            return Ok(None);
        }
        serde_json::from_str(&self.body)
            .map(Some)
            .map_err(|err| ConformanceError::decode(format!("response body is not JSON: {err}")))
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Executes HTTP requests against the server under test
#[async_trait]
pub trait ServerClient: Send + Sync {
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse>;
}

/// FHIR REST client bound to one server base URL
#[derive(Clone)]
pub struct FhirClient {
    transport: Arc<dyn ServerClient>,
    base_url: String,
    bearer_token: Option<String>,
}

impl fmt::Debug for FhirClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FhirClient")
            .field("base_url", &self.base_url)
            .field("authenticated", &self.bearer_token.is_some())
            .finish()
    }
}

impl FhirClient {
    pub fn new(base_url: impl Into<String>, transport: Arc<dyn ServerClient>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            transport,
            base_url,
            bearer_token: None,
        }
    }

    /// Sends `Authorization: Bearer` on FHIR requests; blank tokens are ignored
    pub fn with_bearer_token(mut self, token: Option<&str>) -> Self {
        self.bearer_token = token
            .map(str::trim)
            .filter(|token| !token.is_empty())
            .map(str::to_string);
        self
    }

    /// Same server, no credentials
    pub fn without_auth(&self) -> Self {
        Self {
            transport: Arc::clone(&self.transport),
            base_url: self.base_url.clone(),
            bearer_token: None,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn type_url(&self, resource_type: &str) -> String {
        format!("{}/{}", self.base_url, resource_type)
    }

    pub fn resource_url(&self, resource_type: &str, id: &str) -> String {
        format!("{}/{}/{}", self.base_url, resource_type, id)
    }

    pub async fn search(&self, resource_type: &str, params: &[(String, String)]) -> Result<HttpResponse> {
        let request = HttpRequest::get(self.type_url(resource_type)).with_query(params);
        self.send(request).await
    }

    pub async fn read(&self, resource_type: &str, id: &str) -> Result<HttpResponse> {
        self.send(HttpRequest::get(self.resource_url(resource_type, id)))
            .await
    }

    pub async fn vread(&self, resource_type: &str, id: &str, version_id: &str) -> Result<HttpResponse> {
        let url = format!("{}/_history/{}", self.resource_url(resource_type, id), version_id);
        self.send(HttpRequest::get(url)).await
    }

    pub async fn history(&self, resource_type: &str, id: &str) -> Result<HttpResponse> {
        let url = format!("{}/_history", self.resource_url(resource_type, id));
        self.send(HttpRequest::get(url)).await
    }

    /// GET an absolute URL, or a path relative to the base URL
    pub async fn get_url(&self, url: &str) -> Result<HttpResponse> {
        let absolute = if url.starts_with("http://") || url.starts_with("https://") {
            url.to_string()
        } else {
            format!("{}/{}", self.base_url, url.trim_start_matches('/'))
        };
        self.send(HttpRequest::get(absolute)).await
    }

    /// Form POST outside the FHIR API (token endpoints); no bearer token is attached
    pub async fn post_form(&self, request: HttpRequest) -> Result<HttpResponse> {
        tracing::debug!("POST {}", request.url);
        self.transport.execute(request).await
    }

    /// Adds FHIR headers and the bearer token, then executes
    pub async fn send(&self, mut request: HttpRequest) -> Result<HttpResponse> {
        if request.header("Accept").is_none() {
            request.headers.push(("Accept".to_string(), FHIR_JSON.to_string()));
        }
        if let Some(token) = &self.bearer_token {
            request
                .headers
                .push(("Authorization".to_string(), format!("Bearer {token}")));
        }
        tracing::debug!("{} {} {:?}", request.method, request.url, request.query);
        let response = self.transport.execute(request).await?;
        tracing::debug!("-> {}", response.status);
        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn form_bodies_round_trip_through_params() {
        let request = HttpRequest::post("https://auth.example/token")
            .with_form(&[("grant_type", "authorization_code"), ("code", "a b&c")]);

        assert_eq!(request.header("content-type"), Some(FORM_URLENCODED));
        assert_eq!(
            request.form_params(),
            vec![
                ("grant_type".to_string(), "authorization_code".to_string()),
                ("code".to_string(), "a b&c".to_string()),
            ]
        );
    }

    #[test]
    fn full_url_appends_query() {
        let request = HttpRequest::get("https://fhir.example/r4/CarePlan")
            .with_query(&[("patient".into(), "85".into()), ("category".into(), "assess-plan".into())]);
        assert_eq!(
            request.full_url().unwrap().as_str(),
            "https://fhir.example/r4/CarePlan?patient=85&category=assess-plan"
        );
    }

    #[test]
    fn empty_body_has_no_resource() {
        assert_eq!(HttpResponse::new(200, "  ").resource().unwrap(), None);
        assert!(matches!(
            HttpResponse::new(200, "{not json").resource(),
            Err(ConformanceError::Decode { .. })
        ));
        let response = HttpResponse::json(200, &json!({"resourceType": "Bundle"}));
        assert_eq!(response.resource().unwrap().unwrap()["resourceType"], "Bundle");
        assert_eq!(response.header("Content-Type"), Some(FHIR_JSON));
    }
}
