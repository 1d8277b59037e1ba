use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::error::{ConformanceError, Result};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConformanceConfig {
    #[serde(default)]
    pub fhir_version: FhirVersion,
    pub server_url: String,
    #[serde(default)]
    pub patient_id: String,
    #[serde(default)]
    pub bearer_token: Option<String>,
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub auth: Option<AuthConfig>,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum FhirVersion {
    #[serde(rename = "3.0.2")]
    Stu3,
    #[default]
    #[serde(rename = "4.0.1")]
    R4,
    #[serde(rename = "4.3.0")]
    R4B,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Upper bound on bundle pages followed for one search
    pub max_pages: usize,
    /// Upper bound on references read by the reference resolution case
    pub max_reference_checks: usize,
    pub request_timeout: Duration,
    pub user_agent: String,
}

/// Registration of the test client with the authorization server
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientRegistration {
    pub client_id: String,
    #[serde(default)]
    pub client_secret: Option<String>,
    #[serde(default)]
    pub confidential: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    pub authorize_endpoint: String,
    pub token_endpoint: String,
    pub redirect_uri: String,
    pub scopes: String,
    /// Audience sent as `aud`; the FHIR server base URL
    pub audience: String,
    pub client: ClientRegistration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_pages: 20,
            max_reference_checks: 50,
            request_timeout: Duration::from_secs(30),
            user_agent: format!("octofhir-conformance/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl ConformanceConfig {
    pub fn new(server_url: impl Into<String>) -> Self {
        Self {
            fhir_version: FhirVersion::default(),
            server_url: server_url.into(),
            patient_id: String::new(),
            bearer_token: None,
            engine: EngineConfig::default(),
            auth: None,
        }
    }

    pub fn from_json_str(raw: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json_str(&raw)
    }

    pub fn validate(&self) -> Result<()> {
        url::Url::parse(&self.server_url)?;
        if self.engine.max_pages == 0 {
            return Err(ConformanceError::configuration(
                "engine.max_pages must be at least 1",
            ));
        }
        if let Some(auth) = &self.auth {
            auth.validate()?;
        }
        Ok(())
    }

    pub fn with_patient(mut self, patient_id: impl Into<String>) -> Self {
        self.patient_id = patient_id.into();
        self
    }

    pub fn with_bearer_token(mut self, token: impl Into<String>) -> Self {
        self.bearer_token = Some(token.into());
        self
    }

    pub fn with_engine_config(mut self, engine: EngineConfig) -> Self {
        self.engine = engine;
        self
    }

    pub fn with_auth(mut self, auth: AuthConfig) -> Self {
        self.auth = Some(auth);
        self
    }
}

impl EngineConfig {
    pub fn with_max_pages(mut self, max_pages: usize) -> Self {
        self.max_pages = max_pages;
        self
    }

    pub fn with_max_reference_checks(mut self, max: usize) -> Self {
        self.max_reference_checks = max;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }
}

impl ClientRegistration {
    pub fn public(client_id: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: None,
            confidential: false,
        }
    }

    pub fn confidential(client_id: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: Some(secret.into()),
            confidential: true,
        }
    }
}

impl AuthConfig {
    pub fn validate(&self) -> Result<()> {
        url::Url::parse(&self.authorize_endpoint)?;
        url::Url::parse(&self.token_endpoint)?;
        url::Url::parse(&self.redirect_uri)?;
        if self.client.client_id.trim().is_empty() {
            return Err(ConformanceError::configuration("client_id must not be empty"));
        }
        if self.client.confidential && self.client.client_secret.is_none() {
            return Err(ConformanceError::configuration(
                "confidential clients require a client_secret",
            ));
        }
        Ok(())
    }
}

impl std::fmt::Display for FhirVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FhirVersion::Stu3 => write!(f, "3.0.2"),
            FhirVersion::R4 => write!(f, "4.0.1"),
            FhirVersion::R4B => write!(f, "4.3.0"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_json_uses_defaults() {
        let config = ConformanceConfig::from_json_str(
            r#"{"server_url": "http://www.example.com/fhir", "patient_id": "example"}"#,
        )
        .unwrap();

        assert_eq!(config.fhir_version, FhirVersion::R4);
        assert_eq!(config.engine.max_pages, 20);
        assert!(config.auth.is_none());
    }

    #[test]
    fn confidential_client_without_secret_is_rejected() {
        let auth = AuthConfig {
            authorize_endpoint: "http://oauth.example.com/authorize".into(),
            token_endpoint: "http://oauth.example.com/token".into(),
            redirect_uri: "http://localhost:4567/redirect".into(),
            scopes: "launch/patient openid patient/*.read".into(),
            audience: "http://www.example.com/fhir".into(),
            client: ClientRegistration {
                client_id: "abc".into(),
                client_secret: None,
                confidential: true,
            },
        };
        assert!(auth.validate().is_err());
    }

    #[test]
    fn invalid_server_url_is_rejected() {
        let result = ConformanceConfig::from_json_str(r#"{"server_url": "not a url"}"#);
        assert!(matches!(result, Err(ConformanceError::UrlParse(_))));
    }
}
