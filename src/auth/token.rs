use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use chrono::Utc;
use serde_json::Value;

use super::TokenSet;
use crate::client::{HttpRequest, HttpResponse};
use crate::core::{AuthConfig, ClientRegistration, StepHalt, StepResult, ensure};

/// Client ids starting with this prefix must be rejected by the token endpoint
pub const INVALID_CLIENT_PREFIX: &str = "INVALID_";

/// Authorization code exchange request.
///
/// Confidential clients authenticate with HTTP Basic and keep their
/// credentials out of the body; public clients identify themselves with
/// `client_id` in the body. `client_id` overrides the registered id.
pub fn build_token_request(config: &AuthConfig, code: &str, client_id: Option<&str>) -> HttpRequest {
    let registration = &config.client;
    let client_id = client_id.unwrap_or(&registration.client_id);
    let mut fields = vec![
        ("grant_type", "authorization_code"),
        ("code", code),
        ("redirect_uri", config.redirect_uri.as_str()),
    ];

    let basic = if registration.confidential {
        let secret = registration.client_secret.as_deref().unwrap_or_default();
        Some(STANDARD.encode(format!("{client_id}:{secret}")))
    } else {
        fields.push(("client_id", client_id));
        None
    };

    let request = HttpRequest::post(config.token_endpoint.as_str())
        .with_form(&fields)
        .with_header("Accept", "application/json");
    match basic {
        Some(credentials) => request.with_header("Authorization", format!("Basic {credentials}")),
        None => request,
    }
}

/// Checks that a token request carries the client credentials exactly once
pub fn validate_token_request(request: &HttpRequest, registration: &ClientRegistration) -> StepResult<()> {
    let form = request.form_params();
    let in_body = |name: &str| form.iter().any(|(key, _)| key == name);
    let basic = request
        .header("Authorization")
        .is_some_and(|value| value.starts_with("Basic "));

    if registration.confidential {
        ensure(basic, "Confidential clients must authenticate with an HTTP Basic Authorization header")?;
        ensure(
            !in_body("client_id") && !in_body("client_secret"),
            "Confidential clients must not send client_id or client_secret in the token request body",
        )
    } else {
        ensure(!basic, "Public clients must not send an Authorization header")?;
        ensure(!in_body("client_secret"), "Public clients must not send a client_secret")?;
        ensure(in_body("client_id"), "Public clients must send client_id in the token request body")
    }
}

/// Validates a token response body and turns it into a [`TokenSet`]
pub fn parse_token_response(body: &Value, requested_scopes: &str) -> StepResult<TokenSet> {
    ensure(body.is_object(), "Token response is not a JSON object")?;
    let text = |name: &str| {
        body.get(name)
            .and_then(Value::as_str)
            .filter(|value| !value.is_empty())
            .map(str::to_string)
    };

    let access_token = text("access_token")
        .ok_or_else(|| StepHalt::fail("Token response did not contain access_token as required"))?;
    let token_type = text("token_type")
        .ok_or_else(|| StepHalt::fail("Token response did not contain token_type as required"))?;
    ensure(
        token_type.eq_ignore_ascii_case("bearer"),
        format!("Token type must be Bearer, but found {token_type}"),
    )?;

    let scope = text("scope");
    ensure(scope.is_some(), "Token response did not contain scope as required")?;

    let patient = text("patient");
    let launch_patient = requested_scopes
        .split_whitespace()
        .any(|scope| scope == "launch/patient");
    ensure(
        !launch_patient || patient.is_some(),
        "No patient id provided in token exchange.",
    )?;

    let expires_in = match body.get("expires_in") {
        None | Some(Value::Null) => None,
        Some(value) => Some(
            value
                .as_u64()
                .ok_or_else(|| StepHalt::fail(format!("Token expires_in must be numeric, but found {value}")))?,
        ),
    };

    Ok(TokenSet {
        access_token,
        token_type,
        refresh_token: text("refresh_token"),
        patient,
        encounter: text("encounter"),
        scope,
        expires_in,
        id_token: text("id_token"),
        received_at: Utc::now(),
    })
}

/// Warnings for missing `Cache-Control: no-store` and `Pragma: no-cache`
pub fn cache_header_warnings(reply: &HttpResponse) -> Vec<String> {
    let has = |name: &str, directive: &str| {
        reply
            .header(name)
            .is_some_and(|value| value.to_ascii_lowercase().contains(directive))
    };

    let mut warnings = Vec::new();
    if !has("cache-control", "no-store") {
        warnings.push("Token response headers did not contain cache_control: no-store".to_string());
    }
    if !has("pragma", "no-cache") {
        warnings.push("Token response headers did not contain pragma: no-cache".to_string());
    }
    warnings
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn config(client: ClientRegistration) -> AuthConfig {
        AuthConfig {
            authorize_endpoint: "http://oauth.example.com/authorize".into(),
            token_endpoint: "http://oauth.example.com/token".into(),
            redirect_uri: "http://localhost:4567/redirect".into(),
            scopes: "launch/patient openid patient/*.read".into(),
            audience: "http://www.example.com/fhir".into(),
            client,
        }
    }

    #[test]
    fn confidential_request_uses_basic_auth_only() {
        let config = config(ClientRegistration::confidential("abc", "s3cret"));
        let request = build_token_request(&config, "5N01E0", None);

        assert_eq!(request.header("Authorization"), Some("Basic YWJjOnMzY3JldA=="));
        assert!(request.form_params().iter().all(|(key, _)| key != "client_id"));
        assert!(validate_token_request(&request, &config.client).is_ok());
    }

    #[test]
    fn public_request_sends_client_id_in_body() {
        let config = config(ClientRegistration::public("abc"));
        let request = build_token_request(&config, "5N01E0", None);

        assert!(request.header("Authorization").is_none());
        assert!(request.form_params().contains(&("client_id".to_string(), "abc".to_string())));
        assert!(validate_token_request(&request, &config.client).is_ok());
    }

    #[test]
    fn duplicated_credentials_are_rejected() {
        let config = config(ClientRegistration::confidential("abc", "s3cret"));
        let request = build_token_request(&config, "code", None).with_form(&[("client_id", "abc")]);
        assert!(validate_token_request(&request, &config.client).is_err());
    }

    #[test]
    fn token_response_requires_patient_for_launch_patient() {
        let body = json!({"access_token": "t", "token_type": "bearer", "scope": "patient/*.read", "expires_in": 3600});
        assert_eq!(
            parse_token_response(&body, "launch/patient openid").unwrap_err(),
            StepHalt::fail("No patient id provided in token exchange.")
        );
        let token = parse_token_response(&body, "openid patient/*.read").unwrap();
        assert_eq!(token.expires_in, Some(3600));
        assert!(token.expires_at().is_some());
    }

    #[test]
    fn expires_in_must_be_numeric() {
        let body = json!({"access_token": "t", "token_type": "Bearer", "scope": "s", "expires_in": "soon"});
        assert!(parse_token_response(&body, "openid").is_err());
    }

    #[test]
    fn missing_cache_headers_are_warnings() {
        let reply = HttpResponse::new(200, "{}").with_header("Cache-Control", "no-store");
        assert_eq!(
            cache_header_warnings(&reply),
            vec!["Token response headers did not contain pragma: no-cache".to_string()]
        );
    }
}
