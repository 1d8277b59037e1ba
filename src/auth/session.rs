use chrono::{DateTime, Utc};
use rand::Rng;
use rand::distr::Alphanumeric;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use url::Url;
use uuid::Uuid;

use super::token::{INVALID_CLIENT_PREFIX, build_token_request, cache_header_warnings, parse_token_response, validate_token_request};
use super::{AuthState, SequenceResult, SequenceState, TokenSet};
use crate::client::{FhirClient, HttpResponse};
use crate::core::{AuthConfig, CaseResult, Outcome, OutcomeKind, StepHalt, StepResult, ensure};
use crate::validation::assert_response_code;

const NONCE_LEN: usize = 32;
pub const WAIT_AT_REDIRECT: &str = "redirect";

pub(super) struct AuthCase {
    key: &'static str,
    id: &'static str,
    title: &'static str,
}

impl AuthCase {
    pub(super) fn result(&self, outcome: Outcome, warnings: Vec<String>) -> CaseResult {
        CaseResult {
            id: self.id.to_string(),
            key: self.key.to_string(),
            title: self.title.to_string(),
            optional: false,
            outcome,
            warnings,
        }
    }
}

const ENDPOINTS: AuthCase = AuthCase {
    key: "oauth_endpoints",
    id: "SLS-01",
    title: "OAuth endpoints are configured",
};
pub(super) const REDIRECT: AuthCase = AuthCase {
    key: "redirect_received",
    id: "SLS-02",
    title: "Client app receives code parameter and correct state parameter from OAuth server at redirect URI",
};
const INVALID_CLIENT: AuthCase = AuthCase {
    key: "invalid_client_rejected",
    id: "SLS-03",
    title: "OAuth token exchange fails when supplied invalid client ID",
};
const EXCHANGE: AuthCase = AuthCase {
    key: "token_exchange",
    id: "SLS-04",
    title: "OAuth token exchange request succeeds when supplied correct information",
};
const TOKEN_BODY: AuthCase = AuthCase {
    key: "token_response_body",
    id: "SLS-05",
    title: "Data returned from token exchange contains required information encoded in JSON",
};
const TOKEN_HEADERS: AuthCase = AuthCase {
    key: "token_response_headers",
    id: "SLS-06",
    title: "Response includes correct HTTP Cache-Control and Pragma headers",
};

/// One standalone launch, from the authorize redirect to the token
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthSession {
    run_id: Uuid,
    nonce: String,
    config: AuthConfig,
    state: AuthState,
    redirect_url: Option<String>,
    results: Vec<CaseResult>,
    created_at: DateTime<Utc>,
}

impl AuthSession {
    /// Prepares the authorize redirect and suspends waiting for the callback
    pub fn start(config: &AuthConfig) -> (Self, SequenceResult) {
        let nonce: String = rand::rng()
            .sample_iter(&Alphanumeric)
            .take(NONCE_LEN)
            .map(char::from)
            .collect();

        let mut session = Self {
            run_id: Uuid::new_v4(),
            nonce,
            config: config.clone(),
            state: AuthState::Init,
            redirect_url: None,
            results: Vec::new(),
            created_at: Utc::now(),
        };

        match authorize_url(config, &session.nonce) {
            Ok(url) => {
                session.record(&ENDPOINTS, Outcome::Pass, Vec::new());
                tracing::info!("Authorization run {} waiting at {}", session.run_id, WAIT_AT_REDIRECT);
                session.redirect_url = Some(url);
                session.state = AuthState::AwaitingRedirect;
            }
            Err(halt) => {
                session.record(&ENDPOINTS, halt.into(), Vec::new());
                session.settle(None);
            }
        }

        let result = session.result();
        (session, result)
    }

    /// Consumes the redirect callback, exchanges the code and checks the token.
    ///
    /// A bad callback, a failed exchange or an unreadable token response ends
    /// the run at once. A token endpoint that accepts an invalid client is
    /// recorded and the run goes on, but it can no longer pass.
    pub async fn resume(mut self, params: &HashMap<String, String>, client: &FhirClient) -> (Self, SequenceResult) {
        if self.state != AuthState::AwaitingRedirect {
            tracing::warn!("Authorization run {} resumed in state {:?}", self.run_id, self.state);
            let result = self.result();
            return (self, result);
        }

        let code = match self.check_callback(params) {
            Ok(code) => {
                self.record(&REDIRECT, Outcome::Pass, Vec::new());
                code
            }
            Err(halt) => return self.halt(&REDIRECT, halt),
        };
        self.state = AuthState::Exchanging;

        let rejected = self.check_invalid_client(&code, client).await;
        self.record_step(&INVALID_CLIENT, rejected);

        let reply = match self.exchange(&code, client).await {
            Ok(reply) => {
                self.record(&EXCHANGE, Outcome::Pass, Vec::new());
                reply
            }
            Err(halt) => return self.halt(&EXCHANGE, halt),
        };

        let token = match read_token(&reply, &self.config.scopes) {
            Ok(token) => {
                self.record(&TOKEN_BODY, Outcome::Pass, Vec::new());
                Some(token)
            }
            Err(halt) => {
                self.record(&TOKEN_BODY, halt.into(), Vec::new());
                None
            }
        };

        self.record(&TOKEN_HEADERS, Outcome::Pass, cache_header_warnings(&reply));

        self.settle(token);
        let result = self.result();
        (self, result)
    }

    pub fn nonce(&self) -> &str {
        &self.nonce
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub fn state(&self) -> &AuthState {
        &self.state
    }

    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    pub fn redirect_url(&self) -> Option<&str> {
        self.redirect_url.as_deref()
    }

    pub fn results(&self) -> &[CaseResult] {
        &self.results
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn token(&self) -> Option<&TokenSet> {
        match &self.state {
            AuthState::Completed { token } => Some(token),
            _ => None,
        }
    }

    /// Snapshot of the run as reported to the caller
    pub fn result(&self) -> SequenceResult {
        let state = match self.state {
            AuthState::AwaitingRedirect => SequenceState::Wait,
            AuthState::Completed { .. } => SequenceState::Pass,
            AuthState::Init | AuthState::Exchanging | AuthState::Failed { .. } => SequenceState::Fail,
        };
        let waiting = state == SequenceState::Wait;
        SequenceResult {
            run_id: self.run_id,
            state,
            redirect_url: self.redirect_url.clone().filter(|_| waiting),
            wait_at: waiting.then(|| WAIT_AT_REDIRECT.to_string()),
            results: self.results.clone(),
        }
    }

    fn check_callback(&self, params: &HashMap<String, String>) -> StepResult<String> {
        if let Some(error) = params.get("error") {
            let description = params
                .get("error_description")
                .map(|d| format!(": {d}"))
                .unwrap_or_default();
            return Err(StepHalt::fail(format!(
                "Error returned from authorization server: {error}{description}"
            )));
        }

        let state = params.get("state").map(String::as_str).unwrap_or_default();
        ensure(
            state == self.nonce,
            format!(
                "State provided in redirect ({state}) does not match expected state ({}).",
                self.nonce
            ),
        )?;

        params
            .get("code")
            .filter(|code| !code.is_empty())
            .cloned()
            .ok_or_else(|| StepHalt::fail("No code parameter provided in redirect."))
    }

    async fn check_invalid_client(&self, code: &str, client: &FhirClient) -> StepResult<()> {
        let invalid_id = format!("{INVALID_CLIENT_PREFIX}{}", self.config.client.client_id);
        let request = build_token_request(&self.config, code, Some(&invalid_id));
        let reply = client.post_form(request).await?;
        assert_response_code(&reply, &[401])
    }

    async fn exchange(&self, code: &str, client: &FhirClient) -> StepResult<HttpResponse> {
        let request = build_token_request(&self.config, code, None);
        validate_token_request(&request, &self.config.client)?;
        let reply = client.post_form(request).await?;
        assert_response_code(&reply, &[200])?;
        Ok(reply)
    }

    fn record(&mut self, case: &AuthCase, outcome: Outcome, warnings: Vec<String>) {
        tracing::info!("{} {}", case.id, outcome.kind());
        self.results.push(case.result(outcome, warnings));
    }

    fn record_step(&mut self, case: &AuthCase, step: StepResult<()>) {
        let outcome = match step {
            Ok(()) => Outcome::Pass,
            Err(halt) => halt.into(),
        };
        self.record(case, outcome, Vec::new());
    }

    /// Records a fatal halt and ends the run
    fn halt(mut self, case: &AuthCase, halt: StepHalt) -> (Self, SequenceResult) {
        self.record(case, halt.into(), Vec::new());
        self.settle(None);
        let result = self.result();
        (self, result)
    }

    /// Terminal state: the first violation recorded, else the token
    fn settle(&mut self, token: Option<TokenSet>) {
        let violation = self
            .results
            .iter()
            .find(|r| matches!(r.kind(), OutcomeKind::Fail | OutcomeKind::Error))
            .map(|r| format!("{}: {}", r.id, r.message().unwrap_or_default()));

        self.state = match (violation, token) {
            (Some(reason), _) => AuthState::Failed { reason },
            (None, Some(token)) => AuthState::Completed { token },
            (None, None) => AuthState::Failed {
                reason: "token exchange did not produce a token".to_string(),
            },
        };
        if let AuthState::Failed { reason } = &self.state {
            tracing::warn!("Authorization run {} failed: {}", self.run_id, reason);
        }
    }
}

fn authorize_url(config: &AuthConfig, nonce: &str) -> StepResult<String> {
    config
        .validate()
        .map_err(|err| StepHalt::fail(format!("OAuth endpoints are not configured correctly: {err}")))?;

    let url = Url::parse_with_params(
        &config.authorize_endpoint,
        &[
            ("response_type", "code"),
            ("client_id", config.client.client_id.as_str()),
            ("redirect_uri", config.redirect_uri.as_str()),
            ("scope", config.scopes.as_str()),
            ("state", nonce),
            ("aud", config.audience.as_str()),
        ],
    )
    .map_err(|err| StepHalt::fail(format!("Invalid authorize endpoint: {err}")))?;

    Ok(url.to_string())
}

fn read_token(reply: &HttpResponse, scopes: &str) -> StepResult<TokenSet> {
    let body = reply
        .resource()?
        .ok_or_else(|| StepHalt::fail("Token response body is empty"))?;
    parse_token_response(&body, scopes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ClientRegistration;

    fn config() -> AuthConfig {
        AuthConfig {
            authorize_endpoint: "http://oauth.example.com/authorize".into(),
            token_endpoint: "http://oauth.example.com/token".into(),
            redirect_uri: "http://localhost:4567/redirect".into(),
            scopes: "launch/patient openid patient/*.read".into(),
            audience: "http://www.example.com/fhir".into(),
            client: ClientRegistration::public("client-1"),
        }
    }

    #[test]
    fn start_waits_at_redirect() {
        let (session, result) = AuthSession::start(&config());

        assert_eq!(result.state, SequenceState::Wait);
        assert_eq!(result.wait_at.as_deref(), Some("redirect"));
        assert_eq!(session.nonce().len(), 32);
        assert!(session.nonce().chars().all(|c| c.is_ascii_alphanumeric()));

        let url = Url::parse(result.redirect_url.as_deref().unwrap()).unwrap();
        assert!(url.as_str().starts_with("http://oauth.example.com/authorize"));
        let params: HashMap<_, _> = url.query_pairs().into_owned().collect();
        assert_eq!(params["response_type"], "code");
        assert_eq!(params["state"], session.nonce());
        assert_eq!(params["aud"], "http://www.example.com/fhir");
        assert_eq!(params["scope"], "launch/patient openid patient/*.read");
    }

    #[test]
    fn nonces_differ_between_runs() {
        let (first, _) = AuthSession::start(&config());
        let (second, _) = AuthSession::start(&config());
        assert_ne!(first.nonce(), second.nonce());
    }

    #[test]
    fn bad_endpoint_fails_immediately() {
        let mut config = config();
        config.token_endpoint = "not a url".into();
        let (session, result) = AuthSession::start(&config);

        assert_eq!(result.state, SequenceState::Fail);
        assert!(result.redirect_url.is_none());
        assert_eq!(result.results[0].kind(), OutcomeKind::Fail);
        assert!(matches!(session.state(), AuthState::Failed { .. }));
    }
}
