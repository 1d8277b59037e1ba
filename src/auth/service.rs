use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

use super::session::REDIRECT;
use super::{AuthSession, SequenceResult, SequenceState, TokenSet};
use crate::client::FhirClient;
use crate::core::{AuthConfig, Outcome};
use crate::error::Result;
use crate::storage::AuthSessionStore;

/// Starts launches and resumes them from redirect callbacks.
///
/// Sessions are parked in the store under their state nonce, so a callback
/// is matched to its run by the `state` parameter alone. A session is taken
/// out of the store while its callback is processed; a duplicate callback
/// arriving meanwhile finds nothing and cannot exchange the code again.
pub struct AuthLaunchService {
    store: Arc<dyn AuthSessionStore>,
    client: FhirClient,
}

impl std::fmt::Debug for AuthLaunchService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthLaunchService")
            .field("client", &self.client)
            .finish()
    }
}

impl AuthLaunchService {
    pub fn new(store: Arc<dyn AuthSessionStore>, client: FhirClient) -> Self {
        Self { store, client }
    }

    pub async fn start(&self, config: &AuthConfig) -> Result<SequenceResult> {
        let (session, result) = AuthSession::start(config);
        self.store.put(session).await?;
        Ok(result)
    }

    pub async fn resume(&self, params: &HashMap<String, String>) -> Result<SequenceResult> {
        let state = params.get("state").map(String::as_str).unwrap_or_default();

        let session = match state {
            "" => None,
            nonce => self.store.take(nonce).await?,
        };
        let Some(session) = session else {
            tracing::warn!("Redirect received for unknown state '{}'", state);
            return Ok(unknown_state(state));
        };

        let (session, result) = session.resume(params, &self.client).await;
        self.store.put(session).await?;
        Ok(result)
    }

    /// Token of a completed launch
    pub async fn token(&self, nonce: &str) -> Result<Option<TokenSet>> {
        Ok(self
            .store
            .get(nonce)
            .await?
            .and_then(|session| session.token().cloned()))
    }

    pub async fn forget(&self, nonce: &str) -> Result<bool> {
        self.store.remove(nonce).await
    }
}

fn unknown_state(state: &str) -> SequenceResult {
    SequenceResult {
        run_id: Uuid::new_v4(),
        state: SequenceState::Fail,
        redirect_url: None,
        wait_at: None,
        results: vec![REDIRECT.result(
            Outcome::Fail(format!("No authorization session is waiting for state '{state}'")),
            Vec::new(),
        )],
    }
}
