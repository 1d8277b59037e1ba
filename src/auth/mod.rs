//! Standalone launch authorization as an explicit state machine.
//!
//! [`AuthSession::start`] prepares the authorize redirect and suspends;
//! [`AuthSession::resume`] consumes the redirect callback, exchanges the
//! code for a token and validates the token response. Between the two the
//! session is persisted by an [`AuthSessionStore`](crate::storage::AuthSessionStore)
//! under its state nonce.

mod service;
mod session;
mod token;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::core::{CaseResult, RunContext};

pub use service::AuthLaunchService;
pub use session::AuthSession;
pub use token::{INVALID_CLIENT_PREFIX, build_token_request, validate_token_request};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum AuthState {
    Init,
    AwaitingRedirect,
    Exchanging,
    Completed { token: TokenSet },
    Failed { reason: String },
}

impl AuthState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, AuthState::Completed { .. } | AuthState::Failed { .. })
    }
}

/// Tokens and launch context granted by the token endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenSet {
    pub access_token: String,
    pub token_type: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub patient: Option<String>,
    #[serde(default)]
    pub encounter: Option<String>,
    #[serde(default)]
    pub scope: Option<String>,
    #[serde(default)]
    pub expires_in: Option<u64>,
    #[serde(default)]
    pub id_token: Option<String>,
    pub received_at: DateTime<Utc>,
}

impl TokenSet {
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        let seconds = i64::try_from(self.expires_in?).ok()?;
        self.received_at.checked_add_signed(Duration::seconds(seconds))
    }

    /// Hands the token and patient context to a later sequence run
    pub fn apply_to(&self, ctx: &mut RunContext) {
        ctx.bearer_token = Some(self.access_token.clone());
        if let Some(patient) = &self.patient {
            ctx.patient_id = patient.clone();
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SequenceState {
    Wait,
    Pass,
    Fail,
}

/// What a caller sees after each transition of an authorization run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SequenceResult {
    pub run_id: Uuid,
    pub state: SequenceState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub redirect_url: Option<String>,
    /// Endpoint the run is suspended at, e.g. `redirect`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wait_at: Option<String>,
    pub results: Vec<CaseResult>,
}

impl SequenceResult {
    pub fn is_waiting(&self) -> bool {
        self.state == SequenceState::Wait
    }

    pub fn is_pass(&self) -> bool {
        self.state == SequenceState::Pass
    }
}
