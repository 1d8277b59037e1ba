//! # OctoFHIR Conformance
//!
//! An async engine that checks a FHIR server against the US Core
//! implementation guide: it runs ordered, stateful test sequences, drives
//! the standalone launch authorization flow, and validates returned data
//! against search parameter semantics, must-support rules and referential
//! integrity.
//!
//! ## Features
//!
//! - **Sequences**: Declarative per-resource definitions (CarePlan, CareTeam) built into ordered test cases
//! - **Validation**: Search reply, read/vread/history, must-support, reference and profile checks
//! - **Authorization**: Standalone launch state machine that suspends across the redirect
//! - **Pagination**: Bounded aggregation of multi-page search bundles
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use octofhir_conformance::*;
//!
//! # async fn example() -> Result<()> {
//! let config = ConformanceConfig::from_json_file("conformance.json")?;
//! let transport = Arc::new(ReqwestServerClient::new(&config.engine)?);
//! let client = FhirClient::new(&config.server_url, transport);
//! let env = SequenceEnv::new(client, Arc::new(BasicResourceOracle::us_core()?));
//! let runner = SequenceRunner::new(env, Arc::new(StaticCapabilities::allow_all()));
//!
//! let mut ctx = RunContext::new(&config.patient_id);
//! let results = runner.run(&CARE_PLAN.build(), &mut ctx).await;
//! # Ok(())
//! # }
//! ```

pub mod auth;
pub mod bundle;
pub mod capability;
pub mod client;
pub mod core;
pub mod engine;
pub mod error;
pub mod oracle;
pub mod path;
pub mod search;
pub mod sequence;
pub mod storage;
pub mod uscore;
pub mod validation;

pub use error::Result;
pub use error::ConformanceError;

pub use auth::{
    AuthLaunchService, AuthSession, AuthState, INVALID_CLIENT_PREFIX, SequenceResult, SequenceState,
    TokenSet,
};
pub use bundle::{SearchResultSet, fetch_all};
pub use capability::{CapabilityLookup, Interaction, StaticCapabilities};
pub use client::{FhirClient, HttpRequest, HttpResponse, Method, SearchParams, ServerClient};
pub use crate::core::{
    AuthConfig, CaseResult, ClientRegistration, ConformanceConfig, EngineConfig, FhirVersion,
    Outcome, OutcomeKind, RunContext, StepHalt, StepResult,
};
pub use engine::SequenceRunner;
pub use oracle::{BasicResourceOracle, ResourceOracle, Violation};
pub use sequence::{Sequence, SequenceDefinition, SequenceEnv, TestCase, TestStep};
pub use storage::{AuthSessionStore, MemorySessionStore};
pub use uscore::{CARE_PLAN, CARE_TEAM};

#[cfg(feature = "http-client")]
pub use client::ReqwestServerClient;
