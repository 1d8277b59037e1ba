//! Checks applied to server replies.
//!
//! Every check returns a [`StepResult`] so callers can chain them with `?`;
//! the first check that does not hold decides the case outcome.

pub mod coverage;
pub mod resource;
pub mod search;

use serde_json::Value;

use crate::client::HttpResponse;
use crate::core::{StepHalt, StepResult};

pub use coverage::{
    collect_references, validate_must_support, validate_profile_conformance,
    validate_reference_resolutions, validate_revinclude,
};
pub use resource::{validate_history_reply, validate_read_reply, validate_vread_reply};
pub use search::{SearchParamDef, SearchParamKind, validate_resource_item, validate_search_reply};

pub const OK_CODES: [u16; 2] = [200, 201];

/// Fails unless the reply status is 200 or 201
pub fn assert_response_ok(reply: &HttpResponse) -> StepResult<()> {
    assert_response_code(reply, &OK_CODES)
}

/// Fails unless the reply status is one of `expected`.
///
/// The failure message carries the OperationOutcome diagnostics of the
/// reply when the server sent one.
pub fn assert_response_code(reply: &HttpResponse, expected: &[u16]) -> StepResult<()> {
    if expected.contains(&reply.status) {
        return Ok(());
    }
    let codes = expected
        .iter()
        .map(u16::to_string)
        .collect::<Vec<_>>()
        .join(", ");
    let diagnostics = operation_outcome_text(reply).unwrap_or_default();
    Err(StepHalt::fail(format!(
        "Bad response code: expected {codes}, but found {}. {diagnostics}",
        reply.status
    )))
}

pub fn assert_response_unauthorized(reply: &HttpResponse) -> StepResult<()> {
    if reply.status == 401 {
        return Ok(());
    }
    Err(StepHalt::fail(format!(
        "Bad response code: expected 401, but found {}",
        reply.status
    )))
}

/// Decodes the reply body and fails unless it is a Bundle
pub fn assert_bundle_response(reply: &HttpResponse) -> StepResult<Value> {
    let resource = reply.resource()?;
    match resource {
        Some(bundle) if resource_type(&bundle) == Some("Bundle") => Ok(bundle),
        Some(other) => Err(StepHalt::fail(format!(
            "Expected FHIR Bundle but found: {}",
            resource_type(&other).unwrap_or("unknown resource")
        ))),
        None => Err(StepHalt::fail("Expected FHIR Bundle but found: no resource")),
    }
}

pub fn resource_type(resource: &Value) -> Option<&str> {
    resource.get("resourceType").and_then(Value::as_str)
}

/// Text of the first OperationOutcome issue in the reply, if any
fn operation_outcome_text(reply: &HttpResponse) -> Option<String> {
    let outcome = reply.resource().ok().flatten()?;
    if resource_type(&outcome) != Some("OperationOutcome") {
        return None;
    }
    let issue = outcome.get("issue")?.as_array()?.first()?;
    issue
        .get("diagnostics")
        .and_then(Value::as_str)
        .or_else(|| issue.pointer("/details/text").and_then(Value::as_str))
        .map(str::to_string)
}
