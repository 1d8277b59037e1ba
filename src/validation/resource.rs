use serde_json::Value;

use super::{assert_bundle_response, assert_response_ok, resource_type};
use crate::bundle;
use crate::client::{FhirClient, HttpResponse};
use crate::core::{StepHalt, StepResult, ensure};

fn sample_id<'a>(sample: &'a Value, kind: &str) -> StepResult<&'a str> {
    sample
        .get("id")
        .and_then(Value::as_str)
        .filter(|id| !id.is_empty())
        .ok_or_else(|| StepHalt::skip(format!("The {kind} resource found by search has no id")))
}

/// Shared checks for a reply that should carry exactly one resource
fn check_single_resource(reply: &HttpResponse, kind: &str, id: &str) -> StepResult<Value> {
    assert_response_ok(reply)?;

    let resource = reply
        .resource()?
        .ok_or_else(|| StepHalt::fail(format!("Expected {kind} resource to be present.")))?;
    ensure(
        resource_type(&resource) == Some(kind),
        format!("Expected resource to be of type {kind}."),
    )?;
    ensure(
        resource.get("id").and_then(Value::as_str) == Some(id),
        format!("Expected resource to contain id: {id}"),
    )?;

    Ok(resource)
}

/// Reads `sample` back by id and checks the reply
pub async fn validate_read_reply(sample: &Value, kind: &str, client: &FhirClient) -> StepResult<Value> {
    let id = sample_id(sample, kind)?;
    let reply = client.read(kind, id).await?;
    check_single_resource(&reply, kind, id)
}

/// Reads the version of `sample` named by `meta.versionId`
pub async fn validate_vread_reply(sample: &Value, kind: &str, client: &FhirClient) -> StepResult<Value> {
    let id = sample_id(sample, kind)?;
    let version_id = sample
        .pointer("/meta/versionId")
        .and_then(Value::as_str)
        .ok_or_else(|| StepHalt::fail(format!("{kind} version_id not returned")))?;

    let reply = client.vread(kind, id, version_id).await?;
    check_single_resource(&reply, kind, id)
}

/// Requests the instance history of `sample`; at least one entry is expected
pub async fn validate_history_reply(sample: &Value, kind: &str, client: &FhirClient) -> StepResult<Value> {
    let id = sample_id(sample, kind)?;
    let reply = client.history(kind, id).await?;

    assert_response_ok(&reply)?;
    let history = assert_bundle_response(&reply)?;
    ensure(
        !bundle::entries(&history).is_empty(),
        format!("No {kind} history entries were returned"),
    )?;

    Ok(history)
}
