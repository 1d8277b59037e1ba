//! Checks spanning every resource a sequence found.

use serde_json::Value;

use super::resource_type;
use crate::bundle::SearchResultSet;
use crate::client::FhirClient;
use crate::core::{StepHalt, StepResult, ensure, skip_unless};
use crate::oracle::ResourceOracle;
use crate::path;

/// Every must-support path has to be populated in at least one resource.
///
/// Paths may carry the resource type prefix (`CarePlan.text.status`) and
/// are checked in order; the first one no resource populates skips the
/// case, since the sample data may simply not exercise it.
pub fn validate_must_support(resources: &[Value], kind: &str, paths: &[&str]) -> StepResult<()> {
    for must_support in paths {
        let relative = path::strip_resource_prefix(must_support, kind);
        let found = resources.iter().any(|resource| path::has_value(resource, relative));
        skip_unless(
            found,
            format!(
                "Could not find {must_support} in any of the {} provided {kind} resource(s)",
                resources.len()
            ),
        )?;
    }

    tracing::debug!("All {} must support element(s) found", paths.len());
    Ok(())
}

/// Every string found under a `reference` key, in document order
pub fn collect_references(resource: &Value) -> Vec<&str> {
    let mut found = Vec::new();
    let mut stack = vec![resource];

    while let Some(node) = stack.pop() {
        match node {
            Value::Object(fields) => {
                if let Some(reference) = fields.get("reference").and_then(Value::as_str) {
                    found.push(reference);
                }
                stack.extend(fields.values().rev());
            }
            Value::Array(items) => stack.extend(items.iter().rev()),
            _ => {}
        }
    }

    found
}

/// Splits a relative literal reference into `(type, id)`
fn relative_target(reference: &str) -> Option<(&str, &str)> {
    if reference.starts_with('#') || reference.contains("://") || reference.starts_with("urn:") {
        return None;
    }
    let mut segments = reference.split('/');
    let kind = segments.next().filter(|s| !s.is_empty())?;
    let id = segments.next().filter(|s| !s.is_empty())?;
    Some((kind, id))
}

/// Reads every relative reference of `resource` and fails when any of them
/// cannot be read back with the referenced type.
///
/// Contained (`#id`) and absolute references are not followed; at most
/// `max_checks` references are read.
pub async fn validate_reference_resolutions(
    resource: &Value,
    client: &FhirClient,
    max_checks: usize,
) -> StepResult<()> {
    let mut targets: Vec<(&str, &str, &str)> = Vec::new();
    for reference in collect_references(resource) {
        if let Some((kind, id)) = relative_target(reference) {
            if !targets.iter().any(|(_, k, i)| *k == kind && *i == id) {
                targets.push((reference, kind, id));
            }
        }
    }

    if targets.len() > max_checks {
        tracing::info!("Checking {} of {} references", max_checks, targets.len());
        targets.truncate(max_checks);
    }

    let mut unresolved = Vec::new();
    for (reference, kind, id) in targets {
        let resolved = match client.read(kind, id).await {
            Ok(reply) if reply.is_success() => reply
                .resource()
                .ok()
                .flatten()
                .is_some_and(|target| resource_type(&target) == Some(kind)),
            Ok(reply) => {
                tracing::debug!("{} answered {}", reference, reply.status);
                false
            }
            Err(err) => {
                tracing::debug!("{} could not be read: {}", reference, err);
                false
            }
        };
        if !resolved {
            unresolved.push(reference);
        }
    }

    ensure(
        unresolved.is_empty(),
        format!("The following references could not be resolved: {}", unresolved.join(", ")),
    )
}

/// A `_revinclude=Provenance:target` search must return Provenance entries
pub fn validate_revinclude(results: &SearchResultSet) -> StepResult<()> {
    ensure(
        results.count_of("Provenance") > 0,
        "No Provenance resources were returned from this search",
    )
}

/// Fails on the first resource that violates `profile_url`
pub fn validate_profile_conformance(
    resources: &[Value],
    profile_url: &str,
    oracle: &dyn ResourceOracle,
) -> StepResult<()> {
    for resource in resources {
        if let Some(violation) = oracle.validate_against_profile(resource, profile_url).into_iter().next() {
            let kind = resource_type(resource).unwrap_or("Resource");
            let id = resource.get("id").and_then(Value::as_str).unwrap_or("unknown");
            return Err(StepHalt::fail(format!("{kind}/{id}: {violation}")));
        }
    }
    Ok(())
}
