//! Resource validation against the base FHIR rules and profiles.
//!
//! Full StructureDefinition validation lives outside this crate; the
//! [`ResourceOracle`] trait is the seam for it. [`BasicResourceOracle`]
//! covers the structural checks a conformance run cannot do without.

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;

use crate::error::{ConformanceError, Result};
use crate::path;

pub const US_CORE_CAREPLAN: &str = "http://hl7.org/fhir/us/core/StructureDefinition/us-core-careplan";
pub const US_CORE_CARETEAM: &str = "http://hl7.org/fhir/us/core/StructureDefinition/us-core-careteam";

const NARRATIVE_STATUSES: [&str; 4] = ["generated", "extensions", "additional", "empty"];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Violation {
    pub path: String,
    pub message: String,
}

impl Violation {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Invalid {}: {}", self.path, self.message)
    }
}

pub trait ResourceOracle: Send + Sync {
    fn validate_against_base_spec(&self, resource: &Value) -> Vec<Violation>;
    fn validate_against_profile(&self, resource: &Value, profile_url: &str) -> Vec<Violation>;
}

/// Profile as a resource type plus the element paths it requires
#[derive(Debug, Clone)]
struct ProfileRequirements {
    resource_type: String,
    required: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct BasicResourceOracle {
    id_pattern: Regex,
    instant_pattern: Regex,
    profiles: HashMap<String, ProfileRequirements>,
}

impl BasicResourceOracle {
    pub fn new() -> Result<Self> {
        let id_pattern = Regex::new(r"^[A-Za-z0-9\-\.]{1,64}$")
            .map_err(|e| ConformanceError::configuration(e.to_string()))?;
        let instant_pattern = Regex::new(
            r"^[0-9]{4}-(0[1-9]|1[0-2])-(0[1-9]|[12][0-9]|3[01])T([01][0-9]|2[0-3]):[0-5][0-9]:([0-5][0-9]|60)(\.[0-9]+)?(Z|[+-]((0[0-9]|1[0-3]):[0-5][0-9]|14:00))$",
        )
        .map_err(|e| ConformanceError::configuration(e.to_string()))?;

        Ok(Self {
            id_pattern,
            instant_pattern,
            profiles: HashMap::new(),
        })
    }

    /// Oracle preloaded with the US Core profiles this crate has sequences for
    pub fn us_core() -> Result<Self> {
        Ok(Self::new()?
            .with_profile(
                US_CORE_CAREPLAN,
                "CarePlan",
                &["text", "text.status", "status", "intent", "category", "subject"],
            )
            .with_profile(
                US_CORE_CARETEAM,
                "CareTeam",
                &["subject", "participant", "participant.role", "participant.member"],
            ))
    }

    pub fn with_profile(mut self, url: &str, resource_type: &str, required: &[&str]) -> Self {
        self.profiles.insert(
            url.to_string(),
            ProfileRequirements {
                resource_type: resource_type.to_string(),
                required: required.iter().map(|p| p.to_string()).collect(),
            },
        );
        self
    }
}

impl ResourceOracle for BasicResourceOracle {
    fn validate_against_base_spec(&self, resource: &Value) -> Vec<Violation> {
        let mut violations = Vec::new();

        let Some(object) = resource.as_object() else {
            violations.push(Violation::new("resource", "expected a JSON object"));
            return violations;
        };

        match object.get("resourceType").and_then(Value::as_str) {
            Some(kind) if !kind.is_empty() => {}
            _ => violations.push(Violation::new("resourceType", "element is missing")),
        }

        match object.get("id") {
            None => {}
            Some(Value::String(id)) if self.id_pattern.is_match(id) => {}
            Some(Value::String(id)) => violations.push(Violation::new(
                "id",
                format!("'{id}' does not match the FHIR id pattern"),
            )),
            Some(other) => violations.push(Violation::new("id", format!("expected a string, found {other}"))),
        }

        if let Some(updated) = path::resolve(resource, "meta.lastUpdated").next() {
            let valid = updated
                .as_str()
                .is_some_and(|raw| self.instant_pattern.is_match(raw));
            if !valid {
                violations.push(Violation::new("meta.lastUpdated", format!("{updated} is not a valid instant")));
            }
        }

        if let Some(status) = path::resolve(resource, "text.status").next() {
            let valid = status
                .as_str()
                .is_some_and(|code| NARRATIVE_STATUSES.contains(&code));
            if !valid {
                violations.push(Violation::new("text.status", format!("{status} is not a narrative status")));
            }
        }

        violations
    }

    fn validate_against_profile(&self, resource: &Value, profile_url: &str) -> Vec<Violation> {
        let mut violations = self.validate_against_base_spec(resource);

        let Some(profile) = self.profiles.get(profile_url) else {
            tracing::warn!("No requirements registered for profile {}", profile_url);
            return violations;
        };

        let actual = resource.get("resourceType").and_then(Value::as_str).unwrap_or_default();
        if actual != profile.resource_type {
            violations.push(Violation::new(
                "resourceType",
                format!("expected {} for profile {}, found '{}'", profile.resource_type, profile_url, actual),
            ));
            return violations;
        }

        for required in &profile.required {
            if !path::has_value(resource, required) {
                violations.push(Violation::new(
                    format!("{}.{}", profile.resource_type, required),
                    "minimum required = 1, but only found 0",
                ));
            }
        }

        violations
    }
}
