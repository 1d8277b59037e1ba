use serde_json::Value;
use std::collections::HashMap;

/// Mutable state shared by the test cases of one sequence run.
///
/// A context belongs to exactly one run. Cases observe every mutation made
/// by the cases before them, which is how a search case hands its sample
/// resource to the read, vread and history cases that follow.
#[derive(Debug, Clone, Default)]
pub struct RunContext {
    pub patient_id: String,
    pub bearer_token: Option<String>,
    pub last_found_resources: Vec<Value>,
    pub resources_found: bool,
    slots: HashMap<String, Value>,
    resource_ids: Vec<(String, String)>,
    warnings: Vec<String>,
}

impl RunContext {
    pub fn new(patient_id: impl Into<String>) -> Self {
        Self {
            patient_id: patient_id.into(),
            ..Default::default()
        }
    }

    pub fn with_bearer_token(mut self, token: impl Into<String>) -> Self {
        self.bearer_token = Some(token.into());
        self
    }

    /// The configured bearer token, ignoring blank values
    pub fn token(&self) -> Option<&str> {
        self.bearer_token
            .as_deref()
            .map(str::trim)
            .filter(|token| !token.is_empty())
    }

    pub fn has_token(&self) -> bool {
        self.token().is_some()
    }

    pub fn set_slot(&mut self, name: impl Into<String>, value: Value) {
        self.slots.insert(name.into(), value);
    }

    pub fn slot(&self, name: &str) -> Option<&Value> {
        self.slots.get(name)
    }

    /// Representative resource of `resource_type` found by an earlier search
    pub fn representative(&self, resource_type: &str) -> Option<&Value> {
        self.slot(&representative_slot(resource_type))
    }

    pub fn set_representative(&mut self, resource_type: &str, resource: Value) {
        self.set_slot(representative_slot(resource_type), resource);
    }

    /// Records the search hits of a sequence and the ids they carry
    pub fn record_found(&mut self, resource_type: &str, resources: Vec<Value>) {
        for resource in &resources {
            if let Some(id) = resource.get("id").and_then(Value::as_str) {
                let entry = (resource_type.to_string(), id.to_string());
                if !self.resource_ids.contains(&entry) {
                    self.resource_ids.push(entry);
                }
            }
        }
        self.resources_found = !resources.is_empty();
        self.last_found_resources = resources;
    }

    pub fn resource_ids(&self, resource_type: &str) -> impl Iterator<Item = &str> {
        self.resource_ids
            .iter()
            .filter(move |(kind, _)| kind == resource_type)
            .map(|(_, id)| id.as_str())
    }

    /// Attaches a non-fatal warning to the case currently running
    pub fn warn(&mut self, message: impl Into<String>) {
        self.warnings.push(message.into());
    }

    pub fn take_warnings(&mut self) -> Vec<String> {
        std::mem::take(&mut self.warnings)
    }
}

fn representative_slot(resource_type: &str) -> String {
    format!("representative:{resource_type}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn blank_token_is_treated_as_missing() {
        let ctx = RunContext::new("example").with_bearer_token("   ");
        assert!(!ctx.has_token());

        let ctx = RunContext::new("example").with_bearer_token("ABC");
        assert_eq!(ctx.token(), Some("ABC"));
    }

    #[test]
    fn record_found_tracks_ids_once() {
        let mut ctx = RunContext::new("example");
        let resources = vec![
            json!({"resourceType": "CarePlan", "id": "a"}),
            json!({"resourceType": "CarePlan", "id": "b"}),
        ];
        ctx.record_found("CarePlan", resources.clone());
        ctx.record_found("CarePlan", resources);

        assert!(ctx.resources_found);
        assert_eq!(ctx.resource_ids("CarePlan").collect::<Vec<_>>(), vec!["a", "b"]);
        assert_eq!(ctx.resource_ids("CareTeam").count(), 0);
    }

    #[test]
    fn warnings_are_drained() {
        let mut ctx = RunContext::new("example");
        ctx.warn("first");
        assert_eq!(ctx.take_warnings(), vec!["first".to_string()]);
        assert!(ctx.take_warnings().is_empty());
    }
}
