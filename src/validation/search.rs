use serde::Serialize;
use serde_json::Value;

use crate::bundle::SearchResultSet;
use crate::core::{StepHalt, StepResult, skip_unless};
use crate::oracle::ResourceOracle;
use crate::path;
use crate::search::{DateRange, DateSearch, value_for_search_param};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchParamKind {
    Token,
    Reference,
    Date,
    String,
}

/// A search parameter a sequence exercises.
///
/// `path` is the element a query value is derived from; `value_path` is
/// what returned resources are compared on. Reference parameters may name
/// the resource type they point at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SearchParamDef {
    pub name: &'static str,
    pub path: &'static str,
    pub value_path: &'static str,
    pub kind: SearchParamKind,
    pub target: Option<&'static str>,
}

impl SearchParamDef {
    pub const fn new(name: &'static str, path: &'static str, value_path: &'static str, kind: SearchParamKind) -> Self {
        Self {
            name,
            path,
            value_path,
            kind,
            target: None,
        }
    }

    pub const fn targeting(mut self, resource_type: &'static str) -> Self {
        self.target = Some(resource_type);
        self
    }
}

/// Checks the aggregated results of one search.
///
/// The search must have returned at least one `resource_type` entry; each
/// of them must pass the base checks of `oracle` and match every query
/// parameter that has a definition in `params`.
pub fn validate_search_reply(
    results: &SearchResultSet,
    resource_type: &str,
    params: &[SearchParamDef],
    oracle: &dyn ResourceOracle,
) -> StepResult<()> {
    skip_unless(
        results.count_of(resource_type) > 0,
        format!("No {resource_type} resources appear to be available. Please use patients with more information."),
    )?;

    for resource in results.of_type(resource_type) {
        if let Some(violation) = oracle.validate_against_base_spec(resource).into_iter().next() {
            return Err(StepHalt::fail(violation.to_string()));
        }

        for (name, value) in &results.params {
            if let Some(def) = params.iter().find(|def| def.name == name) {
                validate_resource_item(resource, def, value)?;
            }
        }
    }

    Ok(())
}

/// Fails unless `resource` matches `value` for the parameter `def`
pub fn validate_resource_item(resource: &Value, def: &SearchParamDef, value: &str) -> StepResult<()> {
    let matched = match def.kind {
        SearchParamKind::Token => token_matches(resource, def.value_path, value),
        SearchParamKind::Reference => reference_matches(resource, def, value),
        SearchParamKind::String => string_matches(resource, def.value_path, value),
        SearchParamKind::Date => date_matches(resource, def, value)?,
    };

    if matched {
        Ok(())
    } else {
        Err(StepHalt::fail(format!(
            "{name} on resource does not match {name} requested",
            name = def.name
        )))
    }
}

/// Comma separated alternatives; `system|code` compares the code
fn token_matches(resource: &Value, value_path: &str, value: &str) -> bool {
    value.split(',').any(|wanted| {
        let code = wanted.rsplit('|').next().unwrap_or(wanted);
        path::exists(resource, value_path, |found| match found {
            Value::String(s) => s == code,
            Value::Bool(b) => b.to_string() == code,
            other => value_for_search_param([other]).as_deref() == Some(code),
        })
    })
}

/// Bare id, `Type/id`, or an absolute URL ending in `/Type/id`.
///
/// Without a target type any `Type/id` form is accepted.
fn reference_matches(resource: &Value, def: &SearchParamDef, value: &str) -> bool {
    let typed = def.target.map(|target| format!("{target}/{value}"));
    path::exists(resource, def.value_path, |found| {
        let Some(reference) = found.as_str() else {
            return false;
        };
        if reference == value {
            return true;
        }
        match &typed {
            Some(typed) => {
                reference == typed
                    || (reference.contains("://") && reference.ends_with(&format!("/{typed}")))
            }
            None => reference
                .rsplit_once('/')
                .is_some_and(|(_, id)| id == value),
        }
    })
}

/// Every date element the path reaches must be readable; any of them may match
fn date_matches(resource: &Value, def: &SearchParamDef, value: &str) -> StepResult<bool> {
    let search = DateSearch::parse(value)
        .ok_or_else(|| StepHalt::error(format!("Cannot interpret {} search value '{value}'", def.name)))?;

    let mut matched = false;
    for element in path::resolve(resource, def.value_path) {
        let range = DateRange::from_element(element).ok_or_else(|| {
            StepHalt::error(format!("Cannot interpret {} value {element} on resource", def.name))
        })?;
        matched |= search.matches(&range);
    }
    Ok(matched)
}

fn string_matches(resource: &Value, value_path: &str, value: &str) -> bool {
    let wanted = value.to_lowercase();
    path::resolve(resource, value_path)
        .filter_map(|found| value_for_search_param([found]))
        .any(|found| found.to_lowercase().starts_with(&wanted))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const CATEGORY: SearchParamDef =
        SearchParamDef::new("category", "category", "category.coding.code", SearchParamKind::Token);
    const PATIENT: SearchParamDef =
        SearchParamDef::new("patient", "subject", "subject.reference", SearchParamKind::Reference).targeting("Patient");
    const DATE: SearchParamDef = SearchParamDef::new("date", "period", "period", SearchParamKind::Date);
    const NAME: SearchParamDef = SearchParamDef::new("name", "name", "name", SearchParamKind::String);

    fn care_plan() -> Value {
        json!({
            "resourceType": "CarePlan",
            "id": "cp1",
            "status": "active",
            "category": [{"coding": [{"system": "http://hl7.org/fhir/us/core/CodeSystem/careplan-category", "code": "assess-plan"}]}],
            "subject": {"reference": "Patient/85"},
            "period": {"start": "2019-03-01", "end": "2019-03-31"},
            "name": [{"family": "Shaw"}]
        })
    }

    #[test]
    fn token_accepts_alternatives_and_systems() {
        let resource = care_plan();
        assert!(validate_resource_item(&resource, &CATEGORY, "assess-plan").is_ok());
        assert!(validate_resource_item(&resource, &CATEGORY, "other,assess-plan").is_ok());
        assert!(
            validate_resource_item(&resource, &CATEGORY, "http://hl7.org/fhir/us/core/CodeSystem/careplan-category|assess-plan")
                .is_ok()
        );
        assert_eq!(
            validate_resource_item(&resource, &CATEGORY, "longitudinal").unwrap_err(),
            StepHalt::fail("category on resource does not match category requested")
        );
    }

    #[test]
    fn reference_accepts_bare_and_typed_ids() {
        let resource = care_plan();
        assert!(validate_resource_item(&resource, &PATIENT, "85").is_ok());
        assert!(validate_resource_item(&resource, &PATIENT, "Patient/85").is_ok());
        assert!(validate_resource_item(&resource, &PATIENT, "8").is_err());
    }

    #[test]
    fn reference_rejects_other_target_types() {
        for reference in ["Group/85", "Practitioner/85", "http://other.example/fhir/Device/85"] {
            let resource = json!({"resourceType": "CarePlan", "subject": {"reference": reference}});
            assert_eq!(
                validate_resource_item(&resource, &PATIENT, "85").unwrap_err(),
                StepHalt::fail("patient on resource does not match patient requested"),
                "{reference}"
            );
        }

        let absolute = json!({"subject": {"reference": "http://www.example.com/fhir/Patient/85"}});
        assert!(validate_resource_item(&absolute, &PATIENT, "85").is_ok());
        let bare = json!({"subject": {"reference": "85"}});
        assert!(validate_resource_item(&bare, &PATIENT, "85").is_ok());
    }

    #[test]
    fn date_uses_period_semantics() {
        let resource = care_plan();
        assert!(validate_resource_item(&resource, &DATE, "gt2019-02-28").is_ok());
        assert!(validate_resource_item(&resource, &DATE, "le2019-03-31").is_ok());
        assert!(validate_resource_item(&resource, &DATE, "gt2019-04-01").is_err());
        assert!(validate_resource_item(&resource, &DATE, "lt2019-03-01").is_err());
        assert!(matches!(
            validate_resource_item(&resource, &DATE, "gtyesterday"),
            Err(StepHalt::Error(_))
        ));
    }

    #[test]
    fn unreadable_date_on_resource_is_an_error() {
        let mut resource = care_plan();
        resource["period"] = json!({"start": "March 1st", "end": "2019-03-31"});
        assert!(matches!(
            validate_resource_item(&resource, &DATE, "gt2019-02-28"),
            Err(StepHalt::Error(_))
        ));

        resource.as_object_mut().unwrap().remove("period");
        assert_eq!(
            validate_resource_item(&resource, &DATE, "gt2019-02-28").unwrap_err(),
            StepHalt::fail("date on resource does not match date requested")
        );
    }

    #[test]
    fn string_is_case_insensitive_prefix() {
        let resource = care_plan();
        assert!(validate_resource_item(&resource, &NAME, "sha").is_ok());
        assert!(validate_resource_item(&resource, &NAME, "haw").is_err());
    }
}
