//! Multi-page search result aggregation.

use serde::Serialize;
use serde_json::Value;
use std::collections::HashSet;

use crate::client::{FhirClient, HttpResponse, SearchParams};
use crate::core::{StepHalt, StepResult};
use crate::validation::{assert_bundle_response, assert_response_ok};

/// Resources carried by `entry[].resource`, in entry order
pub fn entries(bundle: &Value) -> Vec<Value> {
    bundle
        .get("entry")
        .and_then(Value::as_array)
        .map(|entries| {
            entries
                .iter()
                .filter_map(|entry| entry.get("resource").cloned())
                .collect()
        })
        .unwrap_or_default()
}

/// URL of the `next` link, if the bundle has further pages
pub fn next_link(bundle: &Value) -> Option<&str> {
    bundle
        .get("link")?
        .as_array()?
        .iter()
        .find(|link| link.get("relation").and_then(Value::as_str) == Some("next"))?
        .get("url")?
        .as_str()
        .filter(|url| !url.is_empty())
}

/// Follows `next` links from `first_page` and concatenates every page's
/// resources in page order.
///
/// At most `max_pages` pages (the first included) are read. A chain that
/// is longer than that, or that links back to a page already read, ends
/// the step with an error.
pub async fn fetch_all(first_page: &Value, client: &FhirClient, max_pages: usize) -> StepResult<Vec<Value>> {
    let mut resources = entries(first_page);
    let mut visited = HashSet::new();
    let mut pages = 1;
    let mut next = next_link(first_page).map(str::to_string);

    while let Some(url) = next {
        if pages >= max_pages || !visited.insert(url.clone()) {
            tracing::warn!("Stopped following search pages at {} after {} page(s)", url, pages);
            return Err(StepHalt::error("pagination did not terminate"));
        }

        let reply = client.get_url(&url).await?;
        assert_response_ok(&reply)?;
        let page = assert_bundle_response(&reply)?;
        pages += 1;

        resources.extend(entries(&page));
        next = next_link(&page).map(str::to_string);
    }

    tracing::debug!("Collected {} resource(s) over {} page(s)", resources.len(), pages);
    Ok(resources)
}

/// Every resource a search returned across all pages, with the query used
#[derive(Debug, Clone, Default, Serialize)]
pub struct SearchResultSet {
    pub params: SearchParams,
    pub resources: Vec<Value>,
}

impl SearchResultSet {
    /// Checks the first reply, then pages through the rest of the results
    pub async fn collect(
        reply: &HttpResponse,
        params: SearchParams,
        client: &FhirClient,
        max_pages: usize,
    ) -> StepResult<Self> {
        assert_response_ok(reply)?;
        let bundle = assert_bundle_response(reply)?;
        let resources = fetch_all(&bundle, client, max_pages).await?;
        Ok(Self { params, resources })
    }

    pub fn of_type<'a>(&'a self, resource_type: &'a str) -> impl Iterator<Item = &'a Value> + 'a {
        self.resources
            .iter()
            .filter(move |resource| resource.get("resourceType").and_then(Value::as_str) == Some(resource_type))
    }

    pub fn count_of(&self, resource_type: &str) -> usize {
        self.of_type(resource_type).count()
    }

    pub fn param(&self, name: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn entries_skip_entries_without_resources() {
        let bundle = json!({
            "resourceType": "Bundle",
            "entry": [
                {"resource": {"resourceType": "CarePlan", "id": "a"}},
                {"fullUrl": "urn:uuid:1"},
                {"resource": {"resourceType": "Provenance", "id": "p"}}
            ]
        });
        let ids: Vec<_> = entries(&bundle).iter().map(|r| r["id"].clone()).collect();
        assert_eq!(ids, vec![json!("a"), json!("p")]);
        assert!(entries(&json!({"resourceType": "Bundle"})).is_empty());
    }

    #[test]
    fn next_link_ignores_other_relations() {
        let bundle = json!({
            "link": [
                {"relation": "self", "url": "https://fhir.example/CarePlan?page=1"},
                {"relation": "next", "url": "https://fhir.example/CarePlan?page=2"}
            ]
        });
        assert_eq!(next_link(&bundle), Some("https://fhir.example/CarePlan?page=2"));
        assert_eq!(next_link(&json!({"link": [{"relation": "self", "url": "x"}]})), None);
    }

    #[test]
    fn result_set_filters_by_type() {
        let set = SearchResultSet {
            params: vec![("patient".into(), "85".into())],
            resources: vec![
                json!({"resourceType": "CarePlan", "id": "a"}),
                json!({"resourceType": "Provenance", "id": "p"}),
            ],
        };
        assert_eq!(set.count_of("CarePlan"), 1);
        assert_eq!(set.param("patient"), Some("85"));
        assert_eq!(set.param("status"), None);
    }
}
