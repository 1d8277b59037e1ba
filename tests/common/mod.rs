use async_trait::async_trait;
use octofhir_conformance::*;
use serde_json::{Value, json};
use std::sync::{Arc, Mutex};

pub const BASE_URL: &str = "http://www.example.com/fhir";
pub const PATIENT_ID: &str = "85";

type Handler = Box<dyn Fn(&HttpRequest) -> Option<HttpResponse> + Send + Sync>;

/// In-memory server: handlers are tried in registration order and the
/// first one that answers wins. Unanswered requests get a 404.
#[derive(Default)]
pub struct ScriptedServer {
    handlers: Mutex<Vec<Handler>>,
    requests: Mutex<Vec<HttpRequest>>,
}

#[allow(dead_code)]
impl ScriptedServer {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn respond<F>(&self, handler: F)
    where
        F: Fn(&HttpRequest) -> Option<HttpResponse> + Send + Sync + 'static,
    {
        self.handlers.lock().unwrap().push(Box::new(handler));
    }

    /// Answers every request whose full URL contains `fragment`
    pub fn on(&self, fragment: &str, response: HttpResponse) {
        let fragment = fragment.to_string();
        self.respond(move |request| {
            let url = request.full_url().ok()?;
            url.as_str().contains(&fragment).then(|| response.clone())
        });
    }

    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn requests_to(&self, fragment: &str) -> Vec<HttpRequest> {
        self.requests()
            .into_iter()
            .filter(|request| request.url.contains(fragment))
            .collect()
    }
}

#[async_trait]
impl ServerClient for ScriptedServer {
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse> {
        self.requests.lock().unwrap().push(request.clone());
        let handlers = self.handlers.lock().unwrap();
        Ok(handlers
            .iter()
            .find_map(|handler| handler(&request))
            .unwrap_or_else(|| HttpResponse::new(404, "")))
    }
}

#[allow(dead_code)]
pub fn client(server: &Arc<ScriptedServer>) -> FhirClient {
    FhirClient::new(BASE_URL, server.clone())
}

#[allow(dead_code)]
pub fn runner(server: &Arc<ScriptedServer>, capabilities: StaticCapabilities) -> SequenceRunner {
    let oracle = BasicResourceOracle::us_core().unwrap();
    let env = SequenceEnv::new(client(server), Arc::new(oracle));
    SequenceRunner::new(env, Arc::new(capabilities))
}

#[allow(dead_code)]
pub fn context() -> RunContext {
    RunContext::new(PATIENT_ID).with_bearer_token("SAMPLE_TOKEN")
}

#[allow(dead_code)]
pub fn bundle(resources: &[Value]) -> Value {
    json!({
        "resourceType": "Bundle",
        "type": "searchset",
        "entry": resources.iter().map(|r| json!({"resource": r})).collect::<Vec<_>>()
    })
}

#[allow(dead_code)]
pub fn paged_bundle(resources: &[Value], next: Option<&str>) -> Value {
    let mut page = bundle(resources);
    if let Some(next) = next {
        page["link"] = json!([{"relation": "next", "url": next}]);
    }
    page
}

#[allow(dead_code)]
pub fn care_team(id: &str, status: &str) -> Value {
    json!({
        "resourceType": "CareTeam",
        "id": id,
        "meta": {"versionId": "1", "lastUpdated": "2019-05-01T10:00:00+00:00"},
        "status": status,
        "subject": {"reference": format!("Patient/{PATIENT_ID}")},
        "participant": [{
            "role": [{"coding": [{"code": "223366009"}]}],
            "member": {"reference": "Practitioner/p1"}
        }]
    })
}

#[allow(dead_code)]
pub fn care_plan(id: &str) -> Value {
    json!({
        "resourceType": "CarePlan",
        "id": id,
        "meta": {"versionId": "3", "lastUpdated": "2019-05-01T10:00:00Z"},
        "text": {"status": "generated", "div": "<div xmlns=\"http://www.w3.org/1999/xhtml\">Plan</div>"},
        "status": "active",
        "intent": "plan",
        "category": [{"coding": [{"system": "http://hl7.org/fhir/us/core/CodeSystem/careplan-category", "code": "assess-plan"}]}],
        "subject": {"reference": format!("Patient/{PATIENT_ID}")},
        "period": {"start": "2019-03-01", "end": "2019-03-31"}
    })
}

/// Query value of `name` in a recorded request
#[allow(dead_code)]
pub fn query_param<'a>(request: &'a HttpRequest, name: &str) -> Option<&'a str> {
    request
        .query
        .iter()
        .find(|(key, _)| key == name)
        .map(|(_, value)| value.as_str())
}
