//! Test cases and the sequences that order them.
//!
//! A [`TestCase`] pairs immutable metadata with a [`TestStep`]. Steps get
//! the mutable [`RunContext`] of the run and a read-only [`SequenceEnv`]
//! holding the server client, the validation oracle and engine limits.

pub mod definition;
pub mod steps;

use async_trait::async_trait;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;

use crate::capability::Interaction;
use crate::client::FhirClient;
use crate::core::{EngineConfig, FhirVersion, RunContext, StepResult};
use crate::oracle::ResourceOracle;

pub use definition::{ComboSearchDef, SequenceDefinition, ValueSweep};

/// Body of a test case
#[async_trait]
pub trait TestStep: Send + Sync {
    async fn run(&self, ctx: &mut RunContext, env: &SequenceEnv) -> StepResult<()>;
}

/// Shared collaborators of a sequence run
#[derive(Clone)]
pub struct SequenceEnv {
    pub client: FhirClient,
    pub oracle: Arc<dyn ResourceOracle>,
    pub engine: EngineConfig,
}

impl fmt::Debug for SequenceEnv {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SequenceEnv")
            .field("client", &self.client)
            .field("engine", &self.engine)
            .finish()
    }
}

impl SequenceEnv {
    pub fn new(client: FhirClient, oracle: Arc<dyn ResourceOracle>) -> Self {
        Self {
            client,
            oracle,
            engine: EngineConfig::default(),
        }
    }

    pub fn with_engine_config(mut self, engine: EngineConfig) -> Self {
        self.engine = engine;
        self
    }

    /// Client carrying the bearer token currently held by `ctx`
    pub fn client_for(&self, ctx: &RunContext) -> FhirClient {
        self.client.clone().with_bearer_token(ctx.token())
    }
}

#[derive(Clone, Serialize)]
pub struct TestCase {
    /// Stable lookup name, e.g. `read_interaction`
    pub key: String,
    /// Display id, e.g. `USCCP-06`
    pub id: String,
    pub title: String,
    pub description: String,
    pub link: Option<String>,
    pub versions: Vec<FhirVersion>,
    pub optional: bool,
    pub interactions: Vec<Interaction>,
    pub requires_token: bool,
    #[serde(skip)]
    step: Arc<dyn TestStep>,
}

impl fmt::Debug for TestCase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TestCase")
            .field("key", &self.key)
            .field("id", &self.id)
            .field("title", &self.title)
            .field("optional", &self.optional)
            .field("interactions", &self.interactions)
            .field("requires_token", &self.requires_token)
            .finish()
    }
}

impl TestCase {
    pub fn new(
        key: impl Into<String>,
        id: impl Into<String>,
        title: impl Into<String>,
        step: impl TestStep + 'static,
    ) -> Self {
        Self {
            key: key.into(),
            id: id.into(),
            title: title.into(),
            description: String::new(),
            link: None,
            versions: vec![FhirVersion::R4],
            optional: false,
            interactions: Vec::new(),
            requires_token: false,
            step: Arc::new(step),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_link(mut self, link: impl Into<String>) -> Self {
        self.link = Some(link.into());
        self
    }

    pub fn with_interactions(mut self, interactions: &[Interaction]) -> Self {
        self.interactions = interactions.to_vec();
        self
    }

    pub fn optional(mut self, optional: bool) -> Self {
        self.optional = optional;
        self
    }

    pub fn requiring_token(mut self) -> Self {
        self.requires_token = true;
        self
    }

    pub fn applies_to(&self, version: FhirVersion) -> bool {
        self.versions.contains(&version)
    }

    pub fn step(&self) -> &dyn TestStep {
        self.step.as_ref()
    }
}

/// Ordered test cases targeting one resource type
#[derive(Debug, Clone, Serialize)]
pub struct Sequence {
    pub name: String,
    pub title: String,
    pub description: String,
    pub resource_type: String,
    pub cases: Vec<TestCase>,
}

impl Sequence {
    pub fn new(name: impl Into<String>, resource_type: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            title: name.clone(),
            name,
            description: String::new(),
            resource_type: resource_type.into(),
            cases: Vec::new(),
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_case(mut self, case: TestCase) -> Self {
        self.cases.push(case);
        self
    }

    pub fn case(&self, key: &str) -> Option<&TestCase> {
        self.cases.iter().find(|case| case.key == key)
    }

    /// Sequence restricted to the cases named in `keys`, keeping their order
    pub fn only(&self, keys: &[&str]) -> Self {
        Self {
            cases: self
                .cases
                .iter()
                .filter(|case| keys.contains(&case.key.as_str()))
                .cloned()
                .collect(),
            ..self.clone()
        }
    }

    pub fn len(&self) -> usize {
        self.cases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cases.is_empty()
    }
}
