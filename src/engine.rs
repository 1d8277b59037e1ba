//! Runs the cases of a [`Sequence`] in order against one [`RunContext`].

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use crate::capability::{CapabilityLookup, Interaction};
use crate::core::{CaseResult, FhirVersion, Outcome, RunContext};
use crate::sequence::{Sequence, SequenceEnv, TestCase};

pub const NO_TOKEN_MESSAGE: &str = "Do not test if no bearer token set";

pub struct SequenceRunner {
    env: SequenceEnv,
    capabilities: Arc<dyn CapabilityLookup>,
    fhir_version: FhirVersion,
}

impl std::fmt::Debug for SequenceRunner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SequenceRunner")
            .field("env", &self.env)
            .field("fhir_version", &self.fhir_version)
            .finish()
    }
}

impl SequenceRunner {
    pub fn new(env: SequenceEnv, capabilities: Arc<dyn CapabilityLookup>) -> Self {
        Self {
            env,
            capabilities,
            fhir_version: FhirVersion::default(),
        }
    }

    pub fn with_fhir_version(mut self, version: FhirVersion) -> Self {
        self.fhir_version = version;
        self
    }

    pub fn env(&self) -> &SequenceEnv {
        &self.env
    }

    /// Runs every case; one result per case, in declaration order
    pub async fn run(&self, sequence: &Sequence, ctx: &mut RunContext) -> Vec<CaseResult> {
        self.run_until(sequence, ctx, &AtomicBool::new(false)).await
    }

    /// Like [`run`](Self::run), stopping before the next case once `cancel` is set
    pub async fn run_until(&self, sequence: &Sequence, ctx: &mut RunContext, cancel: &AtomicBool) -> Vec<CaseResult> {
        tracing::info!("Running {} ({} cases)", sequence.name, sequence.len());
        let started = Instant::now();
        let mut results = Vec::with_capacity(sequence.len());

        for case in &sequence.cases {
            if cancel.load(Ordering::SeqCst) {
                tracing::info!("{} cancelled after {} case(s)", sequence.name, results.len());
                break;
            }
            results.push(self.run_case(&sequence.resource_type, case, ctx).await);
        }

        tracing::info!(
            "Finished {} in {:?}: {} passed of {}",
            sequence.name,
            started.elapsed(),
            results.iter().filter(|r| r.outcome.is_pass()).count(),
            results.len()
        );
        results
    }

    /// Gates `case` on capabilities and credentials, then runs its step
    pub async fn run_case(&self, resource_type: &str, case: &TestCase, ctx: &mut RunContext) -> CaseResult {
        tracing::debug!("Starting {} {}", case.id, case.title);
        ctx.take_warnings();

        let outcome = match self.gate(resource_type, case, ctx) {
            Some(outcome) => outcome,
            None => match case.step().run(ctx, &self.env).await {
                Ok(()) => Outcome::Pass,
                Err(halt) => halt.into(),
            },
        };

        match &outcome {
            Outcome::Error(detail) => tracing::warn!("{} errored: {}", case.id, detail),
            other => tracing::info!("{} {}", case.id, other.kind()),
        }

        CaseResult {
            id: case.id.clone(),
            key: case.key.clone(),
            title: case.title.clone(),
            optional: case.optional,
            outcome,
            warnings: ctx.take_warnings(),
        }
    }

    fn gate(&self, resource_type: &str, case: &TestCase, ctx: &RunContext) -> Option<Outcome> {
        if !case.applies_to(self.fhir_version) {
            return Some(Outcome::Omit(format!("Not applicable to FHIR {}", self.fhir_version)));
        }

        let unsupported = case
            .interactions
            .iter()
            .any(|interaction| !self.capabilities.supports(resource_type, *interaction));
        if unsupported {
            return Some(Outcome::Skip(unsupported_message(resource_type, &case.interactions)));
        }

        if case.requires_token && !ctx.has_token() {
            return Some(Outcome::Omit(NO_TOKEN_MESSAGE.to_string()));
        }

        None
    }
}

fn unsupported_message(resource_type: &str, interactions: &[Interaction]) -> String {
    let names = interactions
        .iter()
        .map(Interaction::to_string)
        .collect::<Vec<_>>()
        .join(", ");
    format!(
        "This server does not support {resource_type} {names} operation(s) according to conformance statement."
    )
}
