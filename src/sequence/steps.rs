//! Step bodies of a declarative search sequence.

use async_trait::async_trait;
use serde_json::{Value, json};

use super::definition::{ComboSearchDef, SequenceDefinition};
use super::{SequenceEnv, TestStep};
use crate::bundle::SearchResultSet;
use crate::client::SearchParams;
use crate::core::{RunContext, StepHalt, StepResult, skip_unless};
use crate::path;
use crate::search::{comparator_value, representative_value, value_for_search_param};
use crate::validation::{
    SearchParamKind, assert_response_unauthorized, validate_history_reply, validate_must_support,
    validate_profile_conformance, validate_read_reply, validate_reference_resolutions,
    validate_revinclude, validate_search_reply, validate_vread_reply,
};

fn no_resources(kind: &str) -> String {
    format!("No {kind} resources appear to be available. Please use patients with more information.")
}

fn require_found(ctx: &RunContext, kind: &str) -> StepResult<()> {
    skip_unless(ctx.resources_found, no_resources(kind))
}

fn representative<'a>(ctx: &'a RunContext, kind: &str) -> StepResult<&'a Value> {
    ctx.representative(kind)
        .ok_or_else(|| StepHalt::skip(no_resources(kind)))
}

fn search_params_slot(kind: &str) -> String {
    format!("search_params:{kind}")
}

/// Query value for `name`: the patient id for `patient`, otherwise derived
/// from the representative resource
fn query_value(def: &SequenceDefinition, name: &str, ctx: &RunContext, sample: Option<&Value>) -> StepResult<String> {
    if name == "patient" {
        return Ok(ctx.patient_id.clone());
    }
    let unresolved = || StepHalt::skip(format!("Could not resolve {name} in given resource."));
    let param = def.param(name).ok_or_else(unresolved)?;
    let sample = sample.ok_or_else(unresolved)?;
    value_for_search_param(path::resolve(sample, param.path)).ok_or_else(unresolved)
}

/// Runs one search and checks every page of the reply
async fn search_and_validate(
    def: &SequenceDefinition,
    params: SearchParams,
    ctx: &RunContext,
    env: &SequenceEnv,
) -> StepResult<SearchResultSet> {
    let client = env.client_for(ctx);
    let reply = client.search(def.resource_type, &params).await?;
    let results = SearchResultSet::collect(&reply, params, &client, env.engine.max_pages).await?;
    validate_search_reply(&results, def.resource_type, def.search_params, env.oracle.as_ref())?;
    Ok(results)
}

pub struct UnauthorizedSearch {
    pub def: &'static SequenceDefinition,
}

#[async_trait]
impl TestStep for UnauthorizedSearch {
    async fn run(&self, ctx: &mut RunContext, env: &SequenceEnv) -> StepResult<()> {
        let mut params = SearchParams::new();
        for name in self.def.first_search {
            let value = match self.def.sweep {
                Some(sweep) if sweep.param == *name => sweep.values.first().map(|v| v.to_string()),
                _ if *name == "patient" => Some(ctx.patient_id.clone()),
                _ => None,
            };
            if let Some(value) = value {
                params.push((name.to_string(), value));
            }
        }

        let reply = env
            .client
            .without_auth()
            .search(self.def.resource_type, &params)
            .await?;
        assert_response_unauthorized(&reply)
    }
}

/// First search of the sequence; its hits feed every later case
pub struct InitialSearch {
    pub def: &'static SequenceDefinition,
}

impl InitialSearch {
    fn candidate_queries(&self, ctx: &RunContext) -> Vec<SearchParams> {
        let base: SearchParams = self
            .def
            .first_search
            .iter()
            .filter(|name| **name == "patient")
            .map(|name| (name.to_string(), ctx.patient_id.clone()))
            .collect();

        match self.def.sweep {
            Some(sweep) => sweep
                .values
                .iter()
                .map(|value| {
                    let mut params = base.clone();
                    params.push((sweep.param.to_string(), value.to_string()));
                    params
                })
                .collect(),
            None => vec![base],
        }
    }
}

#[async_trait]
impl TestStep for InitialSearch {
    async fn run(&self, ctx: &mut RunContext, env: &SequenceEnv) -> StepResult<()> {
        let kind = self.def.resource_type;
        let client = env.client_for(ctx);

        for params in self.candidate_queries(ctx) {
            let reply = client.search(kind, &params).await?;
            let results = SearchResultSet::collect(&reply, params, &client, env.engine.max_pages).await?;
            if results.count_of(kind) == 0 {
                tracing::debug!("No {} resources for {:?}", kind, results.params);
                continue;
            }

            let found: Vec<Value> = results.of_type(kind).cloned().collect();
            if let Some(first) = found.first() {
                ctx.set_representative(kind, first.clone());
            }
            ctx.record_found(kind, found);
            ctx.set_slot(search_params_slot(kind), json!(results.params));

            return validate_search_reply(&results, kind, self.def.search_params, env.oracle.as_ref());
        }

        Err(StepHalt::skip(no_resources(kind)))
    }
}

pub struct ComboSearch {
    pub def: &'static SequenceDefinition,
    pub combo: &'static ComboSearchDef,
}

#[async_trait]
impl TestStep for ComboSearch {
    async fn run(&self, ctx: &mut RunContext, env: &SequenceEnv) -> StepResult<()> {
        let kind = self.def.resource_type;
        require_found(ctx, kind)?;
        let sample = representative(ctx, kind)?;

        let mut params = SearchParams::new();
        for name in self.combo.params {
            params.push((name.to_string(), query_value(self.def, name, ctx, Some(sample))?));
        }
        search_and_validate(self.def, params.clone(), ctx, env).await?;

        let date_param = self
            .combo
            .params
            .iter()
            .filter_map(|name| self.def.param(name))
            .find(|param| param.kind == SearchParamKind::Date);
        let Some(date_param) = date_param else {
            return Ok(());
        };
        let Some((baseline, _)) = representative_value(path::resolve(sample, date_param.path)) else {
            return Ok(());
        };

        for comparator in self.combo.comparators {
            let Some(value) = comparator_value(*comparator, baseline) else {
                continue;
            };
            let mut prefixed = params.clone();
            if let Some(slot) = prefixed.iter_mut().find(|(name, _)| name == date_param.name) {
                slot.1 = value;
            }
            search_and_validate(self.def, prefixed, ctx, env).await?;
        }

        Ok(())
    }
}

fn read_skip(kind: &str) -> String {
    format!("No {kind} resources could be found for this patient. Please use patients with more information.")
}

pub struct ReadInteraction {
    pub def: &'static SequenceDefinition,
}

#[async_trait]
impl TestStep for ReadInteraction {
    async fn run(&self, ctx: &mut RunContext, env: &SequenceEnv) -> StepResult<()> {
        let kind = self.def.resource_type;
        skip_unless(ctx.resources_found, read_skip(kind))?;
        let sample = ctx
            .representative(kind)
            .ok_or_else(|| StepHalt::skip(read_skip(kind)))?;

        validate_read_reply(sample, kind, &env.client_for(ctx)).await?;
        Ok(())
    }
}

pub struct VreadInteraction {
    pub def: &'static SequenceDefinition,
}

#[async_trait]
impl TestStep for VreadInteraction {
    async fn run(&self, ctx: &mut RunContext, env: &SequenceEnv) -> StepResult<()> {
        let kind = self.def.resource_type;
        skip_unless(ctx.resources_found, read_skip(kind))?;
        let sample = ctx
            .representative(kind)
            .ok_or_else(|| StepHalt::skip(read_skip(kind)))?;

        validate_vread_reply(sample, kind, &env.client_for(ctx)).await?;
        Ok(())
    }
}

pub struct HistoryInteraction {
    pub def: &'static SequenceDefinition,
}

#[async_trait]
impl TestStep for HistoryInteraction {
    async fn run(&self, ctx: &mut RunContext, env: &SequenceEnv) -> StepResult<()> {
        let kind = self.def.resource_type;
        skip_unless(ctx.resources_found, read_skip(kind))?;
        let sample = ctx
            .representative(kind)
            .ok_or_else(|| StepHalt::skip(read_skip(kind)))?;

        validate_history_reply(sample, kind, &env.client_for(ctx)).await?;
        Ok(())
    }
}

/// Repeats the successful first search with `_revinclude=Provenance:target`
pub struct RevincludeProvenance {
    pub def: &'static SequenceDefinition,
}

#[async_trait]
impl TestStep for RevincludeProvenance {
    async fn run(&self, ctx: &mut RunContext, env: &SequenceEnv) -> StepResult<()> {
        let kind = self.def.resource_type;
        require_found(ctx, kind)?;

        let mut params: SearchParams = match ctx.slot(&search_params_slot(kind)) {
            Some(saved) => serde_json::from_value(saved.clone())
                .map_err(|err| StepHalt::error(format!("Saved search parameters are unreadable: {err}")))?,
            None => vec![("patient".to_string(), ctx.patient_id.clone())],
        };
        params.push(("_revinclude".to_string(), "Provenance:target".to_string()));

        let client = env.client_for(ctx);
        let reply = client.search(kind, &params).await?;
        let results = SearchResultSet::collect(&reply, params, &client, env.engine.max_pages).await?;
        validate_revinclude(&results)
    }
}

pub struct ProfileConformance {
    pub def: &'static SequenceDefinition,
}

#[async_trait]
impl TestStep for ProfileConformance {
    async fn run(&self, ctx: &mut RunContext, env: &SequenceEnv) -> StepResult<()> {
        require_found(ctx, self.def.resource_type)?;
        validate_profile_conformance(&ctx.last_found_resources, self.def.profile_url, env.oracle.as_ref())
    }
}

pub struct MustSupport {
    pub def: &'static SequenceDefinition,
}

#[async_trait]
impl TestStep for MustSupport {
    async fn run(&self, ctx: &mut RunContext, _env: &SequenceEnv) -> StepResult<()> {
        let kind = self.def.resource_type;
        require_found(ctx, kind)?;
        validate_must_support(&ctx.last_found_resources, kind, self.def.must_support)
    }
}

pub struct ReferenceResolution {
    pub def: &'static SequenceDefinition,
}

#[async_trait]
impl TestStep for ReferenceResolution {
    async fn run(&self, ctx: &mut RunContext, env: &SequenceEnv) -> StepResult<()> {
        let kind = self.def.resource_type;
        require_found(ctx, kind)?;
        let sample = representative(ctx, kind)?;
        validate_reference_resolutions(sample, &env.client_for(ctx), env.engine.max_reference_checks).await
    }
}
