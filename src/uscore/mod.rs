//! US Core sequences built from declarative definitions.

pub mod careplan;
pub mod careteam;

use crate::sequence::{Sequence, SequenceDefinition};

pub use careplan::CARE_PLAN;
pub use careteam::CARE_TEAM;

pub const CAPABILITY_STATEMENT_LINK: &str =
    "https://www.hl7.org/fhir/us/core/CapabilityStatement-us-core-server.html";

/// Every definition shipped with the crate
pub fn definitions() -> [&'static SequenceDefinition; 2] {
    [&CARE_PLAN, &CARE_TEAM]
}

/// Looks a sequence up by name (`USCoreR4CarePlanSequence`) or resource type (`CarePlan`)
pub fn sequence(name: &str) -> Option<Sequence> {
    definitions()
        .into_iter()
        .find(|def| def.name.eq_ignore_ascii_case(name) || def.resource_type.eq_ignore_ascii_case(name))
        .map(SequenceDefinition::build)
}
