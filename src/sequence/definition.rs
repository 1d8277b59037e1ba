//! Declarative description of a per-resource search sequence.
//!
//! A [`SequenceDefinition`] is a static table: which parameters the
//! resource is searched by, which combinations are exercised, the profile
//! and its must-support paths. [`SequenceDefinition::build`] turns it into
//! the ordered test cases of a [`Sequence`].

use crate::capability::Interaction;
use crate::search::SearchPrefix;
use crate::validation::SearchParamDef;

use super::steps::{
    ComboSearch, HistoryInteraction, InitialSearch, MustSupport, ProfileConformance, ReadInteraction,
    ReferenceResolution, RevincludeProvenance, UnauthorizedSearch, VreadInteraction,
};
use super::{Sequence, TestCase};

/// A parameter whose value is taken from a fixed list, one value per request,
/// until a request returns resources
#[derive(Debug, Clone, Copy)]
pub struct ValueSweep {
    pub param: &'static str,
    pub values: &'static [&'static str],
}

#[derive(Debug, Clone, Copy)]
pub struct ComboSearchDef {
    pub params: &'static [&'static str],
    /// Extra requests with the date parameter prefixed by each comparator
    pub comparators: &'static [SearchPrefix],
    pub optional: bool,
}

#[derive(Debug)]
pub struct SequenceDefinition {
    pub name: &'static str,
    pub title: &'static str,
    pub description: &'static str,
    pub resource_type: &'static str,
    /// Prefix of case ids, e.g. `USCCP`
    pub test_id_prefix: &'static str,
    pub profile_url: &'static str,
    pub link: &'static str,
    pub search_params: &'static [SearchParamDef],
    pub first_search: &'static [&'static str],
    pub sweep: Option<ValueSweep>,
    pub combo_searches: &'static [ComboSearchDef],
    pub must_support: &'static [&'static str],
}

impl SequenceDefinition {
    pub fn param(&self, name: &str) -> Option<&SearchParamDef> {
        self.search_params.iter().find(|def| def.name == name)
    }

    /// Builds the ordered cases: unauthorized search, first search, the
    /// combined searches, read, vread, history, Provenance revinclude,
    /// profile conformance, must support and reference resolution.
    pub fn build(&'static self) -> Sequence {
        let kind = self.resource_type;
        let mut number = 0;
        let mut next_id = || {
            number += 1;
            format!("{}-{:02}", self.test_id_prefix, number)
        };

        let mut sequence = Sequence::new(self.name, kind)
            .with_title(self.title)
            .with_description(self.description);

        sequence = sequence.with_case(
            TestCase::new(
                "unauthorized_search",
                next_id(),
                format!("Server rejects {kind} search without authorization"),
                UnauthorizedSearch { def: self },
            )
            .with_description("A server SHALL reject any unauthorized requests by returning an HTTP 401 unauthorized response code.")
            .with_link("http://hl7.org/fhir/us/core/CapabilityStatement/us-core-server")
            .with_interactions(&[Interaction::Search])
            .requiring_token(),
        );

        sequence = sequence.with_case(
            TestCase::new(
                format!("search_by_{}", self.first_search.join("_")),
                next_id(),
                format!("Server returns expected results from {kind} search by {}", self.first_search.join("+")),
                InitialSearch { def: self },
            )
            .with_description(format!(
                "A server SHALL support searching by {} on the {kind} resource.",
                self.first_search.join("+")
            ))
            .with_link(self.link)
            .with_interactions(&[Interaction::Search]),
        );

        for combo in self.combo_searches {
            sequence = sequence.with_case(
                TestCase::new(
                    format!("search_by_{}", combo.params.join("_")),
                    next_id(),
                    format!("Server returns expected results from {kind} search by {}", combo.params.join("+")),
                    ComboSearch { def: self, combo },
                )
                .with_description(format!(
                    "A server SHOULD support searching by {} on the {kind} resource.",
                    combo.params.join("+")
                ))
                .with_link(self.link)
                .with_interactions(&[Interaction::Search])
                .optional(combo.optional),
            );
        }

        sequence
            .with_case(
                TestCase::new(
                    "read_interaction",
                    next_id(),
                    format!("Server returns correct {kind} resource from {kind} read interaction"),
                    ReadInteraction { def: self },
                )
                .with_description(format!("A server SHALL support the {kind} read interaction."))
                .with_link(self.link)
                .with_interactions(&[Interaction::Read]),
            )
            .with_case(
                TestCase::new(
                    "vread_interaction",
                    next_id(),
                    format!("Server returns correct {kind} resource from {kind} vread interaction"),
                    VreadInteraction { def: self },
                )
                .with_description(format!("A server SHOULD support the {kind} vread interaction."))
                .with_link(self.link)
                .with_interactions(&[Interaction::Vread])
                .optional(true),
            )
            .with_case(
                TestCase::new(
                    "history_interaction",
                    next_id(),
                    format!("Server returns correct {kind} resource from {kind} history interaction"),
                    HistoryInteraction { def: self },
                )
                .with_description(format!("A server SHOULD support the {kind} history interaction."))
                .with_link(self.link)
                .with_interactions(&[Interaction::History])
                .optional(true),
            )
            .with_case(
                TestCase::new(
                    "provenance_revinclude",
                    next_id(),
                    format!("Server returns Provenance resources from {kind} search by {} + _revinclude=Provenance:target", self.first_search.join("+")),
                    RevincludeProvenance { def: self },
                )
                .with_description("A server SHALL be capable of supporting _revIncludes:Provenance:target.")
                .with_link("https://www.hl7.org/fhir/search.html#revinclude")
                .with_interactions(&[Interaction::Search]),
            )
            .with_case(
                TestCase::new(
                    "profile_conformance",
                    next_id(),
                    format!("{kind} resources returned from previous search conform to the {} profile.", self.title),
                    ProfileConformance { def: self },
                )
                .with_description(format!(
                    "This test verifies resources returned from the first search conform to the profile ({}).",
                    self.profile_url
                ))
                .with_link(self.profile_url),
            )
            .with_case(
                TestCase::new(
                    "must_support",
                    next_id(),
                    format!("All must support elements are provided in the {kind} resources returned."),
                    MustSupport { def: self },
                )
                .with_description(
                    "Servers SHALL be capable of populating all data elements as part of the query results. \
                     This test passes once every must support element has been seen in at least one resource.",
                )
                .with_link("http://www.hl7.org/fhir/us/core/general-guidance.html#must-support"),
            )
            .with_case(
                TestCase::new(
                    "reference_resolution",
                    next_id(),
                    format!("Every reference within {kind} resources can be read."),
                    ReferenceResolution { def: self },
                )
                .with_description("This test will attempt to read the first 50 references found in the resources from the first search.")
                .with_link("http://hl7.org/fhir/references.html")
                .with_interactions(&[Interaction::Read]),
            )
    }
}
