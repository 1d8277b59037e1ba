use crate::oracle::US_CORE_CARETEAM;
use crate::sequence::{SequenceDefinition, ValueSweep};
use crate::validation::{SearchParamDef, SearchParamKind};

use super::CAPABILITY_STATEMENT_LINK;

pub const CARE_TEAM_STATUSES: &[&str] = &["proposed", "active", "suspended", "inactive", "entered-in-error"];

const PARAMS: &[SearchParamDef] = &[
    SearchParamDef::new("patient", "subject", "subject.reference", SearchParamKind::Reference).targeting("Patient"),
    SearchParamDef::new("status", "status", "status", SearchParamKind::Token),
];

pub static CARE_TEAM: SequenceDefinition = SequenceDefinition {
    name: "USCoreR4CareTeamSequence",
    title: "CareTeam Tests",
    description: "Verify that CareTeam resources on the FHIR server follow the US Core Implementation Guide",
    resource_type: "CareTeam",
    test_id_prefix: "USCCT",
    profile_url: US_CORE_CARETEAM,
    link: CAPABILITY_STATEMENT_LINK,
    search_params: PARAMS,
    first_search: &["patient", "status"],
    sweep: Some(ValueSweep {
        param: "status",
        values: CARE_TEAM_STATUSES,
    }),
    combo_searches: &[],
    must_support: &[
        "CareTeam.status",
        "CareTeam.subject",
        "CareTeam.participant",
        "CareTeam.participant.role",
        "CareTeam.participant.member",
    ],
};
