use crate::oracle::US_CORE_CAREPLAN;
use crate::search::SearchPrefix;
use crate::sequence::{ComboSearchDef, SequenceDefinition, ValueSweep};
use crate::validation::{SearchParamDef, SearchParamKind};

use super::CAPABILITY_STATEMENT_LINK;

const PARAMS: &[SearchParamDef] = &[
    SearchParamDef::new("category", "category", "category.coding.code", SearchParamKind::Token),
    SearchParamDef::new("date", "period", "period", SearchParamKind::Date),
    SearchParamDef::new("patient", "subject", "subject.reference", SearchParamKind::Reference).targeting("Patient"),
    SearchParamDef::new("status", "status", "status", SearchParamKind::Token),
];

const DATE_COMPARATORS: &[SearchPrefix] = &[SearchPrefix::Gt, SearchPrefix::Lt, SearchPrefix::Le];

pub static CARE_PLAN: SequenceDefinition = SequenceDefinition {
    name: "USCoreR4CarePlanSequence",
    title: "CarePlan Tests",
    description: "Verify that CarePlan resources on the FHIR server follow the US Core Implementation Guide",
    resource_type: "CarePlan",
    test_id_prefix: "USCCP",
    profile_url: US_CORE_CAREPLAN,
    link: CAPABILITY_STATEMENT_LINK,
    search_params: PARAMS,
    first_search: &["patient", "category"],
    sweep: Some(ValueSweep {
        param: "category",
        values: &["assess-plan"],
    }),
    combo_searches: &[
        ComboSearchDef {
            params: &["patient", "category", "date"],
            comparators: DATE_COMPARATORS,
            optional: true,
        },
        ComboSearchDef {
            params: &["patient", "category", "status", "date"],
            comparators: DATE_COMPARATORS,
            optional: true,
        },
        ComboSearchDef {
            params: &["patient", "category", "status"],
            comparators: &[],
            optional: true,
        },
    ],
    must_support: &[
        "CarePlan.text",
        "CarePlan.text.status",
        "CarePlan.status",
        "CarePlan.intent",
        "CarePlan.category",
        "CarePlan.subject",
    ],
};
