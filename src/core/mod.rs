pub mod config;
pub mod context;
pub mod outcome;

pub use config::{AuthConfig, ClientRegistration, ConformanceConfig, EngineConfig, FhirVersion};
pub use context::RunContext;
pub use outcome::{
    CaseResult, Outcome, OutcomeKind, StepHalt, StepResult, ensure, skip_unless,
};
