use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::ConformanceError;

/// Result of running a single test case
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "result", content = "message", rename_all = "lowercase")]
pub enum Outcome {
    Pass,
    /// The server violated a concrete expectation
    Fail(String),
    /// Prerequisite data or capability is unavailable
    Skip(String),
    /// The case does not apply to the current configuration
    Omit(String),
    /// The check itself could not be completed
    Error(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutcomeKind {
    Pass,
    Fail,
    Skip,
    Omit,
    Error,
}

impl Outcome {
    pub fn kind(&self) -> OutcomeKind {
        match self {
            Outcome::Pass => OutcomeKind::Pass,
            Outcome::Fail(_) => OutcomeKind::Fail,
            Outcome::Skip(_) => OutcomeKind::Skip,
            Outcome::Omit(_) => OutcomeKind::Omit,
            Outcome::Error(_) => OutcomeKind::Error,
        }
    }

    pub fn message(&self) -> Option<&str> {
        match self {
            Outcome::Pass => None,
            Outcome::Fail(m) | Outcome::Skip(m) | Outcome::Omit(m) | Outcome::Error(m) => Some(m),
        }
    }

    pub fn is_pass(&self) -> bool {
        matches!(self, Outcome::Pass)
    }
}

impl fmt::Display for OutcomeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            OutcomeKind::Pass => "pass",
            OutcomeKind::Fail => "fail",
            OutcomeKind::Skip => "skip",
            OutcomeKind::Omit => "omit",
            OutcomeKind::Error => "error",
        };
        f.write_str(label)
    }
}

/// Early exit from a test step.
///
/// Steps return `StepResult<()>` and use `?` so the first violated
/// condition ends the step; the engine turns the halt into an [`Outcome`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepHalt {
    Fail(String),
    Skip(String),
    Omit(String),
    Error(String),
}

pub type StepResult<T> = std::result::Result<T, StepHalt>;

impl StepHalt {
    pub fn fail(message: impl Into<String>) -> Self {
        Self::Fail(message.into())
    }

    pub fn skip(message: impl Into<String>) -> Self {
        Self::Skip(message.into())
    }

    pub fn omit(message: impl Into<String>) -> Self {
        Self::Omit(message.into())
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::Error(message.into())
    }

    pub fn message(&self) -> &str {
        match self {
            StepHalt::Fail(m) | StepHalt::Skip(m) | StepHalt::Omit(m) | StepHalt::Error(m) => m,
        }
    }
}

impl From<StepHalt> for Outcome {
    fn from(halt: StepHalt) -> Self {
        match halt {
            StepHalt::Fail(m) => Outcome::Fail(m),
            StepHalt::Skip(m) => Outcome::Skip(m),
            StepHalt::Omit(m) => Outcome::Omit(m),
            StepHalt::Error(m) => Outcome::Error(m),
        }
    }
}

impl From<ConformanceError> for StepHalt {
    fn from(err: ConformanceError) -> Self {
        StepHalt::Error(err.to_string())
    }
}

/// Fails the current step with `message` unless `condition` holds
pub fn ensure(condition: bool, message: impl Into<String>) -> StepResult<()> {
    if condition {
        Ok(())
    } else {
        Err(StepHalt::fail(message))
    }
}

/// Skips the current step with `message` unless `condition` holds
pub fn skip_unless(condition: bool, message: impl Into<String>) -> StepResult<()> {
    if condition {
        Ok(())
    } else {
        Err(StepHalt::skip(message))
    }
}

/// Recorded result of one test case invocation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaseResult {
    pub id: String,
    pub key: String,
    pub title: String,
    pub optional: bool,
    pub outcome: Outcome,
    #[serde(default)]
    pub warnings: Vec<String>,
}

impl CaseResult {
    pub fn kind(&self) -> OutcomeKind {
        self.outcome.kind()
    }

    pub fn message(&self) -> Option<&str> {
        self.outcome.message()
    }
}
