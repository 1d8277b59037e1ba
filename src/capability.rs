use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

/// RESTful interactions a test case can depend on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Interaction {
    Search,
    Read,
    Vread,
    History,
}

impl fmt::Display for Interaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Interaction::Search => "search",
            Interaction::Read => "read",
            Interaction::Vread => "vread",
            Interaction::History => "history",
        };
        f.write_str(label)
    }
}

/// Answers whether the server declares support for an interaction
pub trait CapabilityLookup: Send + Sync {
    fn supports(&self, resource_type: &str, interaction: Interaction) -> bool;
}

/// Capability answers fixed up front
#[derive(Debug, Clone, Default)]
pub struct StaticCapabilities {
    allow_all: bool,
    supported: HashSet<(String, Interaction)>,
}

impl StaticCapabilities {
    /// Nothing supported until declared with [`with`](Self::with)
    pub fn new() -> Self {
        Self::default()
    }

    pub fn allow_all() -> Self {
        Self {
            allow_all: true,
            supported: HashSet::new(),
        }
    }

    pub fn with(mut self, resource_type: &str, interactions: &[Interaction]) -> Self {
        for interaction in interactions {
            self.supported
                .insert((resource_type.to_string(), *interaction));
        }
        self
    }
}

impl CapabilityLookup for StaticCapabilities {
    fn supports(&self, resource_type: &str, interaction: Interaction) -> bool {
        self.allow_all
            || self
                .supported
                .contains(&(resource_type.to_string(), interaction))
    }
}
