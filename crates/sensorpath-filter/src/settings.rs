use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct FilterSettings {
    /// Maximum nesting depth of a parsed filter tree.
    pub max_depth: usize,
}

impl Default for FilterSettings {
    fn default() -> Self {
        Self { max_depth: 64 }
    }
}
