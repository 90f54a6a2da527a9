use sensorpath_filter::FilterSettings;
use sensorpath_path::PathSettings;
use serde::{Deserialize, Serialize};

/// Matcher configuration, loadable from JSON; missing fields take defaults.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct MatcherConfig {
    /// Topic path parsing
    pub path: PathSettings,
    /// `$filter` parsing
    pub filter: FilterSettings,
    /// Whether topics may address a single property (`/Things(1)/name`)
    pub allow_property_topics: bool,
}

impl Default for MatcherConfig {
    fn default() -> Self {
        Self {
            path: PathSettings::default(),
            filter: FilterSettings::default(),
            allow_property_topics: true,
        }
    }
}
