use serde::{Deserialize, Serialize};

/// Path resolution settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct PathSettings {
    /// Leading service-version element stripped before resolution
    /// (`/v1.1/Things` resolves like `/Things`).
    pub version_prefix: Option<String>,
    /// Maximum number of navigation elements in one path.
    pub max_segments: usize,
}

impl Default for PathSettings {
    fn default() -> Self {
        Self {
            version_prefix: Some("v1.1".to_string()),
            max_segments: 16,
        }
    }
}

impl PathSettings {
    /// Returns the path without the version prefix and the number of bytes removed.
    pub(crate) fn strip_version_prefix<'a>(&self, path: &'a str) -> (&'a str, usize) {
        let Some(prefix) = self.version_prefix.as_deref() else {
            return (path, 0);
        };
        let stripped = path
            .strip_prefix('/')
            .and_then(|rest| rest.strip_prefix(prefix))
            .filter(|rest| rest.starts_with('/'));
        match stripped {
            Some(rest) => (rest, path.len() - rest.len()),
            None => (path, 0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_only_a_whole_prefix_element() {
        let settings = PathSettings::default();
        assert_eq!(settings.strip_version_prefix("/v1.1/Things"), ("/Things", 5));
        assert_eq!(settings.strip_version_prefix("/Things"), ("/Things", 0));
        assert_eq!(settings.strip_version_prefix("/v1.10/Things"), ("/v1.10/Things", 0));
    }

    #[test]
    fn missing_fields_take_defaults() {
        let settings: PathSettings = serde_json::from_str(r#"{"max_segments": 4}"#).unwrap();
        assert_eq!(settings.max_segments, 4);
        assert_eq!(settings.version_prefix.as_deref(), Some("v1.1"));
    }
}
