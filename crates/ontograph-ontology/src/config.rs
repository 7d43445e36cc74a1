//! Repository configuration.

use crate::error::{OntologyError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

pub const DEFAULT_CACHE_TTL_HOURS: u64 = 15;
pub const DEFAULT_CACHE_MAX_CAPACITY: u64 = 1_024;
pub const DEFAULT_DYNAMIC_IRI_BASE: &str = "http://ontograph.dev/";

/// Intent → IRI overrides, consulted before searching element intents.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IntentOverrides {
    pub concept: BTreeMap<String, String>,
    pub relationship: BTreeMap<String, String>,
    pub property: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RepositoryConfig {
    /// Staleness backstop for cached views; invalidation is explicit.
    pub cache_ttl_hours: u64,
    /// Entries per cache (one entry per workspace).
    pub cache_max_capacity: u64,
    pub intents: IntentOverrides,
    pub dynamic_iri_base: String,
}

impl Default for RepositoryConfig {
    fn default() -> Self {
        Self {
            cache_ttl_hours: DEFAULT_CACHE_TTL_HOURS,
            cache_max_capacity: DEFAULT_CACHE_MAX_CAPACITY,
            intents: IntentOverrides::default(),
            dynamic_iri_base: DEFAULT_DYNAMIC_IRI_BASE.to_string(),
        }
    }
}

impl RepositoryConfig {
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let bytes = std::fs::read(path).map_err(|e| {
            OntologyError::InvalidArgument(format!("cannot read config {}: {e}", path.display()))
        })?;
        serde_json::from_slice(&bytes).map_err(|e| {
            OntologyError::InvalidArgument(format!("invalid config {}: {e}", path.display()))
        })
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_hours.saturating_mul(3_600))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn partial_json_keeps_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{ "intents": {{ "concept": {{ "person": "http://x#person" }} }} }}"#
        )
        .unwrap();
        let config = RepositoryConfig::from_json_file(file.path()).unwrap();
        assert_eq!(config.cache_ttl_hours, DEFAULT_CACHE_TTL_HOURS);
        assert_eq!(
            config.intents.concept.get("person").map(String::as_str),
            Some("http://x#person")
        );
        assert_eq!(config.cache_ttl(), Duration::from_secs(15 * 3_600));
    }

    #[test]
    fn unreadable_config_is_invalid_argument() {
        let err = RepositoryConfig::from_json_file("/definitely/not/here.json").unwrap_err();
        assert!(matches!(err, OntologyError::InvalidArgument(_)));
    }
}
