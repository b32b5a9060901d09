//! Service configuration

use std::collections::BTreeMap;
use std::path::Path;

use loadstate_core::{LoadingConfig, LoadingError, LoadingResult};
use serde::{Deserialize, Serialize};

/// Registry and service configuration
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// Capacity of the service command channel
    pub command_buffer: usize,
    /// Configuration for areas created without one
    pub default_area: LoadingConfig,
    /// Areas created at startup
    pub areas: BTreeMap<String, LoadingConfig>,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        ServiceConfig {
            command_buffer: 256,
            default_area: LoadingConfig::default(),
            areas: BTreeMap::new(),
        }
    }
}

impl ServiceConfig {
    pub fn from_json(text: &str) -> LoadingResult<Self> {
        let config: ServiceConfig =
            serde_json::from_str(text).map_err(|e| LoadingError::InvalidConfig(e.to_string()))?;
        if config.command_buffer == 0 {
            return Err(LoadingError::InvalidConfig(
                "command_buffer must be positive".into(),
            ));
        }
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> LoadingResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| LoadingError::InvalidConfig(format!("{}: {}", path.display(), e)))?;
        Self::from_json(&text)
    }

    pub fn with_area(mut self, name: &str, config: LoadingConfig) -> Self {
        self.areas.insert(name.to_string(), config);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_empty_json_is_default() {
        assert_eq!(ServiceConfig::from_json("{}").unwrap(), ServiceConfig::default());
    }

    #[test]
    fn test_areas_from_json() {
        let config = ServiceConfig::from_json(
            r#"{
                "default_area": {"debounce_time": "100ms"},
                "areas": {
                    "checkout": {"min_loading_time": "1s", "debounce_time": "300ms"},
                    "sidebar": {"initial_loading_state": true}
                }
            }"#,
        )
        .unwrap();

        assert_eq!(config.default_area.debounce_time, Duration::from_millis(100));
        assert_eq!(config.areas.len(), 2);
        assert_eq!(config.areas["checkout"].min_loading_time, Duration::from_secs(1));
        assert!(config.areas["sidebar"].initial_loading_state);
    }

    #[test]
    fn test_invalid_config() {
        assert!(matches!(
            ServiceConfig::from_json("not json"),
            Err(LoadingError::InvalidConfig(_))
        ));
        assert!(matches!(
            ServiceConfig::from_json(r#"{"command_buffer": 0}"#),
            Err(LoadingError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_missing_file() {
        let err = ServiceConfig::from_file("/nonexistent/loadstate.json").unwrap_err();
        assert!(matches!(err, LoadingError::InvalidConfig(_)));
    }
}
