//! Timing policy for loading areas
//!
//! Durations are (de)serialized as human-readable text ("300ms", "1s 500ms")
//! so configs can live in JSON files next to the application.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Loading area configuration
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LoadingConfig {
    /// Floor on how long an area reports loading after activation
    #[serde(with = "duration_text")]
    pub min_loading_time: Duration,
    /// Delay before a request to stop loading is honored
    #[serde(with = "duration_text")]
    pub debounce_time: Duration,
    /// Starting value at construction
    pub initial_loading_state: bool,
}

impl LoadingConfig {
    /// Configuration with no timing policy at all
    pub fn new() -> Self {
        Self::default()
    }

    /// No debounce, no floor: state changes are visible on the next tick
    pub fn instant() -> Self {
        Self::default()
    }

    /// Spinner-friendly defaults: short debounce, a floor long enough to
    /// avoid a one-frame flash
    pub fn smooth() -> Self {
        LoadingConfig {
            min_loading_time: Duration::from_millis(300),
            debounce_time: Duration::from_millis(100),
            initial_loading_state: false,
        }
    }

    pub fn with_min_loading_time(mut self, min_loading_time: Duration) -> Self {
        self.min_loading_time = min_loading_time;
        self
    }

    pub fn with_debounce_time(mut self, debounce_time: Duration) -> Self {
        self.debounce_time = debounce_time;
        self
    }

    pub fn with_initial_loading_state(mut self, loading: bool) -> Self {
        self.initial_loading_state = loading;
        self
    }

    /// Overlay the fields present in `patch`
    pub fn merged(mut self, patch: &ConfigPatch) -> Self {
        if let Some(min_loading_time) = patch.min_loading_time {
            self.min_loading_time = min_loading_time;
        }
        if let Some(debounce_time) = patch.debounce_time {
            self.debounce_time = debounce_time;
        }
        if let Some(initial) = patch.initial_loading_state {
            self.initial_loading_state = initial;
        }
        self
    }
}

/// Partial configuration update
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfigPatch {
    #[serde(with = "optional_duration_text", skip_serializing_if = "Option::is_none")]
    pub min_loading_time: Option<Duration>,
    #[serde(with = "optional_duration_text", skip_serializing_if = "Option::is_none")]
    pub debounce_time: Option<Duration>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub initial_loading_state: Option<bool>,
}

impl ConfigPatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn min_loading_time(mut self, min_loading_time: Duration) -> Self {
        self.min_loading_time = Some(min_loading_time);
        self
    }

    pub fn debounce_time(mut self, debounce_time: Duration) -> Self {
        self.debounce_time = Some(debounce_time);
        self
    }

    pub fn initial_loading_state(mut self, loading: bool) -> Self {
        self.initial_loading_state = Some(loading);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.min_loading_time.is_none()
            && self.debounce_time.is_none()
            && self.initial_loading_state.is_none()
    }
}

impl From<LoadingConfig> for ConfigPatch {
    fn from(config: LoadingConfig) -> Self {
        ConfigPatch {
            min_loading_time: Some(config.min_loading_time),
            debounce_time: Some(config.debounce_time),
            initial_loading_state: Some(config.initial_loading_state),
        }
    }
}

/// Options for a single `set_loading` call
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SetLoadingOptions {
    /// Bypass debounce and minimum loading time, apply to the whole subtree
    pub force: bool,
}

impl SetLoadingOptions {
    pub fn forced() -> Self {
        SetLoadingOptions { force: true }
    }
}

mod duration_text {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&humantime::format_duration(*value).to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let text = String::deserialize(deserializer)?;
        humantime::parse_duration(&text).map_err(serde::de::Error::custom)
    }
}

mod optional_duration_text {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(
        value: &Option<Duration>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match value {
            Some(d) => serializer.serialize_some(&humantime::format_duration(*d).to_string()),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<Duration>, D::Error> {
        let text = Option::<String>::deserialize(deserializer)?;
        text.map(|t| humantime::parse_duration(&t).map_err(serde::de::Error::custom))
            .transpose()
    }
}
