//! Parameter bags threaded between stages and per-pipeline settings.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

/// Default cadence for pipelines that do not configure one.
pub const DEFAULT_PERIOD: Duration = Duration::from_secs(120);

/// A string-keyed parameter bag passed between stages.
///
/// Bound parameters are captured when a stage is attached to a pipeline;
/// parameters produced at run time by a configuration stage are merged on
/// top of them, with the run-time values taking precedence.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Params(serde_json::Map<String, Value>);

impl Params {
    /// Creates an empty parameter bag.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true when the bag holds no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns the value stored under `key`, if any.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Inserts a value under `key`, replacing any previous entry.
    pub fn insert(&mut self, key: impl Into<String>, value: Value) {
        self.0.insert(key.into(), value);
    }

    /// Builder-style insertion.
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: Value) -> Self {
        self.insert(key, value);
        self
    }

    /// Returns a new bag with `overrides` merged on top of `self`.
    ///
    /// Keys present in both bags resolve to the override value.
    #[must_use]
    pub fn merged(&self, overrides: &Self) -> Self {
        let mut out = self.0.clone();
        for (key, value) in &overrides.0 {
            out.insert(key.clone(), value.clone());
        }
        Self(out)
    }

    /// Iterates over the entries of the bag.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }
}

impl From<serde_json::Map<String, Value>> for Params {
    fn from(map: serde_json::Map<String, Value>) -> Self {
        Self(map)
    }
}

/// Per-pipeline execution settings recognised by the engine.
///
/// This is the typed rendition of the builder parameter bag:
/// `period` is the scheduling cadence, `delay` an optional one-shot start
/// delay, and `launch_time` a declared-but-unsupported fixed wall-clock
/// launch mode.
#[derive(Debug, Clone)]
pub struct PipelineParams {
    /// Scheduling period between repeated runs.
    pub period: Duration,
    /// One-shot delay applied before the first run.
    pub delay: Option<Duration>,
    /// Fixed wall-clock launch time. Attempting to schedule with this set
    /// fails with a "not supported" error.
    pub launch_time: Option<String>,
}

impl Default for PipelineParams {
    fn default() -> Self {
        Self {
            period: DEFAULT_PERIOD,
            delay: None,
            launch_time: None,
        }
    }
}

impl PipelineParams {
    /// Creates settings with the default period and no delay.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the scheduling period.
    #[must_use]
    pub fn period(mut self, period: Duration) -> Self {
        self.period = period;
        self
    }

    /// Sets the one-shot start delay.
    #[must_use]
    pub fn delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Sets the fixed wall-clock launch time.
    #[must_use]
    pub fn launch_time(mut self, launch_time: impl Into<String>) -> Self {
        self.launch_time = Some(launch_time.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn merged_prefers_override_values() {
        let bound = Params::new()
            .with("topic", json!("/demo"))
            .with("limit", json!(10));
        let configured = Params::new().with("limit", json!(50));

        let merged = bound.merged(&configured);
        assert_eq!(merged.get("topic"), Some(&json!("/demo")));
        assert_eq!(merged.get("limit"), Some(&json!(50)));
    }

    #[test]
    fn merged_keeps_inputs_intact() {
        let bound = Params::new().with("a", json!(1));
        let configured = Params::new().with("b", json!(2));

        let merged = bound.merged(&configured);
        assert_eq!(merged.get("a"), Some(&json!(1)));
        assert_eq!(merged.get("b"), Some(&json!(2)));
        assert_eq!(bound.get("b"), None);
        assert_eq!(configured.get("a"), None);
    }

    #[test]
    fn pipeline_params_defaults() {
        let params = PipelineParams::new();
        assert_eq!(params.period, DEFAULT_PERIOD);
        assert!(params.delay.is_none());
        assert!(params.launch_time.is_none());
    }
}
