//! Dispatch lane configuration.

use serde::{Deserialize, Serialize};

use crate::error::{SendError, SendResult};

/// Settings for a context's dispatch lane.
///
/// ```
/// use sendlane::LaneConfig;
///
/// let config = LaneConfig::from_json(r#"{ "transport_workers": 4 }"#).unwrap();
/// assert_eq!(config.transport_workers, 4);
/// assert_eq!(config.thread_name, "sendlane");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LaneConfig {
    /// Threads executing transport work for async sends. With one worker,
    /// messages reach the transport in call order; with more, transport work
    /// may overlap while notifications stay ordered.
    pub transport_workers: usize,
    /// Prefix for lane thread names.
    pub thread_name: String,
}

impl Default for LaneConfig {
    fn default() -> Self {
        Self {
            transport_workers: 1,
            thread_name: "sendlane".to_string(),
        }
    }
}

impl LaneConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse and validate a JSON config. Missing fields take their defaults.
    pub fn from_json(json: &str) -> SendResult<Self> {
        let config: LaneConfig = serde_json::from_str(json)
            .map_err(|e| SendError::validation(format!("invalid lane config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn with_transport_workers(mut self, workers: usize) -> Self {
        self.transport_workers = workers;
        self
    }

    pub fn with_thread_name(mut self, name: impl Into<String>) -> Self {
        self.thread_name = name.into();
        self
    }

    pub fn validate(&self) -> SendResult<()> {
        if self.transport_workers == 0 {
            return Err(SendError::validation("transport_workers must be at least 1"));
        }
        if self.thread_name.is_empty() {
            return Err(SendError::validation("thread_name must not be empty"));
        }
        Ok(())
    }
}
