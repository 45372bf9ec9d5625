/*!
    Pipeline configuration.
*/

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::ConfigError;

/// Default per-stream queue depth: one second of 30 fps video.
pub const DEFAULT_QUEUE_CAPACITY: usize = 30;

/**
    What a push into a full per-stream queue does.
*/
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "policy", rename_all = "snake_case")]
pub enum OverflowPolicy {
    /**
        Wait until the worker makes room or the pipeline stops.

        Positional pairing is preserved because no frame is ever lost.
    */
    Block { capacity: usize },
    /**
        Evict the oldest queued frame of the same stream and count it.

        Evictions shift which frames get paired across streams.
    */
    DropOldest { capacity: usize },
    /// Never limit queue growth.
    Unbounded,
}

impl OverflowPolicy {
    /// Queue depth limit, None when unbounded.
    pub fn capacity(self) -> Option<usize> {
        match self {
            Self::Block { capacity } | Self::DropOldest { capacity } => Some(capacity),
            Self::Unbounded => None,
        }
    }
}

impl Default for OverflowPolicy {
    fn default() -> Self {
        Self::Block {
            capacity: DEFAULT_QUEUE_CAPACITY,
        }
    }
}

/**
    Tunables for a fusion pipeline.
*/
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Per-stream queue bound and overflow behavior.
    pub overflow: OverflowPolicy,
    /// Keep fusing complete sets that are already queued when a stop arrives.
    pub drain_on_stop: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            overflow: OverflowPolicy::default(),
            drain_on_stop: true,
        }
    }
}

impl PipelineConfig {
    /**
        Parse and validate a configuration from JSON.
    */
    pub fn from_json(contents: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /**
        Load and validate a configuration file.
    */
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path.as_ref())?;
        Self::from_json(&contents)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.overflow.capacity() == Some(0) {
            return Err(ConfigError::Invalid(
                "queue capacity must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    pub fn to_json(&self) -> Result<String, ConfigError> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}
