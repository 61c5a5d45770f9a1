//! Configuration types for the script queue

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::num::NonZeroUsize;
use std::path::Path;
use tracing::debug;

/// Pool size used when none is configured
pub const DEFAULT_POOL_SIZE: i32 = 20;

/// Capacity of the finished-script pool
///
/// Written in configuration files as a signed integer: `0` disables pooling,
/// a negative value makes the pool unbounded and a positive value caps it,
/// evicting the oldest entry on overflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "i32", into = "i32")]
pub enum PoolCapacity {
    Disabled,
    Unbounded,
    Bounded(NonZeroUsize),
}

impl PoolCapacity {
    pub fn is_enabled(&self) -> bool {
        !matches!(self, PoolCapacity::Disabled)
    }

    /// Maximum number of pooled scripts, `None` when unbounded or disabled
    pub fn limit(&self) -> Option<usize> {
        match self {
            PoolCapacity::Bounded(size) => Some(size.get()),
            _ => None,
        }
    }
}

impl From<i32> for PoolCapacity {
    fn from(size: i32) -> Self {
        match size {
            0 => PoolCapacity::Disabled,
            n if n < 0 => PoolCapacity::Unbounded,
            n => NonZeroUsize::new(n as usize).map_or(PoolCapacity::Disabled, PoolCapacity::Bounded),
        }
    }
}

impl From<PoolCapacity> for i32 {
    fn from(capacity: PoolCapacity) -> Self {
        match capacity {
            PoolCapacity::Disabled => 0,
            PoolCapacity::Unbounded => -1,
            PoolCapacity::Bounded(size) => i32::try_from(size.get()).unwrap_or(i32::MAX),
        }
    }
}

impl Default for PoolCapacity {
    fn default() -> Self {
        Self::from(DEFAULT_POOL_SIZE)
    }
}

/// Construction-time configuration of a [`ScriptQueue`](crate::ScriptQueue)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ScriptQueueConfig {
    /// Capacity of the finished-script pool
    pub pool_size: PoolCapacity,
    /// Start the queue active; otherwise nothing ticks until `activate` is called
    pub auto_activate: bool,
}

impl Default for ScriptQueueConfig {
    fn default() -> Self {
        Self {
            pool_size: PoolCapacity::default(),
            auto_activate: false,
        }
    }
}

impl ScriptQueueConfig {
    /// Set the pool size using the signed convention of configuration files
    pub fn with_pool_size(mut self, size: i32) -> Self {
        self.pool_size = PoolCapacity::from(size);
        self
    }

    pub fn with_auto_activate(mut self, auto_activate: bool) -> Self {
        self.auto_activate = auto_activate;
        self
    }

    /// Parse a configuration from JSON
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        debug!(
            pool_size = i32::from(config.pool_size),
            auto_activate = config.auto_activate,
            "Parsed script queue config"
        );
        Ok(config)
    }

    /// Load a configuration from a JSON file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        debug!(path = ?path, "Loading script queue config");
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }
}
