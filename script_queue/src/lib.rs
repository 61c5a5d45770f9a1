//! Script queue for game scripting
//!
//! This crate sequences discrete scripted actions (cutscene beats, dialogue
//! steps, scripted events) so they run one at a time in submission order,
//! alongside "instant" scripts that run every update until they finish.
//! Finished scripts can be pooled for reuse, and per-class completion counts
//! enforce repeat limits.

pub mod config;
pub mod error;
pub mod events;
pub mod host;
pub mod persistence;
pub mod queue;
pub mod registry;
pub mod script;

pub use config::{PoolCapacity, ScriptQueueConfig};
pub use error::{ConfigError, ScriptQueueError};
pub use queue::{QueueId, ScriptQueue, TickState};
pub use script::{ScriptBehaviour, ScriptContext, ScriptHandle, ScriptSettings};

#[cfg(test)]
mod tests;

// Re-export commonly used types
pub mod prelude {
    pub use crate::config::{PoolCapacity, ScriptQueueConfig};
    pub use crate::error::ScriptQueueError;
    pub use crate::events::{Multicast, ScriptInfo, ScriptOutcome, SubscriberId};
    pub use crate::host::{
        add_script_for, create_script_for, find_script_queue, script_queue_mut,
        script_queue_system, spawn_controller, Controller,
    };
    pub use crate::persistence::RepeatCountSnapshot;
    pub use crate::queue::{ScriptQueue, TickState};
    pub use crate::registry::{ScriptClassId, ScriptRegistry};
    pub use crate::script::{
        ScriptBehaviour, ScriptContext, ScriptEvents, ScriptHandle, ScriptSettings,
    };
}

/// Initialize logging for the script queue and its host
pub fn init_logging() {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}
