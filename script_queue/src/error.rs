//! Error types for script construction, submission and configuration

use crate::script::ScriptHandle;

/// Errors that can occur while building or submitting scripts
///
/// None of these are fatal. Every variant means the requested operation did
/// not happen and the queue state was left untouched.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ScriptQueueError {
    #[error("Unknown script class: {0}")]
    UnknownClass(String),

    #[error("Script class already registered: {0}")]
    DuplicateClass(String),

    #[error("Script class {class} reached its repeat limit ({completed}/{limit})")]
    RepeatLimitReached {
        class: String,
        completed: u32,
        limit: u32,
    },

    #[error("Script {0:?} is not a live script of this queue")]
    InvalidScript(ScriptHandle),

    #[error("Script {0:?} is not bound to a live script queue")]
    InvalidOwner(ScriptHandle),

    #[error("Script {0:?} is already queued")]
    AlreadyQueued(ScriptHandle),

    #[error("Script {0:?} can only be configured before it is submitted")]
    NotConfigurable(ScriptHandle),

    #[error("No script queue found for controller {0}")]
    QueueNotFound(u32),
}

/// Errors that can occur while loading a queue configuration
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
