//! Scripts: units of queued work with a two-state lifecycle
//!
//! A script is created through [`ScriptQueue::create_script`], configured,
//! submitted, activated by the queue's update pass and deactivated exactly
//! once with a success or failure outcome. Script objects live in the
//! queue's object store; callers hold [`ScriptHandle`]s, which are weak and
//! checked for liveness on every use.

use crate::events::{Multicast, ScriptInfo, ScriptOutcome};
use crate::queue::{QueueId, ScriptQueue};
use crate::registry::ScriptClassId;
use hecs::Entity;
use serde::{Deserialize, Serialize};
use std::any::Any;

/// Weak reference to a script object owned by a [`ScriptQueue`]
///
/// Handles are generational: once the script is destroyed every copy of the
/// handle becomes invalid, even if the slot is reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ScriptHandle {
    queue: QueueId,
    entity: Entity,
}

impl ScriptHandle {
    pub(crate) fn new(queue: QueueId, entity: Entity) -> Self {
        Self { queue, entity }
    }

    /// Id of the queue whose object store holds this script
    pub fn queue(&self) -> QueueId {
        self.queue
    }

    pub(crate) fn entity(&self) -> Entity {
        self.entity
    }
}

/// Per-instance configuration, fixed once the script is submitted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScriptSettings {
    /// Run every update regardless of queue position
    pub instant: bool,
    /// Return the instance to the pool when it finishes
    pub use_pool: bool,
}

impl Default for ScriptSettings {
    fn default() -> Self {
        Self {
            instant: false,
            use_pool: true,
        }
    }
}

impl ScriptSettings {
    /// Settings for a pooled instant script
    pub fn instant() -> Self {
        Self {
            instant: true,
            ..Self::default()
        }
    }

    pub fn with_pool(mut self, use_pool: bool) -> Self {
        self.use_pool = use_pool;
        self
    }
}

/// Downcasting support for behaviours
pub trait AsAny {
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<T: Any> AsAny for T {
    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// Overridable hooks of a script class
///
/// All hooks default to doing nothing. Hooks receive a [`ScriptContext`]
/// with access to the owning queue, so a script can submit follow-up
/// scripts or finish itself.
pub trait ScriptBehaviour: AsAny + Send + Sync + 'static {
    /// Called once right after submission, before any activation
    fn on_added_to_queue(&mut self, _ctx: &mut ScriptContext<'_>) {}

    /// Called when the script becomes active
    fn on_activate(&mut self, _ctx: &mut ScriptContext<'_>) {}

    /// Called on every update pass while the script is active
    fn on_update(&mut self, _ctx: &mut ScriptContext<'_>, _delta_time: f32) {}

    /// Called when the script finishes, before any finish notification
    fn on_deactivate(&mut self, _ctx: &mut ScriptContext<'_>, _success: bool) {}
}

/// Notification channels scoped to one script instance
#[derive(Debug, Default)]
pub struct ScriptEvents {
    pub started: Multicast<ScriptInfo>,
    pub cancelled: Multicast<ScriptInfo>,
    pub finished: Multicast<ScriptOutcome>,
}

impl ScriptEvents {
    /// Drop every registration on all three channels
    pub fn clear_all(&mut self) {
        self.started.clear();
        self.cancelled.clear();
        self.finished.clear();
    }
}

/// Lifecycle record of a script object
#[derive(Debug)]
pub(crate) struct ScriptState {
    pub class: ScriptClassId,
    /// Back-reference to the owning queue, bound by `initialize_script`
    pub owner: Option<QueueId>,
    pub active: bool,
    pub settings: ScriptSettings,
    /// Outcome requested while the script's own hook was running
    pub pending_outcome: Option<bool>,
}

impl ScriptState {
    pub fn new(class: ScriptClassId, settings: ScriptSettings) -> Self {
        Self {
            class,
            owner: None,
            active: false,
            settings,
            pending_outcome: None,
        }
    }
}

/// Behaviour slot of a script object, empty while one of its hooks runs
pub(crate) struct ScriptBody(pub Option<Box<dyn ScriptBehaviour>>);

/// Access handed to behaviour hooks
pub struct ScriptContext<'a> {
    queue: &'a mut ScriptQueue,
    script: ScriptHandle,
}

impl<'a> ScriptContext<'a> {
    pub(crate) fn new(queue: &'a mut ScriptQueue, script: ScriptHandle) -> Self {
        Self { queue, script }
    }

    /// Handle of the script whose hook is running
    pub fn handle(&self) -> ScriptHandle {
        self.script
    }

    pub fn class(&self) -> Option<ScriptClassId> {
        self.queue.script_class(self.script)
    }

    /// The queue that owns this script
    pub fn queue(&mut self) -> &mut ScriptQueue {
        &mut *self.queue
    }

    /// Finish this script with the given outcome
    ///
    /// Takes effect as soon as the running hook returns.
    pub fn finish(&mut self, success: bool) {
        self.queue.deactivate_script(self.script, success);
    }
}
