//! Host world integration
//!
//! In the host's `hecs::World` each controlling context is an entity tagged
//! with [`Controller`] that carries exactly one [`ScriptQueue`]. The helpers
//! here locate that queue and forward the node-facing create/submit calls,
//! and [`script_queue_system`] drives every queue once per frame.

use crate::error::ScriptQueueError;
use crate::queue::ScriptQueue;
use crate::registry::ScriptClassId;
use crate::script::ScriptHandle;
use hecs::{Entity, World};
use tracing::{trace, warn};

/// Marks the entity that drives a controlling context, usually a local player
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Controller {
    pub index: u32,
}

/// Spawn a controller entity carrying `queue`
pub fn spawn_controller(world: &mut World, index: u32, queue: ScriptQueue) -> Entity {
    let entity = world.spawn((Controller { index }, queue));
    trace!(entity = ?entity, index, "Spawned script queue controller");
    entity
}

/// Find the entity holding the script queue of controller `index`
pub fn find_script_queue(world: &World, index: u32) -> Option<Entity> {
    let mut query = world.query::<(&Controller, &ScriptQueue)>();
    let mut matches = query
        .iter()
        .filter(|(_, (controller, _))| controller.index == index)
        .map(|(entity, _)| entity);
    let found = matches.next();
    if matches.next().is_some() {
        warn!(index, "Several script queues found for one controller; using the first");
    }
    found
}

/// Mutable access to the script queue of controller `index`
pub fn script_queue_mut(world: &mut World, index: u32) -> Option<&mut ScriptQueue> {
    let entity = find_script_queue(world, index)?;
    world.query_one_mut::<&mut ScriptQueue>(entity).ok()
}

/// Create a script on the queue of controller `index`
pub fn create_script_for(
    world: &mut World,
    index: u32,
    class: ScriptClassId,
    repeat_limit: u32,
) -> Result<ScriptHandle, ScriptQueueError> {
    let queue = script_queue_mut(world, index).ok_or(ScriptQueueError::QueueNotFound(index))?;
    queue.create_script(class, repeat_limit)
}

/// Submit a script to the queue it is bound to
///
/// Fails with [`ScriptQueueError::InvalidOwner`] if that queue no longer
/// exists in the world or the script was never bound to it. The script
/// carries no controller index, so `QueueNotFound` is reserved for lookups
/// by controller.
pub fn add_script_for(world: &mut World, script: ScriptHandle) -> Result<ScriptHandle, ScriptQueueError> {
    let queue = world
        .query_mut::<&mut ScriptQueue>()
        .into_iter()
        .map(|(_, queue)| queue)
        .find(|queue| queue.id() == script.queue())
        .ok_or(ScriptQueueError::InvalidOwner(script))?;

    if !queue.is_valid(script) {
        return Err(ScriptQueueError::InvalidScript(script));
    }
    if !queue.owns(script) {
        return Err(ScriptQueueError::InvalidOwner(script));
    }
    queue.add_script_to_queue(script)?;
    Ok(script)
}

/// Run the per-update pass of every script queue in the world
pub fn script_queue_system(world: &mut World, delta_time: f32) {
    for (_, queue) in world.query_mut::<&mut ScriptQueue>() {
        queue.on_update(delta_time);
    }
}
