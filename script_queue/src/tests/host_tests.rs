//! Tests for the host world helpers

use super::{new_log, registry_with};
use crate::config::ScriptQueueConfig;
use crate::error::ScriptQueueError;
use crate::host::{
    add_script_for, create_script_for, find_script_queue, script_queue_mut,
    script_queue_system, spawn_controller,
};
use crate::queue::ScriptQueue;
use crate::registry::ScriptClassId;
use hecs::World;
use std::sync::Arc;

fn world_with_controllers(count: u32) -> (World, ScriptClassId) {
    let log = new_log();
    let registry = Arc::new(registry_with(&log));
    let timed = registry.class_by_name("timed").unwrap();
    let config = ScriptQueueConfig::default().with_auto_activate(true);

    let mut world = World::new();
    for index in 0..count {
        spawn_controller(
            &mut world,
            index,
            ScriptQueue::new(registry.clone(), &config),
        );
    }
    (world, timed)
}

#[test]
fn test_find_script_queue_by_controller() {
    let (world, _) = world_with_controllers(2);

    let first = find_script_queue(&world, 0).unwrap();
    let second = find_script_queue(&world, 1).unwrap();
    assert_ne!(first, second);
    assert!(find_script_queue(&world, 7).is_none());
}

#[test]
fn test_create_and_add_through_world() {
    let (mut world, timed) = world_with_controllers(1);

    let script = create_script_for(&mut world, 0, timed, 0).unwrap();
    assert!(!script_queue_mut(&mut world, 0).unwrap().has_queue());

    assert_eq!(add_script_for(&mut world, script), Ok(script));
    let queue = script_queue_mut(&mut world, 0).unwrap();
    assert_eq!(queue.queued_scripts(), vec![script]);
}

#[test]
fn test_missing_controller_is_reported() {
    let (mut world, timed) = world_with_controllers(1);
    assert_eq!(
        create_script_for(&mut world, 3, timed, 0),
        Err(ScriptQueueError::QueueNotFound(3))
    );
}

#[test]
fn test_add_fails_once_queue_entity_is_gone() {
    let (mut world, timed) = world_with_controllers(1);
    let script = create_script_for(&mut world, 0, timed, 0).unwrap();

    let entity = find_script_queue(&world, 0).unwrap();
    world.despawn(entity).unwrap();
    assert_eq!(
        add_script_for(&mut world, script),
        Err(ScriptQueueError::InvalidOwner(script))
    );
}

#[test]
fn test_add_destroyed_script_is_invalid() {
    let (mut world, timed) = world_with_controllers(1);
    let script = create_script_for(&mut world, 0, timed, 0).unwrap();
    script_queue_mut(&mut world, 0)
        .unwrap()
        .destroy_script(script);

    assert_eq!(
        add_script_for(&mut world, script),
        Err(ScriptQueueError::InvalidScript(script))
    );
}

#[test]
fn test_system_drives_every_queue() {
    let (mut world, timed) = world_with_controllers(2);
    for index in 0..2 {
        let script = create_script_for(&mut world, index, timed, 0).unwrap();
        add_script_for(&mut world, script).unwrap();
    }

    script_queue_system(&mut world, 0.016);
    for index in 0..2 {
        let queue = script_queue_mut(&mut world, index).unwrap();
        assert!(queue.has_queue());
        assert!(queue.is_ticking());
    }

    script_queue_system(&mut world, 0.016);
    for index in 0..2 {
        let queue = script_queue_mut(&mut world, index).unwrap();
        assert!(!queue.has_queue());
        assert_eq!(queue.repeat_count(timed), 1);
    }
}
