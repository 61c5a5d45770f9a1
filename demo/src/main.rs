//! Script queue demonstration: a short scripted dialogue with ambient audio

use script_queue::prelude::*;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{info, warn};

const FRAME_TIME: f32 = 1.0 / 60.0;
const MAX_FRAMES: u32 = 1200;
const PLAYER: u32 = 0;

/// One line of dialogue, shown for a fixed time
#[derive(Default)]
struct DialogueBeat {
    elapsed: f32,
}

impl DialogueBeat {
    const DURATION: f32 = 1.5;
}

impl ScriptBehaviour for DialogueBeat {
    fn on_activate(&mut self, ctx: &mut ScriptContext<'_>) {
        self.elapsed = 0.0;
        info!(script = ?ctx.handle(), "Dialogue beat started");
    }

    fn on_update(&mut self, ctx: &mut ScriptContext<'_>, delta_time: f32) {
        self.elapsed += delta_time;
        if self.elapsed >= Self::DURATION {
            ctx.finish(true);
        }
    }

    fn on_deactivate(&mut self, ctx: &mut ScriptContext<'_>, success: bool) {
        info!(script = ?ctx.handle(), success, "Dialogue beat ended");
    }
}

/// Background music that fades out once no dialogue is left
#[derive(Default)]
struct AmbientMusic {
    playing_for: f32,
}

impl ScriptBehaviour for AmbientMusic {
    fn on_activate(&mut self, _ctx: &mut ScriptContext<'_>) {
        self.playing_for = 0.0;
        info!("Ambient music started");
    }

    fn on_update(&mut self, ctx: &mut ScriptContext<'_>, delta_time: f32) {
        self.playing_for += delta_time;
        let queue = ctx.queue();
        let dialogue_left = queue
            .registry()
            .class_of::<DialogueBeat>()
            .is_some_and(|class| queue.has_script_in_queue(class));
        if !dialogue_left {
            ctx.finish(true);
        }
    }

    fn on_deactivate(&mut self, _ctx: &mut ScriptContext<'_>, _success: bool) {
        info!(seconds = self.playing_for, "Ambient music stopped");
    }
}

/// One-off tutorial hint
#[derive(Default)]
struct TutorialHint;

impl ScriptBehaviour for TutorialHint {
    fn on_activate(&mut self, ctx: &mut ScriptContext<'_>) {
        info!("Hint: press E to talk");
        ctx.finish(true);
    }
}

fn build_registry() -> Result<ScriptRegistry, ScriptQueueError> {
    let mut registry = ScriptRegistry::new();
    registry.register::<DialogueBeat>("dialogue_beat", ScriptSettings::default())?;
    registry.register::<AmbientMusic>("ambient_music", ScriptSettings::instant())?;
    registry.register::<TutorialHint>("tutorial_hint", ScriptSettings::default())?;
    Ok(registry)
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    script_queue::init_logging();
    info!("Starting script queue demo");

    let config = match std::env::args().nth(1) {
        Some(path) => ScriptQueueConfig::load_from_file(path)?,
        None => ScriptQueueConfig::default().with_auto_activate(true),
    };
    let registry = Arc::new(build_registry()?);
    let dialogue = registry
        .class_of::<DialogueBeat>()
        .ok_or_else(|| ScriptQueueError::UnknownClass("dialogue_beat".to_string()))?;
    let hint = registry
        .class_of::<TutorialHint>()
        .ok_or_else(|| ScriptQueueError::UnknownClass("tutorial_hint".to_string()))?;

    let mut world = hecs::World::new();
    spawn_controller(&mut world, PLAYER, ScriptQueue::new(registry.clone(), &config));

    let finished = Arc::new(AtomicBool::new(false));
    {
        let queue = script_queue_mut(&mut world, PLAYER)
            .ok_or(ScriptQueueError::QueueNotFound(PLAYER))?;
        if !queue.is_active() {
            queue.activate();
        }
        let flag = finished.clone();
        queue
            .events_mut()
            .queue_finished
            .subscribe(SubscriberId::unique(), move |_| {
                flag.store(true, Ordering::SeqCst);
            });
    }

    let hint_script = create_script_for(&mut world, PLAYER, hint, 1)?;
    add_script_for(&mut world, hint_script)?;
    for _ in 0..3 {
        let beat = create_script_for(&mut world, PLAYER, dialogue, 0)?;
        add_script_for(&mut world, beat)?;
    }
    let music = registry
        .class_of::<AmbientMusic>()
        .ok_or_else(|| ScriptQueueError::UnknownClass("ambient_music".to_string()))?;
    let music = create_script_for(&mut world, PLAYER, music, 0)?;
    add_script_for(&mut world, music)?;

    let mut frame = 0;
    while !finished.load(Ordering::SeqCst) && frame < MAX_FRAMES {
        script_queue_system(&mut world, FRAME_TIME);
        frame += 1;
    }
    if finished.load(Ordering::SeqCst) {
        info!(frame, "Scripted sequence finished");
    } else {
        warn!(frame, "Scripted sequence did not finish in time");
    }

    match create_script_for(&mut world, PLAYER, hint, 1) {
        Ok(_) => warn!("Tutorial hint was allowed to run twice"),
        Err(err) => info!(error = %err, "Tutorial hint not repeated"),
    }

    let queue =
        script_queue_mut(&mut world, PLAYER).ok_or(ScriptQueueError::QueueNotFound(PLAYER))?;
    info!(counts = %queue.save_repeat_counts().to_json()?, "Repeat counts");
    Ok(())
}
