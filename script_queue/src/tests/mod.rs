//! Lifecycle and scenario tests for the script queue

mod host_tests;

use crate::config::ScriptQueueConfig;
use crate::queue::ScriptQueue;
use crate::registry::{ScriptClassId, ScriptRegistry};
use crate::script::{ScriptBehaviour, ScriptContext, ScriptSettings};
use std::sync::{Arc, Mutex};

pub(crate) type Log = Arc<Mutex<Vec<String>>>;

pub(crate) fn new_log() -> Log {
    Arc::new(Mutex::new(Vec::new()))
}

pub(crate) fn entries(log: &Log) -> Vec<String> {
    log.lock().unwrap().clone()
}

pub(crate) fn clear(log: &Log) {
    log.lock().unwrap().clear();
}

/// Behaviour that records every hook it receives
pub(crate) struct Recorder {
    name: &'static str,
    log: Log,
    finish_on_activate: Option<bool>,
    finish_after_updates: Option<(u32, bool)>,
    updates: u32,
}

impl Recorder {
    pub(crate) fn new(name: &'static str, log: &Log) -> Self {
        Self {
            name,
            log: log.clone(),
            finish_on_activate: None,
            finish_after_updates: None,
            updates: 0,
        }
    }

    pub(crate) fn finishing_on_activate(mut self, success: bool) -> Self {
        self.finish_on_activate = Some(success);
        self
    }

    pub(crate) fn finishing_after(mut self, updates: u32, success: bool) -> Self {
        self.finish_after_updates = Some((updates, success));
        self
    }

    fn record(&self, event: impl AsRef<str>) {
        self.log
            .lock()
            .unwrap()
            .push(format!("{}:{}", self.name, event.as_ref()));
    }
}

impl ScriptBehaviour for Recorder {
    fn on_added_to_queue(&mut self, _ctx: &mut ScriptContext<'_>) {
        self.record("added");
    }

    fn on_activate(&mut self, ctx: &mut ScriptContext<'_>) {
        self.updates = 0;
        self.record("activate");
        if let Some(success) = self.finish_on_activate {
            ctx.finish(success);
        }
    }

    fn on_update(&mut self, ctx: &mut ScriptContext<'_>, _delta_time: f32) {
        self.updates += 1;
        self.record("update");
        if let Some((after, success)) = self.finish_after_updates {
            if self.updates >= after {
                ctx.finish(success);
            }
        }
    }

    fn on_deactivate(&mut self, _ctx: &mut ScriptContext<'_>, success: bool) {
        self.record(format!("deactivate:{success}"));
    }
}

/// Queue with a few recording script classes
pub(crate) struct Fixture {
    pub queue: ScriptQueue,
    pub log: Log,
    /// Runs until deactivated from outside
    pub manual: ScriptClassId,
    /// Instant, runs until deactivated from outside
    pub instant: ScriptClassId,
    /// Finishes successfully as soon as it activates
    pub quick: ScriptClassId,
    /// Finishes successfully on its second update
    pub timed: ScriptClassId,
    /// Never returns to the pool
    pub unpooled: ScriptClassId,
}

pub(crate) fn registry_with(log: &Log) -> ScriptRegistry {
    let mut registry = ScriptRegistry::new();

    let l = log.clone();
    registry
        .register_with_factory("manual", ScriptSettings::default(), move || {
            Box::new(Recorder::new("manual", &l))
        })
        .unwrap();
    let l = log.clone();
    registry
        .register_with_factory("instant", ScriptSettings::instant(), move || {
            Box::new(Recorder::new("instant", &l))
        })
        .unwrap();
    let l = log.clone();
    registry
        .register_with_factory("quick", ScriptSettings::default(), move || {
            Box::new(Recorder::new("quick", &l).finishing_on_activate(true))
        })
        .unwrap();
    let l = log.clone();
    registry
        .register_with_factory("timed", ScriptSettings::default(), move || {
            Box::new(Recorder::new("timed", &l).finishing_after(2, true))
        })
        .unwrap();
    let l = log.clone();
    registry
        .register_with_factory(
            "unpooled",
            ScriptSettings::default().with_pool(false),
            move || Box::new(Recorder::new("unpooled", &l)),
        )
        .unwrap();

    registry
}

pub(crate) fn fixture_with(config: ScriptQueueConfig) -> Fixture {
    let log = new_log();
    let registry = Arc::new(registry_with(&log));
    let class = |name: &str| registry.class_by_name(name).unwrap();
    let (manual, instant, quick, timed, unpooled) = (
        class("manual"),
        class("instant"),
        class("quick"),
        class("timed"),
        class("unpooled"),
    );

    let mut queue = ScriptQueue::new(registry.clone(), &config);
    queue.activate();

    Fixture {
        queue,
        log,
        manual,
        instant,
        quick,
        timed,
        unpooled,
    }
}

pub(crate) fn fixture() -> Fixture {
    fixture_with(ScriptQueueConfig::default())
}

impl Fixture {
    /// Create and submit a script, panicking on failure
    pub(crate) fn submit(&mut self, class: ScriptClassId) -> crate::ScriptHandle {
        let script = self.queue.create_script(class, 0).unwrap();
        self.queue.add_script_to_queue(script).unwrap();
        script
    }

    pub(crate) fn tick(&mut self) {
        self.queue.on_update(0.016);
    }
}
