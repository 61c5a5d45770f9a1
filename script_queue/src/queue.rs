//! Script queue: ordered and instant script containers driven by an update pass
//!
//! The queue owns the object store holding every script it created, the
//! ordered queue (only its head may run), the unordered instant set (every
//! member runs each pass), the pool of finished reusable scripts and the
//! per-class completion counts that enforce repeat limits.
//!
//! Ticking is a two-state machine: the queue is `Idle` until a script is
//! submitted while the queue is active, and goes back to `Idle` when the last
//! script finishes or the queue is deactivated.

use crate::config::{PoolCapacity, ScriptQueueConfig};
use crate::error::ScriptQueueError;
use crate::events::{QueueEvents, ScriptInfo, ScriptOutcome, SubscriberId};
use crate::registry::{ScriptClassId, ScriptRegistry};
use crate::script::{
    ScriptBehaviour, ScriptBody, ScriptContext, ScriptEvents, ScriptHandle, ScriptSettings,
    ScriptState,
};
use hecs::Entity;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, info, trace, warn};

static NEXT_QUEUE_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique identity of a [`ScriptQueue`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct QueueId(u64);

impl QueueId {
    fn next() -> Self {
        Self(NEXT_QUEUE_ID.fetch_add(1, Ordering::Relaxed))
    }
}

/// Whether the per-update pass runs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickState {
    Idle,
    Ticking,
}

/// Sequencer for scripted game events
pub struct ScriptQueue {
    id: QueueId,
    registry: Arc<ScriptRegistry>,
    pool_size: PoolCapacity,
    /// Object store for every script this queue created
    objects: hecs::World,
    queue: VecDeque<Entity>,
    instant_scripts: Vec<Entity>,
    script_pool: VecDeque<Entity>,
    counts: HashMap<ScriptClassId, u32>,
    created_scripts: Vec<ScriptHandle>,
    active: bool,
    tick: TickState,
    events: QueueEvents,
}

impl ScriptQueue {
    pub fn new(registry: Arc<ScriptRegistry>, config: &ScriptQueueConfig) -> Self {
        let id = QueueId::next();
        debug!(
            queue = ?id,
            pool_size = i32::from(config.pool_size),
            auto_activate = config.auto_activate,
            classes = registry.len(),
            "Created script queue"
        );
        Self {
            id,
            registry,
            pool_size: config.pool_size,
            objects: hecs::World::new(),
            queue: VecDeque::new(),
            instant_scripts: Vec::new(),
            script_pool: VecDeque::new(),
            counts: HashMap::new(),
            created_scripts: Vec::new(),
            active: config.auto_activate,
            tick: TickState::Idle,
            events: QueueEvents::default(),
        }
    }

    pub fn id(&self) -> QueueId {
        self.id
    }

    pub fn registry(&self) -> &Arc<ScriptRegistry> {
        &self.registry
    }

    pub fn pool_capacity(&self) -> PoolCapacity {
        self.pool_size
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Activate the queue; ticking resumes only if work is pending
    pub fn activate(&mut self) {
        self.active = true;
        self.set_ticking(self.has_queue());
    }

    /// Deactivate the queue; ticking stops even if work is pending
    pub fn deactivate(&mut self) {
        self.active = false;
        self.set_ticking(false);
    }

    pub fn tick_state(&self) -> TickState {
        self.tick
    }

    pub fn is_ticking(&self) -> bool {
        self.tick == TickState::Ticking
    }

    fn set_ticking(&mut self, enabled: bool) {
        let next = if enabled {
            TickState::Ticking
        } else {
            TickState::Idle
        };
        if self.tick != next {
            trace!(queue = ?self.id, from = ?self.tick, to = ?next, "Tick state changed");
            self.tick = next;
        }
    }

    pub fn events(&self) -> &QueueEvents {
        &self.events
    }

    pub fn events_mut(&mut self) -> &mut QueueEvents {
        &mut self.events
    }

    /// Remove `subscriber` from the queue-level channels
    pub fn clear_all_events(&mut self, subscriber: SubscriberId) {
        self.events.clear_all(subscriber);
    }

    /// Per-script notification channels, if the script is alive
    pub fn script_events_mut(&mut self, script: ScriptHandle) -> Option<&mut ScriptEvents> {
        if script.queue() != self.id {
            return None;
        }
        self.objects
            .query_one_mut::<&mut ScriptEvents>(script.entity())
            .ok()
    }

    /// Liveness check for a script handle
    pub fn is_valid(&self, script: ScriptHandle) -> bool {
        script.queue() == self.id && self.objects.contains(script.entity())
    }

    fn handle(&self, entity: Entity) -> ScriptHandle {
        ScriptHandle::new(self.id, entity)
    }

    /// Destroy a script object, invalidating every handle to it
    ///
    /// Containers still referring to it are pruned lazily by the update pass.
    pub fn destroy_script(&mut self, script: ScriptHandle) -> bool {
        if !self.is_valid(script) {
            return false;
        }
        let destroyed = self.objects.despawn(script.entity()).is_ok();
        debug!(script = ?script, "Destroyed script");
        destroyed
    }

    /// Bind a script object to this queue
    pub fn initialize_script(&mut self, script: ScriptHandle) -> Result<(), ScriptQueueError> {
        if script.queue() != self.id {
            return Err(ScriptQueueError::InvalidScript(script));
        }
        let owner = self.id;
        let state = self
            .objects
            .query_one_mut::<&mut ScriptState>(script.entity())
            .map_err(|_| ScriptQueueError::InvalidScript(script))?;
        state.owner = Some(owner);
        Ok(())
    }

    /// Whether the script is alive and bound to this queue
    pub fn owns(&self, script: ScriptHandle) -> bool {
        self.is_valid(script)
            && self
                .objects
                .get::<&ScriptState>(script.entity())
                .map(|state| state.owner == Some(self.id))
                .unwrap_or(false)
    }

    pub fn is_script_active(&self, script: ScriptHandle) -> bool {
        self.is_valid(script)
            && self
                .objects
                .get::<&ScriptState>(script.entity())
                .map(|state| state.active)
                .unwrap_or(false)
    }

    pub fn script_settings(&self, script: ScriptHandle) -> Option<ScriptSettings> {
        if !self.is_valid(script) {
            return None;
        }
        self.objects
            .get::<&ScriptState>(script.entity())
            .ok()
            .map(|state| state.settings)
    }

    pub fn script_class(&self, script: ScriptHandle) -> Option<ScriptClassId> {
        if !self.is_valid(script) {
            return None;
        }
        self.objects
            .get::<&ScriptState>(script.entity())
            .ok()
            .map(|state| state.class)
    }

    /// Typed access to a script's behaviour
    ///
    /// Returns `None` while one of the script's own hooks is running.
    pub fn behaviour_mut<T: ScriptBehaviour>(&mut self, script: ScriptHandle) -> Option<&mut T> {
        if script.queue() != self.id {
            return None;
        }
        self.objects
            .query_one_mut::<&mut ScriptBody>(script.entity())
            .ok()?
            .0
            .as_deref_mut()?
            .as_any_mut()
            .downcast_mut::<T>()
    }

    fn class_name(&self, class: ScriptClassId) -> &str {
        self.registry.class_name(class)
    }

    fn script_info(&self, script: ScriptHandle) -> Option<ScriptInfo> {
        self.script_class(script).map(|class| ScriptInfo {
            handle: script,
            class,
        })
    }

    /// Create a script of `class`, reusing a pooled instance when possible
    ///
    /// `repeat_limit` caps how many times this class may ever complete
    /// through the queue; `0` means unlimited. The new script is bound to
    /// this queue and joins the construction batch, but is not queued until
    /// [`add_script_to_queue`](Self::add_script_to_queue) is called.
    ///
    /// A script that is never submitted stays alive in the object store, and a
    /// pooled instance taken this way does not go back to the pool. Callers
    /// that abandon a script must release it with
    /// [`destroy_script`](Self::destroy_script).
    pub fn create_script(
        &mut self,
        class: ScriptClassId,
        repeat_limit: u32,
    ) -> Result<ScriptHandle, ScriptQueueError> {
        let registry = Arc::clone(&self.registry);
        let Some(script_class) = registry.get(class) else {
            warn!(class = ?class, "Refusing to create script of unknown class");
            return Err(ScriptQueueError::UnknownClass(format!("{class:?}")));
        };

        let completed = self.repeat_count(class);
        if repeat_limit > 0 && completed >= repeat_limit {
            debug!(
                class = script_class.name(),
                completed,
                repeat_limit,
                "Script class reached its repeat limit"
            );
            return Err(ScriptQueueError::RepeatLimitReached {
                class: script_class.name().to_string(),
                completed,
                limit: repeat_limit,
            });
        }

        let entity = match self.take_pooled(class) {
            Some(entity) => {
                if let Ok(state) = self.objects.query_one_mut::<&mut ScriptState>(entity) {
                    state.settings = script_class.defaults();
                    state.active = false;
                    state.pending_outcome = None;
                }
                debug!(class = script_class.name(), entity = ?entity, "Reusing pooled script");
                entity
            }
            None => {
                let entity = self.objects.spawn((
                    ScriptState::new(class, script_class.defaults()),
                    ScriptEvents::default(),
                    ScriptBody(Some(script_class.instantiate())),
                ));
                debug!(class = script_class.name(), entity = ?entity, "Constructed script");
                entity
            }
        };

        let script = self.handle(entity);
        self.initialize_script(script)?;
        self.created_scripts.push(script);
        Ok(script)
    }

    /// Create a script by class name
    pub fn create_script_by_name(
        &mut self,
        name: &str,
        repeat_limit: u32,
    ) -> Result<ScriptHandle, ScriptQueueError> {
        let class = self
            .registry
            .class_by_name(name)
            .ok_or_else(|| ScriptQueueError::UnknownClass(name.to_string()))?;
        self.create_script(class, repeat_limit)
    }

    /// Remove the first live pooled script of `class`, scanning oldest first
    fn take_pooled(&mut self, class: ScriptClassId) -> Option<Entity> {
        let objects = &self.objects;
        self.script_pool.retain(|entity| objects.contains(*entity));

        let index = self.script_pool.iter().position(|entity| {
            self.objects
                .get::<&ScriptState>(*entity)
                .map(|state| state.class == class)
                .unwrap_or(false)
        })?;
        self.script_pool.remove(index)
    }

    /// Scripts created since the last submission
    pub fn created_scripts(&self) -> &[ScriptHandle] {
        &self.created_scripts
    }

    /// Adjust a script's settings before it is submitted
    ///
    /// Only scripts in the current construction batch can be configured.
    pub fn configure_script<F>(
        &mut self,
        script: ScriptHandle,
        configure: F,
    ) -> Result<ScriptSettings, ScriptQueueError>
    where
        F: FnOnce(&mut ScriptSettings),
    {
        if !self.is_valid(script) {
            return Err(ScriptQueueError::InvalidScript(script));
        }
        if !self.created_scripts.contains(&script) {
            return Err(ScriptQueueError::NotConfigurable(script));
        }
        let state = self
            .objects
            .query_one_mut::<&mut ScriptState>(script.entity())
            .map_err(|_| ScriptQueueError::InvalidScript(script))?;
        configure(&mut state.settings);
        Ok(state.settings)
    }

    /// Submit a script for execution
    ///
    /// Instant scripts join the instant set, others go to the tail of the
    /// queue. Submission finalizes the construction batch.
    pub fn add_script_to_queue(&mut self, script: ScriptHandle) -> Result<(), ScriptQueueError> {
        let Some(info) = self.script_info(script) else {
            warn!(script = ?script, "Refusing to queue invalid script");
            return Err(ScriptQueueError::InvalidScript(script));
        };
        let entity = script.entity();
        if self.queue.contains(&entity) || self.instant_scripts.contains(&entity) {
            warn!(script = ?script, "Script is already queued");
            return Err(ScriptQueueError::AlreadyQueued(script));
        }
        if let Some(index) = self.script_pool.iter().position(|pooled| *pooled == entity) {
            self.script_pool.remove(index);
        }

        let instant = self
            .script_settings(script)
            .map(|settings| settings.instant)
            .unwrap_or(false);
        if instant {
            self.instant_scripts.push(entity);
        } else {
            self.queue.push_back(entity);
        }
        debug!(
            script = ?script,
            class = self.class_name(info.class),
            instant,
            queued = self.queue.len(),
            instants = self.instant_scripts.len(),
            "Added script to queue"
        );

        self.events.script_added.broadcast(&info);
        self.run_hook(script, |behaviour, ctx| behaviour.on_added_to_queue(ctx));
        self.set_ticking(self.active);
        self.created_scripts.clear();
        Ok(())
    }

    /// Whether any queued or instant work is pending
    pub fn has_queue(&self) -> bool {
        !self.queue.is_empty() || !self.instant_scripts.is_empty()
    }

    /// Whether a live script of exactly `class` is queued or running
    pub fn has_script_in_queue(&self, class: ScriptClassId) -> bool {
        self.queue
            .iter()
            .chain(self.instant_scripts.iter())
            .any(|entity| {
                self.objects
                    .get::<&ScriptState>(*entity)
                    .map(|state| state.class == class)
                    .unwrap_or(false)
            })
    }

    /// Number of times scripts of `class` have finished
    pub fn repeat_count(&self, class: ScriptClassId) -> u32 {
        self.counts.get(&class).copied().unwrap_or(0)
    }

    pub(crate) fn repeat_counts(&self) -> impl Iterator<Item = (ScriptClassId, u32)> + '_ {
        self.counts.iter().map(|(class, count)| (*class, *count))
    }

    /// Raise the stored count for `class` to at least `count`
    pub(crate) fn merge_repeat_count(&mut self, class: ScriptClassId, count: u32) {
        let current = self.counts.entry(class).or_insert(0);
        *current = (*current).max(count);
    }

    /// Ordered queue entries, head first, including stale handles
    pub fn queued_scripts(&self) -> Vec<ScriptHandle> {
        self.queue.iter().map(|entity| self.handle(*entity)).collect()
    }

    pub fn instant_scripts(&self) -> Vec<ScriptHandle> {
        self.instant_scripts
            .iter()
            .map(|entity| self.handle(*entity))
            .collect()
    }

    /// Pooled scripts, oldest first
    pub fn pooled_scripts(&self) -> Vec<ScriptHandle> {
        self.script_pool
            .iter()
            .map(|entity| self.handle(*entity))
            .collect()
    }

    /// Number of script objects alive in the object store
    pub fn live_script_count(&self) -> usize {
        self.objects.len() as usize
    }

    /// Activate a script
    ///
    /// No-op if the script is invalid, already active, not bound to this
    /// queue, or if one of its own hooks is running.
    pub fn activate_script(&mut self, script: ScriptHandle) -> bool {
        if !self.is_valid(script) {
            return false;
        }
        let owner = self.id;
        let class = match self
            .objects
            .query_one_mut::<(&mut ScriptState, &ScriptBody)>(script.entity())
        {
            Ok((state, body)) => {
                if state.active || state.owner != Some(owner) || body.0.is_none() {
                    return false;
                }
                state.active = true;
                state.class
            }
            Err(_) => return false,
        };

        let info = ScriptInfo {
            handle: script,
            class,
        };
        debug!(script = ?script, class = self.class_name(class), "Activating script");

        self.events.script_started.broadcast(&info);
        if let Ok(events) = self.objects.query_one_mut::<&mut ScriptEvents>(script.entity()) {
            events.started.broadcast(&info);
        }
        self.run_hook(script, |behaviour, ctx| behaviour.on_activate(ctx));
        true
    }

    /// Deactivate a script with an outcome and report it to the queue
    ///
    /// No-op if the script is invalid, inactive or not bound to this queue.
    /// When called while one of the script's own hooks is running, the
    /// deactivation is applied as soon as that hook returns.
    pub fn deactivate_script(&mut self, script: ScriptHandle, success: bool) -> bool {
        if !self.is_valid(script) {
            return false;
        }
        let owner = self.id;
        let class = match self
            .objects
            .query_one_mut::<(&mut ScriptState, &ScriptBody)>(script.entity())
        {
            Ok((state, body)) => {
                if !state.active || state.owner != Some(owner) {
                    return false;
                }
                if body.0.is_none() {
                    trace!(script = ?script, success, "Deferring deactivation until hook returns");
                    state.pending_outcome = Some(success);
                    return true;
                }
                state.active = false;
                state.class
            }
            Err(_) => return false,
        };

        let outcome = ScriptOutcome {
            script: ScriptInfo {
                handle: script,
                class,
            },
            success,
        };
        debug!(
            script = ?script,
            class = self.class_name(class),
            success,
            "Deactivating script"
        );

        self.run_hook(script, move |behaviour, ctx| {
            behaviour.on_deactivate(ctx, success)
        });
        if let Ok(events) = self.objects.query_one_mut::<&mut ScriptEvents>(script.entity()) {
            events.finished.broadcast(&outcome);
            events.clear_all();
        }
        self.events.script_finished.broadcast(&outcome);
        self.on_script_finished(script, success);
        true
    }

    /// Completion handler, reached only through [`deactivate_script`](Self::deactivate_script)
    pub(crate) fn on_script_finished(&mut self, script: ScriptHandle, success: bool) -> bool {
        let Some(settings) = self.script_settings(script) else {
            return false;
        };
        let Some(class) = self.script_class(script) else {
            return false;
        };
        let entity = script.entity();

        let pooled = settings.use_pool && self.pool_size.is_enabled();
        if pooled && !self.script_pool.contains(&entity) {
            if let Some(limit) = self.pool_size.limit() {
                if self.script_pool.len() >= limit {
                    if let Some(evicted) = self.script_pool.pop_front() {
                        self.release(evicted);
                        debug!(evicted = ?evicted, "Evicted oldest pooled script");
                    }
                }
            }
            self.script_pool.push_back(entity);
        }

        let count = self.counts.entry(class).or_insert(0);
        *count += 1;
        debug!(
            script = ?script,
            class = self.class_name(class),
            success,
            completions = self.repeat_count(class),
            pooled,
            "Script finished"
        );

        if self.queue.front() == Some(&entity) {
            self.queue.pop_front();
        } else if let Some(index) = self.instant_scripts.iter().position(|e| *e == entity) {
            self.instant_scripts.remove(index);
        }

        if !pooled && !self.queue.contains(&entity) && !self.instant_scripts.contains(&entity) {
            self.release(entity);
        }

        if self.queue.is_empty() && self.instant_scripts.is_empty() {
            info!(queue = ?self.id, "Script queue finished");
            self.events.queue_finished.broadcast(&());
            self.set_ticking(false);
        }
        true
    }

    /// Drop a script object that no container refers to any more
    fn release(&mut self, entity: Entity) {
        if self.objects.despawn(entity).is_ok() {
            trace!(entity = ?entity, "Released script object");
        }
    }

    /// Per-frame update, a no-op while the queue is idle
    ///
    /// Activates the head of the queue (dropping it instead if it was
    /// destroyed), then activates every live instant script from a snapshot
    /// taken after pruning, so scripts added by those activations wait for
    /// the next pass. An instant finished earlier in the pass is skipped.
    pub fn on_update(&mut self, delta_time: f32) {
        if !self.is_ticking() {
            return;
        }

        if let Some(&head) = self.queue.front() {
            if self.objects.contains(head) {
                let script = self.handle(head);
                self.activate_script(script);
                self.update_script(script, delta_time);
            } else {
                self.queue.pop_front();
                debug!(entity = ?head, "Dropped destroyed script from queue head");
            }
        }

        let objects = &self.objects;
        let before = self.instant_scripts.len();
        self.instant_scripts.retain(|entity| objects.contains(*entity));
        if self.instant_scripts.len() != before {
            debug!(
                pruned = before - self.instant_scripts.len(),
                "Pruned destroyed instant scripts"
            );
        }

        let snapshot = self.instant_scripts.clone();
        trace!(
            queue = ?self.id,
            queued = self.queue.len(),
            instants = snapshot.len(),
            "Update pass"
        );
        for entity in snapshot {
            // Finished earlier in this pass
            if !self.objects.contains(entity) || self.script_pool.contains(&entity) {
                continue;
            }
            let script = self.handle(entity);
            self.activate_script(script);
            self.update_script(script, delta_time);
        }
    }

    fn update_script(&mut self, script: ScriptHandle, delta_time: f32) {
        if self.is_script_active(script) {
            self.run_hook(script, move |behaviour, ctx| {
                behaviour.on_update(ctx, delta_time)
            });
        }
    }

    /// Run one of a script's hooks with its behaviour checked out of the store
    fn run_hook<F>(&mut self, script: ScriptHandle, hook: F) -> bool
    where
        F: FnOnce(&mut Box<dyn ScriptBehaviour>, &mut ScriptContext<'_>),
    {
        let Some(mut behaviour) = self.checkout(script) else {
            return false;
        };
        hook(&mut behaviour, &mut ScriptContext::new(self, script));
        self.checkin(script, behaviour);
        true
    }

    fn checkout(&mut self, script: ScriptHandle) -> Option<Box<dyn ScriptBehaviour>> {
        if !self.is_valid(script) {
            return None;
        }
        self.objects
            .query_one_mut::<&mut ScriptBody>(script.entity())
            .ok()?
            .0
            .take()
    }

    fn checkin(&mut self, script: ScriptHandle, behaviour: Box<dyn ScriptBehaviour>) {
        let pending = match self
            .objects
            .query_one_mut::<(&mut ScriptBody, &mut ScriptState)>(script.entity())
        {
            Ok((body, state)) => {
                body.0 = Some(behaviour);
                state.pending_outcome.take()
            }
            Err(_) => {
                debug!(script = ?script, "Script destroyed during its own hook");
                return;
            }
        };

        if let Some(success) = pending {
            self.deactivate_script(script, success);
        }
    }
}

impl std::fmt::Debug for ScriptQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScriptQueue")
            .field("id", &self.id)
            .field("pool_size", &self.pool_size)
            .field("queued", &self.queue.len())
            .field("instants", &self.instant_scripts.len())
            .field("pooled", &self.script_pool.len())
            .field("active", &self.active)
            .field("tick", &self.tick)
            .finish()
    }
}
