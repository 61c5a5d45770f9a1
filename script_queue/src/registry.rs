//! Script class registry
//!
//! Script classes are the type identifiers of the queue: each class has a
//! unique name, default [`ScriptSettings`] and a factory that builds a fresh
//! behaviour. A class id that is not registered in the queue's registry is
//! treated as an invalid type identifier.

use crate::error::ScriptQueueError;
use crate::script::{ScriptBehaviour, ScriptSettings};
use std::any::TypeId;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// A function that builds a new behaviour instance for a script class
pub type ScriptFactoryFn = Arc<dyn Fn() -> Box<dyn ScriptBehaviour> + Send + Sync>;

/// Identifier of a registered script class
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ScriptClassId(u32);

impl ScriptClassId {
    pub fn index(&self) -> usize {
        self.0 as usize
    }
}

/// Metadata for one registered script class
pub struct ScriptClass {
    id: ScriptClassId,
    name: String,
    defaults: ScriptSettings,
    factory: ScriptFactoryFn,
}

impl ScriptClass {
    pub fn id(&self) -> ScriptClassId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Settings every new or recycled instance of this class starts with
    pub fn defaults(&self) -> ScriptSettings {
        self.defaults
    }

    pub(crate) fn instantiate(&self) -> Box<dyn ScriptBehaviour> {
        (self.factory)()
    }
}

impl fmt::Debug for ScriptClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScriptClass")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("defaults", &self.defaults)
            .finish()
    }
}

/// Registry of script classes known to a queue
#[derive(Default)]
pub struct ScriptRegistry {
    classes: Vec<ScriptClass>,
    /// Maps class names to ids for lookup
    name_to_class: HashMap<String, ScriptClassId>,
    /// Maps Rust types to ids for typed registrations
    type_to_class: HashMap<TypeId, ScriptClassId>,
}

impl ScriptRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a behaviour type that can be built with `Default`
    pub fn register<T>(
        &mut self,
        name: &str,
        defaults: ScriptSettings,
    ) -> Result<ScriptClassId, ScriptQueueError>
    where
        T: ScriptBehaviour + Default,
    {
        let id = self.insert(
            name,
            Some(TypeId::of::<T>()),
            defaults,
            Arc::new(|| Box::new(T::default()) as Box<dyn ScriptBehaviour>),
        )?;
        self.type_to_class.entry(TypeId::of::<T>()).or_insert(id);
        Ok(id)
    }

    /// Register a class backed by an arbitrary factory
    ///
    /// Useful when several classes share one behaviour type with different
    /// parameters baked into the factory.
    pub fn register_with_factory<F>(
        &mut self,
        name: &str,
        defaults: ScriptSettings,
        factory: F,
    ) -> Result<ScriptClassId, ScriptQueueError>
    where
        F: Fn() -> Box<dyn ScriptBehaviour> + Send + Sync + 'static,
    {
        self.insert(name, None, defaults, Arc::new(factory))
    }

    fn insert(
        &mut self,
        name: &str,
        type_id: Option<TypeId>,
        defaults: ScriptSettings,
        factory: ScriptFactoryFn,
    ) -> Result<ScriptClassId, ScriptQueueError> {
        if self.name_to_class.contains_key(name) {
            return Err(ScriptQueueError::DuplicateClass(name.to_string()));
        }

        let id = ScriptClassId(self.classes.len() as u32);
        self.classes.push(ScriptClass {
            id,
            name: name.to_string(),
            defaults,
            factory,
        });
        self.name_to_class.insert(name.to_string(), id);

        debug!(
            class = name,
            id = id.0,
            instant = defaults.instant,
            use_pool = defaults.use_pool,
            typed = type_id.is_some(),
            "Registered script class"
        );
        Ok(id)
    }

    /// Get a registered class
    pub fn get(&self, id: ScriptClassId) -> Option<&ScriptClass> {
        self.classes.get(id.index())
    }

    /// Check whether `id` names a registered class
    pub fn contains(&self, id: ScriptClassId) -> bool {
        id.index() < self.classes.len()
    }

    pub fn class_by_name(&self, name: &str) -> Option<ScriptClassId> {
        self.name_to_class.get(name).copied()
    }

    /// Look up the class first registered for behaviour type `T`
    pub fn class_of<T: ScriptBehaviour>(&self) -> Option<ScriptClassId> {
        self.type_to_class.get(&TypeId::of::<T>()).copied()
    }

    /// Name of a class, or `"<unknown>"` for ids this registry never issued
    pub fn class_name(&self, id: ScriptClassId) -> &str {
        self.get(id).map(ScriptClass::name).unwrap_or("<unknown>")
    }

    pub fn iter(&self) -> impl Iterator<Item = &ScriptClass> {
        self.classes.iter()
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }
}

impl fmt::Debug for ScriptRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScriptRegistry")
            .field(
                "classes",
                &self.classes.iter().map(ScriptClass::name).collect::<Vec<_>>(),
            )
            .finish()
    }
}
