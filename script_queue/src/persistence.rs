//! Save-game support for per-class completion counts
//!
//! Counts are stored by class name so a snapshot survives registries that
//! assign different ids across runs.

use crate::queue::ScriptQueue;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, warn};

/// Completion counts keyed by script class name
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepeatCountSnapshot {
    pub counts: BTreeMap<String, u32>,
}

impl RepeatCountSnapshot {
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

impl ScriptQueue {
    /// Capture the completion counts of every class that has finished at least once
    pub fn save_repeat_counts(&self) -> RepeatCountSnapshot {
        let registry = self.registry();
        let counts = self
            .repeat_counts()
            .filter_map(|(class, count)| {
                registry
                    .get(class)
                    .map(|script_class| (script_class.name().to_string(), count))
            })
            .collect::<BTreeMap<_, _>>();
        debug!(classes = counts.len(), "Saved repeat counts");
        RepeatCountSnapshot { counts }
    }

    /// Merge saved completion counts back in
    ///
    /// Counts never decrease: each class keeps the larger of its current and
    /// saved value. Names missing from the registry are skipped.
    pub fn restore_repeat_counts(&mut self, snapshot: &RepeatCountSnapshot) {
        let registry = self.registry().clone();
        for (name, count) in &snapshot.counts {
            match registry.class_by_name(name) {
                Some(class) => self.merge_repeat_count(class, *count),
                None => warn!(class = %name, "Skipping repeat count for unknown script class"),
            }
        }
        debug!(classes = snapshot.counts.len(), "Restored repeat counts");
    }
}
