//! Instance registry
//!
//! Process-wide map from instance id to live pair instance, weakly held:
//! registry membership must not keep an otherwise-unreferenced instance
//! alive. A missing id is a valid, expected outcome - messages addressed
//! to a since-collected object are dropped by the caller.

use std::collections::HashMap;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tether_core::InstanceId;

use crate::Pair;

/// Weak map from instance id to pair instance
#[derive(Default)]
pub struct InstanceRegistry {
    inner: Mutex<HashMap<InstanceId, Weak<Pair>>>,
}

impl InstanceRegistry {
    pub fn new() -> Self {
        InstanceRegistry::default()
    }

    /// Insert an instance under weak ownership.
    pub fn register(&self, instance: &Arc<Pair>) {
        self.inner
            .lock()
            .insert(instance.id().clone(), Arc::downgrade(instance));
    }

    /// Look up an instance. Returns None if the id was never registered or
    /// the instance has been collected; a dead entry is pruned on the way.
    pub fn lookup(&self, id: &InstanceId) -> Option<Arc<Pair>> {
        let mut map = self.inner.lock();
        match map.get(id) {
            Some(weak) => match weak.upgrade() {
                Some(live) => Some(live),
                None => {
                    map.remove(id);
                    None
                }
            },
            None => None,
        }
    }

    /// Remove an entry explicitly (destroy notification path).
    pub fn remove(&self, id: &InstanceId) -> bool {
        self.inner.lock().remove(id).is_some()
    }

    /// Drop all entries whose instance has been collected.
    pub fn sweep(&self) {
        self.inner.lock().retain(|_, weak| weak.strong_count() > 0);
    }

    /// Number of live entries.
    pub fn len(&self) -> usize {
        self.inner
            .lock()
            .values()
            .filter(|weak| weak.strong_count() > 0)
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
