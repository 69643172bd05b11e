//! Registry of live identity objects.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use signet_core::IdentityId;
use tracing::{debug, warn};

use crate::identity::IdentityObject;

/// Holds every live identity object: stored ones keyed by id (so all
/// handles for an id share one object) and scratch ones keyed by their
/// object path until they are stored.
#[derive(Default)]
pub(crate) struct IdentityRegistry {
    stored: Mutex<HashMap<u32, Arc<IdentityObject>>>,
    scratch: Mutex<HashMap<String, Arc<IdentityObject>>>,
    next_path: AtomicU64,
}

impl IdentityRegistry {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn next_object_path(&self) -> String {
        format!("/Identity_{:x}", self.next_path.fetch_add(1, Ordering::SeqCst))
    }

    pub fn get_stored(&self, id: IdentityId) -> Option<Arc<IdentityObject>> {
        self.stored.lock().get(&id.as_u32()).cloned()
    }

    pub fn insert_stored(&self, id: IdentityId, object: Arc<IdentityObject>) {
        self.stored.lock().insert(id.as_u32(), object);
    }

    pub fn insert_scratch(&self, object: Arc<IdentityObject>) {
        self.scratch
            .lock()
            .insert(object.object_path().to_owned(), object);
    }

    /// Moves a freshly stored scratch object under its assigned id.
    pub fn promote(&self, object_path: &str, id: IdentityId) {
        let Some(object) = self.scratch.lock().remove(object_path) else {
            debug!(object_path, "promote on unknown scratch object");
            return;
        };
        if self.stored.lock().insert(id.as_u32(), object).is_some() {
            // The store just assigned this id; nothing else may hold it.
            warn!(%id, "promotion displaced an existing identity object");
        }
    }

    /// Drops every object idle past its timeout, notifying lingering
    /// handles first.
    pub fn reap_expired(&self) {
        let mut reaped = 0usize;
        {
            let mut stored = self.stored.lock();
            stored.retain(|_, object| {
                let keep = !object.is_expired();
                if !keep {
                    object.unregister();
                    reaped += 1;
                }
                keep
            });
        }
        {
            let mut scratch = self.scratch.lock();
            scratch.retain(|_, object| {
                let keep = !object.is_expired();
                if !keep {
                    object.unregister();
                    reaped += 1;
                }
                keep
            });
        }
        if reaped > 0 {
            debug!(reaped, "identity objects reaped");
        }
    }

    #[cfg(test)]
    pub fn live_count(&self) -> usize {
        self.stored.lock().len() + self.scratch.lock().len()
    }
}
