//! Registry of live session cores.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use signet_core::IdentityId;
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, warn};

use crate::session::{SessionControl, SessionSignal};

#[derive(Clone)]
pub(crate) struct SessionEntry {
    pub core_id: u64,
    pub id: IdentityId,
    pub method: String,
    pub ctl: mpsc::UnboundedSender<SessionControl>,
    pub signals: broadcast::Sender<SessionSignal>,
}

/// Holds every live session core: cores of stored identities keyed by
/// `(id, method)` so handles share them, scratch cores in a flat list.
#[derive(Default)]
pub(crate) struct SessionRegistry {
    stored: Mutex<HashMap<(u32, String), SessionEntry>>,
    scratch: Mutex<Vec<SessionEntry>>,
    next_core: AtomicU64,
    next_path: AtomicU64,
}

impl SessionRegistry {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn next_session_path(&self) -> String {
        format!(
            "/AuthSession_{:x}",
            self.next_path.fetch_add(1, Ordering::SeqCst)
        )
    }

    /// The shared core for a stored identity, if it is still alive.
    /// Scratch identities never share cores.
    pub fn lookup(&self, id: IdentityId, method: &str) -> Option<SessionEntry> {
        if id.is_new() {
            return None;
        }
        self.prune();
        self.stored
            .lock()
            .get(&(id.as_u32(), method.to_owned()))
            .cloned()
    }

    /// Records a freshly spawned core and assigns its core id.
    pub fn insert(
        &self,
        id: IdentityId,
        method: &str,
        ctl: mpsc::UnboundedSender<SessionControl>,
        signals: broadcast::Sender<SessionSignal>,
    ) -> u64 {
        let core_id = self.next_core.fetch_add(1, Ordering::SeqCst);
        let entry = SessionEntry {
            core_id,
            id,
            method: method.to_owned(),
            ctl,
            signals,
        };
        if id.is_new() {
            self.scratch.lock().push(entry);
        } else {
            self.stored
                .lock()
                .insert((id.as_u32(), method.to_owned()), entry);
        }
        core_id
    }

    /// Rekeys a core after its identity changed id. A move onto an
    /// occupied `(id, method)` slot is rejected and logged; the core
    /// keeps its old key and later requests open a fresh session.
    pub fn rekey(&self, core_id: u64, new_id: IdentityId) {
        let mut scratch = self.scratch.lock();
        let mut stored = self.stored.lock();

        let entry = if let Some(index) = scratch.iter().position(|e| e.core_id == core_id) {
            scratch.remove(index)
        } else if let Some(key) = stored
            .iter()
            .find(|(_, e)| e.core_id == core_id)
            .map(|(k, _)| k.clone())
        {
            stored.remove(&key).expect("key was just found")
        } else {
            debug!(core_id, "rekey for unknown session core");
            return;
        };

        let mut entry = entry;
        if new_id.is_new() {
            entry.id = new_id;
            let _ = entry.ctl.send(SessionControl::SetId(new_id));
            scratch.push(entry);
            return;
        }

        let slot = (new_id.as_u32(), entry.method.clone());
        if stored.contains_key(&slot) {
            warn!(%new_id, method = %entry.method, "session slot already taken, rekey rejected");
            // Put the core back where it came from.
            if entry.id.is_new() {
                scratch.push(entry);
            } else {
                stored.insert((entry.id.as_u32(), entry.method.clone()), entry);
            }
            return;
        }
        entry.id = new_id;
        let _ = entry.ctl.send(SessionControl::SetId(new_id));
        stored.insert(slot, entry);
    }

    /// Control senders of every core attached to an identity.
    pub fn sessions_for(&self, id: IdentityId) -> Vec<mpsc::UnboundedSender<SessionControl>> {
        self.prune();
        self.stored
            .lock()
            .iter()
            .filter(|((raw, _), _)| *raw == id.as_u32())
            .map(|(_, entry)| entry.ctl.clone())
            .collect()
    }

    /// Destroys every core regardless of pending work. Daemon shutdown
    /// only.
    pub fn stop_all(&self) {
        let stored: Vec<SessionEntry> = self.stored.lock().drain().map(|(_, e)| e).collect();
        let scratch: Vec<SessionEntry> = self.scratch.lock().drain(..).collect();
        for entry in stored.into_iter().chain(scratch) {
            let _ = entry.ctl.send(SessionControl::Stop);
        }
    }

    /// Forgets cores whose task has exited.
    pub fn prune(&self) {
        self.stored.lock().retain(|_, entry| !entry.ctl.is_closed());
        self.scratch.lock().retain(|entry| !entry.ctl.is_closed());
    }

    #[cfg(test)]
    pub fn live_count(&self) -> usize {
        self.prune();
        self.stored.lock().len() + self.scratch.lock().len()
    }
}
