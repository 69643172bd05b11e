//! In-memory reference implementation of the store contract.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use async_trait::async_trait;
use dashmap::DashMap;
use signet_core::{IdentityFilter, IdentityId, IdentityInfo, SecretString, SessionData};
use signet_eventbus::{EventBus, Subscription};
use tracing::{debug, info};

use crate::error::StoreError;
use crate::traits::{CredentialsStore, StoreEvent};

/// A complete store kept in process memory.
///
/// Backs the test suite and the scratch-cache path of a daemon running
/// without an attached secrets database. Ids are assigned densely
/// starting at 1. All mutations broadcast
/// [`StoreEvent::CredentialsUpdated`].
pub struct MemoryStore {
    identities: DashMap<u32, IdentityInfo>,
    blobs: DashMap<(u32, String), SessionData>,
    references: DashMap<u32, HashSet<(String, String)>>,
    next_id: AtomicU32,
    ready: AtomicBool,
    secrets_open: AtomicBool,
    bus: EventBus<StoreEvent>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            identities: DashMap::new(),
            blobs: DashMap::new(),
            references: DashMap::new(),
            next_id: AtomicU32::new(1),
            ready: AtomicBool::new(true),
            secrets_open: AtomicBool::new(true),
            bus: EventBus::new(),
        }
    }

    /// Flips store readiness; announces [`StoreEvent::StorageReady`]
    /// when it comes up.
    pub fn set_ready(&self, ready: bool) {
        self.ready.store(ready, Ordering::SeqCst);
        if ready {
            self.bus.publish(StoreEvent::StorageReady);
        }
    }

    /// Flips the secrets-database flag and announces the transition.
    pub fn set_secrets_open(&self, open: bool) {
        let was = self.secrets_open.swap(open, Ordering::SeqCst);
        if was != open {
            info!(open, "secrets storage availability changed");
            self.bus.publish(if open {
                StoreEvent::SecretsStorageOpened
            } else {
                StoreEvent::SecretsStorageClosed
            });
        }
    }

    /// Current reference triples of an identity, for inspection.
    pub fn references_of(&self, id: IdentityId) -> Vec<(String, String)> {
        self.references
            .get(&id.as_u32())
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default()
    }

    fn guard_ready(&self) -> Result<(), StoreError> {
        if self.is_ready() {
            Ok(())
        } else {
            Err(StoreError::Unavailable)
        }
    }

    fn record(&self, id: IdentityId) -> Result<IdentityInfo, StoreError> {
        self.identities
            .get(&id.as_u32())
            .map(|r| r.clone())
            .ok_or(StoreError::NotFound { id })
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CredentialsStore for MemoryStore {
    async fn credentials(
        &self,
        id: IdentityId,
        with_secret: bool,
    ) -> Result<IdentityInfo, StoreError> {
        self.guard_ready()?;
        let info = self.record(id)?;
        Ok(if with_secret {
            info
        } else {
            info.without_secret()
        })
    }

    async fn insert_credentials(
        &self,
        info: &IdentityInfo,
        store_secret: bool,
    ) -> Result<IdentityId, StoreError> {
        self.guard_ready()?;
        let id = IdentityId::new(self.next_id.fetch_add(1, Ordering::SeqCst));
        let mut stored = info.clone();
        stored.id = id;
        stored.store_secret = store_secret;
        if !store_secret {
            stored.secret = SecretString::default();
        }
        debug!(%id, "identity inserted");
        self.identities.insert(id.as_u32(), stored);
        self.bus.publish(StoreEvent::CredentialsUpdated(id));
        Ok(id)
    }

    async fn update_credentials(
        &self,
        info: &IdentityInfo,
        store_secret: bool,
    ) -> Result<(), StoreError> {
        self.guard_ready()?;
        let id = info.id;
        let mut entry = self
            .identities
            .get_mut(&id.as_u32())
            .ok_or(StoreError::NotFound { id })?;
        let mut updated = info.clone();
        updated.store_secret = store_secret;
        if !store_secret {
            updated.secret = SecretString::default();
        }
        *entry = updated;
        drop(entry);
        debug!(%id, "identity updated");
        self.bus.publish(StoreEvent::CredentialsUpdated(id));
        Ok(())
    }

    async fn remove_credentials(&self, id: IdentityId) -> Result<(), StoreError> {
        self.guard_ready()?;
        self.identities
            .remove(&id.as_u32())
            .ok_or(StoreError::NotFound { id })?;
        self.blobs.retain(|(owner, _), _| *owner != id.as_u32());
        self.references.remove(&id.as_u32());
        debug!(%id, "identity removed");
        self.bus.publish(StoreEvent::CredentialsUpdated(id));
        Ok(())
    }

    async fn check_secret(
        &self,
        id: IdentityId,
        user_name: &str,
        secret: &str,
    ) -> Result<bool, StoreError> {
        self.guard_ready()?;
        let info = self.record(id)?;
        if info.secret.is_empty() {
            return Ok(false);
        }
        Ok(info.user_name == user_name && info.secret.expose(|s| s == secret))
    }

    async fn load_data(&self, id: IdentityId, method: &str) -> Result<SessionData, StoreError> {
        self.guard_ready()?;
        Ok(self
            .blobs
            .get(&(id.as_u32(), method.to_owned()))
            .map(|d| d.clone())
            .unwrap_or_default())
    }

    async fn store_data(
        &self,
        id: IdentityId,
        method: &str,
        data: &SessionData,
    ) -> Result<(), StoreError> {
        self.guard_ready()?;
        if !self.identities.contains_key(&id.as_u32()) {
            return Err(StoreError::NotFound { id });
        }
        self.blobs
            .insert((id.as_u32(), method.to_owned()), data.clone());
        Ok(())
    }

    async fn remove_data(&self, id: IdentityId) -> Result<(), StoreError> {
        self.guard_ready()?;
        self.blobs.retain(|(owner, _), _| *owner != id.as_u32());
        Ok(())
    }

    async fn add_reference(
        &self,
        id: IdentityId,
        app_id: &str,
        name: &str,
    ) -> Result<(), StoreError> {
        self.guard_ready()?;
        if !self.identities.contains_key(&id.as_u32()) {
            return Err(StoreError::NotFound { id });
        }
        self.references
            .entry(id.as_u32())
            .or_default()
            .insert((app_id.to_owned(), name.to_owned()));
        Ok(())
    }

    async fn remove_reference(
        &self,
        id: IdentityId,
        app_id: &str,
        name: &str,
    ) -> Result<(), StoreError> {
        self.guard_ready()?;
        let mut set = self
            .references
            .get_mut(&id.as_u32())
            .ok_or(StoreError::ReferenceNotFound)?;
        if set.remove(&(app_id.to_owned(), name.to_owned())) {
            Ok(())
        } else {
            Err(StoreError::ReferenceNotFound)
        }
    }

    async fn query_identities(
        &self,
        filter: &IdentityFilter,
    ) -> Result<Vec<IdentityInfo>, StoreError> {
        self.guard_ready()?;
        let mut matches: Vec<IdentityInfo> = self
            .identities
            .iter()
            .filter(|entry| filter_matches(filter, entry.value()))
            .map(|entry| entry.value().without_secret())
            .collect();
        matches.sort_by_key(|info| info.id);
        Ok(matches)
    }

    async fn clear(&self) -> Result<(), StoreError> {
        self.guard_ready()?;
        let ids: Vec<u32> = self.identities.iter().map(|e| *e.key()).collect();
        self.identities.clear();
        self.blobs.clear();
        self.references.clear();
        info!(removed = ids.len(), "store cleared");
        for id in ids {
            self.bus
                .publish(StoreEvent::CredentialsUpdated(IdentityId::new(id)));
        }
        Ok(())
    }

    fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }

    fn is_secrets_storage_open(&self) -> bool {
        self.secrets_open.load(Ordering::SeqCst)
    }

    fn events(&self) -> Subscription<StoreEvent> {
        self.bus.subscribe()
    }
}

fn filter_matches(filter: &IdentityFilter, info: &IdentityInfo) -> bool {
    let username_ok = filter
        .username
        .as_deref()
        .is_none_or(|p| glob_match(p, &info.user_name));
    let caption_ok = filter
        .caption
        .as_deref()
        .is_none_or(|p| glob_match(p, &info.caption));
    let realm_ok = filter
        .realm
        .as_deref()
        .is_none_or(|p| info.realms.iter().any(|r| glob_match(p, r)));
    let method_ok = filter
        .auth_method
        .as_deref()
        .is_none_or(|p| info.methods.keys().any(|m| glob_match(p, m)));
    username_ok && caption_ok && realm_ok && method_ok
}

/// Shell-style pattern match: `*` any run, `?` a single character.
fn glob_match(pattern: &str, value: &str) -> bool {
    fn inner(p: &[char], v: &[char]) -> bool {
        match p.split_first() {
            None => v.is_empty(),
            Some((&'*', rest)) => (0..=v.len()).any(|skip| inner(rest, &v[skip..])),
            Some((&'?', rest)) => v.split_first().is_some_and(|(_, tail)| inner(rest, tail)),
            Some((c, rest)) => v
                .split_first()
                .is_some_and(|(f, tail)| f == c && inner(rest, tail)),
        }
    }
    let p: Vec<char> = pattern.chars().collect();
    let v: Vec<char> = value.chars().collect();
    inner(&p, &v)
}
