//! The store contract consumed by the daemon engine.

use async_trait::async_trait;
use signet_core::{IdentityFilter, IdentityId, IdentityInfo, SessionData};
use signet_eventbus::Subscription;

use crate::error::StoreError;

/// Broadcast notifications emitted by a store.
///
/// Every in-memory identity object subscribes and invalidates its cache
/// on [`CredentialsUpdated`](StoreEvent::CredentialsUpdated) for its own
/// id; queued session requests wait for
/// [`StorageReady`](StoreEvent::StorageReady) before starting.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StoreEvent {
    /// The identity was modified by any path.
    CredentialsUpdated(IdentityId),
    /// The store finished opening and accepts requests.
    StorageReady,
    /// The secrets database became available.
    SecretsStorageOpened,
    /// The secrets database went away; writes land in a scratch cache.
    SecretsStorageClosed,
}

/// Persistent credentials storage.
///
/// Implementations serialize their own access; the daemon calls from a
/// single task at a time per identity but multiple sessions may overlap.
#[async_trait]
pub trait CredentialsStore: Send + Sync {
    /// Loads one identity. The secret is included only when
    /// `with_secret` is set and one is stored.
    async fn credentials(
        &self,
        id: IdentityId,
        with_secret: bool,
    ) -> Result<IdentityInfo, StoreError>;

    /// Inserts a new identity and returns its assigned id.
    async fn insert_credentials(
        &self,
        info: &IdentityInfo,
        store_secret: bool,
    ) -> Result<IdentityId, StoreError>;

    /// Updates an existing identity. With `store_secret` unset the
    /// stored secret is dropped.
    async fn update_credentials(
        &self,
        info: &IdentityInfo,
        store_secret: bool,
    ) -> Result<(), StoreError>;

    async fn remove_credentials(&self, id: IdentityId) -> Result<(), StoreError>;

    /// Compares the supplied pair against the stored one.
    async fn check_secret(
        &self,
        id: IdentityId,
        user_name: &str,
        secret: &str,
    ) -> Result<bool, StoreError>;

    /// Per-method session blob, empty when none was stored.
    async fn load_data(&self, id: IdentityId, method: &str) -> Result<SessionData, StoreError>;

    async fn store_data(
        &self,
        id: IdentityId,
        method: &str,
        data: &SessionData,
    ) -> Result<(), StoreError>;

    /// Drops every per-method blob of the identity (sign-out).
    async fn remove_data(&self, id: IdentityId) -> Result<(), StoreError>;

    /// Records a keep-alive reference. Idempotent per
    /// `(id, app_id, name)` triple.
    async fn add_reference(
        &self,
        id: IdentityId,
        app_id: &str,
        name: &str,
    ) -> Result<(), StoreError>;

    /// Removes a reference; the triple must exist.
    async fn remove_reference(
        &self,
        id: IdentityId,
        app_id: &str,
        name: &str,
    ) -> Result<(), StoreError>;

    /// Wildcard search over stored identities. Secrets are never
    /// included in the results.
    async fn query_identities(
        &self,
        filter: &IdentityFilter,
    ) -> Result<Vec<IdentityInfo>, StoreError>;

    /// Wipes every identity, blob, and reference.
    async fn clear(&self) -> Result<(), StoreError>;

    /// Whether the store accepts requests at all.
    fn is_ready(&self) -> bool;

    /// Whether the secrets database is open. When closed, writes still
    /// land in an in-memory cache but the UI may need to prompt for an
    /// unlock.
    fn is_secrets_storage_open(&self) -> bool;

    /// Subscription to the store's broadcast events.
    fn events(&self) -> Subscription<StoreEvent>;
}
