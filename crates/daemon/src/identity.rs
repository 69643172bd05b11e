//! In-memory identity objects: the daemon-side view of one credential
//! record.

use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use signet_access::{AccessControl, OwnershipVerdict, PeerContext};
use signet_core::{
    IdentityChange, IdentityId, IdentityInfo, SecretString, SecurityContext, SessionData,
};
use signet_error::{ErrorKind, SignetError, SignetResult};
use signet_eventbus::Event;
use signet_store::{CredentialsStore, StoreError, StoreEvent};
use signet_ui::{UiAgent, UiError, UiMessage, keys as ui_keys};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::disposable::Disposable;
use crate::events::{DaemonBus, DaemonEvent};
use crate::registry::IdentityRegistry;
use crate::store_error;

/// Signals a client handle can observe on an identity object.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum IdentitySignal {
    InfoUpdated(IdentityChange),
    /// The daemon dropped the object; lingering handles should clean up.
    Unregistered,
}

/// Shared collaborators of every identity object.
pub(crate) struct IdentityDeps {
    pub store: Arc<dyn CredentialsStore>,
    pub ui: Arc<dyn UiAgent>,
    pub access: Arc<AccessControl>,
    pub bus: DaemonBus,
}

struct CachedInfo {
    info: IdentityInfo,
    with_secret: bool,
}

/// One identity as the daemon serves it.
///
/// Objects are shared: all client handles for the same stored id hold
/// the same object, so its signal stream reaches every one of them.
/// A cached copy of the persisted record is invalidated whenever the
/// store announces a change for this id.
pub struct IdentityObject {
    object_path: String,
    id: Mutex<IdentityId>,
    cache: Mutex<Option<CachedInfo>>,
    deps: IdentityDeps,
    registry: Weak<IdentityRegistry>,
    signals: broadcast::Sender<IdentitySignal>,
    disposable: Disposable,
}

impl IdentityObject {
    pub(crate) fn create(
        id: IdentityId,
        object_path: String,
        deps: IdentityDeps,
        registry: Weak<IdentityRegistry>,
        max_idle: std::time::Duration,
    ) -> Arc<Self> {
        let (signals, _) = broadcast::channel(16);
        let object = Arc::new(Self {
            object_path,
            id: Mutex::new(id),
            cache: Mutex::new(None),
            deps,
            registry,
            signals,
            disposable: Disposable::new(max_idle),
        });
        Self::spawn_store_pump(&object);
        object
    }

    /// Watches the store for out-of-band changes to this identity and
    /// drops the cache when one lands.
    fn spawn_store_pump(this: &Arc<Self>) {
        let weak = Arc::downgrade(this);
        let mut events = this.deps.store.events();
        tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                let Some(object) = weak.upgrade() else { break };
                if let Event::Next(StoreEvent::CredentialsUpdated(id)) = event
                    && id == object.current_id()
                {
                    object.invalidate_cache();
                }
            }
        });
    }

    pub fn object_path(&self) -> &str {
        &self.object_path
    }

    pub fn current_id(&self) -> IdentityId {
        *self.id.lock()
    }

    /// Subscribes to `info_updated` / `unregistered` signals.
    pub fn subscribe(&self) -> broadcast::Receiver<IdentitySignal> {
        self.signals.subscribe()
    }

    pub(crate) fn is_expired(&self) -> bool {
        self.disposable.is_expired()
    }

    pub(crate) fn unregister(&self) {
        let _ = self.signals.send(IdentitySignal::Unregistered);
    }

    fn emit(&self, change: IdentityChange) {
        let _ = self.signals.send(IdentitySignal::InfoUpdated(change));
    }

    fn invalidate_cache(&self) {
        *self.cache.lock() = None;
    }

    fn cached(&self, with_secret: bool) -> Option<IdentityInfo> {
        let cache = self.cache.lock();
        let cached = cache.as_ref()?;
        if with_secret && !cached.with_secret {
            return None;
        }
        let info = cached.info.clone();
        Some(if with_secret {
            info
        } else {
            info.without_secret()
        })
    }

    async fn load_info(&self, with_secret: bool) -> Result<IdentityInfo, StoreError> {
        if let Some(info) = self.cached(with_secret) {
            return Ok(info);
        }
        let info = self
            .deps
            .store
            .credentials(self.current_id(), with_secret)
            .await?;
        *self.cache.lock() = Some(CachedInfo {
            info: info.clone(),
            with_secret,
        });
        Ok(info)
    }

    async fn require_use(&self, peer: &PeerContext) -> SignetResult<()> {
        let id = self.current_id();
        if id.is_new() {
            return Ok(());
        }
        if self
            .deps
            .access
            .is_peer_allowed_to_use_identity(peer, id)
            .await
        {
            Ok(())
        } else {
            debug!(%peer, %id, "identity use denied");
            Err(ErrorKind::PermissionDenied.into())
        }
    }

    /// Returns the identity record with the secret suppressed.
    pub async fn get_info(&self, peer: &PeerContext) -> SignetResult<SessionData> {
        let _busy = self.disposable.busy_guard();
        self.require_use(peer).await?;
        let info = self.load_info(false).await.map_err(|err| match err {
            StoreError::NotFound { .. } => ErrorKind::IdentityNotFound.into(),
            other => SignetError::with_message(
                ErrorKind::CredentialsNotAvailable,
                format!("database query failed: {other}"),
            ),
        })?;
        Ok(info.to_map())
    }

    /// Inserts or updates the record from its wire map; returns the
    /// (possibly freshly assigned) id.
    pub async fn store(&self, peer: &PeerContext, map: &SessionData) -> SignetResult<IdentityId> {
        let _busy = self.disposable.busy_guard();
        let id = self.current_id();
        if !id.is_new() {
            match self.deps.access.is_peer_owner_of_identity(peer, id).await {
                OwnershipVerdict::ApplicationIsOwner | OwnershipVerdict::IdentityHasNoOwner => {}
                OwnershipVerdict::ApplicationIsNotOwner => {
                    return Err(ErrorKind::PermissionDenied.into());
                }
            }
        }

        let mut info = IdentityInfo::from_map(map)
            .map_err(|err| SignetError::with_message(ErrorKind::InvalidQuery, err.to_string()))?;

        let app_id = self.deps.access.app_id_of_peer(peer).await;
        if info.owners.is_empty() {
            if app_id.is_empty() {
                // Storing would produce an identity nobody owns.
                return Err(ErrorKind::InvalidQuery.into());
            }
            info.owners = vec![SecurityContext::from_legacy(app_id.clone())];
        } else if !self.deps.access.is_acl_valid(peer, &info.owners).await {
            return Err(ErrorKind::PermissionDenied.into());
        }
        if !self.deps.access.is_acl_valid(peer, &info.acl).await {
            return Err(ErrorKind::PermissionDenied.into());
        }

        let store_secret = info.store_secret;
        if !store_secret {
            info.secret = SecretString::default();
        }
        info.id = id;

        let assigned = if id.is_new() {
            let new_id = self
                .deps
                .store
                .insert_credentials(&info, store_secret)
                .await
                .map_err(|_| SignetError::new(ErrorKind::StoreFailed))?;
            *self.id.lock() = new_id;
            if let Some(registry) = self.registry.upgrade() {
                registry.promote(&self.object_path, new_id);
            }
            info!(id = %new_id, "identity stored");
            new_id
        } else {
            // A client update does not re-validate the record, but it
            // must not wipe an earlier validation either.
            info.validated = self
                .deps
                .store
                .credentials(id, false)
                .await
                .map(|current| current.validated)
                .unwrap_or(false);
            self.deps
                .store
                .update_credentials(&info, store_secret)
                .await
                .map_err(|_| SignetError::new(ErrorKind::StoreFailed))?;
            id
        };

        self.invalidate_cache();
        self.emit(IdentityChange::Updated);
        Ok(assigned)
    }

    /// Records a keep-alive reference for the calling application.
    pub async fn add_reference(&self, peer: &PeerContext, name: &str) -> SignetResult<()> {
        let _busy = self.disposable.busy_guard();
        self.require_use(peer).await?;
        let app_id = self.deps.access.app_id_of_peer(peer).await;
        self.deps
            .store
            .add_reference(self.current_id(), &app_id, name)
            .await
            .map_err(store_error)
    }

    /// Drops a previously recorded reference.
    pub async fn remove_reference(&self, peer: &PeerContext, name: &str) -> SignetResult<()> {
        let _busy = self.disposable.busy_guard();
        self.require_use(peer).await?;
        let app_id = self.deps.access.app_id_of_peer(peer).await;
        self.deps
            .store
            .remove_reference(self.current_id(), &app_id, name)
            .await
            .map_err(store_error)
    }

    /// Compares a caller-supplied secret against the stored one.
    pub async fn verify_secret(&self, peer: &PeerContext, secret: &str) -> SignetResult<bool> {
        let _busy = self.disposable.busy_guard();
        self.require_use(peer).await?;
        let info = self.load_info(false).await.map_err(|err| {
            SignetError::with_message(
                ErrorKind::CredentialsNotAvailable,
                format!("database query failed: {err}"),
            )
        })?;
        self.deps
            .store
            .check_secret(info.id, &info.user_name, secret)
            .await
            .map_err(store_error)
    }

    /// Interactively confirms the user knows the stored secret.
    ///
    /// A wrong entry with a remaining `ConfirmCount` budget re-prompts
    /// with a not-authorized message id and the decremented budget; an
    /// exhausted budget resolves to `Ok(false)`.
    pub async fn verify_user(
        &self,
        peer: &PeerContext,
        params: &SessionData,
    ) -> SignetResult<bool> {
        let _busy = self.disposable.busy_guard();
        self.require_use(peer).await?;
        let info = self.load_info(true).await.map_err(|err| match err {
            StoreError::NotFound { .. } => SignetError::new(ErrorKind::IdentityNotFound),
            other => SignetError::with_message(ErrorKind::CredentialsNotAvailable, other.to_string()),
        })?;
        if !info.store_secret || info.secret.is_empty() {
            return Err(ErrorKind::CredentialsNotAvailable.into());
        }

        let mut request = params.clone();
        request.insert(ui_keys::QUERY_PASSWORD, true);
        request.set_user_name(&info.user_name);
        request.set_caption(&info.caption);

        loop {
            let reply = self
                .deps
                .ui
                .query_dialog(request.clone())
                .await
                .map_err(|_| SignetError::new(ErrorKind::OperationCanceled))?;
            self.check_dialog_outcome(&reply)?;

            let Some(entered) = reply.secret() else {
                return Err(ErrorKind::InternalServer.into());
            };
            let matched = info.secret.expose(|stored| stored == entered);
            if matched {
                self.invalidate_cache();
                return Ok(true);
            }

            let retries = reply.u32_value(ui_keys::CONFIRM_COUNT).unwrap_or(0);
            if retries > 0 {
                debug!(retries, "secret mismatch, re-prompting");
                let mut next = reply.clone();
                next.insert(ui_keys::CONFIRM_COUNT, retries - 1);
                next.insert(ui_keys::MESSAGE_ID, UiMessage::NotAuthorized.raw());
                request = next;
                continue;
            }
            self.invalidate_cache();
            return Ok(false);
        }
    }

    /// Prompts for a replacement secret and persists it.
    pub async fn request_credentials_update(
        &self,
        peer: &PeerContext,
        message: &str,
    ) -> SignetResult<IdentityId> {
        let _busy = self.disposable.busy_guard();
        self.require_use(peer).await?;
        let info = self.load_info(false).await.map_err(|err| match err {
            StoreError::NotFound { .. } => SignetError::new(ErrorKind::IdentityNotFound),
            other => SignetError::with_message(ErrorKind::CredentialsNotAvailable, other.to_string()),
        })?;
        if !info.store_secret {
            return Err(ErrorKind::StoreFailed.into());
        }

        let mut request = SessionData::new();
        request.insert(ui_keys::QUERY_PASSWORD, true);
        request.set_user_name(&info.user_name);
        request.insert(ui_keys::MESSAGE, message);
        request.set_caption(&info.caption);

        let reply = self
            .deps
            .ui
            .query_dialog(request)
            .await
            .map_err(|_| SignetError::new(ErrorKind::OperationCanceled))?;
        self.check_dialog_outcome(&reply)?;

        let Some(secret) = reply.secret() else {
            return Err(ErrorKind::InternalServer.into());
        };
        let mut updated = self
            .deps
            .store
            .credentials(info.id, true)
            .await
            .map_err(store_error)?;
        updated.secret = SecretString::new(secret);
        updated.store_secret = true;
        self.deps
            .store
            .update_credentials(&updated, true)
            .await
            .map_err(|_| SignetError::new(ErrorKind::StoreFailed))?;

        self.invalidate_cache();
        self.emit(IdentityChange::Updated);
        Ok(info.id)
    }

    /// Deletes the identity. Owners and the keychain widget only.
    pub async fn remove(&self, peer: &PeerContext) -> SignetResult<()> {
        let _busy = self.disposable.busy_guard();
        let id = self.current_id();
        let allowed = match self.deps.access.is_peer_owner_of_identity(peer, id).await {
            OwnershipVerdict::ApplicationIsOwner | OwnershipVerdict::IdentityHasNoOwner => true,
            OwnershipVerdict::ApplicationIsNotOwner => {
                self.deps.access.is_peer_keychain_widget(peer).await
            }
        };
        if !allowed {
            return Err(ErrorKind::PermissionDenied.into());
        }

        self.deps
            .store
            .remove_credentials(id)
            .await
            .map_err(|err| match err {
                StoreError::NotFound { .. } => SignetError::new(ErrorKind::IdentityNotFound),
                _ => SignetError::with_message(ErrorKind::RemoveFailed, "database error occurred"),
            })?;
        self.deps.ui.forget_identity_data(id);
        self.invalidate_cache();
        self.emit(IdentityChange::Removed);
        self.deps.bus.publish(DaemonEvent::IdentityRemoved(id));
        info!(%id, "identity removed");
        Ok(())
    }

    /// Clears per-session state for the identity. A no-op for scratch
    /// identities.
    pub async fn sign_out(&self, peer: &PeerContext) -> SignetResult<bool> {
        let _busy = self.disposable.busy_guard();
        self.require_use(peer).await?;
        let id = self.current_id();
        if !id.is_new() {
            if let Err(err) = self.deps.store.remove_data(id).await {
                warn!(%id, %err, "clearing session data failed");
            }
            self.deps.ui.forget_identity_data(id);
            self.invalidate_cache();
            self.emit(IdentityChange::SignedOut);
            self.deps.bus.publish(DaemonEvent::IdentitySignedOut(id));
            info!(%id, "identity signed out");
        }
        Ok(true)
    }

    fn check_dialog_outcome(&self, reply: &SessionData) -> SignetResult<()> {
        match UiError::of_reply(reply) {
            None => Err(ErrorKind::InternalServer.into()),
            Some(UiError::None) => Ok(()),
            Some(UiError::Canceled) => Err(ErrorKind::OperationCanceled.into()),
            Some(UiError::ForgotPassword) => Err(ErrorKind::ForgotPassword.into()),
            Some(other) => Err(SignetError::with_message(
                ErrorKind::InternalServer,
                format!("dialog returned error {}", other.raw()),
            )),
        }
    }
}
