//! The daemon facade: top-level dispatcher and object registries.

use std::sync::Arc;

use signet_access::{
    AccessControl, AccessOutcome, AccessRequestHandler, PeerContext, PeerResolver,
};
use signet_core::{IdentityFilter, IdentityId, SessionData};
use signet_error::{ErrorKind, SignetError, SignetResult};
use signet_eventbus::{Event, Subscription};
use signet_plugin::PluginRegistry;
use signet_store::CredentialsStore;
use signet_ui::UiAgent;
use tokio::sync::broadcast;
use tracing::{debug, info};

use crate::config::DaemonConfig;
use crate::events::{DaemonBus, DaemonEvent};
use crate::identity::{IdentityDeps, IdentityObject};
use crate::registry::IdentityRegistry;
use crate::session::core::{self as session_core, SessionCoreConfig, SessionDeps};
use crate::session::{AuthSessionHandle, SessionControl, SessionRegistry};
use crate::store_error;

/// The daemon engine's public face.
///
/// Owns the identity and session registries, routes every client call,
/// and applies access control before anything else happens. Build one
/// with [`Daemon::builder`]; bus wiring external to this crate exposes
/// its operations.
pub struct Daemon {
    store: Arc<dyn CredentialsStore>,
    ui: Arc<dyn UiAgent>,
    access: Arc<AccessControl>,
    plugins: Arc<PluginRegistry>,
    config: DaemonConfig,
    identities: Arc<IdentityRegistry>,
    sessions: Arc<SessionRegistry>,
    bus: DaemonBus,
}

impl Daemon {
    pub fn builder() -> DaemonBuilder {
        DaemonBuilder::default()
    }

    /// Creates a fresh unpersisted identity object. Unconditional.
    pub fn register_new_identity(&self, peer: &PeerContext) -> Arc<IdentityObject> {
        let object = IdentityObject::create(
            IdentityId::NEW,
            self.identities.next_object_path(),
            self.identity_deps(),
            Arc::downgrade(&self.identities),
            self.config.identity_timeout,
        );
        self.identities.insert_scratch(object.clone());
        debug!(%peer, path = object.object_path(), "new identity registered");
        self.reap();
        object
    }

    /// Resolves a stored identity to its shared object and record.
    /// Gated by `use`; a denial may be escalated once.
    pub async fn get_identity(
        &self,
        peer: &PeerContext,
        id: IdentityId,
    ) -> SignetResult<(Arc<IdentityObject>, SessionData)> {
        self.ensure_use_allowed(peer, id).await?;
        let object = self.stored_identity_object(id);
        let info = object.get_info(peer).await?;
        self.reap();
        Ok((object, info))
    }

    /// Resolves a stored identity to its shared object.
    pub async fn register_stored_identity(
        &self,
        peer: &PeerContext,
        id: IdentityId,
    ) -> SignetResult<Arc<IdentityObject>> {
        self.get_identity(peer, id).await.map(|(object, _)| object)
    }

    /// All registered authentication methods.
    pub fn query_methods(&self) -> Vec<String> {
        self.plugins.methods()
    }

    /// Mechanisms of one method.
    pub fn query_mechanisms(&self, method: &str) -> SignetResult<Vec<String>> {
        self.plugins
            .mechanisms(method)
            .map_err(|_| ErrorKind::MethodNotKnown.into())
    }

    /// Wildcard search over stored identities. Keychain widget only.
    pub async fn query_identities(
        &self,
        peer: &PeerContext,
        filter: &IdentityFilter,
    ) -> SignetResult<Vec<SessionData>> {
        if !self.access.is_peer_keychain_widget(peer).await {
            return Err(access_denied("queryIdentities"));
        }
        let identities = self
            .store
            .query_identities(filter)
            .await
            .map_err(store_error)?;
        Ok(identities.iter().map(|info| info.to_map()).collect())
    }

    /// Wipes every stored identity. Keychain widget only.
    pub async fn clear(&self, peer: &PeerContext) -> SignetResult<bool> {
        if !self.access.is_peer_keychain_widget(peer).await {
            return Err(access_denied("clear"));
        }
        self.store.clear().await.map_err(store_error)?;
        info!("credentials store cleared");
        Ok(true)
    }

    /// Opens (or joins) the session for `(id, method)` and returns a
    /// fresh handle onto it. Gated by `use` for stored identities.
    pub async fn get_auth_session(
        &self,
        peer: &PeerContext,
        id: IdentityId,
        method: &str,
    ) -> SignetResult<AuthSessionHandle> {
        if !id.is_new() {
            self.ensure_use_allowed(peer, id).await?;
        }

        let entry = match self.sessions.lookup(id, method) {
            Some(entry) => entry,
            None => {
                let (plugin, plugin_events) = self
                    .plugins
                    .create(method)
                    .map_err(|_| SignetError::new(ErrorKind::MethodNotKnown))?;
                let (signals, _) = broadcast::channel(32);
                let ctl = session_core::spawn(
                    id,
                    method.to_owned(),
                    plugin,
                    plugin_events,
                    self.session_deps(),
                    signals.clone(),
                    SessionCoreConfig {
                        ui_timeout: self.config.ui_timeout,
                        idle_timeout: self.config.session_timeout,
                    },
                );
                let core_id = self.sessions.insert(id, method, ctl.clone(), signals.clone());
                debug!(%id, method, core_id, "session core created");
                crate::session::registry::SessionEntry {
                    core_id,
                    id,
                    method: method.to_owned(),
                    ctl,
                    signals,
                }
            }
        };

        self.reap();
        Ok(AuthSessionHandle::new(
            self.sessions.next_session_path(),
            method.to_owned(),
            entry.core_id,
            entry.ctl,
            entry.signals,
            Arc::downgrade(&self.sessions),
        ))
    }

    /// Destroys every session regardless of pending work. Shutdown
    /// only.
    pub fn stop_all_sessions(&self) {
        self.sessions.stop_all();
    }

    /// Subscription to the daemon's internal events (secure-storage
    /// hints, sign-out fanout).
    pub fn subscribe_events(&self) -> Subscription<DaemonEvent> {
        self.bus.subscribe()
    }

    fn identity_deps(&self) -> IdentityDeps {
        IdentityDeps {
            store: self.store.clone(),
            ui: self.ui.clone(),
            access: self.access.clone(),
            bus: self.bus.clone(),
        }
    }

    fn session_deps(&self) -> SessionDeps {
        SessionDeps {
            store: self.store.clone(),
            ui: self.ui.clone(),
            access: self.access.clone(),
            bus: self.bus.clone(),
        }
    }

    fn stored_identity_object(&self, id: IdentityId) -> Arc<IdentityObject> {
        if let Some(object) = self.identities.get_stored(id) {
            return object;
        }
        let object = IdentityObject::create(
            id,
            self.identities.next_object_path(),
            self.identity_deps(),
            Arc::downgrade(&self.identities),
            self.config.identity_timeout,
        );
        self.identities.insert_stored(id, object.clone());
        object
    }

    async fn ensure_use_allowed(&self, peer: &PeerContext, id: IdentityId) -> SignetResult<()> {
        if self.access.is_peer_allowed_to_use_identity(peer, id).await {
            return Ok(());
        }
        // Contestable denial: escalate once, then re-check.
        if self.access.request_access(peer, id).await == AccessOutcome::Accepted
            && self.access.is_peer_allowed_to_use_identity(peer, id).await
        {
            return Ok(());
        }
        debug!(%peer, %id, "access control denied the operation");
        Err(ErrorKind::PermissionDenied.into())
    }

    fn reap(&self) {
        self.identities.reap_expired();
        self.sessions.prune();
    }
}

fn access_denied(operation: &str) -> SignetError {
    SignetError::with_message(
        ErrorKind::PermissionDenied,
        format!("method failed access control check: {operation}"),
    )
}

/// Assembles a [`Daemon`] from its external collaborators.
#[derive(Default)]
pub struct DaemonBuilder {
    store: Option<Arc<dyn CredentialsStore>>,
    ui: Option<Arc<dyn UiAgent>>,
    resolver: Option<Arc<dyn PeerResolver>>,
    plugins: Option<PluginRegistry>,
    access_handler: Option<Arc<dyn AccessRequestHandler>>,
    config: Option<DaemonConfig>,
}

impl DaemonBuilder {
    pub fn store(mut self, store: Arc<dyn CredentialsStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn ui(mut self, ui: Arc<dyn UiAgent>) -> Self {
        self.ui = Some(ui);
        self
    }

    pub fn peer_resolver(mut self, resolver: Arc<dyn PeerResolver>) -> Self {
        self.resolver = Some(resolver);
        self
    }

    /// Plugin registry; defaults to the built-ins.
    pub fn plugins(mut self, plugins: PluginRegistry) -> Self {
        self.plugins = Some(plugins);
        self
    }

    pub fn access_handler(mut self, handler: Arc<dyn AccessRequestHandler>) -> Self {
        self.access_handler = Some(handler);
        self
    }

    pub fn config(mut self, config: DaemonConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Builds the daemon and starts its internal event pump.
    ///
    /// # Panics
    ///
    /// Panics when the store, UI agent, or peer resolver was not set;
    /// these have no meaningful defaults.
    pub fn build(self) -> Arc<Daemon> {
        let store = self.store.expect("a credentials store is required");
        let ui = self.ui.expect("a UI agent is required");
        let resolver = self.resolver.expect("a peer resolver is required");
        let config = self.config.unwrap_or_default();

        let mut access = AccessControl::new(
            resolver,
            store.clone(),
            config.keychain_widget.clone(),
        );
        if let Some(handler) = self.access_handler {
            access = access.with_access_handler(handler);
        }

        let daemon = Arc::new(Daemon {
            store,
            ui,
            access: Arc::new(access),
            plugins: Arc::new(self.plugins.unwrap_or_else(PluginRegistry::with_builtins)),
            identities: IdentityRegistry::new(),
            sessions: SessionRegistry::new(),
            bus: DaemonBus::new(),
            config,
        });
        spawn_signout_pump(&daemon);
        daemon
    }
}

/// Cancels every session of a signed-out identity, force-stopping the
/// survivors after the configured grace period.
fn spawn_signout_pump(daemon: &Arc<Daemon>) {
    let mut events = daemon.bus.subscribe();
    let sessions = Arc::downgrade(&daemon.sessions);
    let grace = daemon.config.signout_grace;
    tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            let Event::Next(DaemonEvent::IdentitySignedOut(id)) = event else {
                continue;
            };
            let Some(registry) = sessions.upgrade() else {
                break;
            };
            let targets = registry.sessions_for(id);
            if targets.is_empty() {
                continue;
            }
            info!(%id, sessions = targets.len(), "winding down sessions of signed-out identity");
            for ctl in &targets {
                let _ = ctl.send(SessionControl::CancelAll);
            }
            tokio::spawn(async move {
                tokio::time::sleep(grace).await;
                for ctl in targets {
                    let _ = ctl.send(SessionControl::Stop);
                }
            });
        }
    });
}
