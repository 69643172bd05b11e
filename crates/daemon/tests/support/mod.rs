//! Shared fixture for the daemon integration tests: a scripted prompt
//! agent, scriptable plugins, known peers, and an assembled daemon.
#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use signet_access::{
    AccessOutcome, AccessRequestHandler, PeerContext, PeerInfo, StaticPeerResolver,
};
use signet_core::{IdentityId, SecurityContext, SessionData};
use signet_daemon::{Daemon, DaemonConfig};
use signet_error::plugin_codes;
use signet_plugin::{
    AuthPlugin, PluginError, PluginEventSink, PluginRegistry, PluginState,
};
use signet_store::{CredentialsStore, MemoryStore};
use signet_ui::{UiAgent, UiAgentError, UiError, keys as ui_keys};
use tokio::sync::oneshot;

pub const APP_A: &str = "app-a";
pub const APP_B: &str = "app-b";
pub const APP_C: &str = "app-c";
pub const KEYCHAIN: &str = "keychain-ui";

pub fn peer_a() -> PeerContext {
    PeerContext::new(":client-a", 1)
}

pub fn peer_b() -> PeerContext {
    PeerContext::new(":client-b", 1)
}

pub fn peer_c() -> PeerContext {
    PeerContext::new(":client-c", 1)
}

pub fn peer_keychain() -> PeerContext {
    PeerContext::new(":keychain", 1)
}

type ReplyFn = Box<dyn FnOnce(&SessionData) -> SessionData + Send>;

enum UiStep {
    Reply(ReplyFn),
    /// Resolve with whatever the gate sender delivers.
    Gate(oneshot::Receiver<SessionData>),
    /// Never resolve; the daemon is expected to abandon the dialog.
    Hang,
}

/// Prompt agent answering from a scripted queue of steps.
#[derive(Default)]
pub struct ScriptedUi {
    script: Mutex<VecDeque<UiStep>>,
    pub queries: Mutex<Vec<SessionData>>,
    pub refreshes: Mutex<Vec<SessionData>>,
    pub canceled_requests: Mutex<Vec<String>>,
    pub forgotten: Mutex<Vec<IdentityId>>,
}

impl ScriptedUi {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Queues a reply computed from the dialog parameters.
    pub fn push_reply(
        &self,
        reply: impl FnOnce(&SessionData) -> SessionData + Send + 'static,
    ) {
        self.script
            .lock()
            .push_back(UiStep::Reply(Box::new(reply)));
    }

    /// Queues a dialog that resolves only when the returned sender is
    /// fired.
    pub fn push_gate(&self) -> oneshot::Sender<SessionData> {
        let (tx, rx) = oneshot::channel();
        self.script.lock().push_back(UiStep::Gate(rx));
        tx
    }

    /// Queues a dialog that never resolves.
    pub fn push_hang(&self) {
        self.script.lock().push_back(UiStep::Hang);
    }

    pub fn query_count(&self) -> usize {
        self.queries.lock().len()
    }

    async fn answer(&self, params: SessionData) -> Result<SessionData, UiAgentError> {
        let step = self.script.lock().pop_front();
        match step {
            Some(UiStep::Reply(reply)) => Ok(reply(&params)),
            Some(UiStep::Gate(rx)) => rx.await.map_err(|_| UiAgentError::Unavailable),
            Some(UiStep::Hang) => std::future::pending().await,
            None => Err(UiAgentError::Unavailable),
        }
    }
}

#[async_trait]
impl UiAgent for ScriptedUi {
    async fn query_dialog(&self, params: SessionData) -> Result<SessionData, UiAgentError> {
        self.queries.lock().push(params.clone());
        self.answer(params).await
    }

    async fn refresh_dialog(&self, params: SessionData) -> Result<SessionData, UiAgentError> {
        self.refreshes.lock().push(params.clone());
        self.answer(params).await
    }

    fn cancel_ui_request(&self, request_id: &str) {
        self.canceled_requests.lock().push(request_id.to_owned());
    }

    fn forget_identity_data(&self, id: IdentityId) {
        self.forgotten.lock().push(id);
    }
}

/// A successful dialog reply carrying the entered secret, echoing the
/// request's confirmation budget the way a real agent does.
pub fn dialog_entry(secret: &str) -> impl FnOnce(&SessionData) -> SessionData + Send {
    let secret = secret.to_owned();
    move |request: &SessionData| {
        let mut reply = SessionData::new();
        reply.insert(ui_keys::ERROR, UiError::None.raw());
        if let Some(user_name) = request.user_name() {
            reply.set_user_name(user_name);
        }
        reply.set_secret(&secret);
        if let Some(count) = request.u32_value(ui_keys::CONFIRM_COUNT) {
            reply.insert(ui_keys::CONFIRM_COUNT, count);
        }
        reply
    }
}

/// A dialog reply reporting user cancellation.
pub fn dialog_canceled() -> impl FnOnce(&SessionData) -> SessionData + Send {
    |_request: &SessionData| {
        let mut reply = SessionData::new();
        reply.insert(ui_keys::ERROR, UiError::Canceled.raw());
        reply
    }
}

/// Plugin echoing its input as the result, under a configurable method
/// name. Stands in for any non-interactive method back-end.
pub struct EchoPlugin {
    method: String,
    sink: PluginEventSink,
}

impl EchoPlugin {
    pub fn new(method: impl Into<String>, sink: PluginEventSink) -> Self {
        Self {
            method: method.into(),
            sink,
        }
    }
}

impl AuthPlugin for EchoPlugin {
    fn method(&self) -> &str {
        &self.method
    }

    fn mechanisms(&self) -> Vec<String> {
        vec!["plain".to_owned(), "md5".to_owned()]
    }

    fn process(&mut self, params: &SessionData, _mechanism: &str) -> Result<(), PluginError> {
        self.sink.state_changed(PluginState::ProcessDone, "echoing");
        self.sink.result(params.clone());
        Ok(())
    }

    fn process_ui(&mut self, reply: &SessionData) {
        self.sink.result(reply.clone());
    }

    fn process_refresh(&mut self, reply: &SessionData) {
        self.sink.result(reply.clone());
    }

    fn cancel(&mut self) {
        self.sink
            .error(plugin_codes::SESSION_CANCELED, "processing canceled");
    }
}

/// Registry with the built-in password method plus echo methods under
/// the names the tests authenticate with.
pub fn test_registry() -> PluginRegistry {
    let mut registry = PluginRegistry::with_builtins();
    for method in ["pw", "echo"] {
        registry
            .register(
                method,
                vec!["plain".to_owned(), "md5".to_owned()],
                move |sink| Box::new(EchoPlugin::new(method, sink)),
            )
            .expect("method is unused");
    }
    registry
}

/// Access-request handler granting access by appending the requesting
/// peer's context to the identity's ACL, the way an interactive grant
/// updates the record out-of-band.
pub struct GrantingHandler {
    store: Arc<MemoryStore>,
    grant: SecurityContext,
}

impl GrantingHandler {
    pub fn new(store: Arc<MemoryStore>, grant: SecurityContext) -> Arc<Self> {
        Arc::new(Self { store, grant })
    }
}

#[async_trait]
impl AccessRequestHandler for GrantingHandler {
    async fn request_access(&self, _peer: &PeerContext, id: IdentityId) -> AccessOutcome {
        let Ok(mut info) = self.store.credentials(id, true).await else {
            return AccessOutcome::Denied;
        };
        info.acl.push(self.grant.clone());
        let store_secret = info.store_secret;
        if self
            .store
            .update_credentials(&info, store_secret)
            .await
            .is_err()
        {
            return AccessOutcome::Denied;
        }
        AccessOutcome::Accepted
    }
}

pub struct TestBed {
    pub daemon: Arc<Daemon>,
    pub store: Arc<MemoryStore>,
    pub ui: Arc<ScriptedUi>,
    pub resolver: Arc<StaticPeerResolver>,
}

pub struct TestBedOptions {
    pub config: DaemonConfig,
    pub granting_access: bool,
}

impl Default for TestBedOptions {
    fn default() -> Self {
        Self {
            config: DaemonConfig {
                keychain_widget: SecurityContext::from_legacy(KEYCHAIN),
                ..DaemonConfig::default()
            },
            granting_access: false,
        }
    }
}

pub fn testbed() -> TestBed {
    testbed_with(TestBedOptions::default())
}

fn init_tracing() {
    use tracing_subscriber::EnvFilter;
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub fn testbed_with(options: TestBedOptions) -> TestBed {
    init_tracing();
    let resolver = Arc::new(StaticPeerResolver::new());
    for (connection, app_id, pid) in [
        (":client-a", APP_A, 101),
        (":client-b", APP_B, 102),
        (":client-c", APP_C, 103),
        (":keychain", KEYCHAIN, 104),
    ] {
        resolver.insert(
            connection,
            PeerInfo::new(pid, app_id, vec![SecurityContext::from_legacy(app_id)]),
        );
    }

    let store = Arc::new(MemoryStore::new());
    let ui = ScriptedUi::new();

    let mut builder = Daemon::builder()
        .store(store.clone())
        .ui(ui.clone())
        .peer_resolver(resolver.clone())
        .plugins(test_registry())
        .config(options.config);
    if options.granting_access {
        builder = builder.access_handler(GrantingHandler::new(
            store.clone(),
            SecurityContext::from_legacy(APP_B),
        ));
    }

    TestBed {
        daemon: builder.build(),
        store,
        ui,
        resolver,
    }
}

/// Wire map of a storable identity: user name, secret, password-backed
/// methods, caption.
pub fn storable_identity(user_name: &str, secret: &str) -> SessionData {
    let map = serde_json::json!({
        "UserName": user_name,
        "Secret": secret,
        "StoreSecret": true,
        "Caption": "test account",
        "AuthMethods": {"pw": ["plain"], "password": ["password"]},
    });
    serde_json::from_value(map).expect("literal map deserializes")
}

/// Lets spawned client tasks reach their first await point.
pub async fn settle() {
    tokio::time::sleep(std::time::Duration::from_millis(25)).await;
}
