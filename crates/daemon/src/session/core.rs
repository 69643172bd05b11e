//! The session core: one FIFO of authentication requests driving one
//! plugin.

use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use signet_access::AccessControl;
use signet_core::{IdentityId, SecretString, SessionData, UiPolicy, keys};
use signet_error::{ErrorKind, SignetError, SignetResult};
use signet_eventbus::Event;
use signet_plugin::{AuthPlugin, PASSWORD_METHOD, PluginEvent, PluginState};
use signet_store::{CredentialsStore, StoreEvent};
use signet_ui::{UiAgent, UiAgentError, UiError, keys as ui_keys};
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, error, info, warn};

use crate::events::{DaemonBus, DaemonEvent};
use crate::session::{ProcessRequest, SessionControl, SessionSignal};

pub(crate) struct SessionCoreConfig {
    pub ui_timeout: Duration,
    pub idle_timeout: Duration,
}

/// Shared collaborators of every session core.
pub(crate) struct SessionDeps {
    pub store: Arc<dyn CredentialsStore>,
    pub ui: Arc<dyn UiAgent>,
    pub access: Arc<AccessControl>,
    pub bus: DaemonBus,
}

struct QueuedRequest {
    peer: signet_access::PeerContext,
    params: SessionData,
    mechanism: String,
    cancel_key: String,
    reply: Option<tokio::sync::oneshot::Sender<SignetResult<SessionData>>>,
}

impl From<ProcessRequest> for QueuedRequest {
    fn from(request: ProcessRequest) -> Self {
        Self {
            peer: request.peer,
            params: request.params,
            mechanism: request.mechanism,
            cancel_key: request.cancel_key,
            reply: Some(request.reply),
        }
    }
}

type UiFuture = Pin<Box<dyn Future<Output = Result<SessionData, UiAgentError>> + Send>>;

/// Serializes requests for one `(identity, method)` pair.
///
/// Runs as a single task: requests queue in arrival order, at most one
/// is active, and each event handler runs to completion before the
/// next. The suspension points are exactly the plugin's event channel,
/// the dialog call, and store readiness.
pub(crate) struct SessionCore {
    id: IdentityId,
    method: String,
    queue: VecDeque<QueuedRequest>,
    plugin: Box<dyn AuthPlugin>,
    deps: SessionDeps,
    signals: broadcast::Sender<SessionSignal>,
    config: SessionCoreConfig,
    request_active: bool,
    canceled: bool,
    ui_displayed: bool,
    store_ready: bool,
    tmp_user_name: String,
    tmp_secret: SecretString,
    client_data: SessionData,
}

/// Spawns a session core task; the returned sender is its only handle.
pub(crate) fn spawn(
    id: IdentityId,
    method: String,
    plugin: Box<dyn AuthPlugin>,
    plugin_events: mpsc::UnboundedReceiver<PluginEvent>,
    deps: SessionDeps,
    signals: broadcast::Sender<SessionSignal>,
    config: SessionCoreConfig,
) -> mpsc::UnboundedSender<SessionControl> {
    let (ctl_tx, ctl_rx) = mpsc::unbounded_channel();
    let store_ready = deps.store.is_ready();
    let core = SessionCore {
        id,
        method,
        queue: VecDeque::new(),
        plugin,
        deps,
        signals,
        config,
        request_active: false,
        canceled: false,
        ui_displayed: false,
        store_ready,
        tmp_user_name: String::new(),
        tmp_secret: SecretString::default(),
        client_data: SessionData::new(),
    };
    tokio::spawn(core.run(ctl_rx, plugin_events));
    ctl_tx
}

async fn wait_ui(pending: &mut Option<UiFuture>) -> Result<SessionData, UiAgentError> {
    match pending {
        Some(future) => future.as_mut().await,
        None => std::future::pending().await,
    }
}

impl SessionCore {
    async fn run(
        mut self,
        mut ctl: mpsc::UnboundedReceiver<SessionControl>,
        mut plugin_events: mpsc::UnboundedReceiver<PluginEvent>,
    ) {
        debug!(id = %self.id, method = %self.method, "session core started");
        let mut store_events = self.deps.store.events();
        let mut pending_ui: Option<UiFuture> = None;

        loop {
            if pending_ui.is_none() {
                self.maybe_start().await;
            }
            let idle =
                !self.request_active && pending_ui.is_none() && self.queue.is_empty();

            tokio::select! {
                command = ctl.recv() => match command {
                    None => break,
                    Some(command) => {
                        if self.handle_control(command, &mut pending_ui) {
                            break;
                        }
                    }
                },
                Some(event) = plugin_events.recv(), if self.request_active => {
                    self.handle_plugin_event(event, &mut pending_ui).await;
                }
                reply = wait_ui(&mut pending_ui) => {
                    pending_ui = None;
                    self.handle_ui_reply(reply);
                }
                event = store_events.recv(), if !self.store_ready => {
                    match event {
                        Some(Event::Next(StoreEvent::StorageReady)) | None => {
                            self.store_ready = true;
                        }
                        _ => {}
                    }
                }
                () = tokio::time::sleep(self.config.idle_timeout), if idle => {
                    debug!(id = %self.id, method = %self.method, "session idle, self-destructing");
                    break;
                }
            }
        }
        self.drain(SignetError::new(ErrorKind::SessionCanceled));
    }

    /// Returns true when the core should stop.
    fn handle_control(
        &mut self,
        command: SessionControl,
        pending_ui: &mut Option<UiFuture>,
    ) -> bool {
        match command {
            SessionControl::Process(request) => {
                debug!(id = %self.id, method = %self.method, queued = self.queue.len(), "request enqueued");
                self.queue.push_back(QueuedRequest::from(request));
                false
            }
            SessionControl::Cancel { cancel_key } => {
                self.cancel_request(&cancel_key, pending_ui);
                false
            }
            SessionControl::CancelAll => {
                self.cancel_all(pending_ui);
                false
            }
            SessionControl::SetId(id) => {
                self.id = id;
                false
            }
            SessionControl::QueryMechanisms { wanted, reply } => {
                let _ = reply.send(self.available_mechanisms(&wanted));
                false
            }
            SessionControl::Stop => true,
        }
    }

    fn available_mechanisms(&self, wanted: &[String]) -> Vec<String> {
        let all = self.plugin.mechanisms();
        if wanted.is_empty() {
            return all;
        }
        all.into_iter().filter(|m| wanted.contains(m)).collect()
    }

    fn cancel_request(&mut self, cancel_key: &str, pending_ui: &mut Option<UiFuture>) {
        let Some(index) = self.queue.iter().position(|r| r.cancel_key == cancel_key) else {
            debug!(cancel_key, "cancel for unknown request");
            return;
        };

        if index == 0 && self.request_active {
            // The canceled request stays at the head until the plugin's
            // terminal reply; that reply advances the queue.
            self.canceled = true;
            self.plugin.cancel();
            if pending_ui.take().is_some() {
                self.deps.ui.cancel_ui_request(cancel_key);
                self.ui_displayed = false;
            }
            if let Some(reply) = self.queue[0].reply.take() {
                let _ = reply.send(Err(ErrorKind::SessionCanceled.into()));
            }
            info!(id = %self.id, cancel_key, "active request canceled");
        } else {
            let mut request = self.queue.remove(index).expect("index is in range");
            if let Some(reply) = request.reply.take() {
                let _ = reply.send(Err(ErrorKind::OperationCanceled.into()));
            }
        }
    }

    fn cancel_all(&mut self, pending_ui: &mut Option<UiFuture>) {
        let keep_head = self.request_active && !self.queue.is_empty();
        while self.queue.len() > usize::from(keep_head) {
            let mut request = self.queue.pop_back().expect("length checked");
            if let Some(reply) = request.reply.take() {
                let _ = reply.send(Err(ErrorKind::SessionCanceled.into()));
            }
        }
        if keep_head {
            let cancel_key = self.queue[0].cancel_key.clone();
            self.cancel_request(&cancel_key, pending_ui);
        }
    }

    async fn maybe_start(&mut self) {
        if !self.store_ready || self.request_active || self.queue.is_empty() {
            return;
        }
        self.canceled = false;
        self.start_process().await;
    }

    /// Builds the plugin input for the head request and starts the
    /// plugin on it.
    async fn start_process(&mut self) {
        self.request_active = true;
        let (peer, mechanism, cancel_key, base_params) = {
            let head = self.queue.front().expect("queue checked in maybe_start");
            (
                head.peer.clone(),
                head.mechanism.clone(),
                head.cancel_key.clone(),
                head.params.clone(),
            )
        };
        self.client_data = base_params.clone();
        let mut parameters = base_params;

        if !self.id.is_new() {
            match self.deps.store.credentials(self.id, true).await {
                Ok(info) => {
                    if !parameters.contains(keys::SECRET) {
                        parameters.set_secret(&info.secret.reveal());
                    }
                    // The stored user name overrules session data for a
                    // validated identity, so it cannot be impersonated
                    // with a caller-supplied alternate name.
                    if info.validated || !parameters.contains(keys::USER_NAME) {
                        parameters.set_user_name(&info.user_name);
                    }
                    let mut tokens = Vec::new();
                    for entry in &info.acl {
                        if self
                            .deps
                            .access
                            .is_peer_allowed_to_access(&peer, entry)
                            .await
                        {
                            tokens.push(entry.clone());
                        }
                    }
                    if !tokens.is_empty() {
                        parameters.set_access_control_tokens(&tokens);
                    }
                }
                Err(err) => {
                    error!(id = %self.id, %err, "could not load identity for session input");
                }
            }

            match self.deps.store.load_data(self.id, &self.method).await {
                // Caller keys win over the stored blob on collision.
                Ok(stored) if !stored.is_empty() => {
                    parameters = parameters.overlaid_on(&stored);
                }
                Ok(_) => {}
                Err(err) => warn!(id = %self.id, %err, "loading method data failed"),
            }
        }

        if parameters.ui_policy() == Some(UiPolicy::RequestPassword) {
            parameters.remove_secret();
        }

        self.tmp_user_name = parameters.user_name().unwrap_or_default().to_owned();
        self.tmp_secret = SecretString::new(parameters.secret().unwrap_or_default());

        match self.plugin.process(&parameters, &mechanism) {
            Ok(()) => {
                self.broadcast_state(&cancel_key, PluginState::Started, "request processing started");
            }
            Err(err) => {
                warn!(id = %self.id, method = %self.method, %err, "plugin refused to start");
                if let Some(reply) = self
                    .queue
                    .front_mut()
                    .and_then(|head| head.reply.take())
                {
                    let _ = reply.send(Err(SignetError::with_message(
                        ErrorKind::RuntimeError,
                        err.to_string(),
                    )));
                }
                self.request_done();
            }
        }
    }

    async fn handle_plugin_event(
        &mut self,
        event: PluginEvent,
        pending_ui: &mut Option<UiFuture>,
    ) {
        match event {
            PluginEvent::StateChanged { state, message } => {
                if !self.canceled
                    && let Some(head) = self.queue.front()
                {
                    let cancel_key = head.cancel_key.clone();
                    self.broadcast_state(&cancel_key, state, &message);
                }
            }
            PluginEvent::UiRequest(data) => self.process_ui_request(data, false, pending_ui).await,
            PluginEvent::RefreshRequest(data) => {
                self.process_ui_request(data, true, pending_ui).await;
            }
            PluginEvent::Store(blob) => self.process_store(blob).await,
            PluginEvent::Result(data) => self.process_result(data, pending_ui).await,
            PluginEvent::Error { code, message } => {
                self.process_error(code, &message, pending_ui);
            }
        }
    }

    /// Augments a plugin's dialog request and launches the dialog.
    async fn process_ui_request(
        &mut self,
        data: SessionData,
        refresh: bool,
        pending_ui: &mut Option<UiFuture>,
    ) {
        if self.canceled || self.queue.is_empty() {
            return;
        }
        let (peer, mechanism, cancel_key) = {
            let head = self.queue.front().expect("queue checked");
            (
                head.peer.clone(),
                head.mechanism.clone(),
                head.cancel_key.clone(),
            )
        };

        // A newer dialog replaces any still-open one.
        if pending_ui.take().is_some() {
            self.deps.ui.cancel_ui_request(&cancel_key);
        }

        let mut params = data.filtered();
        if !refresh {
            params.insert(ui_keys::REQUEST_ID, cancel_key.as_str());
            params.insert(ui_keys::STORED_IDENTITY, !self.id.is_new());
            params.insert(ui_keys::IDENTITY, self.id.as_u32());
            params.insert(
                ui_keys::CLIENT_DATA,
                serde_json::to_value(&self.client_data).unwrap_or(Value::Null),
            );
            params.insert(ui_keys::METHOD, self.method.as_str());
            params.insert(ui_keys::MECHANISM, mechanism.as_str());
            params.insert(ui_keys::PID, self.deps.access.pid_of_peer(&peer).await);
            params.insert(
                ui_keys::APP_ID,
                self.deps.access.app_id_of_peer(&peer).await,
            );

            if !params.contains(keys::CAPTION) && !self.id.is_new() {
                if let Ok(info) = self.deps.store.credentials(self.id, false).await {
                    params.set_caption(&info.caption);
                }
            }
            if !self.deps.store.is_secrets_storage_open() {
                params.insert(ui_keys::STORAGE_KEYS_UNAVAILABLE, true);
            }
        }

        if let Some(head) = self.queue.front_mut() {
            head.params = params.clone();
        }

        let ui = self.deps.ui.clone();
        let timeout = self.config.ui_timeout;
        *pending_ui = Some(Box::pin(async move {
            let call = async {
                if refresh {
                    ui.refresh_dialog(params).await
                } else {
                    ui.query_dialog(params).await
                }
            };
            match tokio::time::timeout(timeout, call).await {
                Ok(result) => result,
                Err(_) => Err(UiAgentError::Timeout),
            }
        }));
        self.ui_displayed = true;
    }

    /// Feeds a completed dialog back into the plugin.
    fn handle_ui_reply(&mut self, reply: Result<SessionData, UiAgentError>) {
        if self.queue.is_empty() {
            return;
        }

        let mut refresh_requested = false;
        let new_params = match reply {
            Ok(mut params) => {
                if params.bool_value(ui_keys::REFRESH) == Some(true) {
                    refresh_requested = true;
                    params.remove(ui_keys::REFRESH);
                }
                if UiError::of_reply(&params) == Some(UiError::Canceled) {
                    // A canceled dialog is no longer on screen.
                    self.ui_displayed = false;
                }
                params
            }
            Err(err) => {
                warn!(%err, "dialog call failed");
                self.ui_displayed = false;
                let head = self.queue.front().expect("queue checked");
                let mut params = head.params.clone();
                params.insert(ui_keys::ERROR, UiError::NoUi.raw());
                params
            }
        };

        if let Some(head) = self.queue.front_mut() {
            head.params = new_params.clone();
        }
        if self.canceled {
            return;
        }

        self.tmp_user_name = new_params.user_name().unwrap_or_default().to_owned();
        self.tmp_secret = SecretString::new(new_params.secret().unwrap_or_default());

        if refresh_requested {
            self.plugin.process_refresh(&new_params);
        } else {
            self.plugin.process_ui(&new_params);
        }
    }

    /// Finalises a successful plugin result: updates the stored record,
    /// strips the secret for non-password methods, replies, advances.
    async fn process_result(&mut self, data: SessionData, pending_ui: &mut Option<UiFuture>) {
        if self.queue.is_empty() {
            self.request_active = false;
            return;
        }
        if self.canceled {
            // The reply already went out as SessionCanceled; the
            // terminal event only advances the queue.
            self.clear_tmp();
            self.request_done();
            return;
        }

        let mut filtered = data.filtered();

        if !self.id.is_new() {
            match self.deps.store.credentials(self.id, true).await {
                Ok(mut info) => {
                    let was_validated = info.validated;
                    if !info.validated && !self.tmp_user_name.is_empty() {
                        info.user_name = self.tmp_user_name.clone();
                    }
                    if !self.tmp_secret.is_empty() {
                        info.secret = self.tmp_secret.clone();
                    }
                    info.validated = true;
                    if let Err(err) = self
                        .deps
                        .store
                        .update_credentials(&info, info.store_secret)
                        .await
                    {
                        error!(id = %self.id, %err, "storing validated credentials failed");
                        self.clear_tmp();
                        self.finish_head(Err(ErrorKind::StoreFailed.into()), pending_ui);
                        return;
                    }
                    if was_validated
                        && !self.deps.store.is_secrets_storage_open()
                        && self.ui_displayed
                    {
                        self.deps.bus.publish(DaemonEvent::SecureStorageUnavailable {
                            id: self.id,
                            method: self.method.clone(),
                        });
                    }
                }
                Err(err) => {
                    warn!(id = %self.id, %err, "identity vanished before finalisation");
                }
            }
        }

        self.clear_tmp();
        if self.method != PASSWORD_METHOD {
            filtered.remove_secret();
        }
        self.finish_head(Ok(filtered), pending_ui);
    }

    fn process_error(&mut self, code: u32, message: &str, pending_ui: &mut Option<UiFuture>) {
        self.clear_tmp();
        if self.queue.is_empty() {
            self.request_active = false;
            return;
        }
        if self.canceled {
            self.request_done();
            return;
        }

        let mut err = SignetError::from_plugin_code(code, message);
        if err.kind() == ErrorKind::SessionCanceled {
            // A cancel code nobody asked for reads as the operation
            // being aborted plugin-side.
            err = SignetError::with_message(ErrorKind::OperationCanceled, err.message());
        }
        self.finish_head(Err(err), pending_ui);
    }

    /// Persists a per-method blob the plugin asked to store, minus
    /// credential fields.
    async fn process_store(&mut self, blob: SessionData) {
        if self.id.is_new() {
            warn!("plugin store without a stored identity");
            return;
        }
        let mut filtered = blob.filtered();
        filtered.remove(keys::SECRET);
        filtered.remove(keys::USER_NAME);
        filtered.remove(keys::ACCESS_CONTROL_TOKENS);
        if let Err(err) = self
            .deps
            .store
            .store_data(self.id, &self.method, &filtered)
            .await
        {
            error!(id = %self.id, %err, "storing method data failed");
        }

        if !self.deps.store.is_secrets_storage_open() && self.ui_displayed {
            if let Ok(info) = self.deps.store.credentials(self.id, false).await
                && info.validated
            {
                self.deps.bus.publish(DaemonEvent::SecureStorageUnavailable {
                    id: self.id,
                    method: self.method.clone(),
                });
            }
        }
        self.ui_displayed = false;
    }

    fn finish_head(
        &mut self,
        result: SignetResult<SessionData>,
        pending_ui: &mut Option<UiFuture>,
    ) {
        let cancel_key = self
            .queue
            .front()
            .map(|head| head.cancel_key.clone())
            .unwrap_or_default();
        if let Some(reply) = self.queue.front_mut().and_then(|head| head.reply.take()) {
            let _ = reply.send(result);
        }
        if pending_ui.take().is_some() || self.ui_displayed {
            self.deps.ui.cancel_ui_request(&cancel_key);
            self.ui_displayed = false;
        }
        self.request_done();
    }

    fn request_done(&mut self) {
        self.queue.pop_front();
        self.request_active = false;
    }

    fn clear_tmp(&mut self) {
        self.tmp_user_name.clear();
        self.tmp_secret = SecretString::default();
    }

    fn broadcast_state(&self, session_key: &str, state: PluginState, message: &str) {
        let _ = self.signals.send(SessionSignal::StateChanged {
            session_key: session_key.to_owned(),
            state,
            message: message.to_owned(),
        });
    }

    fn drain(mut self, err: SignetError) {
        while let Some(mut request) = self.queue.pop_front() {
            if let Some(reply) = request.reply.take() {
                let _ = reply.send(Err(err.clone()));
            }
        }
    }
}
