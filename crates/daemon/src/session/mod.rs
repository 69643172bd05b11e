//! Authentication sessions: per-`(identity, method)` request queues.

pub(crate) mod core;
pub(crate) mod registry;

pub(crate) use registry::SessionRegistry;

use std::sync::Weak;

use signet_access::PeerContext;
use signet_core::{IdentityId, SessionData};
use signet_error::{ErrorKind, SignetError, SignetResult};
use signet_plugin::PluginState;
use tokio::sync::{broadcast, mpsc, oneshot};

/// Signals a client session handle can observe.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SessionSignal {
    /// Plugin state transition, addressed to one session handle by its
    /// key.
    StateChanged {
        session_key: String,
        state: PluginState,
        message: String,
    },
}

/// Commands into a running session core.
pub(crate) enum SessionControl {
    Process(ProcessRequest),
    Cancel {
        cancel_key: String,
    },
    /// Session-wide cancellation (identity sign-out).
    CancelAll,
    SetId(IdentityId),
    QueryMechanisms {
        wanted: Vec<String>,
        reply: oneshot::Sender<Vec<String>>,
    },
    Stop,
}

/// One authentication request as it travels into the queue.
pub(crate) struct ProcessRequest {
    pub peer: PeerContext,
    pub params: SessionData,
    pub mechanism: String,
    pub cancel_key: String,
    pub reply: oneshot::Sender<SignetResult<SessionData>>,
}

/// Client-side handle onto a session core.
///
/// Several handles may share one core (same stored identity and
/// method); their requests interleave in the core's single FIFO.
/// The handle's object path doubles as its cancellation key.
#[derive(Clone, Debug)]
pub struct AuthSessionHandle {
    object_path: String,
    method: String,
    core_id: u64,
    ctl: mpsc::UnboundedSender<SessionControl>,
    signals: broadcast::Sender<SessionSignal>,
    registry: Weak<SessionRegistry>,
}

impl AuthSessionHandle {
    pub(crate) fn new(
        object_path: String,
        method: String,
        core_id: u64,
        ctl: mpsc::UnboundedSender<SessionControl>,
        signals: broadcast::Sender<SessionSignal>,
        registry: Weak<SessionRegistry>,
    ) -> Self {
        Self {
            object_path,
            method,
            core_id,
            ctl,
            signals,
            registry,
        }
    }

    pub fn object_path(&self) -> &str {
        &self.object_path
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    /// Enqueues one authentication request and waits for its reply.
    /// Replies come back in arrival order across all handles of the
    /// core.
    pub async fn process(
        &self,
        peer: &PeerContext,
        params: SessionData,
        mechanism: &str,
    ) -> SignetResult<SessionData> {
        let (tx, rx) = oneshot::channel();
        let request = ProcessRequest {
            peer: peer.clone(),
            params,
            mechanism: mechanism.to_owned(),
            cancel_key: self.object_path.clone(),
            reply: tx,
        };
        self.ctl
            .send(SessionControl::Process(request))
            .map_err(|_| session_gone())?;
        rx.await.unwrap_or_else(|_| Err(session_gone()))
    }

    /// Cancels this handle's pending request, if any.
    pub fn cancel(&self) {
        let _ = self.ctl.send(SessionControl::Cancel {
            cancel_key: self.object_path.clone(),
        });
    }

    /// Mechanisms of the underlying plugin, optionally intersected with
    /// a wanted list.
    pub async fn query_available_mechanisms(
        &self,
        wanted: &[String],
    ) -> SignetResult<Vec<String>> {
        let (tx, rx) = oneshot::channel();
        self.ctl
            .send(SessionControl::QueryMechanisms {
                wanted: wanted.to_vec(),
                reply: tx,
            })
            .map_err(|_| session_gone())?;
        rx.await.map_err(|_| session_gone())
    }

    /// Rekeys the session after its identity was persisted. Refused
    /// (and logged) when the target slot is already taken.
    pub fn set_id(&self, id: IdentityId) {
        if let Some(registry) = self.registry.upgrade() {
            registry.rekey(self.core_id, id);
        }
    }

    /// Subscribes to `state_changed` signals; filter on
    /// [`object_path`](Self::object_path) to observe only this handle.
    pub fn subscribe(&self) -> broadcast::Receiver<SessionSignal> {
        self.signals.subscribe()
    }
}

fn session_gone() -> SignetError {
    SignetError::with_message(ErrorKind::InternalCommunication, "session is gone")
}
