//! Events a plugin reports into its driving session.

use signet_core::SessionData;
use tokio::sync::mpsc;
use tracing::trace;

use crate::plugin::PluginState;

/// A signal emitted by a plugin while processing one request.
///
/// Exactly one terminal event ([`Result`](PluginEvent::Result) or
/// [`Error`](PluginEvent::Error)) ends each request; the others may
/// occur any number of times before it.
#[derive(Clone, Debug, PartialEq)]
pub enum PluginEvent {
    /// Successful completion with the result map.
    Result(SessionData),
    /// Failed completion; `code` uses the numeric plugin code space.
    Error { code: u32, message: String },
    /// Ask the daemon to persist a per-method blob for the identity.
    Store(SessionData),
    /// Ask the daemon to run an interactive dialog.
    UiRequest(SessionData),
    /// Ask the daemon to refresh the dialog already on screen.
    RefreshRequest(SessionData),
    /// Progress note, forwarded to the client as `state_changed`.
    StateChanged { state: PluginState, message: String },
}

impl PluginEvent {
    /// Whether this event ends the active request.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Result(_) | Self::Error { .. })
    }
}

/// Creates the channel a plugin reports through; the receiving half
/// belongs to the session core driving the plugin.
pub fn event_channel() -> (PluginEventSink, mpsc::UnboundedReceiver<PluginEvent>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (PluginEventSink { tx }, rx)
}

/// Sending half of a plugin's event channel.
///
/// Sinks are cheap to clone; a plugin that spawns worker tasks hands
/// each one a clone. Sends to a session that is already gone are
/// silently dropped.
#[derive(Clone)]
pub struct PluginEventSink {
    tx: mpsc::UnboundedSender<PluginEvent>,
}

impl PluginEventSink {
    pub fn emit(&self, event: PluginEvent) {
        trace!(terminal = event.is_terminal(), "plugin event emitted");
        let _ = self.tx.send(event);
    }

    pub fn result(&self, data: SessionData) {
        self.emit(PluginEvent::Result(data));
    }

    pub fn error(&self, code: u32, message: impl Into<String>) {
        self.emit(PluginEvent::Error {
            code,
            message: message.into(),
        });
    }

    pub fn store(&self, blob: SessionData) {
        self.emit(PluginEvent::Store(blob));
    }

    pub fn ui_request(&self, params: SessionData) {
        self.emit(PluginEvent::UiRequest(params));
    }

    pub fn refresh_request(&self, params: SessionData) {
        self.emit(PluginEvent::RefreshRequest(params));
    }

    pub fn state_changed(&self, state: PluginState, message: impl Into<String>) {
        self.emit(PluginEvent::StateChanged {
            state,
            message: message.into(),
        });
    }
}
