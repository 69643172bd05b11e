//! The base authentication plugin trait.

use signet_core::SessionData;

use crate::error::PluginError;

/// Processing states a plugin can report through `state_changed`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PluginState {
    NotStarted,
    ResolvingHost,
    Connecting,
    SendingData,
    WaitingReply,
    UserPending,
    UiRefreshing,
    ProcessPending,
    Started,
    ProcessCanceling,
    ProcessDone,
    Custom,
}

impl PluginState {
    pub fn raw(self) -> u32 {
        match self {
            Self::NotStarted => 0,
            Self::ResolvingHost => 1,
            Self::Connecting => 2,
            Self::SendingData => 3,
            Self::WaitingReply => 4,
            Self::UserPending => 5,
            Self::UiRefreshing => 6,
            Self::ProcessPending => 7,
            Self::Started => 8,
            Self::ProcessCanceling => 9,
            Self::ProcessDone => 10,
            Self::Custom => 11,
        }
    }
}

/// One authentication method back-end.
///
/// Entry points return promptly; all outcomes arrive through the
/// [`PluginEventSink`](crate::PluginEventSink) the plugin was built
/// with, and every `process` ends with exactly one terminal event.
/// A plugin doing real I/O runs it on its own tasks and keeps the sink.
///
/// This trait is object-safe; sessions hold plugins as
/// `Box<dyn AuthPlugin>`.
pub trait AuthPlugin: Send {
    /// The method this plugin implements.
    fn method(&self) -> &str;

    /// Mechanisms the plugin supports, most preferred first.
    fn mechanisms(&self) -> Vec<String>;

    /// Starts processing a request. An `Err` means processing never
    /// began and no terminal event will follow.
    fn process(&mut self, params: &SessionData, mechanism: &str) -> Result<(), PluginError>;

    /// Resumes after a completed dialog with the dialog's result map.
    fn process_ui(&mut self, reply: &SessionData);

    /// Resumes after a refreshed dialog.
    fn process_refresh(&mut self, reply: &SessionData);

    /// Aborts the in-flight request. The plugin must still emit its
    /// terminal event (conventionally a `SessionCanceled` error).
    fn cancel(&mut self);
}
