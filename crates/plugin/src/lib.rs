//! Authentication plugin contract and registry.
//!
//! A plugin implements one authentication method and reports everything
//! that happens (results, errors, UI requests, state transitions)
//! through a [`PluginEventSink`] into the session that drives it. The
//! [`PluginRegistry`] maps method names to factories and answers the
//! daemon's method/mechanism queries. The built-in
//! [`PasswordPlugin`] covers the `password` method.

mod error;
mod event;
mod password;
mod plugin;
mod registry;

pub use error::PluginError;
pub use event::{PluginEvent, PluginEventSink, event_channel};
pub use password::{PASSWORD_METHOD, PasswordPlugin};
pub use plugin::{AuthPlugin, PluginState};
pub use registry::PluginRegistry;
