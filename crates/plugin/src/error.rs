//! Plugin-layer failures.

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PluginError {
    /// No plugin is registered for the method.
    #[error("no plugin registered for method '{0}'")]
    MethodNotKnown(String),

    /// A plugin for this method is already registered.
    #[error("method '{0}' is already registered")]
    AlreadyRegistered(String),

    /// The plugin does not implement the requested mechanism.
    #[error("mechanism '{0}' is not available")]
    MechanismNotAvailable(String),

    /// The plugin refused to start processing.
    #[error("plugin failed to start: {0}")]
    StartFailed(String),
}
