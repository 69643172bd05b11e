//! Method-name → plugin factory registry.

use std::collections::HashMap;

use tokio::sync::mpsc;
use tracing::debug;

use crate::error::PluginError;
use crate::event::{PluginEvent, PluginEventSink, event_channel};
use crate::password::{PASSWORD_METHOD, PasswordPlugin};
use crate::plugin::AuthPlugin;

type Factory = Box<dyn Fn(PluginEventSink) -> Box<dyn AuthPlugin> + Send + Sync>;

struct Registered {
    mechanisms: Vec<String>,
    factory: Factory,
}

/// Registry of available authentication methods.
///
/// Each entry pairs the method's static mechanism list (answered
/// without instantiating anything) with a factory producing a fresh
/// plugin wired to an event channel.
///
/// ```
/// use signet_plugin::PluginRegistry;
///
/// let registry = PluginRegistry::with_builtins();
/// assert_eq!(registry.methods(), vec!["password".to_owned()]);
/// let (_plugin, _events) = registry.create("password").unwrap();
/// ```
pub struct PluginRegistry {
    plugins: HashMap<String, Registered>,
}

impl PluginRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self {
            plugins: HashMap::new(),
        }
    }

    /// A registry preloaded with the built-in `password` method.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry
            .register(PASSWORD_METHOD, vec![PASSWORD_METHOD.to_owned()], |sink| {
                Box::new(PasswordPlugin::new(sink))
            })
            .expect("empty registry accepts the builtin");
        registry
    }

    /// Registers a method. Fails if the name is taken.
    pub fn register<F>(
        &mut self,
        method: &str,
        mechanisms: Vec<String>,
        factory: F,
    ) -> Result<(), PluginError>
    where
        F: Fn(PluginEventSink) -> Box<dyn AuthPlugin> + Send + Sync + 'static,
    {
        if self.plugins.contains_key(method) {
            return Err(PluginError::AlreadyRegistered(method.to_owned()));
        }
        debug!(method, ?mechanisms, "plugin registered");
        self.plugins.insert(
            method.to_owned(),
            Registered {
                mechanisms,
                factory: Box::new(factory),
            },
        );
        Ok(())
    }

    pub fn contains(&self, method: &str) -> bool {
        self.plugins.contains_key(method)
    }

    /// All registered method names, sorted.
    pub fn methods(&self) -> Vec<String> {
        let mut methods: Vec<String> = self.plugins.keys().cloned().collect();
        methods.sort();
        methods
    }

    /// Mechanisms of one method.
    pub fn mechanisms(&self, method: &str) -> Result<Vec<String>, PluginError> {
        self.plugins
            .get(method)
            .map(|r| r.mechanisms.clone())
            .ok_or_else(|| PluginError::MethodNotKnown(method.to_owned()))
    }

    /// Instantiates a plugin for the method, wired to a fresh event
    /// channel whose receiving half is returned alongside it.
    pub fn create(
        &self,
        method: &str,
    ) -> Result<(Box<dyn AuthPlugin>, mpsc::UnboundedReceiver<PluginEvent>), PluginError> {
        let registered = self
            .plugins
            .get(method)
            .ok_or_else(|| PluginError::MethodNotKnown(method.to_owned()))?;
        let (sink, events) = event_channel();
        Ok(((registered.factory)(sink), events))
    }
}

impl Default for PluginRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for PluginRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginRegistry")
            .field("methods", &self.methods())
            .finish()
    }
}
