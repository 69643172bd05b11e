//! Ordered map-of-variants exchanged with clients, plugins, and the UI.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::keys;
use crate::security::SecurityContext;

/// UI interaction policy a client may request for a session.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum UiPolicy {
    /// Prompt only when the plugin needs input it does not have.
    #[default]
    Default,
    /// Always prompt for the secret, ignoring the stored one.
    RequestPassword,
    /// Never prompt; fail instead.
    NoUserInteraction,
    /// Prompt to confirm already-known credentials.
    Validation,
}

impl UiPolicy {
    pub fn from_raw(raw: u32) -> Option<Self> {
        match raw {
            0 => Some(Self::Default),
            1 => Some(Self::RequestPassword),
            2 => Some(Self::NoUserInteraction),
            3 => Some(Self::Validation),
            _ => None,
        }
    }

    pub fn raw(self) -> u32 {
        match self {
            Self::Default => 0,
            Self::RequestPassword => 1,
            Self::NoUserInteraction => 2,
            Self::Validation => 3,
        }
    }
}

/// Ordered `key -> variant` map: session inputs, plugin results, UI
/// parameters, and per-method blobs all travel in this shape.
///
/// ```
/// use signet_core::SessionData;
///
/// let mut data = SessionData::new();
/// data.insert("UserName", "alice");
/// data.insert("Attempts", 3);
/// assert_eq!(data.user_name(), Some("alice"));
/// ```
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionData(IndexMap<String, Value>);

impl SessionData {
    pub fn new() -> Self {
        Self::default()
    }

    /// A copy with null entries dropped. Plugin and UI replies are run
    /// through this before they are acted upon.
    pub fn filtered(&self) -> Self {
        Self(
            self.0
                .iter()
                .filter(|(_, v)| !v.is_null())
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        )
    }

    /// Overlays `self` on `defaults`: every key of `self` wins, keys only
    /// present in `defaults` are kept.
    pub fn overlaid_on(&self, defaults: &SessionData) -> SessionData {
        let mut merged = defaults.clone();
        for (k, v) in &self.0 {
            merged.0.insert(k.clone(), v.clone());
        }
        merged
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.0.shift_remove(key)
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    pub fn str_value(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(Value::as_str)
    }

    pub fn bool_value(&self, key: &str) -> Option<bool> {
        self.0.get(key).and_then(Value::as_bool)
    }

    pub fn u32_value(&self, key: &str) -> Option<u32> {
        self.0
            .get(key)
            .and_then(Value::as_u64)
            .and_then(|v| u32::try_from(v).ok())
    }

    // Typed accessors for the well-known keys.

    pub fn user_name(&self) -> Option<&str> {
        self.str_value(keys::USER_NAME)
    }

    pub fn set_user_name(&mut self, user_name: &str) {
        self.insert(keys::USER_NAME, user_name);
    }

    pub fn secret(&self) -> Option<&str> {
        self.str_value(keys::SECRET)
    }

    pub fn set_secret(&mut self, secret: &str) {
        self.insert(keys::SECRET, secret);
    }

    pub fn remove_secret(&mut self) -> Option<Value> {
        self.remove(keys::SECRET)
    }

    pub fn caption(&self) -> Option<&str> {
        self.str_value(keys::CAPTION)
    }

    pub fn set_caption(&mut self, caption: &str) {
        self.insert(keys::CAPTION, caption);
    }

    pub fn ui_policy(&self) -> Option<UiPolicy> {
        self.u32_value(keys::UI_POLICY).and_then(UiPolicy::from_raw)
    }

    pub fn set_ui_policy(&mut self, policy: UiPolicy) {
        self.insert(keys::UI_POLICY, policy.raw());
    }

    pub fn access_control_tokens(&self) -> Vec<SecurityContext> {
        self.0
            .get(keys::ACCESS_CONTROL_TOKENS)
            .cloned()
            .and_then(|v| serde_json::from_value(v).ok())
            .unwrap_or_default()
    }

    pub fn set_access_control_tokens(&mut self, tokens: &[SecurityContext]) {
        if let Ok(value) = serde_json::to_value(tokens) {
            self.0.insert(keys::ACCESS_CONTROL_TOKENS.into(), value);
        }
    }
}

impl From<IndexMap<String, Value>> for SessionData {
    fn from(map: IndexMap<String, Value>) -> Self {
        Self(map)
    }
}

impl From<SessionData> for IndexMap<String, Value> {
    fn from(data: SessionData) -> Self {
        data.0
    }
}

impl FromIterator<(String, Value)> for SessionData {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl IntoIterator for SessionData {
    type Item = (String, Value);
    type IntoIter = indexmap::map::IntoIter<String, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}
