//! Identity query filters.

use serde::{Deserialize, Serialize};

/// Wildcard search criteria for `query_identities`.
///
/// Keys form a small closed set; pattern-matching semantics belong to
/// the store that executes the query.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityFilter {
    #[serde(rename = "AuthMethod", skip_serializing_if = "Option::is_none")]
    pub auth_method: Option<String>,
    #[serde(rename = "Username", skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(rename = "Realm", skip_serializing_if = "Option::is_none")]
    pub realm: Option<String>,
    #[serde(rename = "Caption", skip_serializing_if = "Option::is_none")]
    pub caption: Option<String>,
}

impl IdentityFilter {
    /// Matches everything.
    pub fn all() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.auth_method.is_none()
            && self.username.is_none()
            && self.realm.is_none()
            && self.caption.is_none()
    }
}
