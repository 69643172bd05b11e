//! Security contexts: the caller classes named by ACLs and owner lists.

use std::fmt;

use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};

const WILDCARD: &str = "*";

/// A `(system context, application context)` pair identifying a class of
/// callers.
///
/// The system context typically names the client binary or its security
/// label; the application context subdivides it further. On the wire a
/// context is a pair of strings; legacy encodings that carry a bare
/// string are read as `(string, "")`.
///
/// A `"*"` system context acts as a wildcard matching every peer.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize)]
pub struct SecurityContext {
    pub system: String,
    pub application: String,
}

impl SecurityContext {
    pub fn new(system: impl Into<String>, application: impl Into<String>) -> Self {
        Self {
            system: system.into(),
            application: application.into(),
        }
    }

    /// Reads a legacy single-string entry as `(string, "")`.
    pub fn from_legacy(system: impl Into<String>) -> Self {
        Self::new(system, "")
    }

    /// The match-everything entry.
    pub fn wildcard() -> Self {
        Self::new(WILDCARD, "")
    }

    pub fn is_wildcard(&self) -> bool {
        self.system == WILDCARD
    }

    /// Whether this entry, read as an ACL/owner grant, admits `peer`.
    ///
    /// The system context must match exactly unless this entry is the
    /// wildcard; an empty or wildcard application context on either side
    /// matches any application context.
    pub fn grants(&self, peer: &SecurityContext) -> bool {
        let system_ok = self.system == WILDCARD || self.system == peer.system;
        let application_ok = self.application.is_empty()
            || self.application == WILDCARD
            || peer.application.is_empty()
            || self.application == peer.application;
        system_ok && application_ok
    }
}

impl fmt::Display for SecurityContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.application.is_empty() {
            write!(f, "{}", self.system)
        } else {
            write!(f, "{}:{}", self.system, self.application)
        }
    }
}

impl<'de> Deserialize<'de> for SecurityContext {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Repr {
            Pair { system: String, application: String },
            Tuple(String, String),
            Legacy(String),
        }

        match Repr::deserialize(deserializer).map_err(de::Error::custom)? {
            Repr::Pair {
                system,
                application,
            }
            | Repr::Tuple(system, application) => Ok(Self::new(system, application)),
            Repr::Legacy(system) => Ok(Self::from_legacy(system)),
        }
    }
}

/// Whether any entry in `grants` admits any of the peer's `contexts`.
pub fn any_grants(grants: &[SecurityContext], contexts: &[SecurityContext]) -> bool {
    grants
        .iter()
        .any(|entry| contexts.iter().any(|peer| entry.grants(peer)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_match_grants() {
        let entry = SecurityContext::new("app-a", "ctx");
        assert!(entry.grants(&SecurityContext::new("app-a", "ctx")));
        assert!(!entry.grants(&SecurityContext::new("app-b", "ctx")));
    }

    #[test]
    fn wildcard_system_grants_all() {
        let entry = SecurityContext::wildcard();
        assert!(entry.grants(&SecurityContext::new("anything", "at-all")));
    }

    #[test]
    fn empty_application_matches_any() {
        let entry = SecurityContext::from_legacy("app-a");
        assert!(entry.grants(&SecurityContext::new("app-a", "widget")));

        let narrow = SecurityContext::new("app-a", "widget");
        assert!(!narrow.grants(&SecurityContext::new("app-a", "other")));
    }

    #[test]
    fn legacy_string_deserializes() {
        let ctx: SecurityContext = serde_json::from_str("\"app-a\"").unwrap();
        assert_eq!(ctx, SecurityContext::from_legacy("app-a"));
    }

    #[test]
    fn pair_deserializes() {
        let ctx: SecurityContext =
            serde_json::from_str(r#"{"system":"app-a","application":"w"}"#).unwrap();
        assert_eq!(ctx, SecurityContext::new("app-a", "w"));

        let ctx: SecurityContext = serde_json::from_str(r#"["app-a","w"]"#).unwrap();
        assert_eq!(ctx, SecurityContext::new("app-a", "w"));
    }

    #[test]
    fn any_grants_crosses_lists() {
        let acl = vec![
            SecurityContext::new("app-a", ""),
            SecurityContext::new("app-b", "x"),
        ];
        let peer = vec![SecurityContext::new("app-b", "x")];
        assert!(any_grants(&acl, &peer));
        assert!(!any_grants(&acl, &[SecurityContext::new("app-c", "")]));
        assert!(!any_grants(&[], &peer));
    }
}
