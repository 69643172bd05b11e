//! The identity credential record and its wire encoding.

use indexmap::IndexMap;
use serde_json::Value;
use thiserror::Error;

use crate::id::IdentityId;
use crate::keys;
use crate::secret::SecretString;
use crate::security::SecurityContext;
use crate::session_data::SessionData;

/// Method name → ordered list of mechanism names allowed for the method.
pub type MethodMap = IndexMap<String, Vec<String>>;

/// Kind of change announced by an identity's `info_updated` signal.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IdentityChange {
    Updated,
    Removed,
    SignedOut,
}

impl IdentityChange {
    pub fn raw(self) -> u32 {
        match self {
            Self::Updated => 0,
            Self::Removed => 1,
            Self::SignedOut => 2,
        }
    }
}

/// Error reading an identity record from its wire map.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum InfoError {
    #[error("malformed value under key '{key}'")]
    MalformedField { key: &'static str },
}

/// One stored credential record.
///
/// The secret is held as a [`SecretString`] and is excluded from the
/// wire map unless explicitly requested via [`to_map_with_secret`].
///
/// [`to_map_with_secret`]: IdentityInfo::to_map_with_secret
#[derive(Clone, Debug, Default, PartialEq)]
pub struct IdentityInfo {
    pub id: IdentityId,
    pub user_name: String,
    pub secret: SecretString,
    pub store_secret: bool,
    pub caption: String,
    pub realms: Vec<String>,
    pub methods: MethodMap,
    pub acl: Vec<SecurityContext>,
    pub owners: Vec<SecurityContext>,
    pub credential_type: u32,
    pub validated: bool,
}

impl IdentityInfo {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_new(&self) -> bool {
        self.id.is_new()
    }

    /// A copy with the secret wiped, safe to hand to callers.
    pub fn without_secret(&self) -> Self {
        Self {
            secret: SecretString::default(),
            ..self.clone()
        }
    }

    /// Wire map without the secret field.
    pub fn to_map(&self) -> SessionData {
        self.encode(false)
    }

    /// Wire map including the secret; only for callers that are both
    /// explicit and authorized.
    pub fn to_map_with_secret(&self) -> SessionData {
        self.encode(true)
    }

    fn encode(&self, with_secret: bool) -> SessionData {
        let mut map = SessionData::new();
        map.insert(keys::ID, self.id.as_u32());
        map.insert(keys::USER_NAME, self.user_name.as_str());
        if with_secret && !self.secret.is_empty() {
            map.insert(keys::SECRET, self.secret.reveal());
        }
        map.insert(keys::STORE_SECRET, self.store_secret);
        map.insert(keys::CAPTION, self.caption.as_str());
        map.insert(
            keys::REALMS,
            Value::from(self.realms.iter().map(String::as_str).collect::<Vec<_>>()),
        );
        let methods: IndexMap<&str, Value> = self
            .methods
            .iter()
            .map(|(m, mechs)| (m.as_str(), Value::from(mechs.clone())))
            .collect();
        map.insert(
            keys::AUTH_METHODS,
            serde_json::to_value(methods).unwrap_or(Value::Null),
        );
        map.insert(
            keys::ACL,
            serde_json::to_value(&self.acl).unwrap_or(Value::Null),
        );
        map.insert(
            keys::OWNER,
            serde_json::to_value(&self.owners).unwrap_or(Value::Null),
        );
        map.insert(keys::TYPE, self.credential_type);
        map.insert(keys::VALIDATED, self.validated);
        map
    }

    /// Reads a record from its wire map. Missing fields default. The
    /// `Validated` flag is never read from a map: validation is earned
    /// through a successful authentication, not claimed by a client.
    pub fn from_map(map: &SessionData) -> Result<Self, InfoError> {
        let mut info = Self::new();
        if let Some(id) = map.u32_value(keys::ID) {
            info.id = IdentityId::new(id);
        }
        if let Some(name) = map.str_value(keys::USER_NAME) {
            info.user_name = name.to_owned();
        }
        if let Some(secret) = map.str_value(keys::SECRET) {
            info.secret = SecretString::new(secret);
        }
        info.store_secret = map.bool_value(keys::STORE_SECRET).unwrap_or(false);
        if let Some(caption) = map.str_value(keys::CAPTION) {
            info.caption = caption.to_owned();
        }
        if let Some(realms) = map.get(keys::REALMS) {
            info.realms = decode_list(realms, keys::REALMS)?;
        }
        if let Some(methods) = map.get(keys::AUTH_METHODS) {
            info.methods = decode_methods(methods)?;
        }
        if let Some(acl) = map.get(keys::ACL) {
            info.acl = decode_contexts(acl, keys::ACL)?;
        }
        if let Some(owners) = map.get(keys::OWNER) {
            info.owners = decode_contexts(owners, keys::OWNER)?;
        }
        info.credential_type = map.u32_value(keys::TYPE).unwrap_or(0);
        Ok(info)
    }
}

fn decode_list(value: &Value, key: &'static str) -> Result<Vec<String>, InfoError> {
    serde_json::from_value(value.clone()).map_err(|_| InfoError::MalformedField { key })
}

fn decode_methods(value: &Value) -> Result<MethodMap, InfoError> {
    serde_json::from_value(value.clone()).map_err(|_| InfoError::MalformedField {
        key: keys::AUTH_METHODS,
    })
}

fn decode_contexts(value: &Value, key: &'static str) -> Result<Vec<SecurityContext>, InfoError> {
    serde_json::from_value(value.clone()).map_err(|_| InfoError::MalformedField { key })
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;

    fn sample() -> IdentityInfo {
        IdentityInfo {
            id: IdentityId::new(3),
            user_name: "alice".into(),
            secret: SecretString::new("pw"),
            store_secret: true,
            caption: "mail account".into(),
            realms: vec!["example.org".into()],
            methods: MethodMap::from_iter([("password".to_owned(), vec!["password".to_owned()])]),
            acl: vec![SecurityContext::new("app-a", "")],
            owners: vec![SecurityContext::new("app-a", "")],
            credential_type: 1,
            validated: false,
        }
    }

    #[test]
    fn map_round_trip_without_secret() {
        let info = sample();
        let map = info.to_map();
        assert!(!map.contains(keys::SECRET));

        let back = IdentityInfo::from_map(&map).unwrap();
        assert_eq!(back.user_name, info.user_name);
        assert_eq!(back.methods, info.methods);
        assert_eq!(back.acl, info.acl);
        assert!(back.secret.is_empty());
    }

    #[test]
    fn map_with_secret_carries_it() {
        let map = sample().to_map_with_secret();
        assert_eq!(map.secret(), Some("pw"));
        let back = IdentityInfo::from_map(&map).unwrap();
        assert_eq!(back.secret, SecretString::new("pw"));
    }

    #[test]
    fn without_secret_wipes_only_secret() {
        let stripped = sample().without_secret();
        assert!(stripped.secret.is_empty());
        assert_eq!(stripped.user_name, "alice");
        assert!(stripped.store_secret);
    }

    #[test]
    fn from_map_accepts_legacy_acl_strings() {
        let mut map = SessionData::new();
        map.insert(keys::ACL, json!(["app-a", "app-b"]));
        let info = IdentityInfo::from_map(&map).unwrap();
        assert_eq!(
            info.acl,
            vec![
                SecurityContext::from_legacy("app-a"),
                SecurityContext::from_legacy("app-b"),
            ]
        );
    }

    #[test]
    fn from_map_rejects_malformed_methods() {
        let mut map = SessionData::new();
        map.insert(keys::AUTH_METHODS, json!("not-a-map"));
        let err = IdentityInfo::from_map(&map).unwrap_err();
        assert_eq!(
            err,
            InfoError::MalformedField {
                key: keys::AUTH_METHODS
            }
        );
    }

    #[test]
    fn validated_is_never_read_from_client_maps() {
        let mut map = sample().to_map();
        map.insert(keys::VALIDATED, true);
        let info = IdentityInfo::from_map(&map).unwrap();
        assert!(!info.validated);
    }
}
