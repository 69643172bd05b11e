//! Numeric identity keys.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Primary key of a stored identity.
///
/// Identity ids are dense 32-bit integers assigned by the credentials
/// store. The distinguished value [`IdentityId::NEW`] marks an identity
/// that has never been persisted; storing such an identity assigns a
/// fresh id.
///
/// ```
/// use signet_core::IdentityId;
///
/// let scratch = IdentityId::NEW;
/// assert!(scratch.is_new());
///
/// let stored = IdentityId::from(7);
/// assert!(!stored.is_new());
/// assert_eq!(stored.to_string(), "7");
/// ```
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IdentityId(u32);

impl IdentityId {
    /// The not-yet-stored identity.
    pub const NEW: Self = Self(0);

    /// Wraps a raw store-assigned id.
    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    /// Raw numeric value, as it travels on the wire.
    pub const fn as_u32(self) -> u32 {
        self.0
    }

    /// Whether this identity has never been persisted.
    pub const fn is_new(self) -> bool {
        self.0 == Self::NEW.0
    }
}

impl From<u32> for IdentityId {
    fn from(raw: u32) -> Self {
        Self(raw)
    }
}

impl From<IdentityId> for u32 {
    fn from(id: IdentityId) -> Self {
        id.0
    }
}

impl fmt::Display for IdentityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}
