//! Store-layer failures.

use signet_core::IdentityId;
use thiserror::Error;

/// Errors surfaced by a [`CredentialsStore`](crate::CredentialsStore)
/// implementation. The daemon layer translates these into the wire
/// taxonomy at its edge.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum StoreError {
    /// No identity is stored under this id.
    #[error("identity {id} not found")]
    NotFound { id: IdentityId },

    /// The `(identity, application, name)` reference triple does not
    /// exist.
    #[error("reference not found")]
    ReferenceNotFound,

    /// The store is not ready to serve requests.
    #[error("credentials store unavailable")]
    Unavailable,

    /// Backend failure while reading or writing.
    #[error("store backend failed: {reason}")]
    Backend { reason: String },
}

impl StoreError {
    pub fn backend(reason: impl Into<String>) -> Self {
        Self::Backend {
            reason: reason.into(),
        }
    }
}
