//! The Signet daemon engine.
//!
//! Three parts carry the daemon's behaviour:
//!
//! - [`IdentityObject`]: the in-memory, shared-per-id view of one
//!   credential record, gating every CRUD and verification operation
//!   through access control;
//! - the session layer ([`AuthSessionHandle`] over a per-`(id, method)`
//!   session core): a FIFO of authentication requests driving one
//!   plugin and the interactive-prompt agent;
//! - the [`Daemon`] facade: the top-level dispatcher owning the
//!   identity and session registries.
//!
//! Bus wiring and the process launcher live outside this crate; the
//! facade is the server contract they expose.

mod config;
mod disposable;
mod events;
mod facade;
mod identity;
mod registry;
mod session;

pub use config::DaemonConfig;
pub use events::DaemonEvent;
pub use facade::{Daemon, DaemonBuilder};
pub use identity::{IdentityObject, IdentitySignal};
pub use session::{AuthSessionHandle, SessionSignal};

use signet_error::{ErrorKind, SignetError};
use signet_store::StoreError;

/// Store-layer failures translated into the wire taxonomy.
pub(crate) fn store_error(err: StoreError) -> SignetError {
    match err {
        StoreError::NotFound { .. } => ErrorKind::IdentityNotFound.into(),
        StoreError::ReferenceNotFound => ErrorKind::ReferenceNotFound.into(),
        StoreError::Unavailable => SignetError::with_message(
            ErrorKind::InternalServer,
            "could not access the credentials database",
        ),
        StoreError::Backend { reason } => SignetError::with_message(ErrorKind::StoreFailed, reason),
    }
}
