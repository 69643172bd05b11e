//! Daemon-internal broadcast events.

use signet_core::IdentityId;
use signet_eventbus::EventBus;

/// Events published on the daemon's internal bus.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DaemonEvent {
    /// A session finalised a result while the secrets database was
    /// closed and a dialog had been shown; a higher layer may want to
    /// prompt for an unlock.
    SecureStorageUnavailable { id: IdentityId, method: String },
    /// An identity was signed out; its sessions are being wound down.
    IdentitySignedOut(IdentityId),
    /// An identity was removed from the store.
    IdentityRemoved(IdentityId),
}

pub(crate) type DaemonBus = EventBus<DaemonEvent>;
