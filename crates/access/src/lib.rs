//! Caller identification and access-control mediation.
//!
//! A [`PeerContext`] is the only admitted identity of a caller inside
//! the daemon; a [`PeerResolver`] turns it into process-level facts
//! (pid, application id, security contexts) and [`AccessControl`]
//! answers every allow/deny question the engine asks. Contestable
//! denials can be escalated through an [`AccessRequestHandler`].

mod control;
mod peer;

pub use control::{
    AccessControl, AccessOutcome, AccessRequestHandler, DenyAllAccess, OwnershipVerdict,
};
pub use peer::{AccessError, PeerContext, PeerInfo, PeerResolver, StaticPeerResolver};
