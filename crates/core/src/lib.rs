//! Core data model for the Signet credential daemon.
//!
//! This crate defines the types shared by every layer of the daemon: the
//! [`IdentityInfo`] credential record and its wire encoding, strongly-typed
//! [`IdentityId`]s, [`SecurityContext`] pairs used by ACLs and owner lists,
//! the ordered [`SessionData`] map-of-variants exchanged with plugins and
//! the UI agent, and the zeroizing [`SecretString`].

mod filter;
mod id;
mod identity;
pub mod keys;
mod secret;
mod security;
mod session_data;

pub use filter::IdentityFilter;
pub use id::IdentityId;
pub use identity::{IdentityChange, IdentityInfo, InfoError, MethodMap};
pub use secret::SecretString;
pub use security::{SecurityContext, any_grants};
pub use session_data::{SessionData, UiPolicy};
