//! The access-control mediator gating every externally reachable
//! operation.

use std::sync::Arc;

use async_trait::async_trait;
use signet_core::{IdentityId, SecurityContext, any_grants};
use signet_store::CredentialsStore;
use tracing::{debug, trace};

use crate::peer::{AccessError, PeerContext, PeerInfo, PeerResolver};

/// Answer to "may this peer modify or remove this identity".
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OwnershipVerdict {
    IdentityHasNoOwner,
    ApplicationIsOwner,
    ApplicationIsNotOwner,
}

/// Outcome of an escalated access request.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AccessOutcome {
    Accepted,
    Denied,
}

/// Decides contestable first-time access to an identity, typically by
/// prompting the user. A denied or unanswered request stays denied.
#[async_trait]
pub trait AccessRequestHandler: Send + Sync {
    async fn request_access(&self, peer: &PeerContext, id: IdentityId) -> AccessOutcome;
}

/// The default handler: every escalation is denied.
pub struct DenyAllAccess;

#[async_trait]
impl AccessRequestHandler for DenyAllAccess {
    async fn request_access(&self, _peer: &PeerContext, _id: IdentityId) -> AccessOutcome {
        AccessOutcome::Denied
    }
}

/// Process-wide access-control service.
///
/// Every predicate resolves the peer through the configured
/// [`PeerResolver`] and reads identity ACL/owner lists through the
/// store; a peer that cannot be resolved is denied everything.
pub struct AccessControl {
    resolver: Arc<dyn PeerResolver>,
    store: Arc<dyn CredentialsStore>,
    keychain_widget: SecurityContext,
    handler: Arc<dyn AccessRequestHandler>,
}

impl AccessControl {
    pub fn new(
        resolver: Arc<dyn PeerResolver>,
        store: Arc<dyn CredentialsStore>,
        keychain_widget: SecurityContext,
    ) -> Self {
        Self {
            resolver,
            store,
            keychain_widget,
            handler: Arc::new(DenyAllAccess),
        }
    }

    /// Replaces the deny-all escalation handler.
    pub fn with_access_handler(mut self, handler: Arc<dyn AccessRequestHandler>) -> Self {
        self.handler = handler;
        self
    }

    async fn peer_info(&self, peer: &PeerContext) -> Option<PeerInfo> {
        match self.resolver.resolve(peer).await {
            Ok(info) => Some(info),
            Err(err) => {
                debug!(%peer, %err, "peer did not resolve; denying");
                None
            }
        }
    }

    /// Application id of the peer, empty when it cannot be resolved.
    pub async fn app_id_of_peer(&self, peer: &PeerContext) -> String {
        self.peer_info(peer).await.map(|i| i.app_id).unwrap_or_default()
    }

    /// Process id of the peer, 0 when it cannot be resolved.
    pub async fn pid_of_peer(&self, peer: &PeerContext) -> u32 {
        self.peer_info(peer).await.map(|i| i.pid).unwrap_or(0)
    }

    /// Whether the peer may authenticate with / read the identity: it
    /// holds an ACL entry, or the identity has no owners yet, or the
    /// peer is itself an owner.
    pub async fn is_peer_allowed_to_use_identity(
        &self,
        peer: &PeerContext,
        id: IdentityId,
    ) -> bool {
        let Ok(info) = self.store.credentials(id, false).await else {
            return false;
        };
        if info.acl.iter().any(SecurityContext::is_wildcard) {
            return true;
        }
        let Some(peer_info) = self.peer_info(peer).await else {
            return false;
        };
        if info.owners.is_empty() {
            // Untrusted-new identity: nobody claimed it yet.
            return true;
        }
        let allowed = any_grants(&info.owners, &peer_info.contexts)
            || any_grants(&info.acl, &peer_info.contexts);
        trace!(%peer, %id, allowed, "use-identity check");
        allowed
    }

    /// Ownership verdict for modify/remove decisions.
    pub async fn is_peer_owner_of_identity(
        &self,
        peer: &PeerContext,
        id: IdentityId,
    ) -> OwnershipVerdict {
        let Ok(info) = self.store.credentials(id, false).await else {
            return OwnershipVerdict::ApplicationIsNotOwner;
        };
        if info.owners.is_empty() {
            return OwnershipVerdict::IdentityHasNoOwner;
        }
        let Some(peer_info) = self.peer_info(peer).await else {
            return OwnershipVerdict::ApplicationIsNotOwner;
        };
        if any_grants(&info.owners, &peer_info.contexts) {
            OwnershipVerdict::ApplicationIsOwner
        } else {
            OwnershipVerdict::ApplicationIsNotOwner
        }
    }

    /// Whether the peer is the configured keychain-manager application.
    pub async fn is_peer_keychain_widget(&self, peer: &PeerContext) -> bool {
        let Some(peer_info) = self.peer_info(peer).await else {
            return false;
        };
        peer_info
            .contexts
            .iter()
            .any(|ctx| self.keychain_widget.grants(ctx))
    }

    /// Whether the peer may see `token` (used when propagating
    /// access-control tokens into plugin input).
    pub async fn is_peer_allowed_to_access(
        &self,
        peer: &PeerContext,
        token: &SecurityContext,
    ) -> bool {
        let Some(peer_info) = self.peer_info(peer).await else {
            return false;
        };
        any_grants(std::slice::from_ref(token), &peer_info.contexts)
    }

    /// Whether the peer may request this ACL/owner list: every entry
    /// must be a context the peer itself possesses. Prevents widening
    /// sharing beyond the caller's own reach.
    pub async fn is_acl_valid(&self, peer: &PeerContext, requested: &[SecurityContext]) -> bool {
        let Some(peer_info) = self.peer_info(peer).await else {
            return false;
        };
        requested.iter().all(|entry| {
            peer_info
                .contexts
                .iter()
                .any(|own| own == entry || own.is_wildcard())
        })
    }

    /// Escalates a contestable denial. Only an accepted outcome lets
    /// the blocked operation proceed, and callers re-check the
    /// original predicate afterwards.
    pub async fn request_access(&self, peer: &PeerContext, id: IdentityId) -> AccessOutcome {
        debug!(%peer, %id, "escalating access request");
        self.handler.request_access(peer, id).await
    }
}
