//! Peer contexts and their resolution to process-level identity.

use std::collections::HashMap;
use std::fmt;

use async_trait::async_trait;
use parking_lot::Mutex;
use signet_core::SecurityContext;
use thiserror::Error;

/// Opaque handle identifying the caller of one request.
///
/// Captures the bus connection name and the request serial; the engine
/// never reads process-level information from it directly.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct PeerContext {
    connection: String,
    serial: u64,
}

impl PeerContext {
    pub fn new(connection: impl Into<String>, serial: u64) -> Self {
        Self {
            connection: connection.into(),
            serial,
        }
    }

    pub fn connection(&self) -> &str {
        &self.connection
    }

    pub fn serial(&self) -> u64 {
        self.serial
    }
}

impl fmt::Display for PeerContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.connection, self.serial)
    }
}

/// Process-level facts about a peer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PeerInfo {
    pub pid: u32,
    pub app_id: String,
    pub contexts: Vec<SecurityContext>,
}

impl PeerInfo {
    pub fn new(pid: u32, app_id: impl Into<String>, contexts: Vec<SecurityContext>) -> Self {
        Self {
            pid,
            app_id: app_id.into(),
            contexts,
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AccessError {
    /// The resolver does not know this peer (it may have disconnected).
    #[error("unknown peer {0}")]
    UnknownPeer(String),
    /// The resolver backend failed.
    #[error("peer resolution failed: {0}")]
    ResolverFailed(String),
}

/// Turns a [`PeerContext`] into process-level identity.
#[async_trait]
pub trait PeerResolver: Send + Sync {
    async fn resolve(&self, peer: &PeerContext) -> Result<PeerInfo, AccessError>;
}

/// A table-backed resolver keyed by connection name.
///
/// The reference resolver for tests and single-machine deployments
/// where the launcher learns peer credentials at connection time.
#[derive(Default)]
pub struct StaticPeerResolver {
    peers: Mutex<HashMap<String, PeerInfo>>,
}

impl StaticPeerResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers (or replaces) the facts for a connection.
    pub fn insert(&self, connection: impl Into<String>, info: PeerInfo) {
        self.peers.lock().insert(connection.into(), info);
    }

    /// Forgets a disconnected peer.
    pub fn remove(&self, connection: &str) {
        self.peers.lock().remove(connection);
    }
}

#[async_trait]
impl PeerResolver for StaticPeerResolver {
    async fn resolve(&self, peer: &PeerContext) -> Result<PeerInfo, AccessError> {
        self.peers
            .lock()
            .get(peer.connection())
            .cloned()
            .ok_or_else(|| AccessError::UnknownPeer(peer.to_string()))
    }
}
