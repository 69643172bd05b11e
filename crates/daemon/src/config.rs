//! Daemon configuration.

use std::time::Duration;

use serde::Deserialize;
use signet_core::SecurityContext;

/// Tunables of the daemon engine.
///
/// Deserializes from the launcher's config file with human-readable
/// durations (`"5m"`, `"5s"`); every field has a production default.
///
/// ```
/// use signet_daemon::DaemonConfig;
///
/// let config: DaemonConfig =
///     serde_json::from_str(r#"{"identity_timeout": "2m"}"#).unwrap();
/// assert_eq!(config.identity_timeout.as_secs(), 120);
/// ```
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct DaemonConfig {
    /// Idle interval after which an unused identity object is destroyed.
    #[serde(with = "humantime_serde")]
    pub identity_timeout: Duration,

    /// Idle interval after which an empty session self-destructs.
    #[serde(with = "humantime_serde")]
    pub session_timeout: Duration,

    /// How long sessions of a signed-out identity get to wind down
    /// before they are forcibly destroyed.
    #[serde(with = "humantime_serde")]
    pub signout_grace: Duration,

    /// Timeout on interactive dialog calls; generous because a human is
    /// on the other end.
    #[serde(with = "humantime_serde")]
    pub ui_timeout: Duration,

    /// Security context of the keychain-manager application allowed to
    /// enumerate and wipe identities.
    pub keychain_widget: SecurityContext,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            identity_timeout: Duration::from_secs(300),
            session_timeout: Duration::from_secs(300),
            signout_grace: Duration::from_secs(5),
            ui_timeout: Duration::from_secs(120),
            keychain_widget: SecurityContext::from_legacy("signet-keychain"),
        }
    }
}
