//! Closed error taxonomy of the Signet daemon.
//!
//! Every failure the daemon can report is one of the [`ErrorKind`]
//! values; each maps to a stable wire name and a default human message.
//! The table lives here and only here: the bus edge translates through
//! [`SignetError::to_wire`] / [`SignetError::from_wire`], plugins report
//! numeric codes translated through [`SignetError::from_plugin_code`],
//! and transport faults collapse through [`SignetError::from_transport`].

mod kind;
pub mod plugin_codes;

use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::warn;

pub use kind::ErrorKind;

/// Result alias used across the daemon crates.
pub type SignetResult<T> = Result<T, SignetError>;

/// Plugin error codes below this value belong to a retired numbering
/// scheme and are collapsed to [`ErrorKind::Unknown`].
pub const PLUGIN_CODE_RANGE_BEGIN: u32 = 300;
/// Plugin error codes above this cutoff are plugin-defined and collapse
/// to [`ErrorKind::UserDefined`] with the raw code preserved in the
/// message prefix.
pub const PLUGIN_CODE_USER_DEFINED: u32 = 400;

/// An error of the closed taxonomy, optionally with a caller-supplied
/// message overriding the default one.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SignetError {
    kind: ErrorKind,
    message: Option<String>,
}

impl std::error::Error for SignetError {}

impl SignetError {
    pub fn new(kind: ErrorKind) -> Self {
        Self {
            kind,
            message: None,
        }
    }

    pub fn with_message(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: Some(message.into()),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// The override message if set, the kind's default otherwise.
    pub fn message(&self) -> &str {
        self.message
            .as_deref()
            .unwrap_or_else(|| self.kind.default_message())
    }

    /// Stable wire name, e.g. `org.signet.Error.PermissionDenied`.
    pub fn wire_name(&self) -> &'static str {
        self.kind.wire_name()
    }

    /// Wire representation: name plus effective message.
    pub fn to_wire(&self) -> WireError {
        WireError {
            name: self.wire_name().to_owned(),
            message: self.message().to_owned(),
        }
    }

    /// Reads a wire error back into the taxonomy. Unrecognized names
    /// collapse to [`ErrorKind::Unknown`] with the raw name logged.
    pub fn from_wire(name: &str, message: &str) -> Self {
        let kind = ErrorKind::from_wire_name(name).unwrap_or_else(|| {
            warn!(wire_name = name, "unknown error name on the wire");
            ErrorKind::Unknown
        });
        if message.is_empty() {
            Self::new(kind)
        } else {
            Self::with_message(kind, message)
        }
    }

    /// Translates a numeric plugin error code.
    ///
    /// Codes inside the documented window translate through the fixed
    /// table; codes above [`PLUGIN_CODE_USER_DEFINED`] become
    /// [`ErrorKind::UserDefined`] with a `code:message` prefix; anything
    /// else collapses to [`ErrorKind::Unknown`] and the raw value is
    /// logged.
    pub fn from_plugin_code(code: u32, message: &str) -> Self {
        if code > PLUGIN_CODE_USER_DEFINED {
            return Self::with_message(ErrorKind::UserDefined, format!("{code}:{message}"));
        }
        match kind::from_plugin_code(code) {
            Some(kind) => {
                if message.is_empty() {
                    Self::new(kind)
                } else {
                    Self::with_message(kind, message)
                }
            }
            None => {
                warn!(code, "plugin reported an out-of-range error code");
                Self::with_message(ErrorKind::Unknown, message)
            }
        }
    }

    /// Collapses a bus transport fault.
    ///
    /// Everything becomes [`ErrorKind::Unknown`] with the raw failure
    /// logged, except an unknown-object fault on an identity-targeted
    /// call, which means the remote object is gone.
    pub fn from_transport(failure: TransportFailure, identity_targeted: bool) -> Self {
        match failure {
            TransportFailure::UnknownObject if identity_targeted => {
                Self::new(ErrorKind::IdentityNotFound)
            }
            other => {
                warn!(failure = ?other, "transport fault collapsed");
                Self::new(ErrorKind::Unknown)
            }
        }
    }
}

impl fmt::Display for SignetError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message())
    }
}

impl From<ErrorKind> for SignetError {
    fn from(kind: ErrorKind) -> Self {
        Self::new(kind)
    }
}

/// Bus-level transport fault classes, as seen at the edge.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TransportFailure {
    NoReply,
    Disconnected,
    Timeout,
    BadAddress,
    UnknownObject,
    Other,
}

/// The `(name, message)` pair as it travels on the bus.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireError {
    pub name: String,
    pub message: String,
}
