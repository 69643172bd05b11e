//! The error kinds and their static wire table.

use crate::plugin_codes;

/// Every failure kind the daemon can surface.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Unknown,
    InternalServer,
    InternalCommunication,
    PermissionDenied,
    MethodOrMechanismNotAllowed,
    EncryptionFailed,
    MethodNotKnown,
    ServiceNotAvailable,
    InvalidQuery,
    MethodNotAvailable,
    IdentityNotFound,
    StoreFailed,
    RemoveFailed,
    SignoutFailed,
    OperationCanceled,
    CredentialsNotAvailable,
    ReferenceNotFound,
    MechanismNotAvailable,
    MissingData,
    InvalidCredentials,
    NotAuthorized,
    WrongState,
    OperationNotSupported,
    NoConnection,
    NetworkError,
    SslError,
    RuntimeError,
    SessionCanceled,
    TimedOut,
    UserInteraction,
    OperationFailed,
    TosNotAccepted,
    ForgotPassword,
    IncorrectDate,
    UserDefined,
}

struct Entry {
    kind: ErrorKind,
    wire_name: &'static str,
    default_message: &'static str,
}

macro_rules! entry {
    ($kind:ident, $msg:literal) => {
        Entry {
            kind: ErrorKind::$kind,
            wire_name: concat!("org.signet.Error.", stringify!($kind)),
            default_message: $msg,
        }
    };
}

// One row per kind; order mirrors the enum.
static TABLE: &[Entry] = &[
    entry!(Unknown, "Unknown error."),
    entry!(InternalServer, "Internal server error occurred."),
    entry!(
        InternalCommunication,
        "Communication with the service failed."
    ),
    entry!(PermissionDenied, "Client has insufficient permissions."),
    entry!(
        MethodOrMechanismNotAllowed,
        "Method or mechanism not allowed for this identity."
    ),
    entry!(EncryptionFailed, "Encryption or decryption failed."),
    entry!(MethodNotKnown, "Authentication method is not known."),
    entry!(ServiceNotAvailable, "Service is temporarily unavailable."),
    entry!(InvalidQuery, "Query parameters are invalid."),
    entry!(MethodNotAvailable, "Authentication method is not available."),
    entry!(IdentityNotFound, "Identity matching this id was not found."),
    entry!(StoreFailed, "Storing credentials failed."),
    entry!(RemoveFailed, "Removing credentials failed."),
    entry!(SignoutFailed, "Signing out failed."),
    entry!(OperationCanceled, "Operation was canceled by the client."),
    entry!(
        CredentialsNotAvailable,
        "Query returned no results or credentials are unavailable."
    ),
    entry!(ReferenceNotFound, "Reference was not found."),
    entry!(
        MechanismNotAvailable,
        "Requested mechanism is not available."
    ),
    entry!(MissingData, "Required data is missing."),
    entry!(InvalidCredentials, "Credentials are invalid."),
    entry!(NotAuthorized, "Authorization failed."),
    entry!(WrongState, "Operation not permitted in the current state."),
    entry!(OperationNotSupported, "Operation is not supported."),
    entry!(NoConnection, "No network connection."),
    entry!(NetworkError, "Network operation failed."),
    entry!(SslError, "SSL operation failed."),
    entry!(RuntimeError, "Runtime error occurred."),
    entry!(SessionCanceled, "Session processing was canceled."),
    entry!(TimedOut, "Operation timed out."),
    entry!(UserInteraction, "User interaction dialog failed."),
    entry!(OperationFailed, "Authentication operation failed."),
    entry!(TosNotAccepted, "Terms of service were not accepted."),
    entry!(ForgotPassword, "User selected the forgot-password option."),
    entry!(IncorrectDate, "System date or time is incorrect."),
    entry!(UserDefined, "Plugin-defined error."),
];

impl ErrorKind {
    fn entry(self) -> &'static Entry {
        TABLE
            .iter()
            .find(|e| e.kind == self)
            .expect("every kind has a table row")
    }

    /// The stable bus error name.
    pub fn wire_name(self) -> &'static str {
        self.entry().wire_name
    }

    /// The human message used when the caller does not supply one.
    pub fn default_message(self) -> &'static str {
        self.entry().default_message
    }

    pub fn from_wire_name(name: &str) -> Option<Self> {
        TABLE.iter().find(|e| e.wire_name == name).map(|e| e.kind)
    }
}

/// Fixed translation of in-window plugin codes.
pub(crate) fn from_plugin_code(code: u32) -> Option<ErrorKind> {
    let kind = match code {
        plugin_codes::MECHANISM_NOT_AVAILABLE => ErrorKind::MechanismNotAvailable,
        plugin_codes::MISSING_DATA => ErrorKind::MissingData,
        plugin_codes::INVALID_CREDENTIALS => ErrorKind::InvalidCredentials,
        plugin_codes::NOT_AUTHORIZED => ErrorKind::NotAuthorized,
        plugin_codes::WRONG_STATE => ErrorKind::WrongState,
        plugin_codes::OPERATION_NOT_SUPPORTED => ErrorKind::OperationNotSupported,
        plugin_codes::NO_CONNECTION => ErrorKind::NoConnection,
        plugin_codes::NETWORK => ErrorKind::NetworkError,
        plugin_codes::SSL => ErrorKind::SslError,
        plugin_codes::RUNTIME => ErrorKind::RuntimeError,
        plugin_codes::SESSION_CANCELED => ErrorKind::SessionCanceled,
        plugin_codes::TIMED_OUT => ErrorKind::TimedOut,
        plugin_codes::USER_INTERACTION => ErrorKind::UserInteraction,
        plugin_codes::OPERATION_FAILED => ErrorKind::OperationFailed,
        plugin_codes::ENCRYPTION_FAILED => ErrorKind::EncryptionFailed,
        plugin_codes::TOS_NOT_ACCEPTED => ErrorKind::TosNotAccepted,
        plugin_codes::FORGOT_PASSWORD => ErrorKind::ForgotPassword,
        plugin_codes::INCORRECT_DATE => ErrorKind::IncorrectDate,
        _ => return None,
    };
    Some(kind)
}
