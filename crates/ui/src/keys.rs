//! Parameter and result keys of dialog maps.
//!
//! Dialog maps also carry the identity-record keys `UserName`, `Secret`,
//! and `Caption` from `signet_core::keys`.

/// Ask the user for a secret.
pub const QUERY_PASSWORD: &str = "QueryPassword";
/// Ask the user for a user name.
pub const QUERY_USER_NAME: &str = "QueryUserName";
/// Free-text message shown in the dialog.
pub const MESSAGE: &str = "Message";
/// Numeric message id (see `UiMessage`) shown instead of free text.
pub const MESSAGE_ID: &str = "MessageId";
/// Correlates the dialog with its originating request; also the handle
/// for `cancel_ui_request`.
pub const REQUEST_ID: &str = "RequestId";
/// Whether the prompting identity is persisted.
pub const STORED_IDENTITY: &str = "StoredIdentity";
/// Numeric id of the prompting identity.
pub const IDENTITY: &str = "Identity";
/// The client's original parameter map, passed through untouched.
pub const CLIENT_DATA: &str = "ClientData";
/// Method driving the session that raised the dialog.
pub const METHOD: &str = "Method";
/// Mechanism requested for the session.
pub const MECHANISM: &str = "Mechanism";
/// Process id of the requesting client.
pub const PID: &str = "Pid";
/// Application id of the requesting client.
pub const APP_ID: &str = "AppId";
/// Set when the secrets database is closed and no unlock keys are
/// available, so the dialog can offer an unlock.
pub const STORAGE_KEYS_UNAVAILABLE: &str = "StorageKeysUnavailable";
/// Remaining confirmation retries for a verification dialog.
pub const CONFIRM_COUNT: &str = "ConfirmCount";
/// Result flag asking the plugin to retry with refreshed input.
pub const REFRESH: &str = "Refresh";
/// Result error code (see `UiError`).
pub const ERROR: &str = "Error";
/// Result flag set when the user took the forgot-password path.
pub const FORGOT_PASSWORD: &str = "ForgotPassword";
