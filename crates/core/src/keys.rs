//! Well-known wire keys of the map-of-variants encoding.
//!
//! These names are normative: clients, plugins, the UI agent, and the
//! store all address fields of identity records and session data maps by
//! them.

/// Identity record id.
pub const ID: &str = "Id";
/// User name of an identity or session input.
pub const USER_NAME: &str = "UserName";
/// Secret of an identity, session input, or UI reply.
pub const SECRET: &str = "Secret";
/// Whether the store should persist the secret.
pub const STORE_SECRET: &str = "StoreSecret";
/// Human-readable caption shown by UI dialogs.
pub const CAPTION: &str = "Caption";
/// Realms the identity applies to.
pub const REALMS: &str = "Realms";
/// Method name → allowed mechanism list.
pub const AUTH_METHODS: &str = "AuthMethods";
/// Security contexts allowed to use the identity.
pub const ACL: &str = "ACL";
/// Security contexts allowed to modify or remove the identity.
pub const OWNER: &str = "Owner";
/// Opaque credential-class tag.
pub const TYPE: &str = "Type";
/// Whether a successful authentication has confirmed the record.
pub const VALIDATED: &str = "Validated";

/// UI policy requested for a session (see `UiPolicy`).
pub const UI_POLICY: &str = "UiPolicy";
/// Access-control tokens injected into plugin input.
pub const ACCESS_CONTROL_TOKENS: &str = "AccessControlTokens";
