//! Contract of the interactive-prompt service.
//!
//! The daemon never renders UI itself: whenever a plugin or an identity
//! operation needs user input it sends a parameter map to the external
//! agent and acts on the result map. Dialog calls use an extended
//! timeout; cancellation is fire-and-forget.

pub mod keys;

use async_trait::async_trait;
use signet_core::{IdentityId, SessionData};
use thiserror::Error;

/// Error code carried in a dialog result map under [`keys::ERROR`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum UiError {
    /// The dialog completed normally.
    #[default]
    None,
    /// Generic agent-side failure.
    General,
    /// No agent is available to render the dialog.
    NoUi,
    /// The user dismissed the dialog.
    Canceled,
    /// The user chose the forgot-password path.
    ForgotPassword,
}

impl UiError {
    pub fn from_raw(raw: u32) -> Self {
        match raw {
            0 => Self::None,
            2 => Self::NoUi,
            3 => Self::Canceled,
            4 => Self::ForgotPassword,
            _ => Self::General,
        }
    }

    pub fn raw(self) -> u32 {
        match self {
            Self::None => 0,
            Self::General => 1,
            Self::NoUi => 2,
            Self::Canceled => 3,
            Self::ForgotPassword => 4,
        }
    }

    /// Reads the error code out of a result map; a missing key means
    /// the agent did not even report an outcome.
    pub fn of_reply(reply: &SessionData) -> Option<Self> {
        reply.u32_value(keys::ERROR).map(Self::from_raw)
    }
}

/// Message ids a dialog can be asked to display instead of free text.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum UiMessage {
    #[default]
    Empty,
    Login,
    NotAuthorized,
}

impl UiMessage {
    pub fn raw(self) -> u32 {
        match self {
            Self::Empty => 0,
            Self::Login => 1,
            Self::NotAuthorized => 2,
        }
    }
}

/// Failure reaching the agent itself (as opposed to an error code the
/// agent put in its reply).
#[derive(Debug, Error, PartialEq, Eq)]
pub enum UiAgentError {
    #[error("no prompt agent is connected")]
    Unavailable,
    #[error("prompt agent did not reply in time")]
    Timeout,
    #[error("prompt agent call failed: {0}")]
    Failed(String),
}

/// The interactive-prompt service.
#[async_trait]
pub trait UiAgent: Send + Sync {
    /// Opens a fresh dialog and waits for its result map.
    async fn query_dialog(&self, params: SessionData) -> Result<SessionData, UiAgentError>;

    /// Updates a dialog already on screen (e.g. a captcha refresh) and
    /// waits for its result map.
    async fn refresh_dialog(&self, params: SessionData) -> Result<SessionData, UiAgentError>;

    /// Tears down the dialog opened for `request_id`. Fire-and-forget.
    fn cancel_ui_request(&self, request_id: &str);

    /// Drops any agent-side state cached for an identity (remembered
    /// answers, cookies). Fire-and-forget.
    fn forget_identity_data(&self, id: IdentityId);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_code_round_trip() {
        for err in [
            UiError::None,
            UiError::General,
            UiError::NoUi,
            UiError::Canceled,
            UiError::ForgotPassword,
        ] {
            assert_eq!(UiError::from_raw(err.raw()), err);
        }
        // Unassigned codes read as a generic failure.
        assert_eq!(UiError::from_raw(77), UiError::General);
    }

    #[test]
    fn of_reply_distinguishes_missing_code() {
        let mut reply = SessionData::new();
        assert_eq!(UiError::of_reply(&reply), None);

        reply.insert(keys::ERROR, UiError::Canceled.raw());
        assert_eq!(UiError::of_reply(&reply), Some(UiError::Canceled));
    }
}
