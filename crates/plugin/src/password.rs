//! The built-in `password` method.

use signet_core::SessionData;
use signet_error::plugin_codes;
use signet_ui::{UiError, keys as ui_keys};

use crate::error::PluginError;
use crate::event::PluginEventSink;
use crate::plugin::{AuthPlugin, PluginState};

/// Method name of the built-in password plugin.
pub const PASSWORD_METHOD: &str = "password";

/// Plain stored-secret authentication.
///
/// When the input already carries a secret the plugin completes
/// immediately with it; otherwise it raises a dialog asking for the
/// secret (and the user name too when none is known) and completes with
/// whatever the user entered.
pub struct PasswordPlugin {
    sink: PluginEventSink,
    awaiting_ui: bool,
}

impl PasswordPlugin {
    pub fn new(sink: PluginEventSink) -> Self {
        Self {
            sink,
            awaiting_ui: false,
        }
    }

    fn finish_with(&self, reply: &SessionData) {
        let mut result = SessionData::new();
        if let Some(user_name) = reply.user_name() {
            result.set_user_name(user_name);
        }
        if let Some(secret) = reply.secret() {
            result.set_secret(secret);
        }
        self.sink
            .state_changed(PluginState::ProcessDone, "password check done");
        self.sink.result(result);
    }
}

impl AuthPlugin for PasswordPlugin {
    fn method(&self) -> &str {
        PASSWORD_METHOD
    }

    fn mechanisms(&self) -> Vec<String> {
        vec![PASSWORD_METHOD.to_owned()]
    }

    fn process(&mut self, params: &SessionData, mechanism: &str) -> Result<(), PluginError> {
        if mechanism != PASSWORD_METHOD {
            return Err(PluginError::MechanismNotAvailable(mechanism.to_owned()));
        }
        self.sink
            .state_changed(PluginState::Started, "password processing started");

        if params.secret().is_some_and(|s| !s.is_empty()) {
            self.finish_with(params);
            return Ok(());
        }

        let mut query = SessionData::new();
        query.insert(ui_keys::QUERY_PASSWORD, true);
        match params.user_name() {
            Some(user_name) if !user_name.is_empty() => query.set_user_name(user_name),
            _ => query.insert(ui_keys::QUERY_USER_NAME, true),
        }
        self.awaiting_ui = true;
        self.sink.state_changed(PluginState::UserPending, "");
        self.sink.ui_request(query);
        Ok(())
    }

    fn process_ui(&mut self, reply: &SessionData) {
        self.awaiting_ui = false;
        match UiError::of_reply(reply).unwrap_or(UiError::General) {
            UiError::None => self.finish_with(reply),
            UiError::Canceled => self
                .sink
                .error(plugin_codes::SESSION_CANCELED, "dialog canceled"),
            UiError::ForgotPassword => self
                .sink
                .error(plugin_codes::FORGOT_PASSWORD, "user forgot the password"),
            UiError::NoUi | UiError::General => self
                .sink
                .error(plugin_codes::USER_INTERACTION, "dialog failed"),
        }
    }

    fn process_refresh(&mut self, reply: &SessionData) {
        // No captcha-style content to refresh; a refreshed dialog reply
        // carries the same fields as a plain one.
        self.process_ui(reply);
    }

    fn cancel(&mut self) {
        self.awaiting_ui = false;
        self.sink.state_changed(PluginState::ProcessCanceling, "");
        self.sink
            .error(plugin_codes::SESSION_CANCELED, "processing canceled");
    }
}
