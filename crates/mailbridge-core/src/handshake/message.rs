//! Login result messages and their validation.

use std::fmt;

use serde::Deserialize;
use serde_json::Value;

use super::channel::WindowMessage;
use super::window::WindowId;
use crate::provider::Provider;
use crate::session::UserInfo;

/// Status value reported by a successful popup.
pub const SUCCESS_STATUS: &str = "success";

/// Login result posted by the popup.
///
/// Untrusted until [`accept`] has checked where it came from. Fields are kept
/// as raw JSON so that a wrongly typed field fails the login instead of
/// hiding the message.
#[derive(Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InboundAuthMessage {
    /// `"success"` or anything else.
    #[serde(default)]
    pub status: Option<Value>,
    /// Provider the popup authenticated with.
    #[serde(default)]
    pub provider: Option<Value>,
    /// Profile record.
    #[serde(default)]
    pub user_info: Option<Value>,
    #[serde(default)]
    access_token: Option<Value>,
}

impl fmt::Debug for InboundAuthMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InboundAuthMessage")
            .field("status", &self.status)
            .field("provider", &self.provider)
            .field("user_info", &self.user_info)
            .field(
                "access_token",
                &self.access_token.as_ref().map(|_| "<redacted>"),
            )
            .finish()
    }
}

impl InboundAuthMessage {
    /// Reads the message from raw payload data.
    ///
    /// Returns `None` for payloads that are not JSON objects. Field types are
    /// checked later, by [`into_outcome`](Self::into_outcome).
    #[must_use]
    pub fn parse(data: &Value) -> Option<Self> {
        if !data.is_object() {
            return None;
        }
        Self::deserialize(data).ok()
    }

    /// Provider name, when present as a string.
    #[must_use]
    pub fn provider_name(&self) -> Option<&str> {
        self.provider.as_ref().and_then(Value::as_str)
    }

    /// Returns true if the message names `provider`.
    #[must_use]
    pub fn is_for(&self, provider: Provider) -> bool {
        self.provider_name() == Some(provider.as_str())
    }

    /// Returns true if an access token is present and non-empty.
    #[must_use]
    pub fn has_access_token(&self) -> bool {
        self.access_token
            .as_ref()
            .and_then(Value::as_str)
            .is_some_and(|t| !t.is_empty())
    }

    /// Checks the login outcome, consuming the message.
    ///
    /// The access token is only checked for presence and is dropped here.
    ///
    /// # Errors
    ///
    /// Returns the reason the login cannot be applied.
    pub fn into_outcome(self) -> Result<UserInfo, LoginOutcomeFailure> {
        match self.status.as_ref().map(Value::as_str) {
            Some(Some(SUCCESS_STATUS)) => {}
            Some(Some(other)) => return Err(LoginOutcomeFailure::Status(other.to_string())),
            Some(None) => return Err(LoginOutcomeFailure::InvalidField("status")),
            None => return Err(LoginOutcomeFailure::MissingStatus),
        }

        match &self.access_token {
            Some(Value::String(token)) if !token.is_empty() => {}
            Some(Value::String(_)) | None => return Err(LoginOutcomeFailure::MissingAccessToken),
            Some(_) => return Err(LoginOutcomeFailure::InvalidField("accessToken")),
        }

        match self.user_info {
            Some(info @ Value::Object(_)) => Ok(UserInfo::new(info)),
            Some(Value::Null) | None => Err(LoginOutcomeFailure::MissingUserInfo),
            Some(_) => Err(LoginOutcomeFailure::InvalidField("userInfo")),
        }
    }
}

/// Why a message was not considered at all.
///
/// These are expected on a shared channel and are not errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationFailure {
    /// The controller has no popup open.
    NoPopup,
    /// The message came from a window other than the tracked popup.
    ForeignWindow,
    /// The message is for a different provider.
    WrongProvider,
    /// The payload is not an object naming a provider.
    NotAuthMessage,
}

/// A trusted message that does not report a usable login.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LoginOutcomeFailure {
    /// The popup reported a non-success status.
    #[error("login reported status {0:?}")]
    Status(String),
    /// The popup did not report a status.
    #[error("login result has no status")]
    MissingStatus,
    /// The user profile is missing.
    #[error("login result is missing user info")]
    MissingUserInfo,
    /// The access token is missing or empty.
    #[error("login result is missing the access token")]
    MissingAccessToken,
    /// A field is present with the wrong JSON type.
    #[error("login result field {0} has the wrong type")]
    InvalidField(&'static str),
}

/// Result of checking one channel message against a controller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    /// Not for this controller; no state change.
    Ignored(ValidationFailure),
    /// Trusted and successful.
    Success(UserInfo),
    /// Trusted, but the login did not succeed.
    Failed(LoginOutcomeFailure),
}

/// Checks `message` against the controller's popup and provider.
///
/// The source-window check runs first, then the provider check; only a
/// message passing both is inspected further.
#[must_use]
pub fn accept(message: &WindowMessage, tracked: Option<WindowId>, provider: Provider) -> Verdict {
    let Some(tracked) = tracked else {
        return Verdict::Ignored(ValidationFailure::NoPopup);
    };
    if message.source != Some(tracked) {
        return Verdict::Ignored(ValidationFailure::ForeignWindow);
    }

    let Some(inbound) = InboundAuthMessage::parse(&message.data) else {
        return Verdict::Ignored(ValidationFailure::NotAuthMessage);
    };
    if inbound.provider.is_none() {
        return Verdict::Ignored(ValidationFailure::NotAuthMessage);
    }
    if !inbound.is_for(provider) {
        return Verdict::Ignored(ValidationFailure::WrongProvider);
    }

    match inbound.into_outcome() {
        Ok(user_info) => Verdict::Success(user_info),
        Err(failure) => Verdict::Failed(failure),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    fn success_payload(provider: &str) -> Value {
        json!({
            "status": "success",
            "provider": provider,
            "userInfo": {"name": "Ann"},
            "accessToken": "tok"
        })
    }

    #[test]
    fn test_accepts_matching_success() {
        let popup = WindowId::from_raw(7);
        let message = WindowMessage::from_window(popup, success_payload("google"));
        assert_eq!(
            accept(&message, Some(popup), Provider::Google),
            Verdict::Success(UserInfo::new(json!({"name": "Ann"})))
        );
    }

    #[test]
    fn test_ignores_without_popup() {
        let message = WindowMessage::from_window(WindowId::from_raw(7), success_payload("google"));
        assert_eq!(
            accept(&message, None, Provider::Google),
            Verdict::Ignored(ValidationFailure::NoPopup)
        );
    }

    #[test]
    fn test_ignores_anonymous_source() {
        let message = WindowMessage::anonymous(success_payload("google"));
        assert_eq!(
            accept(&message, Some(WindowId::from_raw(7)), Provider::Google),
            Verdict::Ignored(ValidationFailure::ForeignWindow)
        );
    }

    #[test]
    fn test_ignores_other_provider_from_own_window() {
        let popup = WindowId::from_raw(7);
        let message = WindowMessage::from_window(popup, success_payload("microsoft"));
        assert_eq!(
            accept(&message, Some(popup), Provider::Google),
            Verdict::Ignored(ValidationFailure::WrongProvider)
        );
    }

    #[test]
    fn test_ignores_non_object_payloads() {
        let popup = WindowId::from_raw(7);
        for data in [json!("webpack-hmr"), json!(42), json!(null), json!([1, 2])] {
            let message = WindowMessage::from_window(popup, data);
            assert_eq!(
                accept(&message, Some(popup), Provider::Google),
                Verdict::Ignored(ValidationFailure::NotAuthMessage)
            );
        }
    }

    #[test]
    fn test_failure_outcomes() {
        let popup = WindowId::from_raw(7);
        let cases = [
            (
                json!({"status": "error", "provider": "google", "userInfo": {}, "accessToken": "t"}),
                LoginOutcomeFailure::Status("error".to_string()),
            ),
            (
                json!({"provider": "google", "userInfo": {}, "accessToken": "t"}),
                LoginOutcomeFailure::MissingStatus,
            ),
            (
                json!({"status": "success", "provider": "google", "accessToken": "t"}),
                LoginOutcomeFailure::MissingUserInfo,
            ),
            (
                json!({"status": "success", "provider": "google", "userInfo": null, "accessToken": "t"}),
                LoginOutcomeFailure::MissingUserInfo,
            ),
            (
                json!({"status": "success", "provider": "google", "userInfo": {"name": "Ann"}, "accessToken": ""}),
                LoginOutcomeFailure::MissingAccessToken,
            ),
            (
                json!({"status": "error", "provider": "google", "userInfo": {"name": "Ann"}, "accessToken": 12345}),
                LoginOutcomeFailure::Status("error".to_string()),
            ),
            (
                json!({"status": "success", "provider": "google", "userInfo": {"name": "Ann"}, "accessToken": 12345}),
                LoginOutcomeFailure::InvalidField("accessToken"),
            ),
            (
                json!({"status": 200, "provider": "google", "userInfo": {"name": "Ann"}, "accessToken": "t"}),
                LoginOutcomeFailure::InvalidField("status"),
            ),
            (
                json!({"status": "success", "provider": "google", "userInfo": "Ann", "accessToken": "t"}),
                LoginOutcomeFailure::InvalidField("userInfo"),
            ),
        ];

        for (data, expected) in cases {
            let message = WindowMessage::from_window(popup, data);
            assert_eq!(
                accept(&message, Some(popup), Provider::Google),
                Verdict::Failed(expected)
            );
        }
    }

    #[test]
    fn test_provider_field_gates_the_message() {
        let popup = WindowId::from_raw(7);
        let unnamed =
            WindowMessage::from_window(popup, json!({"status": "success", "accessToken": "t"}));
        assert_eq!(
            accept(&unnamed, Some(popup), Provider::Google),
            Verdict::Ignored(ValidationFailure::NotAuthMessage)
        );

        let numeric = WindowMessage::from_window(
            popup,
            json!({"status": "success", "provider": 1, "userInfo": {}, "accessToken": "t"}),
        );
        assert_eq!(
            accept(&numeric, Some(popup), Provider::Google),
            Verdict::Ignored(ValidationFailure::WrongProvider)
        );
    }

    #[test]
    fn test_debug_redacts_token() {
        let inbound = InboundAuthMessage::parse(&success_payload("google")).unwrap();
        let rendered = format!("{inbound:?}");
        assert!(rendered.contains("<redacted>"));
        assert!(!rendered.contains("tok\""));
    }

    proptest! {
        #[test]
        fn prop_foreign_window_always_ignored(tracked in 0u64..1000, source in 0u64..1000) {
            prop_assume!(tracked != source);
            let message = WindowMessage::from_window(
                WindowId::from_raw(source),
                success_payload("google"),
            );
            prop_assert_eq!(
                accept(&message, Some(WindowId::from_raw(tracked)), Provider::Google),
                Verdict::Ignored(ValidationFailure::ForeignWindow)
            );
        }

        #[test]
        fn prop_unknown_provider_always_ignored(name in "[a-z]{1,12}") {
            prop_assume!(name != "google");
            let popup = WindowId::from_raw(1);
            let message = WindowMessage::from_window(popup, success_payload(&name));
            prop_assert_eq!(
                accept(&message, Some(popup), Provider::Google),
                Verdict::Ignored(ValidationFailure::WrongProvider)
            );
        }
    }
}
