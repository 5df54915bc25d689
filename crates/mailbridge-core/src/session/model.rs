//! Session domain models.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::provider::Provider;

/// Opaque user profile reported by the backend after login.
///
/// The backend currently sends `email`, `name` and `picture`, but the record
/// is kept as-is so extra fields survive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserInfo(Value);

impl UserInfo {
    /// Wraps a raw profile record.
    #[must_use]
    pub const fn new(value: Value) -> Self {
        Self(value)
    }

    /// Email address, if present.
    #[must_use]
    pub fn email(&self) -> Option<&str> {
        self.field("email")
    }

    /// Display name, if present.
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.field("name")
    }

    /// Picture URL (or data URL), if present and non-empty.
    #[must_use]
    pub fn picture(&self) -> Option<&str> {
        self.field("picture").filter(|p| !p.is_empty())
    }

    /// Returns the raw record.
    #[must_use]
    pub const fn as_value(&self) -> &Value {
        &self.0
    }

    /// Consumes the wrapper, returning the raw record.
    #[must_use]
    pub fn into_value(self) -> Value {
        self.0
    }

    fn field(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(Value::as_str)
    }
}

impl From<Value> for UserInfo {
    fn from(value: Value) -> Self {
        Self(value)
    }
}

/// Client-held login state for one provider.
///
/// A session is logged in exactly when it carries user info; the two cannot
/// drift apart.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AuthSession {
    user_info: Option<UserInfo>,
}

impl AuthSession {
    /// A logged-out session.
    #[must_use]
    pub const fn logged_out() -> Self {
        Self { user_info: None }
    }

    /// A logged-in session for `user_info`.
    #[must_use]
    pub const fn logged_in(user_info: UserInfo) -> Self {
        Self {
            user_info: Some(user_info),
        }
    }

    /// Returns true if the user is logged in with this provider.
    #[must_use]
    pub const fn is_logged_in(&self) -> bool {
        self.user_info.is_some()
    }

    /// User info, present iff logged in.
    #[must_use]
    pub const fn user_info(&self) -> Option<&UserInfo> {
        self.user_info.as_ref()
    }
}

/// Both provider sessions at a point in time.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SessionSnapshot {
    google: AuthSession,
    microsoft: AuthSession,
}

impl SessionSnapshot {
    /// Session for `provider`.
    #[must_use]
    pub const fn get(&self, provider: Provider) -> &AuthSession {
        match provider {
            Provider::Google => &self.google,
            Provider::Microsoft => &self.microsoft,
        }
    }

    pub(crate) const fn get_mut(&mut self, provider: Provider) -> &mut AuthSession {
        match provider {
            Provider::Google => &mut self.google,
            Provider::Microsoft => &mut self.microsoft,
        }
    }

    /// Returns true if any provider is logged in.
    #[must_use]
    pub fn any_logged_in(&self) -> bool {
        Provider::ALL.iter().any(|p| self.get(*p).is_logged_in())
    }
}
