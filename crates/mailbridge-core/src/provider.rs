//! Identity provider enumeration.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::Error;

/// External identity service a session slot belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    /// Google (Gmail API on the backend).
    Google,
    /// Microsoft (Graph API on the backend).
    Microsoft,
}

impl Provider {
    /// Every supported provider, in a stable order.
    pub const ALL: [Self; 2] = [Self::Google, Self::Microsoft];

    /// Wire name used in backend paths and popup messages.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Google => "google",
            Self::Microsoft => "microsoft",
        }
    }

    /// Backend path that issues an authorization URL for this provider.
    #[must_use]
    pub fn login_path(self) -> String {
        format!("/auth/{}/login", self.as_str())
    }

    /// Backend path that sends mail through this provider.
    #[must_use]
    pub fn send_email_path(self) -> String {
        format!("/send_{}_email", self.as_str())
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Provider {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "google" => Ok(Self::Google),
            "microsoft" => Ok(Self::Microsoft),
            other => Err(Error::UnknownProvider(other.to_string())),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_paths() {
        assert_eq!(Provider::Google.login_path(), "/auth/google/login");
        assert_eq!(Provider::Microsoft.login_path(), "/auth/microsoft/login");
        assert_eq!(Provider::Google.send_email_path(), "/send_google_email");
        assert_eq!(
            Provider::Microsoft.send_email_path(),
            "/send_microsoft_email"
        );
    }

    #[test]
    fn test_parse_and_display() {
        for provider in Provider::ALL {
            assert_eq!(provider.to_string().parse::<Provider>().unwrap(), provider);
        }
        assert!("yahoo".parse::<Provider>().is_err());
        assert!("Google".parse::<Provider>().is_err());
    }

    #[test]
    fn test_serde_lowercase() {
        let json = serde_json::to_string(&Provider::Microsoft).unwrap();
        assert_eq!(json, "\"microsoft\"");
        let provider: Provider = serde_json::from_str("\"google\"").unwrap();
        assert_eq!(provider, Provider::Google);
    }
}
