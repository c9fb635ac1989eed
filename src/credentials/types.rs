//! Credential data types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A hosting provider that runs deployed function code.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    /// Deno edge runtime (bundle upload model).
    #[default]
    Deno,
    /// Vercel (content-addressable file upload model).
    Vercel,
}

impl ProviderKind {
    /// Returns the lowercase provider name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Deno => "deno",
            Self::Vercel => "vercel",
        }
    }

    /// Key under which the provider's webhook secret is stored.
    #[must_use]
    pub const fn webhook_secret_key(self) -> &'static str {
        match self {
            Self::Deno => "DENO_WEBHOOK_SECRET",
            Self::Vercel => "VERCEL_WEBHOOK_SECRET",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "deno" => Ok(Self::Deno),
            "vercel" => Ok(Self::Vercel),
            other => Err(format!("unknown provider '{other}' (expected deno or vercel)")),
        }
    }
}

/// Credentials for one provider.
///
/// When `expires_at` is set and in the past the credentials are invalid and
/// must be refetched before use.
#[derive(Clone, PartialEq, Eq)]
pub struct ProviderCredentials {
    /// Bearer token for the provider API.
    pub token: String,
    /// Organization or team the token acts on.
    pub account_id: String,
    /// Provider-side project identifier.
    pub project_id: String,
    /// Expiry instant, `None` for static credentials.
    pub expires_at: Option<DateTime<Utc>>,
}

impl ProviderCredentials {
    /// Creates credentials that never expire.
    #[must_use]
    pub fn new(
        token: impl Into<String>,
        account_id: impl Into<String>,
        project_id: impl Into<String>,
    ) -> Self {
        Self {
            token: token.into(),
            account_id: account_id.into(),
            project_id: project_id.into(),
            expires_at: None,
        }
    }

    /// Sets the expiry instant.
    #[must_use]
    pub const fn with_expiry(mut self, expires_at: DateTime<Utc>) -> Self {
        self.expires_at = Some(expires_at);
        self
    }

    /// Checks if the credentials have expired at `now`.
    #[must_use]
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|expiry| expiry <= now)
    }

    /// Checks if the credentials have expired.
    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }
}

impl fmt::Debug for ProviderCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderCredentials")
            .field("token", &"<redacted>")
            .field("account_id", &self.account_id)
            .field("project_id", &self.project_id)
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_static_credentials_never_expire() {
        let creds = ProviderCredentials::new("tok", "org", "proj");
        assert!(!creds.is_expired());
    }

    #[test]
    fn test_expiry_boundary() {
        let now = Utc::now();
        let creds = ProviderCredentials::new("tok", "org", "proj").with_expiry(now);

        assert!(creds.is_expired_at(now));
        assert!(!creds.is_expired_at(now - Duration::seconds(1)));
    }

    #[test]
    fn test_debug_redacts_token() {
        let creds = ProviderCredentials::new("super-secret", "org", "proj");
        let rendered = format!("{creds:?}");

        assert!(!rendered.contains("super-secret"));
        assert!(rendered.contains("proj"));
    }

    #[test]
    fn test_provider_kind_parsing() {
        assert_eq!("Deno".parse::<ProviderKind>(), Ok(ProviderKind::Deno));
        assert_eq!(" vercel ".parse::<ProviderKind>(), Ok(ProviderKind::Vercel));
        assert!("netlify".parse::<ProviderKind>().is_err());
    }
}
