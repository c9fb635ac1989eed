//! Credential sources for the two deployment modes.
//!
//! - [`StaticCredentialSource`]: fixed values from process configuration
//! - [`BrokerCredentialSource`]: exchanges a locally signed, short-lived
//!   assertion for provider credentials at a trusted broker

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info};

use crate::error::CredentialError;
use crate::http::ResilientClient;

use super::manager::CredentialSource;
use super::secrets::{sync_webhook_secret, SecretStore};
use super::types::{ProviderCredentials, ProviderKind};

/// Validity of the signed broker assertion in seconds.
pub const ASSERTION_TTL_SECS: i64 = 3600;

/// Credentials read from process configuration. They never expire.
#[derive(Clone)]
pub struct StaticCredentialSource {
    /// Configuration key names, in the order token, account, project.
    keys: [&'static str; 3],
    /// Bearer token.
    token: Option<String>,
    /// Organization or team id.
    account_id: Option<String>,
    /// Provider-side project id.
    project_id: Option<String>,
}

impl std::fmt::Debug for StaticCredentialSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StaticCredentialSource")
            .field("keys", &self.keys)
            .field("account_id", &self.account_id)
            .field("project_id", &self.project_id)
            .finish_non_exhaustive()
    }
}

impl StaticCredentialSource {
    /// Creates a static source.
    ///
    /// `keys` names the configuration values for error messages.
    #[must_use]
    pub const fn new(
        keys: [&'static str; 3],
        token: Option<String>,
        account_id: Option<String>,
        project_id: Option<String>,
    ) -> Self {
        Self {
            keys,
            token,
            account_id,
            project_id,
        }
    }

    fn missing_keys(&self) -> Vec<&'static str> {
        [&self.token, &self.account_id, &self.project_id]
            .iter()
            .zip(self.keys)
            .filter(|(value, _)| value.as_deref().is_none_or(str::is_empty))
            .map(|(_, key)| key)
            .collect()
    }
}

#[async_trait]
impl CredentialSource for StaticCredentialSource {
    async fn fetch(&self) -> Result<ProviderCredentials, CredentialError> {
        let missing = self.missing_keys();
        if !missing.is_empty() {
            return Err(CredentialError::Configuration {
                message: format!("missing {}", missing.join(", ")),
            });
        }

        Ok(ProviderCredentials::new(
            self.token.clone().unwrap_or_default(),
            self.account_id.clone().unwrap_or_default(),
            self.project_id.clone().unwrap_or_default(),
        ))
    }

    fn is_configured(&self) -> bool {
        self.missing_keys().is_empty()
    }

    fn describe(&self) -> &'static str {
        "static"
    }
}

/// Claims of the assertion presented to the broker.
#[derive(Debug, Serialize, Deserialize)]
pub struct AssertionClaims {
    /// Local project identifier.
    pub sub: String,
    /// Issued at (unix seconds).
    pub iat: i64,
    /// Expiry (unix seconds).
    pub exp: i64,
}

/// Signs a short-lived HS256 assertion for `project_id`.
///
/// # Errors
///
/// Returns an error if the token cannot be encoded.
pub fn sign_assertion(
    project_id: &str,
    secret: &str,
    now: DateTime<Utc>,
) -> Result<String, CredentialError> {
    let claims = AssertionClaims {
        sub: project_id.to_string(),
        iat: now.timestamp(),
        exp: (now + Duration::seconds(ASSERTION_TTL_SECS)).timestamp(),
    };

    jsonwebtoken::encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| CredentialError::Signing {
        message: e.to_string(),
    })
}

/// Broker response payload.
#[derive(Debug, Deserialize)]
struct BrokerResponse {
    #[serde(default)]
    bearer_token: Option<String>,
    #[serde(default, alias = "organization_id", alias = "team_id")]
    account_id: Option<String>,
    #[serde(default)]
    project_id: Option<String>,
    #[serde(default)]
    expires_at: Option<DateTime<Utc>>,
    #[serde(default)]
    webhook_secret: Option<String>,
}

/// Credentials exchanged at a trusted broker (managed/cloud mode).
pub struct BrokerCredentialSource {
    /// Provider the credentials are for.
    provider: ProviderKind,
    /// HTTP client.
    http: ResilientClient,
    /// Broker base URL.
    broker_url: String,
    /// Local project identifier (assertion subject).
    local_project_id: String,
    /// Shared secret used to sign the assertion.
    signing_secret: String,
    /// External secret store for the derived webhook secret.
    secrets: Option<Arc<dyn SecretStore>>,
}

impl std::fmt::Debug for BrokerCredentialSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BrokerCredentialSource")
            .field("provider", &self.provider)
            .field("broker_url", &self.broker_url)
            .field("local_project_id", &self.local_project_id)
            .finish_non_exhaustive()
    }
}

impl BrokerCredentialSource {
    /// Creates a broker-backed source.
    #[must_use]
    pub fn new(
        provider: ProviderKind,
        http: ResilientClient,
        broker_url: &str,
        local_project_id: &str,
        signing_secret: &str,
    ) -> Self {
        Self {
            provider,
            http,
            broker_url: broker_url.trim_end_matches('/').to_string(),
            local_project_id: local_project_id.to_string(),
            signing_secret: signing_secret.to_string(),
            secrets: None,
        }
    }

    /// Sets the secret store that receives webhook secrets.
    #[must_use]
    pub fn with_secret_store(mut self, store: Arc<dyn SecretStore>) -> Self {
        self.secrets = Some(store);
        self
    }

    fn validate(&self, response: BrokerResponse) -> Result<(ProviderCredentials, Option<String>), CredentialError> {
        let token = response
            .bearer_token
            .filter(|t| !t.is_empty())
            .ok_or_else(|| CredentialError::Upstream {
                message: format!("{} broker response has no bearer_token", self.provider),
            })?;

        let project_id = response
            .project_id
            .filter(|p| !p.is_empty())
            .ok_or_else(|| CredentialError::Upstream {
                message: format!("{} broker response has no project_id", self.provider),
            })?;

        let mut creds =
            ProviderCredentials::new(token, response.account_id.unwrap_or_default(), project_id);
        creds.expires_at = response.expires_at;

        Ok((creds, response.webhook_secret.filter(|s| !s.is_empty())))
    }
}

#[async_trait]
impl CredentialSource for BrokerCredentialSource {
    async fn fetch(&self) -> Result<ProviderCredentials, CredentialError> {
        let assertion = sign_assertion(&self.local_project_id, &self.signing_secret, Utc::now())?;
        let url = format!("{}/credentials/{}", self.broker_url, self.local_project_id);
        let provider = self.provider.as_str();

        debug!("Requesting {provider} credentials from broker");

        let response = self
            .http
            .send("fetch broker credentials", |c| {
                c.get(&url)
                    .query(&[("sign", assertion.as_str()), ("provider", provider)])
            })
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(CredentialError::Upstream {
                message: format!("broker returned HTTP {}: {body}", status.as_u16()),
            });
        }

        let payload: BrokerResponse = response.json().await.map_err(|e| CredentialError::Upstream {
            message: format!("invalid broker response: {e}"),
        })?;

        let (creds, webhook_secret) = self.validate(payload)?;

        if let (Some(secret), Some(store)) = (webhook_secret, &self.secrets) {
            sync_webhook_secret(store.as_ref(), self.provider.webhook_secret_key(), &secret).await;
        }

        info!(
            "Obtained {provider} credentials for project {} (expires: {})",
            creds.project_id,
            creds
                .expires_at
                .map_or_else(|| String::from("never"), |e| e.to_rfc3339())
        );

        Ok(creds)
    }

    fn is_configured(&self) -> bool {
        !self.broker_url.is_empty()
            && !self.local_project_id.is_empty()
            && !self.signing_secret.is_empty()
    }

    fn describe(&self) -> &'static str {
        "broker"
    }
}
