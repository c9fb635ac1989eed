//! External secret store seam.
//!
//! The control plane only ever writes one derived value here: the webhook
//! secret a broker hands out alongside provider credentials.

use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::error::Result;

/// Generic key/value secret store owned by the wider platform.
#[async_trait]
pub trait SecretStore: Send + Sync {
    /// Reads a secret.
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Creates a secret that does not exist yet.
    async fn create(&self, key: &str, value: &str) -> Result<()>;

    /// Replaces the value of an existing secret.
    async fn update(&self, key: &str, value: &str) -> Result<()>;
}

/// What a sync did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SecretSync {
    /// Secret was absent and got created.
    Created,
    /// Secret existed with another value and got updated.
    Updated,
    /// Secret already held this value.
    Unchanged,
}

/// Creates `key` if absent, updates it if its value differs, otherwise does
/// nothing.
///
/// # Errors
///
/// Returns an error if the store fails.
pub async fn sync_secret(store: &dyn SecretStore, key: &str, value: &str) -> Result<SecretSync> {
    match store.get(key).await? {
        None => {
            store.create(key, value).await?;
            Ok(SecretSync::Created)
        }
        Some(existing) if existing != value => {
            store.update(key, value).await?;
            Ok(SecretSync::Updated)
        }
        Some(_) => Ok(SecretSync::Unchanged),
    }
}

/// Best-effort webhook secret sync; failures are logged and swallowed.
pub async fn sync_webhook_secret(store: &dyn SecretStore, key: &str, value: &str) {
    match sync_secret(store, key, value).await {
        Ok(SecretSync::Created) => info!("Stored new webhook secret {key}"),
        Ok(SecretSync::Updated) => info!("Rotated webhook secret {key}"),
        Ok(SecretSync::Unchanged) => debug!("Webhook secret {key} unchanged"),
        Err(e) => warn!("Failed to persist webhook secret {key}: {e}"),
    }
}

/// In-process secret store.
#[derive(Debug, Default)]
pub struct InMemorySecretStore {
    /// Stored secrets.
    values: RwLock<HashMap<String, String>>,
}

impl InMemorySecretStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SecretStore for InMemorySecretStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.values.read().await.get(key).cloned())
    }

    async fn create(&self, key: &str, value: &str) -> Result<()> {
        self.values
            .write()
            .await
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn update(&self, key: &str, value: &str) -> Result<()> {
        self.values
            .write()
            .await
            .insert(key.to_string(), value.to_string());
        Ok(())
    }
}
