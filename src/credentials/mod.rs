//! Provider credential management.
//!
//! This module provides per-provider credential managers with memoized,
//! expiry-aware, single-flight fetching, the two credential sources (static
//! configuration and a signed-assertion broker), and the secret store seam
//! used to persist broker-issued webhook secrets.

mod manager;
mod secrets;
mod source;
mod types;

pub use manager::{CredentialManager, CredentialSource};
pub use secrets::{sync_secret, sync_webhook_secret, InMemorySecretStore, SecretStore, SecretSync};
pub use source::{
    sign_assertion, AssertionClaims, BrokerCredentialSource, StaticCredentialSource,
    ASSERTION_TTL_SECS,
};
pub use types::{ProviderCredentials, ProviderKind};
