//! Memoized, expiry-aware credential manager.
//!
//! One manager exists per provider, constructed at process start and shared
//! by reference. Concurrent callers that arrive while a refresh is running
//! await the same in-flight fetch instead of starting their own.

use async_trait::async_trait;
use futures::future::{BoxFuture, FutureExt, Shared};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::error::{CredentialError, Result};

use super::types::{ProviderCredentials, ProviderKind};

/// Where credentials come from.
#[async_trait]
pub trait CredentialSource: Send + Sync {
    /// Fetches a fresh set of credentials.
    async fn fetch(&self) -> std::result::Result<ProviderCredentials, CredentialError>;

    /// Returns true if the source has enough configuration to attempt a fetch.
    fn is_configured(&self) -> bool;

    /// Short name for logs.
    fn describe(&self) -> &'static str;
}

type SharedFetch =
    Shared<BoxFuture<'static, std::result::Result<ProviderCredentials, CredentialError>>>;

/// Cache slots guarded by the manager's mutex.
#[derive(Default)]
struct CacheState {
    /// Last successfully fetched credentials.
    cached: Option<ProviderCredentials>,
    /// Fetch currently running, tagged with its generation.
    inflight: Option<(u64, SharedFetch)>,
    /// Generation counter for in-flight fetches.
    generation: u64,
}

/// Per-provider credential manager.
pub struct CredentialManager {
    /// Provider the credentials are for.
    provider: ProviderKind,
    /// Credential source.
    source: Arc<dyn CredentialSource>,
    /// Cached credentials and in-flight fetch.
    state: Mutex<CacheState>,
}

impl std::fmt::Debug for CredentialManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialManager")
            .field("provider", &self.provider)
            .field("source", &self.source.describe())
            .finish_non_exhaustive()
    }
}

impl CredentialManager {
    /// Creates a new credential manager.
    #[must_use]
    pub fn new(provider: ProviderKind, source: Arc<dyn CredentialSource>) -> Self {
        Self {
            provider,
            source,
            state: Mutex::new(CacheState::default()),
        }
    }

    /// Returns the provider this manager serves.
    #[must_use]
    pub const fn provider(&self) -> ProviderKind {
        self.provider
    }

    /// Returns true if credentials can be obtained at all.
    #[must_use]
    pub fn is_configured(&self) -> bool {
        self.source.is_configured()
    }

    /// Returns valid credentials, fetching them if the cache is cold or
    /// expired.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying fetch fails.
    pub async fn get_credentials(&self) -> Result<ProviderCredentials> {
        let (generation, fetch) = {
            let mut state = self.state.lock().await;

            if let Some(creds) = state.cached.as_ref().filter(|c| !c.is_expired()) {
                return Ok(creds.clone());
            }

            match state.inflight.clone() {
                Some(inflight) => {
                    debug!("Joining in-flight {} credential fetch", self.provider);
                    inflight
                }
                None => {
                    state.generation += 1;
                    let generation = state.generation;
                    let source = Arc::clone(&self.source);
                    let provider = self.provider;

                    let fetch = async move {
                        info!("Fetching {provider} credentials from {} source", source.describe());
                        source.fetch().await
                    }
                    .boxed()
                    .shared();

                    state.inflight = Some((generation, fetch.clone()));
                    (generation, fetch)
                }
            }
        };

        let outcome = fetch.await;

        {
            let mut state = self.state.lock().await;
            if state.inflight.as_ref().is_some_and(|(g, _)| *g == generation) {
                state.inflight = None;
                if let Ok(creds) = &outcome {
                    state.cached = Some(creds.clone());
                }
            }
        }

        outcome.map_err(Into::into)
    }

    /// Drops cached credentials so the next access refetches them.
    ///
    /// A fetch already running is detached: its callers still get its
    /// result, but later callers start a new fetch and the old result is
    /// never cached.
    pub async fn clear_credentials(&self) {
        let mut state = self.state.lock().await;
        state.cached = None;
        state.inflight = None;
        debug!("Cleared cached {} credentials", self.provider);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration as ChronoDuration, Utc};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    /// Source that counts fetches and can be told to hand out expired or
    /// failing credentials.
    struct CountingSource {
        calls: AtomicUsize,
        expired: bool,
        fail: bool,
    }

    impl CountingSource {
        fn new() -> Self {
            Self {
                calls: AtomicUsize::new(0),
                expired: false,
                fail: false,
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl CredentialSource for CountingSource {
        async fn fetch(&self) -> std::result::Result<ProviderCredentials, CredentialError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(20)).await;

            if self.fail {
                return Err(CredentialError::Upstream {
                    message: String::from("broker down"),
                });
            }

            let expiry = if self.expired {
                Utc::now() - ChronoDuration::minutes(1)
            } else {
                Utc::now() + ChronoDuration::hours(1)
            };

            Ok(ProviderCredentials::new(format!("token-{n}"), "org", "proj").with_expiry(expiry))
        }

        fn is_configured(&self) -> bool {
            true
        }

        fn describe(&self) -> &'static str {
            "counting"
        }
    }

    #[tokio::test]
    async fn test_concurrent_calls_share_one_fetch() {
        let source = Arc::new(CountingSource::new());
        let manager = CredentialManager::new(ProviderKind::Deno, source.clone());

        let results =
            futures::future::join_all((0..10).map(|_| manager.get_credentials())).await;

        assert_eq!(source.calls(), 1);
        for result in results {
            assert_eq!(result.expect("credentials").token, "token-0");
        }
    }

    #[tokio::test]
    async fn test_cached_credentials_are_reused() {
        let source = Arc::new(CountingSource::new());
        let manager = CredentialManager::new(ProviderKind::Deno, source.clone());

        manager.get_credentials().await.expect("first");
        manager.get_credentials().await.expect("second");

        assert_eq!(source.calls(), 1);
    }

    #[tokio::test]
    async fn test_expired_credentials_trigger_refresh() {
        let source = Arc::new(CountingSource {
            expired: true,
            ..CountingSource::new()
        });
        let manager = CredentialManager::new(ProviderKind::Vercel, source.clone());

        let first = manager.get_credentials().await.expect("first");
        let second = manager.get_credentials().await.expect("second");

        assert_eq!(source.calls(), 2);
        assert_eq!(first.token, "token-0");
        assert_eq!(second.token, "token-1");
    }

    #[tokio::test]
    async fn test_clear_forces_refetch() {
        let source = Arc::new(CountingSource::new());
        let manager = CredentialManager::new(ProviderKind::Deno, source.clone());

        manager.get_credentials().await.expect("first");
        manager.clear_credentials().await;
        manager.get_credentials().await.expect("second");

        assert_eq!(source.calls(), 2);
    }

    #[tokio::test]
    async fn test_clear_during_fetch_starts_fresh_fetch() {
        let source = Arc::new(CountingSource::new());
        let manager = Arc::new(CredentialManager::new(ProviderKind::Deno, source.clone()));

        let first = tokio::spawn({
            let manager = Arc::clone(&manager);
            async move { manager.get_credentials().await }
        });
        tokio::time::sleep(Duration::from_millis(5)).await;
        manager.clear_credentials().await;

        let after_clear = manager.get_credentials().await.expect("after clear");
        let first = first.await.expect("join").expect("first");

        assert_eq!(first.token, "token-0");
        assert_eq!(after_clear.token, "token-1");
        assert_eq!(source.calls(), 2);

        // The detached fetch did not overwrite the fresh cache entry.
        let cached = manager.get_credentials().await.expect("cached");
        assert_eq!(cached.token, "token-1");
        assert_eq!(source.calls(), 2);
    }

    #[tokio::test]
    async fn test_failed_fetch_is_shared_then_retried() {
        let source = Arc::new(CountingSource {
            fail: true,
            ..CountingSource::new()
        });
        let manager = CredentialManager::new(ProviderKind::Deno, source.clone());

        let results =
            futures::future::join_all((0..3).map(|_| manager.get_credentials())).await;
        assert_eq!(source.calls(), 1);
        assert!(results.iter().all(std::result::Result::is_err));

        // The failed fetch is not cached; the next call starts a new one.
        assert!(manager.get_credentials().await.is_err());
        assert_eq!(source.calls(), 2);
    }
}
