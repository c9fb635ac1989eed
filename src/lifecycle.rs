//! Deployment lifecycle controller.
//!
//! Drives one deployment from request to terminal state:
//!
//! 1. **Bundle**: validate and bundle the functions (no network before this)
//! 2. **Project**: make sure the remote project exists
//! 3. **Deploy**: create the deployment
//! 4. **Wait**: poll sequentially until `Success` or `Failed`, collecting
//!    build diagnostics on failure
//!
//! A polling budget that runs out is reported as a failed outcome, not as an
//! error.

use chrono::Utc;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::bundle::{AssetBundle, Bundler, FunctionDefinition};
use crate::error::Result;
use crate::logs::{LogEntry, LogWriter, DEPLOYMENTS_SOURCE};
use crate::provider::{Deployment, DeploymentProvider, DeploymentStatus};

/// Default number of status checks.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 60;

/// Default delay between status checks in milliseconds.
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 5_000;

/// Polling budget for [`DeploymentController::wait_for_deployment`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitOptions {
    /// Maximum number of status checks.
    pub max_attempts: u32,
    /// Delay between checks.
    pub interval: Duration,
}

impl Default for WaitOptions {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            interval: Duration::from_millis(DEFAULT_POLL_INTERVAL_MS),
        }
    }
}

impl WaitOptions {
    /// Creates a polling budget.
    #[must_use]
    pub const fn new(max_attempts: u32, interval_ms: u64) -> Self {
        Self {
            max_attempts,
            interval: Duration::from_millis(interval_ms),
        }
    }
}

/// Terminal result of waiting on a deployment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentOutcome {
    /// Deployment id.
    pub deployment_id: String,
    /// `Success` or `Failed`.
    pub status: DeploymentStatus,
    /// Live URL on success.
    pub url: Option<String>,
    /// Build diagnostics on failure.
    pub build_logs: Vec<String>,
}

/// Orchestrates deployments against one provider.
#[derive(Clone)]
pub struct DeploymentController {
    /// Target provider.
    provider: Arc<dyn DeploymentProvider>,
    /// Asset bundler.
    bundler: Bundler,
    /// Optional audit log sink.
    audit: Option<Arc<dyn LogWriter>>,
}

impl std::fmt::Debug for DeploymentController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeploymentController")
            .field("provider", &self.provider.kind())
            .field("audit", &self.audit.is_some())
            .finish_non_exhaustive()
    }
}

impl DeploymentController {
    /// Creates a controller for `provider`.
    #[must_use]
    pub fn new(provider: Arc<dyn DeploymentProvider>) -> Self {
        Self {
            bundler: Bundler::for_provider(provider.kind()),
            provider,
            audit: None,
        }
    }

    /// Records deployment events to `audit`.
    #[must_use]
    pub fn with_audit(mut self, audit: Arc<dyn LogWriter>) -> Self {
        self.audit = Some(audit);
        self
    }

    /// Returns the provider.
    #[must_use]
    pub fn provider(&self) -> &Arc<dyn DeploymentProvider> {
        &self.provider
    }

    /// Validates and bundles `functions` without deploying.
    ///
    /// # Errors
    ///
    /// Returns a validation error for invalid definitions.
    pub fn bundle(&self, functions: &[FunctionDefinition]) -> Result<AssetBundle> {
        self.bundler.bundle(functions)
    }

    /// Deploys `functions` for `project_id` with `secrets` as environment.
    ///
    /// Validation happens before any provider call; an invalid slug never
    /// reaches the network.
    ///
    /// # Errors
    ///
    /// Returns an error if validation, project setup or deployment creation
    /// fails. A project created before a failed deployment is left in place.
    pub async fn deploy_functions(
        &self,
        project_id: &str,
        functions: &[FunctionDefinition],
        secrets: &BTreeMap<String, String>,
    ) -> Result<Deployment> {
        let bundle = self.bundle(functions)?;
        info!(
            "Deploying {} functions for {project_id} to {}",
            functions.len(),
            self.provider.kind()
        );

        let remote_project = self.provider.ensure_project(project_id).await?;
        let deployment = self
            .provider
            .create_deployment(&remote_project, &bundle, secrets)
            .await?;

        info!(deployment_id = %deployment.id, "Deployment created");
        self.record(
            "info",
            format!(
                "Deployment {} created for project {project_id} ({} functions)",
                deployment.id,
                functions.len()
            ),
        )
        .await;

        Ok(deployment)
    }

    /// Fetches the current state of a deployment.
    ///
    /// # Errors
    ///
    /// Returns an error if the provider call fails.
    pub async fn get_deployment(&self, deployment_id: &str) -> Result<Deployment> {
        self.provider.get_deployment(deployment_id).await
    }

    /// Polls a deployment until it reaches a terminal state.
    ///
    /// Checks are strictly sequential with `options.interval` between them.
    /// On failure, build logs are fetched best-effort. Running out of
    /// attempts yields a `Failed` outcome with a "timed out" line.
    ///
    /// # Errors
    ///
    /// Returns an error only if a status check itself fails.
    pub async fn wait_for_deployment(
        &self,
        deployment_id: &str,
        options: WaitOptions,
    ) -> Result<DeploymentOutcome> {
        let mut status = DeploymentStatus::Pending;

        for attempt in 1..=options.max_attempts {
            let deployment = self.provider.get_deployment(deployment_id).await?;
            status = status.advance(deployment.status);

            debug!(
                deployment_id,
                attempt,
                max_attempts = options.max_attempts,
                status = %status,
                "Polled deployment"
            );

            match status {
                DeploymentStatus::Success => {
                    info!(deployment_id, "Deployment is live");
                    self.record("info", format!("Deployment {deployment_id} succeeded"))
                        .await;
                    return Ok(DeploymentOutcome {
                        deployment_id: deployment_id.to_string(),
                        status,
                        url: deployment.url,
                        build_logs: Vec::new(),
                    });
                }
                DeploymentStatus::Failed => {
                    let build_logs = self.fetch_build_logs(deployment_id).await;
                    warn!(deployment_id, "Deployment failed");
                    self.record("error", format!("Deployment {deployment_id} failed"))
                        .await;
                    return Ok(DeploymentOutcome {
                        deployment_id: deployment_id.to_string(),
                        status,
                        url: None,
                        build_logs,
                    });
                }
                DeploymentStatus::Pending => {
                    if attempt < options.max_attempts {
                        tokio::time::sleep(options.interval).await;
                    }
                }
            }
        }

        let message = format!(
            "Deployment {deployment_id} timed out after {} status checks",
            options.max_attempts
        );
        warn!(deployment_id, "{message}");
        self.record("error", message.clone()).await;

        Ok(DeploymentOutcome {
            deployment_id: deployment_id.to_string(),
            status: DeploymentStatus::Failed,
            url: None,
            build_logs: vec![message],
        })
    }

    /// Requests cancellation. Failures are logged, never returned.
    pub async fn cancel_deployment(&self, deployment_id: &str) {
        match self.provider.cancel_deployment(deployment_id).await {
            Ok(()) => {
                info!(deployment_id, "Deployment canceled");
                self.record("info", format!("Deployment {deployment_id} canceled"))
                    .await;
            }
            Err(e) if e.is_not_found() => {
                warn!(deployment_id, "Deployment not found, nothing to cancel");
            }
            Err(e) => warn!(deployment_id, "Failed to cancel deployment: {e}"),
        }
    }

    async fn fetch_build_logs(&self, deployment_id: &str) -> Vec<String> {
        match self.provider.build_logs(deployment_id).await {
            Ok(logs) => logs,
            Err(e) => {
                warn!(deployment_id, "Failed to fetch build logs: {e}");
                Vec::new()
            }
        }
    }

    /// Best-effort audit record.
    async fn record(&self, level: &str, message: String) {
        let Some(audit) = &self.audit else {
            return;
        };

        let entry = LogEntry::new(
            Uuid::new_v4().to_string(),
            Utc::now().timestamp_micros(),
            level,
            None,
            message,
        );
        if let Err(e) = audit.write(DEPLOYMENTS_SOURCE, &entry).await {
            warn!("Failed to record deployment audit event: {e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credentials::ProviderKind;
    use crate::error::{EdgeplaneError, ValidationError};
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;

    /// Provider that replays a scripted status sequence.
    struct StubProvider {
        statuses: Mutex<VecDeque<DeploymentStatus>>,
        last: DeploymentStatus,
        build_logs: std::result::Result<Vec<String>, String>,
        calls: AtomicU32,
        status_fetches: AtomicU32,
        cancel_fails: bool,
    }

    impl StubProvider {
        fn new(statuses: Vec<DeploymentStatus>, last: DeploymentStatus) -> Self {
            Self {
                statuses: Mutex::new(statuses.into()),
                last,
                build_logs: Ok(vec![String::from("[error] compile failed")]),
                calls: AtomicU32::new(0),
                status_fetches: AtomicU32::new(0),
                cancel_fails: false,
            }
        }

        fn deployment(id: &str, status: DeploymentStatus) -> Deployment {
            Deployment {
                id: id.to_string(),
                provider_project_id: String::from("remote"),
                status,
                url: Some(format!("https://{id}.example.dev")),
                created_at: Utc::now(),
            }
        }
    }

    #[async_trait]
    impl DeploymentProvider for StubProvider {
        fn kind(&self) -> ProviderKind {
            ProviderKind::Deno
        }

        fn is_configured(&self) -> bool {
            true
        }

        async fn ensure_project(&self, _local_project_id: &str) -> Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(String::from("remote"))
        }

        async fn create_deployment(
            &self,
            _project_id: &str,
            _bundle: &AssetBundle,
            _env: &BTreeMap<String, String>,
        ) -> Result<Deployment> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(Self::deployment("dep-1", DeploymentStatus::Pending))
        }

        async fn get_deployment(&self, deployment_id: &str) -> Result<Deployment> {
            self.status_fetches.fetch_add(1, Ordering::SeqCst);
            let status = self
                .statuses
                .lock()
                .ok()
                .and_then(|mut q| q.pop_front())
                .unwrap_or(self.last);
            Ok(Self::deployment(deployment_id, status))
        }

        async fn build_logs(&self, _deployment_id: &str) -> Result<Vec<String>> {
            self.build_logs
                .clone()
                .map_err(EdgeplaneError::internal)
        }

        async fn cancel_deployment(&self, _deployment_id: &str) -> Result<()> {
            if self.cancel_fails {
                Err(EdgeplaneError::internal("cancel rejected"))
            } else {
                Ok(())
            }
        }
    }

    /// Audit sink that counts writes.
    #[derive(Default)]
    struct CountingAudit {
        writes: AtomicU32,
    }

    #[async_trait]
    impl LogWriter for CountingAudit {
        async fn write(&self, source: &str, _entry: &LogEntry) -> Result<()> {
            assert_eq!(source, DEPLOYMENTS_SOURCE);
            self.writes.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn fast(max_attempts: u32) -> WaitOptions {
        WaitOptions::new(max_attempts, 1)
    }

    #[tokio::test]
    async fn test_success_after_pending_polls() {
        use DeploymentStatus::{Pending, Success};
        let provider = Arc::new(StubProvider::new(vec![Pending, Pending, Pending], Success));
        let controller = DeploymentController::new(provider.clone());

        let outcome = controller
            .wait_for_deployment("dep-9", fast(10))
            .await
            .expect("outcome");

        assert_eq!(outcome.status, Success);
        assert_eq!(outcome.url.as_deref(), Some("https://dep-9.example.dev"));
        assert!(outcome.build_logs.is_empty());
        assert_eq!(provider.status_fetches.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn test_timeout_is_failed_outcome() {
        let provider = Arc::new(StubProvider::new(Vec::new(), DeploymentStatus::Pending));
        let controller = DeploymentController::new(provider.clone());

        let outcome = controller
            .wait_for_deployment("dep-1", fast(5))
            .await
            .expect("outcome");

        assert_eq!(outcome.status, DeploymentStatus::Failed);
        assert_eq!(outcome.url, None);
        assert!(outcome.build_logs.iter().any(|l| l.contains("timed out")));
        assert_eq!(provider.status_fetches.load(Ordering::SeqCst), 5);
    }

    #[tokio::test]
    async fn test_failure_collects_build_logs() {
        let provider = Arc::new(StubProvider::new(Vec::new(), DeploymentStatus::Failed));
        let controller = DeploymentController::new(provider);

        let outcome = controller
            .wait_for_deployment("dep-1", fast(5))
            .await
            .expect("outcome");

        assert_eq!(outcome.status, DeploymentStatus::Failed);
        assert_eq!(outcome.build_logs, vec![String::from("[error] compile failed")]);
    }

    #[tokio::test]
    async fn test_build_log_failure_degrades_to_empty() {
        let mut stub = StubProvider::new(Vec::new(), DeploymentStatus::Failed);
        stub.build_logs = Err(String::from("logs unavailable"));
        let controller = DeploymentController::new(Arc::new(stub));

        let outcome = controller
            .wait_for_deployment("dep-1", fast(5))
            .await
            .expect("outcome");

        assert_eq!(outcome.status, DeploymentStatus::Failed);
        assert!(outcome.build_logs.is_empty());
    }

    #[tokio::test]
    async fn test_invalid_slug_fails_before_network() {
        let provider = Arc::new(StubProvider::new(Vec::new(), DeploymentStatus::Success));
        let controller = DeploymentController::new(provider.clone());

        let err = controller
            .deploy_functions("proj", &[FunctionDefinition::new("bad slug!", "x")], &BTreeMap::new())
            .await
            .expect_err("validation");

        assert!(matches!(
            err,
            EdgeplaneError::Validation(ValidationError::InvalidSlug { .. })
        ));
        assert_eq!(provider.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_valid_slug_deploys_and_audits() {
        let provider = Arc::new(StubProvider::new(Vec::new(), DeploymentStatus::Success));
        let audit = Arc::new(CountingAudit::default());
        let controller = DeploymentController::new(provider.clone()).with_audit(audit.clone());

        let deployment = controller
            .deploy_functions(
                "proj",
                &[FunctionDefinition::new("my-func_1", "export default () => new Response();")],
                &BTreeMap::new(),
            )
            .await
            .expect("deployment");

        assert_eq!(deployment.id, "dep-1");
        assert_eq!(provider.calls.load(Ordering::SeqCst), 2);
        assert_eq!(audit.writes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_cancel_failure_is_swallowed() {
        let mut stub = StubProvider::new(Vec::new(), DeploymentStatus::Pending);
        stub.cancel_fails = true;
        let audit = Arc::new(CountingAudit::default());
        let controller = DeploymentController::new(Arc::new(stub)).with_audit(audit.clone());

        controller.cancel_deployment("dep-1").await;
        assert_eq!(audit.writes.load(Ordering::SeqCst), 0);
    }
}
