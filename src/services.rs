//! Service wiring.
//!
//! Builds every long-lived component once from [`Settings`] and hands out
//! references to them.

use std::sync::Arc;
use tracing::{debug, info};

use crate::config::{Mode, ProviderSettings, Settings};
use crate::credentials::{
    BrokerCredentialSource, CredentialManager, CredentialSource, InMemorySecretStore, ProviderKind,
    SecretStore, StaticCredentialSource,
};
use crate::error::Result;
use crate::http::{ResilientClient, RetryPolicy};
use crate::lifecycle::DeploymentController;
use crate::logs::{
    CloudWatchLogStore, LocalLogStore, LogAggregator, LogBackend, LogWriter, RuntimeLogReader,
};
use crate::provider::{DenoClient, DeploymentProvider, VercelClient};

/// The assembled control plane.
pub struct Services {
    /// Settings the services were built from.
    settings: Settings,
    /// Deployment lifecycle controller for the active provider.
    controller: DeploymentController,
    /// Unified log access.
    logs: LogAggregator,
}

impl std::fmt::Debug for Services {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Services")
            .field("mode", &self.settings.mode)
            .field("provider", &self.settings.provider)
            .field("project_id", &self.settings.project_id)
            .finish_non_exhaustive()
    }
}

impl Services {
    /// Builds all services.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be created or the local
    /// log directory cannot be determined.
    pub async fn from_settings(settings: Settings) -> Result<Self> {
        let http = ResilientClient::new(RetryPolicy::new(
            settings.http.timeout_ms,
            settings.http.max_retries,
        ))?;
        let secrets: Arc<dyn SecretStore> = Arc::new(InMemorySecretStore::new());

        let kind = settings.provider;
        let credentials = Arc::new(CredentialManager::new(
            kind,
            credential_source(&settings, kind, &http, &secrets),
        ));
        let provider_settings = settings.provider_settings(kind);

        let (provider, runtime): (Arc<dyn DeploymentProvider>, Option<RuntimeLogReader>) = match kind {
            ProviderKind::Deno => {
                let client = Arc::new(DenoClient::new(
                    http.clone(),
                    &provider_settings.api_url,
                    credentials,
                ));
                let reader = RuntimeLogReader::new(client.clone());
                let provider: Arc<dyn DeploymentProvider> = client;
                (provider, Some(reader))
            }
            ProviderKind::Vercel => {
                let client: Arc<dyn DeploymentProvider> =
                    Arc::new(VercelClient::new(http.clone(), &provider_settings.api_url, credentials));
                (client, None)
            }
        };

        let (store, audit) = if settings.logs.aws_configured {
            info!("Using CloudWatch Logs as the log store");
            let cloudwatch = Arc::new(
                CloudWatchLogStore::new(
                    settings.logs.group_prefix.as_deref(),
                    settings.logs.aws_region.as_deref(),
                )
                .await,
            );
            (
                cloudwatch.clone() as Arc<dyn LogBackend>,
                cloudwatch as Arc<dyn LogWriter>,
            )
        } else {
            let local = match &settings.logs.logs_dir {
                Some(dir) => LocalLogStore::with_base_dir(dir),
                None => LocalLogStore::new()?,
            };
            info!("Using local log store at {}", local.base_dir().display());
            let local = Arc::new(local);
            (
                local.clone() as Arc<dyn LogBackend>,
                local as Arc<dyn LogWriter>,
            )
        };

        debug!("Services ready for {kind} in {:?} mode", settings.mode);

        Ok(Self {
            logs: LogAggregator::new(store, runtime),
            controller: DeploymentController::new(provider).with_audit(audit),
            settings,
        })
    }

    /// Returns the settings.
    #[must_use]
    pub const fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Returns the deployment controller.
    #[must_use]
    pub const fn controller(&self) -> &DeploymentController {
        &self.controller
    }

    /// Returns the log aggregator.
    #[must_use]
    pub const fn logs(&self) -> &LogAggregator {
        &self.logs
    }

}

fn credential_source(
    settings: &Settings,
    kind: ProviderKind,
    http: &ResilientClient,
    secrets: &Arc<dyn SecretStore>,
) -> Arc<dyn CredentialSource> {
    match (&settings.mode, &settings.broker) {
        (Mode::Cloud, Some(broker)) => Arc::new(
            BrokerCredentialSource::new(
                kind,
                http.clone(),
                &broker.url,
                &settings.project_id,
                &broker.jwt_secret,
            )
            .with_secret_store(secrets.clone()),
        ),
        _ => static_source(settings.provider_settings(kind)),
    }
}

fn static_source(provider: &ProviderSettings) -> Arc<dyn CredentialSource> {
    Arc::new(StaticCredentialSource::new(
        provider.keys,
        provider.token.clone(),
        provider.account_id.clone(),
        provider.project_id.clone(),
    ))
}
