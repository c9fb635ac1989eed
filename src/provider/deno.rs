//! Deno Deploy client.
//!
//! Deploys whole asset bundles and serves runtime logs for the
//! aggregator. Project ids and names are interchangeable in the API paths.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::header::ACCEPT;
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::json;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info};

use crate::bundle::AssetBundle;
use crate::credentials::{CredentialManager, ProviderCredentials, ProviderKind};
use crate::error::{ProviderError, Result};
use crate::http::{ensure_success, parse_ndjson, read_json, ResilientClient, NDJSON};
use crate::logs::{next_cursor, RawRuntimeLog, RuntimeLogApi, RuntimeLogBatch, RuntimeLogFilter};

use super::types::{https_url, Deployment, DeploymentStatus};
use super::DeploymentProvider;

/// Deno Deploy API base URL.
pub const DENO_API_URL: &str = "https://api.deno.com/v1";

/// Deployments inspected when looking for the latest successful one.
const RECENT_DEPLOYMENTS_LIMIT: u32 = 20;

/// Deployment as returned by the API.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DenoDeployment {
    id: String,
    #[serde(default)]
    project_id: String,
    #[serde(default)]
    status: String,
    #[serde(default)]
    domains: Vec<String>,
    #[serde(default)]
    created_at: Option<DateTime<Utc>>,
}

impl DenoDeployment {
    fn into_deployment(self, fallback_project: &str) -> Deployment {
        let project = if self.project_id.is_empty() {
            fallback_project.to_string()
        } else {
            self.project_id
        };

        Deployment {
            id: self.id,
            provider_project_id: project,
            status: DeploymentStatus::from_provider(&self.status),
            url: self.domains.first().map(|d| https_url(d)),
            created_at: self.created_at.unwrap_or_else(Utc::now),
        }
    }
}

/// Project as returned by the API.
#[derive(Debug, Deserialize)]
struct DenoProject {
    id: String,
}

/// One build log record.
#[derive(Debug, Deserialize)]
struct DenoBuildLog {
    #[serde(default)]
    level: String,
    #[serde(default)]
    message: String,
}

/// Deno Deploy API client.
#[derive(Debug, Clone)]
pub struct DenoClient {
    /// HTTP client.
    http: ResilientClient,
    /// API base URL.
    base_url: String,
    /// Credential manager for this provider.
    credentials: Arc<CredentialManager>,
}

impl DenoClient {
    /// Creates a new Deno Deploy client.
    #[must_use]
    pub fn new(http: ResilientClient, base_url: &str, credentials: Arc<CredentialManager>) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            credentials,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    async fn creds(&self) -> Result<ProviderCredentials> {
        if !self.credentials.is_configured() {
            return Err(ProviderError::NotConfigured {
                provider: ProviderKind::Deno.to_string(),
            }
            .into());
        }
        self.credentials.get_credentials().await
    }

    async fn create_project(&self, creds: &ProviderCredentials, local_project_id: &str) -> Result<String> {
        let url = self.url(&format!("/organizations/{}/projects", creds.account_id));
        let body = json!({
            "name": creds.project_id,
            "description": format!("Functions for project {local_project_id}"),
        });

        let response = self
            .http
            .send("create deno project", |c| {
                c.post(&url).bearer_auth(&creds.token).json(&body)
            })
            .await?;
        let response = ensure_success(response, "create deno project", "organization", &creds.account_id).await?;
        let project: DenoProject = read_json(response, "create deno project").await?;

        info!("Created Deno project {} ({})", creds.project_id, project.id);
        Ok(project.id)
    }
}

#[async_trait]
impl DeploymentProvider for DenoClient {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Deno
    }

    fn is_configured(&self) -> bool {
        self.credentials.is_configured()
    }

    async fn ensure_project(&self, local_project_id: &str) -> Result<String> {
        let creds = self.creds().await?;
        let url = self.url(&format!("/projects/{}", creds.project_id));

        let response = self
            .http
            .send("check deno project", |c| c.get(&url).bearer_auth(&creds.token))
            .await?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            debug!("Deno project {} not found, creating it", creds.project_id);
            return self.create_project(&creds, local_project_id).await;
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::upstream("check deno project", status.as_u16(), body).into());
        }

        let project: DenoProject = read_json(response, "check deno project").await?;
        Ok(project.id)
    }

    async fn create_deployment(
        &self,
        project_id: &str,
        bundle: &AssetBundle,
        env: &BTreeMap<String, String>,
    ) -> Result<Deployment> {
        let creds = self.creds().await?;
        let url = self.url(&format!("/projects/{project_id}/deployments"));
        let body = json!({
            "entryPointUrl": bundle.entrypoint(),
            "assets": bundle,
            "envVars": env,
        });

        debug!("Creating Deno deployment with {} assets", bundle.len());

        let response = self
            .http
            .send("create deno deployment", |c| {
                c.post(&url).bearer_auth(&creds.token).json(&body)
            })
            .await?;
        let response = ensure_success(response, "create deno deployment", "project", project_id).await?;
        let deployment: DenoDeployment = read_json(response, "create deno deployment").await?;

        Ok(deployment.into_deployment(project_id))
    }

    async fn get_deployment(&self, deployment_id: &str) -> Result<Deployment> {
        let creds = self.creds().await?;
        let url = self.url(&format!("/deployments/{deployment_id}"));

        let response = self
            .http
            .send("get deno deployment", |c| c.get(&url).bearer_auth(&creds.token))
            .await?;
        let response = ensure_success(response, "get deno deployment", "deployment", deployment_id).await?;
        let deployment: DenoDeployment = read_json(response, "get deno deployment").await?;

        Ok(deployment.into_deployment(&creds.project_id))
    }

    async fn build_logs(&self, deployment_id: &str) -> Result<Vec<String>> {
        let creds = self.creds().await?;
        let url = self.url(&format!("/deployments/{deployment_id}/build_logs"));

        let response = self
            .http
            .send("get deno build logs", |c| {
                c.get(&url).bearer_auth(&creds.token).header(ACCEPT, NDJSON)
            })
            .await?;
        let response = ensure_success(response, "get deno build logs", "deployment", deployment_id).await?;
        let body = response
            .text()
            .await
            .map_err(|e| ProviderError::invalid_response("get deno build logs", e.to_string()))?;

        Ok(parse_ndjson::<DenoBuildLog>(&body)
            .into_iter()
            .map(|l| format!("[{}] {}", l.level, l.message))
            .collect())
    }

    async fn cancel_deployment(&self, deployment_id: &str) -> Result<()> {
        let creds = self.creds().await?;
        let url = self.url(&format!("/deployments/{deployment_id}"));

        let response = self
            .http
            .send("cancel deno deployment", |c| c.delete(&url).bearer_auth(&creds.token))
            .await?;
        ensure_success(response, "cancel deno deployment", "deployment", deployment_id).await?;

        info!("Canceled Deno deployment {deployment_id}");
        Ok(())
    }
}

#[async_trait]
impl RuntimeLogApi for DenoClient {
    fn is_configured(&self) -> bool {
        self.credentials.is_configured()
    }

    async fn latest_successful_deployment(&self) -> Result<Option<String>> {
        let creds = self.creds().await?;
        let url = self.url(&format!("/projects/{}/deployments", creds.project_id));
        let limit = RECENT_DEPLOYMENTS_LIMIT.to_string();

        let response = self
            .http
            .send("list deno deployments", |c| {
                c.get(&url)
                    .bearer_auth(&creds.token)
                    .query(&[("limit", limit.as_str()), ("sort", "created_at"), ("order", "desc")])
            })
            .await?;
        let response = ensure_success(response, "list deno deployments", "project", &creds.project_id).await?;
        let deployments: Vec<DenoDeployment> = read_json(response, "list deno deployments").await?;

        Ok(deployments
            .into_iter()
            .map(|d| d.into_deployment(&creds.project_id))
            .filter(|d| d.status == DeploymentStatus::Success)
            .max_by_key(|d| d.created_at)
            .map(|d| d.id))
    }

    async fn runtime_logs(
        &self,
        deployment_id: &str,
        filter: &RuntimeLogFilter,
    ) -> Result<RuntimeLogBatch> {
        let creds = self.creds().await?;
        let url = self.url(&format!("/deployments/{deployment_id}/app_logs"));
        let query = filter.to_query();

        let response = self
            .http
            .send("get deno app logs", |c| {
                c.get(&url)
                    .bearer_auth(&creds.token)
                    .header(ACCEPT, NDJSON)
                    .query(&query)
            })
            .await?;
        let response = ensure_success(response, "get deno app logs", "deployment", deployment_id).await?;

        let cursor = next_cursor(response.headers());
        let body = response
            .text()
            .await
            .map_err(|e| ProviderError::invalid_response("get deno app logs", e.to_string()))?;

        Ok(RuntimeLogBatch {
            entries: parse_ndjson::<RawRuntimeLog>(&body),
            cursor,
        })
    }
}
