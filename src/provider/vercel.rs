//! Vercel client.
//!
//! Bundle files are uploaded by content hash first; the deployment then
//! references them by `{file, sha, size}`. Team scoping is applied with the
//! `teamId` query parameter whenever an account id is set.

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use reqwest::{RequestBuilder, StatusCode};
use serde::Deserialize;
use serde_json::json;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info};

use crate::bundle::AssetBundle;
use crate::credentials::{CredentialManager, ProviderCredentials, ProviderKind};
use crate::error::{ProviderError, Result};
use crate::http::{ensure_success, read_json, ResilientClient};

use super::types::{https_url, Deployment, DeploymentStatus, UploadedFile};
use super::upload::ContentUploader;
use super::DeploymentProvider;

/// Vercel API base URL.
pub const VERCEL_API_URL: &str = "https://api.vercel.com";

/// Deployment as returned by the API.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VercelDeployment {
    id: String,
    #[serde(default)]
    project_id: Option<String>,
    #[serde(default)]
    ready_state: Option<String>,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    url: Option<String>,
    /// Milliseconds since the epoch.
    #[serde(default)]
    created_at: Option<i64>,
}

impl VercelDeployment {
    fn into_deployment(self, fallback_project: &str) -> Deployment {
        let state = self.ready_state.or(self.status).unwrap_or_default();
        let created_at = self
            .created_at
            .and_then(|ms| Utc.timestamp_millis_opt(ms).single())
            .unwrap_or_else(Utc::now);

        Deployment {
            id: self.id,
            provider_project_id: self
                .project_id
                .unwrap_or_else(|| fallback_project.to_string()),
            status: DeploymentStatus::from_provider(&state),
            url: self.url.as_deref().map(https_url),
            created_at,
        }
    }
}

/// Project as returned by the API.
#[derive(Debug, Deserialize)]
struct VercelProject {
    id: String,
}

/// One build event.
#[derive(Debug, Deserialize)]
struct VercelEvent {
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    payload: Option<VercelEventPayload>,
}

#[derive(Debug, Deserialize)]
struct VercelEventPayload {
    #[serde(default)]
    text: Option<String>,
}

impl VercelEvent {
    fn into_line(self) -> Option<String> {
        self.text
            .or_else(|| self.payload.and_then(|p| p.text))
            .filter(|t| !t.is_empty())
    }
}

/// Vercel API client.
#[derive(Debug, Clone)]
pub struct VercelClient {
    /// HTTP client.
    http: ResilientClient,
    /// API base URL.
    base_url: String,
    /// Credential manager for this provider.
    credentials: Arc<CredentialManager>,
    /// Content-addressable uploader.
    uploader: ContentUploader,
}

impl VercelClient {
    /// Creates a new Vercel client.
    #[must_use]
    pub fn new(http: ResilientClient, base_url: &str, credentials: Arc<CredentialManager>) -> Self {
        let uploader = ContentUploader::new(http.clone(), base_url, Arc::clone(&credentials));
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            credentials,
            uploader,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    /// Returns credentials, failing before any network call when none are
    /// configured.
    async fn creds(&self) -> Result<ProviderCredentials> {
        if !self.credentials.is_configured() {
            return Err(ProviderError::NotConfigured {
                provider: ProviderKind::Vercel.to_string(),
            }
            .into());
        }
        self.credentials.get_credentials().await
    }

    async fn create_project(&self, creds: &ProviderCredentials) -> Result<String> {
        let url = self.url("/v10/projects");
        let body = json!({ "name": creds.project_id });

        let response = self
            .http
            .send("create vercel project", |c| {
                scoped(c.post(&url).bearer_auth(&creds.token).json(&body), creds)
            })
            .await?;
        let response = ensure_success(response, "create vercel project", "team", &creds.account_id).await?;
        let project: VercelProject = read_json(response, "create vercel project").await?;

        info!("Created Vercel project {} ({})", creds.project_id, project.id);
        Ok(project.id)
    }
}

/// Adds the `teamId` query parameter when the account id is set.
fn scoped(request: RequestBuilder, creds: &ProviderCredentials) -> RequestBuilder {
    if creds.account_id.is_empty() {
        request
    } else {
        request.query(&[("teamId", creds.account_id.as_str())])
    }
}

/// Bundle assets as upload inputs, in path order.
fn bundle_files(bundle: &AssetBundle) -> Vec<(String, Vec<u8>)> {
    bundle
        .iter()
        .map(|(path, asset)| (path.to_string(), asset.content.as_bytes().to_vec()))
        .collect()
}

#[async_trait]
impl DeploymentProvider for VercelClient {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Vercel
    }

    fn is_configured(&self) -> bool {
        self.credentials.is_configured()
    }

    async fn ensure_project(&self, local_project_id: &str) -> Result<String> {
        let creds = self.creds().await?;
        let url = self.url(&format!("/v9/projects/{}", creds.project_id));

        let response = self
            .http
            .send("check vercel project", |c| {
                scoped(c.get(&url).bearer_auth(&creds.token), &creds)
            })
            .await?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            debug!(
                "Vercel project {} not found, creating it for {local_project_id}",
                creds.project_id
            );
            return self.create_project(&creds).await;
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::upstream("check vercel project", status.as_u16(), body).into());
        }

        let project: VercelProject = read_json(response, "check vercel project").await?;
        Ok(project.id)
    }

    async fn create_deployment(
        &self,
        project_id: &str,
        bundle: &AssetBundle,
        env: &BTreeMap<String, String>,
    ) -> Result<Deployment> {
        let creds = self.creds().await?;

        let uploaded = self.uploader.upload_files(&bundle_files(bundle)).await?;
        debug!("Uploaded {} files for Vercel deployment", uploaded.len());

        let files: Vec<_> = uploaded
            .iter()
            .map(|UploadedFile { path, sha1, size }| json!({ "file": path, "sha": sha1, "size": size }))
            .collect();
        let url = self.url("/v13/deployments");
        let body = json!({
            "name": creds.project_id,
            "project": project_id,
            "files": files,
            "env": env,
            "target": "production",
        });

        let response = self
            .http
            .send("create vercel deployment", |c| {
                scoped(c.post(&url).bearer_auth(&creds.token).json(&body), &creds)
            })
            .await?;
        let response = ensure_success(response, "create vercel deployment", "project", project_id).await?;
        let deployment: VercelDeployment = read_json(response, "create vercel deployment").await?;

        Ok(deployment.into_deployment(project_id))
    }

    async fn get_deployment(&self, deployment_id: &str) -> Result<Deployment> {
        let creds = self.creds().await?;
        let url = self.url(&format!("/v13/deployments/{deployment_id}"));

        let response = self
            .http
            .send("get vercel deployment", |c| {
                scoped(c.get(&url).bearer_auth(&creds.token), &creds)
            })
            .await?;
        let response = ensure_success(response, "get vercel deployment", "deployment", deployment_id).await?;
        let deployment: VercelDeployment = read_json(response, "get vercel deployment").await?;

        Ok(deployment.into_deployment(&creds.project_id))
    }

    async fn build_logs(&self, deployment_id: &str) -> Result<Vec<String>> {
        let creds = self.creds().await?;
        let url = self.url(&format!("/v3/deployments/{deployment_id}/events"));

        let response = self
            .http
            .send("get vercel build events", |c| {
                scoped(c.get(&url).bearer_auth(&creds.token), &creds)
            })
            .await?;
        let response = ensure_success(response, "get vercel build events", "deployment", deployment_id).await?;
        let events: Vec<VercelEvent> = read_json(response, "get vercel build events").await?;

        Ok(events.into_iter().filter_map(VercelEvent::into_line).collect())
    }

    async fn cancel_deployment(&self, deployment_id: &str) -> Result<()> {
        let creds = self.creds().await?;
        let url = self.url(&format!("/v12/deployments/{deployment_id}/cancel"));

        let response = self
            .http
            .send("cancel vercel deployment", |c| {
                scoped(c.patch(&url).bearer_auth(&creds.token), &creds)
            })
            .await?;
        ensure_success(response, "cancel vercel deployment", "deployment", deployment_id).await?;

        info!("Canceled Vercel deployment {deployment_id}");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bundle::{Bundler, FunctionDefinition};
    use crate::credentials::StaticCredentialSource;
    use crate::http::RetryPolicy;
    use crate::provider::sha1_hex;
    use wiremock::matchers::{body_partial_json, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(server: &MockServer) -> VercelClient {
        let source = StaticCredentialSource::new(
            ["VERCEL_TOKEN", "VERCEL_TEAM_ID", "VERCEL_PROJECT_ID"],
            Some(String::from("tok")),
            Some(String::from("team-1")),
            Some(String::from("my-app")),
        );
        let credentials = Arc::new(CredentialManager::new(ProviderKind::Vercel, Arc::new(source)));
        let http = ResilientClient::new(RetryPolicy::new(2_000, 0)).expect("http");
        VercelClient::new(http, &server.uri(), credentials)
    }

    #[tokio::test]
    async fn test_missing_project_is_created() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v9/projects/my-app"))
            .and(query_param("teamId", "team-1"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/v10/projects"))
            .and(body_partial_json(json!({"name": "my-app"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "prj_1"})))
            .expect(1)
            .mount(&server)
            .await;

        let id = client(&server).ensure_project("local").await.expect("project");
        assert_eq!(id, "prj_1");
    }

    #[tokio::test]
    async fn test_deployment_references_uploaded_files() {
        let server = MockServer::start().await;
        let bundle = Bundler::for_provider(ProviderKind::Vercel)
            .bundle(&[FunctionDefinition::new("a", "export default () => new Response();")])
            .expect("bundle");
        let entry_sha = sha1_hex(
            bundle
                .get("api/router.ts")
                .expect("entrypoint")
                .content
                .as_bytes(),
        );

        Mock::given(method("POST"))
            .and(path("/v2/files"))
            .respond_with(ResponseTemplate::new(409))
            .expect(3)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/v13/deployments"))
            .and(body_partial_json(json!({
                "project": "prj_1",
                "env": {"TOKEN": "x"},
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "dpl_1",
                "readyState": "QUEUED",
                "url": "my-app-abc.vercel.app",
                "createdAt": 1_714_564_800_000_i64,
            })))
            .expect(1)
            .mount(&server)
            .await;

        let env = BTreeMap::from([(String::from("TOKEN"), String::from("x"))]);
        let deployment = client(&server)
            .create_deployment("prj_1", &bundle, &env)
            .await
            .expect("deployment");

        assert_eq!(deployment.id, "dpl_1");
        assert_eq!(deployment.status, DeploymentStatus::Pending);
        assert_eq!(deployment.url.as_deref(), Some("https://my-app-abc.vercel.app"));

        let requests = server.received_requests().await.expect("requests");
        let create = requests
            .iter()
            .find(|r| r.url.path() == "/v13/deployments")
            .expect("create request");
        let body: serde_json::Value = serde_json::from_slice(&create.body).expect("json body");
        let files = body["files"].as_array().expect("files");
        assert!(files.iter().any(|f| f["file"] == "api/router.ts" && f["sha"] == entry_sha.as_str()));
        assert!(files.iter().any(|f| f["file"] == "api/_functions/a.ts"));
        assert!(files.iter().any(|f| f["file"] == "vercel.json"));
    }

    #[tokio::test]
    async fn test_unconfigured_client_fails_before_network() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let source = StaticCredentialSource::new(
            ["VERCEL_TOKEN", "VERCEL_TEAM_ID", "VERCEL_PROJECT_ID"],
            None,
            None,
            None,
        );
        let credentials = Arc::new(CredentialManager::new(ProviderKind::Vercel, Arc::new(source)));
        let http = ResilientClient::new(RetryPolicy::new(2_000, 0)).expect("http");
        let client = VercelClient::new(http, &server.uri(), credentials);

        let err = client.get_deployment("dpl_1").await.expect_err("not configured");
        assert!(matches!(
            err,
            crate::error::EdgeplaneError::Provider(ProviderError::NotConfigured { .. })
        ));
    }

    #[tokio::test]
    async fn test_ready_state_mapping_and_events() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v13/deployments/dpl_1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "dpl_1",
                "readyState": "ERROR",
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/v3/deployments/dpl_1/events"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {"type": "stdout", "payload": {"text": "Installing"}},
                {"type": "stderr", "text": "Build failed"},
                {"type": "delimiter"},
            ])))
            .mount(&server)
            .await;

        let client = client(&server);
        let deployment = client.get_deployment("dpl_1").await.expect("deployment");
        assert_eq!(deployment.status, DeploymentStatus::Failed);
        assert_eq!(deployment.provider_project_id, "my-app");

        let logs = client.build_logs("dpl_1").await.expect("events");
        assert_eq!(logs, vec!["Installing", "Build failed"]);
    }

    #[tokio::test]
    async fn test_cancel_uses_patch() {
        let server = MockServer::start().await;
        Mock::given(method("PATCH"))
            .and(path("/v12/deployments/dpl_1/cancel"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "dpl_1"})))
            .expect(1)
            .mount(&server)
            .await;

        client(&server).cancel_deployment("dpl_1").await.expect("cancel");
    }
}
