//! Deployment providers.
//!
//! This module provides:
//! - The [`DeploymentProvider`] trait the lifecycle controller drives
//! - A Deno Deploy client (bundle model, also serves runtime logs)
//! - A Vercel client (content-addressable upload model)

mod deno;
mod types;
mod upload;
mod vercel;

pub use deno::{DenoClient, DENO_API_URL};
pub use types::{Deployment, DeploymentStatus, UploadedFile};
pub use upload::{sha1_hex, ContentUploader};
pub use vercel::{VercelClient, VERCEL_API_URL};

use async_trait::async_trait;
use std::collections::BTreeMap;

use crate::bundle::AssetBundle;
use crate::credentials::ProviderKind;
use crate::error::Result;

/// A hosting provider that runs deployed functions.
#[async_trait]
pub trait DeploymentProvider: Send + Sync {
    /// Which provider this is.
    fn kind(&self) -> ProviderKind;

    /// Returns true if credentials can be obtained.
    fn is_configured(&self) -> bool;

    /// Makes sure the remote project exists and returns its id.
    ///
    /// A 404 on the existence check triggers creation, named after
    /// `local_project_id`. Any other failure is returned as is.
    async fn ensure_project(&self, local_project_id: &str) -> Result<String>;

    /// Starts a deployment of `bundle` with `env` as environment variables.
    async fn create_deployment(
        &self,
        project_id: &str,
        bundle: &AssetBundle,
        env: &BTreeMap<String, String>,
    ) -> Result<Deployment>;

    /// Fetches the current state of a deployment.
    async fn get_deployment(&self, deployment_id: &str) -> Result<Deployment>;

    /// Fetches build diagnostics for a deployment.
    async fn build_logs(&self, deployment_id: &str) -> Result<Vec<String>>;

    /// Requests cancellation of a deployment.
    async fn cancel_deployment(&self, deployment_id: &str) -> Result<()>;
}
