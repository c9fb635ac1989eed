//! Provider-neutral deployment types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::warn;

/// Closed deployment status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeploymentStatus {
    /// Still building or queued.
    #[default]
    Pending,
    /// Live.
    Success,
    /// Build or deployment failed.
    Failed,
}

impl DeploymentStatus {
    /// Returns true for `Success` and `Failed`.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Success | Self::Failed)
    }

    /// Applies an observed status, never leaving a terminal state.
    #[must_use]
    pub const fn advance(self, observed: Self) -> Self {
        if self.is_terminal() { self } else { observed }
    }

    /// Lowercase name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Success => "success",
            Self::Failed => "failed",
        }
    }

    /// Normalizes a provider status string.
    ///
    /// Known in-progress states map to `Pending`, failure-like states
    /// (errors, cancellations) to `Failed`. Unrecognized values stay
    /// `Pending` and are logged so they can be added here.
    #[must_use]
    pub fn from_provider(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "success" | "ready" => Self::Success,
            "failed" | "failure" | "error" | "canceled" | "cancelled" => Self::Failed,
            "pending" | "queued" | "building" | "initializing" | "uploading" | "deploying"
            | "in_progress" => Self::Pending,
            other => {
                warn!("Unrecognized deployment status '{other}', treating as pending");
                Self::Pending
            }
        }
    }
}

impl fmt::Display for DeploymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One deployment attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Deployment {
    /// Provider deployment id.
    pub id: String,
    /// Provider project the deployment belongs to.
    pub provider_project_id: String,
    /// Current status.
    pub status: DeploymentStatus,
    /// Public URL, once known.
    pub url: Option<String>,
    /// Creation time.
    pub created_at: DateTime<Utc>,
}

impl Deployment {
    /// Returns the URL only if the deployment is live.
    #[must_use]
    pub fn live_url(&self) -> Option<&str> {
        if self.status == DeploymentStatus::Success {
            self.url.as_deref()
        } else {
            None
        }
    }
}

/// A file stored by content hash.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadedFile {
    /// Path inside the deployment.
    pub path: String,
    /// Lowercase hex SHA-1 of the content.
    pub sha1: String,
    /// Content size in bytes.
    pub size: u64,
}

/// Prefixes a bare hostname with `https://`.
pub(crate) fn https_url(host: &str) -> String {
    if host.starts_with("http://") || host.starts_with("https://") {
        host.to_string()
    } else {
        format!("https://{host}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_normalization() {
        assert_eq!(DeploymentStatus::from_provider("success"), DeploymentStatus::Success);
        assert_eq!(DeploymentStatus::from_provider("READY"), DeploymentStatus::Success);
        assert_eq!(DeploymentStatus::from_provider("failed"), DeploymentStatus::Failed);
        assert_eq!(DeploymentStatus::from_provider("ERROR"), DeploymentStatus::Failed);
        assert_eq!(DeploymentStatus::from_provider("CANCELED"), DeploymentStatus::Failed);
        assert_eq!(DeploymentStatus::from_provider("BUILDING"), DeploymentStatus::Pending);
        assert_eq!(DeploymentStatus::from_provider("something-new"), DeploymentStatus::Pending);
    }

    #[test]
    fn test_terminal_states_are_sticky() {
        let s = DeploymentStatus::Pending.advance(DeploymentStatus::Success);
        assert_eq!(s, DeploymentStatus::Success);
        assert_eq!(s.advance(DeploymentStatus::Pending), DeploymentStatus::Success);
        assert_eq!(
            DeploymentStatus::Failed.advance(DeploymentStatus::Success),
            DeploymentStatus::Failed
        );
    }

    #[test]
    fn test_live_url_only_on_success() {
        let mut d = Deployment {
            id: String::from("d1"),
            provider_project_id: String::from("p"),
            status: DeploymentStatus::Pending,
            url: Some(String::from("https://x.example")),
            created_at: Utc::now(),
        };
        assert_eq!(d.live_url(), None);

        d.status = DeploymentStatus::Success;
        assert_eq!(d.live_url(), Some("https://x.example"));
        assert_eq!(https_url("x.example"), "https://x.example");
    }
}
