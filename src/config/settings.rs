//! Process settings read from environment variables.
//!
//! Values come from the process environment, optionally seeded from a `.env`
//! file. Parsing goes through a lookup function so callers (and tests) can
//! supply any key/value source.

use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::{debug, info};

use crate::credentials::ProviderKind;
use crate::error::{ConfigError, Result};
use crate::http::{DEFAULT_MAX_RETRIES, DEFAULT_TIMEOUT_MS};
use crate::provider::{DENO_API_URL, VERCEL_API_URL};

/// Environment variable names.
pub mod keys {
    /// `local` or `cloud`.
    pub const MODE: &str = "EDGEPLANE_MODE";
    /// Local project identifier.
    pub const PROJECT_ID: &str = "EDGEPLANE_PROJECT_ID";
    /// Secret signing broker assertions.
    pub const JWT_SECRET: &str = "EDGEPLANE_JWT_SECRET";
    /// Credential broker base URL.
    pub const BROKER_URL: &str = "EDGEPLANE_BROKER_URL";
    /// Active provider.
    pub const PROVIDER: &str = "EDGEPLANE_PROVIDER";
    /// Deno Deploy API base URL.
    pub const DENO_API_URL: &str = "DENO_API_URL";
    /// Deno Deploy access token.
    pub const DENO_TOKEN: &str = "DENO_DEPLOY_TOKEN";
    /// Deno Deploy organization id.
    pub const DENO_ORG_ID: &str = "DENO_ORG_ID";
    /// Deno Deploy project id or name.
    pub const DENO_PROJECT_ID: &str = "DENO_PROJECT_ID";
    /// Vercel API base URL.
    pub const VERCEL_API_URL: &str = "VERCEL_API_URL";
    /// Vercel access token.
    pub const VERCEL_TOKEN: &str = "VERCEL_TOKEN";
    /// Vercel team id.
    pub const VERCEL_TEAM_ID: &str = "VERCEL_TEAM_ID";
    /// Vercel project id or name.
    pub const VERCEL_PROJECT_ID: &str = "VERCEL_PROJECT_ID";
    /// CloudWatch log group prefix.
    pub const LOG_GROUP_PREFIX: &str = "EDGEPLANE_LOG_GROUP_PREFIX";
    /// AWS region.
    pub const AWS_REGION: &str = "AWS_REGION";
    /// AWS access key id; its presence selects the cloud log store.
    pub const AWS_ACCESS_KEY_ID: &str = "AWS_ACCESS_KEY_ID";
    /// Local log directory.
    pub const LOGS_DIR: &str = "EDGEPLANE_LOGS_DIR";
    /// Per-attempt HTTP timeout in milliseconds.
    pub const HTTP_TIMEOUT_MS: &str = "EDGEPLANE_HTTP_TIMEOUT_MS";
    /// Retries after a transient HTTP failure.
    pub const HTTP_MAX_RETRIES: &str = "EDGEPLANE_HTTP_MAX_RETRIES";
}

/// Project id used in local mode when none is configured.
pub const DEFAULT_LOCAL_PROJECT: &str = "local";

/// Where credentials come from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Mode {
    /// Static credentials from configuration.
    #[default]
    Local,
    /// Credentials exchanged at a broker.
    Cloud,
}

impl FromStr for Mode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "local" => Ok(Self::Local),
            "cloud" => Ok(Self::Cloud),
            other => Err(format!("expected 'local' or 'cloud', got '{other}'")),
        }
    }
}

/// Static configuration of one provider.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct ProviderSettings {
    /// API base URL.
    pub api_url: String,
    /// Access token.
    pub token: Option<String>,
    /// Organization or team id.
    pub account_id: Option<String>,
    /// Provider-side project id.
    pub project_id: Option<String>,
    /// Key names of token, account and project, for error messages.
    pub keys: [&'static str; 3],
}

impl std::fmt::Debug for ProviderSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderSettings")
            .field("api_url", &self.api_url)
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .field("account_id", &self.account_id)
            .field("project_id", &self.project_id)
            .finish()
    }
}

/// Credential broker configuration (cloud mode).
#[derive(Clone, Default, PartialEq, Eq)]
pub struct BrokerSettings {
    /// Broker base URL.
    pub url: String,
    /// Assertion signing secret.
    pub jwt_secret: String,
}

impl std::fmt::Debug for BrokerSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BrokerSettings")
            .field("url", &self.url)
            .finish_non_exhaustive()
    }
}

/// General log store configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LogSettings {
    /// CloudWatch log group prefix.
    pub group_prefix: Option<String>,
    /// AWS region.
    pub aws_region: Option<String>,
    /// True if AWS credentials are present.
    pub aws_configured: bool,
    /// Local log directory.
    pub logs_dir: Option<PathBuf>,
}

/// Outbound HTTP budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HttpSettings {
    /// Per-attempt timeout in milliseconds.
    pub timeout_ms: u64,
    /// Retries after a transient failure.
    pub max_retries: u32,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            timeout_ms: DEFAULT_TIMEOUT_MS,
            max_retries: DEFAULT_MAX_RETRIES,
        }
    }
}

/// Complete process settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    /// Credential mode.
    pub mode: Mode,
    /// Local project identifier.
    pub project_id: String,
    /// Active provider.
    pub provider: ProviderKind,
    /// Broker configuration, present in cloud mode.
    pub broker: Option<BrokerSettings>,
    /// Deno Deploy configuration.
    pub deno: ProviderSettings,
    /// Vercel configuration.
    pub vercel: ProviderSettings,
    /// Log store configuration.
    pub logs: LogSettings,
    /// HTTP budget.
    pub http: HttpSettings,
}

fn parse_value<T: FromStr>(name: &str, raw: Option<String>, default: T) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    raw.map_or(Ok(default), |value| {
        value
            .parse()
            .map_err(|e: T::Err| ConfigError::invalid(name, e.to_string()).into())
    })
}

impl Settings {
    /// Builds settings from `lookup`.
    ///
    /// Empty values count as unset.
    ///
    /// # Errors
    ///
    /// Returns an error if a value cannot be parsed, or if cloud mode lacks
    /// its project id, broker URL or signing secret.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let mode: Mode = parse_value(keys::MODE, get(keys::MODE), Mode::Local)?;
        let provider: ProviderKind = parse_value(keys::PROVIDER, get(keys::PROVIDER), ProviderKind::Deno)?;

        let (project_id, broker) = match mode {
            Mode::Local => (
                get(keys::PROJECT_ID).unwrap_or_else(|| DEFAULT_LOCAL_PROJECT.to_string()),
                None,
            ),
            Mode::Cloud => {
                let require = |key: &str| get(key).ok_or_else(|| ConfigError::missing(key));
                let project_id = require(keys::PROJECT_ID)?;
                let broker = BrokerSettings {
                    url: require(keys::BROKER_URL)?,
                    jwt_secret: require(keys::JWT_SECRET)?,
                };
                (project_id, Some(broker))
            }
        };

        let deno = ProviderSettings {
            api_url: get(keys::DENO_API_URL).unwrap_or_else(|| DENO_API_URL.to_string()),
            token: get(keys::DENO_TOKEN),
            account_id: get(keys::DENO_ORG_ID),
            project_id: get(keys::DENO_PROJECT_ID),
            keys: [keys::DENO_TOKEN, keys::DENO_ORG_ID, keys::DENO_PROJECT_ID],
        };

        let vercel = ProviderSettings {
            api_url: get(keys::VERCEL_API_URL).unwrap_or_else(|| VERCEL_API_URL.to_string()),
            token: get(keys::VERCEL_TOKEN),
            account_id: get(keys::VERCEL_TEAM_ID),
            project_id: get(keys::VERCEL_PROJECT_ID),
            keys: [keys::VERCEL_TOKEN, keys::VERCEL_TEAM_ID, keys::VERCEL_PROJECT_ID],
        };

        let logs = LogSettings {
            group_prefix: get(keys::LOG_GROUP_PREFIX),
            aws_region: get(keys::AWS_REGION),
            aws_configured: get(keys::AWS_ACCESS_KEY_ID).is_some(),
            logs_dir: get(keys::LOGS_DIR).map(PathBuf::from),
        };

        let http = HttpSettings {
            timeout_ms: parse_value(keys::HTTP_TIMEOUT_MS, get(keys::HTTP_TIMEOUT_MS), DEFAULT_TIMEOUT_MS)?,
            max_retries: parse_value(
                keys::HTTP_MAX_RETRIES,
                get(keys::HTTP_MAX_RETRIES),
                DEFAULT_MAX_RETRIES,
            )?,
        };

        debug!("Loaded settings: mode={mode:?}, provider={provider}, project={project_id}");

        Ok(Self {
            mode,
            project_id,
            provider,
            broker,
            deno,
            vercel,
            logs,
            http,
        })
    }

    /// Builds settings from the process environment.
    ///
    /// # Errors
    ///
    /// See [`Settings::from_lookup`].
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Loads a `.env` file from `dir` (or the current directory) if present.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be loaded.
    pub fn load_dotenv(dir: Option<&Path>) -> Result<()> {
        let env_path = dir.map_or_else(|| PathBuf::from(".env"), |p| p.join(".env"));

        if env_path.exists() {
            info!("Loading environment from: {}", env_path.display());
            dotenvy::from_path(&env_path).map_err(|e| ConfigError::ParseError {
                message: format!("Failed to load .env file: {e}"),
                location: Some(env_path.display().to_string()),
            })?;
        } else {
            debug!(".env file not found at: {}", env_path.display());
        }

        Ok(())
    }

    /// Returns the static configuration of `kind`.
    #[must_use]
    pub const fn provider_settings(&self, kind: ProviderKind) -> &ProviderSettings {
        match kind {
            ProviderKind::Deno => &self.deno,
            ProviderKind::Vercel => &self.vercel,
        }
    }
}
