//! Error types for the edgeplane control plane.
//!
//! This module provides the error hierarchy for every stage of a function
//! deployment and log query: configuration, input validation, outbound
//! transport, provider APIs, credentials and log backends.

use std::path::PathBuf;
use thiserror::Error;

/// The main error type for the edgeplane control plane.
#[derive(Debug, Error)]
pub enum EdgeplaneError {
    /// Configuration-related errors.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Input rejected before any network call.
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Transport-level failures of outbound HTTP calls.
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// Provider API errors.
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    /// Credential fetch errors.
    #[error("Credential error: {0}")]
    Credential(#[from] CredentialError),

    /// Log backend errors.
    #[error("Log error: {0}")]
    Logs(#[from] LogError),

    /// IO errors.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Configuration-related errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A required configuration value is absent.
    #[error("Missing required configuration value: {name}")]
    MissingValue {
        /// Name of the missing key.
        name: String,
    },

    /// A configuration value could not be interpreted.
    #[error("Invalid value for {name}: {message}")]
    InvalidValue {
        /// Name of the offending key.
        name: String,
        /// Why the value was rejected.
        message: String,
    },

    /// The manifest file was not found.
    #[error("Manifest file not found: {path}")]
    FileNotFound {
        /// Path to the missing file.
        path: PathBuf,
    },

    /// The manifest could not be parsed.
    #[error("Failed to parse manifest: {message}")]
    ParseError {
        /// Description of the parse error.
        message: String,
        /// Optional source location.
        location: Option<String>,
    },
}

/// Input validation errors.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// Slug does not match `^[A-Za-z0-9_-]+$`.
    #[error("Invalid function slug '{slug}': only letters, digits, '-' and '_' are allowed")]
    InvalidSlug {
        /// The rejected slug.
        slug: String,
    },

    /// Function source is empty.
    #[error("Function '{slug}' has no source code")]
    EmptyCode {
        /// Slug of the empty function.
        slug: String,
    },

    /// Two functions share a slug.
    #[error("Duplicate function slug: {slug}")]
    DuplicateSlug {
        /// The duplicated slug.
        slug: String,
    },

    /// Slug collides with a path the router answers itself.
    #[error("Function slug '{slug}' is reserved by the router")]
    ReservedSlug {
        /// The reserved slug.
        slug: String,
    },
}

/// Classes of transport failure that are worth another attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransientKind {
    /// Host name could not be resolved.
    DnsResolution,
    /// Peer reset or aborted the connection.
    ConnectionReset,
    /// Connection could not be established in time.
    ConnectTimeout,
}

/// Transport-level errors raised by the resilience client.
#[derive(Debug, Clone, Error)]
pub enum TransportError {
    /// No attempt completed within the per-attempt budget.
    #[error("{operation} timed out after {timeout_ms}ms")]
    Timeout {
        /// Operation being performed.
        operation: String,
        /// Budget that elapsed.
        timeout_ms: u64,
    },

    /// A transient network failure.
    #[error("{operation} failed with transient network error ({kind:?}): {message}")]
    Transient {
        /// Operation being performed.
        operation: String,
        /// Transient class.
        kind: TransientKind,
        /// Underlying error text.
        message: String,
    },

    /// A non-retryable request failure.
    #[error("{operation} failed: {message}")]
    Request {
        /// Operation being performed.
        operation: String,
        /// Underlying error text.
        message: String,
    },
}

/// Provider API errors.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// Non-2xx response from a provider.
    #[error("{operation} returned HTTP {status}: {body}")]
    Upstream {
        /// Operation being performed.
        operation: String,
        /// HTTP status code.
        status: u16,
        /// Response body, for context.
        body: String,
    },

    /// 404 from a provider.
    #[error("{resource} not found: {id}")]
    NotFound {
        /// Kind of resource.
        resource: String,
        /// Identifier that was looked up.
        id: String,
    },

    /// Response could not be parsed into the expected shape.
    #[error("Invalid response from {operation}: {message}")]
    InvalidResponse {
        /// Operation being performed.
        operation: String,
        /// Description of the response issue.
        message: String,
    },

    /// The provider has no credentials configured.
    #[error("Provider {provider} is not configured")]
    NotConfigured {
        /// Provider name.
        provider: String,
    },
}

/// Credential fetch errors.
///
/// Cloneable so that a single in-flight fetch can hand the same outcome to
/// every waiter.
#[derive(Debug, Clone, Error)]
pub enum CredentialError {
    /// Required credential configuration is missing.
    #[error("Credential configuration missing: {message}")]
    Configuration {
        /// Description of what is missing.
        message: String,
    },

    /// The broker answered with an error or an incomplete payload.
    #[error("Credential broker error: {message}")]
    Upstream {
        /// Description of the broker failure.
        message: String,
    },

    /// The local assertion could not be signed.
    #[error("Failed to sign credential assertion: {message}")]
    Signing {
        /// Description of the signing failure.
        message: String,
    },

    /// The broker could not be reached.
    #[error("Credential broker unreachable: {0}")]
    Transport(#[from] TransportError),
}

/// Log backend errors.
#[derive(Debug, Error)]
pub enum LogError {
    /// Backend call failed.
    #[error("Log backend {backend} failed: {message}")]
    Backend {
        /// Backend name.
        backend: String,
        /// Description of the failure.
        message: String,
    },

    /// A stored log file could not be read.
    #[error("Log file {path} is unreadable: {message}")]
    Corrupted {
        /// File path.
        path: PathBuf,
        /// Description of the corruption.
        message: String,
    },

    /// Source name is not a valid file-safe identifier.
    #[error("Invalid log source name: {name}")]
    InvalidSource {
        /// The rejected name.
        name: String,
    },
}

/// Result type alias for edgeplane operations.
pub type Result<T> = std::result::Result<T, EdgeplaneError>;

impl EdgeplaneError {
    /// Creates a new internal error with the given message.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Returns true if this error is a provider 404.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::Provider(ProviderError::NotFound { .. }))
    }
}

impl ConfigError {
    /// Creates a missing-value error.
    #[must_use]
    pub fn missing(name: impl Into<String>) -> Self {
        Self::MissingValue { name: name.into() }
    }

    /// Creates an invalid-value error.
    #[must_use]
    pub fn invalid(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidValue {
            name: name.into(),
            message: message.into(),
        }
    }
}

impl TransportError {
    /// Returns true if the failure belongs to a transient class.
    ///
    /// An attempt that ran out of time is treated like a connect timeout.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::Timeout { .. } | Self::Transient { .. })
    }
}

impl ProviderError {
    /// Creates an upstream error.
    #[must_use]
    pub fn upstream(operation: impl Into<String>, status: u16, body: impl Into<String>) -> Self {
        Self::Upstream {
            operation: operation.into(),
            status,
            body: body.into(),
        }
    }

    /// Creates an invalid-response error.
    #[must_use]
    pub fn invalid_response(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidResponse {
            operation: operation.into(),
            message: message.into(),
        }
    }
}

impl LogError {
    /// Creates a backend error.
    #[must_use]
    pub fn backend(backend: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Backend {
            backend: backend.into(),
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classes() {
        assert!(TransportError::Transient {
            operation: String::from("get deployment"),
            kind: TransientKind::ConnectionReset,
            message: String::from("reset by peer"),
        }
        .is_transient());
        assert!(TransportError::Timeout {
            operation: String::from("get deployment"),
            timeout_ms: 10,
        }
        .is_transient());
        assert!(!TransportError::Request {
            operation: String::from("get deployment"),
            message: String::from("builder error"),
        }
        .is_transient());
    }

    #[test]
    fn test_upstream_is_not_not_found() {
        let err = EdgeplaneError::Provider(ProviderError::upstream("create deployment", 500, "boom"));
        assert!(!err.is_not_found());
        assert!(err.to_string().contains("HTTP 500"));
    }

    #[test]
    fn test_not_found_is_distinguished() {
        let err = EdgeplaneError::Provider(ProviderError::NotFound {
            resource: String::from("deployment"),
            id: String::from("dep-1"),
        });
        assert!(err.is_not_found());
    }
}
