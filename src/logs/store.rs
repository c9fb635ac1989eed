//! General-purpose log backend seams.

use async_trait::async_trait;

use crate::error::{LogError, Result};

use super::types::{LogEntry, LogPage};

/// A general-purpose log store (cloud or local).
#[async_trait]
pub trait LogBackend: Send + Sync {
    /// Backend name for logs and source listings.
    fn name(&self) -> &'static str;

    /// Lists the sources this backend holds.
    async fn list_sources(&self) -> Result<Vec<String>>;

    /// Fetches one page of `source`, continuing from `cursor`.
    async fn fetch(&self, source: &str, limit: usize, cursor: Option<&str>) -> Result<LogPage>;

    /// Searches one source, or all of them when `source` is `None`.
    async fn search(
        &self,
        query: &str,
        source: Option<&str>,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<LogEntry>>;
}

/// Write contract of the log persistence layer.
#[async_trait]
pub trait LogWriter: Send + Sync {
    /// Appends `entry` to `source`.
    async fn write(&self, source: &str, entry: &LogEntry) -> Result<()>;
}

/// Rejects source names that are empty, hidden, or contain anything other
/// than ASCII letters, digits, `.`, `_` or `-`.
///
/// # Errors
///
/// Returns [`LogError::InvalidSource`] for an unusable name.
pub fn validate_source_name(name: &str) -> Result<()> {
    let valid = !name.is_empty()
        && !name.starts_with('.')
        && !name.contains("..")
        && name
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'.' | b'_' | b'-'));

    if valid {
        Ok(())
    } else {
        Err(LogError::InvalidSource {
            name: name.to_string(),
        }
        .into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_names() {
        assert!(validate_source_name("deployments.logs").is_ok());
        assert!(validate_source_name("edge-function_1").is_ok());
        assert!(validate_source_name("").is_err());
        assert!(validate_source_name("../etc/passwd").is_err());
        assert!(validate_source_name(".hidden").is_err());
        assert!(validate_source_name("a/b").is_err());
    }
}
