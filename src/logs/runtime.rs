//! Runtime logs served by the active provider.
//!
//! Queries are always answered for the most recent successful deployment,
//! looked up afresh per query. A failed or empty lookup yields an empty page
//! so log views degrade instead of erroring during provider outages.

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::error::Result;

use super::types::{LogEntry, LogPage};

/// Function invocation logs.
pub const FUNCTION_LOGS: &str = "function.logs";

/// Function runtime logs.
pub const FUNCTION_RUNTIME_LOGS: &str = "function-runtime.logs";

/// Sources answered by the provider's runtime-log API.
pub const RUNTIME_SOURCES: [&str; 2] = [FUNCTION_LOGS, FUNCTION_RUNTIME_LOGS];

/// Returns true if `name` is a reserved runtime source.
#[must_use]
pub fn is_runtime_source(name: &str) -> bool {
    RUNTIME_SOURCES.contains(&name)
}

/// Filter parameters accepted by the runtime-log API.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RuntimeLogFilter {
    /// Free-text query.
    pub query: Option<String>,
    /// Severity filter.
    pub level: Option<String>,
    /// Region filter.
    pub region: Option<String>,
    /// Lower time bound.
    pub since: Option<DateTime<Utc>>,
    /// Upper time bound.
    pub until: Option<DateTime<Utc>>,
    /// Maximum number of entries.
    pub limit: Option<usize>,
    /// Sort field.
    pub sort: Option<String>,
    /// Sort order (`asc` or `desc`).
    pub order: Option<String>,
    /// Continuation cursor from a previous page.
    pub cursor: Option<String>,
}

impl RuntimeLogFilter {
    /// Renders the filter as query parameters, skipping unset fields.
    #[must_use]
    pub fn to_query(&self) -> Vec<(&'static str, String)> {
        let time = |t: &DateTime<Utc>| t.to_rfc3339_opts(SecondsFormat::Millis, true);

        [
            ("q", self.query.clone()),
            ("level", self.level.clone()),
            ("region", self.region.clone()),
            ("since", self.since.as_ref().map(time)),
            ("until", self.until.as_ref().map(time)),
            ("limit", self.limit.map(|l| l.to_string())),
            ("sort", self.sort.clone()),
            ("order", self.order.clone()),
            ("cursor", self.cursor.clone()),
        ]
        .into_iter()
        .filter_map(|(key, value)| value.map(|v| (key, v)))
        .collect()
    }
}

/// One record of a runtime-log NDJSON stream.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RawRuntimeLog {
    /// RFC 3339 timestamp.
    pub time: String,
    /// Severity.
    #[serde(default)]
    pub level: String,
    /// Message text.
    #[serde(default)]
    pub message: String,
    /// Region the entry was emitted in.
    #[serde(default)]
    pub region: Option<String>,
}

/// One page of raw runtime logs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RuntimeLogBatch {
    /// Entries as returned by the provider.
    pub entries: Vec<RawRuntimeLog>,
    /// Decoded continuation cursor.
    pub cursor: Option<String>,
}

/// Runtime-log API of a provider.
#[async_trait]
pub trait RuntimeLogApi: Send + Sync {
    /// Returns true if credentials can be obtained.
    fn is_configured(&self) -> bool;

    /// Id of the most recent successful deployment, if any.
    async fn latest_successful_deployment(&self) -> Result<Option<String>>;

    /// Fetches runtime logs of one deployment.
    async fn runtime_logs(
        &self,
        deployment_id: &str,
        filter: &RuntimeLogFilter,
    ) -> Result<RuntimeLogBatch>;
}

/// Turns raw records into normalized entries.
///
/// Ids are `{deployment}-{timestamp}-{index}` where `index` is the
/// zero-based position within the page.
#[must_use]
pub fn normalize_runtime_logs(deployment_id: &str, raw: Vec<RawRuntimeLog>) -> Vec<LogEntry> {
    raw.into_iter()
        .enumerate()
        .map(|(index, record)| {
            let timestamp = DateTime::parse_from_rfc3339(&record.time)
                .map(|t| t.timestamp_micros())
                .unwrap_or_else(|e| {
                    warn!("Unparseable runtime log time '{}': {e}", record.time);
                    0
                });

            LogEntry::new(
                format!("{deployment_id}-{timestamp}-{index}"),
                timestamp,
                record.level,
                record.region,
                record.message,
            )
        })
        .collect()
}

/// Reads runtime logs for the latest successful deployment.
#[derive(Clone)]
pub struct RuntimeLogReader {
    api: Arc<dyn RuntimeLogApi>,
}

impl std::fmt::Debug for RuntimeLogReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RuntimeLogReader")
            .field("configured", &self.api.is_configured())
            .finish()
    }
}

impl RuntimeLogReader {
    /// Creates a reader over `api`.
    #[must_use]
    pub fn new(api: Arc<dyn RuntimeLogApi>) -> Self {
        Self { api }
    }

    /// Returns true if the underlying provider is configured.
    #[must_use]
    pub fn is_configured(&self) -> bool {
        self.api.is_configured()
    }

    /// Fetches one page.
    ///
    /// # Errors
    ///
    /// Returns an error if the log call itself fails. A missing or failed
    /// deployment lookup is not an error and yields an empty page.
    pub async fn fetch(&self, filter: &RuntimeLogFilter) -> Result<LogPage> {
        let deployment_id = match self.api.latest_successful_deployment().await {
            Ok(Some(id)) => id,
            Ok(None) => {
                debug!("No successful deployment, returning empty runtime log page");
                return Ok(LogPage::empty());
            }
            Err(e) => {
                warn!("Latest deployment lookup failed, returning empty runtime log page: {e}");
                return Ok(LogPage::empty());
            }
        };

        let batch = self.api.runtime_logs(&deployment_id, filter).await?;
        debug!(
            "Fetched {} runtime log entries for deployment {deployment_id}",
            batch.entries.len()
        );

        Ok(LogPage::new(
            normalize_runtime_logs(&deployment_id, batch.entries),
            batch.cursor,
        ))
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::error::EdgeplaneError;
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Scripted runtime-log API.
    pub(crate) struct FakeRuntimeApi {
        pub latest: Option<std::result::Result<Option<String>, String>>,
        pub batch: RuntimeLogBatch,
        pub log_calls: AtomicU32,
        pub last_filter: std::sync::Mutex<Option<RuntimeLogFilter>>,
    }

    impl FakeRuntimeApi {
        pub(crate) fn with_deployment(id: &str, batch: RuntimeLogBatch) -> Self {
            Self {
                latest: Some(Ok(Some(id.to_string()))),
                batch,
                log_calls: AtomicU32::new(0),
                last_filter: std::sync::Mutex::new(None),
            }
        }
    }

    #[async_trait]
    impl RuntimeLogApi for FakeRuntimeApi {
        fn is_configured(&self) -> bool {
            self.latest.is_some()
        }

        async fn latest_successful_deployment(&self) -> Result<Option<String>> {
            match &self.latest {
                Some(Ok(id)) => Ok(id.clone()),
                Some(Err(message)) => Err(EdgeplaneError::internal(message.clone())),
                None => Ok(None),
            }
        }

        async fn runtime_logs(
            &self,
            _deployment_id: &str,
            filter: &RuntimeLogFilter,
        ) -> Result<RuntimeLogBatch> {
            self.log_calls.fetch_add(1, Ordering::SeqCst);
            if let Ok(mut last) = self.last_filter.lock() {
                *last = Some(filter.clone());
            }
            Ok(self.batch.clone())
        }
    }

    pub(crate) fn raw(time: &str, message: &str) -> RawRuntimeLog {
        RawRuntimeLog {
            time: time.to_string(),
            level: String::from("info"),
            message: message.to_string(),
            region: Some(String::from("us-east")),
        }
    }

    #[test]
    fn test_ids_unique_for_shared_timestamp() {
        let t = "2024-05-01T12:00:00Z";
        let entries = normalize_runtime_logs("dep1", vec![raw(t, "a"), raw(t, "b")]);
        let micros = DateTime::parse_from_rfc3339(t).expect("time").timestamp_micros();

        assert_eq!(entries[0].id, format!("dep1-{micros}-0"));
        assert_eq!(entries[1].id, format!("dep1-{micros}-1"));
        assert_eq!(entries[1].body.region.as_deref(), Some("us-east"));
    }

    #[test]
    fn test_filter_query_skips_unset() {
        let filter = RuntimeLogFilter {
            query: Some(String::from("boom")),
            limit: Some(50),
            ..RuntimeLogFilter::default()
        };

        assert_eq!(
            filter.to_query(),
            vec![("q", String::from("boom")), ("limit", String::from("50"))]
        );
    }

    #[tokio::test]
    async fn test_lookup_failure_yields_empty_page() {
        let api = FakeRuntimeApi {
            latest: Some(Err(String::from("provider down"))),
            ..FakeRuntimeApi::with_deployment("unused", RuntimeLogBatch::default())
        };
        let api = Arc::new(api);
        let reader = RuntimeLogReader::new(api.clone());

        let page = reader.fetch(&RuntimeLogFilter::default()).await.expect("page");
        assert!(page.entries.is_empty());
        assert!(!page.has_more);
        assert_eq!(api.log_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_no_deployment_yields_empty_page() {
        let api = FakeRuntimeApi {
            latest: Some(Ok(None)),
            ..FakeRuntimeApi::with_deployment("unused", RuntimeLogBatch::default())
        };
        let reader = RuntimeLogReader::new(Arc::new(api));

        let page = reader.fetch(&RuntimeLogFilter::default()).await.expect("page");
        assert_eq!(page, LogPage::empty());
    }

    #[tokio::test]
    async fn test_page_carries_cursor() {
        let batch = RuntimeLogBatch {
            entries: vec![raw("2024-05-01T12:00:00Z", "hello")],
            cursor: Some(String::from("next page")),
        };
        let reader = RuntimeLogReader::new(Arc::new(FakeRuntimeApi::with_deployment("d", batch)));

        let page = reader.fetch(&RuntimeLogFilter::default()).await.expect("page");
        assert_eq!(page.entries.len(), 1);
        assert_eq!(page.cursor.as_deref(), Some("next page"));
        assert!(page.has_more);
    }
}
