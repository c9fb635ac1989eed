//! Unified log access.
//!
//! This module provides:
//! - Normalized log types and pages with opaque cursors
//! - General-purpose stores (CloudWatch Logs, local NDJSON files)
//! - Runtime logs of the active provider
//! - The aggregator that routes queries by source name

mod aggregator;
mod cloudwatch;
mod cursor;
mod local;
mod runtime;
mod store;
mod types;

pub use aggregator::{route_source, LogAggregator, LogRoute};
pub use cloudwatch::{CloudWatchLogStore, DEFAULT_LOG_GROUP_PREFIX};
pub use cursor::{next_cursor, parse_next_cursor, CURSOR_PARAM};
pub use local::{LocalLogStore, LOGS_DIR};
pub use runtime::{
    is_runtime_source, normalize_runtime_logs, RawRuntimeLog, RuntimeLogApi, RuntimeLogBatch,
    RuntimeLogFilter, RuntimeLogReader, FUNCTION_LOGS, FUNCTION_RUNTIME_LOGS, RUNTIME_SOURCES,
};
pub use store::{validate_source_name, LogBackend, LogWriter};
pub use types::{LogBody, LogEntry, LogPage, LogSource};

/// Source that receives deployment audit events.
pub const DEPLOYMENTS_SOURCE: &str = "deployments.logs";
