//! Unified log aggregation.
//!
//! Every query is routed by logical source name: reserved runtime sources
//! go to the provider's runtime-log API when a provider is configured, and
//! everything else goes to the process-wide general store.

use std::sync::Arc;
use tracing::debug;

use crate::error::Result;

use super::runtime::{is_runtime_source, RuntimeLogFilter, RuntimeLogReader, RUNTIME_SOURCES};
use super::store::LogBackend;
use super::types::{LogEntry, LogPage, LogSource};

/// Backend a source name routes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogRoute {
    /// Provider runtime-log API.
    Runtime,
    /// General-purpose store.
    Store,
}

/// Picks the backend for `name`. Depends only on its arguments.
#[must_use]
pub fn route_source(name: &str, runtime_configured: bool) -> LogRoute {
    if runtime_configured && is_runtime_source(name) {
        LogRoute::Runtime
    } else {
        LogRoute::Store
    }
}

/// Backend name reported for runtime sources.
const RUNTIME_BACKEND: &str = "runtime";

/// Single entry point for log queries.
#[derive(Clone)]
pub struct LogAggregator {
    /// General-purpose store selected at startup.
    store: Arc<dyn LogBackend>,
    /// Runtime logs of the active provider.
    runtime: Option<RuntimeLogReader>,
}

impl std::fmt::Debug for LogAggregator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LogAggregator")
            .field("store", &self.store.name())
            .field("runtime", &self.runtime)
            .finish()
    }
}

impl LogAggregator {
    /// Creates an aggregator.
    #[must_use]
    pub fn new(store: Arc<dyn LogBackend>, runtime: Option<RuntimeLogReader>) -> Self {
        Self { store, runtime }
    }

    fn runtime_configured(&self) -> bool {
        self.runtime.as_ref().is_some_and(RuntimeLogReader::is_configured)
    }

    fn route(&self, name: &str) -> Option<&RuntimeLogReader> {
        match route_source(name, self.runtime_configured()) {
            LogRoute::Runtime => self.runtime.as_ref(),
            LogRoute::Store => None,
        }
    }

    /// Lists every queryable source.
    ///
    /// # Errors
    ///
    /// Returns an error if the general store cannot list its sources.
    pub async fn get_log_sources(&self) -> Result<Vec<LogSource>> {
        let mut sources: Vec<LogSource> = self
            .store
            .list_sources()
            .await?
            .into_iter()
            .filter(|name| route_source(name, self.runtime_configured()) == LogRoute::Store)
            .map(|name| LogSource {
                name,
                backend: self.store.name().to_string(),
            })
            .collect();

        if self.runtime_configured() {
            sources.extend(RUNTIME_SOURCES.iter().map(|name| LogSource {
                name: (*name).to_string(),
                backend: String::from(RUNTIME_BACKEND),
            }));
        }

        Ok(sources)
    }

    /// Fetches one page of `name`.
    ///
    /// # Errors
    ///
    /// Returns an error if the selected backend fails.
    pub async fn get_logs_by_source(
        &self,
        name: &str,
        limit: usize,
        cursor: Option<&str>,
    ) -> Result<LogPage> {
        if let Some(runtime) = self.route(name) {
            debug!("Routing {name} to runtime logs");
            let filter = RuntimeLogFilter {
                limit: Some(limit),
                cursor: cursor.map(str::to_string),
                ..RuntimeLogFilter::default()
            };
            return runtime.fetch(&filter).await;
        }

        debug!("Routing {name} to {} store", self.store.name());
        self.store.fetch(name, limit, cursor).await
    }

    /// Searches one source, or the whole general store when `source` is
    /// `None`.
    ///
    /// # Errors
    ///
    /// Returns an error if the selected backend fails.
    pub async fn search_logs(
        &self,
        query: &str,
        source: Option<&str>,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<LogEntry>> {
        if let Some(runtime) = source.and_then(|name| self.route(name)) {
            let filter = RuntimeLogFilter {
                query: Some(query.to_string()),
                limit: Some(offset.saturating_add(limit)),
                ..RuntimeLogFilter::default()
            };
            let page = runtime.fetch(&filter).await?;
            return Ok(page.entries.into_iter().skip(offset).take(limit).collect());
        }

        self.store.search(query, source, limit, offset).await
    }
}
