//! Local file-backed log store.
//!
//! Each source is a `<source>.log` file of newline-delimited [`LogEntry`]
//! records. Pages are served newest first; the cursor is the timestamp of
//! the oldest entry returned, and the next page holds strictly older
//! entries.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::debug;

use crate::error::{EdgeplaneError, LogError, Result};
use crate::http::parse_ndjson;

use super::store::{validate_source_name, LogBackend, LogWriter};
use super::types::{LogEntry, LogPage};

/// Default log directory name.
pub const LOGS_DIR: &str = ".edgeplane/logs";

/// Log file extension.
const LOG_EXTENSION: &str = "log";

/// Directory of NDJSON log files.
#[derive(Debug, Clone)]
pub struct LocalLogStore {
    /// Directory holding the log files.
    base_dir: PathBuf,
}

impl LocalLogStore {
    /// Creates a store under the current directory's default log directory.
    ///
    /// # Errors
    ///
    /// Returns an error if the current directory cannot be determined.
    pub fn new() -> Result<Self> {
        let base_dir = std::env::current_dir()
            .map_err(|e| EdgeplaneError::internal(format!("Cannot determine current directory: {e}")))?
            .join(LOGS_DIR);

        Ok(Self::with_base_dir(base_dir))
    }

    /// Creates a store rooted at `base_dir`.
    #[must_use]
    pub fn with_base_dir(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    /// Returns the store directory.
    #[must_use]
    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    fn source_path(&self, source: &str) -> PathBuf {
        self.base_dir.join(format!("{source}.{LOG_EXTENSION}"))
    }

    /// Reads every entry of `source`, newest first.
    async fn read_source(&self, source: &str) -> Result<Vec<LogEntry>> {
        validate_source_name(source)?;
        let path = self.source_path(source);

        if !path.exists() {
            debug!("Log file does not exist: {}", path.display());
            return Ok(Vec::new());
        }

        let content = fs::read_to_string(&path).await.map_err(|e| LogError::Corrupted {
            path: path.clone(),
            message: format!("Failed to read log file: {e}"),
        })?;

        let mut entries: Vec<LogEntry> = parse_ndjson(&content);
        entries.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        Ok(entries)
    }
}

fn parse_cursor(cursor: &str) -> Result<i64> {
    cursor.parse().map_err(|_| {
        LogError::backend("local", format!("invalid cursor '{cursor}'")).into()
    })
}

#[async_trait]
impl LogBackend for LocalLogStore {
    fn name(&self) -> &'static str {
        "local"
    }

    async fn list_sources(&self) -> Result<Vec<String>> {
        if !self.base_dir.exists() {
            return Ok(Vec::new());
        }

        let mut dir = fs::read_dir(&self.base_dir).await?;
        let mut sources = Vec::new();

        while let Some(entry) = dir.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some(LOG_EXTENSION) {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                sources.push(stem.to_string());
            }
        }

        sources.sort();
        Ok(sources)
    }

    async fn fetch(&self, source: &str, limit: usize, cursor: Option<&str>) -> Result<LogPage> {
        let before = cursor.map(parse_cursor).transpose()?;
        let mut remaining = self
            .read_source(source)
            .await?
            .into_iter()
            .filter(|e| before.is_none_or(|b| e.timestamp < b));

        let entries: Vec<LogEntry> = remaining.by_ref().take(limit).collect();
        let has_more = remaining.next().is_some();

        let cursor = if has_more {
            entries.last().map(|e| e.timestamp.to_string())
        } else {
            None
        };

        Ok(LogPage::new(entries, cursor))
    }

    async fn search(
        &self,
        query: &str,
        source: Option<&str>,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<LogEntry>> {
        let sources = match source {
            Some(name) => vec![name.to_string()],
            None => self.list_sources().await?,
        };

        let mut matches = Vec::new();
        for name in &sources {
            matches.extend(self.read_source(name).await?.into_iter().filter(|e| e.matches(query)));
        }
        matches.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));

        Ok(matches.into_iter().skip(offset).take(limit).collect())
    }
}

#[async_trait]
impl LogWriter for LocalLogStore {
    async fn write(&self, source: &str, entry: &LogEntry) -> Result<()> {
        validate_source_name(source)?;

        if !self.base_dir.exists() {
            debug!("Creating log directory: {}", self.base_dir.display());
            fs::create_dir_all(&self.base_dir).await?;
        }

        let mut line = serde_json::to_string(entry)
            .map_err(|e| LogError::backend("local", format!("Failed to serialize entry: {e}")))?;
        line.push('\n');

        let mut file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.source_path(source))
            .await?;
        file.write_all(line.as_bytes()).await?;
        file.flush().await?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn create_test_store() -> (LocalLogStore, TempDir) {
        let temp_dir = TempDir::new().expect("temp dir");
        let store = LocalLogStore::with_base_dir(temp_dir.path().join("logs"));
        (store, temp_dir)
    }

    async fn seed(store: &LocalLogStore, source: &str, count: i64) {
        for ts in 1..=count {
            let entry = LogEntry::new(format!("{source}-{ts}"), ts, "info", None, format!("event {ts}"));
            store.write(source, &entry).await.expect("write");
        }
    }

    #[tokio::test]
    async fn test_list_sources() {
        let (store, _dir) = create_test_store();
        assert!(store.list_sources().await.expect("list").is_empty());

        seed(&store, "deployments.logs", 1).await;
        seed(&store, "auth.logs", 1).await;

        assert_eq!(
            store.list_sources().await.expect("list"),
            vec![String::from("auth.logs"), String::from("deployments.logs")]
        );
    }

    #[tokio::test]
    async fn test_paging_newest_first() {
        let (store, _dir) = create_test_store();
        seed(&store, "app", 5).await;

        let first = store.fetch("app", 2, None).await.expect("page");
        let ts: Vec<i64> = first.entries.iter().map(|e| e.timestamp).collect();
        assert_eq!(ts, vec![5, 4]);
        assert_eq!(first.cursor.as_deref(), Some("4"));
        assert!(first.has_more);

        let second = store.fetch("app", 2, first.cursor.as_deref()).await.expect("page");
        let ts: Vec<i64> = second.entries.iter().map(|e| e.timestamp).collect();
        assert_eq!(ts, vec![3, 2]);

        let last = store.fetch("app", 2, second.cursor.as_deref()).await.expect("page");
        assert_eq!(last.entries.len(), 1);
        assert_eq!(last.cursor, None);
        assert!(!last.has_more);
    }

    #[tokio::test]
    async fn test_missing_source_is_empty() {
        let (store, _dir) = create_test_store();
        let page = store.fetch("nothing", 10, None).await.expect("page");
        assert_eq!(page, LogPage::empty());
    }

    #[tokio::test]
    async fn test_invalid_cursor_and_source() {
        let (store, _dir) = create_test_store();
        assert!(store.fetch("app", 10, Some("abc")).await.is_err());
        assert!(store.fetch("../escape", 10, None).await.is_err());
    }

    #[tokio::test]
    async fn test_search_with_offset() {
        let (store, _dir) = create_test_store();
        seed(&store, "a", 3).await;
        seed(&store, "b", 3).await;

        let all = store.search("EVENT", None, 10, 0).await.expect("search");
        assert_eq!(all.len(), 6);

        let scoped = store.search("event 2", Some("a"), 10, 0).await.expect("search");
        assert_eq!(scoped.len(), 1);
        assert_eq!(scoped[0].id, "a-2");

        let paged = store.search("event", Some("b"), 1, 1).await.expect("search");
        assert_eq!(paged.len(), 1);
        assert_eq!(paged[0].timestamp, 2);
    }

    #[tokio::test]
    async fn test_malformed_lines_are_skipped() {
        let (store, _dir) = create_test_store();
        seed(&store, "app", 1).await;

        let path = store.base_dir().join("app.log");
        let mut content = tokio::fs::read_to_string(&path).await.expect("read");
        content.push_str("not json\n");
        tokio::fs::write(&path, content).await.expect("write");

        let page = store.fetch("app", 10, None).await.expect("page");
        assert_eq!(page.entries.len(), 1);
    }
}
