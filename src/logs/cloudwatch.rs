//! CloudWatch Logs backend.
//!
//! Sources are the log groups under a configured prefix (the prefix is
//! stripped from source names). The page cursor is CloudWatch's own
//! `nextToken`. Writes go to one stream per group; the group and stream are
//! created on first use.

use aws_sdk_cloudwatchlogs::types::{FilteredLogEvent, InputLogEvent};
use aws_sdk_cloudwatchlogs::Client;
use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::debug;

use crate::error::{LogError, Result};

use super::store::{validate_source_name, LogBackend, LogWriter};
use super::types::{LogEntry, LogPage};

/// Default log group prefix.
pub const DEFAULT_LOG_GROUP_PREFIX: &str = "/edgeplane/";

/// Stream that written entries are appended to.
pub const WRITE_STREAM: &str = "edgeplane";

/// Upper bound CloudWatch accepts for `limit`.
const MAX_EVENTS_PER_CALL: usize = 10_000;

/// CloudWatch Logs store.
#[derive(Debug, Clone)]
pub struct CloudWatchLogStore {
    /// CloudWatch Logs client.
    client: Client,
    /// Log group prefix.
    prefix: String,
}

impl CloudWatchLogStore {
    /// Creates a store using the ambient AWS configuration.
    pub async fn new(prefix: Option<&str>, region: Option<&str>) -> Self {
        let config = if let Some(region_str) = region {
            aws_config::from_env()
                .region(aws_config::Region::new(region_str.to_string()))
                .load()
                .await
        } else {
            aws_config::load_from_env().await
        };

        Self::with_client(Client::new(&config), prefix)
    }

    /// Creates a store with an existing client.
    #[must_use]
    pub fn with_client(client: Client, prefix: Option<&str>) -> Self {
        Self {
            client,
            prefix: prefix.unwrap_or(DEFAULT_LOG_GROUP_PREFIX).to_string(),
        }
    }

    fn group(&self, source: &str) -> String {
        format!("{}{source}", self.prefix)
    }

    /// Reads one batch of events from `source`.
    async fn filter_events(
        &self,
        source: &str,
        limit: usize,
        cursor: Option<&str>,
        pattern: Option<String>,
    ) -> Result<(Vec<LogEntry>, Option<String>)> {
        let group = self.group(source);
        debug!("Reading CloudWatch log group {group}");

        let limit = i32::try_from(limit.clamp(1, MAX_EVENTS_PER_CALL)).unwrap_or(i32::MAX);

        let result = self
            .client
            .filter_log_events()
            .log_group_name(&group)
            .limit(limit)
            .set_next_token(cursor.map(str::to_string))
            .set_filter_pattern(pattern)
            .send()
            .await;

        match result {
            Ok(output) => {
                let entries = output
                    .events()
                    .iter()
                    .enumerate()
                    .map(|(index, event)| event_to_entry(source, index, event))
                    .collect();
                Ok((entries, output.next_token().map(str::to_string)))
            }
            Err(sdk_err) => {
                let service_err = sdk_err.into_service_error();
                if service_err.is_resource_not_found_exception() {
                    debug!("Log group {group} does not exist");
                    Ok((Vec::new(), None))
                } else {
                    Err(LogError::backend(
                        "cloudwatch",
                        format!("filter events error: {service_err}"),
                    )
                    .into())
                }
            }
        }
    }
}

impl CloudWatchLogStore {
    /// Appends one event to `group`'s write stream.
    async fn put_event(&self, group: &str, event: InputLogEvent) -> Result<bool> {
        let result = self
            .client
            .put_log_events()
            .log_group_name(group)
            .log_stream_name(WRITE_STREAM)
            .log_events(event)
            .send()
            .await;

        match result {
            Ok(_) => Ok(true),
            Err(sdk_err) => {
                let service_err = sdk_err.into_service_error();
                if service_err.is_resource_not_found_exception() {
                    Ok(false)
                } else {
                    Err(LogError::backend("cloudwatch", format!("put events error: {service_err}")).into())
                }
            }
        }
    }

    /// Creates `group` and its write stream, tolerating either existing.
    async fn create_target(&self, group: &str) -> Result<()> {
        debug!("Creating CloudWatch log group {group}");

        if let Err(sdk_err) = self.client.create_log_group().log_group_name(group).send().await {
            let service_err = sdk_err.into_service_error();
            if !service_err.is_resource_already_exists_exception() {
                return Err(LogError::backend(
                    "cloudwatch",
                    format!("create log group error: {service_err}"),
                )
                .into());
            }
        }

        if let Err(sdk_err) = self
            .client
            .create_log_stream()
            .log_group_name(group)
            .log_stream_name(WRITE_STREAM)
            .send()
            .await
        {
            let service_err = sdk_err.into_service_error();
            if !service_err.is_resource_already_exists_exception() {
                return Err(LogError::backend(
                    "cloudwatch",
                    format!("create log stream error: {service_err}"),
                )
                .into());
            }
        }

        Ok(())
    }
}

/// Builds the event written for `entry`, in the JSON shape
/// [`event_to_entry`] reads back.
fn entry_to_event(entry: &LogEntry) -> Result<InputLogEvent> {
    let message = json!({
        "level": entry.body.level,
        "region": entry.body.region,
        "message": entry.body.message,
    });

    InputLogEvent::builder()
        .timestamp(entry.timestamp / 1_000)
        .message(message.to_string())
        .build()
        .map_err(|e| LogError::backend("cloudwatch", format!("invalid log event: {e}")).into())
}

/// Maps a CloudWatch event to a normalized entry.
///
/// JSON messages contribute their `level`, `region` and `message` fields;
/// anything else is kept verbatim at `info` level.
fn event_to_entry(source: &str, index: usize, event: &FilteredLogEvent) -> LogEntry {
    let millis = event.timestamp().unwrap_or_default();
    let timestamp = millis.saturating_mul(1_000);
    let raw = event.message().unwrap_or_default();

    let id = event
        .event_id()
        .map_or_else(|| format!("{source}-{timestamp}-{index}"), str::to_string);

    let parsed: Option<Value> = serde_json::from_str(raw).ok();
    let field = |name: &str| {
        parsed
            .as_ref()
            .and_then(|v| v.get(name))
            .and_then(Value::as_str)
            .map(str::to_string)
    };

    let mut entry = LogEntry::new(
        id,
        timestamp,
        field("level").unwrap_or_else(|| String::from("info")),
        field("region"),
        field("message").unwrap_or_else(|| raw.to_string()),
    );
    entry.event_message = raw.to_string();
    entry
}

#[async_trait]
impl LogBackend for CloudWatchLogStore {
    fn name(&self) -> &'static str {
        "cloudwatch"
    }

    async fn list_sources(&self) -> Result<Vec<String>> {
        let mut sources = Vec::new();
        let mut next_token: Option<String> = None;

        loop {
            let output = self
                .client
                .describe_log_groups()
                .log_group_name_prefix(&self.prefix)
                .set_next_token(next_token.take())
                .send()
                .await
                .map_err(|e| LogError::backend("cloudwatch", format!("describe log groups error: {e}")))?;

            sources.extend(
                output
                    .log_groups()
                    .iter()
                    .filter_map(|g| g.log_group_name())
                    .filter_map(|name| name.strip_prefix(self.prefix.as_str()))
                    .map(str::to_string),
            );

            match output.next_token() {
                Some(token) if !token.is_empty() => next_token = Some(token.to_string()),
                _ => break,
            }
        }

        sources.sort();
        Ok(sources)
    }

    async fn fetch(&self, source: &str, limit: usize, cursor: Option<&str>) -> Result<LogPage> {
        let (entries, cursor) = self.filter_events(source, limit, cursor, None).await?;
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
        let pattern = format!("\"{}\"", query.replace('"', ""));

        let mut matches = Vec::new();
        for name in &sources {
            let (entries, _) = self
                .filter_events(name, offset.saturating_add(limit), None, Some(pattern.clone()))
                .await?;
            matches.extend(entries);
        }
        matches.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));

        Ok(matches.into_iter().skip(offset).take(limit).collect())
    }
}

#[async_trait]
impl LogWriter for CloudWatchLogStore {
    async fn write(&self, source: &str, entry: &LogEntry) -> Result<()> {
        validate_source_name(source)?;
        let group = self.group(source);
        let event = entry_to_event(entry)?;

        if self.put_event(&group, event.clone()).await? {
            return Ok(());
        }

        self.create_target(&group).await?;
        if self.put_event(&group, event).await? {
            Ok(())
        } else {
            Err(LogError::backend("cloudwatch", format!("log group {group} is missing after creation")).into())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_written_event_reads_back() {
        let entry = LogEntry::new(
            "id-1",
            1_700_000_000_123_456,
            "error",
            Some(String::from("eu-west-1")),
            "Deployment dep-1 failed",
        );

        let event = entry_to_event(&entry).expect("event");
        assert_eq!(event.timestamp(), 1_700_000_000_123);

        let read = FilteredLogEvent::builder()
            .event_id("evt-9")
            .timestamp(event.timestamp())
            .message(event.message())
            .build();
        let back = event_to_entry("deployments.logs", 0, &read);
        assert_eq!(back.body.level, "error");
        assert_eq!(back.body.region.as_deref(), Some("eu-west-1"));
        assert_eq!(back.body.message, "Deployment dep-1 failed");
        assert_eq!(back.timestamp, 1_700_000_000_123_000);
    }

    #[test]
    fn test_json_message_fields() {
        let event = FilteredLogEvent::builder()
            .event_id("evt-1")
            .timestamp(1_700_000_000_000)
            .message(r#"{"level":"error","region":"eu-west-1","message":"boom"}"#)
            .build();

        let entry = event_to_entry("deployments.logs", 0, &event);
        assert_eq!(entry.id, "evt-1");
        assert_eq!(entry.timestamp, 1_700_000_000_000_000);
        assert_eq!(entry.body.level, "error");
        assert_eq!(entry.body.region.as_deref(), Some("eu-west-1"));
        assert_eq!(entry.body.message, "boom");
    }

    #[test]
    fn test_plain_message_without_id() {
        let event = FilteredLogEvent::builder()
            .timestamp(5)
            .message("plain text")
            .build();

        let entry = event_to_entry("app", 3, &event);
        assert_eq!(entry.id, "app-5000-3");
        assert_eq!(entry.body.level, "info");
        assert_eq!(entry.body.message, "plain text");
        assert_eq!(entry.event_message, "plain text");
    }
}
