//! Output formatting for CLI commands.
//!
//! This module provides formatting utilities for displaying
//! information to the user in various formats.

use chrono::{DateTime, Utc};
use colored::Colorize;
use serde::Serialize;
use std::fmt::Write;
use tabled::{Table, Tabled};

use crate::bundle::AssetBundle;
use crate::lifecycle::DeploymentOutcome;
use crate::logs::{LogPage, LogSource};
use crate::provider::{Deployment, DeploymentStatus};

use super::commands::OutputFormat;

/// Output formatter for CLI.
#[derive(Debug)]
pub struct OutputFormatter {
    /// Output format.
    format: OutputFormat,
}

/// Log entry row for table display.
#[derive(Tabled)]
struct LogRow {
    #[tabled(rename = "Time")]
    time: String,
    #[tabled(rename = "Level")]
    level: String,
    #[tabled(rename = "Region")]
    region: String,
    #[tabled(rename = "Message")]
    message: String,
}

/// Log source row for table display.
#[derive(Tabled)]
struct SourceRow {
    #[tabled(rename = "Source")]
    name: String,
    #[tabled(rename = "Backend")]
    backend: String,
}

/// Bundle file row for table display.
#[derive(Tabled)]
struct BundleRow {
    #[tabled(rename = "Path")]
    path: String,
    #[tabled(rename = "Bytes")]
    size: usize,
}

impl OutputFormatter {
    /// Creates a new output formatter.
    #[must_use]
    pub const fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    fn json<T: Serialize + ?Sized>(value: &T) -> String {
        serde_json::to_string_pretty(value).unwrap_or_default()
    }

    /// Formats a deployment.
    #[must_use]
    pub fn format_deployment(&self, deployment: &Deployment) -> String {
        match self.format {
            OutputFormat::Json => Self::json(deployment),
            OutputFormat::Text => {
                let mut output = String::new();
                let _ = writeln!(output, "\nDeployment {}", deployment.id.bold());
                let _ = writeln!(output, "   Project: {}", deployment.provider_project_id);
                let _ = writeln!(output, "   Status:  {}", Self::format_status(deployment.status));
                let _ = writeln!(output, "   Created: {}", deployment.created_at.format("%Y-%m-%d %H:%M:%S"));
                if let Some(url) = deployment.live_url() {
                    let _ = writeln!(output, "   URL:     {url}");
                }
                output
            }
        }
    }

    /// Formats the terminal outcome of waiting on a deployment.
    #[must_use]
    pub fn format_outcome(&self, outcome: &DeploymentOutcome) -> String {
        match self.format {
            OutputFormat::Json => Self::json(outcome),
            OutputFormat::Text => {
                let mut output = match outcome.status {
                    DeploymentStatus::Success => {
                        format!("{} Deployment {} is live\n", "✓".green(), outcome.deployment_id)
                    }
                    _ => format!("{} Deployment {} failed\n", "✗".red(), outcome.deployment_id),
                };

                if let Some(url) = &outcome.url {
                    let _ = writeln!(output, "   URL: {url}");
                }

                if !outcome.build_logs.is_empty() {
                    let _ = write!(output, "\n{} Build logs:\n", "⚠".yellow());
                    for line in &outcome.build_logs {
                        let _ = writeln!(output, "   {line}");
                    }
                }

                output
            }
        }
    }

    /// Formats a bundle listing.
    #[must_use]
    pub fn format_bundle(&self, bundle: &AssetBundle, contents: bool) -> String {
        match self.format {
            OutputFormat::Json => Self::json(bundle),
            OutputFormat::Text => {
                let mut output = format!("\nBundle (entrypoint: {})\n\n", bundle.entrypoint());

                let rows: Vec<BundleRow> = bundle
                    .iter()
                    .map(|(path, asset)| BundleRow {
                        path: path.to_string(),
                        size: asset.content.len(),
                    })
                    .collect();
                output.push_str(&Table::new(rows).to_string());
                output.push('\n');

                if contents {
                    for (path, asset) in bundle.iter() {
                        let _ = write!(output, "\n--- {} ---\n{}\n", path.cyan(), asset.content);
                    }
                }

                output
            }
        }
    }

    /// Formats the list of log sources.
    #[must_use]
    pub fn format_sources(&self, sources: &[LogSource]) -> String {
        match self.format {
            OutputFormat::Json => Self::json(sources),
            OutputFormat::Text => {
                if sources.is_empty() {
                    return String::from("No log sources found.\n");
                }

                let rows: Vec<SourceRow> = sources
                    .iter()
                    .map(|s| SourceRow {
                        name: s.name.clone(),
                        backend: s.backend.clone(),
                    })
                    .collect();
                format!("{}\n", Table::new(rows))
            }
        }
    }

    /// Formats a page of log entries.
    #[must_use]
    pub fn format_logs(&self, page: &LogPage) -> String {
        match self.format {
            OutputFormat::Json => Self::json(page),
            OutputFormat::Text => {
                if page.entries.is_empty() {
                    return String::from("No log entries.\n");
                }

                let rows: Vec<LogRow> = page
                    .entries
                    .iter()
                    .map(|e| LogRow {
                        time: Self::format_micros(e.timestamp),
                        level: Self::format_level(&e.body.level),
                        region: e.body.region.clone().unwrap_or_default(),
                        message: Self::truncate(&e.event_message, 100),
                    })
                    .collect();

                let mut output = Table::new(rows).to_string();
                output.push('\n');
                if let Some(cursor) = page.cursor.as_deref().filter(|_| page.has_more) {
                    let _ = writeln!(output, "\nMore entries available: --cursor {cursor}");
                }
                output
            }
        }
    }

    /// Formats a deployment status with color.
    fn format_status(status: DeploymentStatus) -> String {
        match status {
            DeploymentStatus::Success => "success".green().to_string(),
            DeploymentStatus::Pending => "pending".yellow().to_string(),
            DeploymentStatus::Failed => "failed".red().to_string(),
        }
    }

    /// Formats a log level with color.
    fn format_level(level: &str) -> String {
        match level.to_ascii_lowercase().as_str() {
            "error" | "fatal" => level.red().to_string(),
            "warn" | "warning" => level.yellow().to_string(),
            "debug" | "trace" => level.dimmed().to_string(),
            _ => level.to_string(),
        }
    }

    fn format_micros(micros: i64) -> String {
        DateTime::<Utc>::from_timestamp_micros(micros)
            .map_or_else(|| micros.to_string(), |t| t.format("%Y-%m-%d %H:%M:%S%.3f").to_string())
    }

    /// Truncates a string to a maximum number of characters.
    fn truncate(s: &str, max_len: usize) -> String {
        if s.chars().count() <= max_len {
            s.to_string()
        } else {
            let head: String = s.chars().take(max_len.saturating_sub(3)).collect();
            format!("{head}...")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logs::LogEntry;

    #[test]
    fn test_json_logs_keep_cursor() {
        let page = LogPage::new(
            vec![LogEntry::new("1", 1_700_000_000_000_000, "info", None, "hello")],
            Some(String::from("abc")),
        );
        let out = OutputFormatter::new(OutputFormat::Json).format_logs(&page);
        let value: serde_json::Value = serde_json::from_str(&out).expect("json");

        assert_eq!(value["cursor"], "abc");
        assert_eq!(value["entries"][0]["eventMessage"], "hello");
    }

    #[test]
    fn test_text_outcome_lists_build_logs() {
        let outcome = DeploymentOutcome {
            deployment_id: String::from("d1"),
            status: DeploymentStatus::Failed,
            url: None,
            build_logs: vec![String::from("error: syntax")],
        };
        let out = OutputFormatter::new(OutputFormat::Text).format_outcome(&outcome);

        assert!(out.contains("d1"));
        assert!(out.contains("error: syntax"));
    }

    #[test]
    fn test_truncate_is_char_safe() {
        assert_eq!(OutputFormatter::truncate("héllo wörld", 8), "héllo...");
        assert_eq!(OutputFormatter::truncate("short", 8), "short");
    }
}
