//! CLI command definitions.
//!
//! This module defines all CLI commands and their arguments using clap.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::credentials::ProviderKind;
use crate::lifecycle::{DEFAULT_MAX_ATTEMPTS, DEFAULT_POLL_INTERVAL_MS};

/// Edgeplane - serverless function deployment and log access.
#[derive(Parser, Debug)]
#[command(name = "edgeplane")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to the functions manifest.
    #[arg(short, long, global = true, env = "EDGEPLANE_MANIFEST")]
    pub manifest: Option<PathBuf>,

    /// Enable verbose output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Diagnostic log format (text, json).
    #[arg(long, global = true, default_value = "text")]
    pub log_format: LogFormat,

    /// Output format (text, json).
    #[arg(long, global = true, default_value = "text")]
    pub output: OutputFormat,

    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Deploy the functions listed in the manifest.
    Deploy {
        /// Wait until the deployment settles.
        #[arg(short, long)]
        wait: bool,

        /// Maximum status polls while waiting.
        #[arg(long, default_value_t = DEFAULT_MAX_ATTEMPTS)]
        max_attempts: u32,

        /// Delay between status polls, in milliseconds.
        #[arg(long, default_value_t = DEFAULT_POLL_INTERVAL_MS)]
        interval_ms: u64,
    },

    /// Show the current state of a deployment.
    Status {
        /// Deployment identifier.
        deployment_id: String,
    },

    /// Wait until a deployment settles.
    Wait {
        /// Deployment identifier.
        deployment_id: String,

        /// Maximum status polls.
        #[arg(long, default_value_t = DEFAULT_MAX_ATTEMPTS)]
        max_attempts: u32,

        /// Delay between status polls, in milliseconds.
        #[arg(long, default_value_t = DEFAULT_POLL_INTERVAL_MS)]
        interval_ms: u64,
    },

    /// Cancel a deployment.
    Cancel {
        /// Deployment identifier.
        deployment_id: String,
    },

    /// Print the bundle the manifest would deploy, without deploying.
    Bundle {
        /// Print file contents, not just paths.
        #[arg(long)]
        contents: bool,

        /// Provider whose bundle layout to build (deno, vercel).
        #[arg(long, env = "EDGEPLANE_PROVIDER", default_value = "deno")]
        provider: ProviderKind,
    },

    /// List log sources.
    Sources,

    /// Show one page of a log source.
    Logs {
        /// Source name.
        source: String,

        /// Maximum entries to return.
        #[arg(short, long, default_value = "100")]
        limit: usize,

        /// Cursor from a previous page.
        #[arg(long)]
        cursor: Option<String>,
    },

    /// Search log messages.
    Search {
        /// Text to search for.
        query: String,

        /// Restrict the search to one source.
        #[arg(short, long)]
        source: Option<String>,

        /// Maximum entries to return.
        #[arg(short, long, default_value = "100")]
        limit: usize,

        /// Entries to skip.
        #[arg(long, default_value = "0")]
        offset: usize,
    },
}

/// Output format options.
#[derive(Debug, Clone, Copy, Default, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text output.
    #[default]
    Text,
    /// JSON output for scripting.
    Json,
}

/// Diagnostic log format options.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum LogFormat {
    /// Human-readable lines.
    #[default]
    Text,
    /// One JSON object per event.
    Json,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_deploy_with_wait() {
        let cli = Cli::try_parse_from(["edgeplane", "deploy", "--wait", "--max-attempts", "3"])
            .expect("parse");
        match cli.command {
            Commands::Deploy {
                wait,
                max_attempts,
                interval_ms,
            } => {
                assert!(wait);
                assert_eq!(max_attempts, 3);
                assert_eq!(interval_ms, DEFAULT_POLL_INTERVAL_MS);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_parse_search_global_flags() {
        let cli = Cli::try_parse_from([
            "edgeplane",
            "search",
            "timeout",
            "--source",
            "function.logs",
            "--output",
            "json",
            "--log-format",
            "json",
        ])
        .expect("parse");

        assert!(matches!(cli.output, OutputFormat::Json));
        assert_eq!(cli.log_format, LogFormat::Json);
        match cli.command {
            Commands::Search {
                query,
                source,
                limit,
                offset,
            } => {
                assert_eq!(query, "timeout");
                assert_eq!(source.as_deref(), Some("function.logs"));
                assert_eq!(limit, 100);
                assert_eq!(offset, 0);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_parse_bundle_provider() {
        let cli = Cli::try_parse_from(["edgeplane", "bundle", "--provider", "vercel", "--contents"])
            .expect("parse");
        match cli.command {
            Commands::Bundle { contents, provider } => {
                assert!(contents);
                assert_eq!(provider, ProviderKind::Vercel);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }
}
