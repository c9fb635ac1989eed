//! CLI module for the edgeplane tool.
//!
//! This module provides the command-line interface for deploying functions
//! and reading their logs.

mod commands;
mod output;

pub use commands::{Cli, Commands, LogFormat, OutputFormat};
pub use output::OutputFormatter;
