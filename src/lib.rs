// ============================================================================
// Strict linting - Dangerous or non-idiomatic practices are forbidden
// ============================================================================

#![deny(unsafe_code)]                 // Unsafe code is forbidden
#![deny(missing_docs)]                // All public items must be documented
#![deny(non_camel_case_types)]        // Types must follow CamelCase convention

// Additional strictness - Leave nothing unchecked
#![deny(unused_must_use)]             // Must handle Result and Option explicitly
#![deny(non_snake_case)]              // Variables and functions must be snake_case
#![deny(non_upper_case_globals)]      // Constants must be UPPER_CASE
#![deny(nonstandard_style)]           // Non-standard code style is forbidden
#![forbid(unsafe_op_in_unsafe_fn)]    // Unsafe ops in unsafe fns are forbidden

// Clippy lints (warnings only)
#![warn(clippy::all)]                 // All standard Clippy lints
#![warn(clippy::pedantic)]            // Very strict Clippy lints
#![warn(clippy::nursery)]             // Experimental lints
#![warn(clippy::unwrap_used)]         // unwrap() warning
#![warn(clippy::expect_used)]         // expect() warning
#![warn(clippy::panic)]               // panic!() warning
#![warn(clippy::print_stdout)]        // println!() warning
#![warn(clippy::todo)]                // TODO warning
#![warn(clippy::unimplemented)]       // unimplemented!() warning
#![warn(clippy::missing_const_for_fn)] // Force const when possible
#![warn(clippy::unwrap_in_result)]    // unwrap() in Result warning
#![warn(clippy::module_inception)]    // Module with same name as crate warning
#![warn(clippy::redundant_clone)]     // Useless clones warning
#![warn(clippy::shadow_unrelated)]    // Shadowing unrelated variables warning
#![warn(clippy::too_many_arguments)]  // Limit function arguments
#![warn(clippy::cognitive_complexity)] // Limit cognitive complexity

// Safety and robustness lints
#![deny(overflowing_literals)]        // Overflowing literals are forbidden
#![deny(arithmetic_overflow)]         // Arithmetic overflow is forbidden

// ============================================================================
// Crate Documentation
// ============================================================================

//! # Edgeplane
//!
//! Serverless function deployment and unified log access for a
//! backend-as-a-service control plane.
//!
//! ## Overview
//!
//! Edgeplane takes a set of user functions, bundles them behind a single
//! generated router, and ships the bundle to a hosting provider:
//!
//! - Deno Deploy (assets uploaded inline with the deployment)
//! - Vercel (files uploaded by content hash, then referenced)
//!
//! It then polls the deployment to a terminal state and, on failure,
//! surfaces the provider's build logs. Logs from the platform's own store
//! and from the provider's runtime are queried through one interface.
//!
//! ## Modules
//!
//! - [`config`]: Environment settings and the functions manifest
//! - [`credentials`]: Per-provider credential managers (static or broker-issued)
//! - [`http`]: Timeout and retry wrapper for outbound calls
//! - [`bundle`]: Code transform, router generation and asset bundling
//! - [`provider`]: Provider API clients
//! - [`lifecycle`]: Deploy, poll and cancel
//! - [`logs`]: Log stores, runtime logs and the aggregator
//! - [`services`]: Wiring built once at start
//! - [`cli`]: Command-line interface
//!
//! ## Example
//!
//! ```yaml
//! project: my-project
//! env:
//!   API_BASE: https://api.example.com
//! functions:
//!   - slug: hello
//!     path: functions/hello.ts
//! ```

// ============================================================================
// Modules
// ============================================================================

pub mod bundle;
pub mod cli;
pub mod config;
pub mod credentials;
pub mod error;
pub mod http;
pub mod lifecycle;
pub mod logs;
pub mod provider;
pub mod services;

// ============================================================================
// Re-exports
// ============================================================================

pub use bundle::{AssetBundle, Bundler, FunctionDefinition};
pub use cli::{Cli, Commands, OutputFormatter};
pub use config::{Manifest, ManifestParser, Settings};
pub use credentials::{CredentialManager, ProviderCredentials, ProviderKind};
pub use error::{EdgeplaneError, Result};
pub use lifecycle::{DeploymentController, DeploymentOutcome, WaitOptions};
pub use logs::{LogAggregator, LogBackend, LogEntry, LogPage, LogSource};
pub use provider::{DenoClient, Deployment, DeploymentProvider, DeploymentStatus, VercelClient};
pub use services::Services;
