//! Configuration.
//!
//! This module handles:
//! - Process settings from environment variables and `.env` files
//! - Parsing the YAML functions manifest and resolving function sources

mod manifest;
mod settings;

pub use manifest::{
    find_manifest_file, FunctionSpec, LoadedManifest, Manifest, ManifestParser,
    DEFAULT_MANIFEST_FILES,
};
pub use settings::{
    keys, BrokerSettings, HttpSettings, LogSettings, Mode, ProviderSettings, Settings,
    DEFAULT_LOCAL_PROJECT,
};
