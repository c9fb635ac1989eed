//! Function bundling.
//!
//! Turns a list of function definitions into an immutable asset bundle: one
//! module per function plus a generated router that dispatches on the first
//! path segment. Validation runs before any asset is produced.
//!
//! The layout depends on the provider:
//!
//! - Deno: `main.ts` served with `Deno.serve`, modules under `functions/`
//! - Vercel: edge handler `api/router.ts`, modules under `api/_functions/`
//!   (not exposed as functions or static files) and a `vercel.json` that
//!   rewrites every path to the handler

mod entrypoint;
mod router;
mod transform;

pub use entrypoint::{render_entrypoint, RouterRuntime};
pub use router::{sanitize_identifier, Route, RouteEntry, RouteTable, HEALTH_SEGMENT, ROUTER_TYPE};
pub use transform::{is_legacy_module, transform_source, LEGACY_EXPORT_MARKER};

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use tracing::debug;

use crate::credentials::ProviderKind;
use crate::error::{Result, ValidationError};

/// Default entrypoint path inside a bundle.
pub const ENTRYPOINT_PATH: &str = "main.ts";

/// Default directory for per-function modules.
pub const FUNCTIONS_DIR: &str = "functions";

/// Edge handler path in a Vercel bundle.
pub const VERCEL_ENTRYPOINT_PATH: &str = "api/router.ts";

/// Module directory in a Vercel bundle.
pub const VERCEL_FUNCTIONS_DIR: &str = "api/_functions";

/// Routing configuration path in a Vercel bundle.
pub const VERCEL_CONFIG_PATH: &str = "vercel.json";

/// Sends every path to the edge handler.
const VERCEL_CONFIG: &str = r#"{
  "rewrites": [{ "source": "/(.*)", "destination": "/api/router" }]
}
"#;

/// A function to deploy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionDefinition {
    /// URL-safe identifier, also the first path segment it is served under.
    pub slug: String,
    /// Source code.
    pub code: String,
}

impl FunctionDefinition {
    /// Creates a function definition.
    pub fn new(slug: impl Into<String>, code: impl Into<String>) -> Self {
        Self {
            slug: slug.into(),
            code: code.into(),
        }
    }
}

/// Asset kind.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssetKind {
    /// Regular file.
    #[default]
    File,
}

/// Asset content encoding.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum AssetEncoding {
    /// UTF-8 text.
    #[default]
    #[serde(rename = "utf-8")]
    Utf8,
}

/// One file of a bundle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Asset {
    /// Asset kind.
    pub kind: AssetKind,
    /// File content.
    pub content: String,
    /// Content encoding.
    pub encoding: AssetEncoding,
}

impl Asset {
    /// Creates a UTF-8 file asset.
    pub fn file(content: impl Into<String>) -> Self {
        Self {
            kind: AssetKind::File,
            content: content.into(),
            encoding: AssetEncoding::Utf8,
        }
    }
}

/// Immutable mapping from relative path to asset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct AssetBundle {
    assets: BTreeMap<String, Asset>,
    #[serde(skip)]
    entrypoint: String,
}

impl AssetBundle {
    /// Path of the entrypoint asset.
    #[must_use]
    pub fn entrypoint(&self) -> &str {
        &self.entrypoint
    }

    /// Looks up an asset by path.
    #[must_use]
    pub fn get(&self, path: &str) -> Option<&Asset> {
        self.assets.get(path)
    }

    /// Iterates assets in path order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Asset)> {
        self.assets.iter().map(|(path, asset)| (path.as_str(), asset))
    }

    /// Returns the asset paths in order.
    #[must_use]
    pub fn paths(&self) -> Vec<&str> {
        self.assets.keys().map(String::as_str).collect()
    }

    /// Number of assets.
    #[must_use]
    pub fn len(&self) -> usize {
        self.assets.len()
    }

    /// Returns true if the bundle has no assets.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.assets.is_empty()
    }
}

/// Returns true if `slug` is non-empty and only contains ASCII letters,
/// digits, `_` or `-`.
#[must_use]
pub fn is_valid_slug(slug: &str) -> bool {
    !slug.is_empty()
        && slug
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'-')
}

/// Validates a batch of definitions.
///
/// # Errors
///
/// Returns the first invalid, reserved or duplicate slug, or empty body,
/// found.
pub fn validate_functions(functions: &[FunctionDefinition]) -> Result<()> {
    let mut seen = HashSet::new();

    for function in functions {
        if !is_valid_slug(&function.slug) {
            return Err(ValidationError::InvalidSlug {
                slug: function.slug.clone(),
            }
            .into());
        }
        if function.slug == HEALTH_SEGMENT {
            return Err(ValidationError::ReservedSlug {
                slug: function.slug.clone(),
            }
            .into());
        }
        if function.code.trim().is_empty() {
            return Err(ValidationError::EmptyCode {
                slug: function.slug.clone(),
            }
            .into());
        }
        if !seen.insert(function.slug.as_str()) {
            return Err(ValidationError::DuplicateSlug {
                slug: function.slug.clone(),
            }
            .into());
        }
    }

    Ok(())
}

/// Builds asset bundles.
#[derive(Debug, Clone)]
pub struct Bundler {
    /// Path of the router module.
    entrypoint_path: &'static str,
    /// Directory of the per-function modules.
    functions_dir: &'static str,
    /// Module directory as imported from the router.
    import_dir: &'static str,
    /// How the router is started.
    runtime: RouterRuntime,
    /// Extra static files, such as provider routing configuration.
    extra: &'static [(&'static str, &'static str)],
}

impl Default for Bundler {
    fn default() -> Self {
        Self::for_provider(ProviderKind::Deno)
    }
}

impl Bundler {
    /// Creates a bundler with the default (Deno) layout.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a bundler with the layout `provider` can run.
    #[must_use]
    pub const fn for_provider(provider: ProviderKind) -> Self {
        match provider {
            ProviderKind::Deno => Self {
                entrypoint_path: ENTRYPOINT_PATH,
                functions_dir: FUNCTIONS_DIR,
                import_dir: "./functions",
                runtime: RouterRuntime::Deno,
                extra: &[],
            },
            ProviderKind::Vercel => Self {
                entrypoint_path: VERCEL_ENTRYPOINT_PATH,
                functions_dir: VERCEL_FUNCTIONS_DIR,
                import_dir: "./_functions",
                runtime: RouterRuntime::VercelEdge,
                extra: &[(VERCEL_CONFIG_PATH, VERCEL_CONFIG)],
            },
        }
    }

    /// Validates `functions` and builds their bundle.
    ///
    /// # Errors
    ///
    /// Returns a validation error if any definition is invalid; no assets
    /// are produced in that case.
    pub fn bundle(&self, functions: &[FunctionDefinition]) -> Result<AssetBundle> {
        validate_functions(functions)?;

        let mut assets = BTreeMap::new();
        for function in functions {
            let path = format!("{}/{}.ts", self.functions_dir, function.slug);
            let content = transform_source(&function.slug, &function.code);
            debug!(
                "Bundled {} ({} bytes, legacy: {})",
                path,
                content.len(),
                is_legacy_module(&function.code)
            );
            assets.insert(path, Asset::file(content));
        }

        let table = RouteTable::new(functions.iter().map(|f| f.slug.clone()));
        assets.insert(
            self.entrypoint_path.to_string(),
            Asset::file(render_entrypoint(&table, self.import_dir, self.runtime)),
        );
        for (path, content) in self.extra {
            assets.insert((*path).to_string(), Asset::file(*content));
        }

        Ok(AssetBundle {
            assets,
            entrypoint: self.entrypoint_path.to_string(),
        })
    }
}
