//! Functions manifest.
//!
//! A YAML document describing what to deploy:
//!
//! ```yaml
//! project: my-project
//! env:
//!   API_BASE: https://api.example.com
//! functions:
//!   - slug: hello
//!     path: functions/hello.ts
//!   - slug: ping
//!     code: |
//!       export default () => new Response("pong");
//! ```
//!
//! Function paths are resolved relative to the manifest's directory.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::bundle::FunctionDefinition;
use crate::error::{ConfigError, Result};

/// Manifest file names searched for, in order.
pub const DEFAULT_MANIFEST_FILES: &[&str] = &[
    "edgeplane.yaml",
    "edgeplane.yml",
    "functions.yaml",
    "functions.yml",
];

/// One function entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionSpec {
    /// Function slug.
    pub slug: String,
    /// Source file, relative to the manifest.
    #[serde(default)]
    pub path: Option<PathBuf>,
    /// Inline source.
    #[serde(default)]
    pub code: Option<String>,
}

/// Parsed manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    /// Local project identifier.
    pub project: String,
    /// Environment variables passed to the deployment.
    #[serde(default)]
    pub env: BTreeMap<String, String>,
    /// Functions to deploy.
    #[serde(default)]
    pub functions: Vec<FunctionSpec>,
}

impl Manifest {
    /// Loads sources and returns deployable definitions.
    ///
    /// # Errors
    ///
    /// Returns an error if an entry sets both or neither of `path` and
    /// `code`, or if a source file cannot be read.
    pub fn resolve_functions(&self, base_dir: &Path) -> Result<Vec<FunctionDefinition>> {
        self.functions
            .iter()
            .map(|spec| {
                let code = match (&spec.path, &spec.code) {
                    (Some(path), None) => read_source(&base_dir.join(path))?,
                    (None, Some(code)) => code.clone(),
                    (Some(_), Some(_)) => {
                        return Err(ConfigError::invalid(
                            format!("functions.{}", spec.slug),
                            "set either 'path' or 'code', not both",
                        )
                        .into());
                    }
                    (None, None) => {
                        return Err(ConfigError::invalid(
                            format!("functions.{}", spec.slug),
                            "one of 'path' or 'code' is required",
                        )
                        .into());
                    }
                };
                Ok(FunctionDefinition::new(spec.slug.clone(), code))
            })
            .collect()
    }
}

fn read_source(path: &Path) -> Result<String> {
    if !path.exists() {
        return Err(ConfigError::FileNotFound {
            path: path.to_path_buf(),
        }
        .into());
    }

    debug!("Reading function source: {}", path.display());
    std::fs::read_to_string(path).map_err(|e| {
        ConfigError::ParseError {
            message: format!("Failed to read function source: {e}"),
            location: Some(path.display().to_string()),
        }
        .into()
    })
}

/// A manifest and the directory its paths are relative to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadedManifest {
    /// Parsed manifest.
    pub manifest: Manifest,
    /// Directory containing the manifest.
    pub base_dir: PathBuf,
}

impl LoadedManifest {
    /// Resolves the manifest's functions.
    ///
    /// # Errors
    ///
    /// See [`Manifest::resolve_functions`].
    pub fn functions(&self) -> Result<Vec<FunctionDefinition>> {
        self.manifest.resolve_functions(&self.base_dir)
    }
}

/// Loads functions manifests.
#[derive(Debug, Default)]
pub struct ManifestParser;

impl ManifestParser {
    /// Creates a new parser.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Loads a manifest file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load_file(&self, path: impl AsRef<Path>) -> Result<LoadedManifest> {
        let path = path.as_ref();
        info!("Loading manifest from: {}", path.display());

        if !path.exists() {
            return Err(ConfigError::FileNotFound {
                path: path.to_path_buf(),
            }
            .into());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ParseError {
            message: format!("Failed to read file: {e}"),
            location: Some(path.display().to_string()),
        })?;

        let manifest = self.parse_yaml(&content, Some(path))?;
        let base_dir = path
            .parent()
            .map_or_else(|| PathBuf::from("."), Path::to_path_buf);

        Ok(LoadedManifest { manifest, base_dir })
    }

    /// Parses a manifest from YAML.
    ///
    /// # Errors
    ///
    /// Returns an error if the YAML is invalid.
    pub fn parse_yaml(&self, content: &str, source: Option<&Path>) -> Result<Manifest> {
        let manifest: Manifest = serde_yaml::from_str(content).map_err(|e| ConfigError::ParseError {
            message: format!("YAML parse error: {e}"),
            location: source.map(|p| p.display().to_string()),
        })?;

        if manifest.project.trim().is_empty() {
            return Err(ConfigError::missing("project").into());
        }

        debug!(
            "Parsed manifest for project {} ({} functions)",
            manifest.project,
            manifest.functions.len()
        );
        Ok(manifest)
    }
}

/// Finds the manifest in `start_dir` or one of its parents.
///
/// A relative `start_dir` is resolved first so that the walk reaches the
/// real parents, not just the components of the given path.
///
/// # Errors
///
/// Returns an error if no manifest is found.
pub fn find_manifest_file(start_dir: impl AsRef<Path>) -> Result<PathBuf> {
    let start = start_dir
        .as_ref()
        .canonicalize()
        .unwrap_or_else(|_| start_dir.as_ref().to_path_buf());
    let mut current = start.clone();

    loop {
        for filename in DEFAULT_MANIFEST_FILES {
            let candidate = current.join(filename);
            if candidate.exists() {
                info!("Found manifest: {}", candidate.display());
                return Ok(candidate);
            }
        }

        if !current.pop() {
            break;
        }
    }

    Err(ConfigError::FileNotFound {
        path: start.join(DEFAULT_MANIFEST_FILES[0]),
    }
    .into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EdgeplaneError;
    use tempfile::TempDir;

    #[test]
    fn test_parse_manifest() {
        let yaml = r#"
project: shop
env:
  API_BASE: "https://api.example.com"
functions:
  - slug: hello
    path: functions/hello.ts
  - slug: ping
    code: "export default () => new Response('pong');"
"#;
        let manifest = ManifestParser::new().parse_yaml(yaml, None).expect("manifest");

        assert_eq!(manifest.project, "shop");
        assert_eq!(manifest.env.get("API_BASE").map(String::as_str), Some("https://api.example.com"));
        assert_eq!(manifest.functions.len(), 2);
        assert_eq!(manifest.functions[0].path.as_deref(), Some(Path::new("functions/hello.ts")));
    }

    #[test]
    fn test_missing_project_rejected() {
        let err = ManifestParser::new()
            .parse_yaml("project: \"\"\nfunctions: []\n", None)
            .expect_err("empty project");
        assert!(matches!(err, EdgeplaneError::Config(ConfigError::MissingValue { .. })));
    }

    #[test]
    fn test_load_and_resolve_relative_paths() {
        let dir = TempDir::new().expect("temp dir");
        std::fs::create_dir_all(dir.path().join("functions")).expect("mkdir");
        std::fs::write(
            dir.path().join("functions/hello.ts"),
            "export default () => new Response('hi');",
        )
        .expect("write source");
        std::fs::write(
            dir.path().join("edgeplane.yaml"),
            "project: shop\nfunctions:\n  - slug: hello\n    path: functions/hello.ts\n",
        )
        .expect("write manifest");

        let nested = dir.path().join("functions");
        let found = find_manifest_file(&nested).expect("found");
        assert_eq!(found, dir.path().join("edgeplane.yaml"));

        let loaded = ManifestParser::new().load_file(&found).expect("loaded");
        let functions = loaded.functions().expect("functions");
        assert_eq!(functions.len(), 1);
        assert!(functions[0].code.contains("Response('hi')"));
    }

    #[test]
    fn test_relative_start_is_resolved() {
        let path = match find_manifest_file("src") {
            Ok(path) => path,
            Err(EdgeplaneError::Config(ConfigError::FileNotFound { path })) => path,
            Err(e) => panic!("unexpected error: {e}"),
        };
        assert!(path.is_absolute());
    }

    #[test]
    fn test_path_and_code_conflict() {
        let manifest = Manifest {
            project: String::from("p"),
            env: BTreeMap::new(),
            functions: vec![FunctionSpec {
                slug: String::from("x"),
                path: Some(PathBuf::from("x.ts")),
                code: Some(String::from("y")),
            }],
        };
        assert!(manifest.resolve_functions(Path::new(".")).is_err());

        let missing = Manifest {
            functions: vec![FunctionSpec {
                slug: String::from("x"),
                path: Some(PathBuf::from("does-not-exist.ts")),
                code: None,
            }],
            ..manifest
        };
        let err = missing.resolve_functions(Path::new("/nonexistent")).expect_err("missing file");
        assert!(matches!(err, EdgeplaneError::Config(ConfigError::FileNotFound { .. })));
    }
}
