//! Project manifest (`folio.toml`) and target discovery.

use crate::cache::FreshnessPolicy;
use crate::executor::{ExecutorConfig, FailurePolicy};
use crate::runner::{DEFAULT_RENDERER, DEFAULT_RENDERER_ARGS, RenderCommand};
use crate::{Error, Result, Target};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;
use walkdir::WalkDir;

/// File name of the project manifest.
pub const MANIFEST_FILE: &str = "folio.toml";

/// Default extension of source documents.
pub const DEFAULT_SOURCE_EXTENSION: &str = "Rmd";

/// Project manifest.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default, deny_unknown_fields)]
pub struct Manifest {
    /// Renderer configuration
    pub render: RenderConfig,
    /// Build policies
    pub build: BuildConfig,
    /// Cross-link collection
    pub links: LinksConfig,
    /// Per-target settings keyed by target name
    pub targets: BTreeMap<String, TargetConfig>,
}

/// `[render]` section.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct RenderConfig {
    /// Renderer executable
    pub command: String,
    /// Arguments placed before the source path
    pub args: Vec<String>,
    /// Extension of source documents, without the dot
    pub source_extension: String,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            command: DEFAULT_RENDERER.to_string(),
            args: DEFAULT_RENDERER_ARGS.iter().map(|s| (*s).to_string()).collect(),
            source_extension: DEFAULT_SOURCE_EXTENSION.to_string(),
        }
    }
}

/// `[build]` section.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct BuildConfig {
    /// How output freshness is decided
    pub freshness: FreshnessPolicy,
    /// Behaviour after a failed render
    pub failure: FailurePolicy,
    /// Maximum concurrent renderers
    pub jobs: usize,
    /// Per-target render time limit in seconds
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
    /// Directory for temporary render logs, relative to the project
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_dir: Option<PathBuf>,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            freshness: FreshnessPolicy::default(),
            failure: FailurePolicy::default(),
            jobs: 1,
            timeout_secs: None,
            log_dir: None,
        }
    }
}

/// `[links]` section.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default, deny_unknown_fields)]
pub struct LinksConfig {
    /// Root URL of the documentation site
    #[serde(skip_serializing_if = "Option::is_none")]
    pub root: Option<String>,
    /// Named collection under the root
    #[serde(skip_serializing_if = "Option::is_none")]
    pub collection: Option<String>,
}

/// `[targets.<name>]` section.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default, deny_unknown_fields)]
pub struct TargetConfig {
    /// Targets that must compile first
    pub depends_on: Vec<String>,
}

impl Manifest {
    /// Parse a manifest from TOML text.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the text is not a valid manifest.
    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content)
            .map_err(|e| Error::configuration(format!("Invalid {MANIFEST_FILE}: {e}")))
    }

    /// Load a manifest file.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the file cannot be read, or a configuration
    /// error if it cannot be parsed.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::io(e, Some(path.to_path_buf()), "read manifest"))?;
        let manifest = Self::parse(&content)?;
        debug!(path = %path.display(), targets = manifest.targets.len(), "Loaded manifest");
        Ok(manifest)
    }

    /// Load `folio.toml` from `dir`, or the defaults if there is none.
    ///
    /// # Errors
    ///
    /// See [`Manifest::load`].
    pub fn load_or_default(dir: &Path) -> Result<Self> {
        let path = dir.join(MANIFEST_FILE);
        let exists = path
            .try_exists()
            .map_err(|e| Error::io(e, Some(path.clone()), "locate manifest"))?;
        if exists {
            Self::load(&path)
        } else {
            debug!(dir = %dir.display(), "No manifest found, using defaults");
            Ok(Self::default())
        }
    }

    /// The configured renderer command.
    #[must_use]
    pub fn render_command(&self) -> RenderCommand {
        RenderCommand::new(&self.render.command).with_args(self.render.args.iter().cloned())
    }

    /// Executor configuration for a project rooted at `working_dir`.
    #[must_use]
    pub fn executor_config(&self, working_dir: &Path) -> ExecutorConfig {
        ExecutorConfig {
            command: self.render_command(),
            working_dir: working_dir.to_path_buf(),
            freshness: self.build.freshness,
            failure: self.build.failure,
            jobs: self.build.jobs,
            timeout: self.build.timeout_secs.map(Duration::from_secs),
            log_dir: self.build.log_dir.clone(),
        }
    }

    /// Build the target called `name` with its declared dependencies.
    ///
    /// # Errors
    ///
    /// Returns a configuration error for an invalid name.
    pub fn target(&self, name: &str) -> Result<Target> {
        let target = Target::new(name, &self.render.source_extension)?;
        Ok(match self.targets.get(name) {
            Some(config) => target.with_dependencies(config.depends_on.clone()),
            None => target,
        })
    }

    /// Build the target named by a command-line argument, which may carry
    /// the source extension.
    ///
    /// # Errors
    ///
    /// Returns a configuration error for an invalid name.
    pub fn target_from_arg(&self, arg: &str) -> Result<Target> {
        let name = Target::from_arg(arg, &self.render.source_extension)?;
        self.target(name.name())
    }

    /// Every target of the project: source documents found directly in `dir`
    /// plus targets declared in the manifest, sorted by name.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if `dir` cannot be listed, or a configuration
    /// error if a discovered or declared name is invalid.
    pub fn discover_targets(&self, dir: &Path) -> Result<Vec<Target>> {
        let extension = self.render.source_extension.trim_start_matches('.');
        let mut names: BTreeSet<String> = self.targets.keys().cloned().collect();

        for entry in WalkDir::new(dir).min_depth(1).max_depth(1) {
            let entry = entry.map_err(|e| {
                let path = e.path().map(Path::to_path_buf);
                Error::io(e.into(), path, "list source documents")
            })?;
            if !entry.file_type().is_file() {
                continue;
            }
            let path = entry.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some(extension) {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|stem| stem.to_str()) {
                names.insert(stem.to_string());
            }
        }

        debug!(dir = %dir.display(), count = names.len(), "Discovered targets");
        names.iter().map(|name| self.target(name)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults_when_empty() {
        let manifest = Manifest::parse("").unwrap();
        assert_eq!(manifest, Manifest::default());
        assert_eq!(manifest.render.command, "Rscript");
        assert_eq!(manifest.render.source_extension, "Rmd");
        assert_eq!(manifest.build.jobs, 1);
        assert_eq!(manifest.build.failure, FailurePolicy::FailFast);
        assert_eq!(manifest.build.freshness, FreshnessPolicy::Exists);
    }

    #[test]
    fn test_full_manifest() {
        let manifest = Manifest::parse(
            r#"
[render]
command = "quarto"
args = ["render"]
source_extension = "qmd"

[build]
freshness = "modified"
failure = "collect-all"
jobs = 4
timeout_secs = 120
log_dir = ".folio/logs"

[links]
root = "https://docs.example.org"
collection = "guides"

[targets.analysis]
depends_on = ["setup"]
"#,
        )
        .unwrap();

        assert_eq!(manifest.render.command, "quarto");
        assert_eq!(manifest.build.freshness, FreshnessPolicy::Modified);
        assert_eq!(manifest.build.failure, FailurePolicy::CollectAll);
        assert_eq!(manifest.links.collection.as_deref(), Some("guides"));

        let config = manifest.executor_config(Path::new("/work"));
        assert_eq!(config.command.command_line(&[]), "quarto render");
        assert_eq!(config.jobs, 4);
        assert_eq!(config.timeout, Some(Duration::from_secs(120)));
        assert_eq!(config.log_dir, Some(PathBuf::from(".folio/logs")));

        let analysis = manifest.target("analysis").unwrap();
        assert_eq!(analysis.source_path(), Path::new("analysis.qmd"));
        assert_eq!(analysis.depends_on(), ["setup".to_string()]);
    }

    #[test]
    fn test_unknown_keys_rejected() {
        let err = Manifest::parse("[build]\nretries = 3\n").unwrap_err();
        assert!(matches!(err, Error::Configuration { .. }));

        assert!(Manifest::parse("[build]\nfailure = \"sometimes\"\n").is_err());
    }

    #[test]
    fn test_load_or_default_without_file() {
        let dir = TempDir::new().unwrap();
        let manifest = Manifest::load_or_default(dir.path()).unwrap();
        assert_eq!(manifest, Manifest::default());
    }

    #[test]
    fn test_load_from_file() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join(MANIFEST_FILE), "[build]\njobs = 2\n").unwrap();
        let manifest = Manifest::load_or_default(dir.path()).unwrap();
        assert_eq!(manifest.build.jobs, 2);
    }

    #[test]
    fn test_discover_targets() {
        let dir = TempDir::new().unwrap();
        for file in ["b.Rmd", "a.Rmd", "a.html", "notes.md"] {
            std::fs::write(dir.path().join(file), "").unwrap();
        }
        std::fs::create_dir(dir.path().join("sub.Rmd")).unwrap();
        std::fs::write(dir.path().join("sub.Rmd").join("nested.Rmd"), "").unwrap();

        let manifest =
            Manifest::parse("[targets.b]\ndepends_on = [\"a\"]\n[targets.planned]\n").unwrap();
        let targets = manifest.discover_targets(dir.path()).unwrap();
        let names: Vec<_> = targets.iter().map(Target::name).collect();
        assert_eq!(names, vec!["a", "b", "planned"]);
        assert_eq!(targets[1].depends_on(), ["a".to_string()]);
    }

    #[test]
    fn test_target_from_arg_uses_declared_dependencies() {
        let manifest = Manifest::parse("[targets.b]\ndepends_on = [\"a\"]\n").unwrap();
        let target = manifest.target_from_arg("b.Rmd").unwrap();
        assert_eq!(target.name(), "b");
        assert_eq!(target.depends_on(), ["a".to_string()]);
    }
}
