//! Command implementations.
//!
//! Each command returns the text to print on stdout; errors are rendered by
//! the caller.

pub mod build;
pub mod clean;
pub mod link;
pub mod status;

use crate::cli::{CliError, OkEnvelope, ProjectArgs};
use folio_core::{MANIFEST_FILE, Manifest, Target};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::debug;

/// A loaded project: its directory and manifest.
#[derive(Debug, Clone)]
pub struct Project {
    /// Directory holding the source documents
    pub root: PathBuf,
    /// Parsed manifest, or defaults when there is none
    pub manifest: Manifest,
}

impl Project {
    /// Load the project described by `args`.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the directory is missing or the
    /// manifest is invalid.
    pub fn load(args: &ProjectArgs) -> Result<Self, CliError> {
        let root = match &args.directory {
            Some(dir) => dir.clone(),
            None => std::env::current_dir().map_err(|e| {
                CliError::other(format!("Cannot determine the current directory: {e}"))
            })?,
        };
        if !root.is_dir() {
            return Err(CliError::config(format!(
                "Project directory {} does not exist",
                root.display()
            )));
        }

        let manifest = match &args.config {
            Some(path) => Manifest::load(&resolve(&root, path)).map_err(|e| match e {
                folio_core::Error::Io { .. } => CliError::config_with_help(
                    format!("Cannot read manifest {}", path.display()),
                    format!("Pass an existing file to --config or create {MANIFEST_FILE}"),
                ),
                other => other.into(),
            })?,
            None => Manifest::load_or_default(&root)?,
        };

        debug!(root = %root.display(), "Loaded project");
        Ok(Self { root, manifest })
    }

    /// Targets named on the command line, or every discovered target when
    /// none are named.
    ///
    /// # Errors
    ///
    /// Returns a configuration error for invalid names.
    pub fn select(&self, requested: &[String]) -> Result<Vec<Target>, CliError> {
        if requested.is_empty() {
            return Ok(self.manifest.discover_targets(&self.root)?);
        }
        requested
            .iter()
            .map(|arg| self.manifest.target_from_arg(arg).map_err(CliError::from))
            .collect()
    }
}

fn resolve(root: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() || path.exists() {
        path.to_path_buf()
    } else {
        root.join(path)
    }
}

/// Serialize `data` inside an [`OkEnvelope`].
///
/// # Errors
///
/// Returns an error if serialization fails.
pub fn json_envelope<T: Serialize>(data: T) -> Result<String, CliError> {
    serde_json::to_string(&OkEnvelope::new(data))
        .map_err(|e| CliError::other(format!("Failed to serialize output: {e}")))
}
