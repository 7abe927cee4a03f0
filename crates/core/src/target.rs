//! Compilation targets.
//!
//! A [`Target`] names one document. Its source and output paths are derived
//! from the name alone, relative to the working directory.

use crate::{Error, Result};
use std::path::{Path, PathBuf};

/// Extension of every rendered output.
pub const OUTPUT_EXTENSION: &str = "html";

/// A named document to be compiled to an HTML artifact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    name: String,
    source_path: PathBuf,
    output_path: PathBuf,
    depends_on: Vec<String>,
}

impl Target {
    /// Create a target from its name and the source document extension.
    ///
    /// The extension may be given with or without a leading dot.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the name is empty, is `.` or `..`, or
    /// contains path separators or control characters.
    pub fn new(name: impl Into<String>, source_extension: &str) -> Result<Self> {
        let name = name.into();
        validate_name(&name)?;

        let extension = source_extension.trim_start_matches('.');
        if extension.is_empty() {
            return Err(Error::configuration(format!(
                "Target '{name}' has an empty source extension"
            )));
        }

        Ok(Self {
            source_path: PathBuf::from(format!("{name}.{extension}")),
            output_path: PathBuf::from(format!("{name}.{OUTPUT_EXTENSION}")),
            name,
            depends_on: Vec::new(),
        })
    }

    /// Create a target from a command-line argument that may carry the
    /// source extension (`analysis.Rmd` and `analysis` name the same target).
    ///
    /// # Errors
    ///
    /// Same as [`Target::new`].
    pub fn from_arg(arg: &str, source_extension: &str) -> Result<Self> {
        let extension = source_extension.trim_start_matches('.');
        let name = arg
            .strip_suffix(extension)
            .and_then(|stem| stem.strip_suffix('.'))
            .filter(|stem| !stem.is_empty())
            .unwrap_or(arg);
        Self::new(name, source_extension)
    }

    /// Declare the targets that must be compiled before this one.
    #[must_use]
    pub fn with_dependencies(mut self, depends_on: Vec<String>) -> Self {
        self.depends_on = depends_on;
        self
    }

    /// Unique key of the target.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Source document handed to the renderer.
    #[must_use]
    pub fn source_path(&self) -> &Path {
        &self.source_path
    }

    /// Rendered artifact whose presence marks the target as compiled.
    #[must_use]
    pub fn output_path(&self) -> &Path {
        &self.output_path
    }

    /// Names of the targets this one depends on.
    #[must_use]
    pub fn depends_on(&self) -> &[String] {
        &self.depends_on
    }
}

fn validate_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(Error::configuration("Target name must not be empty"));
    }
    if name == "." || name == ".." {
        return Err(Error::configuration(format!(
            "Target name '{name}' is not a document name"
        )));
    }
    if let Some(ch) = name
        .chars()
        .find(|&c| matches!(c, '/' | '\\') || c.is_control())
    {
        return Err(Error::configuration(format!(
            "Target name '{}' contains invalid character {:?}",
            name.escape_debug(),
            ch
        )));
    }
    Ok(())
}
