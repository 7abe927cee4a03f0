//! Error types for folio-core

use miette::Diagnostic;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Main error type for document compilation
#[derive(Error, Debug, Diagnostic)]
pub enum Error {
    /// The freshness of an output could not be determined
    #[error("Failed to check whether {} is up to date: {source}", .path.display())]
    #[diagnostic(
        code(folio::cache::check),
        help("The output state is unknown, so nothing was rendered. Check directory permissions.")
    )]
    CacheCheck {
        /// Output path that was being checked
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// The renderer process could not be started
    #[error("Failed to launch renderer `{command}`: {source}")]
    #[diagnostic(
        code(folio::process::launch),
        help("Make sure the renderer is installed and on PATH, or set [render].command in folio.toml")
    )]
    ProcessLaunch {
        /// The attempted command line
        command: String,
        /// The underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// The renderer ran and reported failure
    #[error("Rendering {} failed:\n{}", .source_path.display(), .log.join("\n"))]
    #[diagnostic(code(folio::render::failed))]
    RenderFailure {
        /// Name of the target that failed
        target: String,
        /// Source document handed to the renderer
        source_path: PathBuf,
        /// Captured renderer output, each line prefixed with the target name
        log: Vec<String>,
    },

    /// Configuration error
    #[error("Configuration error: {message}")]
    #[diagnostic(code(folio::config::invalid))]
    Configuration {
        /// The error message describing the configuration issue
        message: String,
    },

    /// I/O error with path context
    #[error("I/O error during {operation}: {source}")]
    #[diagnostic(code(folio::io::error))]
    Io {
        /// The underlying I/O error
        #[source]
        source: std::io::Error,
        /// The path where the I/O error occurred, if applicable
        path: Option<Box<Path>>,
        /// Description of the operation that failed
        operation: String,
    },

    /// The renderer exceeded its time budget and was killed
    #[error("Rendering '{target}' timed out after {:.3}s", .limit.as_secs_f64())]
    #[diagnostic(
        code(folio::render::timeout),
        help("Raise [build].timeout_secs or pass --timeout")
    )]
    Timeout {
        /// Name of the target that timed out
        target: String,
        /// The configured timeout
        limit: Duration,
    },

    /// The run was cancelled while the target was rendering
    #[error("Rendering '{target}' was cancelled")]
    #[diagnostic(code(folio::render::cancelled))]
    Cancelled {
        /// Name of the target whose render was interrupted
        target: String,
    },
}

impl Error {
    /// Create a configuration error with a message
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Create an I/O error with context
    pub fn io(source: std::io::Error, path: Option<PathBuf>, operation: impl Into<String>) -> Self {
        Self::Io {
            source,
            path: path.map(|p| p.into_boxed_path()),
            operation: operation.into(),
        }
    }

    /// Create a cache check error for an output path
    pub fn cache_check(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::CacheCheck {
            path: path.into(),
            source,
        }
    }

    /// Create a process launch error
    pub fn process_launch(command: impl Into<String>, source: std::io::Error) -> Self {
        Self::ProcessLaunch {
            command: command.into(),
            source,
        }
    }

    /// Create a render failure for a target
    pub fn render_failure(
        target: impl Into<String>,
        source_path: impl Into<PathBuf>,
        log: Vec<String>,
    ) -> Self {
        Self::RenderFailure {
            target: target.into(),
            source_path: source_path.into(),
            log,
        }
    }

    /// Create a timeout error
    pub fn timeout(target: impl Into<String>, limit: Duration) -> Self {
        Self::Timeout {
            target: target.into(),
            limit,
        }
    }

    /// Create a cancellation error
    pub fn cancelled(target: impl Into<String>) -> Self {
        Self::Cancelled {
            target: target.into(),
        }
    }
}

/// Result type for folio-core operations
pub type Result<T> = std::result::Result<T, Error>;
