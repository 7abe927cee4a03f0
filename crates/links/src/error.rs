//! Error types for folio-links

use miette::Diagnostic;
use thiserror::Error;

/// Errors raised while resolving a link
#[derive(Error, Debug, Diagnostic, PartialEq, Eq)]
pub enum Error {
    /// The document name or section cannot form a link
    #[error("Invalid link: {reason}")]
    #[diagnostic(
        code(folio::links::invalid),
        help("Document names are bare file stems such as `intro`; sections are heading text")
    )]
    InvalidLink {
        /// What was wrong with the input
        reason: String,
    },
}

impl Error {
    /// Create an invalid link error
    #[must_use]
    pub fn invalid_link(reason: impl Into<String>) -> Self {
        Self::InvalidLink {
            reason: reason.into(),
        }
    }
}

/// Result type for link resolution
pub type Result<T> = std::result::Result<T, Error>;
