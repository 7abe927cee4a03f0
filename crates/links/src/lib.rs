// Rust 1.92 compiler bug: false positives for thiserror/miette derive macro fields
// https://github.com/rust-lang/rust/issues/147648
#![allow(unused_assignments)]

//! Cross-document links for folio.
//!
//! A [`LinkResolver`] turns a document name and an optional section heading
//! into the URL of the rendered page, using a [`BaseUrlProvider`] to decide
//! where documents live.
//!
//! ```
//! use folio_links::LinkResolver;
//!
//! let resolver = LinkResolver::relative();
//! let link = resolver.resolve("intro", Some("Getting Started"), "Start here").unwrap();
//! assert_eq!(link.url, "intro.html#getting-started");
//! assert_eq!(link.to_markdown(), "[Start here](intro.html#getting-started)");
//! ```

mod error;

pub use error::{Error, Result};

use serde::Serialize;
use std::fmt;
use tracing::trace;

/// Extension of rendered documents.
const PAGE_EXTENSION: &str = "html";

/// Maps a document name to the URL of its page, without the extension.
pub trait BaseUrlProvider: Send + Sync {
    /// Base URL for `document`.
    fn base_url(&self, document: &str) -> String;
}

/// Links relative to the current page: the document name is the base URL.
#[derive(Debug, Clone, Copy, Default)]
pub struct RelativeBaseUrl;

impl BaseUrlProvider for RelativeBaseUrl {
    fn base_url(&self, document: &str) -> String {
        document.to_string()
    }
}

/// Documents published as a named collection under a site root.
///
/// `base_url("intro")` is `<root>/<collection>/intro`.
#[derive(Debug, Clone)]
pub struct CollectionBaseUrl {
    root: String,
    collection: String,
}

impl CollectionBaseUrl {
    /// Collection `collection` under `root`. Trailing slashes of `root` are dropped.
    pub fn new(root: impl AsRef<str>, collection: impl Into<String>) -> Self {
        Self {
            root: root.as_ref().trim_end_matches('/').to_string(),
            collection: collection.into(),
        }
    }
}

impl BaseUrlProvider for CollectionBaseUrl {
    fn base_url(&self, document: &str) -> String {
        format!("{}/{}/{document}", self.root, self.collection)
    }
}

/// A resolved hyperlink.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Link {
    /// Target URL
    pub url: String,
    /// Display text
    pub label: String,
}

impl Link {
    /// Markdown form: `[label](url)`.
    #[must_use]
    pub fn to_markdown(&self) -> String {
        format!("[{}]({})", self.label, self.url)
    }

    /// HTML anchor element with the label escaped.
    #[must_use]
    pub fn to_html(&self) -> String {
        format!(
            "<a href=\"{}\">{}</a>",
            escape_html(&self.url),
            escape_html(&self.label)
        )
    }
}

impl fmt::Display for Link {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_markdown())
    }
}

/// Builds [`Link`]s to rendered documents.
pub struct LinkResolver {
    provider: Box<dyn BaseUrlProvider>,
}

impl fmt::Debug for LinkResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LinkResolver").finish_non_exhaustive()
    }
}

impl Default for LinkResolver {
    fn default() -> Self {
        Self::relative()
    }
}

impl LinkResolver {
    /// Resolver using `provider` for base URLs.
    pub fn new(provider: impl BaseUrlProvider + 'static) -> Self {
        Self {
            provider: Box::new(provider),
        }
    }

    /// Resolver producing page-relative links.
    #[must_use]
    pub fn relative() -> Self {
        Self::new(RelativeBaseUrl)
    }

    /// Resolver for a published collection under `root`.
    pub fn collection(root: impl AsRef<str>, collection: impl Into<String>) -> Self {
        Self::new(CollectionBaseUrl::new(root, collection))
    }

    /// Link to `document`, optionally to one of its sections.
    ///
    /// The section is matched to the anchor the renderer generates for a
    /// heading: runs of spaces become one hyphen and the text is lower-cased.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidLink`] if the document name is empty or
    /// contains a path separator, `#`, or a control character, or if the
    /// section is blank or contains one of those characters.
    pub fn resolve(&self, document: &str, section: Option<&str>, label: &str) -> Result<Link> {
        validate_part("document name", document)?;
        let mut url = format!("{}.{PAGE_EXTENSION}", self.provider.base_url(document));

        if let Some(section) = section {
            validate_part("section", section)?;
            if section.trim_matches(' ').is_empty() {
                return Err(Error::invalid_link("section is blank"));
            }
            url.push('#');
            url.push_str(&normalize_section(section));
        }

        trace!(document, ?section, url = %url, "Resolved link");
        Ok(Link {
            url,
            label: label.to_string(),
        })
    }
}

/// Anchor for a section heading: each run of spaces becomes a single `-`,
/// then everything is lower-cased.
#[must_use]
pub fn normalize_section(section: &str) -> String {
    let mut anchor = String::with_capacity(section.len());
    let mut in_spaces = false;
    for c in section.chars() {
        if c == ' ' {
            if !in_spaces {
                anchor.push('-');
            }
            in_spaces = true;
        } else {
            anchor.extend(c.to_lowercase());
            in_spaces = false;
        }
    }
    anchor
}

fn validate_part(what: &str, value: &str) -> Result<()> {
    if value.is_empty() {
        return Err(Error::invalid_link(format!("{what} is empty")));
    }
    if let Some(c) = value
        .chars()
        .find(|&c| matches!(c, '/' | '\\' | '#') || c.is_control())
    {
        return Err(Error::invalid_link(format!(
            "{what} '{}' contains {c:?}",
            value.escape_debug()
        )));
    }
    Ok(())
}

fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}
