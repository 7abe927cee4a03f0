//! `folio link`

use super::{Project, json_envelope};
use crate::cli::{CliError, LinkArgs, LinkFormat};
use folio_core::manifest::LinksConfig;
use folio_links::LinkResolver;

/// Print a link to a document, formatted as requested.
///
/// # Errors
///
/// Returns a configuration error for an invalid document name or section,
/// or an incomplete `[links]` section.
pub fn execute(args: &LinkArgs) -> Result<String, CliError> {
    let project = Project::load(&args.project)?;
    let resolver = resolver_for(&project.manifest.links)?;
    let link = resolver.resolve(&args.document, args.section.as_deref(), &args.label)?;

    Ok(match args.format {
        LinkFormat::Markdown => link.to_markdown(),
        LinkFormat::Html => link.to_html(),
        LinkFormat::Json => json_envelope(&link)?,
        LinkFormat::Plain => link.url,
    })
}

/// Relative links unless the manifest names a published collection.
fn resolver_for(links: &LinksConfig) -> Result<LinkResolver, CliError> {
    match (&links.root, &links.collection) {
        (Some(root), Some(collection)) => Ok(LinkResolver::collection(root, collection.clone())),
        (None, None) => Ok(LinkResolver::relative()),
        _ => Err(CliError::config_with_help(
            "[links] needs both `root` and `collection`",
            "Set both keys in folio.toml, or remove the section for relative links",
        )),
    }
}
