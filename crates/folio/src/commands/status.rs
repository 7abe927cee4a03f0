//! `folio status`

use super::{Project, json_envelope};
use crate::cli::{CliError, ProjectArgs};
use folio_core::ArtifactCache;
use serde::Serialize;

#[derive(Debug, Serialize)]
struct TargetStatus {
    name: String,
    source: String,
    output: String,
    fresh: bool,
}

/// Report whether each target's output is up to date.
///
/// # Errors
///
/// Returns a configuration error for a bad project and a runtime error if
/// an output cannot be checked.
pub fn execute(targets: &[String], project: &ProjectArgs, json: bool) -> Result<String, CliError> {
    let project = Project::load(project)?;
    let cache = ArtifactCache::on_disk(&project.root, project.manifest.build.freshness);

    let statuses = project
        .select(targets)?
        .into_iter()
        .map(|target| -> Result<TargetStatus, folio_core::Error> {
            Ok(TargetStatus {
                fresh: cache.is_fresh(&target)?,
                name: target.name().to_string(),
                source: target.source_path().display().to_string(),
                output: target.output_path().display().to_string(),
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    if json {
        return json_envelope(statuses);
    }
    Ok(statuses
        .iter()
        .map(|s| {
            let state = if s.fresh { "fresh" } else { "stale" };
            format!("{}: {state} ({})", s.name, s.output)
        })
        .collect::<Vec<_>>()
        .join("\n"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_fresh_and_stale() {
        let dir = TempDir::new().unwrap();
        for file in ["a.Rmd", "b.Rmd", "a.html"] {
            std::fs::write(dir.path().join(file), "").unwrap();
        }
        let args = ProjectArgs {
            directory: Some(dir.path().to_path_buf()),
            config: None,
        };

        let text = execute(&[], &args, false).unwrap();
        assert_eq!(text, "a: fresh (a.html)\nb: stale (b.html)");
        assert!(!dir.path().join("b.html").exists());

        let json: serde_json::Value =
            serde_json::from_str(&execute(&["b".to_string()], &args, true).unwrap()).unwrap();
        assert_eq!(json["status"], "ok");
        assert_eq!(json["data"][0]["name"], "b");
        assert_eq!(json["data"][0]["fresh"], false);
    }
}
