//! `folio clean`

use super::{Project, json_envelope};
use crate::cli::{CliError, ProjectArgs};
use std::io::ErrorKind;
use tracing::info;

/// Delete the outputs of the selected targets.
///
/// Missing outputs are not an error.
///
/// # Errors
///
/// Returns a configuration error for a bad project and a runtime error if
/// an output cannot be removed.
pub fn execute(targets: &[String], project: &ProjectArgs, json: bool) -> Result<String, CliError> {
    let project = Project::load(project)?;
    let mut removed = Vec::new();

    for target in project.select(targets)? {
        let output = project.root.join(target.output_path());
        match std::fs::remove_file(&output) {
            Ok(()) => {
                info!(task = %target.name(), output = %output.display(), "Removed output");
                removed.push(target.output_path().display().to_string());
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => return Err(folio_core::Error::io(e, Some(output), "remove output").into()),
        }
    }

    if json {
        return json_envelope(serde_json::json!({ "removed": removed }));
    }
    if removed.is_empty() {
        return Ok("Nothing to clean".to_string());
    }
    Ok(removed
        .iter()
        .map(|path| format!("removed {path}"))
        .collect::<Vec<_>>()
        .join("\n"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_removes_only_selected_outputs() {
        let dir = TempDir::new().unwrap();
        for file in ["a.Rmd", "b.Rmd", "a.html", "b.html"] {
            std::fs::write(dir.path().join(file), "").unwrap();
        }
        let args = ProjectArgs {
            directory: Some(dir.path().to_path_buf()),
            config: None,
        };

        assert_eq!(execute(&["a".to_string()], &args, false).unwrap(), "removed a.html");
        assert!(!dir.path().join("a.html").exists());
        assert!(dir.path().join("a.Rmd").exists());
        assert!(dir.path().join("b.html").exists());

        assert_eq!(execute(&["a".to_string()], &args, false).unwrap(), "Nothing to clean");
    }
}
