//! Outcomes of compilation attempts.

use crate::{Error, Target};
use std::time::Duration;

/// Outcome of one compilation attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompilationResult {
    /// The output was already fresh; no process ran
    Cached,
    /// The renderer ran and succeeded
    Success,
    /// The renderer ran and failed; each log line carries a `<target>> ` prefix
    Failed {
        /// Captured renderer output, in write order
        log: Vec<String>,
    },
}

impl CompilationResult {
    /// Whether the target ended up with a usable output.
    #[must_use]
    pub fn is_ok(&self) -> bool {
        matches!(self, Self::Cached | Self::Success)
    }

    /// Short lowercase label used in status output.
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Self::Cached => "cached",
            Self::Success => "rendered",
            Self::Failed { .. } => "failed",
        }
    }
}

/// Outcome of one target within a multi-target build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TargetOutcome {
    /// The target was compiled (or found fresh)
    Compiled(CompilationResult),
    /// The target was not attempted
    Skipped {
        /// Why it was not attempted
        reason: String,
    },
}

impl TargetOutcome {
    /// Short lowercase label used in status output.
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Self::Compiled(result) => result.label(),
            Self::Skipped { .. } => "skipped",
        }
    }
}

/// One line of a [`BuildReport`].
#[derive(Debug, Clone)]
pub struct ReportEntry {
    /// The target this entry describes
    pub target: Target,
    /// What happened to it
    pub outcome: TargetOutcome,
}

/// Per-target outcomes of a build, in execution order.
#[derive(Debug, Clone, Default)]
pub struct BuildReport {
    entries: Vec<ReportEntry>,
    duration: Duration,
}

impl BuildReport {
    pub(crate) fn push(&mut self, target: Target, outcome: TargetOutcome) {
        self.entries.push(ReportEntry { target, outcome });
    }

    pub(crate) fn set_duration(&mut self, duration: Duration) {
        self.duration = duration;
    }

    /// All entries in execution order.
    #[must_use]
    pub fn entries(&self) -> &[ReportEntry] {
        &self.entries
    }

    /// Outcome recorded for the target called `name`.
    #[must_use]
    pub fn outcome(&self, name: &str) -> Option<&TargetOutcome> {
        self.entries
            .iter()
            .find(|entry| entry.target.name() == name)
            .map(|entry| &entry.outcome)
    }

    /// Wall-clock time the build took.
    #[must_use]
    pub fn duration(&self) -> Duration {
        self.duration
    }

    /// Number of targets found fresh.
    #[must_use]
    pub fn cached(&self) -> usize {
        self.count(|o| matches!(o, TargetOutcome::Compiled(CompilationResult::Cached)))
    }

    /// Number of targets rendered successfully.
    #[must_use]
    pub fn succeeded(&self) -> usize {
        self.count(|o| matches!(o, TargetOutcome::Compiled(CompilationResult::Success)))
    }

    /// Number of targets whose render failed.
    #[must_use]
    pub fn failed(&self) -> usize {
        self.count(|o| matches!(o, TargetOutcome::Compiled(CompilationResult::Failed { .. })))
    }

    /// Number of targets not attempted.
    #[must_use]
    pub fn skipped(&self) -> usize {
        self.count(|o| matches!(o, TargetOutcome::Skipped { .. }))
    }

    /// Whether every target is cached or rendered.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.failed() == 0 && self.skipped() == 0
    }

    /// Failed targets with their prefixed logs.
    pub fn failures(&self) -> impl Iterator<Item = (&Target, &[String])> {
        self.entries.iter().filter_map(|entry| match &entry.outcome {
            TargetOutcome::Compiled(CompilationResult::Failed { log }) => {
                Some((&entry.target, log.as_slice()))
            }
            _ => None,
        })
    }

    /// The first failure as a [`Error::RenderFailure`], if any target failed.
    #[must_use]
    pub fn first_failure(&self) -> Option<Error> {
        self.failures()
            .next()
            .map(|(target, log)| Error::render_failure(target.name(), target.source_path(), log.to_vec()))
    }

    fn count(&self, pred: impl Fn(&TargetOutcome) -> bool) -> usize {
        self.entries.iter().filter(|entry| pred(&entry.outcome)).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn target(name: &str) -> Target {
        Target::new(name, "Rmd").unwrap()
    }

    #[test]
    fn test_report_counters() {
        let mut report = BuildReport::default();
        report.push(target("a"), TargetOutcome::Compiled(CompilationResult::Cached));
        report.push(target("b"), TargetOutcome::Compiled(CompilationResult::Success));
        report.push(
            target("c"),
            TargetOutcome::Compiled(CompilationResult::Failed {
                log: vec!["c> boom".to_string()],
            }),
        );
        report.push(
            target("d"),
            TargetOutcome::Skipped {
                reason: "dependency 'c' failed".to_string(),
            },
        );

        assert_eq!(report.cached(), 1);
        assert_eq!(report.succeeded(), 1);
        assert_eq!(report.failed(), 1);
        assert_eq!(report.skipped(), 1);
        assert!(!report.is_success());
        assert_eq!(report.outcome("d").unwrap().label(), "skipped");

        let failures: Vec<_> = report.failures().collect();
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].0.name(), "c");

        match report.first_failure().unwrap() {
            Error::RenderFailure {
                target,
                source_path,
                log,
            } => {
                assert_eq!(target, "c");
                assert_eq!(source_path, std::path::PathBuf::from("c.Rmd"));
                assert_eq!(log, vec!["c> boom"]);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_empty_report_is_success() {
        let report = BuildReport::default();
        assert!(report.is_success());
        assert!(report.first_failure().is_none());
    }

    #[test]
    fn test_labels() {
        assert_eq!(CompilationResult::Cached.label(), "cached");
        assert_eq!(CompilationResult::Success.label(), "rendered");
        assert!(!CompilationResult::Failed { log: vec![] }.is_ok());
        assert!(CompilationResult::Success.is_ok());
    }
}
