//! `folio build`

use super::{Project, json_envelope};
use crate::cli::{BuildArgs, CliError};
use folio_core::{
    BuildPlan, BuildReport, ExecutorConfig, FailurePolicy, RenderCommand, TargetOutcome,
    TaskExecutor,
};
use serde::Serialize;
use std::fmt::Write as _;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Build the requested targets, or every discovered target.
///
/// # Errors
///
/// Returns a configuration error for a bad project or plan, a render error
/// when any document fails, and [`CliError::Interrupted`] when `cancel` fires.
pub async fn execute(
    args: &BuildArgs,
    json: bool,
    cancel: CancellationToken,
) -> Result<String, CliError> {
    let project = Project::load(&args.project)?;
    let config = executor_config(&project, args);
    debug!(?config, "Resolved build configuration");

    let catalog = project.manifest.discover_targets(&project.root)?;
    let plan = if args.targets.is_empty() {
        BuildPlan::new(catalog)?
    } else {
        let requested = project.select(&args.targets)?;
        BuildPlan::for_requested(requested, |name| {
            catalog.iter().find(|t| t.name() == name).cloned()
        })?
    };
    if plan.is_empty() {
        info!(root = %project.root.display(), "Nothing to build");
    }

    let executor = TaskExecutor::new(config).with_cancellation(cancel);
    let report = executor.execute_plan(&plan).await?;

    if !report.is_success() {
        return Err(collected_failures(&report));
    }
    if json {
        json_envelope(BuildSummary::from(&report))
    } else {
        Ok(format_report(&report))
    }
}

/// Manifest settings with command-line overrides applied.
fn executor_config(project: &Project, args: &BuildArgs) -> ExecutorConfig {
    let mut config = project.manifest.executor_config(&project.root);

    match &args.renderer {
        Some(program) => {
            config.command = RenderCommand::new(program).with_args(args.renderer_args.clone());
        }
        None if !args.renderer_args.is_empty() => {
            config.command = RenderCommand::new(config.command.program())
                .with_args(args.renderer_args.clone());
        }
        None => {}
    }
    if let Some(jobs) = args.jobs {
        config.jobs = jobs;
    }
    if args.collect_all {
        config.failure = FailurePolicy::CollectAll;
    }
    if let Some(freshness) = args.freshness {
        config.freshness = freshness.into();
    }
    if let Some(secs) = args.timeout {
        config.timeout = Some(Duration::from_secs(secs));
    }
    if let Some(dir) = &args.log_dir {
        config.log_dir = Some(dir.clone());
    }
    config
}

fn outcome_line(outcome: &TargetOutcome) -> String {
    match outcome {
        TargetOutcome::Skipped { reason } => format!("skipped ({reason})"),
        TargetOutcome::Compiled(result) => result.label().to_string(),
    }
}

fn format_report(report: &BuildReport) -> String {
    let mut out = String::new();
    for entry in report.entries() {
        let _ = writeln!(out, "{}: {}", entry.target.name(), outcome_line(&entry.outcome));
    }
    let _ = write!(
        out,
        "{} rendered, {} cached, {} failed, {} skipped in {:.2}s",
        report.succeeded(),
        report.cached(),
        report.failed(),
        report.skipped(),
        report.duration().as_secs_f64()
    );
    out
}

/// A report with failures under collect-all, as one render error.
fn collected_failures(report: &BuildReport) -> CliError {
    let mut message = format!(
        "{} of {} documents failed to render\n\n{}",
        report.failed(),
        report.entries().len(),
        format_report(report)
    );
    for (target, log) in report.failures() {
        let _ = write!(
            message,
            "\n\nRendering {} failed:\n{}",
            target.source_path().display(),
            log.join("\n")
        );
    }
    CliError::render(message)
}

#[derive(Debug, Serialize)]
struct BuildSummary<'a> {
    targets: Vec<TargetSummary<'a>>,
    rendered: usize,
    cached: usize,
    failed: usize,
    skipped: usize,
    duration_ms: u64,
}

#[derive(Debug, Serialize)]
struct TargetSummary<'a> {
    name: &'a str,
    output: String,
    outcome: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    reason: Option<&'a str>,
}

impl<'a> From<&'a BuildReport> for BuildSummary<'a> {
    fn from(report: &'a BuildReport) -> Self {
        let targets = report
            .entries()
            .iter()
            .map(|entry| TargetSummary {
                name: entry.target.name(),
                output: entry.target.output_path().display().to_string(),
                outcome: entry.outcome.label(),
                reason: match &entry.outcome {
                    TargetOutcome::Skipped { reason } => Some(reason.as_str()),
                    TargetOutcome::Compiled(_) => None,
                },
            })
            .collect();
        Self {
            targets,
            rendered: report.succeeded(),
            cached: report.cached(),
            failed: report.failed(),
            skipped: report.skipped(),
            duration_ms: u64::try_from(report.duration().as_millis()).unwrap_or(u64::MAX),
        }
    }
}
