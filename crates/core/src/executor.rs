//! Task executor: cache check, render, classify.
//!
//! - A fresh output short-circuits to [`CompilationResult::Cached`]
//! - Otherwise the renderer runs once with the source path as its last argument
//! - A failing render yields its captured log, each line prefixed with the target name
//!
//! Multi-target builds follow a [`BuildPlan`] level by level with at most
//! `jobs` renderers running at once.

use crate::cache::{ArtifactCache, FreshnessPolicy};
use crate::outcome::{BuildReport, CompilationResult, TargetOutcome};
use crate::plan::BuildPlan;
use crate::runner::{ExitOutcome, LogSink, ProcessRunner, RenderCommand, SubprocessRunner};
use crate::{Error, Result, Target};
use futures::stream::{FuturesUnordered, StreamExt};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::{Arc, PoisonError};
use std::time::{Duration, Instant};
use tokio::sync::{Mutex, Semaphore};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Separator between the target name and each captured log line.
pub const LOG_PREFIX_SEPARATOR: &str = "> ";

/// What a multi-target build does after a render fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FailurePolicy {
    /// Stop at the first failure and cancel renders still running
    #[default]
    FailFast,
    /// Attempt every target whose dependencies compiled and report all failures
    CollectAll,
}

impl std::str::FromStr for FailurePolicy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "fail-fast" | "failfast" => Ok(Self::FailFast),
            "collect-all" | "collectall" => Ok(Self::CollectAll),
            _ => Err(format!(
                "Unknown failure policy: {s} (expected 'fail-fast' or 'collect-all')"
            )),
        }
    }
}

impl std::fmt::Display for FailurePolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::FailFast => write!(f, "fail-fast"),
            Self::CollectAll => write!(f, "collect-all"),
        }
    }
}

/// Task executor configuration
#[derive(Debug, Clone)]
pub struct ExecutorConfig {
    /// Renderer program and leading arguments
    pub command: RenderCommand,
    /// Directory targets are resolved against and renderers run in
    pub working_dir: PathBuf,
    /// How output freshness is decided
    pub freshness: FreshnessPolicy,
    /// Behaviour after a failed render in multi-target builds
    pub failure: FailurePolicy,
    /// Maximum concurrent renderers (values below 1 are treated as 1)
    pub jobs: usize,
    /// Per-target render time limit
    pub timeout: Option<Duration>,
    /// Directory for temporary render logs (system temp dir if unset)
    pub log_dir: Option<PathBuf>,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            command: RenderCommand::default(),
            working_dir: std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            freshness: FreshnessPolicy::default(),
            failure: FailurePolicy::default(),
            jobs: 1,
            timeout: None,
            log_dir: None,
        }
    }
}

type LockRegistry = std::sync::Mutex<HashMap<String, Arc<Mutex<()>>>>;

/// Compiles targets by running the renderer for each stale output.
pub struct TaskExecutor {
    config: ExecutorConfig,
    cache: ArtifactCache,
    runner: Arc<dyn ProcessRunner>,
    cancel: CancellationToken,
    target_locks: LockRegistry,
}

impl std::fmt::Debug for TaskExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskExecutor")
            .field("config", &self.config)
            .field("cache", &self.cache)
            .finish_non_exhaustive()
    }
}

impl TaskExecutor {
    /// Executor over the real filesystem and real child processes.
    pub fn new(config: ExecutorConfig) -> Self {
        let cache = ArtifactCache::on_disk(&config.working_dir, config.freshness);
        let runner = Arc::new(SubprocessRunner::new(&config.working_dir));
        Self::with_parts(config, cache, runner)
    }

    /// Executor with an explicit cache and runner.
    pub fn with_parts(
        config: ExecutorConfig,
        cache: ArtifactCache,
        runner: Arc<dyn ProcessRunner>,
    ) -> Self {
        Self {
            config,
            cache,
            runner,
            cancel: CancellationToken::new(),
            target_locks: LockRegistry::default(),
        }
    }

    /// Use `token` to cancel running renders.
    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// The token that cancels this executor's renders.
    #[must_use]
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// The executor's configuration.
    #[must_use]
    pub fn config(&self) -> &ExecutorConfig {
        &self.config
    }

    /// The executor's artifact cache.
    #[must_use]
    pub fn cache(&self) -> &ArtifactCache {
        &self.cache
    }

    /// Compile a single target.
    ///
    /// # Errors
    ///
    /// Returns an error if freshness cannot be checked, the renderer cannot be
    /// started, the render times out or is cancelled, or the log cannot be read
    /// back. A renderer that runs and fails is `Ok(CompilationResult::Failed)`.
    pub async fn compile(&self, target: &Target) -> Result<CompilationResult> {
        self.compile_with(target, &self.cancel).await
    }

    /// Compile `targets` and their declared dependencies in dependency order.
    ///
    /// # Errors
    ///
    /// Returns a configuration error for invalid dependency declarations,
    /// [`Error::RenderFailure`] for the first failed render under
    /// [`FailurePolicy::FailFast`], and any other error from [`Self::compile`].
    pub async fn compile_all(
        &self,
        targets: impl IntoIterator<Item = Target>,
    ) -> Result<BuildReport> {
        let plan = BuildPlan::new(targets)?;
        self.execute_plan(&plan).await
    }

    /// Execute a prepared plan.
    ///
    /// # Errors
    ///
    /// See [`Self::compile_all`].
    pub async fn execute_plan(&self, plan: &BuildPlan) -> Result<BuildReport> {
        let started = Instant::now();
        let run_token = self.cancel.child_token();
        let permits = Semaphore::new(self.config.jobs.max(1));
        let fail_fast = self.config.failure == FailurePolicy::FailFast;
        let mut report = BuildReport::default();
        let mut unavailable: HashSet<String> = HashSet::new();

        info!(
            targets = plan.len(),
            levels = plan.levels().len(),
            jobs = self.config.jobs.max(1),
            failure = %self.config.failure,
            "Starting build"
        );

        for level in plan.levels() {
            let mut runnable = Vec::with_capacity(level.len());
            for target in level {
                if let Some(dep) = target
                    .depends_on()
                    .iter()
                    .find(|dep| unavailable.contains(dep.as_str()))
                {
                    let reason = format!("dependency '{dep}' did not compile");
                    debug!(task = %target.name(), %reason, "Skipping target");
                    unavailable.insert(target.name().to_string());
                    report.push(target.clone(), TargetOutcome::Skipped { reason });
                } else {
                    runnable.push(target);
                }
            }

            let permits = &permits;
            let token = &run_token;
            let mut pending: FuturesUnordered<_> = runnable
                .into_iter()
                .map(|target| async move {
                    let Ok(_permit) = permits.acquire().await else {
                        return (target, Err(Error::cancelled(target.name())));
                    };
                    (target, self.compile_with(target, token).await)
                })
                .collect();

            let mut completed = Vec::with_capacity(pending.len());
            while let Some((target, result)) = pending.next().await {
                let aborts = match &result {
                    Ok(CompilationResult::Failed { .. }) => fail_fast,
                    Ok(_) => false,
                    Err(_) => true,
                };
                if aborts && !run_token.is_cancelled() {
                    warn!(task = %target.name(), "Aborting remaining renders");
                    run_token.cancel();
                }
                completed.push((target, result));
            }

            // Completion order: an aborting result precedes the cancellations it caused
            let mut fatal: Option<Error> = None;
            for (target, result) in completed {
                match result {
                    Ok(CompilationResult::Failed { log }) => {
                        if fail_fast && fatal.is_none() {
                            fatal = Some(Error::render_failure(
                                target.name(),
                                target.source_path(),
                                log.clone(),
                            ));
                        }
                        unavailable.insert(target.name().to_string());
                        report.push(
                            target.clone(),
                            TargetOutcome::Compiled(CompilationResult::Failed { log }),
                        );
                    }
                    Ok(result) => report.push(target.clone(), TargetOutcome::Compiled(result)),
                    Err(err) => {
                        if fatal.is_none() {
                            fatal = Some(err);
                        }
                    }
                }
            }

            if let Some(err) = fatal {
                return Err(err);
            }
        }

        report.set_duration(started.elapsed());
        info!(
            cached = report.cached(),
            rendered = report.succeeded(),
            failed = report.failed(),
            skipped = report.skipped(),
            duration_ms = report.duration().as_millis(),
            "Build finished"
        );
        Ok(report)
    }

    async fn compile_with(
        &self,
        target: &Target,
        cancel: &CancellationToken,
    ) -> Result<CompilationResult> {
        let lock = self.target_lock(target.name());
        let _guard = lock.handle.lock().await;

        if cancel.is_cancelled() {
            return Err(Error::cancelled(target.name()));
        }

        if self.cache.is_fresh(target)? {
            info!(task = %target.name(), "Output is up to date, skipping render");
            return Ok(CompilationResult::Cached);
        }

        let log_sink = self.create_log_sink()?;
        let args = vec![target.source_path().to_string_lossy().into_owned()];
        let started = Instant::now();

        // Any error drops the sink, which removes the log file
        let outcome = self.run_guarded(target, &args, &log_sink, cancel).await?;
        let duration_ms = started.elapsed().as_millis();

        if outcome.success {
            log_sink.close()?;
            info!(task = %target.name(), duration_ms, "Rendered");
            return Ok(CompilationResult::Success);
        }

        let log: Vec<String> = log_sink
            .read_lines()?
            .into_iter()
            .map(|line| format!("{}{LOG_PREFIX_SEPARATOR}{line}", target.name()))
            .collect();
        log_sink.close()?;

        warn!(
            task = %target.name(),
            source = %target.source_path().display(),
            exit = ?outcome.code,
            duration_ms,
            lines = log.len(),
            "Render failed"
        );
        Ok(CompilationResult::Failed { log })
    }

    async fn run_guarded(
        &self,
        target: &Target,
        args: &[String],
        log_sink: &LogSink,
        cancel: &CancellationToken,
    ) -> Result<ExitOutcome> {
        let run = self.runner.run(&self.config.command, args, log_sink);
        let limited = async {
            match self.config.timeout {
                Some(limit) => match tokio::time::timeout(limit, run).await {
                    Ok(result) => result,
                    Err(_) => {
                        warn!(
                            task = %target.name(),
                            limit_ms = limit.as_millis(),
                            "Render timed out"
                        );
                        Err(Error::timeout(target.name(), limit))
                    }
                },
                None => run.await,
            }
        };

        // Dropping the run future kills the renderer's process group
        tokio::select! {
            result = limited => result,
            () = cancel.cancelled() => {
                warn!(task = %target.name(), "Render cancelled");
                Err(Error::cancelled(target.name()))
            }
        }
    }

    fn create_log_sink(&self) -> Result<LogSink> {
        match &self.config.log_dir {
            Some(dir) => {
                let dir = self.config.working_dir.join(dir);
                std::fs::create_dir_all(&dir)
                    .map_err(|e| Error::io(e, Some(dir.clone()), "create log directory"))?;
                LogSink::create_in(&dir)
            }
            None => LogSink::create(),
        }
    }

    fn target_lock(&self, name: &str) -> TargetLock<'_> {
        let mut locks = self
            .target_locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let handle = locks.entry(name.to_string()).or_default().clone();
        TargetLock {
            registry: &self.target_locks,
            name: name.to_string(),
            handle,
        }
    }
}

/// A compile's claim on a target's lock.
///
/// The registry entry is removed when the last claim is dropped.
struct TargetLock<'a> {
    registry: &'a LockRegistry,
    name: String,
    handle: Arc<Mutex<()>>,
}

impl Drop for TargetLock<'_> {
    fn drop(&mut self) {
        let mut locks = self.registry.lock().unwrap_or_else(PoisonError::into_inner);
        // The registry's copy plus ours
        let last = locks
            .get(&self.name)
            .is_some_and(|held| Arc::ptr_eq(held, &self.handle) && Arc::strong_count(held) == 2);
        if last {
            locks.remove(&self.name);
        }
    }
}
