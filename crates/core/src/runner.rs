//! Renderer process execution.
//!
//! Each render runs as a child process whose stdout and stderr share one
//! temporary log file. Both streams are handed the same open file, so the
//! file ends up holding the output in the order the child wrote it.
//!
//! On Unix the renderer leads its own process group. When a render ends,
//! whether it exited, timed out or was cancelled, the whole group is killed
//! so no forked worker outlives it and writes an output late.

use crate::{Error, Result};
use async_trait::async_trait;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tempfile::NamedTempFile;
use tokio::process::Command;
use tracing::{debug, info};

/// Program and leading arguments used to render one document.
///
/// The document's source path is appended as the final argument.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderCommand {
    program: String,
    args: Vec<String>,
}

impl RenderCommand {
    /// Renderer invoked as `<program> <source>`.
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    /// Arguments placed between the program and the source path.
    #[must_use]
    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    /// The renderer executable.
    #[must_use]
    pub fn program(&self) -> &str {
        &self.program
    }

    /// Leading arguments.
    #[must_use]
    pub fn args(&self) -> &[String] {
        &self.args
    }

    /// Full command line for messages, with `extra` appended.
    #[must_use]
    pub fn command_line(&self, extra: &[String]) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .chain(extra.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Renderer used when none is configured.
pub const DEFAULT_RENDERER: &str = "Rscript";

/// Leading arguments of the default renderer.
pub const DEFAULT_RENDERER_ARGS: [&str; 2] = ["-e", "rmarkdown::render(commandArgs(TRUE)[1])"];

impl Default for RenderCommand {
    fn default() -> Self {
        Self::new(DEFAULT_RENDERER).with_args(DEFAULT_RENDERER_ARGS)
    }
}

/// How a renderer process ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExitOutcome {
    /// Whether the process reported success
    pub success: bool,
    /// Exit code, if the process exited normally
    pub code: Option<i32>,
}

impl ExitOutcome {
    /// A successful exit with code 0.
    #[must_use]
    pub const fn success() -> Self {
        Self {
            success: true,
            code: Some(0),
        }
    }

    /// A failed exit with the given code.
    #[must_use]
    pub const fn failure(code: i32) -> Self {
        Self {
            success: false,
            code: Some(code),
        }
    }
}

impl From<std::process::ExitStatus> for ExitOutcome {
    fn from(status: std::process::ExitStatus) -> Self {
        Self {
            success: status.success(),
            code: status.code(),
        }
    }
}

/// Scoped temporary file receiving a renderer's combined output.
///
/// The file is removed when the sink is dropped.
#[derive(Debug)]
pub struct LogSink {
    file: NamedTempFile,
}

impl LogSink {
    /// Create a sink in the system temporary directory.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the file cannot be created.
    pub fn create() -> Result<Self> {
        Self::create_in(std::env::temp_dir())
    }

    /// Create a sink inside `dir`.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the file cannot be created.
    pub fn create_in(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        let file = tempfile::Builder::new()
            .prefix(".folio-")
            .suffix(".log")
            .tempfile_in(dir)
            .map_err(|e| Error::io(e, Some(dir.to_path_buf()), "create render log"))?;
        Ok(Self { file })
    }

    /// Location of the log file.
    #[must_use]
    pub fn path(&self) -> &Path {
        self.file.path()
    }

    /// A new handle onto the log file, sharing its write position.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the handle cannot be duplicated.
    pub fn writer(&self) -> Result<File> {
        self.file
            .as_file()
            .try_clone()
            .map_err(|e| Error::io(e, Some(self.path().to_path_buf()), "open render log"))
    }

    /// Everything written so far, split into lines.
    ///
    /// Invalid UTF-8 is replaced rather than rejected.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the file cannot be read.
    pub fn read_lines(&self) -> Result<Vec<String>> {
        let bytes = std::fs::read(self.path())
            .map_err(|e| Error::io(e, Some(self.path().to_path_buf()), "read render log"))?;
        Ok(String::from_utf8_lossy(&bytes)
            .lines()
            .map(str::to_owned)
            .collect())
    }

    /// Delete the log file now, reporting failures instead of ignoring them.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the file cannot be removed.
    pub fn close(self) -> Result<()> {
        let path = self.path().to_path_buf();
        self.file
            .close()
            .map_err(|e| Error::io(e, Some(path), "remove render log"))
    }
}

/// Executes a renderer command.
///
/// Implementations report how the process ended; a failing exit is not an
/// error at this layer.
#[async_trait]
pub trait ProcessRunner: Send + Sync {
    /// Run `command` with `args` appended, sending stdout and stderr to `log_sink`.
    ///
    /// Dropping the returned future must stop the process and anything it
    /// spawned.
    async fn run(
        &self,
        command: &RenderCommand,
        args: &[String],
        log_sink: &LogSink,
    ) -> Result<ExitOutcome>;
}

/// [`ProcessRunner`] spawning real child processes in a working directory.
#[derive(Debug, Clone)]
pub struct SubprocessRunner {
    working_dir: PathBuf,
}

impl SubprocessRunner {
    /// Runner whose children start in `working_dir`.
    pub fn new(working_dir: impl Into<PathBuf>) -> Self {
        Self {
            working_dir: working_dir.into(),
        }
    }
}

#[async_trait]
impl ProcessRunner for SubprocessRunner {
    async fn run(
        &self,
        command: &RenderCommand,
        args: &[String],
        log_sink: &LogSink,
    ) -> Result<ExitOutcome> {
        let command_line = command.command_line(args);
        let stdout = log_sink.writer()?;
        let stderr = log_sink.writer()?;

        let mut cmd = Command::new(command.program());
        cmd.args(command.args())
            .args(args)
            .current_dir(&self.working_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::from(stdout))
            .stderr(Stdio::from(stderr))
            .kill_on_drop(true);
        #[cfg(unix)]
        cmd.process_group(0);

        info!(
            command = %command_line,
            workdir = %self.working_dir.display(),
            "Starting renderer"
        );

        let mut child = cmd
            .spawn()
            .map_err(|e| Error::process_launch(command_line.clone(), e))?;
        // Dropped before `child`, so the group dies before the leader is reaped
        let _group = ProcessGroup::led_by(&child);
        // Release the parent's copies of the log handles
        drop(cmd);

        let status = child.wait().await.map_err(|e| {
            Error::io(
                e,
                Some(self.working_dir.clone()),
                format!("wait for renderer `{command_line}`"),
            )
        })?;

        let outcome = ExitOutcome::from(status);
        debug!(
            command = %command_line,
            success = outcome.success,
            code = ?outcome.code,
            "Renderer exited"
        );
        Ok(outcome)
    }
}

/// Kills a renderer's process group when dropped.
#[derive(Debug)]
struct ProcessGroup {
    #[cfg_attr(not(unix), allow(dead_code))]
    id: Option<i32>,
}

impl ProcessGroup {
    fn led_by(child: &tokio::process::Child) -> Self {
        Self {
            id: child.id().and_then(|pid| i32::try_from(pid).ok()),
        }
    }
}

#[cfg(unix)]
impl Drop for ProcessGroup {
    fn drop(&mut self) {
        let Some(pgid) = self.id else {
            return;
        };
        // SAFETY: libc::kill with negative pid sends signal to entire process group.
        // The group was created for the renderer by `process_group(0)`.
        #[expect(unsafe_code, reason = "Required for POSIX signal handling")]
        let rc = unsafe { libc::kill(-pgid, libc::SIGKILL) };
        if rc == 0 {
            debug!(pgid, "Killed renderer process group");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::time::Duration;
    use tempfile::TempDir;

    #[test]
    fn test_command_line() {
        let command = RenderCommand::new("Rscript").with_args(["-e", "render()"]);
        assert_eq!(
            command.command_line(&["intro.Rmd".to_string()]),
            "Rscript -e render() intro.Rmd"
        );
        assert_eq!(RenderCommand::new("pandoc").command_line(&[]), "pandoc");
    }

    #[test]
    fn test_log_sink_round_trip_and_removal() {
        let dir = TempDir::new().unwrap();
        let sink = LogSink::create_in(dir.path()).unwrap();
        let path = sink.path().to_path_buf();
        assert!(path.starts_with(dir.path()));

        let mut writer = sink.writer().unwrap();
        writeln!(writer, "first").unwrap();
        writeln!(writer, "second").unwrap();
        drop(writer);

        assert_eq!(sink.read_lines().unwrap(), vec!["first", "second"]);
        sink.close().unwrap();
        assert!(!path.exists());
    }

    #[test]
    fn test_log_sink_removed_on_drop() {
        let dir = TempDir::new().unwrap();
        let sink = LogSink::create_in(dir.path()).unwrap();
        let path = sink.path().to_path_buf();
        drop(sink);
        assert!(!path.exists());
    }

    #[test]
    fn test_log_sink_lossy_utf8() {
        let dir = TempDir::new().unwrap();
        let sink = LogSink::create_in(dir.path()).unwrap();
        sink.writer().unwrap().write_all(b"ok\n\xff\xfe bad\n").unwrap();
        let lines = sink.read_lines().unwrap();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0], "ok");
        assert!(lines[1].ends_with(" bad"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_subprocess_interleaves_streams_in_write_order() {
        let dir = TempDir::new().unwrap();
        let sink = LogSink::create_in(dir.path()).unwrap();
        let runner = SubprocessRunner::new(dir.path());
        let command = RenderCommand::new("sh")
            .with_args(["-c", "echo A; echo C >&2; echo B", "render"]);

        let outcome = runner.run(&command, &[], &sink).await.unwrap();
        assert!(outcome.success);
        assert_eq!(sink.read_lines().unwrap(), vec!["A", "C", "B"]);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_subprocess_receives_source_argument_and_reports_failure() {
        let dir = TempDir::new().unwrap();
        let sink = LogSink::create_in(dir.path()).unwrap();
        let runner = SubprocessRunner::new(dir.path());
        let command =
            RenderCommand::new("sh").with_args(["-c", "echo \"rendering $1\"; exit 3", "render"]);

        let outcome = runner
            .run(&command, &["intro.Rmd".to_string()], &sink)
            .await
            .unwrap();
        assert_eq!(outcome, ExitOutcome::failure(3));
        assert_eq!(sink.read_lines().unwrap(), vec!["rendering intro.Rmd"]);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_dropped_run_kills_forked_workers() {
        let dir = TempDir::new().unwrap();
        let sink = LogSink::create_in(dir.path()).unwrap();
        let runner = SubprocessRunner::new(dir.path());
        let command =
            RenderCommand::new("sh").with_args(["-c", "(sleep 1; touch late) & wait", "render"]);

        let run = runner.run(&command, &[], &sink);
        assert!(tokio::time::timeout(Duration::from_millis(200), run).await.is_err());

        tokio::time::sleep(Duration::from_millis(1500)).await;
        assert!(!dir.path().join("late").exists());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_workers_left_behind_are_killed_on_exit() {
        let dir = TempDir::new().unwrap();
        let sink = LogSink::create_in(dir.path()).unwrap();
        let runner = SubprocessRunner::new(dir.path());
        let command =
            RenderCommand::new("sh").with_args(["-c", "(sleep 1; touch late) & exit 0", "render"]);

        let outcome = runner.run(&command, &[], &sink).await.unwrap();
        assert!(outcome.success);

        tokio::time::sleep(Duration::from_millis(1500)).await;
        assert!(!dir.path().join("late").exists());
    }

    #[tokio::test]
    async fn test_missing_program_is_launch_error() {
        let dir = TempDir::new().unwrap();
        let sink = LogSink::create_in(dir.path()).unwrap();
        let runner = SubprocessRunner::new(dir.path());
        let command = RenderCommand::new("folio-renderer-that-does-not-exist");

        let err = runner
            .run(&command, &["intro.Rmd".to_string()], &sink)
            .await
            .unwrap_err();
        match err {
            Error::ProcessLaunch { command, .. } => {
                assert_eq!(command, "folio-renderer-that-does-not-exist intro.Rmd");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
