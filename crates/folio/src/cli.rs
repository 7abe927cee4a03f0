//! Command-line definition, CLI errors and exit codes.

use clap::{Args, Parser, Subcommand, ValueEnum};
use folio_core::FreshnessPolicy;
use miette::{Diagnostic, Report};
use serde::Serialize;
use std::io::{self, Write};
use std::path::PathBuf;
use thiserror::Error;

/// Exit codes for the CLI application
pub const EXIT_OK: i32 = 0;
/// CLI or configuration error exit code
pub const EXIT_CLI: i32 = 2;
/// Render failure or other runtime error exit code
pub const EXIT_RENDER: i32 = 3;
/// Exit code for SIGINT (128 + signal number 2)
pub const EXIT_SIGINT: i32 = 130;

/// CLI-specific error types with exit code mapping
#[derive(Error, Debug, Clone, Diagnostic)]
pub enum CliError {
    /// CLI or configuration error (exit code 2)
    #[error("{message}")]
    #[diagnostic(code(folio::cli::config))]
    Config {
        /// The error message
        message: String,
        /// Optional help text
        #[help]
        help: Option<String>,
    },
    /// One or more documents failed to render (exit code 3)
    #[error("{message}")]
    #[diagnostic(code(folio::cli::render))]
    Render {
        /// The error message, including the captured renderer output
        message: String,
        /// Optional help text
        #[help]
        help: Option<String>,
    },
    /// Other runtime error (exit code 3)
    #[error("{message}")]
    #[diagnostic(code(folio::cli::other))]
    Other {
        /// The error message
        message: String,
        /// Optional help text
        #[help]
        help: Option<String>,
    },
    /// Interrupted by the user (exit code 130)
    #[error("Interrupted")]
    #[diagnostic(code(folio::cli::interrupted))]
    Interrupted,
}

impl CliError {
    /// Create a new configuration error
    #[must_use]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
            help: None,
        }
    }

    /// Create a new configuration error with help text
    #[must_use]
    pub fn config_with_help(message: impl Into<String>, help: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
            help: Some(help.into()),
        }
    }

    /// Create a new render error
    #[must_use]
    pub fn render(message: impl Into<String>) -> Self {
        Self::Render {
            message: message.into(),
            help: None,
        }
    }

    /// Create a new other error
    #[must_use]
    pub fn other(message: impl Into<String>) -> Self {
        Self::Other {
            message: message.into(),
            help: None,
        }
    }

    /// Create a new other error with help text
    #[must_use]
    pub fn other_with_help(message: impl Into<String>, help: impl Into<String>) -> Self {
        Self::Other {
            message: message.into(),
            help: Some(help.into()),
        }
    }

    fn code(&self) -> &'static str {
        match self {
            Self::Config { .. } => "config",
            Self::Render { .. } => "render",
            Self::Other { .. } => "other",
            Self::Interrupted => "interrupted",
        }
    }
}

/// Convert `folio_core::Error` to the matching `CliError` variant.
///
/// - Configuration errors -> Config (exit code 2)
/// - Render failures -> Render (exit code 3)
/// - Cancellation -> Interrupted (exit code 130)
/// - Everything else -> Other (exit code 3)
impl From<folio_core::Error> for CliError {
    fn from(err: folio_core::Error) -> Self {
        match err {
            // Extract just the message to avoid "Configuration error: Configuration error:"
            folio_core::Error::Configuration { message } => Self::config(message),
            folio_core::Error::RenderFailure { .. } => Self::render(err.to_string()),
            folio_core::Error::Cancelled { .. } => Self::Interrupted,
            folio_core::Error::Io {
                source,
                path,
                operation,
            } => {
                let path_str = path
                    .as_ref()
                    .map_or(String::new(), |p| format!(" on {}", p.display()));
                Self::other_with_help(
                    format!("I/O error during {operation}{path_str}: {source}"),
                    "Check file permissions and ensure the path exists",
                )
            }
            folio_core::Error::ProcessLaunch { .. }
            | folio_core::Error::CacheCheck { .. }
            | folio_core::Error::Timeout { .. } => {
                let help = err.help().map(|h| h.to_string());
                Self::Other {
                    message: err.to_string(),
                    help,
                }
            }
        }
    }
}

impl From<folio_links::Error> for CliError {
    fn from(err: folio_links::Error) -> Self {
        let help = err.help().map(|h| h.to_string());
        Self::Config {
            message: err.to_string(),
            help,
        }
    }
}

/// Map CLI error to its exit code
#[must_use]
pub const fn exit_code_for(err: &CliError) -> i32 {
    match err {
        CliError::Config { .. } => EXIT_CLI,
        CliError::Render { .. } | CliError::Other { .. } => EXIT_RENDER,
        CliError::Interrupted => EXIT_SIGINT,
    }
}

/// Success response envelope for JSON output
#[derive(Debug, Clone, Serialize)]
pub struct OkEnvelope<T> {
    /// Status indicator, always "ok"
    pub status: &'static str,
    /// The payload
    pub data: T,
}

impl<T> OkEnvelope<T> {
    /// Create a new success envelope
    #[must_use]
    pub const fn new(data: T) -> Self {
        Self { status: "ok", data }
    }
}

/// Error response envelope for JSON output
#[derive(Debug, Clone, Serialize)]
pub struct ErrorEnvelope<E> {
    /// Status indicator, always "error"
    pub status: &'static str,
    /// The error details
    pub error: E,
}

impl<E> ErrorEnvelope<E> {
    /// Create a new error envelope
    #[must_use]
    pub const fn new(error: E) -> Self {
        Self {
            status: "error",
            error,
        }
    }
}

/// Render an error on stderr, as a JSON envelope or a miette report
#[allow(clippy::print_stderr)]
pub fn render_error(err: &CliError, json_mode: bool) {
    if json_mode {
        let envelope = ErrorEnvelope::new(serde_json::json!({
            "code": err.code(),
            "message": err.to_string(),
        }));
        match serde_json::to_string(&envelope) {
            Ok(json) => eprintln!("{json}"),
            Err(_) => eprintln!("Error serializing error response"),
        }
    } else {
        let report = Report::new(err.clone());
        eprintln!("{report:?}");
    }
    let _ = io::stderr().flush();
}

/// Memoizing document builder.
///
/// Renders source documents to HTML once, skipping any whose output already exists.
#[derive(Parser, Debug)]
#[command(name = "folio")]
#[command(about = "Memoizing document builder: render each document once")]
#[command(long_about = None)]
#[command(version)]
pub struct Cli {
    /// The subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,

    /// Logging verbosity level.
    #[arg(
        short = 'L',
        long,
        global = true,
        help = "Set logging level",
        default_value = "warn",
        value_enum
    )]
    pub level: crate::tracing::LogLevel,

    /// Emit JSON logs and JSON result envelopes.
    #[arg(long, global = true, help = "Emit JSON logs and JSON result envelopes")]
    pub json: bool,
}

/// Available CLI subcommands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Render documents whose output is missing.
    #[command(about = "Render documents whose output is missing")]
    Build(BuildArgs),
    /// Show whether each document's output is up to date.
    #[command(about = "Show whether each document's output is up to date")]
    Status {
        /// Documents to inspect (all discovered documents if omitted).
        #[arg(value_name = "TARGET")]
        targets: Vec<String>,
        /// Project location.
        #[command(flatten)]
        project: ProjectArgs,
    },
    /// Delete rendered outputs so the next build renders them again.
    #[command(about = "Delete rendered outputs so the next build renders them again")]
    Clean {
        /// Documents to clean (all discovered documents if omitted).
        #[arg(value_name = "TARGET")]
        targets: Vec<String>,
        /// Project location.
        #[command(flatten)]
        project: ProjectArgs,
    },
    /// Print a link to a rendered document or one of its sections.
    #[command(about = "Print a link to a rendered document or one of its sections")]
    Link(LinkArgs),
}

/// Where the project lives and which manifest to read.
#[derive(Args, Debug, Clone, Default)]
pub struct ProjectArgs {
    /// Project directory containing the source documents.
    #[arg(short = 'C', long = "directory", value_name = "DIR")]
    pub directory: Option<PathBuf>,

    /// Manifest file to read instead of the project's folio.toml.
    #[arg(long = "config", value_name = "FILE")]
    pub config: Option<PathBuf>,
}

/// Arguments of `folio build`.
#[derive(Args, Debug, Clone, Default)]
pub struct BuildArgs {
    /// Documents to build, with or without the source extension
    /// (all discovered documents if omitted).
    #[arg(value_name = "TARGET")]
    pub targets: Vec<String>,

    /// Project location.
    #[command(flatten)]
    pub project: ProjectArgs,

    /// Maximum number of renderers running at once.
    #[arg(short = 'j', long, env = "FOLIO_JOBS", value_name = "N")]
    pub jobs: Option<usize>,

    /// Keep building independent documents after a failure.
    #[arg(long)]
    pub collect_all: bool,

    /// How to decide that an output is up to date.
    #[arg(long, value_enum, value_name = "POLICY")]
    pub freshness: Option<FreshnessArg>,

    /// Per-document render time limit in seconds.
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Renderer program (replaces the configured command and its arguments).
    #[arg(long, env = "FOLIO_RENDERER", value_name = "CMD")]
    pub renderer: Option<String>,

    /// Argument placed before the source path; repeat for several.
    #[arg(long = "renderer-arg", value_name = "ARG", allow_hyphen_values = true)]
    pub renderer_args: Vec<String>,

    /// Directory for temporary render logs.
    #[arg(long, env = "FOLIO_LOG_DIR", value_name = "DIR")]
    pub log_dir: Option<PathBuf>,
}

/// `--freshness` values.
#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum FreshnessArg {
    /// The output exists
    Exists,
    /// The output exists and is not older than its source
    Modified,
}

impl From<FreshnessArg> for FreshnessPolicy {
    fn from(arg: FreshnessArg) -> Self {
        match arg {
            FreshnessArg::Exists => Self::Exists,
            FreshnessArg::Modified => Self::Modified,
        }
    }
}

/// Arguments of `folio link`.
#[derive(Args, Debug, Clone)]
pub struct LinkArgs {
    /// Document name, without extension.
    #[arg(value_name = "DOC")]
    pub document: String,

    /// Section heading to link to.
    #[arg(short, long)]
    pub section: Option<String>,

    /// Link text.
    #[arg(short, long)]
    pub label: String,

    /// Output format.
    #[arg(short, long, value_enum, default_value_t = LinkFormat::Markdown)]
    pub format: LinkFormat,

    /// Project location, read for the `[links]` settings.
    #[command(flatten)]
    pub project: ProjectArgs,
}

/// Output formats of `folio link`.
#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum, Default)]
pub enum LinkFormat {
    /// `[label](url)`
    #[default]
    Markdown,
    /// `<a href="url">label</a>`
    Html,
    /// `{"url": ..., "label": ...}`
    Json,
    /// The bare URL
    Plain,
}

/// Parse the process arguments.
#[must_use]
pub fn parse() -> Cli {
    Cli::parse()
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_build_flags() {
        let cli = Cli::try_parse_from([
            "folio",
            "build",
            "intro",
            "analysis.Rmd",
            "-C",
            "docs",
            "-j",
            "4",
            "--collect-all",
            "--freshness",
            "modified",
            "--timeout",
            "60",
            "--renderer",
            "sh",
            "--renderer-arg",
            "-c",
            "--renderer-arg",
            "make $1",
        ])
        .unwrap();

        let Commands::Build(args) = cli.command else {
            panic!("expected build");
        };
        assert_eq!(args.targets, vec!["intro", "analysis.Rmd"]);
        assert_eq!(args.project.directory, Some(PathBuf::from("docs")));
        assert_eq!(args.jobs, Some(4));
        assert!(args.collect_all);
        assert_eq!(args.freshness, Some(FreshnessArg::Modified));
        assert_eq!(args.timeout, Some(60));
        assert_eq!(args.renderer.as_deref(), Some("sh"));
        assert_eq!(args.renderer_args, vec!["-c", "make $1"]);
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from(["folio", "status", "--level", "debug", "--json"]).unwrap();
        assert_eq!(cli.level, crate::tracing::LogLevel::Debug);
        assert!(cli.json);
    }

    #[test]
    fn test_link_requires_label() {
        assert!(Cli::try_parse_from(["folio", "link", "intro"]).is_err());
        let cli =
            Cli::try_parse_from(["folio", "link", "intro", "-s", "My Section", "-l", "see"]).unwrap();
        let Commands::Link(args) = cli.command else {
            panic!("expected link");
        };
        assert_eq!(args.section.as_deref(), Some("My Section"));
        assert_eq!(args.format, LinkFormat::Markdown);
    }

    #[test]
    fn test_exit_codes() {
        assert_eq!(EXIT_OK, 0);
        assert_eq!(exit_code_for(&CliError::config("bad")), EXIT_CLI);
        assert_eq!(exit_code_for(&CliError::render("failed")), EXIT_RENDER);
        assert_eq!(exit_code_for(&CliError::other("io")), EXIT_RENDER);
        assert_eq!(exit_code_for(&CliError::Interrupted), EXIT_SIGINT);
    }

    #[test]
    fn test_core_error_mapping() {
        let config: CliError = folio_core::Error::configuration("cycle").into();
        assert!(matches!(&config, CliError::Config { message, .. } if message == "cycle"));

        let render: CliError = folio_core::Error::render_failure(
            "T",
            "T.Rmd",
            vec!["T> error: bad syntax".to_string()],
        )
        .into();
        assert_eq!(exit_code_for(&render), EXIT_RENDER);
        assert!(render.to_string().contains("T.Rmd"));
        assert!(render.to_string().contains("T> error: bad syntax"));

        let cancelled: CliError = folio_core::Error::cancelled("T").into();
        assert_eq!(exit_code_for(&cancelled), EXIT_SIGINT);

        let launch: CliError = folio_core::Error::process_launch(
            "Rscript T.Rmd",
            std::io::Error::new(std::io::ErrorKind::NotFound, "not found"),
        )
        .into();
        assert!(matches!(launch, CliError::Other { help: Some(_), .. }));
    }

    #[test]
    fn test_links_error_is_config() {
        let err: CliError = folio_links::Error::invalid_link("document name is empty").into();
        assert_eq!(exit_code_for(&err), EXIT_CLI);
    }
}
