//! folio command-line interface.
//!
//! The binary is a thin shell over this library: [`cli`] defines arguments,
//! errors and exit codes, [`commands`] implements each subcommand, and
//! [`tracing`] configures log output.

pub mod cli;
pub mod commands;
pub mod tracing;

use cli::{CliError, Commands};
use tokio_util::sync::CancellationToken;

/// Run one parsed command, returning the text to print on stdout.
///
/// # Errors
///
/// Returns the command's [`CliError`]; map it to an exit code with
/// [`cli::exit_code_for`].
pub async fn run(command: &Commands, json: bool, cancel: CancellationToken) -> Result<String, CliError> {
    match command {
        Commands::Build(args) => commands::build::execute(args, json, cancel).await,
        Commands::Status { targets, project } => commands::status::execute(targets, project, json),
        Commands::Clean { targets, project } => commands::clean::execute(targets, project, json),
        Commands::Link(args) => commands::link::execute(args),
    }
}
