//! folio binary entry point.

// CLI binary needs to output to stdout/stderr
#![allow(clippy::print_stdout, clippy::print_stderr)]

use folio::cli::{self, CliError, Commands, EXIT_OK, exit_code_for, render_error};
use folio::tracing::{TracingConfig, TracingFormat, init_tracing};
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

fn main() {
    // NOTE: tracing may be unusable during a panic, so write directly to stderr
    std::panic::set_hook(Box::new(|panic_info| {
        eprintln!("Application panicked: {panic_info}");
        eprintln!("Internal error occurred. Run with RUST_LOG=debug for more information.");
    }));

    let cli = cli::parse();

    let tracing_config = TracingConfig {
        format: if cli.json {
            TracingFormat::Json
        } else {
            TracingFormat::Compact
        },
        level: cli.level.into(),
        ..Default::default()
    };
    if let Err(e) = init_tracing(tracing_config) {
        eprintln!("Warning: {e}");
    }

    let cancel = CancellationToken::new();
    let handler_token = cancel.clone();
    if let Err(e) = ctrlc::set_handler(move || {
        tracing::warn!("Interrupt received, stopping renders");
        handler_token.cancel();
    }) {
        tracing::warn!(error = %e, "Failed to install Ctrl-C handler");
    }

    let exit_code = run_with_tokio(&cli.command, cli.json, cancel);
    std::process::exit(exit_code);
}

/// Create the tokio runtime and run the command
fn run_with_tokio(command: &Commands, json: bool, cancel: CancellationToken) -> i32 {
    let rt = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("Fatal error: Failed to create tokio runtime: {e}");
            return exit_code_for(&CliError::other(e.to_string()));
        }
    };

    let span = folio::command_span!(command_name(command));
    match rt.block_on(folio::run(command, json, cancel).instrument(span)) {
        Ok(output) => {
            if !output.is_empty() {
                println!("{output}");
            }
            EXIT_OK
        }
        Err(err) => {
            render_error(&err, json);
            exit_code_for(&err)
        }
    }
}

const fn command_name(command: &Commands) -> &'static str {
    match command {
        Commands::Build(_) => "build",
        Commands::Status { .. } => "status",
        Commands::Clean { .. } => "clean",
        Commands::Link(_) => "link",
    }
}
