// crates/opsgate-cli/src/main.rs
// ============================================================================
// Module: Opsgate CLI Entry Point
// Description: Command dispatcher for the Opsgate MCP gateway.
// Purpose: Run the gateway server and offline catalogue/config utilities.
// Dependencies: clap, opsgate-config, opsgate-mcp, opsgate-store, thiserror, tokio.
// ============================================================================

//! ## Overview
//! The Opsgate CLI starts the MCP gateway (`serve`), lists the generated
//! tool catalogue without touching the network (`tools`), and offers config
//! authoring helpers (`config example`, `config validate`). `serve --dev`
//! swaps the REST-backed store for an empty in-memory one so the gateway can
//! be exercised without external credentials.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::ArgAction;
use clap::CommandFactory;
use clap::Parser;
use clap::Subcommand;
use thiserror::Error;

use opsgate_config::AuthConfig;
use opsgate_config::OpsgateConfig;
use opsgate_config::config_toml_example;
use opsgate_mcp::McpServer;
use opsgate_mcp::SharedStoreBinder;
use opsgate_mcp::StderrAuditSink;
use opsgate_mcp::ToolRegistry;
use opsgate_store::InMemoryTableStore;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Static API key accepted by `serve --dev`.
const DEV_API_KEY: &str = "opsgate-dev";

// ============================================================================
// SECTION: CLI Types
// ============================================================================

/// Top-level CLI definition.
#[derive(Parser, Debug)]
#[command(name = "opsgate", disable_help_subcommand = true, disable_version_flag = true)]
struct Cli {
    /// Print version information and exit.
    #[arg(long = "version", action = ArgAction::SetTrue, global = true)]
    show_version: bool,
    /// Selected subcommand to execute.
    #[command(subcommand)]
    command: Option<Commands>,
}

/// Supported CLI subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Start the Opsgate MCP gateway.
    Serve(ServeCommand),
    /// List the generated tool catalogue and exit.
    Tools,
    /// Configuration utilities.
    Config {
        /// Selected config subcommand.
        #[command(subcommand)]
        command: ConfigCommand,
    },
}

/// Arguments for the `serve` command.
#[derive(Parser, Debug)]
struct ServeCommand {
    /// Optional config file path (defaults to opsgate.toml or env override).
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
    /// Serve against an empty in-memory store with a fixed dev API key.
    #[arg(long, action = ArgAction::SetTrue)]
    dev: bool,
}

/// Config subcommands.
#[derive(Subcommand, Debug)]
enum ConfigCommand {
    /// Print an annotated example configuration file.
    Example,
    /// Validate a configuration file.
    Validate(ConfigValidateCommand),
}

/// Arguments for `config validate`.
#[derive(Parser, Debug)]
struct ConfigValidateCommand {
    /// Optional config file path (defaults to opsgate.toml or env override).
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// CLI error wrapper carrying a user-facing message.
#[derive(Debug, Error)]
#[error("{message}")]
struct CliError {
    /// Human-readable error message.
    message: String,
}

impl CliError {
    /// Constructs a new [`CliError`] from a message.
    const fn new(message: String) -> Self {
        Self {
            message,
        }
    }
}

/// CLI result alias for fallible operations.
type CliResult<T> = Result<T, CliError>;

// ============================================================================
// SECTION: Entry Point
// ============================================================================

/// CLI entry point returning an exit code.
#[tokio::main(flavor = "multi_thread")]
async fn main() -> ExitCode {
    match run().await {
        Ok(code) => code,
        Err(err) => emit_error(&err.to_string()),
    }
}

/// Executes the CLI command dispatcher.
async fn run() -> CliResult<ExitCode> {
    let cli = Cli::parse();

    if cli.show_version {
        let version = env!("CARGO_PKG_VERSION");
        write_stdout_line(&format!("opsgate {version}"))
            .map_err(|err| CliError::new(output_error("stdout", &err)))?;
        return Ok(ExitCode::SUCCESS);
    }

    let Some(command) = cli.command else {
        show_help()?;
        return Ok(ExitCode::SUCCESS);
    };

    match command {
        Commands::Serve(command) => command_serve(command).await,
        Commands::Tools => command_tools(),
        Commands::Config {
            command,
        } => command_config(command),
    }
}

// ============================================================================
// SECTION: Serve Command
// ============================================================================

/// Executes the `serve` command.
async fn command_serve(command: ServeCommand) -> CliResult<ExitCode> {
    let server = if command.dev {
        build_dev_server()?
    } else {
        let config = OpsgateConfig::load(command.config.as_deref())
            .map_err(|err| CliError::new(format!("config load failed: {err}")))?;
        McpServer::from_config(&config)
            .map_err(|err| CliError::new(format!("server init failed: {err}")))?
    };

    server
        .serve()
        .await
        .map_err(|err| CliError::new(format!("server failed: {err}")))?;
    Ok(ExitCode::SUCCESS)
}

/// Builds a gateway over an empty in-memory store for local development.
fn build_dev_server() -> CliResult<McpServer> {
    let config = OpsgateConfig {
        auth: AuthConfig {
            static_api_key: DEV_API_KEY.to_string(),
            ..AuthConfig::default()
        },
        ..OpsgateConfig::default()
    };
    let binder = Arc::new(SharedStoreBinder::new(Arc::new(InMemoryTableStore::new())));
    let server = McpServer::with_binder(&config, binder, Arc::new(StderrAuditSink))
        .map_err(|err| CliError::new(format!("server init failed: {err}")))?;

    write_stderr_line("dev mode: serving an empty in-memory store; data is lost on exit")
        .map_err(|err| CliError::new(output_error("stderr", &err)))?;
    write_stderr_line(&format!("dev mode: authenticate with x-api-key: {DEV_API_KEY}"))
        .map_err(|err| CliError::new(output_error("stderr", &err)))?;
    Ok(server)
}

// ============================================================================
// SECTION: Tools Command
// ============================================================================

/// Executes the `tools` command.
fn command_tools() -> CliResult<ExitCode> {
    let registry =
        ToolRegistry::build().map_err(|err| CliError::new(format!("catalogue failed: {err}")))?;
    for name in registry.names() {
        write_stdout_line(name).map_err(|err| CliError::new(output_error("stdout", &err)))?;
    }
    Ok(ExitCode::SUCCESS)
}

// ============================================================================
// SECTION: Config Commands
// ============================================================================

/// Executes a `config` subcommand.
fn command_config(command: ConfigCommand) -> CliResult<ExitCode> {
    match command {
        ConfigCommand::Example => {
            write_stdout_line(config_toml_example())
                .map_err(|err| CliError::new(output_error("stdout", &err)))?;
            Ok(ExitCode::SUCCESS)
        }
        ConfigCommand::Validate(validate) => {
            let config = OpsgateConfig::load(validate.config.as_deref())
                .map_err(|err| CliError::new(format!("config load failed: {err}")))?;
            config
                .validate()
                .map_err(|err| CliError::new(format!("config invalid: {err}")))?;
            write_stdout_line("config ok")
                .map_err(|err| CliError::new(output_error("stdout", &err)))?;
            Ok(ExitCode::SUCCESS)
        }
    }
}

// ============================================================================
// SECTION: Output Helpers
// ============================================================================

/// Prints top-level help.
fn show_help() -> CliResult<()> {
    let mut command = Cli::command();
    command
        .print_help()
        .map_err(|err| CliError::new(format!("help output failed: {err}")))?;
    Ok(())
}

/// Writes a line to stdout.
fn write_stdout_line(message: &str) -> std::io::Result<()> {
    let mut stdout = std::io::stdout();
    writeln!(&mut stdout, "{message}")
}

/// Writes a line to stderr.
fn write_stderr_line(message: &str) -> std::io::Result<()> {
    let mut stderr = std::io::stderr();
    writeln!(&mut stderr, "{message}")
}

/// Formats an output error message.
fn output_error(stream: &str, error: &std::io::Error) -> String {
    format!("failed writing to {stream}: {error}")
}

/// Emits an error message to stderr and returns a failure exit code.
fn emit_error(message: &str) -> ExitCode {
    let _ = write_stderr_line(message);
    ExitCode::FAILURE
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    #![allow(
        clippy::panic,
        clippy::unwrap_used,
        clippy::expect_used,
        reason = "Test-only panic-based assertions are permitted."
    )]

    use clap::Parser;

    use super::Cli;
    use super::Commands;
    use super::build_dev_server;

    #[test]
    fn serve_accepts_config_and_dev_flags() {
        let cli = Cli::try_parse_from(["opsgate", "serve", "--config", "/tmp/opsgate.toml"])
            .expect("parse");
        match cli.command {
            Some(Commands::Serve(serve)) => {
                assert!(serve.config.is_some());
                assert!(!serve.dev);
            }
            _ => panic!("expected serve command"),
        }

        let dev = Cli::try_parse_from(["opsgate", "serve", "--dev"]).expect("parse");
        match dev.command {
            Some(Commands::Serve(serve)) => assert!(serve.dev),
            _ => panic!("expected serve command"),
        }
    }

    #[test]
    fn version_flag_parses_without_subcommand() {
        let cli = Cli::try_parse_from(["opsgate", "--version"]).expect("parse");
        assert!(cli.show_version);
        assert!(cli.command.is_none());
    }

    #[test]
    fn dev_server_exposes_full_catalogue() {
        let server = build_dev_server().expect("dev server");
        let names = server.tool_names();
        assert!(names.iter().any(|name| name == "list_accounts"));
        assert!(names.iter().any(|name| name == "calculate_kpi"));
    }
}
