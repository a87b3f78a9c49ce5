//! CLI command implementations

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::info;

use super::args::{Cli, Command};
use crate::commands::{CommandError, Repository};
use crate::config::{validate_config, CommandDirectoryRoute, ConfigError, RouteConfig, ServerConfig};
use crate::handlers::{collect_rows, run_writer, HandlerConfig};
use crate::layers::OutputSettings;
use crate::parameters::ParameterError;
use crate::processor::{write_rows, OutputFormat, ProcessorError};

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Command(#[from] CommandError),

    #[error(transparent)]
    Parameter(#[from] ParameterError),

    #[error(transparent)]
    Processor(#[from] ProcessorError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Usage(String),
}

impl CliError {
    /// Process exit code
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Usage(_) | Self::Parameter(_) | Self::Config(_) => 2,
            _ => 1,
        }
    }
}

pub type CliResult<T> = Result<T, CliError>;

/// Main CLI entry point
pub async fn run() -> CliResult<()> {
    let cli = Cli::parse_args();
    run_command(cli.command).await
}

/// Run the appropriate command based on CLI args
pub async fn run_command(cmd: Command) -> CliResult<()> {
    match cmd {
        Command::Serve {
            config,
            commands,
            address,
            port,
            dev,
        } => serve(config.as_deref(), commands, address, port, dev).await,
        Command::Ls { commands } => ls(&commands, &mut std::io::stdout().lock()),
        Command::Run { commands, path, query } => {
            run_one(&commands, &path, &query, &mut std::io::stdout().lock()).await
        }
    }
}

/// Server config from a file, or one command directory at `/`
fn server_config(config: Option<&Path>, commands: Option<PathBuf>) -> CliResult<ServerConfig> {
    match (config, commands) {
        (Some(path), _) => Ok(ServerConfig::load(path)?),
        (None, Some(dir)) => {
            let config = ServerConfig {
                routes: vec![RouteConfig {
                    path: "/".to_string(),
                    command_directory: Some(CommandDirectoryRoute {
                        repositories: vec![dir],
                        ..Default::default()
                    }),
                    ..Default::default()
                }],
                ..Default::default()
            };
            validate_config(&config).map_err(ConfigError::Invalid)?;
            Ok(config)
        }
        (None, None) => Err(CliError::Usage(
            "serve needs either --config or --commands".to_string(),
        )),
    }
}

pub async fn serve(
    config: Option<&Path>,
    commands: Option<PathBuf>,
    address: Option<String>,
    port: Option<u16>,
    dev: bool,
) -> CliResult<()> {
    let mut config = server_config(config, commands)?;
    if address.is_some() {
        config.address = address;
    }
    if port.is_some() {
        config.port = port;
    }

    let server = config.build_server(dev)?;
    info!(address = %server.address(), dev = dev || config.dev, "starting server");
    server.run().await?;
    Ok(())
}

/// Print `path<TAB>short` for every command
pub fn ls(commands: &Path, out: &mut impl Write) -> CliResult<()> {
    let repository = Repository::load_from_dir(commands)?;
    let mut entries: Vec<(String, String)> = repository
        .commands()
        .iter()
        .map(|c| (c.description().full_path(), c.description().short.clone()))
        .collect();
    entries.sort();

    for (path, short) in entries {
        if short.is_empty() {
            writeln!(out, "{}", path)?;
        } else {
            writeln!(out, "{}\t{}", path, short)?;
        }
    }
    Ok(())
}

/// Bind `query` onto the command at `path` and write its output to `out`,
/// or to `output-file` when that is set
pub async fn run_one(commands: &Path, path: &str, query: &str, out: &mut impl Write) -> CliResult<()> {
    let repository = Repository::load_from_dir(commands)?;
    let command = repository.find_command(path)?;
    let parsed = HandlerConfig::default().bind_query(command, query, false, Vec::new())?;
    let settings = OutputSettings::from_parsed(&parsed);

    let mut file;
    let target: &mut dyn Write = match &settings.output_file {
        Some(output_file) => {
            file = BufWriter::new(File::create(output_file)?);
            &mut file
        }
        None => out,
    };

    if let Some(writer) = command.as_writer() {
        target.write_all(run_writer(writer, &parsed).await?.as_bytes())?;
    } else if let Some(rows_command) = command.as_rows() {
        let (rows, err) = collect_rows(rows_command, &parsed).await;
        if let Some(e) = err {
            return Err(e.into());
        }
        write_rows(OutputFormat::from_settings(&settings)?, &rows, &mut *target)?;
    }
    target.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn commands_dir() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("people")).unwrap();
        std::fs::write(
            dir.path().join("people/users.yaml"),
            "name: users\nshort: List users\nflags:\n  - name: role\n    type: string\nrows:\n  - name: alice\n    role: admin\n  - name: bob\n    role: guest\n",
        )
        .unwrap();
        std::fs::write(
            dir.path().join("greet.yaml"),
            "name: greet\ntype: template\nflags:\n  - name: who\n    type: string\n    default: world\ntemplate: \"Hello {{ who }}!\"\n",
        )
        .unwrap();
        dir
    }

    #[test]
    fn test_ls() {
        let dir = commands_dir();
        let mut out = Vec::new();
        ls(dir.path(), &mut out).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "greet\npeople/users\tList users\n");
    }

    #[tokio::test]
    async fn test_run_rows_and_writer() {
        let dir = commands_dir();

        let mut out = Vec::new();
        run_one(dir.path(), "people/users", "role=guest&output=table&table-format=csv", &mut out)
            .await
            .unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "name,role\nbob,guest\n");

        let mut out = Vec::new();
        run_one(dir.path(), "greet", "who=tablegate", &mut out).await.unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "Hello tablegate!");
    }

    #[tokio::test]
    async fn test_run_errors() {
        let dir = commands_dir();
        let mut out = Vec::new();

        let err = run_one(dir.path(), "nope", "", &mut out).await.unwrap_err();
        assert!(matches!(err, CliError::Command(CommandError::NotFound(_))));
        assert_eq!(err.exit_code(), 1);

        let err = run_one(dir.path(), "people/users", "output=xml", &mut out).await.unwrap_err();
        assert!(matches!(err, CliError::Parameter(_)));
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn test_serve_needs_a_source() {
        assert!(matches!(server_config(None, None), Err(CliError::Usage(_))));

        let dir = commands_dir();
        let config = server_config(None, Some(dir.path().to_path_buf())).unwrap();
        assert_eq!(config.routes.len(), 1);
        assert_eq!(config.routes[0].path, "/");
    }
}
