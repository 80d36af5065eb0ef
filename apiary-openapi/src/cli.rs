//! The `openapi` command group.
//!
//! Applications nest [`OpenApiCommand`] in their own clap command and hand
//! it to [`execute`] together with their [`ApiRegistry`]:
//!
//! ```ignore
//! #[derive(Subcommand)]
//! enum Commands {
//!     /// OpenAPI commands
//!     Openapi {
//!         #[command(subcommand)]
//!         command: OpenApiCommand,
//!     },
//! }
//! ```

use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand, ValueEnum};

use crate::registry::ApiRegistry;
use crate::spec::Spec;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum Format {
    #[default]
    Json,
    Yaml,
}

/// Standalone entry point for binaries that only expose these commands.
#[derive(Debug, Parser)]
#[command(name = "openapi", about = "OpenAPI commands")]
pub struct OpenApiCli {
    #[command(subcommand)]
    pub command: OpenApiCommand,
}

#[derive(Debug, Clone, Subcommand)]
pub enum OpenApiCommand {
    /// Print the OpenAPI document
    Print {
        /// Output format
        #[arg(short, long, value_enum, default_value_t = Format::Json)]
        format: Format,
        /// Config prefix of the API
        #[arg(long, default_value = "")]
        config_prefix: String,
    },
    /// Write the OpenAPI document to a file
    Write {
        /// Output format
        #[arg(short, long, value_enum, default_value_t = Format::Json)]
        format: Format,
        /// Config prefix of the API
        #[arg(long, default_value = "")]
        config_prefix: String,
        /// Destination file
        output_file: PathBuf,
    },
    /// List the config prefixes of the registered APIs
    ListConfigPrefixes,
}

#[derive(Debug)]
pub enum CliError {
    UnknownConfigPrefix { prefix: String, available: Vec<String> },
    Io(std::io::Error),
    Serialize(String),
}

impl std::fmt::Display for CliError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CliError::UnknownConfigPrefix { prefix, available } => {
                write!(f, "config prefix \"{prefix}\" not available. Use one of:")?;
                for key in available {
                    write!(f, "\n    \"{key}\"")?;
                }
                Ok(())
            }
            CliError::Io(e) => write!(f, "{e}"),
            CliError::Serialize(msg) => write!(f, "Failed to render the document: {msg}"),
        }
    }
}

impl std::error::Error for CliError {}

impl From<std::io::Error> for CliError {
    fn from(err: std::io::Error) -> Self {
        CliError::Io(err)
    }
}

/// Run `command`, writing its output to `out`.
pub fn run(command: &OpenApiCommand, registry: &ApiRegistry, out: &mut impl Write) -> Result<(), CliError> {
    match command {
        OpenApiCommand::Print {
            format,
            config_prefix,
        } => {
            let spec = lookup(registry, config_prefix)?;
            out.write_all(render(spec, *format)?.as_bytes())?;
        }
        OpenApiCommand::Write {
            format,
            config_prefix,
            output_file,
        } => {
            let spec = lookup(registry, config_prefix)?;
            write_document(spec, *format, output_file)?;
        }
        OpenApiCommand::ListConfigPrefixes => {
            for prefix in registry.prefixes() {
                writeln!(out, "\"{prefix}\"")?;
            }
        }
    }
    Ok(())
}

/// Run `command` against stdout, reporting errors on stderr.
pub fn execute(command: &OpenApiCommand, registry: &ApiRegistry) -> ExitCode {
    let stdout = std::io::stdout();
    match run(command, registry, &mut stdout.lock()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn lookup<'a>(registry: &'a ApiRegistry, prefix: &str) -> Result<&'a Spec, CliError> {
    registry
        .get(prefix)
        .map(|api| api.spec())
        .ok_or_else(|| CliError::UnknownConfigPrefix {
            prefix: prefix.to_string(),
            available: registry.prefixes().map(str::to_string).collect(),
        })
}

/// The document in `format`, newline terminated.
pub fn render(spec: &Spec, format: Format) -> Result<String, CliError> {
    let mut document = match format {
        Format::Json => spec
            .to_json_string()
            .map_err(|e| CliError::Serialize(e.to_string()))?,
        Format::Yaml => spec
            .to_yaml_string()
            .map_err(|e| CliError::Serialize(e.to_string()))?,
    };
    if !document.ends_with('\n') {
        document.push('\n');
    }
    Ok(document)
}

fn write_document(spec: &Spec, format: Format, path: &Path) -> Result<(), CliError> {
    std::fs::write(path, render(spec, format)?)?;
    tracing::info!(path = %path.display(), ?format, "OpenAPI document written");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_commands() {
        let cli = OpenApiCli::parse_from(["openapi", "print", "-f", "yaml", "--config-prefix", "v1"]);
        assert!(matches!(
            cli.command,
            OpenApiCommand::Print { format: Format::Yaml, ref config_prefix } if config_prefix == "v1"
        ));
        let cli = OpenApiCli::parse_from(["openapi", "write", "out.json"]);
        assert!(matches!(
            cli.command,
            OpenApiCommand::Write { format: Format::Json, ref output_file, .. } if output_file == Path::new("out.json")
        ));
        let cli = OpenApiCli::parse_from(["openapi", "list-config-prefixes"]);
        assert!(matches!(cli.command, OpenApiCommand::ListConfigPrefixes));
    }

    #[test]
    fn unknown_prefix_message() {
        let err = CliError::UnknownConfigPrefix {
            prefix: "v3".into(),
            available: vec!["".into(), "V1_".into()],
        };
        assert_eq!(
            err.to_string(),
            "config prefix \"v3\" not available. Use one of:\n    \"\"\n    \"V1_\""
        );
    }
}
