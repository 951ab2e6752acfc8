//! CLI for filling DOCX templates.
//!
//! ## Usage
//!
//! ```bash
//! # List the placeholders of a template
//! stencil scan contract.docx
//!
//! # Fill a template directly
//! stencil render contract.docx --set NAME="Acme Corp" -o filled.docx
//!
//! # Stored workflow: upload once, fill many times
//! stencil --expert Olena template upload contract.docx
//! stencil --expert Olena vars list
//! stencil --expert Olena fill --set NAME="Acme Corp"
//! ```

mod commands;
mod output;

use std::path::PathBuf;

use clap::{ArgAction, Parser, Subcommand, ValueHint};
use stencil_lib::{StoreError, TemplateError};
use thiserror::Error;
use tracing_subscriber::{filter::EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Fill DOCX templates from named placeholders
#[derive(Debug, Parser)]
#[command(name = "stencil", version, about, long_about = None)]
#[command(after_help = AFTER_HELP)]
struct Cli {
    /// Directory holding the database and the uploaded template
    #[arg(long, global = true, env = "STENCIL_DATA_DIR", value_name = "DIR", value_hint = ValueHint::DirPath)]
    data_dir: Option<PathBuf>,

    /// Expert on whose behalf stored commands run (created by the first command that saves something)
    #[arg(long, global = true, env = "STENCIL_EXPERT", value_name = "NAME")]
    expert: Option<String>,

    /// Print results as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short = 'v', action = ArgAction::Count, global = true)]
    log_verbosity: u8,

    /// Output logs as JSON
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// List the placeholders found in a template
    Scan {
        /// Template to scan
        #[arg(value_name = "TEMPLATE", value_hint = ValueHint::FilePath)]
        template: PathBuf,
    },

    /// Fill a template with the given values, without touching the store
    Render {
        /// Template to fill
        #[arg(value_name = "TEMPLATE", value_hint = ValueHint::FilePath)]
        template: PathBuf,

        /// A value to substitute, as KEY=VALUE (repeatable)
        #[arg(long = "set", value_name = "KEY=VALUE", value_parser = parse_binding)]
        set: Vec<(String, String)>,

        /// JSON object of values; --set entries take precedence
        #[arg(long, value_name = "FILE", value_hint = ValueHint::FilePath)]
        values: Option<PathBuf>,

        /// Output file [default: expertise_<timestamp>.docx]
        #[arg(short, long, value_name = "FILE", value_hint = ValueHint::FilePath)]
        output: Option<PathBuf>,
    },

    /// Manage the stored template
    #[command(subcommand)]
    Template(TemplateCommand),

    /// Manage the expert's variables
    #[command(subcommand)]
    Vars(VarsCommand),

    /// Show or edit the expert's details
    #[command(subcommand)]
    Expert(ExpertCommand),

    /// Fill the stored template with the expert's variables
    Fill {
        /// A variable value, as KEY=VALUE (repeatable); unset variables are left empty
        #[arg(long = "set", value_name = "KEY=VALUE", value_parser = parse_binding)]
        set: Vec<(String, String)>,

        /// Output file [default: expertise_<timestamp>.docx]
        #[arg(short, long, value_name = "FILE", value_hint = ValueHint::FilePath)]
        output: Option<PathBuf>,
    },
}

#[derive(Debug, Subcommand)]
enum TemplateCommand {
    /// Store a template and register its placeholders as variables
    Upload {
        /// Template file to store
        #[arg(value_name = "FILE", value_hint = ValueHint::FilePath)]
        file: PathBuf,
    },

    /// Show the stored template
    Show,
}

#[derive(Debug, Subcommand)]
enum VarsCommand {
    /// List variables
    List,

    /// Add or update a variable
    Add {
        /// Variable name, as used inside the braces
        key: String,

        /// Description shown next to the variable
        #[arg(short, long, default_value = "")]
        description: String,
    },

    /// Delete a variable by id
    Delete {
        /// Variable id, as shown by `vars list`
        id: u64,
    },
}

#[derive(Debug, Subcommand)]
enum ExpertCommand {
    /// Show the expert record
    Show,

    /// Replace the expert's details
    Details {
        /// New details text
        text: String,
    },
}

const AFTER_HELP: &str = "\
PLACEHOLDERS:
  A placeholder is a name in single braces, e.g. {CLIENT_NAME}. Placeholders
  may be split across formatting runs inside one paragraph. Placeholders with
  no value are replaced by an empty string.

ENVIRONMENT:
  STENCIL_DATA_DIR   Same as --data-dir
  STENCIL_EXPERT     Same as --expert
  RUST_LOG           Log filter, overrides -v

EXAMPLES:
  stencil scan contract.docx
  stencil render contract.docx --set NAME=\"Acme Corp\" -o out.docx
  stencil --expert Olena template upload contract.docx
  stencil --expert Olena fill --set NAME=\"Acme Corp\"
";

#[derive(Debug, Error)]
enum CliError {
    #[error(transparent)]
    Template(#[from] TemplateError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("failed to access `{path}`: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid values file `{path}`: {source}")]
    Values {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to encode output: {0}")]
    Output(#[from] serde_json::Error),

    #[error("no data directory: pass --data-dir or set STENCIL_DATA_DIR")]
    NoDataDir,

    #[error("no expert selected: pass --expert or set STENCIL_EXPERT")]
    MissingExpert,

    #[error("invalid variable name: {0}")]
    InvalidKey(String),

    #[error("expert name must not be empty")]
    EmptyExpertName,

    #[error("no expert named `{0}` yet")]
    UnknownExpert(String),

    #[error("no template uploaded yet: run `stencil template upload <FILE>`")]
    NoTemplate,

    #[error("template file `{0}` is missing, upload it again")]
    TemplateMissing(PathBuf),

    #[error("no variable with id {0}")]
    UnknownVariable(u64),
}

/// Parses a `KEY=VALUE` pair. The key is trimmed and must not be empty.
fn parse_binding(s: &str) -> Result<(String, String), String> {
    let (key, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=VALUE, got `{s}`"))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(format!("empty key in `{s}`"));
    }
    if key.contains(['{', '}']) {
        return Err(format!("key must not contain braces: `{key}`"));
    }
    Ok((key.to_string(), value.to_string()))
}

fn init_tracing(verbose: u8, json: bool) {
    // RUST_LOG wins over -v flags
    let base_filter = match std::env::var("RUST_LOG") {
        Ok(filter) => filter,
        Err(_) => match verbose {
            0 => "warn".to_string(),
            1 => "warn,stencil_lib=info,stencil=info".to_string(),
            2 => "info,stencil_lib=debug,stencil=debug".to_string(),
            _ => "debug,stencil_lib=trace,stencil=trace".to_string(),
        },
    };

    let filter = EnvFilter::try_new(&base_filter).unwrap_or_else(|_| EnvFilter::new("warn"));

    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .with_target(true)
                    .with_level(true)
                    .with_file(verbose >= 3)
                    .with_line_number(verbose >= 3)
                    .with_writer(std::io::stderr)
                    .compact(),
            )
            .init();
    }
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.log_verbosity, cli.log_json);

    if let Err(e) = commands::run(cli) {
        tracing::debug!(error = ?e, "Command failed");
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clap_definition_is_valid() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn parse_binding_splits_on_first_equals() {
        assert_eq!(
            parse_binding("FORMULA=a=b").unwrap(),
            ("FORMULA".to_string(), "a=b".to_string())
        );
    }

    #[test]
    fn parse_binding_trims_key_and_keeps_value() {
        assert_eq!(
            parse_binding(" NAME = Acme ").unwrap(),
            ("NAME".to_string(), " Acme ".to_string())
        );
    }

    #[test]
    fn parse_binding_allows_empty_value() {
        assert_eq!(
            parse_binding("NAME=").unwrap(),
            ("NAME".to_string(), String::new())
        );
    }

    #[test]
    fn parse_binding_rejects_bad_input() {
        assert!(parse_binding("NAME").is_err());
        assert!(parse_binding("=value").is_err());
        assert!(parse_binding("{NAME}=value").is_err());
    }

    #[test]
    fn clap_accepts_repeated_set() {
        let cli = Cli::try_parse_from([
            "stencil", "render", "t.docx", "--set", "A=1", "--set", "B=2",
        ])
        .unwrap();
        match cli.command {
            Commands::Render { set, .. } => assert_eq!(set.len(), 2),
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn global_flags_work_after_subcommand() {
        let cli = Cli::try_parse_from(["stencil", "vars", "list", "--expert", "Olena", "--json"])
            .unwrap();
        assert_eq!(cli.expert.as_deref(), Some("Olena"));
        assert!(cli.json);
    }

    #[test]
    fn clap_rejects_malformed_set() {
        let result = Cli::try_parse_from(["stencil", "fill", "--set", "novalue"]);
        assert!(result.is_err());
    }

    #[test]
    fn subcommand_is_required() {
        assert!(Cli::try_parse_from(["stencil"]).is_err());
    }
}
