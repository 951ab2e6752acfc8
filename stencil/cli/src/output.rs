//! Result printing for human and JSON output.

use std::collections::BTreeSet;
use std::path::Path;

use serde::Serialize;
use stencil_lib::{Expert, TemplateMeta, Variable};

use crate::CliError;

/// Output mode chosen by the global `--json` flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    #[default]
    Human,
    Json,
}

impl OutputFormat {
    pub fn from_flag(json: bool) -> Self {
        if json { Self::Json } else { Self::Human }
    }
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<(), CliError> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

pub fn names(format: OutputFormat, names: &BTreeSet<String>) -> Result<(), CliError> {
    match format {
        OutputFormat::Json => print_json(names),
        OutputFormat::Human => {
            if names.is_empty() {
                eprintln!("No placeholders found");
            }
            for name in names {
                println!("{name}");
            }
            Ok(())
        }
    }
}

#[derive(Serialize)]
struct Written<'a> {
    output: &'a Path,
    #[serde(skip_serializing_if = "Option::is_none")]
    expertise_id: Option<u64>,
}

/// Reports a written document, and the expertise record it belongs to when there is one.
pub fn written(
    format: OutputFormat,
    output: &Path,
    expertise_id: Option<u64>,
) -> Result<(), CliError> {
    match format {
        OutputFormat::Json => print_json(&Written {
            output,
            expertise_id,
        }),
        OutputFormat::Human => {
            match expertise_id {
                Some(id) => println!("Wrote {} (expertise #{id})", output.display()),
                None => println!("Wrote {}", output.display()),
            }
            Ok(())
        }
    }
}

#[derive(Serialize)]
struct Uploaded<'a> {
    template: &'a Path,
    placeholders: &'a BTreeSet<String>,
    created: usize,
}

pub fn uploaded(
    format: OutputFormat,
    template: &Path,
    placeholders: &BTreeSet<String>,
    created: usize,
) -> Result<(), CliError> {
    match format {
        OutputFormat::Json => print_json(&Uploaded {
            template,
            placeholders,
            created,
        }),
        OutputFormat::Human => {
            println!("Stored template at {}", template.display());
            println!(
                "Found {} placeholder(s), {created} new variable(s)",
                placeholders.len()
            );
            for name in placeholders {
                println!("  {{{name}}}");
            }
            Ok(())
        }
    }
}

pub fn template(format: OutputFormat, meta: &TemplateMeta, path: &Path) -> Result<(), CliError> {
    match format {
        OutputFormat::Json => print_json(meta),
        OutputFormat::Human => {
            println!("{}", path.display());
            println!(
                "Uploaded {}",
                meta.uploaded_at.format("%Y-%m-%d %H:%M:%S UTC")
            );
            Ok(())
        }
    }
}

pub fn variables(format: OutputFormat, variables: &[&Variable]) -> Result<(), CliError> {
    match format {
        OutputFormat::Json => print_json(variables),
        OutputFormat::Human => {
            if variables.is_empty() {
                eprintln!("No variables");
            }
            for var in variables {
                let origin = if var.auto_created { " (auto)" } else { "" };
                if var.description.is_empty() {
                    println!("{:>4}  {}{origin}", var.id, var.placeholder());
                } else {
                    println!(
                        "{:>4}  {}{origin}  {}",
                        var.id,
                        var.placeholder(),
                        var.description
                    );
                }
            }
            Ok(())
        }
    }
}

pub fn variable(format: OutputFormat, var: &Variable) -> Result<(), CliError> {
    match format {
        OutputFormat::Json => print_json(var),
        OutputFormat::Human => {
            println!("Saved variable #{} {}", var.id, var.placeholder());
            Ok(())
        }
    }
}

#[derive(Serialize)]
struct Deleted {
    deleted: u64,
}

pub fn deleted(format: OutputFormat, id: u64) -> Result<(), CliError> {
    match format {
        OutputFormat::Json => print_json(&Deleted { deleted: id }),
        OutputFormat::Human => {
            println!("Deleted variable #{id}");
            Ok(())
        }
    }
}

pub fn expert(format: OutputFormat, expert: &Expert) -> Result<(), CliError> {
    match format {
        OutputFormat::Json => print_json(expert),
        OutputFormat::Human => {
            println!("#{} {}", expert.id, expert.name);
            if !expert.details.is_empty() {
                println!();
                println!("{}", expert.details);
            }
            Ok(())
        }
    }
}
