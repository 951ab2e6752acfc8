//! Command handlers.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::Utc;
use stencil_lib::{Bindings, Expert, JsonFileStore, RecordStore, default_data_dir};

use crate::output::{self, OutputFormat};
use crate::{Cli, CliError, Commands, ExpertCommand, TemplateCommand, VarsCommand};

/// File name of the uploaded template inside the data directory.
const TEMPLATE_FILENAME: &str = "template.docx";

/// Resolved global options shared by the stored commands.
struct Context {
    data_dir: Option<PathBuf>,
    expert: Option<String>,
    format: OutputFormat,
}

impl Context {
    fn data_dir(&self) -> Result<PathBuf, CliError> {
        self.data_dir
            .clone()
            .or_else(default_data_dir)
            .ok_or(CliError::NoDataDir)
    }

    fn store(&self) -> Result<(PathBuf, JsonFileStore), CliError> {
        let data_dir = self.data_dir()?;
        let store = JsonFileStore::in_dir(&data_dir);
        Ok((data_dir, store))
    }

    fn expert_name(&self) -> Result<&str, CliError> {
        let name = self.expert.as_deref().ok_or(CliError::MissingExpert)?.trim();
        if name.is_empty() {
            return Err(CliError::EmptyExpertName);
        }
        Ok(name)
    }

}

pub fn run(cli: Cli) -> Result<(), CliError> {
    let ctx = Context {
        data_dir: cli.data_dir,
        expert: cli.expert,
        format: OutputFormat::from_flag(cli.json),
    };

    match cli.command {
        Commands::Scan { template } => scan(&ctx, &template),
        Commands::Render {
            template,
            set,
            values,
            output,
        } => render(&ctx, &template, set, values.as_deref(), output),
        Commands::Template(TemplateCommand::Upload { file }) => upload_template(&ctx, &file),
        Commands::Template(TemplateCommand::Show) => show_template(&ctx),
        Commands::Vars(VarsCommand::List) => list_variables(&ctx),
        Commands::Vars(VarsCommand::Add { key, description }) => {
            add_variable(&ctx, &key, &description)
        }
        Commands::Vars(VarsCommand::Delete { id }) => delete_variable(&ctx, id),
        Commands::Expert(ExpertCommand::Show) => show_expert(&ctx),
        Commands::Expert(ExpertCommand::Details { text }) => save_details(&ctx, &text),
        Commands::Fill { set, output } => fill(&ctx, set, output),
    }
}

/// Default output name, `expertise_<YYYYmmdd_HHMMSS>.docx` in UTC.
fn default_output_name() -> PathBuf {
    PathBuf::from(format!(
        "expertise_{}.docx",
        Utc::now().format("%Y%m%d_%H%M%S")
    ))
}

fn write_output(path: &Path, bytes: &[u8]) -> Result<(), CliError> {
    fs::write(path, bytes).map_err(|source| CliError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    tracing::info!(path = %path.display(), bytes = bytes.len(), "Wrote document");
    Ok(())
}

fn read_values(path: &Path) -> Result<Bindings, CliError> {
    let content = fs::read_to_string(path).map_err(|source| CliError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&content).map_err(|source| CliError::Values {
        path: path.to_path_buf(),
        source,
    })
}

fn scan(ctx: &Context, template: &Path) -> Result<(), CliError> {
    let names = stencil_lib::scan_path(template)?;
    output::names(ctx.format, &names)
}

fn render(
    ctx: &Context,
    template: &Path,
    set: Vec<(String, String)>,
    values: Option<&Path>,
    output: Option<PathBuf>,
) -> Result<(), CliError> {
    let mut bindings = match values {
        Some(path) => read_values(path)?,
        None => Bindings::new(),
    };
    bindings.extend(set);

    let bytes = stencil_lib::render_path(template, &bindings)?;
    let output = output.unwrap_or_else(default_output_name);
    write_output(&output, &bytes)?;
    output::written(ctx.format, &output, None)
}

fn upload_template(ctx: &Context, file: &Path) -> Result<(), CliError> {
    // Reject anything that is not a readable DOCX before touching the data directory
    let placeholders = stencil_lib::scan_path(file)?;

    let (data_dir, store) = ctx.store()?;
    let name = ctx.expert_name()?;

    fs::create_dir_all(&data_dir).map_err(|source| CliError::Io {
        path: data_dir.clone(),
        source,
    })?;
    let destination = data_dir.join(TEMPLATE_FILENAME);
    if is_same_file(file, &destination) {
        tracing::debug!(path = %destination.display(), "Template already in place");
    } else {
        fs::copy(file, &destination).map_err(|source| CliError::Io {
            path: destination.clone(),
            source,
        })?;
    }

    let created = store.update(|db| {
        let expert = db.get_or_create_expert(name);
        let created = db.add_placeholders(expert.id, placeholders.iter().map(String::as_str));
        db.save_template_metadata(TEMPLATE_FILENAME);
        Ok(created)
    })?;
    tracing::info!(
        placeholders = placeholders.len(),
        created,
        "Uploaded template"
    );

    output::uploaded(ctx.format, &destination, &placeholders, created)
}

/// Whether both paths resolve to the same existing file.
fn is_same_file(a: &Path, b: &Path) -> bool {
    match (fs::canonicalize(a), fs::canonicalize(b)) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

fn show_template(ctx: &Context) -> Result<(), CliError> {
    let (data_dir, store) = ctx.store()?;
    let db = store.load()?;
    let meta = db.template_metadata().ok_or(CliError::NoTemplate)?;
    output::template(ctx.format, meta, &data_dir.join(&meta.filename))
}

fn list_variables(ctx: &Context) -> Result<(), CliError> {
    let (_, store) = ctx.store()?;
    let name = ctx.expert_name()?;
    let db = store.load()?;
    let variables = match db.expert_by_name(name) {
        Some(expert) => db.list_variables(expert.id),
        None => Vec::new(),
    };
    output::variables(ctx.format, &variables)
}

fn add_variable(ctx: &Context, key: &str, description: &str) -> Result<(), CliError> {
    let key = crate::parse_binding(&format!("{key}="))
        .map_err(CliError::InvalidKey)?
        .0;
    let (_, store) = ctx.store()?;
    let name = ctx.expert_name()?;
    let var = store.update(|db| {
        let expert = db.get_or_create_expert(name);
        Ok(db
            .upsert_variable(expert.id, &key, description.trim(), false)
            .clone())
    })?;
    output::variable(ctx.format, &var)
}

fn delete_variable(ctx: &Context, id: u64) -> Result<(), CliError> {
    let (_, store) = ctx.store()?;
    let name = ctx.expert_name()?;
    let deleted = store.update(|db| {
        let expert = db.get_or_create_expert(name);
        Ok(db.delete_variable(expert.id, id))
    })?;
    if !deleted {
        return Err(CliError::UnknownVariable(id));
    }
    output::deleted(ctx.format, id)
}

fn show_expert(ctx: &Context) -> Result<(), CliError> {
    let (_, store) = ctx.store()?;
    let name = ctx.expert_name()?;
    let db = store.load()?;
    let expert = db
        .expert_by_name(name)
        .ok_or_else(|| CliError::UnknownExpert(name.to_owned()))?;
    output::expert(ctx.format, expert)
}

fn save_details(ctx: &Context, text: &str) -> Result<(), CliError> {
    let (_, store) = ctx.store()?;
    let name = ctx.expert_name()?;
    let expert = store.update(|db| {
        let expert = db.get_or_create_expert(name);
        db.save_expert_details(expert.id, text)?;
        Ok(Expert {
            details: text.to_owned(),
            ..expert
        })
    })?;
    output::expert(ctx.format, &expert)
}

/// Values for each of the expert's variables; unset ones are empty, all are trimmed.
fn collect_values<'a>(
    keys: impl IntoIterator<Item = &'a str>,
    set: &[(String, String)],
) -> BTreeMap<String, String> {
    let supplied: BTreeMap<&str, &str> = set
        .iter()
        .map(|(key, value)| (key.as_str(), value.as_str()))
        .collect();
    keys.into_iter()
        .map(|key| {
            let value = supplied.get(key).copied().unwrap_or_default().trim();
            (key.to_owned(), value.to_owned())
        })
        .collect()
}

fn fill(ctx: &Context, set: Vec<(String, String)>, output: Option<PathBuf>) -> Result<(), CliError> {
    let (data_dir, store) = ctx.store()?;
    let name = ctx.expert_name()?;

    let db = store.load()?;
    let meta = db.template_metadata().ok_or(CliError::NoTemplate)?;
    let template = data_dir.join(&meta.filename);
    if !template.is_file() {
        return Err(CliError::TemplateMissing(template));
    }

    let keys: Vec<&str> = match db.expert_by_name(name) {
        Some(expert) => db
            .list_variables(expert.id)
            .into_iter()
            .map(|var| var.key.as_str())
            .collect(),
        None => Vec::new(),
    };
    for (key, _) in &set {
        if !keys.contains(&key.as_str()) {
            tracing::warn!(key = %key, "Ignoring value for unknown variable");
        }
    }
    let values = collect_values(keys, &set);

    // The record is only kept for a document that was actually written
    let bytes = stencil_lib::render_path(&template, &values)?;
    let output = output.unwrap_or_else(default_output_name);
    write_output(&output, &bytes)?;

    let expertise_id = store.update(|db| {
        let expert = db.get_or_create_expert(name);
        Ok(db.save_expertise(expert.id, &expert.name, values))
    })?;
    output::written(ctx.format, &output, Some(expertise_id))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pairs(items: &[(&str, &str)]) -> Vec<(String, String)> {
        items
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn collect_values_fills_missing_with_empty_and_trims() {
        let values = collect_values(["NAME", "DATE"], &pairs(&[("NAME", "  Acme  ")]));
        assert_eq!(values["NAME"], "Acme");
        assert_eq!(values["DATE"], "");
        assert_eq!(values.len(), 2);
    }

    #[test]
    fn collect_values_ignores_unknown_keys() {
        let values = collect_values(["NAME"], &pairs(&[("OTHER", "x")]));
        assert_eq!(values.len(), 1);
        assert!(!values.contains_key("OTHER"));
    }

    #[test]
    fn collect_values_last_set_wins() {
        let values = collect_values(["A"], &pairs(&[("A", "1"), ("A", "2")]));
        assert_eq!(values["A"], "2");
    }

    #[test]
    fn default_output_name_has_timestamp_shape() {
        let name = default_output_name();
        let name = name.to_str().unwrap();
        assert!(name.starts_with("expertise_"));
        assert!(name.ends_with(".docx"));
        // expertise_ + YYYYmmdd_HHMMSS + .docx
        assert_eq!(name.len(), "expertise_".len() + 15 + ".docx".len());
    }

    #[test]
    fn expert_name_is_trimmed_and_required() {
        let ctx = |expert: Option<&str>| Context {
            data_dir: None,
            expert: expert.map(str::to_owned),
            format: OutputFormat::Human,
        };
        assert_eq!(ctx(Some("  Olena ")).expert_name().unwrap(), "Olena");
        assert!(matches!(
            ctx(None).expert_name(),
            Err(CliError::MissingExpert)
        ));
        assert!(matches!(
            ctx(Some("   ")).expert_name(),
            Err(CliError::EmptyExpertName)
        ));
    }
}
