//! Record storage for experts, variables, expertise records and template metadata.
//!
//! All records live in one [`Database`] value. The primary backend is a
//! single JSON file rewritten under an exclusive file lock, so concurrent
//! CLI invocations never interleave partial writes.

use std::collections::BTreeMap;
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use chrono::Utc;
use fs2::FileExt;
use serde::{Deserialize, Serialize};

use crate::error::StoreError;
use crate::types::{Expert, Expertise, TemplateMeta, Variable};

/// Default database file name inside the data directory.
const DEFAULT_DATABASE_FILE: &str = "db.json";

/// Application directory name under the platform data directory.
const APP_DIR: &str = "stencil";

/// Returns the platform data directory for stencil (e.g. `~/.local/share/stencil`).
pub fn default_data_dir() -> Option<PathBuf> {
    dirs::data_dir().map(|dir| dir.join(APP_DIR))
}

/// Every stored record.
///
/// Ids are allocated per table, starting at 1, one above the highest id
/// present.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Database {
    #[serde(default)]
    experts: Vec<Expert>,
    #[serde(default)]
    variables: Vec<Variable>,
    #[serde(default)]
    expertises: Vec<Expertise>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    template: Option<TemplateMeta>,
}

impl Database {
    pub fn expert(&self, id: u64) -> Option<&Expert> {
        self.experts.iter().find(|expert| expert.id == id)
    }

    pub fn expert_by_name(&self, name: &str) -> Option<&Expert> {
        self.experts.iter().find(|expert| expert.name == name)
    }

    /// Returns the expert named `name`, creating it if necessary.
    pub fn get_or_create_expert(&mut self, name: &str) -> Expert {
        if let Some(existing) = self.expert_by_name(name) {
            return existing.clone();
        }
        let expert = Expert {
            id: next_id(self.experts.iter().map(|e| e.id)),
            name: name.to_owned(),
            details: String::new(),
        };
        tracing::info!(id = expert.id, name, "Created expert");
        self.experts.push(expert.clone());
        expert
    }

    /// Replaces the free-form details of an expert.
    ///
    /// ## Errors
    ///
    /// Returns [`StoreError::UnknownExpert`] if no such expert exists.
    pub fn save_expert_details(&mut self, expert_id: u64, details: &str) -> Result<(), StoreError> {
        let expert = self
            .experts
            .iter_mut()
            .find(|expert| expert.id == expert_id)
            .ok_or(StoreError::UnknownExpert(expert_id))?;
        expert.details = details.to_owned();
        Ok(())
    }

    /// Variables owned by an expert, in creation order.
    pub fn list_variables(&self, expert_id: u64) -> Vec<&Variable> {
        self.variables
            .iter()
            .filter(|var| var.expert_id == expert_id)
            .collect()
    }

    /// Inserts or replaces the variable identified by `(expert_id, key)`.
    ///
    /// An existing variable keeps its id.
    pub fn upsert_variable(
        &mut self,
        expert_id: u64,
        key: &str,
        description: &str,
        auto_created: bool,
    ) -> &Variable {
        let position = self
            .variables
            .iter()
            .position(|var| var.expert_id == expert_id && var.key == key);

        let index = match position {
            Some(index) => {
                let var = &mut self.variables[index];
                var.description = description.to_owned();
                var.auto_created = auto_created;
                index
            }
            None => {
                let id = next_id(self.variables.iter().map(|v| v.id));
                self.variables.push(Variable {
                    id,
                    expert_id,
                    key: key.to_owned(),
                    description: description.to_owned(),
                    auto_created,
                });
                self.variables.len() - 1
            }
        };
        &self.variables[index]
    }

    /// Creates auto-created variables for placeholder names the expert does not have yet.
    ///
    /// Returns how many variables were created.
    pub fn add_placeholders<'a, I>(&mut self, expert_id: u64, names: I) -> usize
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut created = 0;
        for name in names {
            let exists = self
                .variables
                .iter()
                .any(|var| var.expert_id == expert_id && var.key == name);
            if !exists {
                self.upsert_variable(expert_id, name, "", true);
                created += 1;
            }
        }
        created
    }

    /// Removes a variable if it belongs to `expert_id`.
    ///
    /// Returns whether a variable was removed.
    pub fn delete_variable(&mut self, expert_id: u64, id: u64) -> bool {
        let before = self.variables.len();
        self.variables
            .retain(|var| !(var.id == id && var.expert_id == expert_id));
        self.variables.len() != before
    }

    /// Records a filled template and returns its id.
    pub fn save_expertise(
        &mut self,
        expert_id: u64,
        expert_name: &str,
        variables: BTreeMap<String, String>,
    ) -> u64 {
        let id = next_id(self.expertises.iter().map(|e| e.id));
        self.expertises.push(Expertise {
            id,
            expert_id,
            expert: expert_name.to_owned(),
            variables,
            created_at: Utc::now(),
        });
        id
    }

    pub fn expertises(&self, expert_id: u64) -> Vec<&Expertise> {
        self.expertises
            .iter()
            .filter(|record| record.expert_id == expert_id)
            .collect()
    }

    /// Records `filename` as the current template.
    pub fn save_template_metadata(&mut self, filename: &str) {
        self.template = Some(TemplateMeta {
            filename: filename.to_owned(),
            uploaded_at: Utc::now(),
        });
    }

    pub fn template_metadata(&self) -> Option<&TemplateMeta> {
        self.template.as_ref()
    }
}

fn next_id(ids: impl Iterator<Item = u64>) -> u64 {
    ids.max().unwrap_or(0) + 1
}

/// Trait for record storage backends.
///
/// Implementations must handle concurrent access safely.
pub trait RecordStore {
    /// Loads the whole database.
    ///
    /// ## Errors
    ///
    /// Returns an error if reading or parsing fails.
    fn load(&self) -> Result<Database, StoreError>;

    /// Applies `change` to the database and persists the result atomically
    /// with respect to other users of the same store.
    ///
    /// ## Errors
    ///
    /// Returns an error if reading, parsing or writing fails. `change` itself
    /// may fail, in which case nothing is written.
    fn update<T, F>(&self, change: F) -> Result<T, StoreError>
    where
        F: FnOnce(&mut Database) -> Result<T, StoreError>;
}

/// JSON file-based record storage.
///
/// Stores the database as one pretty-printed JSON document with file
/// locking for safe concurrent access. Uses `fs2` for cross-platform file
/// locking.
///
/// ## Examples
///
/// ```no_run
/// use stencil_lib::{JsonFileStore, RecordStore};
///
/// let store = JsonFileStore::new("/tmp/stencil-db.json".into());
/// let expert = store.update(|db| Ok(db.get_or_create_expert("Olena"))).unwrap();
///
/// let db = store.load().unwrap();
/// assert_eq!(db.expert(expert.id).unwrap().name, "Olena");
/// ```
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    /// Creates a new JSON file store at the given path.
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// Creates a store using the default file name inside `data_dir`.
    pub fn in_dir(data_dir: &Path) -> Self {
        Self::new(data_dir.join(DEFAULT_DATABASE_FILE))
    }

    /// Returns the path to the database file.
    pub fn path(&self) -> &PathBuf {
        &self.path
    }

    /// Ensures the database file exists, creating it if necessary.
    fn ensure_file_exists(&self) -> Result<(), StoreError> {
        if !self.path.exists() {
            if let Some(parent) = self.path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            File::create(&self.path)?;
        }
        Ok(())
    }
}

fn read_database(file: &mut File) -> Result<Database, StoreError> {
    let mut contents = String::new();
    file.read_to_string(&mut contents)?;
    if contents.trim().is_empty() {
        return Ok(Database::default());
    }
    Ok(serde_json::from_str(&contents)?)
}

impl RecordStore for JsonFileStore {
    fn load(&self) -> Result<Database, StoreError> {
        if !self.path.exists() {
            return Ok(Database::default());
        }

        let mut file = File::open(&self.path)?;
        file.lock_shared().map_err(|_| StoreError::Lock)?;

        let database = read_database(&mut file);

        file.unlock().map_err(|_| StoreError::Lock)?;
        database
    }

    fn update<T, F>(&self, change: F) -> Result<T, StoreError>
    where
        F: FnOnce(&mut Database) -> Result<T, StoreError>,
    {
        self.ensure_file_exists()?;

        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(&self.path)?;

        file.lock_exclusive().map_err(|_| StoreError::Lock)?;

        let result = read_database(&mut file).and_then(|mut database| {
            let value = change(&mut database)?;
            let json = serde_json::to_string_pretty(&database)?;
            file.set_len(0)?;
            file.seek(SeekFrom::Start(0))?;
            file.write_all(json.as_bytes())?;
            file.write_all(b"\n")?;
            file.flush()?;
            Ok(value)
        });

        file.unlock().map_err(|_| StoreError::Lock)?;
        if result.is_ok() {
            tracing::debug!(path = %self.path.display(), "Saved database");
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn create_test_store() -> (JsonFileStore, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let store = JsonFileStore::in_dir(temp_dir.path());
        (store, temp_dir)
    }

    #[test]
    fn load_returns_empty_database_for_nonexistent_file() {
        let (store, _temp_dir) = create_test_store();
        let db = store.load().unwrap();
        assert_eq!(db, Database::default());
    }

    #[test]
    fn empty_file_reads_as_empty_database() {
        let (store, _temp_dir) = create_test_store();
        std::fs::write(store.path(), "").unwrap();
        assert_eq!(store.load().unwrap(), Database::default());
    }

    #[test]
    fn get_or_create_expert_is_idempotent_by_name() {
        let mut db = Database::default();
        let first = db.get_or_create_expert("Olena");
        let second = db.get_or_create_expert("Olena");
        let other = db.get_or_create_expert("Taras");

        assert_eq!(first, second);
        assert_eq!(first.id, 1);
        assert_eq!(other.id, 2);
    }

    #[test]
    fn save_expert_details_requires_existing_expert() {
        let mut db = Database::default();
        let expert = db.get_or_create_expert("Olena");

        db.save_expert_details(expert.id, "Certified appraiser").unwrap();
        assert_eq!(db.expert(expert.id).unwrap().details, "Certified appraiser");

        let result = db.save_expert_details(99, "nobody");
        assert!(matches!(result, Err(StoreError::UnknownExpert(99))));
    }

    #[test]
    fn upsert_variable_enforces_unique_key_per_expert() {
        let mut db = Database::default();
        let first_id = db.upsert_variable(1, "NAME", "first", false).id;
        let second = db.upsert_variable(1, "NAME", "second", false).clone();
        let other_expert = db.upsert_variable(2, "NAME", "", false).clone();

        assert_eq!(first_id, second.id);
        assert_eq!(second.description, "second");
        assert_ne!(other_expert.id, first_id);
        assert_eq!(db.list_variables(1).len(), 1);
        assert_eq!(db.list_variables(2).len(), 1);
    }

    #[test]
    fn add_placeholders_only_creates_missing_keys() {
        let mut db = Database::default();
        db.upsert_variable(1, "NAME", "Client name", false);

        let created = db.add_placeholders(1, ["NAME", "DATE", "AMOUNT"]);
        assert_eq!(created, 2);

        let vars = db.list_variables(1);
        let name = vars.iter().find(|v| v.key == "NAME").unwrap();
        assert_eq!(name.description, "Client name");
        assert!(!name.auto_created);
        assert!(vars.iter().filter(|v| v.key != "NAME").all(|v| v.auto_created));
    }

    #[test]
    fn delete_variable_checks_owner() {
        let mut db = Database::default();
        let id = db.upsert_variable(1, "NAME", "", false).id;

        assert!(!db.delete_variable(2, id));
        assert_eq!(db.list_variables(1).len(), 1);

        assert!(db.delete_variable(1, id));
        assert!(db.list_variables(1).is_empty());
        assert!(!db.delete_variable(1, id));
    }

    #[test]
    fn ids_are_not_reused_while_higher_ids_exist() {
        let mut db = Database::default();
        let a = db.upsert_variable(1, "A", "", false).id;
        let b = db.upsert_variable(1, "B", "", false).id;
        db.delete_variable(1, a);
        let c = db.upsert_variable(1, "C", "", false).id;
        assert_eq!((a, b, c), (1, 2, 3));
    }

    #[test]
    fn save_expertise_records_values() {
        let mut db = Database::default();
        let values = BTreeMap::from([("NAME".to_string(), "Acme".to_string())]);
        let id = db.save_expertise(1, "Olena", values.clone());

        let records = db.expertises(1);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].id, id);
        assert_eq!(records[0].variables, values);
    }

    #[test]
    fn template_metadata_is_a_single_record() {
        let mut db = Database::default();
        assert!(db.template_metadata().is_none());
        db.save_template_metadata("old.docx");
        db.save_template_metadata("template.docx");
        assert_eq!(db.template_metadata().unwrap().filename, "template.docx");
    }

    #[test]
    fn update_persists_changes() {
        let (store, _temp_dir) = create_test_store();

        let expert = store
            .update(|db| Ok(db.get_or_create_expert("Olena")))
            .unwrap();
        store
            .update(|db| Ok(db.add_placeholders(expert.id, ["NAME"])))
            .unwrap();

        let db = store.load().unwrap();
        assert_eq!(db.expert(expert.id).unwrap().name, "Olena");
        assert_eq!(db.list_variables(expert.id)[0].key, "NAME");
    }

    #[test]
    fn failed_change_writes_nothing() {
        let (store, _temp_dir) = create_test_store();
        store
            .update(|db| Ok(db.get_or_create_expert("Olena")))
            .unwrap();
        let before = std::fs::read_to_string(store.path()).unwrap();

        let result = store.update(|db| {
            db.get_or_create_expert("Taras");
            db.save_expert_details(42, "nope")
        });

        assert!(matches!(result, Err(StoreError::UnknownExpert(42))));
        assert_eq!(std::fs::read_to_string(store.path()).unwrap(), before);
    }

    #[test]
    fn corrupt_file_is_a_parse_error() {
        let (store, _temp_dir) = create_test_store();
        std::fs::write(store.path(), "{ not json").unwrap();
        assert!(matches!(store.load(), Err(StoreError::Parse(_))));
    }

    #[test]
    fn update_creates_missing_parent_directories() {
        let temp_dir = TempDir::new().unwrap();
        let store = JsonFileStore::in_dir(&temp_dir.path().join("nested").join("data"));
        store.update(|db| Ok(db.save_template_metadata("t.docx"))).unwrap();
        assert!(store.path().exists());
    }
}
