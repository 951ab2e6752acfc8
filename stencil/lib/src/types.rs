//! Record types persisted by the store.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A person filling templates. Variables and expertise records belong to an expert.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Expert {
    /// Unique identifier for the expert.
    pub id: u64,
    /// Display name; also the lookup key.
    pub name: String,
    /// Free-form details about the expert.
    #[serde(default)]
    pub details: String,
}

/// A named variable an expert can fill in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Variable {
    /// Unique identifier for the variable.
    pub id: u64,
    /// Owning expert.
    pub expert_id: u64,
    /// Placeholder name, unique per expert.
    pub key: String,
    /// Human readable description shown next to the input.
    #[serde(default)]
    pub description: String,
    /// Whether the variable was created from a scanned template rather than by hand.
    #[serde(default)]
    pub auto_created: bool,
}

impl Variable {
    /// The placeholder syntax for this variable, e.g. `{NAME}`.
    ///
    /// ## Examples
    ///
    /// ```
    /// use stencil_lib::Variable;
    ///
    /// let var = Variable {
    ///     id: 1,
    ///     expert_id: 1,
    ///     key: "NAME".to_string(),
    ///     description: String::new(),
    ///     auto_created: false,
    /// };
    /// assert_eq!(var.placeholder(), "{NAME}");
    /// ```
    pub fn placeholder(&self) -> String {
        format!("{{{}}}", self.key)
    }
}

/// A record of one filled template.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Expertise {
    /// Unique identifier for the record.
    pub id: u64,
    /// Expert who filled the template.
    pub expert_id: u64,
    /// Expert name at the time of filling.
    pub expert: String,
    /// Values used for the fill, keyed by variable name.
    pub variables: BTreeMap<String, String>,
    /// When the record was created.
    pub created_at: DateTime<Utc>,
}

/// Metadata of the currently uploaded template.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateMeta {
    /// File name of the template inside the data directory.
    pub filename: String,
    /// When the template was uploaded.
    pub uploaded_at: DateTime<Utc>,
}
