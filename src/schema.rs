//! Column schemas and the built-in schema registry.
//!
//! A [`Schema`] is the ordered list of [`ColumnSpec`] entries a model expects as
//! input. The [`SchemaRegistry`] holds the named schemas shipped with the
//! binary; it is built once on first use and never mutated afterwards. Ad-hoc
//! schemas supplied per request go through [`crate::validate`] instead and are
//! never stored here.

use std::{collections::BTreeMap, fmt, sync::OnceLock};

use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, PipelineResult};

pub const DEFAULT_SCHEMA_NAME: &str = "default";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DataType {
    String,
    Number,
    Integer,
    Float,
    Json,
    /// Any other declared type. Treated like `string` when classifying.
    #[serde(other)]
    Other,
}

impl DataType {
    pub fn from_label(label: &str) -> Self {
        match label {
            "string" => DataType::String,
            "number" => DataType::Number,
            "integer" => DataType::Integer,
            "float" => DataType::Float,
            "json" => DataType::Json,
            _ => DataType::Other,
        }
    }

    pub fn is_numeric(self) -> bool {
        matches!(self, DataType::Number | DataType::Integer | DataType::Float)
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            DataType::String => "string",
            DataType::Number => "number",
            DataType::Integer => "integer",
            DataType::Float => "float",
            DataType::Json => "json",
            DataType::Other => "other",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ColumnSpec {
    pub id: String,
    pub label: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_required")]
    pub required: bool,
    pub data_type: DataType,
    #[serde(default)]
    pub example: String,
}

fn default_required() -> bool {
    true
}

impl ColumnSpec {
    fn builtin(id: &str, label: &str, description: &str, data_type: DataType, example: &str) -> Self {
        Self {
            id: id.to_string(),
            label: label.to_string(),
            description: description.to_string(),
            required: true,
            data_type,
            example: example.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(transparent)]
pub struct Schema {
    pub columns: Vec<ColumnSpec>,
}

impl Schema {
    pub fn new(columns: Vec<ColumnSpec>) -> Self {
        Self { columns }
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn column(&self, id: &str) -> Option<&ColumnSpec> {
        self.columns.iter().find(|c| c.id == id)
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|c| c.id.as_str())
    }
}

/// Registry listing entry, serialized as returned by `schemas --json`.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct SchemaInfo {
    pub name: String,
    pub description: String,
    pub column_count: usize,
}

#[derive(Debug)]
pub struct SchemaRegistry {
    schemas: BTreeMap<String, Schema>,
}

static BUILTIN: OnceLock<SchemaRegistry> = OnceLock::new();

impl SchemaRegistry {
    /// The process-wide registry holding the `default` and `extended` schemas.
    pub fn builtin() -> &'static SchemaRegistry {
        BUILTIN.get_or_init(|| {
            let mut schemas = BTreeMap::new();
            schemas.insert(DEFAULT_SCHEMA_NAME.to_string(), default_schema());
            schemas.insert("extended".to_string(), extended_schema());
            SchemaRegistry { schemas }
        })
    }

    pub fn get(&self, name: &str) -> PipelineResult<&Schema> {
        self.schemas
            .get(name)
            .ok_or_else(|| PipelineError::NotFound {
                requested: name.to_string(),
                available: self.names(),
            })
    }

    pub fn names(&self) -> Vec<String> {
        self.schemas.keys().cloned().collect()
    }

    pub fn list(&self) -> BTreeMap<String, SchemaInfo> {
        self.schemas
            .iter()
            .map(|(name, schema)| {
                let info = SchemaInfo {
                    name: name.clone(),
                    description: format!("{} schema for exoplanet data", title_case(name)),
                    column_count: schema.len(),
                };
                (name.clone(), info)
            })
            .collect()
    }
}

fn title_case(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn default_schema() -> Schema {
    use DataType::{Json, Number};
    Schema::new(vec![
        ColumnSpec::builtin("search_id", "Search ID", "Unique identifier for the search", DataType::String, "2451545.0"),
        ColumnSpec::builtin("num_planet", "Number of Planet", "Planet number in the system", Number, "1"),
        ColumnSpec::builtin("disposition", "Disposition", "Planet disposition status", Number, "1"),
        ColumnSpec::builtin("ror", "Radius Ratio", "Planet-to-star radius ratio", Number, "0.1"),
        ColumnSpec::builtin("stellar_mass", "Stellar Mass", "Mass of the host star", Number, "1.0"),
        ColumnSpec::builtin("ss_gravity", "Surface Gravity", "Surface gravity of the star", Number, "4.44"),
        ColumnSpec::builtin("period", "Orbital Period", "Orbital period in days", Number, "365.25"),
        ColumnSpec::builtin("duration", "Transit Duration", "Transit duration in hours", Number, "13.0"),
        ColumnSpec::builtin("transit_epoch", "Transit Epoch", "Time of transit in Julian days", Number, "2451545.0"),
        ColumnSpec::builtin("global_view", "Global View", "Global view parameters", Json, "{}"),
        ColumnSpec::builtin("local_view", "Local View", "Local view parameters", Json, "{}"),
    ])
}

// Same inputs as `default` without the orbital timing columns.
fn extended_schema() -> Schema {
    use DataType::{Json, Number};
    Schema::new(vec![
        ColumnSpec::builtin("search_id", "ID", "Observation identifier", DataType::String, "2451545.0"),
        ColumnSpec::builtin("num_planet", "No. of Planet", "Planet number in the system", Number, "1"),
        ColumnSpec::builtin("disposition", "Disposition", "Planet disposition status", Number, "1"),
        ColumnSpec::builtin("ror", "Ratio Planet - Star", "Planet-to-star radius ratio", Number, "0.0001"),
        ColumnSpec::builtin("stellar_mass", "Stellar Mass", "Mass of the host star", Number, "0"),
        ColumnSpec::builtin("ss_gravity", "Stellar Gravity", "Surface gravity of the star", Number, "0"),
        ColumnSpec::builtin("global_view", "Global View", "Global view parameters", Json, "0"),
        ColumnSpec::builtin("local_view", "Local View", "Local view parameters", Json, "0"),
    ])
}
