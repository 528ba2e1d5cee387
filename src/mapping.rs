use std::collections::BTreeMap;

use log::debug;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{
    error::{PipelineError, PipelineResult},
    table::Table,
};

/// Required column id -> source column name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ColumnMapping(BTreeMap<String, String>);

impl ColumnMapping {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, id: impl Into<String>, source: impl Into<String>) {
        self.0.insert(id.into(), source.into());
    }

    pub fn source_for(&self, id: &str) -> Option<&str> {
        self.0.get(id).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Parses a JSON object of string values.
    pub fn parse(raw: &str) -> PipelineResult<Self> {
        let not_json = || PipelineError::Parse("Column mapping is not valid JSON".to_string());
        let value: Value = serde_json::from_str(raw).map_err(|_| not_json())?;
        let Value::Object(entries) = value else {
            return Err(PipelineError::Parse(
                "Column mapping must be a JSON object".to_string(),
            ));
        };
        let mut mapping = ColumnMapping::new();
        for (id, source) in entries {
            let Value::String(source) = source else {
                return Err(PipelineError::Parse(format!(
                    "Column mapping for '{id}' must be a string"
                )));
            };
            mapping.insert(id, source);
        }
        Ok(mapping)
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for ColumnMapping {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

/// Builds the model-facing view of `table`: one column per required id, in
/// `required_ids` order, holding the cells of the mapped source column.
pub fn map_columns(
    table: &Table,
    mapping: &ColumnMapping,
    required_ids: &[String],
) -> PipelineResult<Table> {
    let missing_keys = required_ids
        .iter()
        .filter(|id| mapping.source_for(id).is_none())
        .cloned()
        .collect::<Vec<_>>();
    if !missing_keys.is_empty() {
        return Err(PipelineError::MissingMappingKeys(missing_keys));
    }

    let mut missing_sources: Vec<String> = Vec::new();
    for (_, source) in mapping.iter() {
        if !table.has_column(source) && !missing_sources.iter().any(|m| m == source) {
            missing_sources.push(source.to_string());
        }
    }
    if !missing_sources.is_empty() {
        return Err(PipelineError::MissingSourceColumns(missing_sources));
    }

    let indices = required_ids
        .iter()
        .filter_map(|id| mapping.source_for(id))
        .filter_map(|source| table.column_index(source))
        .collect::<Vec<_>>();
    let rows = table
        .rows()
        .iter()
        .map(|row| indices.iter().map(|idx| row[*idx].clone()).collect())
        .collect();
    debug!(
        "Mapped {} source column(s) onto {} required id(s)",
        table.column_count(),
        required_ids.len()
    );
    Table::new(required_ids.to_vec(), rows)
}
