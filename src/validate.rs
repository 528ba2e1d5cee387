use std::collections::HashSet;

use serde_json::{Map, Value};

use crate::{
    error::{PipelineError, PipelineResult},
    schema::{ColumnSpec, DataType, Schema},
};

const REQUIRED_FIELDS: &[&str] = &["id", "label", "dataType"];

/// Fail-fast validation of a literal schema: the first offending column is
/// reported with its index and the field at fault.
pub fn validate(candidate: &Value) -> PipelineResult<Schema> {
    let Value::Array(columns) = candidate else {
        return Err(invalid("Schema must be a list"));
    };

    let mut seen = HashSet::new();
    let mut specs = Vec::with_capacity(columns.len());
    for (idx, column) in columns.iter().enumerate() {
        let Value::Object(fields) = column else {
            return Err(invalid(format!("Column {idx} must be a dictionary")));
        };
        for field in REQUIRED_FIELDS {
            match fields.get(*field) {
                None => {
                    return Err(invalid(format!(
                        "Column {idx} missing required field: {field}"
                    )));
                }
                Some(Value::String(_)) => {}
                Some(_) => {
                    return Err(invalid(format!(
                        "Column {idx} field '{field}' must be a string"
                    )));
                }
            }
        }
        // Ids are stored trimmed so mapping keys match what was checked here.
        let id = string_field(fields, "id").trim().to_string();
        if id.is_empty() {
            return Err(invalid(format!("Column {idx} has an empty id")));
        }
        if !seen.insert(id.clone()) {
            return Err(invalid(format!("Column {idx} duplicates id '{id}'")));
        }
        specs.push(ColumnSpec {
            id,
            label: string_field(fields, "label").to_string(),
            description: lenient_text(fields.get("description")),
            required: required_flag(fields, idx)?,
            data_type: DataType::from_label(string_field(fields, "dataType")),
            example: lenient_text(fields.get("example")),
        });
    }

    Ok(Schema::new(specs))
}

fn string_field<'a>(fields: &'a Map<String, Value>, name: &str) -> &'a str {
    fields.get(name).and_then(Value::as_str).unwrap_or_default()
}

/// Free-text fields accept any JSON value; non-strings are stringified.
fn lenient_text(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(text)) => text.clone(),
        Some(other) => other.to_string(),
    }
}

fn required_flag(fields: &Map<String, Value>, idx: usize) -> PipelineResult<bool> {
    match fields.get("required") {
        None | Some(Value::Null) => Ok(true),
        Some(Value::Bool(flag)) => Ok(*flag),
        Some(_) => Err(invalid(format!(
            "Column {idx} field 'required' must be a boolean"
        ))),
    }
}

/// Parses `raw` as JSON and validates it.
pub fn parse_schema(raw: &str) -> PipelineResult<Schema> {
    let value: Value = serde_json::from_str(raw)
        .map_err(|_| PipelineError::Parse("Schema is not valid JSON".to_string()))?;
    validate(&value)
}

fn invalid(reason: impl Into<String>) -> PipelineError {
    PipelineError::InvalidSchema(reason.into())
}
