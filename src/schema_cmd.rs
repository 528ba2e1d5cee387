use std::fs;

use anyhow::{Context, Result};
use log::info;
use serde_json::json;

use crate::{
    cli::{SchemaShowArgs, SchemasArgs, ValidateSchemaArgs},
    schema::{Schema, SchemaRegistry},
    table, validate,
};

pub fn list(args: &SchemasArgs) -> Result<()> {
    let listing = SchemaRegistry::builtin().list();
    if args.json {
        println!("{}", serde_json::to_string_pretty(&json!({ "schemas": listing }))?);
        return Ok(());
    }
    let rows = listing
        .values()
        .map(|info| {
            vec![
                info.name.clone(),
                info.column_count.to_string(),
                info.description.clone(),
            ]
        })
        .collect::<Vec<_>>();
    table::print_table(
        &["name".to_string(), "columns".to_string(), "description".to_string()],
        &rows,
    );
    Ok(())
}

pub fn show(args: &SchemaShowArgs) -> Result<()> {
    let schema = SchemaRegistry::builtin().get(&args.name)?;
    if args.json {
        let body = json!({
            "schema_name": args.name,
            "schema": schema,
            "column_count": schema.len(),
        });
        println!("{}", serde_json::to_string_pretty(&body)?);
        return Ok(());
    }
    print_columns(schema);
    Ok(())
}

pub fn validate_file(args: &ValidateSchemaArgs) -> Result<()> {
    let raw = fs::read_to_string(&args.schema)
        .with_context(|| format!("Reading schema file {:?}", args.schema))?;
    let schema = validate::parse_schema(&raw)
        .with_context(|| format!("Validating schema file {:?}", args.schema))?;
    print_columns(&schema);
    info!(
        "Schema {:?} is valid with {} column(s)",
        args.schema,
        schema.len()
    );
    Ok(())
}

fn print_columns(schema: &Schema) {
    let rows = schema
        .columns
        .iter()
        .enumerate()
        .map(|(idx, column)| {
            vec![
                (idx + 1).to_string(),
                column.id.clone(),
                column.label.clone(),
                column.data_type.to_string(),
                if column.required { "yes" } else { "no" }.to_string(),
            ]
        })
        .collect::<Vec<_>>();
    let headers = ["#", "id", "label", "type", "required"].map(String::from);
    table::print_table(&headers, &rows);
}
