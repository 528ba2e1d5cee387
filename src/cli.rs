use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::predict::{DEFAULT_MAX_STALLED_CALLS, ModelKind};

#[derive(Debug, Parser)]
#[command(author, version, about = "Schema-driven batch predictions over CSV files", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// List the registered column schemas
    Schemas(SchemasArgs),
    /// Show the columns of one registered schema
    Schema(SchemaShowArgs),
    /// Check a schema definition file without running predictions
    ValidateSchema(ValidateSchemaArgs),
    /// Map a CSV onto a schema, predict every row, and emit an annotated CSV or a summary
    Predict(PredictArgs),
    /// Score a single feature vector
    Score(ScoreArgs),
}

#[derive(Debug, Args)]
pub struct SchemasArgs {
    /// Emit the listing as JSON instead of a table
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Args)]
pub struct SchemaShowArgs {
    /// Registered schema name (e.g. default, extended)
    pub name: String,
    /// Emit the schema as JSON instead of a table
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Args)]
pub struct ValidateSchemaArgs {
    /// JSON file holding a list of column definitions
    #[arg(short, long)]
    pub schema: PathBuf,
}

#[derive(Debug, Args)]
pub struct PredictArgs {
    /// Input CSV file (`-` reads stdin)
    #[arg(short = 'i', long = "input")]
    pub input: PathBuf,
    /// Output file or directory (stdout if omitted)
    #[arg(short = 'o', long = "output")]
    pub output: Option<PathBuf>,
    /// Column mapping as inline JSON (`{"ror": "Ratio"}`) or a path to a JSON file
    #[arg(long)]
    pub mapping: String,
    /// Registered schema to map against
    #[arg(long = "schema-name", default_value = "default")]
    pub schema_name: String,
    /// JSON schema file; overrides --schema-name
    #[arg(long)]
    pub schema: Option<PathBuf>,
    /// YAML file holding the model weights
    #[arg(long)]
    pub models: PathBuf,
    /// Model to predict with
    #[arg(long, value_enum, default_value = "fast")]
    pub model: ModelKind,
    /// Emit summary statistics as JSON instead of the annotated CSV
    #[arg(long)]
    pub summary: bool,
    /// Worker threads for the prediction loop (1 = sequential)
    #[arg(long)]
    pub threads: Option<usize>,
    /// Fail any row whose prediction takes longer than this many milliseconds
    #[arg(long = "row-timeout-ms")]
    pub row_timeout_ms: Option<u64>,
    /// With --row-timeout-ms, stop calling the model once this many timed-out calls are still running
    #[arg(long = "max-stalled-calls", default_value_t = DEFAULT_MAX_STALLED_CALLS)]
    pub max_stalled_calls: usize,
    /// Write coercion issues and row failures as JSON to this file
    #[arg(long)]
    pub diagnostics: Option<PathBuf>,
    /// CSV delimiter character (supports ',', 'tab', ';', '|')
    #[arg(long, value_parser = parse_delimiter)]
    pub delimiter: Option<u8>,
    /// Character encoding of the input file (defaults to utf-8)
    #[arg(long = "input-encoding")]
    pub input_encoding: Option<String>,
}

#[derive(Debug, Args)]
pub struct ScoreArgs {
    /// Feature vector as a JSON array
    #[arg(long)]
    pub features: String,
    /// YAML file holding the model weights
    #[arg(long)]
    pub models: PathBuf,
    /// Model to predict with
    #[arg(long, value_enum, default_value = "fast")]
    pub model: ModelKind,
}

pub fn parse_delimiter(value: &str) -> Result<u8, String> {
    match value {
        "tab" | "\t" => Ok(b'\t'),
        "comma" | "," => Ok(b','),
        "|" | "pipe" => Ok(b'|'),
        ";" | "semicolon" => Ok(b';'),
        other => {
            let mut chars = other.chars();
            let first = chars
                .next()
                .ok_or_else(|| "Delimiter cannot be empty".to_string())?;
            if chars.next().is_some() {
                return Err("Delimiter must be a single character".to_string());
            }
            if !first.is_ascii() {
                return Err("Delimiter must be ASCII".to_string());
            }
            Ok(first as u8)
        }
    }
}
