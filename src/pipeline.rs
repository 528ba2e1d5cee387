use std::sync::Arc;

use log::{debug, info, warn};
use serde_json::Value;

use crate::{
    assemble::{self, SchemaUsed, Summary},
    classify::classify,
    codec::{self, DecodeOptions},
    coerce::{CoercionIssue, coerce},
    error::PipelineResult,
    mapping::{ColumnMapping, map_columns},
    predict::{BatchOptions, ModelKind, Predictor, RowFailure, predict_all},
    schema::{DEFAULT_SCHEMA_NAME, Schema, SchemaRegistry},
    validate,
};

const MAX_LOGGED_ISSUES: usize = 20;

#[derive(Debug, Clone, PartialEq)]
pub enum SchemaSource {
    Named(String),
    /// Request-scoped schema; overrides any name.
    Literal(Value),
}

impl Default for SchemaSource {
    fn default() -> Self {
        SchemaSource::Named(DEFAULT_SCHEMA_NAME.to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputMode {
    #[default]
    Annotated,
    Summary,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PredictionRequest {
    pub schema: SchemaSource,
    pub mapping: ColumnMapping,
    pub model: ModelKind,
    pub output: OutputMode,
    pub decode: DecodeOptions,
}

impl PredictionRequest {
    pub fn new(mapping: ColumnMapping, model: ModelKind) -> Self {
        Self {
            schema: SchemaSource::default(),
            mapping,
            model,
            output: OutputMode::default(),
            decode: DecodeOptions::default(),
        }
    }

    pub fn with_schema(mut self, schema: SchemaSource) -> Self {
        self.schema = schema;
        self
    }

    pub fn with_output(mut self, output: OutputMode) -> Self {
        self.output = output;
        self
    }

    pub fn with_decode_options(mut self, decode: DecodeOptions) -> Self {
        self.decode = decode;
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum PipelineOutput {
    Annotated { bytes: Vec<u8>, filename: String },
    Summary(Summary),
}

/// Row-level diagnostics gathered while the request ran.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Diagnostics {
    pub coercion_issues: Vec<CoercionIssue>,
    pub row_failures: Vec<RowFailure>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PipelineReport {
    pub output: PipelineOutput,
    pub diagnostics: Diagnostics,
}

pub struct Pipeline {
    registry: &'static SchemaRegistry,
    predictor: Arc<dyn Predictor>,
    options: BatchOptions,
}

impl Pipeline {
    pub fn new(predictor: Arc<dyn Predictor>) -> Self {
        Self {
            registry: SchemaRegistry::builtin(),
            predictor,
            options: BatchOptions::default(),
        }
    }

    pub fn with_options(mut self, options: BatchOptions) -> Self {
        self.options = options;
        self
    }

    pub fn registry(&self) -> &'static SchemaRegistry {
        self.registry
    }

    pub fn run(&self, raw: &[u8], request: &PredictionRequest) -> PipelineResult<PipelineReport> {
        let (schema, schema_used) = self.resolve_schema(&request.schema)?;
        let table = codec::decode(raw, request.decode)?;
        debug!(
            "Decoded {} row(s) across {} column(s)",
            table.row_count(),
            table.column_count()
        );

        let buckets = classify(&schema);
        let mapped = map_columns(&table, &request.mapping, &buckets.required)?;
        let coerced = coerce(&mapped, &buckets);
        log_issues(&coerced.issues);

        let outcome = predict_all(&coerced, &self.predictor, request.model, &self.options);
        if !outcome.failures.is_empty() {
            warn!(
                "{} of {} row(s) failed to predict",
                outcome.failures.len(),
                outcome.predictions.len()
            );
        }
        info!(
            "Predicted {} row(s) with the {} model",
            outcome.success_count(),
            request.model
        );

        let output = match request.output {
            OutputMode::Annotated => {
                let annotated = assemble::annotate(&table, &outcome, request.model)?;
                PipelineOutput::Annotated {
                    bytes: codec::encode(&annotated, request.decode.delimiter)?,
                    filename: request.model.suggested_filename().to_string(),
                }
            }
            OutputMode::Summary => {
                PipelineOutput::Summary(assemble::summarize(&outcome, schema_used, request.model))
            }
        };
        Ok(PipelineReport {
            output,
            diagnostics: Diagnostics {
                coercion_issues: coerced.issues,
                row_failures: outcome.failures,
            },
        })
    }

    fn resolve_schema(&self, source: &SchemaSource) -> PipelineResult<(Schema, SchemaUsed)> {
        match source {
            SchemaSource::Literal(value) => Ok((validate::validate(value)?, SchemaUsed::Custom)),
            SchemaSource::Named(name) => Ok((self.registry.get(name)?.clone(), SchemaUsed::Default)),
        }
    }
}

fn log_issues(issues: &[CoercionIssue]) {
    for issue in issues.iter().take(MAX_LOGGED_ISSUES) {
        debug!(
            "Row {} column '{}': {:?} (raw {:?}) replaced by fallback",
            issue.row, issue.column, issue.kind, issue.raw
        );
    }
    if !issues.is_empty() {
        warn!("{} cell(s) coerced to fallback values", issues.len());
    }
}
