use std::{fs, path::Path, sync::Arc, time::Duration};

use anyhow::{Context, Result, anyhow, bail};
use log::info;
use serde_json::{Value, json};

use crate::{
    cli::{PredictArgs, ScoreArgs},
    codec::{self, DecodeOptions},
    coerce::Feature,
    mapping::ColumnMapping,
    model::ModelSet,
    pipeline::{
        OutputMode, Pipeline, PipelineOutput, PipelineReport, PredictionRequest, SchemaSource,
    },
    predict::{BatchOptions, ModelKind, Predictor},
};

pub fn execute(args: &PredictArgs) -> Result<()> {
    let models = load_models(&args.models, args.model)?;
    let mapping = resolve_mapping(&args.mapping)?;
    let schema = match &args.schema {
        Some(path) => {
            let raw = fs::read_to_string(path)
                .with_context(|| format!("Reading schema file {path:?}"))?;
            let value: Value = serde_json::from_str(&raw)
                .map_err(|_| anyhow!("Schema is not valid JSON"))
                .with_context(|| format!("Parsing schema file {path:?}"))?;
            SchemaSource::Literal(value)
        }
        None => SchemaSource::Named(args.schema_name.clone()),
    };
    let decode = DecodeOptions {
        delimiter: codec::resolve_input_delimiter(&args.input, args.delimiter),
        encoding: codec::resolve_encoding(args.input_encoding.as_deref())?,
    };
    let output_mode = if args.summary {
        OutputMode::Summary
    } else {
        OutputMode::Annotated
    };
    let request = PredictionRequest::new(mapping, args.model)
        .with_schema(schema)
        .with_output(output_mode)
        .with_decode_options(decode);

    info!(
        "Predicting '{}' with the {} model ({})",
        args.input.display(),
        args.model,
        if args.summary { "summary" } else { "annotated CSV" }
    );
    let raw = codec::read_input(&args.input)?;
    let pipeline = Pipeline::new(Arc::new(models)).with_options(BatchOptions {
        threads: args.threads,
        row_timeout: args.row_timeout_ms.map(Duration::from_millis),
        max_stalled_calls: args.max_stalled_calls,
    });
    let report = pipeline
        .run(&raw, &request)
        .with_context(|| format!("Processing {:?}", args.input))?;

    if let Some(path) = &args.diagnostics {
        write_diagnostics(path, &report)?;
    }
    emit(args, report.output)
}

fn emit(args: &PredictArgs, output: PipelineOutput) -> Result<()> {
    match output {
        PipelineOutput::Annotated { bytes, filename } => {
            let target = args.output.as_ref().map(|path| {
                if path.is_dir() {
                    path.join(&filename)
                } else {
                    path.clone()
                }
            });
            codec::write_output(target.as_deref(), &bytes)?;
            if let Some(path) = target {
                info!("Annotated CSV written to {path:?}");
            }
        }
        PipelineOutput::Summary(summary) => {
            let mut body = serde_json::to_string_pretty(&summary)?;
            body.push('\n');
            codec::write_output(args.output.as_deref(), body.as_bytes())?;
        }
    }
    Ok(())
}

fn write_diagnostics(path: &Path, report: &PipelineReport) -> Result<()> {
    let body = json!({
        "coercion_issues": report.diagnostics.coercion_issues,
        "row_failures": report.diagnostics.row_failures,
    });
    fs::write(path, serde_json::to_string_pretty(&body)?)
        .with_context(|| format!("Writing diagnostics to {path:?}"))?;
    info!(
        "Recorded {} coercion issue(s) and {} row failure(s) in {path:?}",
        report.diagnostics.coercion_issues.len(),
        report.diagnostics.row_failures.len()
    );
    Ok(())
}

pub fn score(args: &ScoreArgs) -> Result<()> {
    let models = load_models(&args.models, args.model)?;
    let value: Value =
        serde_json::from_str(&args.features).context("Parsing --features as JSON")?;
    let Value::Array(items) = value else {
        bail!("--features must be a JSON array");
    };
    let features = items
        .into_iter()
        .map(|item| match item {
            Value::Number(n) => n
                .as_f64()
                .map(Feature::Number)
                .ok_or_else(|| anyhow!("Feature {n} is out of range")),
            Value::String(text) => Ok(Feature::Text(text)),
            other => Ok(Feature::Text(other.to_string())),
        })
        .collect::<Result<Vec<_>>>()?;
    let prediction = models
        .predict(args.model, &features)
        .with_context(|| format!("Scoring with the {} model", args.model))?;
    println!("{}", json!({ "prediction": prediction }));
    Ok(())
}

fn load_models(path: &Path, model: ModelKind) -> Result<ModelSet> {
    let models = ModelSet::load(path)?;
    if !models.has(model) {
        bail!("Model file {path:?} does not define a '{model}' model");
    }
    Ok(models)
}

/// Inline JSON when the argument looks like an object, otherwise a file path.
fn resolve_mapping(raw: &str) -> Result<ColumnMapping> {
    let trimmed = raw.trim_start();
    let text = if trimmed.starts_with('{') {
        trimmed.to_string()
    } else {
        fs::read_to_string(raw).with_context(|| format!("Reading column mapping file {raw:?}"))?
    };
    Ok(ColumnMapping::parse(&text)?)
}
