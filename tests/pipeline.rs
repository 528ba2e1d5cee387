mod common;

use std::sync::{Arc, Mutex};

use csv_predict::{
    ModelKind, OutputMode, Pipeline, PipelineError, PipelineOutput, PredictionError,
    PredictionRequest, Predictor, SchemaSource,
    assemble::{SchemaUsed, Summary},
    coerce::{Feature, IssueKind},
    codec::{DecodeOptions, decode},
    model::ModelSet,
    pipeline::PipelineReport,
    predict::BatchOptions,
};
use serde_json::json;

use common::{KOI_CSV, MODELS_YAML, koi_mapping};

type Calls = Arc<Mutex<Vec<Vec<Feature>>>>;

/// Predictor returning the radius ratio (feature 3) and remembering its inputs.
fn recording_predictor() -> (Arc<dyn Predictor>, Calls) {
    let calls: Calls = Arc::new(Mutex::new(Vec::new()));
    let seen = Arc::clone(&calls);
    let predictor: Arc<dyn Predictor> = Arc::new(
        move |_: ModelKind, features: &[Feature]| -> Result<Vec<f64>, PredictionError> {
            seen.lock().expect("lock").push(features.to_vec());
            features[3]
                .as_f64()
                .map(|v| vec![v])
                .ok_or_else(|| PredictionError::Model("ror is not numeric".into()))
        },
    );
    (predictor, calls)
}

fn first_feature(_: ModelKind, features: &[Feature]) -> Result<Vec<f64>, PredictionError> {
    features[0]
        .as_f64()
        .map(|v| vec![v])
        .ok_or_else(|| PredictionError::Model("not numeric".into()))
}

fn always_fails(_: ModelKind, _: &[Feature]) -> Result<Vec<f64>, PredictionError> {
    Err(PredictionError::Model("model rejected input".into()))
}

fn summary_of(report: PipelineReport) -> Summary {
    match report.output {
        PipelineOutput::Summary(summary) => summary,
        other => panic!("expected summary, got {other:?}"),
    }
}

fn annotated_of(report: &PipelineReport) -> (String, String) {
    match &report.output {
        PipelineOutput::Annotated { bytes, filename } => (
            String::from_utf8(bytes.clone()).expect("utf8 output"),
            filename.clone(),
        ),
        other => panic!("expected annotated output, got {other:?}"),
    }
}

#[test]
fn non_numeric_ror_is_coerced_and_every_row_is_predicted() {
    let (predictor, calls) = recording_predictor();
    let pipeline = Pipeline::new(predictor);
    let request = PredictionRequest::new(koi_mapping(), ModelKind::Fast);

    let report = pipeline.run(KOI_CSV.as_bytes(), &request).expect("pipeline run");

    let calls = calls.lock().expect("lock");
    assert_eq!(calls.len(), 3);
    assert_eq!(calls[1][3], Feature::Number(0.0));
    assert_eq!(calls[0][0], Feature::Text("10797460".into()));
    assert_eq!(calls[0][9], Feature::Text("0.41".into()));

    let issue = &report.diagnostics.coercion_issues[0];
    assert_eq!(issue.row, 1);
    assert_eq!(issue.column, "ror");
    assert_eq!(issue.kind, IssueKind::UnparseableNumber);
    assert_eq!(report.diagnostics.coercion_issues.len(), 1);
}

#[test]
fn annotated_output_keeps_original_columns() {
    let (predictor, _) = recording_predictor();
    let report = Pipeline::new(predictor)
        .run(
            KOI_CSV.as_bytes(),
            &PredictionRequest::new(koi_mapping(), ModelKind::Fast),
        )
        .expect("pipeline run");
    let (csv, filename) = annotated_of(&report);
    assert_eq!(filename, "predictions.csv");

    let table = decode(csv.as_bytes(), DecodeOptions::default()).expect("decode output");
    assert_eq!(table.column_count(), 13);
    assert_eq!(table.headers()[11], "notes");
    assert_eq!(table.headers()[12], "ai_prediction");
    let predictions = table
        .column("ai_prediction")
        .expect("prediction column")
        .collect::<Vec<_>>();
    assert_eq!(predictions, vec![Some("0.022"), Some("0"), Some("0.154")]);
    // Source cells are returned untouched, including the bad one.
    assert_eq!(table.rows()[1][3].as_deref(), Some("abc"));
}

#[test]
fn failed_rows_leave_empty_cells() {
    let request = PredictionRequest::new(koi_mapping(), ModelKind::Deep);
    let report = Pipeline::new(Arc::new(always_fails))
        .run(KOI_CSV.as_bytes(), &request)
        .expect("row failures never abort");
    let (csv, filename) = annotated_of(&report);
    assert_eq!(filename, "deep_predictions.csv");
    let table = decode(csv.as_bytes(), DecodeOptions::default()).expect("decode output");
    let column = table
        .column("ai_deep_prediction")
        .expect("deep column")
        .collect::<Vec<_>>();
    assert_eq!(column, vec![None, None, None]);
    assert_eq!(report.diagnostics.row_failures.len(), 3);
    assert_eq!(report.diagnostics.row_failures[2].row, 2);
}

#[test]
fn missing_mapping_key_aborts_without_output() {
    let (predictor, calls) = recording_predictor();
    let mapping = common::KOI_MAPPING
        .iter()
        .copied()
        .filter(|(id, _)| *id != "stellar_mass")
        .collect();
    let err = Pipeline::new(predictor)
        .run(
            KOI_CSV.as_bytes(),
            &PredictionRequest::new(mapping, ModelKind::Fast).with_output(OutputMode::Summary),
        )
        .unwrap_err();
    assert_eq!(
        err,
        PipelineError::MissingMappingKeys(vec!["stellar_mass".to_string()])
    );
    assert!(err.is_client_error());
    assert!(calls.lock().expect("lock").is_empty());
}

#[test]
fn mapped_source_column_must_exist() {
    let (predictor, _) = recording_predictor();
    let mut mapping = koi_mapping();
    mapping.insert("ror", "radius_ratio");
    let err = Pipeline::new(predictor)
        .run(
            KOI_CSV.as_bytes(),
            &PredictionRequest::new(mapping, ModelKind::Fast),
        )
        .unwrap_err();
    assert_eq!(
        err.to_string(),
        "The following columns do not exist in CSV: radius_ratio"
    );
}

#[test]
fn unknown_schema_name_lists_alternatives() {
    let (predictor, _) = recording_predictor();
    let request = PredictionRequest::new(koi_mapping(), ModelKind::Fast)
        .with_schema(SchemaSource::Named("bogus".into()));
    let err = Pipeline::new(predictor)
        .run(KOI_CSV.as_bytes(), &request)
        .unwrap_err();
    match err {
        PipelineError::NotFound {
            requested,
            available,
        } => {
            assert_eq!(requested, "bogus");
            assert_eq!(available, vec!["default", "extended"]);
        }
        other => panic!("expected NotFound, got {other:?}"),
    }
}

#[test]
fn summary_over_five_successes() {
    let csv = "value\n1\n2\n3\n4\n5\n";
    let schema = json!([{"id": "v", "label": "Value", "dataType": "number"}]);
    let request = PredictionRequest::new([("v", "value")].into_iter().collect(), ModelKind::Fast)
        .with_schema(SchemaSource::Literal(schema))
        .with_output(OutputMode::Summary);
    let summary = summary_of(
        Pipeline::new(Arc::new(first_feature))
            .run(csv.as_bytes(), &request)
            .expect("pipeline run"),
    );

    assert_eq!(summary.total_rows, 5);
    assert_eq!(summary.successful_predictions, 5);
    assert_eq!(summary.failed_predictions, 0);
    assert_eq!(summary.prediction_stats.mean, Some(3.0));
    assert!((summary.prediction_stats.std.expect("std") - 1.414).abs() < 1e-3);
    assert_eq!(summary.prediction_stats.min, Some(1.0));
    assert_eq!(summary.prediction_stats.max, Some(5.0));
    assert_eq!(summary.sample_predictions.len(), 5);
    assert_eq!(summary.schema_used, SchemaUsed::Custom);
    assert_eq!(summary.model_type, None);
}

#[test]
fn summary_with_no_successes_has_null_stats() {
    let request = PredictionRequest::new(koi_mapping(), ModelKind::Deep)
        .with_output(OutputMode::Summary);
    let summary = summary_of(
        Pipeline::new(Arc::new(always_fails))
            .run(KOI_CSV.as_bytes(), &request)
            .expect("pipeline run"),
    );
    let body = serde_json::to_value(&summary).expect("serialize summary");
    assert_eq!(body["total_rows"], 3);
    assert_eq!(body["successful_predictions"], 0);
    assert_eq!(body["failed_predictions"], 3);
    for stat in ["mean", "std", "min", "max"] {
        assert!(body["prediction_stats"][stat].is_null(), "{stat} should be null");
    }
    assert_eq!(body["sample_predictions"], json!([]));
    assert_eq!(body["schema_used"], "default");
    assert_eq!(body["model_type"], "deep_learning");
}

#[test]
fn invalid_literal_schema_is_rejected_before_prediction() {
    let (predictor, calls) = recording_predictor();
    let request = PredictionRequest::new(koi_mapping(), ModelKind::Fast).with_schema(
        SchemaSource::Literal(json!([{"id": "ror", "dataType": "number"}])),
    );
    let err = Pipeline::new(predictor)
        .run(KOI_CSV.as_bytes(), &request)
        .unwrap_err();
    assert_eq!(
        err,
        PipelineError::InvalidSchema("Column 0 missing required field: label".into())
    );
    assert!(calls.lock().expect("lock").is_empty());
}

#[test]
fn malformed_csv_is_a_parse_error() {
    let (predictor, _) = recording_predictor();
    let err = Pipeline::new(predictor)
        .run(
            b"a,b\n1,2,3\n",
            &PredictionRequest::new(koi_mapping(), ModelKind::Fast),
        )
        .unwrap_err();
    assert!(matches!(err, PipelineError::Parse(_)));
}

#[test]
fn extended_schema_ignores_unmapped_timing_columns() {
    let (predictor, calls) = recording_predictor();
    let request = PredictionRequest::new(koi_mapping(), ModelKind::Fast)
        .with_schema(SchemaSource::Named("extended".into()))
        .with_output(OutputMode::Summary);
    let summary = summary_of(
        Pipeline::new(predictor)
            .run(KOI_CSV.as_bytes(), &request)
            .expect("pipeline run"),
    );
    assert_eq!(summary.successful_predictions, 3);
    assert!(calls.lock().expect("lock").iter().all(|f| f.len() == 8));
}

#[test]
fn yaml_models_drive_the_pipeline_in_parallel() {
    let models = ModelSet::from_yaml_str(MODELS_YAML).expect("models");
    let pipeline = Pipeline::new(Arc::new(models)).with_options(BatchOptions {
        threads: Some(3),
        ..BatchOptions::default()
    });
    let request = PredictionRequest::new(koi_mapping(), ModelKind::Deep)
        .with_output(OutputMode::Summary);
    let summary = summary_of(pipeline.run(KOI_CSV.as_bytes(), &request).expect("run"));
    assert_eq!(summary.successful_predictions, 3);
    let min = summary.prediction_stats.min.expect("min");
    let max = summary.prediction_stats.max.expect("max");
    assert!(min > 0.0 && max < 1.0);
    assert_eq!(summary.model_type, Some("deep_learning"));
}
