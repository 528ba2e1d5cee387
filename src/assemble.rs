use serde::Serialize;

use crate::{
    error::PipelineResult,
    predict::{BatchOutcome, ModelKind, Prediction},
    table::Table,
};

pub const SAMPLE_SIZE: usize = 5;

/// Returns `original` with the model's prediction column set from `outcome`.
/// Failed rows get an empty cell.
pub fn annotate(original: &Table, outcome: &BatchOutcome, model: ModelKind) -> PipelineResult<Table> {
    let mut annotated = original.clone();
    let values = outcome
        .predictions
        .iter()
        .map(|prediction| prediction.as_ref().map(Prediction::to_cell))
        .collect();
    annotated.set_column(model.prediction_column(), values)?;
    Ok(annotated)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SchemaUsed {
    Default,
    Custom,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PredictionStats {
    pub mean: Option<f64>,
    pub std: Option<f64>,
    pub min: Option<f64>,
    pub max: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Summary {
    pub total_rows: usize,
    pub successful_predictions: usize,
    pub failed_predictions: usize,
    pub prediction_stats: PredictionStats,
    pub sample_predictions: Vec<Prediction>,
    pub schema_used: SchemaUsed,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model_type: Option<&'static str>,
}

pub fn summarize(outcome: &BatchOutcome, schema_used: SchemaUsed, model: ModelKind) -> Summary {
    let mut stats = StatsAccumulator::default();
    for prediction in outcome.successes() {
        for value in prediction.values() {
            stats.add(*value);
        }
    }
    let successful = outcome.success_count();
    Summary {
        total_rows: outcome.predictions.len(),
        successful_predictions: successful,
        failed_predictions: outcome.predictions.len() - successful,
        prediction_stats: stats.finish(),
        sample_predictions: outcome.successes().take(SAMPLE_SIZE).cloned().collect(),
        schema_used,
        model_type: (model == ModelKind::Deep).then_some("deep_learning"),
    }
}

// Welford's running mean and sum of squared deviations.
#[derive(Debug, Default)]
struct StatsAccumulator {
    count: usize,
    mean: f64,
    m2: f64,
    min: Option<f64>,
    max: Option<f64>,
}

impl StatsAccumulator {
    fn add(&mut self, value: f64) {
        self.count += 1;
        let delta = value - self.mean;
        self.mean += delta / self.count as f64;
        self.m2 += delta * (value - self.mean);
        self.min = Some(self.min.map_or(value, |current| current.min(value)));
        self.max = Some(self.max.map_or(value, |current| current.max(value)));
    }

    // Population standard deviation.
    fn finish(&self) -> PredictionStats {
        if self.count == 0 {
            return PredictionStats::default();
        }
        let variance = (self.m2 / self.count as f64).max(0.0);
        PredictionStats {
            mean: Some(self.mean),
            std: Some(variance.sqrt()),
            min: self.min,
            max: self.max,
        }
    }
}
