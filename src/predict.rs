//! Batch prediction over coerced feature rows.
//!
//! The predictor is an injected capability ([`Predictor`]). Each row is
//! predicted on its own: errors, panics, malformed outputs and timeouts are
//! contained to that row, which yields `None` plus a [`RowFailure`]. The
//! returned predictions always line up index-for-index with the input rows.

use std::{
    fmt,
    panic::{self, AssertUnwindSafe},
    sync::{
        Arc, mpsc,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    },
    thread,
    time::Duration,
};

use clap::ValueEnum;
use itertools::Itertools;
use log::{debug, warn};
use rayon::{ThreadPoolBuilder, prelude::*};
use serde::{Deserialize, Serialize};

use crate::{
    coerce::{CoercedTable, Feature},
    error::PredictionError,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
#[value(rename_all = "lowercase")]
pub enum ModelKind {
    Fast,
    Deep,
}

impl ModelKind {
    /// Name of the column annotate mode appends to the source table.
    pub fn prediction_column(self) -> &'static str {
        match self {
            ModelKind::Fast => "ai_prediction",
            ModelKind::Deep => "ai_deep_prediction",
        }
    }

    pub fn suggested_filename(self) -> &'static str {
        match self {
            ModelKind::Fast => "predictions.csv",
            ModelKind::Deep => "deep_predictions.csv",
        }
    }
}

impl fmt::Display for ModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModelKind::Fast => f.write_str("fast"),
            ModelKind::Deep => f.write_str("deep"),
        }
    }
}

/// A model capable of scoring one feature vector.
pub trait Predictor: Send + Sync {
    fn predict(&self, model: ModelKind, features: &[Feature]) -> Result<Vec<f64>, PredictionError>;
}

impl<F> Predictor for F
where
    F: Fn(ModelKind, &[Feature]) -> Result<Vec<f64>, PredictionError> + Send + Sync,
{
    fn predict(&self, model: ModelKind, features: &[Feature]) -> Result<Vec<f64>, PredictionError> {
        self(model, features)
    }
}

/// Values produced for one successful row.
#[derive(Debug, Clone, PartialEq)]
pub struct Prediction(pub Vec<f64>);

impl Prediction {
    pub fn values(&self) -> &[f64] {
        &self.0
    }

    /// Cell text for annotate mode: a bare number for single outputs, a
    /// compact JSON array otherwise. Both render numbers the same way.
    pub fn to_cell(&self) -> String {
        match self.0.as_slice() {
            [single] => single.to_string(),
            many => format!("[{}]", many.iter().join(",")),
        }
    }
}

impl Serialize for Prediction {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        match self.0.as_slice() {
            [single] => serializer.serialize_f64(*single),
            many => many.serialize(serializer),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RowFailure {
    pub row: usize,
    pub message: String,
}

pub const DEFAULT_MAX_STALLED_CALLS: usize = 4;

#[derive(Debug, Clone)]
pub struct BatchOptions {
    /// Worker threads for the row loop; `None` or `Some(1)` runs sequentially.
    pub threads: Option<usize>,
    /// Per-row limit; a row exceeding it is recorded as failed.
    ///
    /// Each timed call runs on its own OS thread. A call that overruns the
    /// limit cannot be cancelled, so its thread stays alive until the model
    /// returns.
    pub row_timeout: Option<Duration>,
    /// Once this many timed-out calls are still running, remaining rows fail
    /// without calling the model. Caps the threads a hung model can hold.
    pub max_stalled_calls: usize,
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self {
            threads: None,
            row_timeout: None,
            max_stalled_calls: DEFAULT_MAX_STALLED_CALLS,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct BatchOutcome {
    pub predictions: Vec<Option<Prediction>>,
    pub failures: Vec<RowFailure>,
}

impl BatchOutcome {
    pub fn successes(&self) -> impl Iterator<Item = &Prediction> {
        self.predictions.iter().flatten()
    }

    pub fn success_count(&self) -> usize {
        self.successes().count()
    }
}

pub fn predict_all(
    coerced: &CoercedTable,
    predictor: &Arc<dyn Predictor>,
    model: ModelKind,
    options: &BatchOptions,
) -> BatchOutcome {
    let stalled = StallCounter::new(options.max_stalled_calls);
    let score = |row: &Vec<Feature>| {
        predict_row(predictor, model, row, options.row_timeout, &stalled)
    };

    let results: Vec<Result<Prediction, PredictionError>> = match options.threads {
        Some(threads) if threads > 1 => match ThreadPoolBuilder::new().num_threads(threads).build() {
            Ok(pool) => pool.install(|| coerced.rows.par_iter().map(score).collect()),
            Err(err) => {
                warn!("Falling back to sequential prediction: {err}");
                coerced.rows.iter().map(score).collect()
            }
        },
        _ => coerced.rows.iter().map(score).collect(),
    };

    let mut outcome = BatchOutcome {
        predictions: Vec::with_capacity(results.len()),
        failures: Vec::new(),
    };
    for (row, result) in results.into_iter().enumerate() {
        match result {
            Ok(prediction) => outcome.predictions.push(Some(prediction)),
            Err(err) => {
                debug!("Row {row} failed: {err}");
                outcome.failures.push(RowFailure {
                    row,
                    message: err.to_string(),
                });
                outcome.predictions.push(None);
            }
        }
    }
    outcome
}

fn predict_row(
    predictor: &Arc<dyn Predictor>,
    model: ModelKind,
    features: &[Feature],
    timeout: Option<Duration>,
    stalled: &StallCounter,
) -> Result<Prediction, PredictionError> {
    let values = match timeout {
        Some(limit) => predict_with_timeout(predictor, model, features, limit, stalled)?,
        None => guarded_predict(predictor.as_ref(), model, features)?,
    };
    if values.is_empty() {
        return Err(PredictionError::EmptyOutput);
    }
    if values.iter().any(|v| !v.is_finite()) {
        return Err(PredictionError::NonFiniteOutput);
    }
    Ok(Prediction(values))
}

fn guarded_predict(
    predictor: &dyn Predictor,
    model: ModelKind,
    features: &[Feature],
) -> Result<Vec<f64>, PredictionError> {
    panic::catch_unwind(AssertUnwindSafe(|| predictor.predict(model, features)))
        .unwrap_or_else(|payload| Err(PredictionError::Panicked(panic_message(payload.as_ref()))))
}

/// Timed-out calls whose worker thread has not returned yet.
struct StallCounter {
    running: Arc<AtomicUsize>,
    limit: usize,
}

impl StallCounter {
    fn new(limit: usize) -> Self {
        Self {
            running: Arc::new(AtomicUsize::new(0)),
            limit,
        }
    }

    fn current(&self) -> usize {
        self.running.load(Ordering::SeqCst)
    }
}

// The worker thread is left to finish on its own when the limit passes. Of
// the caller and the worker, whichever flips `abandoned` second settles the
// stall count, so a call is counted only while it is actually still running.
fn predict_with_timeout(
    predictor: &Arc<dyn Predictor>,
    model: ModelKind,
    features: &[Feature],
    limit: Duration,
    stalled: &StallCounter,
) -> Result<Vec<f64>, PredictionError> {
    let running = stalled.current();
    if running >= stalled.limit {
        return Err(PredictionError::Stalled(running));
    }

    let (tx, rx) = mpsc::channel();
    let abandoned = Arc::new(AtomicBool::new(false));
    let worker_abandoned = Arc::clone(&abandoned);
    let worker_running = Arc::clone(&stalled.running);
    let predictor = Arc::clone(predictor);
    let features = features.to_vec();
    thread::spawn(move || {
        let _ = tx.send(guarded_predict(predictor.as_ref(), model, &features));
        if worker_abandoned.swap(true, Ordering::SeqCst) {
            worker_running.fetch_sub(1, Ordering::SeqCst);
        }
    });
    match rx.recv_timeout(limit) {
        Ok(result) => result,
        Err(mpsc::RecvTimeoutError::Timeout) => {
            stalled.running.fetch_add(1, Ordering::SeqCst);
            if abandoned.swap(true, Ordering::SeqCst) {
                stalled.running.fetch_sub(1, Ordering::SeqCst);
            }
            Err(PredictionError::Timeout(limit.as_millis()))
        }
        Err(mpsc::RecvTimeoutError::Disconnected) => Err(PredictionError::Panicked(
            "prediction worker exited without a result".to_string(),
        )),
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(text) = payload.downcast_ref::<&str>() {
        (*text).to_string()
    } else if let Some(text) = payload.downcast_ref::<String>() {
        text.clone()
    } else {
        "unknown panic".to_string()
    }
}
