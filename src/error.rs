use itertools::Itertools;
use thiserror::Error;

use crate::predict::ModelKind;

pub type PipelineResult<T> = Result<T, PipelineError>;

#[derive(Debug, Error, PartialEq)]
pub enum PipelineError {
    #[error("Schema '{requested}' not found. Available schemas: [{}]", quoted(.available))]
    NotFound {
        requested: String,
        available: Vec<String>,
    },

    #[error("Invalid schema: {0}")]
    InvalidSchema(String),

    #[error("Missing the following columns in mapping: {}", .0.join(", "))]
    MissingMappingKeys(Vec<String>),

    #[error("The following columns do not exist in CSV: {}", .0.join(", "))]
    MissingSourceColumns(Vec<String>),

    #[error("{0}")]
    Parse(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Coarse classification of a [`PipelineError`], mirroring 4xx vs 5xx.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    Client,
    Internal,
}

impl PipelineError {
    pub fn class(&self) -> ErrorClass {
        match self {
            PipelineError::Internal(_) => ErrorClass::Internal,
            _ => ErrorClass::Client,
        }
    }

    pub fn is_client_error(&self) -> bool {
        self.class() == ErrorClass::Client
    }
}

fn quoted(names: &[String]) -> String {
    names.iter().map(|name| format!("'{name}'")).join(", ")
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum PredictionError {
    #[error("feature {index} ('{value}') is not numeric")]
    NonNumericFeature { index: usize, value: String },

    #[error("expected {expected} feature(s) but received {actual}")]
    ShapeMismatch { expected: usize, actual: usize },

    #[error("{0} model is not loaded")]
    ModelUnavailable(ModelKind),

    #[error("model returned no values")]
    EmptyOutput,

    #[error("model returned a non-finite value")]
    NonFiniteOutput,

    #[error("prediction timed out after {0} ms")]
    Timeout(u128),

    #[error("predictor panicked: {0}")]
    Panicked(String),

    #[error("skipped: {0} timed-out prediction(s) are still running")]
    Stalled(usize),

    #[error("{0}")]
    Model(String),
}
