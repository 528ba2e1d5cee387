use std::fmt;

use serde::Serialize;
use serde_json::Value as JsonValue;

use crate::{
    classify::{Bucket, ColumnBuckets},
    table::{Cell, Table},
};

pub const NUMERIC_FALLBACK: f64 = 0.0;
pub const CATEGORICAL_FALLBACK: &str = "unknown";
pub const JSON_FALLBACK: &str = "{}";

/// A single model input value.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Feature {
    Number(f64),
    Text(String),
}

impl Feature {
    /// Numeric view of the feature; text is accepted when it parses as a
    /// finite number.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Feature::Number(value) => Some(*value),
            Feature::Text(text) => text.trim().parse::<f64>().ok().filter(|v| v.is_finite()),
        }
    }
}

impl fmt::Display for Feature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Feature::Number(value) => write!(f, "{value}"),
            Feature::Text(text) => f.write_str(text),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueKind {
    Missing,
    UnparseableNumber,
    NonFiniteNumber,
    InvalidJson,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CoercionIssue {
    pub row: usize,
    pub column: String,
    pub raw: Option<String>,
    pub kind: IssueKind,
}

/// Feature rows aligned with the mapped table, one feature per required id.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CoercedTable {
    pub ids: Vec<String>,
    pub rows: Vec<Vec<Feature>>,
    pub issues: Vec<CoercionIssue>,
}

impl CoercedTable {
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }
}

/// Coerces `mapped` (columns named by required id) according to `buckets`.
pub fn coerce(mapped: &Table, buckets: &ColumnBuckets) -> CoercedTable {
    let column_buckets = mapped
        .headers()
        .iter()
        .map(|id| buckets.bucket_of(id).unwrap_or(Bucket::Categorical))
        .collect::<Vec<_>>();

    let mut issues = Vec::new();
    let rows = mapped
        .rows()
        .iter()
        .enumerate()
        .map(|(row_idx, row)| {
            row.iter()
                .zip(&column_buckets)
                .zip(mapped.headers())
                .map(|((cell, bucket), id)| {
                    let (feature, issue) = coerce_cell(cell, *bucket);
                    if let Some(kind) = issue {
                        issues.push(CoercionIssue {
                            row: row_idx,
                            column: id.clone(),
                            raw: cell.clone(),
                            kind,
                        });
                    }
                    feature
                })
                .collect()
        })
        .collect();

    CoercedTable {
        ids: mapped.headers().to_vec(),
        rows,
        issues,
    }
}

pub fn coerce_cell(cell: &Cell, bucket: Bucket) -> (Feature, Option<IssueKind>) {
    match bucket {
        Bucket::Numeric => {
            let (value, issue) = coerce_numeric(cell.as_deref());
            (Feature::Number(value), issue)
        }
        Bucket::Categorical => match cell {
            Some(text) => (Feature::Text(text.clone()), None),
            None => (
                Feature::Text(CATEGORICAL_FALLBACK.to_string()),
                Some(IssueKind::Missing),
            ),
        },
        Bucket::Json => {
            let (text, issue) = coerce_json(cell.as_deref());
            (Feature::Text(text), issue)
        }
    }
}

fn coerce_numeric(raw: Option<&str>) -> (f64, Option<IssueKind>) {
    let Some(raw) = raw else {
        return (NUMERIC_FALLBACK, Some(IssueKind::Missing));
    };
    match raw.trim().parse::<f64>() {
        Ok(value) if value.is_finite() => (value, None),
        Ok(_) => (NUMERIC_FALLBACK, Some(IssueKind::NonFiniteNumber)),
        Err(_) => (NUMERIC_FALLBACK, Some(IssueKind::UnparseableNumber)),
    }
}

fn coerce_json(raw: Option<&str>) -> (String, Option<IssueKind>) {
    let Some(raw) = raw else {
        return (JSON_FALLBACK.to_string(), Some(IssueKind::Missing));
    };
    let trimmed = raw.trim_start();
    if !(trimmed.starts_with('{') || trimmed.starts_with('[')) {
        return (raw.to_string(), None);
    }
    // Re-serialize so the predictor always sees the compact form.
    match serde_json::from_str::<JsonValue>(trimmed) {
        Ok(value) => (value.to_string(), None),
        Err(_) => (JSON_FALLBACK.to_string(), Some(IssueKind::InvalidJson)),
    }
}
