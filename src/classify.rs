use serde::Serialize;

use crate::schema::{DataType, Schema};

/// Which coercion rule a column follows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Bucket {
    Numeric,
    Categorical,
    Json,
}

impl Bucket {
    pub fn of(data_type: DataType) -> Self {
        if data_type.is_numeric() {
            Bucket::Numeric
        } else if data_type == DataType::Json {
            Bucket::Json
        } else {
            Bucket::Categorical
        }
    }
}

/// Column ids of a schema split by bucket, each list in declaration order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ColumnBuckets {
    pub required: Vec<String>,
    pub numeric: Vec<String>,
    pub categorical: Vec<String>,
    pub json: Vec<String>,
}

impl ColumnBuckets {
    pub fn bucket_of(&self, id: &str) -> Option<Bucket> {
        if self.numeric.iter().any(|c| c == id) {
            Some(Bucket::Numeric)
        } else if self.json.iter().any(|c| c == id) {
            Some(Bucket::Json)
        } else if self.categorical.iter().any(|c| c == id) {
            Some(Bucket::Categorical)
        } else {
            None
        }
    }

    /// Bucket for each required id, aligned with `required`.
    pub fn required_buckets(&self) -> Vec<Bucket> {
        self.required
            .iter()
            .map(|id| self.bucket_of(id).unwrap_or(Bucket::Categorical))
            .collect()
    }
}

pub fn classify(schema: &Schema) -> ColumnBuckets {
    let mut buckets = ColumnBuckets::default();
    for column in &schema.columns {
        buckets.required.push(column.id.clone());
        let target = match Bucket::of(column.data_type) {
            Bucket::Numeric => &mut buckets.numeric,
            Bucket::Json => &mut buckets.json,
            Bucket::Categorical => &mut buckets.categorical,
        };
        target.push(column.id.clone());
    }
    buckets
}
