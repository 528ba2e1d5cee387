//! Built-in predictor backed by dense networks loaded from YAML.
//!
//! A model file carries an optional `fast` and an optional `deep` network:
//!
//! ```yaml
//! fast:
//!   layers:
//!     - weights: [[0.2, -0.1, 0.4]]
//!       bias: [0.05]
//!       activation: sigmoid
//! deep:
//!   layers:
//!     - weights: [[0.1, 0.2, 0.3], [0.3, 0.2, 0.1]]
//!       bias: [0.0, 0.0]
//!       activation: relu
//!     - weights: [[0.5, 0.5]]
//!       bias: [0.1]
//! ```
//!
//! Each layer's `weights` has one row per output and one column per input.

use std::{fs::File, io::BufReader, path::Path};

use anyhow::{Context, Result, ensure};
use serde::{Deserialize, Serialize};

use crate::{
    coerce::Feature,
    error::PredictionError,
    predict::{ModelKind, Predictor},
};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Activation {
    #[default]
    Identity,
    Relu,
    Sigmoid,
    Tanh,
}

impl Activation {
    fn apply(self, value: f64) -> f64 {
        match self {
            Activation::Identity => value,
            Activation::Relu => value.max(0.0),
            Activation::Sigmoid => 1.0 / (1.0 + (-value).exp()),
            Activation::Tanh => value.tanh(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DenseLayer {
    pub weights: Vec<Vec<f64>>,
    pub bias: Vec<f64>,
    #[serde(default)]
    pub activation: Activation,
}

impl DenseLayer {
    fn inputs(&self) -> usize {
        self.weights.first().map_or(0, Vec::len)
    }

    fn outputs(&self) -> usize {
        self.weights.len()
    }

    fn forward(&self, input: &[f64]) -> Vec<f64> {
        self.weights
            .iter()
            .zip(&self.bias)
            .map(|(row, bias)| {
                let sum = row.iter().zip(input).map(|(w, x)| w * x).sum::<f64>() + bias;
                self.activation.apply(sum)
            })
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Network {
    pub layers: Vec<DenseLayer>,
}

impl Network {
    pub fn input_width(&self) -> usize {
        self.layers.first().map_or(0, DenseLayer::inputs)
    }

    fn ensure_valid(&self, name: &str) -> Result<()> {
        ensure!(!self.layers.is_empty(), "{name} model defines no layers");
        let mut expected_inputs = self.input_width();
        ensure!(expected_inputs > 0, "{name} model takes no inputs");
        for (idx, layer) in self.layers.iter().enumerate() {
            ensure!(
                layer.outputs() > 0,
                "{name} model layer {idx} has no weight rows"
            );
            ensure!(
                layer.bias.len() == layer.outputs(),
                "{name} model layer {idx} has {} bias value(s) for {} output(s)",
                layer.bias.len(),
                layer.outputs()
            );
            ensure!(
                layer.weights.iter().all(|row| row.len() == expected_inputs),
                "{name} model layer {idx} expects {expected_inputs} input(s) on every weight row"
            );
            expected_inputs = layer.outputs();
        }
        Ok(())
    }

    pub fn forward(&self, features: &[Feature]) -> Result<Vec<f64>, PredictionError> {
        if features.len() != self.input_width() {
            return Err(PredictionError::ShapeMismatch {
                expected: self.input_width(),
                actual: features.len(),
            });
        }
        let mut activations = features
            .iter()
            .enumerate()
            .map(|(index, feature)| {
                feature
                    .as_f64()
                    .ok_or_else(|| PredictionError::NonNumericFeature {
                        index,
                        value: feature.to_string(),
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;
        for layer in &self.layers {
            activations = layer.forward(&activations);
        }
        Ok(activations)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelSet {
    #[serde(default)]
    pub fast: Option<Network>,
    #[serde(default)]
    pub deep: Option<Network>,
}

impl ModelSet {
    pub fn load(path: &Path) -> Result<Self> {
        let file = File::open(path).with_context(|| format!("Opening model file {path:?}"))?;
        let models: ModelSet = serde_yaml::from_reader(BufReader::new(file))
            .with_context(|| format!("Parsing model file {path:?}"))?;
        models.ensure_valid()?;
        Ok(models)
    }

    pub fn from_yaml_str(raw: &str) -> Result<Self> {
        let models: ModelSet = serde_yaml::from_str(raw).context("Parsing model YAML")?;
        models.ensure_valid()?;
        Ok(models)
    }

    fn ensure_valid(&self) -> Result<()> {
        if let Some(network) = &self.fast {
            network.ensure_valid("fast")?;
        }
        if let Some(network) = &self.deep {
            network.ensure_valid("deep")?;
        }
        Ok(())
    }

    pub fn network(&self, model: ModelKind) -> Option<&Network> {
        match model {
            ModelKind::Fast => self.fast.as_ref(),
            ModelKind::Deep => self.deep.as_ref(),
        }
    }

    pub fn has(&self, model: ModelKind) -> bool {
        self.network(model).is_some()
    }
}

impl Predictor for ModelSet {
    fn predict(&self, model: ModelKind, features: &[Feature]) -> Result<Vec<f64>, PredictionError> {
        self.network(model)
            .ok_or(PredictionError::ModelUnavailable(model))?
            .forward(features)
    }
}
