pub mod assemble;
pub mod classify;
pub mod cli;
pub mod codec;
pub mod coerce;
pub mod error;
pub mod mapping;
pub mod model;
pub mod pipeline;
pub mod predict;
pub mod predict_cmd;
pub mod schema;
pub mod schema_cmd;
pub mod table;
pub mod validate;

use std::{env, sync::OnceLock};

use anyhow::Result;
use clap::Parser;
use log::{LevelFilter, debug};

use crate::cli::{Cli, Commands};

pub use crate::{
    error::{PipelineError, PredictionError},
    pipeline::{OutputMode, Pipeline, PipelineOutput, PredictionRequest, SchemaSource},
    predict::{ModelKind, Predictor},
};

static LOGGER: OnceLock<()> = OnceLock::new();

fn init_logging() {
    LOGGER.get_or_init(|| {
        let mut builder = env_logger::Builder::from_env(env_logger::Env::default());
        if env::var("RUST_LOG").is_err() {
            builder.filter_module("csv_predict", LevelFilter::Info);
        }
        let _ = builder.format_timestamp_millis().try_init();
    });
}

pub fn run() -> Result<()> {
    init_logging();
    let cli = Cli::parse();
    debug!("Parsed command: {:?}", cli.command);
    match cli.command {
        Commands::Schemas(args) => schema_cmd::list(&args),
        Commands::Schema(args) => schema_cmd::show(&args),
        Commands::ValidateSchema(args) => schema_cmd::validate_file(&args),
        Commands::Predict(args) => predict_cmd::execute(&args),
        Commands::Score(args) => predict_cmd::score(&args),
    }
}
