// ============================================================
// Layer 1 — CLI / Presentation Layer
// ============================================================
// Entry point for all user interaction. Parses arguments with
// clap and delegates all work to Layer 2 (application) or to
// the HTTP server in `api`.
//
// Three commands are supported:
//   1. `train`   — fit, evaluate, track and export one model
//   2. `serve`   — run the REST prediction service
//   3. `predict` — score a JSON file of customers offline

pub mod commands;

use anyhow::{Context, Result};
use clap::Parser;
use commands::{Commands, PredictArgs, ServeArgs, TrainArgs};

#[derive(Parser, Debug)]
#[command(
    name = "churn",
    version,
    about = "Train bank customer churn classifiers and serve their predictions."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Dispatch to the matching handler; this layer only routes.
    pub fn run(self) -> Result<()> {
        match self.command {
            Commands::Train(args)   => run_train(args),
            Commands::Serve(args)   => run_serve(args),
            Commands::Predict(args) => run_predict(args),
        }
    }
}

fn run_train(args: TrainArgs) -> Result<()> {
    use crate::application::train_use_case::TrainUseCase;

    let config: crate::application::train_use_case::TrainConfig = args.into();
    tracing::info!("Training '{}' on {}", config.model, config.data_path);
    let outcome = TrainUseCase::new(config).execute()?;

    println!("{}", outcome.summary());
    println!("Run id: {}", outcome.run_id);
    println!("Model exported to {}", outcome.model_path.display());
    Ok(())
}

fn run_serve(args: ServeArgs) -> Result<()> {
    let runtime = tokio::runtime::Runtime::new().context("Cannot start tokio runtime")?;
    runtime.block_on(crate::api::serve(args.into()))
}

fn run_predict(args: PredictArgs) -> Result<()> {
    use crate::application::predict_use_case::PredictionService;
    use crate::domain::customer::CustomerBatch;
    use crate::infra::model_cache::ModelLoader;

    let text = std::fs::read_to_string(&args.input)
        .with_context(|| format!("Cannot read input file '{}'", args.input))?;
    let batch: CustomerBatch = serde_json::from_str(&text)
        .with_context(|| format!("'{}' is not a valid customer batch", args.input))?;

    let service = PredictionService::new(ModelLoader::new(&args.model_path));
    let runtime = tokio::runtime::Runtime::new().context("Cannot start tokio runtime")?;
    let result = runtime.block_on(service.predict(batch.data))?;

    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}
