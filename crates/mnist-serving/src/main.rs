//! Digit classifier service entry point.
//!
//! `mnist-serving [serve]` starts the HTTP server; `mnist-serving predict
//! <IMAGE>` classifies one file locally; `mnist-serving validate <DIR>`
//! reports accuracy over a labelled directory.

use std::path::Path;

use anyhow::Context;
use clap::Parser;
use tracing::error;

use mnist_serving::classifier::ClassifierHandle;
use mnist_serving::cli::{Cli, Commands};
use mnist_serving::config::ServingConfig;
use mnist_serving::engine::InferenceEngine;
use mnist_serving::evaluation;
use mnist_serving::preprocess::Preprocessor;
use mnist_serving::server::ServingServer;
use mnist_serving::telemetry;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = ServingConfig::load(cli.config.as_deref()).context("failed to load configuration")?;
    telemetry::init(config.log_format, cli.verbose);

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => {
            let server = match ServingServer::bootstrap(config) {
                Ok(server) => server,
                Err(e) => {
                    let detail = format!("{:#}", anyhow::Error::new(e));
                    error!(error = %detail, "service bootstrap failed");
                    std::process::exit(1);
                }
            };
            server.start().await?;
        }
        Commands::Predict { image, model } => {
            let engine = load_engine(&model.unwrap_or(config.model_path))?;
            let bytes = tokio::fs::read(&image)
                .await
                .with_context(|| format!("failed to read {}", image.display()))?;

            let result = tokio::task::spawn_blocking(move || engine.predict_one(&bytes))
                .await?
                .with_context(|| format!("failed to classify {}", image.display()))?;
            println!("{result}");
        }
        Commands::Validate { dir, model } => {
            let engine = load_engine(&model.unwrap_or(config.model_path))?;
            let samples = evaluation::discover(&dir)?;

            let report = tokio::task::spawn_blocking(move || evaluation::evaluate(&engine, &samples))
                .await?;
            println!("{report}");
        }
    }

    Ok(())
}

fn load_engine(model_path: &Path) -> anyhow::Result<InferenceEngine> {
    let classifier = ClassifierHandle::load(model_path)
        .with_context(|| format!("failed to load model {}", model_path.display()))?;
    Ok(InferenceEngine::new(Preprocessor::new(), classifier))
}
