//! AWS Lambda entry point for pollsync
//!
//! Deploy with `cargo lambda build --release --features lambda`.
//! Each scheduled invocation runs one sync cycle against S3.

use std::sync::Arc;

use lambda_runtime::{Error as LambdaError, LambdaEvent, service_fn};
use serde_json::{Value, json};
use tracing::{error, info, instrument};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use pollsync::config::LambdaConfigLoader;
use pollsync::error::Result;
use pollsync::pipeline::SyncReport;
use pollsync::storage::s3::S3Backend;
use pollsync::Runtime;

/// Main entry point for the AWS Lambda function.
#[tokio::main]
async fn main() -> std::result::Result<(), LambdaError> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    info!("pollsync Lambda starting...");
    lambda_runtime::run(service_fn(handler)).await
}

/// Handler for AWS Lambda events.
#[instrument(skip(event))]
async fn handler(event: LambdaEvent<Value>) -> std::result::Result<Value, LambdaError> {
    info!("Received event: {:?}", event.payload);

    match run_sync_cycle().await {
        Ok(report) => {
            info!(
                "Lambda execution successful: {} stored, {} failed",
                report.stored, report.failed
            );
            Ok(json!({ "status": "success", "report": report }))
        }
        Err(e) => {
            error!("Lambda execution failed: {}", e);
            Ok(json!({
                "status": "error",
                "fatal": e.is_fatal(),
                "message": e.to_string()
            }))
        }
    }
}

/// Load configuration from S3 and run one cycle.
async fn run_sync_cycle() -> Result<SyncReport> {
    let bootstrap = S3Backend::from_env().await;
    let config = LambdaConfigLoader::from_env(bootstrap).load_config().await?;

    let backend = Arc::new(S3Backend::from_config(&config.storage).await);
    let runtime = Runtime::with_backend(Arc::new(config), backend)?;
    runtime.engine().run_cycle().await
}
