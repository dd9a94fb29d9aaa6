//! Heart Risk Serving - Main Entry Point
//!
//! Loads the model artifact once, then answers form submissions arriving over
//! NATS request-reply with a verdict and class percentages.

use anyhow::{Context, Result};
use futures::StreamExt;
use heart_risk_serving::{
    config::{AppConfig, LoggingConfig},
    consumer::RequestConsumer,
    error::ServingError,
    metrics::{MetricsReporter, ServingMetrics},
    models::{inference::PredictionService, loader::ModelLoader},
    producer::ReplyProducer,
    schema::form::FormManifest,
    types::{PredictionResponse, RawRecord},
};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Semaphore;
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

fn init_tracing(logging: &LoggingConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(format!("heart_risk_serving={}", logging.level)))
        .context("Invalid log level")?;

    if logging.format == "json" {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration
    let config = AppConfig::load()?;
    init_tracing(&config.logging)?;

    info!("Starting Heart Risk Serving");
    info!(
        artifact = %config.model.artifact_path,
        report_confidence = config.model.report_confidence,
        preapproved = ?config.model.trust.preapproved,
        "Configuration loaded successfully"
    );

    // Load the model before accepting any request
    let loader = ModelLoader::from_config(&config.model);
    let service = match PredictionService::from_config(&config, &loader) {
        Ok(service) => Arc::new(service),
        Err(e) => {
            error!(error = %e, "Model artifact could not be loaded");
            return Err(e).context("Startup aborted");
        }
    };
    info!(
        "Feature normalizer initialized ({} features)",
        service.normalizer().feature_count()
    );

    // Initialize metrics
    let metrics = Arc::new(ServingMetrics::new());

    // Connect to NATS
    let client = async_nats::connect(&config.nats.url)
        .await
        .with_context(|| format!("Failed to connect to NATS at {}", config.nats.url))?;
    info!("Connected to NATS at {}", config.nats.url);

    let queue_group = config.nats.queue_group.as_deref();
    let predict_consumer =
        RequestConsumer::new(client.clone(), &config.nats.predict_subject, queue_group);
    let form_consumer = RequestConsumer::new(client.clone(), &config.nats.form_subject, queue_group);
    let producer = ReplyProducer::new(client.clone());

    // Form manifest responder
    let mut form_requests = form_consumer.subscribe().await?;
    let form_producer = producer.clone();
    let manifest = FormManifest::heart();
    tokio::spawn(async move {
        while let Some(message) = form_requests.next().await {
            if let Err(e) = form_producer.reply_form(&message, &manifest).await {
                error!(error = %e, "Failed to reply with form manifest");
            }
        }
    });

    // Start metrics reporter
    let reporter = MetricsReporter::new(metrics.clone(), config.service.metrics_interval_secs);
    tokio::spawn(reporter.start());

    let num_workers = config.service.workers.max(1);
    info!(
        "Starting request loop with {} parallel workers",
        num_workers
    );
    info!("Listening on subject: {}", config.nats.predict_subject);
    info!("Serving form manifest on: {}", config.nats.form_subject);

    // Semaphore to limit concurrent evaluation
    let semaphore = Arc::new(Semaphore::new(num_workers));
    let answered = Arc::new(AtomicU64::new(0));

    let mut requests = predict_consumer.subscribe().await?;

    while let Some(message) = requests.next().await {
        let permit = semaphore
            .clone()
            .acquire_owned()
            .await
            .context("Worker semaphore closed")?;

        let service = service.clone();
        let producer = producer.clone();
        let metrics = metrics.clone();
        let answered = answered.clone();

        tokio::spawn(async move {
            let start_time = Instant::now();

            let response = match serde_json::from_slice::<RawRecord>(&message.payload) {
                Ok(raw) => match service.evaluate(&raw) {
                    Ok(result) => {
                        let processing_time = start_time.elapsed();
                        metrics.record_prediction(processing_time, &result);
                        debug!(
                            verdict = %result.verdict,
                            confidence = ?result.confidence,
                            processing_time_us = processing_time.as_micros(),
                            "Request evaluated"
                        );
                        PredictionResponse::success(&result)
                    }
                    Err(ServingError::Normalize(e)) => {
                        metrics.record_rejection(start_time.elapsed(), e.kind());
                        warn!(kind = e.kind(), error = %e, "Request rejected");
                        PredictionResponse::rejected(&e)
                    }
                    Err(ServingError::Invocation(e)) => {
                        metrics.record_failure(start_time.elapsed());
                        error!(error = %e, "Model invocation failed");
                        PredictionResponse::failed(&e)
                    }
                },
                Err(e) => {
                    metrics.record_rejection(start_time.elapsed(), "malformed");
                    warn!(error = %e, "Failed to deserialize request");
                    PredictionResponse::malformed(&e)
                }
            };

            if let Err(e) = producer.reply(&message, &response).await {
                error!(
                    request_id = %response.request_id,
                    error = %e,
                    "Failed to publish reply"
                );
            }

            let count = answered.fetch_add(1, Ordering::Relaxed) + 1;

            // Log progress every 100 requests
            if count % 100 == 0 {
                let throughput = metrics.get_throughput();
                let processing_stats = metrics.get_processing_stats();
                info!(
                    answered = count,
                    throughput = format!("{:.1} req/s", throughput),
                    avg_latency_us = processing_stats.mean_us,
                    "Processing milestone"
                );
            }

            drop(permit);
        });
    }

    info!("Service shutting down...");
    metrics.print_summary();

    Ok(())
}
