//! BFSI Scoring Service - Main Entry Point
//!
//! Loads the credit risk, fraud and churn models, then answers scoring
//! requests over NATS request/reply. Requests are processed in parallel up to
//! the configured worker count.

use anyhow::{Context, Result};
use bfsi_scoring::{
    config::{AppConfig, LoggingConfig, DEFAULT_CONFIG_PATH},
    consumer::RequestConsumer,
    domain::{DomainKind, DomainSpec},
    metrics::{MetricsReporter, ServiceMetrics},
    models::ModelLoader,
    predictor::{Predict, Predictor},
    producer::ReplyPublisher,
    router::Router,
    service::{RequestKind, ScoringService},
};
use futures::StreamExt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tracing::{debug, error, info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string());
    let config = AppConfig::load_from_path(&config_path)
        .with_context(|| format!("Failed to load configuration from {}", config_path))?;

    init_logging(&config.logging)?;

    info!("Starting BFSI Scoring Service");
    info!(
        path = %config_path,
        fraud_schema = config.fraud.schema_variant.as_str(),
        schema_fallback = config.models.allow_schema_fallback,
        "Configuration loaded successfully"
    );

    // Load every model before accepting traffic
    let router = Arc::new(build_router(&config)?);
    info!(modules = ?router.modules(), "Router initialized");

    let metrics = Arc::new(ServiceMetrics::new());
    let service = Arc::new(ScoringService::new(
        router.clone(),
        metrics.clone(),
        Duration::from_millis(config.pipeline.timeout_ms),
    ));

    // Connect to NATS
    let client = async_nats::connect(&config.nats.url)
        .await
        .with_context(|| format!("Failed to connect to NATS at {}", config.nats.url))?;
    info!("Connected to NATS at {}", config.nats.url);

    let consumer = RequestConsumer::new(client.clone(), &config.nats.subject_prefix);
    let publisher = ReplyPublisher::new(client.clone());

    let num_workers = config.pipeline.workers.max(1);
    info!(
        workers = num_workers,
        timeout_ms = config.pipeline.timeout_ms,
        subject = %consumer.subject(),
        "Starting request processing loop"
    );

    // Semaphore to limit concurrent processing
    let semaphore = Arc::new(Semaphore::new(num_workers));
    let processed_count = Arc::new(AtomicU64::new(0));

    // Start metrics reporter (prints summary every 30 seconds)
    let metrics_clone = metrics.clone();
    tokio::spawn(async move {
        let reporter = MetricsReporter::new(metrics_clone, 30);
        reporter.start().await;
    });

    let prefix = consumer.prefix().to_string();
    let mut subscription = consumer.subscribe().await?;

    while let Some(message) = subscription.next().await {
        let Some(reply_to) = message.reply.clone() else {
            warn!(subject = %message.subject, "Dropping request without a reply subject");
            continue;
        };
        let Some(kind) = RequestKind::from_subject(&prefix, message.subject.as_str()) else {
            warn!(subject = %message.subject, "Ignoring request on unknown subject");
            continue;
        };

        // Acquire permit (limits concurrent tasks)
        let permit = semaphore
            .clone()
            .acquire_owned()
            .await
            .context("Worker semaphore closed")?;

        let service = service.clone();
        let publisher = publisher.clone();
        let metrics = metrics.clone();
        let processed_count = processed_count.clone();
        let payload = message.payload.to_vec();

        tokio::spawn(async move {
            // Released only once the blocking work finishes
            let envelope = service.handle_async(kind, payload, permit).await;

            if let Err(e) = publisher.publish(reply_to, &envelope).await {
                error!(
                    request_id = %envelope.request_id,
                    error = %e,
                    "Failed to publish reply"
                );
            } else {
                debug!(
                    request_id = %envelope.request_id,
                    kind = ?kind,
                    status = envelope.status,
                    "Reply published"
                );
            }

            let count = processed_count.fetch_add(1, Ordering::Relaxed) + 1;

            // Log progress every 100 requests
            if count % 100 == 0 {
                let processing_stats = metrics.get_processing_stats();
                info!(
                    processed = count,
                    throughput = format!("{:.1} req/s", metrics.get_throughput()),
                    avg_latency_us = processing_stats.mean_us,
                    "Processing milestone"
                );
            }
        });
    }

    info!("Scoring service shutting down...");
    metrics.print_summary();

    Ok(())
}

fn init_logging(logging: &LoggingConfig) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::from_default_env()
        .add_directive(format!("bfsi_scoring={}", logging.level).parse()?);

    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if logging.format.eq_ignore_ascii_case("json") {
        builder.json().init();
    } else {
        builder.init();
    }
    Ok(())
}

/// Load the three configured models and wire a predictor for each
fn build_router(config: &AppConfig) -> Result<Router> {
    let loader = ModelLoader::with_threads(config.models.onnx_threads)?;

    let mut predictors: Vec<Arc<dyn Predict>> = Vec::with_capacity(DomainKind::ALL.len());
    for kind in DomainKind::ALL {
        let artifact = loader
            .load_artifact(&config.models, kind)
            .with_context(|| format!("Failed to load {} model", kind))?;
        let spec = DomainSpec::for_domain(kind, config.fraud.schema_variant);
        predictors.push(Arc::new(Predictor::new(spec, Arc::new(artifact))));
    }

    Ok(Router::new(predictors))
}
