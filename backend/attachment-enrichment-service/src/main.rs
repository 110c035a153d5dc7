//! Attachment Enrichment Service - Main entry point
//!
//! Enriches image attachments with AWS Rekognition results and makes them
//! searchable by the detected keywords.
//!
//! # Modes
//! - `worker` (default): Kafka consumer executing enrichment jobs
//! - `admin`: HTTP upload hook, admin label endpoints and attachment search
//! - `backfill`: Batch job enqueueing attachments that were never enriched

use actix_web::{web, App, HttpServer};
use anyhow::Result;
use attachment_enrichment_service::admin::{self, AdminState, TokenSigner};
use attachment_enrichment_service::jobs::BackfillConfig;
use attachment_enrichment_service::kafka::EnrichmentConsumerConfig;
use attachment_enrichment_service::providers::load_aws_config;
use attachment_enrichment_service::storage::AttachmentFiles;
use attachment_enrichment_service::{
    BackfillJob, CapabilityOrchestrator, Config, EnrichmentHooks, EnrichmentJobConsumer,
    EnrichmentJobRunner, KafkaJobScheduler, PersistenceWriter, PgStore, RekognitionProvider,
    ResultNormalizer, SearchQueryAugmenter, UploadTrigger,
};
use std::env;
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Service run mode
#[derive(Debug, Clone, PartialEq)]
enum RunMode {
    /// Default: Kafka consumer executing enrichment jobs
    Worker,
    /// HTTP surface
    Admin,
    /// Batch backfill of existing attachments
    Backfill,
}

impl RunMode {
    fn from_args() -> Self {
        let args: Vec<String> = env::args().collect();

        for i in 0..args.len() {
            if args[i] == "--mode" && i + 1 < args.len() {
                return match args[i + 1].as_str() {
                    "worker" => RunMode::Worker,
                    "admin" => RunMode::Admin,
                    "backfill" => RunMode::Backfill,
                    _ => {
                        warn!("Unknown mode '{}', using default 'worker'", args[i + 1]);
                        RunMode::Worker
                    }
                };
            }
        }

        RunMode::Worker
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            "attachment_enrichment_service=debug,actix_web=info,rdkafka=warn,info".into()
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let mode = RunMode::from_args();
    info!("Starting Attachment Enrichment Service in {:?} mode", mode);

    dotenvy::dotenv().ok();
    let config = Config::from_env().map_err(|e| {
        error!("Failed to load configuration: {}", e);
        anyhow::anyhow!("Configuration error: {}", e)
    })?;

    if config.database_url.is_empty() {
        error!("DATABASE_URL is required");
        anyhow::bail!("DATABASE_URL environment variable is required");
    }

    let pool = sqlx::PgPool::connect(&config.database_url)
        .await
        .map_err(|e| {
            error!("Failed to connect to database: {}", e);
            anyhow::anyhow!("Database connection error: {}", e)
        })?;
    let store = Arc::new(PgStore::new(pool));
    store.migrate().await?;
    info!("Database connection pool initialized");

    let sdk_config = load_aws_config(&config).await;
    let files = Arc::new(AttachmentFiles::with_s3(aws_sdk_s3::Client::new(&sdk_config)));

    let scheduler = Arc::new(
        KafkaJobScheduler::new(
            &config.kafka_brokers,
            config.kafka_jobs_topic.clone(),
            config.kafka_dlq_topic.clone(),
        )
        .map_err(|e| {
            error!("Failed to create Kafka producer: {}", e);
            anyhow::anyhow!("Kafka producer error: {}", e)
        })?,
    );
    let trigger = Arc::new(UploadTrigger::new(
        store.clone(),
        files.clone(),
        scheduler.clone(),
    ));

    match mode {
        RunMode::Worker => {
            let policy = config
                .enrichment_policy()
                .map_err(|e| anyhow::anyhow!("Configuration error: {}", e))?;
            info!(policy = ?policy, "Enrichment policy loaded");

            let hooks = EnrichmentHooks::default();
            let runner = EnrichmentJobRunner::new(
                CapabilityOrchestrator::new(
                    Arc::new(RekognitionProvider::from_sdk_config(&sdk_config)),
                    store.clone(),
                    files,
                    policy,
                    hooks.process,
                ),
                ResultNormalizer::new(hooks.keywords),
                PersistenceWriter::new(store.clone(), store.clone()),
            );
            run_worker_mode(&config, Arc::new(runner), scheduler).await
        }
        RunMode::Admin => run_admin_mode(&config, store, trigger).await,
        RunMode::Backfill => run_backfill_mode(&config, store, trigger).await,
    }
}

/// Run in worker mode - execute jobs from Kafka
async fn run_worker_mode(
    config: &Config,
    runner: Arc<EnrichmentJobRunner>,
    dlq: Arc<KafkaJobScheduler>,
) -> Result<()> {
    let consumer_config = EnrichmentConsumerConfig {
        brokers: config.kafka_brokers.clone(),
        group_id: config.kafka_group_id.clone(),
        topic: config.kafka_jobs_topic.clone(),
        ..EnrichmentConsumerConfig::default()
    };

    let consumer = EnrichmentJobConsumer::new(consumer_config, runner, Some(dlq)).map_err(|e| {
        error!("Failed to create Kafka consumer: {}", e);
        anyhow::anyhow!("Kafka consumer error: {}", e)
    })?;

    info!("Listening for jobs on topic: {}", config.kafka_jobs_topic);

    let consumer_handle = tokio::spawn(async move {
        if let Err(e) = consumer.run().await {
            error!("Kafka consumer error: {}", e);
        }
    });

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("Received shutdown signal");
        }
        _ = consumer_handle => {
            error!("Consumer task exited unexpectedly");
        }
    }

    info!("Shutting down Attachment Enrichment Service");

    Ok(())
}

/// Run in admin mode - serve the HTTP surface
async fn run_admin_mode(
    config: &Config,
    store: Arc<PgStore>,
    trigger: Arc<UploadTrigger>,
) -> Result<()> {
    if config.admin_token_secret.is_empty() {
        anyhow::bail!("ADMIN_TOKEN_SECRET environment variable is required for admin mode");
    }

    let state = AdminState {
        metadata: store.clone(),
        attachments: store.clone(),
        search: store,
        trigger,
        tokens: Arc::new(TokenSigner::new(
            &config.admin_token_secret,
            config.admin_token_ttl_seconds,
        )),
        augmenter: SearchQueryAugmenter::new(),
    };

    info!("HTTP server listening on port {}", config.http_port);

    HttpServer::new(move || {
        App::new()
            .app_data(web::Data::new(state.clone()))
            .configure(admin::configure)
    })
    .bind(("0.0.0.0", config.http_port))?
    .run()
    .await?;

    info!("Shutting down Attachment Enrichment Service");

    Ok(())
}

/// Run in backfill mode - enqueue attachments never enriched
async fn run_backfill_mode(
    config: &Config,
    store: Arc<PgStore>,
    trigger: Arc<UploadTrigger>,
) -> Result<()> {
    let backfill_config = BackfillConfig::from(config);
    info!(
        "Running backfill job: batch_size={}, max_attachments={}, rate_limit={}rps",
        backfill_config.batch_size, backfill_config.max_attachments, backfill_config.rate_limit_rps
    );

    let stats = BackfillJob::new(store, trigger, backfill_config)
        .run()
        .await
        .map_err(|e| {
            error!("Backfill job failed: {}", e);
            anyhow::anyhow!("Backfill job error: {}", e)
        })?;

    info!(
        "Backfill completed: processed={}, scheduled={}, skipped={}, errors={}, batches={}",
        stats.total_processed,
        stats.scheduled_count,
        stats.skipped_count,
        stats.error_count,
        stats.batches_processed
    );

    if stats.error_count > 0 {
        warn!(
            "Backfill completed with {} errors out of {} attachments",
            stats.error_count, stats.total_processed
        );
    }

    Ok(())
}
