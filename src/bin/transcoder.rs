//! Transcoder Binary
//!
//! Consumes upload-completed events, transcodes each upload into an HLS
//! ladder, MP4 renditions and a thumbnail, then publishes a
//! transcoding-complete event. It wires up:
//! - Storage (S3-compatible or local filesystem)
//! - Redis Streams consumer and publisher
//! - FFmpeg encoder
//! - HTTP health endpoint

use std::error::Error;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;
use transcoder::adapters::artifacts::LayoutStore;
use transcoder::adapters::aws::S3Adapter;
use transcoder::adapters::ffmpeg::FfmpegBackend;
use transcoder::adapters::http;
use transcoder::adapters::local::redis::{RedisPool, RedisStreamConsumer, RedisStreamPublisher};
use transcoder::adapters::local::FsAdapter;
use transcoder::application::consumer::run_consumer_loop;
use transcoder::application::dispatcher::JobDispatcher;
use transcoder::application::health::HealthGate;
use transcoder::application::pipeline::PipelineCoordinator;
use transcoder::config::{StorageBackend, TranscoderConfig};
use transcoder::ports::events::{EventConsumer, EventPublisher};
use transcoder::ports::health::HealthCheck;
use transcoder::ports::storage::StoragePort;

const BROKER_CONNECT_ATTEMPTS: u32 = 3;
const BROKER_CONNECT_DELAY: Duration = Duration::from_secs(1);
/// How long one poll waits for new entries.
const POLL_BLOCK: Duration = Duration::from_secs(1);

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = match TranscoderConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!(error = %e, "invalid configuration");
            std::process::exit(1);
        }
    };

    // 1. Broker
    let pool = match RedisPool::connect(
        &config.broker.redis_url,
        BROKER_CONNECT_ATTEMPTS,
        BROKER_CONNECT_DELAY,
    )
    .await
    {
        Ok(pool) => pool,
        Err(e) => {
            error!(error = %e, "failed to connect to broker");
            std::process::exit(1);
        }
    };

    // 2. Storage, then the rest of the service on top of it
    let result = match config.storage.backend {
        StorageBackend::S3 => {
            let storage = S3Adapter::connect(
                &config.storage.s3,
                config.storage.source_bucket.clone(),
                config.storage.processed_bucket.clone(),
            )
            .await;
            match storage.ensure_buckets().await {
                Ok(()) => serve(config, storage, pool).await,
                Err(e) => Err(e),
            }
        }
        StorageBackend::Fs => {
            let storage = FsAdapter::new(
                &config.storage.root,
                &config.storage.source_bucket,
                &config.storage.processed_bucket,
            );
            match storage.ensure_buckets().await {
                Ok(()) => serve(config, storage, pool).await,
                Err(e) => Err(e.into()),
            }
        }
    };

    if let Err(e) = result {
        error!(error = %e, "transcoder failed");
        std::process::exit(1);
    }
}

async fn serve<S>(
    config: TranscoderConfig,
    storage: S,
    pool: RedisPool,
) -> Result<(), Box<dyn Error + Send + Sync>>
where
    S: StoragePort + HealthCheck + Clone + 'static,
{
    // 3. Adapters
    let store = LayoutStore::new(storage.clone(), config.storage.layout.clone());
    let encoder = FfmpegBackend::new(config.encoder.clone());
    let publisher = RedisStreamPublisher::new(
        pool.clone(),
        config.broker.complete_topic.clone(),
        config.broker.complete_group.clone(),
    );
    publisher.ensure_topic().await?;
    let consumer = Arc::new(RedisStreamConsumer::new(
        pool.clone(),
        config.broker.consumer_settings(),
    ));
    consumer.ensure_topic().await?;

    let health = HealthGate::new(config.health_timeout)
        .with_check(Arc::new(storage))
        .with_check(Arc::new(publisher.clone()));
    let report = health.check().await;
    if !report.is_ok() {
        for (name, detail) in report.failures() {
            error!(dependency = name, detail, "dependency unhealthy");
        }
        return Err("start-up health check failed".into());
    }

    tokio::fs::create_dir_all(&config.jobs.work_root).await?;

    // 4. Application services
    let root = CancellationToken::new();
    let pipeline = PipelineCoordinator::new(store, encoder, publisher, config.jobs.work_root.clone());
    let dispatcher = Arc::new(JobDispatcher::new(
        pipeline,
        config.jobs.dispatcher_settings(),
        root.child_token(),
    ));

    // 5. HTTP
    let listener = tokio::net::TcpListener::bind(format!("{}:{}", config.addr, config.port)).await?;
    info!(addr = %config.addr, port = %config.port, "listening");
    let server = {
        let shutdown = root.clone();
        let app = http::router(Arc::new(health));
        tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async move { shutdown.cancelled().await })
                .await
        })
    };

    // 6. Consumer loop
    let consumer_loop = {
        let consumer = consumer.clone();
        let dispatcher = dispatcher.clone();
        let shutdown = root.clone();
        tokio::spawn(async move {
            run_consumer_loop(consumer.as_ref(), dispatcher.as_ref(), POLL_BLOCK, shutdown).await;
        })
    };
    info!(
        topic = %config.broker.upload_topic,
        group = %config.broker.group_id,
        max_concurrent_jobs = config.jobs.max_concurrent_jobs,
        "transcoder started"
    );

    shutdown_signal().await;
    info!("shutdown requested");
    root.cancel();

    if let Err(e) = consumer_loop.await {
        warn!(error = %e, "consumer loop panicked");
    }
    dispatcher.shutdown().await;
    if let Err(e) = consumer.close().await {
        warn!(error = %e, "failed to close consumer");
    }
    match server.await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => warn!(error = %e, "http server error"),
        Err(e) => warn!(error = %e, "http server panicked"),
    }
    pool.close();
    info!("transcoder stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
