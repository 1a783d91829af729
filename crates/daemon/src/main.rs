//! Ingest Worker Daemon - composition root
//!
//! Wires SQLite, the filesystem object store, the worker pool, lease
//! recovery and the JSON-RPC server, then runs until Ctrl+C.

mod settings;
mod telemetry;

use anyhow::{Context, Result};
use settings::{LogFormat, Settings};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

use ingest_api_rpc::{RpcServer, RpcServerConfig};
use ingest_core::application::{
    shutdown_channel, IngestionPipeline, IngestionService, RecoveryService, RetryPolicy,
    ShutdownToken, Worker, WorkerConfig,
};
use ingest_core::port::id_provider::UuidProvider;
use ingest_core::port::time_provider::SystemTimeProvider;
use ingest_core::port::{
    DocumentRepository, IdProvider, JobRepository, ObjectStore, TimeProvider,
    TransactionalJobRepository,
};
use ingest_infra_sqlite::{
    create_pool, run_migrations, SqliteDocumentRepository, SqliteJobRepository,
};
use ingest_infra_storage::LocalObjectStore;

const VERSION: &str = env!("CARGO_PKG_VERSION");
const SHUTDOWN_GRACE: std::time::Duration = std::time::Duration::from_secs(10);

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Configuration (needed before logging: format and log_dir live there)
    let settings = Settings::load()?;

    // 2. Logging
    let (_log_guard, telemetry_status) = init_logging(&settings)?;
    telemetry::report(&telemetry_status);
    info!("Ingest worker v{} starting...", VERSION);

    // 3. Database
    if let Some(path) = settings.database_path() {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
    }
    let database_url = settings.database_url();
    info!(database_url = %database_url, "Initializing database...");
    let pool = create_pool(&database_url)
        .await
        .map_err(|e| anyhow::anyhow!("DB pool creation failed: {}", e))?;
    run_migrations(&pool)
        .await
        .map_err(|e| anyhow::anyhow!("Migration failed: {}", e))?;

    // 4. Dependency wiring
    let time_provider: Arc<dyn TimeProvider> = Arc::new(SystemTimeProvider);
    let id_provider: Arc<dyn IdProvider> = Arc::new(UuidProvider);
    let sqlite_jobs = Arc::new(SqliteJobRepository::new(pool.clone(), time_provider.clone()));
    let job_repo: Arc<dyn JobRepository> = sqlite_jobs.clone();
    let tx_repo: Arc<dyn TransactionalJobRepository> = sqlite_jobs;
    let doc_repo: Arc<dyn DocumentRepository> = Arc::new(SqliteDocumentRepository::new(pool.clone()));

    let storage_root = settings.storage_root();
    tokio::fs::create_dir_all(&storage_root)
        .await
        .with_context(|| format!("Failed to create {}", storage_root.display()))?;
    info!(storage_root = %storage_root.display(), "Using local object store");
    let object_store: Arc<dyn ObjectStore> = Arc::new(LocalObjectStore::new(storage_root));

    let (shutdown_tx, _) = shutdown_channel();

    // 5. Lease recovery: once now, then on an interval
    let recovery = Arc::new(RecoveryService::new(
        job_repo.clone(),
        tx_repo.clone(),
        settings.lease_timeout_ms(),
    ));
    match recovery.dead_letter_expired_leases().await {
        Ok(count) => info!(dead_lettered = count, "Startup lease recovery completed"),
        Err(e) => error!(error = %e, "Startup lease recovery failed"),
    }
    let recovery_handle = spawn_recovery_ticker(
        recovery,
        settings.recovery_interval(),
        shutdown_tx.token(),
    );

    // 6. JSON-RPC server
    let service = Arc::new(IngestionService::new(
        job_repo.clone(),
        doc_repo.clone(),
        object_store.clone(),
        id_provider.clone(),
        time_provider.clone(),
        settings.default_max_attempts,
    ));
    let rpc_handle = if settings.rpc_enabled {
        let rpc_config = RpcServerConfig {
            host: settings.rpc_host.clone(),
            port: settings.rpc_port,
        };
        let handle = RpcServer::new(rpc_config, service)
            .start()
            .await
            .map_err(|e| anyhow::anyhow!("RPC server start failed: {}", e))?;
        Some(handle)
    } else {
        info!("JSON-RPC server disabled");
        None
    };

    // 7. Worker pool
    let pipeline = IngestionPipeline::new(
        job_repo.clone(),
        tx_repo.clone(),
        doc_repo,
        object_store,
        id_provider,
        settings.chunk_config()?,
    );
    let retry_policy = RetryPolicy::from_secs(settings.retry_base_secs, settings.retry_max_secs);

    let mut worker_handles = Vec::new();
    for worker_id in settings.worker_ids() {
        let worker = Worker::new(
            WorkerConfig {
                worker_id: worker_id.clone(),
                poll_interval: settings.poll_interval(),
                heartbeat_interval: settings.heartbeat_interval(),
                lease_timeout_ms: settings.lease_timeout_ms(),
            },
            job_repo.clone(),
            tx_repo.clone(),
            pipeline.clone(),
            retry_policy,
            time_provider.clone(),
        );
        let token = shutdown_tx.token();
        worker_handles.push(tokio::spawn(async move {
            if let Err(e) = worker.run(token).await {
                error!(worker_id = %worker_id, error = %e, "Worker failed");
            }
        }));
    }
    if worker_handles.is_empty() {
        warn!("worker_concurrency = 0, no jobs will be processed by this process");
    }

    info!(workers = worker_handles.len(), "System ready. Press Ctrl+C to shutdown");

    // 8. Wait for shutdown signal
    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for Ctrl+C")?;
    info!("Shutdown signal received. Exiting gracefully...");

    // 9. Graceful shutdown: stop accepting requests, let in-flight jobs finish
    shutdown_tx.shutdown();
    if let Some(handle) = rpc_handle {
        handle
            .stop()
            .map_err(|e| anyhow::anyhow!("RPC server stop failed: {}", e))?;
    }
    worker_handles.push(recovery_handle);
    if tokio::time::timeout(SHUTDOWN_GRACE, join_all(worker_handles))
        .await
        .is_err()
    {
        warn!(
            grace_secs = SHUTDOWN_GRACE.as_secs(),
            "Workers still busy after grace period; their leases will expire"
        );
    }
    pool.close().await;

    info!("Shutdown complete.");
    Ok(())
}

/// Install the global subscriber: console (pretty or JSON), optional daily
/// log file, optional OpenTelemetry export.
fn init_logging(
    settings: &Settings,
) -> Result<(Option<WorkerGuard>, telemetry::TelemetryStatus)> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("ingest=info"))
        .context("Failed to create env filter")?;

    let (otel, status) = telemetry::otel_layer()?;

    let console = match settings.log_format {
        LogFormat::Json => fmt::layer().json().boxed(),
        LogFormat::Pretty => fmt::layer().pretty().boxed(),
    };

    let (file_layer, guard) = match settings.log_dir() {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "ingest-worker.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer().with_writer(writer).with_ansi(false);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(otel)
        .with(env_filter)
        .with(console)
        .with(file_layer)
        .try_init()
        .context("Failed to install tracing subscriber")?;

    Ok((guard, status))
}

fn spawn_recovery_ticker(
    recovery: Arc<RecoveryService>,
    every: std::time::Duration,
    mut shutdown: ShutdownToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + every, every);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    match recovery.dead_letter_expired_leases().await {
                        Ok(0) => {}
                        Ok(count) => info!(dead_lettered = count, "Expired leases recovered"),
                        Err(e) => error!(error = %e, "Lease recovery failed"),
                    }
                }
                _ = shutdown.wait() => break,
            }
        }
    })
}

async fn join_all(handles: Vec<JoinHandle<()>>) {
    for handle in handles {
        if let Err(e) = handle.await {
            error!(error = %e, "Background task panicked");
        }
    }
}
