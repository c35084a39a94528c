//! Stella Daemon - Main Entry Point
//! HTTP job API + worker over a SQLite queue and a Redis lock store

mod config;

use anyhow::{Context, Result};
use std::path::Path;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use config::{DaemonConfig, LogFormat};
use stella_api_http::{AppState, HttpServer, HttpServerConfig};
use stella_core::application::jobs::EnqueueConfig;
use stella_core::application::retry::RetryPolicy;
use stella_core::application::{
    shutdown_channel, JobService, Locker, LockerConfig, RecoveryService, Worker,
};
use stella_core::port::id_provider::UuidProvider;
use stella_core::port::time_provider::SystemTimeProvider;
use stella_infra_executor::{HttpExecutorConfig, HttpJobExecutor};
use stella_infra_redis::RedisLockStore;
use stella_infra_sqlite::{create_pool, run_migrations, SqliteJobQueue};

const VERSION: &str = env!("CARGO_PKG_VERSION");

fn init_logging(format: LogFormat) -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("stella=info"))
        .context("Failed to create env filter")?;

    match format {
        LogFormat::Json => {
            // Production: JSON structured logging
            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer().json())
                .init();
        }
        LogFormat::Pretty => {
            // Development: Pretty formatting with colors
            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer().pretty())
                .init();
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Load configuration and initialize logging
    let config = DaemonConfig::from_env()?;
    init_logging(config.log_format)?;

    info!("Stella daemon v{} starting...", VERSION);

    // 2. Initialize database
    info!(db_path = %config.db_path, "Initializing database...");
    if let Some(dir) = Path::new(&config.db_path).parent() {
        if !dir.as_os_str().is_empty() {
            tokio::fs::create_dir_all(dir)
                .await
                .with_context(|| format!("Failed to create {}", dir.display()))?;
        }
    }
    let pool = create_pool(&config.db_path)
        .await
        .map_err(|e| anyhow::anyhow!("DB pool creation failed: {}", e))?;
    run_migrations(&pool)
        .await
        .map_err(|e| anyhow::anyhow!("Migration failed: {}", e))?;

    // 3. Setup dependencies (DI wiring)
    let time_provider = Arc::new(SystemTimeProvider);
    let id_provider = Arc::new(UuidProvider);
    let queue = Arc::new(SqliteJobQueue::new(pool.clone()));

    info!(redis_url = %config.redis_url, "Connecting to lock store...");
    let lock_store = Arc::new(
        RedisLockStore::connect(&config.redis_url)
            .await
            .context("Lock store unavailable")?,
    );
    let locker = Arc::new(Locker::new(
        lock_store,
        LockerConfig {
            debug_locks: config.debug_locks,
        },
    ));

    let service = Arc::new(JobService::new(
        queue.clone(),
        locker,
        id_provider,
        time_provider.clone(),
        EnqueueConfig {
            mission_lock_ttl_ms: config.mission_lock_ttl_ms,
            ..Default::default()
        },
    ));

    let executor = Arc::new(
        HttpJobExecutor::new(HttpExecutorConfig {
            url: config.executor_url.clone(),
            timeout: config.executor_timeout,
        })
        .context("Failed to create executor")?,
    );

    // 4. Run crash recovery before the worker claims anything
    info!("Running crash recovery...");
    let recovery_service = RecoveryService::new(queue.clone(), time_provider.clone());
    match recovery_service.recover_orphaned_jobs().await {
        Ok(count) => info!(recovered_jobs = count, "Crash recovery completed"),
        Err(e) => tracing::error!(error = ?e, "Crash recovery failed"),
    }

    // 5. Start Worker (job processing loop)
    info!("Starting worker...");
    let (shutdown_tx, shutdown_rx) = shutdown_channel();

    let worker = Worker::new(
        queue,
        executor,
        Arc::new(RetryPolicy::default()),
        time_provider,
    );
    let worker_token = shutdown_rx.clone();
    let worker_handle = tokio::spawn(async move {
        if let Err(e) = worker.run(worker_token).await {
            tracing::error!(error = ?e, "Worker failed");
        }
    });

    // 6. Start HTTP server
    let server_config = HttpServerConfig {
        host: config.http_host.clone(),
        port: config.http_port,
    };
    let server = HttpServer::bind(&server_config, AppState::new(service))
        .await
        .with_context(|| {
            format!(
                "Failed to bind HTTP server on {}:{}",
                server_config.host, server_config.port
            )
        })?;
    let mut server_token = shutdown_rx;
    let server_handle = tokio::spawn(server.run(async move { server_token.wait().await }));

    info!("System ready. Waiting for jobs...");
    info!("Press Ctrl+C to shutdown");

    // 7. Wait for shutdown signal
    tokio::signal::ctrl_c().await?;

    info!("Shutdown signal received. Exiting gracefully...");

    // 8. Graceful shutdown
    shutdown_tx.shutdown();
    match tokio::time::timeout(std::time::Duration::from_secs(5), server_handle).await {
        Ok(Ok(Err(e))) => tracing::error!(error = %e, "HTTP server error"),
        Err(_) => tracing::warn!("HTTP server did not stop in time"),
        _ => {}
    }
    let _ = tokio::time::timeout(std::time::Duration::from_secs(5), worker_handle).await;
    pool.close().await;

    info!("Shutdown complete.");

    Ok(())
}
