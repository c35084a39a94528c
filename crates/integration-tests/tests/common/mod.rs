//! Shared fixtures: a full stack over in-memory SQLite and an in-memory lock store

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;
use stella_api_http::{AppState, HttpServer, HttpServerConfig};
use stella_core::application::jobs::EnqueueConfig;
use stella_core::application::retry::RetryPolicy;
use stella_core::application::{
    shutdown_channel, JobService, Locker, LockerConfig, ShutdownSender, Worker,
};
use stella_core::port::id_provider::UuidProvider;
use stella_core::port::job_executor::mocks::MockJobExecutor;
use stella_core::port::lock_store::mocks::InMemoryLockStore;
use stella_core::port::time_provider::SystemTimeProvider;
use stella_infra_sqlite::{create_pool, run_migrations, SqliteJobQueue};

pub struct Stack {
    pub queue: Arc<SqliteJobQueue>,
    pub lock_store: Arc<InMemoryLockStore>,
    pub service: Arc<JobService>,
}

pub async fn sqlite_queue() -> Arc<SqliteJobQueue> {
    let pool = create_pool("sqlite::memory:").await.unwrap();
    run_migrations(&pool).await.unwrap();
    Arc::new(SqliteJobQueue::new(pool))
}

/// Job service with its own Locker (one per simulated process)
pub fn job_service(queue: &Arc<SqliteJobQueue>, store: &Arc<InMemoryLockStore>) -> Arc<JobService> {
    Arc::new(JobService::new(
        queue.clone(),
        Arc::new(Locker::new(store.clone(), LockerConfig { debug_locks: true })),
        Arc::new(UuidProvider),
        Arc::new(SystemTimeProvider),
        EnqueueConfig::default(),
    ))
}

pub async fn build_stack() -> Stack {
    let queue = sqlite_queue().await;
    let lock_store = Arc::new(InMemoryLockStore::new());
    let service = job_service(&queue, &lock_store);
    Stack {
        queue,
        lock_store,
        service,
    }
}

/// Worker with a short retry delay so retries settle within a test
pub fn worker(queue: &Arc<SqliteJobQueue>, executor: Arc<MockJobExecutor>) -> Worker {
    Worker::new(
        queue.clone(),
        executor,
        Arc::new(RetryPolicy::new(20, 2.0)),
        Arc::new(SystemTimeProvider),
    )
}

/// A running daemon: HTTP server plus worker, stopped by `shutdown`
pub struct RunningDaemon {
    pub addr: SocketAddr,
    pub stack: Stack,
    shutdown: ShutdownSender,
}

impl RunningDaemon {
    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn shutdown(&self) {
        self.shutdown.shutdown();
    }
}

pub async fn spawn_daemon(executor: Arc<MockJobExecutor>) -> RunningDaemon {
    let stack = build_stack().await;
    let (shutdown, token) = shutdown_channel();

    let worker = worker(&stack.queue, executor);
    let worker_token = token.clone();
    tokio::spawn(async move { worker.run(worker_token).await });

    let config = HttpServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
    };
    let server = HttpServer::bind(&config, AppState::new(stack.service.clone()))
        .await
        .unwrap();
    let addr = server.local_addr().unwrap();
    let mut server_token = token;
    tokio::spawn(server.run(async move { server_token.wait().await }));

    RunningDaemon {
        addr,
        stack,
        shutdown,
    }
}
