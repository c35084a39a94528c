//! HTTP Server
//!
//! Binds the router on TCP and serves it until the shutdown future resolves.

use crate::handler::{router, AppState};
use std::future::Future;
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tracing::info;

const DEFAULT_HTTP_HOST: &str = "127.0.0.1";
const DEFAULT_HTTP_PORT: u16 = 8787;

/// HTTP Server Configuration
#[derive(Debug, Clone)]
pub struct HttpServerConfig {
    pub host: String,
    /// 0 picks an ephemeral port
    pub port: u16,
}

impl Default for HttpServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HTTP_HOST.to_string(),
            port: DEFAULT_HTTP_PORT,
        }
    }
}

/// HTTP Server bound to its listening socket
pub struct HttpServer {
    listener: TcpListener,
    state: AppState,
}

impl HttpServer {
    pub async fn bind(config: &HttpServerConfig, state: AppState) -> std::io::Result<Self> {
        let addr = format!("{}:{}", config.host, config.port);
        let listener = TcpListener::bind(&addr).await?;
        info!(addr = %listener.local_addr()?, "HTTP server listening");
        Ok(Self { listener, state })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Serve until `shutdown` completes; in-flight requests are drained
    pub async fn run<F>(self, shutdown: F) -> std::io::Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        axum::serve(self.listener, router(self.state))
            .with_graceful_shutdown(shutdown)
            .await?;
        info!("HTTP server stopped");
        Ok(())
    }
}
