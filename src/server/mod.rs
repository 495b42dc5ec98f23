// Amani - Support Server Module
// HTTP surface over the support pipeline

mod handlers;

pub use handlers::{create_router, health_check, metrics_endpoint, AppError, ChatRequest};

use anyhow::{Context, Result};
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::config::ServerConfig;
use crate::errors::bind_failed_error;
use crate::pipeline::SupportPipeline;

/// Main support server structure
pub struct SupportServer {
    /// Shared pipeline
    pipeline: Arc<SupportPipeline>,
    /// Server configuration
    config: ServerConfig,
    started_at: Instant,
}

impl SupportServer {
    pub fn new(pipeline: Arc<SupportPipeline>, config: ServerConfig) -> Self {
        Self {
            pipeline,
            config,
            started_at: Instant::now(),
        }
    }

    /// Router with tracing and CORS layers, ready to serve or test
    pub fn into_router(self) -> axum::Router {
        create_router(Arc::new(self))
            .layer(TraceLayer::new_for_http())
            .layer(CorsLayer::permissive())
    }

    /// Start the HTTP server; returns once `shutdown` resolves
    pub async fn serve<F>(self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let addr: SocketAddr = self
            .config
            .bind_address
            .parse()
            .with_context(|| format!("Invalid bind address: {}", self.config.bind_address))?;

        let sweeper = self.pipeline.sessions().spawn_cleanup_task();
        let app = self.into_router();

        tracing::info!("Starting Amani support server on {}", addr);

        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .with_context(|| bind_failed_error(&addr.to_string()))?;
        let served = axum::serve(listener, app)
            .with_graceful_shutdown(shutdown)
            .await;

        sweeper.abort();
        served?;

        tracing::info!("Support server stopped");
        Ok(())
    }

    /// Get reference to the pipeline
    pub fn pipeline(&self) -> &Arc<SupportPipeline> {
        &self.pipeline
    }

    /// Get server configuration
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    pub fn uptime(&self) -> Duration {
        self.started_at.elapsed()
    }
}
