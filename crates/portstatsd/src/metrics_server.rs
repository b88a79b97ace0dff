//! HTTP server for the Prometheus metrics endpoint
//!
//! Every `GET /metrics` runs exactly one scrape cycle before the response is
//! written. Scrape failures do not change the response status; they show up
//! in `exporter_scrape_errors_total` and the logs.

use crate::collector::PortStatsCollector;
use crate::error::{PortstatsError, Result};
use axum::extract::State;
use axum::http::{StatusCode, header::CONTENT_TYPE};
use axum::response::{IntoResponse, Response};
use axum::{Router, routing::get};
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{error, info};

/// Metrics endpoint path
pub const METRICS_PATH: &str = "/metrics";

/// Build the exposition router around a shared collector
pub fn router(collector: Arc<PortStatsCollector>) -> Router {
    Router::new()
        .route(METRICS_PATH, get(metrics_handler))
        .with_state(collector)
}

async fn metrics_handler(State(collector): State<Arc<PortStatsCollector>>) -> Response {
    let (_, body) = collector.collect_and_gather().await;

    match body {
        Ok(body) => ([(CONTENT_TYPE, collector.content_type())], body).into_response(),
        Err(e) => {
            error!(error = %e, "portstatsd: Failed to encode metrics");
            (StatusCode::INTERNAL_SERVER_ERROR, "# Error encoding metrics\n").into_response()
        }
    }
}

/// Metrics HTTP server bound to a listen address
pub struct MetricsServer {
    listener: TcpListener,
    collector: Arc<PortStatsCollector>,
}

impl MetricsServer {
    /// Bind the listener; port 0 picks a free port
    pub async fn bind(addr: SocketAddr, collector: Arc<PortStatsCollector>) -> Result<Self> {
        let listener = TcpListener::bind(addr).await.map_err(|e| {
            PortstatsError::Io(std::io::Error::new(
                e.kind(),
                format!("Failed to bind metrics listener {}: {}", addr, e),
            ))
        })?;
        Ok(Self {
            listener,
            collector,
        })
    }

    /// Address actually bound
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Serve until `shutdown` resolves
    pub async fn run<F>(self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let addr = self.local_addr()?;
        info!(%addr, path = METRICS_PATH, "portstatsd: Serving metrics");

        axum::serve(self.listener, router(self.collector))
            .with_graceful_shutdown(shutdown)
            .await?;

        info!("portstatsd: Metrics server stopped");
        Ok(())
    }
}
