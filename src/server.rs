//! HTTP server for Prometheus metrics export
//!
//! Serves the registry at the telemetry path, a JSON health report at
//! `/health` and a small landing page at `/`.

use crate::{health::CollectorHealth, registry::MetricRegistry, types::HealthStatus};
use anyhow::{Context, Result};
use http_body_util::Full;
use hyper::body::Bytes;
use hyper::header::{HeaderValue, CONTENT_TYPE};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{debug, error, info, warn};

const TEXT_FORMAT: &str = "text/plain; version=0.0.4";

/// Shared state read by every request
struct ServerState {
    registry: Arc<MetricRegistry>,
    health: Arc<CollectorHealth>,
    telemetry_path: String,
}

/// HTTP server exposing the metric registry
pub struct MetricsServer {
    listen_addr: SocketAddr,
    state: Arc<ServerState>,
}

impl MetricsServer {
    /// Create a new metrics server
    pub fn new(
        listen_addr: SocketAddr,
        telemetry_path: &str,
        registry: Arc<MetricRegistry>,
        health: Arc<CollectorHealth>,
    ) -> Self {
        Self {
            listen_addr,
            state: Arc::new(ServerState {
                registry,
                health,
                telemetry_path: telemetry_path.to_string(),
            }),
        }
    }

    /// Binds the configured listen address
    pub async fn bind(&self) -> Result<TcpListener> {
        TcpListener::bind(&self.listen_addr)
            .await
            .with_context(|| format!("Failed to bind metrics server on {}", self.listen_addr))
    }

    /// Serves connections accepted on `listener` until the task is dropped
    pub async fn serve(self, listener: TcpListener) -> Result<()> {
        let local_addr = listener
            .local_addr()
            .context("Failed to read metrics server address")?;
        info!(
            "Metrics server listening on http://{}{}",
            local_addr, self.state.telemetry_path
        );

        loop {
            let (stream, remote_addr) = match listener.accept().await {
                Ok(conn) => conn,
                Err(e) => {
                    error!("Failed to accept connection: {}", e);
                    continue;
                }
            };

            let state = self.state.clone();

            tokio::spawn(async move {
                let io = TokioIo::new(stream);

                let service = service_fn(move |req: Request<hyper::body::Incoming>| {
                    let state = state.clone();
                    async move {
                        Ok::<_, Infallible>(route(req.method(), req.uri().path(), &state).await)
                    }
                });

                if let Err(err) = http1::Builder::new().serve_connection(io, service).await {
                    debug!("Connection error from {}: {}", remote_addr, err);
                }
            });
        }
    }
}

fn respond(
    status: StatusCode,
    content_type: &'static str,
    body: impl Into<Bytes>,
) -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(body.into()));
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static(content_type));
    response
}

/// Dispatches one request
async fn route(method: &Method, path: &str, state: &ServerState) -> Response<Full<Bytes>> {
    debug!("Metrics request: {} {}", method, path);

    if method != Method::GET {
        return respond(
            StatusCode::METHOD_NOT_ALLOWED,
            "text/plain",
            "Method Not Allowed",
        );
    }

    if path == state.telemetry_path {
        return match state.registry.encode() {
            Ok(metrics_text) => respond(StatusCode::OK, TEXT_FORMAT, metrics_text),
            Err(e) => {
                error!("Failed to encode metrics: {}", e);
                respond(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "text/plain",
                    format!("Error: {}", e),
                )
            }
        };
    }

    if path == "/health" {
        let report = state.health.report().await;
        let status = match report.status {
            HealthStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::OK,
        };
        return match serde_json::to_vec(&report) {
            Ok(body) => respond(status, "application/json", body),
            Err(e) => respond(
                StatusCode::INTERNAL_SERVER_ERROR,
                "text/plain",
                format!("Error: {}", e),
            ),
        };
    }

    if path == "/" {
        let landing = format!(
            "<html><head><title>Market Summary Exporter</title></head><body>\
             <h1>Market Summary Exporter</h1>\
             <p><a href=\"{0}\">{0}</a> - Prometheus metrics</p>\
             <p><a href=\"/health\">/health</a> - Collector health</p>\
             </body></html>",
            state.telemetry_path
        );
        return respond(StatusCode::OK, "text/html; charset=utf-8", landing);
    }

    warn!("Unknown endpoint requested: {}", path);
    respond(StatusCode::NOT_FOUND, "text/plain", "Not Found")
}
