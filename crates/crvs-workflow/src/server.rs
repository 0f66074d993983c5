use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    Router,
    routing::{get, post},
};
use tower_http::trace::TraceLayer;

use crate::config::WorkflowConfig;
use crate::error::WorkflowResult;
use crate::handlers::{self, AppState};
use crate::modifier::BundleModifier;

/// Routes the lifecycle endpoints to `modifier`.
pub fn build_router(modifier: Arc<BundleModifier>, body_limit: usize) -> Router {
    let state = AppState { modifier };

    Router::new()
        .route("/health", get(handlers::healthz))
        .route("/fhir/declare", post(handlers::declare))
        .route("/fhir/validate", post(handlers::validate))
        .route("/fhir/register", post(handlers::register))
        .route("/fhir/certify", post(handlers::certify))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|req: &axum::http::Request<_>| {
                    tracing::info_span!(
                        "http.request",
                        http.method = %req.method(),
                        http.target = %req.uri(),
                        http.status_code = tracing::field::Empty,
                    )
                })
                .on_response(
                    |res: &axum::http::Response<_>, latency: std::time::Duration, span: &tracing::Span| {
                        span.record("http.status_code", tracing::field::display(res.status().as_u16()));
                        tracing::info!(latency_ms = latency.as_millis() as u64, "request completed");
                    },
                ),
        )
        .layer(axum::extract::DefaultBodyLimit::max(body_limit))
        .with_state(state)
}

pub struct WorkflowServer {
    addr: SocketAddr,
    app: Router,
}

impl WorkflowServer {
    pub fn from_config(config: &WorkflowConfig) -> WorkflowResult<Self> {
        let modifier = BundleModifier::from_config(config)?;
        Ok(Self {
            addr: config.addr(),
            app: build_router(Arc::new(modifier), config.server.body_limit_bytes),
        })
    }

    pub async fn run(self) -> std::io::Result<()> {
        let listener = tokio::net::TcpListener::bind(self.addr).await?;
        tracing::info!("listening on {}", self.addr);
        axum::serve(listener, self.app)
            .with_graceful_shutdown(shutdown_signal())
            .await
    }
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    tracing::info!("shutdown signal received");
}
