use crate::config::Config;
use crate::error::{HagraphError, Result};
use crate::ingest::Ingestor;
use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Query string of `/api/graph`
#[derive(Debug, Default, Deserialize)]
pub struct GraphQuery {
    /// Restrict the graph to the neighbourhood of this node
    pub automation: Option<String>,
    /// Hops around `automation`, default 1
    pub depth: Option<usize>,
}

/// HTTP front door for the graph UI
pub struct HttpServer {
    ingestor: Arc<Ingestor>,
    config: Config,
}

impl HttpServer {
    pub fn new(ingestor: Ingestor, config: Config) -> Self {
        Self {
            ingestor: Arc::new(ingestor),
            config,
        }
    }

    /// Bind and serve until the process is stopped
    pub async fn run(&self) -> Result<()> {
        let addr = format!("{}:{}", self.config.http_server.host, self.config.http_server.port);
        let app = self.create_router();

        let listener = tokio::net::TcpListener::bind(&addr).await.map_err(|e| {
            HagraphError::Io(std::io::Error::new(
                e.kind(),
                format!(
                    "Failed to bind to {}: {}. Set http_server.port in config.toml to use a different port.",
                    addr, e
                ),
            ))
        })?;

        log::info!("Serving relation graph on http://{}", addr);
        log::info!("Graph endpoint: http://{}/api/graph", addr);

        axum::serve(listener, app)
            .await
            .map_err(|e| HagraphError::Io(std::io::Error::other(format!("HTTP server error: {}", e))))?;

        Ok(())
    }

    /// Create the axum router
    pub fn create_router(&self) -> Router {
        let allowed_origins = &self.config.http_server.allowed_origins;

        // Empty list means local development: allow any origin.
        let cors = if allowed_origins.is_empty() {
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any)
        } else {
            let origins: Vec<axum::http::HeaderValue> = allowed_origins
                .iter()
                .filter_map(|o| o.parse().ok())
                .collect();
            CorsLayer::new()
                .allow_origin(AllowOrigin::list(origins))
                .allow_methods(Any)
                .allow_headers(Any)
        };

        Router::new()
            .route("/health", get(handle_health))
            .route("/api/ingest", get(handle_ingest))
            .route("/api/graph", get(handle_graph))
            .layer(
                ServiceBuilder::new()
                    .layer(TraceLayer::new_for_http())
                    .layer(cors),
            )
            .with_state(Arc::clone(&self.ingestor))
    }
}

/// Handle health check endpoint
async fn handle_health() -> Response {
    (
        StatusCode::OK,
        Json(serde_json::json!({
            "status": "ok",
            "service": "hagraph",
            "version": env!("CARGO_PKG_VERSION")
        })),
    )
        .into_response()
}

/// Run one ingestion cycle and return counts plus the laid-out graph
async fn handle_ingest(State(ingestor): State<Arc<Ingestor>>) -> Response {
    match ingestor.ingest().await {
        Ok(report) => (StatusCode::OK, Json(report)).into_response(),
        Err(e) => error_response(e),
    }
}

/// Return `{nodes, edges}`, optionally focused on one automation
async fn handle_graph(
    State(ingestor): State<Arc<Ingestor>>,
    Query(query): Query<GraphQuery>,
) -> Response {
    let depth = query.depth.unwrap_or(1);
    match ingestor.graph(query.automation.as_deref(), depth).await {
        Ok(Some(graph)) => (StatusCode::OK, Json(graph)).into_response(),
        Ok(None) => (
            StatusCode::NOT_FOUND,
            Json(serde_json::json!({
                "error": "Unknown automation",
                "details": query.automation.unwrap_or_default()
            })),
        )
            .into_response(),
        Err(e) => error_response(e),
    }
}

fn error_response(e: HagraphError) -> Response {
    log::error!("Ingestion failed: {}", e);
    let status = StatusCode::from_u16(e.status_code()).unwrap_or(StatusCode::BAD_GATEWAY);
    (
        status,
        Json(serde_json::json!({
            "error": "Controller request failed",
            "details": e.to_string()
        })),
    )
        .into_response()
}
