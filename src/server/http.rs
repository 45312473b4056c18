use crate::error::{CodescribeError, Result};
use crate::service::CodebaseService;
use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::cors::{AllowHeaders, AllowMethods, AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

#[derive(Debug, Deserialize)]
pub struct AnalysisRequest {
    pub repo_url: String,
}

#[derive(Debug, Deserialize)]
pub struct QueryRequest {
    pub question: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct QueryResponse {
    pub question: String,
    pub answer: String,
}

/// HTTP front of a [`CodebaseService`]
pub struct HttpServer {
    service: Arc<CodebaseService>,
}

impl HttpServer {
    pub fn new(service: Arc<CodebaseService>) -> Self {
        Self { service }
    }

    /// Bind the configured address and serve until the process exits
    pub async fn run(&self) -> Result<()> {
        let addr = self.service.config().bind_addr();
        let app = create_router(Arc::clone(&self.service));

        let listener = tokio::net::TcpListener::bind(&addr).await.map_err(|e| {
            CodescribeError::Io(std::io::Error::new(
                e.kind(),
                format!("Failed to bind to {}: {}", addr, e),
            ))
        })?;

        log::info!("AI Core listening on http://{}", addr);

        axum::serve(listener, app)
            .await
            .map_err(|e| CodescribeError::Io(std::io::Error::other(format!("HTTP server error: {}", e))))?;

        Ok(())
    }
}

/// Build the router: `GET /`, `GET /health`, `POST /analyze`, `POST /query`.
pub fn create_router(service: Arc<CodebaseService>) -> Router {
    let cors = cors_layer(&service.config().server.allowed_origins);

    Router::new()
        .route("/", get(handle_root))
        .route("/health", get(handle_health))
        .route("/analyze", post(handle_analyze))
        .route("/query", post(handle_query))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors),
        )
        .with_state(service)
}

fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    if allowed_origins.is_empty() {
        // credentials cannot be combined with a wildcard origin
        return CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);
    }

    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|o| match o.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                log::warn!("Ignoring invalid CORS origin: {}", o);
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_credentials(true)
        .allow_methods(AllowMethods::mirror_request())
        .allow_headers(AllowHeaders::mirror_request())
}

async fn handle_root() -> Response {
    (
        StatusCode::OK,
        Json(serde_json::json!({"message": "AI Core is running"})),
    )
        .into_response()
}

async fn handle_health(State(service): State<Arc<CodebaseService>>) -> Response {
    let status = service.status().await;
    (
        StatusCode::OK,
        Json(serde_json::json!({
            "status": "ok",
            "state": status.state,
            "records": status.records,
            "snapshot": status.snapshot,
            "version": env!("CARGO_PKG_VERSION")
        })),
    )
        .into_response()
}

async fn handle_analyze(State(service): State<Arc<CodebaseService>>, body: Bytes) -> Response {
    let request: AnalysisRequest = match parse_body(&body) {
        Ok(r) => r,
        Err(response) => return response,
    };

    match service.analyze(&request.repo_url).await {
        Ok(_) => (
            StatusCode::OK,
            Json(serde_json::json!({
                "status": "success",
                "message": "Repository analyzed successfully. Ready for questions."
            })),
        )
            .into_response(),
        Err(e @ CodescribeError::Busy) => error_response(&e, e.to_string()),
        Err(e) => error_response(&e, format!("Failed to analyze repository: {}", e)),
    }
}

async fn handle_query(State(service): State<Arc<CodebaseService>>, body: Bytes) -> Response {
    let request: QueryRequest = match parse_body(&body) {
        Ok(r) => r,
        Err(response) => return response,
    };

    match service.query(&request.question).await {
        Ok(answer) => (
            StatusCode::OK,
            Json(QueryResponse {
                question: request.question,
                answer,
            }),
        )
            .into_response(),
        Err(e @ CodescribeError::NotReady) => error_response(&e, e.to_string()),
        Err(e) => {
            log::error!("Query failed: {}", e);
            error_response(&e, format!("Failed to query repository: {}", e))
        }
    }
}

fn parse_body<T: DeserializeOwned>(body: &[u8]) -> std::result::Result<T, Response> {
    serde_json::from_slice(body).map_err(|e| {
        let err = CodescribeError::InvalidInput(e.to_string());
        error_response(&err, e.to_string())
    })
}

fn status_for(err: &CodescribeError) -> StatusCode {
    match err {
        CodescribeError::NotReady => StatusCode::BAD_REQUEST,
        CodescribeError::Busy => StatusCode::CONFLICT,
        CodescribeError::InvalidInput(_) => StatusCode::UNPROCESSABLE_ENTITY,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn error_response(err: &CodescribeError, detail: String) -> Response {
    (status_for(err), Json(serde_json::json!({ "detail": detail }))).into_response()
}
