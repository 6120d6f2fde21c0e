//! HTTP surface: `GET /`, `POST /ask`, `GET /schema`.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{get, post};
use axum::Router;
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use askdata_core::{AppContext, PipelineError, Stage, answer_question};
use askdata_shared::{Answer, AskDataError, SchemaDescription};

/// Shared handler state.
pub(crate) type SharedContext = Arc<AppContext>;

// ============================================================================
// Request/Response Types
// ============================================================================

/// Body of `POST /ask`.
#[derive(Debug, Deserialize)]
pub(crate) struct AskRequest {
    pub question: String,
}

#[derive(Debug, Serialize)]
struct ReadyResponse {
    message: &'static str,
}

/// Error body for every failed request.
#[derive(Debug, Serialize)]
pub(crate) struct ApiError {
    pub detail: String,
    pub stage: String,
    pub error_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schema: Option<Arc<SchemaDescription>>,
}

// ============================================================================
// Error Handling
// ============================================================================

pub(crate) struct ApiErrorResponse {
    status: StatusCode,
    error: ApiError,
}

impl IntoResponse for ApiErrorResponse {
    fn into_response(self) -> Response {
        (self.status, Json(self.error)).into_response()
    }
}

/// HTTP status for a fatal pipeline error.
fn status_for(err: &AskDataError) -> StatusCode {
    match err {
        AskDataError::StoreUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        AskDataError::Execution { .. } | AskDataError::Validation { .. } => StatusCode::BAD_REQUEST,
        AskDataError::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl From<PipelineError> for ApiErrorResponse {
    fn from(err: PipelineError) -> Self {
        Self {
            status: status_for(&err.source),
            error: ApiError {
                detail: err.source.to_string(),
                stage: err.stage.to_string(),
                error_type: err.source.kind().to_string(),
                schema: err.schema,
            },
        }
    }
}

impl From<JsonRejection> for ApiErrorResponse {
    fn from(rejection: JsonRejection) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            error: ApiError {
                detail: rejection.body_text(),
                stage: Stage::Input.to_string(),
                error_type: "ValidationError".to_string(),
                schema: None,
            },
        }
    }
}

// ============================================================================
// Handlers
// ============================================================================

async fn root_handler() -> Json<ReadyResponse> {
    Json(ReadyResponse {
        message: "AskData agent is ready. POST to /ask.",
    })
}

async fn ask_handler(
    State(ctx): State<SharedContext>,
    payload: Result<Json<AskRequest>, JsonRejection>,
) -> Result<Json<Answer>, ApiErrorResponse> {
    let Json(request) = payload?;
    let answer = answer_question(&ctx, &request.question).await?;
    Ok(Json(answer))
}

async fn schema_handler(
    State(ctx): State<SharedContext>,
) -> Result<Json<Arc<SchemaDescription>>, ApiErrorResponse> {
    let schema = ctx.current_schema().await.map_err(|e| {
        ApiErrorResponse::from(PipelineError {
            stage: Stage::Schema,
            source: e,
            schema: None,
        })
    })?;
    Ok(Json(schema))
}

/// Build the application router.
pub(crate) fn router(ctx: SharedContext) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(root_handler))
        .route("/ask", post(ask_handler))
        .route("/schema", get(schema_handler))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(ctx)
}

/// Serve until ctrl-c.
pub(crate) async fn serve(ctx: SharedContext, addr: SocketAddr) -> std::io::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(addr = %listener.local_addr()?, "AskData listening");
    info!("  GET  /        - readiness");
    info!("  POST /ask     - answer a question");
    info!("  GET  /schema  - schema snapshot");

    axum::serve(listener, router(ctx))
        .with_graceful_shutdown(shutdown_signal())
        .await
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
    info!("shutdown signal received");
}
