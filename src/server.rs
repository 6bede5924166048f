//! HTTP boundary for the import and chat operations.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `POST` | `/import` | Replace the stored dataset with normalized rows |
//! | `POST` | `/chat` | Answer a question grounded in the dataset |
//! | `GET`  | `/health` | Health check (returns version) |
//!
//! # Error Contract
//!
//! All error responses carry a single structured body:
//!
//! ```json
//! { "error": { "kind": "rate_limited", "message": "Limite de requisições excedido..." } }
//! ```
//!
//! Kinds and statuses: `parse_error` (400), `quota_exhausted` (402),
//! `rate_limited` (429), `store_write_error` / `configuration_error` /
//! `upstream_error` / `internal` (500). Store write errors additionally name
//! the failing phase (`clear`/`insert`) and the records committed before the
//! failure. Messages are Brazilian Portuguese, the caller's language.
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted; preflight requests
//! succeed with an empty body and permissive headers. Responses are always
//! complete JSON documents, never streamed.

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

use crate::config::Config;
use crate::context::format_context;
use crate::gateway::{CompletionGateway, GatewayError};
use crate::models::ConversationTurn;
use crate::normalize::{normalize_rows, normalize_text, RawRow};
use crate::store::{DatasetStore, SqliteStore, StoreError};

/// Shared application state passed to all route handlers.
#[derive(Clone)]
struct AppState {
    config: Arc<Config>,
    store: Arc<dyn DatasetStore>,
    gateway: Arc<CompletionGateway>,
}

/// Starts the HTTP server on `[server].bind`.
///
/// Opens the SQLite store, ensures the schema exists, and constructs the
/// completion gateway before binding — a missing credential fails the
/// process here, never mid-request. Runs until the process is terminated.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let bind_addr = config.server.bind.clone();

    let store = SqliteStore::open(config).await?;
    crate::migrate::run_migrations(store.pool()).await?;

    let gateway = CompletionGateway::new(&config.completion)?;

    let state = AppState {
        config: Arc::new(config.clone()),
        store: Arc::new(store),
        gateway: Arc::new(gateway),
    };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = Router::new()
        .route("/import", post(handle_import))
        .route("/chat", post(handle_chat))
        .route("/health", get(handle_health))
        .layer(cors)
        .with_state(state);

    tracing::info!(bind = %bind_addr, "server listening");
    println!("tecnobot server listening on http://{}", bind_addr);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

// ============ Error response ============

/// JSON error response body.
#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

/// Inner error detail: machine-readable kind plus human-readable message.
#[derive(Serialize)]
struct ErrorDetail {
    kind: String,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    phase: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    committed: Option<u64>,
}

/// Internal error type that converts into an HTTP response.
struct ApiError {
    status: StatusCode,
    kind: &'static str,
    message: String,
    phase: Option<&'static str>,
    committed: Option<u64>,
}

impl ApiError {
    fn new(status: StatusCode, kind: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            kind,
            message: message.into(),
            phase: None,
            committed: None,
        }
    }

    fn parse_error(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "parse_error", message)
    }

    fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "internal", message)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                kind: self.kind.to_string(),
                message: self.message,
                phase: self.phase,
                committed: self.committed,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

impl From<GatewayError> for ApiError {
    fn from(err: GatewayError) -> Self {
        match err {
            GatewayError::RateLimited => Self::new(
                StatusCode::TOO_MANY_REQUESTS,
                "rate_limited",
                "Limite de requisições excedido. Por favor, tente novamente em alguns instantes.",
            ),
            GatewayError::QuotaExhausted => Self::new(
                StatusCode::PAYMENT_REQUIRED,
                "quota_exhausted",
                "Créditos insuficientes. Por favor, adicione créditos à sua conta.",
            ),
            GatewayError::Configuration(_) => Self::new(
                StatusCode::INTERNAL_SERVER_ERROR,
                "configuration_error",
                "Serviço de análise não configurado.",
            ),
            GatewayError::Upstream { .. } => Self::new(
                StatusCode::INTERNAL_SERVER_ERROR,
                "upstream_error",
                "Erro ao processar análise.",
            ),
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        let message = match &err {
            StoreError::Clear { .. } => "Falha ao limpar os dados existentes.",
            StoreError::Insert { .. } => "Falha ao inserir os dados.",
        };
        let mut api = Self::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            "store_write_error",
            message,
        );
        api.phase = Some(err.phase());
        api.committed = Some(err.committed());
        api
    }
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// ============ POST /import ============

/// Request body: raw rows keyed by the fixed header names.
#[derive(Deserialize)]
struct ImportRequest {
    rows: Vec<RawRow>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ImportResponse {
    success: bool,
    message: String,
    total_records: u64,
    skipped_dates: usize,
    skipped_numeric: usize,
}

/// Handler for `POST /import`.
///
/// Normalizes the rows and replaces the entire stored generation. Rows with
/// malformed dates or unparseable numerics are dropped and reported in the
/// response; a store failure reports the failing phase and progress.
async fn handle_import(
    State(state): State<AppState>,
    Json(req): Json<ImportRequest>,
) -> Result<Json<ImportResponse>, ApiError> {
    let batch = normalize_rows(&req.rows);

    tracing::info!(
        rows = req.rows.len(),
        parsed = batch.records.len(),
        skipped = batch.skipped(),
        "import request"
    );

    let committed = state.store.replace_all(&batch.records).await?;

    Ok(Json(ImportResponse {
        success: true,
        message: format!("{} registros importados com sucesso.", committed),
        total_records: committed,
        skipped_dates: batch.skipped_dates,
        skipped_numeric: batch.skipped_numeric,
    }))
}

// ============ POST /chat ============

/// Where the dataset for a chat request comes from.
#[derive(Debug, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
enum DatasetSource {
    /// Ad hoc upload mode: raw delimited text sent with the request.
    Inline { content: String },
    /// Persisted mode: read the durable dataset store.
    Store,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChatRequest {
    history: Vec<ConversationTurn>,
    dataset_source: DatasetSource,
}

#[derive(Serialize)]
struct ChatResponse {
    response: String,
}

/// Handler for `POST /chat`.
///
/// Reconstitutes the dataset into a textual context, forwards the
/// conversation to the completion service, and returns its answer.
async fn handle_chat(
    State(state): State<AppState>,
    Json(req): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, ApiError> {
    let context = match req.dataset_source {
        DatasetSource::Inline { content } => {
            let batch = normalize_text(&content, state.config.import.delimiter)
                .map_err(|_| ApiError::parse_error("Dados da planilha inválidos."))?;
            format_context(&batch.records)
        }
        DatasetSource::Store => {
            let records = state.store.read_all_ordered().await.map_err(|e| {
                tracing::error!(error = %e, "failed to read dataset store");
                ApiError::internal("Erro ao ler os dados de vendas.")
            })?;
            format_context(&records)
        }
    };

    tracing::info!(
        turns = req.history.len(),
        context_bytes = context.len(),
        "chat request"
    );

    let response = state.gateway.respond(&req.history, &context).await?;

    Ok(Json(ChatResponse { response }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dataset_source_inline_deserializes() {
        let src: DatasetSource =
            serde_json::from_str(r#"{ "type": "inline", "content": "Data,Produto" }"#).unwrap();
        assert_eq!(
            src,
            DatasetSource::Inline {
                content: "Data,Produto".to_string()
            }
        );
    }

    #[test]
    fn test_dataset_source_store_deserializes() {
        let src: DatasetSource = serde_json::from_str(r#"{ "type": "store" }"#).unwrap();
        assert_eq!(src, DatasetSource::Store);
    }

    #[test]
    fn test_rate_limited_maps_to_429() {
        let api = ApiError::from(GatewayError::RateLimited);
        assert_eq!(api.status, StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(api.kind, "rate_limited");
        assert!(api.message.contains("tente novamente"));
    }

    #[test]
    fn test_quota_exhausted_maps_to_402() {
        let api = ApiError::from(GatewayError::QuotaExhausted);
        assert_eq!(api.status, StatusCode::PAYMENT_REQUIRED);
        assert_eq!(api.kind, "quota_exhausted");
    }

    #[test]
    fn test_upstream_maps_to_500_without_leaking_detail() {
        let api = ApiError::from(GatewayError::Upstream {
            status: Some(503),
            message: "secret upstream body".to_string(),
        });
        assert_eq!(api.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(api.kind, "upstream_error");
        assert!(!api.message.contains("secret"));
    }

    #[test]
    fn test_store_error_carries_phase_and_committed() {
        let api = ApiError::from(StoreError::Insert {
            committed: 500,
            message: "disk full".to_string(),
        });
        assert_eq!(api.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(api.kind, "store_write_error");
        assert_eq!(api.phase, Some("insert"));
        assert_eq!(api.committed, Some(500));
    }

    #[test]
    fn test_error_body_shape() {
        let api = ApiError::from(StoreError::Clear {
            message: "locked".to_string(),
        });
        let body = ErrorBody {
            error: ErrorDetail {
                kind: api.kind.to_string(),
                message: api.message,
                phase: api.phase,
                committed: api.committed,
            },
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["error"]["kind"], "store_write_error");
        assert_eq!(json["error"]["phase"], "clear");
        assert_eq!(json["error"]["committed"], 0);
    }
}
