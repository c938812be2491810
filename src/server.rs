use axum::{
    extract::{rejection::JsonRejection, Json, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};

use crate::agent::llm::ModelProvider;
use crate::agent::{Orchestrator, TurnRequest};
use crate::article::AggregatedResponse;
use crate::config::parse_optional;
use crate::error::{AgentError, ValidationError};
use crate::speech::{SpeechError, Transcriber, Transcription};

pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 8000;

#[derive(Deserialize, Debug, Clone, Default)]
pub struct ServerConfig {
    #[serde(rename = "host")]
    pub host: Option<String>,
    #[serde(rename = "port", default, deserialize_with = "parse_optional")]
    pub port: Option<u16>,
}

impl ServerConfig {
    pub fn addr(&self) -> String {
        let host = self
            .host
            .as_deref()
            .map(str::trim)
            .filter(|h| !h.is_empty())
            .unwrap_or(DEFAULT_HOST);
        format!("{}:{}", host, self.port.unwrap_or(DEFAULT_PORT))
    }
}

#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<Orchestrator>,
    pub transcriber: Arc<Transcriber>,
}

#[derive(Deserialize, Debug, Default)]
pub struct QueryRequest {
    #[serde(default)]
    pub question: String,
    pub audio_file_path: Option<String>,
    pub language: Option<String>,
    pub model_provider: Option<String>,
    pub thread_id: Option<String>,
}

#[derive(Serialize, Debug)]
pub struct QueryResponse {
    pub answer: String,
    pub thread_id: String,
    pub rounds: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transcript: Option<String>,
    #[serde(flatten)]
    pub results: AggregatedResponse,
}

#[derive(Deserialize, Debug)]
pub struct TranscribeRequest {
    pub audio_file_path: String,
    pub language: Option<String>,
}

#[derive(Serialize, Debug)]
pub struct ErrorBody {
    pub error_code: &'static str,
    pub message: String,
}

/// An error already mapped to its HTTP status and reason code.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    code: &'static str,
    message: String,
}

impl ApiError {
    fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            code,
            message: message.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(ErrorBody {
                error_code: self.code,
                message: self.message,
            }),
        )
            .into_response()
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::new(
            StatusCode::BAD_REQUEST,
            "malformed_request",
            rejection.body_text(),
        )
    }
}

impl From<ValidationError> for ApiError {
    fn from(err: ValidationError) -> Self {
        let code = match &err {
            ValidationError::EmptyQuery => "empty_question",
            ValidationError::UnknownCategory(_) => "unknown_category",
            ValidationError::ModelProviderUnavailable(_) => "model_provider_unavailable",
            ValidationError::UnsupportedLanguage { .. } => "unsupported_language",
            ValidationError::AudioNotFound(_) => "audio_not_found",
        };
        ApiError::new(StatusCode::BAD_REQUEST, code, err.to_string())
    }
}

impl From<SpeechError> for ApiError {
    fn from(err: SpeechError) -> Self {
        match err {
            SpeechError::Validation(err) => err.into(),
            other => {
                log::warn!("transcription failed: {}", other);
                ApiError::new(
                    StatusCode::UNPROCESSABLE_ENTITY,
                    "transcription_failed",
                    other.to_string(),
                )
            }
        }
    }
}

impl From<AgentError> for ApiError {
    fn from(err: AgentError) -> Self {
        match err {
            AgentError::Validation(err) => err.into(),
            AgentError::Orchestration(err) => {
                log::error!("orchestration failed: {}", err);
                ApiError::new(StatusCode::BAD_GATEWAY, "upstream_failure", err.user_message())
            }
        }
    }
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(root_handler))
        .route("/health", get(health_handler))
        .route("/query", post(query_handler))
        .route("/transcribe", post(transcribe_handler))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}

pub async fn serve(state: AppState, addr: &str) -> anyhow::Result<()> {
    let listener = TcpListener::bind(addr).await?;
    log::info!("Listening on {}", listener.local_addr()?);
    axum::serve(listener, create_router(state)).await?;
    Ok(())
}

async fn root_handler() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "service": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": ["GET /health", "POST /query", "POST /transcribe"],
    }))
}

async fn health_handler() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

async fn query_handler(
    State(state): State<AppState>,
    payload: Result<Json<QueryRequest>, JsonRejection>,
) -> Result<Json<QueryResponse>, ApiError> {
    let Json(req) = payload?;

    let model_provider = match req.model_provider.as_deref().filter(|p| !p.trim().is_empty()) {
        Some(name) => Some(
            name.parse::<ModelProvider>()
                .map_err(|_| ValidationError::ModelProviderUnavailable(name.trim().to_string()))?,
        ),
        None => None,
    };

    let mut question = req.question.trim().to_string();
    let mut transcript = None;
    if let Some(path) = req.audio_file_path.as_deref().filter(|p| !p.trim().is_empty()) {
        let transcription = state
            .transcriber
            .transcribe_file(&PathBuf::from(path.trim()), req.language.as_deref())
            .await?;
        question = if question.is_empty() {
            transcription.text.clone()
        } else {
            format!("{} {}", question, transcription.text)
        };
        transcript = Some(transcription.text);
    }

    log::info!("POST /query: {}", question);
    let turn = state
        .orchestrator
        .respond_with(TurnRequest {
            question,
            thread_id: req.thread_id,
            model_provider,
        })
        .await?;

    Ok(Json(QueryResponse {
        answer: turn.answer,
        thread_id: turn.thread_id,
        rounds: turn.rounds,
        transcript,
        results: turn.raw,
    }))
}

async fn transcribe_handler(
    State(state): State<AppState>,
    payload: Result<Json<TranscribeRequest>, JsonRejection>,
) -> Result<Json<Transcription>, ApiError> {
    let Json(req) = payload?;
    log::info!("POST /transcribe: {}", req.audio_file_path);
    let transcription = state
        .transcriber
        .transcribe_file(
            &PathBuf::from(req.audio_file_path.trim()),
            req.language.as_deref(),
        )
        .await?;
    Ok(Json(transcription))
}
