use anyhow::{Context, Result};
use axum::extract::rejection::JsonRejection;
use axum::extract::{Query, Request, State};
use axum::http::{HeaderMap, StatusCode};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tracing::Instrument;
use uuid::Uuid;

use crate::config::Config;
use crate::generate::{GenerationRequest, GenerationRequestHandler, GenerationResponse};
use crate::pipeline::{TranscriptAcquisitionPipeline, TranscriptResult};
use crate::usage::{UsageGate, UsageStatus};
use crate::video::{VideoId, VideoInfo};
use crate::PipelineError;

/// Header carrying the authenticated user id, set by the auth proxy in front
pub const USER_ID_HEADER: &str = "x-user-id";

#[derive(Clone)]
pub struct AppState {
    pipeline: Arc<TranscriptAcquisitionPipeline>,
    generator: Arc<GenerationRequestHandler>,
}

impl AppState {
    pub fn new(pipeline: TranscriptAcquisitionPipeline, generator: GenerationRequestHandler) -> Self {
        Self {
            pipeline: Arc::new(pipeline),
            generator: Arc::new(generator),
        }
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        let pipeline = TranscriptAcquisitionPipeline::from_config(config)?;
        let usage = UsageGate::from_config(config, config.http_client()?)?;
        let generator = GenerationRequestHandler::from_config(config, usage)?;
        Ok(Self::new(pipeline, generator))
    }
}

fn error_response(error: &PipelineError, video_info: Option<&VideoInfo>) -> Response {
    let status = StatusCode::from_u16(error.category().status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

    if status.is_server_error() {
        tracing::error!(error = %error, status = status.as_u16(), "Request failed");
    } else {
        tracing::warn!(error = %error, status = status.as_u16(), "Request rejected");
    }

    let mut body = json!({ "error": error.user_message() });
    if let Some(Ok(info)) = video_info.map(serde_json::to_value) {
        body["videoInfo"] = info;
    }

    (status, Json(body)).into_response()
}

impl IntoResponse for PipelineError {
    fn into_response(self) -> Response {
        error_response(&self, None)
    }
}

/// Transcript failure, with the video metadata a manual-entry form can be prefilled from
#[derive(Debug)]
pub struct TranscriptFailure {
    error: PipelineError,
    video_info: Option<VideoInfo>,
}

impl From<PipelineError> for TranscriptFailure {
    fn from(error: PipelineError) -> Self {
        Self { error, video_info: None }
    }
}

impl IntoResponse for TranscriptFailure {
    fn into_response(self) -> Response {
        error_response(&self.error, self.video_info.as_ref())
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/transcript", get(transcript))
        .route("/api/usage", get(usage))
        .route("/api/generate", post(generate))
        .layer(middleware::from_fn(request_span))
        .with_state(state)
}

/// Bind and serve until Ctrl-C
pub async fn serve(config: &Config, bind: Option<&str>) -> Result<()> {
    let state = AppState::from_config(config)?;
    let addr = bind.unwrap_or(&config.server.bind);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    tracing::info!(addr = %listener.local_addr()?, strategy = %config.extraction.strategy, "Server listening");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("Shutting down");
        })
        .await
        .context("Server terminated unexpectedly")
}

async fn request_span(request: Request, next: Next) -> Response {
    let span = tracing::info_span!(
        "request",
        id = %Uuid::new_v4(),
        method = %request.method(),
        path = %request.uri().path(),
    );

    async move {
        let response = next.run(request).await;
        tracing::debug!(status = response.status().as_u16(), "Request finished");
        response
    }
    .instrument(span)
    .await
}

fn user_id(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(USER_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TranscriptQuery {
    video_id: Option<String>,
}

async fn transcript(
    State(state): State<AppState>,
    Query(query): Query<TranscriptQuery>,
) -> Result<Json<TranscriptResult>, TranscriptFailure> {
    let raw = query
        .video_id
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| PipelineError::InvalidInput("Video ID is required".to_string()))?;
    let video_id = VideoId::parse(&raw)?;

    match state.pipeline.acquire(&video_id).await {
        Ok(result) => Ok(Json(result)),
        Err(error) if error.offers_manual_entry() => Err(TranscriptFailure {
            video_info: Some(state.pipeline.video_info(&video_id).await),
            error,
        }),
        Err(error) => Err(error.into()),
    }
}

async fn usage(State(state): State<AppState>, headers: HeaderMap) -> Result<Json<UsageStatus>, PipelineError> {
    let user_id = user_id(&headers).ok_or(PipelineError::Unauthorized)?;
    let status = state.generator.usage().status(user_id).await?;
    Ok(Json(status))
}

async fn generate(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Result<Json<GenerationRequest>, JsonRejection>,
) -> Result<Json<GenerationResponse>, PipelineError> {
    let user_id = user_id(&headers);

    let request = match body {
        Ok(Json(request)) => request,
        Err(rejection) => {
            // auth before body validation
            user_id.ok_or(PipelineError::Unauthorized)?;
            tracing::debug!(reason = %rejection.body_text(), "Unreadable generation request");
            return Err(PipelineError::InvalidInput("Invalid request body".to_string()));
        }
    };

    let response = state.generator.handle(user_id, request).await?;
    Ok(Json(response))
}
