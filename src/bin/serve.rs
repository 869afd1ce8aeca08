use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::State;
use axum::http::{header, HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tokio::sync::Semaphore;

use snac_stream::tokenizer::split_token_text;
use snac_stream::{
    device_info, parse_device, SnacCodec, StreamConfig, StreamSession, StreamStats,
};

#[derive(Clone)]
struct AppState {
    codec: Arc<SnacCodec>,
    config: StreamConfig,
    semaphore: Arc<Semaphore>,
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
}

#[derive(Debug)]
struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }

    fn internal(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: message.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(ErrorResponse {
            error: self.message,
        });
        (self.status, body).into_response()
    }
}

/// Either a list of token strings or raw generated text.
#[derive(Debug, Deserialize)]
struct RenderRequest {
    tokens: Option<Vec<String>>,
    text: Option<String>,
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    device: String,
    sample_rate: u32,
}

fn request_tokens(req: RenderRequest) -> Result<Vec<String>, ApiError> {
    match (req.tokens, req.text) {
        (Some(tokens), None) => Ok(tokens),
        (None, Some(text)) => Ok(split_token_text(&text).map(str::to_string).collect()),
        (Some(_), Some(_)) => Err(ApiError::bad_request(
            "provide either `tokens` or `text`, not both",
        )),
        (None, None) => Err(ApiError::bad_request("`tokens` or `text` is required")),
    }
}

fn stats_headers(stats: &StreamStats, sample_rate: u32) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("audio/pcm"));
    headers.insert("x-sample-rate", HeaderValue::from(sample_rate));
    headers.insert("x-chunks-emitted", HeaderValue::from(stats.chunks_emitted));
    headers.insert("x-chunks-rejected", HeaderValue::from(stats.chunks_rejected));
    headers.insert("x-tokens-skipped", HeaderValue::from(stats.tokens_skipped));
    headers
}

async fn render_tokens(
    State(state): State<Arc<AppState>>,
    Json(req): Json<RenderRequest>,
) -> Result<Response, ApiError> {
    let tokens = request_tokens(req)?;

    let _permit = state
        .semaphore
        .acquire()
        .await
        .map_err(|e| ApiError::internal(format!("semaphore closed: {e}")))?;
    let codec = state.codec.clone();
    let config = state.config.clone();

    let (pcm, stats) = tokio::task::spawn_blocking(move || {
        let mut session = StreamSession::with_config(codec, config)
            .map_err(|e| ApiError::internal(format!("invalid stream config: {e}")))?;
        let pcm = session
            .render_all(&tokens)
            .map_err(|e| ApiError::internal(format!("render failed: {e}")))?;
        Ok::<_, ApiError>((pcm, session.stats()))
    })
    .await
    .map_err(|e| ApiError::internal(format!("task join error: {e}")))??;

    tracing::info!(
        bytes = pcm.len(),
        chunks = stats.chunks_emitted,
        rejected = stats.chunks_rejected,
        "rendered request"
    );
    let headers = stats_headers(&stats, state.codec.sample_rate());
    Ok((StatusCode::OK, headers, pcm).into_response())
}

async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        device: device_info(state.codec.device()),
        sample_rate: state.codec.sample_rate(),
    })
}

#[tokio::main]
async fn main() -> Result<(), ApiError> {
    let model_dir = std::env::var("SNAC_MODEL_DIR").ok();
    let config_path = std::env::var("STREAM_CONFIG").ok();
    let device_str = std::env::var("DEVICE").unwrap_or_else(|_| "cpu".to_string());
    let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
    let port: u16 = std::env::var("PORT")
        .unwrap_or_else(|_| "8000".to_string())
        .parse()
        .map_err(|e| ApiError::bad_request(format!("invalid PORT: {e}")))?;
    let max_concurrency: usize = std::env::var("MAX_CONCURRENCY")
        .unwrap_or_else(|_| "1".to_string())
        .parse()
        .map_err(|e| ApiError::bad_request(format!("invalid MAX_CONCURRENCY: {e}")))?;

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config = match config_path {
        Some(path) => StreamConfig::from_file(&path)
            .map_err(|e| ApiError::bad_request(format!("invalid STREAM_CONFIG: {e}")))?,
        None => StreamConfig::default(),
    };

    let device = parse_device(&device_str)
        .map_err(|e| ApiError::internal(format!("failed to init device: {e}")))?;
    tracing::info!("Loading SNAC on {}", device_info(&device));
    let codec = SnacCodec::from_pretrained(model_dir.as_deref(), device)
        .map_err(|e| ApiError::internal(format!("failed to load SNAC: {e}")))?;
    config
        .render
        .check_codec_output(codec.samples_per_frame(), config.context_frames)
        .map_err(|e| ApiError::bad_request(format!("window does not fit codec output: {e}")))?;

    let state = Arc::new(AppState {
        codec: Arc::new(codec),
        config,
        semaphore: Arc::new(Semaphore::new(max_concurrency)),
    });

    let app = Router::new()
        .route("/health", get(health))
        .route("/v1/audio/tokens", post(render_tokens))
        .with_state(state);

    let addr: SocketAddr = format!("{}:{}", host, port)
        .parse()
        .map_err(|e| ApiError::bad_request(format!("invalid HOST/PORT: {e}")))?;
    tracing::info!("Listening on http://{}", addr);

    axum::serve(
        tokio::net::TcpListener::bind(addr)
            .await
            .map_err(|e| ApiError::internal(format!("failed to bind: {e}")))?,
        app,
    )
    .await
    .map_err(|e| ApiError::internal(format!("server error: {e}")))?;

    Ok(())
}
