//! HTTP and WebSocket server.
//!
//! Exposes the [`Pipeline`] to browser and script clients.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`  | `/health` | Status, version, live WebSocket count |
//! | `POST` | `/ask` | JSON `{prompt, file_name?, file_base64?}` |
//! | `POST` | `/upload` | Multipart fields `prompt` and `file` |
//! | `GET`  | `/ws` | WebSocket; one JSON request per text message |
//!
//! Successful answers are `{ "response": "...", "timestamp": "..." }`.
//!
//! # Error Contract
//!
//! `/ask` and `/upload` report failures as:
//!
//! ```json
//! { "error": { "code": "unsupported_attachment", "message": "Unsupported file type: a.exe" } }
//! ```
//!
//! | Code | Status |
//! |------|--------|
//! | `unsupported_attachment` | 415 |
//! | `extraction_failure`, `no_usable_content`, `bad_request` | 422 |
//! | `retrieval_failure`, `backend_unavailable` | 502 |
//!
//! Over `/ws` a failure is sent back as the `response` string; the socket
//! stays open. A client that queues more than [`MAX_PENDING_MESSAGES`]
//! requests behind the one in flight is closed with code 1008.
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted.

use std::collections::VecDeque;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    extract::{
        ws::{close_code, CloseFrame, Message, Utf8Bytes, WebSocket, WebSocketUpgrade},
        ConnectInfo, DefaultBodyLimit, Multipart, State,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use base64::Engine;
use docqa_core::models::Document;
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::connections::ConnectionManager;
use crate::error::GenerationError;
use crate::pipeline::Pipeline;

/// Shared application state passed to all route handlers.
#[derive(Clone)]
pub struct AppState {
    pipeline: Arc<Pipeline>,
    connections: Arc<ConnectionManager>,
}

impl AppState {
    pub fn new(pipeline: Arc<Pipeline>, connections: Arc<ConnectionManager>) -> Self {
        Self {
            pipeline,
            connections,
        }
    }
}

/// Build the router.
///
/// Serve it with `into_make_service_with_connect_info::<SocketAddr>()`;
/// `/ws` needs the peer address.
pub fn router(state: AppState, max_upload_bytes: usize) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Room for base64 and multipart overhead; the extractor registry
    // enforces the exact file limit.
    let body_limit = max_upload_bytes / 3 * 4 + 64 * 1024;

    Router::new()
        .route("/health", get(handle_health))
        .route("/ask", post(handle_ask))
        .route("/upload", post(handle_upload))
        .route("/ws", get(handle_ws))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Serve `app` on an already-bound listener until the process stops.
pub async fn serve(listener: tokio::net::TcpListener, app: Router) -> anyhow::Result<()> {
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;
    Ok(())
}

/// Start the server on `[server].bind`.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let pipeline = Arc::new(Pipeline::from_config(config)?);
    let state = AppState::new(pipeline, Arc::new(ConnectionManager::new()));
    let app = router(state, config.server.max_upload_bytes);

    let listener = tokio::net::TcpListener::bind(&config.server.bind).await?;
    info!(
        addr = %listener.local_addr()?,
        model = %config.backend.model,
        "docqa server listening"
    );
    serve(listener, app).await
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    /// Machine-readable error code (e.g. `"unsupported_attachment"`).
    code: String,
    message: String,
}

/// Internal error type that converts into an Axum HTTP response.
struct AppError {
    status: StatusCode,
    code: String,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code,
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

fn bad_request(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::UNPROCESSABLE_ENTITY,
        code: "bad_request".to_string(),
        message: message.into(),
    }
}

impl From<GenerationError> for AppError {
    fn from(e: GenerationError) -> Self {
        let status = match e {
            GenerationError::UnsupportedAttachment(_) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            GenerationError::ExtractionFailure(_) | GenerationError::NoUsableContent(_) => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            GenerationError::RetrievalFailure(_) | GenerationError::BackendUnavailable(_) => {
                StatusCode::BAD_GATEWAY
            }
        };
        AppError {
            status,
            code: e.code().to_string(),
            message: e.user_message(),
        }
    }
}

// ============ Shared request handling ============

/// Question with an optional base64-encoded attachment.
#[derive(Debug, Deserialize)]
pub struct AskRequest {
    pub prompt: String,
    #[serde(default)]
    pub file_name: Option<String>,
    #[serde(default)]
    pub file_base64: Option<String>,
}

impl AskRequest {
    /// Validate and decode into a prompt and attachment.
    fn into_parts(self) -> Result<(String, Option<Document>), String> {
        if self.prompt.trim().is_empty() {
            return Err("prompt must not be empty".to_string());
        }
        let attachment = match (self.file_name, self.file_base64) {
            (None, None) => None,
            (Some(name), Some(data)) => {
                let bytes = base64::engine::general_purpose::STANDARD
                    .decode(data.trim())
                    .map_err(|e| format!("file_base64 is not valid base64: {}", e))?;
                Some(Document::new(name, bytes))
            }
            (Some(_), None) => return Err("file_name given without file_base64".to_string()),
            (None, Some(_)) => return Err("file_base64 given without file_name".to_string()),
        };
        Ok((self.prompt, attachment))
    }
}

#[derive(Serialize)]
struct AnswerResponse {
    response: String,
    timestamp: String,
}

impl AnswerResponse {
    fn new(response: String) -> Self {
        Self {
            response,
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
    connections: usize,
}

async fn handle_health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        connections: state.connections.count(),
    })
}

// ============ POST /ask ============

async fn handle_ask(
    State(state): State<AppState>,
    Json(request): Json<AskRequest>,
) -> Result<Json<AnswerResponse>, AppError> {
    let (prompt, attachment) = request.into_parts().map_err(bad_request)?;
    let answer = state.pipeline.answer(&prompt, attachment).await?;
    Ok(Json(AnswerResponse::new(answer.text)))
}

// ============ POST /upload ============

async fn handle_upload(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<AnswerResponse>, AppError> {
    let mut prompt = None;
    let mut attachment = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| bad_request(format!("invalid multipart body: {}", e)))?
    {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "prompt" => {
                prompt = Some(
                    field
                        .text()
                        .await
                        .map_err(|e| bad_request(format!("invalid prompt field: {}", e)))?,
                );
            }
            "file" => {
                let file_name = field
                    .file_name()
                    .map(str::to_string)
                    .ok_or_else(|| bad_request("file field has no filename"))?;
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| bad_request(format!("invalid file field: {}", e)))?;
                attachment = Some(Document::new(file_name, bytes.to_vec()));
            }
            other => debug!(field = other, "ignoring unknown multipart field"),
        }
    }

    let prompt = prompt
        .filter(|p| !p.trim().is_empty())
        .ok_or_else(|| bad_request("prompt must not be empty"))?;
    let answer = state.pipeline.answer(&prompt, attachment).await?;
    Ok(Json(AnswerResponse::new(answer.text)))
}

// ============ GET /ws ============

async fn handle_ws(
    ws: WebSocketUpgrade,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    State(state): State<AppState>,
) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, peer, state))
}

/// Answer one WebSocket text message; failures become the reply text.
async fn answer_message(state: &AppState, text: &str) -> String {
    let request: AskRequest = match serde_json::from_str(text) {
        Ok(r) => r,
        Err(e) => return format!("Invalid request: {}", e),
    };
    match request.into_parts() {
        Ok((prompt, attachment)) => state.pipeline.respond(&prompt, attachment).await,
        Err(msg) => format!("Invalid request: {}", msg),
    }
}

/// Requests a socket may queue while one is being answered.
pub const MAX_PENDING_MESSAGES: usize = 32;

/// Queue a request behind the one in flight. `false` when the queue is full.
fn enqueue(pending: &mut VecDeque<String>, text: String) -> bool {
    if pending.len() >= MAX_PENDING_MESSAGES {
        return false;
    }
    pending.push_back(text);
    true
}

/// Serve one socket: requests are answered in arrival order. A close
/// while a request is in flight drops the in-flight work.
async fn handle_socket(mut socket: WebSocket, peer: SocketAddr, state: AppState) {
    let id = state.connections.connect(peer);
    info!(%id, %peer, "websocket connected");
    let mut pending: VecDeque<String> = VecDeque::new();

    'conn: loop {
        let text = match pending.pop_front() {
            Some(text) => text,
            None => match socket.recv().await {
                Some(Ok(Message::Text(text))) => text.as_str().to_string(),
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                Some(Ok(_)) => continue,
            },
        };

        let work = answer_message(&state, &text);
        tokio::pin!(work);
        let reply = loop {
            tokio::select! {
                reply = &mut work => break reply,
                msg = socket.recv() => match msg {
                    Some(Ok(Message::Text(next))) => {
                        if !enqueue(&mut pending, next.as_str().to_string()) {
                            warn!(%id, "too many pending websocket requests, closing");
                            let _ = socket
                                .send(Message::Close(Some(CloseFrame {
                                    code: close_code::POLICY,
                                    reason: Utf8Bytes::from_static("too many pending requests"),
                                })))
                                .await;
                            break 'conn;
                        }
                    }
                    Some(Ok(Message::Close(_))) | Some(Err(_)) | None => {
                        info!(%id, "websocket closed with a request in flight");
                        break 'conn;
                    }
                    Some(Ok(_)) => {}
                },
            }
        };

        let body = match serde_json::to_string(&AnswerResponse::new(reply)) {
            Ok(body) => body,
            Err(_) => continue,
        };
        if socket.send(Message::Text(body.into())).await.is_err() {
            break;
        }
    }

    state.connections.disconnect(id);
    info!(%id, "websocket disconnected");
}
