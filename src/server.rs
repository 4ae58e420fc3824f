//! HTTP server.
//!
//! Every client works inside a session created with `POST /sessions`. A
//! session owns its documents, annotated copies and cache, and sits behind
//! its own lock: requests within one session run one at a time, while
//! different sessions proceed independently and never see each other's
//! state.
//!
//! Sessions live in memory only. One left untouched for
//! `[server].session_idle_secs` is dropped, by a periodic sweep and on every
//! session creation; a session serving a request is never dropped.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`    | `/health` | Health check (returns version) |
//! | `POST`   | `/sessions` | Create a session |
//! | `DELETE` | `/sessions/{id}` | Drop a session and everything in it |
//! | `GET`    | `/sessions/{id}/documents` | List documents |
//! | `PUT`    | `/sessions/{id}/documents/{name}` | Upload raw bytes, replacing a same-named document |
//! | `GET`    | `/sessions/{id}/documents/{name}` | Download the annotated (or original) PDF |
//! | `GET`    | `/sessions/{id}/view` | HTML viewer (`?focus=name` opens that document first) |
//! | `POST`   | `/sessions/{id}/ask` | Answer `{"question": ...}` |
//! | `POST`   | `/sessions/{id}/summarize` | Summarize `{"text": ...}` |
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "service_unavailable", "message": "...", "retryable": true } }
//! ```
//!
//! Error codes: `bad_request` (400), `not_found` (404), `unsupported_format` (415),
//! `invalid_document` (422), `service_unavailable` (503, retryable), `internal` (500).

use axum::{
    body::Bytes,
    extract::{DefaultBodyLimit, Path, Query, State},
    http::{header, StatusCode},
    response::{Html, IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};
use docent_core::models::Coordinates;
use docent_core::Error;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt::Display;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{Mutex, RwLock};
use tower_http::cors::{Any, CorsLayer};
use uuid::Uuid;

use crate::config::Config;
use crate::pipeline::Pipeline;
use crate::session::Session;
use crate::viewer::render_viewer;

/// Largest accepted upload.
const MAX_UPLOAD_BYTES: usize = 64 * 1024 * 1024;
/// Upper bound on the time between idle-session sweeps.
const SWEEP_INTERVAL: Duration = Duration::from_secs(60);

struct SessionEntry {
    session: Arc<Mutex<Session>>,
    last_used: Instant,
}

impl SessionEntry {
    fn new(now: Instant) -> Self {
        Self {
            session: Arc::new(Mutex::new(Session::new())),
            last_used: now,
        }
    }

    fn is_idle(&self, timeout: Duration, now: Instant) -> bool {
        now.saturating_duration_since(self.last_used) > timeout
    }
}

type Sessions = RwLock<HashMap<Uuid, SessionEntry>>;

#[derive(Clone)]
struct AppState {
    pipeline: Arc<Pipeline>,
    sessions: Arc<Sessions>,
    idle_timeout: Option<Duration>,
}

impl AppState {
    fn new(pipeline: Arc<Pipeline>) -> Self {
        let idle_timeout = pipeline.config().server.session_idle_timeout();
        Self {
            pipeline,
            sessions: Arc::new(RwLock::new(HashMap::new())),
            idle_timeout,
        }
    }
}

/// Drop sessions idle for longer than `timeout` as of `now`, skipping any
/// that are locked by a request. Returns how many were dropped.
fn expire_idle(sessions: &mut HashMap<Uuid, SessionEntry>, timeout: Duration, now: Instant) -> usize {
    let before = sessions.len();
    sessions.retain(|id, entry| {
        let keep = entry.session.try_lock().is_err() || !entry.is_idle(timeout, now);
        if !keep {
            tracing::info!(session = %id, "idle session expired");
        }
        keep
    });
    before - sessions.len()
}

fn spawn_expiry(sessions: Arc<Sessions>, timeout: Duration) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(SWEEP_INTERVAL.min(timeout));
        loop {
            ticker.tick().await;
            expire_idle(&mut *sessions.write().await, timeout, Instant::now());
        }
    });
}

/// Starts the server on `[server].bind` and runs until the process ends.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let bind_addr = config.server.bind.clone();
    if !config.embedding.is_enabled() || !config.generation.is_enabled() {
        tracing::warn!("embedding or generation provider is disabled; questions will fail");
    }
    let state = AppState::new(Arc::new(Pipeline::from_config(config.clone())?));
    if let Some(timeout) = state.idle_timeout {
        spawn_expiry(Arc::clone(&state.sessions), timeout);
    }
    let app = router(state);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    tracing::info!("listening on http://{}", bind_addr);
    axum::serve(listener, app).await?;

    Ok(())
}

/// The full route table around `pipeline`, with an empty session store.
///
/// Idle sessions are only expired when new ones are created; [`run_server`]
/// also sweeps periodically.
pub fn build_router(pipeline: Arc<Pipeline>) -> Router {
    router(AppState::new(pipeline))
}

fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(handle_health))
        .route("/sessions", post(handle_create_session))
        .route("/sessions/{id}", axum::routing::delete(handle_delete_session))
        .route("/sessions/{id}/documents", get(handle_list_documents))
        .route(
            "/sessions/{id}/documents/{name}",
            put(handle_upload).get(handle_download),
        )
        .route("/sessions/{id}/view", get(handle_view))
        .route("/sessions/{id}/ask", post(handle_ask))
        .route("/sessions/{id}/summarize", post(handle_summarize))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .layer(cors)
        .with_state(state)
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
    /// `true` when the same request may succeed later.
    retryable: bool,
}

struct AppError {
    status: StatusCode,
    code: &'static str,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code.to_string(),
                message: self.message,
                retryable: self.status == StatusCode::SERVICE_UNAVAILABLE,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

fn internal(err: impl Display) -> AppError {
    AppError {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        code: "internal",
        message: err.to_string(),
    }
}

fn not_found(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::NOT_FOUND,
        code: "not_found",
        message: message.into(),
    }
}

impl From<Error> for AppError {
    fn from(err: Error) -> Self {
        let (status, code) = match &err {
            Error::EmptyQuestion | Error::EmptySummaryText | Error::NoDocuments => {
                (StatusCode::BAD_REQUEST, "bad_request")
            }
            Error::UnsupportedFormat(_) => (StatusCode::UNSUPPORTED_MEDIA_TYPE, "unsupported_format"),
            Error::Pdf(_) => (StatusCode::UNPROCESSABLE_ENTITY, "invalid_document"),
            e if e.is_transient() => (StatusCode::SERVICE_UNAVAILABLE, "service_unavailable"),
            _ => (StatusCode::INTERNAL_SERVER_ERROR, "internal"),
        };
        AppError {
            status,
            code,
            message: err.to_string(),
        }
    }
}

async fn find_session(state: &AppState, id: &str) -> Result<Arc<Mutex<Session>>, AppError> {
    let missing = || not_found(format!("no session with id: {}", id));
    let id = Uuid::parse_str(id).map_err(|_| missing())?;
    let mut sessions = state.sessions.write().await;
    let entry = sessions.get_mut(&id).ok_or_else(missing)?;
    entry.last_used = Instant::now();
    Ok(Arc::clone(&entry.session))
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

// ============ Sessions ============

#[derive(Serialize)]
struct SessionCreated {
    session_id: String,
}

async fn handle_create_session(State(state): State<AppState>) -> (StatusCode, Json<SessionCreated>) {
    let id = Uuid::new_v4();
    let now = Instant::now();
    let mut sessions = state.sessions.write().await;
    if let Some(timeout) = state.idle_timeout {
        expire_idle(&mut sessions, timeout, now);
    }
    sessions.insert(id, SessionEntry::new(now));
    tracing::info!(session = %id, "session created");
    (
        StatusCode::CREATED,
        Json(SessionCreated {
            session_id: id.to_string(),
        }),
    )
}

async fn handle_delete_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    let uuid = Uuid::parse_str(&id).map_err(|_| not_found(format!("no session with id: {}", id)))?;
    match state.sessions.write().await.remove(&uuid) {
        Some(_) => {
            tracing::info!(session = %uuid, "session dropped");
            Ok(StatusCode::NO_CONTENT)
        }
        None => Err(not_found(format!("no session with id: {}", id))),
    }
}

// ============ Documents ============

#[derive(Serialize)]
struct DocumentInfo {
    name: String,
    paragraphs: usize,
    annotated: bool,
}

#[derive(Serialize)]
struct DocumentList {
    documents: Vec<DocumentInfo>,
}

async fn handle_list_documents(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<DocumentList>, AppError> {
    let session = find_session(&state, &id).await?;
    let session = session.lock().await;
    let documents = session
        .documents()
        .iter()
        .map(|doc| DocumentInfo {
            name: doc.name().to_string(),
            paragraphs: doc.len(),
            annotated: session.annotation(doc.name()).is_some(),
        })
        .collect();
    Ok(Json(DocumentList { documents }))
}

#[derive(Serialize)]
struct UploadResponse {
    name: String,
    paragraphs: usize,
    replaced: bool,
}

async fn handle_upload(
    State(state): State<AppState>,
    Path((id, name)): Path<(String, String)>,
    body: Bytes,
) -> Result<Json<UploadResponse>, AppError> {
    let session = find_session(&state, &id).await?;

    // Parse before locking so other requests on the session are not held up.
    let document = docent_core::models::Document::new(name.clone(), body.to_vec());
    let pipeline = Arc::clone(&state.pipeline);
    let parsed = tokio::task::spawn_blocking(move || pipeline.parse(document))
        .await
        .map_err(internal)??;
    let paragraphs = parsed.len();
    let replaced = state.pipeline.add(&mut *session.lock().await, parsed);

    Ok(Json(UploadResponse {
        name,
        paragraphs,
        replaced,
    }))
}

async fn handle_download(
    State(state): State<AppState>,
    Path((id, name)): Path<(String, String)>,
) -> Result<Response, AppError> {
    let session = find_session(&state, &id).await?;
    let session = session.lock().await;
    let bytes = session
        .display_bytes(&name)
        .ok_or_else(|| not_found(format!("no document named: {}", name)))?
        .to_vec();
    Ok(([(header::CONTENT_TYPE, "application/pdf")], bytes).into_response())
}

#[derive(Deserialize)]
struct ViewParams {
    focus: Option<String>,
}

async fn handle_view(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(params): Query<ViewParams>,
) -> Result<Html<String>, AppError> {
    let session = find_session(&state, &id).await?;
    let session = session.lock().await;
    Ok(Html(render_viewer(&session, params.focus.as_deref())))
}

// ============ POST /sessions/{id}/ask ============

#[derive(Deserialize)]
struct AskRequest {
    question: String,
}

#[derive(Serialize)]
struct ContextParagraph {
    document: String,
    index: usize,
    score: f32,
    text: String,
    coordinates: Coordinates,
}

#[derive(Serialize)]
struct AskResponse {
    answer: String,
    cached: bool,
    focus_document: Option<String>,
    context: Vec<ContextParagraph>,
}

async fn handle_ask(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<AskRequest>,
) -> Result<Json<AskResponse>, AppError> {
    let session = find_session(&state, &id).await?;
    let mut session = session.lock().await;
    let outcome = state.pipeline.ask(&mut session, &request.question).await?;

    let context = outcome
        .context
        .iter()
        .map(|p| ContextParagraph {
            document: p.document_name().to_string(),
            index: p.index,
            score: p.score,
            text: p.text().to_string(),
            coordinates: p.paragraph().coordinates,
        })
        .collect();

    Ok(Json(AskResponse {
        answer: outcome.answer,
        cached: outcome.cached,
        focus_document: outcome.focus_document,
        context,
    }))
}

// ============ POST /sessions/{id}/summarize ============

#[derive(Deserialize)]
struct SummarizeRequest {
    text: String,
}

#[derive(Serialize)]
struct SummarizeResponse {
    summary: String,
    cached: bool,
}

async fn handle_summarize(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<SummarizeRequest>,
) -> Result<Json<SummarizeResponse>, AppError> {
    let session = find_session(&state, &id).await?;
    let mut session = session.lock().await;
    let outcome = state.pipeline.summarize(&mut session, &request.text).await?;
    Ok(Json(SummarizeResponse {
        summary: outcome.summary,
        cached: outcome.cached,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn idle_sessions_expire_and_busy_ones_stay() {
        let start = Instant::now();
        let timeout = Duration::from_secs(60);
        let mut sessions = HashMap::new();
        let idle = Uuid::new_v4();
        let busy = Uuid::new_v4();
        let recent = Uuid::new_v4();
        sessions.insert(idle, SessionEntry::new(start));
        sessions.insert(busy, SessionEntry::new(start));
        sessions.insert(recent, SessionEntry::new(start + Duration::from_secs(100)));

        let busy_session = Arc::clone(&sessions[&busy].session);
        let _guard = busy_session.try_lock().unwrap();

        let dropped = expire_idle(&mut sessions, timeout, start + Duration::from_secs(120));
        assert_eq!(dropped, 1);
        assert!(!sessions.contains_key(&idle));
        assert!(sessions.contains_key(&busy));
        assert!(sessions.contains_key(&recent));
    }

    #[test]
    fn sessions_within_the_timeout_are_kept() {
        let start = Instant::now();
        let mut sessions = HashMap::new();
        sessions.insert(Uuid::new_v4(), SessionEntry::new(start));
        let dropped = expire_idle(&mut sessions, Duration::from_secs(60), start + Duration::from_secs(60));
        assert_eq!(dropped, 0);
        assert_eq!(sessions.len(), 1);
    }
}
