use crate::agent::DeclutterAgent;
use crate::error::{ AnalysisError, ErrorKind, ExchangeError, SessionError };
use crate::history::ChatResponder;
use crate::image::normalize_upload;
use crate::models::chat::ChatMessage;
use crate::session::{ AnalysisTicket, ChatTicket, SessionStore, SessionView };

use std::sync::Arc;
use axum::{
    routing::{ delete, get, post },
    Router,
    extract::{ Path, State },
    response::{ IntoResponse, Response },
    http::StatusCode,
    Json,
};
use serde::{ Deserialize, Serialize };
use tower_http::cors::{ Any, CorsLayer };
use log::{ error, info, warn };
use tokio::task::JoinError;
use uuid::Uuid;

#[derive(Clone)]
pub struct AppState {
    pub agent: DeclutterAgent,
    pub sessions: Arc<SessionStore>,
    pub max_image_bytes: usize,
}

#[derive(Deserialize)]
pub struct ImageUpload {
    pub image: String,
}

#[derive(Deserialize)]
pub struct ChatRequest {
    pub text: String,
}

#[derive(Serialize)]
struct ChatResponse {
    reply: ChatMessage,
    session: SessionView,
}

#[derive(Serialize)]
struct ErrorDetail {
    kind: String,
    message: String,
}

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
    #[serde(skip_serializing_if = "Option::is_none")]
    session: Option<SessionView>,
}

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    kind: String,
    message: String,
    session: Option<SessionView>,
}

impl ApiError {
    fn new(status: StatusCode, kind: &str, message: impl Into<String>) -> Self {
        Self {
            status,
            kind: kind.to_string(),
            message: message.into(),
            session: None,
        }
    }

    fn not_found(id: Uuid) -> Self {
        Self::new(StatusCode::NOT_FOUND, "not_found", format!("session {} not found", id))
    }

    fn reset_meanwhile() -> Self {
        Self::new(StatusCode::CONFLICT, "reset", "session was reset while the request was running")
    }
}

impl From<SessionError> for ApiError {
    fn from(err: SessionError) -> Self {
        let (status, kind) = match err {
            SessionError::Busy => (StatusCode::CONFLICT, "busy"),
            SessionError::WrongStage(_) => (StatusCode::CONFLICT, "wrong_stage"),
            SessionError::EmptyMessage => (StatusCode::BAD_REQUEST, "empty_message"),
        };
        Self::new(status, kind, err.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail { kind: self.kind, message: self.message },
            session: self.session,
        };
        (self.status, Json(body)).into_response()
    }
}

fn analysis_status(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::Config => StatusCode::SERVICE_UNAVAILABLE,
        ErrorKind::RegionUnsupported => StatusCode::UNAVAILABLE_FOR_LEGAL_REASONS,
        ErrorKind::RateLimit => StatusCode::TOO_MANY_REQUESTS,
        ErrorKind::Parse | ErrorKind::Generic => StatusCode::BAD_GATEWAY,
    }
}

pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health_handler))
        .route("/api/sessions", post(create_session_handler))
        .route("/api/sessions/{id}", get(get_session_handler).delete(delete_session_handler))
        .route("/api/sessions/{id}/image", post(submit_image_handler))
        .route("/api/sessions/{id}/messages", post(send_message_handler))
        .route("/api/sessions/{id}/reset", post(reset_handler))
        .route("/api/sessions/{id}/error", delete(dismiss_error_handler))
        .layer(cors)
        .with_state(state)
}

async fn health_handler() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

async fn create_session_handler(State(state): State<AppState>) -> impl IntoResponse {
    (StatusCode::CREATED, Json(state.sessions.create().await))
}

async fn get_session_handler(
    State(state): State<AppState>,
    Path(id): Path<Uuid>
) -> Result<Json<SessionView>, ApiError> {
    state.sessions.view(id).await.map(Json).ok_or_else(|| ApiError::not_found(id))
}

async fn delete_session_handler(
    State(state): State<AppState>,
    Path(id): Path<Uuid>
) -> Result<StatusCode, ApiError> {
    if state.sessions.remove(id).await {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::not_found(id))
    }
}

async fn submit_image_handler(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(upload): Json<ImageUpload>
) -> Result<Json<SessionView>, ApiError> {
    let image = normalize_upload(&upload.image, state.max_image_bytes).map_err(|e| {
        warn!("Session {}: rejected upload: {}", id, e);
        ApiError::new(StatusCode::BAD_REQUEST, "invalid_image", e.to_string())
    })?;

    let ticket = state.sessions
        .update(id, |s| s.begin_analysis(image)).await
        .ok_or_else(|| ApiError::not_found(id))??;

    info!("Session {}: analyzing image ({} base64 chars)", id, ticket.image.len());
    let view = tokio::spawn(run_analysis(state, id, ticket)).await.map_err(|e| task_failed(id, e))??;
    Ok(Json(view))
}

/// Analyzes and settles the session. Runs detached from the request, so a client that
/// disconnects mid-call still leaves the session either on the dashboard or back on
/// upload with a banner.
async fn run_analysis(state: AppState, id: Uuid, ticket: AnalysisTicket) -> Result<SessionView, ApiError> {
    let agent = state.agent.clone();
    let image = ticket.image.clone();
    let result = match tokio::spawn(async move { agent.analyze_room(&image).await }).await {
        Ok(result) => result,
        Err(e) => {
            error!("Session {}: analysis task did not complete: {}", id, e);
            Err(AnalysisError::Generic(e.to_string()))
        }
    };
    let failure = result.as_ref().err().map(|e| e.kind());

    let prompts = state.agent.prompts().clone();
    let (applied, view) = state.sessions
        .update(id, |s| {
            let applied = s.complete_analysis(ticket, result, &prompts);
            (applied, s.view())
        }).await
        .ok_or_else(|| ApiError::not_found(id))?;
    if !applied {
        return Err(ApiError::reset_meanwhile());
    }

    match failure {
        None => Ok(view),
        Some(kind) =>
            Err(ApiError {
                status: analysis_status(kind),
                kind: kind.as_str().to_string(),
                message: prompts.error_message(kind).to_string(),
                session: Some(view),
            }),
    }
}

async fn send_message_handler(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<ChatRequest>
) -> Result<Json<ChatResponse>, ApiError> {
    let ticket = state.sessions
        .update(id, |s| s.begin_chat(&request.text)).await
        .ok_or_else(|| ApiError::not_found(id))??;

    let response = tokio::spawn(run_exchange(state, id, ticket)).await.map_err(|e| task_failed(id, e))??;
    Ok(Json(response))
}

/// Asks for the reply and settles the exchange, detached from the request like
/// `run_analysis`. A reply task that panics renders the apology.
async fn run_exchange(state: AppState, id: Uuid, ticket: ChatTicket) -> Result<ChatResponse, ApiError> {
    let agent = state.agent.clone();
    let history = Arc::clone(&ticket.pending.history);
    let text = ticket.pending.text.clone();
    let outcome = match tokio::spawn(async move { agent.reply(&history, &text).await }).await {
        Ok(outcome) => outcome,
        Err(e) => {
            error!("Session {}: chat task did not complete: {}", id, e);
            Err(ExchangeError::Aborted)
        }
    };

    let completed = state.sessions
        .update(id, |s| s.complete_chat(ticket, outcome).map(|reply| (reply, s.view()))).await
        .ok_or_else(|| ApiError::not_found(id))?;
    let (reply, session) = completed.ok_or_else(ApiError::reset_meanwhile)?;
    Ok(ChatResponse { reply, session })
}

fn task_failed(id: Uuid, err: JoinError) -> ApiError {
    error!("Session {}: request task failed: {}", id, err);
    ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, "internal", "request could not be completed")
}

async fn reset_handler(
    State(state): State<AppState>,
    Path(id): Path<Uuid>
) -> Result<Json<SessionView>, ApiError> {
    state.sessions
        .update(id, |s| {
            s.reset();
            s.view()
        }).await
        .map(Json)
        .ok_or_else(|| ApiError::not_found(id))
}

async fn dismiss_error_handler(
    State(state): State<AppState>,
    Path(id): Path<Uuid>
) -> Result<Json<SessionView>, ApiError> {
    state.sessions
        .update(id, |s| {
            s.dismiss_error();
            s.view()
        }).await
        .map(Json)
        .ok_or_else(|| ApiError::not_found(id))
}
