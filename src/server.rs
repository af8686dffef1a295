use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use anyhow::Result;
use askama::Template;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Json};
use axum::routing::{get, post};
use axum::Router;
use chrono::{DateTime, Utc};
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use crate::chat::ChatService;
use crate::config::AppConfig;
use crate::models::{
    ChatRequest, ChatResponse, ChatTurn, ConversationState, SessionRequest, SessionResponse,
    StatusResponse,
};

/// Per-session conversation memory: the transcript and the pagination
/// cursor. Sessions are in-memory only and vanish on restart.
#[derive(Default)]
struct Session {
    history: Vec<ChatTurn>,
    state: Option<ConversationState>,
}

type SessionMap = Arc<Mutex<HashMap<String, Arc<tokio::sync::Mutex<Session>>>>>;

#[derive(Clone)]
struct AppState {
    chat: Arc<ChatService>,
    sessions: SessionMap,
    document_count: usize,
    started_at: DateTime<Utc>,
}

pub async fn run_server(
    config: AppConfig,
    chat: Arc<ChatService>,
    document_count: usize,
) -> Result<()> {
    let state = AppState {
        chat,
        sessions: Arc::new(Mutex::new(HashMap::new())),
        document_count,
        started_at: Utc::now(),
    };

    let app = Router::new()
        .route("/", get(index_page))
        .route("/api/session", post(create_session))
        .route("/api/chat", post(chat_handler))
        .route("/api/regenerate", post(regenerate_handler))
        .route("/api/status", get(status_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let addr: SocketAddr = config.bind_addr.parse()?;
    tracing::info!("listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

async fn index_page(State(state): State<AppState>) -> Result<Html<String>, ApiError> {
    let session_id = register_session(&state)?;

    let template = IndexTemplate { session_id };
    let body = template.render().map_err(ApiError::from)?;

    Ok(Html(body))
}

async fn create_session(
    State(state): State<AppState>,
    Json(request): Json<SessionRequest>,
) -> Result<Json<SessionResponse>, ApiError> {
    if request.reset.unwrap_or(false) {
        if let Some(session_id) = request.session_id {
            let session = lookup_session(&state, &session_id)?;
            let mut guard = session.lock().await;
            guard.history.clear();
            guard.state = None;
            return Ok(Json(SessionResponse { session_id }));
        }
    }

    let session_id = register_session(&state)?;
    Ok(Json(SessionResponse { session_id }))
}

async fn chat_handler(
    State(state): State<AppState>,
    Json(request): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, ApiError> {
    let message = request.message.trim().to_string();
    if message.is_empty() {
        return Err(ApiError::bad_request("message must not be empty".into()));
    }

    let session = lookup_session(&state, &request.session_id)?;

    // One in-flight turn per session; concurrent requests queue here.
    let mut guard = session.lock().await;
    let outcome = state
        .chat
        .respond(&message, &guard.history, guard.state.as_ref())
        .await;

    guard.state = outcome.state.clone();
    let answered = outcome.answered();
    if answered {
        guard.history.push(ChatTurn {
            user: message,
            model: outcome.answer.clone(),
        });
    }

    Ok(Json(ChatResponse {
        answer: outcome.answer,
        answered,
    }))
}

/// Re-runs the last user message after dropping the answer it produced.
async fn regenerate_handler(
    State(state): State<AppState>,
    Json(request): Json<SessionRequest>,
) -> Result<Json<ChatResponse>, ApiError> {
    let session_id = request
        .session_id
        .ok_or_else(|| ApiError::bad_request("session_id required".into()))?;
    let session = lookup_session(&state, &session_id)?;

    let mut guard = session.lock().await;
    let Some(last) = guard.history.pop() else {
        return Err(ApiError::bad_request("nothing to regenerate".into()));
    };

    // The dropped turn may have advanced the pagination cursor; a clean
    // redo would need the pre-turn cursor, which is not kept. Clearing it
    // degrades to the lost-context reply instead of a wrong page.
    if guard.state.is_some() {
        guard.state = None;
    }

    let outcome = state
        .chat
        .respond(&last.user, &guard.history, guard.state.as_ref())
        .await;

    guard.state = outcome.state.clone();
    let answered = outcome.answered();
    if answered {
        guard.history.push(ChatTurn {
            user: last.user,
            model: outcome.answer.clone(),
        });
    }

    Ok(Json(ChatResponse {
        answer: outcome.answer,
        answered,
    }))
}

async fn status_handler(State(state): State<AppState>) -> Json<StatusResponse> {
    Json(StatusResponse {
        status: "ok".to_string(),
        document_count: state.document_count,
        started_at: state.started_at,
    })
}

fn register_session(state: &AppState) -> Result<String, ApiError> {
    let session_id = Uuid::new_v4().to_string();
    state
        .sessions
        .lock()
        .map_err(|_| ApiError::internal("session lock poisoned".into()))?
        .insert(
            session_id.clone(),
            Arc::new(tokio::sync::Mutex::new(Session::default())),
        );
    Ok(session_id)
}

fn lookup_session(
    state: &AppState,
    session_id: &str,
) -> Result<Arc<tokio::sync::Mutex<Session>>, ApiError> {
    state
        .sessions
        .lock()
        .map_err(|_| ApiError::internal("session lock poisoned".into()))?
        .get(session_id)
        .cloned()
        .ok_or_else(|| ApiError::not_found(format!("unknown session: {session_id}")))
}

#[derive(Template)]
#[template(path = "index.html")]
struct IndexTemplate {
    session_id: String,
}

#[derive(Debug)]
struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn not_found(message: String) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            message,
        }
    }

    fn bad_request(message: String) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message,
        }
    }

    fn internal(message: String) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message,
        }
    }
}

impl From<askama::Error> for ApiError {
    fn from(value: askama::Error) -> Self {
        Self::internal(value.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let body = serde_json::json!({ "error": self.message });
        (self.status, Json(body)).into_response()
    }
}
