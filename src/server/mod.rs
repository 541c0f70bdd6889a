//! HTTP surface of the chat service
//!
//! Three warp routes: `GET /health`, `POST /login`, and `POST /chat`.
//! Errors surface as JSON `{"detail": ...}` bodies with matching status
//! codes. CORS is wide open; the service is demo glue expected to sit
//! behind a course UI.

use crate::agent::ChatAgent;
use crate::auth::{self, TokenStore};
use crate::config::ServiceConfig;
use crate::error::{ServiceError, ServiceResult};
use crate::guardrails::{ReadingTimeGuardrail, TopicGuardrail, Verdict};
use crate::trace::TraceClient;
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::sync::Arc;
use tracing::{error, info};
use uuid::Uuid;
use warp::http::StatusCode;
use warp::{Filter, Rejection, Reply};

/// One chat turn request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    pub session_id: Option<String>,
}

/// Chat reply with provenance and monitoring annotation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatResponse {
    pub reply: String,
    /// Provenance: `agent:{model}`, `rule-based`, `guardrail:topic`, or
    /// `guardrail:reading_time`
    pub source: String,
    /// Whether this turn was recorded by the trace backend
    pub monitored: bool,
    pub session_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginResponse {
    pub message: String,
    pub token: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct HealthResponse {
    status: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct ErrorBody {
    detail: String,
}

/// Shared state behind all routes
pub struct AppState {
    pub config: ServiceConfig,
    pub tokens: TokenStore,
    pub agent: ChatAgent,
    pub topic_guard: TopicGuardrail,
    pub reading_guard: ReadingTimeGuardrail,
    pub trace: TraceClient,
}

fn with_state(
    state: Arc<AppState>,
) -> impl Filter<Extract = (Arc<AppState>,), Error = Infallible> + Clone {
    warp::any().map(move || state.clone())
}

/// Build the full route tree with CORS and rejection handling
pub fn routes(
    state: Arc<AppState>,
) -> impl Filter<Extract = impl Reply, Error = Rejection> + Clone {
    let health_route = warp::path("health")
        .and(warp::path::end())
        .and(warp::get())
        .map(|| {
            warp::reply::json(&HealthResponse {
                status: "ok".to_string(),
            })
        });

    let login_route = warp::path("login")
        .and(warp::path::end())
        .and(warp::post())
        .and(with_state(state.clone()))
        .and(warp::body::json())
        .and_then(handle_login);

    let chat_route = warp::path("chat")
        .and(warp::path::end())
        .and(warp::post())
        .and(with_state(state))
        .and(warp::header::optional::<String>("x-auth-token"))
        .and(warp::body::json())
        .and_then(handle_chat);

    let cors = warp::cors()
        .allow_any_origin()
        .allow_methods(vec!["GET", "POST", "OPTIONS"])
        .allow_headers(vec!["content-type", "x-auth-token"]);

    health_route
        .or(login_route)
        .or(chat_route)
        .recover(handle_rejection)
        .with(cors)
}

async fn handle_login(
    state: Arc<AppState>,
    request: LoginRequest,
) -> Result<impl Reply, Rejection> {
    auth::check_credentials(&state.config, &request.username, &request.password)
        .map_err(warp::reject::custom)?;

    let token = state.tokens.issue(&request.username).await;
    info!(username = %request.username, "Login succeeded");

    Ok(warp::reply::json(&LoginResponse {
        message: format!("Welcome back, {}!", request.username),
        token,
    }))
}

async fn handle_chat(
    state: Arc<AppState>,
    token: Option<String>,
    request: ChatRequest,
) -> Result<impl Reply, Rejection> {
    let response = chat_turn(state, token, request)
        .await
        .map_err(warp::reject::custom)?;
    Ok(warp::reply::json(&response))
}

/// Run one authenticated chat turn through both guardrails and the agent
async fn chat_turn(
    state: Arc<AppState>,
    token: Option<String>,
    request: ChatRequest,
) -> ServiceResult<ChatResponse> {
    let token = token
        .ok_or_else(|| ServiceError::unauthorized("Missing or invalid authentication token"))?;
    let username = state
        .tokens
        .verify(&token)
        .await
        .ok_or_else(|| ServiceError::unauthorized("Missing or invalid authentication token"))?;

    let message = request.message.trim().to_string();
    if message.is_empty() {
        return Err(ServiceError::invalid_input("message cannot be empty"));
    }

    let session_id = resolve_session_id(request.session_id);
    let monitored = state.trace.auth_check().await;

    info!(
        username = %username,
        session_id = %session_id,
        monitored = monitored,
        "Processing chat turn"
    );

    if let Verdict::Reject { reason } = state.topic_guard.check(&message).await {
        info!(session_id = %session_id, reason = %reason, "Topic guardrail triggered");
        return Ok(ChatResponse {
            reply: topic_rejection_reply(&state.config),
            source: "guardrail:topic".to_string(),
            monitored: false,
            session_id,
        });
    }

    let agent_reply = state.agent.respond(&message).await;

    state
        .trace
        .record_chat_span(&session_id, &message, &agent_reply.text, &agent_reply.source);

    if let Verdict::Reject { reason } = state.reading_guard.check(&agent_reply.text) {
        info!(session_id = %session_id, reason = %reason, "Reading-time guardrail triggered");
        return Ok(ChatResponse {
            reply: reading_time_rejection_reply(&state.config),
            source: "guardrail:reading_time".to_string(),
            monitored,
            session_id,
        });
    }

    Ok(ChatResponse {
        reply: agent_reply.text,
        source: agent_reply.source,
        monitored,
        session_id,
    })
}

/// Use the client's session id, or mint a fresh one (pure function)
fn resolve_session_id(session_id: Option<String>) -> String {
    session_id
        .filter(|s| !s.trim().is_empty())
        .unwrap_or_else(|| Uuid::new_v4().to_string())
}

/// Canned reply for a topic rejection (pure function)
fn topic_rejection_reply(config: &ServiceConfig) -> String {
    format!(
        "Sorry, I can only discuss topics related to {}. Please adjust your question.",
        config.guardrails.valid_topics.join(", ")
    )
}

/// Canned reply for a reading-time rejection (pure function)
fn reading_time_rejection_reply(config: &ServiceConfig) -> String {
    format!(
        "The generated answer would take longer than {} seconds to read. \
         Please narrow down your question so I can provide a concise answer.",
        config.guardrails.max_reading_secs
    )
}

/// Translate rejections into JSON error bodies
async fn handle_rejection(err: Rejection) -> Result<impl Reply, Infallible> {
    let (status, detail) = if let Some(service_error) = err.find::<ServiceError>() {
        (service_error.status_code(), service_error.detail())
    } else if err.is_not_found() {
        (StatusCode::NOT_FOUND, "Not found".to_string())
    } else if err
        .find::<warp::filters::body::BodyDeserializeError>()
        .is_some()
    {
        (StatusCode::BAD_REQUEST, "Invalid request body".to_string())
    } else if err.find::<warp::reject::MethodNotAllowed>().is_some() {
        (
            StatusCode::METHOD_NOT_ALLOWED,
            "Method not allowed".to_string(),
        )
    } else {
        error!(?err, "Unhandled rejection");
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            "Internal server error".to_string(),
        )
    };

    let body = warp::reply::json(&ErrorBody { detail });
    Ok(warp::reply::with_status(body, status))
}
