//! Axum route handlers.
//!
//! # Routes
//!
//! - `GET  /health`                   - `{"status": "healthy"}`
//! - `GET  /philosophy-mix`           - the weighted tradition table
//! - `POST /advice`                   - generate advice (optional bearer auth)
//! - `GET  /conversations/:user_id`   - the caller's own log (bearer auth required)
//! - `GET  /stats`                    - aggregate log counts

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::{header::AUTHORIZATION, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{debug, info, instrument};

use crate::advice::{AdviceGenerator, UpstreamError};
use crate::config::Config;
use crate::conversation::{ConversationLog, ConversationRecord, RecordKind};
use crate::identity::{bearer_token, HttpKeySource, IdentityClaims, IdentityVerifier};
use crate::philosophy::{guidance_lines, PhilosophyMix, PhilosophyTable, PERSPECTIVES_PER_PROMPT};
use crate::providers::anthropic::AnthropicProvider;

/// Shared application state, built once at startup.
#[derive(Clone)]
pub struct AppState {
    /// Bearer-token verifier.
    pub verifier: Arc<IdentityVerifier>,
    /// Advice generator over the configured provider.
    pub generator: Arc<AdviceGenerator>,
    /// Per-user conversation log.
    pub conversations: Arc<ConversationLog>,
    /// Weighted tradition table.
    pub philosophy: Arc<PhilosophyTable>,
}

impl AppState {
    /// State with an empty log and the standard philosophy table.
    pub fn new(verifier: IdentityVerifier, generator: AdviceGenerator) -> Self {
        Self {
            verifier: Arc::new(verifier),
            generator: Arc::new(generator),
            conversations: Arc::new(ConversationLog::new()),
            philosophy: Arc::new(PhilosophyTable::standard()),
        }
    }

    /// Build the production state: Anthropic provider plus, when a JWKS URL
    /// is configured, an HTTP-backed verifier.
    ///
    /// # Errors
    ///
    /// Returns an error if an HTTP client cannot be constructed.
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        let provider = AnthropicProvider::new(
            config.model.clone(),
            config.anthropic.clone(),
            config.generation_timeout,
        )?;
        let generator = AdviceGenerator::new(Arc::new(provider), config.max_tokens);

        let verifier = match &config.jwks_url {
            Some(url) => {
                let source = HttpKeySource::new(url.clone(), config.jwks_timeout)?;
                IdentityVerifier::new(Arc::new(source), config.verifier.clone())
            }
            None => IdentityVerifier::disabled(),
        };

        Ok(Self::new(verifier, generator))
    }
}

/// Build the axum router with all routes.
pub fn app_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/philosophy-mix", get(philosophy_mix_handler))
        .route("/advice", post(advice_handler))
        .route("/conversations/:user_id", get(conversations_handler))
        .route("/stats", get(stats_handler))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Handler failures and their HTTP mapping.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Route requires a verified identity and none was presented.
    #[error("Authentication required")]
    Unauthenticated,
    /// Verified identity does not own the requested resource.
    #[error("Access denied")]
    AccessDenied,
    /// Generation failed; the message is passed through to the client.
    #[error("Error generating advice: {0}")]
    Upstream(#[from] UpstreamError),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            Self::Unauthenticated => StatusCode::UNAUTHORIZED,
            Self::AccessDenied => StatusCode::FORBIDDEN,
            Self::Upstream(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status(), Json(json!({ "detail": self.to_string() }))).into_response()
    }
}

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

/// `POST /advice` body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdviceRequest {
    /// Free-text description of the relationship situation.
    pub situation: String,
    /// Accepted for compatibility; identity only comes from the bearer token.
    #[serde(default)]
    pub user_id: Option<String>,
}

/// `POST /advice` response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdviceResponse {
    /// Generated advice text.
    pub advice: String,
    /// Verified subject, if any.
    pub user_id: Option<String>,
    /// Whether a bearer token verified.
    pub authenticated: bool,
}

/// `GET /conversations/:user_id` response.
#[derive(Debug, Clone, Serialize)]
pub struct ConversationsResponse {
    /// Owner of the records.
    pub user_id: String,
    /// Records, oldest first.
    pub conversations: Vec<ConversationRecord>,
}

/// `GET /philosophy-mix` response.
#[derive(Debug, Clone, Serialize)]
pub struct PhilosophyMixResponse {
    /// Rows keyed by tradition id, in table order.
    pub philosophy_mix: PhilosophyMix,
    /// Number of traditions in the table.
    pub total_traditions: usize,
    /// Fixed blurb.
    pub description: &'static str,
}

/// `GET /stats` response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatsResponse {
    /// Users with at least one record.
    pub total_users: usize,
    /// Records across all users.
    pub total_conversations: usize,
    /// Whether a bearer token verified.
    pub authenticated: bool,
    /// The caller's own record count, only when authenticated.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_conversation_count: Option<usize>,
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

async fn caller_identity(state: &AppState, headers: &HeaderMap) -> Option<IdentityClaims> {
    let token = headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(bearer_token);
    state.verifier.verify(token).await
}

/// GET /health - liveness probe.
async fn health_handler() -> impl IntoResponse {
    Json(json!({ "status": "healthy" }))
}

/// GET /philosophy-mix - the static tradition table.
async fn philosophy_mix_handler(State(state): State<AppState>) -> Json<PhilosophyMixResponse> {
    Json(PhilosophyMixResponse {
        philosophy_mix: state.philosophy.mix(),
        total_traditions: state.philosophy.entries().len(),
        description: "Babushka draws wisdom from diverse global traditions.",
    })
}

/// POST /advice - generate advice for a situation.
///
/// The user message is logged before the generation call and the response
/// after it, both only when the caller has a verified subject. A failed
/// generation leaves the user message in place.
#[instrument(skip_all, fields(request_id = %uuid::Uuid::new_v4()))]
async fn advice_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<AdviceRequest>,
) -> Result<Json<AdviceResponse>, ApiError> {
    let identity = caller_identity(&state, &headers).await;
    let authenticated = identity.is_some();
    let user_id = identity
        .as_ref()
        .and_then(IdentityClaims::subject)
        .filter(|sub| !sub.is_empty())
        .map(str::to_owned);
    if request.user_id.is_some() {
        debug!("ignoring user_id from request body");
    }
    debug!(authenticated, situation = %request.situation, "advice requested");

    if let Some(uid) = &user_id {
        state
            .conversations
            .append(uid, RecordKind::UserMessage, request.situation.as_str());
    }

    let picks = state
        .philosophy
        .select(PERSPECTIVES_PER_PROMPT, &mut rand::thread_rng());
    debug!(?picks, "selected perspectives");

    let advice = state
        .generator
        .generate(&request.situation, &guidance_lines(&picks))
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "advice generation failed");
            ApiError::from(e)
        })?;

    if let Some(uid) = &user_id {
        state
            .conversations
            .append(uid, RecordKind::BotResponse, advice.as_str());
    }
    info!(authenticated, chars = advice.len(), "advice generated");

    Ok(Json(AdviceResponse {
        advice,
        user_id,
        authenticated,
    }))
}

/// GET /conversations/:user_id - the caller's own records.
async fn conversations_handler(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    headers: HeaderMap,
) -> Result<Json<ConversationsResponse>, ApiError> {
    let identity = caller_identity(&state, &headers)
        .await
        .ok_or(ApiError::Unauthenticated)?;
    if identity.subject() != Some(user_id.as_str()) {
        return Err(ApiError::AccessDenied);
    }

    let conversations = state.conversations.read(&user_id);
    Ok(Json(ConversationsResponse {
        user_id,
        conversations,
    }))
}

/// GET /stats - aggregate counts, plus the caller's own count when authenticated.
async fn stats_handler(State(state): State<AppState>, headers: HeaderMap) -> Json<StatsResponse> {
    let identity = caller_identity(&state, &headers).await;
    let user_conversation_count = identity.as_ref().map(|claims| {
        claims
            .subject()
            .map_or(0, |sub| state.conversations.count_records_for(sub))
    });

    Json(StatsResponse {
        total_users: state.conversations.count_users(),
        total_conversations: state.conversations.count_all_records(),
        authenticated: identity.is_some(),
        user_conversation_count,
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
